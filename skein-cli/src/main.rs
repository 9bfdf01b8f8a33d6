//! Skein CLI - Command line interface
//!
//! Every command addresses files by VFS name, e.g. `mem://a.txt`,
//! `archive://bundle.tar$docs/readme.md` or a plain disk path.

mod config;
mod error;
mod logging;
mod platform;

use clap::{Parser, Subcommand};
use skein_vfs::{DirFlags, Name, Vfs};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

use crate::config::{parse_level, CliConfig, LogConfig};
use crate::error::CliError;
use crate::logging::{LogFormat, CLI_TARGET};
use crate::platform::{print_error, print_names, stat_json};

#[derive(Parser, Debug)]
#[command(
    name = "skein",
    about = "Skein virtual file system - scheme-routed file operations",
    version
)]
struct Cli {
    /// Configuration file (JSON with "vfs" and "logging" sections)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Global log level: silent, error, warn, info, debug, trace
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file to stdout
    Cat { name: String },

    /// Write stdin (or --from) into a file
    Put {
        name: String,
        /// Read the content from this local file instead of stdin
        #[arg(long, value_name = "PATH")]
        from: Option<PathBuf>,
        /// Fail when the target already exists
        #[arg(long)]
        no_overwrite: bool,
    },

    /// List a directory
    Ls {
        name: String,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Include hidden entries
        #[arg(short, long)]
        all: bool,
        #[arg(long, conflicts_with = "dirs_only")]
        files_only: bool,
        #[arg(long)]
        dirs_only: bool,
    },

    /// Copy a file, possibly across schemes
    Cp { src: String, dst: String },

    /// Remove a file or directory
    Rm {
        name: String,
        #[arg(short, long)]
        recursive: bool,
    },

    /// Create a directory
    Mkdir {
        name: String,
        /// Create missing parents too
        #[arg(short, long)]
        parents: bool,
    },

    /// Print what the provider knows about a name, as JSON
    Stat { name: String },

    /// Search for a file, probing each hint directory
    Find {
        name: String,
        #[arg(long = "hint", value_name = "DIR")]
        hints: Vec<String>,
    },

    /// List registered schemes
    Schemes,
}

impl Command {
    fn list_flags(recursive: bool, all: bool, files_only: bool, dirs_only: bool) -> DirFlags {
        let mut flags = match (files_only, dirs_only) {
            (true, _) => DirFlags::FILES,
            (_, true) => DirFlags::DIRECTORIES,
            _ => DirFlags::FILES | DirFlags::DIRECTORIES,
        };
        flags.set(DirFlags::RECURSIVE, recursive);
        flags.set(DirFlags::HIDDEN_FILES, all);
        flags
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        print_error(&e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let file_config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let mut log_config = LogConfig::from(&file_config.logging);
    if let Some(level) = &cli.log_level {
        log_config.global = parse_level(level)?;
    }
    logging::init_with_file(&log_config, cli.log_format, cli.log_file.as_deref())?;

    skein_vfs::config::init(file_config.vfs);
    let vfs = skein_vfs::global();
    debug!(target: CLI_TARGET, command = ?cli.command, "Running command");

    let mut stdout = io::stdout().lock();
    let result = execute(vfs, cli.command, &mut stdout);
    // Flush even after a failure so earlier writes are not lost
    let flushed = vfs.flush();
    result?;
    flushed?;
    Ok(())
}

fn execute<W: Write>(vfs: &Vfs, command: Command, out: &mut W) -> Result<(), CliError> {
    match command {
        Command::Cat { name } => {
            let content = vfs.load_file(&Name::parse(&name))?;
            out.write_all(&content)?;
        }
        Command::Put {
            name,
            from,
            no_overwrite,
        } => {
            let content = match from {
                Some(path) => std::fs::read(path)?,
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            vfs.save_file(&Name::parse(&name), &content, !no_overwrite)?;
            info!(target: CLI_TARGET, name, bytes = content.len(), "Saved");
        }
        Command::Ls {
            name,
            recursive,
            all,
            files_only,
            dirs_only,
        } => {
            let flags = Command::list_flags(recursive, all, files_only, dirs_only);
            let names = vfs.dir(&Name::parse(&name), flags)?;
            print_names(out, &names)?;
        }
        Command::Cp { src, dst } => {
            let bytes = vfs.copy_file(&Name::parse(&src), &Name::parse(&dst))?;
            info!(target: CLI_TARGET, src, dst, bytes, "Copied");
        }
        Command::Rm { name, recursive } => {
            vfs.remove(&Name::parse(&name), recursive)?;
        }
        Command::Mkdir { name, parents } => {
            vfs.create_dir(&Name::parse(&name), parents)?;
        }
        Command::Stat { name } => {
            let stat = stat_json(vfs, &Name::parse(&name))?;
            writeln!(out, "{:#}", stat)?;
        }
        Command::Find { name, hints } => match vfs.find_file(&Name::parse(&name), &hints)? {
            Some(found) => writeln!(out, "{}", found.to_short_string())?,
            None => return Err(CliError::NotFound(name)),
        },
        Command::Schemes => {
            for scheme in vfs.registry().schemes() {
                writeln!(out, "{}", scheme)?;
            }
        }
    }
    Ok(())
}
