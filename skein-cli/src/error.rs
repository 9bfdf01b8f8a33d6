//! CLI 错误类型

use skein_vfs::VfsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read config '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown log level '{0}' (expected silent, error, warn, info, debug or trace)")]
    LogLevel(String),

    #[error("cannot open log file '{}': {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("logging already initialized: {0}")]
    Logging(String),

    #[error("'{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CliError {
    /// Underlying VFS error, if any
    pub fn vfs(&self) -> Option<&VfsError> {
        match self {
            CliError::Vfs(e) => Some(e),
            _ => None,
        }
    }
}
