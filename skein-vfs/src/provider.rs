//! FileProvider trait definition

use crate::error::{VfsError, VfsResult};
use crate::name::Name;
use crate::stream::Stream;
use bitflags::bitflags;

bitflags! {
    /// Filter for directory listings
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirFlags: u32 {
        /// Include regular files
        const FILES = 1;
        /// Include directories
        const DIRECTORIES = 2;
        /// Descend into subdirectories
        const RECURSIVE = 4;
        /// Include entries whose name starts with `.`
        const HIDDEN_FILES = 8;
    }
}

impl Default for DirFlags {
    fn default() -> Self {
        DirFlags::FILES | DirFlags::DIRECTORIES
    }
}

/// How a stream is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read existing content
    Read,
    /// Create or truncate, then write
    Write,
    /// Create if missing, write after existing content
    Append,
}

impl OpenMode {
    /// Whether the mode needs the backend to support whole-file reads
    pub fn reads_existing(&self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::Append)
    }

    /// Whether the mode needs the backend to support whole-file writes
    pub fn writes(&self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::Append)
    }
}

/// Backend contract for one scheme.
///
/// Every method has a default so a minimal backend only overrides what it
/// can do. Queries default to `false`/`0`; mutating operations, whole-file
/// I/O, listing and streaming default to [`VfsError::Unsupported`], which
/// tells the facade to apply a fallback where one exists.
///
/// # Implementations
/// - `DiskProvider`: native OS files (`file`)
/// - `ArchiveProvider`: entries inside tar containers (`archive`)
/// - `DatabaseProvider`: BLOB rows in SQLite stores (`dbfs`)
/// - `NetworkProvider`: HTTP(S) downloads (`http`, `https`)
/// - `MemoryProvider`: process-local store (`mem`)
pub trait FileProvider: Send + Sync {
    /// Label used in logs and `Unsupported` errors
    fn scheme_name(&self) -> &str;

    fn exists(&self, name: &Name) -> bool {
        let _ = name;
        false
    }

    fn is_file(&self, name: &Name) -> bool {
        let _ = name;
        false
    }

    fn is_dir(&self, name: &Name) -> bool {
        let _ = name;
        false
    }

    /// Size in bytes; `0` when unknown
    fn file_size(&self, name: &Name) -> u64 {
        let _ = name;
        0
    }

    fn make_dir(&self, name: &Name) -> VfsResult<()> {
        let _ = name;
        Err(VfsError::unsupported("make_dir", self.scheme_name()))
    }

    fn make_dir_recursive(&self, name: &Name) -> VfsResult<()> {
        let _ = name;
        Err(VfsError::unsupported("make_dir_recursive", self.scheme_name()))
    }

    /// Remove a file or an empty directory
    fn remove(&self, name: &Name) -> VfsResult<()> {
        let _ = name;
        Err(VfsError::unsupported("remove", self.scheme_name()))
    }

    /// Remove a directory tree.
    ///
    /// Lists every child (hidden included), recurses into directories,
    /// removes files, then removes the directory itself.
    fn remove_recursive(&self, name: &Name) -> VfsResult<()> {
        if !self.is_dir(name) {
            return self.remove(name);
        }
        let children = self.dir(
            name,
            DirFlags::FILES | DirFlags::DIRECTORIES | DirFlags::HIDDEN_FILES,
        )?;
        for child in &children {
            if child.is_dir_name() {
                self.remove_recursive(child)?;
            } else {
                self.remove(child)?;
            }
        }
        // Implicit directories vanish together with their last child
        match self.remove(name) {
            Err(e) if e.is_not_found() && !self.exists(name) => Ok(()),
            result => result,
        }
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        let _ = name;
        Err(VfsError::unsupported("read_file", self.scheme_name()))
    }

    /// Write a whole file; fails with `AlreadyExists` when `overwrite` is
    /// false and the file is present.
    fn write_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        let _ = (name, content, overwrite);
        Err(VfsError::unsupported("write_file", self.scheme_name()))
    }

    /// List a directory. Directory entries come back as directory names
    /// (trailing `/`, empty filename).
    fn dir(&self, name: &Name, flags: DirFlags) -> VfsResult<Vec<Name>> {
        let _ = (name, flags);
        Err(VfsError::unsupported("dir", self.scheme_name()))
    }

    /// Open a native stream
    fn open(&self, name: &Name, mode: OpenMode) -> VfsResult<Stream> {
        let _ = (name, mode);
        Err(VfsError::unsupported("open", self.scheme_name()))
    }

    fn open_for_reading(&self, name: &Name) -> VfsResult<Stream> {
        self.open(name, OpenMode::Read)
    }

    fn open_for_writing(&self, name: &Name) -> VfsResult<Stream> {
        self.open(name, OpenMode::Write)
    }

    fn open_for_appending(&self, name: &Name) -> VfsResult<Stream> {
        self.open(name, OpenMode::Append)
    }

    /// Make deferred writes durable; the provider stays usable afterwards.
    fn flush(&self) -> VfsResult<()> {
        Ok(())
    }
}
