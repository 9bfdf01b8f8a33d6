//! Skein Virtual File System
//!
//! Routes file operations to pluggable providers by the scheme of a
//! URL-like [`Name`]: `file://`, `mem://`, `archive://`, `dbfs://`,
//! `http(s)://`. Container providers address entries inside another file
//! with a `$` marker, e.g. `archive://bundle.tar$docs/readme.txt`.
//!
//! # Features
//! - `archive` (default): tar/tar.gz containers
//! - `dbfs` (default): SQLite-backed file store
//! - `net` (default): read-only HTTP(S) downloads
//!
//! # Usage
//! ```
//! use skein_vfs::{Name, Vfs};
//!
//! let vfs = Vfs::with_builtin_providers();
//! let name = Name::parse("mem://docs/hello.txt");
//! vfs.save_file(&name, b"hello", true).unwrap();
//! assert_eq!(vfs.get_file_contents(&name).unwrap(), "hello");
//! ```

pub mod config;
mod error;
pub mod listing;
mod name;
mod provider;
pub mod providers;
mod registry;
mod stream;
mod temp;
mod vfs;

pub use error::{Status, VfsError, VfsResult};
pub use name::{Name, CONTAINER_MARKER, DEFAULT_SCHEME};
pub use provider::{DirFlags, FileProvider, OpenMode};
pub use providers::{DiskProvider, MemoryProvider};
#[cfg(feature = "archive")]
pub use providers::ArchiveProvider;
#[cfg(feature = "dbfs")]
pub use providers::DatabaseProvider;
#[cfg(feature = "net")]
pub use providers::NetworkProvider;
pub use registry::{ProviderFactory, Registry};
pub use skein_config::VfsConfig;
pub use stream::{BufferedStream, Stream, VfsStream};
pub use temp::ScopedTempDir;
pub use vfs::{Vfs, WeakVfs};

/// The process-wide facade with every built-in provider registered.
pub fn global() -> &'static Vfs {
    Vfs::global()
}
