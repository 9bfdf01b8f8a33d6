//! Process-unique scoped temporary directories

use crate::config;
use crate::error::{VfsError, VfsResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tracing::trace;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory named after the process id and a monotonically
/// increasing counter, deleted recursively when dropped.
///
/// A crash while the directory is in use leaks the directory but never
/// touches shared state.
#[derive(Debug)]
pub struct ScopedTempDir {
    dir: TempDir,
}

impl ScopedTempDir {
    /// Create a directory under the configured temp root.
    pub fn new() -> VfsResult<Self> {
        match &config::config().temp_root {
            Some(root) => Self::new_in(root),
            None => Self::new_in(std::env::temp_dir()),
        }
    }

    /// Create a directory under `root`.
    pub fn new_in(root: impl AsRef<Path>) -> VfsResult<Self> {
        let serial = COUNTER.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("skein-{}-{}-", std::process::id(), serial);
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root.as_ref())
            .map_err(|e| VfsError::from_io(e, &root.as_ref().to_string_lossy()))?;
        trace!(target: "skein::vfs", path = %dir.path().display(), "Created scoped temp dir");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the directory
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
