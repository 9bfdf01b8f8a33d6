//! Shared helpers for skein-vfs integration tests

#![allow(dead_code)]

use skein_vfs::{Name, Vfs};
use tempfile::TempDir;

/// A scratch directory plus a facade with every built-in provider.
pub struct Sandbox {
    pub dir: TempDir,
    pub vfs: Vfs,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            vfs: Vfs::with_builtin_providers(),
        }
    }

    /// Absolute path of `rel` inside the sandbox, as plain text
    pub fn path(&self, rel: &str) -> String {
        format!("{}/{}", self.dir.path().to_string_lossy(), rel)
    }

    /// `file://` name of `rel` inside the sandbox
    pub fn file(&self, rel: &str) -> Name {
        Name::parse(&format!("file://{}", self.path(rel)))
    }

    /// Entry `inner` of the archive stored at `container` in the sandbox
    pub fn archive(&self, container: &str, inner: &str) -> Name {
        Name::parse(&format!("archive://{}${}", self.path(container), inner))
    }

    /// Entry `inner` of the database stored at `store` in the sandbox
    pub fn db(&self, store: &str, inner: &str) -> Name {
        Name::parse(&format!("dbfs://{}${}", self.path(store), inner))
    }
}

/// Deterministic, non-repeating-looking test data
pub fn payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// Inner paths of listed names (everything after the container marker)
pub fn inner_paths(names: &[Name]) -> Vec<String> {
    names
        .iter()
        .map(|n| {
            let path = n.path();
            match path.split_once('$') {
                Some((_, inner)) => inner.to_string(),
                None => path,
            }
        })
        .collect()
}
