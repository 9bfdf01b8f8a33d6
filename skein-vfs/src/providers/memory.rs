//! In-memory provider (`mem://`)

use crate::error::{VfsError, VfsResult};
use crate::listing::{filter_catalog, normalize_dir, normalize_entry, parent_of, with_implicit_dirs};
use crate::name::Name;
use crate::provider::{DirFlags, FileProvider};
use crate::registry::Registry;
use crate::vfs::Vfs;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::trace;

pub const SCHEME: &str = "mem";

/// Register the memory provider with `registry`
pub fn register(registry: &Registry) -> bool {
    registry.register(SCHEME, |_: &Vfs| {
        Arc::new(MemoryProvider::new()) as Arc<dyn FileProvider>
    })
}

#[derive(Debug, Default)]
struct Store {
    files: BTreeMap<String, Vec<u8>>,
    // Explicit directory markers, each ending with `/`
    dirs: BTreeSet<String>,
}

impl Store {
    fn has_dir(&self, dir: &str) -> bool {
        if dir.is_empty() || self.dirs.contains(dir) {
            return true;
        }
        let under = |key: &String| key.starts_with(dir);
        self.files.range(dir.to_string()..).next().is_some_and(|(k, _)| under(k))
            || self.dirs.range(dir.to_string()..).next().is_some_and(under)
    }

    fn has_children(&self, dir: &str) -> bool {
        self.files.keys().any(|k| k.starts_with(dir))
            || self.dirs.iter().any(|d| d != dir && d.starts_with(dir))
    }
}

/// A provider keeping every file in memory.
///
/// Files live in a `BTreeMap` keyed by their path. Parent directories are
/// implicit; `make_dir` records an explicit marker so empty directories can
/// exist. Clones share the same store.
///
/// # Example
/// ```
/// use skein_vfs::{FileProvider, MemoryProvider, Name};
///
/// let mem = MemoryProvider::new();
/// let name = Name::parse("mem://test.txt");
/// mem.write_file(&name, b"hello", true).unwrap();
/// assert_eq!(mem.read_file(&name).unwrap(), b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    store: Arc<RwLock<Store>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider pre-populated with `(path, content)` pairs
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let provider = Self::new();
        {
            let mut store = provider.store.write();
            for (path, content) in files {
                store.files.insert(normalize_entry(path.as_ref()), content);
            }
        }
        provider
    }

    fn file_key(name: &Name) -> String {
        normalize_entry(&name.path())
            .trim_end_matches('/')
            .to_string()
    }
}

impl FileProvider for MemoryProvider {
    fn scheme_name(&self) -> &str {
        SCHEME
    }

    fn exists(&self, name: &Name) -> bool {
        self.is_file(name) || self.is_dir(name)
    }

    fn is_file(&self, name: &Name) -> bool {
        !name.is_dir_name() && self.store.read().files.contains_key(&Self::file_key(name))
    }

    fn is_dir(&self, name: &Name) -> bool {
        self.store.read().has_dir(&normalize_dir(&name.path()))
    }

    fn file_size(&self, name: &Name) -> u64 {
        self.store
            .read()
            .files
            .get(&Self::file_key(name))
            .map_or(0, |data| data.len() as u64)
    }

    fn make_dir(&self, name: &Name) -> VfsResult<()> {
        let dir = normalize_dir(&name.path());
        let mut store = self.store.write();
        if store.has_dir(&dir) || store.files.contains_key(dir.trim_end_matches('/')) {
            return Err(VfsError::already_exists(name.to_canonical_string()));
        }
        if !store.has_dir(parent_of(&dir)) {
            return Err(VfsError::not_found(name.to_canonical_string()));
        }
        trace!(target: "skein::mem", dir = %dir, "make_dir");
        store.dirs.insert(dir);
        Ok(())
    }

    fn make_dir_recursive(&self, name: &Name) -> VfsResult<()> {
        let dir = normalize_dir(&name.path());
        let mut store = self.store.write();
        let mut ancestor = dir.as_str();
        while !ancestor.is_empty() {
            if store.files.contains_key(ancestor.trim_end_matches('/')) {
                return Err(VfsError::not_a_directory(ancestor.to_string()));
            }
            ancestor = parent_of(ancestor);
        }
        if !dir.is_empty() {
            store.dirs.insert(dir);
        }
        Ok(())
    }

    fn remove(&self, name: &Name) -> VfsResult<()> {
        let key = Self::file_key(name);
        let mut store = self.store.write();
        if !name.is_dir_name() && store.files.remove(&key).is_some() {
            trace!(target: "skein::mem", key = %key, "Removed file");
            return Ok(());
        }

        let dir = normalize_dir(&key);
        if dir.is_empty() {
            return Err(VfsError::invalid_name(
                name.to_canonical_string(),
                "cannot remove the root directory",
            ));
        }
        if !store.has_dir(&dir) {
            return Err(VfsError::not_found(name.to_canonical_string()));
        }
        if store.has_children(&dir) {
            return Err(VfsError::directory_not_empty(name.to_canonical_string()));
        }
        store.dirs.remove(&dir);
        Ok(())
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        let key = Self::file_key(name);
        let store = self.store.read();
        match store.files.get(&key) {
            Some(data) if !name.is_dir_name() => Ok(data.clone()),
            _ if store.has_dir(&normalize_dir(&key)) => {
                Err(VfsError::is_a_directory(name.to_canonical_string()))
            }
            _ => Err(VfsError::not_found(name.to_canonical_string())),
        }
    }

    fn write_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        let key = Self::file_key(name);
        if name.is_dir_name() || key.is_empty() {
            return Err(VfsError::is_a_directory(name.to_canonical_string()));
        }
        let mut store = self.store.write();
        if store.has_dir(&normalize_dir(&key)) {
            return Err(VfsError::is_a_directory(name.to_canonical_string()));
        }
        if !overwrite && store.files.contains_key(&key) {
            return Err(VfsError::already_exists(name.to_canonical_string()));
        }
        trace!(target: "skein::mem", key = %key, bytes = content.len(), "write_file");
        store.files.insert(key, content.to_vec());
        Ok(())
    }

    fn dir(&self, name: &Name, flags: DirFlags) -> VfsResult<Vec<Name>> {
        let base = normalize_dir(&name.path());
        let store = self.store.read();
        if !store.has_dir(&base) {
            if store.files.contains_key(base.trim_end_matches('/')) {
                return Err(VfsError::not_a_directory(name.to_canonical_string()));
            }
            return Err(VfsError::not_found(name.to_canonical_string()));
        }

        let catalog = with_implicit_dirs(
            store
                .files
                .keys()
                .chain(store.dirs.iter())
                .map(String::as_str),
        );
        let mut names: Vec<Name> = filter_catalog(catalog.iter().map(String::as_str), &base, flags)
            .iter()
            .map(|path| Name::from_scheme_path(name.scheme(), path))
            .collect();
        names.sort();
        Ok(names)
    }
}
