//! Database provider (`dbfs://`)
//!
//! Stores files as BLOB rows of an SQLite database that itself lives on any
//! other scheme: `dbfs://path/to/store.db$folder/file.txt`.

use crate::config;
use crate::error::{VfsError, VfsResult};
use crate::listing::{filter_catalog, normalize_dir, normalize_entry, parent_of, with_implicit_dirs};
use crate::name::{Name, CONTAINER_MARKER, DEFAULT_SCHEME};
use crate::provider::{DirFlags, FileProvider};
use crate::registry::Registry;
use crate::temp::ScopedTempDir;
use crate::vfs::{Vfs, WeakVfs};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const SCHEME: &str = "dbfs";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS files (
    folder TEXT NOT NULL,
    name   TEXT NOT NULL,
    data   BLOB,
    PRIMARY KEY (folder, name)
)";

/// Register the database provider with `registry`
pub fn register(registry: &Registry) -> bool {
    registry.register(SCHEME, |vfs: &Vfs| {
        Arc::new(DatabaseProvider::new(vfs)) as Arc<dyn FileProvider>
    })
}

fn db_error(container: &str, err: rusqlite::Error) -> VfsError {
    let foreign = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::NotADatabase
    );
    if foreign {
        VfsError::corrupt(container, err)
    } else {
        VfsError::Database(format!("{}: {}", container, err))
    }
}

/// `folder/name` split of an inner path; the folder keeps its trailing `/`
fn split_entry(inner: &str) -> (String, String) {
    let inner = inner.trim_end_matches('/');
    let folder = parent_of(inner);
    (folder.to_string(), inner[folder.len()..].to_string())
}

/// One open database.
struct Store {
    // Declared first so the connection closes before the staging dir goes
    conn: Connection,
    outer: Name,
    display: String,
    path: PathBuf,
    staging: Option<ScopedTempDir>,
    in_transaction: bool,
    dirty: bool,
}

impl Store {
    fn open(vfs: &Vfs, outer: &Name) -> VfsResult<Self> {
        let label = outer.to_canonical_string();
        let (path, staging) = if outer.scheme() == DEFAULT_SCHEME || outer.scheme().is_empty() {
            (PathBuf::from(outer.path()), None)
        } else {
            let dir = ScopedTempDir::new()?;
            let path = dir.join("store.db");
            if vfs.is_file(outer)? {
                fs::write(&path, vfs.load_file(outer)?)?;
            }
            debug!(target: "skein::dbfs", store = %label, staged = %path.display(), "Staged database");
            (path, Some(dir))
        };

        let conn = Connection::open(&path).map_err(|e| db_error(&label, e))?;
        conn.busy_timeout(Duration::from_millis(config::config().database.busy_timeout_ms))
            .map_err(|e| db_error(&label, e))?;
        conn.execute_batch(SCHEMA).map_err(|e| db_error(&label, e))?;

        Ok(Self {
            conn,
            outer: outer.clone(),
            display: label,
            path,
            staging,
            in_transaction: false,
            dirty: false,
        })
    }

    fn err(&self, e: rusqlite::Error) -> VfsError {
        db_error(&self.display, e)
    }

    /// Writes stay in an open transaction until the next flush
    fn begin(&mut self) -> VfsResult<()> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN").map_err(|e| self.err(e))?;
            self.in_transaction = true;
        }
        self.dirty = true;
        Ok(())
    }

    fn commit(&mut self, vfs: &Vfs) -> VfsResult<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT").map_err(|e| self.err(e))?;
            self.in_transaction = false;
            trace!(target: "skein::dbfs", store = %self.display, "Committed");
        }
        if self.staging.is_some() && self.dirty {
            let bytes = fs::read(&self.path)?;
            vfs.save_file(&self.outer, &bytes, true)?;
            debug!(target: "skein::dbfs", store = %self.display, bytes = bytes.len(), "Uploaded staged database");
        }
        self.dirty = false;
        Ok(())
    }

    fn file(&self, folder: &str, name: &str) -> VfsResult<Option<Vec<u8>>> {
        if name.is_empty() {
            return Ok(None);
        }
        self.conn
            .query_row(
                "SELECT data FROM files WHERE folder = ?1 AND name = ?2",
                params![folder, name],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()
            .map(|found| found.map(Option::unwrap_or_default))
            .map_err(|e| self.err(e))
    }

    /// First path at or above `start` that is stored as a file
    fn file_ancestor(&self, start: &str) -> VfsResult<Option<String>> {
        let mut ancestor = start;
        while !ancestor.is_empty() {
            let (folder, file) = split_entry(ancestor);
            if self.file_size(&folder, &file)?.is_some() {
                return Ok(Some(ancestor.trim_end_matches('/').to_string()));
            }
            ancestor = parent_of(ancestor);
        }
        Ok(None)
    }

    fn file_size(&self, folder: &str, name: &str) -> VfsResult<Option<u64>> {
        if name.is_empty() {
            return Ok(None);
        }
        self.conn
            .query_row(
                "SELECT length(data) FROM files WHERE folder = ?1 AND name = ?2",
                params![folder, name],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()
            .map(|found| found.map(|len| len.unwrap_or(0).max(0) as u64))
            .map_err(|e| self.err(e))
    }

    /// Explicit marker row or any row below `dir`
    fn has_dir(&self, dir: &str) -> VfsResult<bool> {
        if dir.is_empty() {
            return Ok(true);
        }
        self.conn
            .query_row(
                "SELECT 1 FROM files WHERE substr(folder, 1, length(?1)) = ?1 LIMIT 1",
                params![dir],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| self.err(e))
    }

    fn has_children(&self, dir: &str) -> VfsResult<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM files
                 WHERE substr(folder, 1, length(?1)) = ?1 AND NOT (folder = ?1 AND name = '')
                 LIMIT 1",
                params![dir],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| self.err(e))
    }

    fn put(&mut self, folder: &str, name: &str, data: &[u8]) -> VfsResult<()> {
        self.begin()?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO files (folder, name, data) VALUES (?1, ?2, ?3)",
                params![folder, name, data],
            )
            .map_err(|e| self.err(e))?;
        Ok(())
    }

    fn delete(&mut self, folder: &str, name: &str) -> VfsResult<usize> {
        self.begin()?;
        self.conn
            .execute(
                "DELETE FROM files WHERE folder = ?1 AND name = ?2",
                params![folder, name],
            )
            .map_err(|e| self.err(e))
    }

    fn all_paths(&self) -> VfsResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT folder, name FROM files")
            .map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(format!("{}{}", row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| self.err(e))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| self.err(e))
    }
}

struct Location {
    outer: Name,
    outer_raw: String,
    inner: String,
}

fn locate(name: &Name) -> VfsResult<Location> {
    let (outer_raw, inner) = name.container_split().ok_or_else(|| {
        VfsError::invalid_name(
            name.to_canonical_string(),
            format!("expected '{}' after the database path", CONTAINER_MARKER),
        )
    })?;
    let outer = Name::parse(&outer_raw);
    if outer_raw.is_empty() || outer.scheme() == SCHEME {
        return Err(VfsError::invalid_name(
            name.to_canonical_string(),
            "the database must live on another scheme",
        ));
    }
    Ok(Location {
        outer,
        outer_raw,
        inner: normalize_entry(&inner),
    })
}

/// Provider for files stored in SQLite databases.
///
/// Each database is opened once and kept with its own lock; the handle map
/// has a separate lock. Writes accumulate in an open transaction and become
/// durable on `flush`. Databases living on a non-disk scheme are staged into
/// a temporary directory and uploaded again on `flush`.
pub struct DatabaseProvider {
    vfs: WeakVfs,
    stores: Mutex<HashMap<String, Arc<Mutex<Store>>>>,
}

impl std::fmt::Debug for DatabaseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseProvider")
            .field("open", &self.stores.try_lock().map(|s| s.len()))
            .finish()
    }
}

impl DatabaseProvider {
    pub fn new(vfs: &Vfs) -> Self {
        Self {
            vfs: vfs.downgrade(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for a database; `None` when it does not exist and `create` is
    /// false.
    fn store(&self, vfs: &Vfs, outer: &Name, create: bool) -> VfsResult<Option<Arc<Mutex<Store>>>> {
        let key = outer.to_canonical_string();
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&key) {
            return Ok(Some(Arc::clone(store)));
        }
        if !create && !vfs.is_file(outer)? {
            return Ok(None);
        }
        let store = Arc::new(Mutex::new(Store::open(vfs, outer)?));
        debug!(target: "skein::dbfs", store = %key, "Opened database");
        stores.insert(key, Arc::clone(&store));
        Ok(Some(store))
    }

    fn query<T>(
        &self,
        name: &Name,
        default: T,
        f: impl FnOnce(&Location, &Store) -> VfsResult<T>,
    ) -> T {
        let result = (|| {
            let loc = locate(name)?;
            let vfs = self.vfs.upgrade()?;
            match self.store(&vfs, &loc.outer, false)? {
                Some(store) => f(&loc, &store.lock()).map(Some),
                None => Ok(None),
            }
        })();
        match result {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!(target: "skein::dbfs", name = %name, error = %e, "Database query failed");
                default
            }
        }
    }

    fn mutate<T>(
        &self,
        name: &Name,
        f: impl FnOnce(&Location, &mut Store) -> VfsResult<T>,
    ) -> VfsResult<T> {
        let loc = locate(name)?;
        let vfs = self.vfs.upgrade()?;
        let store = self
            .store(&vfs, &loc.outer, true)?
            .ok_or_else(|| VfsError::not_found(loc.outer.to_canonical_string()))?;
        let mut store = store.lock();
        f(&loc, &mut store)
    }
}

impl FileProvider for DatabaseProvider {
    fn scheme_name(&self) -> &str {
        SCHEME
    }

    fn exists(&self, name: &Name) -> bool {
        self.query(name, false, |loc, store| {
            let (folder, file) = split_entry(&loc.inner);
            Ok(store.file_size(&folder, &file)?.is_some() || store.has_dir(&normalize_dir(&loc.inner))?)
        })
    }

    fn is_file(&self, name: &Name) -> bool {
        !name.is_dir_name()
            && self.query(name, false, |loc, store| {
                let (folder, file) = split_entry(&loc.inner);
                Ok(store.file_size(&folder, &file)?.is_some())
            })
    }

    fn is_dir(&self, name: &Name) -> bool {
        self.query(name, false, |loc, store| store.has_dir(&normalize_dir(&loc.inner)))
    }

    fn file_size(&self, name: &Name) -> u64 {
        self.query(name, 0, |loc, store| {
            let (folder, file) = split_entry(&loc.inner);
            Ok(store.file_size(&folder, &file)?.unwrap_or(0))
        })
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        let loc = locate(name)?;
        let vfs = self.vfs.upgrade()?;
        let store = self
            .store(&vfs, &loc.outer, false)?
            .ok_or_else(|| VfsError::not_found(loc.outer.to_canonical_string()))?;
        let store = store.lock();
        let (folder, file) = split_entry(&loc.inner);
        if !name.is_dir_name() {
            if let Some(data) = store.file(&folder, &file)? {
                trace!(target: "skein::dbfs", name = %name, bytes = data.len(), "read_file");
                return Ok(data);
            }
        }
        if store.has_dir(&normalize_dir(&loc.inner))? {
            return Err(VfsError::is_a_directory(name.to_canonical_string()));
        }
        Err(VfsError::not_found(name.to_canonical_string()))
    }

    fn write_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        self.mutate(name, |loc, store| {
            let display = name.to_canonical_string();
            let (folder, file) = split_entry(&loc.inner);
            if name.is_dir_name() || file.is_empty() {
                return Err(VfsError::is_a_directory(display));
            }
            if store.has_dir(&normalize_dir(&loc.inner))? {
                return Err(VfsError::is_a_directory(display));
            }
            if let Some(ancestor) = store.file_ancestor(&folder)? {
                return Err(VfsError::not_a_directory(ancestor));
            }
            if !overwrite && store.file_size(&folder, &file)?.is_some() {
                return Err(VfsError::already_exists(display));
            }
            trace!(target: "skein::dbfs", name = %name, bytes = content.len(), "write_file");
            store.put(&folder, &file, content)
        })
    }

    fn make_dir(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |loc, store| {
            let display = name.to_canonical_string();
            let dir = normalize_dir(&loc.inner);
            if dir.is_empty() {
                return Err(VfsError::already_exists(display));
            }
            let (folder, file) = split_entry(&loc.inner);
            if store.has_dir(&dir)? || store.file_size(&folder, &file)?.is_some() {
                return Err(VfsError::already_exists(display));
            }
            if let Some(ancestor) = store.file_ancestor(parent_of(&dir))? {
                return Err(VfsError::not_a_directory(ancestor));
            }
            if !store.has_dir(parent_of(&dir))? {
                return Err(VfsError::not_found(display));
            }
            store.put(&dir, "", &[])
        })
    }

    fn make_dir_recursive(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |loc, store| {
            let dir = normalize_dir(&loc.inner);
            if store.has_dir(&dir)? {
                return Ok(());
            }
            if let Some(ancestor) = store.file_ancestor(&dir)? {
                return Err(VfsError::not_a_directory(ancestor));
            }
            store.put(&dir, "", &[])
        })
    }

    fn remove(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |loc, store| {
            let display = name.to_canonical_string();
            let (folder, file) = split_entry(&loc.inner);
            if !name.is_dir_name() && store.file_size(&folder, &file)?.is_some() {
                store.delete(&folder, &file)?;
                return Ok(());
            }

            let dir = normalize_dir(&loc.inner);
            if dir.is_empty() {
                return Err(VfsError::invalid_name(display, "cannot remove the database root"));
            }
            if !store.has_dir(&dir)? {
                return Err(VfsError::not_found(display));
            }
            if store.has_children(&dir)? {
                return Err(VfsError::directory_not_empty(display));
            }
            store.delete(&dir, "")?;
            Ok(())
        })
    }

    fn dir(&self, name: &Name, flags: DirFlags) -> VfsResult<Vec<Name>> {
        let loc = locate(name)?;
        let vfs = self.vfs.upgrade()?;
        let store = self
            .store(&vfs, &loc.outer, false)?
            .ok_or_else(|| VfsError::not_found(loc.outer.to_canonical_string()))?;
        let store = store.lock();

        let base = normalize_dir(&loc.inner);
        if !store.has_dir(&base)? {
            let (folder, file) = split_entry(&loc.inner);
            if store.file_size(&folder, &file)?.is_some() {
                return Err(VfsError::not_a_directory(name.to_canonical_string()));
            }
            return Err(VfsError::not_found(name.to_canonical_string()));
        }

        let paths = store.all_paths()?;
        let catalog = with_implicit_dirs(paths.iter().map(String::as_str));
        let mut names: Vec<Name> = filter_catalog(catalog.iter().map(String::as_str), &base, flags)
            .iter()
            .map(|path| {
                Name::from_scheme_path(
                    name.scheme(),
                    &format!("{}{}{}", loc.outer_raw, CONTAINER_MARKER, path),
                )
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Commit every open database and upload the staged ones.
    fn flush(&self) -> VfsResult<()> {
        let vfs = self.vfs.upgrade()?;
        let stores: Vec<(String, Arc<Mutex<Store>>)> = self
            .stores
            .lock()
            .iter()
            .map(|(key, store)| (key.clone(), Arc::clone(store)))
            .collect();

        let mut first_error = None;
        for (key, store) in stores {
            if let Err(e) = store.lock().commit(&vfs) {
                warn!(target: "skein::dbfs", store = %key, error = %e, "Flush failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
