//! Archive provider (`archive://`)
//!
//! Addresses entries of tar containers that live on any other scheme:
//! `archive://path/to/bundle.tar$docs/readme.txt`. Containers whose name
//! ends with one of the configured gzip suffixes are gzip-compressed.
//!
//! Every mutation rewrites the whole container (copy-on-write): the new
//! archive is staged next to a disk container, or in memory for any other
//! backend, and only replaces the original once it is complete. Links and
//! special entries are not addressable but survive rewrites untouched.

use crate::config;
use crate::error::{VfsError, VfsResult};
use crate::listing::{filter_catalog, normalize_dir, normalize_entry, parent_of, with_implicit_dirs};
use crate::name::{Name, CONTAINER_MARKER, DEFAULT_SCHEME};
use crate::provider::{DirFlags, FileProvider};
use crate::registry::Registry;
use crate::vfs::{Vfs, WeakVfs};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{EntryType, Header};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

pub const SCHEME: &str = "archive";

/// Register the archive provider with `registry`
pub fn register(registry: &Registry) -> bool {
    registry.register(SCHEME, |vfs: &Vfs| {
        Arc::new(ArchiveProvider::new(vfs)) as Arc<dyn FileProvider>
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    offset: usize,
    size: usize,
    kind: EntryKind,
    mode: u32,
    mtime: u64,
}

/// Link, device or fifo entry. Not addressable, but carried through
/// rewrites with its original header.
#[derive(Debug, Clone)]
struct Passthrough {
    path: String,
    header: Header,
    link: Option<String>,
    offset: usize,
    size: usize,
}

/// Decoded container: the raw tar bytes plus an index into them.
#[derive(Debug)]
struct Catalog {
    data: Vec<u8>,
    entries: BTreeMap<String, Span>,
    passthrough: Vec<Passthrough>,
    // Entry paths plus every implicit parent directory
    paths: BTreeSet<String>,
}

impl Catalog {
    fn parse(container: &Name, raw: Vec<u8>) -> VfsResult<Self> {
        let display = container.to_canonical_string();
        let data = if is_gzip(container) {
            let mut out = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| VfsError::corrupt(display.as_str(), e))?;
            out
        } else {
            raw
        };

        let mut entries = BTreeMap::new();
        let mut passthrough = Vec::new();
        {
            let mut archive = tar::Archive::new(data.as_slice());
            let iter = archive
                .entries()
                .map_err(|e| VfsError::corrupt(display.as_str(), e))?;
            for entry in iter {
                let entry = entry.map_err(|e| VfsError::corrupt(display.as_str(), e))?;
                let header = entry.header();
                let kind = match header.entry_type() {
                    t if t.is_dir() => Some(EntryKind::Dir),
                    t if t.is_file() => Some(EntryKind::File),
                    // Archive-wide metadata, regenerated by the writer
                    EntryType::XGlobalHeader => continue,
                    _ => None,
                };
                let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
                let path = match kind {
                    Some(EntryKind::Dir) => normalize_dir(&raw_path),
                    _ => normalize_entry(&raw_path).trim_end_matches('/').to_string(),
                };
                if path.is_empty() {
                    continue;
                }

                let offset = entry.raw_file_position() as usize;
                let size = entry.size() as usize;
                match offset.checked_add(size) {
                    Some(end) if end <= data.len() => {}
                    _ => {
                        return Err(VfsError::corrupt(display, format!("entry {} is truncated", path)))
                    }
                }
                let Some(kind) = kind else {
                    let link = entry
                        .link_name_bytes()
                        .map(|l| String::from_utf8_lossy(&l).into_owned());
                    passthrough.push(Passthrough {
                        path,
                        header: header.clone(),
                        link,
                        offset,
                        size,
                    });
                    continue;
                };
                entries.insert(
                    path,
                    Span {
                        offset,
                        size,
                        kind,
                        mode: header.mode().unwrap_or(0o644),
                        mtime: header.mtime().unwrap_or(0),
                    },
                );
            }
        }

        let paths = with_implicit_dirs(entries.keys().map(String::as_str));
        Ok(Self {
            data,
            entries,
            passthrough,
            paths,
        })
    }

    fn content(&self, span: &Span) -> &[u8] {
        &self.data[span.offset..span.offset + span.size]
    }

    fn raw(&self, entry: &Passthrough) -> &[u8] {
        &self.data[entry.offset..entry.offset + entry.size]
    }

    fn file(&self, key: &str) -> Option<&[u8]> {
        match self.entries.get(key) {
            Some(span) if span.kind == EntryKind::File => Some(self.content(span)),
            _ => None,
        }
    }

    fn has_dir(&self, dir: &str) -> bool {
        dir.is_empty() || self.paths.contains(dir)
    }

    fn has_children(&self, dir: &str) -> bool {
        self.paths.iter().any(|p| p != dir && p.starts_with(dir))
            || self.passthrough.iter().any(|e| e.path.starts_with(dir))
    }
}

/// A name split on its container marker
struct Location {
    outer: Name,
    // Outer path exactly as written, reused when building child names
    outer_raw: String,
    inner: String,
}

impl Location {
    fn file_key(&self) -> &str {
        self.inner.trim_end_matches('/')
    }

    fn dir_key(&self) -> String {
        normalize_dir(&self.inner)
    }
}

/// Edit applied while rewriting a container
enum Change<'a> {
    Put {
        path: String,
        kind: EntryKind,
        content: &'a [u8],
    },
    Remove {
        path: String,
        tree: bool,
    },
}

impl Change<'_> {
    fn replaces(&self, path: &str) -> bool {
        match self {
            Change::Put { path: p, .. } => p == path,
            Change::Remove { path: p, tree } => p == path || (*tree && path.starts_with(p.as_str())),
        }
    }
}

fn is_gzip(container: &Name) -> bool {
    config::config()
        .archive
        .gzip_suffixes
        .iter()
        .any(|suffix| container.filename().ends_with(suffix.as_str()))
}

fn locate(name: &Name) -> VfsResult<Location> {
    let (outer_raw, inner) = name.container_split().ok_or_else(|| {
        VfsError::invalid_name(
            name.to_canonical_string(),
            format!("expected '{}' between container and entry", CONTAINER_MARKER),
        )
    })?;
    if outer_raw.is_empty() {
        return Err(VfsError::invalid_name(name.to_canonical_string(), "empty container path"));
    }
    let outer = Name::parse(&outer_raw);
    if outer.scheme() == SCHEME {
        return Err(VfsError::invalid_name(
            name.to_canonical_string(),
            "archives cannot contain archive-scheme containers",
        ));
    }
    Ok(Location {
        outer,
        outer_raw,
        inner: normalize_entry(&inner),
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Contents of a rewritten container
#[derive(Default)]
struct Plan<'a> {
    entries: Vec<(&'a str, Span, &'a [u8])>,
    kept: Vec<(&'a Passthrough, &'a [u8])>,
}

impl Plan<'_> {
    fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.kept.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len() + self.kept.len()
    }
}

fn write_tar<W: Write>(out: W, plan: &Plan<'_>) -> io::Result<W> {
    let mut builder = tar::Builder::new(out);
    for (path, span, content) in &plan.entries {
        let mut header = Header::new_gnu();
        header.set_entry_type(match span.kind {
            EntryKind::File => EntryType::Regular,
            EntryKind::Dir => EntryType::Directory,
        });
        header.set_size(content.len() as u64);
        header.set_mode(span.mode);
        header.set_mtime(span.mtime);
        builder.append_data(&mut header, path, *content)?;
    }
    for (entry, content) in &plan.kept {
        let mut header = entry.header.clone();
        match &entry.link {
            Some(target) => {
                header.set_size(0);
                builder.append_link(&mut header, &entry.path, target)?;
            }
            None => {
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, &entry.path, *content)?;
            }
        }
    }
    builder.into_inner()
}

fn encode<W: Write>(out: W, gzip: bool, plan: &Plan<'_>) -> io::Result<W> {
    if gzip {
        write_tar(GzEncoder::new(out, Compression::default()), plan)?.finish()
    } else {
        write_tar(out, plan)
    }
}

/// Provider for entries inside tar containers.
///
/// Decoded containers are cached per outer name until the next mutation or
/// `flush`. A single lock serialises every operation of the provider.
pub struct ArchiveProvider {
    vfs: WeakVfs,
    catalogs: Mutex<HashMap<String, Arc<Catalog>>>,
}

impl std::fmt::Debug for ArchiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveProvider")
            .field("cached", &self.catalogs.try_lock().map(|c| c.len()))
            .finish()
    }
}

impl ArchiveProvider {
    pub fn new(vfs: &Vfs) -> Self {
        Self {
            vfs: vfs.downgrade(),
            catalogs: Mutex::new(HashMap::new()),
        }
    }

    fn catalog(
        &self,
        cache: &mut HashMap<String, Arc<Catalog>>,
        vfs: &Vfs,
        outer: &Name,
    ) -> VfsResult<Option<Arc<Catalog>>> {
        let key = outer.to_canonical_string();
        if let Some(catalog) = cache.get(&key) {
            return Ok(Some(Arc::clone(catalog)));
        }
        if !vfs.is_file(outer)? {
            return Ok(None);
        }
        let raw = vfs.load_file(outer)?;
        let catalog = Arc::new(Catalog::parse(outer, raw)?);
        debug!(target: "skein::archive", container = %key, entries = catalog.entries.len(), "Cached container catalog");
        cache.insert(key, Arc::clone(&catalog));
        Ok(Some(catalog))
    }

    /// Run a read-only query; resolution or decoding errors read as `default`.
    fn query<T>(
        &self,
        name: &Name,
        default: T,
        f: impl FnOnce(&Location, Option<&Catalog>) -> T,
    ) -> T {
        let result = (|| {
            let loc = locate(name)?;
            let vfs = self.vfs.upgrade()?;
            let mut cache = self.catalogs.lock();
            let catalog = self.catalog(&mut cache, &vfs, &loc.outer)?;
            Ok::<T, VfsError>(f(&loc, catalog.as_deref()))
        })();
        result.unwrap_or_else(|e| {
            warn!(target: "skein::archive", name = %name, error = %e, "Archive query failed");
            default
        })
    }

    /// Copy-on-write: build the edited container in a temporary file, then
    /// swap it in. The cached catalog is evicted first.
    fn rewrite(
        &self,
        cache: &mut HashMap<String, Arc<Catalog>>,
        vfs: &Vfs,
        outer: &Name,
        catalog: Option<&Catalog>,
        change: Change<'_>,
    ) -> VfsResult<()> {
        cache.remove(&outer.to_canonical_string());

        let mut plan = Plan::default();
        if let Some(catalog) = catalog {
            for (path, span) in &catalog.entries {
                if !change.replaces(path) {
                    plan.entries.push((path.as_str(), *span, catalog.content(span)));
                }
            }
            for entry in &catalog.passthrough {
                if !change.replaces(&entry.path) {
                    plan.kept.push((entry, catalog.raw(entry)));
                }
            }
        }
        if let Change::Put { path, kind, content } = &change {
            let span = Span {
                offset: 0,
                size: content.len(),
                kind: *kind,
                mode: if *kind == EntryKind::Dir { 0o755 } else { 0o644 },
                mtime: now_secs(),
            };
            plan.entries.push((path.as_str(), span, *content));
        }

        if plan.is_empty() {
            debug!(target: "skein::archive", container = %outer, "Container left empty, deleting it");
            if vfs.exists(outer)? {
                vfs.remove(outer, false)?;
            }
            return Ok(());
        }

        trace!(target: "skein::archive", container = %outer, entries = plan.len(), "Rewriting container");
        let gzip = is_gzip(outer);
        if outer.scheme() == DEFAULT_SCHEME || outer.scheme().is_empty() {
            self.commit_on_disk(outer, gzip, &plan)
        } else {
            self.commit_through_vfs(vfs, outer, gzip, &plan)
        }
    }

    fn commit_on_disk(&self, outer: &Name, gzip: bool, plan: &Plan<'_>) -> VfsResult<()> {
        let display = outer.to_canonical_string();
        let target = outer.path();
        let target = Path::new(&target);
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut staged =
            NamedTempFile::new_in(parent).map_err(|e| VfsError::from_io(e, &display))?;
        encode(staged.as_file_mut(), gzip, plan)?;
        // The staged file is created 0600; keep the container's own mode
        if let Some(meta) = fs::metadata(target).ok().filter(|m| m.is_file()) {
            staged
                .as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| VfsError::from_io(e, &display))?;
        }
        staged.as_file().sync_all()?;
        staged
            .persist(target)
            .map_err(|e| VfsError::from_io(e.error, &display))?;
        Ok(())
    }

    fn commit_through_vfs(
        &self,
        vfs: &Vfs,
        outer: &Name,
        gzip: bool,
        plan: &Plan<'_>,
    ) -> VfsResult<()> {
        let bytes = encode(Vec::new(), gzip, plan)?;
        vfs.save_file(outer, &bytes, true)
    }

    /// Lock, locate and load, then hand everything to `f`
    fn mutate(
        &self,
        name: &Name,
        f: impl FnOnce(&Self, &mut HashMap<String, Arc<Catalog>>, &Vfs, &Location, Option<&Catalog>) -> VfsResult<()>,
    ) -> VfsResult<()> {
        let loc = locate(name)?;
        let vfs = self.vfs.upgrade()?;
        let mut cache = self.catalogs.lock();
        let catalog = self.catalog(&mut cache, &vfs, &loc.outer)?;
        f(self, &mut cache, &vfs, &loc, catalog.as_deref())
    }

    fn child_name(name: &Name, loc: &Location, path: &str) -> Name {
        Name::from_scheme_path(
            name.scheme(),
            &format!("{}{}{}", loc.outer_raw, CONTAINER_MARKER, path),
        )
    }
}

impl FileProvider for ArchiveProvider {
    fn scheme_name(&self) -> &str {
        SCHEME
    }

    fn exists(&self, name: &Name) -> bool {
        self.query(name, false, |loc, catalog| match catalog {
            Some(c) => c.has_dir(&loc.dir_key()) || c.file(loc.file_key()).is_some(),
            None => false,
        })
    }

    fn is_file(&self, name: &Name) -> bool {
        !name.is_dir_name()
            && self.query(name, false, |loc, catalog| {
                catalog.is_some_and(|c| c.file(loc.file_key()).is_some())
            })
    }

    fn is_dir(&self, name: &Name) -> bool {
        self.query(name, false, |loc, catalog| {
            catalog.is_some_and(|c| c.has_dir(&loc.dir_key()))
        })
    }

    fn file_size(&self, name: &Name) -> u64 {
        self.query(name, 0, |loc, catalog| {
            catalog
                .and_then(|c| c.file(loc.file_key()))
                .map_or(0, |data| data.len() as u64)
        })
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        let loc = locate(name)?;
        let vfs = self.vfs.upgrade()?;
        let mut cache = self.catalogs.lock();
        let catalog = self
            .catalog(&mut cache, &vfs, &loc.outer)?
            .ok_or_else(|| VfsError::not_found(loc.outer.to_canonical_string()))?;
        if let Some(data) = catalog.file(loc.file_key()).filter(|_| !name.is_dir_name()) {
            trace!(target: "skein::archive", name = %name, bytes = data.len(), "read_file");
            return Ok(data.to_vec());
        }
        if catalog.has_dir(&loc.dir_key()) {
            return Err(VfsError::is_a_directory(name.to_canonical_string()));
        }
        Err(VfsError::not_found(name.to_canonical_string()))
    }

    fn write_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        self.mutate(name, |this, cache, vfs, loc, catalog| {
            let key = loc.file_key();
            if name.is_dir_name() || key.is_empty() {
                return Err(VfsError::is_a_directory(name.to_canonical_string()));
            }
            if let Some(c) = catalog {
                if c.has_dir(&loc.dir_key()) {
                    return Err(VfsError::is_a_directory(name.to_canonical_string()));
                }
                if !overwrite && c.file(key).is_some() {
                    return Err(VfsError::already_exists(name.to_canonical_string()));
                }
                let mut ancestor = parent_of(key);
                while !ancestor.is_empty() {
                    if c.file(ancestor.trim_end_matches('/')).is_some() {
                        return Err(VfsError::not_a_directory(ancestor.to_string()));
                    }
                    ancestor = parent_of(ancestor);
                }
            }
            this.rewrite(
                cache,
                vfs,
                &loc.outer,
                catalog,
                Change::Put {
                    path: key.to_string(),
                    kind: EntryKind::File,
                    content,
                },
            )
        })
    }

    fn make_dir(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |this, cache, vfs, loc, catalog| {
            let dir = loc.dir_key();
            let exists = catalog.is_some_and(|c| c.has_dir(&dir) || c.file(loc.file_key()).is_some());
            if exists {
                return Err(VfsError::already_exists(name.to_canonical_string()));
            }
            if dir.is_empty() {
                return Err(VfsError::invalid_name(
                    name.to_canonical_string(),
                    "the container root cannot be created as an entry",
                ));
            }
            let parent = parent_of(&dir);
            if !parent.is_empty() && !catalog.is_some_and(|c| c.has_dir(parent)) {
                return Err(VfsError::not_found(name.to_canonical_string()));
            }
            this.rewrite(
                cache,
                vfs,
                &loc.outer,
                catalog,
                Change::Put {
                    path: dir,
                    kind: EntryKind::Dir,
                    content: &[],
                },
            )
        })
    }

    fn make_dir_recursive(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |this, cache, vfs, loc, catalog| {
            let dir = loc.dir_key();
            if dir.is_empty() || catalog.is_some_and(|c| c.has_dir(&dir)) {
                return Ok(());
            }
            if let Some(c) = catalog {
                let mut ancestor = dir.as_str();
                while !ancestor.is_empty() {
                    if c.file(ancestor.trim_end_matches('/')).is_some() {
                        return Err(VfsError::not_a_directory(ancestor.to_string()));
                    }
                    ancestor = parent_of(ancestor);
                }
            }
            this.rewrite(
                cache,
                vfs,
                &loc.outer,
                catalog,
                Change::Put {
                    path: dir,
                    kind: EntryKind::Dir,
                    content: &[],
                },
            )
        })
    }

    fn remove(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |this, cache, vfs, loc, catalog| {
            let display = name.to_canonical_string();
            let Some(c) = catalog else {
                return Err(VfsError::not_found(display));
            };
            let key = loc.file_key();
            if !name.is_dir_name() && c.file(key).is_some() {
                let change = Change::Remove {
                    path: key.to_string(),
                    tree: false,
                };
                return this.rewrite(cache, vfs, &loc.outer, catalog, change);
            }

            let dir = loc.dir_key();
            if dir.is_empty() {
                return Err(VfsError::invalid_name(display, "cannot remove the container root"));
            }
            if !c.has_dir(&dir) {
                return Err(VfsError::not_found(display));
            }
            if c.has_children(&dir) {
                return Err(VfsError::directory_not_empty(display));
            }
            let change = Change::Remove {
                path: dir,
                tree: false,
            };
            this.rewrite(cache, vfs, &loc.outer, catalog, change)
        })
    }

    /// Drops a whole subtree with a single container rewrite.
    fn remove_recursive(&self, name: &Name) -> VfsResult<()> {
        self.mutate(name, |this, cache, vfs, loc, catalog| {
            let display = name.to_canonical_string();
            let Some(c) = catalog else {
                return Err(VfsError::not_found(display));
            };
            let dir = loc.dir_key();
            if !name.is_dir_name() && c.file(loc.file_key()).is_some() {
                let change = Change::Remove {
                    path: loc.file_key().to_string(),
                    tree: false,
                };
                return this.rewrite(cache, vfs, &loc.outer, catalog, change);
            }
            if dir.is_empty() {
                return Err(VfsError::invalid_name(display, "cannot remove the container root"));
            }
            if !c.has_dir(&dir) {
                return Err(VfsError::not_found(display));
            }
            let change = Change::Remove { path: dir, tree: true };
            this.rewrite(cache, vfs, &loc.outer, catalog, change)
        })
    }

    fn dir(&self, name: &Name, flags: DirFlags) -> VfsResult<Vec<Name>> {
        let loc = locate(name)?;
        let vfs = self.vfs.upgrade()?;
        let mut cache = self.catalogs.lock();
        let catalog = self
            .catalog(&mut cache, &vfs, &loc.outer)?
            .ok_or_else(|| VfsError::not_found(loc.outer.to_canonical_string()))?;

        let base = loc.dir_key();
        if !catalog.has_dir(&base) {
            if catalog.file(loc.file_key()).is_some() {
                return Err(VfsError::not_a_directory(name.to_canonical_string()));
            }
            return Err(VfsError::not_found(name.to_canonical_string()));
        }

        let mut names: Vec<Name> =
            filter_catalog(catalog.paths.iter().map(String::as_str), &base, flags)
                .iter()
                .map(|path| Self::child_name(name, &loc, path))
                .collect();
        names.sort();
        Ok(names)
    }

    fn flush(&self) -> VfsResult<()> {
        let mut cache = self.catalogs.lock();
        debug!(target: "skein::archive", dropped = cache.len(), "Dropping cached catalogs");
        cache.clear();
        Ok(())
    }
}
