//! Disk provider (`file://`)

use crate::error::{VfsError, VfsResult};
use crate::listing::is_hidden;
use crate::name::Name;
use crate::provider::{DirFlags, FileProvider, OpenMode};
use crate::registry::Registry;
use crate::stream::{Stream, VfsStream};
use crate::vfs::Vfs;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

pub const SCHEME: &str = "file";

/// Register the disk provider with `registry`
pub fn register(registry: &Registry) -> bool {
    registry.register(SCHEME, |_: &Vfs| {
        Arc::new(DiskProvider::new()) as Arc<dyn FileProvider>
    })
}

/// Native OS file system provider.
///
/// Wraps `std::fs`. Relative names resolve against the process working
/// directory, or against a base directory when built with
/// [`DiskProvider::with_base`].
///
/// # Example
/// ```
/// use skein_vfs::{DiskProvider, FileProvider, Name};
///
/// let disk = DiskProvider::new();
/// assert!(disk.is_dir(&Name::parse("/")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiskProvider {
    base: Option<PathBuf>,
}

impl DiskProvider {
    pub fn new() -> Self {
        Self { base: None }
    }

    /// Resolve relative names against `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn path_of(&self, name: &Name) -> PathBuf {
        let path = name.path();
        let path = if path.is_empty() { "." } else { path.as_str() };
        match &self.base {
            Some(base) if Path::new(path).is_relative() => base.join(path),
            _ => PathBuf::from(path),
        }
    }

    /// Path of the entry itself: no trailing `/`, so a symlink is not
    /// resolved to its target by `symlink_metadata`.
    fn entry_path(&self, name: &Name) -> PathBuf {
        let path = self.path_of(name);
        let text = path.to_string_lossy();
        let trimmed = text.trim_end_matches('/');
        if trimmed.len() == text.len() || trimmed.is_empty() {
            return path;
        }
        PathBuf::from(trimmed)
    }

    fn list_into(
        &self,
        dir: &Path,
        scheme: &str,
        prefix: &str,
        flags: DirFlags,
        out: &mut Vec<Name>,
    ) -> VfsResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| VfsError::from_io(e, &dir.to_string_lossy()))?;
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name == "." || file_name == ".." {
                continue;
            }
            if is_hidden(&file_name) && !flags.contains(DirFlags::HIDDEN_FILES) {
                continue;
            }

            // A link to a directory lists as a directory but is never
            // descended into, so link loops cannot break a listing
            let is_link = entry.file_type()?.is_symlink();
            let is_dir = entry.path().is_dir();
            if is_dir {
                let child = format!("{}{}/", prefix, file_name);
                if flags.contains(DirFlags::DIRECTORIES) {
                    out.push(Name::from_scheme_path(scheme, &child));
                }
                if flags.contains(DirFlags::RECURSIVE) && !is_link {
                    self.list_into(&entry.path(), scheme, &child, flags, out)?;
                }
            } else if flags.contains(DirFlags::FILES) {
                out.push(Name::from_scheme_path(scheme, &format!("{}{}", prefix, file_name)));
            }
        }
        Ok(())
    }
}

impl VfsStream for File {
    fn close(self: Box<Self>) -> VfsResult<()> {
        Ok(())
    }
}

impl FileProvider for DiskProvider {
    fn scheme_name(&self) -> &str {
        SCHEME
    }

    fn exists(&self, name: &Name) -> bool {
        self.path_of(name).exists()
    }

    fn is_file(&self, name: &Name) -> bool {
        self.path_of(name).is_file()
    }

    fn is_dir(&self, name: &Name) -> bool {
        self.path_of(name).is_dir()
    }

    fn file_size(&self, name: &Name) -> u64 {
        fs::metadata(self.path_of(name))
            .ok()
            .filter(|m| m.is_file())
            .map_or(0, |m| m.len())
    }

    fn make_dir(&self, name: &Name) -> VfsResult<()> {
        trace!(target: "skein::disk", name = %name, "make_dir");
        fs::create_dir(self.path_of(name))
            .map_err(|e| VfsError::from_io(e, &name.to_canonical_string()))
    }

    fn make_dir_recursive(&self, name: &Name) -> VfsResult<()> {
        if self.is_dir(name) {
            return Ok(());
        }
        if let Some(parent) = name.parent() {
            if !parent.path().is_empty() && !self.is_dir(&parent) {
                self.make_dir_recursive(&parent)?;
            }
        }
        match self.make_dir(name) {
            Err(VfsError::AlreadyExists(_)) if self.is_dir(name) => Ok(()),
            result => result,
        }
    }

    fn remove(&self, name: &Name) -> VfsResult<()> {
        let path = self.entry_path(name);
        let display = name.to_canonical_string();
        let meta = fs::symlink_metadata(&path).map_err(|e| VfsError::from_io(e, &display))?;
        trace!(target: "skein::disk", name = %name, "remove");
        if meta.is_dir() {
            let mut children = fs::read_dir(&path).map_err(|e| VfsError::from_io(e, &display))?;
            if children.next().is_some() {
                return Err(VfsError::directory_not_empty(display));
            }
            fs::remove_dir(&path).map_err(|e| VfsError::from_io(e, &display))
        } else {
            fs::remove_file(&path).map_err(|e| VfsError::from_io(e, &display))
        }
    }

    /// Remove a tree without following symlinks: a link is unlinked, its
    /// target is left alone.
    fn remove_recursive(&self, name: &Name) -> VfsResult<()> {
        let path = self.entry_path(name);
        let display = name.to_canonical_string();
        let meta = fs::symlink_metadata(&path).map_err(|e| VfsError::from_io(e, &display))?;
        trace!(target: "skein::disk", name = %name, "remove_recursive");
        if meta.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .map_err(|e| VfsError::from_io(e, &display))
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        let path = self.path_of(name);
        if path.is_dir() {
            return Err(VfsError::is_a_directory(name.to_canonical_string()));
        }
        fs::read(&path).map_err(|e| VfsError::from_io(e, &name.to_canonical_string()))
    }

    fn write_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        let path = self.path_of(name);
        let display = name.to_canonical_string();
        if name.is_dir_name() || path.is_dir() {
            return Err(VfsError::is_a_directory(display));
        }
        trace!(target: "skein::disk", name = %name, bytes = content.len(), overwrite, "write_file");
        if overwrite {
            return fs::write(&path, content).map_err(|e| VfsError::from_io(e, &display));
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| VfsError::from_io(e, &display))?;
        file.write_all(content)?;
        Ok(())
    }

    fn dir(&self, name: &Name, flags: DirFlags) -> VfsResult<Vec<Name>> {
        let path = self.path_of(name);
        if !path.is_dir() {
            if path.exists() {
                return Err(VfsError::not_a_directory(name.to_canonical_string()));
            }
            return Err(VfsError::not_found(name.to_canonical_string()));
        }

        let mut prefix = name.path();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        let mut out = Vec::new();
        self.list_into(&path, name.scheme(), &prefix, flags, &mut out)?;
        out.sort();
        Ok(out)
    }

    fn open(&self, name: &Name, mode: OpenMode) -> VfsResult<Stream> {
        let path = self.path_of(name);
        let display = name.to_canonical_string();
        if path.is_dir() {
            return Err(VfsError::is_a_directory(display));
        }
        let file = match mode {
            OpenMode::Read => File::open(&path),
            OpenMode::Write => File::create(&path),
            OpenMode::Append => OpenOptions::new().append(true).create(true).open(&path),
        }
        .map_err(|e| VfsError::from_io(e, &display))?;
        trace!(target: "skein::disk", name = %name, ?mode, "Opened native stream");
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::TempDir;

    fn name_in(dir: &TempDir, rel: &str) -> Name {
        Name::parse(&format!("{}/{}", dir.path().to_string_lossy(), rel))
    }

    #[test]
    fn test_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let name = name_in(&tmp, "exists.txt");
        assert!(!disk.exists(&name));
        fs::write(tmp.path().join("exists.txt"), b"test").unwrap();
        assert!(disk.exists(&name));
        assert!(disk.is_file(&name));
        assert_eq!(disk.file_size(&name), 4);
    }

    #[test]
    fn test_read_write() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let name = name_in(&tmp, "rw.txt");
        disk.write_file(&name, b"hello native", true).unwrap();
        assert_eq!(disk.read_file(&name).unwrap(), b"hello native");

        disk.write_file(&name, b"", true).unwrap();
        assert!(disk.read_file(&name).unwrap().is_empty());
    }

    #[test]
    fn test_binary_data() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let name = name_in(&tmp, "binary");
        let binary: Vec<u8> = (0..=255).collect();
        disk.write_file(&name, &binary, true).unwrap();
        assert_eq!(disk.read_file(&name).unwrap(), binary);
    }

    #[test]
    fn test_overwrite_guard() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let name = name_in(&tmp, "guard.txt");
        disk.write_file(&name, b"first", false).unwrap();
        let err = disk.write_file(&name, b"second", false).unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));
        assert_eq!(disk.read_file(&name).unwrap(), b"first");
    }

    #[test]
    fn test_is_file_and_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        fs::write(tmp.path().join("f"), b"x").unwrap();
        fs::create_dir(tmp.path().join("d")).unwrap();

        assert!(disk.is_file(&name_in(&tmp, "f")));
        assert!(!disk.is_dir(&name_in(&tmp, "f")));
        assert!(disk.is_dir(&name_in(&tmp, "d/")));
        assert!(!disk.is_file(&name_in(&tmp, "d")));
        assert!(disk.read_file(&name_in(&tmp, "d")).is_err());
    }

    #[test]
    fn test_nonexistent() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let name = name_in(&tmp, "nonexistent");
        assert!(!disk.exists(&name));
        assert_eq!(disk.file_size(&name), 0);
        assert!(disk.read_file(&name).unwrap_err().is_not_found());
    }

    #[test]
    fn test_make_dir_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let deep = name_in(&tmp, "a/b/c/");
        assert!(disk.make_dir(&deep).unwrap_err().is_not_found());
        disk.make_dir_recursive(&deep).unwrap();
        assert!(tmp.path().join("a/b/c").is_dir());
        disk.make_dir_recursive(&deep).unwrap();
    }

    #[test]
    fn test_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        disk.make_dir_recursive(&name_in(&tmp, "x/y/")).unwrap();
        disk.write_file(&name_in(&tmp, "x/y/f.txt"), b"f", true).unwrap();

        let err = disk.remove(&name_in(&tmp, "x/")).unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));

        disk.remove_recursive(&name_in(&tmp, "x/")).unwrap();
        assert!(!tmp.path().join("x").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_recursive_keeps_symlink_targets() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        fs::create_dir_all(tmp.path().join("outside")).unwrap();
        fs::write(tmp.path().join("outside/precious.txt"), b"keep").unwrap();
        fs::create_dir_all(tmp.path().join("tree/sub")).unwrap();
        fs::write(tmp.path().join("tree/sub/f.txt"), b"f").unwrap();
        std::os::unix::fs::symlink("../outside", tmp.path().join("tree/link")).unwrap();
        std::os::unix::fs::symlink("../outside/precious.txt", tmp.path().join("tree/file-link"))
            .unwrap();

        disk.remove_recursive(&name_in(&tmp, "tree/")).unwrap();
        assert!(!tmp.path().join("tree").exists());
        assert_eq!(fs::read(tmp.path().join("outside/precious.txt")).unwrap(), b"keep");
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_symlink_to_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        fs::create_dir_all(tmp.path().join("target")).unwrap();
        fs::write(tmp.path().join("target/x.txt"), b"x").unwrap();
        std::os::unix::fs::symlink("target", tmp.path().join("link")).unwrap();

        // The directory-style name must still unlink the link itself
        disk.remove(&name_in(&tmp, "link/")).unwrap();
        assert!(fs::symlink_metadata(tmp.path().join("link")).is_err());
        assert!(tmp.path().join("target/x.txt").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_survives_link_loops() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        fs::create_dir_all(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("a/f.txt"), b"f").unwrap();
        std::os::unix::fs::symlink("..", tmp.path().join("a/up")).unwrap();

        let listed = disk
            .dir(&name_in(&tmp, "a/"), DirFlags::FILES | DirFlags::DIRECTORIES | DirFlags::RECURSIVE)
            .unwrap();
        let entries: Vec<&str> = listed.iter().map(|n| n.entry_name()).collect();
        assert_eq!(entries, vec!["f.txt", "up"]);
    }

    #[test]
    fn test_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        for rel in ["a.txt", ".hidden", "d/b.txt", "d/e/c.txt", "d/.h/x.txt"] {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel.as_bytes()).unwrap();
        }
        let root = name_in(&tmp, "");

        let shallow = disk.dir(&root, DirFlags::default()).unwrap();
        let entries: Vec<&str> = shallow.iter().map(|n| n.entry_name()).collect();
        assert_eq!(entries, vec!["a.txt", "d"]);
        assert!(shallow[1].is_dir_name());

        let deep = disk.dir(&root, DirFlags::FILES | DirFlags::RECURSIVE).unwrap();
        assert_eq!(deep.len(), 3);

        let all = disk
            .dir(&root, DirFlags::FILES | DirFlags::RECURSIVE | DirFlags::HIDDEN_FILES)
            .unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|n| n.starts_with(&root)));

        assert!(matches!(
            disk.dir(&name_in(&tmp, "a.txt"), DirFlags::default()).unwrap_err(),
            VfsError::NotADirectory(_)
        ));
    }

    #[test]
    fn test_native_streams() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::new();
        let name = name_in(&tmp, "stream.txt");

        let mut w = disk.open_for_writing(&name).unwrap();
        w.write_all(b"hello").unwrap();
        w.close().unwrap();

        let mut a = disk.open_for_appending(&name).unwrap();
        a.write_all(b" world").unwrap();
        drop(a);

        let mut r = disk.open_for_reading(&name).unwrap();
        r.seek(SeekFrom::Start(6)).unwrap();
        let mut out = String::new();
        r.read_to_string(&mut out).unwrap();
        assert_eq!(out, "world");
    }

    #[test]
    fn test_with_base() {
        let tmp = tempfile::tempdir().unwrap();
        let disk = DiskProvider::with_base(tmp.path());
        let name = Name::parse("relative/file.txt");
        disk.make_dir_recursive(&name.parent().unwrap()).unwrap();
        disk.write_file(&name, b"based", true).unwrap();
        assert_eq!(fs::read(tmp.path().join("relative/file.txt")).unwrap(), b"based");
    }
}
