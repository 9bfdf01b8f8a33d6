//! Archive provider behavior through the facade

#![cfg(feature = "archive")]

mod common;

use common::{inner_paths, payload, Sandbox};
use skein_vfs::{DirFlags, FileProvider, MemoryProvider, Name, Vfs, VfsError, VfsResult};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Entry paths as stored in a tar container on disk
fn tar_entries(path: &std::path::Path) -> BTreeSet<String> {
    let raw = std::fs::read(path).unwrap();
    let mut archive = tar::Archive::new(raw.as_slice());
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            path.trim_end_matches('/').to_string()
        })
        .collect()
}

#[test]
fn test_save_load_remove_scenario() {
    let sb = Sandbox::new();
    let entry = sb.archive("a.zip", "foo.txt");

    sb.vfs.save_file(&entry, b"hello", true).unwrap();
    assert_eq!(sb.vfs.load_file(&entry).unwrap(), b"hello");
    assert!(sb.vfs.is_dir(&sb.archive("a.zip", "")).unwrap());

    // A sibling keeps the container alive after the removal
    sb.vfs.save_file(&sb.archive("a.zip", "bar.txt"), b"bar", true).unwrap();
    sb.vfs.remove(&entry, false).unwrap();
    assert!(!sb.vfs.is_file(&entry).unwrap());
    assert!(sb.vfs.is_dir(&sb.archive("a.zip", "")).unwrap());
}

#[test]
fn test_removing_last_entry_deletes_container() {
    let sb = Sandbox::new();
    let entry = sb.archive("only.tar", "solo.txt");
    sb.vfs.save_file(&entry, b"solo", true).unwrap();
    assert!(sb.dir.path().join("only.tar").is_file());

    sb.vfs.remove(&entry, false).unwrap();
    assert!(!sb.vfs.is_file(&entry).unwrap());
    assert!(!sb.dir.path().join("only.tar").exists());
}

#[test]
fn test_copy_on_write_keeps_other_entries() {
    let sb = Sandbox::new();
    let container = sb.dir.path().join("cow.tar");
    for i in 0..5 {
        let entry = sb.archive("cow.tar", &format!("dir{}/file{}.txt", i % 2, i));
        sb.vfs.save_file(&entry, format!("content {}", i).as_bytes(), true).unwrap();
    }
    let before = tar_entries(&container);
    assert_eq!(before.len(), 5);

    // Add one entry
    sb.vfs.save_file(&sb.archive("cow.tar", "extra.bin"), &payload(4096), true).unwrap();
    let mut expected = before.clone();
    expected.insert("extra.bin".to_string());
    assert_eq!(tar_entries(&container), expected);

    // Replace one entry
    sb.vfs.save_file(&sb.archive("cow.tar", "dir0/file2.txt"), b"replaced", true).unwrap();
    assert_eq!(tar_entries(&container), expected);
    assert_eq!(sb.vfs.load_file(&sb.archive("cow.tar", "dir0/file2.txt")).unwrap(), b"replaced");

    // Remove one entry
    sb.vfs.remove(&sb.archive("cow.tar", "dir1/file1.txt"), false).unwrap();
    expected.remove("dir1/file1.txt");
    assert_eq!(tar_entries(&container), expected);

    for i in [0usize, 3, 4] {
        let entry = sb.archive("cow.tar", &format!("dir{}/file{}.txt", i % 2, i));
        assert_eq!(sb.vfs.load_file(&entry).unwrap(), format!("content {}", i).as_bytes());
    }
}

#[test]
fn test_failed_write_leaves_container_untouched() {
    let sb = Sandbox::new();
    let entry = sb.archive("keep.tar", "a.txt");
    sb.vfs.save_file(&entry, b"original", true).unwrap();
    let container = sb.dir.path().join("keep.tar");
    let before = std::fs::read(&container).unwrap();

    let err = sb.vfs.save_file(&entry, b"clobbered", false).unwrap_err();
    assert!(matches!(err, VfsError::AlreadyExists(_)));
    assert_eq!(std::fs::read(&container).unwrap(), before);

    let leftovers: Vec<_> = std::fs::read_dir(sb.dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "staging files left behind: {:?}", leftovers);
}

#[test]
fn test_failed_swap_leaves_no_staging_file() {
    let sb = Sandbox::new();
    // A directory squats on the container path, so the final rename fails
    let blocked = sb.dir.path().join("blocked.tar");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep.txt"), b"keep").unwrap();

    assert!(sb.vfs.save_file(&sb.archive("blocked.tar", "a.txt"), b"data", true).is_err());
    assert_eq!(std::fs::read(blocked.join("keep.txt")).unwrap(), b"keep");

    let leftovers: Vec<_> = std::fs::read_dir(sb.dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "staging files left behind: {:?}", leftovers);
}

/// In-memory backend that starts rejecting writes once frozen
struct Brittle {
    inner: MemoryProvider,
    frozen: Arc<AtomicBool>,
}

impl FileProvider for Brittle {
    fn scheme_name(&self) -> &str {
        "brittle"
    }

    fn exists(&self, name: &Name) -> bool {
        self.inner.exists(name)
    }

    fn is_file(&self, name: &Name) -> bool {
        self.inner.is_file(name)
    }

    fn is_dir(&self, name: &Name) -> bool {
        self.inner.is_dir(name)
    }

    fn file_size(&self, name: &Name) -> u64 {
        self.inner.file_size(name)
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        self.inner.read_file(name)
    }

    fn write_file(&self, name: &Name, content: &[u8], overwrite: bool) -> VfsResult<()> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(VfsError::PermissionDenied(name.to_canonical_string()));
        }
        self.inner.write_file(name, content, overwrite)
    }
}

#[test]
fn test_rejected_upload_keeps_container_bytes() {
    let sb = Sandbox::new();
    let mem = MemoryProvider::new();
    let frozen = Arc::new(AtomicBool::new(false));
    {
        let mem = mem.clone();
        let frozen = Arc::clone(&frozen);
        assert!(sb.vfs.registry().register("brittle", move |_: &Vfs| {
            Arc::new(Brittle {
                inner: mem.clone(),
                frozen: Arc::clone(&frozen),
            }) as Arc<dyn FileProvider>
        }));
    }

    let outer = Name::parse("brittle://pack.tar");
    let first = Name::parse("archive://brittle://pack.tar$a.txt");
    sb.vfs.save_file(&first, b"first", true).unwrap();
    let before = mem.read_file(&outer).unwrap();

    frozen.store(true, Ordering::SeqCst);
    let second = Name::parse("archive://brittle://pack.tar$b.txt");
    let err = sb.vfs.save_file(&second, b"second", true).unwrap_err();
    assert!(matches!(err, VfsError::PermissionDenied(_)));

    assert_eq!(mem.read_file(&outer).unwrap(), before);
    assert_eq!(sb.vfs.load_file(&first).unwrap(), b"first");
    assert!(!sb.vfs.exists(&second).unwrap());
}

#[cfg(unix)]
#[test]
fn test_rewrite_keeps_container_mode() {
    use std::os::unix::fs::PermissionsExt;

    let sb = Sandbox::new();
    let container = sb.dir.path().join("shared.tar");
    sb.vfs.save_file(&sb.archive("shared.tar", "a.txt"), b"a", true).unwrap();
    std::fs::set_permissions(&container, std::fs::Permissions::from_mode(0o640)).unwrap();

    sb.vfs.save_file(&sb.archive("shared.tar", "b.txt"), b"b", true).unwrap();
    let mode = std::fs::metadata(&container).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o640);
    assert_eq!(tar_entries(&container).len(), 2);
}

#[test]
fn test_gzip_container_on_disk() {
    let sb = Sandbox::new();
    let entry = sb.archive("bundle.tar.gz", "docs/readme.md");
    sb.vfs.save_file(&entry, b"# readme", true).unwrap();

    let raw = std::fs::read(sb.dir.path().join("bundle.tar.gz")).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    sb.vfs.flush().unwrap();
    assert_eq!(sb.vfs.get_file_contents(&entry).unwrap(), "# readme");
}

#[test]
fn test_reads_archives_built_elsewhere() {
    let sb = Sandbox::new();
    let path = sb.dir.path().join("external.tar");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(6);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "./nested/deep/file.txt", &b"inside"[..])
            .unwrap();
        builder.finish().unwrap();
    }

    let entry = sb.archive("external.tar", "nested/deep/file.txt");
    assert_eq!(sb.vfs.load_file(&entry).unwrap(), b"inside");
    assert!(sb.vfs.is_dir(&sb.archive("external.tar", "nested/")).unwrap());

    let listed = sb
        .vfs
        .dir(&sb.archive("external.tar", ""), DirFlags::DIRECTORIES | DirFlags::RECURSIVE)
        .unwrap();
    assert_eq!(inner_paths(&listed), vec!["nested/", "nested/deep/"]);
}

#[test]
fn test_links_survive_rewrites() {
    let sb = Sandbox::new();
    let path = sb.dir.path().join("linked.tar");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(1);
        header.set_mode(0o644);
        builder.append_data(&mut header, "a.txt", &b"a"[..]).unwrap();

        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder.append_link(&mut link, "docs/link.txt", "../a.txt").unwrap();
        builder.finish().unwrap();
    }

    // Links are not addressable entries
    assert!(!sb.vfs.exists(&sb.archive("linked.tar", "docs/link.txt")).unwrap());

    sb.vfs.save_file(&sb.archive("linked.tar", "b.txt"), b"b", true).unwrap();
    sb.vfs.remove(&sb.archive("linked.tar", "a.txt"), false).unwrap();
    assert_eq!(
        tar_entries(&path),
        ["b.txt", "docs/link.txt"].iter().map(|s| s.to_string()).collect()
    );

    let raw = std::fs::read(&path).unwrap();
    let mut archive = tar::Archive::new(raw.as_slice());
    let link = archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap())
        .find(|e| e.header().entry_type() == tar::EntryType::Symlink)
        .expect("symlink kept");
    assert_eq!(link.link_name().unwrap().unwrap().to_str(), Some("../a.txt"));
}

#[test]
fn test_removing_a_tree_drops_its_links() {
    let sb = Sandbox::new();
    let path = sb.dir.path().join("tree.tar");
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(1);
        header.set_mode(0o644);
        builder.append_data(&mut header, "top.txt", &b"t"[..]).unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_size(1);
        header.set_mode(0o644);
        builder.append_data(&mut header, "sub/x.txt", &b"x"[..]).unwrap();

        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        builder.append_link(&mut link, "sub/alias", "x.txt").unwrap();
        builder.finish().unwrap();
    }

    sb.vfs.remove(&sb.archive("tree.tar", "sub/"), true).unwrap();
    assert_eq!(tar_entries(&path), ["top.txt"].iter().map(|s| s.to_string()).collect());
}

#[test]
fn test_container_on_memory_backend() {
    let sb = Sandbox::new();
    let entry = Name::parse("archive://mem://store/pack.tar$x/y.txt");
    sb.vfs.save_file(&entry, b"in memory", true).unwrap();
    assert!(sb.vfs.is_file(&Name::parse("mem://store/pack.tar")).unwrap());
    assert_eq!(sb.vfs.load_file(&entry).unwrap(), b"in memory");
}

#[test]
fn test_corrupt_container_is_reported() {
    let sb = Sandbox::new();
    std::fs::write(sb.dir.path().join("junk.tar"), vec![b'!'; 2048]).unwrap();
    let err = sb.vfs.load_file(&sb.archive("junk.tar", "a.txt")).unwrap_err();
    assert!(matches!(err, VfsError::CorruptContainer { .. }));
    assert!(err.is_fatal());
}
