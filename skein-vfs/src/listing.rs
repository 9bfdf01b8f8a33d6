//! Directory listing over flat catalogs
//!
//! Container-style backends (archive, database, memory) keep a flat set of
//! relative paths where directories end with `/`. These helpers turn such a
//! set into the listing contract of [`FileProvider::dir`].
//!
//! [`FileProvider::dir`]: crate::FileProvider::dir

use crate::provider::DirFlags;
use std::collections::BTreeSet;

/// Immediate parent of a catalog path: strip the trailing `/`, then
/// everything after the last remaining `/`.
///
/// `"a/b/c.txt"` and `"a/b/c/"` both have parent `"a/b/"`; top-level
/// entries have parent `""`.
pub fn parent_of(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

/// Normalize a directory path for catalog lookups: no leading `./` or `/`,
/// trailing `/` unless empty.
pub fn normalize_dir(path: &str) -> String {
    let mut dir = normalize_entry(path);
    if !dir.is_empty() && !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}

/// Strip a leading `./` or `/` from an inner path.
pub fn normalize_entry(path: &str) -> String {
    let path = path.replace('\\', "/");
    let stripped = path
        .strip_prefix("./")
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(&path);
    stripped.to_string()
}

/// Whether a single path component is hidden.
pub fn is_hidden(component: &str) -> bool {
    component.starts_with('.')
}

/// Add every implicit parent directory of the given paths.
pub fn with_implicit_dirs<'a, I>(paths: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut all = BTreeSet::new();
    for path in paths {
        let mut parent = parent_of(path);
        while !parent.is_empty() {
            all.insert(parent.to_string());
            parent = parent_of(parent);
        }
        all.insert(path.to_string());
    }
    all
}

/// Select the catalog paths below `base` that `flags` asks for.
///
/// `base` must be normalized with [`normalize_dir`]. Results keep the
/// catalog's relative form and come back sorted.
pub fn filter_catalog<'a, I>(paths: I, base: &str, flags: DirFlags) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let recursive = flags.contains(DirFlags::RECURSIVE);
    let hidden = flags.contains(DirFlags::HIDDEN_FILES);

    let mut out: Vec<String> = paths
        .into_iter()
        .filter(|path| *path != base && path.starts_with(base))
        .filter(|path| recursive || parent_of(path) == base)
        .filter(|path| {
            let rest = path[base.len()..].trim_end_matches('/');
            rest.split('/').all(|c| {
                !c.is_empty() && c != "." && c != ".." && (hidden || !is_hidden(c))
            })
        })
        .filter(|path| {
            if path.ends_with('/') {
                flags.contains(DirFlags::DIRECTORIES)
            } else {
                flags.contains(DirFlags::FILES)
            }
        })
        .map(str::to_string)
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> BTreeSet<String> {
        with_implicit_dirs(
            [
                "top.txt",
                ".hidden.txt",
                "a/one.txt",
                "a/b/two.txt",
                "a/b/c/three.txt",
                "a/.secret/key.txt",
                "empty/",
            ]
            .into_iter(),
        )
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("a/b/c.txt"), "a/b/");
        assert_eq!(parent_of("a/b/c/"), "a/b/");
        assert_eq!(parent_of("a/"), "");
        assert_eq!(parent_of("x.txt"), "");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_entry("./a/b.txt"), "a/b.txt");
        assert_eq!(normalize_entry("/a/b.txt"), "a/b.txt");
        assert_eq!(normalize_dir("a/b"), "a/b/");
        assert_eq!(normalize_dir(""), "");
        assert_eq!(normalize_dir("/"), "");
    }

    #[test]
    fn test_implicit_dirs() {
        let cat = catalog();
        assert!(cat.contains("a/"));
        assert!(cat.contains("a/b/"));
        assert!(cat.contains("a/b/c/"));
        assert!(cat.contains("a/.secret/"));
    }

    #[test]
    fn test_shallow_listing_excludes_nested() {
        let cat = catalog();
        let listed = filter_catalog(cat.iter().map(String::as_str), "a/", DirFlags::default());
        assert_eq!(listed, vec!["a/b/", "a/one.txt"]);
    }

    #[test]
    fn test_root_files_only() {
        let cat = catalog();
        let listed = filter_catalog(cat.iter().map(String::as_str), "", DirFlags::FILES);
        assert_eq!(listed, vec!["top.txt"]);
    }

    #[test]
    fn test_recursive_hidden_files() {
        let cat = catalog();
        let flags = DirFlags::FILES | DirFlags::RECURSIVE | DirFlags::HIDDEN_FILES;
        let listed = filter_catalog(cat.iter().map(String::as_str), "", flags);
        assert_eq!(
            listed,
            vec![
                ".hidden.txt",
                "a/.secret/key.txt",
                "a/b/c/three.txt",
                "a/b/two.txt",
                "a/one.txt",
                "top.txt",
            ]
        );
    }

    #[test]
    fn test_recursive_skips_hidden_subtrees() {
        let cat = catalog();
        let flags = DirFlags::FILES | DirFlags::RECURSIVE;
        let listed = filter_catalog(cat.iter().map(String::as_str), "a/", flags);
        assert_eq!(listed, vec!["a/b/c/three.txt", "a/b/two.txt", "a/one.txt"]);
    }

    #[test]
    fn test_directories_only() {
        let cat = catalog();
        let flags = DirFlags::DIRECTORIES | DirFlags::RECURSIVE;
        let listed = filter_catalog(cat.iter().map(String::as_str), "", flags);
        assert_eq!(listed, vec!["a/", "a/b/", "a/b/c/", "empty/"]);
    }
}
