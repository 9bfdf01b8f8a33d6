//! Location names: `[scheme://]directory/filename`

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Scheme assumed when a location string carries none
pub const DEFAULT_SCHEME: &str = "file";

/// Marker separating an outer container path from the path inside it
pub const CONTAINER_MARKER: char = '$';

const SCHEME_SEPARATOR: &str = "://";

/// A decomposed location: `scheme`, `directory` and `filename`.
///
/// The directory is either empty or ends with `/`. A `$` inside the path
/// marks a nested container boundary; `Name` keeps it verbatim and leaves
/// the interpretation to container providers.
///
/// # Example
/// ```
/// use skein_vfs::Name;
///
/// let name = Name::parse("archive://tmp/a.tar$docs/readme.txt");
/// assert_eq!(name.scheme(), "archive");
/// assert_eq!(name.directory(), "tmp/a.tar$docs/");
/// assert_eq!(name.filename(), "readme.txt");
/// assert_eq!(name.to_canonical_string(), "archive://tmp/a.tar$docs/readme.txt");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    scheme: String,
    directory: String,
    filename: String,
}

impl Name {
    /// Build a name from its three parts, normalizing the directory.
    pub fn new(
        scheme: impl Into<String>,
        directory: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        let mut name = Self {
            scheme: scheme.into(),
            directory: String::new(),
            filename: filename.into().replace('\\', "/"),
        };
        name.set_directory(directory.into());
        name
    }

    /// Parse a location string.
    ///
    /// The scheme is everything before the first `://` (`file` when absent);
    /// the remainder is split on its last `/`.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::default();
        }
        let s = s.replace('\\', "/");
        match s.find(SCHEME_SEPARATOR) {
            Some(idx) => {
                let scheme = if idx == 0 { DEFAULT_SCHEME } else { &s[..idx] };
                Self::from_scheme_path(scheme, &s[idx + SCHEME_SEPARATOR.len()..])
            }
            None => Self::from_scheme_path(DEFAULT_SCHEME, &s),
        }
    }

    /// Build a name from a scheme and a backend-local path.
    pub fn from_scheme_path(scheme: impl Into<String>, path: &str) -> Self {
        let path = path.replace('\\', "/");
        let (directory, filename) = match path.rfind('/') {
            Some(i) => (&path[..=i], &path[i + 1..]),
            None => ("", path.as_str()),
        };
        Self {
            scheme: scheme.into(),
            directory: directory.to_string(),
            filename: filename.to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Backend-local path: `directory + filename`, without the scheme.
    pub fn path(&self) -> String {
        format!("{}{}", self.directory, self.filename)
    }

    /// `scheme://directory/filename`; empty for an empty name.
    pub fn to_canonical_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("{}{}{}", self.scheme, SCHEME_SEPARATOR, self.path())
    }

    /// Canonical form without the `file://` prefix for the default scheme.
    pub fn to_short_string(&self) -> String {
        if self.scheme == DEFAULT_SCHEME || self.scheme.is_empty() {
            self.path()
        } else {
            self.to_canonical_string()
        }
    }

    /// Set the directory, appending the trailing `/` when missing.
    pub fn set_directory(&mut self, directory: impl Into<String>) {
        let mut directory = directory.into().replace('\\', "/");
        if !directory.is_empty() && !directory.ends_with('/') {
            directory.push('/');
        }
        self.directory = directory;
    }

    pub fn set_file(&mut self, filename: impl Into<String>) {
        self.filename = filename.into().replace('\\', "/");
    }

    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.scheme = scheme.into();
    }

    /// Copy of this name with another directory.
    pub fn with_directory(&self, directory: impl Into<String>) -> Self {
        let mut name = self.clone();
        name.set_directory(directory);
        name
    }

    /// True when scheme, directory and filename are all empty.
    pub fn is_empty(&self) -> bool {
        self.scheme.is_empty() && self.directory.is_empty() && self.filename.is_empty()
    }

    /// True when the name denotes a directory (no filename part).
    pub fn is_dir_name(&self) -> bool {
        self.filename.is_empty()
    }

    /// True when the path is not anchored at `/` or a drive letter.
    pub fn is_relative(&self) -> bool {
        let path = self.path();
        if path.starts_with('/') {
            return false;
        }
        let bytes = path.as_bytes();
        !(bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
    }

    /// Same scheme and `prefix` is a leading run of whole path components.
    pub fn starts_with(&self, prefix: &Name) -> bool {
        if self.scheme != prefix.scheme {
            return false;
        }
        let path = self.path();
        let prefix = prefix.path();
        if prefix.is_empty() || path == prefix {
            return true;
        }
        path.starts_with(&prefix)
            && (prefix.ends_with('/') || path[prefix.len()..].starts_with('/'))
    }

    /// Treat this name as a directory and append a relative path.
    pub fn join(&self, relative: &str) -> Self {
        let mut base = self.path();
        if !base.is_empty() && !base.ends_with('/') {
            base.push('/');
        }
        base.push_str(relative.trim_start_matches('/'));
        Self::from_scheme_path(self.scheme.clone(), &base)
    }

    /// The containing directory as a directory name.
    pub fn parent(&self) -> Option<Self> {
        if !self.filename.is_empty() {
            return Some(Self::new(self.scheme.clone(), self.directory.clone(), ""));
        }
        let trimmed = self.directory.strip_suffix('/')?;
        if trimmed.is_empty() {
            return None;
        }
        let parent = match trimmed.rfind('/') {
            Some(i) => &trimmed[..=i],
            None => "",
        };
        Some(Self::new(self.scheme.clone(), parent, ""))
    }

    /// Last path component: the filename, or the last directory segment.
    pub fn entry_name(&self) -> &str {
        if !self.filename.is_empty() {
            return &self.filename;
        }
        let trimmed = self.directory.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(i) => &trimmed[i + 1..],
            None => trimmed,
        }
    }

    /// Filename extension without the dot.
    pub fn extension(&self) -> Option<&str> {
        let dot = self.filename.rfind('.')?;
        if dot == 0 {
            return None;
        }
        Some(&self.filename[dot + 1..])
    }

    /// Split the path on the first container marker.
    ///
    /// Returns `(outer, inner)`; `None` when the path has no marker.
    pub fn container_split(&self) -> Option<(String, String)> {
        let path = self.path();
        let idx = path.find(CONTAINER_MARKER)?;
        Some((path[..idx].to_string(), path[idx + 1..].to_string()))
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.directory
            .cmp(&other.directory)
            .then_with(|| self.filename.cmp(&other.filename))
            .then_with(|| self.scheme.cmp(&other.scheme))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for Name {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}
