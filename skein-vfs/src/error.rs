//! VFS Error Types

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;

/// Tri-state outcome of a provider operation.
///
/// `Unsupported` means the backend category cannot do the operation at all,
/// which lets the facade pick a fallback instead of reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Failure,
    Unsupported,
}

impl Status {
    /// Human-readable message for the status code
    pub fn message(&self) -> &'static str {
        match self {
            Status::Ok => "operation succeeded",
            Status::Failure => "operation failed",
            Status::Unsupported => "operation not supported by this provider",
        }
    }

    /// Whether the status is `Ok`
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Error type for VFS operations
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory still has children
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Permission denied
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The name cannot be used for this operation
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The provider does not implement the operation
    #[error("{operation} is not supported by the '{scheme}' provider")]
    Unsupported {
        operation: &'static str,
        scheme: String,
    },

    /// No provider is registered for the scheme
    #[error("no provider registered for scheme '{0}'")]
    UnknownScheme(String),

    /// A container could not be decoded
    #[error("corrupt container {container}: {reason}")]
    CorruptContainer { container: String, reason: String },

    /// Database backend error
    #[error("database error: {0}")]
    Database(String),

    /// Network transfer error
    #[error("network error: {0}")]
    Network(String),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Custom error message
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: &'static str, scheme: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            scheme: scheme.into(),
        }
    }

    pub fn corrupt(container: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CorruptContainer {
            container: container.into(),
            reason: reason.to_string(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Translate an `io::Error` raised while touching `path`.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io(err),
        }
    }

    /// Map the error onto the provider status vocabulary
    pub fn status(&self) -> Status {
        match self {
            VfsError::Unsupported { .. } => Status::Unsupported,
            _ => Status::Failure,
        }
    }

    /// Configuration errors and corrupt containers cannot be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VfsError::UnknownScheme(_) | VfsError::CorruptContainer { .. }
        )
    }

    /// Whether the error reports a missing file or directory
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error so streams can surface it.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(e) => e,
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            VfsError::Unsupported { .. } => io::Error::new(io::ErrorKind::Unsupported, e.to_string()),
            other => io::Error::other(other.to_string()),
        }
    }
}
