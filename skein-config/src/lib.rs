//! Skein Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Skein crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the virtual filesystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Block size used by the generic copy loop, in bytes
    pub copy_block_size: usize,
    /// Parent directory for scoped temporary directories (system temp dir when unset)
    pub temp_root: Option<PathBuf>,
    /// Archive provider settings
    pub archive: ArchiveConfig,
    /// Network provider settings
    pub network: NetworkConfig,
    /// Database provider settings
    pub database: DatabaseConfig,
}

/// Configuration for archive containers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Container filename suffixes that mark a gzip-compressed tar stream
    pub gzip_suffixes: Vec<String>,
}

/// Configuration for the network provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Whole-transfer timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

/// Configuration for the database provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

/// Log level names accepted in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Per-component log level overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global default level (`warn` when unset)
    pub level: Option<LogLevel>,
    /// Overrides keyed by component name (`archive`, `dbfs`, ...)
    pub components: Vec<(Component, LogLevel)>,
}

/// VFS component, used for phase-specific log targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Vfs,
    Registry,
    Disk,
    Archive,
    Dbfs,
    Net,
    Mem,
}

impl Component {
    /// All components, in target registration order
    pub const ALL: [Component; 7] = [
        Component::Vfs,
        Component::Registry,
        Component::Disk,
        Component::Archive,
        Component::Dbfs,
        Component::Net,
        Component::Mem,
    ];

    /// Get the string name of the component
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Vfs => "vfs",
            Component::Registry => "registry",
            Component::Disk => "disk",
            Component::Archive => "archive",
            Component::Dbfs => "dbfs",
            Component::Net => "net",
            Component::Mem => "mem",
        }
    }

    /// Get the log target name for this component
    pub fn target(&self) -> String {
        format!("skein::{}", self.as_str())
    }
}

impl LogLevel {
    /// Parse a level name; `silent` maps to `error`
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_lowercase().as_str() {
            "silent" | "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            copy_block_size: 64 * 1024,
            temp_root: None,
            archive: ArchiveConfig::default(),
            network: NetworkConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            gzip_suffixes: vec![".gz".to_string(), ".tgz".to_string()],
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("skein/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vfs_config() {
        let cfg = VfsConfig::default();
        assert_eq!(cfg.copy_block_size, 65536);
        assert!(cfg.temp_root.is_none());
        assert_eq!(cfg.archive.gzip_suffixes, vec![".gz", ".tgz"]);
        assert_eq!(cfg.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: VfsConfig =
            serde_json::from_str(r#"{ "copy_block_size": 4096, "network": { "timeout_secs": 5 } }"#)
                .unwrap();
        assert_eq!(cfg.copy_block_size, 4096);
        assert_eq!(cfg.network.timeout_secs, 5);
        assert!(cfg.network.user_agent.starts_with("skein/"));
        assert_eq!(cfg.archive, ArchiveConfig::default());
    }

    #[test]
    fn test_component_target() {
        assert_eq!(Component::Archive.as_str(), "archive");
        assert_eq!(Component::Dbfs.target(), "skein::dbfs");
        assert_eq!(Component::ALL.len(), 7);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("silent"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_logging_config_json() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{ "level": "warn", "components": [["archive", "trace"]] }"#)
                .unwrap();
        assert_eq!(cfg.level, Some(LogLevel::Warn));
        assert_eq!(cfg.components, vec![(Component::Archive, LogLevel::Trace)]);
    }
}
