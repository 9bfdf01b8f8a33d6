//! CLI 配置
//!
//! 包含 CLI 特有的配置：配置文件（VFS 配置 + 日志配置）和日志级别的组合

use crate::error::CliError;
use serde::Deserialize;
use skein_config::{Component, LogLevel, LoggingConfig, VfsConfig};
use std::collections::HashMap;
use std::path::Path;
use tracing::Level;

/// 配置文件结构（JSON）
///
/// ```json
/// {
///   "vfs": { "copy_block_size": 65536, "network": { "timeout_secs": 10 } },
///   "logging": { "level": "info", "components": [["archive", "trace"]] }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub vfs: VfsConfig,
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// 读取并解析配置文件
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub components: HashMap<Component, Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            components: HashMap::new(),
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        let mut log = LogConfig::default();
        if let Some(level) = config.level {
            log.global = to_level(level);
        }
        for (component, level) in &config.components {
            log.components.insert(*component, to_level(*level));
        }
        log
    }
}

impl LogConfig {
    /// Get log level for a specific component
    pub fn level_for(&self, component: Component) -> Level {
        self.components
            .get(&component)
            .copied()
            .unwrap_or(self.global)
    }
}

/// 解析日志级别字符串（`silent` 等同于 `error`）
pub fn parse_level(s: &str) -> Result<Level, CliError> {
    LogLevel::parse(s)
        .map(to_level)
        .ok_or_else(|| CliError::LogLevel(s.to_string()))
}

fn to_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}
