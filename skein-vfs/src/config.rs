//! Process-wide VFS configuration
//!
//! Holds the global `VfsConfig` singleton. Initialize it once at startup;
//! code that reads it before initialization sees the defaults.

use once_cell::sync::OnceCell;
use skein_config::VfsConfig;

static GLOBAL_CONFIG: OnceCell<VfsConfig> = OnceCell::new();

/// Initialize the global configuration.
///
/// Returns `false` (and keeps the existing value) when the configuration
/// was already initialized or already read.
pub fn init(config: VfsConfig) -> bool {
    GLOBAL_CONFIG.set(config).is_ok()
}

/// Get the global configuration, falling back to defaults.
pub fn config() -> &'static VfsConfig {
    GLOBAL_CONFIG.get_or_init(VfsConfig::default)
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}
