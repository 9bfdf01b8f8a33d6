//! Built-in providers
//!
//! Each provider module exposes `register(&Registry)`. [`init`] registers
//! all of them with the global registry exactly once.

#[cfg(feature = "archive")]
pub mod archive;
#[cfg(feature = "dbfs")]
pub mod database;
pub mod disk;
pub mod memory;
#[cfg(feature = "net")]
pub mod network;

#[cfg(feature = "archive")]
pub use archive::ArchiveProvider;
#[cfg(feature = "dbfs")]
pub use database::DatabaseProvider;
pub use disk::DiskProvider;
pub use memory::MemoryProvider;
#[cfg(feature = "net")]
pub use network::NetworkProvider;

use crate::registry::Registry;
use once_cell::sync::OnceCell;
use tracing::debug;

static INIT: OnceCell<()> = OnceCell::new();

/// Register every built-in provider with the global registry.
///
/// Idempotent; only the first call registers anything.
pub fn init() {
    INIT.get_or_init(|| {
        register_builtin(Registry::global());
    });
}

/// Register every built-in provider compiled into this build
pub fn register_builtin(registry: &Registry) {
    disk::register(registry);
    memory::register(registry);
    #[cfg(feature = "archive")]
    archive::register(registry);
    #[cfg(feature = "dbfs")]
    database::register(registry);
    #[cfg(feature = "net")]
    network::register(registry);
    debug!(target: "skein::registry", schemes = ?registry.schemes(), "Built-in providers registered");
}
