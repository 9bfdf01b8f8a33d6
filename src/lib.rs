//! Skein - scheme-routed virtual file system
//!
//! 工作区根包，重导出 `skein-vfs` 的公共 API。
//!
//! # Architecture
//!
//! ```text
//! skein-config/  - 纯配置数据结构（无逻辑）
//! skein-vfs/     - Name、Provider trait、Registry、Vfs 门面和内置后端
//! skein-cli/     - 命令行入口（日志、配置文件）
//! ```
//!
//! # Quick Start
//!
//! ```
//! use skein_workspace::{Name, Vfs};
//!
//! let vfs = Vfs::with_builtin_providers();
//! let name = Name::parse("mem://notes/todo.txt");
//! vfs.save_file(&name, b"buy milk", true).unwrap();
//! assert_eq!(vfs.get_file_contents(&name).unwrap(), "buy milk");
//! ```

pub use skein_vfs::*;

/// 初始化全局配置并返回全局门面
///
/// 配置只能设置一次；重复调用时沿用第一次的配置。
///
/// # Example
/// ```
/// use skein_workspace::{init, VfsConfig};
///
/// let vfs = init(VfsConfig::default());
/// assert!(vfs.registry().contains("file"));
/// ```
pub fn init(config: VfsConfig) -> &'static Vfs {
    skein_vfs::config::init(config);
    skein_vfs::global()
}
