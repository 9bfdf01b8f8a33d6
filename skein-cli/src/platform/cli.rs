//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和列表、状态打印。

use crate::error::CliError;
use serde_json::json;
use skein_vfs::{Name, Vfs, VfsResult};
use std::io::{self, Write};

/// 打印错误（带分类提示）
pub fn print_error(e: &CliError) {
    eprintln!("❌ {}", e);
    if let Some(vfs_error) = e.vfs() {
        if vfs_error.is_fatal() {
            eprintln!("   (fatal: check the scheme and the container file)");
        } else if vfs_error.status() == skein_vfs::Status::Unsupported {
            eprintln!("   ({})", vfs_error.status().message());
        }
    }
}

/// 每行打印一个名字
pub fn print_names<W: Write>(out: &mut W, names: &[Name]) -> io::Result<()> {
    for name in names {
        writeln!(out, "{}", name.to_short_string())?;
    }
    Ok(())
}

/// 名字的状态（JSON）
pub fn stat_json(vfs: &Vfs, name: &Name) -> VfsResult<serde_json::Value> {
    let provider = vfs.resolve(name)?;
    let is_file = provider.is_file(name);
    Ok(json!({
        "name": name.to_canonical_string(),
        "scheme": name.scheme(),
        "exists": provider.exists(name),
        "is_file": is_file,
        "is_dir": provider.is_dir(name),
        "size": if is_file { provider.file_size(name) } else { 0 },
    }))
}
