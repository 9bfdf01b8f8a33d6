//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数

#![allow(dead_code)]

use skein_workspace::{Name, Vfs};
use tempfile::TempDir;

/// 测试环境：临时目录 + 独立的 VFS 门面
pub struct TestEnv {
    pub dir: TempDir,
    pub vfs: Vfs,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            vfs: Vfs::with_builtin_providers(),
        }
    }

    /// 临时目录下 `rel` 的绝对路径
    pub fn path(&self, rel: &str) -> String {
        format!("{}/{}", self.dir.path().to_string_lossy(), rel)
    }

    /// 在指定 scheme 下构造名字
    ///
    /// # Example
    /// ```ignore
    /// let name = env.name("archive", "pack.tar$a.txt");
    /// ```
    pub fn name(&self, scheme: &str, rel: &str) -> Name {
        Name::parse(&format!("{}://{}", scheme, self.path(rel)))
    }

    /// 写入文件并断言成功
    pub fn write(&self, name: &Name, content: &[u8]) {
        self.vfs
            .save_file(name, content, true)
            .unwrap_or_else(|e| panic!("save {}: {}", name, e));
    }

    /// 读取文件为字符串
    pub fn read(&self, name: &Name) -> String {
        self.vfs
            .get_file_contents(name)
            .unwrap_or_else(|e| panic!("load {}: {}", name, e))
    }
}
