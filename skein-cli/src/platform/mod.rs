//! 平台适配层（终端输出）

mod cli;

pub use cli::{print_error, print_names, stat_json};
