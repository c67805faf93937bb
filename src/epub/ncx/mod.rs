//! NCX（Navigation Control file for XML）文件解析模块
//!
//! 解析NCX导航控制文件的导航地图，用于为章节提供目录标签。

pub mod navigation;
pub mod parser;

pub use navigation::{DocTitle, NavContent, NavLabel, NavMap, NavPoint};
pub use parser::Ncx;
