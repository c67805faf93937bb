pub mod epub;
pub mod content;
pub mod markdown;
pub mod images;
pub mod config;
pub mod convert;
pub mod package;
pub mod logging;

#[cfg(test)]
mod testing;

// === 核心API重新导出 ===

/// 转换入口（主要接口）
pub use convert::{Conversion, convert, convert_file};

/// 转换配置
pub use config::{ConvertOptions, ImageOptions, OutputMode};

/// 错误处理
pub use epub::{EpubError, Result, Warning};

// === 数据结构 ===

/// 书籍元数据和脊柱条目
pub use epub::{BookMetadata, SpineEntry};

/// 章节结构树
pub use content::{Chapter, ImageRef, Inline, StructuralNode};

/// 输出文件
pub use images::RenderedImage;
pub use markdown::MarkdownFile;

// === 底层组件（高级用法） ===

/// EPUB容器读取器
pub use epub::{Epub, Package, TocLabels};

// === 库信息 ===

/// 库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库的描述
pub const DESCRIPTION: &str = "将EPUB电子书转换为Markdown的Rust库";
