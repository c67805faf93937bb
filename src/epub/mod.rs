pub mod error;
pub mod container;
pub mod reader;
pub mod opf;
pub mod ncx;
pub mod path;
pub mod toc;
pub mod book;

// 重新导出错误处理
pub use error::{EpubError, Result, Warning};

// 重新导出容器相关
pub use container::{Container, RootFile};

// 重新导出EPUB读取器和书籍结构
pub use reader::Epub;
pub use book::{BookMetadata, Package, SpineEntry, UNTITLED};
pub use toc::TocLabels;

// 重新导出OPF相关
pub use opf::{Opf, Metadata, Creator, Identifier, ManifestItem, SpineItem};

// 重新导出NCX相关
pub use ncx::{Ncx, NavPoint, NavMap, DocTitle};
