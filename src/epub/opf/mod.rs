//! OPF（Open Packaging Format）文件解析模块
//!
//! 提取包文件中的元数据、清单和脊柱（阅读顺序）。

mod metadata;
mod manifest;
mod spine;
mod parser;

pub use metadata::{Creator, Identifier, Metadata, MetadataValue, MetaValue};
pub use manifest::ManifestItem;
pub use spine::SpineItem;
pub use parser::Opf;
