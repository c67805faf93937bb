//! 书籍级数据结构：元数据记录和脊柱条目

use scraper::Html;

use crate::epub::opf::{ManifestItem, Opf, SpineItem};
use crate::epub::toc::TocLabels;

/// 元数据缺失书名且没有提供备用名时使用的书名
pub const UNTITLED: &str = "Untitled";

/// 书籍元数据
///
/// 除书名外的字段都是可选的；解析后不再修改。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub rights: Option<String>,
}

impl BookMetadata {
    /// 从OPF元数据构造
    ///
    /// # 参数
    /// * `opf` - 解析后的OPF
    /// * `fallback_title` - OPF中没有书名时使用（通常是文件名主干）
    pub fn from_opf(opf: &Opf, fallback_title: Option<&str>) -> Self {
        let metadata = &opf.metadata;

        let title = metadata
            .title()
            .or_else(|| {
                fallback_title
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| UNTITLED.to_string());

        let creators = metadata.creators();
        let mut authors: Vec<String> = creators
            .iter()
            .filter(|creator| creator.is_author())
            .map(|creator| creator.name.clone())
            .collect();
        if authors.is_empty() {
            authors = creators.into_iter().map(|creator| creator.name).collect();
        }

        Self {
            title,
            authors,
            language: metadata.language(),
            identifier: opf.primary_identifier(),
            publisher: metadata.publisher().map(|p| clean_metadata_text(&p)),
            description: metadata.description().map(|d| clean_metadata_text(&d)),
            rights: metadata.rights().map(|r| clean_metadata_text(&r)),
        }
    }
}

/// 清理可能含有HTML标签的元数据文本，只保留纯文本
fn clean_metadata_text(text: &str) -> String {
    let plain = if text.contains('<') && text.contains('>') {
        let fragment = Html::parse_fragment(text);
        fragment.root_element().text().collect::<Vec<_>>().join(" ")
    } else {
        text.to_string()
    };

    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");

    // 标签之间插入的空格不应出现在标点前
    let mut cleaned = String::with_capacity(collapsed.len());
    for ch in collapsed.chars() {
        if matches!(ch, '.' | ',' | '!' | '?' | ':' | ';') && cleaned.ends_with(' ') {
            cleaned.pop();
        }
        cleaned.push(ch);
    }
    cleaned
}

/// 脊柱条目：容器中的一个内容文档
#[derive(Debug, Clone, PartialEq)]
pub struct SpineEntry {
    /// 在脊柱中的位置（从0开始）
    pub position: usize,
    /// 清单项ID
    pub idref: String,
    /// 文档在容器中的完整路径
    pub path: String,
    /// 清单声明的媒体类型
    pub media_type: String,
    pub linear: bool,
}

impl SpineEntry {
    pub fn new(position: usize, spine_item: &SpineItem, manifest_item: &ManifestItem, path: String) -> Self {
        Self {
            position,
            idref: spine_item.idref.clone(),
            path,
            media_type: manifest_item.media_type.clone(),
            linear: spine_item.linear,
        }
    }

    /// 章节序号（从1开始）
    pub fn ordinal(&self) -> usize {
        self.position + 1
    }

    pub fn is_markup(&self) -> bool {
        matches!(self.media_type.as_str(), "application/xhtml+xml" | "text/html")
    }

    pub fn is_xhtml(&self) -> bool {
        self.media_type == "application/xhtml+xml"
    }
}

/// 容器读取的结果
#[derive(Debug, Clone)]
pub struct Package {
    pub metadata: BookMetadata,
    /// 按阅读顺序排列的脊柱条目
    pub spine: Vec<SpineEntry>,
    pub toc_labels: TocLabels,
}
