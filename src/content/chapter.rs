//! 章节及其标题

use crate::content::node::{ImageRef, StructuralNode};

/// 章节标题的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// 文档中的第一个标题元素
    Heading,
    /// 目录中指向该文档的标签
    TocLabel,
    /// 合成的 `Chapter N`
    Synthesized,
}

/// 一个规范化后的章节，创建后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// 章节序号（从1开始，连续）
    pub ordinal: usize,
    pub title: String,
    pub title_source: TitleSource,
    /// 源文档在容器中的路径
    pub source_path: String,
    pub nodes: Vec<StructuralNode>,
}

impl Chapter {
    /// 无法解析的文档使用的空章节
    pub fn placeholder(ordinal: usize, source_path: &str, toc_label: Option<&str>) -> Self {
        let (title, title_source) = resolve_title(ordinal, None, toc_label);
        Self {
            ordinal,
            title,
            title_source,
            source_path: source_path.to_string(),
            nodes: Vec::new(),
        }
    }

    /// 按文档顺序返回章节中的图片
    pub fn images(&self) -> Vec<&ImageRef> {
        let mut images = Vec::new();
        for node in &self.nodes {
            node.collect_images(&mut images);
        }
        images
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// 合成的章节标题
pub fn synthesized_title(ordinal: usize) -> String {
    format!("Chapter {}", ordinal)
}

/// 按优先级确定章节标题：第一个标题元素 → 目录标签 → `Chapter N`
pub fn resolve_title(ordinal: usize, first_heading: Option<&str>, toc_label: Option<&str>) -> (String, TitleSource) {
    let non_empty = |s: &&str| !s.trim().is_empty();

    if let Some(heading) = first_heading.filter(non_empty) {
        return (heading.trim().to_string(), TitleSource::Heading);
    }
    if let Some(label) = toc_label.filter(non_empty) {
        return (label.trim().to_string(), TitleSource::TocLabel);
    }
    (synthesized_title(ordinal), TitleSource::Synthesized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_priority() {
        assert_eq!(
            resolve_title(3, Some("Heading"), Some("Label")),
            ("Heading".to_string(), TitleSource::Heading)
        );
        assert_eq!(
            resolve_title(3, Some("   "), Some("Label")),
            ("Label".to_string(), TitleSource::TocLabel)
        );
        assert_eq!(
            resolve_title(3, None, None),
            ("Chapter 3".to_string(), TitleSource::Synthesized)
        );
    }

    #[test]
    fn test_placeholder_is_empty() {
        let chapter = Chapter::placeholder(2, "OEBPS/b.xhtml", None);
        assert!(chapter.is_empty());
        assert_eq!(chapter.title, "Chapter 2");
    }
}
