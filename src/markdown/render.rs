//! 把章节结构树渲染为Markdown文本
//!
//! 渲染是纯函数：相同的元数据和章节总是得到逐字节相同的输出。

use crate::config::OutputMode;
use crate::content::{Chapter, ImageRef, Inline, StructuralNode};
use crate::epub::BookMetadata;
use crate::epub::path;
use crate::images::ImageMapping;
use crate::markdown::slug::{AnchorRegistry, NameRegistry, slugify};

const MARKDOWN_EXTENSION: &str = "md";
const SEPARATOR: &str = "---";
const TOC_HEADING: &str = "Table of Contents";

/// 一个输出的Markdown文件
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownFile {
    pub name: String,
    pub content: String,
}

/// 按输出模式渲染整本书
///
/// 单文件模式从不嵌入图片，`images` 只在多文件模式下使用。
pub fn render(
    metadata: &BookMetadata,
    chapters: &[Chapter],
    mode: OutputMode,
    images: &ImageMapping,
) -> Vec<MarkdownFile> {
    match mode {
        OutputMode::SingleFile => vec![render_single_file(metadata, chapters)],
        OutputMode::MultiFile => render_multi_file(metadata, chapters, images),
    }
}

/// 单文件：元数据、目录（文档内锚点）、各章正文
pub fn render_single_file(metadata: &BookMetadata, chapters: &[Chapter]) -> MarkdownFile {
    let mut registry = NameRegistry::new();
    let title_slug = slugify(&metadata.title);
    let name = registry.claim(if title_slug.is_empty() { "book" } else { title_slug.as_str() }, MARKDOWN_EXTENSION);

    let body = BodyRenderer { images: None };
    let mut anchors = AnchorRegistry::new();
    anchors.anchor(TOC_HEADING);

    let mut sections = vec![metadata_header(metadata)];

    if !chapters.is_empty() {
        // 锚点按文档顺序分配，正文中的标题也会占用锚点
        let entries: Vec<String> = chapters
            .iter()
            .enumerate()
            .map(|(index, chapter)| {
                let anchor = anchors.anchor(&chapter.title);
                let mut headings = Vec::new();
                body_headings(&chapter.nodes, &mut headings);
                for heading in headings {
                    anchors.anchor(heading);
                }
                format!("{}. [{}](#{})", index + 1, escape_text(&chapter.title), anchor)
            })
            .collect();
        sections.push(SEPARATOR.to_string());
        sections.push(format!("## {}\n\n{}", TOC_HEADING, entries.join("\n")));
        sections.push(SEPARATOR.to_string());

        let rendered: Vec<String> = chapters
            .iter()
            .map(|chapter| chapter_section(chapter, &body))
            .collect();
        sections.push(rendered.join(&format!("\n\n{}\n\n", SEPARATOR)));
    }

    MarkdownFile { name, content: finish(sections) }
}

/// 多文件：一个索引文件加每章一个文件，章节之间有导航链接
pub fn render_multi_file(metadata: &BookMetadata, chapters: &[Chapter], images: &ImageMapping) -> Vec<MarkdownFile> {
    let (index_name, chapter_names) = plan_names(metadata, chapters);
    let body = BodyRenderer { images: Some(images) };

    let mut index_sections = vec![metadata_header(metadata)];
    if !chapters.is_empty() {
        let entries: Vec<String> = chapters
            .iter()
            .zip(&chapter_names)
            .enumerate()
            .map(|(index, (chapter, name))| format!("{}. [{}]({})", index + 1, escape_text(&chapter.title), name))
            .collect();
        index_sections.push(SEPARATOR.to_string());
        index_sections.push(format!("## {}\n\n{}", TOC_HEADING, entries.join("\n")));
    }

    let mut files = vec![MarkdownFile { name: index_name.clone(), content: finish(index_sections) }];

    for (index, chapter) in chapters.iter().enumerate() {
        let mut links = Vec::new();
        if index > 0 {
            links.push(format!(
                "[← Previous: {}]({})",
                escape_text(&chapters[index - 1].title),
                chapter_names[index - 1]
            ));
        }
        links.push(format!("[Index]({})", index_name));
        if index + 1 < chapters.len() {
            links.push(format!(
                "[Next: {} →]({})",
                escape_text(&chapters[index + 1].title),
                chapter_names[index + 1]
            ));
        }
        let navigation = links.join(" | ");

        let sections = vec![
            navigation.clone(),
            SEPARATOR.to_string(),
            chapter_section(chapter, &body),
            SEPARATOR.to_string(),
            navigation,
        ];
        files.push(MarkdownFile { name: chapter_names[index].clone(), content: finish(sections) });
    }

    files
}

/// 分配索引文件和章节文件的文件名
fn plan_names(metadata: &BookMetadata, chapters: &[Chapter]) -> (String, Vec<String>) {
    let mut registry = NameRegistry::new();

    let title_slug = slugify(&metadata.title);
    let index_stem = if title_slug.is_empty() {
        "index".to_string()
    } else {
        format!("{}_index", title_slug)
    };
    let index_name = registry.claim(&index_stem, MARKDOWN_EXTENSION);

    let chapter_names = chapters
        .iter()
        .map(|chapter| {
            let slug = slugify(&chapter.title);
            let stem = if slug.is_empty() {
                format!("chapter_{:02}", chapter.ordinal)
            } else {
                format!("chapter_{:02}_{}", chapter.ordinal, slug)
            };
            registry.claim(&stem, MARKDOWN_EXTENSION)
        })
        .collect();

    (index_name, chapter_names)
}

/// 元数据头部，缺失的字段直接省略
fn metadata_header(metadata: &BookMetadata) -> String {
    let mut lines = vec![format!("**Title:** {}", escape_text(&metadata.title))];

    if !metadata.authors.is_empty() {
        lines.push(format!("**Author:** {}", escape_text(&metadata.authors.join(", "))));
    }
    let optional = [
        ("Language", &metadata.language),
        ("Identifier", &metadata.identifier),
        ("Publisher", &metadata.publisher),
        ("Description", &metadata.description),
        ("Rights", &metadata.rights),
    ];
    for (label, value) in optional {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            lines.push(format!("**{}:** {}", label, escape_text(value)));
        }
    }

    lines.join("\n\n")
}

/// 按文档顺序收集正文中会渲染为标题的文字
fn body_headings<'a>(nodes: &'a [StructuralNode], headings: &mut Vec<&'a str>) {
    for node in nodes {
        match node {
            StructuralNode::Heading { text, .. } => headings.push(text),
            StructuralNode::Quote(children) => body_headings(children, headings),
            StructuralNode::List { items, .. } => {
                for item in items {
                    body_headings(item, headings);
                }
            }
            _ => {}
        }
    }
}

fn chapter_section(chapter: &Chapter, body: &BodyRenderer) -> String {
    let mut blocks = vec![format!("# {}", escape_text(&chapter.title))];
    blocks.extend(body.blocks(&chapter.nodes));
    blocks.join("\n\n")
}

fn finish(sections: Vec<String>) -> String {
    let mut content = sections.join("\n\n");
    content.push('\n');
    content
}

struct BodyRenderer<'a> {
    /// None表示不输出图片链接
    images: Option<&'a ImageMapping>,
}

impl BodyRenderer<'_> {
    fn blocks(&self, nodes: &[StructuralNode]) -> Vec<String> {
        nodes.iter().filter_map(|node| self.node(node)).collect()
    }

    fn node(&self, node: &StructuralNode) -> Option<String> {
        match node {
            StructuralNode::Heading { level, text } => {
                // 正文标题位于章节标题之下
                let depth = (*level).clamp(2, 6) as usize;
                Some(format!("{} {}", "#".repeat(depth), escape_text(text)))
            }
            StructuralNode::Paragraph(inlines) => {
                let text = render_inlines(inlines);
                let text = text.trim();
                (!text.is_empty()).then(|| escape_line_start(text))
            }
            StructuralNode::List { ordered, items } => self.list(*ordered, items),
            StructuralNode::Table { rows } => table(rows),
            StructuralNode::Image(image) => Some(self.image(image, None)),
            StructuralNode::Figure { image, caption } => Some(self.image(image, Some(caption))),
            StructuralNode::Quote(children) => {
                let inner = self.blocks(children).join("\n\n");
                if inner.is_empty() {
                    return None;
                }
                let quoted: Vec<String> = inner
                    .lines()
                    .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
                    .collect();
                Some(quoted.join("\n"))
            }
            StructuralNode::CodeBlock(code) => {
                let fence = if code.contains("```") { "~~~~" } else { "```" };
                Some(format!("{}\n{}\n{}", fence, code, fence))
            }
            StructuralNode::Rule => Some("***".to_string()),
        }
    }

    fn list(&self, ordered: bool, items: &[Vec<StructuralNode>]) -> Option<String> {
        let mut lines = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let marker = if ordered { format!("{}. ", index + 1) } else { "- ".to_string() };
            let indent = " ".repeat(marker.chars().count());
            let body = self.blocks(item).join("\n");

            let mut item_lines = body.lines();
            lines.push(format!("{}{}", marker, item_lines.next().unwrap_or_default()).trim_end().to_string());
            for line in item_lines {
                if line.is_empty() {
                    lines.push(String::new());
                } else {
                    lines.push(format!("{}{}", indent, line));
                }
            }
        }

        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// 有最终文件名的图片输出为图片链接，否则输出为文字占位
    fn image(&self, image: &ImageRef, caption: Option<&str>) -> String {
        let alt = if !image.alt.is_empty() {
            image.alt.as_str()
        } else {
            caption.unwrap_or_default()
        };

        let link = self.images.and_then(|mapping| mapping.get(&image.reference));
        let mut parts = Vec::new();
        match link {
            Some(link) => {
                let alt = if alt.is_empty() { "Image" } else { alt };
                parts.push(format!("![{}]({})", escape_text(alt), link.path()));
            }
            None => {
                let alt = if alt.is_empty() { fallback_image_name(&image.reference) } else { alt };
                parts.push(format!("*[Image: {}]*", escape_text(alt)));
            }
        }

        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            parts.push(format!("*{}*", escape_text(caption)));
        }
        if let Some(link) = link {
            parts.push(escape_text(&link.overlay));
        }

        parts.join("\n\n")
    }
}

fn fallback_image_name(reference: &str) -> &str {
    if path::has_scheme(reference) {
        return "image";
    }
    reference.rsplit('/').next().filter(|name| !name.is_empty()).unwrap_or("image")
}

fn table(rows: &[Vec<String>]) -> Option<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return None;
    }

    let row_line = |cells: &[String]| {
        let cells: Vec<String> = (0..columns)
            .map(|i| cells.get(i).map(|cell| escape_cell(cell)).unwrap_or_default())
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = vec![row_line(rows[0].as_slice())];
    lines.push(format!("|{}|", vec![" --- "; columns].join("|")));
    lines.extend(rows[1..].iter().map(|row| row_line(row.as_slice())));
    Some(lines.join("\n"))
}

fn render_inlines(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&escape_text(text)),
            Inline::Emphasis(children) => out.push_str(&wrap_marker(&render_inlines(children), "*")),
            Inline::Strong(children) => out.push_str(&wrap_marker(&render_inlines(children), "**")),
            Inline::Code(code) => {
                if code.contains('`') {
                    out.push_str(&format!("`` {} ``", code));
                } else {
                    out.push_str(&format!("`{}`", code));
                }
            }
            Inline::Link { href, children } => {
                let text = render_inlines(children);
                if path::has_scheme(href) && !href.starts_with("data:") {
                    let destination = if href.contains([' ', '(', ')']) {
                        format!("<{}>", href)
                    } else {
                        href.clone()
                    };
                    out.push_str(&wrap_around(&text, "[", &format!("]({})", destination)));
                } else {
                    // 书内链接在Markdown输出中没有对应目标
                    out.push_str(&text);
                }
            }
            Inline::LineBreak => out.push_str("  \n"),
        }
    }
    out
}

/// 标记放在首尾空白之内，避免 `* text*` 这样无效的强调
fn wrap_marker(text: &str, marker: &str) -> String {
    wrap_around(text, marker, marker)
}

fn wrap_around(text: &str, open: &str, close: &str) -> String {
    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let leading = &text[..text.len() - text.trim_start().len()];
    let trailing = &text[text.trim_end().len()..];
    format!("{}{}{}{}{}", leading, open, core, close, trailing)
}

/// 转义Markdown中有特殊含义的字符
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '*' | '_' | '`' | '[' | ']' | '<') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn escape_cell(text: &str) -> String {
    escape_text(text).replace('|', "\\|")
}

/// 段落开头的字符可能被解析为标题、引用或列表
fn escape_line_start(text: &str) -> String {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && (text[digits..].starts_with(". ") || text[digits..].starts_with(") ")) {
        return format!("{}\\{}", &text[..digits], &text[digits..]);
    }
    if text.starts_with(['#', '>', '-', '+', '=']) {
        return format!("\\{}", text);
    }
    text.to_string()
}
