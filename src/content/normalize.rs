//! 把章节文档规范化为结构树
//!
//! 文档先用quick-xml做一次良构性检查，再交给scraper按HTML规则宽松解析，
//! 所以不良构的XHTML仍能得到尽力而为的结果，同时记录一条警告。

use std::borrow::Cow;

use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::content::chapter::{Chapter, TitleSource, resolve_title};
use crate::content::node::{ImageRef, Inline, StructuralNode};
use crate::epub::error::{EpubError, Warning};
use crate::epub::path;
use crate::epub::{SpineEntry, TocLabels};

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));
static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));

const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "template"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup",
    "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "ul",
];

const IMAGE_TAGS: &[&str] = &["img", "image"];

/// HTML中没有内容的元素，自闭合写法对HTML解析器也成立
const VOID_TAGS: &[&[u8]] = &[
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input", b"link", b"meta", b"param", b"source",
    b"track", b"wbr",
];

/// 规范化一个脊柱文档
///
/// # 参数
/// * `entry` - 脊柱条目
/// * `raw` - 文档的原始字节，条目在容器中不存在时为None
/// * `toc_labels` - 目录标签，用于标题回退
///
/// 文档缺失、不是UTF-8或不是HTML/XHTML时返回空的占位章节，
/// 章节序号保持不变；所有问题都以 `MalformedDocument` 警告返回。
pub fn normalize(entry: &SpineEntry, raw: Option<&[u8]>, toc_labels: &TocLabels) -> (Chapter, Option<Warning>) {
    let ordinal = entry.ordinal();
    let toc_label = toc_labels.get(&entry.path);
    let malformed = |reason: String| {
        warn!(chapter = ordinal, "章节文档格式错误 {}: {}", entry.path, reason);
        Warning::new(
            Some(ordinal),
            EpubError::MalformedDocument { href: entry.path.clone(), reason },
        )
    };
    let placeholder = || Chapter::placeholder(ordinal, &entry.path, toc_label);

    let Some(raw) = raw else {
        return (placeholder(), Some(malformed("文档在容器中不存在".to_string())));
    };
    if !entry.is_markup() {
        return (placeholder(), Some(malformed(format!("不支持的媒体类型 {}", entry.media_type))));
    }

    let bytes = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return (placeholder(), Some(malformed(format!("不是有效的UTF-8文本: {}", e)))),
    };

    let mut warning = None;
    let markup = if entry.is_xhtml() {
        match prepare_xhtml(text) {
            Ok(expanded) => Cow::Owned(expanded),
            Err(reason) => {
                warning = Some(malformed(reason));
                Cow::Borrowed(text)
            }
        }
    } else {
        Cow::Borrowed(text)
    };

    let document = Html::parse_document(&markup);
    let chapter = build_chapter(entry, &document, toc_label);
    debug!(
        chapter = ordinal,
        nodes = chapter.nodes.len(),
        "已规范化 {} -> {}",
        entry.path,
        chapter.title
    );

    (chapter, warning)
}

/// 检查XHTML是否良构，并把非空元素的自闭合写法展开为成对标签
///
/// HTML解析器把 `<span/>` 当作开始标签，其后的文字会全部落进这个元素。
fn prepare_xhtml(text: &str) -> std::result::Result<String, String> {
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(text.len()));
    let mut depth: usize = 0;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(format!("位置{}: {}", reader.buffer_position(), e)),
        };
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }

        let written = match event {
            Event::Empty(e) if !VOID_TAGS.contains(&e.local_name().as_ref()) => {
                let end = e.to_end().into_owned();
                writer
                    .write_event(Event::Start(e))
                    .and_then(|_| writer.write_event(Event::End(end)))
            }
            other => writer.write_event(other),
        };
        written.map_err(|e| format!("重写文档失败: {}", e))?;
    }

    if depth > 0 {
        return Err(format!("文档结束时仍有{}个元素未闭合", depth));
    }
    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

fn build_chapter(entry: &SpineEntry, document: &Html, toc_label: Option<&str>) -> Chapter {
    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let first_heading = root
        .select(&HEADING_SELECTOR)
        .map(|heading| collapse_whitespace(&heading.text().collect::<String>()))
        .find(|text| !text.is_empty());

    let mut walker = Walker::new(path::parent_dir(&entry.path));
    let mut blocks = Blocks::default();
    walker.walk_children(root, &mut blocks);
    blocks.flush();
    let mut nodes = blocks.nodes;

    let (title, title_source) = resolve_title(entry.ordinal(), first_heading.as_deref(), toc_label);

    // 用作章节标题的首个标题不再重复出现在正文中
    if title_source == TitleSource::Heading {
        if let Some(StructuralNode::Heading { text, .. }) = nodes.first() {
            if *text == title {
                nodes.remove(0);
            }
        }
    }

    Chapter {
        ordinal: entry.ordinal(),
        title,
        title_source,
        source_path: entry.path.clone(),
        nodes,
    }
}

/// 正在构造的块级节点序列和尚未成段的行内片段
#[derive(Default)]
struct Blocks {
    nodes: Vec<StructuralNode>,
    inline: Vec<Inline>,
}

impl Blocks {
    fn push(&mut self, node: StructuralNode) {
        self.flush();
        self.nodes.push(node);
    }

    /// 把累积的行内片段作为一个段落输出，空白段落被丢弃
    fn flush(&mut self) {
        if self.inline.is_empty() {
            return;
        }
        let inline = collapse_inlines(std::mem::take(&mut self.inline));
        if has_visible_content(&inline) {
            self.nodes.push(StructuralNode::Paragraph(inline));
        }
    }
}

/// 文档遍历状态
struct Walker<'a> {
    /// 章节文档所在目录，用于解析图片路径
    base_dir: &'a str,
    /// 最近一次分页标记给出的页码
    page: Option<u32>,
    /// 当前所在的带说明容器的说明文字
    figure_caption: Option<String>,
}

impl<'a> Walker<'a> {
    fn new(base_dir: &'a str) -> Self {
        Self { base_dir, page: None, figure_caption: None }
    }

    fn walk_children(&mut self, el: ElementRef, out: &mut Blocks) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => out.inline.push(Inline::Text(text.text.to_string())),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.walk_element(child, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_element(&mut self, el: ElementRef, out: &mut Blocks) {
        let element = el.value();
        let name = element.name();

        if SKIPPED_TAGS.contains(&name) {
            return;
        }

        if is_page_break(el) {
            if let Some(page) = page_number(el) {
                self.page = Some(page);
            }
            // 只含页码的文字不进入正文
            let label: String = el.text().collect();
            if label.trim().chars().all(|c| c.is_ascii_digit()) {
                for child in el.children().filter_map(ElementRef::wrap) {
                    self.walk_element(child, out);
                }
            } else {
                self.walk_children(el, out);
            }
            return;
        }

        if BLOCK_TAGS.contains(&name) && name != "figcaption" {
            if let Some((caption_el, caption)) = find_caption(el) {
                let is_figure = name == "figure";
                let captioned = if is_figure {
                    !image_descendants(el).is_empty()
                } else {
                    el.children().filter_map(ElementRef::wrap).any(is_captioned_image)
                };
                if captioned {
                    self.walk_captioned(el, caption_el, caption, is_figure, out);
                    return;
                }
            }
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(2);
                let text = collapse_whitespace(&el.text().collect::<String>());
                if text.is_empty() {
                    out.flush();
                } else {
                    out.push(StructuralNode::Heading { level, text });
                }
                for image in image_descendants(el) {
                    self.push_image(image, out);
                }
            }
            "ul" | "ol" => {
                let items = self.list_items(el);
                if items.is_empty() {
                    out.flush();
                } else {
                    out.push(StructuralNode::List { ordered: name == "ol", items });
                }
            }
            "table" => {
                let rows = table_rows(el);
                if rows.is_empty() {
                    out.flush();
                } else {
                    out.push(StructuralNode::Table { rows });
                }
                for image in image_descendants(el) {
                    self.push_image(image, out);
                }
            }
            "blockquote" => {
                let mut inner = Blocks::default();
                self.walk_children(el, &mut inner);
                inner.flush();
                if inner.nodes.is_empty() {
                    out.flush();
                } else {
                    out.push(StructuralNode::Quote(inner.nodes));
                }
            }
            "pre" => {
                let raw: String = el.text().collect();
                let code = raw.strip_prefix('\n').unwrap_or(&raw).trim_end();
                if code.trim().is_empty() {
                    out.flush();
                } else {
                    out.push(StructuralNode::CodeBlock(code.to_string()));
                }
            }
            "hr" => out.push(StructuralNode::Rule),
            "br" => out.inline.push(Inline::LineBreak),
            "img" | "image" => self.push_image(el, out),
            "em" | "i" | "cite" | "dfn" | "var" => self.walk_inline(el, out, Inline::Emphasis),
            "strong" | "b" => self.walk_inline(el, out, Inline::Strong),
            "code" | "kbd" | "samp" | "tt" => {
                if contains_block(el) {
                    self.walk_children(el, out);
                } else {
                    let code = collapse_whitespace(&el.text().collect::<String>());
                    if !code.is_empty() {
                        out.inline.push(Inline::Code(code));
                    }
                }
            }
            "a" => {
                if contains_block(el) {
                    self.walk_children(el, out);
                    return;
                }
                let children = self.inline_children(el);
                match element.attr("href") {
                    Some(href) if !children.is_empty() => out.inline.push(Inline::Link {
                        href: href.trim().to_string(),
                        children,
                    }),
                    _ => out.inline.extend(children),
                }
            }
            _ if BLOCK_TAGS.contains(&name) => {
                out.flush();
                self.walk_children(el, out);
                out.flush();
            }
            // 其他元素（span、svg等）透明处理
            _ => self.walk_children(el, out),
        }
    }

    /// 遍历带说明的容器
    ///
    /// `<figure>` 中的图片都使用说明文字；其他容器只有直接包含的图片使用。
    fn walk_captioned(
        &mut self,
        el: ElementRef,
        caption_el: ElementRef,
        caption: String,
        whole: bool,
        out: &mut Blocks,
    ) {
        out.flush();
        let outer = self.figure_caption.take();
        for child in el.children() {
            if child.id() == caption_el.id() {
                continue;
            }
            match child.value() {
                Node::Text(text) => out.inline.push(Inline::Text(text.text.to_string())),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.figure_caption = if whole || is_captioned_image(child) {
                            Some(caption.clone())
                        } else {
                            outer.clone()
                        };
                        self.walk_element(child, out);
                    }
                }
                _ => {}
            }
        }
        self.figure_caption = outer;
        out.flush();
    }

    /// 行内格式元素；包含块级内容时退化为透明处理
    fn walk_inline(&mut self, el: ElementRef, out: &mut Blocks, wrap: fn(Vec<Inline>) -> Inline) {
        if contains_block(el) {
            self.walk_children(el, out);
            return;
        }
        let children = self.inline_children(el);
        if !children.is_empty() {
            out.inline.push(wrap(children));
        }
    }

    fn inline_children(&mut self, el: ElementRef) -> Vec<Inline> {
        let mut inner = Blocks::default();
        self.walk_children(el, &mut inner);
        inner.inline
    }

    fn list_items(&mut self, el: ElementRef) -> Vec<Vec<StructuralNode>> {
        let mut items = Vec::new();
        for child in el.children().filter_map(ElementRef::wrap) {
            let mut item = Blocks::default();
            if child.value().name() == "li" {
                self.walk_children(child, &mut item);
            } else {
                self.walk_element(child, &mut item);
            }
            item.flush();
            if !item.nodes.is_empty() {
                items.push(item.nodes);
            }
        }
        items
    }

    fn push_image(&mut self, el: ElementRef, out: &mut Blocks) {
        let Some(image) = self.image_ref(el) else {
            return;
        };
        let node = match &self.figure_caption {
            Some(caption) => StructuralNode::Figure { image, caption: caption.clone() },
            None => StructuralNode::Image(image),
        };
        out.push(node);
    }

    fn image_ref(&self, el: ElementRef) -> Option<ImageRef> {
        let element = el.value();
        // SVG的 <image> 使用 href 或 xlink:href，两者本地名相同
        let src = if element.name() == "img" {
            element.attr("src")
        } else {
            element.attrs().find(|(name, _)| *name == "href").map(|(_, value)| value)
        }?;
        let src = src.trim();
        if src.is_empty() {
            return None;
        }

        let reference = if path::has_scheme(src) {
            src.to_string()
        } else {
            path::resolve(self.base_dir, src)
        };

        Some(ImageRef {
            reference,
            alt: element.attr("alt").map(collapse_whitespace).unwrap_or_default(),
            caption: self.figure_caption.clone(),
            page: self.page,
        })
    }
}

/// 查找容器的说明元素：figure的figcaption，或class含caption的直接子元素
fn find_caption(el: ElementRef) -> Option<(ElementRef, String)> {
    let is_figure = el.value().name() == "figure";
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| {
            (is_figure && child.value().name() == "figcaption")
                || child.value().classes().any(|class| class.to_lowercase().contains("caption"))
        })
        .map(|child| (child, collapse_whitespace(&child.text().collect::<String>())))
        .find(|(_, caption)| !caption.is_empty())
}

fn image_descendants<'a>(el: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|e| IMAGE_TAGS.contains(&e.value().name()))
        .collect()
}

/// 图片元素本身，或只包着一张图片、没有文字的行内元素
fn is_captioned_image(el: ElementRef) -> bool {
    let name = el.value().name();
    if IMAGE_TAGS.contains(&name) {
        return true;
    }
    !BLOCK_TAGS.contains(&name)
        && image_descendants(el).len() == 1
        && el.text().all(|text| text.trim().is_empty())
}

fn contains_block(el: ElementRef) -> bool {
    el.descendants().skip(1).filter_map(ElementRef::wrap).any(|e| {
        let name = e.value().name();
        BLOCK_TAGS.contains(&name) || IMAGE_TAGS.contains(&name)
    })
}

fn table_rows(el: ElementRef) -> Vec<Vec<String>> {
    el.select(&ROW_SELECTOR)
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

fn is_page_break(el: ElementRef) -> bool {
    let element = el.value();
    element
        .attr("epub:type")
        .is_some_and(|types| types.split_whitespace().any(|t| t == "pagebreak"))
        || element.attr("role") == Some("doc-pagebreak")
}

/// 从分页标记的title、aria-label、文字或id中取页码
fn page_number(el: ElementRef) -> Option<u32> {
    let element = el.value();
    let text: String = el.text().collect();
    [element.attr("title"), element.attr("aria-label"), Some(text.as_str()), element.attr("id")]
        .into_iter()
        .flatten()
        .find_map(first_number)
}

fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 合并连续空白并去掉段首空白，空白跨越行内元素边界时也只保留一个
fn collapse_inlines(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut previous_space = true;
    collapse_run(inlines, &mut previous_space)
}

fn collapse_run(inlines: Vec<Inline>, previous_space: &mut bool) -> Vec<Inline> {
    let mut collapsed = Vec::new();

    for inline in inlines {
        match inline {
            Inline::Text(text) => {
                let mut run = String::with_capacity(text.len());
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        if !*previous_space {
                            run.push(' ');
                            *previous_space = true;
                        }
                    } else {
                        run.push(ch);
                        *previous_space = false;
                    }
                }
                push_text(&mut collapsed, run);
            }
            Inline::Emphasis(children) => wrap_collapsed(&mut collapsed, children, previous_space, Inline::Emphasis),
            Inline::Strong(children) => wrap_collapsed(&mut collapsed, children, previous_space, Inline::Strong),
            Inline::Link { href, children } => {
                let children = collapse_run(children, previous_space);
                if has_visible_content(&children) {
                    collapsed.push(Inline::Link { href, children });
                } else if !children.is_empty() {
                    push_text(&mut collapsed, " ".to_string());
                }
            }
            Inline::Code(code) => {
                collapsed.push(Inline::Code(code));
                *previous_space = false;
            }
            Inline::LineBreak => {
                if let Some(Inline::Text(last)) = collapsed.last_mut() {
                    let trimmed = last.trim_end().len();
                    last.truncate(trimmed);
                }
                collapsed.push(Inline::LineBreak);
                *previous_space = true;
            }
        }
    }

    collapsed
}

fn wrap_collapsed(
    collapsed: &mut Vec<Inline>,
    children: Vec<Inline>,
    previous_space: &mut bool,
    wrap: fn(Vec<Inline>) -> Inline,
) {
    let children = collapse_run(children, previous_space);
    if has_visible_content(&children) {
        collapsed.push(wrap(children));
    } else if !children.is_empty() {
        push_text(collapsed, " ".to_string());
    }
}

fn push_text(collapsed: &mut Vec<Inline>, run: String) {
    if run.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = collapsed.last_mut() {
        if last.ends_with(' ') && run.starts_with(' ') {
            last.push_str(&run[1..]);
        } else {
            last.push_str(&run);
        }
        return;
    }
    collapsed.push(Inline::Text(run));
}

fn has_visible_content(inlines: &[Inline]) -> bool {
    inlines.iter().any(|inline| match inline {
        Inline::Code(code) => !code.is_empty(),
        Inline::LineBreak => false,
        other => !Inline::plain_text(std::slice::from_ref(other)).trim().is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, media_type: &str) -> SpineEntry {
        SpineEntry {
            position: 0,
            idref: "c1".to_string(),
            path: path.to_string(),
            media_type: media_type.to_string(),
            linear: true,
        }
    }

    fn xhtml(body: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>t</title><style>p {{ color: red; }}</style></head>
<body>{}</body>
</html>"#,
            body
        )
        .into_bytes()
    }

    fn normalize_body(body: &str) -> (Chapter, Option<Warning>) {
        let entry = entry("OEBPS/text/c1.xhtml", "application/xhtml+xml");
        normalize(&entry, Some(xhtml(body).as_slice()), &TocLabels::new())
    }

    #[test]
    fn test_heading_becomes_title() {
        let (chapter, warning) = normalize_body("<h1>Intro</h1>\n<p>Hello   <em>world</em></p>");
        assert!(warning.is_none());
        assert_eq!(chapter.title, "Intro");
        assert_eq!(chapter.title_source, TitleSource::Heading);
        assert_eq!(
            chapter.nodes,
            vec![StructuralNode::Paragraph(vec![
                Inline::Text("Hello ".to_string()),
                Inline::Emphasis(vec![Inline::Text("world".to_string())]),
            ])]
        );
    }

    #[test]
    fn test_toc_label_and_synthesized_titles() {
        let entry = entry("OEBPS/text/c1.xhtml", "application/xhtml+xml");
        let mut labels = TocLabels::new();
        labels.insert("OEBPS/text/c1.xhtml".to_string(), "From TOC");

        let (chapter, _) = normalize(&entry, Some(xhtml("<p>text</p>").as_slice()), &labels);
        assert_eq!(chapter.title, "From TOC");
        assert_eq!(chapter.title_source, TitleSource::TocLabel);

        let (chapter, _) = normalize(&entry, Some(xhtml("<p>text</p>").as_slice()), &TocLabels::new());
        assert_eq!(chapter.title, "Chapter 1");
    }

    #[test]
    fn test_figure_caption() {
        let (chapter, _) = normalize_body(
            r#"<figure><img src="../images/a%20b.png" alt="An image"/><figcaption>The <b>Cover</b></figcaption></figure>"#,
        );
        match &chapter.nodes[..] {
            [StructuralNode::Figure { image, caption }] => {
                assert_eq!(caption, "The Cover");
                assert_eq!(image.reference, "OEBPS/images/a b.png");
                assert_eq!(image.alt, "An image");
                assert_eq!(image.caption.as_deref(), Some("The Cover"));
            }
            other => panic!("unexpected nodes: {:?}", other),
        }
    }

    #[test]
    fn test_caption_class_container() {
        let (chapter, _) = normalize_body(
            r#"<div class="illus"><img src="../images/map.png"/><p class="img-caption">World map</p></div>"#,
        );
        assert!(matches!(
            &chapter.nodes[..],
            [StructuralNode::Figure { caption, .. }] if caption == "World map"
        ));
    }

    #[test]
    fn test_page_breaks_number_images() {
        let (chapter, _) = normalize_body(
            r#"<p>before</p><img src="../images/a.png"/>
<span epub:type="pagebreak" title="12"></span>
<p>after</p><img src="../images/b.png"/>
<div role="doc-pagebreak" id="page_13"></div><img src="../images/c.png"/>"#,
        );
        let pages: Vec<Option<u32>> = chapter.images().iter().map(|i| i.page).collect();
        assert_eq!(pages, vec![None, Some(12), Some(13)]);
        // 分页标记不产生正文
        assert_eq!(chapter.nodes.iter().filter(|n| matches!(n, StructuralNode::Paragraph(_))).count(), 2);
    }

    #[test]
    fn test_self_closing_page_break_keeps_following_text() {
        let (chapter, warning) = normalize_body(
            r#"<p>Before the break <span epub:type="pagebreak" id="page5" title="5"/>after the break, important words.</p>
<p><a id="anchor"/>Anchored text.</p><img src="../images/a.png"/>"#,
        );
        assert!(warning.is_none());
        assert_eq!(
            chapter.nodes[..2],
            [
                StructuralNode::Paragraph(vec![Inline::Text(
                    "Before the break after the break, important words.".to_string()
                )]),
                StructuralNode::Paragraph(vec![Inline::Text("Anchored text.".to_string())]),
            ]
        );
        assert_eq!(chapter.images()[0].page, Some(5));
    }

    #[test]
    fn test_page_break_with_text_content() {
        let (chapter, _) = normalize_body(
            r#"<p>one <span role="doc-pagebreak" aria-label="7">7</span>two</p>
<p><span epub:type="pagebreak" id="p8">Page 8</span></p><img src="../images/a.png"/>"#,
        );
        assert_eq!(
            chapter.nodes[..2],
            [
                StructuralNode::Paragraph(vec![Inline::Text("one two".to_string())]),
                StructuralNode::Paragraph(vec![Inline::Text("Page 8".to_string())]),
            ]
        );
        assert_eq!(chapter.images()[0].page, Some(8));
    }

    #[test]
    fn test_wrapped_image_in_caption_container() {
        let (chapter, _) = normalize_body(
            r#"<div class="illus"><a href="map-large.xhtml"><img src="../images/map.png"/></a><p class="caption">Old map</p></div>"#,
        );
        assert!(matches!(
            &chapter.nodes[..],
            [StructuralNode::Figure { caption, .. }] if caption == "Old map"
        ));
    }

    #[test]
    fn test_caption_class_does_not_capture_distant_images() {
        let (chapter, _) = normalize_body(
            r#"<div class="chapter"><p class="chapter-caption">A subtitle for the chapter</p>
<p>Body text.</p><p><img src="../images/a.png"/></p></div>"#,
        );
        assert_eq!(chapter.nodes.len(), 3);
        assert_eq!(
            chapter.nodes[0],
            StructuralNode::Paragraph(vec![Inline::Text("A subtitle for the chapter".to_string())])
        );
        assert!(matches!(&chapter.nodes[2], StructuralNode::Image(image) if image.caption.is_none()));
    }

    #[test]
    fn test_svg_image_reference() {
        let (chapter, _) = normalize_body(
            r#"<div><svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><image xlink:href="../images/cover.jpg"/></svg></div>"#,
        );
        let images = chapter.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].reference, "OEBPS/images/cover.jpg");
    }

    #[test]
    fn test_external_image_keeps_url() {
        let (chapter, _) = normalize_body(r#"<img src="https://example.com/x.png" alt="remote"/>"#);
        assert_eq!(chapter.images()[0].reference, "https://example.com/x.png");
    }

    #[test]
    fn test_lists_tables_and_skipped_content() {
        let (chapter, _) = normalize_body(
            r#"<script>var x = 1;</script>
<ul><li>one</li><li>two<ol><li>nested</li></ol></li></ul>
<table><tr><th>Name</th><th>Value</th></tr><tr><td>a</td><td>1</td></tr></table>"#,
        );
        assert_eq!(chapter.nodes.len(), 2);
        match &chapter.nodes[0] {
            StructuralNode::List { ordered, items } => {
                assert!(!ordered);
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1][1], StructuralNode::List { ordered: true, .. }));
            }
            other => panic!("unexpected node: {:?}", other),
        }
        assert_eq!(
            chapter.nodes[1],
            StructuralNode::Table {
                rows: vec![
                    vec!["Name".to_string(), "Value".to_string()],
                    vec!["a".to_string(), "1".to_string()],
                ]
            }
        );
    }

    #[test]
    fn test_empty_paragraphs_dropped() {
        let (chapter, _) = normalize_body("<p>  </p><p><b> </b></p><p>text</p>");
        assert_eq!(chapter.nodes, vec![StructuralNode::Paragraph(vec![Inline::Text("text".to_string())])]);
    }

    #[test]
    fn test_not_well_formed_still_converted() {
        let (chapter, warning) = normalize_body("<p>unclosed <b>bold</p><p>next</p>");
        let warning = warning.expect("warning");
        assert!(matches!(warning.error, EpubError::MalformedDocument { .. }));
        assert_eq!(warning.chapter, Some(1));
        assert!(!chapter.nodes.is_empty());
    }

    #[test]
    fn test_invalid_utf8_yields_placeholder() {
        let entry = entry("OEBPS/text/c1.xhtml", "application/xhtml+xml");
        let (chapter, warning) = normalize(&entry, Some(b"<p>\xff\xfe broken</p>".as_slice()), &TocLabels::new());
        assert!(chapter.is_empty());
        assert_eq!(chapter.title, "Chapter 1");
        assert!(matches!(warning.map(|w| w.error), Some(EpubError::MalformedDocument { .. })));
    }

    #[test]
    fn test_missing_and_non_markup_documents() {
        let entry_missing = entry("OEBPS/text/c1.xhtml", "application/xhtml+xml");
        let (chapter, warning) = normalize(&entry_missing, None, &TocLabels::new());
        assert!(chapter.is_empty());
        assert!(warning.is_some());

        let entry_image = entry("OEBPS/images/a.png", "image/png");
        let (chapter, warning) = normalize(&entry_image, Some(b"\x89PNG".as_slice()), &TocLabels::new());
        assert!(chapter.is_empty());
        assert!(warning.is_some());
    }

    #[test]
    fn test_html_media_type_skips_well_formed_check() {
        let entry = entry("OEBPS/c1.html", "text/html");
        let (chapter, warning) = normalize(&entry, Some(b"<p>one<br>two</p>".as_slice()), &TocLabels::new());
        assert!(warning.is_none());
        assert_eq!(
            chapter.nodes,
            vec![StructuralNode::Paragraph(vec![
                Inline::Text("one".to_string()),
                Inline::LineBreak,
                Inline::Text("two".to_string()),
            ])]
        );
    }
}
