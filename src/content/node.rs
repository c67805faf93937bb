//! 章节内容的结构树

/// 段落中的行内片段
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Code(String),
    Link { href: String, children: Vec<Inline> },
    LineBreak,
}

impl Inline {
    /// 行内片段的纯文本
    pub fn plain_text(inlines: &[Inline]) -> String {
        let mut text = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(t) | Inline::Code(t) => text.push_str(t),
                Inline::Emphasis(children) | Inline::Strong(children) | Inline::Link { children, .. } => {
                    text.push_str(&Inline::plain_text(children));
                }
                Inline::LineBreak => text.push('\n'),
            }
        }
        text
    }
}

/// 图片引用
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    /// 图片在容器中的完整路径；外部或data URL保持原样
    pub reference: String,
    pub alt: String,
    pub caption: Option<String>,
    /// 图片之前最近的分页标记给出的页码
    pub page: Option<u32>,
}

/// 结构树节点
#[derive(Debug, Clone, PartialEq)]
pub enum StructuralNode {
    Heading { level: u8, text: String },
    Paragraph(Vec<Inline>),
    /// 每个列表项是一组块级节点，嵌套列表出现在其中
    List { ordered: bool, items: Vec<Vec<StructuralNode>> },
    /// 第一行作为表头
    Table { rows: Vec<Vec<String>> },
    Image(ImageRef),
    Figure { image: ImageRef, caption: String },
    Quote(Vec<StructuralNode>),
    CodeBlock(String),
    Rule,
}

impl StructuralNode {
    /// 按文档顺序收集节点及其子节点中的图片
    pub fn collect_images<'a>(&'a self, images: &mut Vec<&'a ImageRef>) {
        match self {
            StructuralNode::Image(image) | StructuralNode::Figure { image, .. } => images.push(image),
            StructuralNode::List { items, .. } => {
                for node in items.iter().flatten() {
                    node.collect_images(images);
                }
            }
            StructuralNode::Quote(children) => {
                for node in children {
                    node.collect_images(images);
                }
            }
            StructuralNode::Heading { .. }
            | StructuralNode::Paragraph(_)
            | StructuralNode::Table { .. }
            | StructuralNode::CodeBlock(_)
            | StructuralNode::Rule => {}
        }
    }
}
