//! 元数据处理模块
//!
//! 保存OPF `<metadata>` 中的原始条目，并按字段提供查询。

use std::collections::HashMap;

/// 各字段可能出现的标签名（已去掉命名空间前缀）
const TITLE_TAGS: &[&str] = &["title"];
const CREATOR_TAGS: &[&str] = &["creator", "author"];
const LANGUAGE_TAGS: &[&str] = &["language"];
const IDENTIFIER_TAGS: &[&str] = &["identifier"];
const PUBLISHER_TAGS: &[&str] = &["publisher"];
const DESCRIPTION_TAGS: &[&str] = &["description"];
const RIGHTS_TAGS: &[&str] = &["rights"];

/// 元数据值枚举，表示不同类型的元数据
#[derive(Debug, Clone)]
pub enum MetadataValue {
    /// Dublin Core标签元数据
    DublinCore {
        /// 元素内容
        value: String,
        /// 元素属性（如 id, role, scheme等）
        attributes: HashMap<String, String>,
    },
    /// meta标签的自定义元数据
    Meta(MetaValue),
}

/// meta标签值枚举
#[derive(Debug, Clone)]
pub enum MetaValue {
    /// 如 <meta name="cover" content="cover.jpg"/>
    NameBased { content: String },
    /// 如 <meta property="dcterms:modified">2025-06-05T11:24:01Z</meta>
    PropertyBased { content: String },
    /// 如 <meta refines="#creator" property="role">aut</meta>
    RefinesBased {
        /// 被精化的元素ID（不包含#前缀）
        refines_id: String,
        property: String,
        content: String,
    },
}

impl MetadataValue {
    fn content(&self) -> &str {
        match self {
            MetadataValue::DublinCore { value, .. } => value,
            MetadataValue::Meta(MetaValue::NameBased { content })
            | MetadataValue::Meta(MetaValue::PropertyBased { content })
            | MetadataValue::Meta(MetaValue::RefinesBased { content, .. }) => content,
        }
    }
}

/// 创建者信息(作者、编辑者等)
#[derive(Debug, Clone, PartialEq)]
pub struct Creator {
    pub name: String,
    /// 角色(如author、editor等)
    pub role: Option<String>,
    /// 显示顺序
    pub display_seq: Option<u32>,
    /// 元素ID（用于关联refines元数据）
    pub id: Option<String>,
}

impl Creator {
    /// 没有声明角色或角色为作者
    pub fn is_author(&self) -> bool {
        self.role.as_deref().is_none_or(|role| role == "author")
    }
}

/// 标识符信息
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub value: String,
    /// 标识符类型(如ISBN、UUID等)
    pub scheme: Option<String>,
    pub id: Option<String>,
}

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// key为标签名（如"title", "cover", "dcterms:modified"），value按出现顺序保存
    raw_metadata: HashMap<String, Vec<MetadataValue>>,
    /// key为被精化的元素ID
    refines_metadata: HashMap<String, Vec<MetaValue>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加Dublin Core元数据
    pub fn add_dublin_core(&mut self, tag: String, value: String, attributes: HashMap<String, String>) {
        self.raw_metadata
            .entry(tag)
            .or_default()
            .push(MetadataValue::DublinCore { value, attributes });
    }

    /// 添加基于name的meta元数据
    pub fn add_meta_name_based(&mut self, name: String, content: String) {
        self.raw_metadata
            .entry(name)
            .or_default()
            .push(MetadataValue::Meta(MetaValue::NameBased { content }));
    }

    /// 添加基于property的meta元数据
    pub fn add_meta_property_based(&mut self, property: String, content: String) {
        self.raw_metadata
            .entry(property)
            .or_default()
            .push(MetadataValue::Meta(MetaValue::PropertyBased { content }));
    }

    /// 添加基于refines的meta元数据
    pub fn add_meta_refines_based(&mut self, refines_id: String, property: String, content: String) {
        self.refines_metadata
            .entry(refines_id.clone())
            .or_default()
            .push(MetaValue::RefinesBased { refines_id, property, content });
    }

    fn find_first(&self, tags: &[&str]) -> Option<String> {
        tags.iter()
            .filter_map(|tag| self.raw_metadata.get(*tag))
            .flat_map(|values| values.iter())
            .map(|value| value.content().trim())
            .find(|content| !content.is_empty())
            .map(str::to_string)
    }

    fn find_all(&self, tags: &[&str]) -> Vec<&MetadataValue> {
        tags.iter()
            .filter_map(|tag| self.raw_metadata.get(*tag))
            .flat_map(|values| values.iter())
            .collect()
    }

    pub fn title(&self) -> Option<String> {
        self.find_first(TITLE_TAGS)
    }

    pub fn language(&self) -> Option<String> {
        self.find_first(LANGUAGE_TAGS)
    }

    pub fn publisher(&self) -> Option<String> {
        self.find_first(PUBLISHER_TAGS)
    }

    pub fn description(&self) -> Option<String> {
        self.find_first(DESCRIPTION_TAGS)
    }

    pub fn rights(&self) -> Option<String> {
        self.find_first(RIGHTS_TAGS)
    }

    /// 获取所有创建者，按display-seq排序（未声明的保持原顺序排在后面）
    pub fn creators(&self) -> Vec<Creator> {
        let mut creators: Vec<Creator> = self
            .find_all(CREATOR_TAGS)
            .into_iter()
            .filter_map(|value| self.extract_creator(value))
            .collect();
        creators.sort_by_key(|creator| creator.display_seq.unwrap_or(u32::MAX));
        creators
    }

    /// 获取所有标识符
    pub fn identifiers(&self) -> Vec<Identifier> {
        self.find_all(IDENTIFIER_TAGS)
            .into_iter()
            .filter(|value| !value.content().trim().is_empty())
            .map(|value| match value {
                MetadataValue::DublinCore { value, attributes } => Identifier {
                    value: value.trim().to_string(),
                    scheme: attributes.get("scheme").cloned(),
                    id: attributes.get("id").cloned(),
                },
                other => Identifier {
                    value: other.content().trim().to_string(),
                    scheme: None,
                    id: None,
                },
            })
            .collect()
    }

    /// 从元数据值中提取创建者信息（支持EPUB3的refines关联）
    fn extract_creator(&self, value: &MetadataValue) -> Option<Creator> {
        let name = value.content().trim();
        if name.is_empty() {
            return None;
        }

        let MetadataValue::DublinCore { attributes, .. } = value else {
            return Some(Creator { name: name.to_string(), role: None, display_seq: None, id: None });
        };

        let mut creator = Creator {
            name: name.to_string(),
            role: attributes.get("role").map(|role| relator_name(role)),
            display_seq: None,
            id: attributes.get("id").cloned(),
        };

        let refines = creator
            .id
            .as_ref()
            .and_then(|id| self.refines_metadata.get(id))
            .into_iter()
            .flatten();
        for meta in refines {
            if let MetaValue::RefinesBased { property, content, .. } = meta {
                match property.as_str() {
                    "role" => creator.role = Some(relator_name(content)),
                    "display-seq" => creator.display_seq = content.trim().parse::<u32>().ok(),
                    _ => {}
                }
            }
        }

        Some(creator)
    }
}

/// MARC relator代码转为可读角色名
fn relator_name(code: &str) -> String {
    match code.trim() {
        "aut" => "author".to_string(),
        "edt" => "editor".to_string(),
        "trl" => "translator".to_string(),
        "ill" => "illustrator".to_string(),
        other => other.to_string(),
    }
}
