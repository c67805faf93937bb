//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::opf::{manifest::ManifestItem, metadata::Metadata, spine::SpineItem};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// package元素的unique-identifier属性
    pub unique_identifier: Option<String>,
    pub metadata: Metadata,
    /// 清单项，key为项目ID
    pub manifest: HashMap<String, ManifestItem>,
    /// 脊柱(阅读顺序)
    pub spine: Vec<SpineItem>,
    /// 脊柱的toc属性（NCX清单项ID）
    pub spine_toc: Option<String>,
}

/// 等待文本内容的meta标签
enum PendingMeta {
    Property(String),
    Refines { id: String, property: String },
}

#[derive(PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

/// 收集元素的属性（使用去掉命名空间前缀的本地名）
fn collect_attributes(e: &BytesStart) -> Result<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
        attributes.insert(key, value);
    }
    Ok(attributes)
}

impl Opf {
    /// 解析OPF文件内容
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut opf = Opf {
            version: String::new(),
            unique_identifier: None,
            metadata: Metadata::new(),
            manifest: HashMap::new(),
            spine: Vec::new(),
            spine_toc: None,
        };

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut text_content = String::new();
        let mut element_attributes = HashMap::new();
        let mut pending_meta: Option<PendingMeta> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| EpubError::OpfParseError(format!("XML解析错误: {}", e)))?;
            match event {
                Event::Start(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match local_name.as_str() {
                        "package" => {
                            let attributes = collect_attributes(e)?;
                            opf.version = attributes.get("version").cloned().unwrap_or_default();
                            opf.unique_identifier = attributes.get("unique-identifier").cloned();
                        }
                        "metadata" => section = Section::Metadata,
                        "manifest" => section = Section::Manifest,
                        "spine" => {
                            section = Section::Spine;
                            opf.spine_toc = collect_attributes(e)?.get("toc").cloned();
                        }
                        "item" if section == Section::Manifest => opf.add_manifest_item(e)?,
                        "itemref" if section == Section::Spine => opf.add_spine_item(e)?,
                        "meta" if section == Section::Metadata => {
                            pending_meta = opf.handle_meta(e)?;
                            text_content.clear();
                        }
                        _ if section == Section::Metadata => {
                            element_attributes = collect_attributes(e)?;
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    let local_name = e.local_name();
                    match local_name.as_ref() {
                        b"meta" if section == Section::Metadata => {
                            opf.handle_meta(e)?;
                        }
                        b"item" if section == Section::Manifest => opf.add_manifest_item(e)?,
                        b"itemref" if section == Section::Spine => opf.add_spine_item(e)?,
                        b"spine" => {
                            opf.spine_toc = collect_attributes(e)?.get("toc").cloned();
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match local_name.as_str() {
                        "metadata" | "manifest" | "spine" => section = Section::None,
                        "meta" if section == Section::Metadata => {
                            let content = text_content.trim().to_string();
                            match pending_meta.take() {
                                Some(PendingMeta::Property(property)) => {
                                    opf.metadata.add_meta_property_based(property, content);
                                }
                                Some(PendingMeta::Refines { id, property }) => {
                                    opf.metadata.add_meta_refines_based(id, property, content);
                                }
                                None => {}
                            }
                        }
                        _ if section == Section::Metadata => {
                            let content = text_content.trim();
                            if !content.is_empty() {
                                // local_name已去掉命名空间前缀，<dc:title> 解析为 "title"
                                opf.metadata.add_dublin_core(
                                    local_name,
                                    content.to_string(),
                                    std::mem::take(&mut element_attributes),
                                );
                            }
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                    text_content.push_str(&text);
                }
                Event::CData(e) => {
                    text_content.push_str(&String::from_utf8_lossy(&e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(opf)
    }

    /// 处理meta标签，返回需要等待文本内容的meta
    fn handle_meta(&mut self, e: &BytesStart) -> Result<Option<PendingMeta>> {
        let attributes = collect_attributes(e)?;
        let content = attributes.get("content").cloned().unwrap_or_default();
        let property = attributes.get("property").cloned().unwrap_or_default();
        let refines = attributes
            .get("refines")
            .map(|r| r.trim_start_matches('#').to_string())
            .unwrap_or_default();

        if let Some(name) = attributes.get("name") {
            if !content.is_empty() {
                self.metadata.add_meta_name_based(name.clone(), content.clone());
            }
        }

        if !refines.is_empty() && !property.is_empty() {
            if !content.is_empty() {
                self.metadata.add_meta_refines_based(refines, property, content);
                return Ok(None);
            }
            return Ok(Some(PendingMeta::Refines { id: refines, property }));
        }

        if !property.is_empty() {
            return Ok(Some(PendingMeta::Property(property)));
        }

        Ok(None)
    }

    /// 解析清单项
    fn add_manifest_item(&mut self, e: &BytesStart) -> Result<()> {
        let mut attributes = collect_attributes(e)?;
        let id = attributes.remove("id").unwrap_or_default();
        let href = attributes.remove("href").unwrap_or_default();
        let media_type = attributes.remove("media-type").unwrap_or_default();

        if !id.is_empty() && !href.is_empty() {
            self.manifest.insert(
                id.clone(),
                ManifestItem {
                    id,
                    href,
                    media_type,
                    properties: attributes.remove("properties"),
                },
            );
        }

        Ok(())
    }

    /// 解析脊柱项
    fn add_spine_item(&mut self, e: &BytesStart) -> Result<()> {
        let attributes = collect_attributes(e)?;
        if let Some(idref) = attributes.get("idref").filter(|idref| !idref.is_empty()) {
            self.spine.push(SpineItem {
                idref: idref.clone(),
                linear: attributes.get("linear").is_none_or(|linear| linear != "no"),
            });
        }
        Ok(())
    }

    /// 按阅读顺序返回脊柱项及其清单项
    ///
    /// 脊柱引用了清单中不存在的ID时返回 `MalformedManifest`。
    pub fn spine_items(&self) -> Result<Vec<(&SpineItem, &ManifestItem)>> {
        self.spine
            .iter()
            .map(|spine_item| {
                self.manifest
                    .get(&spine_item.idref)
                    .map(|manifest_item| (spine_item, manifest_item))
                    .ok_or_else(|| EpubError::MalformedManifest {
                        idref: spine_item.idref.clone(),
                    })
            })
            .collect()
    }

    /// NCX目录文件的清单项
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.spine_toc
            .as_ref()
            .and_then(|id| self.manifest.get(id))
            .or_else(|| {
                let mut candidates: Vec<&ManifestItem> =
                    self.manifest.values().filter(|item| item.is_ncx()).collect();
                candidates.sort_by(|a, b| a.href.cmp(&b.href));
                candidates.into_iter().next()
            })
    }

    /// EPUB3导航文档的清单项
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        let mut candidates: Vec<&ManifestItem> = self.manifest.values().filter(|item| item.is_nav()).collect();
        candidates.sort_by(|a, b| a.href.cmp(&b.href));
        candidates.into_iter().next()
    }

    /// 书籍的主标识符：优先使用unique-identifier指向的标识符
    pub fn primary_identifier(&self) -> Option<String> {
        let identifiers = self.metadata.identifiers();
        self.unique_identifier
            .as_ref()
            .and_then(|unique| identifiers.iter().find(|identifier| identifier.id.as_ref() == Some(unique)))
            .or_else(|| identifiers.first())
            .map(|identifier| identifier.value.clone())
    }
}
