//! NCX解析器模块

use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::{DocTitle, NavMap, NavPoint};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// NCX文件解析结果
#[derive(Debug, Clone)]
pub struct Ncx {
    pub doc_title: Option<DocTitle>,
    pub nav_map: NavMap,
}

impl Ncx {
    /// 解析NCX文件内容
    ///
    /// 只关心docTitle和navMap，pageList等其他部分被忽略。
    pub fn parse_xml(xml_content: &str) -> Result<Ncx> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut doc_title = None;
        let mut nav_map = NavMap::default();

        let mut buf = Vec::new();
        let mut text_content = String::new();
        let mut in_doc_title = false;
        let mut in_nav_map = false;

        // 尚未闭合的导航点，栈顶为当前导航点
        let mut nav_point_stack: Vec<NavPoint> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    match e.local_name().as_ref() {
                        b"docTitle" => in_doc_title = true,
                        b"navMap" => in_nav_map = true,
                        b"navPoint" if in_nav_map => {
                            let (id, play_order) = Self::parse_nav_point_attributes(e)?;
                            nav_point_stack.push(NavPoint::new(id, play_order));
                        }
                        b"content" if in_nav_map => Self::set_content_src(e, &mut nav_point_stack)?,
                        _ => {}
                    }
                    text_content.clear();
                }
                Event::Empty(ref e) => {
                    if in_nav_map && e.local_name().as_ref() == b"content" {
                        Self::set_content_src(e, &mut nav_point_stack)?;
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"docTitle" => in_doc_title = false,
                    b"navMap" => in_nav_map = false,
                    b"text" if in_doc_title => {
                        doc_title = Some(DocTitle { text: text_content.trim().to_string() });
                    }
                    b"text" if in_nav_map => {
                        if let Some(nav_point) = nav_point_stack.last_mut() {
                            if nav_point.nav_label.text.is_empty() {
                                nav_point.nav_label.text = text_content.trim().to_string();
                            }
                        }
                    }
                    b"navPoint" if in_nav_map => {
                        if let Some(nav_point) = nav_point_stack.pop() {
                            match nav_point_stack.last_mut() {
                                Some(parent) => parent.children.push(nav_point),
                                None => nav_map.nav_points.push(nav_point),
                            }
                        }
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).to_string());
                    text_content.push_str(&text);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        nav_map.sort_by_play_order();

        Ok(Ncx { doc_title, nav_map })
    }

    /// 解析navPoint元素的id和playOrder属性
    fn parse_nav_point_attributes(e: &BytesStart) -> Result<(String, u32)> {
        let mut id = String::new();
        let mut play_order = 0;

        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
            match attr.key.local_name().as_ref() {
                b"id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                b"playOrder" => play_order = String::from_utf8_lossy(&attr.value).trim().parse().unwrap_or(0),
                _ => {}
            }
        }

        Ok((id, play_order))
    }

    /// 把content元素的src写入当前导航点
    fn set_content_src(e: &BytesStart, nav_point_stack: &mut [NavPoint]) -> Result<()> {
        for attr_result in e.attributes() {
            let attr = attr_result.map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
            if attr.key.local_name().as_ref() == b"src" {
                if let Some(nav_point) = nav_point_stack.last_mut() {
                    nav_point.content.src = String::from_utf8_lossy(&attr.value).to_string();
                }
            }
        }
        Ok(())
    }

    /// 按阅读顺序返回 (标签, src) 列表
    pub fn labels(&self) -> Vec<(&str, &str)> {
        self.nav_map
            .flatten()
            .into_iter()
            .map(|point| (point.nav_label.text.as_str(), point.content.src.as_str()))
            .collect()
    }
}
