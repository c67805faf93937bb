use crate::epub::error::{EpubError, Result};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// OPF包文件的标准媒体类型
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

/// container.xml 中的一个 rootfile 条目
#[derive(Debug, Clone, PartialEq)]
pub struct RootFile {
    pub full_path: String,
    pub media_type: String,
}

/// META-INF/container.xml 的解析结果
#[derive(Debug, Clone)]
pub struct Container {
    pub rootfiles: Vec<RootFile>,
}

impl Container {
    /// 解析container.xml内容
    ///
    /// 没有任何rootfile条目时返回 `MissingManifest`。
    pub fn parse_xml(xml_content: &str) -> Result<Container> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut rootfiles = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"rootfile" => {
                    let mut full_path = String::new();
                    let mut media_type = String::new();

                    for attr_result in e.attributes() {
                        let attr = attr_result.map_err(|e| EpubError::XmlError(quick_xml::Error::InvalidAttr(e)))?;
                        match attr.key.local_name().as_ref() {
                            b"full-path" => full_path = String::from_utf8_lossy(&attr.value).to_string(),
                            b"media-type" => media_type = String::from_utf8_lossy(&attr.value).to_string(),
                            _ => {}
                        }
                    }

                    // media-type 缺失的rootfile仍然保留，按路径后缀判断
                    if !full_path.is_empty() {
                        rootfiles.push(RootFile { full_path, media_type });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if rootfiles.is_empty() {
            return Err(EpubError::MissingManifest(
                "container.xml中没有rootfile条目".to_string(),
            ));
        }

        Ok(Container { rootfiles })
    }

    /// 主要OPF文件的路径
    ///
    /// 优先选择媒体类型为 `application/oebps-package+xml` 的条目，
    /// 其次选择扩展名为 `.opf` 的条目。
    pub fn package_path(&self) -> Option<&str> {
        self.rootfiles
            .iter()
            .find(|rootfile| rootfile.media_type == OPF_MEDIA_TYPE)
            .or_else(|| {
                self.rootfiles
                    .iter()
                    .find(|rootfile| rootfile.full_path.to_lowercase().ends_with(".opf"))
            })
            .map(|rootfile| rootfile.full_path.as_str())
    }
}
