//! 测试用的EPUB构造工具

use std::io::{Cursor, Write};

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

struct ChapterFixture {
    id: String,
    label: String,
    content: Vec<u8>,
    media_type: String,
}

/// 在内存中构造EPUB文件
pub struct EpubBuilder {
    title: Option<String>,
    authors: Vec<String>,
    extra_metadata: Vec<String>,
    chapters: Vec<ChapterFixture>,
    images: Vec<(String, Vec<u8>)>,
    spine_extra: Vec<String>,
}

impl EpubBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            authors: Vec::new(),
            extra_metadata: Vec::new(),
            chapters: Vec::new(),
            images: Vec::new(),
            spine_extra: Vec::new(),
        }
    }

    pub fn untitled() -> Self {
        let mut builder = Self::new("");
        builder.title = None;
        builder
    }

    pub fn author(mut self, name: &str) -> Self {
        self.authors.push(name.to_string());
        self
    }

    /// 追加一条原样写入 `<metadata>` 的XML片段
    pub fn metadata_xml(mut self, xml: &str) -> Self {
        self.extra_metadata.push(xml.to_string());
        self
    }

    /// 添加章节，目录标签与id相同；body为 `<body>` 内部的HTML
    pub fn chapter(self, id: &str, body: &str) -> Self {
        self.chapter_with_label(id, id, body)
    }

    /// 添加带目录标签的章节，标签为空时不写入NCX
    pub fn chapter_with_label(mut self, id: &str, label: &str, body: &str) -> Self {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{id}</title></head>
<body>{body}</body>
</html>"#
        );
        self.chapters.push(ChapterFixture {
            id: id.to_string(),
            label: label.to_string(),
            content: document.into_bytes(),
            media_type: "application/xhtml+xml".to_string(),
        });
        self
    }

    /// 添加原始字节的章节文档
    pub fn chapter_bytes(mut self, id: &str, content: &[u8], media_type: &str) -> Self {
        self.chapters.push(ChapterFixture {
            id: id.to_string(),
            label: String::new(),
            content: content.to_vec(),
            media_type: media_type.to_string(),
        });
        self
    }

    /// 在脊柱中追加一个指向任意ID的引用
    pub fn spine_ref(mut self, idref: &str) -> Self {
        self.spine_extra.push(idref.to_string());
        self
    }

    /// 添加图片，路径相对于 `OEBPS/images/`
    pub fn image(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.images.push((name.to_string(), bytes));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("<dc:title>{}</dc:title>\n", title));
        }
        for author in &self.authors {
            metadata.push_str(&format!("<dc:creator>{}</dc:creator>\n", author));
        }
        for extra in &self.extra_metadata {
            metadata.push_str(extra);
            metadata.push('\n');
        }

        let mut manifest = String::from(r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#);
        let mut spine = String::new();
        let mut nav_points = String::new();
        for (index, chapter) in self.chapters.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="{id}" href="text/{id}.xhtml" media-type="{media}"/>"#,
                id = chapter.id,
                media = chapter.media_type
            ));
            spine.push_str(&format!(r#"<itemref idref="{}"/>"#, chapter.id));
            if !chapter.label.is_empty() {
                nav_points.push_str(&format!(
                    r#"<navPoint id="np{n}" playOrder="{n}"><navLabel><text>{label}</text></navLabel><content src="text/{id}.xhtml"/></navPoint>"#,
                    n = index + 1,
                    label = chapter.label,
                    id = chapter.id
                ));
            }
        }
        for (index, (name, _)) in self.images.iter().enumerate() {
            manifest.push_str(&format!(
                r#"<item id="img{}" href="images/{}" media-type="image/png"/>"#,
                index, name
            ));
        }
        for idref in &self.spine_extra {
            spine.push_str(&format!(r#"<itemref idref="{}"/>"#, idref));
        }

        let opf = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="3.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:identifier id="BookId">urn:uuid:0000-test</dc:identifier>
{metadata}</metadata>
<manifest>{manifest}</manifest>
<spine toc="ncx">{spine}</spine>
</package>"#
        );
        let ncx = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1"><navMap>{nav_points}</navMap></ncx>"#
        );

        let mut entries: Vec<(String, Vec<u8>)> = vec![
            ("mimetype".to_string(), b"application/epub+zip".to_vec()),
            ("META-INF/container.xml".to_string(), CONTAINER_XML.as_bytes().to_vec()),
            ("OEBPS/content.opf".to_string(), opf.into_bytes()),
            ("OEBPS/toc.ncx".to_string(), ncx.into_bytes()),
        ];
        for chapter in self.chapters {
            entries.push((format!("OEBPS/text/{}.xhtml", chapter.id), chapter.content));
        }
        for (name, bytes) in self.images {
            entries.push((format!("OEBPS/images/{}", name), bytes));
        }

        let borrowed: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
            .collect();
        Self::raw(&borrowed)
    }

    /// 把任意条目打包成ZIP
    pub fn raw(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

/// 生成纯色PNG图片
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 60, 30]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// 生成带透明通道的PNG图片
pub fn transparent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}
