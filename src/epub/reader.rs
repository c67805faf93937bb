use std::io::{Cursor, Read};

use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::epub::book::{BookMetadata, Package, SpineEntry};
use crate::epub::container::Container;
use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::Ncx;
use crate::epub::opf::Opf;
use crate::epub::path;
use crate::epub::toc::TocLabels;

const CONTAINER_PATH: &str = "META-INF/container.xml";
const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 内存中的EPUB容器
pub struct Epub<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Epub<'a> {
    /// 从原始字节创建Epub实例
    ///
    /// 字节无法作为ZIP打开时返回 `InvalidContainer`。
    /// mimetype文件缺失或内容不符只记录日志，不视为错误。
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Epub<'a>> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| EpubError::InvalidContainer(e.to_string()))?;

        let mut epub = Epub { archive };
        epub.check_mimetype();

        Ok(epub)
    }

    fn check_mimetype(&mut self) {
        match self.read_entry("mimetype") {
            Ok(Some(content)) => {
                let found = String::from_utf8_lossy(&content);
                if found.trim() != EPUB_MIMETYPE {
                    warn!(found = %found.trim(), "mimetype内容不是{}", EPUB_MIMETYPE);
                }
            }
            Ok(None) => debug!("缺少mimetype文件"),
            Err(e) => debug!(error = %e, "无法读取mimetype文件"),
        }
    }

    /// 列出容器中的所有条目
    pub fn list_files(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// 读取条目的二进制内容，条目不存在时返回None
    pub fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    /// 读取条目的文本内容（UTF-8，BOM会被去掉）
    fn read_text_entry(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self.read_entry(name)?.map(|bytes| {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);
            String::from_utf8_lossy(bytes).into_owned()
        }))
    }

    /// 查找主要OPF文件的路径
    ///
    /// 优先读取container.xml；没有container.xml时使用容器中第一个.opf条目。
    pub fn package_path(&mut self) -> Result<String> {
        if let Some(container_xml) = self.read_text_entry(CONTAINER_PATH)? {
            let container = Container::parse_xml(&container_xml)?;
            return container
                .package_path()
                .map(str::to_string)
                .ok_or_else(|| EpubError::MissingManifest("container.xml中没有OPF rootfile".to_string()));
        }

        let mut candidates: Vec<String> = self
            .list_files()
            .into_iter()
            .filter(|name| name.to_lowercase().ends_with(".opf"))
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| EpubError::MissingManifest("缺少container.xml且容器中没有.opf文件".to_string()))
    }

    /// 解析OPF文件
    pub fn parse_opf(&mut self) -> Result<(Opf, String)> {
        let opf_path = self.package_path()?;
        let opf_content = self
            .read_text_entry(&opf_path)?
            .ok_or_else(|| EpubError::MissingManifest(format!("OPF文件不存在: {}", opf_path)))?;
        let opf = Opf::parse_xml(&opf_content)?;
        Ok((opf, opf_path))
    }

    /// 读取书籍结构：元数据、按阅读顺序排列的脊柱条目和目录标签
    ///
    /// # 参数
    /// * `fallback_title` - OPF中没有书名时使用的书名
    pub fn read_package(&mut self, fallback_title: Option<&str>) -> Result<Package> {
        let (opf, opf_path) = self.parse_opf()?;
        let opf_dir = path::parent_dir(&opf_path).to_string();

        let spine = opf
            .spine_items()?
            .into_iter()
            .enumerate()
            .map(|(position, (spine_item, manifest_item))| {
                let entry_path = path::resolve(&opf_dir, &manifest_item.href);
                SpineEntry::new(position, spine_item, manifest_item, entry_path)
            })
            .collect::<Vec<_>>();

        let metadata = BookMetadata::from_opf(&opf, fallback_title);
        let toc_labels = self.read_toc_labels(&opf, &opf_dir);

        debug!(
            title = %metadata.title,
            spine = spine.len(),
            toc_labels = toc_labels.len(),
            "已读取OPF: {}",
            opf_path
        );

        Ok(Package { metadata, spine, toc_labels })
    }

    /// 收集目录标签；目录文件缺失或损坏只会减少可用标签
    fn read_toc_labels(&mut self, opf: &Opf, opf_dir: &str) -> TocLabels {
        let mut labels = TocLabels::new();

        if let Some(ncx_item) = opf.ncx_item() {
            let ncx_path = path::resolve(opf_dir, &ncx_item.href);
            match self.read_text_entry(&ncx_path) {
                Ok(Some(content)) => match Ncx::parse_xml(&content) {
                    Ok(ncx) => labels.add_ncx(&ncx, &ncx_path),
                    Err(e) => warn!(error = %e, "无法解析NCX文件 {}", ncx_path),
                },
                Ok(None) => debug!("NCX文件不存在: {}", ncx_path),
                Err(e) => warn!(error = %e, "无法读取NCX文件 {}", ncx_path),
            }
        }

        if let Some(nav_item) = opf.nav_item() {
            let nav_path = path::resolve(opf_dir, &nav_item.href);
            match self.read_text_entry(&nav_path) {
                Ok(Some(content)) => labels.add_nav_document(&content, &nav_path),
                Ok(None) => debug!("导航文档不存在: {}", nav_path),
                Err(e) => warn!(error = %e, "无法读取导航文档 {}", nav_path),
            }
        }

        labels
    }
}
