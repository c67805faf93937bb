//! 图片提取流水线
//!
//! 容器读取按顺序进行，解码、缩放和编码在线程池中并行执行，
//! 最终的文件名按章节顺序和文档顺序统一分配，与线程的完成顺序无关。

use std::collections::{HashMap, HashSet};

use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ImageOptions;
use crate::content::{Chapter, ImageRef};
use crate::epub::error::{EpubError, Result, Warning};
use crate::epub::{Epub, path};
use crate::images::process::{self, IMAGE_EXTENSION, ProcessedImage};
use crate::markdown::slug::{NameRegistry, slugify};

/// 图片在输出中的目录
pub const IMAGE_DIR: &str = "images";

/// 处理完成的图片
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// 最终文件名（不含目录）
    pub filename: String,
    /// 原始引用
    pub reference: String,
    /// 第一次引用该图片的章节序号
    pub chapter: usize,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 写入图片注释的说明文字
    pub overlay: String,
}

impl RenderedImage {
    /// 在输出中的相对路径
    pub fn path(&self) -> String {
        format!("{}/{}", IMAGE_DIR, self.filename)
    }
}

/// 渲染时使用的图片链接
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLink {
    pub filename: String,
    pub overlay: String,
}

impl ImageLink {
    pub fn path(&self) -> String {
        format!("{}/{}", IMAGE_DIR, self.filename)
    }
}

/// 原始引用到最终文件名的映射
#[derive(Debug, Clone, Default)]
pub struct ImageMapping {
    links: HashMap<String, ImageLink>,
}

impl ImageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: String, link: ImageLink) {
        self.links.insert(reference, link);
    }

    pub fn get(&self, reference: &str) -> Option<&ImageLink> {
        self.links.get(reference)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// 流水线的结果
#[derive(Debug, Default)]
pub struct ImageOutput {
    /// 按章节顺序、文档顺序排列
    pub images: Vec<RenderedImage>,
    pub mapping: ImageMapping,
    pub warnings: Vec<Warning>,
}

/// 一张待处理的图片
struct ImageJob<'c> {
    chapter: &'c Chapter,
    image: &'c ImageRef,
    /// 容器中不存在或无法读取时为None
    raw: Option<Vec<u8>>,
}

impl ImageJob<'_> {
    /// 文件名主干：说明 → 页码 → 章节序号
    fn stem(&self) -> String {
        if let Some(slug) = self.image.caption.as_deref().map(slugify).filter(|s| !s.is_empty()) {
            return slug;
        }
        match self.image.page {
            Some(page) => format!("page_{:03}", page),
            None => format!("chapter_{:03}", self.chapter.ordinal),
        }
    }

    /// 说明文字中的标签，优先级与文件名相同
    fn label(&self) -> String {
        if let Some(caption) = self.image.caption.as_deref().filter(|c| !c.trim().is_empty()) {
            return caption.trim().to_string();
        }
        match self.image.page {
            Some(page) => format!("Page {}", page),
            None => format!("Chapter {}", self.chapter.ordinal),
        }
    }
}

/// 提取、处理并命名所有章节中引用的图片
///
/// 同一引用只处理一次；缺失、无法解码或编码失败的图片被跳过并记录警告，
/// 不占用文件名。
pub fn extract_images(
    epub: &mut Epub,
    chapters: &[Chapter],
    options: &ImageOptions,
    pool: &ThreadPool,
) -> ImageOutput {
    let jobs = collect_jobs(epub, chapters);
    debug!(images = jobs.len(), "开始处理图片");

    let processed: Vec<Result<ProcessedImage>> = pool.install(|| {
        jobs.par_iter()
            .map(|job| match &job.raw {
                Some(raw) => process::process_image(&job.image.reference, raw, options),
                None => Err(EpubError::MissingAsset { reference: job.image.reference.clone() }),
            })
            .collect()
    });

    let mut output = ImageOutput::default();
    let mut registry = NameRegistry::new();

    for (job, result) in jobs.iter().zip(processed) {
        match result {
            Ok(image) => {
                let filename = registry.claim(&job.stem(), IMAGE_EXTENSION);
                let overlay = process::overlay_text(
                    &job.label(),
                    &job.chapter.title,
                    image.width,
                    image.height,
                    image.bytes.len(),
                );
                let bytes = process::embed_comment(image.bytes, &overlay);

                debug!(
                    chapter = job.chapter.ordinal,
                    "图片 {} -> {}/{}",
                    job.image.reference,
                    IMAGE_DIR,
                    filename
                );
                output.mapping.insert(
                    job.image.reference.clone(),
                    ImageLink { filename: filename.clone(), overlay: overlay.clone() },
                );
                output.images.push(RenderedImage {
                    filename,
                    reference: job.image.reference.clone(),
                    chapter: job.chapter.ordinal,
                    bytes,
                    width: image.width,
                    height: image.height,
                    overlay,
                });
            }
            Err(e) => {
                warn!(chapter = job.chapter.ordinal, error = %e, "跳过图片 {}", job.image.reference);
                output.warnings.push(Warning::new(Some(job.chapter.ordinal), e));
            }
        }
    }

    info!(
        extracted = output.images.len(),
        skipped = output.warnings.len(),
        "图片处理完成"
    );
    output
}

/// 按章节顺序和文档顺序收集去重后的图片，并读取它们的原始字节
fn collect_jobs<'c>(epub: &mut Epub, chapters: &'c [Chapter]) -> Vec<ImageJob<'c>> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    for chapter in chapters {
        for image in chapter.images() {
            if !seen.insert(image.reference.as_str()) {
                continue;
            }
            let raw = read_image(epub, &image.reference);
            jobs.push(ImageJob { chapter, image, raw });
        }
    }
    jobs
}

/// 外部URL和data URL不在容器中
fn read_image(epub: &mut Epub, reference: &str) -> Option<Vec<u8>> {
    if path::has_scheme(reference) {
        return None;
    }
    match epub.read_entry(reference) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "读取图片失败 {}", reference);
            None
        }
    }
}
