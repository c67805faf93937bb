//! 转换流程：读取容器 → 规范化章节 → 提取图片 → 渲染Markdown

use std::fs;
use std::path::Path;

use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ConvertOptions, OutputMode};
use crate::content::{Chapter, normalize};
use crate::epub::error::{EpubError, Result, Warning};
use crate::epub::{BookMetadata, Epub};
use crate::images::{ImageOutput, RenderedImage, extract_images};
use crate::markdown::{MarkdownFile, render, slugify};

/// 一次转换的完整结果
#[derive(Debug)]
pub struct Conversion {
    pub metadata: BookMetadata,
    pub mode: OutputMode,
    pub chapters: Vec<Chapter>,
    pub markdown: Vec<MarkdownFile>,
    /// 按章节顺序、文档顺序排列
    pub images: Vec<RenderedImage>,
    /// 转换过程中跳过的文档和图片
    pub warnings: Vec<Warning>,
}

impl Conversion {
    /// 是否需要打包为ZIP：有图片或多文件输出
    pub fn needs_archive(&self) -> bool {
        !self.images.is_empty() || self.mode == OutputMode::MultiFile
    }

    /// 所有输出文件的相对路径和内容，Markdown在前、图片在后
    pub fn files(&self) -> Vec<(String, &[u8])> {
        let markdown = self
            .markdown
            .iter()
            .map(|file| (file.name.clone(), file.content.as_bytes()));
        let images = self.images.iter().map(|image| (image.path(), image.bytes.as_slice()));
        markdown.chain(images).collect()
    }

    /// ZIP文件名，由书名生成
    pub fn archive_name(&self) -> String {
        let slug = slugify(&self.metadata.title);
        if slug.is_empty() {
            "book.zip".to_string()
        } else {
            format!("{}.zip", slug)
        }
    }
}

/// 转换内存中的EPUB
///
/// # 参数
/// * `input` - EPUB文件的字节
/// * `title_hint` - OPF中没有书名时使用的书名（通常是文件名主干）
/// * `options` - 转换配置，在打开容器之前校验
///
/// 容器、OPF和配置错误会终止转换；单个章节或图片的问题只记录为警告。
pub fn convert(input: &[u8], title_hint: Option<&str>, options: &ConvertOptions) -> Result<Conversion> {
    options.validate()?;
    let pool = build_pool(options.workers)?;

    let mut epub = Epub::from_bytes(input)?;
    let package = epub.read_package(title_hint)?;
    info!(
        title = %package.metadata.title,
        chapters = package.spine.len(),
        "开始转换"
    );

    // 容器按顺序读取，工作线程只处理已读出的字节
    let documents: Vec<Option<Vec<u8>>> = package
        .spine
        .iter()
        .map(|entry| match epub.read_entry(&entry.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "读取章节失败 {}", entry.path);
                None
            }
        })
        .collect();

    let normalized: Vec<(Chapter, Option<Warning>)> = pool.install(|| {
        package
            .spine
            .par_iter()
            .zip(documents.par_iter())
            .map(|(entry, raw)| normalize(entry, raw.as_deref(), &package.toc_labels))
            .collect()
    });

    let mut chapters = Vec::with_capacity(normalized.len());
    let mut warnings = Vec::new();
    for (chapter, warning) in normalized {
        chapters.push(chapter);
        warnings.extend(warning);
    }

    let image_output = if options.mode == OutputMode::MultiFile && options.extract_images {
        extract_images(&mut epub, &chapters, &options.images, &pool)
    } else {
        ImageOutput::default()
    };
    warnings.extend(image_output.warnings);

    let markdown = render(&package.metadata, &chapters, options.mode, &image_output.mapping);

    info!(
        markdown = markdown.len(),
        images = image_output.images.len(),
        warnings = warnings.len(),
        "转换完成"
    );
    if !warnings.is_empty() {
        warn!("转换过程中有{}个警告", warnings.len());
    }

    Ok(Conversion {
        metadata: package.metadata,
        mode: options.mode,
        chapters,
        markdown,
        images: image_output.images,
        warnings,
    })
}

/// 从文件转换，文件名主干作为备用书名
pub fn convert_file<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<Conversion> {
    let path = path.as_ref();
    // 配置无效时不读取文件
    options.validate()?;
    let input = fs::read(path)?;
    let title_hint = path.file_stem().and_then(|stem| stem.to_str());
    convert(&input, title_hint, options)
}

fn build_pool(workers: Option<usize>) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or(0))
        .thread_name(|index| format!("epubmark-{}", index))
        .build()
        .map_err(|e| EpubError::Io(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::ImageOptions;
    use crate::testing::{EpubBuilder, png_bytes};

    fn figure(image: &str, caption: &str) -> String {
        format!(
            r#"<figure><img src="../images/{}" alt=""/><figcaption>{}</figcaption></figure>"#,
            image, caption
        )
    }

    fn multi_with_images() -> ConvertOptions {
        ConvertOptions::multi_file(true)
    }

    #[test]
    fn test_three_chapters_single_file() {
        let bytes = EpubBuilder::new("Three")
            .author("Writer")
            .chapter("c1", "<h1>One</h1><p>first</p>")
            .chapter("c2", "<h1>Two</h1><p>second</p>")
            .chapter("c3", "<h1>Three</h1><p>third</p>")
            .build();

        let conversion = convert(&bytes, None, &ConvertOptions::single_file()).unwrap();
        assert!(conversion.warnings.is_empty());
        assert_eq!(conversion.markdown.len(), 1);
        assert!(!conversion.needs_archive());

        let content = &conversion.markdown[0].content;
        let headings: Vec<&str> = content.lines().filter(|line| line.starts_with("# ")).collect();
        assert_eq!(headings, vec!["# One", "# Two", "# Three"]);
        assert!(content.starts_with("**Title:** Three\n\n**Author:** Writer\n"));
        let first = content.find("first").unwrap();
        let third = content.find("third").unwrap();
        assert!(first < third);
    }

    #[test]
    fn test_multi_file_with_captioned_images() {
        let bytes = EpubBuilder::new("Pictures")
            .chapter("c1", &format!("<h1>Start</h1>{}", figure("a.png", "Harbor View")))
            .chapter("c2", &format!("<h1>End</h1>{}", figure("b.png", "Mountain Pass")))
            .image("a.png", png_bytes(40, 30))
            .image("b.png", png_bytes(30, 40))
            .build();

        let conversion = convert(&bytes, None, &multi_with_images()).unwrap();
        assert!(conversion.warnings.is_empty());
        assert!(conversion.needs_archive());

        let names: Vec<&str> = conversion.markdown.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["pictures_index.md", "chapter_01_start.md", "chapter_02_end.md"]);

        let images: Vec<&str> = conversion.images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(images, vec!["harbor_view.jpg", "mountain_pass.jpg"]);

        assert!(conversion.markdown[1].content.contains("![Harbor View](images/harbor_view.jpg)"));
        assert!(conversion.markdown[2].content.contains("![Mountain Pass](images/mountain_pass.jpg)"));
        assert!(conversion.images[1].overlay.starts_with("Mountain Pass | Chapter: End | 30x40 | "));
    }

    #[test]
    fn test_caption_collision_gets_suffix() {
        let bytes = EpubBuilder::new("Covers")
            .chapter("c1", &figure("front.png", "Cover"))
            .chapter("c2", &figure("back.png", "Cover"))
            .image("front.png", png_bytes(10, 10))
            .image("back.png", png_bytes(10, 10))
            .build();

        let conversion = convert(&bytes, None, &multi_with_images()).unwrap();
        let images: Vec<&str> = conversion.images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(images, vec!["cover.jpg", "cover_01.jpg"]);
        assert!(conversion.markdown[2].content.contains("images/cover_01.jpg"));
    }

    #[test]
    fn test_malformed_chapter_keeps_numbering() {
        let bytes = EpubBuilder::new("Broken")
            .chapter("c1", "<h1>One</h1><p>ok</p>")
            .chapter_bytes("c2", b"<html><body><p>\xff\xfe</p></body></html>", "application/xhtml+xml")
            .chapter("c3", "<h1>Three</h1><p>ok</p>")
            .build();

        let conversion = convert(&bytes, None, &ConvertOptions::multi_file(false)).unwrap();

        let titles: Vec<&str> = conversion.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Chapter 2", "Three"]);
        assert!(conversion.chapters[1].is_empty());

        assert_eq!(conversion.warnings.len(), 1);
        assert_eq!(conversion.warnings[0].chapter, Some(2));
        assert!(matches!(conversion.warnings[0].error, EpubError::MalformedDocument { .. }));

        let names: Vec<&str> = conversion.markdown.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["broken_index.md", "chapter_01_one.md", "chapter_02_chapter_2.md", "chapter_03_three.md"]
        );
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let bytes = EpubBuilder::new("Stable")
            .chapter("c1", &format!("<h1>A</h1>{}{}", figure("x.png", "Same"), figure("y.png", "Same")))
            .chapter("c2", r#"<h1>B</h1><img src="../images/z.png"/>"#)
            .image("x.png", png_bytes(12, 12))
            .image("y.png", png_bytes(14, 14))
            .image("z.png", png_bytes(16, 16))
            .build();

        let mut options = multi_with_images();
        options.workers = Some(4);
        let first = convert(&bytes, None, &options).unwrap();
        let second = convert(&bytes, None, &options).unwrap();

        assert_eq!(first.markdown, second.markdown);
        let first_images: Vec<(&str, &[u8])> =
            first.images.iter().map(|i| (i.filename.as_str(), i.bytes.as_slice())).collect();
        let second_images: Vec<(&str, &[u8])> =
            second.images.iter().map(|i| (i.filename.as_str(), i.bytes.as_slice())).collect();
        assert_eq!(first_images, second_images);
    }

    #[test]
    fn test_single_file_never_links_images() {
        let bytes = EpubBuilder::new("Plain")
            .chapter("c1", &format!("<h1>A</h1>{}", figure("x.png", "Map")))
            .image("x.png", png_bytes(10, 10))
            .build();

        let conversion = convert(&bytes, None, &ConvertOptions::single_file()).unwrap();
        let content = &conversion.markdown[0].content;
        assert!(conversion.images.is_empty());
        assert!(!content.contains("!["), "unexpected image link in {}", content);
        assert!(!content.contains("images/"));
        assert!(content.contains("*[Image: Map]*"));
    }

    #[test]
    fn test_resize_bounds() {
        let bytes = EpubBuilder::new("Sizes")
            .chapter("c1", &format!("{}{}", figure("small.png", "Small"), figure("wide.png", "Wide")))
            .image("small.png", png_bytes(100, 80))
            .image("wide.png", png_bytes(400, 100))
            .build();

        let mut options = multi_with_images();
        options.images = ImageOptions { max_width: 200, max_height: 150, jpeg_quality: 85 };
        let conversion = convert(&bytes, None, &options).unwrap();

        let sizes: Vec<(u32, u32)> = conversion.images.iter().map(|i| (i.width, i.height)).collect();
        assert_eq!(sizes, vec![(100, 80), (200, 50)]);
        for image in &conversion.images {
            let decoded = image::load_from_memory(&image.bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (image.width, image.height));
        }
    }

    #[test]
    fn test_output_names_are_unique() {
        let bytes = EpubBuilder::new("Same")
            .chapter_with_label("c1", "", &format!("<h1>Same</h1>{}", figure("a.png", "Pic")))
            .chapter_with_label("c2", "", &format!("<h1>Same</h1>{}", figure("b.png", "Pic")))
            .chapter_with_label("c3", "", r#"<img src="../images/c.png"/><img src="../images/d.png"/>"#)
            .image("a.png", png_bytes(8, 8))
            .image("b.png", png_bytes(8, 8))
            .image("c.png", png_bytes(8, 8))
            .image("d.png", png_bytes(8, 8))
            .build();

        let conversion = convert(&bytes, None, &multi_with_images()).unwrap();
        let paths: Vec<String> = conversion.files().into_iter().map(|(path, _)| path).collect();
        let unique: HashSet<&String> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
        assert_eq!(paths.len(), 4 + 4);
    }

    #[test]
    fn test_invalid_configuration_before_parsing() {
        let options = ConvertOptions {
            extract_images: true,
            ..ConvertOptions::single_file()
        };
        let result = convert(b"not even a zip", None, &options);
        assert!(matches!(result, Err(EpubError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(matches!(
            convert(b"not even a zip", None, &ConvertOptions::default()),
            Err(EpubError::InvalidContainer(_))
        ));

        let bytes = EpubBuilder::new("Ghost").chapter("c1", "<p>x</p>").spine_ref("ghost").build();
        assert!(matches!(
            convert(&bytes, None, &ConvertOptions::default()),
            Err(EpubError::MalformedManifest { idref }) if idref == "ghost"
        ));
    }

    #[test]
    fn test_title_from_file_name() {
        let bytes = EpubBuilder::untitled().chapter("c1", "<p>x</p>").build();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my-novel.epub");
        fs::write(&path, &bytes).unwrap();

        let conversion = convert_file(&path, &ConvertOptions::single_file()).unwrap();
        assert_eq!(conversion.metadata.title, "my-novel");
        assert_eq!(conversion.markdown[0].name, "my_novel.md");
    }
}
