//! 单张图片的处理：解码、缩放、压平透明通道、编码为JPEG、写入说明注释
//!
//! 说明文字只写入JPEG的COM段，不绘制到像素上；可见的说明由Markdown中图片下方的说明行承担。

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::config::ImageOptions;
use crate::epub::error::{EpubError, Result};

/// 输出图片的扩展名
pub const IMAGE_EXTENSION: &str = "jpg";

const COMMENT_MARKER: u8 = 0xFE;
const APP0_MARKER: u8 = 0xE0;
const SOS_MARKER: u8 = 0xDA;
const MAX_COMMENT_BYTES: usize = u16::MAX as usize - 2;

/// 编码后的图片（尚未写入说明注释）
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// 解码、缩放并重新编码一张图片
///
/// # 参数
/// * `reference` - 图片引用，只用于错误信息
/// * `raw` - 原始图片字节
/// * `options` - 尺寸上限和JPEG质量
pub fn process_image(reference: &str, raw: &[u8], options: &ImageOptions) -> Result<ProcessedImage> {
    let decoded = image::load_from_memory(raw).map_err(|e| EpubError::UnsupportedImageFormat {
        reference: reference.to_string(),
        reason: e.to_string(),
    })?;

    let (width, height) = target_size(decoded.width(), decoded.height(), options.max_width, options.max_height);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Lanczos3)
    };

    let rgb = flatten_onto_white(&resized);
    let bytes = encode_jpeg(&rgb, options.jpeg_quality).map_err(|e| EpubError::ImageEncode {
        reference: reference.to_string(),
        reason: e.to_string(),
    })?;

    Ok(ProcessedImage { bytes, width, height })
}

/// 计算缩放后的尺寸：保持宽高比，不超过上限，从不放大
pub fn target_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let scaled_width = ((width as f64 * scale).floor() as u32).clamp(1, max_width);
    let scaled_height = ((height as f64 * scale).floor() as u32).clamp(1, max_height);
    (scaled_width, scaled_height)
}

/// 把透明像素合成到白色背景上
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32)) / 255) as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> std::result::Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    image.write_with_encoder(encoder)?;
    Ok(bytes)
}

/// 在JPEG中写入一个COM注释段，位置在SOI（及紧随其后的APP0）之后
///
/// 不是JPEG数据时原样返回。
pub fn embed_comment(jpeg: Vec<u8>, comment: &str) -> Vec<u8> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return jpeg;
    }

    let mut end = comment.len().min(MAX_COMMENT_BYTES);
    while !comment.is_char_boundary(end) {
        end -= 1;
    }
    let comment = &comment.as_bytes()[..end];

    let mut insert_at = 2;
    if jpeg.len() >= 6 && jpeg[2] == 0xFF && jpeg[3] == APP0_MARKER {
        let length = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        insert_at = (4 + length).min(jpeg.len());
    }

    let segment_length = (comment.len() + 2) as u16;
    let mut output = Vec::with_capacity(jpeg.len() + comment.len() + 4);
    output.extend_from_slice(&jpeg[..insert_at]);
    output.extend_from_slice(&[0xFF, COMMENT_MARKER]);
    output.extend_from_slice(&segment_length.to_be_bytes());
    output.extend_from_slice(comment);
    output.extend_from_slice(&jpeg[insert_at..]);
    output
}

/// 读取JPEG中第一个COM注释段
pub fn read_comment(jpeg: &[u8]) -> Option<String> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return None;
        }
        let marker = jpeg[pos + 1];
        if marker == SOS_MARKER {
            return None;
        }
        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        if length < 2 || pos + 2 + length > jpeg.len() {
            return None;
        }
        if marker == COMMENT_MARKER {
            return String::from_utf8(jpeg[pos + 4..pos + 2 + length].to_vec()).ok();
        }
        pos += 2 + length;
    }
    None
}

/// 图片说明：`{标签} | Chapter: {章节标题} | {宽}x{高} | {大小}`
pub fn overlay_text(label: &str, chapter_title: &str, width: u32, height: u32, size: usize) -> String {
    format!(
        "{} | Chapter: {} | {}x{} | {}",
        label,
        chapter_title,
        width,
        height,
        human_size(size)
    )
}

/// 人类可读的文件大小
pub fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_bytes, transparent_png_bytes};

    #[test]
    fn test_target_size() {
        assert_eq!(target_size(800, 600, 1920, 1080), (800, 600));
        assert_eq!(target_size(1920, 1080, 1920, 1080), (1920, 1080));
        assert_eq!(target_size(3840, 1080, 1920, 1080), (1920, 540));
        assert_eq!(target_size(1000, 2160, 1920, 1080), (500, 1080));
        assert_eq!(target_size(10000, 1, 1920, 1080), (1920, 1));
    }

    #[test]
    fn test_small_image_keeps_dimensions() {
        let processed = process_image("a.png", &png_bytes(64, 48), &ImageOptions::default()).unwrap();
        assert_eq!((processed.width, processed.height), (64, 48));

        let decoded = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
        assert_eq!(image::guess_format(&processed.bytes).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_large_image_is_downscaled() {
        let options = ImageOptions { max_width: 100, max_height: 100, jpeg_quality: 80 };
        let processed = process_image("a.png", &png_bytes(400, 200), &options).unwrap();
        assert_eq!((processed.width, processed.height), (100, 50));
    }

    #[test]
    fn test_transparent_image_flattened_to_white() {
        let processed = process_image("t.png", &transparent_png_bytes(16, 16), &ImageOptions::default()).unwrap();
        let decoded = image::load_from_memory(&processed.bytes).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(8, 8);
        assert!(pixel.0.iter().all(|&c| c > 240), "pixel {:?}", pixel);
    }

    #[test]
    fn test_undecodable_image() {
        let result = process_image("bad.png", b"not an image", &ImageOptions::default());
        assert!(matches!(result, Err(EpubError::UnsupportedImageFormat { reference, .. }) if reference == "bad.png"));
    }

    #[test]
    fn test_comment_round_trip_keeps_jpeg_valid() {
        let processed = process_image("a.png", &png_bytes(20, 10), &ImageOptions::default()).unwrap();
        let text = overlay_text("Cover", "第一章", 20, 10, processed.bytes.len());
        let with_comment = embed_comment(processed.bytes, &text);

        assert_eq!(read_comment(&with_comment).as_deref(), Some(text.as_str()));
        let decoded = image::load_from_memory(&with_comment).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024 / 2), "1.5 MB");
    }
}
