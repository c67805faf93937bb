//! 输出转换结果：写入目录，或打包为ZIP

use std::fs;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::convert::Conversion;
use crate::epub::error::{EpubError, Result};

/// 把所有输出文件写入目录，返回写入的路径
pub fn write_to_dir<P: AsRef<Path>>(conversion: &Conversion, dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut written = Vec::new();

    for (relative, bytes) in conversion.files() {
        let target = dir.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        debug!("已写入 {}", target.display());
        written.push(target);
    }

    Ok(written)
}

/// 把所有输出文件打包为ZIP，写入 `writer` 并返回它
pub fn write_zip<W: Write + Seek>(conversion: &Conversion, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (relative, bytes) in conversion.files() {
        zip.start_file(relative, options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?)
}

/// 把ZIP打包到内存
pub fn zip_bytes(conversion: &Conversion) -> Result<Vec<u8>> {
    Ok(write_zip(conversion, Cursor::new(Vec::new()))?.into_inner())
}

/// 按输出规则写入结果，返回最终的文件或目录路径
///
/// 有图片或多文件输出时打包为ZIP（`allow_zip` 为false时改为写入目录）；
/// 单文件且没有图片时直接写出Markdown文件。
pub fn write_output<P: AsRef<Path>>(conversion: &Conversion, dir: P, allow_zip: bool) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    if !conversion.needs_archive() {
        let written = write_to_dir(conversion, dir)?;
        let path = written
            .into_iter()
            .next()
            .ok_or_else(|| EpubError::InvalidConfiguration("没有可写入的输出".to_string()))?;
        info!("已生成 {}", path.display());
        return Ok(path);
    }

    if !allow_zip {
        let written = write_to_dir(conversion, dir)?;
        info!(files = written.len(), "已写入目录 {}", dir.display());
        return Ok(dir.to_path_buf());
    }

    let path = dir.join(conversion.archive_name());
    let file = fs::File::create(&path)?;
    write_zip(conversion, file)?;
    info!("已生成 {}", path.display());
    Ok(path)
}
