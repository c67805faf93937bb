//! 转换配置
//!
//! 配置可以直接构造，也可以从YAML文件加载；命令行参数会覆盖文件中的值。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::epub::error::{EpubError, Result};

/// 输出模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// 整本书输出为一个Markdown文件
    #[default]
    SingleFile,
    /// 一个索引文件加每章一个文件
    MultiFile,
}

/// 图片处理参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG质量（1-100）
    pub jpeg_quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            jpeg_quality: 85,
        }
    }
}

/// 一次转换的全部配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub mode: OutputMode,
    /// 是否提取图片（只支持多文件模式）
    pub extract_images: bool,
    pub images: ImageOptions,
    /// 工作线程数，None表示由rayon决定
    pub workers: Option<usize>,
}

impl ConvertOptions {
    pub fn single_file() -> Self {
        Self::default()
    }

    pub fn multi_file(extract_images: bool) -> Self {
        Self {
            mode: OutputMode::MultiFile,
            extract_images,
            ..Self::default()
        }
    }

    /// 从YAML字符串加载配置，缺失的字段使用默认值
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| EpubError::ConfigError(format!("YAML解析失败: {}", e)))
    }

    /// 从YAML文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EpubError::ConfigError(format!("无法读取配置文件 {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(|e| EpubError::ConfigError(format!("YAML序列化失败: {}", e)))
    }

    /// 检查配置组合是否有效
    ///
    /// 单文件模式不支持提取图片，这种组合直接报错而不是静默忽略。
    pub fn validate(&self) -> Result<()> {
        if self.extract_images && self.mode == OutputMode::SingleFile {
            return Err(EpubError::InvalidConfiguration(
                "单文件模式不支持提取图片，请使用多文件模式".to_string(),
            ));
        }
        if self.images.max_width == 0 || self.images.max_height == 0 {
            return Err(EpubError::InvalidConfiguration(format!(
                "图片尺寸上限必须大于0: {}x{}",
                self.images.max_width, self.images.max_height
            )));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(EpubError::InvalidConfiguration(format!(
                "JPEG质量必须在1到100之间: {}",
                self.images.jpeg_quality
            )));
        }
        if self.workers == Some(0) {
            return Err(EpubError::InvalidConfiguration("工作线程数必须大于0".to_string()));
        }
        Ok(())
    }
}
