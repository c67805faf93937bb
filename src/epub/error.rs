use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// 转换过程中的错误类型
///
/// `InvalidContainer`、`MissingManifest`、`MalformedManifest`、`InvalidConfiguration`
/// 是致命错误，会立即终止整个转换；`MalformedDocument`、`MissingAsset`、
/// `UnsupportedImageFormat` 是可恢复错误，只跳过对应的章节或图片，并记录为警告。
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("无法打开EPUB容器: {0}")]
    InvalidContainer(String),

    #[error("找不到OPF包文件: {0}")]
    MissingManifest(String),

    #[error("OPF清单错误: 脊柱引用了不存在的清单项 '{idref}'")]
    MalformedManifest { idref: String },

    #[error("OPF文件解析错误: {0}")]
    OpfParseError(String),

    #[error("章节文档格式错误 {href}: {reason}")]
    MalformedDocument { href: String, reason: String },

    #[error("容器中找不到图片资源: {reference}")]
    MissingAsset { reference: String },

    #[error("无法解码图片 {reference}: {reason}")]
    UnsupportedImageFormat { reference: String, reason: String },

    #[error("图片编码失败 {reference}: {reason}")]
    ImageEncode { reference: String, reason: String },

    #[error("无效的转换配置: {0}")]
    InvalidConfiguration(String),

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}

impl EpubError {
    /// 是否为可恢复错误（跳过当前单元后继续转换）
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EpubError::MalformedDocument { .. }
                | EpubError::MissingAsset { .. }
                | EpubError::UnsupportedImageFormat { .. }
                | EpubError::ImageEncode { .. }
        )
    }
}

/// 转换过程中记录的可恢复错误
#[derive(Debug)]
pub struct Warning {
    /// 出错章节的序号（从1开始），与章节无关时为None
    pub chapter: Option<usize>,
    pub error: EpubError,
}

impl Warning {
    pub fn new(chapter: Option<usize>, error: EpubError) -> Self {
        Self { chapter, error }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chapter {
            Some(ordinal) => write!(f, "第{}章: {}", ordinal, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
