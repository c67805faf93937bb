//! 脊柱模块
//!
//! 提供EPUB包中阅读顺序（脊柱）的结构定义。

/// 脊柱项信息(阅读顺序)
#[derive(Debug, Clone, PartialEq)]
pub struct SpineItem {
    /// 引用的清单项ID
    pub idref: String,
    /// 是否线性阅读（linear="no" 时为false）
    pub linear: bool,
}

impl SpineItem {
    /// 创建新的脊柱项
    pub fn new(idref: String) -> Self {
        Self { idref, linear: true }
    }
}
