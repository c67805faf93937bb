//! 文件名与锚点

use std::collections::{HashMap, HashSet};

/// 文件名片段的最大字符数
pub const MAX_SLUG_CHARS: usize = 80;

/// 把文本转换为文件名片段
///
/// 转为小写，保留Unicode字母和数字，其他连续字符替换为一个`_`，
/// 去掉首尾的`_`，最多保留 [`MAX_SLUG_CHARS`] 个字符。
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let capped: String = slug.trim_matches('_').chars().take(MAX_SLUG_CHARS).collect();
    capped.trim_end_matches('_').to_string()
}

/// 同一输出命名空间内的文件名登记表
///
/// 名称按调用顺序分配，冲突时追加第一个未使用的 `_01`、`_02`……后缀，
/// 所以相同的调用顺序总是得到相同的文件名。
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记并返回最终文件名
    pub fn claim(&mut self, stem: &str, extension: &str) -> String {
        let mut candidate = format!("{}.{}", stem, extension);
        let mut suffix = 1;
        while self.taken.contains(&candidate) {
            candidate = format!("{}_{:02}.{}", stem, suffix, extension);
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}

/// 按GitHub规则生成标题锚点，重复的锚点追加 `-1`、`-2`……
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    seen: HashMap<String, usize>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor(&mut self, heading: &str) -> String {
        let mut base = String::with_capacity(heading.len());
        for ch in heading.trim().chars() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                base.extend(ch.to_lowercase());
            } else if ch.is_whitespace() {
                base.push('-');
            }
        }

        let count = self.seen.entry(base.clone()).or_insert(0);
        let anchor = if *count == 0 { base } else { format!("{}-{}", base, count) };
        *count += 1;
        anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Cover"), "the_cover");
        assert_eq!(slugify("  Hello, World!  "), "hello_world");
        assert_eq!(slugify("第一章 开始"), "第一章_开始");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_slugify_caps_length() {
        let long = "word ".repeat(40);
        let slug = slugify(&long);
        assert!(slug.chars().count() <= MAX_SLUG_CHARS);
        assert!(!slug.ends_with('_'));
    }

    #[test]
    fn test_registry_suffixes() {
        let mut registry = NameRegistry::new();
        assert_eq!(registry.claim("cover", "jpg"), "cover.jpg");
        assert_eq!(registry.claim("cover", "jpg"), "cover_01.jpg");
        assert_eq!(registry.claim("cover", "jpg"), "cover_02.jpg");
        assert_eq!(registry.claim("cover", "md"), "cover.md");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_registry_skips_taken_suffix() {
        let mut registry = NameRegistry::new();
        registry.claim("cover_01", "jpg");
        registry.claim("cover", "jpg");
        assert_eq!(registry.claim("cover", "jpg"), "cover_02.jpg");
    }

    #[test]
    fn test_anchors() {
        let mut anchors = AnchorRegistry::new();
        assert_eq!(anchors.anchor("Chapter One: Start"), "chapter-one-start");
        assert_eq!(anchors.anchor("Chapter One: Start"), "chapter-one-start-1");
        assert_eq!(anchors.anchor("第一章"), "第一章");
    }
}
