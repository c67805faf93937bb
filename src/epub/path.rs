//! 容器内路径处理
//!
//! EPUB中的href都是相对于所在文档的URL，这里统一转换为ZIP条目的完整路径。

use percent_encoding::percent_decode_str;

/// 返回路径所在目录（不含结尾的`/`），位于根目录时返回空串
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

/// 去掉URL中的 `#片段` 和 `?查询`
pub fn strip_fragment(href: &str) -> &str {
    let end = href.find(['#', '?']).unwrap_or(href.len());
    &href[..end]
}

/// href是否带有URL协议（http:、data:、mailto: 等）
pub fn has_scheme(href: &str) -> bool {
    match href.find(':') {
        Some(idx) => {
            let scheme = &href[..idx];
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// 把相对href解析为容器内的完整路径
///
/// 处理百分号编码、`.`、`..` 和以`/`开头的绝对路径；
/// 越过容器根目录的 `..` 会被忽略。
pub fn resolve(base_dir: &str, href: &str) -> String {
    let href = strip_fragment(href);
    let decoded = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    if !decoded.starts_with('/') {
        segments.extend(base_dir.split('/').filter(|s| !s.is_empty()));
    }

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
