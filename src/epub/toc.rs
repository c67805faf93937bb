//! 目录标签
//!
//! 从NCX和EPUB3导航文档中收集“文档路径 → 目录标签”的映射，
//! 作为章节标题的第二优先级来源。

use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::epub::ncx::Ncx;
use crate::epub::path;

static NAV_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("nav").expect("valid selector"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// 文档路径到目录标签的映射
#[derive(Debug, Clone, Default)]
pub struct TocLabels {
    labels: HashMap<String, String>,
}

impl TocLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个标签；同一文档只保留第一个非空标签
    pub fn insert(&mut self, document_path: String, label: &str) {
        let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
        if label.is_empty() {
            return;
        }
        self.labels.entry(document_path).or_insert(label);
    }

    /// 查找指向某个文档的标签
    pub fn get(&self, document_path: &str) -> Option<&str> {
        self.labels.get(document_path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 合并NCX导航地图中的标签
    ///
    /// `ncx_path` 为NCX文件在容器中的完整路径，用于解析相对src。
    pub fn add_ncx(&mut self, ncx: &Ncx, ncx_path: &str) {
        let base_dir = path::parent_dir(ncx_path);
        for (label, src) in ncx.labels() {
            if src.is_empty() {
                continue;
            }
            self.insert(path::resolve(base_dir, src), label);
        }
    }

    /// 合并EPUB3导航文档（nav.xhtml）中的标签
    ///
    /// 优先使用 `epub:type="toc"` 的nav元素，否则使用第一个nav元素。
    pub fn add_nav_document(&mut self, html: &str, nav_path: &str) {
        let document = Html::parse_document(html);
        let navs: Vec<ElementRef> = document.select(&NAV_SELECTOR).collect();
        let toc_nav = navs
            .iter()
            .find(|nav| {
                nav.value()
                    .attr("epub:type")
                    .is_some_and(|types| types.split_whitespace().any(|t| t == "toc"))
            })
            .or_else(|| navs.first());

        let Some(toc_nav) = toc_nav else {
            return;
        };

        let base_dir = path::parent_dir(nav_path);
        for link in toc_nav.select(&LINK_SELECTOR) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if path::has_scheme(href) {
                continue;
            }
            let text: String = link.text().collect();
            self.insert(path::resolve(base_dir, href), &text);
        }
    }
}
