pub mod slug;
pub mod render;

pub use render::{MarkdownFile, render, render_multi_file, render_single_file};
pub use slug::{NameRegistry, slugify};
