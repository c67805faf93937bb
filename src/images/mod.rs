pub mod process;
pub mod pipeline;

pub use pipeline::{IMAGE_DIR, ImageLink, ImageMapping, ImageOutput, RenderedImage, extract_images};
pub use process::{ProcessedImage, process_image};
