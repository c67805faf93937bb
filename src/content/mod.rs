pub mod node;
pub mod chapter;
pub mod normalize;

pub use chapter::{Chapter, TitleSource};
pub use node::{ImageRef, Inline, StructuralNode};
pub use normalize::normalize;
