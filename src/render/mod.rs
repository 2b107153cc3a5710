mod core;

pub use core::{HtmlRenderer, RendererSettings};
