mod types;

pub use types::{CanvasError, Result};
