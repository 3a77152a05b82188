//! Render module
//!
//! Contains style resolution, card composition and software rasterization.

pub mod composition;
pub mod gradient;
pub mod image_loader;
pub mod style;
pub mod text_renderer;

pub use composition::{compose, Composition, Rasterizer, RenderError, SoftwareRasterizer};
pub use image_loader::{cover_fit, to_color_image, TemplateImageLoader, UploadError, UploadedImage};
pub use text_renderer::FontBook;
