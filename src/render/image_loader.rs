//! Image loading
//!
//! Decodes user uploads into data URIs plus pixels, loads bundled template
//! pictures from the assets directory, and converts bitmaps for egui.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use egui::ColorImage;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{info, warn};

/// Errors while reading an uploaded picture
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("not a base64 data URI")]
    NotDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A decoded user upload
///
/// Keeps the original bytes as a `data:` URI (which is what gets serialized)
/// next to the decoded pixels. Both are shared, so clones are cheap.
#[derive(Clone)]
pub struct UploadedImage {
    data_uri: Arc<str>,
    pixels: Arc<RgbaImage>,
}

impl UploadedImage {
    /// Decode any format the `image` crate recognizes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UploadError> {
        let format = image::guess_format(bytes)?;
        let decoded = image::load_from_memory_with_format(bytes, format)?;
        let data_uri = format!(
            "data:{};base64,{}",
            format.to_mime_type(),
            STANDARD.encode(bytes)
        );

        Ok(Self {
            data_uri: data_uri.into(),
            pixels: Arc::new(decoded.to_rgba8()),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = std::fs::read(path)?;
        let image = Self::from_bytes(&bytes)?;
        info!(
            "Loaded upload {} ({}x{})",
            path.display(),
            image.pixels.width(),
            image.pixels.height()
        );
        Ok(image)
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, UploadError> {
        let rest = uri.strip_prefix("data:").ok_or(UploadError::NotDataUri)?;
        let (meta, payload) = rest.split_once(',').ok_or(UploadError::NotDataUri)?;
        if !meta.ends_with(";base64") {
            return Err(UploadError::NotDataUri);
        }
        let bytes = STANDARD.decode(payload.trim())?;
        Self::from_bytes(&bytes)
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

impl PartialEq for UploadedImage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels) || self.data_uri == other.data_uri
    }
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.dimensions();
        f.debug_struct("UploadedImage")
            .field("width", &width)
            .field("height", &height)
            .field("data_uri_len", &self.data_uri.len())
            .finish()
    }
}

impl serde::Serialize for UploadedImage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.data_uri())
    }
}

impl<'de> serde::Deserialize<'de> for UploadedImage {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Self::from_data_uri(&uri).map_err(serde::de::Error::custom)
    }
}

/// Scale and center-crop `src` so it covers a `width` x `height` box
pub fn cover_fit(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 || width == 0 || height == 0 {
        return RgbaImage::new(width, height);
    }

    let scale = (width as f32 / sw as f32).max(height as f32 / sh as f32);
    let crop_w = ((width as f32 / scale).round() as u32).clamp(1, sw);
    let crop_h = ((height as f32 / scale).round() as u32).clamp(1, sh);
    let x = (sw - crop_w) / 2;
    let y = (sh - crop_h) / 2;

    let cropped = imageops::crop_imm(src, x, y, crop_w, crop_h).to_image();
    imageops::resize(&cropped, width, height, FilterType::Triangle)
}

/// Convert a bitmap into an egui image for texture upload
pub fn to_color_image(bitmap: &RgbaImage) -> ColorImage {
    let size = [bitmap.width() as usize, bitmap.height() as usize];
    ColorImage::from_rgba_unmultiplied(size, bitmap.as_raw())
}

/// Loader for bundled template pictures
///
/// Failed loads are cached too, so a missing asset is reported once and the
/// card falls back to its gradient from then on.
pub struct TemplateImageLoader {
    images: HashMap<PathBuf, Option<Arc<RgbaImage>>>,
    /// Base directory for resolving relative paths
    base_dir: PathBuf,
}

impl TemplateImageLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            images: HashMap::new(),
            base_dir,
        }
    }

    /// Resolve a path relative to the base directory
    pub fn resolve_path(&self, relative_path: &Path) -> PathBuf {
        if relative_path.is_absolute() {
            relative_path.to_path_buf()
        } else {
            self.base_dir.join(relative_path)
        }
    }

    pub fn load(&mut self, path: &Path) -> Option<Arc<RgbaImage>> {
        if let Some(cached) = self.images.get(path) {
            return cached.clone();
        }

        let full_path = self.resolve_path(path);
        let loaded = match image::open(&full_path) {
            Ok(img) => {
                let img = img.to_rgba8();
                info!("Loaded template image: {} ({}x{})", path.display(), img.width(), img.height());
                Some(Arc::new(img))
            }
            Err(e) => {
                warn!("Failed to load template image '{}': {}", full_path.display(), e);
                None
            }
        };

        self.images.insert(path.to_path_buf(), loaded.clone());
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_upload_from_bytes() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        let upload = UploadedImage::from_bytes(&png_bytes(&img)).unwrap();
        assert_eq!(upload.dimensions(), (4, 3));
        assert!(upload.data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(upload.pixels().get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_upload_survives_serde() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([200, 0, 0, 255]));
        let upload = UploadedImage::from_bytes(&png_bytes(&img)).unwrap();

        let json = serde_json::to_string(&upload).unwrap();
        let parsed: UploadedImage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, upload);
        assert_eq!(parsed.pixels().as_raw(), upload.pixels().as_raw());
    }

    #[test]
    fn test_clones_share_the_payload() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([5, 6, 7, 255]));
        let upload = UploadedImage::from_bytes(&png_bytes(&img)).unwrap();
        let copy = upload.clone();

        assert!(Arc::ptr_eq(&copy.data_uri, &upload.data_uri));
        assert!(Arc::ptr_eq(copy.pixels(), upload.pixels()));
        assert_eq!(copy, upload);

        // Separately decoded uploads still compare by content
        let other = UploadedImage::from_bytes(&png_bytes(&img)).unwrap();
        assert!(!Arc::ptr_eq(other.pixels(), upload.pixels()));
        assert_eq!(other, upload);
    }

    #[test]
    fn test_corrupt_upload_is_rejected() {
        assert!(matches!(
            UploadedImage::from_bytes(b"definitely not a picture"),
            Err(UploadError::Decode(_))
        ));
        assert!(matches!(
            UploadedImage::from_data_uri("https://example.com/a.png"),
            Err(UploadError::NotDataUri)
        ));
        assert!(matches!(
            UploadedImage::from_data_uri("data:image/png;base64,@@@"),
            Err(UploadError::Base64(_))
        ));
    }

    #[test]
    fn test_cover_fit_crops_the_long_side() {
        // Left half red, right half blue, 200x100
        let src = RgbaImage::from_fn(200, 100, |x, _| {
            if x < 100 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });

        // Square box keeps the middle 100x100 strip
        let fitted = cover_fit(&src, 50, 50);
        assert_eq!(fitted.dimensions(), (50, 50));
        assert_eq!(fitted.get_pixel(2, 25).0[0], 255);
        assert_eq!(fitted.get_pixel(47, 25).0[2], 255);
    }

    #[test]
    fn test_to_color_image() {
        let bitmap = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let color_image = to_color_image(&bitmap);
        assert_eq!(color_image.size, [3, 2]);
        assert_eq!(color_image.pixels.len(), 6);
    }

    #[test]
    fn test_missing_template_image_is_cached_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = TemplateImageLoader::new(dir.path().to_path_buf());
        assert!(loader.load(Path::new("template-love.jpg")).is_none());
        assert!(loader.images.contains_key(Path::new("template-love.jpg")));

        let img = RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255]));
        img.save(dir.path().join("present.png")).unwrap();
        let loaded = loader.load(Path::new("present.png")).unwrap();
        assert_eq!(loaded.dimensions(), (8, 8));
    }
}
