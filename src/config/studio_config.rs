//! StudioConfig data structure
//!
//! Preview size, export settings, asset locations and card layout constants.
//! Every field has a default, so a config file only needs the values it changes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Soft shadow under the opaque text panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShadowConfig {
    pub offset_y: f32,
    pub blur: f32,
    /// Peak opacity (0-255)
    pub alpha: u8,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            offset_y: 4.0,
            blur: 20.0,
            alpha: 26,
        }
    }
}

/// Card layout in logical pixels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    /// Card width; height follows the orientation's aspect ratio
    #[serde(default = "default_card_width")]
    pub card_width: f32,
    #[serde(default = "default_card_radius")]
    pub card_radius: f32,
    /// Distance between the card edge and the text panel
    #[serde(default = "default_panel_inset")]
    pub panel_inset: f32,
    #[serde(default = "default_panel_padding")]
    pub panel_padding: f32,
    #[serde(default = "default_panel_radius")]
    pub panel_radius: f32,
    /// Opacity of the white panel backing (0-255)
    #[serde(default = "default_panel_alpha")]
    pub panel_alpha: u8,
    #[serde(default)]
    pub shadow: ShadowConfig,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Line height as a multiple of the font size
    #[serde(default = "default_line_height")]
    pub line_height: f32,
    /// CSS-style gradient angle in degrees
    #[serde(default = "default_gradient_angle")]
    pub gradient_angle: f32,
}

fn default_card_width() -> f32 {
    448.0
}

fn default_card_radius() -> f32 {
    16.0
}

fn default_panel_inset() -> f32 {
    32.0
}

fn default_panel_padding() -> f32 {
    24.0
}

fn default_panel_radius() -> f32 {
    12.0
}

fn default_panel_alpha() -> u8 {
    230
}

fn default_font_size() -> f32 {
    14.0
}

fn default_line_height() -> f32 {
    1.625
}

fn default_gradient_angle() -> f32 {
    135.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            card_width: default_card_width(),
            card_radius: default_card_radius(),
            panel_inset: default_panel_inset(),
            panel_padding: default_panel_padding(),
            panel_radius: default_panel_radius(),
            panel_alpha: default_panel_alpha(),
            shadow: ShadowConfig::default(),
            font_size: default_font_size(),
            line_height: default_line_height(),
            gradient_angle: default_gradient_angle(),
        }
    }
}

impl LayoutConfig {
    /// Distance between consecutive baselines
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// Linear supersampling factor applied when rasterizing for export
    #[serde(default = "default_export_scale")]
    pub scale: f32,
    /// Directory receiving `card-<millis>.png` files
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

fn default_export_scale() -> f32 {
    2.0
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: default_export_scale(),
            dir: default_export_dir(),
        }
    }
}

/// Main studio configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioConfig {
    #[serde(default = "default_config_version")]
    pub version: i32,
    /// Directory holding bundled template pictures
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// Directory holding `<Family>-Regular.ttf` style font files
    #[serde(default = "default_fonts_dir")]
    pub fonts_dir: PathBuf,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

fn default_config_version() -> i32 {
    1
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_fonts_dir() -> PathBuf {
    PathBuf::from("fonts")
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            assets_dir: default_assets_dir(),
            fonts_dir: default_fonts_dir(),
            export: ExportConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: StudioConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    // Convenience accessors

    pub fn export_scale(&self) -> f32 {
        self.export.scale
    }

    pub fn export_dir(&self) -> &Path {
        &self.export.dir
    }

    pub fn card_width(&self) -> f32 {
        self.layout.card_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StudioConfig::default();
        assert_eq!(config.export_scale(), 2.0);
        assert_eq!(config.card_width(), 448.0);
        assert_eq!(config.layout.panel_alpha, 230);
        assert!((config.layout.line_advance() - 22.75).abs() < 1e-4);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "export": {{ "dir": "out" }}, "layout": {{ "font_size": 16.0 }} }}"#)
            .unwrap();

        let config = StudioConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.export_dir(), Path::new("out"));
        assert_eq!(config.export_scale(), 2.0);
        assert_eq!(config.layout.font_size, 16.0);
        assert_eq!(config.layout.panel_padding, 24.0);
        assert_eq!(config.fonts_dir, PathBuf::from("fonts"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = StudioConfig::load_from_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
