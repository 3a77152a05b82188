//! Card composition
//!
//! `compose` turns a template and an editor state into a described layer
//! stack (background, text panel, text). A `Rasterizer` paints that
//! description into pixels; the software implementation here serves both the
//! live preview and the export.

use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::app::state::EditorState;
use crate::config::{GradientKey, LayoutConfig, ShadowConfig, Template};
use crate::render::gradient::{gradient_stops, interpolate_gradient, LinearGradient};
use crate::render::image_loader::cover_fit;
use crate::render::style::{resolve, ResolvedStyle};
use crate::render::text_renderer::{CoverageMask, FontBook, TextBlock};
use crate::utils::color::{blend_rgba, with_coverage, Rgb};

/// Largest canvas side the rasterizer accepts
pub const MAX_CANVAS_SIDE: u32 = 16_384;

/// Axis-aligned rectangle in logical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    pub fn center(&self) -> Vec2 {
        self.min + self.size * 0.5
    }

    pub fn shrink(&self, amount: f32) -> Rect {
        let size = (self.size - Vec2::splat(2.0 * amount)).max(Vec2::ZERO);
        Rect {
            min: self.min + Vec2::splat(amount),
            size,
        }
    }

    pub fn scaled(&self, scale: f32) -> Rect {
        Rect {
            min: self.min * scale,
            size: self.size * scale,
        }
    }

    pub fn translated(&self, offset: Vec2) -> Rect {
        Rect {
            min: self.min + offset,
            size: self.size,
        }
    }
}

/// Signed distance from `p` to a rounded rectangle, negative inside
fn rounded_rect_sdf(p: Vec2, rect: &Rect, radius: f32) -> f32 {
    let half = rect.size * 0.5;
    let r = radius.min(half.x).min(half.y).max(0.0);
    let q = (p - rect.center()).abs() - half + Vec2::splat(r);
    q.max(Vec2::ZERO).length() + q.x.max(q.y).min(0.0) - r
}

/// Anti-aliased pixel coverage for a signed distance
fn edge_coverage(distance: f32) -> f32 {
    (0.5 - distance).clamp(0.0, 1.0)
}

/// Background fill of the card
#[derive(Clone)]
pub enum Background {
    Gradient {
        key: GradientKey,
        stops: [Rgb; 2],
        angle: f32,
    },
    Image(Arc<RgbaImage>),
}

impl fmt::Debug for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::Gradient { key, stops, angle } => f
                .debug_struct("Gradient")
                .field("key", key)
                .field("stops", stops)
                .field("angle", angle)
                .finish(),
            Background::Image(img) => write!(f, "Image({}x{})", img.width(), img.height()),
        }
    }
}

/// Where the background came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundSource {
    Upload,
    Template,
    Gradient,
}

/// Opaque backing of the text panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelBacking {
    pub color: Rgba<u8>,
    pub shadow: ShadowConfig,
}

#[derive(Debug, Clone)]
pub struct PanelLayer {
    pub rect: Rect,
    pub radius: f32,
    /// `None` when the backdrop is transparent
    pub backing: Option<PanelBacking>,
}

#[derive(Debug, Clone)]
pub struct TextLayer {
    /// Visual lines after wrapping
    pub lines: Vec<String>,
    pub style: ResolvedStyle,
    pub font_size: f32,
    pub line_height: f32,
    /// Content box inside the panel padding
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub enum Layer {
    Background {
        fill: Background,
        source: BackgroundSource,
    },
    Panel(PanelLayer),
    Text(TextLayer),
}

/// The resolved layer stack of one card, back to front
#[derive(Debug, Clone)]
pub struct Composition {
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
    pub layers: Vec<Layer>,
}

impl Composition {
    /// Canvas size in device pixels at `scale`
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        (
            (self.width * scale).round() as u32,
            (self.height * scale).round() as u32,
        )
    }
}

/// Build the layer stack for a card
///
/// Background precedence: the user's upload, then the template picture (when
/// it could be loaded), then the gradient keyed by the template color.
pub fn compose(
    template: &Template,
    state: &EditorState,
    template_image: Option<Arc<RgbaImage>>,
    layout: &LayoutConfig,
    fonts: &FontBook,
) -> Composition {
    let (width, height) = state.orientation.box_size(layout.card_width);

    let (fill, source) = match (&state.background_image, template_image) {
        (Some(upload), _) => (Background::Image(Arc::clone(upload.pixels())), BackgroundSource::Upload),
        (None, Some(img)) => (Background::Image(img), BackgroundSource::Template),
        (None, None) => (
            Background::Gradient {
                key: template.color,
                stops: gradient_stops(template.color),
                angle: layout.gradient_angle,
            },
            BackgroundSource::Gradient,
        ),
    };

    let style = resolve(state);
    let inset = layout.panel_inset;
    let padding = layout.panel_padding;
    let panel_width = (width - 2.0 * inset).max(0.0);
    let content_width = (panel_width - 2.0 * padding).max(0.0);

    let face = fonts.select(style.font, style.emphasis);
    let lines = fonts.wrap_lines(&state.text, &face, layout.font_size, content_width);
    let line_height = layout.line_advance();
    let panel_height = lines.len() as f32 * line_height + 2.0 * padding;

    // Vertically centered in the inset area; overflows evenly when too tall
    let panel_y = inset + ((height - 2.0 * inset) - panel_height) / 2.0;
    let panel_rect = Rect::new(inset, panel_y, panel_width, panel_height);

    let backing = (!state.transparent_backdrop).then(|| PanelBacking {
        color: Rgb::WHITE.with_alpha(layout.panel_alpha),
        shadow: layout.shadow.clone(),
    });

    debug!(
        "Composed {}x{} card: background={:?}, {} line(s), backdrop={}, classes=[{}]",
        width,
        height,
        source,
        lines.len(),
        if backing.is_some() { "opaque" } else { "transparent" },
        style.classes(state.text_color()).join(" ")
    );

    Composition {
        width,
        height,
        corner_radius: layout.card_radius,
        layers: vec![
            Layer::Background { fill, source },
            Layer::Panel(PanelLayer {
                rect: panel_rect,
                radius: layout.panel_radius,
                backing,
            }),
            Layer::Text(TextLayer {
                lines,
                style,
                font_size: layout.font_size,
                line_height,
                rect: panel_rect.shrink(padding),
            }),
        ],
    }
}

/// Errors while painting a composition
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid render scale {0}")]
    InvalidScale(f32),
    #[error("canvas {width}x{height} is empty or larger than {MAX_CANVAS_SIDE}px per side")]
    CanvasSize { width: u32, height: u32 },
}

/// Paints a described composition into a bitmap
pub trait Rasterizer {
    /// `scale` is device pixels per logical unit; 2.0 gives 4x the pixel area
    fn rasterize(&self, composition: &Composition, scale: f32) -> Result<RgbaImage, RenderError>;
}

/// CPU rasterizer built on `image` and `fontdue`
///
/// The canvas starts fully transparent; anything outside the rounded card
/// stays transparent in the output.
pub struct SoftwareRasterizer {
    fonts: Arc<FontBook>,
}

impl SoftwareRasterizer {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &Arc<FontBook> {
        &self.fonts
    }
}

/// Per-pixel coverage of the rounded card outline
struct CardClip {
    width: u32,
    coverage: Vec<f32>,
}

impl CardClip {
    fn new(width: u32, height: u32, card: &Rect, radius: f32) -> Self {
        let mut coverage = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                coverage.push(edge_coverage(rounded_rect_sdf(p, card, radius)));
            }
        }
        Self { width, coverage }
    }

    fn at(&self, x: u32, y: u32) -> f32 {
        self.coverage[y as usize * self.width as usize + x as usize]
    }
}

fn blend_pixel(canvas: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>, coverage: f32) {
    if coverage <= 0.0 {
        return;
    }
    let dst = canvas.get_pixel_mut(x, y);
    *dst = blend_rgba(*dst, with_coverage(color, coverage));
}

/// Pixel bounds of a rect grown by `margin`, clamped to the canvas
fn pixel_bounds(rect: &Rect, margin: f32, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let min = (rect.min - Vec2::splat(margin)).floor().max(Vec2::ZERO);
    let max = (rect.max() + Vec2::splat(margin)).ceil();
    let x1 = (max.x.max(0.0) as u32).min(width);
    let y1 = (max.y.max(0.0) as u32).min(height);
    ((min.x as u32).min(x1), (min.y as u32).min(y1), x1, y1)
}

impl SoftwareRasterizer {
    fn paint_background(&self, canvas: &mut RgbaImage, fill: &Background, clip: &CardClip) {
        let (width, height) = canvas.dimensions();
        match fill {
            Background::Gradient { stops, angle, .. } => {
                let gradient = LinearGradient::new(width as f32, height as f32, *angle);
                for y in 0..height {
                    for x in 0..width {
                        let t = gradient.t_at(x as f32 + 0.5, y as f32 + 0.5);
                        let color = interpolate_gradient(stops, t).with_alpha(255);
                        blend_pixel(canvas, x, y, color, clip.at(x, y));
                    }
                }
            }
            Background::Image(img) => {
                let fitted = cover_fit(img, width, height);
                for y in 0..height {
                    for x in 0..width {
                        blend_pixel(canvas, x, y, *fitted.get_pixel(x, y), clip.at(x, y));
                    }
                }
            }
        }
    }

    fn paint_panel(
        &self,
        canvas: &mut RgbaImage,
        panel: &PanelLayer,
        backing: &PanelBacking,
        scale: f32,
        clip: &CardClip,
    ) {
        let (width, height) = canvas.dimensions();
        let rect = panel.rect.scaled(scale);
        let radius = panel.radius * scale;

        let shadow = &backing.shadow;
        let blur = (shadow.blur * scale).max(1.0);
        let shadow_rect = rect.translated(Vec2::new(0.0, shadow.offset_y * scale));
        let shadow_color = Rgba([0, 0, 0, shadow.alpha]);
        let (x0, y0, x1, y1) = pixel_bounds(&shadow_rect, blur, width, height);
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let d = rounded_rect_sdf(p, &shadow_rect, radius);
                // Only the part outside the panel is visible
                let outside = 1.0 - edge_coverage(rounded_rect_sdf(p, &rect, radius));
                let intensity = (0.5 - d / blur).clamp(0.0, 1.0) * outside;
                blend_pixel(canvas, x, y, shadow_color, intensity * clip.at(x, y));
            }
        }

        let (x0, y0, x1, y1) = pixel_bounds(&rect, 1.0, width, height);
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let coverage = edge_coverage(rounded_rect_sdf(p, &rect, radius));
                blend_pixel(canvas, x, y, backing.color, coverage * clip.at(x, y));
            }
        }
    }

    fn paint_text(&self, canvas: &mut RgbaImage, text: &TextLayer, scale: f32, clip: &CardClip) {
        if text.lines.is_empty() {
            return;
        }

        let (width, height) = canvas.dimensions();
        let mut mask = CoverageMask::new(width, height);
        let block = TextBlock {
            lines: &text.lines,
            style: &text.style,
            font_size: text.font_size,
            line_height: text.line_height,
            origin: (text.rect.min.x, text.rect.min.y),
            width: text.rect.size.x,
        };
        self.fonts.render_block(&block, scale, &mut mask);

        let color = text.style.color.with_alpha(255);
        for y in 0..height {
            for x in 0..width {
                let coverage = mask.get(x, y);
                if coverage > 0 {
                    blend_pixel(canvas, x, y, color, coverage as f32 / 255.0 * clip.at(x, y));
                }
            }
        }
    }
}

impl Rasterizer for SoftwareRasterizer {
    fn rasterize(&self, composition: &Composition, scale: f32) -> Result<RgbaImage, RenderError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::InvalidScale(scale));
        }

        let (width, height) = composition.pixel_size(scale);
        if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
            return Err(RenderError::CanvasSize { width, height });
        }

        let mut canvas = RgbaImage::new(width, height);
        let card = Rect::new(0.0, 0.0, composition.width, composition.height).scaled(scale);
        let clip = CardClip::new(width, height, &card, composition.corner_radius * scale);

        for layer in &composition.layers {
            match layer {
                Layer::Background { fill, source } => {
                    debug!("Painting {:?} background at {}x{}", source, width, height);
                    self.paint_background(&mut canvas, fill, &clip)
                }
                Layer::Panel(panel) => {
                    if let Some(backing) = &panel.backing {
                        self.paint_panel(&mut canvas, panel, backing, scale, &clip);
                    }
                }
                Layer::Text(text) => self.paint_text(&mut canvas, text, scale, &clip),
            }
        }

        Ok(canvas)
    }
}
