//! Text renderer
//!
//! Uses fontdue to lay out and rasterize the card text into a coverage mask.
//! Bold and italic use the family's own faces when they are installed, and
//! fall back to a double strike and a shear otherwise.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use fontdue::{Font, FontSettings, Metrics};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::app::state::{Alignment, Emphasis, FontChoice};
use crate::render::style::ResolvedStyle;

/// Embedded font used when a family is not installed
static FALLBACK_FONT_DATA: &[u8] = epaint_default_fonts::UBUNTU_LIGHT;

/// Horizontal shift per pixel of height for synthetic italics
const ITALIC_SHEAR: f32 = 0.2;

/// Lazy-initialized fallback font instance
fn fallback_font() -> &'static Font {
    static FONT: OnceLock<Font> = OnceLock::new();
    FONT.get_or_init(|| {
        Font::from_bytes(FALLBACK_FONT_DATA, FontSettings::default())
            .expect("Failed to load embedded font")
    })
}

/// One face of a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FaceVariant {
    pub const ALL: [FaceVariant; 4] = [
        FaceVariant::Regular,
        FaceVariant::Bold,
        FaceVariant::Italic,
        FaceVariant::BoldItalic,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FaceVariant::Regular,
            (true, false) => FaceVariant::Bold,
            (false, true) => FaceVariant::Italic,
            (true, true) => FaceVariant::BoldItalic,
        }
    }

    /// File name suffix, as in `Poppins-BoldItalic.ttf`
    pub fn suffix(&self) -> &'static str {
        match self {
            FaceVariant::Regular => "Regular",
            FaceVariant::Bold => "Bold",
            FaceVariant::Italic => "Italic",
            FaceVariant::BoldItalic => "BoldItalic",
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FaceVariant::Bold | FaceVariant::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, FaceVariant::Italic | FaceVariant::BoldItalic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceId {
    Fallback,
    Family(FontChoice, FaceVariant),
}

/// The face chosen for a style, plus what still has to be synthesized
pub struct FaceSelection<'a> {
    pub id: FaceId,
    font: &'a Font,
    pub synthetic_bold: bool,
    pub synthetic_italic: bool,
}

struct Glyph {
    metrics: Metrics,
    coverage: Vec<u8>,
}

type GlyphKey = (FaceId, char, u32);

/// Single-channel coverage buffer the text is rasterized into
#[derive(Debug, Clone)]
pub struct CoverageMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CoverageMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x < self.width && y < self.height {
            self.data[y as usize * self.width as usize + x as usize]
        } else {
            0
        }
    }

    /// Max blend, so overlapping strokes never darken twice
    fn max(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = self.data[idx].max(value);
    }

    fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        for py in y..y + height {
            for px in x..x + width {
                self.max(px, py, 255);
            }
        }
    }
}

/// A laid-out text block in logical units
pub struct TextBlock<'a> {
    pub lines: &'a [String],
    pub style: &'a ResolvedStyle,
    pub font_size: f32,
    /// Distance between consecutive line tops
    pub line_height: f32,
    /// Top-left corner of the content box
    pub origin: (f32, f32),
    /// Content box width, used for alignment
    pub width: f32,
}

/// Loaded font families with a shared glyph cache
pub struct FontBook {
    families: HashMap<FontChoice, HashMap<FaceVariant, Font>>,
    glyphs: Mutex<HashMap<GlyphKey, Arc<Glyph>>>,
}

impl FontBook {
    /// Only the embedded fallback font
    pub fn embedded() -> Self {
        Self {
            families: HashMap::new(),
            glyphs: Mutex::new(HashMap::new()),
        }
    }

    /// Load every `<Family>-<Variant>.ttf` found in `dir`
    pub fn load(dir: &Path) -> Self {
        let mut book = Self::embedded();

        for choice in FontChoice::ALL {
            for variant in FaceVariant::ALL {
                let path = dir.join(format!("{}-{}.ttf", choice.file_stem(), variant.suffix()));
                let bytes = match std::fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(_) => {
                        debug!("Font face not installed: {}", path.display());
                        continue;
                    }
                };
                match Font::from_bytes(bytes, FontSettings::default()) {
                    Ok(font) => {
                        book.families.entry(choice).or_default().insert(variant, font);
                    }
                    Err(e) => warn!("Failed to parse font '{}': {}", path.display(), e),
                }
            }

            if book.has_family(choice) {
                info!("Font {}: {} face(s)", choice.display_name(), book.families[&choice].len());
            } else {
                info!("Font {}: using embedded fallback", choice.display_name());
            }
        }

        book
    }

    pub fn has_family(&self, choice: FontChoice) -> bool {
        self.families.contains_key(&choice)
    }

    /// Pick the closest installed face for a family and emphasis
    pub fn select(&self, choice: FontChoice, emphasis: Emphasis) -> FaceSelection<'_> {
        let (bold, italic) = (emphasis.bold, emphasis.italic);

        if let Some(faces) = self.families.get(&choice) {
            let candidates = [
                FaceVariant::from_flags(bold, italic),
                FaceVariant::from_flags(bold, false),
                FaceVariant::from_flags(false, italic),
                FaceVariant::Regular,
            ];
            for variant in candidates {
                if let Some(font) = faces.get(&variant) {
                    return FaceSelection {
                        id: FaceId::Family(choice, variant),
                        font,
                        synthetic_bold: bold && !variant.is_bold(),
                        synthetic_italic: italic && !variant.is_italic(),
                    };
                }
            }
        }

        FaceSelection {
            id: FaceId::Fallback,
            font: fallback_font(),
            synthetic_bold: bold,
            synthetic_italic: italic,
        }
    }

    fn glyph(&self, face: &FaceSelection<'_>, ch: char, px: f32) -> Arc<Glyph> {
        let key = (face.id, ch, px.to_bits());
        if let Some(glyph) = self.glyphs.lock().get(&key) {
            return Arc::clone(glyph);
        }

        let (metrics, coverage) = face.font.rasterize(ch, px);
        let glyph = Arc::new(Glyph { metrics, coverage });
        self.glyphs.lock().insert(key, Arc::clone(&glyph));
        glyph
    }

    fn advance(&self, face: &FaceSelection<'_>, ch: char, px: f32) -> f32 {
        face.font.metrics(ch, px).advance_width
    }

    /// Width of a line, ignoring trailing whitespace
    pub fn line_width(&self, line: &str, face: &FaceSelection<'_>, px: f32) -> f32 {
        line.trim_end()
            .chars()
            .map(|ch| self.advance(face, ch, px))
            .sum()
    }

    /// Break text into visual lines no wider than `max_width`
    ///
    /// Explicit line breaks are kept (including empty lines); paragraphs wrap
    /// at whitespace, and a single word wider than the box wraps by character.
    /// Whitespace never forces a break, it hangs past the edge.
    pub fn wrap_lines(
        &self,
        text: &str,
        face: &FaceSelection<'_>,
        px: f32,
        max_width: f32,
    ) -> Vec<String> {
        let mut lines = Vec::new();

        for paragraph in text.lines() {
            let mut current: Vec<(char, f32)> = Vec::new();
            let mut width = 0.0;
            // Index just past the last whitespace on the current line
            let mut last_break: Option<usize> = None;

            for ch in paragraph.chars() {
                let advance = self.advance(face, ch, px);

                if !ch.is_whitespace() && width + advance > max_width && !current.is_empty() {
                    let split_at = last_break.unwrap_or(current.len());
                    let rest = current.split_off(split_at);
                    lines.push(current.iter().map(|(c, _)| *c).collect());
                    current = rest;
                    width = current.iter().map(|(_, a)| a).sum();
                    last_break = None;
                }

                current.push((ch, advance));
                width += advance;
                if ch.is_whitespace() {
                    last_break = Some(current.len());
                }
            }

            lines.push(current.iter().map(|(c, _)| *c).collect());
        }

        lines
    }

    /// Rasterize a text block into `mask` at `scale` device pixels per unit
    pub fn render_block(&self, block: &TextBlock<'_>, scale: f32, mask: &mut CoverageMask) {
        let style = block.style;
        let face = self.select(style.font, style.emphasis);
        let px = block.font_size * scale;
        let advance = block.line_height * scale;

        let (ascent, descent) = face
            .font
            .horizontal_line_metrics(px)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((px * 0.8, -px * 0.2));
        let content_height = ascent - descent;

        let stroke = (px / 14.0).round().max(1.0) as i32;
        let bold_offset = if face.synthetic_bold { stroke } else { 0 };

        let left = block.origin.0 * scale;
        let box_width = block.width * scale;

        for (i, line) in block.lines.iter().enumerate() {
            let top = block.origin.1 * scale + i as f32 * advance;
            let baseline = top + (advance - content_height) / 2.0 + ascent;
            let line_width = self.line_width(line, &face, px);

            let start_x = match style.alignment {
                Alignment::Left => left,
                Alignment::Center => left + (box_width - line_width) / 2.0,
                Alignment::Right => left + box_width - line_width,
            };

            let mut pen = start_x;
            for ch in line.chars() {
                let glyph = self.glyph(&face, ch, px);
                if !ch.is_whitespace() {
                    self.blit_glyph(&glyph, pen, baseline, face.synthetic_italic, bold_offset, mask);
                }
                pen += glyph.metrics.advance_width;
            }

            if style.emphasis.underline && line_width > 0.0 {
                let y = (baseline + (px * 0.12).max(1.0)).round() as i32;
                mask.fill_rect(
                    start_x.round() as i32,
                    y,
                    line_width.round() as i32,
                    stroke,
                );
            }
        }
    }

    fn blit_glyph(
        &self,
        glyph: &Glyph,
        pen: f32,
        baseline: f32,
        italic: bool,
        bold_offset: i32,
        mask: &mut CoverageMask,
    ) {
        let metrics = &glyph.metrics;
        let glyph_x = pen.round() as i32 + metrics.xmin;
        let glyph_y = baseline.round() as i32 - metrics.height as i32 - metrics.ymin;

        for gy in 0..metrics.height {
            let py = glyph_y + gy as i32;
            let shear = if italic {
                ((baseline - py as f32) * ITALIC_SHEAR).round() as i32
            } else {
                0
            };

            for gx in 0..metrics.width {
                let coverage = glyph.coverage[gy * metrics.width + gx];
                if coverage == 0 {
                    continue;
                }
                let px = glyph_x + gx as i32 + shear;
                mask.max(px, py, coverage);

                // Faux bold: strike again to the right
                for dx in 1..=bold_offset {
                    mask.max(px + dx, py, coverage);
                }
            }
        }
    }
}
