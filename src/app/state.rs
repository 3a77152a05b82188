//! Editor state and navigation
//!
//! `EditorState` records what the user chose for one card. Every setter is
//! total; the renderer derives the visual description from this struct.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Template;
use crate::render::{UploadError, UploadedImage};
use crate::utils::color::Rgb;

/// Initial card text; the bracketed tokens are meant to be replaced by hand
pub const DEFAULT_CARD_TEXT: &str =
    "Querido/a [Nombre],\n\nEscribe aquí tu mensaje especial...\n\nCon amor,\n[Tu nombre]";

/// Fixed letters offered by the suggestion button
pub const SAMPLE_LETTERS: [&str; 3] = [
    "Querido/a amor mío,\n\nCada día a tu lado es una nueva aventura llena de sonrisas y momentos únicos. Gracias por ser la luz que ilumina mi camino.\n\nCon todo mi amor,\n❤️",
    "Mi querido/a amigo/a,\n\nLa amistad que compartimos es uno de los tesoros más valiosos de mi vida. Gracias por estar siempre ahí, en las buenas y en las malas.\n\nCon cariño infinito,\n🌟",
    "Para ti, persona especial,\n\nQuiero que sepas lo agradecido/a que estoy por todo lo que has hecho. Tu generosidad y bondad no tienen límites.\n\nCon gratitud,\n🙏",
];

/// Font family choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FontChoice {
    #[default]
    Poppins,
    DancingScript,
    PlayfairDisplay,
    Inter,
}

impl FontChoice {
    pub const ALL: [FontChoice; 4] = [
        FontChoice::Poppins,
        FontChoice::DancingScript,
        FontChoice::PlayfairDisplay,
        FontChoice::Inter,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            FontChoice::Poppins => "Poppins",
            FontChoice::DancingScript => "Dancing Script",
            FontChoice::PlayfairDisplay => "Playfair Display",
            FontChoice::Inter => "Inter",
        }
    }

    /// Style class the choice maps to
    pub fn class_name(&self) -> &'static str {
        match self {
            FontChoice::Poppins => "font-display",
            FontChoice::DancingScript => "font-script",
            FontChoice::PlayfairDisplay => "font-elegant",
            FontChoice::Inter => "font-body",
        }
    }

    /// File name prefix in the fonts directory
    pub fn file_stem(&self) -> &'static str {
        match self {
            FontChoice::Poppins => "Poppins",
            FontChoice::DancingScript => "DancingScript",
            FontChoice::PlayfairDisplay => "PlayfairDisplay",
            FontChoice::Inter => "Inter",
        }
    }
}

/// Named text color palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    Rosa,
    Lavanda,
    Durazno,
    Menta,
    #[default]
    Negro,
    Blanco,
}

impl NamedColor {
    pub const ALL: [NamedColor; 6] = [
        NamedColor::Rosa,
        NamedColor::Lavanda,
        NamedColor::Durazno,
        NamedColor::Menta,
        NamedColor::Negro,
        NamedColor::Blanco,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            NamedColor::Rosa => "Rosa",
            NamedColor::Lavanda => "Lavanda",
            NamedColor::Durazno => "Durazno",
            NamedColor::Menta => "Menta",
            NamedColor::Negro => "Negro",
            NamedColor::Blanco => "Blanco",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            NamedColor::Rosa => "text-love",
            NamedColor::Lavanda => "text-friendship",
            NamedColor::Durazno => "text-gratitude",
            NamedColor::Menta => "text-inspiration",
            NamedColor::Negro => "text-foreground",
            NamedColor::Blanco => "text-white",
        }
    }

    pub fn rgb(&self) -> Rgb {
        match self {
            NamedColor::Rosa => Rgb::new(0xE0, 0x45, 0x7B),
            NamedColor::Lavanda => Rgb::new(0x8B, 0x5C, 0xF6),
            NamedColor::Durazno => Rgb::new(0xF9, 0x73, 0x16),
            NamedColor::Menta => Rgb::new(0x10, 0xB9, 0x81),
            NamedColor::Negro => Rgb::new(0x1F, 0x1F, 0x2E),
            NamedColor::Blanco => Rgb::WHITE,
        }
    }
}

/// Active text color: a palette entry or a custom RGB value, never both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextColor {
    Named(NamedColor),
    Custom(Rgb),
}

impl TextColor {
    pub fn is_custom(&self) -> bool {
        matches!(self, TextColor::Custom(_))
    }
}

impl Default for TextColor {
    fn default() -> Self {
        TextColor::Named(NamedColor::default())
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub const ALL: [Alignment; 3] = [Alignment::Left, Alignment::Center, Alignment::Right];

    pub fn class_name(&self) -> &'static str {
        match self {
            Alignment::Left => "text-left",
            Alignment::Center => "text-center",
            Alignment::Right => "text-right",
        }
    }
}

/// Independent emphasis flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Emphasis {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

/// Card orientation, each bound to a fixed aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
    Square,
}

impl Orientation {
    pub const ALL: [Orientation; 3] =
        [Orientation::Vertical, Orientation::Horizontal, Orientation::Square];

    /// Aspect ratio as (width, height)
    pub fn aspect_ratio(&self) -> (u32, u32) {
        match self {
            Orientation::Vertical => (3, 4),
            Orientation::Horizontal => (4, 3),
            Orientation::Square => (1, 1),
        }
    }

    /// Card box size for a given width
    pub fn box_size(&self, width: f32) -> (f32, f32) {
        let (w, h) = self.aspect_ratio();
        (width, width * h as f32 / w as f32)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Orientation::Vertical => "Vertical",
            Orientation::Horizontal => "Horizontal",
            Orientation::Square => "Cuadrada",
        }
    }
}

/// Everything the user chose for one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredEditorState")]
pub struct EditorState {
    pub text: String,
    pub font: FontChoice,
    text_color: TextColor,
    /// Palette entry restored when the custom color is switched off
    last_named: NamedColor,
    /// Custom value restored when the custom color is switched on
    last_custom: Rgb,
    pub alignment: Alignment,
    pub emphasis: Emphasis,
    pub transparent_backdrop: bool,
    pub orientation: Orientation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<UploadedImage>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self {
            text: DEFAULT_CARD_TEXT.to_string(),
            font: FontChoice::default(),
            text_color: TextColor::default(),
            last_named: NamedColor::default(),
            last_custom: Rgb::new(0xFF, 0x6B, 0x9D),
            alignment: Alignment::default(),
            emphasis: Emphasis::default(),
            transparent_backdrop: false,
            orientation: Orientation::default(),
            background_image: None,
        }
    }
}

/// Serialized form of `EditorState`
///
/// The remembered colors may be missing from older or hand-written files; the
/// active `text_color` always wins for its own kind.
#[derive(Deserialize)]
#[serde(default)]
struct StoredEditorState {
    text: String,
    font: FontChoice,
    text_color: TextColor,
    last_named: Option<NamedColor>,
    last_custom: Option<Rgb>,
    alignment: Alignment,
    emphasis: Emphasis,
    transparent_backdrop: bool,
    orientation: Orientation,
    background_image: Option<UploadedImage>,
}

impl Default for StoredEditorState {
    fn default() -> Self {
        let state = EditorState::default();
        Self {
            text: state.text,
            font: state.font,
            text_color: state.text_color,
            last_named: None,
            last_custom: None,
            alignment: state.alignment,
            emphasis: state.emphasis,
            transparent_backdrop: state.transparent_backdrop,
            orientation: state.orientation,
            background_image: None,
        }
    }
}

impl From<StoredEditorState> for EditorState {
    fn from(stored: StoredEditorState) -> Self {
        let defaults = EditorState::default();
        let (last_named, last_custom) = match stored.text_color {
            TextColor::Named(named) => (named, stored.last_custom.unwrap_or(defaults.last_custom)),
            TextColor::Custom(rgb) => (stored.last_named.unwrap_or(defaults.last_named), rgb),
        };

        Self {
            text: stored.text,
            font: stored.font,
            text_color: stored.text_color,
            last_named,
            last_custom,
            alignment: stored.alignment,
            emphasis: stored.emphasis,
            transparent_backdrop: stored.transparent_backdrop,
            orientation: stored.orientation,
            background_image: stored.background_image,
        }
    }
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text_color(&self) -> TextColor {
        self.text_color
    }

    /// Palette entry that is, or would be, active without the custom color
    pub fn named_color(&self) -> NamedColor {
        self.last_named
    }

    /// Custom value that is, or would be, active with the custom color
    pub fn custom_color(&self) -> Rgb {
        self.last_custom
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_font(&mut self, font: FontChoice) {
        self.font = font;
    }

    /// Select a palette entry; turns the custom color off
    pub fn set_named_color(&mut self, color: NamedColor) {
        self.last_named = color;
        self.text_color = TextColor::Named(color);
    }

    /// Set the custom value; turns the custom color on
    pub fn set_custom_color(&mut self, color: Rgb) {
        self.last_custom = color;
        self.text_color = TextColor::Custom(color);
    }

    /// The single toggle between palette and custom color
    pub fn set_custom_color_enabled(&mut self, enabled: bool) {
        self.text_color = if enabled {
            TextColor::Custom(self.last_custom)
        } else {
            TextColor::Named(self.last_named)
        };
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
    }

    pub fn set_bold(&mut self, bold: bool) {
        self.emphasis.bold = bold;
    }

    pub fn set_italic(&mut self, italic: bool) {
        self.emphasis.italic = italic;
    }

    pub fn set_underline(&mut self, underline: bool) {
        self.emphasis.underline = underline;
    }

    pub fn toggle_bold(&mut self) {
        self.emphasis.bold = !self.emphasis.bold;
    }

    pub fn toggle_italic(&mut self) {
        self.emphasis.italic = !self.emphasis.italic;
    }

    pub fn toggle_underline(&mut self) {
        self.emphasis.underline = !self.emphasis.underline;
    }

    pub fn set_transparent_backdrop(&mut self, transparent: bool) {
        self.transparent_backdrop = transparent;
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn set_background_image(&mut self, image: UploadedImage) {
        self.background_image = Some(image);
    }

    /// Decode `bytes` as the new background
    ///
    /// Undecodable data leaves the current background in place.
    pub fn try_set_background_bytes(&mut self, bytes: &[u8]) -> Result<(), UploadError> {
        match UploadedImage::from_bytes(bytes) {
            Ok(image) => {
                self.set_background_image(image);
                Ok(())
            }
            Err(e) => {
                warn!("Ignoring upload: {}", e);
                Err(e)
            }
        }
    }

    /// Like `try_set_background_bytes`, reading the picture from disk
    pub fn try_set_background_path(&mut self, path: &Path) -> Result<(), UploadError> {
        match UploadedImage::from_path(path) {
            Ok(image) => {
                self.set_background_image(image);
                Ok(())
            }
            Err(e) => {
                warn!("Ignoring upload '{}': {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Drop the upload, falling back to the template background
    pub fn clear_background_image(&mut self) -> Option<UploadedImage> {
        self.background_image.take()
    }

    /// Replace the text with one of the fixed sample letters
    pub fn apply_suggestion<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &'static str {
        let letter = SAMPLE_LETTERS
            .choose(rng)
            .copied()
            .unwrap_or(SAMPLE_LETTERS[0]);
        self.text = letter.to_string();
        letter
    }
}

/// Top-level view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    TemplateBrowser,
    Editor,
}

/// One editing session: a template plus the state the user builds on it
#[derive(Debug, Clone)]
pub struct EditorSession {
    pub id: Uuid,
    pub template: &'static Template,
    pub state: EditorState,
}

impl EditorSession {
    pub fn new(template: &'static Template) -> Self {
        Self {
            id: Uuid::new_v4(),
            template,
            state: EditorState::new(),
        }
    }
}

/// Navigation between Home, TemplateBrowser and Editor
#[derive(Debug, Default)]
pub struct Navigator {
    view: View,
    session: Option<EditorSession>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn session(&self) -> Option<&EditorSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut EditorSession> {
        self.session.as_mut()
    }

    /// Get-started action
    pub fn get_started(&mut self) {
        self.view = View::TemplateBrowser;
    }

    /// Template-selection action; always opens a fresh session
    pub fn select_template(&mut self, template: &'static Template) -> &mut EditorSession {
        let session = EditorSession::new(template);
        debug!("Opening session {} for template {}", session.id, template.id);
        self.view = View::Editor;
        self.session.insert(session)
    }

    /// Back action from the editor; the session is discarded
    pub fn back_to_templates(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Closing session {}", session.id);
        }
        self.view = View::TemplateBrowser;
    }

    pub fn back_to_home(&mut self) {
        self.session = None;
        self.view = View::Home;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::find_template;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults() {
        let state = EditorState::new();
        assert_eq!(state.text, DEFAULT_CARD_TEXT);
        assert_eq!(state.font, FontChoice::Poppins);
        assert_eq!(state.text_color(), TextColor::Named(NamedColor::Negro));
        assert_eq!(state.alignment, Alignment::Left);
        assert_eq!(state.emphasis, Emphasis::default());
        assert_eq!(state.orientation, Orientation::Vertical);
        assert!(state.background_image.is_none());
    }

    #[test]
    fn test_custom_toggle_keeps_both_values() {
        let mut state = EditorState::new();
        state.set_named_color(NamedColor::Menta);
        state.set_custom_color(Rgb::new(1, 2, 3));
        assert_eq!(state.text_color(), TextColor::Custom(Rgb::new(1, 2, 3)));

        state.set_custom_color_enabled(false);
        assert_eq!(state.text_color(), TextColor::Named(NamedColor::Menta));

        state.set_custom_color_enabled(true);
        assert_eq!(state.text_color(), TextColor::Custom(Rgb::new(1, 2, 3)));

        // Picking a palette entry switches the custom color off
        state.set_named_color(NamedColor::Rosa);
        assert!(!state.text_color().is_custom());
        assert_eq!(state.custom_color(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_emphasis_flags_are_orthogonal() {
        let mut state = EditorState::new();
        state.toggle_bold();
        state.toggle_underline();
        assert_eq!(
            state.emphasis,
            Emphasis { bold: true, italic: false, underline: true }
        );

        state.toggle_italic();
        state.set_bold(false);
        assert_eq!(
            state.emphasis,
            Emphasis { bold: false, italic: true, underline: true }
        );
    }

    #[test]
    fn test_orientation_leaves_content_alone() {
        let mut state = EditorState::new();
        state.set_text("Hola");
        state.set_font(FontChoice::Inter);
        state.set_named_color(NamedColor::Lavanda);

        let before = state.clone();
        state.set_orientation(Orientation::Square);

        assert_eq!(state.text, before.text);
        assert_eq!(state.font, before.font);
        assert_eq!(state.text_color(), before.text_color());
        assert_eq!(state.orientation.aspect_ratio(), (1, 1));
    }

    #[test]
    fn test_box_sizes() {
        assert_eq!(Orientation::Vertical.box_size(300.0), (300.0, 400.0));
        assert_eq!(Orientation::Horizontal.box_size(400.0), (400.0, 300.0));
        assert_eq!(Orientation::Square.box_size(250.0), (250.0, 250.0));
    }

    #[test]
    fn test_apply_suggestion_uses_fixed_letters() {
        let mut state = EditorState::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let letter = state.apply_suggestion(&mut rng);
            assert!(SAMPLE_LETTERS.contains(&letter));
            assert_eq!(state.text, letter);
        }
    }

    #[test]
    fn test_state_json_round_trip() {
        let mut state = EditorState::new();
        state.set_text("Hola");
        state.set_custom_color(Rgb::new(10, 20, 30));
        state.set_alignment(Alignment::Right);
        state.set_italic(true);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"custom\":\"#0A141E\""));
        let parsed: EditorState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_partial_state_json_uses_defaults() {
        let state: EditorState =
            serde_json::from_str(r#"{ "text": "Hola", "text_color": { "named": "rosa" } }"#)
                .unwrap();
        assert_eq!(state.text, "Hola");
        assert_eq!(state.text_color(), TextColor::Named(NamedColor::Rosa));
        assert_eq!(state.orientation, Orientation::Vertical);
    }

    #[test]
    fn test_loaded_state_remembers_active_colors() {
        let state: EditorState =
            serde_json::from_str(r#"{ "text_color": { "named": "rosa" } }"#).unwrap();
        assert_eq!(state.named_color(), NamedColor::Rosa);

        let mut state: EditorState =
            serde_json::from_str(r##"{ "text_color": { "custom": "#010203" } }"##).unwrap();
        assert_eq!(state.custom_color(), Rgb::new(1, 2, 3));
        state.set_custom_color_enabled(false);
        assert_eq!(state.text_color(), TextColor::Named(NamedColor::Negro));
        state.set_custom_color_enabled(true);
        assert_eq!(state.text_color(), TextColor::Custom(Rgb::new(1, 2, 3)));
    }

    #[test]
    fn test_loaded_state_keeps_inactive_color() {
        let mut state = EditorState::new();
        state.set_named_color(NamedColor::Menta);
        state.set_custom_color(Rgb::new(9, 8, 7));
        state.set_named_color(NamedColor::Lavanda);

        let json = serde_json::to_string(&state).unwrap();
        let mut parsed: EditorState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
        parsed.set_custom_color_enabled(true);
        assert_eq!(parsed.text_color(), TextColor::Custom(Rgb::new(9, 8, 7)));
    }

    fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 3, image::Rgba(color));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_corrupt_upload_keeps_background() {
        let mut state = EditorState::new();
        assert!(state.try_set_background_bytes(b"not an image").is_err());
        assert!(state.background_image.is_none());

        state.try_set_background_bytes(&png_bytes([1, 2, 3, 255])).unwrap();
        let uploaded = state.background_image.clone().unwrap();

        assert!(matches!(
            state.try_set_background_bytes(b"\x89PNG broken"),
            Err(UploadError::Decode(_))
        ));
        assert_eq!(state.background_image.as_ref(), Some(&uploaded));

        assert!(state
            .try_set_background_path(Path::new("/definitely/not/here.png"))
            .is_err());
        assert_eq!(state.background_image.as_ref(), Some(&uploaded));
    }

    #[test]
    fn test_navigation() {
        let mut nav = Navigator::new();
        assert_eq!(nav.view(), View::Home);

        nav.get_started();
        assert_eq!(nav.view(), View::TemplateBrowser);

        let template = find_template("love-1").unwrap();
        nav.select_template(template).state.set_text("edited");
        assert_eq!(nav.view(), View::Editor);
        let first_id = nav.session().unwrap().id;

        nav.back_to_templates();
        assert_eq!(nav.view(), View::TemplateBrowser);
        assert!(nav.session().is_none());

        // A new session starts from scratch
        let session = nav.select_template(template);
        assert_ne!(session.id, first_id);
        assert_eq!(session.state.text, DEFAULT_CARD_TEXT);

        nav.back_to_home();
        assert_eq!(nav.view(), View::Home);
        assert!(nav.session().is_none());
    }
}
