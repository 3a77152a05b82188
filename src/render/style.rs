//! Style resolution
//!
//! Pure mapping from the editor's choices to the style the renderer paints with.

use crate::app::state::{Alignment, EditorState, Emphasis, FontChoice, TextColor};
use crate::utils::color::Rgb;

/// Concrete text style for one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStyle {
    pub color: Rgb,
    pub font: FontChoice,
    pub alignment: Alignment,
    pub emphasis: Emphasis,
}

impl ResolvedStyle {
    /// Style classes in canonical order: font, color, alignment, emphasis
    pub fn classes(&self, text_color: TextColor) -> Vec<String> {
        let color_class = match text_color {
            TextColor::Named(named) => named.class_name().to_string(),
            TextColor::Custom(rgb) => format!("text-[{}]", rgb),
        };

        let mut classes = vec![
            self.font.class_name().to_string(),
            color_class,
            self.alignment.class_name().to_string(),
        ];
        classes.extend(emphasis_classes(self.emphasis).iter().map(|c| c.to_string()));
        classes
    }
}

/// Classes for the active emphasis flags
pub fn emphasis_classes(emphasis: Emphasis) -> Vec<&'static str> {
    let mut classes = Vec::with_capacity(3);
    if emphasis.bold {
        classes.push("font-bold");
    }
    if emphasis.italic {
        classes.push("italic");
    }
    if emphasis.underline {
        classes.push("underline");
    }
    classes
}

/// Resolve the current state into a render style
pub fn resolve(state: &EditorState) -> ResolvedStyle {
    let color = match state.text_color() {
        TextColor::Custom(rgb) => rgb,
        TextColor::Named(named) => named.rgb(),
    };

    ResolvedStyle {
        color,
        font: state.font,
        alignment: state.alignment,
        emphasis: state.emphasis,
    }
}
