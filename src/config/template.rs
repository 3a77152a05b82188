//! Card template catalog
//!
//! Templates are immutable presets: a category, a gradient key used when no
//! picture is available, and an optional bundled background picture.

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Template category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Love,
    Friendship,
    Gratitude,
    Inspiration,
    Humor,
    Birthday,
    Blank,
}

impl Category {
    /// Categories offered as filters in the template browser
    pub const FILTERS: [Category; 4] = [
        Category::Love,
        Category::Friendship,
        Category::Gratitude,
        Category::Inspiration,
    ];

    /// Spanish display name, as shown in the card UI
    pub fn display_name_es(&self) -> &'static str {
        match self {
            Category::Love => "Amor",
            Category::Friendship => "Amistad",
            Category::Gratitude => "Gratitud",
            Category::Inspiration => "Inspiración",
            Category::Humor => "Humor",
            Category::Birthday => "Cumpleaños",
            Category::Blank => "En blanco",
        }
    }
}

/// Palette key selecting the fallback gradient of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKey {
    Love,
    Friendship,
    Gratitude,
    Inspiration,
    Primary,
    Secondary,
    Outline,
}

/// A card background preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub color: GradientKey,
    /// Bundled picture, relative to the assets directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

impl Template {
    fn preset(
        id: &str,
        name: &str,
        description: &str,
        category: Category,
        color: GradientKey,
        image: Option<&str>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category,
            color,
            image: image.map(PathBuf::from),
        }
    }
}

/// The static template catalog
pub fn catalog() -> &'static [Template] {
    static CATALOG: OnceLock<Vec<Template>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            Template::preset(
                "love-1",
                "Carta de Amor",
                "Expresa tus sentimientos más profundos",
                Category::Love,
                GradientKey::Love,
                Some("template-love.jpg"),
            ),
            Template::preset(
                "friendship-1",
                "Para mi Amigo/a",
                "Celebra la amistad verdadera",
                Category::Friendship,
                GradientKey::Friendship,
                Some("template-friendship.jpg"),
            ),
            Template::preset(
                "gratitude-1",
                "Agradecimiento",
                "Da las gracias de corazón",
                Category::Gratitude,
                GradientKey::Gratitude,
                Some("template-gratitude.jpg"),
            ),
            Template::preset(
                "inspiration-1",
                "Inspiración",
                "Motiva y alienta a alguien especial",
                Category::Inspiration,
                GradientKey::Inspiration,
                None,
            ),
            Template::preset(
                "humor-1",
                "Divertida",
                "Arranca una sonrisa",
                Category::Humor,
                GradientKey::Primary,
                None,
            ),
            Template::preset(
                "birthday-1",
                "Cumpleaños",
                "Celebra un día especial",
                Category::Birthday,
                GradientKey::Secondary,
                None,
            ),
            Template::preset(
                "blank",
                "Crear desde cero",
                "Diseña tu propia carta única",
                Category::Blank,
                GradientKey::Outline,
                None,
            ),
        ]
    })
}

/// Look up a template by id
pub fn find_template(id: &str) -> Option<&'static Template> {
    catalog().iter().find(|t| t.id == id)
}

/// Templates matching a category filter; `None` means all
pub fn filter_templates(category: Option<Category>) -> impl Iterator<Item = &'static Template> {
    catalog()
        .iter()
        .filter(move |t| category.map_or(true, |c| t.category == c))
}
