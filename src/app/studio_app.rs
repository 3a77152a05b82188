//! Main studio application
//!
//! Implements the egui App trait for the card studio: home page, template
//! browser and card editor with live preview and PNG export.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use egui::{Color32, Key, KeyboardShortcut, Modifiers, Pos2, Rect, RichText, Sense, Stroke, Vec2};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{catalog, filter_templates, Category, StudioConfig, Template};
use crate::export::{ExportError, ExportPipeline, ExportedCard};
use crate::render::gradient::gradient_stops;
use crate::render::{
    compose, to_color_image, Composition, FontBook, Rasterizer, SoftwareRasterizer,
    TemplateImageLoader, UploadedImage,
};
use crate::utils::color::Rgb;

use super::state::{
    Alignment, EditorState, Emphasis, FontChoice, NamedColor, Navigator, Orientation, View,
    SAMPLE_LETTERS,
};

/// Poll interval while an export is running
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Size of a template tile in the browser
const TILE_SIZE: Vec2 = Vec2::new(200.0, 150.0);

const BOLD_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::B);
const ITALIC_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::I);
const UNDERLINE_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::U);

/// What the cached preview texture was rendered from
#[derive(Debug, Clone, PartialEq)]
struct PreviewKey {
    template_id: String,
    state: EditorState,
    pixels_per_point: f32,
}

/// Main studio application
pub struct StudioApp {
    config: StudioConfig,
    rasterizer: Arc<SoftwareRasterizer>,
    navigator: Navigator,

    /// Category filter in the template browser; `None` shows all
    category: Option<Category>,

    /// Bundled template pictures
    template_images: TemplateImageLoader,
    /// Browser thumbnails, `None` when the template has no picture
    thumbnails: HashMap<String, Option<egui::TextureHandle>>,

    /// Live preview texture
    preview_texture: Option<egui::TextureHandle>,
    preview_key: Option<PreviewKey>,

    exporter: ExportPipeline,
    /// Session the running export was requested from
    export_session: Option<Uuid>,
    /// Last export outcome shown in the editor bar
    export_status: Option<(String, bool)>,

    /// Path field of the upload control
    upload_path: String,
}

impl StudioApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: StudioConfig, fonts: Arc<FontBook>) -> Self {
        let rasterizer = Arc::new(SoftwareRasterizer::new(fonts));
        let export_rasterizer: Arc<dyn Rasterizer + Send + Sync> = rasterizer.clone();
        let exporter = ExportPipeline::new(
            export_rasterizer,
            config.export_dir().to_path_buf(),
            config.export_scale(),
        );
        let template_images = TemplateImageLoader::new(config.assets_dir.clone());

        info!(
            "Studio initialized: {} templates, card width {}, export {}x into {}",
            catalog().len(),
            config.card_width(),
            config.export_scale(),
            config.export_dir().display()
        );

        Self {
            config,
            rasterizer,
            navigator: Navigator::new(),
            category: None,
            template_images,
            thumbnails: HashMap::new(),
            preview_texture: None,
            preview_key: None,
            exporter,
            export_session: None,
            export_status: None,
            upload_path: String::new(),
        }
    }

    /// Compose the card of the open session, if any
    fn current_composition(&mut self) -> Option<Composition> {
        let session = self.navigator.session()?;
        let template = session.template;
        let template_image = template
            .image
            .as_deref()
            .and_then(|path| self.template_images.load(path));

        Some(compose(
            template,
            &session.state,
            template_image,
            &self.config.layout,
            self.rasterizer.fonts(),
        ))
    }

    /// Re-render the preview texture when the state changed
    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let Some(session) = self.navigator.session() else {
            self.preview_key = None;
            return;
        };

        let key = PreviewKey {
            template_id: session.template.id.clone(),
            state: session.state.clone(),
            pixels_per_point: ctx.pixels_per_point(),
        };
        if self.preview_key.as_ref() == Some(&key) {
            return;
        }

        let Some(composition) = self.current_composition() else {
            return;
        };
        match self.rasterizer.rasterize(&composition, key.pixels_per_point) {
            Ok(bitmap) => {
                let image = to_color_image(&bitmap);
                if let Some(ref mut texture) = self.preview_texture {
                    texture.set(image, egui::TextureOptions::LINEAR);
                } else {
                    self.preview_texture =
                        Some(ctx.load_texture("card_preview", image, egui::TextureOptions::LINEAR));
                }
            }
            Err(e) => warn!("Preview render failed: {}", e),
        }
        self.preview_key = Some(key);
    }

    fn thumbnail(&mut self, ctx: &egui::Context, template: &Template) -> Option<egui::TextureHandle> {
        if let Some(cached) = self.thumbnails.get(&template.id) {
            return cached.clone();
        }

        let texture = template
            .image
            .as_deref()
            .and_then(|path| self.template_images.load(path))
            .map(|img| {
                let thumb = crate::render::cover_fit(&img, TILE_SIZE.x as u32, TILE_SIZE.y as u32);
                ctx.load_texture(
                    format!("thumb_{}", template.id),
                    to_color_image(&thumb),
                    egui::TextureOptions::LINEAR,
                )
            });
        self.thumbnails.insert(template.id.clone(), texture.clone());
        texture
    }

    /// Collect a finished export, whatever view is showing
    fn poll_export(&mut self, ctx: &egui::Context) {
        if let Some(result) = self.exporter.poll() {
            let current = self.navigator.session().map(|session| session.id);
            let requested_for = self.export_session.take();
            match finished_status(result, requested_for, current) {
                Some(status) => self.export_status = Some(status),
                None => debug!("Export finished after its editor session closed"),
            }
        }
        if self.exporter.is_busy() {
            ctx.request_repaint_after(EXPORT_POLL_INTERVAL);
        }
    }

    fn start_export(&mut self) {
        let composition = self.current_composition();
        match self.exporter.request(composition.as_ref()) {
            Ok(file_name) => {
                self.export_session = self.navigator.session().map(|session| session.id);
                self.export_status = Some((format!("Exportando {}...", file_name), true));
            }
            Err(ExportError::Busy) => {}
            Err(e) => self.export_status = Some((format!("No se pudo exportar: {}", e), false)),
        }
    }

    /// Dropped picture files become the background of the open card
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.last() else {
            return;
        };
        let Some(session) = self.navigator.session_mut() else {
            return;
        };

        let result = match (&file.bytes, &file.path) {
            (Some(bytes), _) => session.state.try_set_background_bytes(bytes),
            (None, Some(path)) => session.state.try_set_background_path(path),
            (None, None) => return,
        };
        if result.is_ok() {
            info!("Background set from dropped file '{}'", file.name);
        }
    }

    fn show_home(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(48.0);
                ui.label(RichText::new("Cartas con Alma").size(40.0).strong());
                ui.label(
                    RichText::new("Crea cartas personalizadas que transmitan lo que sientes")
                        .size(18.0)
                        .color(Color32::GRAY),
                );
                ui.add_space(24.0);
                if ui.button(RichText::new("Comenzar").size(20.0)).clicked() {
                    self.navigator.get_started();
                }
                ui.add_space(48.0);

                for letter in SAMPLE_LETTERS {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.set_max_width(480.0);
                        ui.label(RichText::new(letter).italics());
                    });
                    ui.add_space(8.0);
                }
            });
        });
    }

    fn show_template_browser(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("browser_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("← Inicio").clicked() {
                    self.navigator.back_to_home();
                }
                ui.heading("Elige una plantilla");
            });
            ui.horizontal(|ui| {
                if ui.selectable_label(self.category.is_none(), "Todas").clicked() {
                    self.category = None;
                }
                for category in Category::FILTERS {
                    let selected = self.category == Some(category);
                    if ui.selectable_label(selected, category.display_name_es()).clicked() {
                        self.category = Some(category);
                    }
                }
            });
        });

        let mut chosen: Option<&'static Template> = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for template in filter_templates(self.category) {
                        let thumbnail = self.thumbnail(ctx, template);
                        if template_tile(ui, template, thumbnail.as_ref()).clicked() {
                            chosen = Some(template);
                        }
                    }
                });
            });
        });

        if let Some(template) = chosen {
            self.navigator.select_template(template);
            self.export_status = None;
            self.upload_path.clear();
        }
    }

    fn show_editor(&mut self, ctx: &egui::Context) {
        self.handle_dropped_files(ctx);

        let mut go_back = false;
        let mut export = false;
        egui::TopBottomPanel::top("editor_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("← Plantillas").clicked() {
                    go_back = true;
                }
                if let Some(session) = self.navigator.session() {
                    ui.heading(&session.template.name);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.exporter.is_busy() { "Exportando..." } else { "Descargar" };
                    if ui
                        .add_enabled(!self.exporter.is_busy(), egui::Button::new(label))
                        .clicked()
                    {
                        export = true;
                    }
                    if let Some((status, ok)) = &self.export_status {
                        let color = if *ok { Color32::GRAY } else { Color32::LIGHT_RED };
                        ui.label(RichText::new(status).color(color).small());
                    }
                });
            });
        });

        egui::SidePanel::left("editor_controls")
            .resizable(false)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    if let Some(session) = self.navigator.session_mut() {
                        editor_controls(ui, &mut session.state, &mut self.upload_path);
                    }
                });
            });

        self.refresh_preview(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                if let (Some(texture), Some(key)) = (&self.preview_texture, &self.preview_key) {
                    let (w, h) = key.state.orientation.box_size(self.config.card_width());
                    ui.add_space(16.0);
                    ui.image(egui::ImageSource::Texture(egui::load::SizedTexture::new(
                        texture.id(),
                        Vec2::new(w, h),
                    )));
                }
                ui.label(
                    RichText::new("Arrastra una imagen aquí para usarla de fondo")
                        .color(Color32::GRAY)
                        .small(),
                );
            });
        });

        if export {
            self.start_export();
        }
        if go_back {
            self.navigator.back_to_templates();
            self.preview_key = None;
            self.export_status = None;
        }
    }
}

/// Paint a template tile; gradient swatch unless a picture is available
fn template_tile(
    ui: &mut egui::Ui,
    template: &Template,
    thumbnail: Option<&egui::TextureHandle>,
) -> egui::Response {
    let (rect, response) = ui.allocate_exact_size(TILE_SIZE + Vec2::new(0.0, 44.0), Sense::click());
    let swatch = Rect::from_min_size(rect.min, TILE_SIZE);
    let painter = ui.painter_at(rect);

    match thumbnail {
        Some(texture) => {
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            painter.image(texture.id(), swatch, uv, Color32::WHITE);
        }
        None => {
            let [start, end] = gradient_stops(template.color);
            painter.add(egui::Shape::mesh(gradient_mesh(swatch, start, end)));
        }
    }

    let stroke = if response.hovered() {
        Stroke::new(2.0, ui.visuals().selection.bg_fill)
    } else {
        Stroke::new(1.0, Color32::from_gray(200))
    };
    painter.rect_stroke(swatch, 8.0, stroke);

    painter.text(
        Pos2::new(rect.min.x + 4.0, swatch.max.y + 6.0),
        egui::Align2::LEFT_TOP,
        &template.name,
        egui::FontId::proportional(15.0),
        ui.visuals().strong_text_color(),
    );
    painter.text(
        Pos2::new(rect.min.x + 4.0, swatch.max.y + 25.0),
        egui::Align2::LEFT_TOP,
        &template.description,
        egui::FontId::proportional(11.0),
        Color32::GRAY,
    );

    response.on_hover_text(template.category.display_name_es())
}

fn to_color32(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb.r, rgb.g, rgb.b)
}

/// Diagonal two-stop gradient from the top-left to the bottom-right corner
fn gradient_mesh(rect: Rect, start: Rgb, end: Rgb) -> egui::Mesh {
    let mid = to_color32(start.lerp(end, 0.5));
    let mut mesh = egui::Mesh::default();
    mesh.colored_vertex(rect.left_top(), to_color32(start));
    mesh.colored_vertex(rect.right_top(), mid);
    mesh.colored_vertex(rect.right_bottom(), to_color32(end));
    mesh.colored_vertex(rect.left_bottom(), mid);
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    mesh
}

/// Status line for a finished export
///
/// `None` when the export belongs to a session other than the open one.
fn finished_status(
    result: Result<ExportedCard, ExportError>,
    requested_for: Option<Uuid>,
    current: Option<Uuid>,
) -> Option<(String, bool)> {
    if requested_for.is_none() || requested_for != current {
        return None;
    }
    Some(match result {
        Ok(card) => (format!("Guardada en {}", card.path.display()), true),
        Err(e) => (format!("No se pudo exportar: {}", e), false),
    })
}

/// Control panel of the editor
fn editor_controls(ui: &mut egui::Ui, state: &mut EditorState, upload_path: &mut String) {
    ui.input_mut(|i| {
        if i.consume_shortcut(&BOLD_SHORTCUT) {
            state.toggle_bold();
        }
        if i.consume_shortcut(&ITALIC_SHORTCUT) {
            state.toggle_italic();
        }
        if i.consume_shortcut(&UNDERLINE_SHORTCUT) {
            state.toggle_underline();
        }
    });

    ui.heading("Tu mensaje");
    let mut text = state.text.clone();
    let edited = ui
        .add(
            egui::TextEdit::multiline(&mut text)
                .desired_rows(6)
                .desired_width(f32::INFINITY),
        )
        .changed();
    if edited {
        state.set_text(text);
    }
    if ui.button("✨ Sugerir texto").clicked() {
        state.apply_suggestion(&mut rand::thread_rng());
    }

    ui.separator();
    ui.label("Fuente");
    egui::ComboBox::from_id_salt("font")
        .selected_text(state.font.display_name())
        .show_ui(ui, |ui| {
            for font in FontChoice::ALL {
                if ui.selectable_label(state.font == font, font.display_name()).clicked() {
                    state.set_font(font);
                }
            }
        });

    ui.separator();
    ui.label("Color del texto");
    let custom = state.text_color().is_custom();
    ui.horizontal_wrapped(|ui| {
        for named in NamedColor::ALL {
            let selected = !custom && state.named_color() == named;
            let swatch = RichText::new("⬤").size(20.0).color(to_color32(named.rgb()));
            if ui
                .selectable_label(selected, swatch)
                .on_hover_text(named.display_name())
                .clicked()
            {
                state.set_named_color(named);
            }
        }
    });
    ui.horizontal(|ui| {
        let mut enabled = custom;
        if ui.checkbox(&mut enabled, "Color personalizado").changed() {
            state.set_custom_color_enabled(enabled);
        }
        let mut rgb = state.custom_color().to_array();
        if ui.color_edit_button_srgb(&mut rgb).changed() {
            state.set_custom_color(Rgb::from(rgb));
        }
    });

    ui.separator();
    ui.label("Alineación");
    ui.horizontal(|ui| {
        for alignment in Alignment::ALL {
            let label = match alignment {
                Alignment::Left => "Izquierda",
                Alignment::Center => "Centro",
                Alignment::Right => "Derecha",
            };
            if ui.selectable_label(state.alignment == alignment, label).clicked() {
                state.set_alignment(alignment);
            }
        }
    });

    ui.label("Estilo");
    ui.horizontal(|ui| {
        let Emphasis { bold, italic, underline } = state.emphasis;
        if ui
            .selectable_label(bold, RichText::new("B").strong())
            .on_hover_text("Ctrl+B")
            .clicked()
        {
            state.set_bold(!bold);
        }
        if ui
            .selectable_label(italic, RichText::new("I").italics())
            .on_hover_text("Ctrl+I")
            .clicked()
        {
            state.set_italic(!italic);
        }
        if ui
            .selectable_label(underline, RichText::new("U").underline())
            .on_hover_text("Ctrl+U")
            .clicked()
        {
            state.set_underline(!underline);
        }
    });

    let mut transparent = state.transparent_backdrop;
    if ui.checkbox(&mut transparent, "Fondo de texto transparente").changed() {
        state.set_transparent_backdrop(transparent);
    }

    ui.separator();
    ui.label("Orientación");
    ui.horizontal(|ui| {
        for orientation in Orientation::ALL {
            let (w, h) = orientation.aspect_ratio();
            let label = format!("{} {}:{}", orientation.display_name(), w, h);
            if ui.selectable_label(state.orientation == orientation, label).clicked() {
                state.set_orientation(orientation);
            }
        }
    });

    ui.separator();
    ui.label("Imagen de fondo");
    ui.horizontal(|ui| {
        ui.text_edit_singleline(upload_path);
        if ui.button("Cargar").clicked() && !upload_path.trim().is_empty() {
            let path = PathBuf::from(upload_path.trim());
            if state.try_set_background_path(&path).is_ok() {
                upload_path.clear();
            }
        }
    });
    if let Some((w, h)) = state.background_image.as_ref().map(UploadedImage::dimensions) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("{}x{}", w, h)).small());
            if ui.button("Quitar imagen").clicked() {
                state.clear_background_image();
            }
        });
    }
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_export(ctx);

        match self.navigator.view() {
            View::Home => self.show_home(ctx),
            View::TemplateBrowser => self.show_template_browser(ctx),
            View::Editor => self.show_editor(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_mesh_corners() {
        let rect = Rect::from_min_size(Pos2::ZERO, TILE_SIZE);
        let start = Rgb::new(255, 0, 0);
        let end = Rgb::new(0, 0, 255);
        let mesh = gradient_mesh(rect, start, end);

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices[0].color, Color32::from_rgb(255, 0, 0));
        assert_eq!(mesh.vertices[2].color, Color32::from_rgb(0, 0, 255));
        assert_eq!(mesh.vertices[1].color, mesh.vertices[3].color);
    }

    #[test]
    fn test_preview_key_tracks_state() {
        let mut state = EditorState::new();
        let key = PreviewKey {
            template_id: "love-1".to_string(),
            state: state.clone(),
            pixels_per_point: 1.0,
        };

        state.toggle_bold();
        let changed = PreviewKey {
            state,
            ..key.clone()
        };
        assert_ne!(key, changed);
        assert_eq!(key, key.clone());
    }

    #[test]
    fn test_preview_key_with_upload_clones_cheaply() {
        let img = image::RgbaImage::from_pixel(256, 256, image::Rgba([9, 9, 9, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let mut state = EditorState::new();
        state.try_set_background_bytes(&bytes).unwrap();

        let key = PreviewKey {
            template_id: "love-1".to_string(),
            state,
            pixels_per_point: 2.0,
        };
        let next_frame = key.clone();
        let (a, b) = (
            key.state.background_image.as_ref().unwrap(),
            next_frame.state.background_image.as_ref().unwrap(),
        );
        assert!(Arc::ptr_eq(a.pixels(), b.pixels()));
        assert_eq!(key, next_frame);
    }

    #[test]
    fn test_finished_export_status_is_scoped_to_its_session() {
        let card = ExportedCard {
            path: PathBuf::from("exports/card-1700000000000.png"),
            width: 896,
            height: 1195,
        };
        let session = Uuid::new_v4();

        let (message, ok) = finished_status(Ok(card.clone()), Some(session), Some(session)).unwrap();
        assert!(ok);
        assert!(message.contains("card-1700000000000.png"));

        let (_, ok) =
            finished_status(Err(ExportError::WorkerLost), Some(session), Some(session)).unwrap();
        assert!(!ok);

        // A newer session, or none at all, never inherits the outcome
        assert!(finished_status(Ok(card.clone()), Some(session), Some(Uuid::new_v4())).is_none());
        assert!(finished_status(Ok(card.clone()), Some(session), None).is_none());
        assert!(finished_status(Ok(card), None, None).is_none());
    }
}
