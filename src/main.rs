//! Greeting Card Studio
//!
//! Desktop editor for personalized greeting cards: pick a template, write the
//! message, style it and export the card as a PNG.
//! Can also render a saved card state headlessly.

mod app;
mod config;
mod export;
mod render;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use app::state::EditorState;
use app::StudioApp;
use config::{find_template, StudioConfig};
use export::ExportPipeline;
use render::{compose, FontBook, SoftwareRasterizer, TemplateImageLoader};

/// Greeting Card Studio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a studio configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory receiving exported PNG files
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Directory holding bundled template pictures
    #[arg(long)]
    assets_dir: Option<PathBuf>,

    /// Directory holding font files
    #[arg(long)]
    fonts_dir: Option<PathBuf>,

    /// Render an editor state JSON file to PNG without opening a window
    #[arg(long, requires = "template")]
    render: Option<PathBuf>,

    /// Template id used with --render
    #[arg(short, long)]
    template: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Greeting Card Studio starting...");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {:?}", path);
            StudioConfig::load_from_file(path)?
        }
        None => StudioConfig::default(),
    };
    if let Some(dir) = args.export_dir {
        config.export.dir = dir;
    }
    if let Some(dir) = args.assets_dir {
        config.assets_dir = dir;
    }
    if let Some(dir) = args.fonts_dir {
        config.fonts_dir = dir;
    }
    info!("Assets directory: {:?}", config.assets_dir);
    info!("Export directory: {:?}", config.export.dir);

    let fonts = Arc::new(FontBook::load(&config.fonts_dir));

    if let (Some(state_path), Some(template_id)) = (&args.render, &args.template) {
        return render_headless(&config, fonts, state_path, template_id);
    }

    // Create native options for eframe
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_drag_and_drop(true)
            .with_title("Greeting Card Studio"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Greeting Card Studio",
        native_options,
        Box::new(move |cc| Ok(Box::new(StudioApp::new(cc, config, fonts)))),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))?;

    Ok(())
}

/// Compose and export one card from a saved editor state
fn render_headless(
    config: &StudioConfig,
    fonts: Arc<FontBook>,
    state_path: &Path,
    template_id: &str,
) -> Result<()> {
    let template = find_template(template_id)
        .with_context(|| format!("unknown template '{}'", template_id))?;
    let content = std::fs::read_to_string(state_path)
        .with_context(|| format!("reading card state {}", state_path.display()))?;
    let state: EditorState = serde_json::from_str(&content)
        .with_context(|| format!("parsing card state {}", state_path.display()))?;

    let mut images = TemplateImageLoader::new(config.assets_dir.clone());
    let template_image = template.image.as_deref().and_then(|path| images.load(path));
    let composition = compose(template, &state, template_image, &config.layout, &fonts);

    let rasterizer = Arc::new(SoftwareRasterizer::new(fonts));
    let mut pipeline =
        ExportPipeline::new(rasterizer, config.export_dir().to_path_buf(), config.export_scale());
    pipeline.request(Some(&composition))?;

    let card = pipeline
        .wait()
        .context("export finished without a result")??;
    println!("{}", card.path.display());
    Ok(())
}
