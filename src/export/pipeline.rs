//! Export pipeline
//!
//! Rasterizes a composition on a worker thread, encodes it as PNG and writes
//! `card-<unix-millis>.png` into the export directory. At most one export runs
//! at a time; results are collected by polling from the UI loop.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use image::{ImageFormat, RgbaImage};
use tracing::{debug, error, info, warn};

use crate::render::{Composition, Rasterizer, RenderError};

/// Errors that abort an export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("an export is already in progress")]
    Busy,
    #[error("no card to export")]
    NoRenderTarget,
    #[error("rasterization failed: {0}")]
    Render(#[from] RenderError),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("export worker exited without a result")]
    WorkerLost,
}

/// A card written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedCard {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportState {
    Idle,
    Exporting { file_name: String, started: Instant },
}

/// File name for an export stamp
pub fn export_file_name(stamp_millis: i64) -> String {
    format!("card-{}.png", stamp_millis)
}

/// Encode a bitmap as PNG
pub fn encode_png(bitmap: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    bitmap.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

fn render_and_write(
    rasterizer: &dyn Rasterizer,
    composition: &Composition,
    scale: f32,
    path: &Path,
) -> Result<ExportedCard, ExportError> {
    let bitmap = rasterizer.rasterize(composition, scale)?;
    let bytes = encode_png(&bitmap)?;
    std::fs::write(path, bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(ExportedCard {
        path: path.to_path_buf(),
        width: bitmap.width(),
        height: bitmap.height(),
    })
}

type ExportResult = Result<ExportedCard, ExportError>;

/// Idle/Exporting state machine around a background rasterizer
pub struct ExportPipeline {
    rasterizer: Arc<dyn Rasterizer + Send + Sync>,
    out_dir: PathBuf,
    scale: f32,
    state: ExportState,
    last_stamp: Option<i64>,
    rx: Option<Receiver<ExportResult>>,
}

impl ExportPipeline {
    pub fn new(rasterizer: Arc<dyn Rasterizer + Send + Sync>, out_dir: PathBuf, scale: f32) -> Self {
        Self {
            rasterizer,
            out_dir,
            scale,
            state: ExportState::Idle,
            last_stamp: None,
            rx: None,
        }
    }

    pub fn state(&self) -> &ExportState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, ExportState::Exporting { .. })
    }

    /// Current wall clock in millis, bumped past the previous stamp if needed
    fn next_stamp(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    /// Start exporting `composition`
    ///
    /// Returns the file name the worker will write. The composition is cloned
    /// into the worker, so later edits do not affect this export.
    pub fn request(&mut self, composition: Option<&Composition>) -> Result<String, ExportError> {
        if let ExportState::Exporting { file_name, .. } = &self.state {
            warn!("Export requested while {} is still in progress", file_name);
            return Err(ExportError::Busy);
        }

        let Some(composition) = composition else {
            error!("Export failed: {}", ExportError::NoRenderTarget);
            return Err(ExportError::NoRenderTarget);
        };

        let file_name = export_file_name(self.next_stamp());
        let path = self.out_dir.join(&file_name);
        let composition = composition.clone();
        let rasterizer = Arc::clone(&self.rasterizer);
        let scale = self.scale;
        let (tx, rx) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let result = render_and_write(rasterizer.as_ref(), &composition, scale, &path);
            if tx.send(result).is_err() {
                debug!("Export result for {} dropped", path.display());
            }
        });

        info!("Exporting {} at {}x", file_name, scale);
        self.state = ExportState::Exporting {
            file_name: file_name.clone(),
            started: Instant::now(),
        };
        self.rx = Some(rx);
        Ok(file_name)
    }

    /// Collect a finished export without blocking
    pub fn poll(&mut self) -> Option<ExportResult> {
        let received = match self.rx.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(ExportError::WorkerLost),
        };
        Some(self.finish(received))
    }

    /// Block until the running export finishes; `None` when idle
    pub fn wait(&mut self) -> Option<ExportResult> {
        let received = self
            .rx
            .as_ref()?
            .recv()
            .unwrap_or(Err(ExportError::WorkerLost));
        Some(self.finish(received))
    }

    fn finish(&mut self, result: ExportResult) -> ExportResult {
        let elapsed = match &self.state {
            ExportState::Exporting { started, .. } => started.elapsed(),
            ExportState::Idle => Duration::ZERO,
        };
        self.state = ExportState::Idle;
        self.rx = None;

        match &result {
            Ok(card) => info!(
                "Exported {} ({}x{}) in {:?}",
                card.path.display(),
                card.width,
                card.height,
                elapsed
            ),
            Err(e) => error!("Export failed: {}", e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::EditorState;
    use crate::config::{find_template, LayoutConfig, Template};
    use crate::render::{compose, FontBook, SoftwareRasterizer};
    use crate::utils::color::Rgb;
    use crossbeam_channel::{RecvTimeoutError, Sender};
    use parking_lot::Mutex;

    const TIMEOUT: Duration = Duration::from_secs(30);

    impl ExportPipeline {
        /// Like `wait`, giving up after `timeout`
        fn wait_timeout(&mut self, timeout: Duration) -> Option<ExportResult> {
            let received = match self.rx.as_ref()?.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Err(ExportError::WorkerLost),
            };
            Some(self.finish(received))
        }
    }

    fn gradient_template() -> Template {
        let mut template = find_template("love-1").unwrap().clone();
        template.image = None;
        template
    }

    fn composition() -> Composition {
        let fonts = FontBook::embedded();
        let mut state = EditorState::new();
        state.set_text("Hola");
        compose(&gradient_template(), &state, None, &LayoutConfig::default(), &fonts)
    }

    fn software() -> Arc<dyn Rasterizer + Send + Sync> {
        Arc::new(SoftwareRasterizer::new(Arc::new(FontBook::embedded())))
    }

    /// Holds the first `rasterize` call until released, then delegates
    struct GatedRasterizer {
        inner: Arc<dyn Rasterizer + Send + Sync>,
        gate: Mutex<Option<Receiver<()>>>,
    }

    impl GatedRasterizer {
        fn new(inner: Arc<dyn Rasterizer + Send + Sync>) -> (Self, Sender<()>) {
            let (tx, rx) = crossbeam_channel::bounded(1);
            (
                Self {
                    inner,
                    gate: Mutex::new(Some(rx)),
                },
                tx,
            )
        }
    }

    impl Rasterizer for GatedRasterizer {
        fn rasterize(&self, composition: &Composition, scale: f32) -> Result<RgbaImage, RenderError> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            self.inner.rasterize(composition, scale)
        }
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn rasterize(&self, _: &Composition, scale: f32) -> Result<RgbaImage, RenderError> {
            Err(RenderError::InvalidScale(scale))
        }
    }

    fn png_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_export_writes_supersampled_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = ExportPipeline::new(software(), dir.path().to_path_buf(), 2.0);
        let composition = composition();

        let name = pipeline.request(Some(&composition)).unwrap();
        assert!(name.starts_with("card-") && name.ends_with(".png"));
        assert!(pipeline.is_busy());

        let card = pipeline.wait_timeout(TIMEOUT).unwrap().unwrap();
        assert_eq!(pipeline.state(), &ExportState::Idle);
        assert_eq!(card.path, dir.path().join(&name));
        assert_eq!((card.width, card.height), composition.pixel_size(2.0));

        let written = image::open(&card.path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (896, 1195));
        // Corners outside the rounded card stay transparent
        assert_eq!(written.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_two_exports_have_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = ExportPipeline::new(software(), dir.path().to_path_buf(), 1.0);
        let composition = composition();

        let first = pipeline.request(Some(&composition)).unwrap();
        pipeline.wait_timeout(TIMEOUT).unwrap().unwrap();
        let second = pipeline.request(Some(&composition)).unwrap();
        pipeline.wait_timeout(TIMEOUT).unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(png_files(dir.path()).len(), 2);
    }

    #[test]
    fn test_request_while_busy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (gated, release) = GatedRasterizer::new(software());
        let mut pipeline = ExportPipeline::new(Arc::new(gated), dir.path().to_path_buf(), 2.0);
        let composition = composition();

        pipeline.request(Some(&composition)).unwrap();
        assert!(matches!(pipeline.request(Some(&composition)), Err(ExportError::Busy)));
        assert!(pipeline.poll().is_none());

        release.send(()).unwrap();
        pipeline.wait_timeout(TIMEOUT).unwrap().unwrap();
        assert!(!pipeline.is_busy());
        assert_eq!(png_files(dir.path()).len(), 1);
    }

    #[test]
    fn test_export_keeps_the_requested_card() {
        let dir = tempfile::tempdir().unwrap();
        let fonts = FontBook::embedded();
        let template = gradient_template();
        let layout = LayoutConfig::default();
        let (gated, release) = GatedRasterizer::new(software());
        let mut pipeline = ExportPipeline::new(Arc::new(gated), dir.path().to_path_buf(), 1.0);

        let mut state = EditorState::new();
        state.set_text("Hola");
        let first = compose(&template, &state, None, &layout, &fonts);
        let first_name = pipeline.request(Some(&first)).unwrap();

        // Edit while the first export is still rasterizing
        state.set_text("Feliz cumpleaños, amiga");
        state.set_custom_color(Rgb::new(0, 0, 255));
        state.set_bold(true);
        let second = compose(&template, &state, None, &layout, &fonts);
        assert!(matches!(pipeline.request(Some(&second)), Err(ExportError::Busy)));

        release.send(()).unwrap();
        let first_card = pipeline.wait_timeout(TIMEOUT).unwrap().unwrap();
        let second_name = pipeline.request(Some(&second)).unwrap();
        let second_card = pipeline.wait_timeout(TIMEOUT).unwrap().unwrap();
        assert_ne!(first_name, second_name);
        assert_eq!(png_files(dir.path()).len(), 2);

        let first_png = image::open(&first_card.path).unwrap().to_rgba8();
        let second_png = image::open(&second_card.path).unwrap().to_rgba8();
        assert_ne!(first_png, second_png);

        let direct = software();
        assert_eq!(first_png, direct.rasterize(&first, 1.0).unwrap());
        assert_eq!(second_png, direct.rasterize(&second, 1.0).unwrap());
    }

    #[test]
    fn test_missing_render_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = ExportPipeline::new(software(), dir.path().to_path_buf(), 2.0);

        assert!(matches!(pipeline.request(None), Err(ExportError::NoRenderTarget)));
        assert_eq!(pipeline.state(), &ExportState::Idle);
        assert!(pipeline.poll().is_none());
        assert!(png_files(dir.path()).is_empty());
    }

    #[test]
    fn test_render_failure_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            ExportPipeline::new(Arc::new(FailingRasterizer), dir.path().to_path_buf(), 2.0);

        pipeline.request(Some(&composition())).unwrap();
        let result = pipeline.wait_timeout(TIMEOUT).unwrap();
        assert!(matches!(result, Err(ExportError::Render(_))));
        assert_eq!(pipeline.state(), &ExportState::Idle);
        assert!(png_files(dir.path()).is_empty());
    }

    #[test]
    fn test_write_failure_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut pipeline = ExportPipeline::new(software(), missing, 1.0);

        pipeline.request(Some(&composition())).unwrap();
        let result = pipeline.wait_timeout(TIMEOUT).unwrap();
        assert!(matches!(result, Err(ExportError::Io { .. })));
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = ExportPipeline::new(software(), dir.path().to_path_buf(), 1.0);
        let stamps: Vec<i64> = (0..5).map(|_| pipeline.next_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(export_file_name(1700000000000), "card-1700000000000.png");
    }
}
