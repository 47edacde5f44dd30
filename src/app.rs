use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use eframe::egui;
use egui_extras::{Column, TableBuilder};
use image::DynamicImage;
use log::{debug, error, info};

use crate::client::{Session, Transport};
use crate::config::AppConfig;
use crate::error::{Result, VisionError};
use crate::geometry::{fit_display_size, DisplayGeometry};
use crate::mode::Mode;
use crate::orchestrator::{JobTracker, Orchestrator, RequestOutcome};
use crate::source::{load_preview, ImageSource};

const OVERLAY_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 40, 40);
const OVERLAY_THICKNESS: f32 = 2.0;

// ── Worker messages ─────────────────────────────────────────────────────────

enum JobMessage {
    Session(Result<Session>),
    Preview {
        id: u64,
        source: ImageSource,
        result: Result<DynamicImage>,
    },
    Reply(RequestOutcome),
}

/// What the user asked for this frame; handled after the panels are laid out.
enum Action {
    PickFile,
    SubmitFile,
    SubmitDefault,
    SubmitUrl,
    ExportOverlay,
}

// ── Shown image ─────────────────────────────────────────────────────────────

/// The image on screen. Only the most recently started load may replace it,
/// so display geometry changes only when the latest image arrives.
#[derive(Default)]
struct Preview {
    loads: JobTracker,
    source: Option<ImageSource>,
    image: Option<DynamicImage>,
    natural_size: (f32, f32),
}

impl Preview {
    fn start(&mut self) -> u64 {
        self.loads.issue()
    }

    /// Applies a finished load. Returns `false` when a newer load superseded it.
    fn finish(&mut self, id: u64, source: ImageSource, result: Result<DynamicImage>) -> bool {
        if !self.loads.settle(id) {
            debug!("Dropping stale preview {id} of {}", source.describe());
            return false;
        }
        match result {
            Ok(img) => {
                info!("Showing {} ({}x{})", source.describe(), img.width(), img.height());
                self.natural_size = (img.width() as f32, img.height() as f32);
                self.image = Some(img);
                self.source = Some(source);
            }
            Err(err) => {
                error!("Could not load preview of {}: {err}", source.describe());
                self.image = None;
                self.natural_size = (0.0, 0.0);
                self.source = None;
            }
        }
        true
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct VisionApp {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    session: Session,
    orchestrator: Orchestrator,

    mode: Mode,
    selected_file: Option<PathBuf>,
    url_input: String,
    stretch: bool,

    preview: Preview,
    texture: Option<egui::TextureHandle>,
    geometry: DisplayGeometry,

    job_tx: mpsc::Sender<JobMessage>,
    job_rx: mpsc::Receiver<JobMessage>,
}

impl VisionApp {
    pub fn new(ctx: &egui::Context, config: AppConfig, transport: Arc<dyn Transport>) -> Self {
        let (job_tx, job_rx) = mpsc::channel();
        let app = Self {
            stretch: config.stretch_to_panel,
            config,
            transport,
            session: Session::anonymous(),
            orchestrator: Orchestrator::new(),
            mode: Mode::default(),
            selected_file: None,
            url_input: String::new(),
            preview: Preview::default(),
            texture: None,
            geometry: DisplayGeometry::default(),
            job_tx,
            job_rx,
        };
        app.spawn_session(ctx);
        app
    }

    fn spawn_session(&self, ctx: &egui::Context) {
        let transport = Arc::clone(&self.transport);
        let tx = self.job_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let result = Session::establish(transport.as_ref());
            let _ = tx.send(JobMessage::Session(result));
            ctx.request_repaint();
        });
    }

    fn spawn_preview(&mut self, ctx: &egui::Context, source: ImageSource) {
        let id = self.preview.start();
        let transport = Arc::clone(&self.transport);
        let tx = self.job_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let result = load_preview(&source, transport.as_ref());
            let _ = tx.send(JobMessage::Preview { id, source, result });
            ctx.request_repaint();
        });
    }

    /// Shows the image and posts it. Invalid input stops before anything is sent;
    /// reading and encoding a file happens on the worker.
    fn submit(&mut self, ctx: &egui::Context, source: ImageSource) {
        let request = match self.orchestrator.begin(&source, self.mode, &self.session) {
            Ok(request) => request,
            Err(_) => return,
        };
        if self.preview.source.as_ref() != Some(&source) {
            self.spawn_preview(ctx, source);
        }

        let transport = Arc::clone(&self.transport);
        let tx = self.job_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let outcome = request.send(transport.as_ref());
            let _ = tx.send(JobMessage::Reply(outcome));
            ctx.request_repaint();
        });
    }

    /// Polls worker threads for finished jobs.
    fn poll_worker(&mut self, ctx: &egui::Context) {
        let mut updated = false;
        while let Ok(message) = self.job_rx.try_recv() {
            self.handle_job_message(message);
            updated = true;
        }
        if updated {
            ctx.request_repaint();
        }
    }

    fn handle_job_message(&mut self, message: JobMessage) {
        match message {
            JobMessage::Session(Ok(session)) => self.session = session,
            JobMessage::Session(Err(err)) => {
                error!("Could not establish session: {err}");
                self.orchestrator.show_error(&err);
            }
            JobMessage::Preview { id, source, result } => {
                if self.preview.finish(id, source, result) {
                    self.texture = None;
                }
            }
            JobMessage::Reply(outcome) => {
                self.orchestrator.complete(outcome, &self.geometry);
            }
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(ref img) = self.preview.image {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            self.texture = Some(ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR));
        }
    }

    fn handle_action(&mut self, ctx: &egui::Context, action: Action) {
        match action {
            Action::PickFile => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Images", &["png", "jpg", "jpeg"])
                    .pick_file()
                {
                    self.selected_file = Some(path.clone());
                    self.spawn_preview(ctx, ImageSource::File(path));
                }
            }
            Action::SubmitFile => match ImageSource::file(self.selected_file.clone()) {
                Ok(source) => self.submit(ctx, source),
                Err(err) => self.orchestrator.show_error(&err),
            },
            Action::SubmitDefault => {
                let source = ImageSource::Default(self.config.default_image.clone());
                self.submit(ctx, source);
            }
            Action::SubmitUrl => match ImageSource::url(self.url_input.trim()) {
                Ok(source) => self.submit(ctx, source),
                Err(err) => {
                    self.url_input.clear();
                    self.orchestrator.show_error(&err);
                }
            },
            Action::ExportOverlay => {
                if let Err(err) = self.export_overlay() {
                    self.orchestrator.show_error(&err);
                }
            }
        }
    }

    fn export_overlay(&self) -> Result<()> {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("SVG", &["svg"])
            .set_file_name("overlay.svg")
            .save_file()
        else {
            return Ok(());
        };
        let svg = self
            .orchestrator
            .state()
            .overlay
            .to_svg(self.geometry.displayed_width, self.geometry.displayed_height);
        std::fs::write(&path, svg).map_err(VisionError::from)?;
        info!("Exported overlay to {}", path.display());
        Ok(())
    }

    fn toolbar(&mut self, ui: &mut egui::Ui, action: &mut Option<Action>) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_label("Mode")
                .selected_text(self.mode.name())
                .show_ui(ui, |ui| {
                    for mode in Mode::ALL {
                        ui.selectable_value(&mut self.mode, mode, mode.name());
                    }
                });
            ui.separator();
            if ui.button("Choose file…").clicked() {
                *action = Some(Action::PickFile);
            }
            match &self.selected_file {
                Some(path) => {
                    ui.monospace(path.file_name().unwrap_or_default().to_string_lossy().into_owned());
                }
                None => {
                    ui.weak("No file selected");
                }
            }
            if ui.button("Submit").clicked() {
                *action = Some(Action::SubmitFile);
            }
            if ui.button("Use default image").clicked() {
                *action = Some(Action::SubmitDefault);
            }
            ui.separator();
            let url = ui.add(
                egui::TextEdit::singleline(&mut self.url_input)
                    .hint_text("http://…/image.png")
                    .desired_width(220.0),
            );
            let entered = url.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Submit URL").clicked() || entered {
                *action = Some(Action::SubmitUrl);
            }
            ui.separator();
            ui.checkbox(&mut self.stretch, "Stretch");
        });
    }

    fn results_panel(&mut self, ui: &mut egui::Ui, action: &mut Option<Action>) {
        let state = self.orchestrator.state();
        ui.heading(match state.status.text() {
            "" => "Ready",
            text => text,
        });
        if state.status.is_loading() {
            ui.spinner();
        }
        ui.separator();

        if let (true, Some(label)) = (state.details_visible, &state.label) {
            TableBuilder::new(ui)
                .column(Column::auto())
                .column(Column::remainder())
                .body(|mut body| {
                    for (name, value) in [
                        ("Description", label.description.clone()),
                        ("MID", label.mid.clone()),
                        ("Score", label.score.to_string()),
                        ("Topicality", label.topicality.to_string()),
                    ] {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.strong(name);
                            });
                            row.col(|ui| {
                                ui.label(value);
                            });
                        });
                    }
                });
            ui.separator();
        }
        if let Some(notice) = &state.notice {
            ui.label(notice);
            ui.separator();
        }

        ui.horizontal(|ui| {
            ui.label(format!("{} shape(s)", state.overlay.len()));
            if ui
                .add_enabled(!state.overlay.is_empty(), egui::Button::new("Export overlay…"))
                .clicked()
            {
                *action = Some(Action::ExportOverlay);
            }
        });

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.monospace(&state.json_output);
            });
    }

    fn image_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::hover());
        let canvas_rect = response.rect;
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let Some(ref tex) = self.texture else {
            self.geometry = DisplayGeometry::default();
            self.orchestrator.redraw(&self.geometry);
            return;
        };

        let (w, h) = fit_display_size(
            self.preview.natural_size,
            (canvas_rect.width(), canvas_rect.height()),
            self.stretch,
        );
        let img_rect = egui::Rect::from_center_size(canvas_rect.center(), egui::vec2(w, h));
        painter.image(
            tex.id(),
            img_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        // Displayed size is read fresh every frame.
        self.geometry = DisplayGeometry::new(
            self.preview.natural_size.0,
            self.preview.natural_size.1,
            img_rect.width(),
            img_rect.height(),
        );
        self.orchestrator.redraw(&self.geometry);

        let origin = img_rect.min;
        for polygon in self.orchestrator.state().overlay.polygons() {
            let points = polygon
                .iter()
                .map(|p| origin + egui::vec2(p.x as f32, p.y as f32))
                .collect();
            painter.add(egui::Shape::closed_line(
                points,
                egui::Stroke::new(OVERLAY_THICKNESS, OVERLAY_COLOR),
            ));
        }
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for VisionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker(ctx);
        self.ensure_texture(ctx);

        let mut action = None;

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui, &mut action);
        });

        egui::SidePanel::right("results")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                self.results_panel(ui, &mut action);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.image_canvas(ui);
        });

        if let Some(action) = action {
            debug!("Handling UI action");
            self.handle_action(ctx, action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(w, h))
    }

    fn file(name: &str) -> ImageSource {
        ImageSource::File(PathBuf::from(name))
    }

    #[test]
    fn test_slow_earlier_preview_does_not_replace_latest() {
        let mut preview = Preview::default();
        let large = preview.start();
        let default = preview.start();

        assert!(preview.finish(default, file("default.png"), Ok(image(320, 240))));
        assert!(!preview.finish(large, file("large.jpg"), Ok(image(4000, 3000))));

        assert_eq!(preview.natural_size, (320.0, 240.0));
        assert_eq!(preview.source, Some(file("default.png")));
    }

    #[test]
    fn test_stale_failed_preview_keeps_current_image() {
        let mut preview = Preview::default();
        let broken = preview.start();
        let good = preview.start();
        assert!(preview.finish(good, file("good.png"), Ok(image(10, 20))));
        assert!(!preview.finish(broken, file("broken.png"), Err(VisionError::network("reset"))));
        assert!(preview.image.is_some());
        assert_eq!(preview.natural_size, (10.0, 20.0));
    }

    #[test]
    fn test_latest_failed_preview_clears_image() {
        let mut preview = Preview::default();
        let first = preview.start();
        assert!(preview.finish(first, file("a.png"), Ok(image(8, 8))));
        let second = preview.start();
        assert!(preview.finish(second, file("b.png"), Err(VisionError::network("offline"))));
        assert!(preview.image.is_none());
        assert_eq!(preview.source, None);
        assert_eq!(preview.natural_size, (0.0, 0.0));
    }
}
