use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Vec2};
use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::{DisplayMapping, RasterCanvas};
use crate::color;
use crate::loader::{ImageLoader, ImageSource, LoadKind, LoadOutcome};
use crate::storage::{self, FileStore, Storage};

/// Grid resolutions offered by the size selector.
pub const SIZE_CHOICES: &[u32] = &[32, 64, 128, 256, 512];
const DEFAULT_SIZE: u32 = 128;

// ============================================================================
// TOOLS — closed set, statically dispatched onto the canvas operations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tool {
    Pencil,
    PaintBucket,
    ColorPicker,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[Tool::Pencil, Tool::PaintBucket, Tool::ColorPicker]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pencil => "Pencil",
            Tool::PaintBucket => "Paint bucket",
            Tool::ColorPicker => "Choose color",
        }
    }
}

// ============================================================================
// PERSISTED SHELL STATE — tool, colors, grid size
// ============================================================================

/// What survives a relaunch besides the canvas snapshot itself. Colors are
/// kept in their CSS `rgb(r, g, b)` form.
#[derive(Serialize, Deserialize)]
struct ShellState {
    tool: Tool,
    current_color: String,
    previous_color: String,
    grid_size: u32,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            tool: Tool::Pencil,
            current_color: color::format_rgb(0, 0, 0),
            previous_color: color::format_rgb(255, 255, 255),
            grid_size: DEFAULT_SIZE,
        }
    }
}

impl ShellState {
    fn load(store: &FileStore) -> Self {
        let Some(raw) = store.get(storage::STATE_KEY) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                log_warn!("persisted shell state unreadable, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

fn parse_color(s: &str, fallback: Color32) -> Color32 {
    match color::parse_rgb(s) {
        Some((r, g, b)) => Color32::from_rgb(r, g, b),
        None => fallback,
    }
}

fn paint_color(c: Color32) -> Rgba<u8> {
    Rgba([c.r(), c.g(), c.b(), 255])
}

// ============================================================================
// APPLICATION
// ============================================================================

pub struct PixelPadApp {
    canvas: RasterCanvas,
    loader: ImageLoader,
    store: FileStore,

    tool: Tool,
    current_color: Color32,
    previous_color: Color32,
    grid_size: u32,

    error_message: Option<String>,
}

impl PixelPadApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self::with_store(FileStore::open_default())
    }

    /// Build the app over an explicit store (the canvas gets its own handle
    /// onto the same map).
    pub fn with_store(store: FileStore) -> Self {
        let state = ShellState::load(&store);
        let grid_size = if state.grid_size > 0 {
            state.grid_size
        } else {
            DEFAULT_SIZE
        };

        let canvas = RasterCanvas::new(grid_size, Box::new(store.clone()));
        let mut app = Self {
            canvas,
            loader: ImageLoader::new(),
            store,
            tool: state.tool,
            current_color: parse_color(&state.current_color, Color32::BLACK),
            previous_color: parse_color(&state.previous_color, Color32::WHITE),
            grid_size,
            error_message: None,
        };
        app.submit_restore();
        app
    }

    /// Hand a deferred snapshot restore to the background loader.
    fn submit_restore(&mut self) {
        if let Some(snapshot) = self.canvas.take_pending_restore() {
            self.loader
                .request(LoadKind::Restore, ImageSource::DataUri(snapshot));
        }
    }

    fn save_shell_state(&mut self) {
        let state = ShellState {
            tool: self.tool,
            current_color: color::format_rgb(
                self.current_color.r(),
                self.current_color.g(),
                self.current_color.b(),
            ),
            previous_color: color::format_rgb(
                self.previous_color.r(),
                self.previous_color.g(),
                self.previous_color.b(),
            ),
            grid_size: self.grid_size,
        };
        match serde_json::to_string(&state) {
            Ok(json) => {
                if let Err(e) = self.store.set(storage::STATE_KEY, &json) {
                    log_warn!("shell state write failed: {}", e);
                }
            }
            Err(e) => log_warn!("shell state serialize failed: {}", e),
        }
    }

    /// Promote the old current color to the previous-color slot.
    fn change_color(&mut self, new: Color32) {
        if new != self.current_color {
            self.previous_color = self.current_color;
            self.current_color = new;
            self.save_shell_state();
        }
    }

    fn import_image(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp"])
            .pick_file();
        if let Some(path) = picked {
            self.loader.request(LoadKind::Import, ImageSource::Path(path));
        }
    }

    fn handle_outcome(&mut self, outcome: LoadOutcome) {
        match outcome.result {
            Ok(img) => {
                log_info!(
                    "decode #{} ({:?}) landed: {}×{}",
                    outcome.generation,
                    outcome.kind,
                    img.width(),
                    img.height()
                );
                self.canvas.place_image(&img);
            }
            Err(e) => {
                log_err!("decode #{} ({}) failed: {}", outcome.generation, outcome.label, e);
                self.error_message = Some(format!("Could not load {}: {}", outcome.label, e));
            }
        }
    }

    // ---- panels ---------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Load image…").clicked() {
                self.import_image();
            }
            if ui.button("Black & white").clicked()
                && self.canvas.redraw_in_black_and_white().is_err()
            {
                self.error_message = Some("Load an image first".to_string());
            }

            ui.separator();
            ui.label("Canvas size:");
            let mut selected = self.grid_size;
            egui::ComboBox::from_id_source("grid-size")
                .selected_text(format!("{0}×{0}", selected))
                .show_ui(ui, |ui| {
                    for &size in SIZE_CHOICES {
                        ui.selectable_value(&mut selected, size, format!("{0}×{0}", size));
                    }
                });
            if selected != self.grid_size {
                log_info!("canvas resized {0} -> {1}", self.grid_size, selected);
                self.grid_size = selected;
                self.canvas.change_size(selected);
                self.submit_restore();
                self.save_shell_state();
            }
        });
    }

    fn tools_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Tools");
        for &tool in Tool::all() {
            if ui.selectable_label(self.tool == tool, tool.label()).clicked() {
                self.tool = tool;
                self.save_shell_state();
            }
        }

        ui.separator();
        ui.label("Color");
        let mut rgb = [
            self.current_color.r(),
            self.current_color.g(),
            self.current_color.b(),
        ];
        if ui.color_edit_button_srgb(&mut rgb).changed() {
            self.change_color(Color32::from_rgb(rgb[0], rgb[1], rgb[2]));
        }
        let previous = self.previous_color;
        if ui
            .add(egui::Button::new("    ").fill(previous))
            .on_hover_text("Previous color — click to bring back")
            .clicked()
        {
            self.change_color(previous);
        }
    }

    fn canvas_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        self.canvas.update_texture(ctx);

        // Largest centered square the panel can hold.
        let available = ui.available_size();
        let side = available.x.min(available.y).max(1.0);
        let (response, painter) = ui.allocate_painter(available, Sense::click_and_drag());
        let rect = Rect::from_center_size(response.rect.center(), Vec2::splat(side));

        if let Some(texture) = self.canvas.texture() {
            painter.image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }

        // Paint while the primary button is held; every pointer sample is an
        // independent operation, with no interpolation in between.
        if response.is_pointer_button_down_on()
            && let Some(pos) = response.interact_pointer_pos()
            && rect.contains(pos)
        {
            let size = self.canvas.size();
            let mapping = DisplayMapping::new((rect.width(), rect.height()), size, size);
            let logical = mapping.to_logical((pos.x - rect.min.x, pos.y - rect.min.y));

            match self.tool {
                Tool::Pencil => {
                    let cell = mapping.cell_size();
                    self.canvas
                        .paint_cell(logical, cell, paint_color(self.current_color));
                }
                Tool::PaintBucket => {
                    self.canvas.fill(paint_color(self.current_color));
                }
                Tool::ColorPicker => {
                    let (r, g, b) = self.canvas.pick_color(logical);
                    self.change_color(Color32::from_rgb(r, g, b));
                }
            }
        }
    }
}

impl eframe::App for PixelPadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Async decode completions (imports and restores) land here.
        while let Some(outcome) = self.loader.poll() {
            self.handle_outcome(outcome);
        }

        if let Some(msg) = self.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(msg);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::SidePanel::left("tools")
            .resizable(false)
            .show(ctx, |ui| self.tools_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.canvas_panel(ui, ctx));
    }
}
