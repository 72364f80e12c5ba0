use eframe::egui;
use egui::TextureOptions;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::io;
use crate::ops::filters;
use crate::storage::{self, Storage};

/// Background color the grid is cleared to: opaque white.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

// ============================================================================
// DISPLAY MAPPING — physical (on-screen) units <-> logical grid units
// ============================================================================

/// Ratio between the grid's logical resolution and the rect it is rendered
/// into. Rebuilt from the current widget rect every frame — window resizes
/// and layout changes can alter it at any time, so it is never cached.
#[derive(Clone, Copy, Debug)]
pub struct DisplayMapping {
    physical: (f32, f32),
    logical: (f32, f32),
}

impl DisplayMapping {
    pub fn new(physical: (f32, f32), logical_w: u32, logical_h: u32) -> Self {
        Self {
            physical,
            logical: (logical_w as f32, logical_h as f32),
        }
    }

    /// Map a pointer offset (relative to the canvas rect, physical units)
    /// to a continuous logical coordinate. Each axis scales independently;
    /// no rounding happens here — quantization is the pixel ops' job.
    pub fn to_logical(&self, offset: (f32, f32)) -> (f32, f32) {
        (
            offset.0 * self.logical.0 / self.physical.0,
            offset.1 * self.logical.1 / self.physical.1,
        )
    }

    /// Footprint of one logical cell, per axis (the "virtual pixel").
    pub fn cell_size(&self) -> (f32, f32) {
        (
            self.physical.0 / self.logical.0,
            self.physical.1 / self.logical.1,
        )
    }
}

// ============================================================================
// FIT TRANSFORM — aspect-preserving placement of a source image in the grid
// ============================================================================

/// Scale-and-center placement of an arbitrary source inside the grid.
/// The scale is uniform (aspect ratio always preserved) and may upscale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitTransform {
    pub scale: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FitTransform {
    pub fn compute(src_w: u32, src_h: u32, grid_w: u32, grid_h: u32) -> Self {
        let scale_w = grid_w as f32 / src_w as f32;
        let scale_h = grid_h as f32 / src_h as f32;
        let scale = scale_w.min(scale_h);

        let width = src_w as f32 * scale;
        let height = src_h as f32 * scale;
        Self {
            scale,
            x: (grid_w as f32 - width) / 2.0,
            y: (grid_h as f32 - height) / 2.0,
            width,
            height,
        }
    }
}

// ============================================================================
// RASTER CANVAS — the fixed-resolution painting surface
// ============================================================================

/// Error type for canvas operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasError {
    /// Grayscale requested before any image was loaded or restored.
    NoImageLoaded,
}

impl std::fmt::Display for CanvasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanvasError::NoImageLoaded => write!(f, "no image has been loaded yet"),
        }
    }
}

/// Square grid of logical pixels bound to a storage collaborator.
///
/// Every mutating operation re-serializes the full buffer to the store
/// under the fixed canvas key, so the latest state survives a relaunch.
/// The rendering surface is an egui texture uploaded with
/// `TextureOptions::NEAREST` — grid pixels always render as hard-edged
/// blocks, never interpolated.
pub struct RasterCanvas {
    grid: RgbaImage,
    size: u32,
    storage: Box<dyn Storage>,
    /// Set once an import or restore has landed; gates the grayscale filter.
    image_loaded: bool,
    /// Snapshot string found in storage at init, waiting for an async
    /// decode-then-draw. Taken exactly once by the owner.
    pending_restore: Option<String>,
    texture: Option<egui::TextureHandle>,
    texture_dirty: bool,
}

impl RasterCanvas {
    /// Create a `size × size` grid. If the store holds a prior snapshot it
    /// becomes the pending restore; otherwise the white baseline is
    /// persisted immediately.
    ///
    /// Caller contract: `size > 0`.
    pub fn new(size: u32, storage: Box<dyn Storage>) -> Self {
        let mut canvas = Self {
            grid: RgbaImage::from_pixel(size, size, BACKGROUND),
            size,
            storage,
            image_loaded: false,
            pending_restore: None,
            texture: None,
            texture_dirty: true,
        };
        canvas.reset(size);
        canvas
    }

    /// Hard reset at a new resolution: the old backing store is discarded,
    /// never rescaled. Restore-or-persist runs again, same as construction.
    pub fn change_size(&mut self, new_size: u32) {
        self.reset(new_size);
    }

    fn reset(&mut self, size: u32) {
        self.size = size;
        self.grid = RgbaImage::from_pixel(size, size, BACKGROUND);
        self.image_loaded = false;
        self.texture_dirty = true;

        match self.storage.get(storage::CANVAS_KEY) {
            Some(snapshot) => self.pending_restore = Some(snapshot),
            None => self.persist(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn grid(&self) -> &RgbaImage {
        &self.grid
    }

    pub fn is_image_loaded(&self) -> bool {
        self.image_loaded
    }

    /// Snapshot string awaiting an async restore, if any. The caller feeds
    /// it to the image loader; decode-then-draw completes the cycle via
    /// [`RasterCanvas::place_image`].
    pub fn take_pending_restore(&mut self) -> Option<String> {
        self.pending_restore.take()
    }

    // ---- pixel operations ---------------------------------------------------

    /// Paint-bucket: set every pixel to `color`, unconditionally.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.grid.pixels_mut() {
            *px = color;
        }
        self.commit();
    }

    /// Sample the cell containing `coord` (logical units). Alpha is
    /// discarded; coordinates are clamped into the grid.
    pub fn pick_color(&self, coord: (f32, f32)) -> (u8, u8, u8) {
        let x = (coord.0.floor().max(0.0) as u32).min(self.size.saturating_sub(1));
        let y = (coord.1.floor().max(0.0) as u32).min(self.size.saturating_sub(1));
        let px = self.grid.get_pixel(x, y);
        (px.0[0], px.0[1], px.0[2])
    }

    /// Pencil: fill the single grid-aligned cell containing `coord`.
    ///
    /// The anchor snaps to `floor(coord / cell) * cell` per axis, so all
    /// pointer samples inside one cell paint the same block — and nothing
    /// interpolates between samples, so a fast drag may skip cells. That is
    /// the contract, not a bug.
    pub fn paint_cell(&mut self, coord: (f32, f32), cell: (f32, f32), color: Rgba<u8>) {
        if cell.0 <= 0.0 || cell.1 <= 0.0 {
            return;
        }
        let anchor_x = (coord.0 / cell.0).floor() * cell.0;
        let anchor_y = (coord.1 / cell.1).floor() * cell.1;
        self.fill_rect(anchor_x, anchor_y, cell.0, cell.1, color);
        self.commit();
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
        let (gw, gh) = self.grid.dimensions();
        let x0 = (x.floor().max(0.0) as u32).min(gw);
        let y0 = (y.floor().max(0.0) as u32).min(gh);
        let x1 = ((x + w).ceil().max(0.0) as u32).min(gw);
        let y1 = ((y + h).ceil().max(0.0) as u32).min(gh);

        for yy in y0..y1 {
            for xx in x0..x1 {
                self.grid.put_pixel(xx, yy, color);
            }
        }
    }

    // ---- image import / restore ---------------------------------------------

    /// Composite a decoded source image into the grid: clear to the
    /// background, scale uniformly (nearest-neighbor) into the centered fit
    /// rectangle, remember that an image is now loaded, persist.
    ///
    /// Restores go through here too — a snapshot the same size as the grid
    /// fits at scale 1 and lands at the origin.
    pub fn place_image(&mut self, src: &RgbaImage) {
        self.clear();

        let fit = FitTransform::compute(src.width(), src.height(), self.size, self.size);
        let dst_w = (fit.width.round() as u32).max(1);
        let dst_h = (fit.height.round() as u32).max(1);

        let scaled;
        let placed: &RgbaImage = if (dst_w, dst_h) == src.dimensions() {
            src
        } else {
            scaled = imageops::resize(src, dst_w, dst_h, FilterType::Nearest);
            &scaled
        };
        imageops::overlay(
            &mut self.grid,
            placed,
            fit.x.round() as i64,
            fit.y.round() as i64,
        );

        self.image_loaded = true;
        self.commit();
    }

    fn clear(&mut self) {
        for px in self.grid.pixels_mut() {
            *px = BACKGROUND;
        }
    }

    // ---- filters --------------------------------------------------------------

    /// In-place grayscale over the whole buffer. Fails when nothing was
    /// ever imported or restored — there is no semantic image to convert.
    pub fn redraw_in_black_and_white(&mut self) -> Result<(), CanvasError> {
        if !self.image_loaded {
            return Err(CanvasError::NoImageLoaded);
        }
        filters::grayscale(&mut self.grid);
        self.commit();
        Ok(())
    }

    // ---- persistence ----------------------------------------------------------

    /// Invalidate the texture and write the snapshot. Runs after every
    /// mutating operation.
    fn commit(&mut self) {
        self.texture_dirty = true;
        self.persist();
    }

    fn persist(&mut self) {
        match io::encode_snapshot(&self.grid) {
            Ok(uri) => {
                if let Err(e) = self.storage.set(storage::CANVAS_KEY, &uri) {
                    log_warn!("snapshot write failed: {}", e);
                }
            }
            Err(e) => log_warn!("snapshot encode failed: {}", e),
        }
    }

    // ---- rendering surface ----------------------------------------------------

    /// Re-upload the grid as an egui texture when dirty. NEAREST filtering
    /// keeps pixels square under any zoom the layout applies.
    pub fn update_texture(&mut self, ctx: &egui::Context) {
        if !self.texture_dirty {
            return;
        }
        let img = egui::ColorImage::from_rgba_unmultiplied(
            [self.size as usize, self.size as usize],
            self.grid.as_raw(),
        );
        self.texture = Some(ctx.load_texture("canvas", img, TextureOptions::NEAREST));
        self.texture_dirty = false;
    }

    pub fn texture(&self) -> Option<&egui::TextureHandle> {
        self.texture.as_ref()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use std::sync::{Arc, Mutex};

    const EPS: f32 = 1e-3;

    /// Cloneable store so tests can observe what the canvas persisted.
    #[derive(Clone, Default)]
    struct SharedStore(Arc<Mutex<MemoryStore>>);

    impl Storage for SharedStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.lock().unwrap().get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            self.0.lock().unwrap().set(key, value)
        }
    }

    fn fresh_canvas(size: u32) -> RasterCanvas {
        RasterCanvas::new(size, Box::new(MemoryStore::new()))
    }

    #[test]
    fn init_yields_white_grid_of_exact_buffer_length() {
        let canvas = fresh_canvas(8);
        assert_eq!(canvas.grid().as_raw().len(), 8 * 8 * 4);
        assert!(
            canvas
                .grid()
                .pixels()
                .all(|px| *px == Rgba([255, 255, 255, 255]))
        );
        assert!(!canvas.is_image_loaded());
    }

    #[test]
    fn init_persists_white_baseline_when_store_is_empty() {
        let store = SharedStore::default();
        let canvas = RasterCanvas::new(4, Box::new(store.clone()));

        let snapshot = store.get(storage::CANVAS_KEY).expect("baseline persisted");
        let decoded = io::decode_snapshot(&snapshot).unwrap();
        assert_eq!(decoded.as_raw(), canvas.grid().as_raw());
    }

    #[test]
    fn init_defers_restore_when_snapshot_exists() {
        let mut store = SharedStore::default();
        let red = RgbaImage::from_pixel(4, 4, Rgba([200, 0, 0, 255]));
        store
            .set(storage::CANVAS_KEY, &io::encode_snapshot(&red).unwrap())
            .unwrap();

        let mut canvas = RasterCanvas::new(4, Box::new(store));
        // Grid stays on the background until the async decode lands.
        assert!(canvas.grid().pixels().all(|px| *px == BACKGROUND));

        let snapshot = canvas.take_pending_restore().expect("restore pending");
        let decoded = io::decode_snapshot(&snapshot).unwrap();
        canvas.place_image(&decoded);
        assert_eq!(canvas.grid().as_raw(), red.as_raw());
        assert!(canvas.is_image_loaded());
        // Taken exactly once.
        assert!(canvas.take_pending_restore().is_none());
    }

    #[test]
    fn fit_wide_source_pillarboxes_vertically() {
        let fit = FitTransform::compute(800, 400, 256, 256);
        assert!((fit.scale - 0.32).abs() < EPS);
        assert!((fit.width - 256.0).abs() < EPS);
        assert!((fit.height - 128.0).abs() < EPS);
        assert!(fit.x.abs() < EPS);
        assert!((fit.y - 64.0).abs() < EPS);
    }

    #[test]
    fn fit_small_source_upscales_centered() {
        let fit = FitTransform::compute(100, 100, 256, 256);
        assert!((fit.scale - 2.56).abs() < EPS);
        assert!((fit.width - 256.0).abs() < EPS);
        assert!(fit.x.abs() < EPS);
        assert!(fit.y.abs() < EPS);
    }

    #[test]
    fn fit_tolerates_non_square_grids() {
        let fit = FitTransform::compute(100, 100, 200, 100);
        assert!((fit.scale - 1.0).abs() < EPS);
        assert!((fit.x - 50.0).abs() < EPS);
        assert!(fit.y.abs() < EPS);
    }

    #[test]
    fn place_image_letterboxes_on_background() {
        let mut canvas = fresh_canvas(256);
        let src = RgbaImage::from_pixel(800, 400, Rgba([0, 0, 200, 255]));
        canvas.place_image(&src);

        // Rows 64..192 carry the image, the bands above and below stay white.
        assert_eq!(canvas.grid().get_pixel(128, 128), &Rgba([0, 0, 200, 255]));
        assert_eq!(canvas.grid().get_pixel(128, 10), &BACKGROUND);
        assert_eq!(canvas.grid().get_pixel(128, 250), &BACKGROUND);
        assert_eq!(canvas.grid().get_pixel(0, 64), &Rgba([0, 0, 200, 255]));
        assert_eq!(canvas.grid().get_pixel(0, 191), &Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn pick_color_after_fill_returns_fill_color_everywhere() {
        let mut canvas = fresh_canvas(8);
        canvas.fill(Rgba([10, 20, 30, 255]));
        for coord in [(0.0, 0.0), (3.7, 3.2), (7.99, 7.99)] {
            assert_eq!(canvas.pick_color(coord), (10, 20, 30));
        }
    }

    #[test]
    fn pick_color_clamps_out_of_range_coordinates() {
        let mut canvas = fresh_canvas(8);
        canvas.fill(Rgba([1, 2, 3, 255]));
        assert_eq!(canvas.pick_color((-5.0, 100.0)), (1, 2, 3));
    }

    #[test]
    fn paint_cell_quantizes_to_cell_anchors() {
        let red = Rgba([255, 0, 0, 255]);
        let mut canvas = fresh_canvas(32);

        // Same 16×16 cell for both samples.
        canvas.paint_cell((5.0, 5.0), (16.0, 16.0), red);
        canvas.paint_cell((15.0, 15.0), (16.0, 16.0), red);
        assert_eq!(canvas.grid().get_pixel(0, 0), &red);
        assert_eq!(canvas.grid().get_pixel(15, 15), &red);
        assert_eq!(canvas.grid().get_pixel(16, 16), &BACKGROUND);
        assert_eq!(canvas.grid().get_pixel(16, 0), &BACKGROUND);

        // (16, 0) anchors the next cell over.
        canvas.paint_cell((16.0, 0.0), (16.0, 16.0), red);
        assert_eq!(canvas.grid().get_pixel(16, 0), &red);
        assert_eq!(canvas.grid().get_pixel(31, 15), &red);
        assert_eq!(canvas.grid().get_pixel(16, 16), &BACKGROUND);
    }

    #[test]
    fn paint_cell_footprint_clamps_at_grid_edge() {
        let red = Rgba([255, 0, 0, 255]);
        let mut canvas = fresh_canvas(8);
        canvas.paint_cell((7.5, 7.5), (6.0, 6.0), red);
        // Anchor (6, 6); only the in-grid corner is painted.
        assert_eq!(canvas.grid().get_pixel(7, 7), &red);
        assert_eq!(canvas.grid().get_pixel(5, 5), &BACKGROUND);
    }

    #[test]
    fn grayscale_requires_a_loaded_image() {
        let mut canvas = fresh_canvas(8);
        canvas.fill(Rgba([200, 100, 50, 255]));
        assert_eq!(
            canvas.redraw_in_black_and_white(),
            Err(CanvasError::NoImageLoaded)
        );
        // No mutation happened.
        assert_eq!(canvas.pick_color((0.0, 0.0)), (200, 100, 50));

        let src = RgbaImage::from_pixel(8, 8, Rgba([200, 100, 50, 255]));
        canvas.place_image(&src);
        assert_eq!(canvas.redraw_in_black_and_white(), Ok(()));
        // 0.3*200 + 0.59*100 + 0.11*50 = 124.5 -> 125
        assert_eq!(canvas.pick_color((0.0, 0.0)), (125, 125, 125));
    }

    #[test]
    fn grayscale_twice_equals_grayscale_once() {
        let mut canvas = fresh_canvas(16);
        let src = RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8, 255])
        });
        canvas.place_image(&src);

        canvas.redraw_in_black_and_white().unwrap();
        let once = canvas.grid().as_raw().clone();
        canvas.redraw_in_black_and_white().unwrap();
        assert_eq!(canvas.grid().as_raw(), &once);
    }

    #[test]
    fn persisted_snapshot_restores_identical_buffer() {
        let store = SharedStore::default();
        let mut canvas = RasterCanvas::new(8, Box::new(store.clone()));
        canvas.fill(Rgba([10, 20, 30, 255]));
        let original = canvas.grid().as_raw().clone();

        // Relaunch: same store, fresh canvas, restore cycle.
        let mut reborn = RasterCanvas::new(8, Box::new(store));
        let snapshot = reborn.take_pending_restore().expect("snapshot present");
        let decoded = io::decode_snapshot(&snapshot).unwrap();
        reborn.place_image(&decoded);

        assert_eq!(reborn.grid().as_raw(), &original);
    }

    #[test]
    fn resize_never_preserves_content() {
        let store = SharedStore::default();
        let mut canvas = RasterCanvas::new(8, Box::new(store.clone()));
        canvas.fill(Rgba([200, 0, 0, 255]));

        canvas.change_size(16);
        let fresh = RasterCanvas::new(16, Box::new(store));

        // Ignoring restore timing, resized == freshly initialized.
        assert_eq!(canvas.size(), 16);
        assert_eq!(canvas.grid().as_raw(), fresh.grid().as_raw());
        assert!(canvas.grid().pixels().all(|px| *px == BACKGROUND));
        assert!(!canvas.is_image_loaded());
    }

    #[test]
    fn display_mapping_scales_each_axis_independently() {
        let map = DisplayMapping::new((400.0, 200.0), 100, 100);
        let (x, y) = map.to_logical((200.0, 100.0));
        assert!((x - 50.0).abs() < EPS);
        assert!((y - 50.0).abs() < EPS);
        let (cw, ch) = map.cell_size();
        assert!((cw - 4.0).abs() < EPS);
        assert!((ch - 2.0).abs() < EPS);
    }

    #[test]
    fn display_mapping_keeps_coordinates_continuous() {
        let map = DisplayMapping::new((512.0, 512.0), 128, 128);
        let (x, y) = map.to_logical((5.0, 6.0));
        assert!((x - 1.25).abs() < EPS);
        assert!((y - 1.5).abs() < EPS);
    }
}
