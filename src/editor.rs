//! Edit session: the state machine that turns pointer, wheel and control
//! events into mask edits, plus the control surface a host drives.
//!
//! ```text
//!              pointer-down (freehand)       pointer-up (≥2 points) → commit
//!   Idle ─────────────────────────────► Stroking ─────────────────────────► Idle
//!    │  pointer-down (box)                          pointer-up (area > 0) → commit
//!    ├────────────────────────────────► Boxing ────────────────────────────► Idle
//!    │  pointer-down (polygon)                      click near first vertex → commit
//!    ├────────────────────────────────► PolygonCollecting ─────────────────► Idle
//!    │  pointer-down (move)                         pointer-up
//!    └────────────────────────────────► Panning ───────────────────────────► Idle
//! ```
//!
//! A tool change discards whatever gesture is in progress.  Wheel events
//! zoom in any state; in-progress freehand/box points are already in image
//! space and polygon vertices in viewport space, so zooming mid-gesture
//! never shifts them.
//!
//! The editor never fails across its public surface.  Calls that arrive
//! before an image is loaded, or while a new one is loading, are ignored.
//! Hosts learn about changes by draining [`MaskEditor::take_events`].

use std::path::PathBuf;

use image::RgbaImage;

use crate::canvas::{MaskCanvas, MaskSnapshot, MaskStyle, TiledImage};
use crate::components::colors::MaskColor;
use crate::components::history::HistoryManager;
use crate::components::tools::{
    BrushCursor, GestureKind, GestureOverlay, GestureState, PolygonOverlay, ToolMode, ToolProperties,
};
use crate::io::{ImageLoader, LoadedImage, MaskError, check_dimensions};
use crate::ops::compositor::{self, BoxSelection, CompositeOp};
use crate::ops::export::EncodedMask;
use crate::ops::transform::{DisplayFit, ImagePos, ScreenPos, Size, ViewTransform, ViewportPos};
use crate::settings::EditorSettings;

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

pub const MIN_ZOOM_PERCENT: f64 = 100.0;
pub const MAX_ZOOM_PERCENT: f64 = 1000.0;

/// Notifications for the host, queued in order.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// Zoom level as a rounded percentage.
    ZoomChanged(u32),
    HistoryChanged { can_undo: bool, can_redo: bool },
    /// Fired after every committed mutation with the binary export.
    MaskChanged(Option<EncodedMask>),
    /// A new background is installed; upload it and reset any view state.
    ImageLoaded { width: u32, height: u32 },
    LoadFailed(String),
}

pub struct MaskEditor {
    settings: EditorSettings,
    props: ToolProperties,
    tool: ToolMode,
    view: ViewTransform,
    container: Option<Size>,
    fit: DisplayFit,
    background: Option<RgbaImage>,
    canvas: Option<MaskCanvas>,
    history: HistoryManager,
    gesture: GestureState,
    loader: ImageLoader,
    /// Last pointer position in viewport space; `None` when outside.
    pointer: Option<ViewportPos>,
    preview_dirty: bool,
    /// Colour or opacity changed while a load was pending; the installed
    /// mask still carries the previous style.
    style_stale: bool,
    /// Bumped whenever [`MaskEditor::display_raster`] changes.
    revision: u64,
    events: Vec<EditorEvent>,
}

impl Default for MaskEditor {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl MaskEditor {
    pub fn new(settings: EditorSettings) -> Self {
        let mut props = ToolProperties::default();
        props.set_brush_size(settings.brush_size);
        props.style = MaskStyle::new(settings.mask_color, settings.opacity);
        let history = HistoryManager::new(settings.max_undo_steps, Some(settings.history_memory_bytes()));
        Self {
            settings,
            props,
            tool: ToolMode::default(),
            view: ViewTransform::default(),
            container: None,
            fit: DisplayFit::native(1, 1),
            background: None,
            canvas: None,
            history,
            gesture: GestureState::Idle,
            loader: ImageLoader::new(),
            pointer: None,
            preview_dirty: false,
            style_stale: false,
            revision: 0,
            events: Vec::new(),
        }
    }

    // ---- image lifecycle -----------------------------------------------------

    /// Start loading `path` in the background.  Raster operations are
    /// ignored until it lands; a newer request supersedes this one.
    pub fn load_image(&mut self, path: PathBuf) {
        crate::log_info!("Loading image {}", path.display());
        self.cancel_gesture();
        self.loader.request(path);
    }

    /// Install an already-decoded background synchronously.  Images the
    /// mask cannot be sized to are reported with [`EditorEvent::LoadFailed`]
    /// and leave the current image in place.
    pub fn set_image(&mut self, pixels: RgbaImage) {
        let (w, h) = pixels.dimensions();
        if let Err(e) = check_dimensions(w, h) {
            crate::log_err!("Rejected image: {}", e);
            self.events.push(EditorEvent::LoadFailed(e.to_string()));
            return;
        }
        self.loader.cancel();
        self.install_image(pixels);
    }

    /// Block until a pending [`MaskEditor::load_image`] finishes.
    pub fn wait_for_image(&mut self) -> Result<(), MaskError> {
        match self.loader.wait() {
            Some(result) => self.finish_load(result),
            None => Ok(()),
        }
    }

    /// Non-blocking check for a finished load.  Returns true when a new
    /// image was installed.
    pub fn poll_load(&mut self) -> bool {
        match self.loader.poll() {
            Some(result) => self.finish_load(result).is_ok(),
            None => false,
        }
    }

    fn finish_load(&mut self, result: Result<LoadedImage, MaskError>) -> Result<(), MaskError> {
        match result {
            Ok(loaded) => {
                crate::log_info!(
                    "Loaded {} ({}×{})",
                    loaded.path.display(),
                    loaded.pixels.width(),
                    loaded.pixels.height()
                );
                self.install_image(loaded.pixels);
                Ok(())
            }
            Err(e) => {
                crate::log_err!("Image load failed: {}", e);
                self.events.push(EditorEvent::LoadFailed(e.to_string()));
                self.sync_stale_style();
                Err(e)
            }
        }
    }

    /// The previous image survived a failed load: bring its mask up to the
    /// style chosen while the load was pending.
    fn sync_stale_style(&mut self) {
        if !self.style_stale || !self.is_ready() {
            return;
        }
        self.style_stale = false;
        if let Some(canvas) = &mut self.canvas {
            canvas.reopacity(self.props.style);
        }
        crate::log_info!("Re-applied mask style after failed load");
        self.commit(self.tool);
    }

    fn install_image(&mut self, pixels: RgbaImage) {
        let (w, h) = pixels.dimensions();
        let canvas = MaskCanvas::new(w, h);
        self.style_stale = false;
        self.history = HistoryManager::new(
            self.settings.max_undo_steps,
            Some(self.settings.history_memory_bytes()),
        );
        self.history.reset(canvas.snapshot(), self.tool);
        self.canvas = Some(canvas);
        self.background = Some(pixels);
        self.gesture = GestureState::Idle;
        self.preview_dirty = false;
        self.view = ViewTransform::default();
        self.refit();
        self.revision += 1;

        self.events.push(EditorEvent::ImageLoaded { width: w, height: h });
        self.events.push(EditorEvent::ZoomChanged(self.view.percentage()));
        self.push_history_event();
    }

    /// Raster operations are accepted.
    pub fn is_ready(&self) -> bool {
        self.canvas.is_some() && !self.loader.is_pending()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_pending()
    }

    // ---- layout --------------------------------------------------------------

    /// The host's measured canvas area, in screen pixels.
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        let size = Size::new(width, height);
        if self.container == Some(size) {
            return;
        }
        self.container = Some(size);
        self.refit();
    }

    fn refit(&mut self) {
        let old = self.fit;
        self.fit = match (&self.canvas, self.container) {
            (Some(c), Some(container)) => DisplayFit::fit(c.width(), c.height(), container),
            (Some(c), None) => DisplayFit::native(c.width(), c.height()),
            (None, _) => DisplayFit::native(1, 1),
        };
        // Keep an open polygon over the same image points.
        if let GestureState::PolygonCollecting { vertices } = &mut self.gesture {
            for v in vertices.iter_mut() {
                *v = self.fit.to_viewport(old.to_image(*v));
            }
        }
    }

    // ---- control surface -----------------------------------------------------

    pub fn set_tool_mode(&mut self, mode: ToolMode) {
        if mode == self.tool {
            return;
        }
        self.cancel_gesture();
        self.tool = mode;
    }

    pub fn tool_mode(&self) -> ToolMode {
        self.tool
    }

    /// Binary export of the committed mask; `None` before an image is loaded.
    pub fn get_mask_data(&self) -> Option<EncodedMask> {
        let Some(canvas) = &self.canvas else {
            crate::log_warn!("Mask export requested with no image loaded");
            return None;
        };
        match EncodedMask::encode(canvas.mask()) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                crate::log_err!("Mask export failed: {}", e);
                None
            }
        }
    }

    pub fn clear_mask(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.cancel_gesture();
        if let Some(canvas) = &mut self.canvas {
            canvas.clear();
        }
        crate::log_info!("Mask cleared");
        self.commit(ToolMode::Clear);
    }

    pub fn undo(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.cancel_gesture();
        let Some(snapshot) = self.history.undo().cloned() else { return };
        self.apply_history_snapshot(&snapshot, "Undo");
    }

    pub fn redo(&mut self) {
        if !self.is_ready() {
            return;
        }
        self.cancel_gesture();
        let Some(snapshot) = self.history.redo().cloned() else { return };
        self.apply_history_snapshot(&snapshot, "Redo");
    }

    /// Revert to any entry of the history list (oldest first).
    pub fn jump_to_history(&mut self, index: usize) {
        if !self.is_ready() {
            return;
        }
        self.cancel_gesture();
        let Some(snapshot) = self.history.jump_to(index).cloned() else { return };
        self.apply_history_snapshot(&snapshot, "Jump");
    }

    fn apply_history_snapshot(&mut self, snapshot: &MaskSnapshot, what: &str) {
        if let Some(canvas) = &mut self.canvas {
            canvas.restore(snapshot, self.props.style);
        }
        self.revision += 1;
        crate::log_info!("{} → entry {}/{}", what, self.history.current_index(), self.history.len());
        self.push_history_event();
        let data = self.get_mask_data();
        self.events.push(EditorEvent::MaskChanged(data));
    }

    /// Recolour every masked pixel.  Commits once when an image is loaded.
    pub fn set_mask_color(&mut self, color: MaskColor) {
        self.props.style.color = color;
        if !self.is_ready() {
            self.style_stale |= self.canvas.is_some();
            return;
        }
        if let Some(canvas) = &mut self.canvas {
            canvas.recolor(color);
        }
        self.preview_dirty |= !self.gesture.is_idle();
        self.commit(self.tool);
    }

    /// CSS-style colour; unparsable strings are ignored.
    pub fn set_mask_color_str(&mut self, color: &str) -> bool {
        match MaskColor::parse(color) {
            Ok(c) => {
                self.set_mask_color(c);
                true
            }
            Err(e) => {
                crate::log_warn!("{}", e);
                false
            }
        }
    }

    /// New opacity (clamped to 0..1) for every masked pixel.  Commits once
    /// when an image is loaded.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.props.style = MaskStyle::new(self.props.style.color, opacity);
        if !self.is_ready() {
            self.style_stale |= self.canvas.is_some();
            return;
        }
        if let Some(canvas) = &mut self.canvas {
            canvas.reopacity(self.props.style);
        }
        self.preview_dirty |= !self.gesture.is_idle();
        self.commit(self.tool);
    }

    /// Brush diameter in image pixels.
    pub fn set_brush_size(&mut self, px: f64) {
        self.props.set_brush_size(px);
        self.preview_dirty |= matches!(self.gesture, GestureState::Stroking { .. });
    }

    /// Zoom to `percentage` (clamped to 100..=1000) about the middle of the
    /// visible area.
    pub fn set_zoom(&mut self, percentage: f64) {
        let pct = if percentage.is_finite() {
            percentage.clamp(MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT)
        } else {
            MIN_ZOOM_PERCENT
        };
        let visible = self.container.unwrap_or_else(|| self.fit.display_size());
        let center = ScreenPos::new(visible.width / 2.0, visible.height / 2.0);
        self.view = self.view.zoomed_to_percentage(pct, center);
        self.events.push(EditorEvent::ZoomChanged(self.view.percentage()));
    }

    pub fn reset_zoom(&mut self) {
        self.view = ViewTransform::default();
        self.events.push(EditorEvent::ZoomChanged(self.view.percentage()));
    }

    // ---- read-only state -------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.canvas.is_some() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.canvas.is_some() && self.history.can_redo()
    }

    pub fn zoom_percentage(&self) -> u32 {
        self.view.percentage()
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    pub fn display_fit(&self) -> DisplayFit {
        self.fit
    }

    pub fn brush_size(&self) -> f64 {
        self.props.brush_size
    }

    pub fn style(&self) -> MaskStyle {
        self.props.style
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn background(&self) -> Option<&RgbaImage> {
        self.background.as_ref()
    }

    /// Committed mask plus any live preview; what the host should draw.
    pub fn display_raster(&self) -> Option<&TiledImage> {
        self.canvas.as_ref().map(|c| c.display())
    }

    /// The committed mask only.
    pub fn mask(&self) -> Option<&TiledImage> {
        self.canvas.as_ref().map(|c| c.mask())
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Map a screen point through the full pipeline.
    pub fn screen_to_image(&self, p: ScreenPos) -> ImagePos {
        self.fit.to_image(self.view.to_viewport(p))
    }

    /// Vector decorations for the current gesture, in viewport space.
    pub fn overlay(&self) -> GestureOverlay {
        let mut overlay = GestureOverlay { eraser: self.tool.is_eraser(), ..Default::default() };
        if self.canvas.is_none() {
            return overlay;
        }
        if self.tool.shows_brush_cursor()
            && let Some(center) = self.pointer
        {
            let radius = self.props.brush_size / 2.0 / self.fit.image_per_viewport();
            overlay.brush_cursor = Some(BrushCursor { center, radius });
        }
        match &self.gesture {
            GestureState::Boxing { anchor, current, .. } => {
                overlay.box_outline = Some((self.fit.to_viewport(*anchor), self.fit.to_viewport(*current)));
            }
            GestureState::PolygonCollecting { vertices } => {
                overlay.polygon = Some(PolygonOverlay {
                    vertices: vertices.clone(),
                    hover: self.pointer,
                    can_close: self.pointer.is_some_and(|p| self.closes_polygon(vertices, p)),
                });
            }
            _ => {}
        }
        overlay
    }

    // ---- pointer input ---------------------------------------------------------

    pub fn on_pointer_down(&mut self, p: ScreenPos) {
        let vp = self.view.to_viewport(p);
        self.pointer = Some(vp);

        match self.tool.gesture() {
            GestureKind::Pan => {
                self.gesture = GestureState::Panning { last: p };
            }
            _ if !self.is_ready() => {}
            GestureKind::Freehand { erase } => {
                self.gesture = GestureState::Stroking { erase, points: vec![self.fit.to_image(vp)] };
                self.preview_dirty = true;
            }
            GestureKind::Box { erase } => {
                let anchor = self.fit.to_image(vp);
                self.gesture = GestureState::Boxing { erase, anchor, current: anchor };
                self.preview_dirty = true;
            }
            GestureKind::Polygon => self.polygon_click(vp),
            GestureKind::Clear => self.clear_mask(),
        }
    }

    pub fn on_pointer_move(&mut self, p: ScreenPos) {
        let vp = self.view.to_viewport(p);
        self.pointer = Some(vp);
        let img = self.fit.to_image(vp);

        match &mut self.gesture {
            GestureState::Panning { last } => {
                let (dx, dy) = (p.x - last.x, p.y - last.y);
                *last = p;
                self.view = self.view.panned(dx, dy);
            }
            GestureState::Stroking { points, .. } => {
                if points.last() != Some(&img) {
                    points.push(img);
                    self.preview_dirty = true;
                }
            }
            GestureState::Boxing { current, .. } => {
                *current = img;
                self.preview_dirty = true;
            }
            GestureState::Idle | GestureState::PolygonCollecting { .. } => {}
        }
    }

    pub fn on_pointer_up(&mut self, p: ScreenPos) {
        if !matches!(self.gesture, GestureState::Idle | GestureState::PolygonCollecting { .. }) {
            self.on_pointer_move(p);
        }
        let gesture = std::mem::take(&mut self.gesture);
        self.preview_dirty = false;

        match gesture {
            GestureState::Stroking { erase, points } => {
                let brush = self.props.brush_size;
                let style = self.props.style;
                let painted = match &mut self.canvas {
                    Some(canvas) if erase => canvas.erase_stroke(&points, brush),
                    Some(canvas) => canvas.paint_stroke(&points, brush, style),
                    None => false,
                };
                self.finish_shape(painted);
            }
            GestureState::Boxing { erase, anchor, current } => {
                let selection = BoxSelection::from_corners(anchor, current);
                let style = self.props.style;
                let painted = match &mut self.canvas {
                    Some(canvas) if erase => canvas.erase_box(&selection),
                    Some(canvas) => canvas.paint_box(&selection, style),
                    None => false,
                };
                self.finish_shape(painted);
            }
            // Polygons are driven by clicks, not releases.
            polygon @ GestureState::PolygonCollecting { .. } => self.gesture = polygon,
            GestureState::Panning { .. } | GestureState::Idle => {}
        }
    }

    /// Pointer left the widget: hide the cursor, keep any gesture.
    pub fn on_pointer_leave(&mut self) {
        self.pointer = None;
    }

    /// Wheel notch at `p`.  Positive `delta_y` zooms out.
    pub fn on_wheel(&mut self, p: ScreenPos, delta_y: f64) {
        self.view = self.view.wheel_zoomed(delta_y, self.settings.wheel_zoom_step, p);
        self.pointer = Some(self.view.to_viewport(p));
        self.events.push(EditorEvent::ZoomChanged(self.view.percentage()));
    }

    /// Once per display frame: pick up finished loads and rebuild the live
    /// preview if pointer input arrived since the last frame.  Returns true
    /// when [`MaskEditor::display_raster`] changed.
    pub fn on_frame(&mut self) -> bool {
        let before = self.revision;
        self.poll_load();
        if self.preview_dirty {
            self.preview_dirty = false;
            self.rebuild_preview();
        }
        self.revision != before
    }

    // ---- internals ---------------------------------------------------------------

    fn polygon_click(&mut self, vp: ViewportPos) {
        let close = match &self.gesture {
            GestureState::PolygonCollecting { vertices } => self.closes_polygon(vertices, vp),
            _ => false,
        };
        if close {
            let GestureState::PolygonCollecting { vertices } = std::mem::take(&mut self.gesture) else {
                return;
            };
            let image_vertices: Vec<ImagePos> = vertices.iter().map(|v| self.fit.to_image(*v)).collect();
            let style = self.props.style;
            let painted = self
                .canvas
                .as_mut()
                .is_some_and(|canvas| canvas.paint_polygon(&image_vertices, style));
            self.finish_shape(painted);
            return;
        }
        match &mut self.gesture {
            GestureState::PolygonCollecting { vertices } => vertices.push(vp),
            _ => self.gesture = GestureState::PolygonCollecting { vertices: vec![vp] },
        }
    }

    fn closes_polygon(&self, vertices: &[ViewportPos], p: ViewportPos) -> bool {
        vertices.len() >= 3 && vertices[0].distance(p) < self.settings.polygon_close_radius
    }

    /// Commit after a shape landed, or drop the preview if it was rejected.
    fn finish_shape(&mut self, painted: bool) {
        if painted {
            self.commit(self.tool);
        } else {
            if let Some(canvas) = &mut self.canvas {
                canvas.discard_preview();
            }
            self.revision += 1;
        }
    }

    fn rebuild_preview(&mut self) {
        let Some(canvas) = &mut self.canvas else { return };
        let (w, h) = (canvas.width(), canvas.height());
        match &self.gesture {
            GestureState::Stroking { erase, points } => {
                let cov = compositor::stroke_coverage(points, self.props.brush_size, w, h);
                canvas.preview(cov.as_ref(), op_for(*erase, self.props.style));
            }
            GestureState::Boxing { erase, anchor, current } => {
                let cov = compositor::box_coverage(&BoxSelection::from_corners(*anchor, *current), w, h);
                canvas.preview(cov.as_ref(), op_for(*erase, self.props.style));
            }
            _ => canvas.discard_preview(),
        }
        self.revision += 1;
    }

    fn cancel_gesture(&mut self) {
        let gesture = std::mem::take(&mut self.gesture);
        self.preview_dirty = false;
        match gesture {
            GestureState::Idle | GestureState::Panning { .. } => {}
            other => {
                crate::log_info!("Discarded {} gesture", other.name());
                if let Some(canvas) = &mut self.canvas {
                    canvas.discard_preview();
                }
                self.revision += 1;
            }
        }
    }

    fn commit(&mut self, tool: ToolMode) {
        let Some(canvas) = &self.canvas else { return };
        self.history.commit(canvas.snapshot(), tool);
        self.revision += 1;
        crate::log_info!(
            "Commit [{}] entry {}/{}",
            tool.label(),
            self.history.current_index(),
            self.history.len()
        );
        self.push_history_event();
        let data = self.get_mask_data();
        self.events.push(EditorEvent::MaskChanged(data));
    }

    fn push_history_event(&mut self) {
        self.events.push(EditorEvent::HistoryChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        });
    }
}

fn op_for(erase: bool, style: MaskStyle) -> CompositeOp {
    if erase { CompositeOp::Cut } else { CompositeOp::Replace(style.pixel()) }
}
