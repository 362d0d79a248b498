use std::path::PathBuf;

use eframe::egui;
use image::RgbaImage;

use crate::canvas::TiledImage;
use crate::components::colors::MaskColor;
use crate::components::tools::{GestureOverlay, ToolMode};
use crate::editor::{EditorEvent, MaskEditor};
use crate::io::{IMAGE_EXTENSIONS, mask_file_name, save_mask_png};
use crate::ops::transform::{ScreenPos, ViewportPos};
use crate::settings::EditorSettings;

const MASK_TINT: egui::Color32 = egui::Color32::from_rgb(0, 170, 255);
const ERASER_TINT: egui::Color32 = egui::Color32::from_rgb(230, 40, 40);

/// Native window hosting a [`MaskEditor`]: toolbar on top, canvas below.
pub struct MaskApp {
    editor: MaskEditor,
    settings: EditorSettings,
    source_path: Option<PathBuf>,
    background_tex: Option<egui::TextureHandle>,
    mask_tex: Option<egui::TextureHandle>,
    /// Editor revision last uploaded into `mask_tex`.
    mask_revision: Option<u64>,
    /// Pointer button currently held over the canvas.
    dragging: bool,
    hovering: bool,
    /// Opacity slider value; applied to the editor when the drag ends.
    opacity: f32,
    status: String,
}

impl MaskApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, startup_file: Option<PathBuf>) -> Self {
        let settings = EditorSettings::load();
        let mut editor = MaskEditor::new(settings.clone());
        let mut status = "Open an image to start masking".to_string();
        if let Some(path) = startup_file.clone() {
            status = format!("Loading {}…", path.display());
            editor.load_image(path);
        }
        Self {
            opacity: settings.opacity,
            editor,
            settings,
            source_path: startup_file,
            background_tex: None,
            mask_tex: None,
            mask_revision: None,
            dragging: false,
            hovering: false,
            status,
        }
    }

    // ---- file actions ----------------------------------------------------------

    fn open_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new().add_filter("Image", IMAGE_EXTENSIONS).pick_file() {
            self.status = format!("Loading {}…", path.display());
            self.source_path = Some(path.clone());
            self.editor.load_image(path);
        }
    }

    fn save_dialog(&mut self) {
        let Some(encoded) = self.editor.get_mask_data() else {
            self.status = "Nothing to save: no image loaded".to_string();
            return;
        };
        let default_name = match &self.source_path {
            Some(src) => mask_file_name(src),
            None => "mask.png".to_string(),
        };
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(default_name)
            .save_file()
        else {
            return;
        };
        match save_mask_png(&encoded, &path) {
            Ok(()) => {
                crate::log_info!("Saved mask to {}", path.display());
                self.status = format!("Saved {}", path.display());
            }
            Err(e) => {
                crate::log_err!("Saving mask failed: {}", e);
                self.status = format!("Save failed: {}", e);
            }
        }
    }

    fn persist_settings(&mut self) {
        self.settings.brush_size = self.editor.brush_size();
        let style = self.editor.style();
        self.settings.mask_color = style.color;
        self.settings.opacity = style.opacity;
        self.settings.save();
    }

    // ---- events / textures -----------------------------------------------------

    fn drain_events(&mut self, ctx: &egui::Context) {
        for event in self.editor.take_events() {
            match event {
                EditorEvent::ImageLoaded { width, height } => {
                    self.background_tex = self
                        .editor
                        .background()
                        .map(|img| ctx.load_texture("mask_background", to_color_image(img), egui::TextureOptions::LINEAR));
                    self.mask_revision = None;
                    self.status = format!("{}×{}", width, height);
                }
                EditorEvent::LoadFailed(msg) => {
                    self.status = format!("Load failed: {}", msg);
                }
                EditorEvent::ZoomChanged(_)
                | EditorEvent::HistoryChanged { .. }
                | EditorEvent::MaskChanged(_) => {}
            }
        }
    }

    fn sync_mask_texture(&mut self, ctx: &egui::Context) {
        let revision = self.editor.revision();
        if self.mask_revision == Some(revision) {
            return;
        }
        let Some(raster) = self.editor.display_raster() else { return };
        let image = tiled_to_color_image(raster);
        match &mut self.mask_tex {
            Some(tex) => tex.set(image, egui::TextureOptions::NEAREST),
            None => self.mask_tex = Some(ctx.load_texture("mask_raster", image, egui::TextureOptions::NEAREST)),
        }
        self.mask_revision = Some(revision);
    }

    // ---- panels ----------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if ui.button("Open…").clicked() {
                self.open_dialog();
            }
            if ui.add_enabled(self.editor.is_ready(), egui::Button::new("Save mask…")).clicked() {
                self.save_dialog();
            }
            ui.separator();

            let current = self.editor.tool_mode();
            for mode in ToolMode::ALL {
                if mode == ToolMode::Clear {
                    continue;
                }
                if ui.selectable_label(current == mode, mode.label()).clicked() {
                    self.editor.set_tool_mode(mode);
                }
            }
            ui.separator();

            let mut brush = self.editor.brush_size();
            let slider = ui.add(egui::Slider::new(&mut brush, 1.0..=200.0).text("Brush"));
            if slider.changed() {
                self.editor.set_brush_size(brush);
            }
            if slider.drag_released() {
                self.persist_settings();
            }
            let slider = ui.add(egui::Slider::new(&mut self.opacity, 0.0..=1.0).text("Opacity"));
            // Re-opacity commits a history entry, so wait for the drag to end.
            if slider.drag_released() || (slider.changed() && !slider.dragged()) {
                self.editor.set_opacity(self.opacity);
                self.persist_settings();
            }
            for (name, color) in MaskColor::presets() {
                let selected = self.editor.style().color == *color;
                let swatch = egui::Button::new("")
                    .fill(color.to_color32(1.0))
                    .stroke(if selected {
                        egui::Stroke::new(2.0, MASK_TINT)
                    } else {
                        egui::Stroke::new(1.0, egui::Color32::GRAY)
                    })
                    .min_size(egui::vec2(18.0, 18.0));
                if ui.add(swatch).on_hover_text(*name).clicked() && !selected {
                    self.editor.set_mask_color(*color);
                    self.persist_settings();
                }
            }
            ui.separator();

            if ui.add_enabled(self.editor.can_undo(), egui::Button::new("Undo")).clicked() {
                self.editor.undo();
            }
            if ui.add_enabled(self.editor.can_redo(), egui::Button::new("Redo")).clicked() {
                self.editor.redo();
            }
            if ui.add_enabled(self.editor.is_ready(), egui::Button::new("Clear")).clicked() {
                self.editor.clear_mask();
            }
            ui.separator();

            ui.label(format!("{}%", self.editor.zoom_percentage()));
            if ui.button("Reset zoom").clicked() {
                self.editor.reset_zoom();
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        self.editor.set_container_size(rect.width() as f64, rect.height() as f64);

        self.handle_canvas_input(ui.ctx(), rect, &response);
        if response.dragged() && self.editor.tool_mode() == ToolMode::Move {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        }

        if self.editor.on_frame() || self.mask_revision.is_none() {
            self.sync_mask_texture(ui.ctx());
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(32));

        let view = self.editor.view();
        let display = self.editor.display_fit().display_size();
        let to_screen = |p: ViewportPos| {
            let s = view.to_screen(p);
            rect.min + egui::vec2(s.x as f32, s.y as f32)
        };
        let image_rect = egui::Rect::from_min_max(
            to_screen(ViewportPos::new(0.0, 0.0)),
            to_screen(ViewportPos::new(display.width, display.height)),
        );
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

        if let Some(tex) = &self.background_tex {
            painter.image(tex.id(), image_rect, uv, egui::Color32::WHITE);
        }
        if self.editor.is_ready()
            && let Some(tex) = &self.mask_tex
        {
            painter.image(tex.id(), image_rect, uv, egui::Color32::WHITE);
        }

        draw_overlay(&painter, &self.editor.overlay(), view.scale() as f32, to_screen);

        if self.editor.is_loading() {
            painter.text(rect.center(), egui::Align2::CENTER_CENTER, "Loading…", egui::FontId::proportional(18.0), egui::Color32::WHITE);
            ui.ctx().request_repaint();
        }
    }

    fn handle_canvas_input(&mut self, ctx: &egui::Context, rect: egui::Rect, response: &egui::Response) {
        let local = |p: egui::Pos2| ScreenPos::from(p - rect.min.to_vec2());
        let (hover, pressed, released, scroll) = ctx.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.scroll_delta.y,
            )
        });

        let inside = hover.filter(|p| rect.contains(*p));
        match inside {
            Some(pos) => {
                self.hovering = true;
                if pressed && response.hovered() {
                    self.dragging = true;
                    self.editor.on_pointer_down(local(pos));
                } else {
                    self.editor.on_pointer_move(local(pos));
                }
                if scroll.abs() > 0.1 {
                    // egui reports scroll-up as positive; the editor zooms out on positive.
                    self.editor.on_wheel(local(pos), -scroll as f64);
                }
            }
            None => {
                if self.dragging && let Some(pos) = hover {
                    self.editor.on_pointer_move(local(pos));
                }
                if self.hovering {
                    self.hovering = false;
                    self.editor.on_pointer_leave();
                }
            }
        }

        if released && self.dragging {
            self.dragging = false;
            let at = hover.or(response.interact_pointer_pos()).unwrap_or(rect.center());
            self.editor.on_pointer_up(local(at));
        }
    }

    /// Clickable history list, oldest first.  Clicking an entry reverts the
    /// mask to it.
    fn history_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("History");
        ui.separator();
        let history = self.editor.history();
        let items = history.undo_history();
        let current = history.current_index();
        let mut revert_to: Option<usize> = None;

        egui::ScrollArea::vertical().show(ui, |ui| {
            if items.is_empty() {
                ui.weak("No history yet");
                return;
            }
            for (i, desc) in items.iter().enumerate() {
                let text = if i == current {
                    egui::RichText::new(*desc).strong().size(11.0)
                } else if i > current {
                    egui::RichText::new(*desc).weak().italics().size(11.0)
                } else {
                    egui::RichText::new(*desc).size(11.0)
                };
                let response = ui.add(egui::Label::new(text).sense(egui::Sense::click()));
                if response.clicked() && i != current {
                    revert_to = Some(i);
                }
                if i != current {
                    response.on_hover_text("Click to revert to this state");
                }
            }
        });

        if let Some(index) = revert_to {
            self.editor.jump_to_history(index);
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (undo, redo, open, save) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            (
                cmd && !i.modifiers.shift && i.key_pressed(egui::Key::Z),
                cmd && (i.key_pressed(egui::Key::Y) || (i.modifiers.shift && i.key_pressed(egui::Key::Z))),
                cmd && i.key_pressed(egui::Key::O),
                cmd && i.key_pressed(egui::Key::S),
            )
        });
        if undo {
            self.editor.undo();
        }
        if redo {
            self.editor.redo();
        }
        if open {
            self.open_dialog();
        }
        if save {
            self.save_dialog();
        }
    }
}

impl eframe::App for MaskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let title = match &self.source_path {
            Some(p) => format!("MaskFE - {}", p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()),
            None => "MaskFE".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status_bar").exact_height(22.0).show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status.as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!("History {}/{}", self.editor.history().current_index() + 1, self.editor.history().len()));
                });
            });
        });
        egui::SidePanel::right("history")
            .resizable(false)
            .default_width(150.0)
            .show(ctx, |ui| self.history_panel(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.canvas(ui));

        self.drain_events(ctx);
    }
}

fn draw_overlay(
    painter: &egui::Painter,
    overlay: &GestureOverlay,
    scale: f32,
    to_screen: impl Fn(ViewportPos) -> egui::Pos2,
) {
    let tint = if overlay.eraser { ERASER_TINT } else { MASK_TINT };
    let stroke = egui::Stroke::new(1.5, tint);

    if let Some(cursor) = overlay.brush_cursor {
        painter.circle_stroke(to_screen(cursor.center), cursor.radius as f32 * scale, stroke);
    }
    if let Some((a, b)) = overlay.box_outline {
        let r = egui::Rect::from_two_pos(to_screen(a), to_screen(b));
        painter.rect_filled(r, 0.0, tint.gamma_multiply(0.15));
        painter.rect_stroke(r, 0.0, stroke);
    }
    if let Some(poly) = &overlay.polygon {
        let mut points: Vec<egui::Pos2> = poly.vertices.iter().map(|v| to_screen(*v)).collect();
        if let Some(h) = poly.hover {
            points.push(to_screen(h));
        }
        for pair in points.windows(2) {
            painter.line_segment([pair[0], pair[1]], stroke);
        }
        for (i, v) in poly.vertices.iter().enumerate() {
            let r = if i == 0 && poly.can_close { 6.0 } else { 3.0 };
            painter.circle_filled(to_screen(*v), r, tint);
        }
    }
}

fn to_color_image(img: &RgbaImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied([img.width() as usize, img.height() as usize], img.as_raw())
}

fn tiled_to_color_image(raster: &TiledImage) -> egui::ColorImage {
    to_color_image(&raster.to_rgba_image())
}
