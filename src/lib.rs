//! MaskFE — raster mask painting engine.
//!
//! A user views a background image and paints or erases a semi-transparent
//! mask on top of it (freehand strokes, boxes, polygons), with pan/zoom,
//! linear undo/redo and export to a binary black/white mask image.
//!
//! The engine is display-agnostic: [`editor::MaskEditor`] consumes pointer
//! and control events and emits [`editor::EditorEvent`]s; the bundled egui
//! host in `app` is one possible display backend.
//!
//! | Module | Role |
//! |--------|------|
//! | [`canvas`] | Tiled pixel storage and the mask raster store |
//! | [`ops::transform`] | Screen / viewport / image coordinate pipeline |
//! | [`ops::compositor`] | Stroke, box and polygon rasterizers |
//! | [`ops::export`] | Binary mask export |
//! | [`components::history`] | Linear undo/redo over mask snapshots |
//! | [`components::tools`] | Tool modes and gesture state |
//! | [`editor`] | Edit session state machine and control surface |
//! | [`io`] | Image loading and mask file output |

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod io;
pub mod logger;
pub mod ops;
pub mod settings;

pub use canvas::{MaskCanvas, MaskSnapshot, MaskStyle, TiledImage};
pub use components::colors::MaskColor;
pub use components::tools::ToolMode;
pub use editor::{EditorEvent, MaskEditor};
pub use io::MaskError;
pub use ops::export::EncodedMask;
pub use ops::transform::{ImagePos, ScreenPos, ViewTransform, ViewportPos};
