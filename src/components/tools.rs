use std::fmt;
use std::str::FromStr;

use crate::canvas::MaskStyle;
use crate::ops::transform::{ImagePos, ScreenPos, ViewportPos};

#[cfg(test)]
#[path = "tools_test.rs"]
mod tools_test;

// ============================================================================
// TOOL MODE
// ============================================================================

/// Exactly one tool is active at a time.  The mode decides which gesture a
/// pointer-down starts; the gesture then runs to completion on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ToolMode {
    #[default]
    Move,
    MaskFreehand,
    MaskBox,
    MaskPolygon,
    EraserFreehand,
    EraserBox,
    Clear,
}

/// Which gesture handler a tool drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureKind {
    Pan,
    Freehand { erase: bool },
    Box { erase: bool },
    Polygon,
    Clear,
}

impl ToolMode {
    pub const ALL: [ToolMode; 7] = [
        ToolMode::Move,
        ToolMode::MaskFreehand,
        ToolMode::MaskBox,
        ToolMode::MaskPolygon,
        ToolMode::EraserFreehand,
        ToolMode::EraserBox,
        ToolMode::Clear,
    ];

    /// Wire name (`mask-freehand`, `eraser-box`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ToolMode::Move => "move",
            ToolMode::MaskFreehand => "mask-freehand",
            ToolMode::MaskBox => "mask-box",
            ToolMode::MaskPolygon => "mask-polygon",
            ToolMode::EraserFreehand => "eraser-freehand",
            ToolMode::EraserBox => "eraser-box",
            ToolMode::Clear => "clear",
        }
    }

    /// Toolbar / history label.
    pub fn label(self) -> &'static str {
        match self {
            ToolMode::Move => "Move",
            ToolMode::MaskFreehand => "Brush",
            ToolMode::MaskBox => "Box",
            ToolMode::MaskPolygon => "Polygon",
            ToolMode::EraserFreehand => "Eraser",
            ToolMode::EraserBox => "Erase Box",
            ToolMode::Clear => "Clear",
        }
    }

    pub fn is_eraser(self) -> bool {
        matches!(self, ToolMode::EraserFreehand | ToolMode::EraserBox)
    }

    /// Freehand tools show a brush-sized cursor.
    pub fn shows_brush_cursor(self) -> bool {
        matches!(self, ToolMode::MaskFreehand | ToolMode::EraserFreehand)
    }

    pub fn gesture(self) -> GestureKind {
        match self {
            ToolMode::Move => GestureKind::Pan,
            ToolMode::MaskFreehand => GestureKind::Freehand { erase: false },
            ToolMode::EraserFreehand => GestureKind::Freehand { erase: true },
            ToolMode::MaskBox => GestureKind::Box { erase: false },
            ToolMode::EraserBox => GestureKind::Box { erase: true },
            ToolMode::MaskPolygon => GestureKind::Polygon,
            ToolMode::Clear => GestureKind::Clear,
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ToolMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tool mode '{}'", s))
    }
}

// ============================================================================
// TOOL PROPERTIES — live settings shared by all tools
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolProperties {
    /// Brush diameter in image pixels.
    pub brush_size: f64,
    pub style: MaskStyle,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self { brush_size: 10.0, style: MaskStyle::default() }
    }
}

impl ToolProperties {
    /// Brush sizes below one pixel would paint nothing.
    pub fn set_brush_size(&mut self, px: f64) {
        if px.is_finite() {
            self.brush_size = px.max(1.0);
        }
    }
}

// ============================================================================
// GESTURE STATE — one in-progress interaction
// ============================================================================

/// In-progress gesture.  Freehand and box points are stored in image space
/// (converted with the transform current at each event); polygon vertices
/// stay in viewport space so the close test runs in the space the user sees.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Panning {
        last: ScreenPos,
    },
    Stroking {
        erase: bool,
        points: Vec<ImagePos>,
    },
    Boxing {
        erase: bool,
        anchor: ImagePos,
        current: ImagePos,
    },
    PolygonCollecting {
        vertices: Vec<ViewportPos>,
    },
}

impl GestureState {
    pub fn name(&self) -> &'static str {
        match self {
            GestureState::Idle => "idle",
            GestureState::Panning { .. } => "panning",
            GestureState::Stroking { .. } => "stroking",
            GestureState::Boxing { .. } => "boxing",
            GestureState::PolygonCollecting { .. } => "polygon-collecting",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }
}

// ============================================================================
// GESTURE OVERLAY — vector decorations the host draws over the raster
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushCursor {
    pub center: ViewportPos,
    /// In viewport units.
    pub radius: f64,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct PolygonOverlay {
    pub vertices: Vec<ViewportPos>,
    /// Rubber-band end following the pointer.
    pub hover: Option<ViewportPos>,
    /// Pointer is close enough to the first vertex to close the polygon.
    pub can_close: bool,
}

/// Everything besides the raster that a host needs to draw the current
/// gesture.  All geometry is in viewport space.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct GestureOverlay {
    pub brush_cursor: Option<BrushCursor>,
    /// Box outline corners while boxing.
    pub box_outline: Option<(ViewportPos, ViewportPos)>,
    pub polygon: Option<PolygonOverlay>,
    /// Draw decorations with the eraser tint.
    pub eraser: bool,
}

impl GestureOverlay {
    pub fn is_empty(&self) -> bool {
        self.brush_cursor.is_none() && self.box_outline.is_none() && self.polygon.is_none()
    }
}
