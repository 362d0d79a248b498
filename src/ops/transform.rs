//! Coordinate pipeline: screen → viewport → image pixels.
//!
//! Three coordinate spaces are in play and each has its own point type so
//! they cannot be mixed by accident:
//!
//! * [`ScreenPos`] — pointer position relative to the widget's top-left, in
//!   display pixels.
//! * [`ViewportPos`] — screen position with pan/zoom removed.  The image
//!   occupies `(0, 0)..(display_w, display_h)` here.
//! * [`ImagePos`] — position in the background image's native pixels; the
//!   only space the mask raster accepts.
//!
//! Everything here is a pure function of its inputs.  Zoom/pan operations
//! take a [`ViewTransform`] by value and return the new one.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

/// Never zoom out below native fit.
pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 10.0;

/// A point in screen space (pointer coordinates relative to the widget).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

/// A point in viewport space (pan/zoom removed, display-fit scale kept).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportPos {
    pub x: f64,
    pub y: f64,
}

/// A point in image-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImagePos {
    pub x: f64,
    pub y: f64,
}

impl ScreenPos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl ViewportPos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: ViewportPos) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl ImagePos {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<egui::Pos2> for ScreenPos {
    fn from(p: egui::Pos2) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

/// Width/height pair used for container, display and image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(f64::from(width), f64::from(height))
    }

    fn is_usable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

// ============================================================================
// VIEW TRANSFORM — pan/zoom
// ============================================================================

/// Pan/zoom state.  `offset` is where the viewport origin lands on screen;
/// `scale` is always inside `[MIN_SCALE, MAX_SCALE]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f64,
    offset: ScreenPos,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { scale: 1.0, offset: ScreenPos::default() }
    }
}

/// Clamp a requested scale into the legal range.  Non-finite input falls
/// back to 1.0 so the transform stays invertible.
#[must_use]
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_finite() { scale.clamp(MIN_SCALE, MAX_SCALE) } else { MIN_SCALE }
}

impl ViewTransform {
    #[must_use]
    pub fn new(scale: f64, offset: ScreenPos) -> Self {
        Self { scale: clamp_scale(scale), offset }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> ScreenPos {
        self.offset
    }

    /// Zoom level as an integer percentage (100 = native fit).
    pub fn percentage(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    /// `(screen - offset) / scale`
    #[must_use]
    pub fn to_viewport(&self, p: ScreenPos) -> ViewportPos {
        to_viewport(p, self)
    }

    #[must_use]
    pub fn to_screen(&self, p: ViewportPos) -> ScreenPos {
        ScreenPos::new(p.x * self.scale + self.offset.x, p.y * self.scale + self.offset.y)
    }

    /// Set the scale, keeping the viewport point under `anchor` fixed on screen.
    #[must_use]
    pub fn zoomed_about(self, scale: f64, anchor: ScreenPos) -> Self {
        let scale = clamp_scale(scale);
        let pinned = self.to_viewport(anchor);
        Self {
            scale,
            offset: ScreenPos::new(anchor.x - pinned.x * scale, anchor.y - pinned.y * scale),
        }
    }

    /// One wheel notch: positive `delta_y` (scroll down) zooms out by `step`,
    /// anything else zooms in by `step`.
    #[must_use]
    pub fn wheel_zoomed(self, delta_y: f64, step: f64, anchor: ScreenPos) -> Self {
        let factor = if delta_y > 0.0 { 1.0 - step } else { 1.0 + step };
        self.zoomed_about(self.scale * factor, anchor)
    }

    /// Programmatic zoom to `percentage`, anchored at `center` (the middle of
    /// the visible container).
    #[must_use]
    pub fn zoomed_to_percentage(self, percentage: f64, center: ScreenPos) -> Self {
        self.zoomed_about(percentage / 100.0, center)
    }

    /// Drag-pan by a screen-space delta.
    #[must_use]
    pub fn panned(self, dx: f64, dy: f64) -> Self {
        Self {
            scale: self.scale,
            offset: ScreenPos::new(self.offset.x + dx, self.offset.y + dy),
        }
    }
}

/// `(screen - offset) / scale`
#[must_use]
pub fn to_viewport(p: ScreenPos, view: &ViewTransform) -> ViewportPos {
    ViewportPos::new((p.x - view.offset.x) / view.scale, (p.y - view.offset.y) / view.scale)
}

/// Scale a viewport point by the ratio of native image size to on-screen
/// display size.
#[must_use]
pub fn to_image_pixels(p: ViewportPos, display: Size, image: Size) -> ImagePos {
    if !display.is_usable() || !image.is_usable() {
        return ImagePos::new(p.x, p.y);
    }
    ImagePos::new(p.x * image.width / display.width, p.y * image.height / display.height)
}

// ============================================================================
// DISPLAY FIT — image fitted into the host container
// ============================================================================

/// On-screen size of the image at scale 1: the image fitted into the
/// container with its aspect ratio preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFit {
    image: Size,
    display: Size,
}

impl DisplayFit {
    /// Fit `image_w × image_h` into `container`.  When the image is wider
    /// (relative to its height) than the container, width is pinned to the
    /// container width; otherwise height is pinned.  An unusable container
    /// (zero/negative/non-finite) shows the image at native size.
    #[must_use]
    pub fn fit(image_w: u32, image_h: u32, container: Size) -> Self {
        let image = Size::from_pixels(image_w, image_h);
        if !image.is_usable() || !container.is_usable() {
            return Self { image, display: image };
        }
        let image_aspect = image.width / image.height;
        let container_aspect = container.width / container.height;
        let display = if image_aspect > container_aspect {
            Size::new(container.width, container.width / image_aspect)
        } else {
            Size::new(container.height * image_aspect, container.height)
        };
        Self { image, display }
    }

    /// Native size, used when no container has been measured.
    #[must_use]
    pub fn native(image_w: u32, image_h: u32) -> Self {
        let image = Size::from_pixels(image_w, image_h);
        Self { image, display: image }
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    pub fn display_size(&self) -> Size {
        self.display
    }

    #[must_use]
    pub fn to_image(&self, p: ViewportPos) -> ImagePos {
        to_image_pixels(p, self.display, self.image)
    }

    #[must_use]
    pub fn to_viewport(&self, p: ImagePos) -> ViewportPos {
        if !self.display.is_usable() || !self.image.is_usable() {
            return ViewportPos::new(p.x, p.y);
        }
        ViewportPos::new(
            p.x * self.display.width / self.image.width,
            p.y * self.display.height / self.image.height,
        )
    }

    /// How many image pixels one viewport unit spans (horizontal axis; the
    /// fit preserves aspect so both axes agree).
    pub fn image_per_viewport(&self) -> f64 {
        if self.display.is_usable() { self.image.width / self.display.width } else { 1.0 }
    }
}

/// Full pipeline for a pointer event.
#[must_use]
pub fn screen_to_image(p: ScreenPos, view: &ViewTransform, fit: &DisplayFit) -> ImagePos {
    fit.to_image(view.to_viewport(p))
}
