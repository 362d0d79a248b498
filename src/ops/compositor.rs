//! Shape rasterisers for the mask compositor.
//!
//! Every shape is first turned into a binary [`Coverage`] (which pixels the
//! shape touches), and the canvas then applies the whole coverage in one
//! pass.  Shapes never overlap themselves in the output because coverage is
//! a set, not an accumulation.
//!
//! A pixel `(x, y)` is covered when its centre `(x + 0.5, y + 0.5)` is inside
//! the shape.

use image::{GrayImage, Luma, Rgba};

use crate::ops::transform::ImagePos;

#[cfg(test)]
#[path = "compositor_test.rs"]
mod compositor_test;

const COVERED: Luma<u8> = Luma([255]);

/// How covered pixels are written into the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOp {
    /// Source-over with an opaque-coverage source: the pixel becomes exactly
    /// this value.
    Replace(Rgba<u8>),
    /// Destination-out: the pixel becomes fully transparent.
    Cut,
}

/// Binary coverage over a sub-rectangle of the image.
#[derive(Clone, Debug)]
pub struct Coverage {
    origin: (u32, u32),
    bits: GrayImage,
}

impl Coverage {
    fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { origin: (x0, y0), bits: GrayImage::new(x1 - x0, y1 - y0) }
    }

    /// Top-left of the covered rectangle in image pixels.
    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    /// 255 where covered, 0 elsewhere.
    pub fn bits(&self) -> &GrayImage {
        &self.bits
    }

    pub fn covered_count(&self) -> usize {
        self.bits.pixels().filter(|p| p[0] != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.pixels().all(|p| p[0] == 0)
    }

    /// Whether image pixel `(x, y)` is covered.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (ox, oy) = self.origin;
        if x < ox || y < oy {
            return false;
        }
        let (lx, ly) = (x - ox, y - oy);
        lx < self.bits.width() && ly < self.bits.height() && self.bits.get_pixel(lx, ly)[0] != 0
    }

    fn set(&mut self, x: u32, y: u32) {
        let (ox, oy) = self.origin;
        self.bits.put_pixel(x - ox, y - oy, COVERED);
    }
}

/// Clamp a float pixel span `[lo, hi)` to `[0, limit]`, as integer bounds.
fn clamp_span(lo: f64, hi: f64, limit: u32) -> Option<(u32, u32)> {
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    let lo = lo.max(0.0).min(limit as f64) as u32;
    let hi = hi.max(0.0).min(limit as f64) as u32;
    (lo < hi).then_some((lo, hi))
}

// ============================================================================
// BOX
// ============================================================================

/// Axis-aligned rectangle in image pixels.  Width/height are never negative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxSelection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxSelection {
    /// Normalised box spanning two opposite corners in any order.
    pub fn from_corners(a: ImagePos, b: ImagePos) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Integer pixel bounds `(x0, y0, x1, y1)` (exclusive end) after clamping
    /// to a `w × h` image.  `None` when nothing of the box survives.
    pub fn clamp_to(&self, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let (x0, x1) = clamp_span(self.x.round(), (self.x + self.width).round(), w)?;
        let (y0, y1) = clamp_span(self.y.round(), (self.y + self.height).round(), h)?;
        Some((x0, y0, x1, y1))
    }
}

pub fn box_coverage(selection: &BoxSelection, w: u32, h: u32) -> Option<Coverage> {
    let (x0, y0, x1, y1) = selection.clamp_to(w, h)?;
    let mut cov = Coverage::new(x0, y0, x1, y1);
    for px in cov.bits.pixels_mut() {
        *px = COVERED;
    }
    Some(cov)
}

// ============================================================================
// STROKE — round caps, round joins
// ============================================================================

/// Squared distance from `p` to the segment `a..b`.
fn dist_sq_to_segment(px: f64, py: f64, a: ImagePos, b: ImagePos) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    (px - cx) * (px - cx) + (py - cy) * (py - cy)
}

/// Coverage of a polyline stroked with `brush_width`.  Needs at least two
/// points and a positive width; `None` also when no pixel centre of the
/// image falls under the stroke.
pub fn stroke_coverage(path: &[ImagePos], brush_width: f64, w: u32, h: u32) -> Option<Coverage> {
    if path.len() < 2 || !brush_width.is_finite() || brush_width <= 0.0 {
        return None;
    }
    let r = brush_width / 2.0;
    let r_sq = r * r;

    let (min_x, max_x) = path.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let (min_y, max_y) = path.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let (x0, x1) = clamp_span((min_x - r).floor(), (max_x + r).ceil() + 1.0, w)?;
    let (y0, y1) = clamp_span((min_y - r).floor(), (max_y + r).ceil() + 1.0, h)?;
    let mut cov = Coverage::new(x0, y0, x1, y1);

    for seg in path.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let Some((sx0, sx1)) = clamp_span((a.x.min(b.x) - r).floor(), (a.x.max(b.x) + r).ceil() + 1.0, w) else {
            continue;
        };
        let Some((sy0, sy1)) = clamp_span((a.y.min(b.y) - r).floor(), (a.y.max(b.y) + r).ceil() + 1.0, h) else {
            continue;
        };
        for y in sy0..sy1 {
            let cy = y as f64 + 0.5;
            for x in sx0..sx1 {
                if dist_sq_to_segment(x as f64 + 0.5, cy, a, b) <= r_sq {
                    cov.set(x, y);
                }
            }
        }
    }
    (!cov.is_empty()).then_some(cov)
}

// ============================================================================
// POLYGON — even-odd scanline fill
// ============================================================================

/// Coverage of a closed polygon (the last vertex joins the first).  Needs at
/// least three vertices; `None` when it encloses no pixel centre.
pub fn polygon_coverage(vertices: &[ImagePos], w: u32, h: u32) -> Option<Coverage> {
    if vertices.len() < 3 {
        return None;
    }
    let (min_x, max_x) = vertices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let (min_y, max_y) = vertices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let (x0, x1) = clamp_span(min_x.floor(), max_x.ceil() + 1.0, w)?;
    let (y0, y1) = clamp_span(min_y.floor(), max_y.ceil() + 1.0, h)?;
    let mut cov = Coverage::new(x0, y0, x1, y1);

    let n = vertices.len();
    let mut nodes: Vec<f64> = Vec::with_capacity(n);
    for y in y0..y1 {
        let yf = y as f64 + 0.5;
        nodes.clear();
        for i in 0..n {
            let (a, b) = (vertices[i], vertices[(i + 1) % n]);
            if (a.y < yf && b.y >= yf) || (b.y < yf && a.y >= yf) {
                let t = (yf - a.y) / (b.y - a.y);
                nodes.push(a.x + t * (b.x - a.x));
            }
        }
        nodes.sort_by(|a, b| a.total_cmp(b));
        for pair in nodes.chunks_exact(2) {
            // Pixel centres in [pair[0], pair[1]).
            let Some((sx0, sx1)) = clamp_span((pair[0] - 0.5).ceil(), (pair[1] - 0.5).ceil(), w) else {
                continue;
            };
            for x in sx0.max(x0)..sx1.min(x1) {
                cov.set(x, y);
            }
        }
    }
    (!cov.is_empty()).then_some(cov)
}
