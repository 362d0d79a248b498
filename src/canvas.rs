use std::sync::Arc;

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::components::colors::MaskColor;
use crate::ops::compositor::{self, BoxSelection, CompositeOp, Coverage};
use crate::ops::transform::ImagePos;

#[cfg(test)]
#[path = "canvas_test.rs"]
mod canvas_test;

// ============================================================================
// TILED IMAGE – sparse 64×64 chunk storage (Vec-indexed for speed)
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// A pixel with zero alpha, returned by reference for missing chunks.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Sparse tiled image backed by a flat `Vec<Option<Arc<RgbaImage>>>`.
/// Chunk coordinates are mapped to a flat index via `cy * chunks_per_row + cx`,
/// giving O(1) access with zero hashing overhead.
///
/// Chunks are wrapped in `Arc` for copy-on-write semantics: `clone()` only
/// bumps reference counts, and mutations use `Arc::make_mut` to COW-clone only
/// the touched chunk.  History snapshots and the scratch buffer are plain
/// clones of the mask and share every untouched chunk with it.
#[derive(Clone)]
pub struct TiledImage {
    width: u32,
    height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl TiledImage {
    // ---- construction -------------------------------------------------------

    /// Create an empty (fully transparent) tiled image.
    pub fn new(width: u32, height: u32) -> Self {
        // Images are rejected by io::check_dimensions before they get here;
        // this only keeps the chunk math from overflowing.
        let (width, height) = {
            let total = (width as u64) * (height as u64);
            if total > crate::io::MAX_IMAGE_PIXELS || width == 0 || height == 0 {
                crate::log_warn!("TiledImage::new: dimensions {}×{} out of range, clamped to 1×1", width, height);
                (1, 1)
            } else {
                (width, height)
            }
        };
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        let total = (chunks_per_row * chunks_per_col) as usize;
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; total],
        }
    }

    /// Flatten back to a contiguous `RgbaImage`.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        let out_stride = self.width as usize * 4;
        let out_raw: &mut [u8] = &mut out;
        for (cx, cy) in self.chunk_keys() {
            if let Some(chunk) = self.get_chunk(cx, cy) {
                let base_x = cx * CHUNK_SIZE;
                let base_y = cy * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(self.width - base_x) as usize;
                let ch = CHUNK_SIZE.min(self.height - base_y) as usize;
                let chunk_raw = chunk.as_raw();
                let chunk_stride = CHUNK_SIZE as usize * 4;
                for ly in 0..ch {
                    let src_start = ly * chunk_stride;
                    let dst_start = (base_y as usize + ly) * out_stride + base_x as usize * 4;
                    out_raw[dst_start..dst_start + cw * 4]
                        .copy_from_slice(&chunk_raw[src_start..src_start + cw * 4]);
                }
            }
        }
        out
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.chunks_per_row + cx) as usize
    }

    #[inline(always)]
    fn chunk_coord(x: u32, y: u32) -> (u32, u32) { (x / CHUNK_SIZE, y / CHUNK_SIZE) }

    #[inline(always)]
    fn local(x: u32, y: u32) -> (u32, u32) { (x % CHUNK_SIZE, y % CHUNK_SIZE) }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel (returns `&TRANSPARENT_PIXEL` for missing chunks).
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        if x >= self.width || y >= self.height { return &TRANSPARENT_PIXEL; }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        self.chunks[idx].as_ref()
            .map(|c| c.get_pixel(lx, ly))
            .unwrap_or(&TRANSPARENT_PIXEL)
    }

    /// Write a pixel (creates the chunk on demand, COW-clones if shared).
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height { return; }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
    }

    /// Zero a pixel.  Missing chunks are already transparent and stay missing.
    #[inline]
    pub fn clear_pixel(&mut self, x: u32, y: u32) {
        if x >= self.width || y >= self.height { return; }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        if let Some(arc) = self.chunks[idx].as_mut()
            && arc.get_pixel(lx, ly)[3] != 0
        {
            Arc::make_mut(arc).put_pixel(lx, ly, TRANSPARENT_PIXEL);
        }
    }

    /// Read-only access to a chunk (if it exists).
    pub fn get_chunk(&self, cx: u32, cy: u32) -> Option<&RgbaImage> {
        let idx = self.flat_index(cx, cy);
        self.chunks.get(idx).and_then(|c| c.as_deref())
    }

    /// Iterator over populated chunk coordinates.
    pub fn chunk_keys(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let cpr = self.chunks_per_row;
        self.chunks.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref().map(|_| ((i as u32) % cpr, (i as u32) / cpr))
        })
    }

    /// Number of populated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    // ---- bulk operations ----------------------------------------------------

    /// Drop all chunks (make the image fully transparent).
    pub fn clear(&mut self) {
        for slot in &mut self.chunks {
            *slot = None;
        }
    }

    /// Rewrite every pixel with `alpha > 0` through `f`, in parallel across
    /// chunks.  Chunks whose masked pixels already satisfy `f` are left shared.
    pub fn map_masked_pixels<F>(&mut self, f: F)
    where
        F: Fn(Rgba<u8>) -> Rgba<u8> + Sync,
    {
        self.chunks.par_iter_mut().for_each(|slot| {
            let Some(arc) = slot.as_mut() else { return };
            let needs_update = arc.pixels().any(|px| px[3] != 0 && f(*px) != *px);
            if !needs_update {
                return;
            }
            for px in Arc::make_mut(arc).pixels_mut() {
                if px[3] != 0 {
                    *px = f(*px);
                }
            }
        });
    }

    /// True when no pixel has `alpha > 0`.
    pub fn is_blank(&self) -> bool {
        self.chunks
            .par_iter()
            .filter_map(|slot| slot.as_ref())
            .all(|chunk| chunk.pixels().all(|px| px[3] == 0))
    }

    /// Pixel-for-pixel comparison (chunk layout may differ).
    pub fn same_pixels(&self, other: &TiledImage) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }
        self.chunks.iter().zip(other.chunks.iter()).all(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a.as_raw() == b.as_raw(),
            (Some(c), None) | (None, Some(c)) => c.pixels().all(|px| px[3] == 0),
            (None, None) => true,
        })
    }

    /// Width accessor (matches `RgbaImage::width()`).
    pub fn width(&self) -> u32 { self.width }

    /// Height accessor (matches `RgbaImage::height()`).
    pub fn height(&self) -> u32 { self.height }

    /// Bytes held by populated chunks that `other` does not share by pointer.
    /// This is what keeping `self` alive costs on top of `other`.
    pub fn unshared_bytes(&self, other: &TiledImage) -> usize {
        let chunk_byte_size = (CHUNK_SIZE * CHUNK_SIZE * 4) as usize;
        self.chunks
            .iter()
            .enumerate()
            .filter(|(i, slot)| match (slot, other.chunks.get(*i)) {
                (Some(a), Some(Some(b))) => !Arc::ptr_eq(a, b),
                (Some(_), _) => true,
                (None, _) => false,
            })
            .count()
            * chunk_byte_size
    }
}

// ============================================================================
// MASK STYLE — live colour/opacity applied uniformly to every masked pixel
// ============================================================================

/// Lowest alpha a masked pixel may carry, so masked regions stay
/// distinguishable from the transparent background at any opacity.
pub const MIN_MASK_ALPHA: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskStyle {
    pub color: MaskColor,
    /// 0.0..=1.0
    pub opacity: f32,
}

impl Default for MaskStyle {
    fn default() -> Self {
        Self { color: MaskColor::BLACK, opacity: 0.5 }
    }
}

impl MaskStyle {
    pub fn new(color: MaskColor, opacity: f32) -> Self {
        Self { color, opacity: sanitize_opacity(opacity) }
    }

    /// `max(1, round(opacity * 255))`
    #[inline]
    pub fn alpha(&self) -> u8 {
        let a = (sanitize_opacity(self.opacity) * 255.0).round() as u8;
        a.max(MIN_MASK_ALPHA)
    }

    /// The value every masked pixel carries under this style.
    #[inline]
    pub fn pixel(&self) -> Rgba<u8> {
        self.color.with_alpha(self.alpha())
    }
}

fn sanitize_opacity(opacity: f32) -> f32 {
    if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 }
}

// ============================================================================
// MASK CANVAS — authoritative mask bitmap + scratch buffer
// ============================================================================

/// Opaque copy of the mask taken for the history stack.  Stores shape only;
/// colour and opacity are re-applied from the live style on restore.
#[derive(Clone)]
pub struct MaskSnapshot {
    pixels: TiledImage,
}

impl MaskSnapshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Memory this snapshot adds on top of `previous` (chunks it shares
    /// with `previous` are free).
    pub fn unshared_bytes(&self, previous: &MaskSnapshot) -> usize {
        self.pixels.unshared_bytes(&previous.pixels)
    }

    /// Upper bound when there is no previous snapshot to share with.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.chunk_count() * (CHUNK_SIZE * CHUNK_SIZE * 4) as usize
    }
}

/// The mask raster store.  Sized to the background image's native pixel
/// dimensions; owns the committed mask and a scratch buffer used for
/// compositing and for previewing in-progress gestures.
///
/// Every paint/erase goes through the scratch buffer first: it starts as a
/// copy of the mask, receives the whole shape's coverage in one pass, then
/// becomes the new mask.  Coverage is binary, so a stroke crossing itself
/// never writes an alpha other than the style's.
///
/// The canvas holds no style of its own.  Callers pass the live
/// [`MaskStyle`] to every operation that writes colour or alpha.
pub struct MaskCanvas {
    width: u32,
    height: u32,
    mask: TiledImage,
    scratch: TiledImage,
}

impl MaskCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mask = TiledImage::new(width, height);
        Self {
            width: mask.width(),
            height: mask.height(),
            scratch: mask.clone(),
            mask,
        }
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }

    /// The committed mask.
    pub fn mask(&self) -> &TiledImage {
        &self.mask
    }

    /// What the display should show: the committed mask plus any preview
    /// composited by [`MaskCanvas::preview`].
    pub fn display(&self) -> &TiledImage {
        &self.scratch
    }

    // ---- compositing ----------------------------------------------------------

    /// Composite `coverage` onto a scratch copy of the mask and commit it.
    pub fn composite(&mut self, coverage: &Coverage, op: CompositeOp) {
        self.scratch = self.mask.clone();
        apply_coverage(&mut self.scratch, coverage, op);
        self.mask = self.scratch.clone();
    }

    /// Show `coverage` on the scratch buffer without touching the mask.
    pub fn preview(&mut self, coverage: Option<&Coverage>, op: CompositeOp) {
        self.scratch = self.mask.clone();
        if let Some(cov) = coverage {
            apply_coverage(&mut self.scratch, cov, op);
        }
    }

    /// Drop any preview so the scratch buffer mirrors the mask again.
    pub fn discard_preview(&mut self) {
        self.scratch = self.mask.clone();
    }

    /// Round-capped, round-joined polyline in the given style.
    /// Returns `false` (and changes nothing) for fewer than two points or a
    /// path that covers no pixel of the image.
    pub fn paint_stroke(&mut self, path: &[ImagePos], brush_width: f64, style: MaskStyle) -> bool {
        let Some(cov) = compositor::stroke_coverage(path, brush_width, self.width, self.height) else {
            return false;
        };
        self.composite(&cov, CompositeOp::Replace(style.pixel()));
        true
    }

    /// Cut a hole along the polyline regardless of colour.
    pub fn erase_stroke(&mut self, path: &[ImagePos], brush_width: f64) -> bool {
        let Some(cov) = compositor::stroke_coverage(path, brush_width, self.width, self.height) else {
            return false;
        };
        self.composite(&cov, CompositeOp::Cut);
        true
    }

    /// Fill an axis-aligned box (clamped to the image).  Zero-area boxes are
    /// rejected.
    pub fn paint_box(&mut self, selection: &BoxSelection, style: MaskStyle) -> bool {
        let Some(cov) = compositor::box_coverage(selection, self.width, self.height) else {
            return false;
        };
        self.composite(&cov, CompositeOp::Replace(style.pixel()));
        true
    }

    pub fn erase_box(&mut self, selection: &BoxSelection) -> bool {
        let Some(cov) = compositor::box_coverage(selection, self.width, self.height) else {
            return false;
        };
        self.composite(&cov, CompositeOp::Cut);
        true
    }

    /// Fill a closed polygon (even-odd).  Needs at least three vertices
    /// enclosing at least one pixel centre.
    pub fn paint_polygon(&mut self, vertices: &[ImagePos], style: MaskStyle) -> bool {
        if vertices.len() < 3 {
            return false;
        }
        let Some(cov) = compositor::polygon_coverage(vertices, self.width, self.height) else {
            return false;
        };
        self.composite(&cov, CompositeOp::Replace(style.pixel()));
        true
    }

    // ---- whole-buffer rewrites -------------------------------------------------

    /// New RGB for every masked pixel; alpha preserved.
    pub fn recolor(&mut self, color: MaskColor) {
        self.mask.map_masked_pixels(|px| color.with_alpha(px[3]));
        self.scratch = self.mask.clone();
    }

    /// Every masked pixel becomes `style.pixel()`: the style's colour with
    /// alpha `max(1, round(opacity*255))`.
    pub fn reopacity(&mut self, style: MaskStyle) {
        self.apply_style(style);
    }

    /// Every pixel back to fully transparent.
    pub fn clear(&mut self) {
        self.mask.clear();
        self.scratch = self.mask.clone();
    }

    fn apply_style(&mut self, style: MaskStyle) {
        let target = style.pixel();
        self.mask.map_masked_pixels(|_| target);
        self.scratch = self.mask.clone();
    }

    // ---- history ---------------------------------------------------------------

    pub fn snapshot(&self) -> MaskSnapshot {
        MaskSnapshot { pixels: self.mask.clone() }
    }

    /// Replace the mask with `snapshot` and re-apply the live `style` to it.
    /// Snapshots from a different image size are ignored.
    pub fn restore(&mut self, snapshot: &MaskSnapshot, style: MaskStyle) {
        if snapshot.width() != self.width || snapshot.height() != self.height {
            crate::log_warn!(
                "MaskCanvas::restore: snapshot {}×{} does not match mask {}×{}",
                snapshot.width(), snapshot.height(), self.width, self.height
            );
            return;
        }
        self.mask = snapshot.pixels.clone();
        self.apply_style(style);
    }
}

/// Write `coverage` into `target` with the given composite rule.
fn apply_coverage(target: &mut TiledImage, coverage: &Coverage, op: CompositeOp) {
    let (ox, oy) = coverage.origin();
    let bits: &GrayImage = coverage.bits();
    for (lx, ly, v) in bits.enumerate_pixels() {
        if v[0] == 0 {
            continue;
        }
        let (x, y) = (ox + lx, oy + ly);
        match op {
            CompositeOp::Replace(px) => target.put_pixel(x, y, px),
            CompositeOp::Cut => target.clear_pixel(x, y),
        }
    }
}
