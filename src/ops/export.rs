use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{CHUNK_SIZE, TiledImage};
use crate::io::MaskError;

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

const MASKED: Rgba<u8> = Rgba([255, 255, 255, 255]);
const UNMASKED: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Binary view of the mask at native resolution: opaque white wherever the
/// mask has any alpha, opaque black everywhere else.  Mask colour and
/// opacity play no part.
pub fn export_binary(mask: &TiledImage) -> RgbaImage {
    let (w, h) = (mask.width(), mask.height());
    let mut out = RgbaImage::from_pixel(w, h, UNMASKED);
    let stride = w as usize * 4;

    // One band of rows per chunk row; bands are disjoint so they go in parallel.
    let band = stride * CHUNK_SIZE as usize;
    let raw: &mut [u8] = &mut out;
    raw.par_chunks_mut(band).enumerate().for_each(|(cy, rows)| {
        let band_h = rows.len() / stride;
        for cx in 0..w.div_ceil(CHUNK_SIZE) {
            let Some(chunk) = mask.get_chunk(cx, cy as u32) else { continue };
            let base_x = cx * CHUNK_SIZE;
            let cw = CHUNK_SIZE.min(w - base_x);
            for ly in 0..band_h as u32 {
                for lx in 0..cw {
                    if chunk.get_pixel(lx, ly)[3] != 0 {
                        let i = ly as usize * stride + (base_x + lx) as usize * 4;
                        rows[i..i + 4].copy_from_slice(&MASKED.0);
                    }
                }
            }
        }
    });
    out
}

// ============================================================================
// ENCODED MASK — what `get_mask_data` hands to the host
// ============================================================================

/// A PNG-encoded binary mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedMask {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl EncodedMask {
    pub fn encode(mask: &TiledImage) -> Result<Self, MaskError> {
        let binary = export_binary(mask);
        let mut png = Vec::new();
        let encoder = PngEncoder::new(&mut png);
        #[allow(deprecated)]
        encoder.encode(
            binary.as_raw(),
            binary.width(),
            binary.height(),
            image::ColorType::Rgba8,
        )?;
        Ok(Self { width: binary.width(), height: binary.height(), png })
    }

    /// `data:image/png;base64,...` for hosts that want a URL.
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&self.png))
    }

    /// Decode back to pixels.
    pub fn to_image(&self) -> Result<RgbaImage, MaskError> {
        Ok(image::load_from_memory(&self.png)?.to_rgba8())
    }
}
