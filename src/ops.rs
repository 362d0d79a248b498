//! Pure raster operations: coordinate pipeline, shape coverage and export.

pub mod compositor;
pub mod export;
pub mod transform;
