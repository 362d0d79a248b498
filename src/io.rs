use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use image::{ImageError, RgbaImage};

use crate::ops::export::EncodedMask;

#[cfg(test)]
#[path = "io_test.rs"]
mod io_test;

/// Extensions offered by the open dialog (decoders compiled into `image`).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

// ============================================================================
// ERRORS
// ============================================================================

/// Everything that can go wrong at the I/O boundary.  The editing core never
/// produces one of these; it absorbs bad input and reports `bool`/`Option`.
#[derive(Debug)]
pub enum MaskError {
    Io(std::io::Error),
    Decode(String),
    Encode(String),
    InvalidColor(String),
    InvalidScript { line: usize, message: String },
}

impl std::fmt::Display for MaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskError::Io(e) => write!(f, "I/O error: {}", e),
            MaskError::Decode(e) => write!(f, "Decode error: {}", e),
            MaskError::Encode(e) => write!(f, "Encode error: {}", e),
            MaskError::InvalidColor(s) => write!(f, "Invalid color: '{}'", s),
            MaskError::InvalidScript { line, message } => {
                write!(f, "Script error on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for MaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaskError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MaskError {
    fn from(e: std::io::Error) -> Self {
        MaskError::Io(e)
    }
}

impl From<ImageError> for MaskError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::IoError(io) => MaskError::Io(io),
            other @ ImageError::Encoding(_) => MaskError::Encode(other.to_string()),
            other => MaskError::Decode(other.to_string()),
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Largest background the mask store accepts, in pixels.
pub const MAX_IMAGE_PIXELS: u64 = 256_000_000;

/// Reject backgrounds the mask cannot be sized to.
pub fn check_dimensions(width: u32, height: u32) -> Result<(), MaskError> {
    if width == 0 || height == 0 {
        return Err(MaskError::Decode(format!("image {}×{} has no pixels", width, height)));
    }
    if width as u64 * height as u64 > MAX_IMAGE_PIXELS {
        return Err(MaskError::Decode(format!(
            "image {}×{} exceeds the {} megapixel limit",
            width,
            height,
            MAX_IMAGE_PIXELS / 1_000_000
        )));
    }
    Ok(())
}

/// Synchronously decode any supported image to RGBA.  The header is checked
/// against [`MAX_IMAGE_PIXELS`] before any pixel data is decoded.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, MaskError> {
    let (w, h) = image::image_dimensions(path)?;
    check_dimensions(w, h)?;
    Ok(image::open(path)?.to_rgba8())
}

/// A decoded background image, tagged with the request that produced it.
pub struct LoadedImage {
    pub generation: u64,
    pub path: PathBuf,
    pub pixels: RgbaImage,
}

struct LoadMessage {
    generation: u64,
    path: PathBuf,
    result: Result<RgbaImage, MaskError>,
}

/// Decodes images on the rayon pool and hands results back through a
/// channel, like the app's other background I/O.
///
/// Every [`ImageLoader::request`] bumps the generation; results carrying an
/// older generation are dropped by [`ImageLoader::poll`], so a fast series
/// of source changes only ever delivers the last one.
pub struct ImageLoader {
    sender: mpsc::Sender<LoadMessage>,
    receiver: mpsc::Receiver<LoadMessage>,
    generation: u64,
    pending: bool,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver, generation: 0, pending: false }
    }

    /// Start decoding `path` in the background.  Supersedes any load still
    /// in flight.
    pub fn request(&mut self, path: PathBuf) -> u64 {
        self.generation += 1;
        self.pending = true;
        let generation = self.generation;
        let sender = self.sender.clone();
        rayon::spawn(move || {
            let result = load_image_sync(&path);
            let _ = sender.send(LoadMessage { generation, path, result });
        });
        generation
    }

    /// Forget the in-flight load; its result will be discarded.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Non-blocking: the current request's result if it has arrived.
    pub fn poll(&mut self) -> Option<Result<LoadedImage, MaskError>> {
        while let Ok(msg) = self.receiver.try_recv() {
            if let Some(done) = self.accept(msg) {
                return Some(done);
            }
        }
        None
    }

    /// Block until the current request completes.  `None` if nothing is
    /// pending.
    pub fn wait(&mut self) -> Option<Result<LoadedImage, MaskError>> {
        while self.pending {
            let msg = self.receiver.recv().ok()?;
            if let Some(done) = self.accept(msg) {
                return Some(done);
            }
        }
        None
    }

    fn accept(&mut self, msg: LoadMessage) -> Option<Result<LoadedImage, MaskError>> {
        if msg.generation != self.generation || !self.pending {
            crate::log_info!("Discarding stale load of {}", msg.path.display());
            return None;
        }
        self.pending = false;
        Some(msg.result.map(|pixels| LoadedImage {
            generation: msg.generation,
            path: msg.path,
            pixels,
        }))
    }
}

// ============================================================================
// SAVING
// ============================================================================

/// Write an exported mask to `path` as PNG.
pub fn save_mask_png(mask: &EncodedMask, path: &Path) -> Result<(), MaskError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&mask.png)?;
    writer.flush()?;
    Ok(())
}

/// Default output name for a mask made over `source` (`photo.jpg` →
/// `photo_mask.png`).
pub fn mask_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("{}_mask.png", stem)
}
