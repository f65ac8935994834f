//! Image decode and normalization.
//!
//! The site serves pictures in whatever format the day's contributor
//! uploaded. Everything saved locally goes through one pipeline: decode,
//! convert to an alpha-capable pixel format, re-encode.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Errors from decoding or saving a picture.
#[derive(Debug, Error)]
pub enum PictureError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode raw bytes and normalize to RGBA8.
pub fn normalize(bytes: &[u8]) -> Result<DynamicImage, PictureError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(DynamicImage::ImageRgba8(decoded.to_rgba8()))
}

/// Decode, normalize and re-encode as PNG bytes.
pub fn normalize_to_png(bytes: &[u8]) -> Result<Vec<u8>, PictureError> {
    let normalized = normalize(bytes)?;
    let mut out = Cursor::new(Vec::new());
    normalized.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Decode, normalize and save to `dest`; the output format follows the
/// destination's extension.
pub fn normalize_and_save(bytes: &[u8], dest: &Path) -> Result<(), PictureError> {
    let normalized = normalize(bytes)?;
    normalized.save(dest)?;
    Ok(())
}
