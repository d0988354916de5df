//! HEIC/HEIF decoding through the system libheif.
//!
//! Only compiled with the `heic` feature. The rest of the crate is pure Rust;
//! this is the one place that links a C library, so it stays opt-in.

use super::backend::BackendError;
use image::{DynamicImage, RgbImage};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

/// Decode the primary image of a HEIC/HEIF container to RGB8.
pub fn decode_heic(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to read HEIC: {e}")))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| BackendError::ProcessingFailed(format!("HEIC has no primary image: {e}")))?;

    let width = handle.width();
    let height = handle.height();

    let image = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode HEIC: {e}")))?;

    let planes = image.planes();
    let interleaved = planes.interleaved.ok_or_else(|| {
        BackendError::ProcessingFailed("HEIC decode produced no interleaved RGB plane".into())
    })?;

    // Rows may be padded; copy only the visible pixels.
    let row_len = width as usize * 3;
    let mut rgb = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let start = y * interleaved.stride;
        rgb.extend_from_slice(&interleaved.data[start..start + row_len]);
    }

    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| BackendError::ProcessingFailed("HEIC buffer has the wrong size".into()))
}
