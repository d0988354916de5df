//! Shared test utilities.
//!
//! Builds small in-memory image fixtures with the `image` crate and provides
//! delivery doubles that record what the pipeline asked for.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = jpeg_bytes(64, 32, 90);
//! let archiver = RecordingArchiver::default();
//! let target = RecordingTarget::failing_on(&["run.zip"]);
//! ```

use crate::archive::{ArchiveError, Archiver};
use crate::deliver::SaveTarget;
use crate::types::ImageFile;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::{self, Cursor};
use std::path::PathBuf;
use std::sync::Mutex;

// =========================================================================
// Image fixtures
// =========================================================================

/// Smooth gradient, compresses well.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Deterministic pseudo-random pixels, compresses badly.
pub fn noise(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x2545_f491;
    RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        };
        Rgb([next(), next(), next()])
    })
}

fn encode_jpeg(img: RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .unwrap();
    buf
}

/// Gradient JPEG at the given quality.
pub fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    encode_jpeg(gradient(width, height), quality)
}

/// Noise JPEG at the given quality.
pub fn noise_jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    encode_jpeg(noise(width, height), quality)
}

/// Gradient PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// GIF with `frames` solid-colour frames.
pub fn animated_gif_bytes(width: u32, height: u32, frames: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        let frames = (0..frames).map(|i| {
            Frame::new(RgbaImage::from_pixel(
                width,
                height,
                Rgba([i.wrapping_mul(60), 0, 255 - i.wrapping_mul(60), 255]),
            ))
        });
        encoder.encode_frames(frames).unwrap();
    }
    buf
}

// =========================================================================
// Delivery doubles
// =========================================================================

/// Archiver that records calls and returns the entry names joined by `,`.
#[derive(Default)]
pub struct RecordingArchiver {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingArchiver {
    pub fn calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Entry names of every archive built, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

impl Archiver for RecordingArchiver {
    fn archive(&self, files: &[ImageFile]) -> Result<Vec<u8>, ArchiveError> {
        let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let payload = names.join(",").into_bytes();
        self.batches.lock().unwrap().push(names);
        Ok(payload)
    }
}

/// Archiver that always fails.
pub struct FailingArchiver;

impl Archiver for FailingArchiver {
    fn archive(&self, _files: &[ImageFile]) -> Result<Vec<u8>, ArchiveError> {
        Err(ArchiveError::Io(io::Error::other("simulated archive failure")))
    }
}

/// Save target that records saves in memory.
#[derive(Default)]
pub struct RecordingTarget {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
    fail: HashSet<String>,
}

impl RecordingTarget {
    /// Saves under any of these names fail.
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn saved_names(&self) -> Vec<String> {
        self.saved().into_iter().map(|(name, _)| name).collect()
    }
}

impl SaveTarget for RecordingTarget {
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if self.fail.contains(name) {
            return Err(io::Error::other(format!("simulated save failure: {name}")));
        }
        self.saved
            .lock()
            .unwrap()
            .push((name.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(name))
    }
}
