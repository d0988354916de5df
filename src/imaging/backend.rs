//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the pipeline needs
//! from a codec stack: HEIC conversion, size-budgeted re-encoding, and
//! measurement of the encoded result.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Everything except
//! HEIC decoding is pure Rust and statically linked into the binary.

use super::params::{EncodeParams, Quality};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: the re-encoder may fan attempts out over a
/// thread pool while the caller holds a shared reference.
pub trait ImageBackend: Sync {
    /// Decode HEIC/HEIF bytes and re-encode them as JPEG.
    fn convert_heic(&self, source: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError>;

    /// Re-encode under the size and dimension budget in `params`.
    ///
    /// `on_progress` receives percentages (0–100) as work advances.
    fn reencode(
        &self,
        params: &EncodeParams<'_>,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<Vec<u8>, BackendError>;

    /// Measure encoded bytes. `media_type` is a hint for formats that cannot
    /// be sniffed from content.
    fn identify(&self, bytes: &[u8], media_type: &str) -> Result<Dimensions, BackendError>;
}
