//! Image processing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions`, `avif-parse`, `roxmltree` for SVG |
//! | **Decode AVIF** | `avif-parse` + `rav1d` |
//! | **Decode HEIC** | `libheif-rs` (`heic` feature) |
//! | **Re-encode** | Lanczos3 resize + `image` encoders, budgeted attempts on `rayon` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and attempt math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining policy + backend

mod avif;
pub mod backend;
mod calculations;
#[cfg(feature = "heic")]
mod heic;
pub mod operations;
mod params;
pub mod rust_backend;
mod svg;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{fit_within, is_oversized};
pub use operations::{
    CompressSettings, CompressionError, ConversionError, compress_image, convert_heic_to_jpeg,
    heic_jpeg_name,
};
pub use params::{BYTES_PER_MB, CompressionOptions, EncodeParams, Quality};
pub use rust_backend::RustBackend;
