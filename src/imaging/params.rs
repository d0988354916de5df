//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides how each file is treated) and the [`backend`](super::backend)
//! (which does the actual pixel work). Tests swap in a mock backend without
//! touching operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`CompressionOptions`]: Per-file budget: size ceiling, dimension limit, metadata and parallelism flags.
//! - [`EncodeParams`]: Full specification for one re-encode: source bytes, media type, options.

/// Bytes in one megabyte as the budgets use it.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Re-encoding parameters derived once per file before compression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionOptions {
    /// Output size ceiling in megabytes.
    pub max_size_mb: f64,
    /// Longer-edge limit in pixels.
    pub max_width_or_height: u32,
    pub preserve_metadata: bool,
    pub use_parallel_worker: bool,
    /// Encode attempts before settling for the last result.
    pub max_iterations: u32,
}

impl CompressionOptions {
    /// Size ceiling in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * BYTES_PER_MB).floor() as u64
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_size_mb: 1.0,
            max_width_or_height: 1680,
            preserve_metadata: false,
            use_parallel_worker: true,
            max_iterations: 10,
        }
    }
}

/// Parameters for one re-encode.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams<'a> {
    pub source: &'a [u8],
    pub media_type: &'a str,
    pub options: CompressionOptions,
}
