//! Compression option selection.
//!
//! Derives the re-encoding budget for one file from its media type and size.
//! Rules apply in order and the last match wins:
//!
//! 1. Base: [`BudgetConfig::default_mb`] (1 MB), longer edge 1680 px,
//!    metadata stripped, parallel encoding allowed.
//! 2. PNG and SVG: `png_svg_mb` (2 MB).
//! 3. GIF: `gif_mb` (3 MB).
//! 4. WebP: `webp_mb` (0.8 MB).
//! 5. Inputs under `small_file_kib` (100 KiB):
//!    `max(size_mb * small_file_ratio, small_file_floor_mb)`.
//!
//! The format rules are mutually exclusive, so only the small-file rule can
//! override a format budget. Selection is a pure function of
//! `(media type, size)`.

use crate::config::{BudgetConfig, PressConfig};
use crate::formats::effective_media_type;
use crate::imaging::{BYTES_PER_MB, CompressionOptions};
use crate::types::ImageFile;

/// Budget rules plus the fixed per-run settings copied into every
/// [`CompressionOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionPolicy {
    pub budget: BudgetConfig,
    pub max_width_or_height: u32,
    pub use_parallel_worker: bool,
    pub max_iterations: u32,
}

impl CompressionPolicy {
    pub fn from_config(config: &PressConfig) -> Self {
        Self {
            budget: config.budget.clone(),
            max_width_or_height: config.dimensions.max_width_or_height,
            use_parallel_worker: config.processing.parallel_encode,
            max_iterations: config.processing.max_iterations,
        }
    }

    /// Output ceiling in megabytes for a media type and input size.
    pub fn max_size_mb(&self, media_type: &str, size: u64) -> f64 {
        let budget = &self.budget;
        let mut max_size_mb = budget.default_mb;

        match media_type.to_ascii_lowercase().as_str() {
            "image/png" | "image/svg+xml" => max_size_mb = budget.png_svg_mb,
            "image/gif" => max_size_mb = budget.gif_mb,
            "image/webp" => max_size_mb = budget.webp_mb,
            _ => {}
        }

        if size < budget.small_file_kib.saturating_mul(1024) {
            let size_mb = size as f64 / BYTES_PER_MB;
            max_size_mb = (size_mb * budget.small_file_ratio).max(budget.small_file_floor_mb);
        }

        max_size_mb
    }

    pub fn options_for(&self, media_type: &str, size: u64) -> CompressionOptions {
        CompressionOptions {
            max_size_mb: self.max_size_mb(media_type, size),
            max_width_or_height: self.max_width_or_height,
            preserve_metadata: false,
            use_parallel_worker: self.use_parallel_worker,
            max_iterations: self.max_iterations,
        }
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::from_config(&PressConfig::default())
    }
}

/// Options for a file under the stock policy.
///
/// Uses the declared media type, or the extension's when none was declared.
pub fn compression_options(file: &ImageFile) -> CompressionOptions {
    let media_type = effective_media_type(&file.media_type, &file.name).unwrap_or_default();
    CompressionPolicy::default().options_for(&media_type, file.size())
}
