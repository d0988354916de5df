//! Compression configuration.
//!
//! Handles loading, validating, and merging `batchpress.toml`. User files are
//! sparse: they are merged on top of the stock defaults, so a file only needs
//! the keys it wants to change. The stock defaults reproduce the built-in
//! compression policy exactly.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [budget]
//! default_mb = 1.0          # Output ceiling for most formats
//! png_svg_mb = 2.0          # PNG and SVG
//! gif_mb = 3.0              # GIF (possibly animated)
//! webp_mb = 0.8             # WebP
//! small_file_kib = 100      # Files below this get a proportional budget
//! small_file_ratio = 0.9    # Proportional budget = original size * ratio
//! small_file_floor_mb = 0.1 # ...but never below this
//!
//! [dimensions]
//! max_width_or_height = 1680
//! oversize_width = 1680     # Results wider than this are flagged
//!
//! [heic]
//! quality = 90              # JPEG quality for HEIC conversion (1-100)
//! rename_all_suffixes = false
//!
//! [archive]
//! name_prefix = "compressed_images"
//! compression_level = 6     # DEFLATE level (0-9)
//!
//! [processing]
//! max_processes = 4         # Max parallel encode workers (omit for auto)
//! parallel_encode = true
//! max_iterations = 10
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full configuration loaded from `batchpress.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PressConfig {
    /// Output size ceilings per format.
    pub budget: BudgetConfig,
    /// Resize limit and oversize threshold.
    pub dimensions: DimensionsConfig,
    /// HEIC → JPEG conversion.
    pub heic: HeicConfig,
    /// Zip delivery.
    pub archive: ArchiveConfig,
    /// Encoder parallelism and retry limits.
    pub processing: ProcessingConfig,
}

impl PressConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.budget;
        for (key, value) in [
            ("budget.default_mb", b.default_mb),
            ("budget.png_svg_mb", b.png_svg_mb),
            ("budget.gif_mb", b.gif_mb),
            ("budget.webp_mb", b.webp_mb),
            ("budget.small_file_floor_mb", b.small_file_floor_mb),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a positive number"
                )));
            }
        }
        if !(b.small_file_ratio > 0.0 && b.small_file_ratio <= 1.0) {
            return Err(ConfigError::Validation(
                "budget.small_file_ratio must be in (0, 1]".into(),
            ));
        }
        if b.small_file_kib > MAX_SMALL_FILE_KIB {
            return Err(ConfigError::Validation(format!(
                "budget.small_file_kib must be at most {MAX_SMALL_FILE_KIB}"
            )));
        }
        if self.dimensions.max_width_or_height == 0 || self.dimensions.oversize_width == 0 {
            return Err(ConfigError::Validation(
                "dimensions values must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.heic.quality) {
            return Err(ConfigError::Validation("heic.quality must be 1-100".into()));
        }
        if !(0..=9).contains(&self.archive.compression_level) {
            return Err(ConfigError::Validation(
                "archive.compression_level must be 0-9".into(),
            ));
        }
        if self.archive.name_prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "archive.name_prefix must not be empty".into(),
            ));
        }
        if self.processing.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "processing.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Upper bound for `budget.small_file_kib` (1 TiB).
pub const MAX_SMALL_FILE_KIB: u64 = 1 << 30;

/// Output size ceilings, in megabytes (1 MB = 1024 × 1024 bytes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    pub default_mb: f64,
    pub png_svg_mb: f64,
    pub gif_mb: f64,
    pub webp_mb: f64,
    /// Inputs strictly smaller than this many KiB use the proportional budget.
    pub small_file_kib: u64,
    pub small_file_ratio: f64,
    pub small_file_floor_mb: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_mb: 1.0,
            png_svg_mb: 2.0,
            gif_mb: 3.0,
            webp_mb: 0.8,
            small_file_kib: 100,
            small_file_ratio: 0.9,
            small_file_floor_mb: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimensionsConfig {
    /// Longer-edge limit applied when re-encoding.
    pub max_width_or_height: u32,
    /// Results strictly wider than this are flagged as oversized.
    pub oversize_width: u32,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self {
            max_width_or_height: 1680,
            oversize_width: 1680,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeicConfig {
    pub quality: u32,
    /// Rewrite any `.heic`/`.heif` suffix (any case) to `.jpg`. When false,
    /// only a lowercase `.heic` suffix is rewritten.
    pub rename_all_suffixes: bool,
}

impl Default for HeicConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            rename_all_suffixes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    pub name_prefix: String,
    pub compression_level: i64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            name_prefix: "compressed_images".to_string(),
            compression_level: 6,
        }
    }
}

/// Parallel encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// Encode candidate attempts in parallel batches.
    pub parallel_encode: bool,
    /// Upper bound on encode attempts per file.
    pub max_iterations: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            parallel_encode: true,
            max_iterations: 10,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PressConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse config text, merge it over the stock defaults, and validate.
pub fn parse_config(content: &str) -> Result<PressConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let config: PressConfig = merge_toml(stock_defaults_value(), overlay).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file path.
///
/// A missing file yields the stock defaults; a present but invalid one is an error.
pub fn load_config(path: &Path) -> Result<PressConfig, ConfigError> {
    if !path.exists() {
        return Ok(PressConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `batchpress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# batchpress configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Output size budgets (megabytes, 1 MB = 1024 * 1024 bytes)
# ---------------------------------------------------------------------------
[budget]
# Ceiling for JPEG, TIFF, BMP, AVIF, RAW and converted HEIC.
default_mb = 1.0

# PNG and SVG compress poorly with lossy re-encoding; give them more room.
png_svg_mb = 2.0

# GIFs may be animated; aggressive compression breaks or bloats them.
gif_mb = 3.0

# WebP is already efficient, so a tighter budget still looks fine.
webp_mb = 0.8

# Inputs smaller than this (KiB) get max(size * small_file_ratio, floor)
# instead of a format budget, so small files are never inflated.
small_file_kib = 100
small_file_ratio = 0.9
small_file_floor_mb = 0.1

# ---------------------------------------------------------------------------
# Dimensions
# ---------------------------------------------------------------------------
[dimensions]
# Longer edge is scaled down to at most this many pixels.
max_width_or_height = 1680

# Results wider than this are marked as oversized in the summary.
oversize_width = 1680

# ---------------------------------------------------------------------------
# HEIC / HEIF conversion (requires the `heic` build feature)
# ---------------------------------------------------------------------------
[heic]
# JPEG quality used for the converted file (1-100).
quality = 90

# false: only a lowercase ".heic" suffix becomes ".jpg".
# true:  ".heic", ".HEIC", ".heif", ".HEIF" (any case) all become ".jpg".
rename_all_suffixes = false

# ---------------------------------------------------------------------------
# Zip delivery (used when more than one file succeeds)
# ---------------------------------------------------------------------------
[archive]
# Archive name is <prefix>_<YYYY-MM-DD>_<HH.MM.SS>.zip
name_prefix = "compressed_images"

# DEFLATE compression level (0 = store, 9 = smallest).
compression_level = 6

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encode workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Try several encode settings at once instead of one after another.
parallel_encode = true

# Maximum encode attempts per file before settling for the last result.
max_iterations = 10
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_builtin_policy() {
        let config = PressConfig::default();
        assert_eq!(config.budget.default_mb, 1.0);
        assert_eq!(config.budget.png_svg_mb, 2.0);
        assert_eq!(config.budget.gif_mb, 3.0);
        assert_eq!(config.budget.webp_mb, 0.8);
        assert_eq!(config.budget.small_file_kib, 100);
        assert_eq!(config.dimensions.max_width_or_height, 1680);
        assert_eq!(config.dimensions.oversize_width, 1680);
        assert_eq!(config.heic.quality, 90);
        assert_eq!(config.archive.compression_level, 6);
        assert_eq!(config.archive.name_prefix, "compressed_images");
        assert!(config.processing.parallel_encode);
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(PressConfig::default().validate().is_ok());
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config = parse_config(stock_config_toml()).unwrap();
        assert_eq!(config, PressConfig::default());
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
            [budget]
            webp_mb = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.budget.webp_mb, 0.5);
        // Untouched keys keep their defaults
        assert_eq!(config.budget.default_mb, 1.0);
        assert_eq!(config.dimensions.max_width_or_height, 1680);
    }

    #[test]
    fn parse_processing_config() {
        let config = parse_config(
            r#"
            [processing]
            max_processes = 2
            parallel_encode = false
            "#,
        )
        .unwrap();
        assert_eq!(config.processing.max_processes, Some(2));
        assert!(!config.processing.parallel_encode);
        assert_eq!(config.processing.max_iterations, 10);
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config(
            r#"
            [budget]
            defualt_mb = 2.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(parse_config("[thumbnails]\naspect_ratio = [1, 1]\n").is_err());
    }

    #[test]
    fn validate_negative_budget() {
        let result = parse_config("[budget]\ngif_mb = -1.0\n");
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("gif_mb")));
    }

    #[test]
    fn validate_ratio_out_of_range() {
        assert!(parse_config("[budget]\nsmall_file_ratio = 1.5\n").is_err());
        assert!(parse_config("[budget]\nsmall_file_ratio = 0.0\n").is_err());
        assert!(parse_config("[budget]\nsmall_file_ratio = 1.0\n").is_ok());
    }

    #[test]
    fn validate_heic_quality_bounds() {
        assert!(parse_config("[heic]\nquality = 0\n").is_err());
        assert!(parse_config("[heic]\nquality = 101\n").is_err());
        assert!(parse_config("[heic]\nquality = 100\n").is_ok());
    }

    #[test]
    fn validate_compression_level_bounds() {
        assert!(parse_config("[archive]\ncompression_level = 10\n").is_err());
        assert!(parse_config("[archive]\ncompression_level = 0\n").is_ok());
    }

    #[test]
    fn validate_empty_prefix() {
        assert!(parse_config("[archive]\nname_prefix = \"  \"\n").is_err());
    }

    #[test]
    fn validate_small_file_threshold_bound() {
        let result = parse_config("[budget]\nsmall_file_kib = 4611686018427387904\n");
        assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("small_file_kib")));
        assert!(parse_config(&format!("[budget]\nsmall_file_kib = {MAX_SMALL_FILE_KIB}\n")).is_ok());
    }

    #[test]
    fn validate_zero_dimensions() {
        assert!(parse_config("[dimensions]\nmax_width_or_height = 0\n").is_err());
    }

    #[test]
    fn validate_zero_iterations() {
        assert!(parse_config("[processing]\nmax_iterations = 0\n").is_err());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("batchpress.toml")).unwrap();
        assert_eq!(config, PressConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("batchpress.toml");
        fs::write(&path, "[archive]\nname_prefix = \"shrunk\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.archive.name_prefix, "shrunk");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("batchpress.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value = toml::from_str("[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 5\nz = 6").unwrap();
        let merged = merge_toml(base, overlay);
        let t = merged.get("t").unwrap();
        assert_eq!(t.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(t.get("y").unwrap().as_integer(), Some(5));
        assert_eq!(t.get("z").unwrap().as_integer(), Some(6));
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
            ..ProcessingConfig::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
            ..ProcessingConfig::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 64),
            ..ProcessingConfig::default()
        };
        assert_eq!(effective_threads(&config), cores);
    }
}
