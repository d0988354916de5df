//! High-level image operations.
//!
//! These functions combine the compression policy with backend execution:
//! they decide how a file is treated, build the parameters, and call the
//! backend. Nothing here touches pixels directly.

use super::backend::{BackendError, ImageBackend};
use super::calculations::is_oversized;
use super::params::{EncodeParams, Quality};
use crate::config::PressConfig;
use crate::formats::{RAW_FORMATS, effective_media_type, is_heic};
use crate::policy::CompressionPolicy;
use crate::types::{CompressionResult, ImageFile};
use std::borrow::Cow;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to convert {name} to JPEG: {source}")]
    Heic {
        name: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("Failed to re-encode {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: BackendError,
    },
    #[error("Failed to measure {name}: {source}")]
    Measure {
        name: String,
        #[source]
        source: BackendError,
    },
}

/// Everything [`compress_image`] needs besides the file itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressSettings {
    pub policy: CompressionPolicy,
    pub heic_quality: Quality,
    /// Rename `.HEIC`, `.heif` and friends too, not just a lowercase `.heic`.
    pub rename_all_heic_suffixes: bool,
    /// Results strictly wider than this are flagged.
    pub oversize_width: u32,
}

impl CompressSettings {
    pub fn from_config(config: &PressConfig) -> Self {
        Self {
            policy: CompressionPolicy::from_config(config),
            heic_quality: Quality::new(config.heic.quality),
            rename_all_heic_suffixes: config.heic.rename_all_suffixes,
            oversize_width: config.dimensions.oversize_width,
        }
    }
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self::from_config(&PressConfig::default())
    }
}

/// Output name for a converted HEIC file.
///
/// By default only a trailing lowercase `.heic` becomes `.jpg`. With
/// `rename_all`, `.heic` and `.heif` in any case are replaced.
pub fn heic_jpeg_name(name: &str, rename_all: bool) -> String {
    if let Some(stem) = name.strip_suffix(".heic") {
        return format!("{stem}.jpg");
    }
    if rename_all {
        let split = name.len().saturating_sub(5);
        if name.is_char_boundary(split) {
            let (stem, ext) = name.split_at(split);
            if ext.eq_ignore_ascii_case(".heic") || ext.eq_ignore_ascii_case(".heif") {
                return format!("{stem}.jpg");
            }
        }
    }
    name.to_string()
}

/// Convert a HEIC/HEIF file to JPEG.
pub fn convert_heic_to_jpeg(
    backend: &impl ImageBackend,
    file: &ImageFile,
    quality: Quality,
    rename_all: bool,
) -> Result<ImageFile, ConversionError> {
    let bytes = backend
        .convert_heic(&file.bytes, quality)
        .map_err(|source| ConversionError::Heic {
            name: file.name.clone(),
            source,
        })?;
    let name = heic_jpeg_name(&file.name, rename_all);
    debug!(file = %file.name, output = %name, bytes = bytes.len(), "converted heic");
    Ok(ImageFile::new(name, "image/jpeg", bytes))
}

/// Compress one file: convert HEIC, pick options, re-encode, measure.
///
/// Progress from the re-encoder is forwarded to `on_progress` as it arrives.
/// On failure nothing is returned; the caller only learns which step failed.
pub fn compress_image(
    backend: &impl ImageBackend,
    file: &ImageFile,
    settings: &CompressSettings,
    on_progress: &mut dyn FnMut(u8),
) -> Result<CompressionResult, CompressionError> {
    let input: Cow<'_, ImageFile> = if is_heic(&file.media_type, &file.name) {
        Cow::Owned(convert_heic_to_jpeg(
            backend,
            file,
            settings.heic_quality,
            settings.rename_all_heic_suffixes,
        )?)
    } else {
        Cow::Borrowed(file)
    };

    let media_type = effective_media_type(&input.media_type, &input.name).unwrap_or_default();
    let options = settings.policy.options_for(&media_type, input.size());
    debug!(
        file = %input.name,
        media_type = %media_type,
        bytes = input.size(),
        max_size_mb = options.max_size_mb,
        "compressing"
    );

    let bytes = backend
        .reencode(
            &EncodeParams {
                source: &input.bytes,
                media_type: &media_type,
                options,
            },
            on_progress,
        )
        .map_err(|source| CompressionError::Encode {
            name: input.name.clone(),
            source,
        })?;

    // RAW inputs come back as JPEG
    let output_type = if RAW_FORMATS.contains(&media_type.as_str()) {
        "image/jpeg".to_string()
    } else {
        media_type
    };

    let dimensions =
        backend
            .identify(&bytes, &output_type)
            .map_err(|source| CompressionError::Measure {
                name: input.name.clone(),
                source,
            })?;

    Ok(CompressionResult {
        file: ImageFile::new(input.name.clone(), output_type, bytes),
        is_oversized: is_oversized(dimensions.width, settings.oversize_width),
        dimensions,
    })
}
