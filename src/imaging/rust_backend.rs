//! Pure Rust image processing backend.
//!
//! Everything except HEIC decoding is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF, BMP, TIFF) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode), see [`avif`](super::avif) |
//! | Decode (HEIC) | `libheif-rs`, behind the `heic` feature |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode | `image` encoders in the source format; lossy WebP via `webp` (libwebp); AVIF via rav1e at speed 6 |
//! | Parallel attempts | `rayon` |
//! | Measure SVG | `roxmltree`, see [`svg`](super::svg) |
//!
//! ## Budgeted re-encoding
//!
//! The image is fitted within the dimension limit, then encoded. While the
//! result exceeds the size budget, further attempts shrink scale (and quality,
//! for lossy formats) by 5% each, up to `max_iterations`. With
//! `use_parallel_worker`, attempts are encoded in batches the width of the
//! rayon pool and the first fitting attempt in plan order wins. If nothing
//! fits, the last attempt is returned.
//!
//! Encoders never copy EXIF/XMP, so metadata is always stripped.

use super::avif;
use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{
    Attempt, attempt_progress, fit_within, plan_attempts, scale_dimensions,
};
use super::params::{EncodeParams, Quality};
use crate::formats::{OutputFormat, RAW_FORMATS};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, GenericImageView, ImageFormat, ImageReader};
use rayon::prelude::*;
use std::borrow::Cow;
use std::io::Cursor;
use tracing::debug;

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    /// Quality of the first encode attempt for lossy formats.
    initial_quality: Quality,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            initial_quality: Quality::default(),
        }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn processing(context: &str, e: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("{context}: {e}"))
}

fn is_avif_bytes(bytes: &[u8]) -> bool {
    matches!(image::guess_format(bytes), Ok(ImageFormat::Avif))
}

/// Output format for a media type, sniffing the bytes when the type is unknown.
fn output_format(media_type: &str, bytes: &[u8]) -> Result<OutputFormat, BackendError> {
    if let Some(format) = OutputFormat::for_media_type(media_type) {
        return Ok(format);
    }
    let sniffed = match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Some(OutputFormat::Jpeg),
        Ok(ImageFormat::Png) => Some(OutputFormat::Png),
        Ok(ImageFormat::WebP) => Some(OutputFormat::WebP),
        Ok(ImageFormat::Gif) => Some(OutputFormat::Gif),
        Ok(ImageFormat::Bmp) => Some(OutputFormat::Bmp),
        Ok(ImageFormat::Tiff) => Some(OutputFormat::Tiff),
        Ok(ImageFormat::Avif) => Some(OutputFormat::Avif),
        _ => None,
    };
    sniffed.ok_or_else(|| {
        BackendError::Unsupported(format!("no encoder for media type {media_type:?}"))
    })
}

/// Decode bytes, routing AVIF to the rav1d decoder.
fn decode(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    if is_avif_bytes(bytes) {
        return avif::decode_avif(bytes);
    }
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()
        .map_err(|e| processing("Failed to decode image", e))
}

/// True for GIFs with more than one frame.
fn is_animated_gif(bytes: &[u8]) -> bool {
    image::codecs::gif::GifDecoder::new(Cursor::new(bytes))
        .map(|decoder| decoder.into_frames().take(2).count() > 1)
        .unwrap_or(false)
}

/// Reduce to 8-bit RGB or RGBA, which every encoder here accepts.
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img.clone(),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Encode an image in the given format.
fn encode(img: &DynamicImage, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let q = quality.value() as u8;
    match format {
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, q))
                .map_err(|e| processing("JPEG encode failed", e))?;
        }
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            to_8bit(img)
                .write_with_encoder(encoder)
                .map_err(|e| processing("PNG encode failed", e))?;
        }
        OutputFormat::WebP => {
            let frame = to_8bit(img);
            let encoder = webp::Encoder::from_image(&frame)
                .map_err(|reason| processing("WebP encode failed", reason))?;
            buf.extend_from_slice(&encoder.encode(quality.value() as f32));
        }
        OutputFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(&mut buf, AVIF_SPEED, q);
            to_8bit(img)
                .write_with_encoder(encoder)
                .map_err(|e| processing("AVIF encode failed", e))?;
        }
        OutputFormat::Gif | OutputFormat::Bmp | OutputFormat::Tiff => {
            let image_format = match format {
                OutputFormat::Gif => ImageFormat::Gif,
                OutputFormat::Bmp => ImageFormat::Bmp,
                _ => ImageFormat::Tiff,
            };
            to_8bit(img)
                .write_to(&mut Cursor::new(&mut buf), image_format)
                .map_err(|e| processing("Encode failed", e))?;
        }
        OutputFormat::Svg => {
            return Err(BackendError::Unsupported(
                "SVG cannot be rasterized".into(),
            ));
        }
    }
    Ok(buf)
}

impl RustBackend {
    /// Run the attempt plan, returning the first result within `budget` bytes,
    /// or the last one when none fits.
    fn encode_within_budget(
        &self,
        base: &DynamicImage,
        format: OutputFormat,
        params: &EncodeParams<'_>,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<Vec<u8>, BackendError> {
        let options = &params.options;
        let budget = options.max_size_bytes();
        let fitted = base.dimensions();
        let attempts = plan_attempts(
            self.initial_quality.value(),
            format.is_lossy(),
            options.max_iterations,
        );

        let encode_attempt = |attempt: &Attempt| -> Result<Vec<u8>, BackendError> {
            let (w, h) = scale_dimensions(fitted, attempt.scale);
            let frame = if (w, h) == fitted {
                Cow::Borrowed(base)
            } else {
                Cow::Owned(base.resize_exact(w, h, FilterType::Lanczos3))
            };
            encode(&frame, format, Quality::new(attempt.quality))
        };

        let batch_size = if options.use_parallel_worker {
            rayon::current_num_threads().max(1)
        } else {
            1
        };

        let mut completed = 0;
        let mut last = None;
        for batch in attempts.chunks(batch_size) {
            let results: Vec<Result<Vec<u8>, BackendError>> = if batch.len() > 1 {
                batch.par_iter().map(|a| encode_attempt(a)).collect()
            } else {
                batch.iter().map(|a| encode_attempt(a)).collect()
            };
            completed += batch.len();
            on_progress(attempt_progress(completed, attempts.len()));

            for (attempt, result) in batch.iter().zip(results) {
                let bytes = result?;
                debug!(
                    quality = attempt.quality,
                    scale = attempt.scale,
                    bytes = bytes.len(),
                    budget,
                    "encode attempt"
                );
                if bytes.len() as u64 <= budget {
                    return Ok(bytes);
                }
                last = Some(bytes);
            }
        }

        last.ok_or_else(|| BackendError::ProcessingFailed("no encode attempts ran".into()))
    }
}

impl ImageBackend for RustBackend {
    #[cfg(feature = "heic")]
    fn convert_heic(&self, source: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
        let img = super::heic::decode_heic(source)?;
        encode(&img, OutputFormat::Jpeg, quality)
    }

    #[cfg(not(feature = "heic"))]
    fn convert_heic(&self, _source: &[u8], _quality: Quality) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::Unsupported(
            "HEIC decoding requires building with the `heic` feature".into(),
        ))
    }

    fn reencode(
        &self,
        params: &EncodeParams<'_>,
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<Vec<u8>, BackendError> {
        let source = params.source;
        let format = output_format(params.media_type, source)?;

        if format == OutputFormat::Svg {
            debug!("svg passed through");
            on_progress(100);
            return Ok(source.to_vec());
        }
        if format == OutputFormat::Gif && is_animated_gif(source) {
            debug!("animated gif passed through");
            on_progress(100);
            return Ok(source.to_vec());
        }

        let img = decode(source)?;
        let original = img.dimensions();
        let fitted = fit_within(original, params.options.max_width_or_height);
        let base = if fitted == original {
            img
        } else {
            img.resize_exact(fitted.0, fitted.1, FilterType::Lanczos3)
        };

        let encoded = self.encode_within_budget(&base, format, params, on_progress)?;

        // Re-encoding an already-compliant file must not make it bigger.
        let same_format = !RAW_FORMATS.contains(&params.media_type.to_ascii_lowercase().as_str());
        let original_fits = source.len() as u64 <= params.options.max_size_bytes()
            && fitted == original;
        let result = if same_format && original_fits && encoded.len() > source.len() {
            debug!(
                original = source.len(),
                encoded = encoded.len(),
                "keeping smaller original"
            );
            source.to_vec()
        } else {
            encoded
        };

        on_progress(100);
        Ok(result)
    }

    fn identify(&self, bytes: &[u8], media_type: &str) -> Result<Dimensions, BackendError> {
        if OutputFormat::for_media_type(media_type) == Some(OutputFormat::Svg) {
            return super::svg::identify_svg(bytes);
        }
        if is_avif_bytes(bytes) {
            return avif::identify_avif(bytes);
        }
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| processing("Failed to read dimensions", e))?;
        Ok(Dimensions { width, height })
    }
}
