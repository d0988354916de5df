//! Input format classification.
//!
//! Every input carries a declared media type (possibly empty) and a filename.
//! Classification decides whether the file enters the queue at all, and if so
//! which path it takes:
//!
//! | Class | Media types | Pipeline |
//! |---|---|---|
//! | [`FormatClass::Image`] | JPEG, PNG, WebP, TIFF, BMP, GIF, SVG, AVIF | re-encode directly |
//! | [`FormatClass::Raw`] | Canon, Nikon, Sony, Adobe, Olympus, Panasonic, Fuji, Pentax | accepted, no special handling |
//! | [`FormatClass::Heic`] | HEIC/HEIF, or a `.heic`/`.heif` name | convert to JPEG first |
//!
//! When no media type is declared (files picked up from disk), it is inferred
//! from the extension. HEIC gets an extra filename check because capture
//! devices and file pickers often report it as an empty or generic type.

use std::path::Path;

/// Raster and vector formats accepted for compression.
pub const SUPPORTED_FORMATS: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
    "image/tiff",
    "image/bmp",
    "image/gif",
    "image/svg+xml",
    "image/avif",
];

/// Camera RAW formats, accepted but not specially processed.
pub const RAW_FORMATS: &[&str] = &[
    "image/x-canon-cr2",
    "image/x-canon-cr3",
    "image/x-nikon-nef",
    "image/x-sony-arw",
    "image/x-adobe-dng",
    "image/x-olympus-orf",
    "image/x-panasonic-rw2",
    "image/x-fuji-raf",
    "image/x-pentax-pef",
];

/// Extension → media type, lowercase extensions only.
const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("avif", "image/avif"),
    ("cr2", "image/x-canon-cr2"),
    ("cr3", "image/x-canon-cr3"),
    ("nef", "image/x-nikon-nef"),
    ("arw", "image/x-sony-arw"),
    ("dng", "image/x-adobe-dng"),
    ("orf", "image/x-olympus-orf"),
    ("rw2", "image/x-panasonic-rw2"),
    ("raf", "image/x-fuji-raf"),
    ("pef", "image/x-pentax-pef"),
];

/// How an accepted input is routed through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatClass {
    Image,
    Raw,
    Heic,
}

impl FormatClass {
    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Raw => "raw",
            Self::Heic => "heic",
        }
    }
}

/// Encoders the re-encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
    Tiff,
    Avif,
    Svg,
}

impl OutputFormat {
    /// Output encoder for a media type. RAW inputs come out as JPEG.
    pub fn for_media_type(media_type: &str) -> Option<Self> {
        let media_type = media_type.to_ascii_lowercase();
        let format = match media_type.as_str() {
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/png" => Self::Png,
            "image/webp" => Self::WebP,
            "image/gif" => Self::Gif,
            "image/bmp" => Self::Bmp,
            "image/tiff" => Self::Tiff,
            "image/avif" => Self::Avif,
            "image/svg+xml" => Self::Svg,
            other if RAW_FORMATS.contains(&other) => Self::Jpeg,
            _ => return None,
        };
        Some(format)
    }

    /// Lossy encoders honour a quality setting; the rest only shrink by scale.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::WebP | Self::Avif)
    }
}

fn has_suffix_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// True for HEIC/HEIF media types, or names ending in `.heic`/`.heif` in any case.
pub fn is_heic(media_type: &str, name: &str) -> bool {
    let media_type = media_type.to_ascii_lowercase();
    media_type == "image/heic"
        || media_type == "image/heif"
        || has_suffix_ignore_case(name, ".heic")
        || has_suffix_ignore_case(name, ".heif")
}

/// Infer a media type from the file extension.
pub fn infer_media_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    EXTENSION_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, media_type)| *media_type)
}

/// The media type classification works from: the declared one, or the
/// extension's when nothing was declared.
pub fn effective_media_type(media_type: &str, name: &str) -> Option<String> {
    if media_type.trim().is_empty() {
        infer_media_type(name).map(str::to_string)
    } else {
        Some(media_type.trim().to_ascii_lowercase())
    }
}

/// Classify an input, or `None` when it is not accepted.
pub fn classify(media_type: &str, name: &str) -> Option<FormatClass> {
    if is_heic(media_type, name) {
        return Some(FormatClass::Heic);
    }
    let effective = effective_media_type(media_type, name)?;
    if RAW_FORMATS.contains(&effective.as_str()) {
        Some(FormatClass::Raw)
    } else if SUPPORTED_FORMATS.contains(&effective.as_str()) {
        Some(FormatClass::Image)
    } else {
        None
    }
}
