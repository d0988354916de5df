//! Zip archive assembly.
//!
//! When a run produces more than one file, the results are bundled into a
//! single in-memory zip (DEFLATE, level 6 by default) named after the run's
//! wall-clock time:
//!
//! ```text
//! compressed_images_2024-03-09_14.05.31.zip
//! ```
//!
//! The [`Archiver`] trait is the seam the queue uses, so tests can substitute
//! an archiver that fails and exercise the individual-save fallback.

use crate::config::ArchiveConfig;
use crate::types::ImageFile;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Duplicate entry name: {0}")]
    DuplicateName(String),
}

/// Bundles files into a single archive payload.
pub trait Archiver {
    fn archive(&self, files: &[ImageFile]) -> Result<Vec<u8>, ArchiveError>;
}

/// DEFLATE zip archiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipArchiver {
    level: i64,
}

impl ZipArchiver {
    /// Archiver at a DEFLATE level (0-9).
    pub fn new(level: i64) -> Self {
        Self { level }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(config.compression_level)
    }

    pub fn level(&self) -> i64 {
        self.level
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Archiver for ZipArchiver {
    /// Each file becomes one entry under its own name, in input order.
    fn archive(&self, files: &[ImageFile]) -> Result<Vec<u8>, ArchiveError> {
        let mut seen = HashSet::new();
        if let Some(dup) = files.iter().find(|f| !seen.insert(f.name.as_str())) {
            return Err(ArchiveError::DuplicateName(dup.name.clone()));
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.level));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for file in files {
            writer.start_file(file.name.as_str(), options)?;
            writer.write_all(&file.bytes)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

/// Archive file name for a run started at `at`.
///
/// ```
/// # use batchpress::archive::archive_name;
/// let at = chrono::NaiveDate::from_ymd_opt(2024, 3, 9)
///     .unwrap()
///     .and_hms_opt(14, 5, 31)
///     .unwrap();
/// assert_eq!(
///     archive_name("compressed_images", &at),
///     "compressed_images_2024-03-09_14.05.31.zip"
/// );
/// ```
pub fn archive_name(prefix: &str, at: &NaiveDateTime) -> String {
    format!("{}_{}.zip", prefix, at.format("%Y-%m-%d_%H.%M.%S"))
}
