//! Shared types passed between the pipeline stages.
//!
//! An [`ImageFile`] is used both for queue inputs and for re-encoded outputs:
//! the orchestrator hands compressed files to delivery in the same shape it
//! received the originals.

use crate::imaging::Dimensions;
use std::collections::HashSet;
use std::io;
use std::path::Path;

/// An in-memory file: name, declared media type, and payload.
///
/// The media type may be empty when the source did not report one; the
/// classifier then falls back to the extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk. The media type is inferred from the extension
    /// (empty when unknown), and the name is the final path component.
    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let media_type = crate::formats::infer_media_type(&name).unwrap_or_default();
        Ok(Self::new(name, media_type, bytes))
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// `name` with a ` (n)` counter before its extension: `IMG_1.jpg` becomes
/// `IMG_1 (2).jpg`. A leading dot does not start an extension.
pub fn numbered_name(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({n}){}", &name[..dot], &name[dot..]),
        _ => format!("{name} ({n})"),
    }
}

/// Rename later duplicates so every file name in the batch is unique.
///
/// The first file with a name keeps it; later ones get the lowest counter
/// that collides with no name in the batch. Returns how many were renamed.
pub fn dedupe_names(files: &mut [ImageFile]) -> usize {
    let mut taken: HashSet<String> = files.iter().map(|f| f.name.clone()).collect();
    let mut seen = HashSet::new();
    let mut renamed = 0;
    for file in files.iter_mut() {
        if seen.insert(file.name.clone()) {
            continue;
        }
        let unique = (1..)
            .map(|n| numbered_name(&file.name, n))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_default();
        taken.insert(unique.clone());
        seen.insert(unique.clone());
        file.name = unique;
        renamed += 1;
    }
    renamed
}

/// Outcome of compressing a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    pub file: ImageFile,
    /// Width exceeds the oversize threshold (strictly greater).
    pub is_oversized: bool,
    pub dimensions: Dimensions,
}
