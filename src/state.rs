//! Caller-owned per-file processing state.
//!
//! The queue never holds this state itself: it emits [`QueueEvent`]s and a
//! [`FileStates`] store folds them into one record per file name. Status only
//! moves forward:
//!
//! ```text
//! queued → processing → completed
//!                     ↘ error
//! ```
//!
//! Completed and error are terminal; later events for the same name are
//! ignored. A failure resets progress to 0, completion sets it to 100.

use crate::imaging::Dimensions;
use crate::queue::QueueEvent;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileState {
    pub name: String,
    pub original_size: u64,
    pub progress: u8,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    pub is_oversized: bool,
}

impl FileState {
    fn queued(name: &str, original_size: u64) -> Self {
        Self {
            name: name.to_string(),
            original_size,
            progress: 0,
            status: FileStatus::Queued,
            compressed_size: None,
            dimensions: None,
            is_oversized: false,
        }
    }
}

/// One [`FileState`] per file name, in enqueue order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FileStates {
    files: Vec<FileState>,
}

impl FileStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file as queued. A name already present is left untouched.
    pub fn enqueue(&mut self, name: &str, original_size: u64) {
        if self.get(name).is_none() {
            self.files.push(FileState::queued(name, original_size));
        }
    }

    pub fn get(&self, name: &str) -> Option<&FileState> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileState> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    /// Fold an event into the store. Returns whether anything changed.
    ///
    /// Events for unknown names are ignored, as is anything arriving after a
    /// file reached a terminal status.
    pub fn apply(&mut self, event: &QueueEvent) -> bool {
        let Some(state) = self.files.iter_mut().find(|f| f.name == event.name()) else {
            return false;
        };
        if state.status.is_terminal() {
            return false;
        }

        match event {
            QueueEvent::Progress { percent, .. } => {
                state.status = FileStatus::Processing;
                state.progress = (*percent).min(100);
            }
            QueueEvent::Completed {
                compressed_size,
                dimensions,
                is_oversized,
                ..
            } => {
                state.status = FileStatus::Completed;
                state.progress = 100;
                state.compressed_size = Some(*compressed_size);
                state.dimensions = Some(*dimensions);
                state.is_oversized = *is_oversized;
            }
            QueueEvent::Failed { .. } => {
                state.status = FileStatus::Error;
                state.progress = 0;
            }
        }
        true
    }
}
