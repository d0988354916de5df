//! Queue orchestration.
//!
//! Drives every input through [`compress_image`] one at a time, in input
//! order, then hands the successes to [`deliver`]. Per-file outcomes are
//! reported as [`QueueEvent`]s over an optional channel; whoever owns the
//! receiving end keeps its own state (see [`crate::state`]).
//!
//! For each file the event order is fixed:
//!
//! ```text
//! Progress(0) → Progress(n)... → Completed | Failed
//! ```
//!
//! A failing file never stops the run, and delivery problems degrade to
//! individual saves. The worst outcome is an empty run, which saves nothing.

use crate::archive::{Archiver, ZipArchiver, archive_name};
use crate::config::PressConfig;
use crate::deliver::{Delivery, SaveTarget, deliver};
use crate::imaging::{CompressSettings, Dimensions, ImageBackend, RustBackend, compress_image};
use crate::types::ImageFile;
use chrono::Local;
use std::sync::mpsc::Sender;
use tracing::{error, info};

/// Per-file progress, completion, and failure notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Progress {
        name: String,
        percent: u8,
    },
    Completed {
        name: String,
        original_size: u64,
        compressed_size: u64,
        dimensions: Dimensions,
        is_oversized: bool,
    },
    /// The file was dropped from the run; details go to the log only.
    Failed {
        name: String,
    },
}

impl QueueEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::Progress { name, .. } | Self::Completed { name, .. } | Self::Failed { name } => {
                name
            }
        }
    }
}

/// Run-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSettings {
    pub compress: CompressSettings,
    pub archive_prefix: String,
}

impl QueueSettings {
    pub fn from_config(config: &PressConfig) -> Self {
        Self {
            compress: CompressSettings::from_config(config),
            archive_prefix: config.archive.name_prefix.clone(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&PressConfig::default())
    }
}

fn emit(events: &Option<Sender<QueueEvent>>, event: QueueEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        tx.send(event).ok();
    }
}

/// Compress every file, then deliver the successes.
pub fn process_queue_with(
    backend: &impl ImageBackend,
    archiver: &dyn Archiver,
    target: &dyn SaveTarget,
    settings: &QueueSettings,
    files: &[ImageFile],
    events: Option<Sender<QueueEvent>>,
) -> Delivery {
    let mut compressed = Vec::new();

    for file in files {
        emit(
            &events,
            QueueEvent::Progress {
                name: file.name.clone(),
                percent: 0,
            },
        );

        let mut on_progress = |percent: u8| {
            emit(
                &events,
                QueueEvent::Progress {
                    name: file.name.clone(),
                    percent,
                },
            );
        };

        match compress_image(backend, file, &settings.compress, &mut on_progress) {
            Ok(result) => {
                info!(
                    file = %file.name,
                    original = file.size(),
                    compressed = result.file.size(),
                    width = result.dimensions.width,
                    "compressed"
                );
                emit(
                    &events,
                    QueueEvent::Completed {
                        name: file.name.clone(),
                        original_size: file.size(),
                        compressed_size: result.file.size(),
                        dimensions: result.dimensions,
                        is_oversized: result.is_oversized,
                    },
                );
                compressed.push(result.file);
            }
            Err(e) => {
                error!(file = %file.name, error = %e, "compression failed");
                emit(
                    &events,
                    QueueEvent::Failed {
                        name: file.name.clone(),
                    },
                );
            }
        }
    }

    let name = archive_name(&settings.archive_prefix, &Local::now().naive_local());
    deliver(archiver, target, &compressed, &name)
}

/// [`process_queue_with`] using the pure Rust backend and zip archives.
pub fn process_queue(
    config: &PressConfig,
    target: &dyn SaveTarget,
    files: &[ImageFile],
    events: Option<Sender<QueueEvent>>,
) -> Delivery {
    process_queue_with(
        &RustBackend::new(),
        &ZipArchiver::from_config(&config.archive),
        target,
        &QueueSettings::from_config(config),
        files,
        events,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{FailingArchiver, RecordingArchiver, RecordingTarget};
    use std::sync::mpsc;

    fn file(name: &str, bytes: &[u8]) -> ImageFile {
        ImageFile::new(name, "image/jpeg", bytes.to_vec())
    }

    fn run(
        backend: &MockBackend,
        archiver: &dyn Archiver,
        target: &dyn SaveTarget,
        files: &[ImageFile],
    ) -> (Delivery, Vec<QueueEvent>) {
        let (tx, rx) = mpsc::channel();
        let delivery = process_queue_with(
            backend,
            archiver,
            target,
            &QueueSettings::default(),
            files,
            Some(tx),
        );
        (delivery, rx.into_iter().collect())
    }

    fn completed(events: &[QueueEvent]) -> Vec<&str> {
        events
            .iter()
            .filter(|e| matches!(e, QueueEvent::Completed { .. }))
            .map(QueueEvent::name)
            .collect()
    }

    fn failed(events: &[QueueEvent]) -> Vec<&str> {
        events
            .iter()
            .filter(|e| matches!(e, QueueEvent::Failed { .. }))
            .map(QueueEvent::name)
            .collect()
    }

    // =========================================================================
    // Resilience and delivery
    // =========================================================================

    #[test]
    fn middle_failure_still_archives_the_rest() {
        let backend = MockBackend::failing_on(&[b"two"]);
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::default();
        let files = [file("1.jpg", b"one"), file("2.jpg", b"two"), file("3.jpg", b"three")];

        let (delivery, events) = run(&backend, &archiver, &target, &files);

        assert_eq!(failed(&events), vec!["2.jpg"]);
        assert_eq!(completed(&events), vec!["1.jpg", "3.jpg"]);
        assert_eq!(archiver.batches(), vec![vec!["1.jpg", "3.jpg"]]);
        assert!(matches!(delivery, Delivery::Archive { entries: 2, .. }));
        let saved = target.saved_names();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].starts_with("compressed_images_"));
        assert!(saved[0].ends_with(".zip"));
    }

    #[test]
    fn single_success_is_saved_without_archive() {
        let backend = MockBackend::new();
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::default();

        let (delivery, _) = run(&backend, &archiver, &target, &[file("only.jpg", b"x")]);

        assert!(matches!(delivery, Delivery::Single(_)));
        assert_eq!(archiver.calls(), 0);
        assert_eq!(target.saved(), vec![("only.jpg".to_string(), b"x-z".to_vec())]);
    }

    #[test]
    fn all_failures_save_nothing() {
        let backend = MockBackend::failing_on(&[b"a", b"b"]);
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::default();

        let (delivery, events) = run(
            &backend,
            &archiver,
            &target,
            &[file("a.jpg", b"a"), file("b.jpg", b"b")],
        );

        assert_eq!(delivery, Delivery::Nothing);
        assert_eq!(failed(&events), vec!["a.jpg", "b.jpg"]);
        assert!(target.saved().is_empty());
        assert_eq!(archiver.calls(), 0);
    }

    #[test]
    fn empty_queue_saves_nothing() {
        let backend = MockBackend::new();
        let target = RecordingTarget::default();

        let (delivery, events) = run(&backend, &RecordingArchiver::default(), &target, &[]);

        assert_eq!(delivery, Delivery::Nothing);
        assert!(events.is_empty());
    }

    #[test]
    fn archive_failure_saves_each_success_in_order() {
        let backend = MockBackend::failing_on(&[b"b"]);
        let target = RecordingTarget::default();
        let files = [
            file("c.jpg", b"c"),
            file("b.jpg", b"b"),
            file("a.jpg", b"a"),
            file("d.jpg", b"d"),
        ];

        let (delivery, _) = run(&backend, &FailingArchiver, &target, &files);

        assert!(matches!(delivery, Delivery::Individual { .. }));
        assert_eq!(target.saved_names(), vec!["c.jpg", "a.jpg", "d.jpg"]);
    }

    // =========================================================================
    // Event ordering
    // =========================================================================

    #[test]
    fn progress_precedes_outcome_for_each_file() {
        let backend = MockBackend {
            progress_steps: vec![30, 60],
            ..MockBackend::default()
        };
        let target = RecordingTarget::default();

        let (_, events) = run(
            &backend,
            &RecordingArchiver::default(),
            &target,
            &[file("a.jpg", b"a"), file("b.jpg", b"b")],
        );

        let percents = |name: &str| -> Vec<u8> {
            events
                .iter()
                .filter_map(|e| match e {
                    QueueEvent::Progress { name: n, percent } if n == name => Some(*percent),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(percents("a.jpg"), vec![0, 30, 60, 100]);
        assert_eq!(percents("b.jpg"), vec![0, 30, 60, 100]);

        // Files are strictly sequential: a finishes before b starts
        let a_done = events
            .iter()
            .position(|e| matches!(e, QueueEvent::Completed { name, .. } if name == "a.jpg"))
            .unwrap();
        let b_start = events.iter().position(|e| e.name() == "b.jpg").unwrap();
        assert!(a_done < b_start);
        assert!(matches!(events.last(), Some(QueueEvent::Completed { name, .. }) if name == "b.jpg"));
    }

    #[test]
    fn failed_file_gets_progress_zero_then_failed() {
        let backend = MockBackend::failing_on(&[b"bad"]);
        let target = RecordingTarget::default();

        let (_, events) = run(
            &backend,
            &RecordingArchiver::default(),
            &target,
            &[file("bad.jpg", b"bad")],
        );

        assert_eq!(
            events,
            vec![
                QueueEvent::Progress {
                    name: "bad.jpg".into(),
                    percent: 0
                },
                QueueEvent::Failed {
                    name: "bad.jpg".into()
                },
            ]
        );
    }

    #[test]
    fn completed_event_reports_sizes_and_dimensions() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 2000,
            height: 1500,
        }]);
        let target = RecordingTarget::default();

        let (_, events) = run(
            &backend,
            &RecordingArchiver::default(),
            &target,
            &[file("wide.jpg", b"wide")],
        );

        assert!(events.contains(&QueueEvent::Completed {
            name: "wide.jpg".into(),
            original_size: 4,
            compressed_size: 6,
            dimensions: Dimensions {
                width: 2000,
                height: 1500
            },
            is_oversized: true,
        }));
    }

    #[test]
    fn runs_without_listener() {
        let backend = MockBackend::new();
        let target = RecordingTarget::default();

        let delivery = process_queue_with(
            &backend,
            &RecordingArchiver::default(),
            &target,
            &QueueSettings::default(),
            &[file("a.jpg", b"a")],
            None,
        );

        assert!(matches!(delivery, Delivery::Single(_)));
    }

    #[test]
    fn archive_prefix_comes_from_config() {
        let mut config = PressConfig::default();
        config.archive.name_prefix = "batch".into();
        let settings = QueueSettings::from_config(&config);

        let backend = MockBackend::new();
        let target = RecordingTarget::default();
        process_queue_with(
            &backend,
            &RecordingArchiver::default(),
            &target,
            &settings,
            &[file("a.jpg", b"a"), file("b.jpg", b"b")],
            None,
        );

        assert!(target.saved_names()[0].starts_with("batch_"));
    }
}
