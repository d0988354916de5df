//! Final delivery of a run's results.
//!
//! | Successes | Action |
//! |---|---|
//! | 0 | nothing is saved |
//! | 1 | the file is saved under its own name |
//! | 2+ | one zip archive is built and saved |
//!
//! If building or saving the archive fails, every file is saved individually
//! in input order instead, so a run never loses finished work. Individual
//! save failures are logged and reported in the [`Delivery`], never raised.

use crate::archive::Archiver;
use crate::types::{ImageFile, numbered_name};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Highest ` (n)` counter tried before a save gives up.
const MAX_NAME_COUNTER: usize = 9999;

/// Destination for delivered files.
pub trait SaveTarget {
    /// Save `bytes` under `name`, returning where they landed.
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Saves into a directory, created on first use.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SaveTarget for DirectoryTarget {
    /// Only the final component of `name` is used, so names cannot escape
    /// the directory. Existing files are never overwritten: a taken name gets
    /// a ` (n)` counter, as a browser download would.
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("invalid file name: {name:?}"))
            })?;
        fs::create_dir_all(&self.dir)?;

        let mut candidate = file_name.clone();
        for n in 1..=MAX_NAME_COUNTER {
            let path = self.dir.join(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = numbered_name(&file_name, n);
                }
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name for {file_name:?} in {}", self.dir.display()),
        ))
    }
}

/// Result of saving one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub name: String,
    /// `None` when the save failed.
    pub path: Option<PathBuf>,
}

/// What a run delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    /// No file succeeded.
    Nothing,
    Single(SaveOutcome),
    Archive { outcome: SaveOutcome, entries: usize },
    /// Archive fallback: one save per file, in input order.
    Individual { outcomes: Vec<SaveOutcome> },
}

fn save_one(target: &dyn SaveTarget, name: &str, bytes: &[u8]) -> SaveOutcome {
    let path = match target.save(name, bytes) {
        Ok(path) => {
            info!(file = %name, path = %path.display(), "saved");
            Some(path)
        }
        Err(e) => {
            error!(file = %name, error = %e, "save failed");
            None
        }
    };
    SaveOutcome {
        name: name.to_string(),
        path,
    }
}

fn save_individually(target: &dyn SaveTarget, files: &[ImageFile]) -> Delivery {
    Delivery::Individual {
        outcomes: files
            .iter()
            .map(|f| save_one(target, &f.name, &f.bytes))
            .collect(),
    }
}

/// Deliver compressed files: single save, archive, or individual fallback.
pub fn deliver(
    archiver: &dyn Archiver,
    target: &dyn SaveTarget,
    files: &[ImageFile],
    archive_name: &str,
) -> Delivery {
    match files {
        [] => Delivery::Nothing,
        [file] => Delivery::Single(save_one(target, &file.name, &file.bytes)),
        _ => {
            let bytes = match archiver.archive(files) {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(archive = %archive_name, error = %e, "archive creation failed, saving files individually");
                    return save_individually(target, files);
                }
            };
            match target.save(archive_name, &bytes) {
                Ok(path) => {
                    info!(archive = %archive_name, entries = files.len(), path = %path.display(), "saved archive");
                    Delivery::Archive {
                        outcome: SaveOutcome {
                            name: archive_name.to_string(),
                            path: Some(path),
                        },
                        entries: files.len(),
                    }
                }
                Err(e) => {
                    error!(archive = %archive_name, error = %e, "archive save failed, saving files individually");
                    save_individually(target, files)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipArchiver;
    use crate::test_helpers::{FailingArchiver, RecordingArchiver, RecordingTarget};
    use tempfile::TempDir;

    fn files(names: &[&str]) -> Vec<ImageFile> {
        names
            .iter()
            .map(|n| ImageFile::new(*n, "image/jpeg", n.as_bytes().to_vec()))
            .collect()
    }

    // =========================================================================
    // Delivery decisions
    // =========================================================================

    #[test]
    fn nothing_to_deliver_saves_nothing() {
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::default();

        let delivery = deliver(&archiver, &target, &[], "run.zip");

        assert_eq!(delivery, Delivery::Nothing);
        assert!(target.saved().is_empty());
        assert_eq!(archiver.calls(), 0);
    }

    #[test]
    fn single_file_is_saved_directly() {
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::default();

        let delivery = deliver(&archiver, &target, &files(&["one.jpg"]), "run.zip");

        assert!(matches!(delivery, Delivery::Single(SaveOutcome { ref name, .. }) if name == "one.jpg"));
        assert_eq!(target.saved_names(), vec!["one.jpg"]);
        assert_eq!(archiver.calls(), 0);
    }

    #[test]
    fn several_files_are_archived() {
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::default();

        let delivery = deliver(&archiver, &target, &files(&["a.jpg", "b.jpg"]), "run.zip");

        assert!(matches!(delivery, Delivery::Archive { entries: 2, .. }));
        assert_eq!(archiver.calls(), 1);
        assert_eq!(target.saved_names(), vec!["run.zip"]);
    }

    #[test]
    fn archive_failure_falls_back_in_input_order() {
        let target = RecordingTarget::default();

        let delivery = deliver(
            &FailingArchiver,
            &target,
            &files(&["c.jpg", "a.jpg", "b.jpg"]),
            "run.zip",
        );

        assert!(matches!(delivery, Delivery::Individual { ref outcomes } if outcomes.len() == 3));
        assert_eq!(target.saved_names(), vec!["c.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn archive_save_failure_falls_back() {
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::failing_on(&["run.zip"]);

        let delivery = deliver(&archiver, &target, &files(&["a.jpg", "b.jpg"]), "run.zip");

        assert!(matches!(delivery, Delivery::Individual { .. }));
        assert_eq!(target.saved_names(), vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn failed_single_save_is_reported_not_raised() {
        let archiver = RecordingArchiver::default();
        let target = RecordingTarget::failing_on(&["one.jpg"]);

        let delivery = deliver(&archiver, &target, &files(&["one.jpg"]), "run.zip");

        assert_eq!(
            delivery,
            Delivery::Single(SaveOutcome {
                name: "one.jpg".into(),
                path: None
            })
        );
    }

    // =========================================================================
    // DirectoryTarget
    // =========================================================================

    #[test]
    fn directory_target_creates_dir_and_writes() {
        let tmp = TempDir::new().unwrap();
        let target = DirectoryTarget::new(tmp.path().join("out"));

        let path = target.save("a.jpg", b"data").unwrap();

        assert_eq!(path, tmp.path().join("out/a.jpg"));
        assert_eq!(fs::read(path).unwrap(), b"data");
    }

    #[test]
    fn directory_target_strips_path_components() {
        let tmp = TempDir::new().unwrap();
        let target = DirectoryTarget::new(tmp.path());

        let path = target.save("../../etc/x.jpg", b"data").unwrap();

        assert_eq!(path, tmp.path().join("x.jpg"));
    }

    #[test]
    fn directory_target_rejects_empty_name() {
        let tmp = TempDir::new().unwrap();
        let target = DirectoryTarget::new(tmp.path());
        assert!(target.save("..", b"data").is_err());
    }

    #[test]
    fn directory_target_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let target = DirectoryTarget::new(tmp.path());

        let first = target.save("IMG_1.jpg", b"first").unwrap();
        let second = target.save("IMG_1.jpg", b"second").unwrap();
        let third = target.save("IMG_1.jpg", b"third").unwrap();

        assert_eq!(first, tmp.path().join("IMG_1.jpg"));
        assert_eq!(second, tmp.path().join("IMG_1 (1).jpg"));
        assert_eq!(third, tmp.path().join("IMG_1 (2).jpg"));
        assert_eq!(fs::read(first).unwrap(), b"first");
        assert_eq!(fs::read(second).unwrap(), b"second");
    }

    #[test]
    fn same_named_results_both_survive_archive_fallback() {
        let tmp = TempDir::new().unwrap();
        let target = DirectoryTarget::new(tmp.path());
        let same_name = vec![
            ImageFile::new("IMG_1.jpg", "image/jpeg", b"from-dir-a".to_vec()),
            ImageFile::new("IMG_1.jpg", "image/jpeg", b"from-dir-b".to_vec()),
        ];

        // The zip rejects the duplicate entry, so delivery falls back.
        let delivery = deliver(&ZipArchiver::default(), &target, &same_name, "run.zip");

        let Delivery::Individual { outcomes } = delivery else {
            panic!("expected individual saves, got {delivery:?}");
        };
        let paths: Vec<PathBuf> = outcomes.into_iter().map(|o| o.path.unwrap()).collect();
        assert_ne!(paths[0], paths[1]);
        assert_eq!(fs::read(&paths[0]).unwrap(), b"from-dir-a");
        assert_eq!(fs::read(&paths[1]).unwrap(), b"from-dir-b");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[test]
    fn deliver_with_real_zip_into_directory() {
        let tmp = TempDir::new().unwrap();
        let target = DirectoryTarget::new(tmp.path());

        let delivery = deliver(
            &ZipArchiver::default(),
            &target,
            &files(&["a.jpg", "b.jpg"]),
            "run.zip",
        );

        let Delivery::Archive { outcome, .. } = delivery else {
            panic!("expected archive, got {delivery:?}");
        };
        assert_eq!(outcome.path, Some(tmp.path().join("run.zip")));
        assert!(tmp.path().join("run.zip").exists());
    }
}
