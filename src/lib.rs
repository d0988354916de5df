//! # batchpress
//!
//! Batch image compression: hand it a set of images, get back smaller ones.
//! Each file is classified, converted from HEIC when needed, downsized and
//! recompressed under a format-aware size budget, and the results are saved
//! either as a single file or as one timestamped zip archive.
//!
//! # Architecture: Linear Pipeline
//!
//! ```text
//! classify → [convert HEIC] → select options → re-encode → measure
//!                                                   ↓
//!                       accumulate successes → deliver (file | zip | fallback)
//! ```
//!
//! Files are processed strictly one after another. The orchestrator never owns
//! per-file state: it emits [`queue::QueueEvent`]s over a channel and the caller
//! folds them into whatever it wants to display (the CLI uses
//! [`state::FileStates`]).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`formats`] | Classifier: supported, RAW and HEIC media types; extension inference |
//! | [`policy`] | Compression option selection from media type and size |
//! | [`imaging`] | Backend trait, pure-Rust re-encoder, HEIC conversion, `compress_image` |
//! | [`queue`] | Sequential orchestrator and its event contract |
//! | [`archive`] | Zip assembly and run-timestamped archive names |
//! | [`deliver`] | Single-file, archive, or individual-fallback delivery |
//! | [`state`] | Caller-side per-file status store with forward-only transitions |
//! | [`config`] | `batchpress.toml` loading, merging over stock defaults, validation |
//! | [`types`] | `ImageFile` and `CompressionResult` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Failures Stay Per-File
//!
//! A file that cannot be converted, re-encoded or measured is reported as
//! failed and the run moves on. Archive problems fall back to saving files one
//! by one. No error ends a run; the worst case is a run that saves nothing.
//!
//! ## Backend Behind a Trait
//!
//! All pixel work goes through [`imaging::ImageBackend`]. Production uses the
//! pure-Rust [`imaging::RustBackend`]; tests use a mock that records calls, so
//! orchestration logic is tested without encoding a single image.
//!
//! ## HEIC Is Opt-In
//!
//! HEIC decoding needs the system libheif, so it lives behind the `heic`
//! cargo feature. Without it HEIC inputs fail individually and the rest of
//! the batch is unaffected.

pub mod archive;
pub mod config;
pub mod deliver;
pub mod formats;
pub mod imaging;
pub mod output;
pub mod policy;
pub mod queue;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
