//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Compress
//!
//! Each file leads with its name; the outcome follows as an indented line.
//!
//! ```text
//! IMG_0001.jpg
//!     2.4 MB → 812.33 KB (-67%)  1680×1120
//! IMG_0002.heic
//!     error
//! panorama.png
//!     3.1 MB → 1.9 MB (-39%)  2400×600  oversized
//!
//! Compressed 2 of 3 files: 5.5 MB → 2.69 MB (-51%)
//!     1 failed
//!     1 oversized
//! Saved archive compressed/compressed_images_2024-03-09_14.05.31.zip (2 files)
//! ```
//!
//! ## Check
//!
//! ```text
//! image        photos/a.jpg
//! heic         photos/b.HEIC
//! unsupported  notes.txt
//! ```
//!
//! # Architecture
//!
//! Every display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::deliver::{Delivery, SaveOutcome};
use crate::formats::FormatClass;
use crate::queue::QueueEvent;
use crate::state::{FileStatus, FileStates};
use std::path::PathBuf;

// ============================================================================
// Sizes
// ============================================================================

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable size in base-1024 units, at most two decimals.
///
/// ```
/// # use batchpress::output::format_file_size;
/// assert_eq!(format_file_size(0), "0 B");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// assert_eq!(format_file_size(1024 * 1024), "1 MB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exp = 0;
    let mut unit = 1u64;
    while exp < SIZE_UNITS.len() - 1 && bytes >= unit * 1024 {
        unit *= 1024;
        exp += 1;
    }
    let value = bytes as f64 / unit as f64;
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[exp])
}

/// Percentage saved, rounded. Negative when the output grew; 0 when either
/// size is 0.
pub fn savings_percent(original: u64, compressed: u64) -> i64 {
    if original == 0 || compressed == 0 {
        return 0;
    }
    ((1.0 - compressed as f64 / original as f64) * 100.0).round() as i64
}

fn size_change(original: u64, compressed: u64) -> String {
    let mut line = format!(
        "{} → {}",
        format_file_size(original),
        format_file_size(compressed)
    );
    let saved = savings_percent(original, compressed);
    if saved > 0 {
        line.push_str(&format!(" (-{}%)", saved));
    }
    line
}

// ============================================================================
// Compress output
// ============================================================================

/// Format a queue event as display lines.
///
/// A file's name is printed when it starts; intermediate progress is silent.
pub fn format_queue_event(event: &QueueEvent) -> Vec<String> {
    match event {
        QueueEvent::Progress { name, percent: 0 } => vec![name.clone()],
        QueueEvent::Progress { .. } => Vec::new(),
        QueueEvent::Completed {
            original_size,
            compressed_size,
            dimensions,
            is_oversized,
            ..
        } => {
            let mut line = format!(
                "    {}  {}×{}",
                size_change(*original_size, *compressed_size),
                dimensions.width,
                dimensions.height
            );
            if *is_oversized {
                line.push_str("  oversized");
            }
            vec![line]
        }
        QueueEvent::Failed { .. } => vec!["    error".to_string()],
    }
}

pub fn print_queue_event(event: &QueueEvent) {
    for line in format_queue_event(event) {
        println!("{}", line);
    }
}

/// Format the end-of-run totals.
pub fn format_summary(states: &FileStates) -> Vec<String> {
    let done: Vec<_> = states
        .iter()
        .filter(|f| f.status == FileStatus::Completed)
        .collect();
    let original: u64 = done.iter().map(|f| f.original_size).sum();
    let compressed: u64 = done.iter().filter_map(|f| f.compressed_size).sum();

    let mut lines = Vec::new();
    if done.is_empty() {
        lines.push(format!("Compressed 0 of {} files", states.len()));
    } else {
        lines.push(format!(
            "Compressed {} of {} files: {}",
            done.len(),
            states.len(),
            size_change(original, compressed)
        ));
    }

    let failed = states.count(FileStatus::Error);
    if failed > 0 {
        lines.push(format!("    {} failed", failed));
    }
    let oversized = done.iter().filter(|f| f.is_oversized).count();
    if oversized > 0 {
        lines.push(format!("    {} oversized", oversized));
    }
    lines
}

pub fn print_summary(states: &FileStates) {
    for line in format_summary(states) {
        println!("{}", line);
    }
}

fn saved_line(outcome: &SaveOutcome) -> String {
    match &outcome.path {
        Some(path) => format!("    {}", path.display()),
        None => format!("    {}: save failed", outcome.name),
    }
}

/// Format where the results went.
pub fn format_delivery(delivery: &Delivery) -> Vec<String> {
    match delivery {
        Delivery::Nothing => vec!["Nothing to save".to_string()],
        Delivery::Single(outcome) => match &outcome.path {
            Some(path) => vec![format!("Saved {}", path.display())],
            None => vec![format!("Could not save {}", outcome.name)],
        },
        Delivery::Archive { outcome, entries } => match &outcome.path {
            Some(path) => vec![format!(
                "Saved archive {} ({} files)",
                path.display(),
                entries
            )],
            None => vec![format!("Could not save archive {}", outcome.name)],
        },
        Delivery::Individual { outcomes } => {
            let mut lines = vec!["Archive unavailable, saved files individually".to_string()];
            lines.extend(outcomes.iter().map(saved_line));
            lines
        }
    }
}

pub fn print_delivery(delivery: &Delivery) {
    for line in format_delivery(delivery) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format classification results, one aligned line per input.
pub fn format_check(entries: &[(PathBuf, Option<FormatClass>)]) -> Vec<String> {
    entries
        .iter()
        .map(|(path, class)| {
            let label = class.map(FormatClass::label).unwrap_or("unsupported");
            format!("{:<12} {}", label, path.display())
        })
        .collect()
}

pub fn print_check(entries: &[(PathBuf, Option<FormatClass>)]) {
    for line in format_check(entries) {
        println!("{}", line);
    }
}
