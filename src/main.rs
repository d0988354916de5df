use batchpress::config::{self, PressConfig};
use batchpress::deliver::DirectoryTarget;
use batchpress::formats::classify;
use batchpress::state::FileStates;
use batchpress::types::{ImageFile, dedupe_names};
use batchpress::{output, queue};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "batchpress")]
#[command(about = "Batch image compressor")]
#[command(long_about = "\
Batch image compressor

Downsizes and recompresses images under format-aware size budgets:

  JPEG, TIFF, BMP, AVIF, RAW   1 MB
  PNG, SVG                     2 MB
  GIF                          3 MB
  WebP                         0.8 MB
  anything under 100 KB        90% of its size, at least 0.1 MB

The longer edge is limited to 1680 px. HEIC/HEIF inputs are converted to
JPEG first (requires the `heic` build feature). One result is saved as-is;
several are bundled into compressed_images_<date>_<time>.zip.

Set RUST_LOG=debug for encoder diagnostics on stderr.

Run 'batchpress gen-config' to generate a documented batchpress.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (missing file means stock defaults)
    #[arg(long, default_value = "batchpress.toml", global = true)]
    config: PathBuf,

    /// Output directory
    #[arg(long, default_value = "compressed", global = true)]
    output: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images and save the results
    Compress {
        /// Files or directories (searched recursively)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write the final per-file states as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show how each input would be classified
    Check {
        /// Files or directories (searched recursively)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print a stock batchpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Compress { inputs, report } => {
            let press_config = config::load_config(&cli.config)?;
            init_thread_pool(&press_config.processing);
            std::fs::create_dir_all(&cli.output)?;

            let mut files = read_inputs(&inputs, &cli.output);
            let renamed = dedupe_names(&mut files);
            if renamed > 0 {
                warn!(renamed, "duplicate input names renamed");
                println!("Renamed {renamed} input(s) sharing a file name");
            }
            let mut states = FileStates::new();
            for file in &files {
                states.enqueue(&file.name, file.size());
            }

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_queue_event(&event);
                    states.apply(&event);
                }
                states
            });
            let delivery = compress(&press_config, &cli.output, &files, tx);
            let states = printer.join().map_err(|_| "output thread panicked")?;

            println!();
            output::print_summary(&states);
            output::print_delivery(&delivery);

            if let Some(report) = report {
                std::fs::write(&report, serde_json::to_string_pretty(&states)?)?;
            }
        }
        Command::Check { inputs } => {
            let entries: Vec<_> = expand_inputs(&inputs, &cli.output)
                .into_iter()
                .map(|path| {
                    let name = file_name(&path);
                    let class = classify("", &name);
                    (path, class)
                })
                .collect();
            output::print_check(&entries);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn compress(
    config: &PressConfig,
    output_dir: &Path,
    files: &[ImageFile],
    events: std::sync::mpsc::Sender<queue::QueueEvent>,
) -> batchpress::deliver::Delivery {
    let target = DirectoryTarget::new(output_dir);
    queue::process_queue(config, &target, files, Some(events))
}

/// Diagnostics go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Expand directories into their files, sorted by name; plain paths pass through.
///
/// Anything under `output_dir` is skipped, so earlier results are not fed
/// back in when the output lives inside an input directory.
fn expand_inputs(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let output_dir = output_dir.canonicalize().ok();
    let is_output = |path: &Path| match (&output_dir, path.canonicalize()) {
        (Some(out), Ok(path)) => path.starts_with(out),
        _ => false,
    };

    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let walker = WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !(entry.file_type().is_dir() && is_output(entry.path())));
            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        paths.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "skipping unreadable entry"),
                }
            }
        } else {
            paths.push(input.clone());
        }
    }
    paths
}

/// Read every accepted input; unsupported or unreadable files are skipped.
fn read_inputs(inputs: &[PathBuf], output_dir: &Path) -> Vec<ImageFile> {
    let mut files = Vec::new();
    for path in expand_inputs(inputs, output_dir) {
        if classify("", &file_name(&path)).is_none() {
            warn!(path = %path.display(), "skipping unsupported file");
            println!("Skipping unsupported file: {}", path.display());
            continue;
        }
        match ImageFile::read(&path) {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                println!("Skipping unreadable file: {}", path.display());
            }
        }
    }
    files
}
