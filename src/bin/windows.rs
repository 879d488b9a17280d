/// gal-windows: cut cleaned artifacts into event-locked windows and build
/// the train/test dataset.
///
/// Reads the marker table (`{columns, data}` JSON with `Run`/`LEDOn`) and
/// every `*<artifact_suffix>` artifact in a directory, pairs them by run id
/// (`_S<digits>` in the file name), extracts past/future windows around each
/// `LEDOn`, splits them, and reports per-channel training statistics.
///
/// Optional outputs:
///   --export <path>        normalised splits + statistics as safetensors
///   --evaluate <model>     test-split MSE of a persistence or WaveNet forecaster
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use gal_eeg::{
    build, evaluate_mse, extract_runs,
    io::{load_instances, write_dataset},
    Forecaster, MarkerSchema, MarkerTable, PersistenceForecaster, Split, WaveNetConfig,
    WaveNetForecaster, WindowConfig,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    Persistence,
    Wavenet,
}

#[derive(Parser, Debug)]
#[command(name = "gal-windows", about = "Event-locked EEG windows and train/test dataset")]
struct Args {
    /// Marker JSON (`{columns, data}`).
    #[arg(long)]
    markers: PathBuf,

    /// Directory of cleaned `<session><artifact_suffix>` artifacts.
    #[arg(long)]
    artifacts: PathBuf,

    /// TOML window configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples before each event.
    #[arg(long)]
    past_len: Option<usize>,

    /// Samples from each event onward.
    #[arg(long)]
    future_len: Option<usize>,

    /// Fraction of windows used for training.
    #[arg(long)]
    train_fraction: Option<f64>,

    /// Shuffle seed for the split.
    #[arg(long)]
    seed: Option<u64>,

    /// Serve raw (un-normalised) windows.
    #[arg(long)]
    no_normalize: bool,

    /// Batch size for the batch count report.
    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    /// Write the dataset to this safetensors file.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Score a forecaster on the test split.
    #[arg(long, value_enum)]
    evaluate: Option<Model>,

    /// Log filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let mut cfg = match &args.config {
        Some(path) => WindowConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WindowConfig::default(),
    };
    if let Some(v) = args.past_len {
        cfg.past_len = v;
    }
    if let Some(v) = args.future_len {
        cfg.future_len = v;
    }
    if let Some(v) = args.train_fraction {
        cfg.train_fraction = v;
    }
    if let Some(v) = args.seed {
        cfg.split_seed = v;
    }
    if args.no_normalize {
        cfg.normalize = false;
    }

    // ── 1. Markers + artifacts ─────────────────────────────────────────────
    let markers = MarkerTable::load(&args.markers, &MarkerSchema::default())
        .with_context(|| format!("reading markers {}", args.markers.display()))?;
    let onsets = markers.onsets_by_run();
    let loaded = load_instances(&args.artifacts, &cfg.artifact_suffix)
        .with_context(|| format!("reading artifacts in {}", args.artifacts.display()))?;
    info!("{} marker runs, {} signal instances", onsets.len(), loaded.instances.len());
    for (path, reason) in &loaded.failed {
        println!("unreadable artifact {}: {reason}", path.display());
    }
    let instances = loaded.instances;

    // ── 2. Windows ─────────────────────────────────────────────────────────
    let report = extract_runs(&instances, &onsets, cfg.past_len, cfg.future_len)?;
    let (past_s, future_s) = cfg.durations();
    println!(
        "{} windows ({past_s:.1} s past / {future_s:.1} s future); skipped {} out of bounds, {} invalid",
        report.windows.len(),
        report.skipped_bounds,
        report.skipped_invalid
    );
    if !report.unmatched_runs.is_empty() {
        println!("marker runs without signal: {:?}", report.unmatched_runs);
    }
    if !report.unmatched_instances.is_empty() {
        println!("signal runs without markers: {:?}", report.unmatched_instances);
    }

    // ── 3. Dataset ─────────────────────────────────────────────────────────
    let dataset = build(report.windows, cfg.train_fraction, cfg.split_seed, cfg.normalize)?;
    let n_batches = dataset.len(Split::Train).div_ceil(args.batch_size.max(1));
    println!(
        "train {} ({n_batches} batches of {}), test {}",
        dataset.len(Split::Train),
        args.batch_size,
        dataset.len(Split::Test)
    );
    let stats = dataset.stats();
    for c in 0..stats.n_channels() {
        println!("  ch {c:>2}: mean {:>10.4}  std {:>10.4}", stats.means[c], stats.stds[c]);
    }

    if let Some(path) = &args.export {
        write_dataset(path, &dataset).with_context(|| format!("writing {}", path.display()))?;
        println!("Written → {}", path.display());
    }

    // ── 4. Baseline forecast ───────────────────────────────────────────────
    if let Some(model) = args.evaluate {
        let forecaster: Box<dyn Forecaster> = match model {
            Model::Persistence => Box::new(PersistenceForecaster),
            Model::Wavenet => Box::new(WaveNetForecaster::new(WaveNetConfig {
                in_channels: dataset.n_channels(),
                ..WaveNetConfig::default()
            })?),
        };
        let mse = evaluate_mse(&dataset, Split::Test, forecaster.as_ref())?;
        println!("{model:?} test MSE: {mse:.4}");
    }
    Ok(())
}
