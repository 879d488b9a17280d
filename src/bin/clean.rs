/// gal-clean: run the cleaning pipeline over session JSON files.
///
/// For every input `<dir>/<session>.json`:
///   <out-dir>/<session>.json                       processed session with
///                                                  filtered_data, ica_components,
///                                                  ica_mixing_matrix, reconstructed_data
///   <out-dir>/<session><artifact_suffix>           cleaned [C, T] signal
///   <out-dir>/<session>_neural_sources.safetensors kept source activations
///                                                  (with --export-sources)
///
/// A failing session is reported and skipped; the processed JSON still
/// carries the stages that completed.  Exit status is non-zero if any
/// session failed.
use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::{Path, PathBuf};

use gal_eeg::{
    clean_session,
    io::{artifact_path, write_neural_sources},
    FeatureClassifier, PipelineConfig, PrecomputedLabels, Session, SourceClassifier, VariancePolicy,
};

#[derive(Parser, Debug)]
#[command(name = "gal-clean", about = "Band-pass + FastICA artifact removal for grasp-and-lift EEG")]
struct Args {
    /// Session JSON files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for processed sessions and cleaned artifacts.
    #[arg(long)]
    out_dir: PathBuf,

    /// TOML pipeline configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of `<session>_labels.json` files from an external labeller.
    /// Without it sources are labelled from their features.
    #[arg(long)]
    labels_dir: Option<PathBuf>,

    /// Lower band-pass edge (Hz).
    #[arg(long)]
    low_hz: Option<f64>,

    /// Upper band-pass edge (Hz).
    #[arg(long)]
    high_hz: Option<f64>,

    /// FastICA seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ICA components (default: data rank).
    #[arg(long)]
    n_components: Option<usize>,

    /// Keep every channel instead of the sensorimotor pick list.
    #[arg(long)]
    all_channels: bool,

    /// Skip the average reference.
    #[arg(long)]
    no_reference: bool,

    /// Fail on flat channels instead of flooring their std.
    #[arg(long)]
    fail_on_flat: bool,

    /// Also write kept-source activations.
    #[arg(long)]
    export_sources: bool,

    /// Log filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(v) = args.low_hz {
        cfg.low_hz = v;
    }
    if let Some(v) = args.high_hz {
        cfg.high_hz = v;
    }
    if let Some(v) = args.seed {
        cfg.ica_seed = v;
    }
    if args.n_components.is_some() {
        cfg.n_components = args.n_components;
    }
    if args.all_channels {
        cfg.pick_channels.clear();
    }
    if args.no_reference {
        cfg.average_reference = false;
    }
    if args.fail_on_flat {
        cfg.variance_policy = VariancePolicy::Fail;
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut failed = Vec::new();
    for input in &args.inputs {
        let outcome = session_name(input).and_then(|name| run_one(&name, input, &args, &cfg));
        if let Err(e) = outcome {
            error!("{}: {e:#}", input.display());
            failed.push(input.display().to_string());
        }
    }

    let ok = args.inputs.len() - failed.len();
    info!("{ok}/{} sessions cleaned", args.inputs.len());
    if !failed.is_empty() {
        bail!("{} session(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn run_one(name: &str, input: &Path, args: &Args, cfg: &PipelineConfig) -> Result<()> {
    let mut session = Session::load(input).with_context(|| format!("reading {}", input.display()))?;

    let classifier: Box<dyn SourceClassifier> = match &args.labels_dir {
        Some(dir) => {
            let path = dir.join(format!("{name}_labels.json"));
            Box::new(
                PrecomputedLabels::load(&path)
                    .with_context(|| format!("reading labels {}", path.display()))?,
            )
        }
        None => Box::new(FeatureClassifier::default()),
    };

    let result = clean_session(name, &mut session, classifier.as_ref(), cfg);

    let processed = args.out_dir.join(format!("{name}.json"));
    session
        .save(&processed)
        .with_context(|| format!("writing {}", processed.display()))?;

    let out = result?;
    let artifact = artifact_path(&args.out_dir, name, &cfg.artifact_suffix);
    out.artifact()
        .write(&artifact)
        .with_context(|| format!("writing {}", artifact.display()))?;
    info!(
        "{name}: kept {} of {} sources → {}",
        out.kept.len(),
        out.labels.len(),
        artifact.display()
    );

    if args.export_sources {
        let path = artifact_path(&args.out_dir, name, "_neural_sources.safetensors");
        write_neural_sources(&path, &out.neural_sources, &out.kept, out.sfreq)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn session_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("no file stem in {}", path.display()))
}
