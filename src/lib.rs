//! # gal-eeg — grasp-and-lift EEG cleaning and event windowing in pure Rust
//!
//! `gal-eeg` removes physiological and motion artifacts from EEG recorded
//! during grasp-and-lift trials, then cuts the cleaned signal into
//! past/future windows around each `LEDOn` cue for forecasting models.
//!
//! ## Pipeline overview
//!
//! ```text
//! session JSON (EEG/EMG/KIN/ENV/MISC)
//!   │
//!   ├─ session::Session::load()    typed, validated signal blocks
//!   ├─ pick                        14 sensorimotor channels
//!   ├─ reference                   per-sample channel mean removed
//!   ├─ filter::bandpass_filter()   Butterworth SOS, forward-backward, 1–40 Hz
//!   ├─ ica::decompose()            parallel FastICA (logcosh), seeded
//!   ├─ classify                    brain / muscle / eye / heart / line / channel / other
//!   └─ clean::clean()              brain sources only → per-channel z-score
//!        │
//!        └─→ <session>_eeg.safetensors   [C, T] f32
//!
//! marker JSON (Run, LEDOn, …) + cleaned artifacts
//!   │
//!   ├─ windows::extract_runs()     past [t-past_len, t) / future [t, t+future_len)
//!   ├─ dataset::build()            seeded 80/20 split, frozen training stats
//!   └─ forecast::evaluate_mse()    persistence / WaveNet forecasters
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use gal_eeg::{clean_session, FeatureClassifier, PipelineConfig, Session};
//! use std::path::Path;
//!
//! let mut session = Session::load(Path::new("data/HS_P1_S1.json")).unwrap();
//! let cfg = PipelineConfig::default();
//! let out = clean_session("HS_P1_S1", &mut session, &FeatureClassifier::default(), &cfg).unwrap();
//! out.artifact().write(Path::new("data/HS_P1_S1_eeg.safetensors")).unwrap();
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use gal_eeg::filter::bandpass_filter;
//! use gal_eeg::ica::{decompose, IcaParams};
//! use gal_eeg::reference::average_reference_inplace;
//! use ndarray::Array2;
//!
//! let mut data: Array2<f64> = Array2::zeros((5000, 14)); // [T, C]
//! average_reference_inplace(&mut data);
//! let filtered = bandpass_filter(&data, 1.0, 40.0, 500.0, 5).unwrap();
//! let decomp = decompose(&filtered, &IcaParams { n_components: Some(13), ..IcaParams::default() }).unwrap();
//! let rebuilt = decomp.reconstruct();
//! ```

pub mod classify;
pub mod clean;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod forecast;
pub mod ica;
pub mod io;
pub mod markers;
pub mod montage;
pub mod normalize;
pub mod pipeline;
pub mod reference;
pub mod session;
pub mod windows;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config / errors
pub use config::{PipelineConfig, VariancePolicy, WindowConfig, MOTOR_CHANNELS, STD_EPSILON};
pub use error::{Error, Result};

// interchange
pub use markers::{LiftEvent, MarkerSchema, MarkerTable};
pub use session::{EegStage, EegStages, Modality, Session, SignalBlock};

// signal stages
pub use filter::{bandpass_filter, design_bandpass};
pub use ica::{decompose, estimate_rank, reconstruct, reconstruct_excluding, Decomposition, IcaParams};
pub use reference::average_reference_inplace;

// classification / reconstruction
pub use classify::{FeatureClassifier, Label, PrecomputedLabels, SignalContext, SourceClassifier, SourceLabel};
pub use clean::{clean, Cleaned};
pub use montage::Montage;
pub use normalize::{zscore_channels, ChannelStats};

// windows / dataset / models
pub use dataset::{build, Batch, Split, WindowedDataset};
pub use forecast::{evaluate_mse, Forecaster, PersistenceForecaster, WaveNetConfig, WaveNetForecaster};
pub use windows::{extract, extract_runs, seconds_to_sample, ExtractionReport, SignalInstance, WindowPair};

// io
pub use io::{parse_run_id, CleanedArtifact, LoadedInstances, StWriter, ARTIFACT_SUFFIX};

// pipeline
pub use pipeline::{clean_session, CleanOutput, Stage, StageError};
