//! Error taxonomy shared by every pipeline stage.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad filter bounds, component counts, split fractions, window lengths.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// FastICA fixed-point iteration did not converge.
    #[error("ICA did not converge after {iterations} iterations (last change {last_change:.3e}, tol {tol:.1e})")]
    Convergence {
        iterations: usize,
        last_change: f64,
        tol: f64,
    },

    /// FastICA fit rejected by `linfa-ica`.
    #[error("FastICA failed: {0}")]
    Ica(String),

    /// Eigen-decomposition failure from `linfa-linalg`.
    #[error("linear algebra error: {0}")]
    Linalg(String),

    /// Channel names that the scalp montage does not know.
    #[error("insufficient classifier context: channels not in montage: {}", .0.join(", "))]
    InsufficientContext(Vec<String>),

    #[error("no sources labelled '{0}'; refusing to reconstruct an all-artifact signal")]
    NoNeuralSources(String),

    #[error("channel '{0}' has zero variance after reconstruction")]
    DegenerateChannel(String),

    #[error("index {index} out of range for split of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Structurally malformed input (ragged rows, duplicate names, unknown columns).
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
