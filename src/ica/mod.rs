//! Source separation engine.
//!
//! - [`fastica`]: seeded parallel FastICA (`linfa-ica`), convergence check,
//!   reconstruction and exclusion.
//! - [`linalg`]: sorted `linfa-linalg` eigen-decomposition, symmetric
//!   decorrelation, pseudo-inverses and rank estimation.

pub mod fastica;
pub mod linalg;

pub use fastica::{
    decompose, estimate_rank, reconstruct, reconstruct_excluding, Decomposition, IcaParams,
};
