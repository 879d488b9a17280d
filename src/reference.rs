//! Common average reference.
//!
//! Each sample is re-expressed relative to the mean of all channels at that
//! sample, the same as `raw.set_eeg_reference('average', projection=False)`:
//!
//! `data`: [T, C]  →  `data[t, c] -= mean(data[t, :])`
//!
//! The result has rank at most `C - 1`, which is why the decomposition that
//! follows fits one component fewer than there are channels.
use ndarray::{Array2, Axis};

pub fn average_reference_inplace(data: &mut Array2<f64>) {
    let Some(means) = data.mean_axis(Axis(1)) else {
        return;
    };
    for (mut sample, m) in data.rows_mut().into_iter().zip(means.iter()) {
        sample -= *m;
    }
}
