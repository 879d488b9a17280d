mod common;
use common::{max_abs_diff, mixed};
use gal_eeg::{average_reference_inplace, estimate_rank};
use ndarray::{Array2, Axis};

#[test]
fn average_reference_zero_sample_sum() {
    let mut data = mixed(1000);
    average_reference_inplace(&mut data);
    let row_sums = data.sum_axis(Axis(1));
    for (t, &s) in row_sums.iter().enumerate() {
        assert!(s.abs() < 1e-10, "sample {t} sum = {s:.2e} after average reference");
    }
}

#[test]
fn average_reference_is_idempotent() {
    let mut once = mixed(500);
    average_reference_inplace(&mut once);
    let mut twice = once.clone();
    average_reference_inplace(&mut twice);
    assert!(max_abs_diff(&once, &twice) < 1e-12);
}

#[test]
fn average_reference_drops_rank_by_one() {
    let mut data = mixed(2000);
    assert_eq!(estimate_rank(&data).unwrap(), 4);
    average_reference_inplace(&mut data);
    assert_eq!(estimate_rank(&data).unwrap(), 3);
}

#[test]
fn common_offset_is_removed() {
    let base = mixed(300);
    let mut shifted = Array2::from_shape_fn(base.dim(), |(t, c)| base[[t, c]] + 7.5 * t as f64);
    let mut plain = base.clone();
    average_reference_inplace(&mut shifted);
    average_reference_inplace(&mut plain);
    assert!(max_abs_diff(&shifted, &plain) < 1e-9);
}
