mod common;
use common::position_coded;
use gal_eeg::{
    build, extract, extract_runs, seconds_to_sample, Error, MarkerSchema, MarkerTable, SignalInstance, Split,
};
use ndarray::s;

#[test]
fn window_around_event_1200() {
    let x = position_coded(3, 2000);
    let w = extract(&x, &[1200], 1000, 500).unwrap();
    assert_eq!(w.len(), 1);
    assert_eq!(w[0].past, x.slice(s![.., 200..1200]));
    assert_eq!(w[0].future, x.slice(s![.., 1200..1700]));
    assert_eq!(w[0].past.dim(), (3, 1000));
    assert_eq!(w[0].future.dim(), (3, 500));
}

#[test]
fn windows_are_half_open_at_the_event() {
    let x = position_coded(2, 100);
    let w = extract(&x, &[40], 10, 5).unwrap();
    for c in 0..2 {
        let base = (c * 10_000) as f64;
        assert_eq!(w[0].past[[c, 9]], base + 39.0);
        assert_eq!(w[0].future[[c, 0]], base + 40.0);
        assert_eq!(w[0].past[[c, 0]], base + 30.0);
        assert_eq!(w[0].future[[c, 4]], base + 44.0);
    }
}

#[test]
fn early_event_is_skipped_others_kept() {
    let x = position_coded(3, 2000);
    let w = extract(&x, &[1200, 50], 1000, 500).unwrap();
    assert_eq!(w.len(), 1);
    assert_eq!(w[0].future[[0, 0]], 1200.0);
}

#[test]
fn boundary_events_are_inclusive() {
    let x = position_coded(1, 2000);
    // t = past_len and t + future_len = T are both in bounds.
    let w = extract(&x, &[1000, 1500, 1501], 1000, 500).unwrap();
    assert_eq!(w.len(), 2);
    assert_eq!(w[1].future[[0, 499]], 1999.0);
}

#[test]
fn windows_come_out_in_time_order() {
    let x = position_coded(1, 5000);
    let w = extract(&x, &[3000, 1200, 2100], 1000, 500).unwrap();
    let starts: Vec<f64> = w.iter().map(|p| p.future[[0, 0]]).collect();
    assert_eq!(starts, vec![1200.0, 2100.0, 3000.0]);
}

#[test]
fn zero_lengths_are_rejected() {
    let x = position_coded(1, 100);
    assert!(matches!(extract(&x, &[50], 0, 5), Err(Error::InvalidParameter(_))));
    assert!(matches!(extract(&x, &[50], 5, 0), Err(Error::InvalidParameter(_))));
}

#[test]
fn seconds_round_to_nearest_sample() {
    assert_eq!(seconds_to_sample(2.4, 500.0), Some(1200));
    assert_eq!(seconds_to_sample(2.4011, 500.0), Some(1201));
    assert_eq!(seconds_to_sample(0.0, 500.0), Some(0));
    assert_eq!(seconds_to_sample(-0.0005, 500.0), None);
    assert_eq!(seconds_to_sample(f64::NAN, 500.0), None);
}

const MARKERS: &str = r#"{
  "columns": ["Run", "Lift", "LEDOn", "LEDOff", "CurW"],
  "data": [
    [1, 1, 2.4,  4.0, 165],
    [1, 2, 6.0,  7.5, 330],
    [1, 3, 0.1,  1.0, 165],
    [2, 1, 3.0,  4.2, 660],
    [2, 2, null, 5.0, 165],
    [3, 1, 2.0,  3.0, 165]
  ]
}"#;

#[test]
fn markers_pair_with_runs() {
    let table = MarkerTable::from_json_str(MARKERS, &MarkerSchema::default()).unwrap();
    let onsets = table.onsets_by_run();
    assert_eq!(onsets[&1], vec![0.1, 2.4, 6.0]);
    assert_eq!(onsets[&2], vec![3.0]);

    let instances = vec![
        SignalInstance { run: 2, sfreq: 500.0, signal: position_coded(3, 3200) },
        SignalInstance { run: 1, sfreq: 500.0, signal: position_coded(3, 3200) },
        SignalInstance { run: 4, sfreq: 500.0, signal: position_coded(3, 3200) },
    ];
    let report = extract_runs(&instances, &onsets, 1000, 500).unwrap();

    // run 1: 0.1 s is too early and 6.0 s runs past the end; run 2: 3.0 s.
    assert_eq!(report.windows.len(), 2);
    assert_eq!(report.origins, vec![(1, 1200), (2, 1500)]);
    assert_eq!(report.skipped_bounds, 2);
    assert_eq!(report.skipped_invalid, 0);
    assert_eq!(report.unmatched_runs, vec![3]);
    assert_eq!(report.unmatched_instances, vec![4]);

    let ds = build(report.windows, 0.5, 0, true).unwrap();
    assert_eq!(ds.len(Split::Train) + ds.len(Split::Test), 2);
}

#[test]
fn negative_onsets_are_counted_invalid() {
    let mut onsets = std::collections::BTreeMap::new();
    onsets.insert(1, vec![-1.0, 2.4]);
    let instances = vec![SignalInstance { run: 1, sfreq: 500.0, signal: position_coded(2, 2000) }];
    let report = extract_runs(&instances, &onsets, 1000, 500).unwrap();
    assert_eq!(report.windows.len(), 1);
    assert_eq!(report.skipped_invalid, 1);
}

#[test]
fn onset_beyond_any_sample_index_is_invalid() {
    let mut onsets = std::collections::BTreeMap::new();
    onsets.insert(1, vec![2.4, 1e300]);
    let instances = vec![SignalInstance { run: 1, sfreq: 500.0, signal: position_coded(2, 3000) }];
    let report = extract_runs(&instances, &onsets, 1000, 1500).unwrap();
    assert_eq!(report.origins, vec![(1, 1200)]);
    assert_eq!(report.skipped_invalid, 1);
    assert_eq!(report.skipped_bounds, 0);
}

#[test]
fn onsets_convert_at_each_artifact_rate() {
    let mut onsets = std::collections::BTreeMap::new();
    onsets.insert(1, vec![2.4]);
    onsets.insert(2, vec![2.4]);
    let instances = vec![
        SignalInstance { run: 1, sfreq: 500.0, signal: position_coded(1, 6000) },
        SignalInstance { run: 2, sfreq: 1000.0, signal: position_coded(1, 6000) },
    ];
    let report = extract_runs(&instances, &onsets, 1000, 500).unwrap();
    assert_eq!(report.origins, vec![(1, 1200), (2, 2400)]);
    assert_eq!(report.windows[1].future[[0, 0]], 2400.0);
}

#[test]
fn marker_table_requires_run_and_onset_columns() {
    let text = r#"{"columns": ["Run", "Lift"], "data": [[1, 1]]}"#;
    assert!(matches!(
        MarkerTable::from_json_str(text, &MarkerSchema::default()),
        Err(Error::InvalidData(_))
    ));
}
