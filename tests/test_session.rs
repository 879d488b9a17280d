use gal_eeg::{EegStage, Error, MarkerSchema, MarkerTable, Modality, Session, SignalBlock};
use ndarray::{array, Array2};

const SESSION: &str = r#"{
  "EEG":  {"data": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
           "names": ["C3", "Cz", "C4"], "sampling_rate": 500},
  "EMG":  {"data": [[0.5], [0.25], [0.125]], "names": ["EMG1"], "sampling_rate": 4000},
  "KIN":  {"data": [[1.0, 0.0]], "names": ["Px1", "Py1"], "sampling_rate": 500},
  "MISC": {"data": [], "names": [], "sampling_rate": null}
}"#;

#[test]
fn session_document_loads_typed_blocks() {
    let s = Session::from_json_str(SESSION).unwrap();
    assert_eq!(
        s.modalities().collect::<Vec<_>>(),
        vec![Modality::Eeg, Modality::Emg, Modality::Kin]
    );
    let eeg = s.eeg().unwrap();
    assert_eq!(eeg.n_samples(), 3);
    assert_eq!(eeg.names(), &["C3", "Cz", "C4"]);
    assert_eq!(eeg.sampling_rate(), 500.0);
    assert_eq!(s.get(Modality::Emg).unwrap().sampling_rate(), 4000.0);
    assert!(s.eeg_stages.is_empty());
}

#[test]
fn session_round_trips_with_stages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("P1_S1.json");

    let mut s = Session::from_json_str(SESSION).unwrap();
    s.eeg_stages.record(EegStage::Filtered, array![[0.5, 1.0, -1.5], [2.0, 0.0, 0.25], [1.0, 1.0, 1.0]]).unwrap();
    s.eeg_stages.record(EegStage::IcaComponents, array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
    s.eeg_stages.record(EegStage::IcaMixing, array![[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]).unwrap();
    s.save(&path).unwrap();

    let back = Session::load(&path).unwrap();
    assert_eq!(back, s);
    assert!(back.eeg_stages.get(EegStage::Reconstructed).is_none());

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"ica_mixing_matrix\""));
    assert!(!text.contains("\"reconstructed_data\""));
}

#[test]
fn session_without_eeg_reports_it() {
    let s = Session::from_json_str(r#"{"EMG": {"data": [[1.0]], "names": ["EMG1"], "sampling_rate": 4000}}"#)
        .unwrap();
    assert!(matches!(s.eeg(), Err(Error::InvalidData(_))));
}

#[test]
fn session_with_bad_block_is_rejected() {
    let text = r#"{"EEG": {"data": [[1.0, 2.0]], "names": ["C3"], "sampling_rate": 500}}"#;
    assert!(Session::from_json_str(text).is_err());
    let text = r#"{"EEG": {"data": [[1.0]], "names": ["C3"]}}"#;
    assert!(Session::from_json_str(text).is_err());
}

#[test]
fn insert_replaces_block() {
    let mut s = Session::new();
    let a = SignalBlock::new(Array2::zeros((4, 1)), vec!["C3".into()], 500.0).unwrap();
    let b = SignalBlock::new(Array2::ones((4, 1)), vec!["C3".into()], 500.0).unwrap();
    assert!(s.insert(Modality::Eeg, a.clone()).is_none());
    assert_eq!(s.insert(Modality::Eeg, b), Some(a));
}

#[test]
fn marker_file_loads_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("P1_AllLifts.json");
    std::fs::write(
        &path,
        r#"{"columns": ["Run", "Lift", "CurW", "CurS", "LEDOn", "LEDOff"],
            "data": [[2, 1, 330, 1, 5.5, 7.0], [1, 1, 165, 3, 2.25, 4.0], [1, 2, 165, 3, 1.0, null]]}"#,
    )
    .unwrap();
    let table = MarkerTable::load(&path, &MarkerSchema::default()).unwrap();
    assert_eq!(table.events().len(), 3);
    let ev = &table.events()[0];
    assert_eq!((ev.run, ev.lift, ev.weight, ev.surface), (2, Some(1), Some(330.0), Some(1.0)));
    assert_eq!(table.events()[2].led_off, None);

    let onsets = table.onsets_by_run();
    assert_eq!(onsets[&1], vec![1.0, 2.25]);
    assert_eq!(onsets[&2], vec![5.5]);
}

#[test]
fn custom_schema_renames_columns() {
    let schema = MarkerSchema { run: "run".into(), led_on: "cue".into(), ..MarkerSchema::default() };
    let table = MarkerTable::from_json_str(r#"{"columns": ["run", "cue"], "data": [[3, 0.5]]}"#, &schema).unwrap();
    assert_eq!(table.onsets_by_run()[&3], vec![0.5]);
}
