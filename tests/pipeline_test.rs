//! Integration tests for the decode → extract → classify pipeline
//!
//! These tests drive the library API end to end on synthetic WAV files:
//! - Feature vector schema and determinism
//! - Decode failures surface before the model is consulted
//! - Classification with a model artifact loaded from disk

mod common;

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use musicl::{
    classify_file, AudioError, ClassifierError, ClassifierModel, FeatureExtractor,
    GenreClassifier, GenreTable, MusiclError, RandomForestModel, FEATURE_COUNT, FEATURE_NAMES,
};

/// Model that counts how often it is asked for predictions
struct RecordingModel {
    classes: Vec<String>,
    calls: AtomicUsize,
}

impl RecordingModel {
    fn new() -> Self {
        Self {
            classes: vec!["pop".to_string(), "rock".to_string()],
            calls: AtomicUsize::new(0),
        }
    }
}

impl ClassifierModel for RecordingModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        FEATURE_COUNT
    }

    fn predict_probabilities(&self, _features: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.25, 0.75])
    }
}

#[test]
fn test_extract_file_produces_full_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clicks.wav");
    common::write_wav(&path, &common::click_track(22050, 4.0), 22050);

    let features = FeatureExtractor::extract_file(&path).unwrap();
    let names: Vec<&str> = features.iter().map(|(name, _)| name).collect();
    assert_eq!(names, FEATURE_NAMES);
    for (name, value) in features.iter() {
        assert!(value.is_finite(), "{} = {}", name, value);
    }

    // Same file, same bits
    let again = FeatureExtractor::extract_file(&path).unwrap();
    for (a, b) in features.as_slice().iter().zip(again.as_slice()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_missing_file_fails_before_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(RecordingModel::new());
    let classifier = GenreClassifier::new(model.clone(), &GenreTable::default()).unwrap();

    let result = classify_file(&dir.path().join("nope.mp3"), &classifier);
    assert!(matches!(
        result,
        Err(MusiclError::Audio(AudioError::FileOpen { .. }))
    ));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_garbage_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.mp3");
    fs::write(&path, "this is not audio at all").unwrap();

    let model = Arc::new(RecordingModel::new());
    let classifier = GenreClassifier::new(model.clone(), &GenreTable::default()).unwrap();
    match classify_file(&path, &classifier) {
        Err(MusiclError::Audio(_)) => {}
        other => panic!("expected audio error, got {:?}", other),
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_low_sample_rate_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phone.wav");
    common::write_wav(&path, &common::click_track(8000, 1.0), 8000);

    assert!(matches!(
        FeatureExtractor::extract_file(&path),
        Err(AudioError::SampleRateTooLow {
            sample_rate: 8000,
            ..
        })
    ));
}

#[test]
fn test_classify_with_model_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let song = dir.path().join("song.wav");
    common::write_wav(&song, &common::click_track(22050, 2.0), 22050);
    let model = RandomForestModel::load(common::write_model(dir.path())).unwrap();

    let classifier = GenreClassifier::new(Arc::new(model), &GenreTable::default()).unwrap();
    let table = classify_file(&song, &classifier).unwrap();

    let rows: Vec<(&str, f64)> = table
        .rows()
        .iter()
        .map(|r| (r.label.as_str(), r.percentage))
        .collect();
    assert_eq!(
        rows[..3],
        [("Pop music", 50.0), ("Rock music", 30.0), ("Metal", 20.0)]
    );
    assert_eq!(rows.len(), 7);
    assert!((table.total() - 100.0).abs() < 0.1);
}

#[test]
fn test_recording_model_sees_one_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let song = dir.path().join("song.wav");
    common::write_wav(&song, &common::click_track(22050, 1.5), 22050);

    let model = Arc::new(RecordingModel::new());
    let classifier = GenreClassifier::new(model.clone(), &GenreTable::default()).unwrap();
    let table = classify_file(&song, &classifier).unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(table.rows()[0].label, "Rock music");
    assert_eq!(table.rows()[0].percentage, 75.0);
}
