// Analysis module - feature extraction and genre classification pipeline
//
// This module turns an audio file into a genre probability table.
//
// Architecture:
// - FeatureExtractor: decoded samples → 54-column FeatureVector
// - OnsetDetector / BeatTracker: rhythm features used by the extractor
// - GenreClassifier: FeatureVector → ProbabilityTable via a ClassifierModel
// - RandomForestModel: ClassifierModel loaded from a JSON artifact
// - Pipeline: decode → extract → classify, all on the calling thread

use std::path::Path;
use std::time::Instant;

use crate::error::{log_audio_error, log_classifier_error, MusiclError};

pub mod beat;
pub mod classifier;
pub mod features;
pub mod genres;
pub mod model;
pub mod onset;

use classifier::{GenreClassifier, ProbabilityTable};
use features::FeatureExtractor;

/// Classify one audio file
///
/// Features are extracted completely before the model is consulted, so a
/// file that cannot be decoded never reaches the model.
pub fn classify_file(
    path: &Path,
    classifier: &GenreClassifier,
) -> Result<ProbabilityTable, MusiclError> {
    let started = Instant::now();
    log::info!("Feature counting...");

    let features = FeatureExtractor::extract_file(path).map_err(|err| {
        log_audio_error(&err, "classify_file");
        err
    })?;

    let table = classifier.classify(&features).map_err(|err| {
        log_classifier_error(&err, "classify_file");
        err
    })?;

    log::info!(
        "Classified {:?} in {:?}: top genre {:?}",
        path,
        started.elapsed(),
        table.top().map(|row| row.label.as_str())
    );
    Ok(table)
}
