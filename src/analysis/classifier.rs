// Classifier - genre probability table from a trained model
//
// This module adapts a trained multi-class model to the feature schema and the
// genre table. It checks that the model was trained on the same feature
// columns, asks it for one probability per class, replaces class codes with
// display labels and returns the rows sorted from most to least likely, as
// percentages rounded to two decimals.

use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::analysis::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use crate::analysis::genres::GenreTable;
use crate::error::ClassifierError;

/// A trained probabilistic classifier
///
/// Implementations are read-only after loading.
pub trait ClassifierModel {
    /// Class codes in the order of `predict_probabilities` output
    fn classes(&self) -> &[String];

    /// Number of input columns the model was trained on
    fn n_features(&self) -> usize;

    /// Training column names, when the model records them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// One probability per class for a single input row
    fn predict_probabilities(&self, features: &[f64]) -> Result<Vec<f64>, ClassifierError>;
}

/// One row of the result table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbabilityRow {
    pub label: String,
    /// Probability × 100, rounded to 2 decimals
    pub percentage: f64,
}

/// Genre probabilities sorted non-increasing by percentage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProbabilityTable {
    rows: Vec<ProbabilityRow>,
}

impl ProbabilityTable {
    pub fn rows(&self) -> &[ProbabilityRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most likely genre
    pub fn top(&self) -> Option<&ProbabilityRow> {
        self.rows.first()
    }

    /// Sum of all percentages (100 up to rounding for a calibrated model)
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.percentage).sum()
    }
}

/// GenreClassifier pairs a model with the labels of its classes
///
/// Construction fails with `UnknownClass` if any model class has no entry in
/// the genre table, so a constructed classifier never drops a row.
pub struct GenreClassifier {
    model: Arc<dyn ClassifierModel>,
    /// Display label of each model class, in model class order
    labels: Vec<String>,
}

impl GenreClassifier {
    /// Create a new GenreClassifier
    ///
    /// # Arguments
    /// * `model` - Loaded model, shared read-only
    /// * `genres` - Class code to display label mapping
    pub fn new(model: Arc<dyn ClassifierModel>, genres: &GenreTable) -> Result<Self, ClassifierError> {
        let labels = model
            .classes()
            .iter()
            .map(|code| {
                genres
                    .label(code)
                    .map(str::to_string)
                    .ok_or_else(|| ClassifierError::UnknownClass { code: code.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { model, labels })
    }

    /// Check that the model consumes exactly the extractor's columns
    fn check_schema(&self) -> Result<(), ClassifierError> {
        if self.model.n_features() != FEATURE_COUNT {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.model.n_features(),
                actual: FEATURE_COUNT,
            });
        }
        if let Some(names) = self.model.feature_names() {
            if names.len() != FEATURE_COUNT {
                return Err(ClassifierError::DimensionMismatch {
                    expected: names.len(),
                    actual: FEATURE_COUNT,
                });
            }
            if let Some((index, (expected, found))) = names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .enumerate()
                .find(|(_, (model_name, ours))| model_name.as_str() != **ours)
            {
                return Err(ClassifierError::FeatureOrderMismatch {
                    index,
                    expected: expected.clone(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Classify one song's features
    ///
    /// # Returns
    /// Rows sorted by descending probability; ties keep model class order and
    /// NaN probabilities sort last
    pub fn classify(&self, features: &FeatureVector) -> Result<ProbabilityTable, ClassifierError> {
        self.check_schema()?;

        let probabilities = self.model.predict_probabilities(features.as_slice())?;
        if probabilities.len() != self.labels.len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.labels.len(),
                actual: probabilities.len(),
            });
        }

        let mut pairs: Vec<(&str, f64)> = self
            .labels
            .iter()
            .map(String::as_str)
            .zip(probabilities)
            .collect();
        // Stable sort keeps model class order among equal probabilities
        pairs.sort_by(|a, b| descending_nan_last(a.1, b.1));

        let rows = pairs
            .into_iter()
            .map(|(label, p)| ProbabilityRow {
                label: label.to_string(),
                percentage: to_percentage(p),
            })
            .collect();

        Ok(ProbabilityTable { rows })
    }
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Probability to percent, rounded to two decimals
///
/// Rounds the decimal expansion of `p * 100`, so 0.125 becomes 12.5 and
/// 1/3 becomes 33.33.
pub fn to_percentage(p: f64) -> f64 {
    let scaled = p * 100.0;
    format!("{:.2}", scaled).parse().unwrap_or(scaled)
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
