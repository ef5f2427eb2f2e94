// Classifier error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Classifier error code constants
///
/// Error code range: 2001-2004
pub struct ClassifierErrorCodes {}

impl ClassifierErrorCodes {
    /// Model artifact missing, unreadable or structurally invalid
    pub const MODEL_LOAD: i32 = 2001;

    /// Model reported a class code with no display label
    pub const UNKNOWN_CLASS: i32 = 2002;

    /// Feature vector length disagrees with the model
    pub const DIMENSION_MISMATCH: i32 = 2003;

    /// Feature names disagree with the model's training order
    pub const FEATURE_ORDER_MISMATCH: i32 = 2004;
}

/// Log a classifier error with structured context
pub fn log_classifier_error(err: &ClassifierError, context: &str) {
    error!(
        "Classifier error in {}: code={}, component=GenreClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while loading the model or classifying a feature vector
///
/// Error code range: 2001-2004
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// Model could not be loaded
    ModelLoad { path: String, reason: String },

    /// Class code absent from the genre table
    UnknownClass { code: String },

    /// Vector or probability length mismatch
    DimensionMismatch { expected: usize, actual: usize },

    /// Feature at `index` is named differently by the model
    FeatureOrderMismatch {
        index: usize,
        expected: String,
        found: String,
    },
}

impl ErrorCode for ClassifierError {
    fn code(&self) -> i32 {
        match self {
            ClassifierError::ModelLoad { .. } => ClassifierErrorCodes::MODEL_LOAD,
            ClassifierError::UnknownClass { .. } => ClassifierErrorCodes::UNKNOWN_CLASS,
            ClassifierError::DimensionMismatch { .. } => ClassifierErrorCodes::DIMENSION_MISMATCH,
            ClassifierError::FeatureOrderMismatch { .. } => {
                ClassifierErrorCodes::FEATURE_ORDER_MISMATCH
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifierError::ModelLoad { path, reason } => {
                format!("Failed to load classifier model {}: {}", path, reason)
            }
            ClassifierError::UnknownClass { code } => {
                format!("Classifier returned unknown class code '{}'", code)
            }
            ClassifierError::DimensionMismatch { expected, actual } => {
                format!(
                    "Dimension mismatch: model expects {} values, got {}",
                    expected, actual
                )
            }
            ClassifierError::FeatureOrderMismatch {
                index,
                expected,
                found,
            } => {
                format!(
                    "Feature {} is '{}' in the model but '{}' in the extractor",
                    index, expected, found
                )
            }
        }
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl std::error::Error for ClassifierError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_codes() {
        assert_eq!(
            ClassifierError::ModelLoad {
                path: "m.json".to_string(),
                reason: "missing".to_string()
            }
            .code(),
            2001
        );
        assert_eq!(
            ClassifierError::UnknownClass {
                code: "jazz".to_string()
            }
            .code(),
            2002
        );
        assert_eq!(
            ClassifierError::DimensionMismatch {
                expected: 53,
                actual: 52
            }
            .code(),
            2003
        );
        assert_eq!(
            ClassifierError::FeatureOrderMismatch {
                index: 0,
                expected: "bpm".to_string(),
                found: "tempo".to_string()
            }
            .code(),
            2004
        );
    }

    #[test]
    fn test_unknown_class_message_names_code() {
        let err = ClassifierError::UnknownClass {
            code: "jazz".to_string(),
        };
        assert!(err.message().contains("'jazz'"));
        assert!(format!("{}", err).contains("2002"));
    }
}
