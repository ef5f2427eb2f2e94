// Error types for musicl
//
// This module defines custom error types for audio loading and classification,
// each carrying a stable numeric code for structured logging.

mod audio;
mod classifier;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use classifier::{log_classifier_error, ClassifierError, ClassifierErrorCodes};

use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Any failure of the end-to-end pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum MusiclError {
    Audio(AudioError),
    Classifier(ClassifierError),
}

impl ErrorCode for MusiclError {
    fn code(&self) -> i32 {
        match self {
            MusiclError::Audio(err) => err.code(),
            MusiclError::Classifier(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            MusiclError::Audio(err) => err.message(),
            MusiclError::Classifier(err) => err.message(),
        }
    }
}

impl fmt::Display for MusiclError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MusiclError::Audio(err) => err.fmt(f),
            MusiclError::Classifier(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for MusiclError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MusiclError::Audio(err) => Some(err),
            MusiclError::Classifier(err) => Some(err),
        }
    }
}

impl From<AudioError> for MusiclError {
    fn from(err: AudioError) -> Self {
        MusiclError::Audio(err)
    }
}

impl From<ClassifierError> for MusiclError {
    fn from(err: ClassifierError) -> Self {
        MusiclError::Classifier(err)
    }
}
