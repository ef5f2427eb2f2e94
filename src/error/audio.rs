// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported by [`AudioError`].
///
/// Error code range: 1001-1005
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Audio file could not be opened
    pub const FILE_OPEN: i32 = 1001;

    /// Container or codec is not supported
    pub const UNSUPPORTED_FORMAT: i32 = 1002;

    /// Container holds no decodable audio track
    pub const NO_AUDIO_TRACK: i32 = 1003;

    /// Packet or sample decoding failed mid-stream
    pub const DECODE: i32 = 1004;

    /// Sample rate too low for the fixed feature battery
    pub const SAMPLE_RATE_TOO_LOW: i32 = 1005;
}

/// Log an audio error with structured context
///
/// Emits error_code, component and message fields so failures can be
/// grepped out of the stderr log stream.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioDecoder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio loading errors (the DecodeError family)
///
/// Error code range: 1001-1005
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// File could not be opened or read
    FileOpen { path: String, reason: String },

    /// Format probe failed or the codec is unknown
    UnsupportedFormat { path: String, reason: String },

    /// No audio track in the container
    NoAudioTrack { path: String },

    /// Decoding failed after the stream was opened
    Decode { path: String, reason: String },

    /// Sample rate below what the spectral contrast bands require
    SampleRateTooLow { sample_rate: u32, minimum: u32 },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::FileOpen { .. } => AudioErrorCodes::FILE_OPEN,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::NoAudioTrack { .. } => AudioErrorCodes::NO_AUDIO_TRACK,
            AudioError::Decode { .. } => AudioErrorCodes::DECODE,
            AudioError::SampleRateTooLow { .. } => AudioErrorCodes::SAMPLE_RATE_TOO_LOW,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::FileOpen { path, reason } => {
                format!("Failed to open audio file {}: {}", path, reason)
            }
            AudioError::UnsupportedFormat { path, reason } => {
                format!("Unsupported audio format in {}: {}", path, reason)
            }
            AudioError::NoAudioTrack { path } => {
                format!("No audio track found in {}", path)
            }
            AudioError::Decode { path, reason } => {
                format!("Failed to decode {}: {}", path, reason)
            }
            AudioError::SampleRateTooLow {
                sample_rate,
                minimum,
            } => {
                format!(
                    "Sample rate {} Hz is too low (at least {} Hz required)",
                    sample_rate, minimum
                )
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::FileOpen {
                path: "a.wav".to_string(),
                reason: "missing".to_string()
            }
            .code(),
            AudioErrorCodes::FILE_OPEN
        );
        assert_eq!(
            AudioError::UnsupportedFormat {
                path: "a.xyz".to_string(),
                reason: "probe".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            AudioError::NoAudioTrack {
                path: "a.mp4".to_string()
            }
            .code(),
            AudioErrorCodes::NO_AUDIO_TRACK
        );
        assert_eq!(
            AudioError::Decode {
                path: "a.mp3".to_string(),
                reason: "bad frame".to_string()
            }
            .code(),
            AudioErrorCodes::DECODE
        );
        assert_eq!(
            AudioError::SampleRateTooLow {
                sample_rate: 8000,
                minimum: 12_800
            }
            .code(),
            AudioErrorCodes::SAMPLE_RATE_TOO_LOW
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::FileOpen {
            path: "song.wav".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.message(),
            "Failed to open audio file song.wav: No such file or directory"
        );

        let err = AudioError::SampleRateTooLow {
            sample_rate: 8000,
            minimum: 12_800,
        };
        assert!(err.message().contains("8000 Hz"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::NoAudioTrack {
            path: "clip.mkv".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("clip.mkv"));
        assert!(display.contains(&err.code().to_string()));
    }
}
