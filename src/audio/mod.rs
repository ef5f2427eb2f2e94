// Audio module - file decoding to mono PCM

pub mod decoder;

// Re-export commonly used types for convenience
pub use decoder::{load_audio, AudioSignal};
