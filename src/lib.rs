// musicl - music genre classification core
// Audio decoding, feature extraction and random forest genre probabilities

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod report;

// Re-exports for convenience
pub use analysis::classifier::{
    ClassifierModel, GenreClassifier, ProbabilityRow, ProbabilityTable,
};
pub use analysis::classify_file;
pub use analysis::features::{FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use analysis::genres::{Genre, GenreTable};
pub use analysis::model::RandomForestModel;
pub use audio::{load_audio, AudioSignal};
pub use config::AppConfig;
pub use error::{AudioError, ClassifierError, ErrorCode, MusiclError};

/// Crate version reported by `musicl --version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
