// Types module - Data structures for audio features
//
// This module defines the fixed feature schema shared by the extractor and
// the classifier adapter. The order of FEATURE_NAMES is the order the model
// expects its input columns in.

use once_cell::sync::Lazy;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Number of scalar features per song
pub const FEATURE_COUNT: usize = 54;

/// Feature names in model column order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "tempo",
    "total_beats",
    "average_beats",
    "chroma_stft_mean",
    "chroma_stft_std",
    "chroma_stft_var",
    "chroma_cq_mean",
    "chroma_cq_std",
    "chroma_cq_var",
    "chroma_cens_mean",
    "chroma_cens_std",
    "chroma_cens_var",
    "melspectrogram_mean",
    "melspectrogram_std",
    "melspectrogram_var",
    "mfcc_mean",
    "mfcc_std",
    "mfcc_var",
    "mfcc_delta_mean",
    "mfcc_delta_std",
    "mfcc_delta_var",
    "rmse_mean",
    "rmse_std",
    "rmse_var",
    "cent_mean",
    "cent_std",
    "cent_var",
    "spec_bw_mean",
    "spec_bw_std",
    "spec_bw_var",
    "contrast_mean",
    "contrast_std",
    "contrast_var",
    "rolloff_mean",
    "rolloff_std",
    "rolloff_var",
    "poly_mean",
    "poly_std",
    "poly_var",
    "tonnetz_mean",
    "tonnetz_std",
    "tonnetz_var",
    "zcr_mean",
    "zcr_std",
    "zcr_var",
    "harm_mean",
    "harm_std",
    "harm_var",
    "perc_mean",
    "perc_std",
    "perc_var",
    "frame_mean",
    "frame_std",
    "frame_var",
];

/// Column index of every feature name
static FEATURE_INDEX: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i))
        .collect()
});

/// Features extracted from one song
///
/// Values are stored in `FEATURE_NAMES` order. Serializes as a JSON object
/// whose keys keep that order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Value of a named feature
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_INDEX.get(name).map(|&i| self.values[i])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// (name, value) pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// True when every value is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_feature_names_are_unique() {
        let unique: HashSet<&str> = FEATURE_NAMES.iter().copied().collect();
        assert_eq!(unique.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_NAMES[0], "tempo");
        assert_eq!(FEATURE_NAMES[FEATURE_COUNT - 1], "frame_var");
    }

    #[test]
    fn test_get_and_iter_follow_column_order() {
        let mut values = [0.0; FEATURE_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f64;
        }
        let fv = FeatureVector::from_values(values);
        assert_eq!(fv.get("tempo"), Some(0.0));
        assert_eq!(fv.get("zcr_var"), Some(44.0));
        assert_eq!(fv.get("missing"), None);
        assert_eq!(fv.iter().nth(3), Some(("chroma_stft_mean", 3.0)));
    }

    #[test]
    fn test_serialize_keeps_order() {
        let fv = FeatureVector::from_values([1.5; FEATURE_COUNT]);
        let json = serde_json::to_string(&fv).unwrap();
        assert!(json.starts_with("{\"tempo\":1.5,\"total_beats\":1.5"));
        assert!(json.ends_with("\"frame_var\":1.5}"));
    }
}
