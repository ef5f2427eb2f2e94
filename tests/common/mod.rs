//! Shared fixtures for integration tests: synthetic WAV songs and a small
//! random forest artifact over the full feature schema.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use musicl::FEATURE_NAMES;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// Tone plus a decaying click every half second, with a little seeded noise
pub fn click_track(sample_rate: u32, seconds: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(7);
    let len = (sample_rate as f32 * seconds) as usize;
    let period = sample_rate as usize / 2;
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let tone = 0.2 * (2.0 * std::f32::consts::PI * 330.0 * t).sin();
            let phase = i % period;
            let click = if phase < 128 {
                0.7 * (1.0 - phase as f32 / 128.0)
            } else {
                0.0
            };
            tone + click + rng.gen_range(-0.01..0.01)
        })
        .collect()
}

/// Write `samples` to a 16-bit stereo WAV (same signal on both channels)
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(v).expect("write left");
        writer.write_sample(v).expect("write right");
    }
    writer.finalize().expect("finalize wav");
}

/// Write a two-tree forest whose output does not depend on the input:
/// pop 50%, rock 30%, metal 20%, every other genre 0%
pub fn write_model(dir: &Path) -> PathBuf {
    let classes = [
        "country_group",
        "pop",
        "hip_hop",
        "rock",
        "metal",
        "classic",
        "electro",
    ];
    let leaf = json!({ "value": [0.0, 5.0, 0.0, 3.0, 2.0, 0.0, 0.0] });
    let model = json!({
        "classes": classes,
        "n_features": FEATURE_NAMES.len(),
        "feature_names": FEATURE_NAMES.to_vec(),
        "trees": [
            { "nodes": [
                { "feature": 0, "threshold": 100.0, "left": 1, "right": 2 },
                leaf.clone(),
                leaf.clone()
            ] },
            { "nodes": [ { "value": [0.0, 10.0, 0.0, 6.0, 4.0, 0.0, 0.0] } ] }
        ]
    });

    let path = dir.join("RF_classifier.json");
    fs::write(&path, serde_json::to_string_pretty(&model).expect("model json"))
        .expect("write model");
    path
}
