// Temporal module - Time-domain feature extraction
//
// This module computes frame-wise features directly from the waveform:
// root-mean-square energy and zero-crossing rate. Frames are centered on
// multiples of the hop size, like the STFT frames, so every time-domain
// feature lines up with the spectral ones.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

use super::fft::frame_count;

/// Samples with magnitude at or below this are treated as exact zeros
const ZERO_CROSSING_THRESHOLD: f32 = 1e-10;

/// Temporal feature computation functions
pub struct TemporalFeatures {
    frame_length: usize,
    hop_length: usize,
}

impl TemporalFeatures {
    /// Create a new temporal features processor
    ///
    /// # Arguments
    /// * `frame_length` - Samples per analysis frame
    /// * `hop_length` - Samples between frame centers
    pub fn new(frame_length: usize, hop_length: usize) -> Self {
        Self {
            frame_length,
            hop_length,
        }
    }

    /// Compute RMS energy per frame
    ///
    /// Formula: RMS = sqrt((1 / N) × Σ x[n]²)
    ///
    /// The signal is zero-padded by half a frame on each side.
    pub fn compute_rms(&self, audio: &[f32]) -> Vec<f32> {
        let pad = self.frame_length / 2;
        (0..frame_count(audio.len(), self.hop_length))
            .map(|t| {
                let start = (t * self.hop_length) as isize - pad as isize;
                let energy: f64 = (0..self.frame_length)
                    .map(|j| {
                        let idx = start + j as isize;
                        if idx >= 0 && (idx as usize) < audio.len() {
                            let s = audio[idx as usize] as f64;
                            s * s
                        } else {
                            0.0
                        }
                    })
                    .sum();
                (energy / self.frame_length as f64).sqrt() as f32
            })
            .collect()
    }

    /// Compute zero-crossing rate (ZCR) per frame
    ///
    /// Formula: ZCR = (1 / N) × #{n : signbit(x[n]) ≠ signbit(x[n-1])}
    ///
    /// The signal is padded by repeating its edge samples. Near-zero samples
    /// count as positive, so low-level noise around zero does not register
    /// as crossings.
    ///
    /// # Returns
    /// Zero-crossing rate per frame (0.0 to 1.0)
    pub fn compute_zcr(&self, audio: &[f32]) -> Vec<f32> {
        let n_frames = frame_count(audio.len(), self.hop_length);
        if audio.is_empty() {
            return vec![0.0; n_frames];
        }

        let pad = self.frame_length / 2;
        let last = audio.len() - 1;
        let negative = |idx: isize| -> bool {
            let clamped = idx.clamp(0, last as isize) as usize;
            let sample = audio[clamped];
            sample.abs() > ZERO_CROSSING_THRESHOLD && sample < 0.0
        };

        (0..n_frames)
            .map(|t| {
                let start = (t * self.hop_length) as isize - pad as isize;
                let mut crossings = 0usize;
                let mut previous = negative(start);
                for j in 1..self.frame_length {
                    let current = negative(start + j as isize);
                    if current != previous {
                        crossings += 1;
                    }
                    previous = current;
                }
                crossings as f32 / self.frame_length as f32
            })
            .collect()
    }
}
