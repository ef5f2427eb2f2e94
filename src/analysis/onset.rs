// OnsetDetector - mel spectral flux onset detection
//
// The onset strength envelope is the positive first-order difference of the
// dB-scaled mel spectrogram, aggregated across mel bands. Onsets are the peaks
// of the normalized envelope that beat a local moving average by a fixed delta.
//
// Algorithm:
// 1. Convert mel power to dB (ref 1.0, 80 dB dynamic range)
// 2. Compute positive difference from previous frame: SF[m] = max(0, S_t[m] - S_(t-1)[m])
// 3. Aggregate across mel bands (mean for onsets, median for beat tracking)
// 4. Shift right by 3 frames to compensate for centering and lag, trim to frame count
// 5. Normalize to [0, 1] and peak pick against a moving maximum and moving average

use crate::analysis::features::norm::power_to_db;
use crate::analysis::features::stats::median;

/// Frames of delay introduced by the lag-1 difference plus STFT centering
const ENVELOPE_DELAY: usize = 3;

/// Default amount a peak must exceed the local average by
const PEAK_DELTA: f32 = 0.07;

/// How per-band flux values are combined into one envelope value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Mean,
    Median,
}

/// Peak picking window sizes, in frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPicker {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub wait: usize,
    pub delta: f32,
}

impl PeakPicker {
    /// Windows of 30 ms (max, wait) and 100 ms (average) at the given frame rate
    pub fn for_rate(sample_rate: u32, hop: usize) -> Self {
        let frames = |seconds: f64| (seconds * sample_rate as f64 / hop as f64).floor() as usize;
        Self {
            pre_max: frames(0.03),
            post_max: 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            wait: frames(0.03),
            delta: PEAK_DELTA,
        }
    }

    /// Indices `n` such that:
    /// - x[n] is the maximum of x[n - pre_max .. n + post_max]
    /// - x[n] >= mean(x[n - pre_avg .. n + post_avg]) + delta
    /// - n is more than `wait` frames after the previous peak
    ///
    /// Windows are clipped at the edges. Zero-valued samples are never peaks.
    pub fn pick(&self, x: &[f32]) -> Vec<usize> {
        let len = x.len();
        let mut peaks = Vec::new();
        let mut last: Option<usize> = None;

        for (n, &value) in x.iter().enumerate() {
            if value == 0.0 {
                continue;
            }

            let max_window = &x[n.saturating_sub(self.pre_max)..(n + self.post_max).min(len)];
            let local_max = max_window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if value != local_max {
                continue;
            }

            let avg_window = &x[n.saturating_sub(self.pre_avg)..(n + self.post_avg).min(len)];
            let local_avg =
                avg_window.iter().map(|&v| v as f64).sum::<f64>() / avg_window.len() as f64;
            if (value as f64) < local_avg + self.delta as f64 {
                continue;
            }

            if last.map_or(true, |l| n > l + self.wait) {
                peaks.push(n);
                last = Some(n);
            }
        }

        peaks
    }
}

/// OnsetDetector turns a mel power spectrogram into onset frames
pub struct OnsetDetector {
    sample_rate: u32,
    hop: usize,
    picker: PeakPicker,
}

impl OnsetDetector {
    /// Create a new OnsetDetector
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `hop` - Hop size of the spectrogram frames
    pub fn new(sample_rate: u32, hop: usize) -> Self {
        Self {
            sample_rate,
            hop,
            picker: PeakPicker::for_rate(sample_rate, hop),
        }
    }

    /// Onset strength envelope, one value per spectrogram frame
    pub fn strength(&self, mel_power: &[Vec<f32>], aggregate: Aggregate) -> Vec<f32> {
        let n_frames = mel_power.len();
        let db = power_to_db(mel_power);

        let mut envelope = vec![0.0f32; ENVELOPE_DELAY.min(n_frames)];
        for pair in db.windows(2) {
            if envelope.len() >= n_frames {
                break;
            }
            let flux: Vec<f32> = pair[1]
                .iter()
                .zip(pair[0].iter())
                .map(|(&cur, &prev)| (cur - prev).max(0.0))
                .collect();
            let value = match aggregate {
                Aggregate::Mean => {
                    flux.iter().map(|&v| v as f64).sum::<f64>() as f32 / flux.len().max(1) as f32
                }
                Aggregate::Median => median(&flux),
            };
            envelope.push(value);
        }
        envelope.resize(n_frames, 0.0);
        envelope
    }

    /// Onset frames of an envelope
    ///
    /// Returns no onsets when the envelope is entirely zero.
    pub fn detect(&self, envelope: &[f32]) -> Vec<usize> {
        if envelope.iter().all(|&v| v == 0.0) {
            return Vec::new();
        }

        let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
        let shifted: Vec<f32> = envelope.iter().map(|&v| v - min).collect();
        let max = shifted.iter().copied().fold(0.0f32, f32::max);
        let normalized: Vec<f32> = shifted.iter().map(|&v| v / (max + f32::MIN_POSITIVE)).collect();

        let onsets = self.picker.pick(&normalized);
        log::debug!("Detected {} onsets in {} frames", onsets.len(), envelope.len());
        onsets
    }

    /// Times in seconds of the first `limit` onset frames
    pub fn onset_times(&self, onsets: &[usize], limit: usize) -> Vec<f64> {
        onsets
            .iter()
            .take(limit)
            .map(|&frame| (frame * self.hop) as f64 / self.sample_rate as f64)
            .collect()
    }
}
