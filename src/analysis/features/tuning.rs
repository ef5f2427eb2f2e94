//! Tuning estimation
//!
//! Finds how far a recording sits from A440. Spectral peaks between 150 Hz and
//! 4 kHz are located per frame with parabolic interpolation, the stronger half
//! of them is kept, and their deviation from the equal-tempered grid is
//! histogrammed at 0.01-bin resolution. The most populated bin wins.

/// Lowest peak frequency considered, in Hz
const PITCH_FMIN: f64 = 150.0;

/// Highest peak frequency considered, in Hz (capped at Nyquist)
const PITCH_FMAX: f64 = 4000.0;

/// Peaks below this fraction of the frame maximum are ignored
const PEAK_THRESHOLD: f32 = 0.1;

/// Width of one deviation histogram bin, in fractions of a pitch bin
const RESOLUTION: f64 = 0.01;

/// A spectral peak: interpolated frequency and magnitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub frequency: f64,
    pub magnitude: f32,
}

/// Interpolated spectral peaks of a frame-major spectrogram
///
/// A bin is a peak when it exceeds `PEAK_THRESHOLD` times its frame maximum,
/// is strictly greater than the bin below and not smaller than the bin above.
pub fn pick_peaks(spectrogram: &[Vec<f32>], sample_rate: u32, n_fft: usize) -> Vec<Peak> {
    let bin_hz = sample_rate as f64 / n_fft as f64;
    let fmax = PITCH_FMAX.min(sample_rate as f64 / 2.0);
    let mut peaks = Vec::new();

    for frame in spectrogram {
        let n = frame.len();
        if n < 3 {
            continue;
        }
        let reference = PEAK_THRESHOLD * frame.iter().copied().fold(0.0f32, f32::max);
        let gated = |k: usize| {
            if frame[k] > reference {
                frame[k]
            } else {
                0.0
            }
        };

        for k in 1..n {
            let f = k as f64 * bin_hz;
            if f < PITCH_FMIN || f >= fmax {
                continue;
            }
            let x = gated(k);
            let above = if k + 1 < n { gated(k + 1) } else { x };
            if !(x > gated(k - 1) && x >= above) {
                continue;
            }

            // Parabola through the neighbours; edges are not interpolated
            let (shift, slope) = if k + 1 < n {
                let a = frame[k + 1] + frame[k - 1] - 2.0 * frame[k];
                let b = (frame[k + 1] - frame[k - 1]) / 2.0;
                let shift = if b.abs() >= a.abs() { 0.0 } else { -b / a };
                (shift, b)
            } else {
                (0.0, frame[k] - frame[k - 1])
            };

            peaks.push(Peak {
                frequency: (k as f64 + shift as f64) * bin_hz,
                magnitude: frame[k] + 0.5 * slope * shift,
            });
        }
    }
    peaks
}

/// Deviation of a set of frequencies from A440, in fractions of a pitch bin
///
/// Returns a value in `[-0.5, 0.5)`; 0 when there are no positive frequencies.
pub fn pitch_tuning(frequencies: &[f64], bins_per_octave: usize) -> f64 {
    let n_hist = (1.0 / RESOLUTION).ceil() as usize;
    let edges: Vec<f64> = (0..=n_hist)
        .map(|i| -0.5 + i as f64 / n_hist as f64)
        .collect();
    let mut counts = vec![0usize; n_hist];
    let mut any = false;

    for &f in frequencies.iter().filter(|&&f| f > 0.0) {
        any = true;
        let octaves = (f / (440.0 / 16.0)).log2();
        let mut residual = (bins_per_octave as f64 * octaves).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }

        // Uniform bins, the last one closed on the right
        let mut idx = (((residual + 0.5) * n_hist as f64) as usize).min(n_hist - 1);
        if residual < edges[idx] && idx > 0 {
            idx -= 1;
        } else if idx + 1 < n_hist && residual >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }

    if !any {
        return 0.0;
    }
    let best = counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best });
    edges[best.0]
}

/// Estimate the tuning offset of a spectrogram, in fractions of a pitch bin
///
/// Only peaks at least as strong as the median peak take part.
pub fn estimate_tuning(
    spectrogram: &[Vec<f32>],
    sample_rate: u32,
    n_fft: usize,
    bins_per_octave: usize,
) -> f64 {
    let peaks = pick_peaks(spectrogram, sample_rate, n_fft);
    let magnitudes: Vec<f32> = peaks.iter().map(|p| p.magnitude).collect();
    let threshold = if magnitudes.is_empty() {
        0.0
    } else {
        super::stats::median(&magnitudes)
    };

    let frequencies: Vec<f64> = peaks
        .iter()
        .filter(|p| p.magnitude >= threshold)
        .map(|p| p.frequency)
        .collect();
    let tuning = pitch_tuning(&frequencies, bins_per_octave);
    log::debug!(
        "Tuning {:+.2} of 1/{} octave from {} peaks",
        tuning,
        bins_per_octave,
        frequencies.len()
    );
    tuning
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fft::{magnitude, power, FftProcessor, HOP_LENGTH, N_FFT};

    fn tone(frequency: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let omega = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
        (0..(sample_rate as f32 * seconds) as usize)
            .map(|i| 0.5 * (omega * i as f32).sin())
            .collect()
    }

    #[test]
    fn test_pitch_tuning_of_exact_and_offset_pitches() {
        assert!(pitch_tuning(&[440.0, 880.0, 220.0], 12).abs() < 1e-9);

        // 30 cents sharp
        let sharp = 440.0 * 2f64.powf(0.3 / 12.0);
        assert!((pitch_tuning(&[sharp, sharp * 2.0], 12) - 0.3).abs() < 0.011);

        // 20 cents flat wraps to a negative offset
        let flat = 440.0 * 2f64.powf(-0.2 / 12.0);
        assert!((pitch_tuning(&[flat], 12) + 0.2).abs() < 0.011);

        // Same pitch measured in thirds of a semitone
        let third = 440.0 * 2f64.powf(0.1 / 36.0);
        assert!((pitch_tuning(&[third], 36) - 0.1).abs() < 0.011);
    }

    #[test]
    fn test_pitch_tuning_without_pitches_is_zero() {
        assert_eq!(pitch_tuning(&[], 12), 0.0);
        assert_eq!(pitch_tuning(&[0.0, -3.0], 36), 0.0);
    }

    /// Frames whose window lies entirely inside the signal
    fn steady(spectrogram: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
        let n = spectrogram.len();
        spectrogram[2..n - 3].to_vec()
    }

    #[test]
    fn test_peaks_outside_pitch_range_are_ignored() {
        let sr = 22050;
        let fft = FftProcessor::new(N_FFT, HOP_LENGTH);
        let low = steady(magnitude(&fft.stft(&tone(100.0, sr, 0.5))));
        assert!(pick_peaks(&low, sr, N_FFT).is_empty());

        let high = steady(magnitude(&fft.stft(&tone(6000.0, sr, 0.5))));
        assert!(pick_peaks(&high, sr, N_FFT).is_empty());

        let a4 = steady(magnitude(&fft.stft(&tone(440.0, sr, 0.5))));
        let peaks = pick_peaks(&a4, sr, N_FFT);
        assert_eq!(peaks.len(), a4.len());
        assert!(peaks.iter().all(|p| (p.frequency - 440.0).abs() < 2.0));
    }

    #[test]
    fn test_detuned_tone_is_measured() {
        let sr = 22050;
        let fft = FftProcessor::new(N_FFT, HOP_LENGTH);
        // A4, 45 cents sharp
        let audio = tone(440.0 * 2f32.powf(0.45 / 12.0), sr, 1.0);
        let mag = magnitude(&fft.stft(&audio));

        let semitones = estimate_tuning(&power(&mag), sr, N_FFT, 12);
        assert!((semitones - 0.45).abs() < 0.06, "tuning {}", semitones);

        // 1.35 thirds of a semitone; the fractional part remains
        let thirds = estimate_tuning(&mag, sr, N_FFT, 36);
        assert!((thirds - 0.35).abs() < 0.08, "tuning {}", thirds);
    }

    #[test]
    fn test_silence_has_no_tuning() {
        let sr = 22050;
        let fft = FftProcessor::new(N_FFT, HOP_LENGTH);
        let mag = magnitude(&fft.stft(&vec![0.0; sr as usize]));
        assert!(pick_peaks(&mag, sr, N_FFT).is_empty());
        assert_eq!(estimate_tuning(&mag, sr, N_FFT, 36), 0.0);
    }
}
