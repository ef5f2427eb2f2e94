// HPSS module - harmonic/percussive source separation
//
// Median filtering of the magnitude spectrogram: horizontal structures
// (sustained partials) survive a median along time, vertical ones (transients)
// survive a median along frequency. Soft Wiener-style masks derived from the
// two filtered spectrograms split the complex STFT, which is then inverted.
//
// References:
// - Fitzgerald, D. (2010). Harmonic/percussive separation using median filtering

use super::fft::{magnitude, ComplexSpectrogram, FftProcessor};

/// Median filter length in frames / bins
pub const KERNEL_SIZE: usize = 31;

/// Exponent of the soft masks
const MASK_POWER: i32 = 2;

/// Harmonic and percussive waveforms, each the length of the input
#[derive(Debug, Clone)]
pub struct Separation {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

/// Separate `stft` (computed by `fft` from a signal of `length` samples)
pub fn separate(fft: &FftProcessor, stft: &ComplexSpectrogram, length: usize) -> Separation {
    let mag = magnitude(stft);
    let harmonic_mag = median_along_time(&mag, KERNEL_SIZE);
    let percussive_mag = median_along_frequency(&mag, KERNEL_SIZE);

    let mut harmonic = Vec::with_capacity(stft.len());
    let mut percussive = Vec::with_capacity(stft.len());
    for (t, frame) in stft.iter().enumerate() {
        let mut h_frame = Vec::with_capacity(frame.len());
        let mut p_frame = Vec::with_capacity(frame.len());
        for (f, &bin) in frame.iter().enumerate() {
            let h = harmonic_mag[t][f];
            let p = percussive_mag[t][f];
            h_frame.push(bin * softmask(h, p));
            p_frame.push(bin * softmask(p, h));
        }
        harmonic.push(h_frame);
        percussive.push(p_frame);
    }

    Separation {
        harmonic: fft.istft(&harmonic, length),
        percussive: fft.istft(&percussive, length),
    }
}

/// x^p / (x^p + y^p), zero where both inputs vanish
fn softmask(x: f32, y: f32) -> f32 {
    let scale = x.max(y);
    if scale < f32::MIN_POSITIVE {
        return 0.0;
    }
    let xp = (x / scale).powi(MASK_POWER);
    let yp = (y / scale).powi(MASK_POWER);
    xp / (xp + yp)
}

/// Mirror an out-of-range index back into `0..n` (edge sample repeated)
fn reflect(idx: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let i = idx.rem_euclid(period);
    if i >= n as isize {
        (period - 1 - i) as usize
    } else {
        i as usize
    }
}

fn median_of(window: &mut [f32]) -> f32 {
    let mid = window.len() / 2;
    let (_, median, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *median
}

fn median_along_time(mag: &[Vec<f32>], size: usize) -> Vec<Vec<f32>> {
    let n_frames = mag.len();
    let n_bins = mag.first().map(|f| f.len()).unwrap_or(0);
    let half = (size / 2) as isize;
    let mut out = vec![vec![0.0f32; n_bins]; n_frames];
    let mut window = vec![0.0f32; size];

    for f in 0..n_bins {
        for (t, row) in out.iter_mut().enumerate() {
            for (j, slot) in window.iter_mut().enumerate() {
                *slot = mag[reflect(t as isize + j as isize - half, n_frames)][f];
            }
            row[f] = median_of(&mut window);
        }
    }
    out
}

fn median_along_frequency(mag: &[Vec<f32>], size: usize) -> Vec<Vec<f32>> {
    let half = (size / 2) as isize;
    let mut window = vec![0.0f32; size];

    mag.iter()
        .map(|frame| {
            let n_bins = frame.len();
            (0..n_bins)
                .map(|f| {
                    for (j, slot) in window.iter_mut().enumerate() {
                        *slot = frame[reflect(f as isize + j as isize - half, n_bins)];
                    }
                    median_of(&mut window)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fft::{HOP_LENGTH, N_FFT};

    #[test]
    fn test_reflect_matches_half_sample_symmetry() {
        // d c b a | a b c d | d c b a
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_softmask_complementary() {
        let a = softmask(3.0, 4.0);
        let b = softmask(4.0, 3.0);
        assert!((a + b - 1.0).abs() < 1e-6);
        assert!((a - 9.0 / 25.0).abs() < 1e-6);
        assert_eq!(softmask(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_median_filters() {
        let mag = vec![vec![0.0, 0.0, 9.0, 0.0, 0.0], vec![1.0; 5], vec![0.0; 5]];
        let along_freq = median_along_frequency(&mag, 3);
        // Isolated spike across frequency is removed
        assert_eq!(along_freq[0][2], 0.0);
        assert_eq!(along_freq[1], vec![1.0; 5]);

        let along_time = median_along_time(&mag, 3);
        // Frame 1 is a spike in time for every bin
        assert!(along_time[1].iter().all(|&v| v == 0.0 || v == 1.0));
        assert_eq!(along_time[1][0], 0.0);
    }

    #[test]
    fn test_sine_is_harmonic_clicks_are_percussive() {
        let sr = 22050usize;
        let tone: Vec<f32> = (0..sr)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin())
            .collect();
        let fft = FftProcessor::new(N_FFT, HOP_LENGTH);
        let split = separate(&fft, &fft.stft(&tone), tone.len());
        assert_eq!(split.harmonic.len(), tone.len());
        assert_eq!(split.percussive.len(), tone.len());

        let energy = |x: &[f32]| x.iter().map(|v| v * v).sum::<f32>();
        assert!(energy(&split.harmonic) > 10.0 * energy(&split.percussive));

        let mut clicks = vec![0.0f32; sr];
        for i in (1000..sr).step_by(4000) {
            clicks[i] = 1.0;
        }
        let split = separate(&fft, &fft.stft(&clicks), clicks.len());
        assert!(energy(&split.percussive) > 10.0 * energy(&split.harmonic));
    }
}
