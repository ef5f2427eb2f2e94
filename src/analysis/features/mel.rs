//! Mel spectrogram, MFCC and delta computation
//!
//! Uses the Slaney mel scale (linear below 1 kHz, logarithmic above) with
//! area-normalized triangular filters spanning 0 Hz to Nyquist.

use std::f64::consts::PI;

use super::fft::fft_frequencies;
use super::norm::power_to_db;

/// Number of mel bands
pub const N_MELS: usize = 128;

/// Number of cepstral coefficients kept
pub const N_MFCC: usize = 20;

/// Window of the delta regression, in frames
pub const DELTA_WIDTH: usize = 9;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz to mel (Slaney)
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Mel to Hz (Slaney)
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank over the bins of an `n_fft`-point FFT
pub struct MelFilterbank {
    /// One row of `n_fft / 2 + 1` weights per mel band
    filters: Vec<Vec<f32>>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let fft_freqs = fft_frequencies(sample_rate, n_fft);
        let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
        let mel_f: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let filters = (0..n_mels)
            .map(|i| {
                let (left, center, right) = (mel_f[i], mel_f[i + 1], mel_f[i + 2]);
                let enorm = 2.0 / (right - left);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let f = f as f64;
                        let lower = (f - left) / (center - left);
                        let upper = (right - f) / (right - center);
                        (lower.min(upper).max(0.0) * enorm) as f32
                    })
                    .collect()
            })
            .collect();

        Self { filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Project a frame-major power spectrogram onto the mel bands
    pub fn apply(&self, power: &[Vec<f32>]) -> Vec<Vec<f32>> {
        power
            .iter()
            .map(|frame| {
                self.filters
                    .iter()
                    .map(|filter| {
                        filter
                            .iter()
                            .zip(frame.iter())
                            .filter(|&(&w, _)| w > 0.0)
                            .map(|(&w, &p)| w * p)
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Mel-frequency cepstral coefficients from a mel power spectrogram
///
/// Orthonormal DCT-II of the dB-scaled mel spectrum, keeping `n_mfcc`
/// coefficients per frame.
pub fn mfcc(mel_power: &[Vec<f32>], n_mfcc: usize) -> Vec<Vec<f32>> {
    let log_mel = power_to_db(mel_power);
    let n_mels = log_mel.first().map(|f| f.len()).unwrap_or(0);
    if n_mels == 0 {
        return vec![Vec::new(); log_mel.len()];
    }

    let basis: Vec<Vec<f64>> = (0..n_mfcc)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n_mels as f64).sqrt()
            } else {
                (2.0 / n_mels as f64).sqrt()
            };
            (0..n_mels)
                .map(|n| scale * (PI * k as f64 * (2 * n + 1) as f64 / (2 * n_mels) as f64).cos())
                .collect()
        })
        .collect();

    log_mel
        .iter()
        .map(|frame| {
            basis
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(frame.iter())
                        .map(|(&b, &x)| b * x as f64)
                        .sum::<f64>() as f32
                })
                .collect()
        })
        .collect()
}

/// First-order delta across frames
///
/// Savitzky-Golay derivative (polynomial order 1) over `width` frames, which
/// reduces to a least-squares slope. The first and last `width / 2` frames
/// reuse the slope fitted to the first / last full window. Inputs shorter
/// than the window use a single fit over all frames.
pub fn delta(frames: &[Vec<f32>], width: usize) -> Vec<Vec<f32>> {
    let n = frames.len();
    if n == 0 {
        return Vec::new();
    }
    let n_coeffs = frames[0].len();
    let width = width.max(3) | 1;

    let slope = |start: usize, len: usize, coeff: usize| -> f32 {
        let center = (len - 1) as f64 / 2.0;
        let denom: f64 = (0..len).map(|i| (i as f64 - center).powi(2)).sum();
        if denom == 0.0 {
            return 0.0;
        }
        let num: f64 = (0..len)
            .map(|i| (i as f64 - center) * frames[start + i][coeff] as f64)
            .sum();
        (num / denom) as f32
    };

    if n < width {
        let row: Vec<f32> = (0..n_coeffs).map(|c| slope(0, n, c)).collect();
        return vec![row; n];
    }

    let half = width / 2;
    (0..n)
        .map(|t| {
            let start = t.saturating_sub(half).min(n - width);
            (0..n_coeffs).map(|c| slope(start, width, c)).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fft::N_FFT;

    #[test]
    fn test_mel_scale_roundtrip_and_breakpoint() {
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
        assert!((hz_to_mel(200.0) - 3.0).abs() < 1e-9);
        for hz in [50.0, 700.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_filterbank_shape_and_nonnegative() {
        let bank = MelFilterbank::new(22050, N_FFT, N_MELS);
        assert_eq!(bank.n_mels(), N_MELS);
        assert!(bank.filters.iter().all(|f| f.len() == N_FFT / 2 + 1));
        assert!(bank.filters.iter().flatten().all(|&w| w >= 0.0));
        // Every band above the first few covers at least one FFT bin
        assert!(bank.filters[N_MELS - 1].iter().any(|&w| w > 0.0));
    }

    #[test]
    fn test_mfcc_of_flat_spectrum_only_dc() {
        let mel = vec![vec![1.0f32; N_MELS]; 2];
        let coeffs = mfcc(&mel, N_MFCC);
        assert_eq!(coeffs.len(), 2);
        assert_eq!(coeffs[0].len(), N_MFCC);
        // 0 dB everywhere -> every coefficient is zero
        assert!(coeffs.iter().flatten().all(|c| c.abs() < 1e-4));

        let loud = vec![vec![10.0f32; N_MELS]];
        let c = mfcc(&loud, N_MFCC);
        // 10 dB constant -> DC = 10 * sqrt(N), the rest vanish
        assert!((c[0][0] - 10.0 * (N_MELS as f32).sqrt()).abs() < 1e-2);
        assert!(c[0][1..].iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_delta_of_linear_ramp_is_constant_slope() {
        let frames: Vec<Vec<f32>> = (0..20).map(|t| vec![2.0 * t as f32, 5.0]).collect();
        let d = delta(&frames, DELTA_WIDTH);
        assert_eq!(d.len(), 20);
        for row in &d {
            assert!((row[0] - 2.0).abs() < 1e-5);
            assert!(row[1].abs() < 1e-6);
        }
    }

    #[test]
    fn test_delta_short_input() {
        let frames: Vec<Vec<f32>> = (0..3).map(|t| vec![t as f32]).collect();
        let d = delta(&frames, DELTA_WIDTH);
        assert_eq!(d.len(), 3);
        assert!(d.iter().all(|row| (row[0] - 1.0).abs() < 1e-6));
        assert!(delta(&[vec![1.0]], DELTA_WIDTH)[0][0] == 0.0);
    }
}
