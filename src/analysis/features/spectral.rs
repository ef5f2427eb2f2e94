// Spectral module - Frequency-domain feature extraction
//
// This module computes per-frame spectral features from a magnitude
// spectrogram: centroid, bandwidth, rolloff, first-order polynomial fit and
// octave-band spectral contrast.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Jiang, D.-N. et al. (2002). Music type classification by spectral contrast feature

use super::fft::fft_frequencies;
use super::norm::power_to_db;
use crate::error::AudioError;

/// Spectral rolloff threshold (85% of spectral magnitude)
const ROLLOFF_THRESHOLD: f64 = 0.85;

/// Lower edge of the first contrast octave in Hz
const CONTRAST_FMIN: f32 = 200.0;

/// Number of contrast octaves above the sub-band below CONTRAST_FMIN
const CONTRAST_BANDS: usize = 6;

/// Fraction of each band averaged for peak and valley
const CONTRAST_QUANTILE: f64 = 0.02;

/// Lowest sample rate whose Nyquist frequency lies strictly above the top
/// contrast band edge (6400 Hz)
pub const MIN_SAMPLE_RATE: u32 = 12_801;

/// Spectral feature computation functions
pub struct SpectralFeatures {
    sample_rate: u32,
    /// Center frequency of each FFT bin
    frequencies: Vec<f32>,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            frequencies: fft_frequencies(sample_rate, fft_size),
        }
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]|
    ///
    /// # Returns
    /// Spectral centroid in Hz (0.0 for a silent frame)
    pub fn compute_centroid(&self, spectrum: &[f32]) -> f32 {
        let magnitude_sum: f64 = spectrum.iter().map(|&m| m as f64).sum();
        if magnitude_sum < f32::MIN_POSITIVE as f64 {
            return 0.0;
        }

        let weighted_sum: f64 = spectrum
            .iter()
            .zip(self.frequencies.iter())
            .map(|(&mag, &freq)| freq as f64 * mag as f64)
            .sum();

        (weighted_sum / magnitude_sum) as f32
    }

    /// Compute second-order spectral bandwidth around the centroid
    ///
    /// Formula: bandwidth = sqrt(Σ p_i × (f_i - centroid)²) with p = |X| / Σ|X|
    pub fn compute_bandwidth(&self, spectrum: &[f32], centroid: f32) -> f32 {
        let magnitude_sum: f64 = spectrum.iter().map(|&m| m as f64).sum();
        if magnitude_sum < f32::MIN_POSITIVE as f64 {
            return 0.0;
        }

        let spread: f64 = spectrum
            .iter()
            .zip(self.frequencies.iter())
            .map(|(&mag, &freq)| {
                let deviation = freq as f64 - centroid as f64;
                (mag as f64 / magnitude_sum) * deviation * deviation
            })
            .sum();

        spread.sqrt() as f32
    }

    /// Compute spectral rolloff (85% magnitude threshold frequency)
    ///
    /// # Returns
    /// Lowest bin frequency whose cumulative magnitude reaches 85% of the total
    pub fn compute_rolloff(&self, spectrum: &[f32]) -> f32 {
        let total: f64 = spectrum.iter().map(|&m| m as f64).sum();
        let threshold = ROLLOFF_THRESHOLD * total;

        let mut cumulative = 0.0f64;
        for (&mag, &freq) in spectrum.iter().zip(self.frequencies.iter()) {
            cumulative += mag as f64;
            if cumulative >= threshold {
                return freq;
            }
        }

        // Rounding left the total short of the threshold
        self.frequencies.last().copied().unwrap_or(0.0)
    }

    /// Fit a first-order polynomial to the spectrum against frequency
    ///
    /// # Returns
    /// `[slope, intercept]` of the least-squares line
    pub fn compute_poly(&self, spectrum: &[f32]) -> [f32; 2] {
        let n = spectrum.len().min(self.frequencies.len()) as f64;
        if n < 2.0 {
            return [f32::NAN, f32::NAN];
        }

        let mean_f: f64 = self.frequencies.iter().map(|&f| f as f64).sum::<f64>() / n;
        let mean_s: f64 = spectrum.iter().map(|&s| s as f64).sum::<f64>() / n;

        let (cov, var) = spectrum.iter().zip(self.frequencies.iter()).fold(
            (0.0f64, 0.0f64),
            |(cov, var), (&s, &f)| {
                let df = f as f64 - mean_f;
                (cov + df * (s as f64 - mean_s), var + df * df)
            },
        );

        let slope = cov / var;
        [slope as f32, (mean_s - slope * mean_f) as f32]
    }

    /// Compute octave-band spectral contrast
    ///
    /// For each of the 7 bands (below 200 Hz, then 6 octaves) the mean of the
    /// top and bottom 2% of bins are converted to dB and subtracted.
    ///
    /// # Returns
    /// Frame-major matrix of 7 contrast values per frame
    ///
    /// # Errors
    /// `AudioError::SampleRateTooLow` when the top band lies above Nyquist
    pub fn compute_contrast(&self, magnitude: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, AudioError> {
        let bands = self.contrast_bands()?;

        let mut peaks: Vec<Vec<f32>> = Vec::with_capacity(magnitude.len());
        let mut valleys: Vec<Vec<f32>> = Vec::with_capacity(magnitude.len());
        let mut sorted = Vec::new();

        for frame in magnitude {
            let mut peak = Vec::with_capacity(bands.len());
            let mut valley = Vec::with_capacity(bands.len());
            for band in &bands {
                sorted.clear();
                sorted.extend_from_slice(&frame[band.start..band.end]);
                sorted.sort_by(|a, b| a.total_cmp(b));

                let take = band.quantile_count.min(sorted.len()).max(1);
                let low = &sorted[..take];
                let high = &sorted[sorted.len() - take..];
                valley.push((low.iter().map(|&v| v as f64).sum::<f64>() / take as f64) as f32);
                peak.push((high.iter().map(|&v| v as f64).sum::<f64>() / take as f64) as f32);
            }
            peaks.push(peak);
            valleys.push(valley);
        }

        let peaks_db = power_to_db(&peaks);
        let valleys_db = power_to_db(&valleys);

        Ok(peaks_db
            .iter()
            .zip(valleys_db.iter())
            .map(|(p, v)| p.iter().zip(v.iter()).map(|(p, v)| p - v).collect())
            .collect())
    }

    /// Bin ranges of the contrast bands
    ///
    /// Every band above the first borrows one bin below its lower edge; the
    /// last band extends to Nyquist; all but the last drop their top bin.
    fn contrast_bands(&self) -> Result<Vec<ContrastBand>, AudioError> {
        let mut edges = vec![0.0f32];
        edges.extend((0..=CONTRAST_BANDS).map(|k| CONTRAST_FMIN * (1 << k) as f32));

        let n_bins = self.frequencies.len();
        let mut bands = Vec::with_capacity(CONTRAST_BANDS + 1);

        for k in 0..=CONTRAST_BANDS {
            let (f_low, f_high) = (edges[k], edges[k + 1]);
            let mut in_band = self
                .frequencies
                .iter()
                .enumerate()
                .filter(|&(_, &f)| f >= f_low && f <= f_high)
                .map(|(i, _)| i);

            let first = in_band.next().ok_or(AudioError::SampleRateTooLow {
                sample_rate: self.sample_rate,
                minimum: MIN_SAMPLE_RATE,
            })?;
            let last = in_band.last().unwrap_or(first);

            let start = if k > 0 { first.saturating_sub(1) } else { first };
            let end_inclusive = if k == CONTRAST_BANDS { n_bins - 1 } else { last };
            let count = end_inclusive - start + 1;
            let end = if k < CONTRAST_BANDS {
                end_inclusive
            } else {
                end_inclusive + 1
            };

            let quantile_count = ((CONTRAST_QUANTILE * count as f64).round_ties_even() as usize).max(1);
            bands.push(ContrastBand {
                start,
                end: end.max(start + 1),
                quantile_count,
            });
        }

        Ok(bands)
    }
}

#[derive(Debug, Clone, Copy)]
struct ContrastBand {
    start: usize,
    /// Exclusive
    end: usize,
    quantile_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fft::{magnitude, FftProcessor, HOP_LENGTH, N_FFT};

    fn spectrum_of_sine(sample_rate: u32, frequency: f32) -> Vec<f32> {
        let audio: Vec<f32> = (0..N_FFT * 4)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect();
        let processor = FftProcessor::new(N_FFT, HOP_LENGTH);
        let spec = magnitude(&processor.stft(&audio));
        spec[spec.len() / 2].clone()
    }

    #[test]
    fn test_centroid_tracks_sine_frequency() {
        let features = SpectralFeatures::new(22050, N_FFT);
        let low = features.compute_centroid(&spectrum_of_sine(22050, 500.0));
        let high = features.compute_centroid(&spectrum_of_sine(22050, 4000.0));
        assert!((low - 500.0).abs() < 50.0, "centroid {}", low);
        assert!(high > low);
    }

    #[test]
    fn test_silent_frame_is_zero() {
        let features = SpectralFeatures::new(22050, N_FFT);
        let silent = vec![0.0; N_FFT / 2 + 1];
        assert_eq!(features.compute_centroid(&silent), 0.0);
        assert_eq!(features.compute_bandwidth(&silent, 0.0), 0.0);
        assert_eq!(features.compute_rolloff(&silent), 0.0);
    }

    #[test]
    fn test_bandwidth_narrow_for_pure_tone() {
        let features = SpectralFeatures::new(22050, N_FFT);
        let spectrum = spectrum_of_sine(22050, 1000.0);
        let centroid = features.compute_centroid(&spectrum);
        let bandwidth = features.compute_bandwidth(&spectrum, centroid);
        assert!(bandwidth < 300.0, "bandwidth {}", bandwidth);
    }

    #[test]
    fn test_rolloff_on_flat_spectrum() {
        let features = SpectralFeatures::new(22050, N_FFT);
        let flat = vec![1.0; N_FFT / 2 + 1];
        let rolloff = features.compute_rolloff(&flat);
        // 85% of 1025 bins is reached at bin 871
        let expected = 871.0 * 22050.0 / N_FFT as f32;
        assert!((rolloff - expected).abs() < 11.0, "rolloff {}", rolloff);
    }

    #[test]
    fn test_poly_recovers_line() {
        let features = SpectralFeatures::new(22050, N_FFT);
        let freqs = fft_frequencies(22050, N_FFT);
        let line: Vec<f32> = freqs.iter().map(|f| 2.0 + 0.001 * f).collect();
        let [slope, intercept] = features.compute_poly(&line);
        assert!((slope - 0.001).abs() < 1e-6);
        assert!((intercept - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_contrast_shape_and_flat_spectrum() {
        let features = SpectralFeatures::new(22050, N_FFT);
        let flat = vec![vec![1.0; N_FFT / 2 + 1]; 3];
        let contrast = features.compute_contrast(&flat).unwrap();
        assert_eq!(contrast.len(), 3);
        assert_eq!(contrast[0].len(), CONTRAST_BANDS + 1);
        assert!(contrast.iter().flatten().all(|&c| c.abs() < 1e-4));
    }

    #[test]
    fn test_contrast_rejects_low_sample_rate() {
        let features = SpectralFeatures::new(8000, N_FFT);
        let flat = vec![vec![1.0; N_FFT / 2 + 1]];
        assert!(matches!(
            features.compute_contrast(&flat),
            Err(AudioError::SampleRateTooLow { sample_rate: 8000, .. })
        ));
        assert_eq!(MIN_SAMPLE_RATE, 12_801);
    }
}
