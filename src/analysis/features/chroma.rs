//! Pitch-class features: chroma from the STFT and the CQT, CENS and tonnetz
//!
//! All chroma matrices are frame-major with 12 values per frame, index 0 = C.

use std::f64::consts::PI;

use super::cqt::{BINS_PER_OCTAVE, N_BINS};
use super::norm::{normalize, normalize_frames, Norm};

/// Pitch classes per octave
pub const N_CHROMA: usize = 12;

/// Center octave of the STFT chroma weighting (C5 region)
const CENTER_OCTAVE: f64 = 5.0;

/// Gaussian width of the octave weighting, in octaves
const OCTAVE_WIDTH: f64 = 2.0;

/// Quantization thresholds of CENS, each adding 0.25
const CENS_STEPS: [f32; 4] = [0.4, 0.2, 0.1, 0.05];
const CENS_WEIGHT: f32 = 0.25;

/// Length of the CENS smoothing window, in frames
const CENS_SMOOTHING: usize = 41;

/// Projection of FFT bins onto pitch classes
///
/// `tuning` shifts the reference A440 by that fraction of a semitone.
pub struct ChromaFilter {
    /// One row of `n_fft / 2 + 1` weights per pitch class
    weights: Vec<Vec<f32>>,
}

impl ChromaFilter {
    pub fn new(sample_rate: u32, n_fft: usize, tuning: f64) -> Self {
        let n_chroma = N_CHROMA as f64;
        let a0 = 440.0 * 2f64.powf(tuning / n_chroma) / 16.0;

        // Fractional chroma bin of every FFT bin, DC extrapolated from bin 1
        let mut frqbins: Vec<f64> = (1..n_fft)
            .map(|k| {
                let f = k as f64 * sample_rate as f64 / n_fft as f64;
                n_chroma * (f / a0).log2()
            })
            .collect();
        let dc = frqbins[0] - 1.5 * n_chroma;
        frqbins.insert(0, dc);

        let mut widths: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
        widths.push(1.0);

        let half = (n_chroma / 2.0).round();
        let mut columns: Vec<Vec<f64>> = frqbins
            .iter()
            .zip(widths.iter())
            .map(|(&bin, &width)| {
                (0..N_CHROMA)
                    .map(|c| {
                        let d = (bin - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
                        (-0.5 * (2.0 * d / width).powi(2)).exp()
                    })
                    .collect()
            })
            .collect();

        for (column, &bin) in columns.iter_mut().zip(frqbins.iter()) {
            let length = column.iter().map(|v| v * v).sum::<f64>().sqrt();
            let octave_weight =
                (-0.5 * ((bin / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
            for v in column.iter_mut() {
                if length > 0.0 {
                    *v /= length;
                }
                *v *= octave_weight;
            }
        }

        // Rows start at A; rotate so row 0 is C
        let n_bins = n_fft / 2 + 1;
        let weights = (0..N_CHROMA)
            .map(|c| {
                let row = (c + 3) % N_CHROMA;
                columns[..n_bins].iter().map(|col| col[row] as f32).collect()
            })
            .collect();

        Self { weights }
    }

    /// Chroma of a frame-major power spectrogram, max-normalized per frame
    pub fn chroma_stft(&self, power: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let mut chroma: Vec<Vec<f32>> = power
            .iter()
            .map(|frame| {
                self.weights
                    .iter()
                    .map(|row| row.iter().zip(frame.iter()).map(|(&w, &p)| w * p).sum())
                    .collect()
            })
            .collect();
        normalize_frames(&mut chroma, Norm::Inf);
        chroma
    }
}

/// Sum constant-Q bins into pitch classes, without normalization
///
/// Bins are grouped three per semitone with the bin tuned to the semitone in
/// the middle of its group. The transform starts at C, so bin 35 of each
/// octave folds into C of the next.
pub fn cqt_to_chroma(cqt: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let merge = BINS_PER_OCTAVE / N_CHROMA;
    cqt.iter()
        .map(|frame| {
            let mut chroma = vec![0.0f32; N_CHROMA];
            for (k, &v) in frame.iter().take(N_BINS).enumerate() {
                chroma[((k + 1) % BINS_PER_OCTAVE) / merge] += v;
            }
            chroma
        })
        .collect()
}

/// Chroma from a constant-Q magnitude, max-normalized per frame
pub fn chroma_cqt(cqt: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut chroma = cqt_to_chroma(cqt);
    normalize_frames(&mut chroma, Norm::Inf);
    chroma
}

/// Chroma Energy Normalized Statistics
///
/// L1-normalized chroma is quantized logarithmically, smoothed over time with
/// a Hann window (zeros beyond the edges) and L2-normalized.
pub fn chroma_cens(cqt: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut chroma = cqt_to_chroma(cqt);
    normalize_frames(&mut chroma, Norm::L1);

    let quantized: Vec<Vec<f32>> = chroma
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&v| {
                    CENS_STEPS
                        .iter()
                        .filter(|&&step| v > step)
                        .map(|_| CENS_WEIGHT)
                        .sum()
                })
                .collect()
        })
        .collect();

    // Symmetric Hann of length 43; the end points are zero
    let len = CENS_SMOOTHING + 2;
    let window: Vec<f32> = (0..len)
        .map(|n| (0.5 - 0.5 * (2.0 * PI * n as f64 / (len - 1) as f64).cos()) as f32)
        .collect();
    let total: f32 = window.iter().sum();
    let half = len / 2;

    let n_frames = quantized.len();
    (0..n_frames)
        .map(|t| {
            let mut smoothed = vec![0.0f32; N_CHROMA];
            for (j, &w) in window.iter().enumerate() {
                let idx = t as isize + j as isize - half as isize;
                if idx < 0 || idx as usize >= n_frames {
                    continue;
                }
                for (s, &q) in smoothed.iter_mut().zip(quantized[idx as usize].iter()) {
                    *s += w / total * q;
                }
            }
            normalize(&mut smoothed, Norm::L2);
            smoothed
        })
        .collect()
}

/// Tonal centroid features
///
/// Projects L1-normalized chroma onto three circles: fifths, minor thirds and
/// major thirds. Returns 6 values per frame.
pub fn tonnetz(chroma: &[Vec<f32>]) -> Vec<Vec<f32>> {
    const SCALE: [f64; 6] = [7.0 / 6.0, 7.0 / 6.0, 1.5, 1.5, 2.0 / 3.0, 2.0 / 3.0];
    const RADIUS: [f64; 6] = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

    let phi: Vec<Vec<f32>> = (0..6)
        .map(|d| {
            (0..N_CHROMA)
                .map(|c| {
                    let mut v = SCALE[d] * c as f64;
                    if d % 2 == 0 {
                        v -= 0.5;
                    }
                    (RADIUS[d] * (PI * v).cos()) as f32
                })
                .collect()
        })
        .collect();

    chroma
        .iter()
        .map(|frame| {
            let mut normalized = frame.clone();
            normalize(&mut normalized, Norm::L1);
            phi.iter()
                .map(|row| row.iter().zip(normalized.iter()).map(|(&p, &c)| p * c).sum())
                .collect()
        })
        .collect()
}
