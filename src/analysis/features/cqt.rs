// CQT module - multirate constant-Q transform
//
// Bins are spaced 36 per octave over 7 octaves starting at C1. Each octave is
// evaluated on a decimated copy of the signal: the top octave runs at the
// lowest rate that still keeps it below the anti-aliasing passband, and every
// octave below halves the rate again. Filters are Hann-windowed complex
// exponentials whose length is Q periods, applied as sparse kernels in the
// frequency domain.
//
// References:
// - Brown, J. C., Puckette, M. S. (1992). An efficient algorithm for the
//   calculation of a constant Q transform
// - Schörkhuber, C., Klapuri, A. (2010). Constant-Q transform toolbox for music processing

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::fft::{frame_count, hann_window};

/// Frequency of C1 in Hz
pub const FMIN_C1: f64 = 32.703_195_662_574_83;

/// Constant-Q bins per octave
pub const BINS_PER_OCTAVE: usize = 36;

/// Octaves covered above FMIN_C1
pub const N_OCTAVES: usize = 7;

/// Total number of constant-Q bins
pub const N_BINS: usize = BINS_PER_OCTAVE * N_OCTAVES;

/// Fraction of each kernel's magnitude discarded when sparsifying
const SPARSITY: f32 = 0.01;

/// Portion of the post-decimation Nyquist band treated as clean
const DECIMATION_PASSBAND: f64 = 0.8;

/// Taps of the half-band anti-aliasing filter
const DECIMATION_TAPS: usize = 127;

/// Constant-Q transform planned for one sample rate and hop size
pub struct ConstantQ {
    hop: usize,
    octaves: Vec<OctavePlan>,
    lowpass: Vec<f32>,
}

struct OctavePlan {
    /// Number of 2x decimations applied before this octave
    level: usize,
    n_fft: usize,
    fft: Arc<dyn Fft<f32>>,
    first_bin: usize,
    kernels: Vec<SparseKernel>,
}

struct SparseKernel {
    entries: Vec<(usize, Complex<f32>)>,
    /// sqrt of the filter length at the original rate
    gain: f32,
}

impl ConstantQ {
    /// Plan the transform; `tuning` shifts every bin by that fraction of a bin
    pub fn new(sample_rate: u32, hop: usize, tuning: f64) -> Self {
        let q = 1.0 / (2f64.powf(1.0 / BINS_PER_OCTAVE as f64) - 1.0);
        let fmin = FMIN_C1 * 2f64.powf(tuning / BINS_PER_OCTAVE as f64);
        let mut planner = FftPlanner::new();
        let mut octaves = Vec::with_capacity(N_OCTAVES);
        let mut level = 0usize;

        // Walk octaves from the top down so decimation only ever increases
        for octave in (0..N_OCTAVES).rev() {
            let first_bin = octave * BINS_PER_OCTAVE;
            let freqs: Vec<f64> = (first_bin..first_bin + BINS_PER_OCTAVE)
                .map(|k| fmin * 2f64.powf(k as f64 / BINS_PER_OCTAVE as f64))
                .collect();
            let f_max = freqs[BINS_PER_OCTAVE - 1];

            loop {
                let rate = sample_rate as f64 / (1u64 << level) as f64;
                let next_nyquist = rate / 4.0;
                let hop_divisible = (hop >> level) % 2 == 0 && (hop >> level) > 1;
                if hop_divisible && f_max < DECIMATION_PASSBAND * next_nyquist {
                    level += 1;
                } else {
                    break;
                }
            }

            let rate = sample_rate as f64 / (1u64 << level) as f64;
            let lengths: Vec<usize> = freqs
                .iter()
                .map(|&f| ((q * rate / f).ceil() as usize).max(1))
                .collect();
            let n_fft = lengths
                .iter()
                .copied()
                .max()
                .unwrap_or(1)
                .next_power_of_two();
            let fft = planner.plan_fft_forward(n_fft);

            let kernels = freqs
                .iter()
                .zip(lengths.iter())
                .map(|(&f, &len)| {
                    let entries = build_kernel(f, len, rate, n_fft, fft.as_ref());
                    let gain = (q * sample_rate as f64 / f).sqrt() as f32;
                    SparseKernel { entries, gain }
                })
                .collect();

            log::debug!(
                "CQT octave {}: level {} ({:.1} Hz), fft {}",
                octave,
                level,
                rate,
                n_fft
            );

            octaves.push(OctavePlan {
                level,
                n_fft,
                fft,
                first_bin,
                kernels,
            });
        }

        Self {
            hop,
            octaves,
            lowpass: lowpass_filter(DECIMATION_TAPS, 0.225),
        }
    }

    /// Constant-Q magnitude, frame-major with `N_BINS` bins per frame
    pub fn magnitude(&self, audio: &[f32]) -> Vec<Vec<f32>> {
        let n_frames = frame_count(audio.len(), self.hop);
        let mut output = vec![vec![0.0f32; N_BINS]; n_frames];
        let mut signals: Vec<Vec<f32>> = vec![audio.to_vec()];

        for plan in &self.octaves {
            while signals.len() <= plan.level {
                let next = decimate(&signals[signals.len() - 1], &self.lowpass);
                signals.push(next);
            }
            let signal = &signals[plan.level];
            let hop = self.hop >> plan.level;
            let half = plan.n_fft / 2;
            let scale = 1.0 / plan.n_fft as f32;
            let mut buffer = vec![Complex::new(0.0f32, 0.0); plan.n_fft];

            for (t, frame) in output.iter_mut().enumerate() {
                let start = (t * hop) as isize - half as isize;
                for (j, slot) in buffer.iter_mut().enumerate() {
                    let idx = start + j as isize;
                    let sample = if idx >= 0 && (idx as usize) < signal.len() {
                        signal[idx as usize]
                    } else {
                        0.0
                    };
                    *slot = Complex::new(sample, 0.0);
                }
                plan.fft.process(&mut buffer);

                for (i, kernel) in plan.kernels.iter().enumerate() {
                    let response = kernel
                        .entries
                        .iter()
                        .fold(Complex::new(0.0f32, 0.0), |acc, &(j, k)| {
                            acc + buffer[j] * k.conj()
                        });
                    frame[plan.first_bin + i] = response.norm() * scale * kernel.gain;
                }
            }
        }

        output
    }
}

/// Frequency-domain kernel of one constant-Q filter, sparsified
fn build_kernel(
    frequency: f64,
    length: usize,
    rate: f64,
    n_fft: usize,
    fft: &dyn Fft<f32>,
) -> Vec<(usize, Complex<f32>)> {
    let window = hann_window(length);
    let offset = n_fft / 2 - length / 2;
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    let mut l1 = 0.0f64;
    for (n, &w) in window.iter().enumerate() {
        let t = n as f64 - (length / 2) as f64;
        let phase = 2.0 * std::f64::consts::PI * frequency * t / rate;
        let value = Complex::new((w as f64 * phase.cos()) as f32, (w as f64 * phase.sin()) as f32);
        l1 += value.norm() as f64;
        buffer[offset + n] = value;
    }
    if l1 > 0.0 {
        for value in buffer.iter_mut() {
            *value /= l1 as f32;
        }
    }

    fft.process(&mut buffer);

    // Drop the smallest coefficients holding SPARSITY of the total magnitude
    let total: f32 = buffer.iter().map(|c| c.norm()).sum();
    let mut sorted: Vec<f32> = buffer.iter().map(|c| c.norm()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut cumulative = 0.0f32;
    let mut cutoff = 0.0f32;
    for &m in &sorted {
        cumulative += m;
        if cumulative / total.max(f32::MIN_POSITIVE) >= SPARSITY {
            cutoff = m;
            break;
        }
    }

    buffer
        .iter()
        .enumerate()
        .filter(|(_, c)| c.norm() >= cutoff && c.norm() > 0.0)
        .map(|(j, &c)| (j, c))
        .collect()
}

/// Blackman-windowed sinc lowpass, unit DC gain
fn lowpass_filter(taps: usize, cutoff: f64) -> Vec<f32> {
    let m = (taps - 1) as f64;
    let mut h: Vec<f64> = (0..taps)
        .map(|n| {
            let x = n as f64 - m / 2.0;
            let sinc = if x == 0.0 {
                2.0 * cutoff
            } else {
                (2.0 * std::f64::consts::PI * cutoff * x).sin() / (std::f64::consts::PI * x)
            };
            let phase = 2.0 * std::f64::consts::PI * n as f64 / m;
            let blackman = 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos();
            sinc * blackman
        })
        .collect();
    let sum: f64 = h.iter().sum();
    for v in h.iter_mut() {
        *v /= sum;
    }
    h.into_iter().map(|v| v as f32).collect()
}

/// Zero-phase lowpass then keep every second sample
fn decimate(signal: &[f32], lowpass: &[f32]) -> Vec<f32> {
    let half = (lowpass.len() / 2) as isize;
    (0..signal.len().div_ceil(2))
        .map(|m| {
            let center = (2 * m) as isize;
            lowpass
                .iter()
                .enumerate()
                .map(|(k, &h)| {
                    let idx = center + k as isize - half;
                    if idx >= 0 && (idx as usize) < signal.len() {
                        h * signal[idx as usize]
                    } else {
                        0.0
                    }
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::fft::HOP_LENGTH;

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn peak_bin(frame: &[f32]) -> usize {
        frame
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_cqt_shape() {
        let cqt = ConstantQ::new(22050, HOP_LENGTH, 0.0);
        let out = cqt.magnitude(&vec![0.0; 22050]);
        assert_eq!(out.len(), frame_count(22050, HOP_LENGTH));
        assert!(out.iter().all(|frame| frame.len() == N_BINS));
        assert!(out.iter().flatten().all(|&v| v == 0.0));
    }

    #[test]
    fn test_cqt_peaks_at_a4() {
        let sr = 22050;
        let cqt = ConstantQ::new(sr, HOP_LENGTH, 0.0);
        let out = cqt.magnitude(&sine(sr, 440.0, sr as usize * 2));
        let frame = &out[out.len() / 2];
        // 36 * log2(440 / C1) = 135
        let bin = peak_bin(frame);
        assert!((134..=136).contains(&bin), "peak at bin {}", bin);
    }

    #[test]
    fn test_tuning_moves_bins_onto_detuned_pitch() {
        let sr = 22050;
        // Half a bin sharp of A4
        let audio = sine(sr, 440.0 * 2f32.powf(0.5 / 36.0), sr as usize * 2);
        let tuned = ConstantQ::new(sr, HOP_LENGTH, 0.5).magnitude(&audio);
        let frame = &tuned[tuned.len() / 2];
        assert_eq!(peak_bin(frame), 135);
        assert!((frame[134] - frame[136]).abs() < 0.2 * frame[135]);
    }

    #[test]
    fn test_cqt_low_octave_after_decimation() {
        let sr = 44100;
        let cqt = ConstantQ::new(sr, HOP_LENGTH, 0.0);
        let out = cqt.magnitude(&sine(sr, 55.0, sr as usize * 3));
        let frame = &out[out.len() / 2];
        // A1 = 36 * log2(55 / C1) = 27
        let bin = peak_bin(frame);
        assert!((26..=28).contains(&bin), "peak at bin {}", bin);
    }

    #[test]
    fn test_decimate_keeps_low_frequencies() {
        let lowpass = lowpass_filter(DECIMATION_TAPS, 0.225);
        let signal = sine(8000, 100.0, 4000);
        let decimated = decimate(&signal, &lowpass);
        assert_eq!(decimated.len(), 2000);
        let peak = decimated[500..1500].iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!((peak - 1.0).abs() < 0.02, "peak {}", peak);

        let high = sine(8000, 3500.0, 4000);
        let rejected = decimate(&high, &lowpass);
        let leak = rejected[500..1500].iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(leak < 0.01, "leak {}", leak);
    }
}
