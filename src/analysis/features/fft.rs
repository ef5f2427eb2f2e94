// FFT module - short-time Fourier transform and its inverse
//
// Frames are centered: the signal is zero-padded by n_fft / 2 on both sides,
// so frame t is centered on sample t * hop. A periodic Hann window is applied
// to every frame. Spectrograms are stored frame-major (outer index = frame,
// inner index = frequency bin, n_fft / 2 + 1 bins).

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT window size shared by every spectral feature
pub const N_FFT: usize = 2048;

/// Hop between successive frames in samples
pub const HOP_LENGTH: usize = 512;

/// Complex spectrogram, frame-major
pub type ComplexSpectrogram = Vec<Vec<Complex<f32>>>;

/// Real spectrogram (magnitude, power or filterbank output), frame-major
pub type Spectrogram = Vec<Vec<f32>>;

/// Periodic Hann window (the DFT-even variant used for spectral analysis)
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * ((2.0 * std::f64::consts::PI * i as f64) / size as f64).cos())
        .map(|w| w as f32)
        .collect()
}

/// Number of centered frames produced for a signal of `len` samples
pub fn frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop
}

/// Center frequency of every FFT bin in Hz
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|i| (i as f64 * sample_rate as f64 / n_fft as f64) as f32)
        .collect()
}

/// Convert a frame index to seconds
pub fn frames_to_time(frame: usize, sample_rate: u32, hop: usize) -> f64 {
    (frame * hop) as f64 / sample_rate as f64
}

/// Forward and inverse STFT with pre-planned transforms
pub struct FftProcessor {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    n_fft: usize,
    hop: usize,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `n_fft` - FFT window size
    /// * `hop` - Hop size between frames
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
            n_fft,
            hop,
            window: hann_window(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Compute the complex STFT (positive frequencies only)
    ///
    /// # Returns
    /// `frame_count(audio.len(), hop)` frames of `n_fft / 2 + 1` bins
    pub fn stft(&self, audio: &[f32]) -> ComplexSpectrogram {
        let pad = self.n_fft / 2;
        let n_frames = frame_count(audio.len(), self.hop);
        let n_bins = self.n_fft / 2 + 1;
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];

        for t in 0..n_frames {
            // Frame t spans padded[t*hop .. t*hop + n_fft], i.e. audio[t*hop - pad ..]
            let start = (t * self.hop) as isize - pad as isize;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let idx = start + j as isize;
                let sample = if idx >= 0 && (idx as usize) < audio.len() {
                    audio[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[j], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..n_bins].to_vec());
        }

        frames
    }

    /// Invert a one-sided STFT by windowed overlap-add
    ///
    /// The result is normalized by the summed squared window and trimmed to
    /// exactly `length` samples (zero-padded if the frames cover less).
    pub fn istft(&self, spectrogram: &[Vec<Complex<f32>>], length: usize) -> Vec<f32> {
        let n = self.n_fft;
        let n_frames = spectrogram.len();
        if n_frames == 0 {
            return vec![0.0; length];
        }

        let expected_len = n + self.hop * (n_frames - 1);
        let mut output = vec![0.0f64; expected_len];
        let mut window_sum = vec![0.0f64; expected_len];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];

        for (t, frame) in spectrogram.iter().enumerate() {
            // Rebuild the Hermitian-symmetric full spectrum
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k <= n / 2 {
                    frame[k]
                } else {
                    frame[n - k].conj()
                };
            }
            buffer[0].im = 0.0;
            buffer[n / 2].im = 0.0;
            self.inverse.process(&mut buffer);

            let offset = t * self.hop;
            for j in 0..n {
                let w = self.window[j] as f64;
                output[offset + j] += (buffer[j].re as f64 / n as f64) * w;
                window_sum[offset + j] += w * w;
            }
        }

        for (sample, &norm) in output.iter_mut().zip(window_sum.iter()) {
            if norm > f32::MIN_POSITIVE as f64 {
                *sample /= norm;
            }
        }

        let start = n / 2;
        (0..length)
            .map(|i| output.get(start + i).copied().unwrap_or(0.0) as f32)
            .collect()
    }
}

/// Magnitude of every bin of a complex spectrogram
pub fn magnitude(spectrogram: &[Vec<Complex<f32>>]) -> Spectrogram {
    spectrogram
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect()
}

/// Element-wise square of a magnitude spectrogram
pub fn power(magnitude: &[Vec<f32>]) -> Spectrogram {
    magnitude
        .iter()
        .map(|frame| frame.iter().map(|&m| m * m).collect())
        .collect()
}
