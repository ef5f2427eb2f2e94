// BeatTracker - global tempo estimation and dynamic-programming beat tracking
//
// Tempo comes from an autocorrelation tempogram of the onset envelope weighted
// by a log-normal prior around 120 BPM. Beats are then placed by dynamic
// programming: each frame's cumulative score combines its local onset score
// with the best earlier beat roughly one period back, penalized by the squared
// log deviation from the period.
//
// References:
// - Ellis, D. P. W. (2007). Beat tracking by dynamic programming
// - Grosche, P., Müller, M., Kurth, F. (2010). Cyclic tempogram

use rustfft::{num_complex::Complex, FftPlanner};

use crate::analysis::features::stats::median;

/// Center of the tempo prior in BPM
const START_BPM: f64 = 120.0;

/// Width of the tempo prior in octaves
const STD_BPM: f64 = 1.0;

/// Tempi at or above this are never selected
const MAX_TEMPO: f64 = 320.0;

/// Autocorrelation window in seconds
const AC_SIZE: f64 = 8.0;

/// Penalty on deviations from the beat period
const TIGHTNESS: f64 = 100.0;

/// Tempo estimate and beat positions in frames
#[derive(Debug, Clone, PartialEq)]
pub struct BeatTrack {
    pub tempo: f64,
    pub beats: Vec<usize>,
}

/// Beat tracker for onset envelopes at a fixed frame rate
pub struct BeatTracker {
    sample_rate: u32,
    hop: usize,
}

impl BeatTracker {
    pub fn new(sample_rate: u32, hop: usize) -> Self {
        Self { sample_rate, hop }
    }

    fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop as f64
    }

    /// Estimate tempo, then track beats
    ///
    /// An all-zero envelope yields tempo 0 and no beats.
    pub fn track(&self, envelope: &[f32]) -> BeatTrack {
        if envelope.iter().all(|&v| v == 0.0) {
            log::debug!("Onset envelope is silent; no beats");
            return BeatTrack {
                tempo: 0.0,
                beats: Vec::new(),
            };
        }

        let tempo = self.estimate_tempo(envelope);
        let beats = self.track_beats(envelope, tempo);
        log::debug!("Tempo {:.2} BPM, {} beats", tempo, beats.len());
        BeatTrack { tempo, beats }
    }

    /// Global tempo in BPM
    pub fn estimate_tempo(&self, envelope: &[f32]) -> f64 {
        let win = ((AC_SIZE * self.sample_rate as f64) as usize / self.hop).max(2);
        let tempogram = self.mean_tempogram(envelope, win);

        let mut best_lag = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (lag, &strength) in tempogram.iter().enumerate().skip(1) {
            let bpm = 60.0 * self.frame_rate() / lag as f64;
            if bpm >= MAX_TEMPO {
                continue;
            }
            let prior = -0.5 * ((bpm.log2() - START_BPM.log2()) / STD_BPM).powi(2);
            let score = (1e6 * strength).ln_1p() + prior;
            if score > best_score {
                best_score = score;
                best_lag = lag;
            }
        }

        if best_lag == 0 {
            return 0.0;
        }
        60.0 * self.frame_rate() / best_lag as f64
    }

    /// Autocorrelation tempogram averaged over time, one value per lag
    fn mean_tempogram(&self, envelope: &[f32], win: usize) -> Vec<f64> {
        let n = envelope.len();
        let pad = win / 2;

        // Linear ramp from zero into each edge value
        let first = envelope.first().copied().unwrap_or(0.0) as f64;
        let last = envelope.last().copied().unwrap_or(0.0) as f64;
        let mut padded = Vec::with_capacity(n + 2 * pad);
        padded.extend((0..pad).map(|i| first * i as f64 / pad as f64));
        padded.extend(envelope.iter().map(|&v| v as f64));
        padded.extend((0..pad).map(|j| last * (pad - 1 - j) as f64 / pad as f64));

        let window: Vec<f64> = (0..win)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / win as f64).cos())
            .collect();

        let n_fft = (2 * win).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n_fft);
        let inverse = planner.plan_fft_inverse(n_fft);
        let mut buffer = vec![Complex::new(0.0f64, 0.0); n_fft];

        let n_frames = padded.len().saturating_sub(win) + 1;
        let mut total = vec![0.0f64; win];
        for start in 0..n_frames {
            for (i, slot) in buffer.iter_mut().enumerate() {
                let v = if i < win { padded[start + i] * window[i] } else { 0.0 };
                *slot = Complex::new(v, 0.0);
            }
            forward.process(&mut buffer);
            for c in buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            inverse.process(&mut buffer);

            let acf: Vec<f64> = buffer[..win].iter().map(|c| c.re / n_fft as f64).collect();
            let peak = acf.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            let scale = if peak > f64::MIN_POSITIVE { peak } else { 1.0 };
            for (t, &a) in total.iter_mut().zip(acf.iter()) {
                *t += a / scale;
            }
        }

        for t in total.iter_mut() {
            *t /= n_frames as f64;
        }
        total
    }

    /// Dynamic-programming beat placement for a known tempo
    pub fn track_beats(&self, envelope: &[f32], tempo: f64) -> Vec<usize> {
        if tempo <= 0.0 || envelope.is_empty() {
            return Vec::new();
        }
        let period = ((60.0 * self.frame_rate() / tempo).round_ties_even() as usize).max(1);

        let local = local_score(envelope, period);
        let (backlink, cumulative) = dynamic_program(&local, period);

        let Some(tail) = last_beat(&cumulative) else {
            return Vec::new();
        };

        let mut beats = vec![tail];
        while let Some(prev) = backlink[beats[beats.len() - 1]] {
            beats.push(prev);
        }
        beats.reverse();

        trim_beats(&local, beats)
    }
}

/// Onsets scaled by their sample standard deviation, smoothed by a Gaussian
/// spanning one period on each side
fn local_score(envelope: &[f32], period: usize) -> Vec<f64> {
    let n = envelope.len();
    let mean = envelope.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let std = if n > 1 {
        (envelope
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64)
            .sqrt()
    } else {
        0.0
    };
    let scaled: Vec<f64> = envelope
        .iter()
        .map(|&v| v as f64 / (std + f64::MIN_POSITIVE))
        .collect();

    let p = period as isize;
    let kernel: Vec<f64> = (-p..=p)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period as f64).powi(2)).exp())
        .collect();

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + p - j as isize;
                    (idx >= 0 && idx < n as isize).then(|| w * scaled[idx as usize])
                })
                .sum()
        })
        .collect()
}

/// Cumulative beat scores and the best predecessor of every frame
fn dynamic_program(local: &[f64], period: usize) -> (Vec<Option<usize>>, Vec<f64>) {
    let n = local.len();
    let mut backlink = vec![None; n];
    let mut cumulative = vec![0.0f64; n];
    let threshold = 0.01 * local.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ln_period = (period as f64).ln();
    let nearest = (period as f64 / 2.0).round_ties_even() as isize;
    let farthest = 2 * period as isize;
    let mut first_beat = true;

    for (i, &score_i) in local.iter().enumerate() {
        let mut best_score = f64::NEG_INFINITY;
        let mut best_loc: Option<usize> = None;

        let mut loc = i as isize - nearest;
        while loc >= 0 && loc >= i as isize - farthest {
            let gap = (i as isize - loc) as f64;
            let score = cumulative[loc as usize] - TIGHTNESS * (gap.ln() - ln_period).powi(2);
            if score > best_score {
                best_score = score;
                best_loc = Some(loc as usize);
            }
            loc -= 1;
        }

        cumulative[i] = match best_loc {
            Some(_) => score_i + best_score,
            None => score_i,
        };

        if first_beat && score_i < threshold {
            backlink[i] = None;
        } else {
            backlink[i] = best_loc;
            first_beat = false;
        }
    }

    (backlink, cumulative)
}

/// Last local maximum of the cumulative score above half the median peak
fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let n = cumulative.len();
    let is_peak = |i: usize| {
        let left = cumulative[i.saturating_sub(1)];
        let right = cumulative[(i + 1).min(n - 1)];
        cumulative[i] > left && cumulative[i] >= right
    };
    let peaks: Vec<f32> = (0..n)
        .filter(|&i| is_peak(i))
        .map(|i| cumulative[i] as f32)
        .collect();
    if peaks.is_empty() {
        return n.checked_sub(1);
    }
    let med = median(&peaks) as f64;

    (0..n).rev().find(|&i| is_peak(i) && cumulative[i] * 2.0 > med)
}

/// Drop weak leading and trailing beats
///
/// Beats are kept from the first whose smoothed local score exceeds half the
/// RMS up to, but not including, the last such beat.
fn trim_beats(local: &[f64], beats: Vec<usize>) -> Vec<usize> {
    const SMOOTH: [f64; 5] = [0.0, 0.5, 1.0, 0.5, 0.0];

    let scores: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let n = scores.len();
    let smoothed: Vec<f64> = (0..n as isize)
        .map(|i| {
            SMOOTH
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + 2 - j as isize;
                    (idx >= 0 && idx < n as isize).then(|| w * scores[idx as usize])
                })
                .sum()
        })
        .collect();

    let rms = (smoothed.iter().map(|v| v * v).sum::<f64>() / n.max(1) as f64).sqrt();
    let threshold = 0.5 * rms;

    let valid: Vec<usize> = (0..n).filter(|&i| smoothed[i] > threshold).collect();
    match (valid.first(), valid.last()) {
        (Some(&start), Some(&end)) => beats[start..end].to_vec(),
        _ => Vec::new(),
    }
}
