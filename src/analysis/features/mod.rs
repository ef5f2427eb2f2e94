// FeatureExtractor - DSP feature extraction for genre classification
//
// This module turns a decoded song into the fixed 54-value feature vector the
// genre model was trained on. Every transform output is reduced to its mean,
// standard deviation and variance; tempo and beats contribute three scalars.
//
// Module organization:
// - types: Feature schema (FEATURE_NAMES, FeatureVector)
// - fft: STFT / ISTFT with centered framing
// - norm: dB conversion and per-frame normalization
// - stats: mean / std / var reductions
// - spectral: Centroid, bandwidth, rolloff, poly fit, contrast
// - temporal: RMS and zero-crossing rate
// - mel: Mel spectrogram, MFCC and delta
// - cqt: Multirate constant-Q transform
// - chroma: Chroma (STFT, CQT, CENS) and tonnetz
// - hpss: Harmonic / percussive separation
// - tuning: Deviation from A440 that the chroma and CQT filters follow
// - mod.rs: Coordinator (FeatureExtractor)
//
// All frame-based transforms share n_fft = 2048 and hop = 512, so a single
// STFT and a single mel spectrogram feed most of the features.
//
// References:
// - Tzanetakis, G., Cook, P. (2002). Musical genre classification of audio signals
// - McFee, B. et al. (2015). librosa: Audio and music signal analysis in Python

pub mod chroma;
pub mod cqt;
pub mod fft;
pub mod hpss;
pub mod mel;
pub mod norm;
pub mod spectral;
pub mod stats;
pub mod temporal;
pub mod tuning;
pub mod types;

pub use types::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

use std::path::Path;
use std::time::Instant;

use crate::analysis::beat::BeatTracker;
use crate::analysis::onset::{Aggregate, OnsetDetector};
use crate::audio::{load_audio, AudioSignal};
use crate::error::AudioError;

use chroma::{ChromaFilter, N_CHROMA};
use cqt::{ConstantQ, BINS_PER_OCTAVE};
use fft::{magnitude, power, FftProcessor, HOP_LENGTH, N_FFT};
use mel::{MelFilterbank, DELTA_WIDTH, N_MELS, N_MFCC};
use spectral::{SpectralFeatures, MIN_SAMPLE_RATE};
use stats::Summary;
use temporal::TemporalFeatures;

/// Onsets whose timing contributes to the frame statistics
const ONSET_LIMIT: usize = 20;

/// FeatureExtractor coordinates the feature extraction pipeline
///
/// Holds the FFT plans and filterbanks for one sample rate; build one per
/// decoded file. The chroma and constant-Q filters follow each song's own
/// tuning and are planned per call.
pub struct FeatureExtractor {
    sample_rate: u32,
    fft_processor: FftProcessor,
    spectral_features: SpectralFeatures,
    temporal_features: TemporalFeatures,
    mel_filterbank: MelFilterbank,
    onset_detector: OnsetDetector,
    beat_tracker: BeatTracker,
}

impl FeatureExtractor {
    /// Create a new FeatureExtractor for the given sample rate
    ///
    /// # Errors
    /// `AudioError::SampleRateTooLow` below `MIN_SAMPLE_RATE`, where the
    /// highest spectral contrast band no longer fits under Nyquist
    pub fn new(sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate < MIN_SAMPLE_RATE {
            return Err(AudioError::SampleRateTooLow {
                sample_rate,
                minimum: MIN_SAMPLE_RATE,
            });
        }

        Ok(Self {
            sample_rate,
            fft_processor: FftProcessor::new(N_FFT, HOP_LENGTH),
            spectral_features: SpectralFeatures::new(sample_rate, N_FFT),
            temporal_features: TemporalFeatures::new(N_FFT, HOP_LENGTH),
            mel_filterbank: MelFilterbank::new(sample_rate, N_FFT, N_MELS),
            onset_detector: OnsetDetector::new(sample_rate, HOP_LENGTH),
            beat_tracker: BeatTracker::new(sample_rate, HOP_LENGTH),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode a file and extract its features
    pub fn extract_file(path: &Path) -> Result<FeatureVector, AudioError> {
        let signal = load_audio(path)?;
        Self::extract_signal(&signal)
    }

    /// Extract features from an already decoded signal
    pub fn extract_signal(signal: &AudioSignal) -> Result<FeatureVector, AudioError> {
        Self::new(signal.sample_rate)?.extract(&signal.samples)
    }

    /// Extract all features from a mono waveform at this extractor's rate
    ///
    /// Silent or empty input is not an error: the beat fields become
    /// 0 / 0 / NaN and the onset timing fields NaN.
    pub fn extract(&self, audio: &[f32]) -> Result<FeatureVector, AudioError> {
        let started = Instant::now();
        let mut values = Vec::with_capacity(FEATURE_COUNT);

        let stft = self.fft_processor.stft(audio);
        let mag = magnitude(&stft);
        let pow = power(&mag);
        let mel = self.mel_filterbank.apply(&pow);
        log::debug!("STFT: {} frames ({:?})", stft.len(), started.elapsed());

        // Rhythm
        let beat_envelope = self.onset_detector.strength(&mel, Aggregate::Median);
        let track = self.beat_tracker.track(&beat_envelope);
        values.push(track.tempo);
        values.push(track.beats.iter().map(|&b| b as f64).sum());
        values.push(Summary::of(track.beats.iter().map(|&b| b as f64)).mean);

        // Pitch content
        let stft_tuning = tuning::estimate_tuning(&pow, self.sample_rate, N_FFT, N_CHROMA);
        let chroma_stft =
            ChromaFilter::new(self.sample_rate, N_FFT, stft_tuning).chroma_stft(&pow);
        let cqt_tuning = tuning::estimate_tuning(&mag, self.sample_rate, N_FFT, BINS_PER_OCTAVE);
        let cqt = ConstantQ::new(self.sample_rate, HOP_LENGTH, cqt_tuning).magnitude(audio);
        let chroma_cq = chroma::chroma_cqt(&cqt);
        let chroma_cens = chroma::chroma_cens(&cqt);
        log::debug!("Chroma and CQT done ({:?})", started.elapsed());
        push_summary(&mut values, Summary::of_frames(&chroma_stft));
        push_summary(&mut values, Summary::of_frames(&chroma_cq));
        push_summary(&mut values, Summary::of_frames(&chroma_cens));

        // Timbre
        let mfcc = mel::mfcc(&mel, N_MFCC);
        let mfcc_delta = mel::delta(&mfcc, DELTA_WIDTH);
        push_summary(&mut values, Summary::of_frames(&mel));
        push_summary(&mut values, Summary::of_frames(&mfcc));
        push_summary(&mut values, Summary::of_frames(&mfcc_delta));

        let rms = self.temporal_features.compute_rms(audio);
        push_summary(&mut values, Summary::of(rms.iter().copied()));

        // Spectral shape
        let centroids: Vec<f32> = mag
            .iter()
            .map(|frame| self.spectral_features.compute_centroid(frame))
            .collect();
        let bandwidths: Vec<f32> = mag
            .iter()
            .zip(centroids.iter())
            .map(|(frame, &c)| self.spectral_features.compute_bandwidth(frame, c))
            .collect();
        let contrast = self.spectral_features.compute_contrast(&mag)?;
        let rolloff: Vec<f32> = mag
            .iter()
            .map(|frame| self.spectral_features.compute_rolloff(frame))
            .collect();
        let poly: Vec<f32> = mag
            .iter()
            .flat_map(|frame| self.spectral_features.compute_poly(frame))
            .collect();
        push_summary(&mut values, Summary::of(centroids.iter().copied()));
        push_summary(&mut values, Summary::of(bandwidths.iter().copied()));
        push_summary(&mut values, Summary::of_frames(&contrast));
        push_summary(&mut values, Summary::of(rolloff.iter().copied()));
        push_summary(&mut values, Summary::of(poly.iter().copied()));

        let tonnetz = chroma::tonnetz(&chroma_cq);
        push_summary(&mut values, Summary::of_frames(&tonnetz));

        let zcr = self.temporal_features.compute_zcr(audio);
        push_summary(&mut values, Summary::of(zcr.iter().copied()));

        // Source separation
        let separation = hpss::separate(&self.fft_processor, &stft, audio.len());
        push_summary(&mut values, Summary::of(separation.harmonic.iter().copied()));
        push_summary(&mut values, Summary::of(separation.percussive.iter().copied()));
        log::debug!("HPSS done ({:?})", started.elapsed());

        // Onset timing
        let onset_envelope = self.onset_detector.strength(&mel, Aggregate::Mean);
        let onsets = self.onset_detector.detect(&onset_envelope);
        let times = self.onset_detector.onset_times(&onsets, ONSET_LIMIT);
        push_summary(&mut values, Summary::of(times.iter().copied()));

        debug_assert_eq!(values.len(), FEATURE_COUNT);
        let mut columns = [f64::NAN; FEATURE_COUNT];
        for (slot, value) in columns.iter_mut().zip(values) {
            *slot = value;
        }

        log::info!(
            "Extracted {} features from {:.2}s of audio in {:?}",
            FEATURE_COUNT,
            audio.len() as f64 / self.sample_rate as f64,
            started.elapsed()
        );
        Ok(FeatureVector::from_values(columns))
    }
}

fn push_summary(values: &mut Vec<f64>, summary: Summary) {
    values.extend([summary.mean, summary.std, summary.var]);
}
