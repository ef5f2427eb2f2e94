//! Audio file decoding
//!
//! Decodes a song to mono `f32` PCM at its native sample rate. WAV files go
//! through `hound`; every other container (MP3, FLAC, OGG, AAC, ...) is probed
//! and decoded with `symphonia`. Multi-channel audio is averaged to mono.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;

/// Decoded mono waveform plus its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Native sample rate in Hz (never resampled)
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load an audio file as a mono signal at its native sample rate
///
/// # Errors
/// * `AudioError::FileOpen` - file missing or unreadable
/// * `AudioError::UnsupportedFormat` - probe failed or codec unknown
/// * `AudioError::NoAudioTrack` - container without audio
/// * `AudioError::Decode` - corrupt sample data
pub fn load_audio(path: &Path) -> Result<AudioSignal, AudioError> {
    let display = path.display().to_string();
    log::debug!("Decoding audio file {}", display);

    let file = File::open(path).map_err(|err| AudioError::FileOpen {
        path: display.clone(),
        reason: err.to_string(),
    })?;

    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "wav" | "wave"))
        .unwrap_or(false);

    let signal = if is_wav {
        decode_wav(file, &display)?
    } else {
        decode_with_symphonia(file, path, &display)?
    };

    log::debug!(
        "Decoded {}: {} samples at {} Hz ({:.2} s)",
        display,
        signal.samples.len(),
        signal.sample_rate,
        signal.duration_seconds()
    );

    Ok(signal)
}

fn decode_wav(file: File, display: &str) -> Result<AudioSignal, AudioError> {
    let reader =
        hound::WavReader::new(BufReader::new(file)).map_err(|err| wav_error(err, display))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| wav_error(err, display))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|err| wav_error(err, display))?
        }
    };

    Ok(AudioSignal::new(
        downmix(&interleaved, channels),
        spec.sample_rate,
    ))
}

fn wav_error(err: hound::Error, display: &str) -> AudioError {
    match err {
        hound::Error::IoError(io) => AudioError::Decode {
            path: display.to_string(),
            reason: io.to_string(),
        },
        hound::Error::FormatError(reason) => AudioError::UnsupportedFormat {
            path: display.to_string(),
            reason: reason.to_string(),
        },
        other => AudioError::UnsupportedFormat {
            path: display.to_string(),
            reason: other.to_string(),
        },
    }
}

fn decode_with_symphonia(
    file: File,
    path: &Path,
    display: &str,
) -> Result<AudioSignal, AudioError> {
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| AudioError::UnsupportedFormat {
            path: display.to_string(),
            reason: err.to_string(),
        })?;
    let mut format = probed.format;

    let mut track = open_track(format.as_ref(), display)?;
    let mut sample_rate = track.sample_rate;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                // Chained stream: the track list changed, continue on the new track
                track = open_track(format.as_ref(), display)?;
                sample_buf = None;
                log::warn!(
                    "Stream parameters changed mid-file in {}, decoder rebuilt",
                    display
                );
                continue;
            }
            Err(err) => {
                return Err(AudioError::Decode {
                    path: display.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match track.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                // Recoverable: the packet is dropped, the stream continues
                log::warn!("Skipping malformed packet in {}: {}", display, reason);
                continue;
            }
            Err(err) => {
                return Err(AudioError::Decode {
                    path: display.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        let spec = *decoded.spec();
        let rate = *sample_rate.get_or_insert(spec.rate);
        if spec.rate != rate {
            return Err(AudioError::Decode {
                path: display.to_string(),
                reason: format!("sample rate changed from {} to {} Hz", rate, spec.rate),
            });
        }

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
        });
        if buf.capacity() < decoded.capacity() * spec.channels.count() {
            *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);
        samples.extend(downmix(buf.samples(), spec.channels.count().max(1)));
    }

    let sample_rate = sample_rate.ok_or_else(|| AudioError::Decode {
        path: display.to_string(),
        reason: "sample rate unknown".to_string(),
    })?;

    Ok(AudioSignal::new(samples, sample_rate))
}

/// Decoder for the first audio track of a container
struct TrackDecoder {
    id: u32,
    sample_rate: Option<u32>,
    decoder: Box<dyn Decoder>,
}

fn open_track(format: &dyn FormatReader, display: &str) -> Result<TrackDecoder, AudioError> {
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::NoAudioTrack {
            path: display.to_string(),
        })?;

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| AudioError::UnsupportedFormat {
            path: display.to_string(),
            reason: err.to_string(),
        })?;

    Ok(TrackDecoder {
        id: track.id,
        sample_rate: track.codec_params.sample_rate,
        decoder,
    })
}

/// Average interleaved channels into a mono signal
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
