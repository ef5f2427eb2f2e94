// Norm module - decibel conversion and per-frame normalization

/// Floor applied before taking logarithms
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept below the loudest value, in dB
pub const TOP_DB: f32 = 80.0;

/// Convert a power spectrogram to decibels (ref = 1.0)
///
/// Values are clipped to `max - TOP_DB` where `max` is taken over the whole
/// spectrogram, not per frame.
pub fn power_to_db(power: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut db: Vec<Vec<f32>> = power
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();

    let max = db
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = max - TOP_DB;
    for value in db.iter_mut().flatten() {
        *value = value.max(floor);
    }
    db
}

/// Norm used to rescale a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Norm {
    /// Maximum absolute value
    Inf,
    /// Sum of absolute values
    L1,
    /// Euclidean length
    L2,
}

impl Norm {
    fn length(self, values: &[f32]) -> f32 {
        match self {
            Norm::Inf => values.iter().fold(0.0f32, |m, v| m.max(v.abs())),
            Norm::L1 => values.iter().map(|v| v.abs()).sum(),
            Norm::L2 => values.iter().map(|v| v * v).sum::<f32>().sqrt(),
        }
    }
}

/// Normalize one frame in place
///
/// Frames whose norm is below the smallest positive f32 are left untouched,
/// so silent frames stay all-zero instead of turning into NaN.
pub fn normalize(values: &mut [f32], norm: Norm) {
    let length = norm.length(values);
    if length < f32::MIN_POSITIVE {
        return;
    }
    for v in values.iter_mut() {
        *v /= length;
    }
}

/// Normalize every frame of a frame-major matrix in place
pub fn normalize_frames(frames: &mut [Vec<f32>], norm: Norm) {
    for frame in frames.iter_mut() {
        normalize(frame, norm);
    }
}
