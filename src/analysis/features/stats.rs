// Stats module - mean / standard deviation / variance reductions
//
// Every transform output is collapsed to three scalars over all of its
// elements. Population statistics (ddof = 0), accumulated in f64. An empty
// input yields NaN for all three.

/// Mean, standard deviation and variance of a set of values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub var: f64,
}

impl Summary {
    /// Summarize a flat sequence of values
    pub fn of<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone,
        T: Into<f64>,
    {
        let (count, sum) = values
            .clone()
            .into_iter()
            .fold((0usize, 0.0f64), |(n, s), v| (n + 1, s + v.into()));
        let mean = sum / count as f64;

        let squared: f64 = values
            .into_iter()
            .map(|v| {
                let d = v.into() - mean;
                d * d
            })
            .sum();
        let var = squared / count as f64;

        Self {
            mean,
            std: var.sqrt(),
            var,
        }
    }

    /// Summarize every element of a frame-major matrix
    pub fn of_frames(frames: &[Vec<f32>]) -> Self {
        Self::of(frames.iter().flatten().copied())
    }
}

/// Median of a slice (mean of the two middle values for even lengths)
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
