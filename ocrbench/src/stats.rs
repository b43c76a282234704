/// Default score above which a prediction counts as a "good answer".
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Append-only collection of similarity scores for one engine.
///
/// Statistics of an empty accumulator ([ScoreAccumulator::mean],
/// [ScoreAccumulator::median]) are `NaN`.
#[derive(Clone, Debug, Default)]
pub struct ScoreAccumulator {
    scores: Vec<f64>,
}

impl ScoreAccumulator {
    pub fn new() -> ScoreAccumulator {
        ScoreAccumulator::default()
    }

    pub fn add(&mut self, score: f64) {
        self.scores.push(score);
    }

    /// Scores in the order they were added.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn count(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Arithmetic mean, or `NaN` if there are no scores.
    pub fn mean(&self) -> f64 {
        if self.scores.is_empty() {
            return f64::NAN;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    /// Median, or `NaN` if there are no scores.
    ///
    /// For an even number of scores this is the mean of the two middle values.
    pub fn median(&self) -> f64 {
        let n = self.scores.len();
        if n == 0 {
            return f64::NAN;
        }

        let mut sorted = self.scores.clone();
        sorted.sort_by(f64::total_cmp);

        if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        }
    }

    /// Number of scores strictly greater than `threshold`.
    pub fn count_above(&self, threshold: f64) -> usize {
        self.scores.iter().filter(|&&s| s > threshold).count()
    }
}
