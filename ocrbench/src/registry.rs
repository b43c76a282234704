use std::fmt;

use serde_json::json;

use crate::scorer::score;
use crate::stats::ScoreAccumulator;

/// Width of each column in the text report.
const COLUMN_WIDTH: usize = 15;

/// Collects similarity scores for each OCR engine.
///
/// Engines are registered the first time they are evaluated and are
/// reported in that order.
#[derive(Clone, Debug, Default)]
pub struct EvaluationRegistry {
    engines: Vec<(String, ScoreAccumulator)>,
}

impl EvaluationRegistry {
    pub fn new() -> EvaluationRegistry {
        EvaluationRegistry::default()
    }

    /// Score `predicted` against `reference` and record the score for
    /// `engine_name`.
    ///
    /// Every call records a new score, even if the same arguments were
    /// evaluated before.
    pub fn evaluate(&mut self, engine_name: &str, predicted: &str, reference: &str) -> f64 {
        let score = score(predicted, reference);
        self.accumulator_mut(engine_name).add(score);
        score
    }

    fn accumulator_mut(&mut self, engine_name: &str) -> &mut ScoreAccumulator {
        let pos = match self.engines.iter().position(|(name, _)| name == engine_name) {
            Some(pos) => pos,
            None => {
                self.engines
                    .push((engine_name.to_string(), ScoreAccumulator::new()));
                self.engines.len() - 1
            }
        };
        &mut self.engines[pos].1
    }

    /// Return the scores recorded for an engine, if it has been evaluated.
    pub fn accumulator(&self, engine_name: &str) -> Option<&ScoreAccumulator> {
        self.engines
            .iter()
            .find(|(name, _)| name == engine_name)
            .map(|(_, acc)| acc)
    }

    /// Return the names of evaluated engines, in the order they were first seen.
    pub fn engine_names(&self) -> impl Iterator<Item = &str> {
        self.engines.iter().map(|(name, _)| name.as_str())
    }

    /// Return the number of engines that have been evaluated.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Summarize the scores of each engine.
    ///
    /// `threshold` is the score which a prediction must exceed to count as a
    /// good answer.
    pub fn report(&self, threshold: f64) -> Report {
        let rows = self
            .engines
            .iter()
            .map(|(name, acc)| ReportRow {
                engine_name: name.clone(),
                count: acc.count(),
                mean: acc.mean(),
                median: acc.median(),
                good_answers: acc.count_above(threshold),
            })
            .collect();
        Report { threshold, rows }
    }
}

/// Summary statistics for one engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub engine_name: String,

    /// Number of predictions that were scored.
    pub count: usize,

    pub mean: f64,
    pub median: f64,

    /// Number of scores above the report's threshold.
    pub good_answers: usize,
}

/// Comparison of engines produced by [EvaluationRegistry::report].
///
/// The [Display](fmt::Display) implementation renders a fixed-width text
/// table.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub threshold: f64,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Render the report as JSON.
    ///
    /// Statistics which are not finite are output as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let engines: Vec<_> = self
            .rows
            .iter()
            .map(|row| {
                json!({
                    "model": row.engine_name,
                    "evaluations": row.count,
                    "avg_score": row.mean,
                    "median_score": row.median,
                    "good_answers": row.good_answers,
                })
            })
            .collect();

        json!({
            "threshold": self.threshold,
            "engines": engines,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let w = COLUMN_WIDTH;

        writeln!(
            f,
            "{:<w$}{:<w$}{:<w$}{:<w$}{:<w$}",
            "Model", "Evaluations", "Avg Score", "Median Score", "Good Answers"
        )?;
        writeln!(f, "{}", "-".repeat(70))?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<w$}{:<w$}{:<w$.2}{:<w$.2}{:<w$}",
                row.engine_name, row.count, row.mean, row.median, row.good_answers
            )?;
        }
        Ok(())
    }
}
