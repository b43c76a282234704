use tracing::{debug, info};

use crate::engine::EngineAdapter;
use crate::registry::{EvaluationRegistry, Report};
use crate::stats::DEFAULT_THRESHOLD;
use crate::stream::{Progress, Sample};

/// Receives progress updates after each sample is processed.
pub trait ProgressSink {
    fn progress(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressSink for F {
    fn progress(&mut self, progress: Progress) {
        self(progress)
    }
}

/// Configuration for a [Harness].
#[derive(Clone, Debug)]
pub struct HarnessParams {
    /// Score which a prediction must exceed to count as a good answer.
    pub threshold: f64,
}

impl Default for HarnessParams {
    fn default() -> HarnessParams {
        HarnessParams {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Outcome of [Harness::run].
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Number of samples which were passed to the engines.
    pub scored: usize,

    /// Number of samples skipped because their image was unavailable.
    pub skipped: usize,

    pub report: Report,
}

/// Runs a set of OCR engines over a stream of samples and scores their
/// predictions.
pub struct Harness {
    engines: Vec<EngineAdapter>,
    params: HarnessParams,
}

impl Harness {
    /// Create a harness which runs `engines`, in order, on each sample.
    pub fn new(engines: Vec<EngineAdapter>, params: HarnessParams) -> Harness {
        Harness { engines, params }
    }

    pub fn engines(&self) -> &[EngineAdapter] {
        &self.engines
    }

    /// Evaluate every engine on every sample.
    ///
    /// Each sample is processed by all engines before the next sample is
    /// requested. Samples without an image are not scored, but their
    /// progress is still reported.
    pub fn run<I, P>(
        &self,
        samples: I,
        registry: &mut EvaluationRegistry,
        mut progress_sink: P,
    ) -> RunSummary
    where
        I: IntoIterator<Item = Sample>,
        P: ProgressSink,
    {
        let mut scored = 0;
        let mut skipped = 0;

        for sample in samples {
            if self.evaluate_sample(&sample, registry) {
                scored += 1;
            } else {
                skipped += 1;
            }
            progress_sink.progress(sample.progress);
        }

        info!(scored, skipped, "evaluation finished");

        RunSummary {
            scored,
            skipped,
            report: registry.report(self.params.threshold),
        }
    }

    /// Run all engines on a sample and record their scores. Returns false
    /// if the sample has no image.
    fn evaluate_sample(&self, sample: &Sample, registry: &mut EvaluationRegistry) -> bool {
        let Some(image) = &sample.image else {
            return false;
        };

        for engine in &self.engines {
            let prediction = engine.predict(image);
            let score = registry.evaluate(
                &prediction.engine_name,
                &prediction.text,
                &sample.reference_text,
            );
            debug!(
                engine = %prediction.engine_name,
                row = sample.progress.position,
                score,
                "scored prediction"
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, RgbImage};

    use super::{Harness, HarnessParams};
    use crate::dataset::{Dataset, DatasetRow};
    use crate::engine::EngineAdapter;
    use crate::registry::EvaluationRegistry;
    use crate::stream::{Progress, Sample};
    use crate::test_util::{FailingEngine, FakeFetcher, FixedEngine};

    fn sample(reference: &str, position: usize, total: usize, has_image: bool) -> Sample {
        Sample {
            image: has_image.then(|| DynamicImage::ImageRgb8(RgbImage::new(2, 2))),
            reference_text: reference.to_string(),
            progress: Progress { position, total },
        }
    }

    #[test]
    fn test_run_scores_all_engines() {
        let harness = Harness::new(
            vec![
                EngineAdapter::new(FixedEngine::new("Exact", "hello world")),
                EngineAdapter::new(FailingEngine::new("Broken")),
            ],
            HarnessParams::default(),
        );
        let samples = vec![
            sample("hello world", 1, 2, true),
            sample("hello world", 2, 2, true),
        ];

        let mut registry = EvaluationRegistry::new();
        let mut progress = Vec::new();
        let summary = harness.run(samples, &mut registry, |p: Progress| progress.push(p));

        assert_eq!(summary.scored, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(progress.len(), 2);

        let rows = &summary.report.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].engine_name, "Exact");
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].mean, 1.0);
        assert_eq!(rows[0].good_answers, 2);
        assert_eq!(rows[1].engine_name, "Broken");
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[1].mean, 0.0);
        assert_eq!(rows[1].good_answers, 0);
    }

    #[test]
    fn test_run_skips_missing_images() {
        let harness = Harness::new(
            vec![EngineAdapter::new(FixedEngine::new("Exact", "text"))],
            HarnessParams::default(),
        );
        let samples = vec![
            sample("text", 1, 3, true),
            sample("text", 2, 3, false),
            sample("text", 3, 3, true),
        ];

        let mut registry = EvaluationRegistry::new();
        let mut positions = Vec::new();
        let summary = harness.run(samples, &mut registry, |p: Progress| {
            positions.push(p.position)
        });

        assert_eq!(summary.scored, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(positions, [1, 2, 3]);
        assert_eq!(registry.accumulator("Exact").unwrap().count(), 2);
    }

    #[test]
    fn test_run_with_dataset() {
        let dataset = Dataset::from_rows(vec![
            DatasetRow::new("one.png", ["one"]),
            DatasetRow::new("timeout/two.png", ["two"]),
            DatasetRow::new("three.png", ["three", "four"]),
        ]);
        let fetcher = FakeFetcher::new();
        let harness = Harness::new(
            vec![EngineAdapter::new(FixedEngine::new("Fixed", "three four"))],
            HarnessParams { threshold: 0.5 },
        );

        let mut registry = EvaluationRegistry::new();
        let summary = harness.run(dataset.samples(&fetcher), &mut registry, |_: Progress| {});

        assert_eq!(summary.scored, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.report.threshold, 0.5);
        let row = &summary.report.rows[0];
        assert_eq!(row.count, 2);
        assert_eq!(row.good_answers, 1);
        assert!((row.mean - (2.0 / 13.0 + 1.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_without_engines() {
        let harness = Harness::new(Vec::new(), HarnessParams::default());
        let mut registry = EvaluationRegistry::new();
        let summary = harness.run(vec![sample("a", 1, 1, true)], &mut registry, |_: Progress| {});
        assert_eq!(summary.scored, 1);
        assert!(summary.report.rows.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_records_from_earlier_runs_are_kept() {
        let harness = Harness::new(
            vec![EngineAdapter::new(FixedEngine::new("Exact", "a"))],
            HarnessParams::default(),
        );
        let mut registry = EvaluationRegistry::new();
        harness.run(vec![sample("a", 1, 1, true)], &mut registry, |_: Progress| {});

        // Abandon a stream part way through.
        let samples = vec![sample("a", 1, 2, true), sample("a", 2, 2, true)];
        harness.run(samples.into_iter().take(1), &mut registry, |_: Progress| {});

        assert_eq!(registry.accumulator("Exact").unwrap().count(), 2);
    }
}
