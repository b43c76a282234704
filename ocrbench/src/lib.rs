//! Harness for comparing OCR engines on a dataset of captioned images.
//!
//! A [Dataset] of rows, each holding an image URL and the text the image
//! contains, is turned into a [SampleStream] which fetches images lazily.
//! A [Harness] runs every configured [Engine] on each sample, scores the
//! predictions against the reference text and records the scores in an
//! [EvaluationRegistry], which produces a per-engine [Report].

mod dataset;
mod engine;
mod errors;
mod fetch;
mod harness;
mod registry;
mod scorer;
mod stats;
mod stream;

#[cfg(test)]
mod test_util;

pub use dataset::{Dataset, DatasetRow, Entry, LoadParams, Metadata};
pub use engine::{Engine, EngineAdapter, Prediction};
pub use errors::{DatasetError, FetchError};
pub use fetch::{ImageFetcher, UrlFetcher, DEFAULT_FETCH_TIMEOUT};
pub use harness::{Harness, HarnessParams, ProgressSink, RunSummary};
pub use registry::{EvaluationRegistry, Report, ReportRow};
pub use scorer::score;
pub use stats::{ScoreAccumulator, DEFAULT_THRESHOLD};
pub use stream::{Progress, Sample, SampleStream};
