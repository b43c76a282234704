use std::fmt;
use std::iter::Enumerate;
use std::slice;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::dataset::DatasetRow;
use crate::fetch::ImageFetcher;

/// Position of a sample within its dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// 1-based index of the row.
    pub position: usize,

    /// Total number of rows.
    pub total: usize,
}

impl Progress {
    /// Return the fraction of rows processed, in `(0, 1]`.
    pub fn fraction(&self) -> f64 {
        self.position as f64 / self.total as f64
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.2}%", self.fraction() * 100.)
    }
}

/// An image and the text it is expected to contain.
pub struct Sample {
    /// Decoded image, or `None` if it could not be fetched.
    pub image: Option<DynamicImage>,
    pub reference_text: String,
    pub progress: Progress,
}

/// Iterator over the samples of a dataset.
///
/// Each row's image is fetched when the sample is requested, so at most one
/// image is held by the stream at a time. A row whose image cannot be
/// fetched still produces a sample, with no image, so that progress values
/// always correspond to row positions.
pub struct SampleStream<'a, F: ImageFetcher> {
    rows: Enumerate<slice::Iter<'a, DatasetRow>>,
    total: usize,
    fetcher: F,
    failed_fetches: usize,
}

impl<'a, F: ImageFetcher> SampleStream<'a, F> {
    pub fn new(rows: &'a [DatasetRow], fetcher: F) -> SampleStream<'a, F> {
        SampleStream {
            rows: rows.iter().enumerate(),
            total: rows.len(),
            fetcher,
            failed_fetches: 0,
        }
    }

    /// Return the number of rows whose image could not be fetched so far.
    pub fn failed_fetches(&self) -> usize {
        self.failed_fetches
    }

    /// Return an iterator over only the samples whose image was fetched.
    ///
    /// Samples keep the progress of the row they came from.
    pub fn imaged(self) -> impl Iterator<Item = Sample> + 'a
    where
        F: 'a,
    {
        self.filter(|sample| sample.image.is_some())
    }
}

impl<F: ImageFetcher> Iterator for SampleStream<'_, F> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let (index, row) = self.rows.next()?;
        let progress = Progress {
            position: index + 1,
            total: self.total,
        };

        let image = match self.fetcher.fetch(&row.url) {
            Ok(image) => {
                debug!(url = %row.url, width = image.width(), height = image.height(), "fetched image");
                Some(image)
            }
            Err(err) => {
                self.failed_fetches += 1;
                warn!(
                    url = %row.url,
                    timeout = err.is_timeout(),
                    "skipping row {}: {}",
                    progress.position,
                    err
                );
                None
            }
        };

        Some(Sample {
            image,
            reference_text: row.reference_text(),
            progress,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
