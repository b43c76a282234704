use std::io;

use thiserror::Error;

/// Errors that can occur when fetching and decoding a sample's image.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request failed, timed out or returned an error status.
    #[error("request failed: {0}")]
    Http(#[from] ureq::Error),

    /// Reading the response or image file failed.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// The response was not a supported image.
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

impl FetchError {
    /// Return true if the error was caused by the request exceeding its
    /// time limit.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Http(ureq::Error::Timeout(_)))
    }
}

/// Errors that can occur when loading a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] io::Error),

    /// A row could not be parsed. `line` is 1-based.
    #[error("invalid row on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
