use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::errors::DatasetError;
use crate::fetch::ImageFetcher;
use crate::stream::SampleStream;

/// One captioned text region in a dataset row.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Entry {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Metadata {
    pub entries: Vec<Entry>,
}

/// A row of an image captioning dataset.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DatasetRow {
    /// Location of the image.
    pub url: String,

    #[serde(deserialize_with = "json_column")]
    pub metadata: Metadata,

    /// Free-form captions, kept as-is.
    ///
    /// Captions are not used for scoring, which only compares against
    /// [DatasetRow::reference_text]. They are parsed so that callers which
    /// inspect rows, such as [Dataset::head], can see them.
    #[serde(default, deserialize_with = "json_column")]
    pub captions: Option<serde_json::Value>,
}

impl DatasetRow {
    /// Create a row whose reference text consists of `texts`.
    pub fn new<I, S>(url: &str, texts: I) -> DatasetRow
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = texts
            .into_iter()
            .map(|text| Entry { text: text.into() })
            .collect();
        DatasetRow {
            url: url.to_string(),
            metadata: Metadata { entries },
            captions: None,
        }
    }

    /// Return the ground truth text for the row's image.
    ///
    /// This is the text of each entry, in order, separated by single spaces.
    pub fn reference_text(&self) -> String {
        let texts: Vec<&str> = self
            .metadata
            .entries
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        texts.join(" ")
    }
}

/// Deserialize a column that may hold either a JSON value or a string
/// containing encoded JSON.
fn json_column<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Column<T> {
        Encoded(String),
        Value(T),
    }

    match Column::<T>::deserialize(deserializer)? {
        Column::Encoded(json) => serde_json::from_str(&json).map_err(D::Error::custom),
        Column::Value(value) => Ok(value),
    }
}

/// Options for loading a [Dataset].
#[derive(Clone, Debug)]
pub struct LoadParams {
    /// Maximum number of rows to load.
    pub num_rows: usize,
}

impl Default for LoadParams {
    fn default() -> LoadParams {
        LoadParams { num_rows: 100 }
    }
}

/// Ordered, in-memory collection of dataset rows.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn from_rows(rows: Vec<DatasetRow>) -> Dataset {
        Dataset { rows }
    }

    /// Load rows from a JSON Lines file.
    pub fn load(path: impl AsRef<Path>, params: &LoadParams) -> Result<Dataset, DatasetError> {
        let file = fs::File::open(path.as_ref())?;
        let dataset = Dataset::from_reader(BufReader::new(file), params)?;
        info!(
            rows = dataset.len(),
            path = %path.as_ref().display(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Read up to `params.num_rows` rows in JSON Lines format.
    ///
    /// Blank lines are ignored. Lines after the last row needed are not read.
    pub fn from_reader<R: BufRead>(reader: R, params: &LoadParams) -> Result<Dataset, DatasetError> {
        let mut rows = Vec::new();
        for (line_idx, line) in reader.lines().enumerate() {
            if rows.len() >= params.num_rows {
                break;
            }
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row = serde_json::from_str(&line).map_err(|source| DatasetError::Json {
                line: line_idx + 1,
                source,
            })?;
            rows.push(row);
        }
        Ok(Dataset { rows })
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Return the first `n` rows.
    pub fn head(&self, n: usize) -> &[DatasetRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Return a stream of samples which fetches each row's image using `fetcher`.
    pub fn samples<F: ImageFetcher>(&self, fetcher: F) -> SampleStream<'_, F> {
        SampleStream::new(&self.rows, fetcher)
    }
}
