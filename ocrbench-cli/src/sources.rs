use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use rten::Model;
use tracing::info;
use url::Url;

/// Return the path to the directory in which downloaded datasets and models
/// are cached.
fn cache_dir() -> Result<PathBuf, anyhow::Error> {
    let mut cache_dir: PathBuf =
        home::home_dir().ok_or(anyhow!("Failed to determine home directory"))?;
    cache_dir.push(".cache");
    cache_dir.push("ocrbench");

    fs::create_dir_all(&cache_dir)?;

    Ok(cache_dir)
}

/// Return the path within `cache_dir` where the file at `url` is cached.
///
/// The path mirrors the URL's host and path, so that files with the same
/// name on different hosts or in different directories do not collide.
///
/// eg. "https://data.com/rows/001.jsonl" => "{cache_dir}/data.com/rows/001.jsonl".
#[allow(rustdoc::bare_urls)]
fn cache_path_for(cache_dir: &Path, url: &str) -> Option<PathBuf> {
    let parsed = Url::parse(url).ok()?;
    let host = match parsed.port() {
        Some(port) => format!("{}_{}", parsed.host_str()?, port),
        None => parsed.host_str()?.to_string(),
    };

    let mut path = cache_dir.join(host);
    let mut has_filename = false;
    for segment in parsed.path_segments()? {
        if segment == "." || segment == ".." {
            return None;
        }
        has_filename = !segment.is_empty();
        if has_filename {
            path.push(segment);
        }
    }
    has_filename.then_some(path)
}

/// Download a file from `url` to the local cache, if not already fetched,
/// and return the path to the local file.
fn download_file(url: &str) -> Result<PathBuf, anyhow::Error> {
    let cache_dir = cache_dir()?;
    let file_path =
        cache_path_for(&cache_dir, url).ok_or(anyhow!("Could not get destination filename"))?;
    if file_path.exists() {
        info!(path = %file_path.display(), url, "using cached file");
        return Ok(file_path);
    }
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    eprintln!("Downloading {}...", url);

    // Write to a temporary name first so an interrupted download is not
    // mistaken for a cached file on the next run.
    let partial_path = file_path.with_extension("part");
    let mut reader = ureq::get(url).call()?.into_body().into_reader();
    let mut file = fs::File::create(&partial_path)?;
    io::copy(&mut reader, &mut file)?;
    fs::rename(&partial_path, &file_path)?;

    Ok(file_path)
}

/// Location that a dataset or model can be loaded from.
#[derive(Clone, Copy)]
pub enum Source<'a> {
    /// Load from an HTTP(S) URL.
    Url(&'a str),

    /// Load from a local file path.
    Path(&'a str),
}

impl<'a> Source<'a> {
    /// Interpret `location` as a URL if it has an HTTP(S) scheme, or as a
    /// file path otherwise.
    pub fn parse(location: &'a str) -> Source<'a> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Source::Url(location)
        } else {
            Source::Path(location)
        }
    }

    /// Return the local path of the file, downloading it first if needed.
    pub fn local_path(self) -> Result<PathBuf, anyhow::Error> {
        match self {
            Source::Url(url) => download_file(url),
            Source::Path(path) => Ok(path.into()),
        }
    }
}

impl fmt::Display for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Source::Url(url) => url,
                Source::Path(path) => path,
            }
        )
    }
}

/// Load a model from a given source.
///
/// If the source is a URL, the model will be downloaded and cached locally if
/// needed.
pub fn load_model(source: Source) -> Result<Model, anyhow::Error> {
    let model_path = source.local_path()?;
    let model = Model::load_file(model_path)?;
    Ok(model)
}
