use std::fs;
use std::time::Duration;

use image::DynamicImage;

use crate::errors::FetchError;

/// Default time limit for fetching one image.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum size of an image response body.
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches and decodes the image for a dataset row.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError>;
}

impl<F: ImageFetcher + ?Sized> ImageFetcher for &F {
    fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError> {
        (**self).fetch(url)
    }
}

/// Fetches images from HTTP(S) URLs, `file://` URLs or local paths.
///
/// HTTP requests are bounded by a timeout and are not retried. Responses with
/// a non-success status are treated as errors.
pub struct UrlFetcher {
    agent: ureq::Agent,
}

impl UrlFetcher {
    pub fn new() -> UrlFetcher {
        UrlFetcher::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> UrlFetcher {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        UrlFetcher {
            agent: config.into(),
        }
    }

    fn read_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let mut response = self.agent.get(url).call()?;
            let body = response
                .body_mut()
                .with_config()
                .limit(MAX_IMAGE_BYTES)
                .read_to_vec()?;
            Ok(body)
        } else {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(fs::read(path)?)
        }
    }
}

impl Default for UrlFetcher {
    fn default() -> UrlFetcher {
        UrlFetcher::new()
    }
}

impl ImageFetcher for UrlFetcher {
    fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError> {
        let bytes = self.read_bytes(url)?;
        let image = image::load_from_memory(&bytes)?;
        Ok(image)
    }
}
