use std::cell::RefCell;

use anyhow::anyhow;
use image::{DynamicImage, RgbImage};

use crate::engine::Engine;
use crate::errors::FetchError;
use crate::fetch::ImageFetcher;

/// Fetcher which returns a blank image for every URL, except those
/// containing "timeout", which fail as if the request timed out.
pub struct FakeFetcher {
    fetched: RefCell<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> FakeFetcher {
        FakeFetcher {
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// Return the URLs requested so far.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl ImageFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<DynamicImage, FetchError> {
        self.fetched.borrow_mut().push(url.to_string());
        if url.contains("timeout") {
            return Err(FetchError::Http(ureq::Error::Timeout(ureq::Timeout::Global)));
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::new(16, 16)))
    }
}

/// Engine which predicts the same text for every image.
pub struct FixedEngine {
    name: String,
    text: String,
}

impl FixedEngine {
    pub fn new(name: &str, text: &str) -> FixedEngine {
        FixedEngine {
            name: name.to_string(),
            text: text.to_string(),
        }
    }
}

impl Engine for FixedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, _image: &DynamicImage) -> anyhow::Result<String> {
        Ok(self.text.clone())
    }
}

/// Engine whose recognition always fails.
pub struct FailingEngine {
    name: String,
}

impl FailingEngine {
    pub fn new(name: &str) -> FailingEngine {
        FailingEngine {
            name: name.to_string(),
        }
    }
}

impl Engine for FailingEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, _image: &DynamicImage) -> anyhow::Result<String> {
        Err(anyhow!("model not loaded"))
    }
}

/// Engine which panics during recognition.
pub struct PanickingEngine {
    name: String,
}

impl PanickingEngine {
    pub fn new(name: &str) -> PanickingEngine {
        PanickingEngine {
            name: name.to_string(),
        }
    }
}

impl Engine for PanickingEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, _image: &DynamicImage) -> anyhow::Result<String> {
        panic!("unsupported input")
    }
}
