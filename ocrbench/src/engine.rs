use std::panic::{self, AssertUnwindSafe};

use image::DynamicImage;
use tracing::warn;

/// An OCR engine which extracts text from an image.
pub trait Engine {
    /// Name which identifies the engine in reports.
    fn name(&self) -> &str;

    /// Return the text found in `image`.
    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<String>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<String> {
        (**self).recognize(image)
    }
}

/// Text predicted by an engine for one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub engine_name: String,
    pub text: String,
}

/// Wrapper around an [Engine] whose predictions never fail.
///
/// If the engine returns an error or panics, the prediction is an empty
/// string, which scores zero against any non-empty reference.
pub struct EngineAdapter {
    engine: Box<dyn Engine>,
}

impl std::fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl EngineAdapter {
    pub fn new<E: Engine + 'static>(engine: E) -> EngineAdapter {
        EngineAdapter {
            engine: Box::new(engine),
        }
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn predict(&self, image: &DynamicImage) -> Prediction {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.engine.recognize(image)));
        let text = match result {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(engine = self.name(), "recognition failed: {:#}", err);
                String::new()
            }
            Err(_) => {
                warn!(engine = self.name(), "recognition panicked");
                String::new()
            }
        };
        Prediction {
            engine_name: self.name().to_string(),
            text,
        }
    }
}

impl From<Box<dyn Engine>> for EngineAdapter {
    fn from(engine: Box<dyn Engine>) -> EngineAdapter {
        EngineAdapter { engine }
    }
}
