use std::process::Command;

use anyhow::{anyhow, bail, Context};
use image::{DynamicImage, ImageFormat};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use tempfile::NamedTempFile;

use ocrbench::Engine;

use crate::sources::{load_model, Source};

/// Default text detection model.
const DETECTION_MODEL: &str =
    "https://s3.amazonaws.com/io.github.robertknight/ocrs-models/text-detection.rten";

/// Default text recognition model.
const RECOGNITION_MODEL: &str =
    "https://s3.amazonaws.com/io.github.robertknight/ocrs-models/text-recognition.rten";

/// Placeholder in command arguments which is replaced by the image path.
const IMAGE_PLACEHOLDER: &str = "{image}";

/// Model locations for [OcrsEngine].
#[derive(Default)]
pub struct OcrsParams {
    /// Path to a custom text detection model.
    pub detection_model: Option<String>,

    /// Path to a custom text recognition model.
    pub recognition_model: Option<String>,
}

/// Runs the ocrs engine in-process.
pub struct OcrsEngine {
    engine: OcrEngine,
}

impl OcrsEngine {
    /// Load the detection and recognition models, downloading the default
    /// models if custom ones are not specified.
    pub fn load(params: &OcrsParams) -> anyhow::Result<OcrsEngine> {
        let detection_src = params
            .detection_model
            .as_deref()
            .map(Source::Path)
            .unwrap_or(Source::Url(DETECTION_MODEL));
        let detection_model = load_model(detection_src).with_context(|| {
            format!("Failed to load text detection model from \"{}\"", detection_src)
        })?;

        let recognition_src = params
            .recognition_model
            .as_deref()
            .map(Source::Path)
            .unwrap_or(Source::Url(RECOGNITION_MODEL));
        let recognition_model = load_model(recognition_src).with_context(|| {
            format!("Failed to load text recognition model from \"{}\"", recognition_src)
        })?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| anyhow!("Failed to create ocrs engine: {}", err))?;

        Ok(OcrsEngine { engine })
    }
}

impl Engine for OcrsEngine {
    fn name(&self) -> &str {
        "ocrs"
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<String> {
        let rgb = image.to_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| anyhow!("{}", err))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| anyhow!("{}", err))?;

        // Lines are separated by newlines, whereas reference texts use spaces.
        Ok(text.lines().collect::<Vec<_>>().join(" "))
    }
}

/// Runs an external OCR program on each image.
///
/// The image is written to a temporary PNG file whose path is substituted
/// for `{image}` in the arguments, or appended if there is no placeholder.
/// The program's standard output, with surrounding whitespace removed, is
/// the prediction.
///
/// This supports any engine which has a command-line wrapper, such as
/// Tesseract or a script around EasyOCR or PaddleOCR.
pub struct CommandEngine {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(name: &str, program: &str, args: Vec<String>) -> CommandEngine {
        CommandEngine {
            name: name.to_string(),
            program: program.to_string(),
            args,
        }
    }

    /// Run the `tesseract` executable found in `PATH`.
    pub fn tesseract() -> CommandEngine {
        CommandEngine::new(
            "Tesseract",
            "tesseract",
            vec![IMAGE_PLACEHOLDER.to_string(), "stdout".to_string()],
        )
    }

    /// Parse an engine description of the form `<name>=<program> [args...]`.
    ///
    /// The command is split on whitespace. Single or double quotes group
    /// words containing spaces into one argument.
    pub fn parse(desc: &str) -> anyhow::Result<CommandEngine> {
        let (name, command) = desc
            .split_once('=')
            .ok_or_else(|| anyhow!("expected `<name>=<command>`, got \"{}\"", desc))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("engine name is empty in \"{}\"", desc);
        }

        let mut parts = split_command(command)
            .with_context(|| format!("invalid command in \"{}\"", desc))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("command is empty in \"{}\"", desc))?;
        let args = parts.collect();

        Ok(CommandEngine::new(name, &program, args))
    }

    /// Return the arguments to pass to the program for an image at `path`.
    fn args_for(&self, path: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(IMAGE_PLACEHOLDER, path))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(IMAGE_PLACEHOLDER)) {
            args.push(path.to_string());
        }
        args
    }
}

/// Split a command line into words, honoring single and double quotes.
fn split_command(command: &str) -> anyhow::Result<Vec<String>> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quote: Option<char> = None;

    for ch in command.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => word.get_or_insert_with(String::new).push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                word.get_or_insert_with(String::new);
            }
            None if ch.is_whitespace() => words.extend(word.take()),
            None => word.get_or_insert_with(String::new).push(ch),
        }
    }

    if let Some(q) = quote {
        bail!("unterminated {} quote", q);
    }
    words.extend(word);
    Ok(words)
}

impl Engine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, image: &DynamicImage) -> anyhow::Result<String> {
        let input = NamedTempFile::with_suffix(".png")?;
        image
            .to_rgb8()
            .save_with_format(input.path(), ImageFormat::Png)?;

        let path = input.path().to_string_lossy();
        let output = Command::new(&self.program)
            .args(self.args_for(&path))
            .output()
            .with_context(|| format!("Failed to run \"{}\"", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("\"{}\" failed ({}): {}", self.program, output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
