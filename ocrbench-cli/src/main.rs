use std::error::Error;
use std::fmt;
use std::time::Duration;

use ocrbench::{
    Dataset, EngineAdapter, EvaluationRegistry, Harness, HarnessParams, LoadParams, Progress,
    UrlFetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_THRESHOLD,
};
use tracing::{debug, info};

mod engines;
use engines::{CommandEngine, OcrsEngine, OcrsParams};
mod sources;
use sources::Source;

enum OutputFormat {
    /// Fixed-width text table.
    Text,

    /// Report in JSON format.
    Json,
}

struct Args {
    /// Path or URL of the dataset, in JSON Lines format.
    dataset: String,

    /// Maximum number of dataset rows to evaluate.
    num_rows: usize,

    /// Engines to evaluate, in order.
    engines: Vec<String>,

    /// Score which a prediction must exceed to count as a good answer.
    threshold: f64,

    /// Time limit for fetching each image.
    fetch_timeout: Duration,

    /// Enable debug output.
    debug: bool,

    output_format: OutputFormat,

    /// Output file path. Defaults to stdout.
    output_path: Option<String>,

    /// Path to a text detection model for the ocrs engine.
    detection_model: Option<String>,

    /// Path to a text recognition model for the ocrs engine.
    recognition_model: Option<String>,
}

fn parse_args() -> Result<Args, lexopt::Error> {
    use lexopt::prelude::*;

    let mut values = Vec::new();
    let mut debug = false;
    let mut detection_model = None;
    let mut engines = Vec::new();
    let mut fetch_timeout = DEFAULT_FETCH_TIMEOUT;
    let mut num_rows = LoadParams::default().num_rows;
    let mut output_format = OutputFormat::Text;
    let mut output_path = None;
    let mut recognition_model = None;
    let mut threshold = DEFAULT_THRESHOLD;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Value(val) => values.push(val.string()?),
            Long("debug") => {
                debug = true;
            }
            Long("detect-model") => {
                detection_model = Some(parser.value()?.string()?);
            }
            Short('e') | Long("engine") => {
                engines.push(parser.value()?.string()?);
            }
            Short('j') | Long("json") => {
                output_format = OutputFormat::Json;
            }
            Short('n') | Long("rows") => {
                num_rows = parser.value()?.parse()?;
            }
            Short('o') | Long("output") => {
                output_path = Some(parser.value()?.string()?);
            }
            Long("rec-model") => {
                recognition_model = Some(parser.value()?.string()?);
            }
            Short('t') | Long("threshold") => {
                threshold = parser.value()?.parse()?;
            }
            Long("timeout") => {
                let secs: f64 = parser.value()?.parse()?;
                fetch_timeout = Duration::try_from_secs_f64(secs)
                    .map_err(|_| format!("invalid timeout \"{}\"", secs))?;
            }
            Long("help") => {
                println!(
                    "Compare OCR engines on a dataset of captioned images.

Usage: {bin_name} [OPTIONS] <dataset>

The dataset is a JSON Lines file, or an HTTP(S) URL of one, where each row
has a `url` of an image and `metadata.entries[].text` with the text it
contains.

Options:

  --debug

    Enable debug output.

  -e, --engine <engine>

    Engine to evaluate. May be repeated. One of:

      ocrs                      Built-in ocrs engine (default)
      tesseract                 `tesseract` executable from PATH
      cmd:<name>=<command>      External program which prints the text in
                                the image. `{{image}}` in the command is
                                replaced by the image path. Quote
                                arguments which contain spaces.

  -j, --json

    Output the report in JSON format.

  -n, --rows <n>

    Number of dataset rows to evaluate (default {default_rows}).

  -o, --output <path>

    Output file path (defaults to stdout)

  -t, --threshold <score>

    Score above which a prediction is a good answer (default {default_threshold}).

  --timeout <seconds>

    Time limit for fetching each image (default {default_timeout}).

Advanced options:

  --detect-model <path>

    Use a custom text detection model for the ocrs engine.

  --rec-model <path>

    Use a custom text recognition model for the ocrs engine.
",
                    bin_name = parser.bin_name().unwrap_or("ocrbench"),
                    default_rows = LoadParams::default().num_rows,
                    default_threshold = DEFAULT_THRESHOLD,
                    default_timeout = DEFAULT_FETCH_TIMEOUT.as_secs(),
                );
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    if engines.is_empty() {
        engines.push("ocrs".to_string());
    }

    let dataset = values.pop().ok_or("missing `<dataset>` arg")?;
    if !values.is_empty() {
        return Err("expected a single `<dataset>` arg".into());
    }

    Ok(Args {
        dataset,
        debug,
        detection_model,
        engines,
        fetch_timeout,
        num_rows,
        output_format,
        output_path,
        recognition_model,
        threshold,
    })
}

/// Adds context to an error reading or parsing a file.
trait FileErrorContext<T> {
    /// If `self` represents a failed operation to read a file, convert the
    /// error to a message of the form "{context} from {path}: {original_error}".
    fn file_error_context<P: fmt::Display>(self, context: &str, path: P) -> Result<T, String>;
}

impl<T, E: fmt::Display> FileErrorContext<T> for Result<T, E> {
    fn file_error_context<P: fmt::Display>(self, context: &str, path: P) -> Result<T, String> {
        self.map_err(|err| format!("{} from \"{}\": {}", context, path, err))
    }
}

/// Install a subscriber which writes log messages to stderr.
///
/// The `RUST_LOG` environment variable overrides the default level.
fn init_tracing(debug: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Create the engine described by `desc`.
fn create_engine(desc: &str, ocrs_params: &OcrsParams) -> anyhow::Result<EngineAdapter> {
    let adapter = match desc {
        "ocrs" => EngineAdapter::new(OcrsEngine::load(ocrs_params)?),
        "tesseract" => EngineAdapter::new(CommandEngine::tesseract()),
        _ => match desc.strip_prefix("cmd:") {
            Some(command) => EngineAdapter::new(CommandEngine::parse(command)?),
            None => anyhow::bail!("unknown engine \"{}\"", desc),
        },
    };
    Ok(adapter)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    init_tracing(args.debug);

    // Fetch and load the dataset.
    let dataset_src = Source::parse(&args.dataset);
    let dataset_path = dataset_src
        .local_path()
        .file_error_context("Failed to download dataset", dataset_src)?;
    let dataset = Dataset::load(
        &dataset_path,
        &LoadParams {
            num_rows: args.num_rows,
        },
    )
    .file_error_context("Failed to load dataset", dataset_path.display())?;
    for row in dataset.head(5) {
        debug!(
            url = %row.url,
            reference = %row.reference_text(),
            captions = ?row.captions,
            "dataset row"
        );
    }

    let ocrs_params = OcrsParams {
        detection_model: args.detection_model.clone(),
        recognition_model: args.recognition_model.clone(),
    };
    let engines = args
        .engines
        .iter()
        .map(|desc| create_engine(desc, &ocrs_params))
        .collect::<Result<Vec<_>, _>>()?;

    let harness = Harness::new(
        engines,
        HarnessParams {
            threshold: args.threshold,
        },
    );
    info!(
        rows = dataset.len(),
        engines = harness.engines().len(),
        "starting evaluation"
    );

    let mut registry = EvaluationRegistry::new();
    let fetcher = UrlFetcher::with_timeout(args.fetch_timeout);
    let summary = harness.run(dataset.samples(&fetcher), &mut registry, |p: Progress| {
        eprintln!("Progress: {}", p)
    });

    if summary.skipped > 0 {
        eprintln!(
            "Skipped {} of {} rows whose image could not be fetched",
            summary.skipped,
            summary.scored + summary.skipped
        );
    }

    let content = match args.output_format {
        OutputFormat::Text => summary.report.to_string(),
        OutputFormat::Json => {
            serde_json::to_string_pretty(&summary.report.to_json())? + "\n"
        }
    };
    if let Some(output_path) = &args.output_path {
        std::fs::write(output_path, content.into_bytes())
            .file_error_context("Failed to write report", output_path)?;
    } else {
        print!("{}", content);
    }

    Ok(())
}
