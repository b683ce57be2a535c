// src/commands.rs
//
// Command-line surface: argument types and the four subcommand handlers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::Settings;
use crate::error::{Error, ErrorKind, Result};
use crate::introspect::ModuleDescriptor;
use crate::llm::client::LlmClient;
use crate::testgen::candidate::SuggestionReport;
use crate::testgen::review::ReviewReport;
use crate::testgen::{improve, review, suggest, write};

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, short = 'o', help = "Write the result to this file instead of stdout")]
    pub output: Option<PathBuf>,

    #[arg(long, short = 'm', help = "LLM model to use")]
    pub model: Option<String>,

    #[arg(long, help = "Maximum number of LLM requests in flight")]
    pub max_concurrent: Option<usize>,

    #[arg(long, short = 'q', default_value_t = false, help = "Only print warnings and errors")]
    pub quiet: bool,

    #[arg(long, short = 'v', default_value_t = false, help = "Print debug progress")]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SuggestArgs {
    #[arg(help = "Module to analyze, e.g. 'statistics'")]
    pub module: String,

    #[arg(
        long,
        short = 'f',
        value_delimiter = ',',
        help = "Comma-separated functions to analyze (default: every public function)"
    )]
    pub functions: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    #[arg(help = "Suggestion JSON, inline or as a file path")]
    pub properties_input: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    #[arg(help = "Test file to run and review")]
    pub test_file: PathBuf,

    #[arg(long, help = "Seconds before the test run is killed")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ImproveArgs {
    #[arg(help = "Test file to repair")]
    pub test_file: PathBuf,

    #[arg(help = "Review JSON, inline or as a file path")]
    pub reviews_input: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Suggest properties for functions in a module
    Suggest(SuggestArgs),
    /// Generate hypothesis tests from property suggestions
    Write(WriteArgs),
    /// Run a test file and review every test in it
    Review(ReviewArgs),
    /// Rewrite the tests a review marked defective
    Improve(ImproveArgs),
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Suggest(a) => &a.common,
            Command::Write(a) => &a.common,
            Command::Review(a) => &a.common,
            Command::Improve(a) => &a.common,
        }
    }
}

/// Fold CLI overrides into the loaded settings.
fn apply_overrides(settings: &mut Settings, common: &CommonArgs) {
    if let Some(model) = &common.model {
        settings.llm.model = model.clone();
    }
    if let Some(n) = common.max_concurrent {
        settings.max_concurrent_requests = n;
    }
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    let mut settings = Settings::load()?;
    apply_overrides(&mut settings, cmd.common());
    if let Command::Review(args) = &cmd {
        if let Some(secs) = args.timeout {
            settings.runner.timeout_secs = secs;
        }
    }

    let max = settings.max_concurrent_requests;

    match &cmd {
        Command::Suggest(args) => {
            let llm = LlmClient::new(settings.llm.clone())?;
            let descriptor = ModuleDescriptor::new(&settings.python);
            let functions = (!args.functions.is_empty()).then_some(args.functions.as_slice());
            let report =
                suggest::suggest(&descriptor, &args.module, functions, &llm, max).await?;
            emit(args.common.output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
        }

        Command::Write(args) => {
            let report: SuggestionReport = read_json_input(&args.properties_input)
                .context("reading property suggestions")?;
            let llm = LlmClient::new(settings.llm.clone())?;
            let descriptor = ModuleDescriptor::new(&settings.python);
            let code = write::write(&report, &descriptor, &llm, max).await?;
            emit(args.common.output.as_deref(), &code)?;
        }

        Command::Review(args) => {
            let llm = LlmClient::new(settings.llm.clone())?;
            let report = review::review(&args.test_file, &llm, &settings.runner, max).await?;
            emit(args.common.output.as_deref(), &serde_json::to_string_pretty(&report)?)?;
        }

        Command::Improve(args) => {
            let reviews: ReviewReport =
                read_json_input(&args.reviews_input).context("reading review results")?;
            let code = improve_file(&args.test_file, &reviews, &settings).await?;
            emit(args.common.output.as_deref(), &code)?;
        }
    }

    Ok(())
}

/// Repair `test_file`. The LLM client is only created once some test needs
/// a rewrite.
async fn improve_file(test_file: &Path, reviews: &ReviewReport, settings: &Settings) -> Result<String> {
    let source = fs::read_to_string(test_file).map_err(|e| Error::io(test_file, e))?;
    if !improve::needs_repair(&source, reviews)? {
        info!("no tests need repair");
        return Ok(source);
    }

    let llm = LlmClient::new(settings.llm.clone())?;
    improve::improve_source(&source, reviews, &llm, settings.max_concurrent_requests).await
}

/// Parse `input` as JSON, or failing that, read it as a path to a JSON file.
pub fn read_json_input<T: DeserializeOwned>(input: &str) -> Result<T> {
    match serde_json::from_str(input) {
        Ok(v) => Ok(v),
        Err(e) if input.trim_start().starts_with(|c: char| c == '{' || c == '[') => Err(Error::Json(e)),
        Err(_) => {
            let path = Path::new(input);
            let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            Ok(serde_json::from_str(&raw)?)
        }
    }
}

fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| Error::io(path, e))?;
            info!("saved to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// One-line message for a failed command, naming its error class.
pub fn describe_failure(err: &anyhow::Error) -> String {
    let kind = err
        .chain()
        .find_map(|e| e.downcast_ref::<Error>())
        .map(Error::kind);

    match kind {
        Some(ErrorKind::FileNotFound) => format!("Error: file not found: {err:#}"),
        Some(ErrorKind::MalformedInput) => format!("Error: invalid input: {err:#}"),
        _ => format!("Unexpected error: {err:#}"),
    }
}
