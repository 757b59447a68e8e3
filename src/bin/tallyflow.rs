//! Tallyflow CLI
//!
//! Commands:
//! - suggest: Turn raw signal payloads into suggested time entries
//! - validate: Validate raw signal payloads and report bad records
//! - ingest: Run a batch through the orchestrator against an in-memory store

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tallyflow::ingest::{
    convert_payloads, parse_array, parse_ndjson, InMemoryRecordStore, IngestOrchestrator,
    RawSignalPayload, RecordStore,
};
use tallyflow::{suggest_entries, EngineConfig, SuggestedTimeEntry, ENGINE_VERSION};

/// Tallyflow - suggested time entries from raw activity signals
#[derive(Parser)]
#[command(name = "tallyflow")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Turn raw activity signals into suggested billable time entries", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON); defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn raw signal payloads into suggested time entries
    Suggest {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate raw signal payloads and report bad records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a batch through the ingestion orchestrator (in-memory store)
    Ingest {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Account the batch belongs to
        #[arg(long)]
        account: String,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one payload per line)
    Ndjson,
    /// JSON array of payloads
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one entry per line)
    Ndjson,
    /// JSON array
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Suggest {
            input,
            input_format,
            output_format,
        } => cmd_suggest(&input, input_format, output_format, &config),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Ingest {
            input,
            input_format,
            account,
        } => cmd_ingest(&input, input_format, &account, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            EngineConfig::from_json(&json).map_err(|e| CliError::Config(e.to_string()))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn read_payloads(input: &Path, format: &InputFormat) -> Result<Vec<RawSignalPayload>, CliError> {
    let data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let payloads = match format {
        InputFormat::Ndjson => parse_ndjson(&data)?,
        InputFormat::Json => parse_array(&data)?,
    };

    Ok(payloads)
}

fn cmd_suggest(
    input: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: &EngineConfig,
) -> Result<(), CliError> {
    let payloads = read_payloads(input, &input_format)?;
    let (signals, errors) = convert_payloads(&payloads);

    for error in &errors {
        eprintln!("warning: payload {} skipped: {}", error.signal_index, error.reason);
    }

    let entries = suggest_entries(signals, config);
    println!("{}", format_entries(&entries, &output_format)?);
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), CliError> {
    let payloads = read_payloads(input, &input_format)?;
    let (signals, errors) = convert_payloads(&payloads);

    let report = ValidationReport {
        total_payloads: payloads.len(),
        valid_payloads: signals.len(),
        invalid_payloads: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total payloads:   {}", report.total_payloads);
        println!("Valid payloads:   {}", report.valid_payloads);
        println!("Invalid payloads: {}", report.invalid_payloads);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - payload {}: {}", err.signal_index, err.reason);
            }
        }
    }

    if report.invalid_payloads > 0 {
        Err(CliError::ValidationFailed(report.invalid_payloads))
    } else {
        Ok(())
    }
}

fn cmd_ingest(
    input: &Path,
    input_format: InputFormat,
    account: &str,
    config: EngineConfig,
) -> Result<(), CliError> {
    let payloads = read_payloads(input, &input_format)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let store = Arc::new(InMemoryRecordStore::new());
        store.register_account(account);

        let orchestrator =
            IngestOrchestrator::new(Arc::clone(&store) as Arc<dyn RecordStore>, config);
        let handle = orchestrator.submit(account, payloads).await;

        loop {
            if let Some(report) = orchestrator.status(&handle).await {
                if report.status.is_terminal() {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
}

fn format_entries(
    entries: &[SuggestedTimeEntry],
    format: &OutputFormat,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines = Vec::with_capacity(entries.len());
            for entry in entries {
                lines.push(serde_json::to_string(entry)?);
            }
            Ok(lines.join("\n"))
        }
        OutputFormat::Json => Ok(serde_json::to_string(entries)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(entries)?),
    }
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_payloads: usize,
    valid_payloads: usize,
    invalid_payloads: usize,
    errors: Vec<tallyflow::ingest::SignalError>,
}

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Json(serde_json::Error),
    Config(String),
    ValidationFailed(usize),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "{}", e),
            CliError::Json(e) => write!(f, "{}", e),
            CliError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            CliError::ValidationFailed(count) => {
                write!(f, "{} payloads failed validation", count)
            }
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}
