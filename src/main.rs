mod batch_api;
mod chunker;
mod cleanup;
mod cli;
mod config;
mod error;
mod jsonl;
mod orchestrator;
mod state_machine;
mod ui;

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use batch_api::{BatchApi, BatchClient, SubmitConfig};
use cli::{Cli, Command, JsonlCommand, ProcessArgs};
use config::BatchConfig;
use error::BatchError;
use orchestrator::{BatchOrchestrator, LifecycleObserver, RunSettings};
use state_machine::RunReport;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Process(args) => run_process(args, cli.verbose).await,
        Command::Jsonl(cmd) => run_jsonl(cmd),
    }
}

/// Installs the stderr subscriber plus an optional plain-text file layer.
/// `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "batchpilot=debug" } else { "batchpilot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()?;
    Ok(())
}

async fn run_process(args: ProcessArgs, verbose: bool) -> Result<ExitCode> {
    let mut config = BatchConfig::load()?;
    if let Some(window) = &args.completion_window {
        config.completion_window = window.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(secs) = args.poll_interval {
        config.poll_interval_secs = secs;
    }
    if args.max_polls.is_some() {
        config.max_polls = args.max_polls;
    }

    let api_key = config.require_api_key()?;
    let client = BatchClient::new(api_key, config.client_settings())?;
    let settings = RunSettings {
        output_dir: args.output.clone(),
        submit: SubmitConfig {
            completion_window: config.completion_window.clone(),
            endpoint: config.endpoint.clone(),
            metadata: args.metadata_map(),
        },
        poll_interval: config.poll_interval(),
        max_polls: config.max_polls,
    };

    let orchestrator = BatchOrchestrator::new(client, settings, ui::RunProgress::new());
    let outcome = split_and_run(&orchestrator, &args.input, config.chunk_size).await;
    orchestrator.close();

    match outcome? {
        None => Ok(ExitCode::SUCCESS),
        Some(report) => {
            ui::print_summary(&report);
            if verbose {
                ui::print_report_json(&report);
            }
            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn split_and_run<C: BatchApi, O: LifecycleObserver>(
    orchestrator: &BatchOrchestrator<C, O>,
    input: &Path,
    chunk_size: usize,
) -> Result<Option<RunReport>, BatchError> {
    tracing::info!("Splitting the input JSONL file into chunks...");
    let units = chunker::split_file(input, chunk_size).await?;
    tracing::info!(chunks = units.len(), "Total chunks created");

    if units.is_empty() {
        tracing::warn!("No chunks were created. Please check the input file and chunk size.");
        return Ok(None);
    }
    orchestrator.run(units).await.map(Some)
}

fn run_jsonl(cmd: JsonlCommand) -> Result<ExitCode> {
    match cmd {
        JsonlCommand::CsvToJsonl {
            csv_file,
            jsonl_file,
        } => {
            let rows = jsonl::csv_to_jsonl(&csv_file, &jsonl_file)?;
            println!(
                "Converted '{}' to '{}' ({rows} records).",
                csv_file.display(),
                jsonl_file.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        JsonlCommand::Validate { jsonl_file } => {
            let report = jsonl::validate_jsonl(&jsonl_file)?;
            ui::print_validation(&jsonl_file, &report);
            Ok(if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        JsonlCommand::CreateManual { jsonl_file, record } => {
            let pairs = cli::record_pairs(&record);
            let records = if pairs.is_empty() {
                Vec::new()
            } else {
                vec![jsonl::record_from_pairs(pairs)]
            };
            jsonl::create_jsonl(&jsonl_file, &records)?;
            println!(
                "JSONL file '{}' created with {} records.",
                jsonl_file.display(),
                records.len()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
