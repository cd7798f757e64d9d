use crate::{
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use commands::Commands;
use connectors::{BatchTransport, http::HttpBatchClient};
use engine_config::Settings;
use engine_core::{
    manifest::{build_manifest_with_engine, manifest_stats},
    text::{SegmenterEngine, segment},
};
use engine_runtime::{BatchDriver, RunOptions, RunOutcome};
use model::core::identifiers::BatchId;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "lexbatch",
    version = "0.1.0",
    about = "Manifest-driven batch translation pipeline"
)]
struct Cli {
    #[arg(long, global = true, help = "Settings file (JSON)")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli, &shutdown).await {
        Ok(code) => code,
        Err(err) if shutdown.is_shutdown_requested() => {
            info!(error = %err, "Stopped after shutdown request");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("{}", err.banner());
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn execute(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<ExitCode, CliError> {
    let settings = Settings::load(cli.config.as_deref())?.with_env_overrides(std::env::vars())?;

    match cli.command {
        Commands::Segment {
            input,
            abbreviation_aware,
        } => {
            let engine = if abbreviation_aware {
                SegmenterEngine::AbbreviationAware
            } else {
                settings.segmentation.engine
            };
            let text = read_input(input.as_deref()).await?;
            let sentences = segment(&text, engine)?;
            output::print_report(&sentences)?;
        }
        Commands::Manifest { input, stats } => {
            let text = read_input(input.as_deref()).await?;
            let manifest = build_manifest_with_engine(
                &text,
                settings.batch.chunking.max_sentences_per_chunk,
                settings.segmentation.engine,
            )?;
            if stats {
                output::print_report(&manifest_stats(&manifest))?;
            } else {
                output::print_report(&manifest)?;
            }
        }
        Commands::Run { input, output } => {
            let text = read_input(input.as_deref()).await?;
            return run_pipeline(&settings, &text, output.as_deref(), shutdown).await;
        }
        Commands::Health => {
            let health = transport(&settings).health().await?;
            if !health.ok {
                return Err(CliError::Unhealthy);
            }
            output::print_report(&health)?;
        }
        Commands::Status { batch_id } => {
            let status = transport(&settings)
                .get_batch_status(&BatchId::new(batch_id))
                .await?;
            output::print_report(&status)?;
        }
        Commands::Cancel { batch_id } => {
            let batch_id = BatchId::new(batch_id);
            transport(&settings).cancel_batch(&batch_id).await?;
            info!(batch_id = %batch_id, "Batch cancelled");
        }
    }

    Ok(ExitCode::Success)
}

async fn run_pipeline(
    settings: &Settings,
    text: &str,
    output: Option<&Path>,
    shutdown: &ShutdownCoordinator,
) -> Result<ExitCode, CliError> {
    let manifest = build_manifest_with_engine(
        text,
        settings.batch.chunking.max_sentences_per_chunk,
        settings.segmentation.engine,
    )?;
    info!(
        manifest_batch_id = %manifest.batch_id,
        sentences = manifest.len(),
        "Manifest built"
    );

    let transport: Arc<dyn BatchTransport> = Arc::new(transport(settings));
    let mut driver = BatchDriver::new(transport, RunOptions::from_settings(settings));

    let mut progress = driver.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let state = progress.borrow_and_update().clone();
            let counts = state.sid_state_counts();
            info!(
                state = %state.batch_state,
                received = counts.received,
                invalid = counts.invalid,
                retrying = counts.retrying,
                total = state.total_sids,
                "Progress"
            );
        }
    });

    let cancel = shutdown.cancel_token();
    let outcome = driver.run(&manifest, &cancel).await;
    if matches!(outcome, Ok(RunOutcome::Cancelled)) {
        driver.cancel().await;
    }
    drop(driver);
    // Ends once the driver's sender is gone.
    let _ = reporter.await;

    match outcome? {
        RunOutcome::Completed(report) => {
            match output {
                Some(path) => output::write_report(&report, path).await?,
                None => output::print_report(&report)?,
            }
            Ok(ExitCode::Success)
        }
        RunOutcome::Cancelled => Ok(ExitCode::ShutdownRequested),
    }
}

fn transport(settings: &Settings) -> HttpBatchClient {
    HttpBatchClient::new(settings.network.http_config())
}

async fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}
