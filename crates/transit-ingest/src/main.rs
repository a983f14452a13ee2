//! Transit Ingest - run a pipeline once from the command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{error, info};
use transit_common::logging::{init_logging, LogConfig, LogLevel};
use transit_common::LoadDate;
use transit_ingest::{IngestConfig, Pipeline, PipelineContext};

#[derive(Parser, Debug)]
#[command(name = "transit-ingest")]
#[command(author, version, about = "Public-transit data pipelines")]
struct Cli {
    #[command(subcommand)]
    pipeline: Command,

    /// Load date (YYYY-MM-DD); defaults to today
    #[arg(short, long, global = true, env = "INGEST_DATE")]
    date: Option<LoadDate>,

    /// Print the full run report as JSON instead of the status line
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Download the GTFS feed and stage its flat files
    HistoricalIngest,
    /// Load staged GTFS flat files into the GTFS tables
    HistoricalTransform,
    /// Stage every route detail document in object storage
    DailyIngest,
    /// Publish every route detail document to the message queue
    DailyRealtime,
    /// Load staged route detail documents into the daily tables
    DailyTransform,
}

impl From<Command> for Pipeline {
    fn from(command: Command) -> Self {
        match command {
            Command::HistoricalIngest => Pipeline::HistoricalIngest,
            Command::HistoricalTransform => Pipeline::HistoricalTransform,
            Command::DailyIngest => Pipeline::DailyIngest,
            Command::DailyRealtime => Pipeline::DailyRealtime,
            Command::DailyTransform => Pipeline::DailyTransform,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("transit-ingest")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let pipeline = Pipeline::from(cli.pipeline);
    let date = cli.date.unwrap_or_else(LoadDate::today);

    let config = IngestConfig::load()?;
    info!(dataset = %config.dataset, "Configuration loaded");

    let context = PipelineContext::from_config(config)?;

    match context.run(pipeline, date).await {
        Ok(report) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
            Ok(if report.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        },
        Err(e) => {
            error!("{} failed: {}", pipeline, e);
            println!("{} failed: {}", pipeline, e);
            Ok(ExitCode::FAILURE)
        },
    }
}
