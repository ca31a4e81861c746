//! DeepScan command-line front end.
//!
//! Rescores recorded analyzer results for a video through the full engine
//! pipeline and prints the resulting report as JSON.

mod signals;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deepscan_engine::{EngineConfig, Orchestrator};
use deepscan_models::{AnalysisQuality, AnalysisReport};

use crate::signals::RecordedSignals;

/// Exit status for a completed analysis with `status = failed`.
const EXIT_ANALYSIS_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "deepscan")]
#[command(about = "Multi-signal video authenticity analysis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a video from recorded analyzer results
    Analyze {
        /// Video file to analyze
        video: PathBuf,

        /// JSON file with recorded face, frame and audio analyzer output
        #[arg(short, long)]
        signals: PathBuf,

        /// Sampling quality preset (low, medium, high)
        #[arg(short, long, env = "DEEPSCAN_QUALITY")]
        quality: Option<AnalysisQuality>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,
    },

    /// Print the JSON schema of the analysis report
    Schema,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deepscan_engine=info,deepscan_cli=info,warn"));

    // Logs go to stderr so stdout stays machine-readable.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialize output")
}

async fn analyze(
    video: PathBuf,
    signals: PathBuf,
    quality: Option<AnalysisQuality>,
) -> Result<AnalysisReport> {
    let recorded = RecordedSignals::load(&signals)?;

    let mut config = EngineConfig::from_env();
    if let Some(quality) = quality {
        config = config.with_quality(quality);
    }
    info!("Engine config: {:?}", config);

    let orchestrator = recorded
        .into_analyzers()
        .into_iter()
        .fold(Orchestrator::builder().config(config), |builder, analyzer| {
            builder.analyzer(analyzer)
        })
        .build()
        .context("Failed to build analysis engine")?;

    Ok(orchestrator.analyze_path(video).await)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze {
            video,
            signals,
            quality,
            pretty,
        } => {
            let report = analyze(video, signals, quality).await?;
            println!("{}", to_json(&report, pretty)?);

            Ok(if report.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_ANALYSIS_FAILED)
            })
        }
        Command::Schema => {
            let schema = schemars::schema_for!(AnalysisReport);
            println!("{}", to_json(&schema, true)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
