//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use chordsync_assets::{AssetDeduper, S3Store};
use chordsync_pipeline::{Normalizer, Orchestrator, WsSink};
use chordsync_shared::{
    AppConfig, PipelineConfig, config_file_path, init_config, load_config, store_credentials,
};
use chordsync_sources::{SourceClient, create_source};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// chordsync — chords-site records, deduplicated and streamed downstream.
#[derive(Parser)]
#[command(
    name = "chordsync",
    version,
    about = "Ingest song records, dedup their assets, stream them to the sink.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one pipeline pass immediately and exit.
    Run {
        /// Record source to drive (defaults to the configured one).
        #[arg(long, env = "CHORDSYNC_SOURCE")]
        source: Option<String>,

        /// Maximum records this run; 0 means unlimited.
        #[arg(long, env = "CHORDSYNC_MAX_RECORDS")]
        max_records: Option<usize>,

        /// Write the diagnostic snapshot before dispatch.
        #[arg(long, env = "CHORDSYNC_SNAPSHOT")]
        snapshot: bool,
    },

    /// Start the daemon: one run per day at the configured hour.
    Serve {
        /// Hour of day (0–23) for the scheduled run.
        #[arg(long, env = "CHORDSYNC_START_HOUR")]
        start_hour: Option<u8>,

        /// Also run once immediately on startup.
        #[arg(long, env = "CHORDSYNC_RUN_AT_START")]
        run_at_start: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default config file.
    Init,
    /// Print the effective configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chordsync=info",
        1 => "chordsync=debug",
        _ => "chordsync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            source,
            max_records,
            snapshot,
        } => cmd_run(source, max_records, snapshot).await,
        Command::Serve {
            start_hour,
            run_at_start,
        } => cmd_serve(start_hour, run_at_start).await,
        Command::Config { action } => cmd_config(action),
    }
}

/// Build the orchestrator from config: source, store, dedup engine, sink.
fn build_orchestrator(config: &AppConfig, pipeline: PipelineConfig) -> Result<Orchestrator> {
    let client = Arc::new(SourceClient::new(Duration::from_secs(
        pipeline.asset_timeout_secs,
    ))?);

    let source = create_source(&pipeline.source, Arc::clone(&client), pipeline.max_records)?;

    let (access_key, secret_key) = store_credentials(config)?;
    let store = Arc::new(S3Store::new(&config.store, &access_key, &secret_key)?);

    let normalizer = Normalizer::new(AssetDeduper::new(client, store));
    let sink = WsSink::new(
        config.sink.address.clone(),
        Duration::from_secs(config.sink.ack_timeout_secs),
    );

    Ok(Orchestrator::new(
        source,
        normalizer,
        Box::new(sink),
        pipeline,
    ))
}

async fn cmd_run(
    source: Option<String>,
    max_records: Option<usize>,
    snapshot: bool,
) -> Result<()> {
    let config = load_config()?;
    let mut pipeline = PipelineConfig::from(&config);

    if let Some(source) = source {
        pipeline.source = source;
    }
    if let Some(max) = max_records {
        pipeline.max_records = (max > 0).then_some(max);
    }
    if snapshot {
        pipeline.snapshot = true;
    }

    let mut orchestrator = build_orchestrator(&config, pipeline)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message("running pipeline...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    orchestrator.run().await;

    spinner.finish_with_message("run complete");
    Ok(())
}

async fn cmd_serve(start_hour: Option<u8>, run_at_start: bool) -> Result<()> {
    let config = load_config()?;
    let pipeline = PipelineConfig::from(&config);

    let start_hour = start_hour.unwrap_or(config.run.start_hour);
    if start_hour > 23 {
        return Err(eyre!("start hour must be 0–23, got {start_hour}"));
    }
    let run_at_start = run_at_start || config.run.run_at_start;

    let orchestrator = Arc::new(Mutex::new(build_orchestrator(&config, pipeline)?));

    let mut scheduler = JobScheduler::new().await?;
    let cron = format!("0 0 {start_hour} * * *");

    let scheduled = Arc::clone(&orchestrator);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let orchestrator = Arc::clone(&scheduled);
        Box::pin(async move {
            // Overlapping runs are excluded: if the previous run is still
            // dispatching, this tick is skipped.
            match orchestrator.try_lock() {
                Ok(mut orchestrator) => orchestrator.run().await,
                Err(_) => warn!("previous run still in progress, skipping scheduled run"),
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(start_hour, %cron, "daily run scheduled");

    if run_at_start {
        let startup = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            match startup.try_lock() {
                Ok(mut orchestrator) => orchestrator.run().await,
                Err(_) => warn!("run already in progress, skipping startup run"),
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.shutdown().await?;
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = init_config()?;
            println!("wrote {}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config()?;
            println!("# {}", config_file_path()?.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
