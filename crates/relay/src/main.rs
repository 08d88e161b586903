//! Relay - TCP line relay
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:9000 and publish to localhost:9092
//! relay
//!
//! relay --config configs/relay.toml
//! relay --config configs/relay.toml --log-level debug
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use relay::{Relay, wait_for_shutdown};
use relay_config::{Config, LogConfig, LogFormat, LogOutput};
use relay_publisher::KafkaPublisherFactory;

/// Relay - newline-delimited TCP lines to broker messages
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());

    // A broken config still gets logged with default settings
    let log = config
        .as_ref()
        .map(|c| c.log.clone())
        .unwrap_or_default();
    let level = cli
        .log_level
        .unwrap_or_else(|| log.level.as_str().to_string());

    if let Err(e) = init_logging(&level, &log) {
        eprintln!("relay: {e:#}");
        return ExitCode::FAILURE;
    }

    let result = match config {
        Ok(config) => serve(config, cli.config.as_deref()).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "relay failed");
            ExitCode::FAILURE
        }
    }
}

/// Load the config file, or defaults when no path is given
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            let config = Config::default();
            config.validate().context("default configuration is invalid")?;
            Ok(config)
        }
    }
}

/// Run the relay until SIGINT/SIGTERM or a fatal acceptor error
async fn serve(config: Config, path: Option<&Path>) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "(default)".into()),
        brokers = %config.broker.bootstrap_servers(),
        "relay starting"
    );

    let factory = KafkaPublisherFactory::new(config.broker.clone());
    let relay = Relay::start(&config, &factory).await?;

    relay.run_until(wait_for_shutdown()).await?;

    info!("relay shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (log.format, log.output) {
        (LogFormat::Console, LogOutput::Stdout) => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .boxed(),
        (LogFormat::Console, LogOutput::Stderr) => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .boxed(),
        (LogFormat::Json, LogOutput::Stdout) => fmt::layer().json().with_target(true).boxed(),
        (LogFormat::Json, LogOutput::Stderr) => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(())
}
