//! logrelay Server Binary
//!
//! Runs the HTTP relay endpoint and the Telegram bot until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use logrelay::config::{LogFormat, LoggerConfig, CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE};
use logrelay::{App, Config, Context};
use tracing_subscriber::{fmt, EnvFilter};

/// logrelay Server
#[derive(Parser, Debug)]
#[command(name = "logrelay-server")]
#[command(about = "Relays structured log entries to Telegram chats")]
#[command(version)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, env = CONFIG_FILE_ENV, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("logrelay-server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logger);

    tracing::info!("logrelay server v{}", logrelay::VERSION);
    tracing::info!("Config file: {}", args.config.display());
    tracing::info!("Data directory: {}", config.storage.data_dir.display());
    tracing::info!("Listen address: {}", config.listen_address);

    let root = Context::new();

    let signal_ctx = root.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("received interrupt signal");
        signal_ctx.cancel("interrupt signal received");
    }) {
        tracing::error!(error = %e, "could not install signal handler");
        return ExitCode::FAILURE;
    }

    let app = match App::start(&root, config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("running app...");
    match app.run() {
        Ok(()) => {
            tracing::info!("app closed");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            tracing::info!(reason = %e, "app closed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "app exited with error");
            ExitCode::FAILURE
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logger: &LoggerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logger.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match logger.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .init(),
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .init(),
    }
}
