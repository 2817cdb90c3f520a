//! Opsdeck CLI - admin console client

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error};

#[derive(Parser)]
#[command(name = "opsdeck")]
#[command(about = "Command line client for the Opsdeck admin console")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Base URL of the console API
    #[arg(long, global = true, env = "OPSDECK_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Session file holding the token pair (defaults to the platform config dir)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    /// Timeout for operations in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into())?;

    let session_file = match cli.session_file {
        Some(path) => path,
        None => default_session_file()?,
    };

    let outcome = if cli.timeout == 0 {
        cli.command.execute(cli.api_url, session_file).await
    } else {
        match tokio::time::timeout(
            Duration::from_secs(cli.timeout),
            cli.command.execute(cli.api_url, session_file),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    if let Err(err) = outcome {
        error!("Command failed: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn default_session_file() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine the platform config directory"))?;
    Ok(base.join("opsdeck").join("session.json"))
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
