use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize stderr logging for the CLI.
///
/// `RUST_LOG` takes precedence over the `--log-level` flag when set.
pub fn init_logging(log_level: Level) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "opsdeck={log_level},opsdeck_client={log_level},opsdeck_core={log_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
