#![deny(unsafe_code)]

//! pipey CLI: creates a named pipe and serves its contents over HTTP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pipey_config::AppConfig;
use pipey_core::{Bridge, build_info};

/// HTTP server that reads from a named pipe and exposes it over HTTP.
#[derive(Debug, Parser)]
#[command(name = "pipey", version, about, long_about = None)]
struct Cli {
    /// Path of the named pipe to create and serve.
    #[arg(value_name = "PIPE_NAME")]
    pipe: PathBuf,

    /// Host address to bind to [default: localhost].
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on [default: 8080].
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds to wait for pipe data per request, fractions allowed [default: 1].
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Optional TOML configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(run(cli));

    // A request may still be parked in a pipe read on the blocking pool.
    // The pipe is already gone, so exit without joining it.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli).await?;
    init_tracing(cli.verbose, &config.logging.level);
    info!(version = %build_info::version_string(), "pipey starting");

    let bridge = Bridge::start(&cli.pipe, &config).await.inspect_err(|e| {
        error!(error = %e, "Failed to start");
    })?;

    let reason = bridge.run().await.inspect_err(|e| {
        error!(error = %e, "Server failed");
    })?;

    info!(%reason, "pipey exiting");
    Ok(())
}

fn init_tracing(verbose: u8, configured_level: &str) {
    let filter = match verbose {
        0 => configured_level,
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

/// Defaults, then the config file (if any), then command-line flags.
async fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let base = match &cli.config {
        Some(path) => AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from '{}'", path.display()))?,
        None => AppConfig::default(),
    };

    let config = apply_overrides(base, cli);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(host) = &cli.host {
        config = config.with_host(host.clone());
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_timeout_secs(timeout);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[tokio::test]
    async fn test_defaults() {
        let cli = Cli::try_parse_from(["pipey", "/tmp/data.pipe"]).unwrap();
        assert_eq!(cli.pipe, PathBuf::from("/tmp/data.pipe"));

        let config = resolve_config(&cli).await.unwrap();
        assert_eq!(config.listen_addr(), "localhost:8080");
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_short_flags() {
        let cli =
            Cli::try_parse_from(["pipey", "-H", "0.0.0.0", "-p", "9000", "-t", "2", "p"]).unwrap();
        let config = resolve_config(&cli).await.unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fractional_timeout() {
        let cli = Cli::try_parse_from(["pipey", "--timeout", "0.25", "p"]).unwrap();
        let config = resolve_config(&cli).await.unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_negative_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["pipey", "--timeout=-1", "p"]).unwrap();
        assert!(resolve_config(&cli).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["pipey", "-t", "1e19", "p"]).unwrap();
        let err = resolve_config(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("pipe.timeout_secs"));
    }

    #[test]
    fn test_pipe_argument_is_required() {
        assert!(Cli::try_parse_from(["pipey"]).is_err());
        assert!(Cli::try_parse_from(["pipey", "a", "b"]).is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["pipey", "-vv", "p"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[tokio::test]
    async fn test_flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pipey.toml");
        tokio::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\nport = 7000\n\n[pipe]\ntimeout_secs = 3.0\n",
        )
        .await
        .unwrap();

        let config_arg = path.display().to_string();
        let cli = Cli::try_parse_from(["pipey", "-c", &config_arg, "-p", "7001", "p"]).unwrap();
        let config = resolve_config(&cli).await.unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["pipey", "-c", "/nonexistent/pipey.toml", "p"]).unwrap();
        let err = resolve_config(&cli).await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pipey.toml"));
    }
}
