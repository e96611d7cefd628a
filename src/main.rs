//! Vitals - In-Process Monitoring Agent
//!
//! Standalone monitoring daemon: exposes process and host memory gauges,
//! pushes them to Graphite and a JSON log channel on a schedule, and serves
//! the registry over HTTP on demand.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitals::{config::ConfigManager, MonitoringManager};

/// CLI arguments for Vitals
#[derive(Parser, Debug)]
#[command(name = "vitals")]
#[command(about = "Vitals - In-Process Monitoring Agent")]
#[command(version)]
#[command(long_about = "
Vitals - In-Process Monitoring Agent

Runs the monitoring stack standalone: a metric registry with host and
process memory gauges, scheduled reporters pushing to Graphite and to a
JSON log channel, and an HTTP endpoint serving metrics and thread dumps.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  GRAPHITE_SERVER          - Graphite endpoint as HOST or HOST:PORT (empty disables)
  VITALS_GRAPHITE_PREFIX   - Prefix for graphite metric paths
  VITALS_GRAPHITE_INTERVAL - Graphite reporting interval (e.g., 1m, 30s)
  VITALS_LOG_ENABLED       - Enable the JSON metrics log (true/false)
  VITALS_LOG_CHANNEL       - Name of the JSON metrics log channel
  VITALS_LOG_INTERVAL      - JSON log reporting interval (e.g., 1m, 30s)
  VITALS_HTTP_ENABLED      - Enable the query endpoint (true/false)
  VITALS_HTTP_BIND_ADDR    - Query endpoint bind address (e.g., 127.0.0.1:8686)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "vitals.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Query endpoint bind address (overrides config file)
    #[arg(short, long, help = "Bind address (e.g., 127.0.0.1:8686)")]
    pub bind: Option<String>,

    /// Graphite server (overrides config file)
    #[arg(short, long, help = "Graphite server as HOST or HOST:PORT")]
    pub graphite: Option<String>,

    /// Reporting interval in seconds for all reporters
    #[arg(long, help = "Reporting interval in seconds")]
    pub interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize tracing
    init_tracing(&args)?;

    info!(
        "Starting Vitals v{} - In-Process Monitoring Agent",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration with priority: CLI args > config file > environment > defaults
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        info!("Config file not found, checking environment variables");
        ConfigManager::load_from_env()?
    };

    // Apply CLI argument overrides (highest priority)
    config.merge_with_cli_args(args.bind.as_deref(), args.graphite.as_deref(), args.interval);

    // Final validation after all overrides
    config
        .validate()
        .context("Final configuration validation failed")?;

    // If validate-config flag is set, just validate and exit
    if args.validate_config {
        info!("✅ Configuration is valid");
        info!("Configuration summary:");
        info!(
            "  Graphite server: {}",
            if config.graphite.server.is_empty() {
                "disabled"
            } else {
                config.graphite.server.as_str()
            }
        );
        info!("  Graphite prefix: {}", config.graphite.prefix);
        info!("  Graphite interval: {:?}", config.graphite.interval);
        info!(
            "  JSON log: {}",
            if config.log.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        info!("  JSON log channel: {}", config.log.channel);
        info!(
            "  Query endpoint: {}",
            if config.http.enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        info!("  Bind address: {}", config.http.bind_addr);
        return Ok(());
    }

    let mut manager = MonitoringManager::new(config)?;

    let started_at = std::time::Instant::now();
    manager
        .registry()
        .gauge("uptime.seconds", move || started_at.elapsed().as_secs())?;

    manager.start()?;

    info!("🚀 Vitals started successfully!");
    info!("🛑 Press Ctrl+C or send SIGTERM/SIGINT to shutdown gracefully");

    wait_for_shutdown().await;

    // Initiate graceful shutdown
    info!("Initiating graceful shutdown...");
    manager.stop().await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for SIGTERM, SIGINT or Ctrl+C.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!("Error setting up signal handlers: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
