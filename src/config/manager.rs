//! Configuration Manager

use super::Config;
use crate::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!(
                "Configuration file not found at {}, using defaults",
                path.display()
            );
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();

        // Override with environment variables if present
        if let Ok(server) = std::env::var("GRAPHITE_SERVER") {
            config.graphite.server = server;
        }

        if let Ok(prefix) = std::env::var("VITALS_GRAPHITE_PREFIX") {
            config.graphite.prefix = prefix;
        }

        if let Ok(interval) = std::env::var("VITALS_GRAPHITE_INTERVAL") {
            config.graphite.interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid VITALS_GRAPHITE_INTERVAL: {}", interval))?;
        }

        if let Ok(enabled) = std::env::var("VITALS_LOG_ENABLED") {
            config.log.enabled = enabled
                .parse::<bool>()
                .with_context(|| format!("Invalid VITALS_LOG_ENABLED: {}", enabled))?;
        }

        if let Ok(channel) = std::env::var("VITALS_LOG_CHANNEL") {
            config.log.channel = channel;
        }

        if let Ok(interval) = std::env::var("VITALS_LOG_INTERVAL") {
            config.log.interval = humantime::parse_duration(&interval)
                .with_context(|| format!("Invalid VITALS_LOG_INTERVAL: {}", interval))?;
        }

        if let Ok(enabled) = std::env::var("VITALS_HTTP_ENABLED") {
            config.http.enabled = enabled
                .parse::<bool>()
                .with_context(|| format!("Invalid VITALS_HTTP_ENABLED: {}", enabled))?;
        }

        if let Ok(bind_addr) = std::env::var("VITALS_HTTP_BIND_ADDR") {
            config.http.bind_addr = bind_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid VITALS_HTTP_BIND_ADDR: {}", bind_addr))?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.graphite.interval.is_zero() {
            bail!("graphite.interval must be greater than 0");
        }

        if self.graphite.connect_timeout.is_zero() {
            bail!("graphite.connect_timeout must be greater than 0");
        }

        if self.graphite.write_timeout.is_zero() {
            bail!("graphite.write_timeout must be greater than 0");
        }

        if self.log.enabled {
            if self.log.interval.is_zero() {
                bail!("log.interval must be greater than 0");
            }

            if self.log.channel.is_empty() {
                bail!("log.channel must not be empty");
            }
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        bind: Option<&str>,
        graphite_server: Option<&str>,
        interval: Option<u64>,
    ) {
        // Override bind address if provided
        if let Some(bind_str) = bind {
            if let Ok(addr) = bind_str.parse::<SocketAddr>() {
                self.http.bind_addr = addr;
                tracing::info!("CLI override: bind address set to {}", addr);
            } else {
                tracing::warn!("Invalid bind address provided: {}", bind_str);
            }
        }

        // Override graphite server if provided
        if let Some(server) = graphite_server {
            self.graphite.server = server.to_string();
            tracing::info!("CLI override: graphite server set to {}", server);
        }

        // Override both reporting intervals if provided
        if let Some(interval_secs) = interval {
            let interval = Duration::from_secs(interval_secs);
            self.graphite.interval = interval;
            self.log.interval = interval;
            tracing::info!("CLI override: report interval set to {}s", interval_secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[graphite]\nserver = \"graphite.internal:2003\"\ninterval = \"30s\"\n"
        )
        .unwrap();

        let config = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(config.graphite.server, "graphite.internal:2003");
        assert_eq!(config.graphite.interval, Duration::from_secs(30));
        // Untouched sections keep their defaults.
        assert_eq!(config.graphite.prefix, "vitals");
        assert!(config.log.enabled);
        assert_eq!(config.log.channel, "metrics");
        assert!(config.http.enabled);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigManager::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.graphite.server, "");
        assert_eq!(config.http.bind_addr, "127.0.0.1:8686".parse().unwrap());
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.toml");
        std::fs::write(&path, "graphite = not valid toml [").unwrap();
        assert!(ConfigManager::load_from_file(&path).is_err());
    }

    #[test]
    fn test_zero_intervals_fail_validation() {
        let mut config = Config::default();
        config.graphite.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log.interval = Duration::ZERO;
        assert!(config.validate().is_err());

        // A disabled log sink is not validated.
        config.log.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        config.merge_with_cli_args(Some("0.0.0.0:9000"), Some("stats.internal"), Some(15));
        assert_eq!(config.http.bind_addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.graphite.server, "stats.internal");
        assert_eq!(config.graphite.interval, Duration::from_secs(15));
        assert_eq!(config.log.interval, Duration::from_secs(15));

        // An unparseable bind address is ignored.
        config.merge_with_cli_args(Some("not-an-addr"), None, None);
        assert_eq!(config.http.bind_addr, "0.0.0.0:9000".parse().unwrap());
    }

    #[test]
    fn test_load_from_env_reads_graphite_server() {
        std::env::set_var("GRAPHITE_SERVER", "stats.example.com:2004");
        std::env::set_var("VITALS_GRAPHITE_INTERVAL", "10s");
        std::env::set_var("VITALS_LOG_ENABLED", "false");

        let config = ConfigManager::load_from_env().unwrap();

        std::env::remove_var("GRAPHITE_SERVER");
        std::env::remove_var("VITALS_GRAPHITE_INTERVAL");
        std::env::remove_var("VITALS_LOG_ENABLED");

        assert_eq!(config.graphite.server, "stats.example.com:2004");
        assert_eq!(config.graphite.interval, Duration::from_secs(10));
        assert!(!config.log.enabled);
    }
}
