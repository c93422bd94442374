// External crates
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// Default destination host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default destination TCP port.
pub const DEFAULT_PORT: u16 = 50000;
/// Default number of records written per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default connect timeout (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default per-batch write timeout (milliseconds).
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;
/// Default pause between two full delivery attempts (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Log Forwarder configuration.
///
/// Every section and every field is optional; a missing configuration file is
/// equivalent to `Config::default()`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Destination and delivery settings.
    pub shipper: ShipperConfig,
    /// File discovery settings.
    pub collector: CollectorConfig,
    /// Line parser settings.
    pub parser: ParserConfig,
    /// Tracing output settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and parse the configuration file
    #[instrument(
        name = "config_loader",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        tracing::trace!(
            configuration_file_path = %path_ref.display(),
            "Loading Log Forwarder configuration file"
        );

        let config_str = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file at {:?}", path_ref))?;
        let config = Self::from_toml(&config_str)
            .with_context(|| format!("Invalid configuration in {:?}", path_ref))?;

        tracing::trace!(
            configuration_file_path = %path_ref.display(),
            "Log Forwarder configuration file loaded successfully"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let shipper = &self.shipper;
        ensure!(!shipper.host.trim().is_empty(), "shipper.host must not be empty");
        ensure!(shipper.port != 0, "shipper.port must be between 1 and 65535");
        ensure!(shipper.batch_size >= 1, "shipper.batch_size must be at least 1");
        ensure!(
            shipper.connect_timeout_ms > 0,
            "shipper.connect_timeout_ms must be greater than 0"
        );
        ensure!(
            shipper.write_timeout_ms > 0,
            "shipper.write_timeout_ms must be greater than 0"
        );
        Ok(())
    }
}

/// `[shipper]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ShipperConfig {
    /// Destination host name or address.
    pub host: String,
    /// Destination TCP port.
    pub port: u16,
    /// Records per written batch.
    pub batch_size: usize,
    /// Bound on establishing the TCP connection.
    pub connect_timeout_ms: u64,
    /// Bound on writing one batch.
    pub write_timeout_ms: u64,
    /// Fixed pause before retrying a failed delivery.
    pub retry_delay_ms: u64,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            batch_size: DEFAULT_BATCH_SIZE,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ShipperConfig {
    /// `host:port` as shown in logs and errors.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Write timeout as a `Duration`.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Retry delay as a `Duration`.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// `[collector]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Follow symbolic links to directories.
    pub follow_links: bool,
    /// Case-insensitive extension allow-list; empty accepts every file.
    pub extensions: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_links: false,
            extensions: Vec::new(),
        }
    }
}

/// `[parser]` section.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Fields attached to every record next to `raw_content`.
    pub static_fields: BTreeMap<String, Value>,
}

/// `[logging]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Console output format.
    pub format: LogFormat,
    /// Directory for a daily rolling log file, if any.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
            directory: None,
        }
    }
}

/// Console log format.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.shipper.host, "localhost");
        assert_eq!(config.shipper.port, 50000);
        assert_eq!(config.shipper.batch_size, 100);
        assert_eq!(config.shipper.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.shipper.retry_delay(), Duration::from_secs(5));
        assert!(config.collector.recursive);
        assert!(!config.collector.follow_links);
        assert!(config.collector.extensions.is_empty());
        assert!(config.parser.static_fields.is_empty());
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn parses_every_section() {
        let config = Config::from_toml(
            r#"
            [shipper]
            host = "logstash.internal"
            port = 5044
            batch_size = 250
            retry_delay_ms = 1500

            [collector]
            recursive = false
            extensions = ["log", "txt"]

            [parser.static_fields]
            datacenter = "eu-west-1"

            [logging]
            level = "debug"
            format = "json"
            directory = "/var/log/log-forwarder"
            "#,
        )
        .unwrap();

        assert_eq!(config.shipper.target(), "logstash.internal:5044");
        assert_eq!(config.shipper.batch_size, 250);
        assert_eq!(config.shipper.retry_delay(), Duration::from_millis(1500));
        assert_eq!(config.shipper.write_timeout_ms, DEFAULT_WRITE_TIMEOUT_MS);
        assert!(!config.collector.recursive);
        assert_eq!(config.collector.extensions, vec!["log", "txt"]);
        assert_eq!(config.parser.static_fields["datacenter"], json!("eu-west-1"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.directory.as_deref(),
            Some("/var/log/log-forwarder")
        );
    }

    #[test]
    fn bundled_sample_matches_defaults() {
        let config = Config::from_toml(include_str!("../../log_forwarder.toml")).unwrap();
        assert_eq!(config.shipper.target(), "localhost:50000");
        assert_eq!(config.shipper.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.shipper.retry_delay_ms, DEFAULT_RETRY_DELAY_MS);
        assert!(config.collector.recursive);
        assert!(config.parser.static_fields.is_empty());
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = Config::from_toml("[shipper]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(Config::from_toml("[shipper]\nmax_attempts = 3\n").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[shipper]\nport = 6000").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.shipper.port, 6000);
        assert_eq!(config.shipper.host, DEFAULT_HOST);
    }
}
