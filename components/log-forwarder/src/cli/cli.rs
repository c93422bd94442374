// Local crates
use crate::{
    helpers::load_config::Config,
    instrumentation::tracing::{init_panic_handler, init_tracing},
    runtime,
};

// External crates
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "log-forwarder",
    about = "Read log files recursively and send them to a TCP ingestion endpoint (e.g. Logstash).",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        log-forwarder -f /var/log/myapp
        log-forwarder -f ./logs --host logstash.internal --port 5044
        log-forwarder -f ./logs --config ./log_forwarder.toml"
)]
pub struct Cli {
    /// Path to the root folder containing log files.
    #[arg(short = 'f', long = "log-folder")]
    pub log_folder: PathBuf,

    /// Destination host address [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// Destination TCP input port [default: 50000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds to wait before retrying a failed delivery [default: 5]
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,
}

impl Cli {
    /// Resolve the effective configuration.
    ///
    /// Built-in defaults, overridden by the configuration file, overridden by
    /// command line flags.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(host) = &self.host {
            cfg.shipper.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.shipper.port = port;
        }
        if let Some(secs) = self.retry_delay_secs {
            cfg.shipper.retry_delay_ms = secs.saturating_mul(1000);
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

/// Entry function for CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.resolve_config()?;

    // Held until the process exits so the file writer can flush.
    let _guard = init_tracing(&cfg.logging)?;
    init_panic_handler();

    tracing::info!(
        log_folder = %cli.log_folder.display(),
        destination = %cfg.shipper.target(),
        "Starting Log Forwarder {}",
        env!("CARGO_PKG_VERSION")
    );

    runtime::runtime::run_log_forwarder(cli.log_folder, cfg).await?;
    Ok(())
}
