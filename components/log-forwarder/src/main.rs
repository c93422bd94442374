//! Log Forwarder binary.

use anyhow::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Main entrypoint simply delegates control to CLI layer.
    // The CLI parses arguments, loads configuration and drives the delivery run
    log_forwarder::cli::cli::run().await
}
