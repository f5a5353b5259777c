//! # Tether Probe
//!
//! Runs a transport session end to end over the in-memory loopback driver
//! and prints a JSON summary.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! tether-probe
//!
//! # Run with a custom config
//! tether-probe /path/to/probe.toml
//!
//! # More logging
//! RUST_LOG=tether_transport=trace tether-probe
//! ```

mod config;
mod session;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether_transport=debug,tether_probe=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let path = std::env::args().nth(1);
    let config = config::Config::load(path.as_deref())?;

    tether_transport::metrics::describe_metrics();

    tracing::info!(
        "Probing {}:{}{}",
        config.transport.hostname,
        config
            .transport
            .port
            .map_or_else(|| "-".to_string(), |p| p.to_string()),
        config.transport.path
    );

    let summary = session::run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
