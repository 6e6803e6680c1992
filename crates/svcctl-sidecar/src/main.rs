//! svcctl Sidecar - service-control client core wired from configuration

mod config;
mod engines;

use std::sync::Arc;

use svcctl_common::SystemClock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SidecarConfig;
use crate::engines::Engines;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting svcctl sidecar...");

    let config = SidecarConfig::load()?;
    let engines = Engines::build(&config, Arc::new(SystemClock))?;

    tracing::info!(
        service = %engines.check.service_name(),
        flush_interval = ?engines.check.flush_interval(),
        "svcctl sidecar started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    let pending = engines.check.flush();
    if !pending.is_empty() {
        tracing::warn!(count = pending.len(), "Dropping unsent check updates on shutdown");
    }

    Ok(())
}
