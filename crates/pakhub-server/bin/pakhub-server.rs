//! pakhub server binary entry point.
//!
//! Thin wrapper around the pakhub-server library: parses configuration,
//! initializes logging, and runs the server until interrupted.

use anyhow::Result;
use pakhub_server::{Server, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_args();
    tracing::info!(
        "configuration loaded: bind={}, cache_dir={}",
        config.bind,
        config.cache_dir.display()
    );
    config.validate()?;

    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
