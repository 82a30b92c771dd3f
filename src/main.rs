//! Price Bulletin publisher
//!
//! Runs the fetch, aggregate, sign and relay cycle on schedule.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use price_bulletin::{BulletinNode, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::info!("Starting Price Bulletin publisher");

    let node = BulletinNode::new(config).await?;

    // Startup cycle, then scheduled cycles until Ctrl-C
    node.run().await;

    tracing::info!("Price Bulletin publisher stopped");
    Ok(())
}
