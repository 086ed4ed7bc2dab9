mod cli;

use anyhow::Result;
use clap::Parser;
use cli::app::Cli;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    Cli::parse().run().await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("procure_store=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
