use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod handlers;
mod router;
mod schemas;
mod security;
mod test_utils;

use cli::Cli;

/// Main entry point for the Cupon application.
#[tokio::main]
async fn main() -> Result<()> {
    // Environment from .env must be loaded before clap reads DATABASE_URL/BIND_ADDRESS
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cupon=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("Cupon application starting up");

    cli.run().await
}
