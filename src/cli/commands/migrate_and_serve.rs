use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::run_migrations;
use super::serve::run_server;
use crate::schemas::AppState;

pub async fn migrate_and_serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");
    debug!("Database URL: {}", database_url);

    // Reuse the migrated connection so in-memory databases keep their schema
    let db = run_migrations(database_url).await?;
    run_server(AppState { db }, bind_address).await
}
