use anyhow::Result;
use sea_orm::Database;
use tracing::{debug, info};

use crate::schemas::AppState;

/// Default database when neither `--database-url` nor `DATABASE_URL` is given.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://cupon.db?mode=rwc";

/// Default address the API listens on.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Initialize application state from the given database URL
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    // Connect to database
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;
    debug!("Database connection pool ready");

    Ok(AppState { db })
}
