#[cfg(test)]
pub mod test_utils {
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use axum_test::TestServer;
    use chrono::NaiveDate;
    use migration::{Migrator, MigratorTrait};
    use model::entities::city;
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use serde_json::{json, Value};

    /// Create an in-memory SQLite database with the schema applied
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Create AppState for testing. Seeds the "madrid" city (id 1).
    pub async fn setup_test_app_state() -> AppState {
        let db = setup_test_db().await;

        city::ActiveModel {
            name: Set("Madrid".to_string()),
            slug: Set("madrid".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .expect("Failed to create test city");

        AppState { db }
    }

    /// Send test logs to the captured test writer. `RUST_LOG` overrides the
    /// default of `warn`.
    fn init_test_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into());

        // Another test may already have installed the global subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        init_test_tracing();

        let state = setup_test_app_state().await;
        create_router(state)
    }

    pub async fn setup_test_server() -> TestServer {
        TestServer::new(setup_test_app().await).expect("Failed to start test server")
    }

    /// A registration body that passes every rule on any date after 2010.
    pub fn valid_registration(email: &str) -> Value {
        json!({
            "first_name": "Lucía",
            "last_name": "García Pérez",
            "email": email,
            "password": "secreto123",
            "allows_email": true,
            "address": "Calle Mayor 1, Madrid",
            "birth_date": NaiveDate::from_ymd_opt(1990, 3, 15).unwrap(),
            "dni": "12345678Z",
            "card_number": "4111111111111111",
            "city_id": 1
        })
    }
}
