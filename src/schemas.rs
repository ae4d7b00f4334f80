use model::validation::Violation;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::handlers::cities::{CityResponse, CreateCityRequest};
use crate::handlers::users::{CreateUserRequest, UpdateUserRequest, UserResponse};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// A rule broken by the submitted data
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ViolationResponse {
    /// Property the violation is attached to, e.g. "dni"
    pub path: String,
    /// Human-readable message
    pub message: String,
    /// Machine-readable code, e.g. "DNI_CHECKSUM"
    pub code: String,
}

impl From<Violation> for ViolationResponse {
    fn from(violation: Violation) -> Self {
        Self {
            path: violation.path,
            message: violation.message,
            code: violation.code,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Validation violations, only present for VALIDATION_ERROR
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<ViolationResponse>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            success: false,
            violations: Vec::new(),
        }
    }

    pub fn validation(violations: Vec<Violation>) -> Self {
        Self {
            error: "Validation failed".to_string(),
            code: "VALIDATION_ERROR".to_string(),
            success: false,
            violations: violations.into_iter().map(ViolationResponse::from).collect(),
        }
    }
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// "migrated" once the schema tables exist, "missing" otherwise
    pub schema: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::get_user_city,
        crate::handlers::cities::create_city,
        crate::handlers::cities::get_cities,
        crate::handlers::cities::get_city,
        crate::handlers::cities::get_city_users,
    ),
    components(
        schemas(
            ApiResponse<UserResponse>,
            ApiResponse<CityResponse>,
            ErrorResponse,
            ViolationResponse,
            HealthResponse,
            CreateUserRequest,
            UpdateUserRequest,
            UserResponse,
            CreateCityRequest,
            CityResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User registration and profile endpoints"),
        (name = "cities", description = "City endpoints"),
    ),
    info(
        title = "Cupon API",
        description = "Cupon coupon site API - user accounts and cities",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
