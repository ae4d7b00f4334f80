use crate::handlers::users::UserResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use model::entities::city;
use model::validation::violations_from_errors;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn database_error(message: &str) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message, "DATABASE_ERROR")),
    )
}

fn not_found(city_id: i32) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("City {} not found", city_id), "CITY_NOT_FOUND")),
    )
}

/// Request body for creating a city
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCityRequest {
    /// Display name, e.g. "Madrid"
    #[validate(length(min = 1, max = 100, message = "This value should be between 1 and 100 characters long."))]
    pub name: String,
    /// URL-friendly identifier (must be unique)
    #[validate(length(min = 1, max = 100, message = "This value should be between 1 and 100 characters long."))]
    pub slug: String,
}

/// City response model
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CityResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

impl From<city::Model> for CityResponse {
    fn from(model: city::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
        }
    }
}

/// Create a new city
#[utoipa::path(
    post,
    path = "/api/v1/cities",
    tag = "cities",
    request_body = CreateCityRequest,
    responses(
        (status = 201, description = "City created successfully", body = ApiResponse<CityResponse>),
        (status = 409, description = "Slug already exists", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_city(
    State(state): State<AppState>,
    Json(request): Json<CreateCityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CityResponse>>), HandlerError> {
    trace!("Entering create_city function");

    if let Err(errors) = request.validate() {
        let violations = violations_from_errors(&errors);
        info!("City rejected with {} violation(s)", violations.len());
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::validation(violations)),
        ));
    }

    let new_city = city::ActiveModel {
        name: Set(request.name.clone()),
        slug: Set(request.slug.clone()),
        ..Default::default()
    };

    match new_city.insert(&state.db).await {
        Ok(city_model) => {
            info!("City created successfully with ID: {}, slug: {}", city_model.id, city_model.slug);
            let response = ApiResponse {
                data: CityResponse::from(city_model),
                message: "City created successfully".to_string(),
                success: true,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(db_error) => {
            if let Some(SqlErr::UniqueConstraintViolation(_)) = db_error.sql_err() {
                warn!("City slug '{}' already exists", request.slug);
                return Err((
                    StatusCode::CONFLICT,
                    Json(ErrorResponse::new(
                        format!("Slug '{}' already exists", request.slug),
                        "SLUG_ALREADY_EXISTS",
                    )),
                ));
            }

            error!("Failed to create city '{}': {}", request.slug, db_error);
            Err(database_error("Internal server error while creating city"))
        }
    }
}

/// Get all cities
#[utoipa::path(
    get,
    path = "/api/v1/cities",
    tag = "cities",
    responses(
        (status = 200, description = "Cities retrieved successfully", body = ApiResponse<Vec<CityResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_cities(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<CityResponse>>>, HandlerError> {
    trace!("Entering get_cities function");

    match city::Entity::find()
        .order_by_asc(city::Column::Name)
        .all(&state.db)
        .await
    {
        Ok(cities) => {
            info!("Successfully retrieved {} cities", cities.len());
            let response = ApiResponse {
                data: cities.into_iter().map(CityResponse::from).collect(),
                message: "Cities retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Err(db_error) => {
            error!("Failed to retrieve cities from database: {}", db_error);
            Err(database_error("Failed to retrieve cities"))
        }
    }
}

/// Get a specific city by ID
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}",
    tag = "cities",
    params(
        ("city_id" = i32, Path, description = "City ID"),
    ),
    responses(
        (status = 200, description = "City retrieved successfully", body = ApiResponse<CityResponse>),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_city(
    Path(city_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CityResponse>>, HandlerError> {
    trace!("Entering get_city function for city_id: {}", city_id);

    match city::Entity::find_by_id(city_id).one(&state.db).await {
        Ok(Some(city_model)) => {
            debug!("Retrieved city {}", city_model.slug);
            let response = ApiResponse {
                data: CityResponse::from(city_model),
                message: "City retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Ok(None) => {
            warn!("City with ID {} not found", city_id);
            Err(not_found(city_id))
        }
        Err(db_error) => {
            error!("Failed to retrieve city with ID {}: {}", city_id, db_error);
            Err(database_error("Failed to retrieve city"))
        }
    }
}

/// Get the users living in a city
#[utoipa::path(
    get,
    path = "/api/v1/cities/{city_id}/users",
    tag = "cities",
    params(
        ("city_id" = i32, Path, description = "City ID"),
    ),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_city_users(
    Path(city_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, HandlerError> {
    trace!("Entering get_city_users function for city_id: {}", city_id);

    let city_model = match city::Entity::find_by_id(city_id).one(&state.db).await {
        Ok(Some(city_model)) => city_model,
        Ok(None) => {
            warn!("City with ID {} not found", city_id);
            return Err(not_found(city_id));
        }
        Err(db_error) => {
            error!("Failed to retrieve city with ID {}: {}", city_id, db_error);
            return Err(database_error("Failed to retrieve city"));
        }
    };

    match city_model.users(&state.db).await {
        Ok(users) => {
            info!("City {} has {} users", city_model.slug, users.len());
            let response = ApiResponse {
                data: users.into_iter().map(UserResponse::from).collect(),
                message: "Users retrieved successfully".to_string(),
                success: true,
            };
            Ok(Json(response))
        }
        Err(db_error) => {
            error!("Failed to retrieve users of city {}: {}", city_id, db_error);
            Err(database_error("Failed to retrieve users"))
        }
    }
}
