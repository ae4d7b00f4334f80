use crate::handlers::cities::CityResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::security::{SecurityError, hash_password};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use model::entities::{city, user};
use model::principal::Principal;
use model::validation::{ALREADY_USED_MESSAGE, INVALID_VALUE_MESSAGE, Violation, violations_from_errors};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Request body for registering a new user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    /// First name
    #[validate(length(max = 100, message = "This value is too long. It should have 100 characters or less."))]
    pub first_name: String,
    /// Last name(s)
    #[validate(length(max = 255, message = "This value is too long. It should have 255 characters or less."))]
    pub last_name: String,
    /// Email address, also used as login name (must be unique)
    #[validate(length(max = 255, message = "This value is too long. It should have 255 characters or less."))]
    pub email: String,
    /// Plaintext password, hashed before storage
    #[validate(length(min = 6, message = "This value is too short. It should have 6 characters or more."))]
    pub password: String,
    /// Consent to receive marketing email
    #[serde(default)]
    pub allows_email: bool,
    /// Postal address
    pub address: String,
    /// Birth date (YYYY-MM-DD)
    pub birth_date: NaiveDate,
    /// National ID, e.g. "12345678Z"
    pub dni: String,
    /// Payment card number, 11 to 19 digits
    pub card_number: String,
    /// Home city
    pub city_id: Option<i32>,
}

/// Request body for updating a user. Omitted fields are left untouched.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 100, message = "This value is too long. It should have 100 characters or less."))]
    pub first_name: Option<String>,
    #[validate(length(max = 255, message = "This value is too long. It should have 255 characters or less."))]
    pub last_name: Option<String>,
    #[validate(length(max = 255, message = "This value is too long. It should have 255 characters or less."))]
    pub email: Option<String>,
    /// New plaintext password
    #[validate(length(min = 6, message = "This value is too short. It should have 6 characters or more."))]
    pub password: Option<String>,
    pub allows_email: Option<bool>,
    pub address: Option<String>,
    /// Overwrites the registration timestamp
    pub registered_at: Option<DateTime<Utc>>,
    pub birth_date: Option<NaiveDate>,
    pub dni: Option<String>,
    pub card_number: Option<String>,
    /// New home city. `null` removes the city, omitting the field keeps it.
    #[serde(default, deserialize_with = "present_or_null", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub city_id: Option<Option<i32>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing field (`None`).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// User response model. Credentials are never returned.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub allows_email: bool,
    pub address: String,
    pub registered_at: DateTime<Utc>,
    pub birth_date: NaiveDate,
    pub dni: String,
    pub card_number: String,
    pub city_id: Option<i32>,
    /// Login name
    pub username: String,
    /// Granted roles
    pub roles: Vec<String>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        let username = model.username().to_string();
        let roles = model.roles().iter().map(|role| role.to_string()).collect();
        Self {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            allows_email: model.allows_email,
            address: model.address,
            registered_at: model.registered_at,
            birth_date: model.birth_date,
            dni: model.dni,
            card_number: model.card_number,
            city_id: model.city_id,
            username,
            roles,
        }
    }
}

fn database_error(message: &str) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(message, "DATABASE_ERROR")),
    )
}

fn not_found(user_id: i32) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("User {} not found", user_id), "USER_NOT_FOUND")),
    )
}

fn unprocessable(violations: Vec<Violation>) -> HandlerError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::validation(violations)),
    )
}

/// Map a failed insert/update to a response.
fn write_error(db_error: DbErr, email: &str) -> HandlerError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = db_error.sql_err() {
        warn!("Unique constraint violated for '{}': {}", email, detail);
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                format!("Email '{}' already exists", email),
                "EMAIL_ALREADY_EXISTS",
            )),
        );
    }

    // Refused by the entity hook after the handler checks passed
    if let DbErr::Custom(ref message) = db_error {
        warn!("User record rejected before save: {}", message);
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(message.clone(), "RECORD_REJECTED")),
        );
    }

    error!("Failed to save user '{}': {}", email, db_error);
    database_error("Internal server error while saving user")
}

fn hash_error(e: SecurityError) -> HandlerError {
    match e {
        SecurityError::PasswordTooShort(min) => unprocessable(vec![Violation::new(
            "password",
            &format!("This value is too short. It should have {} characters or more.", min),
            "length",
        )]),
        SecurityError::Argon2(_) => {
            error!("Failed to hash password: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to hash password", "PASSWORD_HASH_ERROR")),
            )
        }
    }
}

/// Violations that need the database: email taken by another user, unknown city.
async fn lookup_violations(
    db: &DatabaseConnection,
    email: &str,
    city_id: Option<i32>,
    current_user_id: Option<i32>,
) -> Result<Vec<Violation>, DbErr> {
    let mut violations = Vec::new();

    let mut email_query = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = current_user_id {
        email_query = email_query.filter(user::Column::Id.ne(id));
    }
    if email_query.one(db).await?.is_some() {
        debug!("Email '{}' is already registered", email);
        violations.push(Violation::new("email", ALREADY_USED_MESSAGE, "EMAIL_TAKEN"));
    }

    if let Some(city_id) = city_id {
        if city::Entity::find_by_id(city_id).one(db).await?.is_none() {
            debug!("City {} does not exist", city_id);
            violations.push(Violation::new("city_id", INVALID_VALUE_MESSAGE, "CITY_NOT_FOUND"));
        }
    }

    Ok(violations)
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 409, description = "Email already exists", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), HandlerError> {
    trace!("Entering create_user function");
    debug!("Registering user with email: {}", request.email);

    let mut new_user = user::ActiveModel {
        first_name: Set(request.first_name.clone()),
        last_name: Set(request.last_name.clone()),
        email: Set(request.email.clone()),
        password: Set(String::new()),
        salt: Set(String::new()),
        allows_email: Set(request.allows_email),
        address: Set(request.address.clone()),
        birth_date: Set(request.birth_date),
        dni: Set(request.dni.clone()),
        card_number: Set(request.card_number.clone()),
        city_id: Set(request.city_id),
        ..user::ActiveModel::new()
    };

    let mut violations = match request.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => violations_from_errors(&errors),
    };
    violations.extend(new_user.validate(Utc::now().date_naive()));

    if !violations.is_empty() {
        info!("Registration rejected with {} violation(s)", violations.len());
        return Err(unprocessable(violations));
    }

    let lookup = lookup_violations(&state.db, &request.email, request.city_id, None)
        .await
        .map_err(|db_error| {
            error!("Failed to check registration constraints: {}", db_error);
            database_error("Internal server error while creating user")
        })?;
    if !lookup.is_empty() {
        info!("Registration rejected with {} violation(s)", lookup.len());
        return Err(unprocessable(lookup));
    }

    trace!("Hashing password");
    let hashed = hash_password(&request.password).map_err(hash_error)?;
    new_user.password = Set(hashed.hash);
    new_user.salt = Set(hashed.salt);

    trace!("Attempting to insert new user into database");
    let user_model = new_user
        .insert(&state.db)
        .await
        .map_err(|db_error| write_error(db_error, &request.email))?;

    info!("User created successfully with ID: {}, email: {}", user_model.id, user_model.email);
    let response = ApiResponse {
        data: UserResponse::from(user_model),
        message: "User created successfully".to_string(),
        success: true,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, HandlerError> {
    trace!("Entering get_users function");

    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await
        .map_err(|db_error| {
            error!("Failed to retrieve users from database: {}", db_error);
            database_error("Failed to retrieve users")
        })?;

    info!("Successfully retrieved {} users", users.len());
    let response = ApiResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
        message: "Users retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

async fn find_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model, HandlerError> {
    match user::Entity::find_by_id(user_id).one(db).await {
        Ok(Some(user_model)) => Ok(user_model),
        Ok(None) => {
            warn!("User with ID {} not found", user_id);
            Err(not_found(user_id))
        }
        Err(db_error) => {
            error!("Failed to retrieve user with ID {}: {}", user_id, db_error);
            Err(database_error("Failed to retrieve user"))
        }
    }
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, HandlerError> {
    trace!("Entering get_user function for user_id: {}", user_id);

    let user_model = find_user(&state.db, user_id).await?;
    debug!("Retrieved user with ID: {}, email: {}", user_model.id, user_model.email);

    let response = ApiResponse {
        data: UserResponse::from(user_model),
        message: "User retrieved successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already exists", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, HandlerError> {
    trace!("Entering update_user function for user_id: {}", user_id);

    let existing_user = find_user(&state.db, user_id).await?;
    debug!("Found existing user: {}", existing_user.email);

    let mut user_active: user::ActiveModel = existing_user.clone().into();
    let mut updated_fields = Vec::new();

    // Update only provided fields
    if let Some(first_name) = &request.first_name {
        user_active.first_name = Set(first_name.clone());
        updated_fields.push("first_name");
    }
    if let Some(last_name) = &request.last_name {
        user_active.last_name = Set(last_name.clone());
        updated_fields.push("last_name");
    }
    if let Some(email) = &request.email {
        user_active.email = Set(email.clone());
        updated_fields.push("email");
    }
    if let Some(allows_email) = request.allows_email {
        user_active.allows_email = Set(allows_email);
        updated_fields.push("allows_email");
    }
    if let Some(address) = &request.address {
        user_active.address = Set(address.clone());
        updated_fields.push("address");
    }
    if let Some(registered_at) = request.registered_at {
        user_active.registered_at = Set(registered_at);
        updated_fields.push("registered_at");
    }
    if let Some(birth_date) = request.birth_date {
        user_active.birth_date = Set(birth_date);
        updated_fields.push("birth_date");
    }
    if let Some(dni) = &request.dni {
        user_active.dni = Set(dni.clone());
        updated_fields.push("dni");
    }
    if let Some(card_number) = &request.card_number {
        user_active.card_number = Set(card_number.clone());
        updated_fields.push("card_number");
    }
    if let Some(city_id) = request.city_id {
        user_active.city_id = Set(city_id);
        updated_fields.push("city_id");
    }

    let mut violations = match request.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => violations_from_errors(&errors),
    };
    violations.extend(user_active.validate(Utc::now().date_naive()));
    if !violations.is_empty() {
        info!("Update of user {} rejected with {} violation(s)", user_id, violations.len());
        return Err(unprocessable(violations));
    }

    let email = request.email.clone().unwrap_or(existing_user.email);
    let lookup = lookup_violations(&state.db, &email, request.city_id.flatten(), Some(user_id))
        .await
        .map_err(|db_error| {
            error!("Failed to check update constraints for user {}: {}", user_id, db_error);
            database_error("Internal server error while updating user")
        })?;
    if !lookup.is_empty() {
        info!("Update of user {} rejected with {} violation(s)", user_id, lookup.len());
        return Err(unprocessable(lookup));
    }

    if let Some(password) = &request.password {
        let hashed = hash_password(password).map_err(hash_error)?;
        user_active.password = Set(hashed.hash);
        user_active.salt = Set(hashed.salt);
        updated_fields.push("password");
    }

    if updated_fields.is_empty() {
        debug!("No fields to update for user ID: {}", user_id);
    } else {
        debug!("Updating fields: {}", updated_fields.join(", "));
    }

    let updated_user = user_active
        .update(&state.db)
        .await
        .map_err(|db_error| write_error(db_error, &email))?;

    info!("User with ID {} updated successfully", user_id);
    let response = ApiResponse {
        data: UserResponse::from(updated_user),
        message: "User updated successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, HandlerError> {
    trace!("Entering delete_user function for user_id: {}", user_id);

    let delete_result = user::Entity::delete_by_id(user_id)
        .exec(&state.db)
        .await
        .map_err(|db_error| {
            error!("Failed to delete user with ID {}: {}", user_id, db_error);
            database_error("Failed to delete user")
        })?;

    if delete_result.rows_affected == 0 {
        warn!("User with ID {} not found for deletion (no rows affected)", user_id);
        return Err(not_found(user_id));
    }

    info!("User with ID {} deleted successfully", user_id);
    let response = ApiResponse {
        data: format!("User {} deleted", user_id),
        message: "User deleted successfully".to_string(),
        success: true,
    };
    Ok(Json(response))
}

/// Get the home city of a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/city",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "City retrieved successfully", body = ApiResponse<CityResponse>),
        (status = 404, description = "User not found or user has no city", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user_city(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CityResponse>>, HandlerError> {
    trace!("Entering get_user_city function for user_id: {}", user_id);

    let user_model = find_user(&state.db, user_id).await?;
    let city_model = user_model.city(&state.db).await.map_err(|db_error| {
        error!("Failed to load city of user {}: {}", user_id, db_error);
        database_error("Failed to retrieve city")
    })?;

    match city_model {
        Some(city_model) => {
            debug!("User {} lives in city {}", user_id, city_model.id);
            Ok(Json(ApiResponse {
                data: city_model.into(),
                message: "City retrieved successfully".to_string(),
                success: true,
            }))
        }
        None => {
            warn!("User {} has no city", user_id);
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    format!("User {} has no city", user_id),
                    "CITY_NOT_FOUND",
                )),
            ))
        }
    }
}
