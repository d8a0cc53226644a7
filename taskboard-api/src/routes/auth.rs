/// Authentication endpoints
///
/// - `POST /api/auth/register` - Register a new user (always role `user`)
/// - `POST /api/auth/login` - Exchange credentials for a token
/// - `GET /api/auth/me` - The authenticated user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{users::UserResponse, ApiResponse},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{
        jwt::{create_token, Claims},
        middleware::Principal,
        password,
    },
    engine::FieldError,
    models::user::{CreateUser, Role, User},
};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Email address
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    /// Password (at least 6 characters)
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User plus a bearer token
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub token: String,
}

/// Issues a token for `user` with the configured lifetime
pub fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    let claims = Claims::with_expiration(user.id, user.role, state.config.token_lifetime());
    Ok(create_token(&claims, state.jwt_secret())?)
}

fn auth_response(state: &AppState, user: &User) -> ApiResult<AuthResponse> {
    Ok(AuthResponse {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        token: issue_token(state, user)?,
    })
}

/// Checks the password rule, reporting it as a field error
pub fn check_password(password: &str) -> ApiResult<()> {
    password::validate_password_length(password)
        .map_err(|message| ApiError::ValidationError(vec![FieldError::new("password", message)]))
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// { "name": "Ada", "email": "ada@example.com", "password": "secret1" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or the user already exists
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(mut req) = payload?;
    req.email = req.email.trim().to_string();
    req.validate()?;
    check_password(&req.password)?;

    if state.users.find_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user = state
        .users
        .insert_user(CreateUser {
            name: req.name.map(|n| n.trim().to_string()).unwrap_or_default(),
            email: req.email,
            password_hash,
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(ApiResponse::created(auth_response(&state, &user)?))
}

/// Login with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email or wrong password (same message)
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<AuthResponse>>> {
    let Json(req) = payload?;
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .users
        .find_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(invalid());
    }

    Ok(ApiResponse::ok(auth_response(&state, &user)?))
}

/// The authenticated user
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let user = state
        .users
        .find_user(principal.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}
