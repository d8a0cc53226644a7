/// User administration endpoints
///
/// - `GET /api/users` - List users (admin)
/// - `POST /api/users` - Create a user with any role (admin)
/// - `GET /api/users/:id` - Fetch a user (owner or admin)
/// - `PUT /api/users/:id` - Update a user (owner or admin; role by admin only)
/// - `DELETE /api/users/:id` - Delete a user (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{auth::check_password, ApiResponse, MessageResponse},
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{
        authorization::{AccessPolicy, UserOperation},
        middleware::Principal,
        password,
    },
    engine::{
        query::{PageRequest, Pagination},
        FieldError,
    },
    models::user::{CreateUser, Role, UpdateUser, User, UserFilter},
};
use uuid::Uuid;
use validator::Validate;

/// User as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Listing query string
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl UserListQuery {
    /// Blank or unknown values are ignored
    fn filter(&self) -> UserFilter {
        UserFilter {
            email: self
                .email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            role: self.role.as_deref().and_then(|r| r.trim().parse().ok()),
        }
    }
}

/// One page of users
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub pagination: Pagination,
    pub data: Vec<UserResponse>,
}

/// Admin user creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    pub password: String,

    pub role: Option<String>,
}

/// Partial user update
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    pub password: Option<String>,

    pub role: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// Unparsable IDs cannot name a user
fn user_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| not_found())
}

fn parse_role(raw: &str) -> ApiResult<Role> {
    raw.trim()
        .parse()
        .map_err(|message: String| ApiError::ValidationError(vec![FieldError::new("role", message)]))
}

/// Non-empty trimmed value
fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// List users, newest first
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<UserListResponse>> {
    AccessPolicy::authorize_user(&principal, UserOperation::List, None)?;

    let filter = query.filter();
    let page = PageRequest::from_raw(query.page.as_deref(), query.limit.as_deref());

    let total = state.users.count_users(&filter).await?;
    let users = state.users.list_users(&filter, &page).await?;
    let data: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(UserListResponse {
        success: true,
        count: data.len(),
        total,
        pagination: page.pagination(total),
        data,
    }))
}

/// Create a user (admin)
pub async fn create_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<Response> {
    AccessPolicy::authorize_user(&principal, UserOperation::Create, None)?;

    let Json(mut req) = payload?;
    req.email = req.email.trim().to_string();
    req.validate()?;
    check_password(&req.password)?;
    let role = match present(req.role) {
        Some(raw) => parse_role(&raw)?,
        None => Role::User,
    };

    if state.users.find_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let user = state
        .users
        .insert_user(CreateUser {
            name: present(req.name).unwrap_or_default(),
            email: req.email,
            password_hash: password::hash_password(&req.password)?,
            role,
        })
        .await?;

    tracing::info!(user_id = %user.id, created_by = %principal.id, role = %user.role, "User created");

    Ok(ApiResponse::created(UserResponse::from(user)))
}

/// Fetch a user (owner or admin)
pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let id = user_id(&id)?;
    AccessPolicy::authorize_user(&principal, UserOperation::Read, Some(id))?;

    let user = state.users.find_user(id).await?.ok_or_else(not_found)?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Update a user (owner or admin)
///
/// Blank values leave the field unchanged. Only administrators may send
/// `role`.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let id = user_id(&id)?;
    AccessPolicy::authorize_user(&principal, UserOperation::Update, Some(id))?;

    let Json(mut req) = payload?;
    let role = match present(req.role.take()) {
        Some(raw) => {
            AccessPolicy::authorize_user(&principal, UserOperation::ChangeRole, Some(id))?;
            Some(parse_role(&raw)?)
        }
        None => None,
    };

    req.email = present(req.email.take());
    req.validate()?;

    let password_hash = match present(req.password) {
        Some(password) => {
            check_password(&password)?;
            Some(password::hash_password(&password)?)
        }
        None => None,
    };

    let user = state
        .users
        .update_user(
            id,
            UpdateUser {
                name: present(req.name),
                email: req.email,
                password_hash,
                role,
            },
        )
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(user_id = %user.id, updated_by = %principal.id, "User updated");

    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Delete a user (admin)
///
/// Refused while tasks still reference the user.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    AccessPolicy::authorize_user(&principal, UserOperation::Delete, None)?;
    let id = user_id(&id)?;

    if !state.users.delete_user(id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %id, deleted_by = %principal.id, "User deleted");

    Ok(MessageResponse::new("User removed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_ignores_blank_and_unknown_values() {
        let query = UserListQuery {
            email: Some("  ".to_string()),
            role: Some("owner".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filter(), UserFilter::default());

        let query = UserListQuery {
            email: Some(" Ada ".to_string()),
            role: Some("admin".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.filter(),
            UserFilter {
                email: Some("Ada".to_string()),
                role: Some(Role::Admin),
            }
        );
    }

    #[test]
    fn test_bad_ids_read_as_not_found() {
        assert!(matches!(user_id("42"), Err(ApiError::NotFound(_))));
    }
}
