/// Bearer token authentication
///
/// Resolves the request's [`Principal`] and stores it in the request
/// extensions, where handlers pick it up with `Extension<Principal>`.
/// Requests without a valid token for an existing user stop here with 401.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use taskboard_shared::auth::middleware::{authenticate, Principal};

use crate::{app::AppState, error::ApiError};

/// Authentication layer for protected routers
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal: Principal =
        authenticate(req.headers(), state.jwt_secret(), state.users.as_ref()).await?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
