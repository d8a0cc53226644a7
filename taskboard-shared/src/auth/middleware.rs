/// Request authentication
///
/// Resolves the `Authorization: Bearer <token>` header into a [`Principal`].
/// The token only proves identity; the role is re-read from the user store
/// on every request, so a deleted user is rejected even while their token
/// is still unexpired.
///
/// The API crate wraps [`authenticate`] in an Axum middleware and inserts
/// the resulting principal into request extensions:
///
/// ```
/// use axum::Extension;
/// use taskboard_shared::auth::middleware::Principal;
///
/// async fn handler(Extension(principal): Extension<Principal>) -> String {
///     format!("Hello, user {}!", principal.id)
/// }
/// ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::validate_token;
use crate::models::user::Role;
use crate::store::UserStore;

/// Authenticated identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("Not authorized, no token")]
    MissingCredentials,

    /// Bad signature, wrong issuer, expired, or malformed
    #[error("Not authorized, token failed")]
    InvalidToken(String),

    /// Token is valid but its subject no longer exists
    #[error("Not authorized, user not found")]
    UnknownUser,

    #[error("User store error: {0}")]
    Store(String),
}

/// Extracts the bearer token from request headers
///
/// Returns `None` when the header is absent, not UTF-8, not a `Bearer`
/// credential, or empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authenticates a request
///
/// # Errors
///
/// - `AuthError::MissingCredentials` without a bearer token
/// - `AuthError::InvalidToken` when the token fails validation
/// - `AuthError::UnknownUser` when the subject has been deleted
/// - `AuthError::Store` when the lookup itself fails
pub async fn authenticate(
    headers: &HeaderMap,
    secret: &str,
    users: &dyn UserStore,
) -> Result<Principal, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;

    let claims = validate_token(token, secret).map_err(|e| {
        tracing::debug!(error = %e, "Bearer token rejected");
        AuthError::InvalidToken(e.to_string())
    })?;

    let user = users
        .find_user(claims.sub)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?
        .ok_or(AuthError::UnknownUser)?;

    Ok(Principal::new(user.id, user.role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_principal_admin_check() {
        assert!(Principal::new(Uuid::new_v4(), Role::Admin).is_admin());
        assert!(!Principal::new(Uuid::new_v4(), Role::User).is_admin());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(AuthError::MissingCredentials.to_string(), "Not authorized, no token");
        assert_eq!(
            AuthError::InvalidToken("expired".to_string()).to_string(),
            "Not authorized, token failed"
        );
        assert_eq!(AuthError::UnknownUser.to_string(), "Not authorized, user not found");
    }
}
