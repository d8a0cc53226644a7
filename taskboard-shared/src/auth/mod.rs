/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: bearer token issue and validation
/// - [`middleware`]: request authentication into a [`middleware::Principal`]
/// - [`authorization`]: the [`authorization::AccessPolicy`] evaluator
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::password::{hash_password, verify_password};
/// use taskboard_shared::auth::jwt::{create_token, Claims};
/// use taskboard_shared::models::user::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("password123")?;
/// assert!(verify_password("password123", &hash)?);
///
/// let token = create_token(
///     &Claims::new(Uuid::new_v4(), Role::User),
///     "secret-key-at-least-32-bytes-long!!",
/// )?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
