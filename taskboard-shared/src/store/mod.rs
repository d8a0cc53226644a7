/// Record store seams
///
/// The task engine reaches the database only through the [`TaskStore`] and
/// [`UserStore`] traits. Two implementations ship:
///
/// - [`postgres::PgStore`]: the production store, delegating to the
///   `models` query functions
/// - [`memory::MemoryStore`]: an in-process store used by tests and local
///   experiments, with failure injection
///
/// Both evaluate [`TaskQuery`] descriptors the same way: the Postgres store
/// renders them to SQL, the memory store through `matches`/`compare`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::engine::query::{PageRequest, TaskFilter, TaskQuery};
use crate::models::task::{NewTask, Task, TaskChanges, TaskStatus};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter, UserSummary};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Unique constraint violation on the named field
    #[error("{0} already exists.")]
    Duplicate(String),

    /// Record is still referenced (e.g. a user with tasks)
    #[error("Record is still referenced by other records")]
    InUse,

    /// Check constraint violation
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Any other database failure
    #[error("{0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                Some("23505") => {
                    let field = match db.constraint() {
                        Some("users_email_key") => "email",
                        Some(other) => other,
                        None => "value",
                    };
                    return StoreError::Duplicate(field.to_string());
                }
                Some("23503") => return StoreError::InUse,
                Some("23514") => {
                    return StoreError::Constraint(
                        db.constraint().unwrap_or("check").to_string(),
                    )
                }
                _ => {}
            }
        }

        StoreError::Database(err.to_string())
    }
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Counts tasks matching a filter
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<i64, StoreError>;

    /// Returns one sorted page of matching tasks
    async fn find_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    async fn insert_task(&self, task: NewTask) -> Result<Task, StoreError>;

    /// Writes only the fields present in `changes`; `None` if the task is gone
    async fn update_task(&self, id: Uuid, changes: TaskChanges)
        -> Result<Option<Task>, StoreError>;

    /// Sets status and overwrites the note in one write
    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        note: &str,
    ) -> Result<Option<Task>, StoreError>;

    /// Deletes a task; `false` if it did not exist
    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Verifies the store is reachable
    async fn ping(&self) -> Result<(), StoreError>;
}

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: CreateUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Case-insensitive lookup
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn user_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Display projections for a batch of IDs; unknown IDs are skipped
    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError>;

    /// Matching users, newest first
    async fn list_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, StoreError>;

    async fn count_users(&self, filter: &UserFilter) -> Result<i64, StoreError>;

    async fn update_user(&self, id: Uuid, changes: UpdateUser)
        -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::InUse` while tasks reference the user
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}
