/// PostgreSQL-backed record store

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, TaskStore, UserStore};
use crate::db::pool::health_check;
use crate::engine::query::{PageRequest, TaskFilter, TaskQuery};
use crate::models::task::{NewTask, Task, TaskChanges, TaskStatus};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter, UserSummary};

/// Store backed by a shared connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<i64, StoreError> {
        Ok(Task::count(&self.pool, filter).await?)
    }

    async fn find_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        Ok(Task::list(&self.pool, query).await?)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn insert_task(&self, task: NewTask) -> Result<Task, StoreError> {
        Ok(Task::create(&self.pool, task).await?)
    }

    async fn update_task(
        &self,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        Ok(Task::update(&self.pool, id, changes).await?)
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        note: &str,
    ) -> Result<Option<Task>, StoreError> {
        Ok(Task::set_status(&self.pool, id, status, note).await?)
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(health_check(&self.pool).await?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: CreateUser) -> Result<User, StoreError> {
        Ok(User::create(&self.pool, user).await?)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(User::exists(&self.pool, id).await?)
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        Ok(User::summaries(&self.pool, ids).await?)
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, StoreError> {
        Ok(User::list(&self.pool, filter, page).await?)
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<i64, StoreError> {
        Ok(User::count(&self.pool, filter).await?)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UpdateUser,
    ) -> Result<Option<User>, StoreError> {
        Ok(User::update(&self.pool, id, changes).await?)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(User::delete(&self.pool, id).await?)
    }
}
