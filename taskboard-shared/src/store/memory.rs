/// In-process record store
///
/// Mirrors the Postgres store's observable behavior closely enough for the
/// engine and HTTP tests: unique emails, the three-document check, foreign
/// key protection on user deletion, and the same filter and sort semantics.
/// Task writes can be made to fail on demand to exercise persistence error
/// paths.
///
/// Locks are never held across an `.await`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{StoreError, TaskStore, UserStore};
use crate::engine::attachments::MAX_DOCUMENTS;
use crate::engine::query::{PageRequest, TaskFilter, TaskQuery};
use crate::engine::status::StatusChange;
use crate::models::task::{NewTask, Task, TaskChanges, TaskStatus};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter, UserSummary};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
}

/// Thread-safe in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_task_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent task write fail with a database error
    pub fn fail_task_writes(&self, fail: bool) {
        self.fail_task_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored tasks
    pub fn task_count(&self) -> usize {
        self.read().tasks.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_task_write(&self) -> Result<(), StoreError> {
        if self.fail_task_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(
                "connection reset by peer".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_documents(count: usize) -> Result<(), StoreError> {
    if count > MAX_DOCUMENTS {
        return Err(StoreError::Constraint("tasks_documents_max".to_string()));
    }
    Ok(())
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn count_tasks(&self, filter: &TaskFilter) -> Result<i64, StoreError> {
        let count = self.read().tasks.values().filter(|t| filter.matches(t)).count();
        Ok(count as i64)
    }

    async fn find_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .read()
            .tasks
            .values()
            .filter(|t| query.filter.matches(t))
            .cloned()
            .collect();

        tasks.sort_by(|a, b| query.sort.compare(a, b));

        Ok(tasks
            .into_iter()
            .skip(query.page.skip().max(0) as usize)
            .take(query.page.limit.max(0) as usize)
            .collect())
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.read().tasks.get(&id).cloned())
    }

    async fn insert_task(&self, task: NewTask) -> Result<Task, StoreError> {
        self.check_task_write()?;
        check_documents(task.documents.len())?;

        let mut tables = self.write();
        if !tables.users.contains_key(&task.assigned_to)
            || !tables.users.contains_key(&task.created_by)
        {
            return Err(StoreError::InUse);
        }

        let now = Utc::now();
        let record = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            assigned_to: task.assigned_to,
            created_by: task.created_by,
            note: None,
            documents: task.documents,
            created_at: now,
            updated_at: now,
        };

        tables.tasks.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_task(
        &self,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Task>, StoreError> {
        self.check_task_write()?;
        if let Some(documents) = &changes.documents {
            check_documents(documents.len())?;
        }

        let mut tables = self.write();
        if let Some(assignee) = changes.assigned_to {
            if !tables.users.contains_key(&assignee) {
                return Err(StoreError::InUse);
            }
        }

        Ok(tables.tasks.get_mut(&id).map(|task| {
            changes.apply_to(task);
            task.clone()
        }))
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        note: &str,
    ) -> Result<Option<Task>, StoreError> {
        self.check_task_write()?;

        let change = StatusChange::new(status, note);
        Ok(self.write().tasks.get_mut(&id).map(|task| {
            let unchanged =
                task.status == change.status && task.note.as_deref() == Some(change.note.as_str());
            if !unchanged {
                change.apply_to(task);
                task.updated_at = Utc::now();
            }
            task.clone()
        }))
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_task_write()?;
        Ok(self.write().tasks.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: CreateUser) -> Result<User, StoreError> {
        let mut tables = self.write();
        let email = user.email.to_lowercase();

        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::Duplicate("email".to_string()));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };

        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_lowercase();
        Ok(self.read().users.values().find(|u| u.email == email).cloned())
    }

    async fn user_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.read().users.contains_key(&id))
    }

    async fn user_summaries(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>, StoreError> {
        let tables = self.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id))
            .map(User::summary)
            .collect())
    }

    async fn list_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .read()
            .users
            .values()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect();

        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(users
            .into_iter()
            .skip(page.skip().max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<i64, StoreError> {
        Ok(self.read().users.values().filter(|u| filter.matches(u)).count() as i64)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UpdateUser,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.write();

        if let Some(email) = &changes.email {
            let email = email.to_lowercase();
            if tables.users.values().any(|u| u.id != id && u.email == email) {
                return Err(StoreError::Duplicate("email".to_string()));
            }
        }

        Ok(tables.users.get_mut(&id).map(|user| {
            if let Some(name) = changes.name {
                user.name = name;
            }
            if let Some(email) = changes.email {
                user.email = email.to_lowercase();
            }
            if let Some(password_hash) = changes.password_hash {
                user.password_hash = password_hash;
            }
            if let Some(role) = changes.role {
                user.role = role;
            }
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.write();

        if tables
            .tasks
            .values()
            .any(|t| t.assigned_to == id || t.created_by == id)
        {
            return Err(StoreError::InUse);
        }

        Ok(tables.users.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::query::{RawTaskFilters, TaskQueryBuilder};
    use crate::models::task::TaskPriority;
    use crate::models::user::Role;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(CreateUser {
                name: "Test".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    fn new_task(owner: Uuid, title: &str, priority: TaskPriority) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: "Something to do".to_string(),
            status: TaskStatus::Pending,
            priority,
            due_date: Utc::now(),
            assigned_to: owner,
            created_by: owner,
            documents: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_case_insensitively() {
        let store = MemoryStore::new();
        user(&store, "Someone@Example.com").await;

        let err = store
            .insert_user(CreateUser {
                name: String::new(),
                email: "someone@example.COM".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Duplicate("email".to_string()));
        assert!(store.find_user_by_email("SOMEONE@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_tasks_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;

        for (title, priority) in [
            ("alpha", TaskPriority::Low),
            ("beta", TaskPriority::High),
            ("gamma", TaskPriority::Medium),
        ] {
            store.insert_task(new_task(owner.id, title, priority)).await.unwrap();
        }

        let query = TaskQueryBuilder::build(&RawTaskFilters {
            sort_by: Some("priority".to_string()),
            sort_dir: Some("desc".to_string()),
            limit: Some("2".to_string()),
            ..Default::default()
        });

        let page = store.find_tasks(&query).await.unwrap();
        let titles: Vec<_> = page.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["beta", "gamma"]);
        assert_eq!(store.count_tasks(&query.filter).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_user_with_tasks_cannot_be_deleted() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        store
            .insert_task(new_task(owner.id, "task", TaskPriority::Low))
            .await
            .unwrap();

        assert_eq!(store.delete_user(owner.id).await, Err(StoreError::InUse));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        store.fail_task_writes(true);

        let result = store
            .insert_task(new_task(owner.id, "task", TaskPriority::Low))
            .await;
        assert!(matches!(result, Err(StoreError::Database(_))));
        assert_eq!(store.task_count(), 0);
    }

    #[tokio::test]
    async fn test_set_status_overwrites_note() {
        let store = MemoryStore::new();
        let owner = user(&store, "owner@example.com").await;
        let task = store
            .insert_task(new_task(owner.id, "task", TaskPriority::Low))
            .await
            .unwrap();

        store.set_task_status(task.id, TaskStatus::InProgress, "started").await.unwrap();
        let updated = store
            .set_task_status(task.id, TaskStatus::Completed, "done")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.note.as_deref(), Some("done"));
    }
}
