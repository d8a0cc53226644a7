/// Task model and database operations
///
/// A task is assigned to one user, created by an administrator, and carries
/// up to three embedded documents. Documents have no lifecycle of their own:
/// they live in the task's `documents` JSONB column and disappear with it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('pending', 'in-progress', 'completed');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(100) NOT NULL,
///     description TEXT NOT NULL,
///     status task_status NOT NULL DEFAULT 'pending',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     due_date TIMESTAMPTZ NOT NULL,
///     assigned_to UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     note TEXT,
///     documents JSONB NOT NULL DEFAULT '[]'
///         CHECK (jsonb_array_length(documents) <= 3),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Enum values are declared in ascending order so `ORDER BY priority`
/// sorts low < medium < high.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::engine::query::{like_pattern, TaskFilter, TaskQuery};

/// Task lifecycle status
///
/// Any status may follow any other; there is no transition table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "task_status", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// All statuses in declaration order
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| {
                format!("Status must be one of pending, in-progress, completed (got '{}')", value)
            })
    }
}

/// Task priority
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == value)
            .ok_or_else(|| format!("Priority must be one of low, medium, high (got '{}')", value))
    }
}

/// Document attached to a task
///
/// The bytes live in blob storage; this record keeps the durable URL and the
/// opaque storage identifier needed to delete them later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document ID, unique within its task
    pub id: Uuid,

    /// Stored filename (the blob's public id)
    pub filename: String,

    /// Filename as uploaded by the client
    pub original_name: String,

    /// MIME type accepted by the upload stage
    pub mimetype: String,

    /// Durable download URL
    pub url: String,

    /// Opaque blob storage identifier
    pub storage_id: String,

    /// Size in bytes
    pub size: i64,

    /// When the document was uploaded
    pub upload_date: DateTime<Utc>,
}

/// Task record as stored
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,

    /// Assignee (user ID)
    pub assigned_to: Uuid,

    /// Creator (user ID); always an administrator at creation time
    pub created_by: Uuid,

    /// Latest status note; overwritten on every status change
    pub note: Option<String>,

    /// Attached documents, at most three
    #[sqlx(json)]
    pub documents: Vec<Document>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Finds an attached document by ID
    pub fn document(&self, document_id: Uuid) -> Option<&Document> {
        self.documents.iter().find(|doc| doc.id == document_id)
    }
}

/// Input for inserting a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    pub documents: Vec<Document>,
}

/// Partial task update
///
/// Only `Some` fields are written. `documents` replaces the whole list.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<Uuid>,
    pub documents: Option<Vec<Document>>,
}

impl TaskChanges {
    /// Applies the changes to an in-memory task
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(assigned_to) = self.assigned_to {
            task.assigned_to = assigned_to;
        }
        if let Some(documents) = self.documents {
            task.documents = documents;
        }
        task.updated_at = Utc::now();
    }
}

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, assigned_to, \
                            created_by, note, documents, created_at, updated_at";

/// Appends the `WHERE` clause for a task filter
///
/// Every value is bound, never interpolated.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TaskFilter) {
    qb.push(" WHERE TRUE");

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority);
    }
    if let Some(assigned_to) = filter.assigned_to {
        qb.push(" AND assigned_to = ").push_bind(assigned_to);
    }
    if let Some(from) = filter.due_from {
        qb.push(" AND due_date >= ").push_bind(from);
    }
    if let Some(to) = filter.due_to {
        qb.push(" AND due_date <= ").push_bind(to);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR description ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

impl Task {
    /// Inserts a new task
    pub async fn create(pool: &PgPool, data: NewTask) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO tasks (title, description, status, priority, due_date,
                               assigned_to, created_by, documents)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(data.title)
            .bind(data.description)
            .bind(data.status)
            .bind(data.priority)
            .bind(data.due_date)
            .bind(data.assigned_to)
            .bind(data.created_by)
            .bind(Json(data.documents))
            .fetch_one(pool)
            .await
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists one page of tasks matching a query descriptor
    ///
    /// Ties on the sort column are broken by ID so pages are stable.
    pub async fn list(pool: &PgPool, query: &TaskQuery) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        push_filter(&mut qb, &query.filter);

        qb.push(" ORDER BY ")
            .push(query.sort.field.column())
            .push(" ")
            .push(query.sort.direction.keyword())
            .push(", id ASC LIMIT ")
            .push_bind(query.page.limit)
            .push(" OFFSET ")
            .push_bind(query.page.skip());

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Counts tasks matching a filter
    pub async fn count(pool: &PgPool, filter: &TaskFilter) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut qb, filter);

        let (count,): (i64,) = qb.build_query_as().fetch_one(pool).await?;
        Ok(count)
    }

    /// Writes the fields present in `changes` in a single statement
    ///
    /// Returns `None` if the task no longer exists.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        changes: TaskChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = changes.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(status) = changes.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = changes.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(assigned_to) = changes.assigned_to {
            qb.push(", assigned_to = ").push_bind(assigned_to);
        }
        if let Some(documents) = changes.documents {
            qb.push(", documents = ").push_bind(Json(documents));
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {TASK_COLUMNS}"));

        qb.build_query_as::<Task>().fetch_optional(pool).await
    }

    /// Sets status and note together
    ///
    /// `updated_at` only moves when either value actually changes, so
    /// repeating a status change is a no-op.
    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: TaskStatus,
        note: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET status = $2,
                note = $3,
                updated_at = CASE
                    WHEN status IS DISTINCT FROM $2 OR note IS DISTINCT FROM $3 THEN NOW()
                    ELSE updated_at
                END
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(status)
            .bind(note)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a task record
    ///
    /// Blob cleanup is the caller's job; this only removes the row.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every task (seed script only)
    pub async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks").execute(pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(TaskStatus::InProgress.as_str(), "in-progress");
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "in-progress"
        );
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert!("done".parse::<TaskStatus>().is_err());
        assert!("In-Progress".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn test_priority_orders_semantically() {
        assert!(TaskPriority::Low < TaskPriority::Medium);
        assert!(TaskPriority::Medium < TaskPriority::High);
        assert!(TaskStatus::Pending < TaskStatus::Completed);
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }

    #[test]
    fn test_task_changes_apply_only_present_fields() {
        let now = Utc::now();
        let mut task = Task {
            id: Uuid::new_v4(),
            title: "Old".to_string(),
            description: "Keep me".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Low,
            due_date: now,
            assigned_to: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            note: None,
            documents: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        TaskChanges {
            title: Some("New".to_string()),
            priority: Some(TaskPriority::High),
            ..Default::default()
        }
        .apply_to(&mut task);

        assert_eq!(task.title, "New");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.description, "Keep me");
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = Document {
            id: Uuid::new_v4(),
            filename: "documents-1".to_string(),
            original_name: "brief.pdf".to_string(),
            mimetype: "application/pdf".to_string(),
            url: "https://cdn.example.com/brief.pdf".to_string(),
            storage_id: "task-documents/documents-1".to_string(),
            size: 1024,
            upload_date: Utc::now(),
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["originalName"], "brief.pdf");
        assert_eq!(json["storageId"], "task-documents/documents-1");
        assert!(json.get("uploadDate").is_some());
    }
}
