/// Task service
///
/// Orchestrates every task operation. Each operation follows the same
/// shape: consult the [`AccessPolicy`], validate, then touch the stores.
/// Validation and authorization failures therefore never leave a partial
/// mutation behind.
///
/// Documents arrive already stored in blob storage (the HTTP layer uploads
/// them before calling in). The service takes ownership of those blobs:
/// each one either ends up referenced by the saved task or is discarded.
///
/// # Ordering
///
/// | Operation | Order of checks |
/// |---|---|
/// | list, create, update, delete | policy, then lookups and validation |
/// | get, download | lookup (404), then policy |
/// | change status | input validation, lookup (404), policy |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::authorization::{AccessPolicy, Operation};
use crate::auth::middleware::Principal;
use crate::models::task::{Document, NewTask, Task, TaskChanges, TaskPriority, TaskStatus};
use crate::models::user::UserSummary;
use crate::storage::BlobStorage;
use crate::store::{TaskStore, UserStore};

use super::attachments::{AttachmentManager, BlobDeletion, MAX_DOCUMENTS};
use super::error::{FieldError, TaskError};
use super::notify::{LogNotifier, TaskNotifier};
use super::query::{parse_timestamp, Pagination, RawTaskFilters, TaskQueryBuilder};
use super::status::{self, StatusChange};

const ASSIGNEE_NOT_FOUND: &str = "Assigned user not found";

/// Task fields as submitted by a client
///
/// Every field is optional at this level; `create` enforces the required
/// ones, `update` only validates what is present.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    #[validate(length(max = 100, message = "Title cannot exceed 100 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub assigned_to: Option<String>,
}

/// Fields after validation
#[derive(Debug, Default)]
struct ParsedFields {
    title: Option<String>,
    description: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    due_date: Option<DateTime<Utc>>,
    assigned_to: Option<Uuid>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

impl TaskFields {
    fn normalized(self) -> Self {
        Self {
            title: trimmed(self.title),
            description: trimmed(self.description),
            status: trimmed(self.status),
            priority: trimmed(self.priority),
            due_date: trimmed(self.due_date),
            assigned_to: trimmed(self.assigned_to),
        }
    }

    /// Validates the fields; with `required`, missing fields are errors too
    fn parse(self, required: bool) -> Result<ParsedFields, TaskError> {
        let fields = self.normalized();
        let mut errors = match fields.validate() {
            Ok(()) => Vec::new(),
            Err(e) => FieldError::from_validation(&e),
        };

        let mut require = |field: &str, value: &Option<String>, message: &str| {
            let blank = value.as_deref().map_or(required, str::is_empty);
            if blank {
                errors.push(FieldError::new(field, message));
            }
        };
        require("title", &fields.title, "Title is required");
        require("description", &fields.description, "Description is required");

        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        let mut parsed = ParsedFields {
            title: present(fields.title),
            description: present(fields.description),
            ..Default::default()
        };

        if let Some(value) = present(fields.status) {
            match value.parse() {
                Ok(status) => parsed.status = Some(status),
                Err(message) => errors.push(FieldError::new("status", message)),
            }
        }

        if let Some(value) = present(fields.priority) {
            match value.parse() {
                Ok(priority) => parsed.priority = Some(priority),
                Err(message) => errors.push(FieldError::new("priority", message)),
            }
        }

        match present(fields.due_date) {
            Some(value) => match parse_timestamp(&value) {
                Some(due) => parsed.due_date = Some(due),
                None => errors.push(FieldError::new("dueDate", "Due date must be a valid date")),
            },
            None if required => errors.push(FieldError::new("dueDate", "Due date is required")),
            None => {}
        }

        let mut assignee_unparsable = false;
        match present(fields.assigned_to) {
            Some(value) => match Uuid::parse_str(&value) {
                Ok(id) => parsed.assigned_to = Some(id),
                Err(_) => assignee_unparsable = true,
            },
            None if required => errors.push(FieldError::new(
                "assignedTo",
                "Task must be assigned to a user",
            )),
            None => {}
        }

        if !errors.is_empty() {
            return Err(TaskError::Validation(errors));
        }
        if assignee_unparsable {
            return Err(TaskError::invalid(ASSIGNEE_NOT_FOUND));
        }

        Ok(parsed)
    }
}

/// Task as returned to clients, with users projected to summaries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,

    /// `None` if the user record has since disappeared
    pub assigned_to: Option<UserSummary>,
    pub created_by: Option<UserSummary>,

    pub note: Option<String>,
    pub documents: Vec<Document>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    fn new(task: Task, users: &HashMap<Uuid, UserSummary>) -> Self {
        Self {
            id: task.id,
            assigned_to: users.get(&task.assigned_to).cloned(),
            created_by: users.get(&task.created_by).cloned(),
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            note: task.note,
            documents: task.documents,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// One page of a task listing
#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    /// Tasks on this page
    pub count: usize,

    /// Tasks matching the filter across all pages
    pub total: i64,

    pub pagination: Pagination,
    pub data: Vec<TaskView>,
}

/// Outcome of a task deletion
#[derive(Debug, Clone)]
pub struct TaskRemoval {
    pub task_id: Uuid,
    pub deletions: Vec<BlobDeletion>,
}

/// Task resource engine
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
    attachments: AttachmentManager,
    notifier: Arc<dyn TaskNotifier>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        storage: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            tasks,
            users,
            attachments: AttachmentManager::new(storage),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Replaces the status change notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn TaskNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    /// Checks the task store is reachable
    pub async fn ping(&self) -> Result<(), TaskError> {
        Ok(self.tasks.ping().await?)
    }

    /// Lists tasks (admin only)
    pub async fn list(
        &self,
        principal: &Principal,
        raw: &RawTaskFilters,
    ) -> Result<TaskPage, TaskError> {
        AccessPolicy::authorize(principal, Operation::List, None)?;

        let query = TaskQueryBuilder::build(raw);
        let total = self.tasks.count_tasks(&query.filter).await?;
        let tasks = self.tasks.find_tasks(&query).await?;
        let data = self.project(tasks).await?;

        tracing::debug!(
            user_id = %principal.id,
            total,
            page = query.page.page,
            "Listed tasks"
        );

        Ok(TaskPage {
            count: data.len(),
            total,
            pagination: query.page.pagination(total),
            data,
        })
    }

    /// Fetches one task (admin, creator or assignee)
    pub async fn get(&self, principal: &Principal, task_id: Uuid) -> Result<TaskView, TaskError> {
        let task = self.load(task_id).await?;
        AccessPolicy::authorize(principal, Operation::Read, Some(&status::ownership(&task)))?;
        self.view(task).await
    }

    /// Creates a task (admin only)
    ///
    /// `uploads` are documents already stored in blob storage; they are
    /// discarded if the task is not created.
    pub async fn create(
        &self,
        principal: &Principal,
        fields: TaskFields,
        uploads: Vec<Document>,
    ) -> Result<TaskView, TaskError> {
        match self.try_create(principal, fields, &uploads).await {
            Ok(view) => Ok(view),
            Err(e) => {
                self.attachments.discard(&uploads).await;
                Err(e)
            }
        }
    }

    async fn try_create(
        &self,
        principal: &Principal,
        fields: TaskFields,
        uploads: &[Document],
    ) -> Result<TaskView, TaskError> {
        AccessPolicy::authorize(principal, Operation::Create, None)?;

        let fields = fields.parse(true)?;
        if uploads.len() > MAX_DOCUMENTS {
            return Err(TaskError::field(
                "documents",
                "A task cannot have more than 3 attached documents",
            ));
        }

        let assignee = fields
            .assigned_to
            .ok_or_else(|| TaskError::invalid(ASSIGNEE_NOT_FOUND))?;
        self.ensure_user(assignee).await?;

        let (Some(title), Some(description), Some(due_date)) =
            (fields.title, fields.description, fields.due_date)
        else {
            return Err(TaskError::invalid("Title, description and due date are required"));
        };

        let task = self
            .tasks
            .insert_task(NewTask {
                title,
                description,
                status: fields.status.unwrap_or_default(),
                priority: fields.priority.unwrap_or_default(),
                due_date,
                assigned_to: assignee,
                created_by: principal.id,
                documents: uploads.to_vec(),
            })
            .await?;

        tracing::info!(
            task_id = %task.id,
            user_id = %principal.id,
            assigned_to = %task.assigned_to,
            documents = task.documents.len(),
            "Task created"
        );

        self.view(task).await
    }

    /// Updates a task (admin only)
    ///
    /// Only fields present in `fields` change. Documents listed in
    /// `remove_ids` are dropped, `uploads` are appended, and the list is
    /// trimmed to three from the tail.
    pub async fn update(
        &self,
        principal: &Principal,
        task_id: Uuid,
        fields: TaskFields,
        remove_ids: &[Uuid],
        uploads: Vec<Document>,
    ) -> Result<TaskView, TaskError> {
        let (task, mut changes) = match self.prepare_update(principal, task_id, fields).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.attachments.discard(&uploads).await;
                return Err(e);
            }
        };

        let fresh: HashSet<Uuid> = uploads.iter().map(|doc| doc.id).collect();

        if !remove_ids.is_empty() || !uploads.is_empty() {
            let reconciliation = self
                .attachments
                .reconcile(task.documents.clone(), remove_ids, uploads)
                .await;

            let failed = reconciliation.failed_deletions().count();
            if failed > 0 {
                tracing::warn!(task_id = %task.id, failed, "Some document blobs were not deleted");
            }
            changes.documents = Some(reconciliation.documents);
        }

        let unsaved: Vec<Document> = changes
            .documents
            .iter()
            .flatten()
            .filter(|doc| fresh.contains(&doc.id))
            .cloned()
            .collect();

        match self.tasks.update_task(task.id, changes).await {
            Ok(Some(updated)) => {
                tracing::info!(task_id = %updated.id, user_id = %principal.id, "Task updated");
                self.view(updated).await
            }
            Ok(None) => {
                self.attachments.discard(&unsaved).await;
                Err(TaskError::NotFound)
            }
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Failed to persist task update");
                self.attachments.discard(&unsaved).await;
                Err(TaskError::Persistence(e.to_string()))
            }
        }
    }

    async fn prepare_update(
        &self,
        principal: &Principal,
        task_id: Uuid,
        fields: TaskFields,
    ) -> Result<(Task, TaskChanges), TaskError> {
        AccessPolicy::authorize(principal, Operation::Update, None)?;

        let task = self.load(task_id).await?;
        let fields = fields.parse(false)?;

        if let Some(assignee) = fields.assigned_to {
            self.ensure_user(assignee).await?;
        }

        let changes = TaskChanges {
            title: fields.title,
            description: fields.description,
            status: fields.status,
            priority: fields.priority,
            due_date: fields.due_date,
            assigned_to: fields.assigned_to,
            documents: None,
        };

        Ok((task, changes))
    }

    /// Deletes a task and its document blobs (admin only)
    ///
    /// Blob deletion failures are reported in the result but never stop the
    /// record from being removed.
    pub async fn delete(
        &self,
        principal: &Principal,
        task_id: Uuid,
    ) -> Result<TaskRemoval, TaskError> {
        AccessPolicy::authorize(principal, Operation::Delete, None)?;

        let task = self.load(task_id).await?;
        let deletions = self.attachments.purge(&task.documents).await;

        if !self.tasks.delete_task(task.id).await? {
            return Err(TaskError::NotFound);
        }

        tracing::info!(
            task_id = %task.id,
            user_id = %principal.id,
            blobs = deletions.len(),
            "Task deleted"
        );

        Ok(TaskRemoval {
            task_id: task.id,
            deletions,
        })
    }

    /// Resolves a document for download (admin, creator or assignee)
    pub async fn download_document(
        &self,
        principal: &Principal,
        task_id: Uuid,
        document_id: &str,
    ) -> Result<Document, TaskError> {
        let task = self.load(task_id).await?;
        AccessPolicy::authorize(
            principal,
            Operation::DownloadDocument,
            Some(&status::ownership(&task)),
        )?;

        let document_id = Uuid::parse_str(document_id.trim())
            .map_err(|_| TaskError::DocumentNotFound)?;

        task.document(document_id)
            .cloned()
            .ok_or(TaskError::DocumentNotFound)
    }

    /// Changes status and overwrites the note (admin, creator or assignee)
    pub async fn change_status(
        &self,
        principal: &Principal,
        task_id: Uuid,
        status: Option<&str>,
        note: Option<&str>,
    ) -> Result<TaskView, TaskError> {
        let change = StatusChange::parse(status, note)?;
        let mut task = self.load(task_id).await?;
        status::transition(&mut task, principal, &change)?;

        let updated = self
            .tasks
            .set_task_status(task.id, task.status, &change.note)
            .await?
            .ok_or(TaskError::NotFound)?;

        tracing::info!(
            task_id = %updated.id,
            user_id = %principal.id,
            status = %updated.status,
            "Task status changed"
        );

        if principal.id != updated.created_by {
            self.notifier.status_changed(&updated, principal).await;
        }

        self.view(updated).await
    }

    async fn load(&self, task_id: Uuid) -> Result<Task, TaskError> {
        self.tasks
            .find_task(task_id)
            .await?
            .ok_or(TaskError::NotFound)
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<(), TaskError> {
        if self.users.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(TaskError::invalid(ASSIGNEE_NOT_FOUND))
        }
    }

    async fn view(&self, task: Task) -> Result<TaskView, TaskError> {
        let mut views = self.project(vec![task]).await?;
        views.pop().ok_or(TaskError::NotFound)
    }

    /// Loads user summaries for a batch of tasks in one store call
    async fn project(&self, tasks: Vec<Task>) -> Result<Vec<TaskView>, TaskError> {
        let mut ids: Vec<Uuid> = tasks
            .iter()
            .flat_map(|t| [t.assigned_to, t.created_by])
            .collect();
        ids.sort();
        ids.dedup();

        let users: HashMap<Uuid, UserSummary> = self
            .users
            .user_summaries(&ids)
            .await?
            .into_iter()
            .map(|summary| (summary.id, summary))
            .collect();

        Ok(tasks.into_iter().map(|t| TaskView::new(t, &users)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TaskFields {
        TaskFields {
            title: Some("  Write report  ".to_string()),
            description: Some("Quarterly".to_string()),
            due_date: Some("2026-05-01".to_string()),
            assigned_to: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        }
    }

    fn messages(err: TaskError) -> Vec<String> {
        match err {
            TaskError::Validation(errors) => errors.into_iter().map(|e| e.message).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_create_fields_are_trimmed_and_defaulted() {
        let parsed = fields().parse(true).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Write report"));
        assert!(parsed.status.is_none());
        assert!(parsed.due_date.is_some());
    }

    #[test]
    fn test_create_requires_fields() {
        let err = TaskFields::default().parse(true).unwrap_err();
        let messages = messages(err);

        for expected in [
            "Title is required",
            "Description is required",
            "Due date is required",
            "Task must be assigned to a user",
        ] {
            assert!(messages.iter().any(|m| m == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_title_length_limit() {
        let err = TaskFields {
            title: Some("x".repeat(101)),
            ..fields()
        }
        .parse(true)
        .unwrap_err();
        assert_eq!(messages(err), vec!["Title cannot exceed 100 characters"]);

        assert!(TaskFields {
            title: Some("x".repeat(100)),
            ..fields()
        }
        .parse(true)
        .is_ok());
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        let parsed = TaskFields {
            priority: Some("high".to_string()),
            ..Default::default()
        }
        .parse(false)
        .unwrap();
        assert_eq!(parsed.priority, Some(TaskPriority::High));
        assert!(parsed.title.is_none());

        let err = TaskFields {
            title: Some("   ".to_string()),
            ..Default::default()
        }
        .parse(false)
        .unwrap_err();
        assert_eq!(messages(err), vec!["Title is required"]);
    }

    #[test]
    fn test_bad_enum_values_are_validation_errors() {
        let err = TaskFields {
            status: Some("done".to_string()),
            priority: Some("urgent".to_string()),
            ..fields()
        }
        .parse(true)
        .unwrap_err();
        assert_eq!(messages(err).len(), 2);
    }

    #[test]
    fn test_unparsable_assignee_reads_as_not_found() {
        let err = TaskFields {
            assigned_to: Some("nobody".to_string()),
            ..fields()
        }
        .parse(true)
        .unwrap_err();
        assert_eq!(err, TaskError::Invalid("Assigned user not found".to_string()));
    }
}
