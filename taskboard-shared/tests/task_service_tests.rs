/// Task service tests against the in-memory backends
///
/// Exercise the full create/update/status/delete flow, including document
/// cleanup, without a database or network.
///
/// Run with: cargo test --test task_service_tests

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use taskboard_shared::auth::middleware::Principal;
use taskboard_shared::auth::password::hash_password;
use taskboard_shared::engine::{
    CleanupReason, RawTaskFilters, TaskError, TaskFields, TaskNotifier, TaskService,
};
use taskboard_shared::models::task::{Document, Task, TaskPriority, TaskStatus};
use taskboard_shared::models::user::{CreateUser, Role};
use taskboard_shared::storage::{
    document_from_blob, generate_public_id, BlobStorage, BlobUpload, MemoryBlobStorage,
};
use taskboard_shared::store::{MemoryStore, UserStore};
use uuid::Uuid;

#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(Uuid, Uuid)>>,
}

#[async_trait]
impl TaskNotifier for RecordingNotifier {
    async fn status_changed(&self, task: &Task, actor: &Principal) {
        self.calls.lock().unwrap().push((task.id, actor.id));
    }
}

struct Fixture {
    service: TaskService,
    store: Arc<MemoryStore>,
    blobs: Arc<MemoryBlobStorage>,
    notifier: Arc<RecordingNotifier>,
    admin: Principal,
    assignee: Principal,
    stranger: Principal,
}

async fn user(store: &MemoryStore, email: &str, role: Role) -> Principal {
    let user = store
        .insert_user(CreateUser {
            name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            password_hash: hash_password("password123").unwrap(),
            role,
        })
        .await
        .unwrap();
    Principal::new(user.id, user.role)
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStorage::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let admin = user(&store, "admin@example.com", Role::Admin).await;
    let assignee = user(&store, "worker@example.com", Role::User).await;
    let stranger = user(&store, "other@example.com", Role::User).await;

    let service = TaskService::new(store.clone(), store.clone(), blobs.clone())
        .with_notifier(notifier.clone());

    Fixture {
        service,
        store,
        blobs,
        notifier,
        admin,
        assignee,
        stranger,
    }
}

impl Fixture {
    fn fields(&self, title: &str) -> TaskFields {
        TaskFields {
            title: Some(title.to_string()),
            description: Some(format!("{title} description")),
            due_date: Some("2026-06-01".to_string()),
            assigned_to: Some(self.assignee.id.to_string()),
            ..Default::default()
        }
    }

    async fn documents(&self, count: usize) -> Vec<Document> {
        let mut documents = Vec::new();
        for i in 0..count {
            let upload = BlobUpload {
                public_id: generate_public_id(),
                original_name: format!("file-{i}.pdf"),
                content_type: "application/pdf".to_string(),
                bytes: Bytes::from_static(b"%PDF-1.4"),
            };
            let stored = self.blobs.upload(upload.clone()).await.unwrap();
            documents.push(document_from_blob(&upload, stored));
        }
        documents
    }
}

#[tokio::test]
async fn test_create_resolves_users_and_defaults() {
    let f = fixture().await;

    let view = f
        .service
        .create(&f.admin, f.fields("Write report"), Vec::new())
        .await
        .unwrap();

    assert_eq!(view.status, TaskStatus::Pending);
    assert_eq!(view.priority, TaskPriority::Medium);
    assert_eq!(view.assigned_to.unwrap().email, "worker@example.com");
    assert_eq!(view.created_by.unwrap().id, f.admin.id);
    assert!(view.note.is_none());
}

#[tokio::test]
async fn test_create_with_four_documents_is_rejected_and_blobs_discarded() {
    let f = fixture().await;
    let docs = f.documents(4).await;

    let err = f
        .service
        .create(&f.admin, f.fields("Too many"), docs)
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Validation(_)));
    assert_eq!(f.store.task_count(), 0);
    assert!(f.blobs.is_empty());
}

#[tokio::test]
async fn test_non_admin_cannot_create_and_uploads_are_discarded() {
    let f = fixture().await;
    let docs = f.documents(1).await;

    let err = f
        .service
        .create(&f.assignee, f.fields("Nope"), docs)
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Forbidden(_)));
    assert!(f.blobs.is_empty());
}

#[tokio::test]
async fn test_create_with_unknown_assignee() {
    let f = fixture().await;
    let mut fields = f.fields("Orphan");
    fields.assigned_to = Some(Uuid::new_v4().to_string());

    let err = f.service.create(&f.admin, fields, Vec::new()).await.unwrap_err();
    assert_eq!(err, TaskError::Invalid("Assigned user not found".to_string()));
}

#[tokio::test]
async fn test_update_overflow_keeps_first_three_and_deletes_evicted() {
    let f = fixture().await;
    let original = f.documents(3).await;
    let task = f
        .service
        .create(&f.admin, f.fields("Docs"), original.clone())
        .await
        .unwrap();

    let extra = f.documents(2).await;
    let view = f
        .service
        .update(&f.admin, task.id, TaskFields::default(), &[], extra.clone())
        .await
        .unwrap();

    let kept: Vec<Uuid> = view.documents.iter().map(|d| d.id).collect();
    let expected: Vec<Uuid> = original.iter().map(|d| d.id).collect();
    assert_eq!(kept, expected);

    let destroyed = f.blobs.destroyed();
    for doc in &extra {
        assert!(destroyed.contains(&doc.storage_id));
    }
    assert_eq!(f.blobs.len(), 3);
}

#[tokio::test]
async fn test_update_removes_then_appends() {
    let f = fixture().await;
    let original = f.documents(3).await;
    let task = f
        .service
        .create(&f.admin, f.fields("Docs"), original.clone())
        .await
        .unwrap();

    let extra = f.documents(1).await;
    let view = f
        .service
        .update(&f.admin, task.id, TaskFields::default(), &[original[0].id], extra.clone())
        .await
        .unwrap();

    let kept: Vec<Uuid> = view.documents.iter().map(|d| d.id).collect();
    assert_eq!(kept, vec![original[1].id, original[2].id, extra[0].id]);
    assert_eq!(f.blobs.destroyed(), vec![original[0].storage_id.clone()]);
}

#[tokio::test]
async fn test_update_survives_blob_deletion_failure() {
    let f = fixture().await;
    let original = f.documents(1).await;
    let task = f
        .service
        .create(&f.admin, f.fields("Docs"), original.clone())
        .await
        .unwrap();
    f.blobs.fail_all_destroys(true);

    let view = f
        .service
        .update(&f.admin, task.id, TaskFields::default(), &[original[0].id], Vec::new())
        .await
        .unwrap();

    assert!(view.documents.is_empty());
}

#[tokio::test]
async fn test_update_persistence_failure_discards_fresh_uploads() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Docs"), Vec::new())
        .await
        .unwrap();
    let extra = f.documents(2).await;
    f.store.fail_task_writes(true);

    let err = f
        .service
        .update(&f.admin, task.id, TaskFields::default(), &[], extra)
        .await
        .unwrap_err();

    assert!(matches!(err, TaskError::Persistence(_)));
    assert!(err.to_string().starts_with("Failed to update task"));
    assert!(f.blobs.is_empty());
}

#[tokio::test]
async fn test_update_is_admin_only() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Locked"), Vec::new())
        .await
        .unwrap();

    let mut fields = TaskFields::default();
    fields.title = Some("Renamed".to_string());
    let err = f
        .service
        .update(&f.assignee, task.id, fields, &[], Vec::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Not authorized to update this task. Only administrators can edit tasks."
    );
    let unchanged = f.service.get(&f.admin, task.id).await.unwrap();
    assert_eq!(unchanged.title, "Locked");
}

#[tokio::test]
async fn test_stranger_cannot_read() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Private"), Vec::new())
        .await
        .unwrap();

    assert!(f.service.get(&f.assignee, task.id).await.is_ok());

    let err = f.service.get(&f.stranger, task.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Not authorized to access this task");
}

#[tokio::test]
async fn test_get_missing_task() {
    let f = fixture().await;
    let err = f.service.get(&f.admin, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err, TaskError::NotFound);
}

#[tokio::test]
async fn test_status_requires_note_and_leaves_task_unchanged() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Status"), Vec::new())
        .await
        .unwrap();

    let err = f
        .service
        .change_status(&f.assignee, task.id, Some("completed"), None)
        .await
        .unwrap_err();
    assert_eq!(err, TaskError::Invalid("Status and note are required".to_string()));

    let unchanged = f.service.get(&f.admin, task.id).await.unwrap();
    assert_eq!(unchanged.status, TaskStatus::Pending);
    assert!(unchanged.note.is_none());
}

#[tokio::test]
async fn test_status_change_overwrites_note_and_notifies_creator() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Status"), Vec::new())
        .await
        .unwrap();

    f.service
        .change_status(&f.assignee, task.id, Some("in-progress"), Some("started"))
        .await
        .unwrap();
    let view = f
        .service
        .change_status(&f.assignee, task.id, Some("completed"), Some("done"))
        .await
        .unwrap();

    assert_eq!(view.status, TaskStatus::Completed);
    assert_eq!(view.note.as_deref(), Some("done"));
    assert_eq!(f.notifier.calls.lock().unwrap().len(), 2);

    f.service
        .change_status(&f.admin, task.id, Some("pending"), Some("reopened"))
        .await
        .unwrap();
    assert_eq!(f.notifier.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_repeated_status_change_is_idempotent() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Repeat"), Vec::new())
        .await
        .unwrap();

    let first = f
        .service
        .change_status(&f.assignee, task.id, Some("completed"), Some("done"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = f
        .service
        .change_status(&f.assignee, task.id, Some("completed"), Some("done"))
        .await
        .unwrap();

    assert_eq!(first, second);

    let third = f
        .service
        .change_status(&f.assignee, task.id, Some("completed"), Some("done, verified"))
        .await
        .unwrap();
    assert!(third.updated_at >= first.updated_at);
    assert_eq!(third.note.as_deref(), Some("done, verified"));
}

#[tokio::test]
async fn test_stranger_cannot_change_status() {
    let f = fixture().await;
    let task = f
        .service
        .create(&f.admin, f.fields("Status"), Vec::new())
        .await
        .unwrap();

    let err = f
        .service
        .change_status(&f.stranger, task.id, Some("completed"), Some("mine now"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not authorized to update this task status");
}

#[tokio::test]
async fn test_delete_removes_record_despite_blob_failures() {
    let f = fixture().await;
    let docs = f.documents(2).await;
    let task = f
        .service
        .create(&f.admin, f.fields("Doomed"), docs.clone())
        .await
        .unwrap();
    f.blobs.fail_destroy_for(docs[0].storage_id.clone());

    let removal = f.service.delete(&f.admin, task.id).await.unwrap();

    assert_eq!(removal.deletions.len(), 2);
    assert!(removal.deletions.iter().all(|d| d.reason == CleanupReason::Purged));
    assert!(!removal.deletions[0].succeeded());
    assert!(removal.deletions[1].succeeded());
    assert_eq!(f.store.task_count(), 0);
}

#[tokio::test]
async fn test_download_document() {
    let f = fixture().await;
    let docs = f.documents(1).await;
    let task = f
        .service
        .create(&f.admin, f.fields("Docs"), docs.clone())
        .await
        .unwrap();

    let doc = f
        .service
        .download_document(&f.assignee, task.id, &docs[0].id.to_string())
        .await
        .unwrap();
    assert_eq!(doc.url, docs[0].url);

    let err = f
        .service
        .download_document(&f.assignee, task.id, "not-a-document")
        .await
        .unwrap_err();
    assert_eq!(err, TaskError::DocumentNotFound);

    let err = f
        .service
        .download_document(&f.stranger, task.id, &docs[0].id.to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Forbidden(_)));
}

#[tokio::test]
async fn test_list_filters_sorts_and_pages() {
    let f = fixture().await;
    let priorities = ["low", "high", "medium"];

    for i in 0..12 {
        let mut fields = f.fields(&format!("Task {i:02}"));
        fields.priority = Some(priorities[i % 3].to_string());
        if i % 4 == 0 {
            fields.status = Some("completed".to_string());
        }
        f.service.create(&f.admin, fields, Vec::new()).await.unwrap();
    }

    let raw = RawTaskFilters {
        status: Some("pending".to_string()),
        sort_by: Some("priority".to_string()),
        sort_dir: Some("desc".to_string()),
        page: Some("2".to_string()),
        limit: Some("5".to_string()),
        ..Default::default()
    };
    let page = f.service.list(&f.admin, &raw).await.unwrap();

    assert_eq!(page.total, 9);
    assert_eq!(page.count, 4);
    assert_eq!(page.pagination.page, 2);
    assert_eq!(page.pagination.pages, 2);
    assert!(page.data.iter().all(|t| t.status == TaskStatus::Pending));

    let first = f
        .service
        .list(&f.admin, &RawTaskFilters { page: Some("1".to_string()), ..raw.clone() })
        .await
        .unwrap();
    let priorities: Vec<TaskPriority> = first
        .data
        .iter()
        .chain(page.data.iter())
        .map(|t| t.priority)
        .collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);
}

#[tokio::test]
async fn test_list_is_admin_only() {
    let f = fixture().await;
    let err = f
        .service
        .list(&f.assignee, &RawTaskFilters::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not authorized as an admin");
}
