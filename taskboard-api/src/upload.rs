/// Multipart upload stage for task requests
///
/// Reads the whole multipart body before the task engine runs. Every file is
/// gated as it arrives (type, size, count), so a rejected request never
/// reaches blob storage. Accepted files are then stored and handed over as
/// `Document` records; if storing one fails, the ones already stored are
/// discarded.
///
/// Text fields map onto [`TaskFields`]. `removedFiles` is a JSON array of
/// document IDs; a malformed value is logged and treated as empty.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use bytes::{Bytes, BytesMut};
use taskboard_shared::engine::{AttachmentManager, TaskFields};
use taskboard_shared::models::task::Document;
use taskboard_shared::storage::{
    document_from_blob, generate_public_id, BlobStorage, BlobUpload, StorageError,
};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::ApiError;

/// Form field carrying files
pub const DOCUMENTS_FIELD: &str = "documents";

const PDF: &str = "application/pdf";

/// Upload stage rejection
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Only PDF documents are allowed!")]
    UnsupportedType,

    #[error("File too large")]
    TooLarge,

    #[error("Maximum {0} documents allowed")]
    TooMany(usize),

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Malformed(err.body_text())
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// File accepted by the gate but not yet stored
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Parsed multipart task request
#[derive(Debug, Default)]
pub struct TaskForm {
    pub fields: TaskFields,
    pub removed_files: Vec<Uuid>,
    pub files: Vec<PendingFile>,
}

/// Reads and gates a multipart task request
pub async fn read_task_form(
    mut multipart: Multipart,
    limits: &UploadConfig,
) -> Result<TaskForm, UploadError> {
    let mut form = TaskForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == DOCUMENTS_FIELD {
            if form.files.len() >= limits.max_files {
                return Err(UploadError::TooMany(limits.max_files));
            }
            form.files.push(read_file(field, limits).await?);
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "title" => form.fields.title = Some(value),
            "description" => form.fields.description = Some(value),
            "status" => form.fields.status = Some(value),
            "priority" => form.fields.priority = Some(value),
            "dueDate" => form.fields.due_date = Some(value),
            "assignedTo" => form.fields.assigned_to = Some(value),
            "removedFiles" => form.removed_files = parse_removed_files(&value),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

async fn read_file(mut field: Field<'_>, limits: &UploadConfig) -> Result<PendingFile, UploadError> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if content_type != PDF {
        return Err(UploadError::UnsupportedType);
    }

    let original_name = field.file_name().unwrap_or("document.pdf").to_string();

    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if buffer.len() + chunk.len() > limits.max_file_bytes {
            return Err(UploadError::TooLarge);
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(PendingFile {
        original_name,
        content_type,
        bytes: buffer.freeze(),
    })
}

/// Parses the `removedFiles` JSON array
///
/// Entries that are not UUIDs cannot match a document and are dropped.
pub fn parse_removed_files(value: &str) -> Vec<Uuid> {
    if value.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<String>>(value) {
        Ok(ids) => ids
            .iter()
            .filter_map(|id| Uuid::parse_str(id.trim()).ok())
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed removedFiles value");
            Vec::new()
        }
    }
}

/// Stores accepted files, all or nothing
pub async fn store_files(
    storage: &dyn BlobStorage,
    attachments: &AttachmentManager,
    files: Vec<PendingFile>,
) -> Result<Vec<Document>, UploadError> {
    let mut documents = Vec::with_capacity(files.len());

    for file in files {
        let upload = BlobUpload {
            public_id: generate_public_id(),
            original_name: file.original_name,
            content_type: file.content_type,
            bytes: file.bytes,
        };

        match storage.upload(upload.clone()).await {
            Ok(stored) => {
                tracing::debug!(
                    storage_id = %stored.storage_id,
                    size = stored.size,
                    backend = storage.name(),
                    "Document stored"
                );
                documents.push(document_from_blob(&upload, stored));
            }
            Err(e) => {
                tracing::error!(
                    original_name = %upload.original_name,
                    backend = storage.name(),
                    error = %e,
                    "Document upload failed"
                );
                attachments.discard(&documents).await;
                return Err(e.into());
            }
        }
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taskboard_shared::storage::MemoryBlobStorage;

    #[test]
    fn test_removed_files_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(parse_removed_files(&format!("[\"{id}\"]")), vec![id]);
        assert_eq!(parse_removed_files(&format!("[\"{id}\", \"junk\"]")), vec![id]);
        assert!(parse_removed_files("not json").is_empty());
        assert!(parse_removed_files("").is_empty());
    }

    #[test]
    fn test_messages() {
        assert_eq!(UploadError::UnsupportedType.to_string(), "Only PDF documents are allowed!");
        assert_eq!(UploadError::TooLarge.to_string(), "File too large");
        assert_eq!(UploadError::TooMany(3).to_string(), "Maximum 3 documents allowed");
    }

    fn pdf(name: &str) -> PendingFile {
        PendingFile {
            original_name: name.to_string(),
            content_type: PDF.to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4"),
        }
    }

    #[tokio::test]
    async fn test_store_files() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let attachments = AttachmentManager::new(storage.clone());

        let documents = store_files(storage.as_ref(), &attachments, vec![pdf("a.pdf"), pdf("b.pdf")])
            .await
            .unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].original_name, "a.pdf");
        assert_eq!(documents[0].mimetype, PDF);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_stores_nothing() {
        let storage = Arc::new(MemoryBlobStorage::new());
        let attachments = AttachmentManager::new(storage.clone());
        storage.fail_uploads(true);

        let err = store_files(storage.as_ref(), &attachments, vec![pdf("a.pdf")])
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Storage(_)));
        assert!(storage.is_empty());
    }
}
