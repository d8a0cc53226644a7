/// Blob storage for task documents
///
/// Document bytes never touch the record store. They are uploaded to a
/// [`BlobStorage`] backend, which returns a durable URL plus an opaque
/// storage identifier; the identifier is all that is needed to delete the
/// blob later.
///
/// # Backends
///
/// - [`cloudinary::CloudinaryStorage`]: Cloudinary raw uploads over HTTPS
/// - [`memory::MemoryBlobStorage`]: in-process, with failure injection
///
/// # Example
///
/// ```
/// use taskboard_shared::storage::{BlobStorage, BlobUpload, MemoryBlobStorage};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = MemoryBlobStorage::new();
/// let stored = storage
///     .upload(BlobUpload {
///         public_id: "documents-1-2".to_string(),
///         original_name: "brief.pdf".to_string(),
///         content_type: "application/pdf".to_string(),
///         bytes: bytes::Bytes::from_static(b"%PDF-1.4"),
///     })
///     .await?;
///
/// storage.destroy(&stored.storage_id).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::models::task::Document;

pub mod cloudinary;
pub mod memory;

pub use cloudinary::{CloudinaryConfig, CloudinaryStorage};
pub use memory::MemoryBlobStorage;

/// Error type for blob storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be reached
    #[error("Storage request failed: {0}")]
    Transport(String),

    /// The backend answered with an error
    #[error("Storage backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend's answer could not be understood
    #[error("Unexpected storage response: {0}")]
    InvalidResponse(String),

    /// Nothing is stored under the identifier
    #[error("Blob not found: {0}")]
    NotFound(String),
}

/// File handed to a backend
#[derive(Debug, Clone)]
pub struct BlobUpload {
    /// Name to store the blob under (see [`generate_public_id`])
    pub public_id: String,

    /// Filename as sent by the client
    pub original_name: String,

    pub content_type: String,

    pub bytes: Bytes,
}

/// Where a backend put an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,

    /// Opaque identifier for [`BlobStorage::destroy`]
    pub storage_id: String,

    pub size: i64,
}

/// Blob storage backend
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &'static str;

    /// Stores a blob and returns its durable location
    async fn upload(&self, upload: BlobUpload) -> Result<StoredBlob, StorageError>;

    /// Deletes a blob by its storage identifier
    async fn destroy(&self, storage_id: &str) -> Result<(), StorageError>;
}

/// Generates a unique blob name: `documents-<unix millis>-<random>`
pub fn generate_public_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("documents-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Builds the embedded document record for a stored blob
pub fn document_from_blob(upload: &BlobUpload, stored: StoredBlob) -> Document {
    Document {
        id: Uuid::new_v4(),
        filename: upload.public_id.clone(),
        original_name: upload.original_name.clone(),
        mimetype: upload.content_type.clone(),
        url: stored.url,
        storage_id: stored.storage_id,
        size: stored.size,
        upload_date: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_id_shape() {
        let id = generate_public_id();
        let parts: Vec<&str> = id.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "documents");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(parts[2].parse::<u32>().is_ok());
    }

    #[test]
    fn test_document_from_blob() {
        let upload = BlobUpload {
            public_id: "documents-1-2".to_string(),
            original_name: "plan.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF"),
        };
        let doc = document_from_blob(
            &upload,
            StoredBlob {
                url: "https://cdn.example.com/plan.pdf".to_string(),
                storage_id: "task-documents/documents-1-2".to_string(),
                size: 4,
            },
        );

        assert_eq!(doc.filename, "documents-1-2");
        assert_eq!(doc.original_name, "plan.pdf");
        assert_eq!(doc.storage_id, "task-documents/documents-1-2");
        assert_eq!(doc.size, 4);
    }
}
