/// Document attachment lifecycle
///
/// A task holds at most [`MAX_DOCUMENTS`] documents. [`AttachmentManager`]
/// owns the merge of removals and new uploads into that bounded list and
/// the blob cleanup that goes with it.
///
/// Cleanup is best effort. A blob that cannot be deleted never fails the
/// request: the attempt is logged, captured as a [`BlobDeletion`], and the
/// record change goes ahead.
///
/// # Reconcile
///
/// 1. Existing documents whose ID is in the removal set are dropped and
///    their blobs deleted.
/// 2. New uploads are appended after the kept documents, in arrival order.
/// 3. Anything past position three is evicted from the tail and its blob
///    deleted.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::task::Document;
use crate::storage::BlobStorage;

/// Maximum number of documents attached to one task
pub const MAX_DOCUMENTS: usize = 3;

/// Why a blob was deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    /// Explicitly removed by the client
    Removed,

    /// Pushed out by the three-document cap
    Evicted,

    /// Its task was deleted
    Purged,

    /// Uploaded for a request that was then rejected
    Discarded,
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CleanupReason::Removed => "removed",
            CleanupReason::Evicted => "evicted",
            CleanupReason::Purged => "purged",
            CleanupReason::Discarded => "discarded",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,

    /// The backend call failed; the blob may be orphaned
    Failed(String),

    /// The document had no storage identifier
    Skipped,
}

/// One blob cleanup attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDeletion {
    pub document_id: Uuid,
    pub storage_id: String,
    pub reason: CleanupReason,
    pub outcome: DeletionOutcome,
}

impl BlobDeletion {
    pub fn succeeded(&self) -> bool {
        self.outcome == DeletionOutcome::Deleted
    }
}

/// Result of merging removals and uploads
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Final document list, never longer than `MAX_DOCUMENTS`
    pub documents: Vec<Document>,

    /// Every cleanup attempt made along the way
    pub deletions: Vec<BlobDeletion>,
}

impl Reconciliation {
    /// Cleanup attempts that did not succeed
    pub fn failed_deletions(&self) -> impl Iterator<Item = &BlobDeletion> {
        self.deletions
            .iter()
            .filter(|d| matches!(d.outcome, DeletionOutcome::Failed(_)))
    }
}

/// Applies the document cap and cleans up blobs through a storage backend
#[derive(Clone)]
pub struct AttachmentManager {
    storage: Arc<dyn BlobStorage>,
}

impl AttachmentManager {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }

    /// Merges removals and uploads into a bounded document list
    pub async fn reconcile(
        &self,
        existing: Vec<Document>,
        remove_ids: &[Uuid],
        uploads: Vec<Document>,
    ) -> Reconciliation {
        let remove: HashSet<Uuid> = remove_ids.iter().copied().collect();
        let (removed, mut documents): (Vec<_>, Vec<_>) =
            existing.into_iter().partition(|doc| remove.contains(&doc.id));

        let mut deletions = Vec::new();
        for doc in &removed {
            deletions.push(self.delete_blob(doc, CleanupReason::Removed).await);
        }

        documents.extend(uploads);

        if documents.len() > MAX_DOCUMENTS {
            let evicted = documents.split_off(MAX_DOCUMENTS);
            tracing::info!(
                evicted = evicted.len(),
                "Document limit exceeded, evicting newest documents"
            );
            for doc in &evicted {
                deletions.push(self.delete_blob(doc, CleanupReason::Evicted).await);
            }
        }

        Reconciliation {
            documents,
            deletions,
        }
    }

    /// Deletes the blobs of a task that is being deleted
    pub async fn purge(&self, documents: &[Document]) -> Vec<BlobDeletion> {
        self.delete_all(documents, CleanupReason::Purged).await
    }

    /// Deletes blobs uploaded for a request that was rejected
    pub async fn discard(&self, documents: &[Document]) -> Vec<BlobDeletion> {
        self.delete_all(documents, CleanupReason::Discarded).await
    }

    async fn delete_all(&self, documents: &[Document], reason: CleanupReason) -> Vec<BlobDeletion> {
        let mut deletions = Vec::with_capacity(documents.len());
        for doc in documents {
            deletions.push(self.delete_blob(doc, reason).await);
        }
        deletions
    }

    async fn delete_blob(&self, doc: &Document, reason: CleanupReason) -> BlobDeletion {
        let outcome = if doc.storage_id.is_empty() {
            DeletionOutcome::Skipped
        } else {
            match self.storage.destroy(&doc.storage_id).await {
                Ok(()) => {
                    tracing::debug!(
                        document_id = %doc.id,
                        storage_id = %doc.storage_id,
                        reason = %reason,
                        "Blob deleted"
                    );
                    DeletionOutcome::Deleted
                }
                Err(e) => {
                    tracing::warn!(
                        document_id = %doc.id,
                        storage_id = %doc.storage_id,
                        backend = self.storage.name(),
                        reason = %reason,
                        error = %e,
                        "Failed to delete blob, continuing"
                    );
                    DeletionOutcome::Failed(e.to_string())
                }
            }
        };

        BlobDeletion {
            document_id: doc.id,
            storage_id: doc.storage_id.clone(),
            reason,
            outcome,
        }
    }
}
