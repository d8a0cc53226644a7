/// In-process blob storage
///
/// Keeps blobs in a map and records every destroy call, so tests can check
/// exactly which blobs were cleaned up. Individual storage IDs, or every
/// destroy call, can be made to fail.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{BlobStorage, BlobUpload, StorageError, StoredBlob};

#[derive(Debug, Default)]
struct State {
    blobs: HashMap<String, Bytes>,
    destroyed: Vec<String>,
    failing_ids: HashSet<String>,
    fail_all_destroys: bool,
    fail_uploads: bool,
}

#[derive(Debug)]
pub struct MemoryBlobStorage {
    base_url: String,
    state: Mutex<State>,
}

impl Default for MemoryBlobStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self {
            base_url: "https://blobs.test/task-documents".to_string(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes destroy fail for one storage ID
    pub fn fail_destroy_for(&self, storage_id: impl Into<String>) {
        self.state().failing_ids.insert(storage_id.into());
    }

    /// Makes every destroy call fail
    pub fn fail_all_destroys(&self, fail: bool) {
        self.state().fail_all_destroys = fail;
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.state().fail_uploads = fail;
    }

    /// Storage IDs successfully destroyed, in call order
    pub fn destroyed(&self) -> Vec<String> {
        self.state().destroyed.clone()
    }

    pub fn contains(&self, storage_id: &str) -> bool {
        self.state().blobs.contains_key(storage_id)
    }

    pub fn len(&self) -> usize {
        self.state().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, upload: BlobUpload) -> Result<StoredBlob, StorageError> {
        let mut state = self.state();
        if state.fail_uploads {
            return Err(StorageError::Transport("upload refused".to_string()));
        }

        let storage_id = format!("task-documents/{}", upload.public_id);
        let size = upload.bytes.len() as i64;
        state.blobs.insert(storage_id.clone(), upload.bytes);

        Ok(StoredBlob {
            url: format!("{}/{}.pdf", self.base_url, upload.public_id),
            storage_id,
            size,
        })
    }

    async fn destroy(&self, storage_id: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        if state.fail_all_destroys || state.failing_ids.contains(storage_id) {
            return Err(StorageError::Transport(format!(
                "destroy of {} timed out",
                storage_id
            )));
        }

        if state.blobs.remove(storage_id).is_none() {
            return Err(StorageError::NotFound(storage_id.to_string()));
        }

        state.destroyed.push(storage_id.to_string());
        Ok(())
    }
}
