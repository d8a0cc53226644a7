/// Cloudinary raw-file backend
///
/// Documents are uploaded as `raw` resources into a configurable folder.
/// Requests are signed: the parameters are sorted by name, joined as
/// `k=v&k=v`, suffixed with the API secret, and hashed with SHA-256.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{BlobStorage, BlobUpload, StorageError, StoredBlob};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary account settings
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,

    /// Folder uploads are placed in
    pub folder: String,

    /// API root; overridable for tests and proxies
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            folder: folder.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/raw/{}",
            self.api_base.trim_end_matches('/'),
            self.cloud_name,
            action
        )
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    bytes: i64,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary client
#[derive(Debug, Clone)]
pub struct CloudinaryStorage {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

impl CloudinaryStorage {
    /// Creates a client with a 60 second request timeout
    pub fn new(config: CloudinaryConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Signs a parameter set with the account secret
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        sign_params(params, &self.config.api_secret)
    }
}

/// SHA-256 request signature over sorted `k=v` pairs plus the secret
pub(crate) fn sign_params(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let joined = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(StorageError::Rejected {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

#[async_trait]
impl BlobStorage for CloudinaryStorage {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, upload: BlobUpload) -> Result<StoredBlob, StorageError> {
        let timestamp = Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("folder", self.config.folder.clone());
        params.insert("public_id", upload.public_id.clone());
        params.insert("timestamp", timestamp.clone());
        let signature = self.sign(&params);

        let file = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.original_name)
            .mime_str(&upload.content_type)
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("folder", self.config.folder.clone())
            .text("public_id", upload.public_id)
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let resp = self
            .client
            .post(self.config.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let body: UploadResponse = check_response(resp)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        tracing::debug!(storage_id = %body.public_id, size = body.bytes, "Blob uploaded");

        Ok(StoredBlob {
            url: body.secure_url,
            storage_id: body.public_id,
            size: body.bytes,
        })
    }

    async fn destroy(&self, storage_id: &str) -> Result<(), StorageError> {
        let timestamp = Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("public_id", storage_id.to_string());
        params.insert("timestamp", timestamp.clone());
        let signature = self.sign(&params);

        let form = [
            ("api_key", self.config.api_key.clone()),
            ("public_id", storage_id.to_string()),
            ("timestamp", timestamp),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let resp = self
            .client
            .post(self.config.endpoint("destroy"))
            .form(&form)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let body: DestroyResponse = check_response(resp)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(StorageError::NotFound(storage_id.to_string())),
            other => Err(StorageError::InvalidResponse(format!(
                "destroy returned '{}'",
                other
            ))),
        }
    }
}
