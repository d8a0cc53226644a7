//! Common test utilities for integration tests
//!
//! Builds the full router over the in-memory store and blob storage, seeds
//! three users (an admin, an assignee and an unrelated user), and provides
//! request helpers including a small multipart body builder.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::{
    ApiConfig, Config, DatabaseConfig, JwtConfig, StorageConfig, UploadConfig,
};
use taskboard_shared::auth::jwt::{create_token, Claims};
use taskboard_shared::auth::password::hash_password;
use taskboard_shared::models::user::{CreateUser, Role, User};
use taskboard_shared::storage::MemoryBlobStorage;
use taskboard_shared::store::{MemoryStore, UserStore};
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

/// Largest file the test configuration accepts
pub const MAX_FILE_BYTES: usize = 1024;

const BOUNDARY: &str = "taskboard-test-boundary";

/// Configuration that never touches the network
pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            expires_hours: 1,
        },
        storage: StorageConfig {
            cloud_name: "test".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "task-documents".to_string(),
        },
        upload: UploadConfig {
            max_file_bytes: MAX_FILE_BYTES,
            max_files: 3,
        },
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStorage>,
    pub config: Config,
    pub admin: User,
    pub user: User,
    pub other: User,
}

async fn seed_user(store: &MemoryStore, name: &str, email: &str, role: Role) -> anyhow::Result<User> {
    Ok(store
        .insert_user(CreateUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD)?,
            role,
        })
        .await?)
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStorage::new());

        let admin = seed_user(&store, "Admin", "admin@example.com", Role::Admin).await?;
        let user = seed_user(&store, "User", "user@example.com", Role::User).await?;
        let other = seed_user(&store, "Other", "other@example.com", Role::User).await?;

        let state = AppState::new(store.clone(), store.clone(), blobs.clone(), config.clone());
        let app = build_router(state);

        Ok(Self {
            app,
            store,
            blobs,
            config,
            admin,
            user,
            other,
        })
    }

    /// Authorization header value for `user`
    pub fn bearer(&self, user: &User) -> String {
        let claims = Claims::new(user.id, user.role);
        let token = create_token(&claims, &self.config.jwt.secret).expect("token");
        format!("Bearer {}", token)
    }

    /// Sends a request and decodes the JSON body (`Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, json)
    }

    pub async fn get(&self, uri: &str, as_user: Option<&User>) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(user) = as_user {
            builder = builder.header(header::AUTHORIZATION, self.bearer(user));
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        as_user: Option<&User>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = as_user {
            builder = builder.header(header::AUTHORIZATION, self.bearer(user));
        }
        let (status, _, json) = self
            .send(builder.body(Body::from(body.to_string())).expect("request"))
            .await;
        (status, json)
    }

    pub async fn multipart(
        &self,
        method: &str,
        uri: &str,
        as_user: &User,
        form: MultipartForm,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, self.bearer(as_user))
            .header(header::CONTENT_TYPE, form.content_type())
            .body(Body::from(form.finish()))
            .expect("request");
        let (status, _, json) = self.send(request).await;
        (status, json)
    }

    /// Multipart body for a valid task assigned to `self.user`
    pub fn task_form(&self, title: &str) -> MultipartForm {
        MultipartForm::new()
            .text("title", title)
            .text("description", "Created by the API tests")
            .text("dueDate", "2026-06-01")
            .text("assignedTo", &self.user.id.to_string())
    }

    /// Creates a task through the API and returns its JSON
    pub async fn create_task(&self, form: MultipartForm) -> Value {
        let (status, json) = self.multipart("POST", "/api/tasks", &self.admin, form).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
        json["data"].clone()
    }
}

/// Hand-built `multipart/form-data` body
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"documents\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Adds `count` small PDF files named `<prefix>-<n>.pdf`
    pub fn pdfs(mut self, prefix: &str, count: usize) -> Self {
        for i in 0..count {
            self = self.file(&format!("{prefix}-{i}.pdf"), "application/pdf", b"%PDF-1.4 test");
        }
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
