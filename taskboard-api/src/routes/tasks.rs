/// Task resource endpoints
///
/// | Method | Path | Access |
/// |---|---|---|
/// | GET | /api/tasks | admin |
/// | POST | /api/tasks | admin, multipart |
/// | GET | /api/tasks/:id | admin, creator or assignee |
/// | PUT | /api/tasks/:id | admin, multipart |
/// | DELETE | /api/tasks/:id | admin |
/// | GET | /api/tasks/:id/documents/:doc_id | admin, creator or assignee (302) |
/// | PATCH | /api/tasks/:id/status | admin, creator or assignee |
///
/// Multipart routes check the admin rule before reading the body, so a
/// non-admin request never stores a blob.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ApiResponse, MessageResponse},
    upload::{read_task_form, store_files, TaskForm},
};
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{
        authorization::{AccessPolicy, Operation},
        middleware::Principal,
    },
    engine::{query::Pagination, RawTaskFilters, TaskError, TaskView},
    models::task::Document,
};
use uuid::Uuid;

/// One page of tasks
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub pagination: Pagination,
    pub data: Vec<TaskView>,
}

/// Status change body
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
    pub note: Option<String>,
}

/// Unparsable IDs cannot name a task
fn task_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| TaskError::NotFound.into())
}

/// Runs the upload stage: gate every file, then store them all
async fn accept_uploads(state: &AppState, multipart: Multipart) -> ApiResult<(TaskForm, Vec<Document>)> {
    let mut form = read_task_form(multipart, &state.config.upload).await?;
    let files = std::mem::take(&mut form.files);
    let documents = store_files(state.blobs.as_ref(), state.service.attachments(), files).await?;
    Ok((form, documents))
}

/// List tasks with filters, sorting and pagination
///
/// # Query
///
/// `page`, `limit`, `status`, `priority`, `assignedTo`, `startDate`,
/// `endDate`, `search`, `sortBy`, `sortDir`. Invalid values are ignored.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(filters): Query<RawTaskFilters>,
) -> ApiResult<Json<TaskListResponse>> {
    let page = state.service.list(&principal, &filters).await?;

    Ok(Json(TaskListResponse {
        success: true,
        count: page.count,
        total: page.total,
        pagination: page.pagination,
        data: page.data,
    }))
}

/// Fetch one task
pub async fn get_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<TaskView>>> {
    let task = state.service.get(&principal, task_id(&id)?).await?;
    Ok(ApiResponse::ok(task))
}

/// Create a task
///
/// # Endpoint
///
/// ```text
/// POST /api/tasks
/// Content-Type: multipart/form-data
///
/// title, description, status?, priority?, dueDate, assignedTo,
/// documents (up to three PDF files)
/// ```
pub async fn create_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Multipart,
) -> ApiResult<Response> {
    AccessPolicy::authorize(&principal, Operation::Create, None)?;

    let (form, documents) = accept_uploads(&state, multipart).await?;
    let task = state
        .service
        .create(&principal, form.fields, documents)
        .await?;

    Ok(ApiResponse::created(task))
}

/// Update a task
///
/// Accepts any subset of the create fields, `removedFiles` (JSON array of
/// document IDs) and new `documents`.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<Json<ApiResponse<TaskView>>> {
    AccessPolicy::authorize(&principal, Operation::Update, None)?;
    let id = task_id(&id)?;

    let (form, documents) = accept_uploads(&state, multipart).await?;
    let task = state
        .service
        .update(&principal, id, form.fields, &form.removed_files, documents)
        .await?;

    Ok(ApiResponse::ok(task))
}

/// Delete a task and its documents
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let removal = state.service.delete(&principal, task_id(&id)?).await?;

    let failed = removal.deletions.iter().filter(|d| !d.succeeded()).count();
    if failed > 0 {
        tracing::warn!(task_id = %removal.task_id, failed, "Task deleted with orphaned blobs");
    }

    Ok(MessageResponse::new("Task removed"))
}

/// Redirect to a document's stored location
pub async fn download_document(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, document_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let document = state
        .service
        .download_document(&principal, task_id(&id)?, &document_id)
        .await?;

    tracing::debug!(document_id = %document.id, user_id = %principal.id, "Document download");

    Ok((StatusCode::FOUND, [(header::LOCATION, document.url)]).into_response())
}

/// Change status and replace the note
///
/// # Endpoint
///
/// ```text
/// PATCH /api/tasks/:id/status
/// Content-Type: application/json
///
/// { "status": "completed", "note": "Shipped in 1.4" }
/// ```
pub async fn update_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<TaskView>>> {
    let Json(req) = payload?;
    let task = state
        .service
        .change_status(
            &principal,
            task_id(&id)?,
            req.status.as_deref(),
            req.note.as_deref(),
        )
        .await?;

    Ok(ApiResponse::ok(task))
}
