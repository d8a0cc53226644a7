/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and the current user
/// - `users`: User administration
/// - `tasks`: The task resource
///
/// Successful responses share one envelope, `{"success": true, ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub mod auth;
pub mod health;
pub mod tasks;
pub mod users;

/// Success envelope wrapping a `data` payload
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }

    /// 201 Created with the envelope
    pub fn created(data: T) -> Response {
        (StatusCode::CREATED, Self::ok(data)).into_response()
    }
}

/// Success envelope for acknowledgments
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}
