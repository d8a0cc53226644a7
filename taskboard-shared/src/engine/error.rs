/// Task engine errors

use serde::Serialize;
use validator::ValidationErrors;

use crate::auth::authorization::AuthzError;
use crate::store::StoreError;

/// One failed field rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Flattens `validator` output into field errors, ordered by field
    pub fn from_validation(errors: &ValidationErrors) -> Vec<FieldError> {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        details.sort_by(|a, b| a.field.cmp(&b.field));
        details
    }
}

/// Error type for task operations
///
/// Validation and authorization variants are always raised before any
/// record or blob is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,

    #[error("Document not found")]
    DocumentNotFound,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// Request is well-formed but unusable (e.g. unknown assignee)
    #[error("{0}")]
    Invalid(String),

    /// One or more field rules failed
    #[error("Validation error")]
    Validation(Vec<FieldError>),

    /// Unique field collision
    #[error("{0} already exists.")]
    Conflict(String),

    #[error("{0}")]
    Store(String),

    /// The final write of an update failed
    #[error("Failed to update task: {0}")]
    Persistence(String),
}

impl TaskError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TaskError::Invalid(message.into())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        TaskError::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => TaskError::Conflict(field),
            StoreError::Constraint(name) if name == "tasks_documents_max" => TaskError::field(
                "documents",
                "A task cannot have more than 3 attached documents",
            ),
            other => TaskError::Store(other.to_string()),
        }
    }
}
