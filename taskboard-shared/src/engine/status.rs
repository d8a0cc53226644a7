/// Status transitions with a mandatory note
///
/// Any status may follow any other, including itself. What a transition
/// does require is a non-blank note, which replaces the previous one; no
/// history is kept.

use crate::auth::authorization::{AccessPolicy, AuthzError, Operation, Ownership};
use crate::auth::middleware::Principal;
use crate::models::task::{Task, TaskStatus};

use super::error::TaskError;

const REQUIRED: &str = "Status and note are required";

/// Validated status change request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: TaskStatus,

    /// Trimmed, non-empty
    pub note: String,
}

impl StatusChange {
    pub fn new(status: TaskStatus, note: impl Into<String>) -> Self {
        Self {
            status,
            note: note.into(),
        }
    }

    /// Validates raw request values
    ///
    /// # Errors
    ///
    /// - `TaskError::Invalid` when either value is missing or blank
    /// - `TaskError::Validation` when the status is not a known status
    pub fn parse(status: Option<&str>, note: Option<&str>) -> Result<Self, TaskError> {
        let status = status.map(str::trim).filter(|s| !s.is_empty());
        let note = note.map(str::trim).filter(|n| !n.is_empty());

        let (Some(status), Some(note)) = (status, note) else {
            return Err(TaskError::invalid(REQUIRED));
        };

        let status = status
            .parse::<TaskStatus>()
            .map_err(|message| TaskError::field("status", message))?;

        Ok(Self::new(status, note))
    }

    pub fn apply_to(&self, task: &mut Task) {
        task.status = self.status;
        task.note = Some(self.note.clone());
    }
}

/// Ownership facts of a task
pub fn ownership(task: &Task) -> Ownership {
    Ownership {
        creator_id: task.created_by,
        assignee_id: task.assigned_to,
    }
}

/// Checks that `principal` may change the status of `task`
pub fn authorize(task: &Task, principal: &Principal) -> Result<(), AuthzError> {
    AccessPolicy::authorize(principal, Operation::ChangeStatus, Some(&ownership(task)))
}

/// Applies a status change to a task in memory after checking access
pub fn transition(
    task: &mut Task,
    principal: &Principal,
    change: &StatusChange,
) -> Result<(), TaskError> {
    authorize(task, principal)?;
    change.apply_to(task);
    Ok(())
}
