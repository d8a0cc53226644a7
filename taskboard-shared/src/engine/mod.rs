/// Task engine
///
/// Business rules for tasks, independent of HTTP and of the backing stores.
///
/// - `query`: listing filters, sort and pagination
/// - `attachments`: the three-document cap and blob cleanup
/// - `status`: status changes with a mandatory note
/// - `service`: the orchestrator the HTTP layer calls into

pub mod attachments;
pub mod error;
pub mod notify;
pub mod query;
pub mod service;
pub mod status;

pub use attachments::{
    AttachmentManager, BlobDeletion, CleanupReason, DeletionOutcome, Reconciliation, MAX_DOCUMENTS,
};
pub use error::{FieldError, TaskError};
pub use notify::{LogNotifier, TaskNotifier};
pub use query::{RawTaskFilters, TaskQuery, TaskQueryBuilder};
pub use service::{TaskFields, TaskPage, TaskRemoval, TaskService, TaskView};
pub use status::StatusChange;
