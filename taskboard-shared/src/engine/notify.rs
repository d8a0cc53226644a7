/// Status change notifications
///
/// The engine calls a [`TaskNotifier`] after a status change made by
/// someone other than the task's creator. Delivery (email, chat, push) is
/// outside this crate; the shipped [`LogNotifier`] only records the event.

use async_trait::async_trait;

use crate::auth::middleware::Principal;
use crate::models::task::Task;

#[async_trait]
pub trait TaskNotifier: Send + Sync {
    /// Called after the new status and note have been persisted
    async fn status_changed(&self, task: &Task, actor: &Principal);
}

/// Notifier that writes an INFO log line
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl TaskNotifier for LogNotifier {
    async fn status_changed(&self, task: &Task, actor: &Principal) {
        tracing::info!(
            task_id = %task.id,
            creator_id = %task.created_by,
            actor_id = %actor.id,
            status = %task.status,
            "Task status changed, creator should be notified"
        );
    }
}
