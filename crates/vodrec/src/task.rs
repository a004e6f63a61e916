// Task source adapter: where (identifier, url) pairs come from and where
// terminal results go. The engine pulls at most once and pushes at most
// once per task; it holds no adapter-specific connection state.

use crate::error::RecoveryError;
use crate::recover::RecoveryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// One unit of work handed to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub identifier: String,
    pub url: String,
}

/// Tri-state task status as stored by the task source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Complete,
    Failed,
}

impl From<&RecoveryResult> for TaskStatus {
    fn from(result: &RecoveryResult) -> Self {
        if result.is_complete {
            TaskStatus::Complete
        } else {
            TaskStatus::Failed
        }
    }
}

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Returns up to `limit` tasks still pending.
    async fn list_pending(&self, limit: usize) -> Result<Vec<PendingTask>, RecoveryError>;

    /// Records the terminal result for one task.
    async fn mark_result(
        &self,
        identifier: &str,
        result: &RecoveryResult,
    ) -> Result<(), RecoveryError>;
}

#[derive(Debug)]
struct TaskEntry {
    identifier: String,
    url: String,
    status: TaskStatus,
    updated_at: Option<DateTime<Utc>>,
}

/// In-memory task source, for tests and embedders that manage their own
/// queue persistence.
#[derive(Debug, Default)]
pub struct MemoryTaskSource {
    tasks: Mutex<Vec<TaskEntry>>,
}

impl MemoryTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, identifier: impl Into<String>, url: impl Into<String>) {
        self.tasks.lock().push(TaskEntry {
            identifier: identifier.into(),
            url: url.into(),
            status: TaskStatus::Pending,
            updated_at: None,
        });
    }

    pub fn status_of(&self, identifier: &str) -> Option<TaskStatus> {
        self.tasks
            .lock()
            .iter()
            .find(|t| t.identifier == identifier)
            .map(|t| t.status)
    }

    pub fn updated_at(&self, identifier: &str) -> Option<DateTime<Utc>> {
        self.tasks
            .lock()
            .iter()
            .find(|t| t.identifier == identifier)
            .and_then(|t| t.updated_at)
    }
}

#[async_trait]
impl TaskSource for MemoryTaskSource {
    async fn list_pending(&self, limit: usize) -> Result<Vec<PendingTask>, RecoveryError> {
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .take(limit)
            .map(|t| PendingTask {
                identifier: t.identifier.clone(),
                url: t.url.clone(),
            })
            .collect())
    }

    async fn mark_result(
        &self,
        identifier: &str,
        result: &RecoveryResult,
    ) -> Result<(), RecoveryError> {
        let mut tasks = self.tasks.lock();
        let entry = tasks
            .iter_mut()
            .find(|t| t.identifier == identifier)
            .ok_or_else(|| RecoveryError::TaskSource {
                reason: format!("unknown task `{identifier}`"),
            })?;
        entry.status = TaskStatus::from(result);
        entry.updated_at = Some(Utc::now());
        Ok(())
    }
}
