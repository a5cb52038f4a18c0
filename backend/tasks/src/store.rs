use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolcast_core::ToolResult;

const EVENT_BUFFER: usize = 256;

/// Error recorded on tasks that were cancelled.
pub const CANCELLED: &str = "cancelled";

/// Lifecycle of an async task. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Who asked for the task; used by the delivery path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskOrigin {
    pub chat_id: String,
    pub tool: String,
    pub language: String,
}

/// Local record of one in-flight or finished async operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<TaskOrigin>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    fn pending(id: String, origin: Option<TaskOrigin>) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            origin,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Published once per task, when it reaches a terminal state.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task: Task,
}

struct Entry {
    task: Task,
    cancel: CancellationToken,
}

/// In-memory task table shared by accepting handlers, webhook reconciliation
/// and status readers.
///
/// Terminal transitions are first-write-wins: a second `complete`/`fail`
/// (e.g. a duplicate webhook) is a no-op.
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Entry>>,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tasks: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Receive terminal transitions (for the result delivery path).
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Create a pending task. Creating an id that already exists returns the
    /// existing task unchanged.
    pub async fn create(&self, id: impl Into<String>) -> Task {
        self.insert(id.into(), None, CancellationToken::new()).await
    }

    pub async fn create_with_origin(&self, id: impl Into<String>, origin: TaskOrigin) -> Task {
        self.insert(id.into(), Some(origin), CancellationToken::new())
            .await
    }

    /// Like `create_with_origin`, with the task's cancel token derived from
    /// `parent`: cancelling the parent cancels the task's token, not the
    /// other way round.
    pub async fn create_linked(
        &self,
        id: impl Into<String>,
        origin: TaskOrigin,
        parent: &CancellationToken,
    ) -> Task {
        self.insert(id.into(), Some(origin), parent.child_token())
            .await
    }

    async fn insert(&self, id: String, origin: Option<TaskOrigin>, cancel: CancellationToken) -> Task {
        let mut tasks = self.tasks.write().await;
        let entry = tasks.entry(id.clone()).or_insert_with(|| {
            debug!(task_id = %id, "Task created");
            Entry {
                task: Task::pending(id.clone(), origin),
                cancel,
            }
        });
        entry.task.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).map(|e| e.task.clone())
    }

    /// Token a handler can watch to notice cancellation of its task.
    pub async fn cancel_token(&self, id: &str) -> Option<CancellationToken> {
        self.tasks.read().await.get(id).map(|e| e.cancel.clone())
    }

    /// Mark a pending task done. Returns whether the transition was applied.
    pub async fn complete(&self, id: &str, result: ToolResult) -> bool {
        self.finish(id, TaskStatus::Done, Some(result), None).await
    }

    /// Mark a pending task failed. Returns whether the transition was applied.
    pub async fn fail(&self, id: &str, error: impl Into<String>) -> bool {
        self.finish(id, TaskStatus::Failed, None, Some(error.into()))
            .await
    }

    /// Fail a task mid-flight and signal its handler. In-flight provider
    /// calls are not aborted; the handler stops at its next check.
    pub async fn cancel(&self, id: &str) -> bool {
        let applied = self.fail(id, CANCELLED).await;
        if applied {
            if let Some(token) = self.cancel_token(id).await {
                token.cancel();
            }
            info!(task_id = %id, "Task cancelled");
        }
        applied
    }

    async fn finish(
        &self,
        id: &str,
        status: TaskStatus,
        result: Option<ToolResult>,
        error: Option<String>,
    ) -> bool {
        let snapshot = {
            let mut tasks = self.tasks.write().await;
            let Some(entry) = tasks.get_mut(id) else {
                warn!(task_id = %id, "Terminal update for unknown task");
                return false;
            };
            if entry.task.status.is_terminal() {
                debug!(task_id = %id, status = ?entry.task.status, "Task already terminal, ignoring update");
                return false;
            }
            entry.task.status = status;
            entry.task.result = result;
            entry.task.error = error;
            entry.task.completed_at = Some(Utc::now());
            entry.task.clone()
        };

        info!(task_id = %id, status = ?status, "Task finished");
        // No subscribers is fine; polling readers still see the new state.
        let _ = self.events.send(TaskEvent { task: snapshot });
        true
    }

    /// Drop terminal tasks that finished more than `older_than` ago.
    pub async fn sweep_completed(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, e| e.task.completed_at.map_or(true, |at| at > cutoff));
        let removed = before - tasks.len();
        if removed > 0 {
            debug!(removed, "Swept completed tasks");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
