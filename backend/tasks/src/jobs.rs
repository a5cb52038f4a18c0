//! Two-phase async jobs: accept now, complete when the provider calls back.
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use toolcast_core::{user_message, ToolResult, UserMessage};

use crate::reconcile::ReconciliationMap;
use crate::store::{TaskOrigin, TaskStore};

/// What a provider reported about one of its jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CallbackOutcome {
    Completed { result: ToolResult },
    /// `reason` is provider text; it is logged, never shown to the user.
    Failed { reason: String },
    /// Non-terminal status update ("queued", "processing").
    Progress { status: String },
}

/// A translated provider callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCallback {
    pub provider: String,
    pub external_id: String,
    pub outcome: CallbackOutcome,
}

/// Facade over the task store and reconciliation map used by async tools
/// (accept side) and the webhook worker (callback side).
#[derive(Clone)]
pub struct AsyncJobs {
    tasks: Arc<TaskStore>,
    external: Arc<ReconciliationMap>,
}

impl AsyncJobs {
    pub fn new(tasks: Arc<TaskStore>, external: Arc<ReconciliationMap>) -> Self {
        Self { tasks, external }
    }

    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    pub fn reconciliation(&self) -> &Arc<ReconciliationMap> {
        &self.external
    }

    /// Create a pending task and return its id.
    pub async fn accept(&self, origin: TaskOrigin) -> String {
        let id = Uuid::new_v4().to_string();
        self.tasks.create_with_origin(id.clone(), origin).await;
        id
    }

    /// Create a pending task whose cancel token is a child of `parent`, so a
    /// cancelled request also stops its task.
    pub async fn accept_linked(&self, origin: TaskOrigin, parent: &CancellationToken) -> String {
        let id = Uuid::new_v4().to_string();
        self.tasks.create_linked(id.clone(), origin, parent).await;
        id
    }

    /// Correlate the provider's job id with a local task.
    pub async fn bind_external(&self, task_id: &str, external_id: &str) -> Result<()> {
        if external_id.trim().is_empty() {
            bail!("provider returned an empty job id for task {task_id}");
        }
        if self.tasks.get(task_id).await.is_none() {
            bail!("cannot bind external job {external_id}: unknown task {task_id}");
        }
        self.external.register_external(external_id, task_id).await;
        Ok(())
    }

    /// Fail every task whose provider job outlived the reconciliation TTL.
    /// Returns how many tasks were failed.
    pub async fn expire_stale(&self) -> usize {
        let mut failed = 0;
        for entry in self.external.take_expired().await {
            let lang = self.language_of(&entry.local_task_id).await;
            if self
                .tasks
                .fail(&entry.local_task_id, user_message(UserMessage::TimedOut, &lang))
                .await
            {
                warn!(task_id = %entry.local_task_id, external_id = %entry.external_id, "Async job timed out waiting for provider");
                failed += 1;
            }
        }
        failed
    }

    async fn language_of(&self, task_id: &str) -> String {
        self.tasks
            .get(task_id)
            .await
            .and_then(|t| t.origin)
            .map(|o| o.language)
            .unwrap_or_else(|| "en".to_string())
    }

    /// Apply a provider callback. Returns whether a task changed state.
    ///
    /// Unknown or already-resolved external ids are logged and ignored so that
    /// late and duplicate deliveries are harmless.
    pub async fn on_external_callback(&self, callback: ExternalCallback) -> Result<bool> {
        let ExternalCallback {
            provider,
            external_id,
            outcome,
        } = callback;

        if let CallbackOutcome::Progress { status } = &outcome {
            debug!(provider = %provider, external_id = %external_id, status = %status, "Provider progress update");
            return Ok(false);
        }

        let Some(task_id) = self.external.resolve_external(&external_id).await else {
            info!(provider = %provider, external_id = %external_id, "Callback for unknown or already-resolved job, ignoring");
            return Ok(false);
        };

        let applied = match outcome {
            CallbackOutcome::Completed { result } => self.tasks.complete(&task_id, result).await,
            CallbackOutcome::Failed { reason } => {
                warn!(provider = %provider, task_id = %task_id, reason = %reason, "Provider reported job failure");
                let lang = self.language_of(&task_id).await;
                self.tasks
                    .fail(&task_id, user_message(UserMessage::ToolFailed, &lang))
                    .await
            }
            CallbackOutcome::Progress { .. } => false,
        };

        if applied {
            info!(provider = %provider, task_id = %task_id, external_id = %external_id, "Async job reconciled");
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    use tracing_subscriber::fmt::MakeWriter;

    use crate::store::TaskStatus;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn jobs() -> AsyncJobs {
        AsyncJobs::new(Arc::new(TaskStore::new()), Arc::new(ReconciliationMap::new()))
    }

    fn origin(lang: &str) -> TaskOrigin {
        TaskOrigin {
            chat_id: "chat-1".into(),
            tool: "create_video".into(),
            language: lang.into(),
        }
    }

    fn done(external_id: &str, url: &str) -> ExternalCallback {
        ExternalCallback {
            provider: "grok".into(),
            external_id: external_id.into(),
            outcome: CallbackOutcome::Completed {
                result: ToolResult::ok().with_video(url),
            },
        }
    }

    #[tokio::test]
    async fn test_accept_bind_complete() {
        let jobs = jobs();
        let task_id = jobs.accept(origin("en")).await;
        assert_eq!(
            jobs.tasks().get(&task_id).await.unwrap().status,
            TaskStatus::Pending
        );
        jobs.bind_external(&task_id, "ext-9").await.unwrap();

        assert!(jobs.on_external_callback(done("ext-9", "https://cdn/v.mp4")).await.unwrap());
        let task = jobs.tasks().get(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(
            task.result.unwrap().media_urls.video.as_deref(),
            Some("https://cdn/v.mp4")
        );
    }

    #[tokio::test]
    async fn test_duplicate_callback_is_noop() {
        let jobs = jobs();
        let task_id = jobs.accept(origin("en")).await;
        jobs.bind_external(&task_id, "ext-9").await.unwrap();
        assert!(jobs.on_external_callback(done("ext-9", "https://cdn/1.mp4")).await.unwrap());
        assert!(!jobs.on_external_callback(done("ext-9", "https://cdn/2.mp4")).await.unwrap());
        let task = jobs.tasks().get(&task_id).await.unwrap();
        assert_eq!(
            task.result.unwrap().media_urls.video.as_deref(),
            Some("https://cdn/1.mp4")
        );
    }

    #[tokio::test]
    async fn test_unknown_external_id_leaves_store_untouched() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let jobs = jobs();
        let task_id = jobs.accept(origin("en")).await;
        assert!(!jobs.on_external_callback(done("stranger", "https://cdn/x.mp4")).await.unwrap());

        let output = logs.contents();
        assert!(output.contains("unknown or already-resolved job"));
        assert!(output.contains("external_id=stranger"));
        assert_eq!(jobs.tasks().len().await, 1);
        assert_eq!(
            jobs.tasks().get(&task_id).await.unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_failure_uses_user_text() {
        let jobs = jobs();
        let task_id = jobs.accept(origin("es")).await;
        jobs.bind_external(&task_id, "ext-1").await.unwrap();
        let callback = ExternalCallback {
            provider: "grok".into(),
            external_id: "ext-1".into(),
            outcome: CallbackOutcome::Failed {
                reason: "HTTP 500 upstream_timeout".into(),
            },
        };
        assert!(jobs.on_external_callback(callback).await.unwrap());
        let task = jobs.tasks().get(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        let error = task.error.unwrap();
        assert!(!error.contains("upstream_timeout"));
        assert_eq!(error, user_message(UserMessage::ToolFailed, "es"));
    }

    #[tokio::test]
    async fn test_progress_keeps_binding() {
        let jobs = jobs();
        let task_id = jobs.accept(origin("en")).await;
        jobs.bind_external(&task_id, "ext-1").await.unwrap();
        let progress = ExternalCallback {
            provider: "grok".into(),
            external_id: "ext-1".into(),
            outcome: CallbackOutcome::Progress {
                status: "processing".into(),
            },
        };
        assert!(!jobs.on_external_callback(progress).await.unwrap());
        assert!(jobs.reconciliation().contains("ext-1").await);
        assert!(jobs.on_external_callback(done("ext-1", "https://cdn/v.mp4")).await.unwrap());
    }

    #[tokio::test]
    async fn test_bind_rejects_unknown_task_and_empty_id() {
        let jobs = jobs();
        assert!(jobs.bind_external("missing", "ext-1").await.is_err());
        let task_id = jobs.accept(origin("en")).await;
        assert!(jobs.bind_external(&task_id, "  ").await.is_err());
    }

    #[tokio::test]
    async fn test_callback_after_cancel_is_dropped() {
        let jobs = jobs();
        let task_id = jobs.accept(origin("en")).await;
        jobs.bind_external(&task_id, "ext-1").await.unwrap();
        assert!(jobs.tasks().cancel(&task_id).await);
        assert!(!jobs.on_external_callback(done("ext-1", "https://cdn/v.mp4")).await.unwrap());
        assert_eq!(
            jobs.tasks().get(&task_id).await.unwrap().status,
            TaskStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_expired_job_fails_with_localized_timeout() {
        let jobs = AsyncJobs::new(
            Arc::new(TaskStore::new()),
            Arc::new(ReconciliationMap::with_ttl(Duration::ZERO)),
        );
        let stale = jobs.accept(origin("es")).await;
        jobs.bind_external(&stale, "ext-1").await.unwrap();
        let resolved = jobs.accept(origin("en")).await;
        jobs.tasks().complete(&resolved, ToolResult::ok()).await;
        jobs.bind_external(&resolved, "ext-2").await.unwrap();

        // A callback that arrives after the TTL is not applied.
        assert!(!jobs.on_external_callback(done("ext-1", "https://cdn/v.mp4")).await.unwrap());

        assert_eq!(jobs.expire_stale().await, 1);
        let task = jobs.tasks().get(&stale).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.unwrap(), user_message(UserMessage::TimedOut, "es"));
        assert_eq!(jobs.tasks().get(&resolved).await.unwrap().status, TaskStatus::Done);
        assert!(jobs.reconciliation().is_empty().await);
        assert_eq!(jobs.expire_stale().await, 0);
    }

    #[tokio::test]
    async fn test_live_jobs_survive_expiry() {
        let jobs = jobs();
        let task_id = jobs.accept(origin("en")).await;
        jobs.bind_external(&task_id, "ext-1").await.unwrap();
        assert_eq!(jobs.expire_stale().await, 0);
        assert!(jobs.reconciliation().contains("ext-1").await);
    }

    #[tokio::test]
    async fn test_accept_linked_cancels_with_parent() {
        let jobs = jobs();
        let parent = CancellationToken::new();
        let task_id = jobs.accept_linked(origin("en"), &parent).await;
        let token = jobs.tasks().cancel_token(&task_id).await.unwrap();
        assert!(!token.is_cancelled());
        parent.cancel();
        assert!(token.is_cancelled());
    }
}
