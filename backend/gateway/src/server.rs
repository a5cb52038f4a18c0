//! HTTP surface: provider webhooks, task status and cancellation, health.
//!
//! Webhooks are acknowledged as soon as the payload is parsed and queued.
//! Reconciliation runs on the worker, so a slow store never pushes the
//! response past a provider's webhook timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use toolcast_logging::{EventLogger, ToolEvent, redact_json};
use toolcast_providers::ProviderAliasTable;
use toolcast_tasks::{ExternalCallback, Task, TaskStore};

use crate::webhook::WebhookTranslators;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub tasks: Arc<TaskStore>,
    pub providers: Arc<ProviderAliasTable>,
    pub translators: Arc<WebhookTranslators>,
    pub callbacks: mpsc::Sender<ExternalCallback>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(
        tasks: Arc<TaskStore>,
        providers: Arc<ProviderAliasTable>,
        translators: Arc<WebhookTranslators>,
        callbacks: mpsc::Sender<ExternalCallback>,
    ) -> Self {
        Self {
            tasks,
            providers,
            translators,
            callbacks,
            started_at: Instant::now(),
        }
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/webhooks/:provider", post(receive_webhook))
        .route("/api/tasks/:id", get(get_task).delete(cancel_task))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, state: GatewayState, shutdown: CancellationToken) -> Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind gateway to {addr}"))?;
    info!("Gateway HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("gateway server failed")?;
    info!("Gateway HTTP server stopped");
    Ok(())
}

/// `POST /webhooks/:provider`
///
/// Only malformed JSON is rejected. Everything else gets `200` so providers
/// do not retry deliveries we have already seen or cannot use.
async fn receive_webhook(
    State(state): State<GatewayState>,
    Path(provider): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(provider = %provider, error = %e, "[Webhook] malformed JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "invalid JSON" })),
            );
        }
    };

    let provider = state.providers.normalize(&provider);
    EventLogger::log_event(
        "",
        ToolEvent::Webhook {
            provider: provider.to_string(),
            payload_json: redact_json(&payload).to_string(),
        },
    );

    match state
        .translators
        .for_provider(provider.as_str())
        .translate(provider.as_str(), &payload)
    {
        Ok(callback) => match state.callbacks.try_send(callback) {
            Ok(()) => debug!(provider = %provider, "[Webhook] callback queued"),
            Err(TrySendError::Full(callback)) => warn!(
                provider = %provider,
                external_id = %callback.external_id,
                "[Webhook] reconciliation queue full, dropping callback"
            ),
            Err(TrySendError::Closed(_)) => {
                error!(provider = %provider, "[Webhook] reconciliation worker is not running")
            }
        },
        Err(e) => info!(provider = %provider, error = %e, "[Webhook] payload ignored"),
    }

    (StatusCode::OK, Json(json!({ "ok": true })))
}

/// `GET /api/tasks/:id`
async fn get_task(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, Json<Value>)> {
    state.tasks.get(&id).await.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "task not found" })),
        )
    })
}

/// `DELETE /api/tasks/:id`
///
/// Fails a pending task with `cancelled` and signals its handler. `409` when
/// the task already finished.
async fn cancel_task(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let Some(task) = state.tasks.get(&id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "task not found" })),
        );
    };
    if state.tasks.cancel(&id).await {
        info!(task_id = %id, "[Tasks] cancelled via API");
        return (StatusCode::OK, Json(json!({ "ok": true })));
    }
    let status = state.tasks.get(&id).await.map_or(task.status, |t| t.status);
    (
        StatusCode::CONFLICT,
        Json(json!({ "ok": false, "error": "task already finished", "status": status })),
    )
}

/// `GET /api/health`
async fn health(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "toolcast",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "webhook_queue_free": state.callbacks.capacity(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use toolcast_core::ToolResult;
    use toolcast_tasks::{
        AsyncJobs, CallbackOutcome, ReconciliationMap, TaskOrigin, TaskStatus, CANCELLED,
    };
    use tower::ServiceExt;

    struct Harness {
        jobs: AsyncJobs,
        state: GatewayState,
        rx: mpsc::Receiver<ExternalCallback>,
    }

    fn harness(queue: usize) -> Harness {
        let jobs = AsyncJobs::new(Arc::new(TaskStore::new()), Arc::new(ReconciliationMap::new()));
        let (tx, rx) = mpsc::channel(queue);
        let state = GatewayState::new(
            jobs.tasks().clone(),
            Arc::new(ProviderAliasTable::builtin()),
            Arc::new(WebhookTranslators::new()),
            tx,
        );
        Harness { jobs, state, rx }
    }

    fn origin() -> TaskOrigin {
        TaskOrigin {
            chat_id: "c1".into(),
            tool: "create_video".into(),
            language: "en".into(),
        }
    }

    async fn post(router: Router, path: &str, body: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn delete(router: Router, path: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get_json(router: Router, path: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let h = harness(8);
        let (status, body) = post(build_router(h.state), "/webhooks/grok", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], json!(false));
    }

    #[tokio::test]
    async fn test_unknown_task_id_still_acknowledged() {
        let mut h = harness(8);
        let task_id = h.jobs.accept(origin()).await;
        h.jobs.bind_external(&task_id, "known-job").await.unwrap();

        let (status, body) = post(
            build_router(h.state.clone()),
            "/webhooks/grok",
            r#"{"task_id": "never-issued", "status": "completed", "video_url": "https://cdn/v.mp4"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));

        let callback = h.rx.recv().await.unwrap();
        assert_eq!(callback.external_id, "never-issued");
        assert!(!h.jobs.on_external_callback(callback).await.unwrap());
        assert_eq!(h.jobs.tasks().len().await, 1);
        assert_eq!(
            h.jobs.tasks().get(&task_id).await.unwrap().status,
            TaskStatus::Pending
        );
        assert!(h.jobs.reconciliation().contains("known-job").await);
    }

    #[tokio::test]
    async fn test_provider_alias_in_path_is_normalized() {
        let mut h = harness(8);
        post(
            build_router(h.state.clone()),
            "/webhooks/xAI",
            r#"{"data": {"task_id": "j1", "status": "done", "video_url": "https://cdn/v.mp4"}}"#,
        )
        .await;
        let callback = h.rx.recv().await.unwrap();
        assert_eq!(callback.provider, "grok");
        assert!(matches!(callback.outcome, CallbackOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_untranslatable_and_full_queue_still_200() {
        let h = harness(1);
        let router = build_router(h.state.clone());
        let (status, _) = post(router.clone(), "/webhooks/grok", r#"{"status": "completed"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let payload = r#"{"task_id": "a", "status": "completed"}"#;
        let (first, _) = post(router.clone(), "/webhooks/grok", payload).await;
        let (second, _) = post(router, "/webhooks/grok", payload).await;
        assert_eq!((first, second), (StatusCode::OK, StatusCode::OK));
    }

    #[tokio::test]
    async fn test_task_status_endpoint() {
        let h = harness(8);
        let task_id = h.jobs.accept(origin()).await;
        h.jobs
            .tasks()
            .complete(&task_id, ToolResult::ok().with_video("https://cdn/v.mp4"))
            .await;

        let router = build_router(h.state.clone());
        let (status, body) = get_json(router.clone(), &format!("/api/tasks/{task_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("done"));
        assert_eq!(body["result"]["mediaUrls"]["video"], json!("https://cdn/v.mp4"));

        let (status, _) = get_json(router, "/api/tasks/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_endpoint_fails_task_and_signals_handler() {
        let h = harness(8);
        let task_id = h.jobs.accept(origin()).await;
        h.jobs.bind_external(&task_id, "ext-1").await.unwrap();
        let token = h.jobs.tasks().cancel_token(&task_id).await.unwrap();

        let router = build_router(h.state.clone());
        let path = format!("/api/tasks/{task_id}");
        let (status, body) = delete(router.clone(), &path).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert!(token.is_cancelled());

        let (_, task) = get_json(router.clone(), &path).await;
        assert_eq!(task["status"], json!("failed"));
        assert_eq!(task["error"], json!(CANCELLED));

        let (status, body) = delete(router.clone(), &path).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], json!("failed"));

        let (status, _) = delete(router, "/api/tasks/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // The provider's late completion does not revive the task.
        let late = ExternalCallback {
            provider: "grok".into(),
            external_id: "ext-1".into(),
            outcome: CallbackOutcome::Completed {
                result: ToolResult::ok(),
            },
        };
        assert!(!h.jobs.on_external_callback(late).await.unwrap());
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(8);
        let (status, body) = get_json(build_router(h.state), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
    }
}
