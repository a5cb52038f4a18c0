//! Wires config, tools, task stores and the gateway into one running process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use toolcast_config::{
    ack_dispatcher, fallback_orchestrator, provider_table, task_settings, webhook_queue,
    TaskSettings, ToolcastConfig,
};
use toolcast_core::{ChatTransport, Component, ToolRegistry};
use toolcast_executor::{PlannedBatch, ToolBridge};
use toolcast_gateway::{
    serve, spawn_sweeper, GatewayState, ReconciliationWorker, WebhookTranslators,
};
use toolcast_providers::ProviderAliasTable;
use toolcast_tasks::{AsyncJobs, ReconciliationMap, TaskStore};
use toolcast_tools::{Routing, ToolKit};

pub struct App {
    pub providers: Arc<ProviderAliasTable>,
    pub registry: Arc<ToolRegistry>,
    pub jobs: AsyncJobs,
    pub bridge: Arc<ToolBridge>,
    pub settings: TaskSettings,
    pub webhook_queue: usize,
    /// Cancelled on shutdown; in-flight tool calls and their tasks follow it.
    pub shutdown: CancellationToken,
}

impl App {
    /// Build the runtime tables and register every tool the configured
    /// backends support. Provider clients attach through `ToolKit`; without
    /// them only the chat tools are available.
    pub fn build(config: &ToolcastConfig, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        let providers = Arc::new(provider_table(config));
        let fallback = Arc::new(fallback_orchestrator(config, &providers));
        let acks = Arc::new(ack_dispatcher(config, providers.clone())?);
        let settings = task_settings(config);

        let jobs = AsyncJobs::new(
            Arc::new(TaskStore::new()),
            Arc::new(ReconciliationMap::with_ttl(settings.reconciliation_ttl)),
        );

        let mut registry = ToolRegistry::new();
        ToolKit::new(Routing::new(providers.clone(), fallback))
            .with_jobs(jobs.clone())
            .with_transport(transport.clone())
            .register_all(&mut registry)
            .context("tool registration failed")?;
        let registry = Arc::new(registry);

        let shutdown = CancellationToken::new();
        let bridge = Arc::new(
            ToolBridge::new(registry.clone(), acks, transport).with_cancel(shutdown.clone()),
        );

        Ok(Self {
            providers,
            registry,
            jobs,
            bridge,
            settings,
            webhook_queue: webhook_queue(config),
            shutdown,
        })
    }

    /// Run the gateway, the reconciliation worker, the sweeper and the tool
    /// bridge until `self.shutdown` fires. Planned batches are read from
    /// stdin as JSON lines.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let shutdown = self.shutdown.clone();
        let (callback_tx, callback_rx) = mpsc::channel(self.webhook_queue);
        let worker = ReconciliationWorker::new(self.jobs.clone());
        tokio::spawn(async move {
            if let Err(e) = worker.start(callback_rx).await {
                error!(error = %e, "Reconciliation worker failed");
            }
        });

        let retention = chrono::Duration::from_std(self.settings.task_retention)
            .context("task retention out of range")?;
        let sweeper = spawn_sweeper(
            self.jobs.clone(),
            self.settings.sweep_interval,
            retention,
            shutdown.clone(),
        );

        let (batch_tx, batch_rx) = mpsc::channel(64);
        let bridge = self.bridge.clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.start(batch_rx).await {
                error!(error = %e, "Tool bridge failed");
            }
        });
        tokio::spawn(feed_batches_from_stdin(batch_tx, shutdown.clone()));

        info!(
            tools = ?self.registry.list(),
            providers = self.providers.keys().len(),
            "All components started"
        );

        let state = GatewayState::new(
            self.jobs.tasks().clone(),
            self.providers.clone(),
            Arc::new(WebhookTranslators::new()),
            callback_tx,
        );
        let served = serve(addr, state, shutdown.clone()).await;
        shutdown.cancel();
        if let Err(e) = sweeper.await {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
        served
    }
}

/// One `PlannedBatch` JSON object per line. Bad lines are logged and skipped.
async fn feed_batches_from_stdin(tx: mpsc::Sender<PlannedBatch>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<PlannedBatch>(&line) {
                Ok(batch) => {
                    if tx.send(batch).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "[Planner] ignoring malformed batch"),
            },
            Ok(None) => {
                info!("[Planner] stdin closed; no more batches");
                break;
            }
            Err(e) => {
                warn!(error = %e, "[Planner] cannot read stdin");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use toolcast_core::ToolInvocation;

    use crate::transport::ConsoleTransport;

    #[test]
    fn test_build_registers_chat_tools_only() {
        let app = App::build(
            &ToolcastConfig::default(),
            Arc::new(ConsoleTransport::new(Duration::ZERO)),
        )
        .unwrap();
        assert_eq!(app.registry.list(), vec!["chat_reply", "send_message"]);
        assert_eq!(app.providers.normalize("xAI").as_str(), "grok");
    }

    #[test]
    fn test_bridge_follows_app_shutdown() {
        let app = App::build(
            &ToolcastConfig::default(),
            Arc::new(ConsoleTransport::new(Duration::ZERO)),
        )
        .unwrap();
        assert!(!app.bridge.cancel_token().is_cancelled());
        app.shutdown.cancel();
        assert!(app.bridge.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_batch_runs_through_bridge() {
        let app = App::build(
            &ToolcastConfig::default(),
            Arc::new(ConsoleTransport::new(Duration::ZERO)),
        )
        .unwrap();
        let batch: PlannedBatch = serde_json::from_str(
            r#"{"chatId": "c1", "calls": [{"name": "chat_reply", "arguments": {"text": "hola"}}]}"#,
        )
        .unwrap();
        assert_eq!(batch.language, "en");
        let outcome = app.bridge.run_batch(&batch.calls, &batch.context()).await;
        assert!(outcome.acks.is_empty());
        assert_eq!(outcome.results[0].text.as_deref(), Some("hola"));

        let unknown = vec![ToolInvocation::new("create_video", serde_json::json!({"prompt": "x"}))];
        let outcome = app.bridge.run_batch(&unknown, &batch.context()).await;
        assert!(!outcome.results[0].success);
    }
}
