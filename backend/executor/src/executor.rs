use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolcast_ack::AckDispatcher;
use toolcast_core::{
    ChatTransport, Component, MediaRef, OutboundMessage, ToolContext, ToolInvocation,
    ToolRegistry, ToolResult,
};
use toolcast_logging::{EventLogger, ToolEvent};

/// One piece of the reply to a batch, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Image(String),
    Video(String),
    Audio(String),
}

impl Segment {
    fn to_message(&self) -> OutboundMessage {
        match self {
            Segment::Text(text) => OutboundMessage::text(text.clone()),
            Segment::Image(url) | Segment::Video(url) | Segment::Audio(url) => {
                OutboundMessage::Media {
                    url: url.clone(),
                    caption: None,
                    filename: None,
                }
            }
        }
    }
}

/// Results of a batch, in call order, plus the assembled reply.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub results: Vec<ToolResult>,
    pub segments: Vec<Segment>,
    /// ACK messages that were planned for the batch.
    pub acks: Vec<String>,
}

/// A planner's tool batch for one inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedBatch {
    pub chat_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub quoted_media: Option<MediaRef>,
    pub calls: Vec<ToolInvocation>,
}

fn default_language() -> String {
    "en".to_string()
}

impl PlannedBatch {
    pub fn context(&self) -> ToolContext {
        let ctx = ToolContext::new(self.chat_id.clone()).with_language(self.language.clone());
        match &self.quoted_media {
            Some(media) => ctx.with_quoted_media(media.clone()),
            None => ctx,
        }
    }

    /// Context whose cancel token is a child of `parent`.
    pub fn context_with_cancel(&self, parent: &CancellationToken) -> ToolContext {
        self.context().with_cancel(parent.child_token())
    }
}

/// Runs a planner's tool calls: ACKs first, then every call, then the reply.
pub struct ToolBridge {
    registry: Arc<ToolRegistry>,
    acks: Arc<AckDispatcher>,
    transport: Arc<dyn ChatTransport>,
    cancel: CancellationToken,
}

impl ToolBridge {
    pub fn new(
        registry: Arc<ToolRegistry>,
        acks: Arc<AckDispatcher>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            registry,
            acks,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Batches received by `start` run under children of `cancel`; cancelling
    /// it stops every in-flight tool and the async tasks they accepted.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute a batch.
    ///
    /// ACKs for the whole batch are planned and sent before any call starts.
    /// Calls run concurrently; results and segments keep call order.
    pub async fn run_batch(&self, calls: &[ToolInvocation], ctx: &ToolContext) -> BatchOutcome {
        let acks = self
            .acks
            .dispatch(self.transport.as_ref(), &ctx.chat_id, calls, &ctx.language)
            .await;

        for call in calls {
            EventLogger::log_event(
                &ctx.chat_id,
                ToolEvent::ToolCall {
                    tool_name: call.name.clone(),
                    arguments_json: call.arguments.to_string(),
                },
            );
        }

        let results: Vec<ToolResult> = join_all(
            calls
                .iter()
                .map(|call| self.registry.invoke_call(call, ctx)),
        )
        .await;

        for (call, result) in calls.iter().zip(&results) {
            EventLogger::log_event(
                &ctx.chat_id,
                ToolEvent::ToolOutcome {
                    tool_name: call.name.clone(),
                    success: result.success,
                    error_msg: result.error.clone(),
                },
            );
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(
            chat_id = %ctx.chat_id,
            calls = calls.len(),
            failed,
            "Batch finished"
        );

        let segments = assemble_segments(&results);
        BatchOutcome {
            results,
            segments,
            acks,
        }
    }

    /// Send segments in order. Failures are logged and skipped.
    pub async fn deliver(&self, chat_id: &str, segments: &[Segment]) -> usize {
        let delay = self.transport.min_delay();
        let mut delivered = 0;
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.transport.send(chat_id, &segment.to_message()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    chat_id = %chat_id,
                    transport = self.transport.name(),
                    error = %format!("{e:#}"),
                    "Failed to deliver segment"
                ),
            }
        }
        delivered
    }
}

/// Append every result's text and media, in call order. Async results
/// (`taskId` set) contribute only their text; their media arrives later.
pub fn assemble_segments(results: &[ToolResult]) -> Vec<Segment> {
    let mut segments = Vec::new();
    for result in results {
        let text = result
            .text
            .as_deref()
            .or(if result.success { None } else { result.error.as_deref() })
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(text) = text {
            segments.push(Segment::Text(text.to_string()));
        }
        let media = &result.media_urls;
        if let Some(url) = &media.image {
            segments.push(Segment::Image(url.clone()));
        }
        if let Some(url) = &media.video {
            segments.push(Segment::Video(url.clone()));
        }
        if let Some(url) = &media.audio {
            segments.push(Segment::Audio(url.clone()));
        }
    }
    segments
}

#[async_trait]
impl Component for ToolBridge {
    type Input = PlannedBatch;

    fn name(&self) -> &str {
        "tool-bridge"
    }

    async fn start(&self, mut rx: mpsc::Receiver<PlannedBatch>) -> Result<()> {
        info!("Tool bridge started");
        while let Some(batch) = rx.recv().await {
            let ctx = batch.context_with_cancel(&self.cancel);
            debug!(chat_id = %batch.chat_id, calls = batch.calls.len(), "Batch received");
            let outcome = self.run_batch(&batch.calls, &ctx).await;
            self.deliver(&batch.chat_id, &outcome.segments).await;
        }
        info!("Tool bridge stopped");
        Ok(())
    }
}
