use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::types::{OutboundMessage, ToolContext, ToolDeclaration, ToolResult};

/// Trait for long-running toolcast components fed by a channel.
///
/// Each component consumes its receiver in its own Tokio task.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    type Input: Send + 'static;

    /// Human-readable name of this component.
    fn name(&self) -> &str;

    /// Start the component's event loop, consuming from the given receiver.
    async fn start(&self, rx: mpsc::Receiver<Self::Input>) -> Result<()>;
}

/// A capability the planner can invoke.
///
/// Implementations own all side effects (provider calls, temp files).
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static declaration: unique name, description, parameter schema.
    fn declaration(&self) -> &ToolDeclaration;

    /// Unique name of the tool (e.g., "create_video").
    fn name(&self) -> &str {
        &self.declaration().name
    }

    /// Execute the tool. Arguments have already been checked against the
    /// declared required parameters.
    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult>;
}

/// Outbound side of a chat transport (WhatsApp, Telegram, ...).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// Minimum delay the transport requires between consecutive messages.
    fn min_delay(&self) -> Duration {
        Duration::ZERO
    }

    async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<()>;
}
