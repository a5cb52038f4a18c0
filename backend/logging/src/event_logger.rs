//! Tool Event Logger
//!
//! Structured events (tool calls, tool outcomes, provider webhooks) emitted
//! on the `tool_events` target, redacted before they reach any sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolEvent {
    ToolCall {
        tool_name: String,
        arguments_json: String,
    },
    ToolOutcome {
        tool_name: String,
        success: bool,
        error_msg: Option<String>,
    },
    Webhook {
        provider: String,
        payload_json: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub chat_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: ToolEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Redact and emit one event. `chat_id` is empty for provider webhooks.
    pub fn log_event(chat_id: &str, mut event: ToolEvent) -> EventLogEntry {
        match &mut event {
            ToolEvent::ToolCall { arguments_json, .. } => {
                *arguments_json = redact_sensitive_data(arguments_json);
            }
            ToolEvent::ToolOutcome { error_msg, .. } => {
                if let Some(msg) = error_msg {
                    *msg = redact_sensitive_data(msg);
                }
            }
            ToolEvent::Webhook { payload_json, .. } => {
                *payload_json = redact_sensitive_data(payload_json);
            }
        }

        let entry = EventLogEntry {
            chat_id: redact_sensitive_data(chat_id),
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "tool_events", event = %json, "Tool event");
        entry
    }
}
