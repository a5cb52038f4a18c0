//! Message tools: `send_message` and `chat_reply`.
//!
//! Both produce their own user-visible text, so they are in the
//! self-acknowledging set and never get an ACK.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use toolcast_core::{
    ChatTransport, OutboundMessage, ParamKind, Tool, ToolContext, ToolDeclaration, ToolResult,
};

use crate::routing::{opt_str, required_str};

/// Sends a message to the current chat right away, ahead of the batch results.
pub struct SendMessageTool {
    declaration: ToolDeclaration,
    transport: Arc<dyn ChatTransport>,
}

impl SendMessageTool {
    pub const NAME: &'static str = "send_message";

    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        let declaration = ToolDeclaration::new(Self::NAME, "Send a message to the user right away.")
            .required("text", ParamKind::String, "Message text")
            .optional("media_url", ParamKind::String, "URL of media to attach");
        Self {
            declaration,
            transport,
        }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let text = required_str(Self::NAME, args, "text")?;
        let message = match opt_str(args, "media_url") {
            Some(url) => OutboundMessage::Media {
                url: url.to_string(),
                caption: Some(text.to_string()),
                filename: None,
            },
            None => OutboundMessage::text(text),
        };
        self.transport
            .send(&ctx.chat_id, &message)
            .await
            .with_context(|| format!("{} send to {} failed", self.transport.name(), ctx.chat_id))?;
        info!(tool = Self::NAME, chat_id = %ctx.chat_id, transport = self.transport.name(), "[Message] sent");
        Ok(ToolResult::ok().with_field("sent", json!(true)))
    }
}

/// Returns the planner's reply text as the tool output; delivery happens
/// with the rest of the batch.
pub struct ChatReplyTool {
    declaration: ToolDeclaration,
}

impl ChatReplyTool {
    pub const NAME: &'static str = "chat_reply";

    pub fn new() -> Self {
        Self {
            declaration: ToolDeclaration::new(Self::NAME, "Reply to the user with plain text.")
                .required("text", ParamKind::String, "Reply text"),
        }
    }
}

impl Default for ChatReplyTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ChatReplyTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, _ctx: &ToolContext) -> Result<ToolResult> {
        let text = required_str(Self::NAME, args, "text")?;
        Ok(ToolResult::ok().with_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    #[tokio::test]
    async fn test_send_message_goes_to_current_chat() {
        let transport = Arc::new(RecordingTransport::default());
        let tool = SendMessageTool::new(transport.clone());
        let args = json!({"text": "on my way"});
        let result = tool
            .execute(args.as_object().unwrap(), &ToolContext::new("chat-5"))
            .await
            .unwrap();
        assert!(result.success);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("chat-5".to_string(), OutboundMessage::text("on my way")));
    }

    #[tokio::test]
    async fn test_send_message_with_media() {
        let transport = Arc::new(RecordingTransport::default());
        let tool = SendMessageTool::new(transport.clone());
        let args = json!({"text": "here", "media_url": "https://cdn/a.png"});
        tool.execute(args.as_object().unwrap(), &ToolContext::new("c"))
            .await
            .unwrap();
        let sent = transport.sent.lock().unwrap();
        assert!(matches!(&sent[0].1, OutboundMessage::Media { url, .. } if url == "https://cdn/a.png"));
    }

    #[tokio::test]
    async fn test_chat_reply_returns_text() {
        let args = json!({"text": "Sure!"});
        let result = ChatReplyTool::new()
            .execute(args.as_object().unwrap(), &ToolContext::new("c"))
            .await
            .unwrap();
        assert_eq!(result.text.as_deref(), Some("Sure!"));
    }
}
