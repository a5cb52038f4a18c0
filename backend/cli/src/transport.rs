//! Chat transport for running without a chat network attached.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::info;

use toolcast_core::{ChatTransport, OutboundMessage};

/// Writes each outbound message to stdout as one JSON line.
pub struct ConsoleTransport {
    min_delay: Duration,
    out: Mutex<Stdout>,
}

impl ConsoleTransport {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

pub fn render_line(chat_id: &str, message: &OutboundMessage) -> String {
    let body = match message {
        OutboundMessage::Text { text } => json!({ "chatId": chat_id, "text": text }),
        OutboundMessage::Media {
            url,
            caption,
            filename,
        } => json!({
            "chatId": chat_id,
            "media": url,
            "caption": caption,
            "filename": filename,
        }),
    };
    format!("{body}\n")
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn min_delay(&self) -> Duration {
        self.min_delay
    }

    async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<()> {
        let line = render_line(chat_id, message);
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .context("cannot write to stdout")?;
        out.flush().await.context("cannot flush stdout")?;
        info!(chat_id = %chat_id, "[Console] message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line() {
        let text = render_line("c1", &OutboundMessage::text("⏳ Working on it..."));
        assert_eq!(text, "{\"chatId\":\"c1\",\"text\":\"⏳ Working on it...\"}\n");

        let media = render_line(
            "c1",
            &OutboundMessage::Media {
                url: "https://cdn/v.mp4".into(),
                caption: None,
                filename: Some("v.mp4".into()),
            },
        );
        let value: serde_json::Value = serde_json::from_str(media.trim()).unwrap();
        assert_eq!(value["media"], "https://cdn/v.mp4");
        assert_eq!(value["filename"], "v.mp4");
    }

    #[tokio::test]
    async fn test_send_succeeds() {
        let transport = ConsoleTransport::new(Duration::from_millis(5));
        assert_eq!(transport.min_delay(), Duration::from_millis(5));
        transport
            .send("c1", &OutboundMessage::text("done"))
            .await
            .unwrap();
    }
}
