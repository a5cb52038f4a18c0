use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use toolcast_core::{
    user_message, ChatTransport, OutboundMessage, ToolInvocation, UserMessage,
};
use toolcast_providers::ProviderAliasTable;

use crate::template::AckTemplate;

/// Tools that send their own status text; an ACK would duplicate it.
pub const DEFAULT_SELF_ACKNOWLEDGING: &[&str] = &["send_message", "chat_reply"];

pub const DEFAULT_GENERIC_TEMPLATE: &str = "⏳ Working on it...";

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("create_image", "🎨 Creating your image with {provider}..."),
    ("edit_image", "🖌️ Editing your image with {provider}..."),
    (
        "create_video",
        "🎬 Generating your video with {provider}. This can take a few minutes...",
    ),
    ("text_to_speech", "🎙️ Recording audio with {provider}..."),
    ("transcribe", "📝 Transcribing with {provider}..."),
    ("translate", "🌐 Translating with {provider}..."),
];

/// Derives and sends the short "working on it" messages for a tool batch.
pub struct AckDispatcher {
    providers: Arc<ProviderAliasTable>,
    templates: HashMap<String, AckTemplate>,
    generic: AckTemplate,
    self_acknowledging: HashSet<String>,
}

impl AckDispatcher {
    /// Dispatcher with the built-in templates and self-acknowledging tools.
    pub fn new(providers: Arc<ProviderAliasTable>) -> Self {
        let templates = DEFAULT_TEMPLATES
            .iter()
            .filter_map(|(tool, raw)| {
                AckTemplate::parse(raw)
                    .ok()
                    .map(|t| (tool.to_string(), t))
            })
            .collect();
        Self {
            providers,
            templates,
            generic: AckTemplate::plain(DEFAULT_GENERIC_TEMPLATE),
            self_acknowledging: DEFAULT_SELF_ACKNOWLEDGING
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_template(mut self, tool: impl Into<String>, template: AckTemplate) -> Self {
        self.templates.insert(tool.into(), template);
        self
    }

    pub fn with_generic(mut self, template: AckTemplate) -> Self {
        self.generic = template;
        self
    }

    pub fn with_self_acknowledging(mut self, tool: impl Into<String>) -> Self {
        self.self_acknowledging.insert(tool.into());
        self
    }

    /// Replace the self-acknowledging set.
    pub fn with_self_acknowledging_set(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.self_acknowledging = tools.into_iter().collect();
        self
    }

    pub fn is_self_acknowledging(&self, tool: &str) -> bool {
        self.self_acknowledging.contains(tool)
    }

    /// One ACK text per call, in call order. Suppressed calls yield `""`.
    pub fn build_acks(&self, calls: &[ToolInvocation]) -> Vec<String> {
        calls.iter().map(|call| self.ack_for(call)).collect()
    }

    fn ack_for(&self, call: &ToolInvocation) -> String {
        if self.is_self_acknowledging(&call.name) {
            return String::new();
        }
        let template = self.templates.get(&call.name).unwrap_or(&self.generic);
        let provider = call
            .provider_arg()
            .map(|raw| self.providers.normalize(raw))
            .or_else(|| self.providers.default_provider_for(&call.name));
        let display = provider.map(|key| self.providers.display_name(&key));
        template.render(display.as_deref())
    }

    /// Turn per-call ACKs into the messages to send: empties dropped,
    /// duplicates collapsed in first-seen order, then one entry verbatim,
    /// two as a bulleted list, three or more as a single count message.
    pub fn plan(&self, acks: &[String], lang: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let unique: Vec<&str> = acks
            .iter()
            .map(String::as_str)
            .filter(|a| !a.is_empty())
            .filter(|a| seen.insert(*a))
            .collect();

        match unique.len() {
            0 => Vec::new(),
            1 => vec![unique[0].to_string()],
            2 => vec![unique
                .iter()
                .map(|a| format!("• {a}"))
                .collect::<Vec<_>>()
                .join("\n")],
            n => vec![user_message(UserMessage::WorkingOnMany(n), lang)],
        }
    }

    /// Send messages in order, honoring the transport's minimum delay.
    /// Failures are logged and never propagated. Returns the number delivered.
    pub async fn send(
        &self,
        transport: &dyn ChatTransport,
        chat_id: &str,
        messages: &[String],
    ) -> usize {
        let delay = transport.min_delay();
        let mut delivered = 0;
        for (i, text) in messages.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match transport
                .send(chat_id, &OutboundMessage::text(text.clone()))
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        transport = transport.name(),
                        chat_id = %chat_id,
                        error = %format!("{e:#}"),
                        "Failed to send ACK"
                    );
                }
            }
        }
        debug!(chat_id = %chat_id, delivered, total = messages.len(), "ACKs sent");
        delivered
    }

    /// Build, plan and send the ACKs for a whole batch. Returns what was planned.
    pub async fn dispatch(
        &self,
        transport: &dyn ChatTransport,
        chat_id: &str,
        calls: &[ToolInvocation],
        lang: &str,
    ) -> Vec<String> {
        let acks = self.build_acks(calls);
        let messages = self.plan(&acks, lang);
        info!(
            chat_id = %chat_id,
            calls = calls.len(),
            messages = messages.len(),
            "Dispatching ACKs"
        );
        self.send(transport, chat_id, &messages).await;
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, OutboundMessage, Instant)>>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl ChatTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        fn min_delay(&self) -> Duration {
            self.delay
        }

        async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<()> {
            if self.fail {
                anyhow::bail!("socket closed");
            }
            self.sent
                .lock()
                .unwrap()
                .push((chat_id.to_string(), message.clone(), Instant::now()));
            Ok(())
        }
    }

    fn dispatcher() -> AckDispatcher {
        AckDispatcher::new(Arc::new(ProviderAliasTable::builtin()))
    }

    fn call(name: &str, args: serde_json::Value) -> ToolInvocation {
        ToolInvocation::new(name, args)
    }

    #[test]
    fn test_default_provider_in_video_ack() {
        let acks = dispatcher().build_acks(&[call(
            "create_video",
            json!({"prompt": "a dog running"}),
        )]);
        assert_eq!(acks.len(), 1);
        assert!(acks[0].contains("Grok"), "got {:?}", acks[0]);
    }

    #[test]
    fn test_explicit_provider_is_normalized() {
        let acks = dispatcher().build_acks(&[call(
            "create_video",
            json!({"prompt": "x", "provider": "Sora"}),
        )]);
        assert!(acks[0].contains("OpenAI"));
        assert!(!acks[0].contains("Grok"));
    }

    #[test]
    fn test_no_provider_strips_slot() {
        let acks = dispatcher().build_acks(&[call("translate", json!({"text": "hola"}))]);
        assert_eq!(acks[0], "🌐 Translating...");
    }

    #[test]
    fn test_self_acknowledging_suppressed() {
        let d = dispatcher();
        let acks = d.build_acks(&[
            call("send_message", json!({"text": "hi"})),
            call("create_image", json!({"prompt": "cat"})),
        ]);
        assert_eq!(acks[0], "");
        assert!(acks[1].contains("OpenAI"));
        assert_eq!(d.plan(&acks, "en"), vec![acks[1].clone()]);
    }

    #[test]
    fn test_unknown_tool_uses_generic() {
        let acks = dispatcher().build_acks(&[call("summon_dragon", json!({}))]);
        assert_eq!(acks[0], DEFAULT_GENERIC_TEMPLATE);
    }

    #[test]
    fn test_duplicate_generic_acks_collapse() {
        let d = dispatcher();
        let acks = d.build_acks(&[call("lookup_weather", json!({})), call("lookup_news", json!({}))]);
        assert_eq!(acks[0], acks[1]);
        assert_eq!(d.plan(&acks, "en"), vec![DEFAULT_GENERIC_TEMPLATE.to_string()]);
    }

    #[test]
    fn test_two_distinct_acks_are_bulleted() {
        let d = dispatcher();
        let acks = vec!["A".to_string(), "".to_string(), "B".to_string(), "A".to_string()];
        assert_eq!(d.plan(&acks, "en"), vec!["• A\n• B".to_string()]);
    }

    #[test]
    fn test_three_or_more_acks_collapse_to_count() {
        let d = dispatcher();
        let acks = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(
            d.plan(&acks, "en"),
            vec![user_message(UserMessage::WorkingOnMany(3), "en")]
        );
        assert!(d.plan(&[String::new()], "en").is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_sends_once_for_duplicates() {
        let d = dispatcher();
        let transport = RecordingTransport::default();
        let calls = [call("lookup_weather", json!({})), call("lookup_news", json!({}))];
        d.dispatch(&transport, "chat-9", &calls, "en").await;
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "chat-9");
        assert_eq!(sent[0].1, OutboundMessage::text(DEFAULT_GENERIC_TEMPLATE));
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let d = dispatcher();
        let transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let delivered = d
            .send(&transport, "chat-1", &["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_send_respects_min_delay() {
        let d = dispatcher();
        let transport = RecordingTransport {
            delay: Duration::from_millis(30),
            ..Default::default()
        };
        d.send(&transport, "chat-1", &["a".to_string(), "b".to_string()])
            .await;
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].2.duration_since(sent[0].2) >= Duration::from_millis(30));
    }
}
