/// `transcribe`: turn the quoted voice note or video into text.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use toolcast_core::{
    MediaKind, ParamKind, Tool, ToolContext, ToolDeclaration, ToolResult, UserMessage,
};

use crate::backends::TranscriptionBackend;
use crate::routing::{
    opt_str, quoted_media, routing_failure, user_failure, ProviderBackends, Routing,
};

pub struct TranscribeTool {
    declaration: ToolDeclaration,
    routing: Routing,
    backends: ProviderBackends<dyn TranscriptionBackend>,
}

impl TranscribeTool {
    pub const NAME: &'static str = "transcribe";
    pub const CLASS: &'static str = "transcription";

    pub fn new(routing: Routing, backends: ProviderBackends<dyn TranscriptionBackend>) -> Self {
        let declaration = ToolDeclaration::new(
            Self::NAME,
            "Transcribe the voice note or video the user replied to.",
        )
        .optional("language", ParamKind::String, "Spoken language hint (ISO 639-1)")
        .optional("provider", ParamKind::String, "Transcription provider, if the user named one");
        Self {
            declaration,
            routing,
            backends,
        }
    }
}

#[async_trait]
impl Tool for TranscribeTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let Some(media) = quoted_media(ctx, &[MediaKind::Audio, MediaKind::Video]) else {
            return Ok(user_failure(UserMessage::MissingMedia, ctx));
        };
        let language = opt_str(args, "language");
        info!(tool = Self::NAME, chat_id = %ctx.chat_id, message_id = %media.message_id, "[Transcribe] start");

        let preferred = self.routing.preferred(Self::NAME, args);
        let outcome = self
            .routing
            .run(Self::CLASS, preferred, &self.backends, |_, backend| async move {
                backend.transcribe(media, language).await
            })
            .await;

        match outcome {
            Ok(_) if ctx.is_cancelled() => Ok(user_failure(UserMessage::Cancelled, ctx)),
            Ok((provider, transcript)) => Ok(ToolResult::ok()
                .with_text(transcript)
                .with_field("provider", json!(provider))),
            Err(e) => routing_failure(e, ctx),
        }
    }
}
