/// `text_to_speech`: synthesize audio, optionally in a voice cloned from the
/// quoted voice note.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use toolcast_core::{
    MediaKind, ParamKind, Tool, ToolContext, ToolDeclaration, ToolResult, UserMessage,
};

use crate::backends::{SpeechBackend, SpeechRequest};
use crate::routing::{
    opt_bool, opt_str, quoted_media, required_str, routing_failure, user_failure,
    ProviderBackends, Routing,
};
use crate::voice::with_cloned_voice;

pub struct TextToSpeechTool {
    declaration: ToolDeclaration,
    routing: Routing,
    backends: ProviderBackends<dyn SpeechBackend>,
}

impl TextToSpeechTool {
    pub const NAME: &'static str = "text_to_speech";
    pub const CLASS: &'static str = "tts";

    pub fn new(routing: Routing, backends: ProviderBackends<dyn SpeechBackend>) -> Self {
        let declaration = ToolDeclaration::new(Self::NAME, "Read text aloud as a voice note.")
            .required("text", ParamKind::String, "Text to speak")
            .optional("voice", ParamKind::String, "Named voice to use")
            .optional(
                "clone_voice",
                ParamKind::Boolean,
                "Speak in the voice of the quoted voice note",
            )
            .optional("provider", ParamKind::String, "Speech provider to use, if the user named one");
        Self {
            declaration,
            routing,
            backends,
        }
    }
}

#[async_trait]
impl Tool for TextToSpeechTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let req = SpeechRequest {
            text: required_str(Self::NAME, args, "text")?.to_string(),
            voice: opt_str(args, "voice").map(str::to_string),
            language: Some(ctx.language.clone()),
        };

        let sample = if opt_bool(args, "clone_voice") {
            match quoted_media(ctx, &[MediaKind::Audio, MediaKind::Video]) {
                Some(sample) => Some(sample),
                None => return Ok(user_failure(UserMessage::MissingMedia, ctx)),
            }
        } else {
            None
        };
        info!(
            tool = Self::NAME,
            chat_id = %ctx.chat_id,
            chars = req.text.chars().count(),
            cloned = sample.is_some(),
            "[TTS] synthesizing"
        );

        let preferred = self.routing.preferred(Self::NAME, args);
        let req = &req;
        let outcome = self
            .routing
            .run(Self::CLASS, preferred, &self.backends, |_, backend| async move {
                match sample {
                    Some(sample) => {
                        let speaker = backend.clone();
                        with_cloned_voice(backend, sample, |voice_id| async move {
                            let req = SpeechRequest {
                                voice: Some(voice_id),
                                ..req.clone()
                            };
                            speaker.synthesize(&req).await
                        })
                        .await
                    }
                    None => backend.synthesize(req).await,
                }
            })
            .await;

        match outcome {
            Ok(_) if ctx.is_cancelled() => Ok(user_failure(UserMessage::Cancelled, ctx)),
            Ok((provider, media)) => Ok(ToolResult::ok()
                .with_audio(media.url)
                .with_field("provider", json!(provider))),
            Err(e) => routing_failure(e, ctx),
        }
    }
}
