/// `translate`: translate text into a target language.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use toolcast_core::{ParamKind, Tool, ToolContext, ToolDeclaration, ToolResult, UserMessage};

use crate::backends::{TranslationBackend, TranslationRequest};
use crate::routing::{
    opt_str, required_str, routing_failure, user_failure, ProviderBackends, Routing,
};

pub struct TranslateTool {
    declaration: ToolDeclaration,
    routing: Routing,
    backends: ProviderBackends<dyn TranslationBackend>,
}

impl TranslateTool {
    pub const NAME: &'static str = "translate";
    pub const CLASS: &'static str = "translation";

    pub fn new(routing: Routing, backends: ProviderBackends<dyn TranslationBackend>) -> Self {
        let declaration = ToolDeclaration::new(Self::NAME, "Translate text into another language.")
            .required("text", ParamKind::String, "Text to translate")
            .required("target_language", ParamKind::String, "Target language (ISO 639-1)")
            .optional("source_language", ParamKind::String, "Source language, if known")
            .optional("provider", ParamKind::String, "Translation provider, if the user named one");
        Self {
            declaration,
            routing,
            backends,
        }
    }
}

#[async_trait]
impl Tool for TranslateTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let req = TranslationRequest {
            text: required_str(Self::NAME, args, "text")?.to_string(),
            target_language: required_str(Self::NAME, args, "target_language")?.to_lowercase(),
            source_language: opt_str(args, "source_language").map(str::to_lowercase),
        };
        info!(tool = Self::NAME, chat_id = %ctx.chat_id, target = %req.target_language, "[Translate] start");

        let preferred = self.routing.preferred(Self::NAME, args);
        let req = &req;
        let outcome = self
            .routing
            .run(Self::CLASS, preferred, &self.backends, |_, backend| async move {
                backend.translate(req).await
            })
            .await;

        match outcome {
            Ok(_) if ctx.is_cancelled() => Ok(user_failure(UserMessage::Cancelled, ctx)),
            Ok((provider, text)) => Ok(ToolResult::ok()
                .with_text(text)
                .with_field("provider", json!(provider))
                .with_field("targetLanguage", json!(req.target_language))),
            Err(e) => routing_failure(e, ctx),
        }
    }
}
