/// Image tools: `create_image` and `edit_image`.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use toolcast_core::{
    MediaKind, ParamKind, Tool, ToolContext, ToolDeclaration, ToolResult, UserMessage,
};

use crate::backends::{ImageBackend, ImageRequest};
use crate::routing::{
    opt_str, quoted_media, required_str, routing_failure, user_failure, ProviderBackends, Routing,
};

// ---------------------------------------------------------------------------
// create_image
// ---------------------------------------------------------------------------

pub struct CreateImageTool {
    declaration: ToolDeclaration,
    routing: Routing,
    backends: ProviderBackends<dyn ImageBackend>,
}

impl CreateImageTool {
    pub const NAME: &'static str = "create_image";
    pub const CLASS: &'static str = "image";

    pub fn new(routing: Routing, backends: ProviderBackends<dyn ImageBackend>) -> Self {
        let declaration = ToolDeclaration::new(Self::NAME, "Generate an image from a text prompt.")
            .required("prompt", ParamKind::String, "Description of the image to create")
            .optional("provider", ParamKind::String, "Image provider to use, if the user named one")
            .optional("size", ParamKind::String, "Image size such as 1024x1024");
        Self {
            declaration,
            routing,
            backends,
        }
    }
}

#[async_trait]
impl Tool for CreateImageTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let req = ImageRequest {
            prompt: required_str(Self::NAME, args, "prompt")?.to_string(),
            size: opt_str(args, "size").map(str::to_string),
        };
        info!(tool = Self::NAME, chat_id = %ctx.chat_id, "[Image] prompt: {:.80}", req.prompt);

        let preferred = self.routing.preferred(Self::NAME, args);
        let req = &req;
        let outcome = self
            .routing
            .run(Self::CLASS, preferred, &self.backends, |_, backend| async move {
                backend.generate(req).await
            })
            .await;

        match outcome {
            Ok(_) if ctx.is_cancelled() => Ok(user_failure(UserMessage::Cancelled, ctx)),
            Ok((provider, media)) => Ok(ToolResult::ok()
                .with_image(media.url)
                .with_field("provider", json!(provider))),
            Err(e) => routing_failure(e, ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// edit_image
// ---------------------------------------------------------------------------

/// Edits the image in the quoted message.
pub struct EditImageTool {
    declaration: ToolDeclaration,
    routing: Routing,
    backends: ProviderBackends<dyn ImageBackend>,
}

impl EditImageTool {
    pub const NAME: &'static str = "edit_image";
    pub const CLASS: &'static str = "image_edit";

    pub fn new(routing: Routing, backends: ProviderBackends<dyn ImageBackend>) -> Self {
        let declaration = ToolDeclaration::new(
            Self::NAME,
            "Edit the image the user replied to, following an instruction.",
        )
        .required("instruction", ParamKind::String, "What to change in the image")
        .optional("provider", ParamKind::String, "Image provider to use, if the user named one");
        Self {
            declaration,
            routing,
            backends,
        }
    }
}

#[async_trait]
impl Tool for EditImageTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let instruction = required_str(Self::NAME, args, "instruction")?;
        let Some(source) = quoted_media(ctx, &[MediaKind::Image]) else {
            return Ok(user_failure(UserMessage::MissingMedia, ctx));
        };
        info!(tool = Self::NAME, chat_id = %ctx.chat_id, message_id = %source.message_id, "[Image] editing quoted image");

        let preferred = self.routing.preferred(Self::NAME, args);
        let outcome = self
            .routing
            .run(Self::CLASS, preferred, &self.backends, |_, backend| async move {
                backend.edit(source, instruction).await
            })
            .await;

        match outcome {
            Ok(_) if ctx.is_cancelled() => Ok(user_failure(UserMessage::Cancelled, ctx)),
            Ok((provider, media)) => Ok(ToolResult::ok()
                .with_image(media.url)
                .with_field("provider", json!(provider))),
            Err(e) => routing_failure(e, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use toolcast_core::{user_message, MediaRef};
    use toolcast_providers::{FallbackOrchestrator, ProviderAliasTable};

    use crate::testing::FakeImage;

    fn routing() -> Routing {
        Routing::new(
            Arc::new(ProviderAliasTable::builtin()),
            Arc::new(FallbackOrchestrator::builtin()),
        )
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_image_uses_default_provider() {
        let openai = Arc::new(FakeImage::named("openai"));
        let gemini = Arc::new(FakeImage::named("gemini"));
        let tool = CreateImageTool::new(
            routing(),
            ProviderBackends::new()
                .with("openai", openai.clone() as Arc<dyn ImageBackend>)
                .with("gemini", gemini.clone() as Arc<dyn ImageBackend>),
        );
        let result = tool
            .execute(&args(json!({"prompt": "red fox"})), &ToolContext::new("c1"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.media_urls.image.as_deref(), Some("https://openai/img/red-fox.png"));
        assert_eq!(result.extra["provider"], json!("openai"));
        assert_eq!(gemini.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_image_falls_back() {
        let tool = CreateImageTool::new(
            routing(),
            ProviderBackends::new()
                .with("openai", Arc::new(FakeImage::failing("openai")) as Arc<dyn ImageBackend>)
                .with("gemini", Arc::new(FakeImage::named("gemini")) as Arc<dyn ImageBackend>),
        );
        let result = tool
            .execute(&args(json!({"prompt": "owl"})), &ToolContext::new("c1"))
            .await
            .unwrap();
        assert_eq!(result.extra["provider"], json!("gemini"));
    }

    #[tokio::test]
    async fn test_create_image_exhausted_is_user_text() {
        let tool = CreateImageTool::new(
            routing(),
            ProviderBackends::new()
                .with("openai", Arc::new(FakeImage::failing("openai")) as Arc<dyn ImageBackend>),
        );
        let ctx = ToolContext::new("c1").with_language("es");
        let result = tool.execute(&args(json!({"prompt": "owl"})), &ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some(user_message(UserMessage::ProvidersExhausted, "es").as_str())
        );
    }

    #[tokio::test]
    async fn test_edit_image_requires_quoted_image() {
        let tool = EditImageTool::new(
            routing(),
            ProviderBackends::new()
                .with("gemini", Arc::new(FakeImage::named("gemini")) as Arc<dyn ImageBackend>),
        );
        let result = tool
            .execute(&args(json!({"instruction": "make it blue"})), &ToolContext::new("c1"))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some(user_message(UserMessage::MissingMedia, "en").as_str())
        );
    }

    #[tokio::test]
    async fn test_edit_image_with_quoted_image() {
        let tool = EditImageTool::new(
            routing(),
            ProviderBackends::new()
                .with("gemini", Arc::new(FakeImage::named("gemini")) as Arc<dyn ImageBackend>),
        );
        let ctx = ToolContext::new("c1").with_quoted_media(MediaRef {
            message_id: "wamid-7".into(),
            kind: MediaKind::Image,
            url: None,
        });
        let result = tool
            .execute(&args(json!({"instruction": "make it blue"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result.media_urls.image.as_deref(), Some("https://gemini/edit/wamid-7.png"));
    }
}
