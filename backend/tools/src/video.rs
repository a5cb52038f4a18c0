/// `create_video`: asynchronous video generation.
///
/// Accepts a local task, submits the job to the first provider in the
/// `video` chain that takes it, and binds the provider's job id so the
/// completion webhook can find the task. Returns `pending` immediately.
///
/// The task's cancel token is a child of the request's; cancelling either
/// while the provider is still answering abandons the submit.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use toolcast_core::{
    user_message, MediaKind, ParamKind, Tool, ToolContext, ToolDeclaration, ToolResult,
    UserMessage,
};
use toolcast_tasks::{AsyncJobs, TaskOrigin};

use crate::backends::{VideoBackend, VideoRequest};
use crate::routing::{quoted_media, required_str, user_failure, ProviderBackends, Routing};

const MAX_DURATION_SECS: u64 = 20;

pub struct CreateVideoTool {
    declaration: ToolDeclaration,
    routing: Routing,
    backends: ProviderBackends<dyn VideoBackend>,
    jobs: AsyncJobs,
}

impl CreateVideoTool {
    pub const NAME: &'static str = "create_video";
    pub const CLASS: &'static str = "video";

    pub fn new(
        routing: Routing,
        backends: ProviderBackends<dyn VideoBackend>,
        jobs: AsyncJobs,
    ) -> Self {
        let declaration = ToolDeclaration::new(
            Self::NAME,
            "Generate a short video from a prompt, optionally animating the quoted image.",
        )
        .required("prompt", ParamKind::String, "Description of the video")
        .optional("provider", ParamKind::String, "Video provider to use, if the user named one")
        .optional("duration", ParamKind::Integer, "Length in seconds");
        Self {
            declaration,
            routing,
            backends,
            jobs,
        }
    }
}

#[async_trait]
impl Tool for CreateVideoTool {
    fn declaration(&self) -> &ToolDeclaration {
        &self.declaration
    }

    async fn execute(&self, args: &Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult> {
        let req = VideoRequest {
            prompt: required_str(Self::NAME, args, "prompt")?.to_string(),
            duration_secs: args
                .get("duration")
                .and_then(Value::as_u64)
                .map(|d| d.clamp(1, MAX_DURATION_SECS) as u32),
            source: quoted_media(ctx, &[MediaKind::Image]).cloned(),
        };

        let task_id = self
            .jobs
            .accept_linked(
                TaskOrigin {
                    chat_id: ctx.chat_id.clone(),
                    tool: Self::NAME.to_string(),
                    language: ctx.language.clone(),
                },
                &ctx.cancel,
            )
            .await;
        let cancel = self
            .jobs
            .tasks()
            .cancel_token(&task_id)
            .await
            .with_context(|| format!("task {task_id} vanished after accept"))?;
        info!(tool = Self::NAME, task_id = %task_id, chat_id = %ctx.chat_id, "[Video] task accepted");

        let preferred = self.routing.preferred(Self::NAME, args);
        let req = &req;
        let submit = self
            .routing
            .run(Self::CLASS, preferred, &self.backends, |_, backend| async move {
                backend.submit(req).await
            });
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.jobs.tasks().cancel(&task_id).await;
                info!(tool = Self::NAME, task_id = %task_id, "[Video] cancelled during submit");
                return Ok(user_failure(UserMessage::Cancelled, ctx).with_field("task", json!(task_id)));
            }
            submitted = submit => submitted,
        };

        let (provider, external_id) = match submitted {
            Ok(ok) => ok,
            Err(e) => {
                warn!(tool = Self::NAME, task_id = %task_id, error = %e, "[Video] no provider accepted the job");
                let text = user_message(UserMessage::ProvidersExhausted, &ctx.language);
                self.jobs.tasks().fail(&task_id, text.clone()).await;
                return Ok(ToolResult::fail(text).with_field("task", json!(task_id)));
            }
        };

        // Bound before the cancel check: a late webhook must find a terminal task.
        if let Err(e) = self.jobs.bind_external(&task_id, &external_id).await {
            warn!(tool = Self::NAME, task_id = %task_id, provider = %provider, error = %e, "[Video] cannot track submitted job");
            let text = user_message(UserMessage::ToolFailed, &ctx.language);
            self.jobs.tasks().fail(&task_id, text.clone()).await;
            return Ok(ToolResult::fail(text).with_field("task", json!(task_id)));
        }

        if cancel.is_cancelled() {
            self.jobs.tasks().cancel(&task_id).await;
            return Ok(user_failure(UserMessage::Cancelled, ctx).with_field("task", json!(task_id)));
        }

        info!(
            tool = Self::NAME,
            task_id = %task_id,
            provider = %provider,
            external_id = %external_id,
            "[Video] job submitted"
        );
        Ok(ToolResult::pending(task_id).with_field("provider", json!(provider)))
    }
}
