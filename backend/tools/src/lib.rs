pub mod backends;
pub mod image;
pub mod message_tool;
pub mod routing;
pub mod speech;
pub mod transcribe;
pub mod translate;
pub mod video;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::info;

use toolcast_core::{ChatTransport, ToolRegistry, ToolcastError};
use toolcast_tasks::AsyncJobs;

pub use backends::{
    GeneratedMedia, ImageBackend, ImageRequest, SpeechBackend, SpeechRequest,
    TranscriptionBackend, TranslationBackend, TranslationRequest, VideoBackend, VideoRequest,
};
pub use image::{CreateImageTool, EditImageTool};
pub use message_tool::{ChatReplyTool, SendMessageTool};
pub use routing::{ProviderBackends, Routing};
pub use speech::TextToSpeechTool;
pub use transcribe::TranscribeTool;
pub use translate::TranslateTool;
pub use video::CreateVideoTool;
pub use voice::with_cloned_voice;

/// Everything the built-in tools need. Tools whose backends are missing are
/// not registered, so the planner never sees them.
pub struct ToolKit {
    pub routing: Routing,
    pub images: ProviderBackends<dyn ImageBackend>,
    pub videos: ProviderBackends<dyn VideoBackend>,
    pub speech: ProviderBackends<dyn SpeechBackend>,
    pub transcription: ProviderBackends<dyn TranscriptionBackend>,
    pub translation: ProviderBackends<dyn TranslationBackend>,
    pub jobs: Option<AsyncJobs>,
    pub transport: Option<Arc<dyn ChatTransport>>,
}

impl ToolKit {
    pub fn new(routing: Routing) -> Self {
        Self {
            routing,
            images: ProviderBackends::new(),
            videos: ProviderBackends::new(),
            speech: ProviderBackends::new(),
            transcription: ProviderBackends::new(),
            translation: ProviderBackends::new(),
            jobs: None,
            transport: None,
        }
    }

    pub fn with_jobs(mut self, jobs: AsyncJobs) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register every tool that can run with the configured backends.
    /// `chat_reply` is always available.
    pub fn register_all(self, registry: &mut ToolRegistry) -> Result<usize, ToolcastError> {
        let before = registry.list().len();
        let routing = self.routing;

        if !self.images.is_empty() {
            registry.register(Arc::new(CreateImageTool::new(
                routing.clone(),
                self.images.clone(),
            )))?;
            registry.register(Arc::new(EditImageTool::new(routing.clone(), self.images)))?;
        }
        if !self.videos.is_empty() {
            if let Some(jobs) = self.jobs {
                registry.register(Arc::new(CreateVideoTool::new(
                    routing.clone(),
                    self.videos,
                    jobs,
                )))?;
            }
        }
        if !self.speech.is_empty() {
            registry.register(Arc::new(TextToSpeechTool::new(routing.clone(), self.speech)))?;
        }
        if !self.transcription.is_empty() {
            registry.register(Arc::new(TranscribeTool::new(
                routing.clone(),
                self.transcription,
            )))?;
        }
        if !self.translation.is_empty() {
            registry.register(Arc::new(TranslateTool::new(routing, self.translation)))?;
        }
        if let Some(transport) = self.transport {
            registry.register(Arc::new(SendMessageTool::new(transport)))?;
        }
        registry.register(Arc::new(ChatReplyTool::new()))?;

        let added = registry.list().len() - before;
        info!(count = added, tools = ?registry.list(), "Built-in tools registered");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolcast_providers::{FallbackOrchestrator, ProviderAliasTable};
    use toolcast_tasks::{ReconciliationMap, TaskStore};

    use crate::testing::{FakeImage, FakeVideo};

    fn routing() -> Routing {
        Routing::new(
            Arc::new(ProviderAliasTable::builtin()),
            Arc::new(FallbackOrchestrator::builtin()),
        )
    }

    #[test]
    fn test_only_backed_tools_are_registered() {
        let mut kit = ToolKit::new(routing());
        kit.images.insert("openai", Arc::new(FakeImage::named("openai")));
        let mut registry = ToolRegistry::new();
        assert_eq!(kit.register_all(&mut registry).unwrap(), 3);
        assert_eq!(
            registry.list(),
            vec!["chat_reply", "create_image", "edit_image"]
        );
    }

    #[test]
    fn test_video_needs_jobs() {
        let mut kit = ToolKit::new(routing());
        kit.videos.insert("grok", Arc::new(FakeVideo::default()));
        let mut registry = ToolRegistry::new();
        kit.register_all(&mut registry).unwrap();
        assert!(!registry.contains("create_video"));

        let mut kit = ToolKit::new(routing()).with_jobs(AsyncJobs::new(
            Arc::new(TaskStore::new()),
            Arc::new(ReconciliationMap::new()),
        ));
        kit.videos.insert("grok", Arc::new(FakeVideo::default()));
        let mut registry = ToolRegistry::new();
        kit.register_all(&mut registry).unwrap();
        assert!(registry.contains("create_video"));
    }

    #[test]
    fn test_register_twice_is_rejected() {
        let mut registry = ToolRegistry::new();
        ToolKit::new(routing()).register_all(&mut registry).unwrap();
        assert!(matches!(
            ToolKit::new(routing()).register_all(&mut registry),
            Err(ToolcastError::DuplicateTool(_))
        ));
    }
}
