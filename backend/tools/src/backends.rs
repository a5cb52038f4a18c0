/// Provider backend traits.
///
/// Concrete HTTP clients live outside this crate; tools only see these
/// traits. Backends return hosted URLs for generated media.
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use toolcast_core::MediaRef;

/// A piece of generated media the transport can fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedMedia {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl GeneratedMedia {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: Option<String>, // "1024x1024", "1024x1792", ...
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, req: &ImageRequest) -> Result<GeneratedMedia>;

    /// Edit `source` following `instruction`.
    async fn edit(&self, source: &MediaRef, instruction: &str) -> Result<GeneratedMedia>;
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoRequest {
    pub prompt: String,
    pub duration_secs: Option<u32>,
    /// Still image to animate, if any.
    pub source: Option<MediaRef>,
}

/// Video generation is asynchronous on every provider we use: `submit`
/// returns the provider's job id and the result arrives by webhook.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    async fn submit(&self, req: &VideoRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub language: Option<String>,
}

#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, req: &SpeechRequest) -> Result<GeneratedMedia>;

    /// Create a temporary voice from an audio sample. Returns the voice id.
    async fn clone_voice(&self, sample: &MediaRef) -> Result<String>;

    async fn delete_voice(&self, voice_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Transcription / translation
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, media: &MediaRef, language: Option<&str>) -> Result<String>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_language: String,
    pub source_language: Option<String>,
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, req: &TranslationRequest) -> Result<String>;
}
