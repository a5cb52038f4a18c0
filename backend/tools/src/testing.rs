//! In-memory backends for tool tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use toolcast_core::{ChatTransport, MediaRef, OutboundMessage};

use crate::backends::*;

#[derive(Default)]
pub struct FakeImage {
    pub name: &'static str,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeImage {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageBackend for FakeImage {
    async fn generate(&self, req: &ImageRequest) -> Result<GeneratedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("{} returned 503", self.name);
        }
        Ok(GeneratedMedia::new(format!(
            "https://{}/img/{}.png",
            self.name,
            req.prompt.replace(' ', "-")
        )))
    }

    async fn edit(&self, source: &MediaRef, _instruction: &str) -> Result<GeneratedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("{} returned 503", self.name);
        }
        Ok(GeneratedMedia::new(format!(
            "https://{}/edit/{}.png",
            self.name, source.message_id
        )))
    }
}

#[derive(Default)]
pub struct FakeVideo {
    pub name: &'static str,
    pub fail: bool,
    /// Accept the job but hand back a blank id.
    pub empty_id: bool,
    /// Never return from `submit`.
    pub stall: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl VideoBackend for FakeVideo {
    async fn submit(&self, _req: &VideoRequest) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail {
            bail!("{} quota exceeded", self.name);
        }
        if self.empty_id {
            return Ok(String::new());
        }
        Ok(format!("{}-job-{}", self.name, n + 1))
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub fail_clone: bool,
    pub fail_delete: bool,
    pub fail_synthesize: bool,
    pub clones: AtomicUsize,
    pub deletes: AtomicUsize,
    pub deleted: Mutex<Vec<String>>,
    pub synthesized: Mutex<Vec<SpeechRequest>>,
}

impl FakeSpeech {
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_attempts(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    async fn synthesize(&self, req: &SpeechRequest) -> Result<GeneratedMedia> {
        self.synthesized.lock().unwrap().push(req.clone());
        if self.fail_synthesize {
            bail!("synthesis rejected");
        }
        Ok(GeneratedMedia::new("https://tts/audio.mp3"))
    }

    async fn clone_voice(&self, _sample: &MediaRef) -> Result<String> {
        if self.fail_clone {
            bail!("sample too short");
        }
        let n = self.clones.fetch_add(1, Ordering::SeqCst);
        Ok(format!("voice-{}", n + 1))
    }

    async fn delete_voice(&self, voice_id: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete {
            bail!("voice {voice_id} locked");
        }
        self.deleted.lock().unwrap().push(voice_id.to_string());
        Ok(())
    }
}

pub struct FakeTranscriber(pub &'static str);

#[async_trait]
impl TranscriptionBackend for FakeTranscriber {
    async fn transcribe(&self, _media: &MediaRef, _language: Option<&str>) -> Result<String> {
        Ok(self.0.to_string())
    }
}

pub struct FakeTranslator;

#[async_trait]
impl TranslationBackend for FakeTranslator {
    async fn translate(&self, req: &TranslationRequest) -> Result<String> {
        Ok(format!("[{}] {}", req.target_language, req.text))
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, OutboundMessage)>>,
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, chat_id: &str, message: &OutboundMessage) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message.clone()));
        Ok(())
    }
}
