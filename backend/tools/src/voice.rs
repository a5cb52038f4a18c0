//! Scoped voice cloning.
//!
//! A cloned voice is a billable, quota-limited resource on the provider side.
//! `with_cloned_voice` releases it on every exit path: success, error, panic
//! inside the body, or the whole future being dropped mid-flight.
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{debug, warn};

use toolcast_core::MediaRef;

use crate::backends::SpeechBackend;

/// Clone a voice from `sample`, run `body` with its id, then delete it.
///
/// A failed deletion is logged and does not change the outcome of `body`.
pub async fn with_cloned_voice<T, F, Fut>(
    backend: Arc<dyn SpeechBackend>,
    sample: &MediaRef,
    body: F,
) -> Result<T>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let voice_id = backend
        .clone_voice(sample)
        .await
        .context("voice cloning failed")?;
    debug!(voice_id = %voice_id, "Cloned voice acquired");

    let lease = VoiceLease {
        backend,
        voice_id: Some(voice_id.clone()),
    };
    let outcome = AssertUnwindSafe(body(voice_id)).catch_unwind().await;
    lease.release().await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Holds a cloned voice until released. Dropping an unreleased lease (the
/// enclosing future was cancelled) schedules the deletion on the runtime.
struct VoiceLease {
    backend: Arc<dyn SpeechBackend>,
    voice_id: Option<String>,
}

impl VoiceLease {
    async fn release(mut self) {
        if let Some(voice_id) = self.voice_id.take() {
            delete_voice(self.backend.as_ref(), &voice_id).await;
        }
    }
}

impl Drop for VoiceLease {
    fn drop(&mut self) {
        let Some(voice_id) = self.voice_id.take() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    delete_voice(backend.as_ref(), &voice_id).await;
                });
            }
            Err(_) => {
                warn!(voice_id = %voice_id, "No runtime to release cloned voice; it will leak");
            }
        }
    }
}

async fn delete_voice(backend: &dyn SpeechBackend, voice_id: &str) {
    match backend.delete_voice(voice_id).await {
        Ok(()) => debug!(voice_id = %voice_id, "Cloned voice released"),
        Err(e) => warn!(voice_id = %voice_id, error = %format!("{e:#}"), "Failed to release cloned voice"),
    }
}
