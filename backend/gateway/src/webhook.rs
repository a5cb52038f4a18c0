//! Provider webhook translation.
//!
//! Each provider reports job completion in its own JSON shape. A
//! `WebhookTranslator` turns one payload into an [`ExternalCallback`]; the
//! default translator understands the common `task_id`/`status`/media URL
//! layouts used by the video providers we route to.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use toolcast_core::ToolResult;
use toolcast_tasks::{CallbackOutcome, ExternalCallback};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("payload has no job id")]
    MissingJobId,
    #[error("payload is not a JSON object")]
    NotAnObject,
}

pub trait WebhookTranslator: Send + Sync {
    fn translate(&self, provider: &str, payload: &Value) -> Result<ExternalCallback, TranslateError>;
}

// ---------------------------------------------------------------------------
// Default translator
// ---------------------------------------------------------------------------

/// Places the job id is looked up, in order.
const JOB_ID_PATHS: &[&[&str]] = &[
    &["data", "task_id"],
    &["task_id"],
    &["data", "id"],
    &["id"],
    &["request_id"],
    &["job_id"],
];

const STATUS_PATHS: &[&[&str]] = &[&["status"], &["data", "status"], &["state"], &["data", "state"]];

const SUCCESS_STATES: &[&str] = &["completed", "complete", "succeeded", "success", "done", "finished"];
const FAILURE_STATES: &[&str] = &["failed", "failure", "error", "canceled", "cancelled", "expired", "rejected"];

const VIDEO_PATHS: &[&[&str]] = &[
    &["data", "video_url"],
    &["video_url"],
    &["data", "video", "url"],
    &["video", "url"],
    &["data", "videos", "0", "url"],
];
const IMAGE_PATHS: &[&[&str]] = &[&["data", "image_url"], &["image_url"], &["data", "images", "0", "url"]];
const AUDIO_PATHS: &[&[&str]] = &[&["data", "audio_url"], &["audio_url"]];
const OUTPUT_PATHS: &[&[&str]] = &[&["output"], &["data", "output"], &["result", "url"], &["url"]];

const ERROR_PATHS: &[&[&str]] = &[
    &["error", "message"],
    &["error"],
    &["data", "error"],
    &["message"],
    &["data", "message"],
];

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTranslator;

impl WebhookTranslator for DefaultTranslator {
    fn translate(&self, provider: &str, payload: &Value) -> Result<ExternalCallback, TranslateError> {
        if !payload.is_object() {
            return Err(TranslateError::NotAnObject);
        }
        let external_id = first_string(payload, JOB_ID_PATHS).ok_or(TranslateError::MissingJobId)?;
        let status = first_string(payload, STATUS_PATHS)
            .unwrap_or_default()
            .to_ascii_lowercase();

        let outcome = if FAILURE_STATES.contains(&status.as_str()) {
            CallbackOutcome::Failed {
                reason: first_string(payload, ERROR_PATHS).unwrap_or_else(|| status.clone()),
            }
        } else if SUCCESS_STATES.contains(&status.as_str()) {
            CallbackOutcome::Completed {
                result: media_result(payload),
            }
        } else if status.is_empty() && has_media(payload) {
            // Some providers only call back once, with the output and no status.
            CallbackOutcome::Completed {
                result: media_result(payload),
            }
        } else {
            CallbackOutcome::Progress {
                status: if status.is_empty() { "unknown".to_string() } else { status },
            }
        };

        Ok(ExternalCallback {
            provider: provider.to_string(),
            external_id,
            outcome,
        })
    }
}

fn media_result(payload: &Value) -> ToolResult {
    let mut result = ToolResult::ok();
    if let Some(url) = first_string(payload, VIDEO_PATHS) {
        result = result.with_video(url);
    }
    if let Some(url) = first_string(payload, IMAGE_PATHS) {
        result = result.with_image(url);
    }
    if let Some(url) = first_string(payload, AUDIO_PATHS) {
        result = result.with_audio(url);
    }
    if result.media_urls.is_empty() {
        if let Some(url) = first_output_url(payload) {
            result = result.with_video(url);
        }
    }
    result
}

fn has_media(payload: &Value) -> bool {
    !media_result(payload).media_urls.is_empty()
}

/// `output` may be a URL string or an array of them.
fn first_output_url(payload: &Value) -> Option<String> {
    OUTPUT_PATHS.iter().find_map(|path| match lookup(payload, path)? {
        Value::String(s) if is_url(s) => Some(s.clone()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|s| is_url(s))
            .map(str::to_string),
        _ => None,
    })
}

fn is_url(s: &str) -> bool {
    s.starts_with("https://") || s.starts_with("http://")
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| match v {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => v.get(*key),
    })
}

/// First non-empty string (numbers are stringified) found at any of `paths`.
fn first_string(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(payload, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Per-provider dispatch
// ---------------------------------------------------------------------------

/// Canonical provider key → translator, with a fallback for the rest.
#[derive(Clone)]
pub struct WebhookTranslators {
    default: Arc<dyn WebhookTranslator>,
    by_provider: HashMap<String, Arc<dyn WebhookTranslator>>,
}

impl WebhookTranslators {
    pub fn new() -> Self {
        Self {
            default: Arc::new(DefaultTranslator),
            by_provider: HashMap::new(),
        }
    }

    pub fn with(mut self, provider: impl Into<String>, translator: Arc<dyn WebhookTranslator>) -> Self {
        self.by_provider.insert(provider.into(), translator);
        self
    }

    pub fn for_provider(&self, provider: &str) -> &dyn WebhookTranslator {
        self.by_provider
            .get(provider)
            .map(|t| t.as_ref())
            .unwrap_or(self.default.as_ref())
    }
}

impl Default for WebhookTranslators {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn translate(payload: Value) -> Result<ExternalCallback, TranslateError> {
        DefaultTranslator.translate("grok", &payload)
    }

    #[test]
    fn test_completed_with_nested_id_and_video() {
        let cb = translate(json!({
            "event": "task.finished",
            "data": {"task_id": "job-7", "status": "SUCCEEDED", "video_url": "https://cdn/v.mp4"}
        }))
        .unwrap();
        assert_eq!(cb.external_id, "job-7");
        let CallbackOutcome::Completed { result } = cb.outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.media_urls.video.as_deref(), Some("https://cdn/v.mp4"));
    }

    #[test]
    fn test_output_array() {
        let cb = translate(json!({
            "id": "pred-1",
            "status": "succeeded",
            "output": ["https://replicate.delivery/out.mp4"]
        }))
        .unwrap();
        let CallbackOutcome::Completed { result } = cb.outcome else {
            panic!("expected completion");
        };
        assert_eq!(
            result.media_urls.video.as_deref(),
            Some("https://replicate.delivery/out.mp4")
        );
    }

    #[test]
    fn test_failure_reason() {
        let cb = translate(json!({
            "task_id": 991,
            "status": "failed",
            "error": {"code": "E_SAFETY", "message": "content policy"}
        }))
        .unwrap();
        assert_eq!(cb.external_id, "991");
        assert_eq!(
            cb.outcome,
            CallbackOutcome::Failed {
                reason: "content policy".into()
            }
        );
    }

    #[test]
    fn test_progress_and_media_without_status() {
        let cb = translate(json!({"task_id": "j", "status": "processing"})).unwrap();
        assert!(matches!(cb.outcome, CallbackOutcome::Progress { ref status } if status == "processing"));

        let cb = translate(json!({"task_id": "j", "video": {"url": "https://cdn/x.mp4"}})).unwrap();
        assert!(matches!(cb.outcome, CallbackOutcome::Completed { .. }));
    }

    #[test]
    fn test_missing_id_and_non_object() {
        assert_eq!(translate(json!({"status": "completed"})), Err(TranslateError::MissingJobId));
        assert_eq!(translate(json!([1, 2])), Err(TranslateError::NotAnObject));
    }

    #[test]
    fn test_provider_override() {
        struct Fixed;
        impl WebhookTranslator for Fixed {
            fn translate(&self, provider: &str, _: &Value) -> Result<ExternalCallback, TranslateError> {
                Ok(ExternalCallback {
                    provider: provider.into(),
                    external_id: "fixed".into(),
                    outcome: CallbackOutcome::Progress { status: "x".into() },
                })
            }
        }
        let translators = WebhookTranslators::new().with("kling", Arc::new(Fixed));
        let payload = json!({"task_id": "abc"});
        assert_eq!(
            translators.for_provider("kling").translate("kling", &payload).unwrap().external_id,
            "fixed"
        );
        assert_eq!(
            translators.for_provider("grok").translate("grok", &payload).unwrap().external_id,
            "abc"
        );
    }
}
