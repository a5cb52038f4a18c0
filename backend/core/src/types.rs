use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// JSON type of a declared tool parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Static description of a tool: name, prompt description, and parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a required parameter.
    pub fn required(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.param(name, kind, true, description)
    }

    /// Add an optional parameter.
    pub fn optional(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.param(name, kind, false, description)
    }

    fn param(mut self, name: &str, kind: ParamKind, required: bool, description: &str) -> Self {
        self.parameters.insert(
            name.to_string(),
            ParamSpec {
                kind,
                required,
                description: description.to_string(),
            },
        );
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Render the declaration as a function-calling JSON schema for the planner.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "type": spec.kind.as_str(),
                        "description": spec.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = self.required_params().collect();

        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

/// A tool call produced by the planner. Not guaranteed to be well-formed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// String argument lookup that tolerates non-object arguments.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Explicit provider requested by the planner, if any.
    pub fn provider_arg(&self) -> Option<&str> {
        self.str_arg("provider")
    }
}

/// Media produced by a tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

impl MediaUrls {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.video.is_none() && self.audio.is_none()
    }
}

/// Uniform result shape returned by every tool handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "MediaUrls::is_empty")]
    pub media_urls: MediaUrls,
    /// Displayable text for the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Set when the tool accepted an async job that completes later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Tool-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// An accepted async job; the final result arrives through the task store.
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            success: true,
            task_id: Some(task_id.into()),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.media_urls.image = Some(url.into());
        self
    }

    pub fn with_video(mut self, url: impl Into<String>) -> Self {
        self.media_urls.video = Some(url.into());
        self
    }

    pub fn with_audio(mut self, url: impl Into<String>) -> Self {
        self.media_urls.audio = Some(url.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Kind of media attached to a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

/// Reference to media in a quoted chat message. Download is the transport's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub message_id: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub url: Option<String>,
}

/// Read-only per-call context handed to tool handlers.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub chat_id: String,
    pub quoted_media: Option<MediaRef>,
    /// Detected language of the inbound message (ISO 639-1).
    pub language: String,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            quoted_media: None,
            language: "en".to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_quoted_media(mut self, media: MediaRef) -> Self {
        self.quoted_media = Some(media);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A message handed to the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    Media {
        url: String,
        caption: Option<String>,
        filename: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Canonical lowercase provider id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderKey(String);

impl ProviderKey {
    /// Wrap an already-canonical key. Use the normalizer for raw input.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
