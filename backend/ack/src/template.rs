//! ACK templates with one optional provider slot.
//!
//! `"Generating your video with {provider}..."` renders as
//! `"Generating your video with Grok..."` when a provider applies and as
//! `"Generating your video..."` when none does: the slot and the connector
//! word in front of it are stripped together.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider placeholder.
pub const PROVIDER_SLOT: &str = "{provider}";

/// Older spelling of the placeholder, still accepted in config files.
pub const LEGACY_PROVIDER_SLOT: &str = "__PROVIDER__";

/// Words dropped together with an empty slot.
const CONNECTORS: &[&str] = &["with", "using", "via", "on", "by", "from", "through"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template has {0} provider slots, at most one is allowed")]
    TooManySlots(usize),
    #[error("template is empty")]
    Empty,
}

/// A parsed template: text before the slot and, if there is a slot, text after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AckTemplate {
    prefix: String,
    suffix: Option<String>,
}

impl AckTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let raw = raw.replace(LEGACY_PROVIDER_SLOT, PROVIDER_SLOT);
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        let slots = raw.matches(PROVIDER_SLOT).count();
        match slots {
            0 => Ok(Self {
                prefix: raw,
                suffix: None,
            }),
            1 => {
                let (prefix, suffix) = raw
                    .split_once(PROVIDER_SLOT)
                    .ok_or(TemplateError::TooManySlots(slots))?;
                Ok(Self {
                    prefix: prefix.to_string(),
                    suffix: Some(suffix.to_string()),
                })
            }
            n => Err(TemplateError::TooManySlots(n)),
        }
    }

    /// Template without a provider slot; no parsing involved.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            prefix: text.into(),
            suffix: None,
        }
    }

    pub fn has_slot(&self) -> bool {
        self.suffix.is_some()
    }

    /// Fill the slot with `provider`, or strip it gracefully when `None`.
    pub fn render(&self, provider: Option<&str>) -> String {
        let Some(suffix) = &self.suffix else {
            return self.prefix.trim().to_string();
        };

        match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => format!("{}{}{}", self.prefix, name, suffix).trim().to_string(),
            None => {
                let prefix = strip_trailing_connector(self.prefix.trim_end());
                capitalize_first(&tidy(&format!("{prefix} {suffix}")))
            }
        }
    }
}

impl TryFrom<String> for AckTemplate {
    type Error = TemplateError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<AckTemplate> for String {
    fn from(t: AckTemplate) -> Self {
        match t.suffix {
            Some(suffix) => format!("{}{}{}", t.prefix, PROVIDER_SLOT, suffix),
            None => t.prefix,
        }
    }
}

fn strip_trailing_connector(prefix: &str) -> &str {
    let Some((head, last)) = prefix.rsplit_once(char::is_whitespace) else {
        return if is_connector(prefix) { "" } else { prefix };
    };
    if is_connector(last) {
        head.trim_end()
    } else {
        prefix
    }
}

fn is_connector(word: &str) -> bool {
    let word = word.to_lowercase();
    CONNECTORS.contains(&word.as_str())
}

/// Collapse whitespace runs and drop spaces in front of punctuation.
fn tidy(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        let glue = word.starts_with(['.', ',', '!', '?', ':', ';', '…']);
        if !out.is_empty() && !glue {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
        _ => s.to_string(),
    }
}
