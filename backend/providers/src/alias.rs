//! Provider alias normalization.
//!
//! Planners spell providers every way imaginable ("Open AI", "dall-e", "xAI").
//! The table folds those spellings onto canonical keys, supplies display
//! names for user-facing text, and knows each tool's default provider.
use std::collections::HashMap;

use tracing::debug;

use toolcast_core::ProviderKey;

/// Alias → canonical key, key → display name, tool → default key.
///
/// Targets are kept flat: every alias points at a key that is itself
/// canonical, so `normalize` is idempotent.
#[derive(Debug, Clone, Default)]
pub struct ProviderAliasTable {
    aliases: HashMap<String, String>,
    display_names: HashMap<String, String>,
    tool_defaults: HashMap<String, ProviderKey>,
}

const BUILTIN_ALIASES: &[(&str, &[&str])] = &[
    ("openai", &["open ai", "open-ai", "gpt", "chatgpt", "dall-e", "dalle", "sora", "whisper"]),
    ("gemini", &["google", "google ai", "veo", "imagen", "nano banana", "nano-banana"]),
    ("grok", &["xai", "x.ai", "x-ai", "aurora"]),
    ("elevenlabs", &["eleven labs", "eleven-labs", "eleven", "11labs"]),
    ("kling", &["kling ai", "klingai"]),
    ("runway", &["runwayml", "runway ml"]),
    ("replicate", &[]),
    ("deepgram", &[]),
    ("deepl", &["deep l"]),
    ("stability", &["stability ai", "stable diffusion", "sdxl"]),
];

const BUILTIN_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("openai", "OpenAI"),
    ("gemini", "Gemini"),
    ("grok", "Grok"),
    ("elevenlabs", "ElevenLabs"),
    ("kling", "Kling"),
    ("runway", "Runway"),
    ("replicate", "Replicate"),
    ("deepgram", "Deepgram"),
    ("deepl", "DeepL"),
    ("stability", "Stability AI"),
];

const BUILTIN_TOOL_DEFAULTS: &[(&str, &str)] = &[
    ("create_image", "openai"),
    ("edit_image", "gemini"),
    ("create_video", "grok"),
    ("text_to_speech", "elevenlabs"),
    ("transcribe", "openai"),
];

impl ProviderAliasTable {
    /// Empty table: every input passes through lowercased.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with the providers toolcast knows about.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (key, aliases) in BUILTIN_ALIASES {
            table.insert_alias(key, key);
            for alias in *aliases {
                table.insert_alias(alias, key);
            }
        }
        for (key, name) in BUILTIN_DISPLAY_NAMES {
            table.set_display_name(key, name);
        }
        for (tool, key) in BUILTIN_TOOL_DEFAULTS {
            table.set_tool_default(tool, key);
        }
        table
    }

    pub fn with_alias(mut self, alias: &str, key: &str) -> Self {
        self.insert_alias(alias, key);
        self
    }

    pub fn with_display_name(mut self, key: &str, name: &str) -> Self {
        self.set_display_name(key, name);
        self
    }

    pub fn with_tool_default(mut self, tool: &str, key: &str) -> Self {
        self.set_tool_default(tool, key);
        self
    }

    /// Map `alias` onto `key`, keeping every target canonical.
    pub fn insert_alias(&mut self, alias: &str, key: &str) {
        let alias = fold(alias);
        let key = fold(key);
        if alias.is_empty() || key.is_empty() {
            return;
        }
        let target = self.aliases.get(&key).cloned().unwrap_or(key);
        if let Some(existing) = self.aliases.get(&alias) {
            if *existing != target {
                debug!(alias = %alias, from = %existing, to = %target, "Provider alias re-pointed");
            }
        }
        for value in self.aliases.values_mut() {
            if *value == alias {
                *value = target.clone();
            }
        }
        self.aliases.insert(alias, target);
    }

    pub fn set_display_name(&mut self, key: &str, name: &str) {
        let key = self.normalize(key);
        self.display_names
            .insert(key.as_str().to_string(), name.trim().to_string());
    }

    pub fn set_tool_default(&mut self, tool: &str, key: &str) {
        let key = self.normalize(key);
        self.tool_defaults.insert(tool.to_string(), key);
    }

    /// Fold a raw provider spelling onto its canonical key. Unknown input
    /// passes through trimmed and lowercased.
    pub fn normalize(&self, raw: &str) -> ProviderKey {
        let folded = fold(raw);
        match self.aliases.get(&folded) {
            Some(key) => ProviderKey::new(key.clone()),
            None => ProviderKey::new(folded),
        }
    }

    /// Display name for a canonical key; unknown keys are capitalized.
    pub fn display_name(&self, key: &ProviderKey) -> String {
        if let Some(name) = self.display_names.get(key.as_str()) {
            return name.clone();
        }
        let mut chars = key.as_str().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Provider used for `tool` when the planner does not name one.
    pub fn default_provider_for(&self, tool: &str) -> Option<ProviderKey> {
        self.tool_defaults.get(tool).cloned()
    }

    /// Known canonical keys, sorted.
    pub fn keys(&self) -> Vec<ProviderKey> {
        let mut keys: Vec<String> = self.aliases.values().cloned().collect();
        keys.sort();
        keys.dedup();
        keys.into_iter().map(ProviderKey::new).collect()
    }
}

fn fold(raw: &str) -> String {
    raw.trim().to_lowercase()
}
