/// Provider routing shared by the provider-backed tools.
///
/// Each tool holds one backend per provider key. `Routing` picks the provider
/// the planner asked for (or the tool default) and falls back across the
/// capability class when it fails.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::{Map, Value};

use toolcast_core::{
    user_message, MediaKind, MediaRef, ProviderKey, ToolContext, ToolResult, ToolcastError,
    UserMessage,
};
use toolcast_providers::{FallbackOrchestrator, ProviderAliasTable};

// ---------------------------------------------------------------------------
// Backends per provider
// ---------------------------------------------------------------------------

/// Provider key → backend implementation.
pub struct ProviderBackends<B: ?Sized> {
    backends: HashMap<ProviderKey, Arc<B>>,
}

impl<B: ?Sized> ProviderBackends<B> {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<ProviderKey>, backend: Arc<B>) -> Self {
        self.insert(key, backend);
        self
    }

    pub fn insert(&mut self, key: impl Into<ProviderKey>, backend: Arc<B>) {
        self.backends.insert(key.into(), backend);
    }

    pub fn get(&self, key: &ProviderKey) -> Option<Arc<B>> {
        self.backends.get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn keys(&self) -> Vec<ProviderKey> {
        let mut keys: Vec<ProviderKey> = self.backends.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl<B: ?Sized> Default for ProviderBackends<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ?Sized> Clone for ProviderBackends<B> {
    fn clone(&self) -> Self {
        Self {
            backends: self.backends.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Routing {
    pub aliases: Arc<ProviderAliasTable>,
    pub fallback: Arc<FallbackOrchestrator>,
}

impl Routing {
    pub fn new(aliases: Arc<ProviderAliasTable>, fallback: Arc<FallbackOrchestrator>) -> Self {
        Self { aliases, fallback }
    }

    /// Provider named in the call's `provider` argument, else the tool default.
    pub fn preferred(&self, tool: &str, args: &Map<String, Value>) -> Option<ProviderKey> {
        opt_str(args, "provider")
            .map(|raw| self.aliases.normalize(raw))
            .or_else(|| self.aliases.default_provider_for(tool))
    }

    /// Run `op` on the preferred backend, then on the rest of `class`'s chain.
    /// Providers without a configured backend count as failed attempts.
    pub async fn run<B, T, F, Fut>(
        &self,
        class: &str,
        preferred: Option<ProviderKey>,
        backends: &ProviderBackends<B>,
        op: F,
    ) -> Result<(ProviderKey, T), ToolcastError>
    where
        B: ?Sized,
        F: Fn(ProviderKey, Arc<B>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.fallback
            .run(class, preferred, |provider| {
                let call = backends.get(&provider).map(|b| op(provider.clone(), b));
                async move {
                    match call {
                        Some(fut) => fut.await,
                        None => Err(anyhow!("no backend configured for {provider}")),
                    }
                }
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// Trimmed, non-empty string argument.
pub fn opt_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolcastError> {
    opt_str(args, key).ok_or_else(|| ToolcastError::InvalidArguments {
        tool: tool.to_string(),
        message: format!("'{key}' must be a non-empty string"),
    })
}

pub fn opt_bool(args: &Map<String, Value>, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Quoted media of one of the accepted kinds.
pub fn quoted_media<'a>(ctx: &'a ToolContext, kinds: &[MediaKind]) -> Option<&'a MediaRef> {
    ctx.quoted_media.as_ref().filter(|m| kinds.contains(&m.kind))
}

// ---------------------------------------------------------------------------
// Result helpers
// ---------------------------------------------------------------------------

/// User-facing failure for a tool that could not run.
pub fn user_failure(kind: UserMessage, ctx: &ToolContext) -> ToolResult {
    ToolResult::fail(user_message(kind, &ctx.language))
}

/// Map a routing error to a user-facing result; other errors propagate.
pub fn routing_failure(err: ToolcastError, ctx: &ToolContext) -> anyhow::Result<ToolResult> {
    match err {
        ToolcastError::ProvidersExhausted(_) => {
            Ok(user_failure(UserMessage::ProvidersExhausted, ctx))
        }
        other => Err(other.into()),
    }
}
