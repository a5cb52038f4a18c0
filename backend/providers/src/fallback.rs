/// Per-capability provider fallback.
///
/// Each capability class ("video", "image", "tts", ...) has an ordered chain
/// of interchangeable providers. Selection is a pure function of the chain and
/// the set already tried; retries compose outside by growing that set.
use std::collections::{HashMap, HashSet};
use std::future::Future;

use tracing::{info, warn};

use toolcast_core::{ProviderKey, ToolcastError};

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Ordered list of providers to try, from primary → fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    pub providers: Vec<ProviderKey>,
}

impl FallbackChain {
    pub fn new(primary: impl Into<ProviderKey>) -> Self {
        Self {
            providers: vec![primary.into()],
        }
    }

    pub fn then(mut self, fallback: impl Into<ProviderKey>) -> Self {
        let fallback = fallback.into();
        if !self.providers.contains(&fallback) {
            self.providers.push(fallback);
        }
        self
    }

    pub fn from_keys(keys: impl IntoIterator<Item = ProviderKey>) -> Self {
        let mut providers: Vec<ProviderKey> = Vec::new();
        for key in keys {
            if !providers.contains(&key) {
                providers.push(key);
            }
        }
        Self { providers }
    }

    /// First provider in chain order that is not in `tried`.
    pub fn next_untried(&self, tried: &HashSet<ProviderKey>) -> Option<&ProviderKey> {
        self.providers.iter().find(|p| !tried.contains(*p))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Capability class → fallback chain.
#[derive(Debug, Clone, Default)]
pub struct FallbackOrchestrator {
    chains: HashMap<String, FallbackChain>,
}

impl FallbackOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chains for the capability classes toolcast ships tools for.
    pub fn builtin() -> Self {
        Self::new()
            .with_chain("video", FallbackChain::new("grok").then("openai").then("gemini"))
            .with_chain("image", FallbackChain::new("openai").then("gemini").then("stability"))
            .with_chain("image_edit", FallbackChain::new("gemini").then("openai"))
            .with_chain("tts", FallbackChain::new("elevenlabs").then("openai"))
            .with_chain("transcription", FallbackChain::new("openai").then("deepgram"))
            .with_chain("translation", FallbackChain::new("deepl").then("openai").then("gemini"))
    }

    pub fn with_chain(mut self, class: impl Into<String>, chain: FallbackChain) -> Self {
        self.set_chain(class, chain);
        self
    }

    pub fn set_chain(&mut self, class: impl Into<String>, chain: FallbackChain) {
        self.chains.insert(class.into(), chain);
    }

    pub fn chain(&self, class: &str) -> Option<&FallbackChain> {
        self.chains.get(class)
    }

    /// Next provider to try for `class`, or `None` once every provider in the
    /// chain has been tried or when the class has no chain.
    pub fn next_provider(&self, class: &str, tried: &HashSet<ProviderKey>) -> Option<ProviderKey> {
        self.chains.get(class)?.next_untried(tried).cloned()
    }

    /// Run `attempt` against providers of `class` until one succeeds.
    ///
    /// `preferred` (e.g. the provider the planner asked for) goes first even
    /// when it is not part of the chain. Returns the provider that succeeded
    /// with its output.
    pub async fn run<T, F, Fut>(
        &self,
        class: &str,
        preferred: Option<ProviderKey>,
        mut attempt: F,
    ) -> Result<(ProviderKey, T), ToolcastError>
    where
        F: FnMut(ProviderKey) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut tried: HashSet<ProviderKey> = HashSet::new();
        let mut candidate = preferred.or_else(|| self.next_provider(class, &tried));

        while let Some(provider) = candidate {
            match attempt(provider.clone()).await {
                Ok(output) => {
                    if !tried.is_empty() {
                        info!(class = %class, provider = %provider, failed = tried.len(), "Fallback provider succeeded");
                    }
                    return Ok((provider, output));
                }
                Err(e) => {
                    warn!(class = %class, provider = %provider, error = %format!("{e:#}"), "Provider attempt failed");
                    tried.insert(provider);
                }
            }
            candidate = self.next_provider(class, &tried);
        }

        Err(ToolcastError::ProvidersExhausted(class.to_string()))
    }
}
