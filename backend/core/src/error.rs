use thiserror::Error;

/// Top-level error type for the toolcast runtime.
#[derive(Debug, Error)]
pub enum ToolcastError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("all providers failed for capability {0}")]
    ProvidersExhausted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
