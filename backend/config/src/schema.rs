//! toolcast runtime configuration schema.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills in
//! what the runtime needs after loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolcastConfig {
    /// Webhook gateway listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    /// Provider aliases, display names, tool defaults and fallback orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<ProvidersConfig>,

    /// ACK templates and self-acknowledging tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<AckConfig>,

    /// Task store and reconciliation map housekeeping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Capacity of the webhook → reconciliation worker queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_queue: Option<usize>,
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Additions on top of the built-in provider tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    /// alias → canonical key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,

    /// canonical key → name shown in ACK text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display_names: BTreeMap<String, String>,

    /// tool name → provider used when the call names none
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tool_defaults: BTreeMap<String, String>,

    /// capability class → provider keys in try order; replaces the built-in chain
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fallback: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// ACK
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckConfig {
    /// tool name → template; `{provider}` or `__PROVIDER__` marks the slot
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,

    /// Replaces the built-in list when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_acknowledging: Option<Vec<String>>,

    /// Template for tools without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<String>,

    /// Minimum gap between outbound chat messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
    /// How long finished tasks stay readable through the status endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_retention_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `trace` | `debug` | `info` | `warn` | `error`, or a full filter directive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for the rolling JSON log; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_json: Option<bool>,
}
