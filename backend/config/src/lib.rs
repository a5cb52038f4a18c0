//! `toolcast-config` — runtime configuration.
//!
//! Provides:
//! - Typed config schema (server, providers, ack, tasks, logging)
//! - YAML read/write
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with per-field reports
//! - Builders for the provider tables and the ACK dispatcher

pub mod defaults;
pub mod env;
pub mod io;
pub mod runtime;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use runtime::{
    ack_dispatcher, ack_min_delay, fallback_orchestrator, listen_addr, provider_table,
    task_settings, webhook_queue, TaskSettings,
};
pub use schema::ToolcastConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Warnings
/// are logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<ToolcastConfig> {
    let raw_config = load_config(path).await?;
    prepare(raw_config, &std::env::vars().collect())
}

fn prepare(raw_config: ToolcastConfig, env: &HashMap<String, String>) -> Result<ToolcastConfig> {
    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: ToolcastConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        let first = &report.errors[0];
        bail!(
            "{} config error(s); first at '{}': {}",
            report.errors.len(),
            first.path,
            first.message
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LoggingConfig, ServerConfig};

    #[test]
    fn test_prepare_substitutes_and_defaults() {
        let raw = ToolcastConfig {
            logging: Some(LoggingConfig {
                dir: Some("${TOOLCAST_LOGS}".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let env = HashMap::from([("TOOLCAST_LOGS".to_string(), "/var/log/toolcast".to_string())]);
        let cfg = prepare(raw, &env).unwrap();
        let logging = cfg.logging.unwrap();
        assert_eq!(logging.dir.as_deref(), Some("/var/log/toolcast"));
        assert_eq!(logging.level.as_deref(), Some(defaults::DEFAULT_LOG_LEVEL));
        assert!(cfg.server.is_some());
    }

    #[test]
    fn test_prepare_rejects_invalid() {
        let raw = ToolcastConfig {
            server: Some(ServerConfig {
                webhook_queue: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = prepare(raw, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("server.webhookQueue"));
    }
}
