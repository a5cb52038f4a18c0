//! Turn a prepared config into the runtime tables.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use toolcast_ack::{AckDispatcher, AckTemplate};
use toolcast_providers::{FallbackChain, FallbackOrchestrator, ProviderAliasTable};

use crate::defaults::{
    DEFAULT_ACK_MIN_DELAY_MS, DEFAULT_BIND, DEFAULT_PORT, DEFAULT_RECONCILIATION_TTL_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TASK_RETENTION_SECS, DEFAULT_WEBHOOK_QUEUE,
};
use crate::schema::ToolcastConfig;

/// Built-in provider table plus the configured additions.
pub fn provider_table(config: &ToolcastConfig) -> ProviderAliasTable {
    let mut table = ProviderAliasTable::builtin();
    let Some(providers) = &config.providers else {
        return table;
    };
    for (alias, key) in &providers.aliases {
        table.insert_alias(key, key);
        table.insert_alias(alias, key);
    }
    for (key, name) in &providers.display_names {
        table.set_display_name(key, name);
    }
    for (tool, key) in &providers.tool_defaults {
        table.set_tool_default(tool, key);
    }
    table
}

/// Built-in chains; a configured class replaces its chain wholesale.
pub fn fallback_orchestrator(
    config: &ToolcastConfig,
    providers: &ProviderAliasTable,
) -> FallbackOrchestrator {
    let mut orchestrator = FallbackOrchestrator::builtin();
    let Some(cfg) = &config.providers else {
        return orchestrator;
    };
    for (class, order) in &cfg.fallback {
        let keys = order
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| providers.normalize(k));
        let chain = FallbackChain::from_keys(keys);
        if !chain.providers.is_empty() {
            orchestrator.set_chain(class.clone(), chain);
        }
    }
    orchestrator
}

pub fn ack_dispatcher(
    config: &ToolcastConfig,
    providers: Arc<ProviderAliasTable>,
) -> Result<AckDispatcher> {
    let mut dispatcher = AckDispatcher::new(providers);
    let Some(ack) = &config.ack else {
        return Ok(dispatcher);
    };
    for (tool, raw) in &ack.templates {
        let template = AckTemplate::parse(raw)
            .with_context(|| format!("invalid ACK template for '{tool}'"))?;
        dispatcher = dispatcher.with_template(tool.clone(), template);
    }
    if let Some(raw) = &ack.generic {
        let template = AckTemplate::parse(raw).context("invalid generic ACK template")?;
        dispatcher = dispatcher.with_generic(template);
    }
    if let Some(tools) = &ack.self_acknowledging {
        dispatcher = dispatcher.with_self_acknowledging_set(tools.iter().cloned());
    }
    Ok(dispatcher)
}

pub fn listen_addr(config: &ToolcastConfig) -> Result<SocketAddr> {
    let server = config.server.clone().unwrap_or_default();
    let bind = server.bind.as_deref().unwrap_or(DEFAULT_BIND);
    let port = server.port.unwrap_or(DEFAULT_PORT);
    format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {bind}:{port}"))
}

pub fn webhook_queue(config: &ToolcastConfig) -> usize {
    config
        .server
        .as_ref()
        .and_then(|s| s.webhook_queue)
        .unwrap_or(DEFAULT_WEBHOOK_QUEUE)
        .max(1)
}

pub fn ack_min_delay(config: &ToolcastConfig) -> Duration {
    let ms = config
        .ack
        .as_ref()
        .and_then(|a| a.min_delay_ms)
        .unwrap_or(DEFAULT_ACK_MIN_DELAY_MS);
    Duration::from_millis(ms)
}

/// Task store and reconciliation housekeeping intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSettings {
    pub reconciliation_ttl: Duration,
    pub sweep_interval: Duration,
    pub task_retention: Duration,
}

pub fn task_settings(config: &ToolcastConfig) -> TaskSettings {
    let tasks = config.tasks.clone().unwrap_or_default();
    TaskSettings {
        reconciliation_ttl: Duration::from_secs(
            tasks
                .reconciliation_ttl_secs
                .unwrap_or(DEFAULT_RECONCILIATION_TTL_SECS),
        ),
        sweep_interval: Duration::from_secs(
            tasks
                .sweep_interval_secs
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
                .max(1),
        ),
        task_retention: Duration::from_secs(
            tasks.task_retention_secs.unwrap_or(DEFAULT_TASK_RETENTION_SECS),
        ),
    }
}
