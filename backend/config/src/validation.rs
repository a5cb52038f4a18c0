//! Config validation: collects every problem in one pass, keyed by field path.

use crate::schema::ToolcastConfig;
use thiserror::Error;
use toolcast_ack::AckTemplate;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &ToolcastConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_providers(config, &mut report);
    validate_ack(config, &mut report);
    validate_tasks(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_server(config: &ToolcastConfig, report: &mut ValidationReport) {
    let Some(server) = &config.server else { return };
    match server.port {
        Some(0) => report.error("server.port", "port must be > 0"),
        Some(port) if port < 1024 && port != 80 && port != 443 => report.warn(
            "server.port",
            format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
        ),
        _ => {}
    }
    if server.webhook_queue == Some(0) {
        report.error("server.webhookQueue", "webhookQueue must be >= 1");
    }
    if server.bind.as_deref().is_some_and(|b| b.trim().is_empty()) {
        report.error("server.bind", "bind address cannot be empty");
    }
}

fn validate_providers(config: &ToolcastConfig, report: &mut ValidationReport) {
    let Some(providers) = &config.providers else { return };
    for (alias, key) in &providers.aliases {
        if alias.trim().is_empty() || key.trim().is_empty() {
            report.error(
                format!("providers.aliases.{alias}"),
                "alias and provider key cannot be empty",
            );
        }
    }
    for (tool, key) in &providers.tool_defaults {
        if key.trim().is_empty() {
            report.error(format!("providers.toolDefaults.{tool}"), "provider key cannot be empty");
        }
    }
    for (class, order) in &providers.fallback {
        let path = format!("providers.fallback.{class}");
        if order.iter().all(|k| k.trim().is_empty()) {
            report.error(&path, "fallback order cannot be empty");
            continue;
        }
        let mut seen = std::collections::HashSet::new();
        for key in order {
            if !seen.insert(key.trim().to_lowercase()) {
                report.warn(&path, format!("provider '{key}' is listed more than once"));
            }
        }
    }
}

fn validate_ack(config: &ToolcastConfig, report: &mut ValidationReport) {
    let Some(ack) = &config.ack else { return };
    for (tool, raw) in &ack.templates {
        if let Err(e) = AckTemplate::parse(raw) {
            report.error(format!("ack.templates.{tool}"), e.to_string());
        }
    }
    if let Some(raw) = &ack.generic {
        match AckTemplate::parse(raw) {
            Ok(t) if t.has_slot() => report.warn(
                "ack.generic",
                "generic template has a provider slot; it is always rendered without a provider",
            ),
            Ok(_) => {}
            Err(e) => report.error("ack.generic", e.to_string()),
        }
    }
    if let Some(tools) = &ack.self_acknowledging {
        if tools.is_empty() {
            report.warn(
                "ack.selfAcknowledging",
                "no self-acknowledging tools; send_message and chat_reply will get an ACK",
            );
        }
    }
}

fn validate_tasks(config: &ToolcastConfig, report: &mut ValidationReport) {
    let Some(tasks) = &config.tasks else { return };
    if tasks.sweep_interval_secs == Some(0) {
        report.error("tasks.sweepIntervalSecs", "sweepIntervalSecs must be >= 1");
    }
    if tasks.reconciliation_ttl_secs == Some(0) {
        report.warn(
            "tasks.reconciliationTtlSecs",
            "a zero TTL expires every external job before its webhook arrives",
        );
    }
}

fn validate_logging(config: &ToolcastConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if logging.level.as_deref().is_some_and(|l| l.trim().is_empty()) {
        report.error("logging.level", "level cannot be empty");
    }
}
