//! Config defaults: fills every runtime scalar the file left unset.

use crate::schema::{AckConfig, LoggingConfig, ServerConfig, TasksConfig, ToolcastConfig};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_WEBHOOK_QUEUE: usize = 1024;

pub const DEFAULT_ACK_MIN_DELAY_MS: u64 = 500;

pub const DEFAULT_RECONCILIATION_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TASK_RETENTION_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn apply_all_defaults(config: ToolcastConfig) -> ToolcastConfig {
    let config = apply_server_defaults(config);
    let config = apply_ack_defaults(config);
    let config = apply_task_defaults(config);
    apply_logging_defaults(config)
}

fn apply_server_defaults(mut config: ToolcastConfig) -> ToolcastConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    server.webhook_queue.get_or_insert(DEFAULT_WEBHOOK_QUEUE);
    config
}

/// Templates and the self-acknowledging list stay unset: the dispatcher's
/// built-ins apply to them.
fn apply_ack_defaults(mut config: ToolcastConfig) -> ToolcastConfig {
    let ack = config.ack.get_or_insert_with(AckConfig::default);
    ack.min_delay_ms.get_or_insert(DEFAULT_ACK_MIN_DELAY_MS);
    config
}

fn apply_task_defaults(mut config: ToolcastConfig) -> ToolcastConfig {
    let tasks = config.tasks.get_or_insert_with(TasksConfig::default);
    tasks
        .reconciliation_ttl_secs
        .get_or_insert(DEFAULT_RECONCILIATION_TTL_SECS);
    tasks.sweep_interval_secs.get_or_insert(DEFAULT_SWEEP_INTERVAL_SECS);
    tasks.task_retention_secs.get_or_insert(DEFAULT_TASK_RETENTION_SECS);
    config
}

fn apply_logging_defaults(mut config: ToolcastConfig) -> ToolcastConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.console_json.get_or_insert(false);
    config
}
