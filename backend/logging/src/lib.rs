//! Logging for toolcast.
//!
//! Console plus daily-rolling NDJSON file output, redaction of secrets and
//! phone numbers, and structured tool/webhook event records.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, ToolEvent};
pub use logger::{init_logger, LoggerOptions};
pub use redact::{redact_json, redact_sensitive_data};
