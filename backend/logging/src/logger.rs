//! Subscriber setup.
//!
//! `RUST_LOG` wins over the configured level. With a log directory, NDJSON
//! records also go to `<dir>/toolcast.log.YYYY-MM-DD`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_PREFIX: &str = "toolcast.log";

#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub level: String,
    pub dir: Option<PathBuf>,
    /// Console lines as JSON (for container log collectors). Console output goes to stderr.
    pub console_json: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            console_json: false,
        }
    }
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init_logger(options: &LoggerOptions) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .with_context(|| format!("invalid log level '{}'", options.level))?;

    let console_layer = if options.console_json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
            .boxed()
    };

    let file_layer = match &options.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(appender)
                    .with_ansi(false)
                    .boxed(),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_level_without_env() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let options = LoggerOptions {
            level: "toolcast=loudest".to_string(),
            ..Default::default()
        };
        assert!(init_logger(&options).is_err());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let options = LoggerOptions::default();
        assert!(init_logger(&options).is_ok());
        assert!(init_logger(&options).is_ok());
    }
}
