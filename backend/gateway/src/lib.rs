//! toolcast gateway
//!
//! Receives provider webhooks, serves task status, and runs the workers that
//! reconcile async jobs.

pub mod server;
pub mod webhook;
pub mod worker;

pub use server::{build_router, serve, GatewayState};
pub use webhook::{DefaultTranslator, TranslateError, WebhookTranslator, WebhookTranslators};
pub use worker::{spawn_sweeper, ReconciliationWorker};
