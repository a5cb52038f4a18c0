//! ACK ("working on it") messages for tool batches.
//!
//! ACK text is computed from the complete batch before any tool runs, so
//! dedup and collapse see the whole set rather than completion order.

pub mod dispatcher;
pub mod template;

pub use dispatcher::{AckDispatcher, DEFAULT_GENERIC_TEMPLATE, DEFAULT_SELF_ACKNOWLEDGING};
pub use template::{AckTemplate, TemplateError, PROVIDER_SLOT};
