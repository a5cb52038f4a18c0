//! Async task lifecycle: the task store, external job correlation, and the
//! accept/callback facade async tools and the webhook worker share.

pub mod jobs;
pub mod reconcile;
pub mod store;

pub use jobs::{AsyncJobs, CallbackOutcome, ExternalCallback};
pub use reconcile::{ReconciliationEntry, ReconciliationMap, DEFAULT_RECONCILIATION_TTL};
pub use store::{Task, TaskEvent, TaskOrigin, TaskStatus, TaskStore, CANCELLED};
