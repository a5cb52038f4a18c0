//! External job id → local task id correlation.
//!
//! A provider acknowledges an async job with its own id; the completion
//! webhook later carries only that id. Entries are single-use: resolving one
//! removes it, so a duplicate delivery finds nothing.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_RECONCILIATION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct ReconciliationEntry {
    pub external_id: String,
    pub local_task_id: String,
    pub created_at: Instant,
}

impl ReconciliationEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

pub struct ReconciliationMap {
    entries: Mutex<HashMap<String, ReconciliationEntry>>,
    ttl: Duration,
}

impl ReconciliationMap {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_RECONCILIATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record `external_id` → `local_task_id`. An older entry for the same
    /// external id is replaced; its local id is returned.
    pub async fn register_external(
        &self,
        external_id: impl Into<String>,
        local_task_id: impl Into<String>,
    ) -> Option<String> {
        let external_id = external_id.into();
        let entry = ReconciliationEntry {
            external_id: external_id.clone(),
            local_task_id: local_task_id.into(),
            created_at: Instant::now(),
        };
        debug!(external_id = %external_id, task_id = %entry.local_task_id, "External job registered");
        let previous = self.entries.lock().await.insert(external_id.clone(), entry);
        previous.map(|old| {
            info!(external_id = %external_id, replaced = %old.local_task_id, "External job re-registered");
            old.local_task_id
        })
    }

    /// Remove and return the local task id for `external_id`. Expired entries
    /// are reported as absent and left for `take_expired`. Of several
    /// concurrent callers for the same id, at most one gets `Some`.
    pub async fn resolve_external(&self, external_id: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(external_id)?;
        if entry.is_expired(self.ttl) {
            debug!(external_id = %external_id, task_id = %entry.local_task_id, "Reconciliation entry expired");
            return None;
        }
        entries.remove(external_id).map(|e| e.local_task_id)
    }

    /// Whether a live entry exists, without consuming it.
    pub async fn contains(&self, external_id: &str) -> bool {
        self.entries
            .lock()
            .await
            .get(external_id)
            .is_some_and(|e| !e.is_expired(self.ttl))
    }

    /// Remove and return every entry older than the TTL.
    pub async fn take_expired(&self) -> Vec<ReconciliationEntry> {
        let mut entries = self.entries.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        let taken: Vec<ReconciliationEntry> = expired
            .iter()
            .filter_map(|id| entries.remove(id))
            .collect();
        if !taken.is_empty() {
            info!(removed = taken.len(), "Swept expired reconciliation entries");
        }
        taken
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for ReconciliationMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolve_is_single_use() {
        let map = ReconciliationMap::new();
        map.register_external("ext-1", "task-1").await;
        assert!(map.contains("ext-1").await);
        assert_eq!(map.resolve_external("ext-1").await.as_deref(), Some("task-1"));
        assert_eq!(map.resolve_external("ext-1").await, None);
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_id_resolves_to_none() {
        let map = ReconciliationMap::new();
        assert_eq!(map.resolve_external("nope").await, None);
    }

    #[tokio::test]
    async fn test_register_replaces_older_entry() {
        let map = ReconciliationMap::new();
        assert_eq!(map.register_external("ext-1", "task-1").await, None);
        assert_eq!(
            map.register_external("ext-1", "task-2").await.as_deref(),
            Some("task-1")
        );
        assert_eq!(map.len().await, 1);
        assert_eq!(map.resolve_external("ext-1").await.as_deref(), Some("task-2"));
    }

    #[tokio::test]
    async fn test_concurrent_resolvers_single_winner() {
        let map = Arc::new(ReconciliationMap::new());
        map.register_external("ext-1", "task-1").await;
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let map = Arc::clone(&map);
                tokio::spawn(async move { map.resolve_external("ext-1").await })
            })
            .collect();
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let map = ReconciliationMap::with_ttl(Duration::ZERO);
        map.register_external("ext-1", "task-1").await;
        assert!(!map.contains("ext-1").await);
        assert_eq!(map.resolve_external("ext-1").await, None);

        map.register_external("ext-2", "task-2").await;
        let mut taken: Vec<String> = map
            .take_expired()
            .await
            .into_iter()
            .map(|e| e.local_task_id)
            .collect();
        taken.sort();
        assert_eq!(taken, vec!["task-1", "task-2"]);
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let map = ReconciliationMap::new();
        map.register_external("ext-1", "task-1").await;
        assert!(map.take_expired().await.is_empty());
        assert_eq!(map.len().await, 1);
    }
}
