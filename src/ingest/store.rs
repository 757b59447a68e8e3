//! Record store interface
//!
//! The persisted record store is an external collaborator; the engine only
//! consumes this narrow interface: account validation and insert-only
//! creation of pending time entries. An in-memory implementation is
//! provided for tests and the CLI demo.

use crate::types::{ActivityCategory, EntryContext, EntryStatus, SuggestedTimeEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by a record store. The orchestrator treats these as
/// transient and retries the batch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Payload for a new pending time entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeEntry {
    pub account_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub activity_type: ActivityCategory,
    pub confidence: f64,
    pub context: EntryContext,
    pub description: String,
}

impl NewTimeEntry {
    pub fn from_suggestion(account_id: &str, entry: &SuggestedTimeEntry) -> Self {
        Self {
            account_id: account_id.to_string(),
            started_at: entry.started_at,
            ended_at: entry.ended_at,
            activity_type: entry.activity_type,
            confidence: entry.confidence,
            context: entry.context.clone(),
            description: entry.description.clone(),
        }
    }
}

/// Narrow persistence interface consumed from the external record store.
///
/// `create_pending_time_entry` is assumed to be an independent,
/// idempotency-unaware insert: no dedup key is enforced, so resubmitting a
/// batch creates duplicate pending rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn account_exists(&self, account_id: &str) -> Result<bool, StoreError>;

    /// Insert a pending time entry, returning the new record identifier
    async fn create_pending_time_entry(&self, entry: &NewTimeEntry) -> Result<String, StoreError>;
}

/// A time entry as held by the in-memory store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTimeEntry {
    pub id: String,
    pub status: EntryStatus,
    #[serde(flatten)]
    pub entry: NewTimeEntry,
}

#[derive(Default)]
struct Inner {
    accounts: HashSet<String>,
    entries: Vec<StoredTimeEntry>,
}

/// Insert-only in-memory record store used by tests and the CLI demo.
/// Supports injecting transient failures for retry tests.
#[derive(Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<Inner>,
    failures_remaining: AtomicU32,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_account(&self, account_id: &str) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.accounts.insert(account_id.to_string());
    }

    /// Make the next `count` inserts fail with a transient error
    pub fn fail_next_inserts(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<StoredTimeEntry> {
        self.inner.lock().expect("store lock poisoned").entries.clone()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").entries.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn account_exists(&self, account_id: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.accounts.contains(account_id))
    }

    async fn create_pending_time_entry(&self, entry: &NewTimeEntry) -> Result<String, StoreError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .failures_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StoreError::Unavailable("injected transient failure".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.entries.push(StoredTimeEntry {
            id: id.clone(),
            status: EntryStatus::Pending,
            entry: entry.clone(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityCategory;
    use chrono::TimeZone;

    fn sample_entry() -> NewTimeEntry {
        NewTimeEntry {
            account_id: "acct-1".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 0).unwrap(),
            activity_type: ActivityCategory::FocusedWork,
            confidence: 0.9,
            context: EntryContext::default(),
            description: "Focused work in vscode".to_string(),
        }
    }

    #[tokio::test]
    async fn test_account_registration() {
        let store = InMemoryRecordStore::new();
        assert!(!store.account_exists("acct-1").await.unwrap());

        store.register_account("acct-1");
        assert!(store.account_exists("acct-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_inserts_are_pending_and_independent() {
        let store = InMemoryRecordStore::new();
        let id1 = store.create_pending_time_entry(&sample_entry()).await.unwrap();
        let id2 = store.create_pending_time_entry(&sample_entry()).await.unwrap();

        // No dedup: identical payloads yield distinct rows
        assert_ne!(id1, id2);
        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == EntryStatus::Pending));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryRecordStore::new();
        store.fail_next_inserts(1);

        assert!(store.create_pending_time_entry(&sample_entry()).await.is_err());
        assert!(store.create_pending_time_entry(&sample_entry()).await.is_ok());
        assert_eq!(store.entry_count(), 1);
    }
}
