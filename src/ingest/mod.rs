//! Ingestion orchestration
//!
//! The only stateful, asynchronous component: validates the owning account,
//! normalizes payload timestamps, runs the heuristics engine, and persists
//! the resulting suggestions as pending time entries through the record
//! store interface. Persistence is retried as a whole batch with
//! exponential backoff; entries committed before a failure are not rolled
//! back (at-least-once).

pub mod batch;
pub mod payload;
pub mod store;

pub use batch::{BatchHandle, BatchOutcome, BatchStatus, BatchStatusReport, VerificationItem};
pub use payload::{convert_payloads, parse_array, parse_ndjson, RawSignalPayload, SignalError};
pub use store::{InMemoryRecordStore, NewTimeEntry, RecordStore, StoreError};

use crate::config::EngineConfig;
use crate::heuristics::suggest_entries;
use crate::types::SuggestedTimeEntry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Retry and timeout policy for the persistence step
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum whole-batch persistence attempts
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt
    pub initial_backoff: Duration,
    /// Bound on each individual store call
    pub store_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(60),
            store_timeout: Duration::from_secs(30),
        }
    }
}

/// Asynchronous ingestion orchestrator.
///
/// Each submitted batch is processed as an independent unit of work on the
/// tokio runtime. Multiple batches for the same account may run
/// concurrently; the store is written via simple inserts, so concurrent
/// batches cannot corrupt each other, only produce overlapping ranges.
/// There is no cancellation primitive once a batch has started.
pub struct IngestOrchestrator {
    store: Arc<dyn RecordStore>,
    config: Arc<EngineConfig>,
    retry: RetryPolicy,
    batches: Arc<RwLock<HashMap<Uuid, BatchStatusReport>>>,
}

impl IngestOrchestrator {
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Self {
        Self::with_retry_policy(store, config, RetryPolicy::default())
    }

    pub fn with_retry_policy(
        store: Arc<dyn RecordStore>,
        config: EngineConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            retry,
            batches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Submit a batch of raw signal payloads for one account. Returns an
    /// opaque handle immediately; processing happens on a spawned task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn submit(
        &self,
        account_id: impl Into<String>,
        payloads: Vec<RawSignalPayload>,
    ) -> BatchHandle {
        let id = Uuid::new_v4();
        let account_id = account_id.into();

        self.batches.write().await.insert(
            id,
            BatchStatusReport {
                status: BatchStatus::Queued,
                outcome: None,
            },
        );

        tracing::info!(batch = %id, account = %account_id, payloads = payloads.len(), "batch submitted");

        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let retry = self.retry.clone();
        let batches = Arc::clone(&self.batches);

        tokio::spawn(async move {
            run_batch(store, config, retry, batches, id, account_id, payloads).await;
        });

        BatchHandle(id)
    }

    /// Poll the status of a submitted batch. Terminal reports carry the
    /// structured outcome.
    pub async fn status(&self, handle: &BatchHandle) -> Option<BatchStatusReport> {
        self.batches.read().await.get(&handle.0).cloned()
    }
}

async fn run_batch(
    store: Arc<dyn RecordStore>,
    config: Arc<EngineConfig>,
    retry: RetryPolicy,
    batches: Arc<RwLock<HashMap<Uuid, BatchStatusReport>>>,
    id: Uuid,
    account_id: String,
    payloads: Vec<RawSignalPayload>,
) {
    set_status(&batches, id, BatchStatus::Running, None).await;

    // Step 1: account validation. A missing account aborts the whole batch
    // before any persistence attempt.
    match store.account_exists(&account_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(batch = %id, account = %account_id, "unknown account, batch failed");
            set_status(&batches, id, BatchStatus::Failed, Some(BatchOutcome::default())).await;
            return;
        }
        Err(e) => {
            tracing::error!(batch = %id, account = %account_id, error = %e, "account validation failed");
            set_status(&batches, id, BatchStatus::Failed, Some(BatchOutcome::default())).await;
            return;
        }
    }

    // Step 2: per-payload timestamp normalization; bad payloads are
    // recorded, not fatal.
    let (signals, errors) = convert_payloads(&payloads);
    if !errors.is_empty() {
        tracing::warn!(batch = %id, excluded = errors.len(), "payloads excluded from batch");
    }

    // Step 3: the pure pipeline.
    let suggestions = suggest_entries(signals, &config);

    let verification_required = suggestions
        .iter()
        .filter(|s| s.should_verify)
        .map(|s| VerificationItem {
            confidence: s.confidence,
            reason: format!(
                "confidence {:.2} below threshold {:.2}",
                s.confidence, config.verify_confidence_threshold
            ),
            description: s.description.clone(),
        })
        .collect::<Vec<_>>();

    // Step 4: persistence with whole-batch retry.
    let mut created_ids: Vec<String> = Vec::new();
    let mut attempt = 1u32;
    let mut backoff = retry.initial_backoff;
    let persisted = loop {
        match persist_all(&*store, &retry, &account_id, &suggestions).await {
            Ok(ids) => {
                created_ids.extend(ids);
                break true;
            }
            Err((committed, reason)) => {
                // At-least-once: rows committed before the failure stay.
                created_ids.extend(committed);

                if attempt >= retry.max_attempts {
                    tracing::error!(
                        batch = %id,
                        attempts = attempt,
                        reason = %reason,
                        "persistence retries exhausted, batch failed"
                    );
                    break false;
                }

                tracing::warn!(
                    batch = %id,
                    attempt,
                    backoff_secs = backoff.as_secs_f64(),
                    reason = %reason,
                    "persistence attempt failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
        }
    };

    let outcome = BatchOutcome {
        suggested_count: suggestions.len(),
        created_count: created_ids.len(),
        created_ids,
        verification_required,
        errors,
    };

    // Step 5: terminal status.
    let status = if !persisted {
        BatchStatus::Failed
    } else if outcome.errors.is_empty() {
        BatchStatus::Succeeded
    } else {
        BatchStatus::PartiallySucceeded
    };

    tracing::info!(
        batch = %id,
        status = status.as_str(),
        suggested = outcome.suggested_count,
        created = outcome.created_count,
        needs_verification = outcome.verification_required.len(),
        "batch finished"
    );

    set_status(&batches, id, status, Some(outcome)).await;
}

/// Persist every suggestion as a pending entry. On the first failure,
/// returns the identifiers already committed plus the failure reason; the
/// caller retries the whole batch.
async fn persist_all(
    store: &dyn RecordStore,
    retry: &RetryPolicy,
    account_id: &str,
    suggestions: &[SuggestedTimeEntry],
) -> Result<Vec<String>, (Vec<String>, String)> {
    let mut created = Vec::with_capacity(suggestions.len());

    for suggestion in suggestions {
        let entry = NewTimeEntry::from_suggestion(account_id, suggestion);
        let call = store.create_pending_time_entry(&entry);

        match tokio::time::timeout(retry.store_timeout, call).await {
            Ok(Ok(record_id)) => created.push(record_id),
            Ok(Err(e)) => return Err((created, e.to_string())),
            Err(_) => {
                return Err((
                    created,
                    format!("store call timed out after {} ms", retry.store_timeout.as_millis()),
                ))
            }
        }
    }

    Ok(created)
}

async fn set_status(
    batches: &RwLock<HashMap<Uuid, BatchStatusReport>>,
    id: Uuid,
    status: BatchStatus,
    outcome: Option<BatchOutcome>,
) {
    let mut guard = batches.write().await;
    guard.insert(id, BatchStatusReport { status, outcome });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityCategory;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            store_timeout: Duration::from_millis(500),
        }
    }

    fn payload(timestamp: &str, app: &str) -> RawSignalPayload {
        RawSignalPayload {
            timestamp: timestamp.to_string(),
            application: Some(app.to_string()),
            domain: None,
            interaction_kind: Some("keyboard".to_string()),
        }
    }

    fn editor_batch() -> Vec<RawSignalPayload> {
        vec![
            payload("2024-03-04T09:00:00Z", "vscode"),
            payload("2024-03-04T09:02:00Z", "vscode"),
            payload("2024-03-04T09:04:00Z", "vscode"),
        ]
    }

    async fn wait_terminal(
        orchestrator: &IngestOrchestrator,
        handle: &BatchHandle,
    ) -> BatchStatusReport {
        for _ in 0..200 {
            if let Some(report) = orchestrator.status(handle).await {
                if report.status.is_terminal() {
                    return report;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("batch did not reach a terminal state");
    }

    fn orchestrator_with_store() -> (IngestOrchestrator, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        store.register_account("acct-1");
        let orchestrator = IngestOrchestrator::with_retry_policy(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            EngineConfig::default(),
            fast_retry(),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_successful_batch() {
        let (orchestrator, store) = orchestrator_with_store();

        let handle = orchestrator.submit("acct-1", editor_batch()).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        assert_eq!(report.status, BatchStatus::Succeeded);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.suggested_count, 1);
        assert_eq!(outcome.created_count, 1);
        assert_eq!(outcome.created_ids.len(), 1);
        assert!(outcome.verification_required.is_empty());
        assert!(outcome.errors.is_empty());

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.account_id, "acct-1");
        assert_eq!(entries[0].entry.activity_type, ActivityCategory::FocusedWork);
    }

    #[tokio::test]
    async fn test_unknown_account_fails_without_persistence() {
        let (orchestrator, store) = orchestrator_with_store();

        let handle = orchestrator.submit("acct-unknown", editor_batch()).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        assert_eq!(report.status, BatchStatus::Failed);
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_payload_recorded_batch_continues() {
        let (orchestrator, store) = orchestrator_with_store();

        let mut payloads = editor_batch();
        payloads.insert(1, payload("not-a-timestamp", "vscode"));
        let handle = orchestrator.submit("acct-1", payloads).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        assert_eq!(report.status, BatchStatus::PartiallySucceeded);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].signal_index, 1);
        assert_eq!(outcome.created_count, 1);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let (orchestrator, store) = orchestrator_with_store();
        store.fail_next_inserts(1);

        let handle = orchestrator.submit("acct-1", editor_batch()).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        // First attempt fails, second succeeds
        assert_eq!(report.status, BatchStatus::Succeeded);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_marks_failed() {
        let (orchestrator, store) = orchestrator_with_store();
        // Three attempts, every insert fails
        store.fail_next_inserts(10);

        let handle = orchestrator.submit("acct-1", editor_batch()).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        assert_eq!(report.status, BatchStatus::Failed);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.suggested_count, 1);
        assert_eq!(outcome.created_count, 0);
    }

    #[tokio::test]
    async fn test_low_confidence_surfaced_but_persisted() {
        let (orchestrator, store) = orchestrator_with_store();

        // One editor + one leisure-browser signal: confidence 0.45
        let payloads = vec![
            payload("2024-03-04T09:00:00Z", "vscode"),
            RawSignalPayload {
                timestamp: "2024-03-04T09:01:00Z".to_string(),
                application: Some("chrome".to_string()),
                domain: Some("cat-pictures.net".to_string()),
                interaction_kind: Some("pointer".to_string()),
            },
        ];
        let handle = orchestrator.submit("acct-1", payloads).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        assert_eq!(report.status, BatchStatus::Succeeded);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.verification_required.len(), 1);
        assert!((outcome.verification_required[0].confidence - 0.45).abs() < 1e-9);
        // Verification is advisory, not a gate
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_resubmission_creates_duplicates() {
        let (orchestrator, store) = orchestrator_with_store();

        let first = orchestrator.submit("acct-1", editor_batch()).await;
        wait_terminal(&orchestrator, &first).await;
        let second = orchestrator.submit("acct-1", editor_batch()).await;
        wait_terminal(&orchestrator, &second).await;

        // No dedup key: two independent sets of pending rows
        assert_eq!(store.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds_with_zero_counts() {
        let (orchestrator, store) = orchestrator_with_store();

        let handle = orchestrator.submit("acct-1", Vec::new()).await;
        let report = wait_terminal(&orchestrator, &handle).await;

        assert_eq!(report.status, BatchStatus::Succeeded);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.suggested_count, 0);
        assert_eq!(outcome.created_count, 0);
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_handle_has_no_status() {
        let (orchestrator, _) = orchestrator_with_store();
        let bogus = BatchHandle(Uuid::new_v4());
        assert!(orchestrator.status(&bogus).await.is_none());
    }
}
