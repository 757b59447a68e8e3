//! Batch state machine and outcomes
//!
//! A submitted batch progresses `queued → running → {succeeded |
//! partially-succeeded | failed}`. The terminal outcome carries the counts
//! and lists consumed by the polling interface.

use crate::ingest::payload::SignalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle identifying a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchHandle(pub Uuid);

impl fmt::Display for BatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Processing state of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchStatus {
    Queued,
    Running,
    Succeeded,
    PartiallySucceeded,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Succeeded | BatchStatus::PartiallySucceeded | BatchStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Queued => "queued",
            BatchStatus::Running => "running",
            BatchStatus::Succeeded => "succeeded",
            BatchStatus::PartiallySucceeded => "partially-succeeded",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Low-confidence suggestion surfaced for prioritized human review. The
/// entry is persisted regardless; verification is advisory, not a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationItem {
    pub confidence: f64,
    pub reason: String,
    pub description: String,
}

/// Structured terminal outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Suggestions produced by the heuristics engine
    pub suggested_count: usize,
    /// Pending entries actually persisted (at-least-once; may exceed
    /// `suggested_count` after retries)
    pub created_count: usize,
    pub created_ids: Vec<String>,
    pub verification_required: Vec<VerificationItem>,
    pub errors: Vec<SignalError>,
}

/// Status plus terminal outcome, as returned by the polling interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatusReport {
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<BatchOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&BatchStatus::PartiallySucceeded).unwrap();
        assert_eq!(json, "\"partially-succeeded\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BatchStatus::Queued.is_terminal());
        assert!(!BatchStatus::Running.is_terminal());
        assert!(BatchStatus::Succeeded.is_terminal());
        assert!(BatchStatus::PartiallySucceeded.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
    }

    #[test]
    fn test_report_omits_missing_outcome() {
        let report = BatchStatusReport {
            status: BatchStatus::Running,
            outcome: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, "{\"status\":\"running\"}");
    }
}
