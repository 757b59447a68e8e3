//! Core types for the tallyflow pipeline
//!
//! This module defines the data structures that flow through each stage of
//! the pipeline: raw activity signals, idle periods, sessions, and suggested
//! time entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of interaction captured by a device agent or integration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    Keyboard,
    Pointer,
    WindowFocus,
    Messaging,
    #[default]
    Unspecified,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Keyboard => "keyboard",
            InteractionKind::Pointer => "pointer",
            InteractionKind::WindowFocus => "window-focus",
            InteractionKind::Messaging => "messaging",
            InteractionKind::Unspecified => "unspecified",
        }
    }
}

/// One observed activity event, produced entirely by external collaborators
/// (device agents, calendar/chat sync). Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySignal {
    /// Absolute UTC instant of the observation
    pub timestamp: DateTime<Utc>,
    /// Application identifier, if known (e.g. "vscode", "zoom")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// Browser domain, present for browser signals (e.g. "github.com")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Interaction kind, defaulting to unspecified
    #[serde(default)]
    pub interaction_kind: InteractionKind,
}

/// Why an idle period was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdleReason {
    /// Gap reached the idle threshold but stays inside a session
    InactivityThreshold,
    /// Gap exceeded the merge threshold and terminates the session
    BreakDetected,
}

/// A detected gap between consecutive signals. Ephemeral; computed per
/// request and never persisted independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdlePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub idle_minutes: f64,
    pub reason: IdleReason,
}

/// An ordered, contiguous, non-empty group of signals bounded by
/// break-classified idle periods (or the start/end of the input).
///
/// Invariant: signals are sorted ascending by timestamp and no two
/// consecutive signals are separated by a break-level gap. Mergeable idle
/// periods may occur inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySession {
    pub signals: Vec<ActivitySignal>,
}

impl ActivitySession {
    /// Timestamp of the first signal in the session
    pub fn started_at(&self) -> DateTime<Utc> {
        self.signals[0].timestamp
    }

    /// Timestamp of the last signal in the session
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.signals[self.signals.len() - 1].timestamp
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Activity category inferred for a signal or session.
///
/// The declaration order is significant: categories are listed from highest
/// to lowest base confidence, and dominant-category ties are broken toward
/// the earliest entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityCategory {
    FocusedWork,
    Meeting,
    Research,
    Communication,
    Admin,
    Personal,
    Idle,
}

impl ActivityCategory {
    /// All categories in tie-break order (highest base confidence first)
    pub const ALL: [ActivityCategory; 7] = [
        ActivityCategory::FocusedWork,
        ActivityCategory::Meeting,
        ActivityCategory::Research,
        ActivityCategory::Communication,
        ActivityCategory::Admin,
        ActivityCategory::Personal,
        ActivityCategory::Idle,
    ];

    /// Base confidence multiplier applied to session consistency
    pub fn base_confidence(&self) -> f64 {
        match self {
            ActivityCategory::FocusedWork => 0.90,
            ActivityCategory::Meeting => 0.85,
            ActivityCategory::Research => 0.75,
            ActivityCategory::Communication => 0.70,
            ActivityCategory::Admin => 0.60,
            ActivityCategory::Personal => 0.40,
            ActivityCategory::Idle => 0.00,
        }
    }

    /// Work-related is true for every category except personal and idle
    pub fn is_work_related(&self) -> bool {
        !matches!(self, ActivityCategory::Personal | ActivityCategory::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::FocusedWork => "focused-work",
            ActivityCategory::Meeting => "meeting",
            ActivityCategory::Research => "research",
            ActivityCategory::Communication => "communication",
            ActivityCategory::Admin => "admin",
            ActivityCategory::Personal => "personal",
            ActivityCategory::Idle => "idle",
        }
    }

    /// Human-readable label used in entry descriptions
    pub fn label(&self) -> &'static str {
        match self {
            ActivityCategory::FocusedWork => "Focused work",
            ActivityCategory::Meeting => "Meeting",
            ActivityCategory::Research => "Research",
            ActivityCategory::Communication => "Communication",
            ActivityCategory::Admin => "Administrative work",
            ActivityCategory::Personal => "Personal time",
            ActivityCategory::Idle => "Idle",
        }
    }
}

/// Structured context carried alongside a suggested entry: what was seen
/// during the session, aggregated for the reviewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryContext {
    /// Distinct applications observed, sorted
    pub applications: Vec<String>,
    /// Distinct domains observed, sorted
    pub domains: Vec<String>,
    /// Signal counts per classified category
    pub category_counts: BTreeMap<String, u32>,
}

/// The engine's output unit: a candidate billing segment awaiting review.
/// Ephemeral until the ingestion orchestrator persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTimeEntry {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub activity_type: ActivityCategory,
    /// Classification reliability in [0.0, 1.0]
    pub confidence: f64,
    pub context: EntryContext,
    /// Short human-readable synthesis of the session
    pub description: String,
    /// Advisory flag, true iff confidence fell below the verify threshold
    pub should_verify: bool,
}

impl SuggestedTimeEntry {
    /// Deterministic fingerprint for idempotency-aware stores:
    /// account + minute-rounded bounds + category. The engine itself does
    /// not dedupe; resubmitting a batch creates independent pending rows.
    pub fn fingerprint(&self, account_id: &str) -> String {
        format!(
            "{}:{}:{}:{}",
            account_id,
            self.started_at.format("%Y-%m-%dT%H:%M"),
            self.ended_at.format("%Y-%m-%dT%H:%M"),
            self.activity_type.as_str(),
        )
    }
}

/// Lifecycle state of a persisted time entry. Transitions are driven by
/// external collaborators (reviewer, billing run); this engine only ever
/// creates records in the pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
    Billed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ActivityCategory::FocusedWork).unwrap();
        assert_eq!(json, "\"focused-work\"");

        let parsed: ActivityCategory = serde_json::from_str("\"research\"").unwrap();
        assert_eq!(parsed, ActivityCategory::Research);
    }

    #[test]
    fn test_interaction_kind_serialization() {
        let json = serde_json::to_string(&InteractionKind::WindowFocus).unwrap();
        assert_eq!(json, "\"window-focus\"");
    }

    #[test]
    fn test_category_order_matches_base_confidence() {
        // Tie-break order must run from highest to lowest base confidence
        for pair in ActivityCategory::ALL.windows(2) {
            assert!(pair[0].base_confidence() >= pair[1].base_confidence());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_work_related_flags() {
        assert!(ActivityCategory::FocusedWork.is_work_related());
        assert!(ActivityCategory::Admin.is_work_related());
        assert!(!ActivityCategory::Personal.is_work_related());
        assert!(!ActivityCategory::Idle.is_work_related());
    }

    #[test]
    fn test_signal_deserialization_defaults() {
        let json = r#"{"timestamp": "2024-03-04T09:00:00Z"}"#;
        let signal: ActivitySignal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.application, None);
        assert_eq!(signal.domain, None);
        assert_eq!(signal.interaction_kind, InteractionKind::Unspecified);
    }

    #[test]
    fn test_fingerprint_rounds_to_minute() {
        let entry = SuggestedTimeEntry {
            started_at: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 42).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2024, 3, 4, 9, 30, 17).unwrap(),
            activity_type: ActivityCategory::Meeting,
            confidence: 0.85,
            context: EntryContext::default(),
            description: "Meeting in zoom".to_string(),
            should_verify: false,
        };

        assert_eq!(
            entry.fingerprint("acct-1"),
            "acct-1:2024-03-04T09:00:2024-03-04T09:30:meeting"
        );

        // Seconds within the same minute do not change the fingerprint
        let mut shifted = entry.clone();
        shifted.started_at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 5).unwrap();
        assert_eq!(entry.fingerprint("acct-1"), shifted.fingerprint("acct-1"));
    }
}
