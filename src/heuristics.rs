//! Activity heuristics engine
//!
//! Combines idle gap detection and source classification: splits the signal
//! stream into sessions at break boundaries, scores each session's
//! classification consistency, and emits one suggested time entry per
//! session.

use crate::classifier::classify_signal;
use crate::config::{normalize_application, normalize_domain, EngineConfig};
use crate::idle::detect_idle_periods;
use crate::types::{
    ActivityCategory, ActivitySession, ActivitySignal, EntryContext, IdlePeriod, IdleReason,
    SuggestedTimeEntry,
};
use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};

/// Minimum entry duration. A session whose first and last signal coincide
/// (single signal) is padded so `ended_at > started_at` always holds.
const MIN_ENTRY_DURATION_MINUTES: i64 = 1;

/// Produce an ordered list of suggested time entries from a raw signal
/// sequence. Input order does not matter; signals are sorted internally.
/// An empty input yields an empty output list.
pub fn suggest_entries(
    signals: Vec<ActivitySignal>,
    config: &EngineConfig,
) -> Vec<SuggestedTimeEntry> {
    if signals.is_empty() {
        return Vec::new();
    }

    let (sorted, idle_periods) = detect_idle_periods(signals, config);
    let sessions = split_sessions(sorted, &idle_periods);

    sessions
        .iter()
        .map(|session| score_session(session, config))
        .collect()
}

/// Split a sorted signal sequence into sessions: a new session starts
/// immediately after every break-level idle period; mergeable idle periods
/// stay inside the current session.
pub fn split_sessions(
    sorted: Vec<ActivitySignal>,
    idle_periods: &[IdlePeriod],
) -> Vec<ActivitySession> {
    if sorted.is_empty() {
        return Vec::new();
    }

    let mut breaks = idle_periods
        .iter()
        .filter(|p| p.reason == IdleReason::BreakDetected)
        .peekable();

    let mut sessions = Vec::new();
    let mut current: Vec<ActivitySignal> = Vec::new();

    for signal in sorted {
        if let Some(last) = current.last() {
            // Idle periods are emitted in order from the same sorted pairs,
            // so the next break either matches this pair or a later one.
            let is_break = breaks
                .peek()
                .is_some_and(|b| b.start == last.timestamp && b.end == signal.timestamp);
            if is_break {
                breaks.next();
                sessions.push(ActivitySession {
                    signals: std::mem::take(&mut current),
                });
            }
        }
        current.push(signal);
    }

    if !current.is_empty() {
        sessions.push(ActivitySession { signals: current });
    }

    sessions
}

/// Score one session and synthesize its suggested entry.
///
/// `consistency` is the share of signals matching the dominant category;
/// `confidence = consistency × base_confidence[dominant]`, clamped to
/// [0, 1] to tolerate future multiplier changes. A single-signal session
/// has consistency 1.0 by definition.
pub fn score_session(session: &ActivitySession, config: &EngineConfig) -> SuggestedTimeEntry {
    let mut category_counts: BTreeMap<ActivityCategory, u32> = BTreeMap::new();
    for signal in &session.signals {
        let classification = classify_signal(signal, &config.tables);
        *category_counts.entry(classification.category).or_insert(0) += 1;
    }

    let dominant = dominant_category(&category_counts);
    let total = session.len() as f64;
    let matching = category_counts.get(&dominant).copied().unwrap_or(0) as f64;
    let consistency = matching / total;
    let confidence = (consistency * dominant.base_confidence()).clamp(0.0, 1.0);

    let context = build_context(session, &category_counts);
    let description = describe_session(session, dominant, &context);

    let started_at = session.started_at();
    let mut ended_at = session.ended_at();
    if ended_at <= started_at {
        ended_at = started_at + Duration::minutes(MIN_ENTRY_DURATION_MINUTES);
    }

    SuggestedTimeEntry {
        started_at,
        ended_at,
        activity_type: dominant,
        confidence,
        context,
        description,
        should_verify: confidence < config.verify_confidence_threshold,
    }
}

/// Pick the category with the most signals; ties break toward the category
/// listed earliest in the fixed order (highest base confidence), which is
/// exactly the enum's derived ordering.
fn dominant_category(counts: &BTreeMap<ActivityCategory, u32>) -> ActivityCategory {
    let max = counts.values().copied().max().unwrap_or(0);
    counts
        .iter()
        .filter(|(_, &count)| count == max)
        .map(|(&category, _)| category)
        .min()
        .unwrap_or(ActivityCategory::Personal)
}

fn build_context(
    session: &ActivitySession,
    category_counts: &BTreeMap<ActivityCategory, u32>,
) -> EntryContext {
    let mut applications = BTreeSet::new();
    let mut domains = BTreeSet::new();

    for signal in &session.signals {
        if let Some(app) = signal.application.as_deref() {
            let app = normalize_application(app);
            if !app.is_empty() {
                applications.insert(app);
            }
        }
        if let Some(domain) = signal.domain.as_deref() {
            let domain = normalize_domain(domain);
            if !domain.is_empty() {
                domains.insert(domain);
            }
        }
    }

    EntryContext {
        applications: applications.into_iter().collect(),
        domains: domains.into_iter().collect(),
        category_counts: category_counts
            .iter()
            .map(|(category, &count)| (category.as_str().to_string(), count))
            .collect(),
    }
}

/// Short templated synthesis naming the dominant application or domain,
/// e.g. "Focused work in vscode" or "Research on github.com".
fn describe_session(
    session: &ActivitySession,
    dominant: ActivityCategory,
    context: &EntryContext,
) -> String {
    if dominant == ActivityCategory::Research {
        if let Some(domain) = most_frequent(session.signals.iter().filter_map(|s| {
            s.domain.as_deref().map(normalize_domain).filter(|d| !d.is_empty())
        })) {
            return format!("{} on {}", dominant.label(), domain);
        }
    }

    if let Some(app) = most_frequent(session.signals.iter().filter_map(|s| {
        s.application
            .as_deref()
            .map(normalize_application)
            .filter(|a| !a.is_empty())
    })) {
        return format!("{} in {}", dominant.label(), app);
    }

    if let Some(domain) = context.domains.first() {
        return format!("{} on {}", dominant.label(), domain);
    }

    dominant.label().to_string()
}

/// Most frequent value in the iterator; ties break lexicographically for
/// deterministic output.
fn most_frequent<I: Iterator<Item = String>>(values: I) -> Option<String> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(value, _)| value)
}
