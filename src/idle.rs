//! Idle gap detection
//!
//! Pure first stage of the pipeline: sorts a signal sequence by timestamp
//! and reports every inter-signal gap that reaches the idle threshold,
//! classifying each as mergeable (stays inside a session) or break-level
//! (terminates the session).

use crate::config::EngineConfig;
use crate::types::{ActivitySignal, IdlePeriod, IdleReason};

/// Sort signals ascending by timestamp and detect idle periods between
/// consecutive pairs.
///
/// Boundary semantics: a gap of exactly `idle_threshold_minutes` is
/// reported; the reason is `break-detected` only for gaps strictly above
/// `max_merge_idle_minutes`, so a gap of exactly the merge threshold stays
/// mergeable. Gaps below the idle threshold are normal intra-session
/// spacing and are not reported at all.
///
/// Fewer than two signals yields an empty idle-period list; this is not an
/// error.
pub fn detect_idle_periods(
    mut signals: Vec<ActivitySignal>,
    config: &EngineConfig,
) -> (Vec<ActivitySignal>, Vec<IdlePeriod>) {
    signals.sort_by_key(|s| s.timestamp);

    if signals.len() < 2 {
        return (signals, Vec::new());
    }

    let mut periods = Vec::new();

    for pair in signals.windows(2) {
        let gap_minutes =
            (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 60_000.0;

        if gap_minutes >= config.idle_threshold_minutes {
            let reason = if gap_minutes > config.max_merge_idle_minutes {
                IdleReason::BreakDetected
            } else {
                IdleReason::InactivityThreshold
            };

            periods.push(IdlePeriod {
                start: pair[0].timestamp,
                end: pair[1].timestamp,
                idle_minutes: gap_minutes,
                reason,
            });
        }
    }

    (signals, periods)
}
