//! Raw signal payloads
//!
//! Wire-facing signal representation submitted by external scheduling
//! surfaces: string timestamps, optional fields. Conversion to
//! `ActivitySignal` is lenient per payload: a malformed timestamp excludes
//! that payload and records an error instead of aborting the batch.

use crate::error::EngineError;
use crate::types::{ActivitySignal, InteractionKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw signal as submitted for ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignalPayload {
    /// ISO-8601 timestamp; naive timestamps are assumed UTC
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Free-form interaction kind; unknown values degrade to unspecified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_kind: Option<String>,
}

/// A payload excluded from processing, with its position in the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalError {
    pub signal_index: usize,
    pub reason: String,
}

/// Convert a batch of raw payloads into activity signals. Payloads with
/// unparsable timestamps are dropped and reported; the rest proceed.
pub fn convert_payloads(payloads: &[RawSignalPayload]) -> (Vec<ActivitySignal>, Vec<SignalError>) {
    let mut signals = Vec::with_capacity(payloads.len());
    let mut errors = Vec::new();

    for (index, payload) in payloads.iter().enumerate() {
        match parse_timestamp(&payload.timestamp) {
            Ok(timestamp) => signals.push(ActivitySignal {
                timestamp,
                application: payload.application.clone(),
                domain: payload.domain.clone(),
                interaction_kind: parse_interaction_kind(payload.interaction_kind.as_deref()),
            }),
            Err(e) => errors.push(SignalError {
                signal_index: index,
                reason: e.to_string(),
            }),
        }
    }

    (signals, errors)
}

/// Parse an ISO-8601 timestamp into an absolute UTC instant. Offsets are
/// honored; naive timestamps are assumed UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(EngineError::TimestampError(format!(
        "unparsable timestamp: {:?}",
        raw
    )))
}

fn parse_interaction_kind(raw: Option<&str>) -> InteractionKind {
    match raw.map(|k| k.trim().to_lowercase()).as_deref() {
        Some("keyboard") => InteractionKind::Keyboard,
        Some("pointer") => InteractionKind::Pointer,
        Some("window-focus") => InteractionKind::WindowFocus,
        Some("messaging") => InteractionKind::Messaging,
        _ => InteractionKind::Unspecified,
    }
}

/// Parse newline-delimited JSON payloads (one per line)
pub fn parse_ndjson(input: &str) -> Result<Vec<RawSignalPayload>, serde_json::Error> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Parse a JSON array of payloads
pub fn parse_array(input: &str) -> Result<Vec<RawSignalPayload>, serde_json::Error> {
    serde_json::from_str(input)
}
