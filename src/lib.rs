//! Tallyflow - Heuristics engine for suggested billable time entries
//!
//! Tallyflow transforms raw device/application activity signals into
//! suggested time entries through a deterministic pipeline: idle gap
//! detection → source classification → session grouping with confidence
//! scoring. An asynchronous ingestion orchestrator validates batches and
//! persists the suggestions as pending records awaiting human review.
//!
//! ## Modules
//!
//! - **idle**: Idle gap detection over sorted signal sequences
//! - **classifier**: Table-driven signal-to-category classification
//! - **heuristics**: Session splitting and suggested-entry synthesis
//! - **ingest**: Asynchronous batch orchestration and persistence

pub mod classifier;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod idle;
pub mod ingest;
pub mod types;

pub use classifier::{classify_signal, Classification};
pub use config::{ClassificationTables, EngineConfig};
pub use error::EngineError;
pub use heuristics::suggest_entries;
pub use idle::detect_idle_periods;
pub use ingest::{
    BatchHandle, BatchOutcome, BatchStatus, BatchStatusReport, InMemoryRecordStore,
    IngestOrchestrator, RawSignalPayload, RecordStore, RetryPolicy,
};
pub use types::{
    ActivityCategory, ActivitySession, ActivitySignal, IdlePeriod, IdleReason, InteractionKind,
    SuggestedTimeEntry,
};

/// Engine version embedded in CLI output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
