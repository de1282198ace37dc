//! Data models for the stream aggregator.
//!
//! This module contains the core data structures used throughout
//! the application for representing event records, worker lifecycle
//! states, and run summaries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of an event record, carried on the wire as the `type` field.
///
/// The analysis engine is free to introduce new stage vocabulary; unknown
/// kinds round-trip untouched through [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Lifecycle notice about the request itself.
    Info,
    /// The upstream analysis entered a new phase.
    PhaseStart,
    /// Intermediate progress from the upstream analysis.
    Progress,
    /// A target's analysis failed.
    Error,
    /// Terminal record: the whole request is finished. Emitted exactly once.
    Done,
    /// Any other kind the upstream emits.
    Other(String),
}

impl EventKind {
    /// Returns the wire-level name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Info => "info",
            EventKind::PhaseStart => "phase_start",
            EventKind::Progress => "progress",
            EventKind::Error => "error",
            EventKind::Done => "done",
            EventKind::Other(s) => s,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "info" => EventKind::Info,
            "phase_start" => EventKind::PhaseStart,
            "progress" => EventKind::Progress,
            "error" => EventKind::Error,
            "done" => EventKind::Done,
            _ => EventKind::Other(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A single event record flowing through the aggregator.
///
/// Records arrive untagged from the analysis engine; the worker attaches
/// `target` before forwarding. The initial `info` notice and the terminal
/// `done` record describe the whole request and carry no target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Kind of the record (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Target URL this record originated from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Stage of the upstream analysis state machine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Opaque payload concluding one target's analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<Value>,
}

impl EventRecord {
    /// Creates an untagged lifecycle notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Info,
            message: Some(message.into()),
            target: None,
            phase: None,
            final_result: None,
        }
    }

    /// Creates a tagged error record for a failed target.
    pub fn error(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            message: Some(message.into()),
            target: Some(target.into()),
            phase: None,
            final_result: None,
        }
    }

    /// Creates the terminal record that closes the stream.
    pub fn done() -> Self {
        Self {
            kind: EventKind::Done,
            message: Some("All parallel tasks completed.".to_string()),
            target: None,
            phase: None,
            final_result: None,
        }
    }

    /// Returns true for the terminal `done` record.
    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::Done
    }
}

/// Lifecycle state of one per-target worker.
///
/// `Running → Completed` when the producer's sequence ends cleanly;
/// `Running → Failed` on a producer error or interruption. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Completed,
    Failed,
}

impl WorkerState {
    /// Returns true once the worker can no longer emit records.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerState::Running)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Running => write!(f, "running"),
            WorkerState::Completed => write!(f, "completed"),
            WorkerState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome counts for one aggregation run. Not part of the wire stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Number of targets accepted.
    pub targets: usize,
    /// Workers that reached `Completed`.
    pub completed: usize,
    /// Workers that reached `Failed` (including interrupted ones).
    pub failed: usize,
}

impl RunSummary {
    /// Creates a summary for a run over `targets` targets.
    pub fn new(targets: usize) -> Self {
        Self {
            targets,
            completed: 0,
            failed: 0,
        }
    }

    /// Records one worker's terminal state.
    pub fn record(&mut self, state: WorkerState) {
        match state {
            WorkerState::Completed => self.completed += 1,
            _ => self.failed += 1,
        }
    }

    /// Returns true if every target reached a clean completion.
    pub fn all_completed(&self) -> bool {
        self.failed == 0
    }
}
