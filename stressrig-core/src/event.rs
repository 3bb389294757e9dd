//! Structured run events
//!
//! Every component of the engine reports what it does as a [`RunEvent`]
//! sent to a single [`EventSink`]. Rendering (console text, JSON, test
//! capture) is the sink's concern.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::status::{MatchStatus, MonitorState};
use crate::types::ResourceId;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    SuiteStarted {
        suite: String,
        actions: usize,
    },
    SuiteFinished {
        suite: String,
        failures: usize,
    },
    ActionStarted {
        suite: String,
        index: usize,
        action: String,
    },
    ActionFinished {
        suite: String,
        index: usize,
        elapsed: Duration,
    },
    ActionFailed {
        suite: String,
        index: usize,
        error: String,
    },
    ScaleRequested {
        resource: ResourceId,
        units: u32,
    },
    PollAttempt {
        resource: ResourceId,
        attempt: u32,
        max_attempts: u32,
        converged: bool,
    },
    Converged {
        resource: ResourceId,
        attempts: u32,
    },
    ResourceRunning {
        resource: ResourceId,
    },
    Paused {
        duration: Duration,
    },
    MonitorState {
        resource: ResourceId,
        state: MonitorState,
    },
    /// Every line read is reported with `matched: false`; lines hitting a
    /// match pattern are reported again with `matched: true`.
    LogLine {
        resource: ResourceId,
        line: String,
        matched: bool,
    },
    StatusUpdate {
        resource: ResourceId,
        status: MatchStatus,
    },
    StreamError {
        resource: ResourceId,
        error: String,
    },
}

/// Destination for run events.
///
/// Implementations must be cheap to call from any task; the engine never
/// waits on a sink.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: RunEvent) {}
}
