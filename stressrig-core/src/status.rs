//! Line match counters and log monitor states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters for one bounded group of processed lines.
///
/// Batches are produced by a log monitor and handed to the aggregator by
/// value; they are discarded once folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchBatch {
    pub lines_seen: u64,
    pub lines_matched: u64,
}

impl MatchBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_seen(&mut self) {
        self.lines_seen += 1;
    }

    pub fn record_matched(&mut self) {
        self.lines_matched += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.lines_seen == 0 && self.lines_matched == 0
    }

    /// Whether the batch reached the flush size
    pub fn is_full(&self, size: usize) -> bool {
        self.lines_seen >= size as u64
    }

    /// Hand the current counts out and start a fresh batch
    pub fn take(&mut self) -> MatchBatch {
        std::mem::take(self)
    }
}

/// Running totals for one resource.
///
/// Owned by a single aggregator; every other party only sends batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatus {
    pub lines_seen: u64,
    pub lines_matched: u64,
    pub last_error: Option<String>,
}

impl MatchStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch into the totals. Totals never decrease.
    pub fn fold(&mut self, batch: &MatchBatch) {
        self.lines_seen = self.lines_seen.saturating_add(batch.lines_seen);
        self.lines_matched = self.lines_matched.saturating_add(batch.lines_matched);
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

/// Log monitor lifecycle: `Starting -> Streaming -> Draining -> Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Starting,
    Streaming,
    Draining,
    Done,
    Failed,
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Done | MonitorState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Starting => "starting",
            MonitorState::Streaming => "streaming",
            MonitorState::Draining => "draining",
            MonitorState::Done => "done",
            MonitorState::Failed => "failed",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
