//! Run event sinks

use std::sync::{Arc, Mutex};
use stressrig_core::{EventSink, RunEvent};
use tracing::{debug, error, info, trace, warn};

/// Renders run events as structured `tracing` events.
///
/// Every line read from a log stream is a `trace` event; matched lines are
/// `info`, so the default filter shows only what was asked for.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }

    pub fn shared() -> Arc<dyn EventSink> {
        Arc::new(Self)
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: RunEvent) {
        match event {
            RunEvent::SuiteStarted { suite, actions } => {
                info!(target: "stressrig::step", suite = %suite, actions, "start {}", suite);
            }
            RunEvent::SuiteFinished { suite, failures } => {
                info!(target: "stressrig::step", suite = %suite, failures, "end {}", suite);
            }
            RunEvent::ActionStarted { suite, index, action } => {
                info!(target: "stressrig::step", suite = %suite, index, "{}", action);
            }
            RunEvent::ActionFinished { suite, index, elapsed } => {
                debug!(target: "stressrig::step", suite = %suite, index, elapsed_ms = elapsed.as_millis() as u64, "action finished");
            }
            RunEvent::ActionFailed { suite, index, error } => {
                warn!(target: "stressrig::step", suite = %suite, index, "error while running action: {}", error);
            }
            RunEvent::ScaleRequested { resource, units } => {
                info!(target: "stressrig::scale", resource = %resource, units, "scaling {} to {} units", resource, units);
            }
            RunEvent::PollAttempt { resource, attempt, max_attempts, converged } => {
                debug!(target: "stressrig::scale", resource = %resource, attempt, max_attempts, converged, "status poll");
            }
            RunEvent::Converged { resource, attempts } => {
                info!(target: "stressrig::scale", resource = %resource, attempts, "{} converged", resource);
            }
            RunEvent::ResourceRunning { resource } => {
                info!(target: "stressrig::scale", resource = %resource, "{} is running", resource);
            }
            RunEvent::Paused { duration } => {
                info!(target: "stressrig::step", duration_ms = duration.as_millis() as u64, "sleeping for {:?}", duration);
            }
            RunEvent::MonitorState { resource, state } => {
                if state.is_terminal() {
                    info!(target: "stressrig::logs", resource = %resource, state = %state, "log monitor {}", state);
                } else {
                    debug!(target: "stressrig::logs", resource = %resource, state = %state, "log monitor {}", state);
                }
            }
            RunEvent::LogLine { resource, line, matched } => {
                if matched {
                    info!(target: "stressrig::output", resource = %resource, "{}", line);
                } else {
                    trace!(target: "stressrig::output", resource = %resource, "{}", line);
                }
            }
            RunEvent::StatusUpdate { resource, status } => {
                debug!(
                    target: "stressrig::logs",
                    resource = %resource,
                    lines_seen = status.lines_seen,
                    lines_matched = status.lines_matched,
                    "status update"
                );
            }
            RunEvent::StreamError { resource, error } => {
                error!(target: "stressrig::logs", resource = %resource, "error: {}", error);
            }
        }
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Position of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&RunEvent) -> bool) -> Option<usize> {
        self.events
            .lock()
            .ok()
            .and_then(|events| events.iter().position(predicate))
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
