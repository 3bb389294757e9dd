//! Single-writer aggregation of monitor batches and stream errors

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use stressrig_core::{EventSink, MatchStatus, MonitorState, ResourceId, RunEvent};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::StreamError;
use crate::monitor::MonitorUpdate;

/// Capacity of the batch update channel
pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the error channel
pub const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Final per-resource figures of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceReport {
    pub status: MatchStatus,
    /// Worst terminal state over the resource's monitors
    pub state: Option<MonitorState>,
    /// Monitors started for the resource
    pub monitors: u32,
}

impl ResourceReport {
    fn finish(&mut self, state: MonitorState) {
        self.monitors += 1;
        self.state = match (self.state, state) {
            (Some(MonitorState::Failed), _) | (_, MonitorState::Failed) => Some(MonitorState::Failed),
            _ => Some(state),
        };
    }
}

/// Sending halves handed to monitors. Dropping the last clone of each closes
/// the corresponding channel.
#[derive(Debug, Clone)]
pub struct AggregatorHandles {
    pub updates: mpsc::Sender<MonitorUpdate>,
    pub errors: mpsc::Sender<StreamError>,
}

/// Owns the running [`MatchStatus`] of every resource.
///
/// Nothing else writes the totals: monitors only send batches and errors.
/// The aggregator finishes once both channels are closed and empty.
pub struct Aggregator {
    updates: mpsc::Receiver<MonitorUpdate>,
    errors: mpsc::Receiver<StreamError>,
    sink: Arc<dyn EventSink>,
    resources: BTreeMap<ResourceId, ResourceReport>,
}

impl Aggregator {
    /// Create the aggregator together with the handles feeding it
    pub fn channel(sink: Arc<dyn EventSink>) -> (AggregatorHandles, Self) {
        let (updates_tx, updates) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
        let handles = AggregatorHandles {
            updates: updates_tx,
            errors: errors_tx,
        };
        let aggregator = Self {
            updates,
            errors,
            sink,
            resources: BTreeMap::new(),
        };
        (handles, aggregator)
    }

    pub async fn run(mut self) -> BTreeMap<ResourceId, ResourceReport> {
        let mut updates_open = true;
        let mut errors_open = true;

        while updates_open || errors_open {
            tokio::select! {
                update = self.updates.recv(), if updates_open => match update {
                    Some(update) => self.apply(update),
                    None => updates_open = false,
                },
                error = self.errors.recv(), if errors_open => match error {
                    Some(error) => self.record_error(error),
                    None => errors_open = false,
                },
            }
        }

        debug!("Aggregated status for {} resources", self.resources.len());
        self.resources
    }

    fn apply(&mut self, update: MonitorUpdate) {
        match update {
            MonitorUpdate::Batch { resource, batch } => {
                let report = self.resources.entry(resource.clone()).or_default();
                report.status.fold(&batch);
                self.sink.emit(RunEvent::StatusUpdate {
                    resource,
                    status: report.status.clone(),
                });
            }
            MonitorUpdate::Finished { resource, state } => {
                self.resources.entry(resource).or_default().finish(state);
            }
        }
    }

    fn record_error(&mut self, error: StreamError) {
        let resource = error.resource().clone();
        let message = error.to_string();
        self.resources
            .entry(resource.clone())
            .or_default()
            .status
            .record_error(message.clone());
        self.sink.emit(RunEvent::StreamError {
            resource,
            error: message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClusterError;
    use stressrig_core::MatchBatch;
    use stressrig_logging::RecordingSink;

    fn batch(seen: u64, matched: u64) -> MatchBatch {
        MatchBatch {
            lines_seen: seen,
            lines_matched: matched,
        }
    }

    #[tokio::test]
    async fn test_folds_batches_per_resource() {
        let sink = Arc::new(RecordingSink::new());
        let (handles, aggregator) = Aggregator::channel(sink.clone());
        let task = tokio::spawn(aggregator.run());

        for (id, b) in [("a", batch(3, 1)), ("b", batch(2, 0)), ("a", batch(4, 2))] {
            handles
                .updates
                .send(MonitorUpdate::Batch { resource: id.into(), batch: b })
                .await
                .unwrap();
        }
        handles
            .updates
            .send(MonitorUpdate::Finished { resource: "a".into(), state: MonitorState::Done })
            .await
            .unwrap();
        drop(handles);

        let resources = task.await.unwrap();
        let a = &resources[&ResourceId::new("a")];
        assert_eq!((a.status.lines_seen, a.status.lines_matched), (7, 3));
        assert_eq!(a.state, Some(MonitorState::Done));
        assert_eq!(a.monitors, 1);
        assert_eq!(resources[&ResourceId::new("b")].status.lines_seen, 2);
        assert_eq!(resources[&ResourceId::new("b")].state, None);

        // totals only ever grow
        let seen: Vec<u64> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::StatusUpdate { resource, status } if resource.as_str() == "a" => {
                    Some(status.lines_seen)
                }
                _ => None,
            })
            .collect();
        assert_eq!(seen, vec![3, 7]);
    }

    #[tokio::test]
    async fn test_errors_are_recorded_and_emitted() {
        let sink = Arc::new(RecordingSink::new());
        let (handles, aggregator) = Aggregator::channel(sink.clone());
        let task = tokio::spawn(aggregator.run());

        handles
            .errors
            .send(StreamError::Exit {
                resource: "svc".into(),
                source: ClusterError::UnknownResource("svc".into()),
            })
            .await
            .unwrap();
        drop(handles);

        let resources = task.await.unwrap();
        let svc = &resources[&ResourceId::new("svc")];
        assert!(svc.status.last_error.as_deref().unwrap().contains("svc"));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, RunEvent::StreamError { .. })));
    }

    #[test]
    fn test_failed_monitor_wins() {
        let mut report = ResourceReport::default();
        report.finish(MonitorState::Failed);
        report.finish(MonitorState::Done);
        assert_eq!(report.state, Some(MonitorState::Failed));
        assert_eq!(report.monitors, 2);
    }

    #[tokio::test]
    async fn test_finishes_when_all_handles_dropped() {
        let (handles, aggregator) = Aggregator::channel(Arc::new(stressrig_core::NullSink));
        let clone = handles.clone();
        drop(handles);
        let task = tokio::spawn(aggregator.run());
        tokio::task::yield_now().await;
        assert!(!task.is_finished());
        drop(clone);
        assert!(task.await.unwrap().is_empty());
    }
}
