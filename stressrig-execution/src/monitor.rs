//! Per-resource log monitor
//!
//! A monitor follows one resource's log stream through
//! `starting -> streaming -> draining -> done | failed`. Lines are offered to
//! a catch-all filter (lines seen) and a pattern filter (lines matched); a
//! consumer task counts them and hands fixed-size [`MatchBatch`]es to the
//! aggregator. The exit status of the stream is only looked at once the
//! consumer has folded every line it was given.

use std::sync::Arc;
use std::time::Duration;
use stressrig_config::RunOptions;
use stressrig_core::{
    slurp, EventSink, MatchBatch, MonitorState, ResourceId, RunEvent, SubstringFilter,
};
use stressrig_resilience::{Sleeper, TokioSleeper};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cluster::{ClusterOps, LogStream};
use crate::error::StreamError;

/// Messages from monitors to the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorUpdate {
    /// Counters for a group of processed lines
    Batch {
        resource: ResourceId,
        batch: MatchBatch,
    },
    /// The monitor reached a terminal state
    Finished {
        resource: ResourceId,
        state: MonitorState,
    },
}

/// Log monitor settings
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Substrings counted as matched lines; empty disables matching
    pub patterns: Vec<String>,
    /// Lines per flushed batch
    pub batch_size: usize,
    /// How many times the stream is launched before giving up
    pub attempts: u32,
    /// Delay between launches
    pub retry_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_options(&RunOptions::default())
    }
}

impl MonitorConfig {
    pub fn from_options(options: &RunOptions) -> Self {
        Self {
            patterns: options.patterns(),
            batch_size: options.batch_size.max(1),
            attempts: options.log_attempts.max(1),
            retry_delay: options.log_retry_delay,
        }
    }
}

/// Final result of one monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub resource: ResourceId,
    pub state: MonitorState,
    pub attempts: u32,
    pub lines_seen: u64,
    pub lines_matched: u64,
}

/// Follows the logs of one resource
pub struct LogMonitor {
    resource: ResourceId,
    cluster: Arc<dyn ClusterOps>,
    config: MonitorConfig,
    updates: mpsc::Sender<MonitorUpdate>,
    errors: mpsc::Sender<StreamError>,
    sink: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
}

impl LogMonitor {
    pub fn new(
        resource: ResourceId,
        cluster: Arc<dyn ClusterOps>,
        config: MonitorConfig,
        updates: mpsc::Sender<MonitorUpdate>,
        errors: mpsc::Sender<StreamError>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            resource,
            cluster,
            config,
            updates,
            errors,
            sink,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Use a different sleeper between launch attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Run the monitor to a terminal state.
    ///
    /// Every failure is reported once on the error channel. Consumes the
    /// monitor so its channel senders are released on return.
    pub async fn run(self) -> MonitorOutcome {
        let max_attempts = self.config.attempts.max(1);
        let mut counted = MatchBatch::new();
        let mut state = MonitorState::Failed;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            let (result, batch) = self.attempt().await;
            counted.lines_seen += batch.lines_seen;
            counted.lines_matched += batch.lines_matched;

            match result {
                Ok(()) => {
                    state = MonitorState::Done;
                    break;
                }
                Err(e) => {
                    warn!("Log stream attempt {} of {} failed: {}", attempt, max_attempts, e);
                    self.report(e).await;
                    if attempt < max_attempts {
                        self.sleeper.sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        self.transition(state);
        if self
            .updates
            .send(MonitorUpdate::Finished {
                resource: self.resource.clone(),
                state,
            })
            .await
            .is_err()
        {
            debug!("Aggregator gone before {} finished", self.resource);
        }

        MonitorOutcome {
            resource: self.resource,
            state,
            attempts,
            lines_seen: counted.lines_seen,
            lines_matched: counted.lines_matched,
        }
    }

    /// One launch of the log stream, through draining
    async fn attempt(&self) -> (Result<(), StreamError>, MatchBatch) {
        self.transition(MonitorState::Starting);

        let LogStream { lines, exit } = match self.cluster.stream_logs(&self.resource).await {
            Ok(stream) => stream,
            Err(source) => {
                self.transition(MonitorState::Draining);
                let error = StreamError::Launch {
                    resource: self.resource.clone(),
                    source,
                };
                return (Err(error), MatchBatch::new());
            }
        };

        let batch_size = self.config.batch_size.max(1);
        let (seen_tx, seen_rx) = mpsc::channel(batch_size);
        let (matched_tx, matched_rx) = mpsc::channel(batch_size);

        let mut filters = vec![SubstringFilter::catch_all(seen_tx)];
        if !self.config.patterns.is_empty() {
            filters.push(SubstringFilter::new(&self.config.patterns, matched_tx));
        } else {
            drop(matched_tx);
        }

        let consumer = tokio::spawn(consume(
            self.resource.clone(),
            seen_rx,
            matched_rx,
            batch_size,
            self.updates.clone(),
            self.sink.clone(),
        ));

        self.transition(MonitorState::Streaming);
        let read = slurp(lines, filters).await;

        // The filters are gone, so the consumer ends once it has counted
        // everything still buffered
        self.transition(MonitorState::Draining);
        let counted = match consumer.await {
            Ok(counted) => counted,
            Err(e) => {
                warn!("Line consumer for {} aborted: {}", self.resource, e);
                MatchBatch::new()
            }
        };

        if let Err(source) = read {
            return (
                Err(StreamError::Read {
                    resource: self.resource.clone(),
                    source,
                }),
                counted,
            );
        }
        debug!("Read {} lines from {}", counted.lines_seen, self.resource);

        let result = exit.await.map_err(|source| StreamError::Exit {
            resource: self.resource.clone(),
            source,
        });
        (result, counted)
    }

    async fn report(&self, error: StreamError) {
        if let Err(e) = self.errors.send(error).await {
            warn!("Error channel closed, dropping: {}", e.0);
        }
    }

    fn transition(&self, state: MonitorState) {
        self.sink.emit(RunEvent::MonitorState {
            resource: self.resource.clone(),
            state,
        });
    }
}

/// Count seen and matched lines, flushing a batch every `batch_size` lines
/// seen and once more when both filters have closed. Returns the totals.
async fn consume(
    resource: ResourceId,
    mut seen: mpsc::Receiver<String>,
    mut matched: mpsc::Receiver<String>,
    batch_size: usize,
    updates: mpsc::Sender<MonitorUpdate>,
    sink: Arc<dyn EventSink>,
) -> MatchBatch {
    let mut batch = MatchBatch::new();
    let mut totals = MatchBatch::new();
    let mut seen_open = true;
    let mut matched_open = true;

    while seen_open || matched_open {
        tokio::select! {
            biased;
            line = seen.recv(), if seen_open => match line {
                Some(line) => {
                    batch.record_seen();
                    sink.emit(RunEvent::LogLine { resource: resource.clone(), line, matched: false });
                }
                None => seen_open = false,
            },
            line = matched.recv(), if matched_open => match line {
                Some(line) => {
                    batch.record_matched();
                    sink.emit(RunEvent::LogLine { resource: resource.clone(), line, matched: true });
                }
                None => matched_open = false,
            },
        }

        if batch.is_full(batch_size) {
            flush(&resource, &mut batch, &mut totals, &updates).await;
        }
    }

    if !batch.is_empty() {
        flush(&resource, &mut batch, &mut totals, &updates).await;
    }
    totals
}

async fn flush(
    resource: &ResourceId,
    batch: &mut MatchBatch,
    totals: &mut MatchBatch,
    updates: &mpsc::Sender<MonitorUpdate>,
) {
    let batch = batch.take();
    totals.lines_seen += batch.lines_seen;
    totals.lines_matched += batch.lines_matched;

    let update = MonitorUpdate::Batch {
        resource: resource.clone(),
        batch,
    };
    if updates.send(update).await.is_err() {
        debug!("Aggregator gone, dropping batch for {}", resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClusterError;
    use crate::testing::ScriptedCluster;
    use stressrig_logging::RecordingSink;
    use tokio::io::AsyncWriteExt;

    struct Harness {
        updates: mpsc::Receiver<MonitorUpdate>,
        errors: mpsc::Receiver<StreamError>,
        sink: Arc<RecordingSink>,
    }

    fn monitor(cluster: &ScriptedCluster, config: MonitorConfig) -> (LogMonitor, Harness) {
        let (updates_tx, updates) = mpsc::channel(64);
        let (errors_tx, errors) = mpsc::channel(64);
        let sink = Arc::new(RecordingSink::new());
        let monitor = LogMonitor::new(
            "svc".into(),
            Arc::new(cluster.clone()),
            config,
            updates_tx,
            errors_tx,
            sink.clone(),
        );
        (monitor, Harness { updates, errors, sink })
    }

    fn config(patterns: &[&str], batch_size: usize) -> MonitorConfig {
        MonitorConfig {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            batch_size,
            attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    async fn drain(mut rx: mpsc::Receiver<MonitorUpdate>) -> Vec<MonitorUpdate> {
        let mut out = Vec::new();
        while let Some(update) = rx.recv().await {
            out.push(update);
        }
        out
    }

    fn states(sink: &RecordingSink) -> Vec<MonitorState> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::MonitorState { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_counts_every_line_in_batches() {
        let cluster = ScriptedCluster::new();
        cluster.push_log(&"svc".into(), "ok\npanic 1\nok\nok\npanic 2\n");
        let (monitor, harness) = monitor(&cluster, config(&["panic"], 2));

        let outcome = monitor.run().await;
        assert_eq!(outcome.state, MonitorState::Done);
        assert_eq!(outcome.lines_seen, 5);
        assert_eq!(outcome.lines_matched, 2);

        let updates = drain(harness.updates).await;
        let (seen, matched) = updates.iter().fold((0, 0), |acc, u| match u {
            MonitorUpdate::Batch { batch, .. } => {
                assert!(batch.lines_seen <= 2);
                (acc.0 + batch.lines_seen, acc.1 + batch.lines_matched)
            }
            _ => acc,
        });
        assert_eq!((seen, matched), (5, 2));
        assert_eq!(
            updates.last(),
            Some(&MonitorUpdate::Finished {
                resource: "svc".into(),
                state: MonitorState::Done
            })
        );
        assert_eq!(
            states(&harness.sink),
            vec![
                MonitorState::Starting,
                MonitorState::Streaming,
                MonitorState::Draining,
                MonitorState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_no_patterns_matches_nothing() {
        let cluster = ScriptedCluster::new();
        cluster.push_log(&"svc".into(), "a\nb\n");
        let (monitor, _harness) = monitor(&cluster, config(&[], 10));

        let outcome = monitor.run().await;
        assert_eq!(outcome.lines_seen, 2);
        assert_eq!(outcome.lines_matched, 0);
    }

    #[tokio::test]
    async fn test_launch_failure_reports_once() {
        let cluster = ScriptedCluster::new();
        cluster.fail_logs(&"svc".into());
        let (monitor, mut harness) = monitor(&cluster, config(&["panic"], 10));

        let outcome = monitor.run().await;
        assert_eq!(outcome.state, MonitorState::Failed);
        assert_eq!(outcome.lines_seen, 0);

        let error = harness.errors.recv().await.unwrap();
        assert!(matches!(error, StreamError::Launch { .. }));
        assert!(harness.errors.recv().await.is_none());
        assert_eq!(
            states(&harness.sink),
            vec![MonitorState::Starting, MonitorState::Draining, MonitorState::Failed]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_after_lines_counts_them() {
        let cluster = ScriptedCluster::new();
        cluster.push_log_with_exit(
            &"svc".into(),
            "panic\nok\n",
            Err(ClusterError::UnknownResource("svc".into())),
        );
        let (monitor, mut harness) = monitor(&cluster, config(&["panic"], 100));

        let outcome = monitor.run().await;
        assert_eq!(outcome.state, MonitorState::Failed);
        assert_eq!((outcome.lines_seen, outcome.lines_matched), (2, 1));
        assert!(matches!(
            harness.errors.recv().await,
            Some(StreamError::Exit { .. })
        ));
    }

    #[tokio::test]
    async fn test_retries_launch_up_to_limit() {
        let cluster = ScriptedCluster::new();
        cluster.fail_logs(&"svc".into());
        let mut cfg = config(&[], 10);
        cfg.attempts = 3;
        let (monitor, mut harness) = monitor(&cluster, cfg);

        let outcome = monitor.run().await;
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.state, MonitorState::Failed);
        for _ in 0..3 {
            assert!(harness.errors.recv().await.is_some());
        }
        assert!(harness.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_live_stream_drains_before_exit() {
        let cluster = ScriptedCluster::new();
        let mut writer = cluster.open_log(&"svc".into());
        let (monitor, harness) = monitor(&cluster, config(&["lost"], 1));
        let handle = tokio::spawn(monitor.run());

        writer.write_all(b"connection lost\n").await.unwrap();
        writer.write_all(b"reconnected").await.unwrap();
        drop(writer);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.state, MonitorState::Done);
        assert_eq!((outcome.lines_seen, outcome.lines_matched), (2, 1));

        let lines: Vec<(String, bool)> = harness
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RunEvent::LogLine { line, matched, .. } => Some((line, matched)),
                _ => None,
            })
            .collect();
        assert!(lines.contains(&("connection lost".to_string(), true)));
        assert!(lines.contains(&("reconnected".to_string(), false)));
    }
}
