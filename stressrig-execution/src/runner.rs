//! Test runner
//!
//! Suites run one after the other on the calling task. Next to them a pool
//! task starts one [`LogMonitor`] for every resource reported as running,
//! and an aggregator task folds everything the monitors send. Shutdown is
//! driven by channel closure only:
//!
//! 1. the runner drops the running sender after the last suite,
//! 2. the pool stops accepting resources, joins every monitor and then drops
//!    the aggregator handles,
//! 3. the aggregator returns once the update and error channels are empty.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use stressrig_config::RunOptions;
use stressrig_core::{EventSink, ResourceId, RunEvent};
use stressrig_resilience::{Sleeper, TokioSleeper};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::action::{Action, ActionContext};
use crate::aggregate::{Aggregator, AggregatorHandles, ResourceReport};
use crate::cluster::ClusterOps;
use crate::error::ActionError;
use crate::monitor::{LogMonitor, MonitorConfig, MonitorOutcome};
use crate::suite::TestSuite;

/// Capacity of the channel announcing running resources
pub const RUNNING_CHANNEL_CAPACITY: usize = 32;

/// Outcome of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub index: usize,
    pub action: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl ActionReport {
    fn new(index: usize, action: &Action, elapsed_ms: u64, error: Option<ActionError>) -> Self {
        Self {
            index,
            action: action.to_string(),
            elapsed_ms,
            kind: error.as_ref().map(ActionError::kind),
            error: error.map(|e| e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub actions: Vec<ActionReport>,
}

impl SuiteReport {
    pub fn failures(&self) -> usize {
        self.actions.iter().filter(|a| !a.is_ok()).count()
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub suites: Vec<SuiteReport>,
    pub resources: BTreeMap<ResourceId, ResourceReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.suites.iter().map(SuiteReport::failures).sum()
    }

    pub fn stream_errors(&self) -> usize {
        self.resources
            .values()
            .filter(|r| r.status.last_error.is_some())
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0 && self.stream_errors() == 0
    }
}

/// Runs test suites against a cluster
pub struct TestRunner {
    cluster: Arc<dyn ClusterOps>,
    options: RunOptions,
    sink: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
}

impl TestRunner {
    pub fn new(cluster: Arc<dyn ClusterOps>, options: RunOptions, sink: Arc<dyn EventSink>) -> Self {
        Self {
            cluster,
            options,
            sink,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Use a different sleeper for pauses, polls and log retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run every suite, then wait for all log monitors to finish.
    ///
    /// Action failures are recorded and never stop the run.
    pub async fn run(&self, suites: &[TestSuite]) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting run {} with {} tests", run_id, suites.len());

        let (handles, aggregator) = Aggregator::channel(self.sink.clone());
        let aggregator = tokio::spawn(aggregator.run());

        let (running_tx, running_rx) = mpsc::channel(RUNNING_CHANNEL_CAPACITY);
        let pool = tokio::spawn(monitor_pool(
            running_rx,
            handles,
            self.cluster.clone(),
            MonitorConfig::from_options(&self.options),
            self.sink.clone(),
            self.sleeper.clone(),
        ));

        let ctx = ActionContext {
            cluster: self.cluster.clone(),
            sleeper: self.sleeper.clone(),
            sink: self.sink.clone(),
            options: self.options.clone(),
            running: running_tx,
        };

        let mut reports = Vec::with_capacity(suites.len());
        for suite in suites {
            reports.push(self.run_suite(suite, &ctx).await);
        }

        // Last sender of the running channel
        drop(ctx);

        let outcomes = match pool.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("Monitor pool failed: {}", e);
                Vec::new()
            }
        };
        debug!("{} log monitors finished", outcomes.len());

        let resources = match aggregator.await {
            Ok(resources) => resources,
            Err(e) => {
                error!("Aggregator failed: {}", e);
                BTreeMap::new()
            }
        };

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            suites: reports,
            resources,
        };
        info!(
            "Run {} finished: {} failed actions, {} stream errors",
            run_id,
            report.failures(),
            report.stream_errors()
        );
        report
    }

    async fn run_suite(&self, suite: &TestSuite, ctx: &ActionContext) -> SuiteReport {
        self.sink.emit(RunEvent::SuiteStarted {
            suite: suite.name.clone(),
            actions: suite.len(),
        });

        let mut actions = Vec::with_capacity(suite.len());
        for (index, action) in suite.actions.iter().enumerate() {
            self.sink.emit(RunEvent::ActionStarted {
                suite: suite.name.clone(),
                index,
                action: action.to_string(),
            });

            let start = Instant::now();
            let result = action.execute(ctx).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => self.sink.emit(RunEvent::ActionFinished {
                    suite: suite.name.clone(),
                    index,
                    elapsed,
                }),
                Err(e) => self.sink.emit(RunEvent::ActionFailed {
                    suite: suite.name.clone(),
                    index,
                    error: e.to_string(),
                }),
            }

            actions.push(ActionReport::new(
                index,
                action,
                elapsed.as_millis() as u64,
                result.err(),
            ));
        }

        let report = SuiteReport {
            name: suite.name.clone(),
            actions,
        };
        self.sink.emit(RunEvent::SuiteFinished {
            suite: suite.name.clone(),
            failures: report.failures(),
        });
        report
    }
}

/// Start a monitor for every running resource until the channel closes,
/// then join them all. The aggregator handles are released on return.
async fn monitor_pool(
    mut running: mpsc::Receiver<ResourceId>,
    handles: AggregatorHandles,
    cluster: Arc<dyn ClusterOps>,
    config: MonitorConfig,
    sink: Arc<dyn EventSink>,
    sleeper: Arc<dyn Sleeper>,
) -> Vec<MonitorOutcome> {
    let mut monitors = JoinSet::new();
    let mut outcomes = Vec::new();

    loop {
        tokio::select! {
            resource = running.recv() => match resource {
                Some(resource) => {
                    debug!("Starting log monitor for {}", resource);
                    let monitor = LogMonitor::new(
                        resource,
                        cluster.clone(),
                        config.clone(),
                        handles.updates.clone(),
                        handles.errors.clone(),
                        sink.clone(),
                    )
                    .with_sleeper(sleeper.clone());
                    monitors.spawn(monitor.run());
                }
                None => break,
            },
            Some(joined) = monitors.join_next(), if !monitors.is_empty() => {
                collect(joined, &mut outcomes);
            }
        }
    }

    while let Some(joined) = monitors.join_next().await {
        collect(joined, &mut outcomes);
    }

    drop(handles);
    outcomes
}

fn collect(
    joined: Result<MonitorOutcome, tokio::task::JoinError>,
    outcomes: &mut Vec<MonitorOutcome>,
) {
    match joined {
        Ok(outcome) => {
            debug!("Log monitor for {} ended {}", outcome.resource, outcome.state);
            outcomes.push(outcome);
        }
        Err(e) => error!("Log monitor task failed: {}", e),
    }
}
