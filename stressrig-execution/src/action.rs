//! Scale and pause actions

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stressrig_config::{ActionOptions, RunOptions};
use stressrig_core::{EventSink, ResourceId, ResourceMap, RunEvent};
use stressrig_resilience::{ConvergencePoller, RetryPolicy, Sleeper, Verdict};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cluster::ClusterOps;
use crate::error::{ActionError, BuildError};
use crate::status::verify_scale;

/// Scale a resource to a number of units and wait for it to converge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleAction {
    pub resource: ResourceId,
    pub units: u32,
}

/// Block the suite for a fixed time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseAction {
    pub duration: Duration,
}

/// One step of a test suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Scale(ScaleAction),
    Pause(PauseAction),
}

/// Everything an action needs while running
#[derive(Clone)]
pub struct ActionContext {
    pub cluster: Arc<dyn ClusterOps>,
    pub sleeper: Arc<dyn Sleeper>,
    pub sink: Arc<dyn EventSink>,
    pub options: RunOptions,
    /// Resources that have been scaled up and should be monitored
    pub running: mpsc::Sender<ResourceId>,
}

impl Action {
    /// Build an action from its option bag, resolving resource names.
    ///
    /// Expected keys: `Action` (`scale` or `pause`), then `Pod` and `Units`
    /// for scale, `For` for pause.
    pub fn from_options(options: &ActionOptions, resources: &ResourceMap) -> Result<Self, BuildError> {
        let kind = options
            .get_string("Action")
            .map_err(BuildError::MissingActionKind)?;

        match kind {
            "scale" => {
                let invalid = |option, source| BuildError::InvalidOption {
                    action: "scale",
                    option,
                    source,
                };
                let pod = options.get_string("Pod").map_err(|e| invalid("Pod", e))?;
                let resource = resources
                    .resolve(pod)
                    .cloned()
                    .ok_or_else(|| BuildError::UnresolvedResource {
                        name: pod.to_string(),
                    })?;
                let units = options.get_count("Units").map_err(|e| invalid("Units", e))?;
                Ok(Action::Scale(ScaleAction { resource, units }))
            }
            "pause" => {
                let duration = options
                    .get_duration("For")
                    .map_err(|source| BuildError::InvalidOption {
                        action: "pause",
                        option: "For",
                        source,
                    })?;
                Ok(Action::Pause(PauseAction { duration }))
            }
            other => Err(BuildError::UnknownAction(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Scale(_) => "scale",
            Action::Pause(_) => "pause",
        }
    }

    pub async fn execute(&self, ctx: &ActionContext) -> Result<(), ActionError> {
        match self {
            Action::Scale(scale) => scale.execute(ctx).await,
            Action::Pause(pause) => {
                pause.execute(ctx).await;
                Ok(())
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Scale(s) => write!(f, "scale {} to {} units", s.resource, s.units),
            Action::Pause(p) => write!(f, "sleep for {:?}", p.duration),
        }
    }
}

impl ScaleAction {
    /// Retry budget for this request
    pub fn policy(&self, options: &RunOptions) -> RetryPolicy {
        RetryPolicy::for_units(
            self.units,
            options.attempts_per_unit,
            options.min_attempts,
            options.poll_interval,
        )
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<(), ActionError> {
        ctx.sink.emit(RunEvent::ScaleRequested {
            resource: self.resource.clone(),
            units: self.units,
        });

        ctx.cluster
            .scale(&self.resource, self.units)
            .await
            .map_err(|source| ActionError::Scale {
                resource: self.resource.clone(),
                source,
            })?;

        let poller = ConvergencePoller::with_sleeper(self.policy(&ctx.options), ctx.sleeper.clone());
        let max_attempts = poller.policy().max_attempts;
        let attempts = poller
            .poll_observed(
                || ctx.cluster.query_status(&self.resource),
                |output| verify_scale(output, &self.resource),
                |attempt, verdict| {
                    ctx.sink.emit(RunEvent::PollAttempt {
                        resource: self.resource.clone(),
                        attempt,
                        max_attempts,
                        converged: *verdict == Verdict::Converged,
                    })
                },
            )
            .await
            .map_err(|source| ActionError::Convergence {
                resource: self.resource.clone(),
                source,
            })?;

        ctx.sink.emit(RunEvent::Converged {
            resource: self.resource.clone(),
            attempts,
        });

        if self.units > 0 {
            if ctx.running.send(self.resource.clone()).await.is_err() {
                warn!("Monitor pool has stopped, {} will not be monitored", self.resource);
            } else {
                ctx.sink.emit(RunEvent::ResourceRunning {
                    resource: self.resource.clone(),
                });
            }
        } else {
            debug!("{} scaled to zero, not monitoring", self.resource);
        }

        Ok(())
    }
}

impl PauseAction {
    async fn execute(&self, ctx: &ActionContext) {
        ctx.sink.emit(RunEvent::Paused {
            duration: self.duration,
        });
        ctx.sleeper.sleep(self.duration).await;
    }
}
