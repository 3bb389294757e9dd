//! Retry policy and convergence poller

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::sleep::{Sleeper, TokioSleeper};

/// Bounded attempt budget with a constant delay between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Delay after each unconverged attempt except the last
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(10, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Constant delay between a fixed number of attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Budget proportional to the requested unit count.
    ///
    /// `max(floor, units * per_unit)` attempts: convergence time grows with
    /// the number of instances, and scaling to zero still gets the floor.
    pub fn for_units(units: u32, per_unit: u32, floor: u32, delay: Duration) -> Self {
        let budget = units.saturating_mul(per_unit).max(floor);
        Self::fixed(budget, delay)
    }
}

/// Outcome of verifying one fetched state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Target state reached
    Converged,
    /// Not there yet, try again
    Retry,
    /// The state cannot be interpreted; retrying will not help
    Failed(String),
}

/// Poll failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// Retry budget exhausted without converging
    #[error("could not reach expected result after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// Verification rejected the fetched state
    #[error("could not verify command output on attempt {attempt}: {reason}")]
    HardFailure { attempt: u32, reason: String },

    /// The state could not be fetched at all
    #[error("could not fetch state on attempt {attempt}: {message}")]
    Fetch { attempt: u32, message: String },
}

impl PollError {
    /// Whether the poller simply ran out of attempts
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PollError::Exhausted { .. })
    }
}

/// Repeatedly fetches state and verifies it until it converges, verification
/// fails hard, or the retry budget runs out.
#[derive(Clone)]
pub struct ConvergencePoller {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ConvergencePoller {
    /// Create a poller sleeping on the tokio timer
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Poll until converged. Returns the number of attempts used.
    pub async fn poll<F, Fut, T, E, V>(&self, fetch: F, verify: V) -> Result<u32, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        V: FnMut(&T) -> Verdict,
    {
        self.poll_observed(fetch, verify, |_, _| {}).await
    }

    /// Poll until converged, reporting every verdict to `observe`
    pub async fn poll_observed<F, Fut, T, E, V, O>(
        &self,
        mut fetch: F,
        mut verify: V,
        mut observe: O,
    ) -> Result<u32, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        V: FnMut(&T) -> Verdict,
        O: FnMut(u32, &Verdict),
    {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            debug!("Executing attempt {} of {}", attempt, max_attempts);

            let state = fetch().await.map_err(|e| PollError::Fetch {
                attempt,
                message: e.to_string(),
            })?;

            let verdict = verify(&state);
            observe(attempt, &verdict);

            match verdict {
                Verdict::Converged => {
                    if attempt > 1 {
                        info!("Converged after {} attempts", attempt);
                    }
                    return Ok(attempt);
                }
                Verdict::Failed(reason) => {
                    warn!("Verification failed on attempt {}: {}", attempt, reason);
                    return Err(PollError::HardFailure { attempt, reason });
                }
                Verdict::Retry if attempt < max_attempts => {
                    debug!(
                        "Attempt {} not converged, retrying in {:?}",
                        attempt, self.policy.delay
                    );
                    self.sleeper.sleep(self.policy.delay).await;
                }
                Verdict::Retry => {}
            }
        }

        warn!("Not converged after {} attempts", max_attempts);
        Err(PollError::Exhausted {
            attempts: max_attempts,
        })
    }
}
