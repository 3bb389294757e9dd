//! Resilience patterns for stressrig
//!
//! This crate provides the convergence poller: a bounded retry loop that
//! fetches fresh state, verifies it, and sleeps between attempts through an
//! injectable [`Sleeper`] so it can be driven without real time.

pub mod retry;
pub mod sleep;

// Re-export commonly used types
pub use retry::{ConvergencePoller, PollError, RetryPolicy, Verdict};
pub use sleep::{Sleeper, TokioSleeper};
