//! Injectable sleeping

use async_trait::async_trait;
use std::time::Duration;

/// Something that can suspend the current task for a while.
///
/// The poller and the pause action sleep through this trait so tests can
/// substitute a clock that records instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer (honours `tokio::time::pause`)
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_advances_paused_clock() {
        let start = Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sleep_returns_immediately() {
        let start = Instant::now();
        TokioSleeper.sleep(Duration::ZERO).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
