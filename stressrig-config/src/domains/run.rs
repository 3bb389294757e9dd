//! Run tuning options

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::validation::{Validatable, validate_positive};
use crate::error::ConfigResult;

/// Options controlling convergence polling and log matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RunOptions {
    /// Substrings counted as matched log lines (any of them)
    #[serde(rename = "Match")]
    pub match_patterns: Vec<String>,

    /// Legacy single pattern for crash lines, merged into the match set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_match: Option<String>,

    /// Legacy single pattern for lost-connection lines, merged into the match set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_match: Option<String>,

    /// Number of lines per aggregated status batch
    pub batch_size: usize,

    /// Delay between convergence polls
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub poll_interval: Duration,

    /// Poll attempts granted per requested unit
    pub attempts_per_unit: u32,

    /// Minimum poll attempts, also used when scaling to zero
    pub min_attempts: u32,

    /// How many times a log stream is launched before giving up
    pub log_attempts: u32,

    /// Delay between log stream launches
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub log_retry_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            match_patterns: Vec::new(),
            crash_match: None,
            lost_match: None,
            batch_size: 100,
            poll_interval: Duration::from_secs(1),
            attempts_per_unit: 10,
            min_attempts: 10,
            log_attempts: 1,
            log_retry_delay: Duration::from_secs(1),
        }
    }
}

impl RunOptions {
    /// All patterns a log line is matched against, duplicates removed
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        let legacy = self.crash_match.iter().chain(self.lost_match.iter());
        for p in self.match_patterns.iter().chain(legacy) {
            if !p.is_empty() && !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }
        patterns
    }
}

impl Validatable for RunOptions {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.batch_size, "BatchSize", self.domain_name())?;
        validate_positive(
            self.poll_interval.as_millis(),
            "PollInterval",
            self.domain_name(),
        )?;
        validate_positive(self.min_attempts, "MinAttempts", self.domain_name())?;
        validate_positive(self.log_attempts, "LogAttempts", self.domain_name())?;

        if self.match_patterns.iter().any(|p| p.is_empty()) {
            return Err(self.validation_error("Match patterns cannot be empty strings"));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "options"
    }
}
