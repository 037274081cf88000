//! Mining configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pattern::PatternTarget;

/// Default wall-clock interval between progress events.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1_000;

/// Configuration for a mining session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningConfig {
    /// Required trailing zero bits
    pub target: PatternTarget,
    /// Total candidates to try across all workers
    pub max_iterations: u64,
    /// First nonce of the search space
    #[serde(default)]
    pub start_nonce: u64,
    /// Worker threads (0 = one per CPU)
    #[serde(default)]
    pub workers: usize,
    /// Override the difficulty-derived batch size
    #[serde(default)]
    pub batch_size: Option<u64>,
    /// Emit progress after this many attempts since the last event
    #[serde(default)]
    pub progress_every_attempts: Option<u64>,
    /// Emit progress after this much wall time since the last event
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    /// Abort with `Failed` after this many consecutive construction failures
    /// on one worker (none = never)
    #[serde(default)]
    pub max_consecutive_failures: Option<u64>,
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

impl MiningConfig {
    pub fn new(target: PatternTarget, max_iterations: u64) -> Self {
        Self {
            target,
            max_iterations,
            start_nonce: 0,
            workers: 0,
            batch_size: None,
            progress_every_attempts: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            max_consecutive_failures: None,
        }
    }

    pub fn with_start_nonce(mut self, nonce: u64) -> Self {
        self.start_nonce = nonce;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_progress_every(mut self, attempts: u64) -> Self {
        self.progress_every_attempts = Some(attempts);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_failure_cap(mut self, consecutive: u64) -> Self {
        self.max_consecutive_failures = Some(consecutive);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == Some(0) {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(ConfigError::ZeroFailureCap);
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the number of CPUs.
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }

    /// Batch size, either configured or derived from the target.
    pub fn resolved_batch_size(&self) -> u64 {
        self.batch_size.unwrap_or_else(|| self.target.batch_size())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}
