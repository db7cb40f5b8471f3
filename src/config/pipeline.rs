//! Step pipeline configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

const MAX_STEP_ATTEMPTS: u32 = 5;

/// Retry settings for analysis steps
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Attempts per analysis step, including the first
    #[serde(default = "default_attempts")]
    pub max_step_attempts: u32,

    /// Pause between attempts in milliseconds
    #[serde(default = "default_backoff")]
    pub retry_backoff_ms: u64,
}

impl PipelineConfig {
    /// Get backoff as Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate pipeline configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_step_attempts == 0 || self.max_step_attempts > MAX_STEP_ATTEMPTS {
            return Err(ValidationError::InvalidStepAttempts);
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_step_attempts: default_attempts(),
            retry_backoff_ms: default_backoff(),
        }
    }
}

fn default_attempts() -> u32 {
    2
}

fn default_backoff() -> u64 {
    500
}
