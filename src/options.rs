use std::time::Duration;

use crate::{CertifierError, Result, StatusSet};

/// Bounded, fixed-delay retry policy for function invocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    /// Pause between attempts in milliseconds.
    pub delay_ms: u64,
    /// Statuses that end the loop immediately as a fatal failure.
    pub breakout: StatusSet,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay_ms: 750,
            breakout: StatusSet::unauthorized(),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CertifierError::InvalidInput(
                "max_attempts must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Configures HTTP timeout and invocation retry behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Policy used by invocations that do not pass their own.
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}
