use std::time::Duration;

use crate::error::ResolveError;

/// How the wait between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles after each failed attempt, capped at `max_delay`
    Exponential,
}

/// Retry behaviour for a single name
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per name before a degraded record is emitted
    pub max_retries: u32,
    /// Wait after the first failed attempt
    pub delay: Duration,
    pub backoff: Backoff,
    pub max_delay: Duration,
    /// Retry names that matched nothing, not even at genus level
    pub retry_not_found: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            delay: Duration::from_secs(2),
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(60),
            retry_not_found: true,
        }
    }
}

impl RetryPolicy {
    /// Number of attempts actually made; never zero so every name yields a row
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Wait before the next attempt, given how many attempts have failed so far
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let exponent = failures.saturating_sub(1).min(16);
                self.delay
                    .saturating_mul(1u32 << exponent)
                    .min(self.max_delay)
            }
        }
    }

    pub fn should_retry(&self, error: &ResolveError) -> bool {
        self.retry_not_found || !error.is_not_found()
    }
}

/// Everything the resolver needs besides its data source
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub retry: RetryPolicy,
    /// Search by genus alone when the full name has no match
    pub genus_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            retry: RetryPolicy::default(),
            genus_fallback: true,
        }
    }
}
