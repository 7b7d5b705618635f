//! Exponential backoff with jitter for delivery retries

use std::time::Duration;

use jiffy_domain::DispatchConfig;
use rand::Rng;

// Keeps 2^n within u64 before the cap applies.
const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Backoff schedule for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for BackoffPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
        .with_jitter_factor(config.jitter_factor)
    }
}

impl BackoffPolicy {
    /// `max_attempts` is clamped to at least one and `max_delay` to at least
    /// `base_delay`.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter_factor: 0.0,
        }
    }

    /// Set the jitter factor (0.0 = no jitter, 1.0 = full jitter)
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    pub const fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before retry number `retry` (0-based), with jitter.
    pub fn delay(&self, retry: u32) -> Duration {
        self.apply_jitter(self.exponential_delay(retry))
    }

    /// Delay honouring a server-suggested minimum, never above the cap.
    pub fn delay_with_hint(&self, retry: u32, hint: Duration) -> Duration {
        self.delay(retry).max(hint.min(self.max_delay))
    }

    fn exponential_delay(&self, retry: u32) -> Duration {
        let base_millis = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);

        let multiplier = 2_u64.saturating_pow(retry.min(MAX_BACKOFF_EXPONENT));
        Duration::from_millis(base_millis.saturating_mul(multiplier).min(max_millis))
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 || delay.is_zero() {
            return delay;
        }

        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;

        // -jitter_range/2 to +jitter_range/2
        let jitter = rand::thread_rng().gen_range(-jitter_range / 2.0..=jitter_range / 2.0);
        let final_millis = (delay_millis + jitter).max(0.0) as u64;

        Duration::from_millis(final_millis).min(self.max_delay)
    }
}
