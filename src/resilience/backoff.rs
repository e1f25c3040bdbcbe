//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::IngestSettings;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is 1-based; attempt 0 never waits.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Bounded restart budget for a long-running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RestartPolicy {
    /// Never restart.
    pub fn never() -> Self {
        Self {
            max_restarts: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before restart number `restart` (1-based), or `None` once the
    /// budget is spent.
    pub fn delay(&self, restart: u32) -> Option<Duration> {
        if restart == 0 || restart > self.max_restarts {
            return None;
        }
        Some(calculate_backoff(restart, self.base_delay_ms, self.max_delay_ms))
    }
}

impl From<&IngestSettings> for RestartPolicy {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            max_restarts: settings.max_restarts,
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn test_restart_budget() {
        let policy = RestartPolicy {
            max_restarts: 2,
            base_delay_ms: 10,
            max_delay_ms: 100,
        };
        assert!(policy.delay(1).is_some());
        assert!(policy.delay(2).is_some());
        assert_eq!(policy.delay(3), None);
        assert_eq!(RestartPolicy::never().delay(1), None);
    }
}
