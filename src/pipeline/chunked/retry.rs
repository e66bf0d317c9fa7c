use std::time::Duration;

/// Per-chunk retry schedule. Each attempt raises the sampling temperature so
/// a retry explores a different output instead of repeating the same
/// malformed one.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Temperature per attempt; the last entry repeats for later attempts.
    pub temperatures: Vec<f32>,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            temperatures: vec![0.1, 0.4, 0.7],
            backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Temperature for a zero-based attempt number.
    pub fn temperature_for(&self, attempt: u32) -> f32 {
        self.temperatures
            .get(attempt as usize)
            .or_else(|| self.temperatures.last())
            .copied()
            .unwrap_or(0.1)
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Same schedule with no pause between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}
