//! Pacing between consecutive campaign sends

use async_trait::async_trait;
use std::time::Duration;

/// Waits between two consecutive sends of a dispatch run.
///
/// Pacing only throttles the loop; it never changes a recipient's outcome.
#[async_trait]
pub trait SendPacer: Send + Sync {
    async fn pause(&self);
}

/// Fixed delay between sends, no backoff and no jitter
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalPacer {
    delay: Duration,
}

impl FixedIntervalPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedIntervalPacer {
    fn default() -> Self {
        Self::from_millis(1000)
    }
}

#[async_trait]
impl SendPacer for FixedIntervalPacer {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
