use crate::config::CrawlConfig;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Fixed-range random pause between consecutive requests to one site.
///
/// Not a retry or backoff mechanism; it only spaces requests out. A zero
/// range makes `pause` return immediately.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        let (min, max) = config.delay_range();
        Self::new(min, max)
    }

    /// No pause at all
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        if self.min == self.max {
            return self.min;
        }
        let millis = rand::thread_rng()
            .gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Pausing {}ms before next request", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}
