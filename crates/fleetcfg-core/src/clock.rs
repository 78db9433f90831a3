//! Injectable time source
//!
//! Polling and staleness checks read time through [`Clock`] so tests can
//! drive them with [`ManualClock`] instead of waiting.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Wall-clock time and sleeping
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);

    /// Time since `start`, zero if `start` is in the future
    fn elapsed_since(&self, start: DateTime<Utc>) -> Duration {
        (self.now() - start).to_std().unwrap_or_default()
    }
}

/// Real time, sleeping on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual time; `sleep` advances it instantly and records the duration
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move virtual time forward
    pub fn advance(&self, duration: Duration) {
        if let Ok(delta) = chrono::Duration::from_std(duration) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += delta;
        }
    }

    /// Every duration passed to `sleep`
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::default();
        let start = clock.now();

        clock.sleep(Duration::from_secs(30)).await;
        clock.sleep(Duration::from_secs(30)).await;

        assert_eq!(clock.elapsed_since(start), Duration::from_secs(60));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn test_elapsed_since_future_is_zero() {
        let clock = ManualClock::default();
        let future = clock.now() + chrono::Duration::seconds(5);
        assert_eq!(clock.elapsed_since(future), Duration::ZERO);
    }
}
