//! Time sources for the extraction loop
//!
//! The loop never calls `Utc::now()` or `tokio::time::sleep` directly. Both go
//! through these traits so tests can drive many cycles with a fake clock and
//! no real waiting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of the current UTC instant
pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspends the loop between cycles
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
