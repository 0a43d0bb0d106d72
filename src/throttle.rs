//! Serialized admission queue for session-level operations.
//!
//! One shared browser process means one operation at a time: every call runs
//! strictly after the previous call's completion plus a mandatory spacing
//! delay. This is deliberate backpressure protecting the browser and the
//! remote provider's abuse thresholds, so there is no bypass and no priority
//! lane; a slow operation delays everything behind it.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

pub struct RequestThrottle {
    spacing: Duration,
    /// Completion time of the last admitted operation. The mutex doubles as
    /// the queue: tokio's Mutex wakes waiters in FIFO order, so queue order
    /// equals arrival order.
    last_done: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(spacing: Duration) -> Self {
        RequestThrottle {
            spacing,
            last_done: Mutex::new(None),
        }
    }

    /// Run `op` once the previous operation has completed and the spacing
    /// delay has elapsed. The queue slot is held for the full duration of
    /// `op`, including its failure paths.
    pub async fn run<T, F>(&self, op: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let mut last_done = self.last_done.lock().await;
        if let Some(done) = *last_done {
            let since = done.elapsed();
            if since < self.spacing {
                trace!(wait_ms = (self.spacing - since).as_millis() as u64, "throttle spacing");
                sleep(self.spacing - since).await;
            }
        }
        let out = op.await;
        *last_done = Some(Instant::now());
        out
    }
}
