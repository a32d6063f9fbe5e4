//! Minimum-spacing throttle for rate-limited collaborators
//!
//! Serializes callers and guarantees at least `min_interval` between
//! consecutive releases, spreading sequential wallet fetches under the
//! analytics service's rate limit.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Paces calls so consecutive releases are at least `min_interval` apart
pub struct Throttle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the spacing since the previous release has elapsed
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let since = last.elapsed();
            if since < self.min_interval {
                sleep(self.min_interval - since).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
