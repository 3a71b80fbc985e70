//! Time throttle for progress-only view refreshes.
//!
//! Status changes always render; per-chunk progress renders at most once per
//! interval so a fast link does not flood the terminal.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct RenderThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RenderThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// True if a render is due now; records the render time when it is.
    pub(crate) fn ready(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(prev) if now.duration_since(prev) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
