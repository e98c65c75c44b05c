//! Ticker-driven control loop.

use crate::scanner::Scanner;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Scan period used when the configuration does not specify one.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(30);

/// Drives a [`Scanner`] on a fixed period until cancelled.
///
/// The first scan fires immediately, so a fresh process has a populated
/// cache without waiting a full period. Cancellation is observed between
/// ticks and inside a running scan's I/O waits; an in-flight blocking
/// extraction is never interrupted mid-call, the loop simply returns once
/// the current scan winds down.
pub struct Runner {
    scanner: Scanner,
    period: Duration,
}

impl Runner {
    /// Create a runner with an explicit scan period.
    pub fn new(scanner: Scanner, period: Duration) -> Self {
        Self { scanner, period }
    }

    /// Create a runner with the [default period](DEFAULT_SCAN_PERIOD).
    pub fn with_default_period(scanner: Scanner) -> Self {
        Self::new(scanner, DEFAULT_SCAN_PERIOD)
    }

    /// Tick until `cancel` fires.
    ///
    /// If the process falls behind (a scan overruns the period), the next
    /// scan starts a full period after the late one finished rather than
    /// bursting to catch up.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Watcher stopping");
                    return;
                },
                _ = ticker.tick() => {},
            }
            // Per-scan results are logged by the scanner itself; the only
            // error that reaches this level is cancellation.
            if self.scanner.scan_once(&cancel).await.is_err() {
                tracing::info!("Scan interrupted; watcher stopping");
                return;
            }
        }
    }
}
