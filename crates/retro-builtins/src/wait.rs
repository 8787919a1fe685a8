//! Polling waits on the matcher

use retro_core::{CapabilityResult, Match, Matcher, Region};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Misses tolerated before the poll interval starts to grow
const BACKOFF_AFTER_MISSES: u32 = 5;

/// Poll pacing for `wait` and `wait_vanish`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub poll: Duration,
    /// Upper bound for the backed-off poll interval
    pub backoff_max: Duration,
    pub default_timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(100),
            backoff_max: Duration::from_millis(500),
            default_timeout: Duration::from_secs(10),
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Found(Match),
    Vanished,
    TimedOut { elapsed: Duration },
}

/// Polls the matcher until an asset appears or vanishes
///
/// Every poll uses the adaptive matcher pass. After a run of misses the
/// interval grows by half each poll, up to `backoff_max`.
pub struct ImageWaiter {
    matcher: Arc<dyn Matcher>,
    settings: WaitSettings,
}

impl ImageWaiter {
    pub fn new(matcher: Arc<dyn Matcher>, settings: WaitSettings) -> Self {
        Self { matcher, settings }
    }

    pub fn settings(&self) -> WaitSettings {
        self.settings
    }

    pub fn wait_appear(
        &self,
        asset_id: &str,
        region: Option<Region>,
        timeout: Option<Duration>,
    ) -> CapabilityResult<WaitOutcome> {
        self.poll(asset_id, region, timeout, true)
    }

    pub fn wait_vanish(
        &self,
        asset_id: &str,
        region: Option<Region>,
        timeout: Option<Duration>,
    ) -> CapabilityResult<WaitOutcome> {
        self.poll(asset_id, region, timeout, false)
    }

    fn poll(
        &self,
        asset_id: &str,
        region: Option<Region>,
        timeout: Option<Duration>,
        appear: bool,
    ) -> CapabilityResult<WaitOutcome> {
        let timeout = timeout.unwrap_or(self.settings.default_timeout);
        let start = Instant::now();
        let mut interval = self.settings.poll;
        let mut misses = 0u32;

        info!(
            asset = %asset_id,
            until = if appear { "appear" } else { "vanish" },
            timeout_ms = timeout.as_millis() as u64,
            "Waiting for asset"
        );

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(asset = %asset_id, elapsed_ms = elapsed.as_millis() as u64, "Wait timed out");
                return Ok(WaitOutcome::TimedOut { elapsed });
            }

            let found = self.matcher.find_adaptive(asset_id, region, true)?;
            match (appear, found) {
                (true, Some(m)) => {
                    info!(
                        asset = %asset_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        confidence = m.confidence,
                        "Asset found"
                    );
                    return Ok(WaitOutcome::Found(m));
                }
                (false, None) => {
                    info!(asset = %asset_id, elapsed_ms = elapsed.as_millis() as u64, "Asset vanished");
                    return Ok(WaitOutcome::Vanished);
                }
                (true, None) => misses += 1,
                (false, Some(_)) => misses = 0,
            }

            interval = if misses > BACKOFF_AFTER_MISSES {
                interval.mul_f64(1.5).min(self.settings.backoff_max)
            } else {
                self.settings.poll
            };

            let remaining = timeout.saturating_sub(start.elapsed());
            std::thread::sleep(interval.min(remaining));
        }
    }
}
