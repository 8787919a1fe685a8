//! Per-trigger cooldown windows

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default window during which a fired trigger is ignored
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Last-fired timestamps keyed by trigger payload
#[derive(Debug, Clone)]
pub struct CooldownTracker {
    window: Duration,
    fired: HashMap<String, Instant>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            fired: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_cooling(&self, key: &str) -> bool {
        self.is_cooling_at(key, Instant::now())
    }

    pub fn is_cooling_at(&self, key: &str, now: Instant) -> bool {
        self.remaining_at(key, now).is_some()
    }

    /// Time left in the window, if the key is cooling
    pub fn remaining_at(&self, key: &str, now: Instant) -> Option<Duration> {
        let fired = self.fired.get(key)?;
        let elapsed = now.saturating_duration_since(*fired);
        (elapsed < self.window).then(|| self.window - elapsed)
    }

    pub fn mark(&mut self, key: impl Into<String>) {
        self.mark_at(key, Instant::now());
    }

    pub fn mark_at(&mut self, key: impl Into<String>, now: Instant) {
        self.fired.insert(key.into(), now);
    }

    pub fn clear(&mut self) {
        self.fired.clear();
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_boundaries() {
        let mut tracker = CooldownTracker::new(Duration::from_secs(2));
        let t0 = Instant::now();
        tracker.mark_at("image:popup", t0);

        assert!(tracker.is_cooling_at("image:popup", t0));
        assert!(tracker.is_cooling_at("image:popup", t0 + Duration::from_millis(1999)));
        assert!(!tracker.is_cooling_at("image:popup", t0 + Duration::from_secs(2)));
        assert!(!tracker.is_cooling_at("image:other", t0));
        assert_eq!(
            tracker.remaining_at("image:popup", t0 + Duration::from_millis(500)),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_clear() {
        let mut tracker = CooldownTracker::default();
        tracker.mark("a");
        tracker.mark("b");
        assert_eq!(tracker.len(), 2);
        tracker.clear();
        assert!(tracker.is_empty());
        assert!(!tracker.is_cooling("a"));
    }
}
