//! Backends for `retroauto run`
//!
//! Nothing touches the real screen or input queue. The matcher reports a
//! fixed set of assets as visible and the input device only logs.

use retro_core::{CapabilityResult, InputController, Match, Matcher, MouseButton, Region};
use std::collections::HashSet;
use tracing::info;

/// Bounds reported for every visible asset
const ASSET_BOUNDS: (i32, i32, i32, i32) = (0, 0, 32, 32);

#[derive(Debug, Default)]
pub struct DryRunMatcher {
    visible: HashSet<String>,
}

impl DryRunMatcher {
    pub fn new(visible: impl IntoIterator<Item = String>) -> Self {
        Self {
            visible: visible.into_iter().collect(),
        }
    }
}

impl Matcher for DryRunMatcher {
    fn find_adaptive(
        &self,
        asset_id: &str,
        region: Option<Region>,
        _adaptive: bool,
    ) -> CapabilityResult<Option<Match>> {
        if !self.visible.contains(asset_id) {
            return Ok(None);
        }
        let (x, y, w, h) = ASSET_BOUNDS;
        Ok(region
            .map_or(true, |r| r.contains(x, y))
            .then(|| Match::new(x, y, w, h, 1.0)))
    }
}

/// Input device that logs each action at info level
#[derive(Debug, Default)]
pub struct DryRunInput;

impl InputController for DryRunInput {
    fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> CapabilityResult<()> {
        info!(target: "input", x, y, button = button.as_str(), count, "click");
        Ok(())
    }

    fn move_to(&self, x: i32, y: i32) -> CapabilityResult<()> {
        info!(target: "input", x, y, "move");
        Ok(())
    }

    fn press(&self, key: &str) -> CapabilityResult<()> {
        info!(target: "input", key, "press");
        Ok(())
    }

    fn type_text(&self, text: &str) -> CapabilityResult<()> {
        info!(target: "input", text, "type");
        Ok(())
    }

    fn hotkey(&self, keys: &[String]) -> CapabilityResult<()> {
        info!(target: "input", keys = %keys.join("+"), "hotkey");
        Ok(())
    }

    fn scroll(&self, amount: i32) -> CapabilityResult<()> {
        info!(target: "input", amount, "scroll");
        Ok(())
    }

    fn drag(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> CapabilityResult<()> {
        info!(target: "input", x1, y1, x2, y2, "drag");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_listed_assets_are_visible() {
        let matcher = DryRunMatcher::new(vec!["popup".to_string()]);
        assert!(matcher.find("popup", None).unwrap().is_some());
        assert!(matcher.find("other", None).unwrap().is_none());
        assert!(matcher
            .find("popup", Some(Region::new(100, 100, 10, 10)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_input_always_succeeds() {
        let input = DryRunInput;
        assert!(input.click(1, 2, MouseButton::Right, 2).is_ok());
        assert!(input.hotkey(&["ctrl".to_string(), "s".to_string()]).is_ok());
    }
}
