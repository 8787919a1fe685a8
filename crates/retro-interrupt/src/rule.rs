//! Interrupt rule types
//!
//! Rules deserialize from the `interrupts` list of a script document:
//!
//! ```yaml
//! - id: close_popup
//!   priority: 10
//!   trigger: {type: image, asset: popup_close}
//!   handler:
//!     actions:
//!       - {type: click}
//!       - {type: delay, ms: 300}
//! - id: panic_key
//!   priority: 100
//!   trigger: {type: hotkey, combo: ctrl+shift+q}
//!   handler: {flow: emergency_stop}
//! ```

use retro_core::{MouseButton, Region};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

fn default_clicks() -> u32 {
    1
}

/// A priority-ordered, cooldown-guarded trigger and its handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptRule {
    pub id: String,

    /// Higher priorities are checked first
    #[serde(default)]
    pub priority: i32,

    pub trigger: Trigger,

    pub handler: Handler,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl InterruptRule {
    pub fn new(id: impl Into<String>, priority: i32, trigger: Trigger, handler: Handler) -> Self {
        Self {
            id: id.into(),
            priority,
            trigger,
            handler,
            enabled: true,
        }
    }
}

/// Condition that fires a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Asset visible on screen, optionally within a region
    Image {
        asset: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<Region>,
    },
    /// Key combination currently held (`ctrl+shift+q`)
    Hotkey { combo: String },
}

impl Trigger {
    pub fn image(asset: impl Into<String>) -> Self {
        Trigger::Image {
            asset: asset.into(),
            region: None,
        }
    }

    pub fn hotkey(combo: impl Into<String>) -> Self {
        Trigger::Hotkey {
            combo: combo.into(),
        }
    }

    /// Cooldown key: rules sharing a trigger payload share a cooldown
    pub fn cooldown_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Image { asset, region: None } => write!(f, "image:{}", asset),
            Trigger::Image {
                asset,
                region: Some(r),
            } => write!(f, "image:{}@{},{},{},{}", asset, r.x, r.y, r.w, r.h),
            Trigger::Hotkey { combo } => write!(f, "hotkey:{}", combo.to_lowercase()),
        }
    }
}

/// What a fired rule does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    /// Inline actions run on the scanner thread
    Actions(Vec<InterruptAction>),
    /// Ask the host to run a flow
    Flow(String),
}

/// A single inline interrupt action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterruptAction {
    /// Click at `x`,`y`, or at the match centre when either is absent
    Click {
        #[serde(default)]
        x: Option<i32>,
        #[serde(default)]
        y: Option<i32>,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_clicks")]
        clicks: u32,
    },
    Delay {
        ms: u64,
    },
    DelayRandom {
        min_ms: u64,
        max_ms: u64,
    },
    Hotkey {
        keys: Vec<String>,
    },
    Press {
        key: String,
    },
    TypeText {
        text: String,
        /// Press enter after typing
        #[serde(default)]
        enter: bool,
    },
    Scroll {
        amount: i32,
    },
    Drag {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    },
}

impl InterruptAction {
    pub fn name(&self) -> &'static str {
        match self {
            InterruptAction::Click { .. } => "click",
            InterruptAction::Delay { .. } => "delay",
            InterruptAction::DelayRandom { .. } => "delay_random",
            InterruptAction::Hotkey { .. } => "hotkey",
            InterruptAction::Press { .. } => "press",
            InterruptAction::TypeText { .. } => "type_text",
            InterruptAction::Scroll { .. } => "scroll",
            InterruptAction::Drag { .. } => "drag",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_from_json() {
        let rule: InterruptRule = serde_json::from_value(json!({
            "id": "popup",
            "priority": 10,
            "trigger": {"type": "image", "asset": "popup_close", "region": {"x": 0, "y": 0, "w": 100, "h": 50}},
            "handler": {"actions": [
                {"type": "click"},
                {"type": "click", "x": 5, "y": 6, "button": "right", "clicks": 2},
                {"type": "type_text", "text": "ok", "enter": true}
            ]}
        }))
        .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.trigger.cooldown_key(), "image:popup_close@0,0,100,50");
        let Handler::Actions(actions) = &rule.handler else {
            panic!("expected inline actions");
        };
        assert_eq!(
            actions[0],
            InterruptAction::Click { x: None, y: None, button: MouseButton::Left, clicks: 1 }
        );
        assert_eq!(actions[1].name(), "click");
        assert_eq!(actions[2].name(), "type_text");
    }

    #[test]
    fn test_flow_handler_and_hotkey_trigger() {
        let rule: InterruptRule = serde_json::from_value(json!({
            "id": "panic",
            "trigger": {"type": "hotkey", "combo": "Ctrl+Q"},
            "handler": {"flow": "emergency"},
            "enabled": false
        }))
        .unwrap();
        assert_eq!(rule.priority, 0);
        assert!(!rule.enabled);
        assert_eq!(rule.handler, Handler::Flow("emergency".into()));
        assert_eq!(rule.trigger.cooldown_key(), "hotkey:ctrl+q");
    }
}
