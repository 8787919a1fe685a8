//! Capability traits for vision, OCR and device input
//!
//! The runtime never talks to the screen or the OS input queue directly.
//! Backends implement these traits and are handed to the builtin layer and
//! the interrupt scanner as `Arc<dyn Trait>`.

use crate::error::CapabilityResult;
use crate::geometry::{Match, Region};
use serde::{Deserialize, Serialize};

/// Template matcher over the live screen
pub trait Matcher: Send + Sync {
    /// Locate an asset at its configured threshold
    fn find(&self, asset_id: &str, region: Option<Region>) -> CapabilityResult<Option<Match>> {
        self.find_adaptive(asset_id, region, false)
    }

    /// Locate an asset; `adaptive` allows a widened, lower-threshold pass
    fn find_adaptive(
        &self,
        asset_id: &str,
        region: Option<Region>,
        adaptive: bool,
    ) -> CapabilityResult<Option<Match>>;
}

/// What a text reader should look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ImageSource {
    /// Capture the screen, optionally limited to a region
    Screen { region: Option<Region> },
    /// A registered image asset
    Asset { id: String },
}

/// One recognized run of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(rename = "box")]
    pub bounds: Region,
    pub confidence: f64,
}

/// OCR backend
pub trait TextReader: Send + Sync {
    fn read(&self, image: &ImageSource) -> CapabilityResult<Vec<TextBlock>>;
}

/// Mouse button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

/// Mouse and keyboard driver
///
/// Callers must hold the [`InputGate`](crate::InputGate) while issuing
/// device actions so two actors never drive the device at once.
pub trait InputController: Send + Sync {
    fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> CapabilityResult<()>;
    fn move_to(&self, x: i32, y: i32) -> CapabilityResult<()>;
    fn press(&self, key: &str) -> CapabilityResult<()>;
    fn type_text(&self, text: &str) -> CapabilityResult<()>;
    fn hotkey(&self, keys: &[String]) -> CapabilityResult<()>;
    fn scroll(&self, amount: i32) -> CapabilityResult<()>;
    fn drag(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> CapabilityResult<()>;
}

/// Reports whether a hotkey combination is currently held
pub trait HotkeyProbe: Send + Sync {
    /// `combo` uses `+` separated key names, e.g. `ctrl+shift+f12`
    fn is_active(&self, combo: &str) -> bool;
}
