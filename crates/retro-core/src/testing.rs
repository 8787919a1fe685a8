//! In-memory capability backends
//!
//! Used by tests across the workspace; enabled outside this crate with the
//! `testing` feature. All of them are thread-safe so a test thread can change what the
//! "screen" shows while a scanner thread is polling it.

use crate::capability::{HotkeyProbe, ImageSource, InputController, Matcher, MouseButton, TextBlock, TextReader};
use crate::error::{CapabilityError, CapabilityResult};
use crate::geometry::{Match, Region};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Matcher whose screen contents are set by the caller
#[derive(Debug, Default)]
pub struct ScriptedMatcher {
    visible: DashMap<String, Match>,
    /// Assets only found by an adaptive pass
    faint: DashMap<String, Match>,
    lookups: AtomicUsize,
}

impl ScriptedMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `asset_id` visible at the given bounds with confidence 0.95
    pub fn show(&self, asset_id: impl Into<String>, x: i32, y: i32, w: i32, h: i32) {
        self.visible
            .insert(asset_id.into(), Match::new(x, y, w, h, 0.95));
    }

    /// Make `asset_id` findable only with the adaptive threshold
    pub fn show_faint(&self, asset_id: impl Into<String>, x: i32, y: i32, w: i32, h: i32) {
        self.faint.insert(asset_id.into(), Match::new(x, y, w, h, 0.65));
    }

    pub fn hide(&self, asset_id: &str) {
        self.visible.remove(asset_id);
        self.faint.remove(asset_id);
    }

    /// Number of find calls served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Matcher for ScriptedMatcher {
    fn find_adaptive(
        &self,
        asset_id: &str,
        region: Option<Region>,
        adaptive: bool,
    ) -> CapabilityResult<Option<Match>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let found = self
            .visible
            .get(asset_id)
            .map(|m| m.value().clone())
            .or_else(|| {
                adaptive
                    .then(|| self.faint.get(asset_id).map(|m| m.value().clone()))
                    .flatten()
            });

        Ok(found
            .filter(|m| region.map_or(true, |r| r.contains(m.x, m.y)))
            .map(|m| Match::new(m.x, m.y, m.w, m.h, m.confidence)))
    }
}

/// A device action captured by [`RecordingInput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        count: u32,
    },
    Move { x: i32, y: i32 },
    Press(String),
    Type(String),
    Hotkey(Vec<String>),
    Scroll(i32),
    Drag { from: (i32, i32), to: (i32, i32) },
}

/// Input backend that records instead of driving a device
#[derive(Debug, Default)]
pub struct RecordingInput {
    actions: Mutex<Vec<InputAction>>,
    failing: AtomicBool,
}

impl RecordingInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent action fail with a device error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<InputAction> {
        self.actions.lock().clone()
    }

    pub fn clear(&self) {
        self.actions.lock().clear();
    }

    fn record(&self, action: InputAction) -> CapabilityResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CapabilityError::Device(format!("rejected {:?}", action)));
        }
        self.actions.lock().push(action);
        Ok(())
    }
}

impl InputController for RecordingInput {
    fn click(&self, x: i32, y: i32, button: MouseButton, count: u32) -> CapabilityResult<()> {
        self.record(InputAction::Click {
            x,
            y,
            button,
            count,
        })
    }

    fn move_to(&self, x: i32, y: i32) -> CapabilityResult<()> {
        self.record(InputAction::Move { x, y })
    }

    fn press(&self, key: &str) -> CapabilityResult<()> {
        self.record(InputAction::Press(key.to_string()))
    }

    fn type_text(&self, text: &str) -> CapabilityResult<()> {
        self.record(InputAction::Type(text.to_string()))
    }

    fn hotkey(&self, keys: &[String]) -> CapabilityResult<()> {
        self.record(InputAction::Hotkey(keys.to_vec()))
    }

    fn scroll(&self, amount: i32) -> CapabilityResult<()> {
        self.record(InputAction::Scroll(amount))
    }

    fn drag(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> CapabilityResult<()> {
        self.record(InputAction::Drag {
            from: (x1, y1),
            to: (x2, y2),
        })
    }
}

/// Hotkey probe whose held combos are set by the caller
#[derive(Debug, Default)]
pub struct StaticHotkeys {
    held: DashSet<String>,
}

impl StaticHotkeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self, combo: impl Into<String>) {
        self.held.insert(combo.into().to_ascii_lowercase());
    }

    pub fn release(&self, combo: &str) {
        self.held.remove(&combo.to_ascii_lowercase());
    }
}

impl HotkeyProbe for StaticHotkeys {
    fn is_active(&self, combo: &str) -> bool {
        self.held.contains(&combo.to_ascii_lowercase())
    }
}

/// Text reader that always returns the same blocks
#[derive(Debug, Default)]
pub struct StaticTextReader {
    blocks: Vec<TextBlock>,
}

impl StaticTextReader {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self { blocks }
    }

    /// One block per word, laid out left to right
    pub fn from_words(text: &str) -> Self {
        let blocks = text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| TextBlock {
                text: word.to_string(),
                bounds: Region::new(i as i32 * 60, 0, 50, 20),
                confidence: 0.9,
            })
            .collect();
        Self { blocks }
    }
}

impl TextReader for StaticTextReader {
    fn read(&self, image: &ImageSource) -> CapabilityResult<Vec<TextBlock>> {
        Ok(match image {
            ImageSource::Screen { region: Some(r) } => self
                .blocks
                .iter()
                .filter(|b| r.contains(b.bounds.x, b.bounds.y))
                .cloned()
                .collect(),
            _ => self.blocks.clone(),
        })
    }
}
