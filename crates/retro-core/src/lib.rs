//! Core types for RetroAuto
//!
//! This crate provides the fundamental types shared by the script runtime:
//! the dynamic [`Value`], screen geometry and [`Match`] results, the
//! capability traits through which the runtime reaches vision and input
//! devices, the [`InputGate`] that serializes device input, and the
//! thread-safe [`Signal`] event primitive.
//!
//! # Key Types
//!
//! - [`Value`] - A script value (null, bool, number, string, list, map)
//! - [`Match`] - A located, confidence-scored detection result
//! - [`Matcher`], [`TextReader`], [`InputController`], [`HotkeyProbe`] - Capabilities
//! - [`InputGate`] - Mutually exclusive access to the input device
//! - [`Signal`] - Set/clear/wait event shared across threads

mod capability;
mod duration;
mod error;
mod geometry;
mod input_gate;
mod signal;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod value;

pub use capability::{HotkeyProbe, ImageSource, InputController, Matcher, MouseButton, TextBlock, TextReader};
pub use duration::{parse_duration_ms, DurationError};
pub use error::{CapabilityError, CapabilityResult};
pub use geometry::{Match, Region};
pub use input_gate::{InputGate, InputSession};
pub use signal::Signal;
pub use value::{Value, ValueMap};

/// Default confidence threshold for template matching
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

/// Lowest confidence an adaptive matcher pass may accept
pub const ADAPTIVE_MATCH_FLOOR: f64 = 0.6;
