//! Interrupt scanner for RetroAuto
//!
//! While a script runs, the [`InterruptScanner`] polls the screen (and
//! optionally held hotkeys) on its own thread. When the highest-priority rule
//! whose trigger is not cooling down matches, its handler runs: inline
//! actions execute under the shared input gate, flow handlers are handed to
//! the host as [`FlowRequest`]s.
//!
//! # Key Types
//!
//! - [`InterruptRule`], [`Trigger`], [`Handler`], [`InterruptAction`] - Rule model (serde)
//! - [`CooldownTracker`] - Fixed re-fire window per trigger payload
//! - [`InterruptScanner`] - Scan loop with pause gate and bounded stop
//! - [`InterruptObserver`] - Interrupt begin/complete notifications

mod cooldown;
mod error;
mod rule;
mod scanner;

pub use cooldown::{CooldownTracker, DEFAULT_COOLDOWN};
pub use error::{InterruptError, InterruptResult};
pub use rule::{Handler, InterruptAction, InterruptRule, Trigger};
pub use scanner::{FlowRequest, InterruptObserver, InterruptScanner, ScannerConfig, ScannerState};
