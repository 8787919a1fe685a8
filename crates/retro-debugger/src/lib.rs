//! Debugger for RetroAuto scripts
//!
//! The [`Debugger`] is attached to an interpreter as its
//! [`StepHook`](retro_script::StepHook) and controlled from another thread.
//! Breakpoints live in a [`BreakpointStore`] that both sides share; a halted
//! interpreter blocks inside `before_step` until the controller resumes it.
//!
//! # Key Types
//!
//! - [`Debugger`] - State machine, stepping and variable inspection
//! - [`BreakpointStore`] - Breakpoints keyed by id and `(file, line)`
//! - [`StackFrame`], [`Variable`] - Inspector views
//! - [`DebugObserver`] - Pause/resume/step/stop notifications
//! - [`evaluate_watch`] - Restricted expression evaluator for watches

mod breakpoint;
mod debugger;
mod error;
mod frame;
mod watch;

pub use breakpoint::{Breakpoint, BreakpointId, BreakpointStore};
pub use debugger::{DebugObserver, DebugState, Debugger, PauseReason, StepMode};
pub use error::{DebugError, DebugResult, WatchError};
pub use frame::{FrameId, StackFrame, Variable};
pub use watch::{evaluate_watch, parse_watch, MAX_WATCH_DEPTH, MAX_WATCH_TOKENS};
