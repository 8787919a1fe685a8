//! Execution hooks

use retro_core::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where execution currently is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Answer of [`StepHook::before_step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepVerdict {
    Continue,
    /// Stop the run with [`ScriptError::Aborted`](crate::ScriptError::Aborted)
    Abort,
}

/// Observer the interpreter consults while it runs
///
/// `before_step` is called on the interpreter thread before every statement
/// that carries a source line and may block until the run should proceed.
pub trait StepHook: Send + Sync {
    fn before_step(&self, location: &Location, action: &str) -> StepVerdict;

    fn enter_flow(&self, _name: &str, _location: Option<&Location>) {}

    fn exit_flow(&self, _name: &str) {}

    fn variable_changed(&self, _name: &str, _value: &Value) {}
}

/// Hook that never pauses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl StepHook for NoopHook {
    fn before_step(&self, _location: &Location, _action: &str) -> StepVerdict {
        StepVerdict::Continue
    }
}
