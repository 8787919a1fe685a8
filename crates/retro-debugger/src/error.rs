//! Debugger errors

use crate::breakpoint::BreakpointId;
use crate::debugger::DebugState;
use crate::frame::FrameId;
use thiserror::Error;

pub type DebugResult<T> = Result<T, DebugError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    #[error("Unknown breakpoint: {0}")]
    UnknownBreakpoint(BreakpointId),

    #[error("Unknown stack frame: {0}")]
    UnknownFrame(FrameId),

    #[error("Cannot {command} while {state}")]
    InvalidState {
        command: &'static str,
        state: DebugState,
    },
}

/// Watch expression parse failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatchError {
    #[error("Empty expression")]
    Empty,

    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unexpected {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Function calls are not allowed in watch expressions: {0}")]
    CallNotAllowed(String),

    #[error("Expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("Expression is longer than {0} tokens")]
    TooLong(usize),
}
