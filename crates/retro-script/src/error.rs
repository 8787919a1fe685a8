//! Interpreter error taxonomy

use crate::ast::Span;
use retro_builtins::BuiltinError;
use retro_security::SecurityViolation;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for script execution
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Scope lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Undefined global: {0}")]
    UndefinedGlobal(String),
}

/// What went wrong in an interpreter fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    UndefinedVariable,
    UnknownFunction,
    UnknownFlow,
    TypeMismatch,
    DivisionByZero,
    InvalidAssignment,
    InvalidLiteral,
    IndexOutOfRange,
    KeyNotFound,
    Overflow,
    ArgumentMismatch,
    CallDepthExceeded,
    MisplacedControl,
}

/// The AST node a fault was raised at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeInfo {
    pub kind: &'static str,
    pub span: Option<Span>,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at line {}", self.kind, span.line),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Errors raised while executing a script
///
/// Everything except [`Aborted`](Self::Aborted) and
/// [`DeadlineExceeded`](Self::DeadlineExceeded) can be caught by `try`.
/// The displayed text is what a `catch` variable receives.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("{message}")]
    Fault {
        kind: FaultKind,
        message: String,
        node: Option<NodeInfo>,
    },

    #[error(transparent)]
    Security(#[from] SecurityViolation),

    #[error("{function}() takes {expected} arguments, got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("Cannot iterate over {type_name}")]
    Iteration {
        type_name: &'static str,
        node: Option<NodeInfo>,
    },

    #[error(transparent)]
    Builtin(BuiltinError),

    #[error("Execution aborted")]
    Aborted,

    #[error("Execution time limit of {}s exceeded", .limit.as_secs_f64())]
    DeadlineExceeded { limit: Duration },
}

impl ScriptError {
    pub fn fault(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::Fault {
            kind,
            message: message.into(),
            node: None,
        }
    }

    /// Fault tagged with the expression or statement kind it came from
    pub fn fault_at(kind: FaultKind, node: &'static str, message: impl Into<String>) -> Self {
        Self::Fault {
            kind,
            message: message.into(),
            node: Some(NodeInfo { kind: node, span: None }),
        }
    }

    /// Whether a `try` block may recover from this error
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Self::Aborted | Self::DeadlineExceeded { .. })
    }

    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Fault { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn node(&self) -> Option<&NodeInfo> {
        match self {
            Self::Fault { node, .. } | Self::Iteration { node, .. } => node.as_ref(),
            _ => None,
        }
    }

    /// Fill in the source span if the error does not carry one yet
    pub(crate) fn with_span(mut self, stmt_kind: &'static str, span: Option<Span>) -> Self {
        if let Self::Fault { node, .. } | Self::Iteration { node, .. } = &mut self {
            match node {
                Some(info) if info.span.is_none() => info.span = span,
                Some(_) => {}
                None => {
                    *node = Some(NodeInfo {
                        kind: stmt_kind,
                        span,
                    })
                }
            }
        }
        self
    }
}

impl From<ScopeError> for ScriptError {
    fn from(err: ScopeError) -> Self {
        Self::fault(FaultKind::UndefinedVariable, err.to_string())
    }
}

impl From<BuiltinError> for ScriptError {
    fn from(err: BuiltinError) -> Self {
        match err {
            BuiltinError::UnknownFunction(_) => {
                Self::fault(FaultKind::UnknownFunction, err.to_string())
            }
            BuiltinError::Security(violation) => Self::Security(violation),
            BuiltinError::Arity {
                name,
                expected,
                got,
            } => Self::Arity {
                function: name,
                expected,
                got,
            },
            other => Self::Builtin(other),
        }
    }
}
