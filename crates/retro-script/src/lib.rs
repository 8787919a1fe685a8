//! Script interpreter for RetroAuto
//!
//! This crate evaluates a parsed [`Program`]: top-level constants are bound
//! into the global scope, flows are recorded by name, and the main flow runs
//! statement by statement against an [`ExecutionContext`]. Effects happen
//! only through the [`BuiltinRegistry`](retro_builtins::BuiltinRegistry).
//!
//! Before every statement that carries a source line the interpreter asks its
//! [`StepHook`] (normally the debugger) whether to proceed.
//!
//! # Key Types
//!
//! - [`Program`], [`FlowDecl`], [`Stmt`], [`Expr`] - The serde-loadable AST
//! - [`ScopeManager`] - Stack of lexical frames
//! - [`ExecutionContext`] - Scopes plus return/break/continue signalling
//! - [`Interpreter`] - Executes a program
//! - [`ScriptError`] - Faults, security violations, arity and iteration errors

pub mod ast;
mod context;
mod error;
pub mod eval;
mod hook;
mod interpreter;
pub mod ops;
mod scope;

pub use ast::{BinaryOp, ConstDecl, ElifBranch, Expr, FlowDecl, Program, Span, Stmt, StmtKind, UnaryOp};
pub use context::ExecutionContext;
pub use error::{FaultKind, NodeInfo, ScopeError, ScriptError, ScriptResult};
pub use hook::{Location, NoopHook, StepHook, StepVerdict};
pub use interpreter::{Interpreter, MAX_CALL_DEPTH};
pub use scope::{Scope, ScopeManager};

/// Prefix that may precede variable names in source (`$count`)
pub const SIGIL: char = '$';

/// Strip the variable sigil, if present
pub fn strip_sigil(name: &str) -> &str {
    name.strip_prefix(SIGIL).unwrap_or(name)
}
