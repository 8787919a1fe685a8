//! Builtin functions for RetroAuto scripts
//!
//! The [`BuiltinRegistry`] maps names to host functions with arity bounds and
//! an optional required [`Permission`](retro_security::Permission). Every call
//! runs through the same checks, in order: the name must be registered, the
//! run's [`SecurityPolicy`](retro_security::SecurityPolicy) must grant the
//! permission, and the positional argument count must fit the bounds.
//!
//! The registry is an explicit instance built before a run and shared
//! read-only (`Arc<BuiltinRegistry>`) while it executes.
//!
//! # Example
//!
//! ```ignore
//! use retro_builtins::{BuiltinRegistry, CallArgs};
//!
//! let registry = BuiltinRegistry::with_stdlib(Arc::new(SecurityPolicy::none()));
//! let upper = registry.call("upper", CallArgs::positional(vec!["abc".into()]))?;
//! ```

mod args;
mod automation;
mod error;
mod registry;
pub mod stdlib;
mod wait;

pub use args::CallArgs;
pub use automation::{register_automation, Automation};
pub use error::{BuiltinError, BuiltinResult};
pub use registry::{Arity, BuiltinFunction, BuiltinHandler, BuiltinRegistry};
pub use wait::{ImageWaiter, WaitOutcome, WaitSettings};
