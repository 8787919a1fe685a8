//! Run sessions for RetroAuto scripts
//!
//! Loads a [`ScriptDocument`] (a program plus interrupt rules) and runs it
//! through a [`RunSession`], which owns the builtin registry, the optional
//! debugger and the interrupt scanner for that run.
//!
//! # Example
//!
//! ```ignore
//! use retro_runner::{RunSession, ScriptDocument};
//!
//! let document = ScriptDocument::load("farm.yaml")?;
//! let session = RunSession::builder(document, policy, automation)
//!     .debugger(debugger)
//!     .build();
//! let result = session.run()?;
//! ```

mod document;
mod error;
mod hook;
mod session;

pub use document::ScriptDocument;
pub use error::{RunResult, RunnerError};
pub use session::{RunSession, RunSessionBuilder};
