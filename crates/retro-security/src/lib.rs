//! Security policy for RetroAuto scripts
//!
//! A script only performs effects through builtins, and every effectful
//! builtin names the [`Permission`] it needs. The [`SecurityPolicy`] built
//! before a run decides, failing closed, whether that permission was granted.
//!
//! # Key Types
//!
//! - [`Permission`] - Capability bits, combinable into sets
//! - [`SecurityPolicy`] - Granted permissions plus domain/path allow-lists
//! - [`SecurityViolation`] - Raised when a check fails

mod error;
mod permission;
mod policy;

pub use error::SecurityViolation;
pub use permission::{Permission, UnknownPermission};
pub use policy::SecurityPolicy;
