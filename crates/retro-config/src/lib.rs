//! Runtime configuration for RetroAuto
//!
//! Loads a YAML file into [`RuntimeConfig`] and derives the per-run
//! [`SecurityPolicy`](retro_security::SecurityPolicy), scanner pacing and
//! wait settings from it.
//!
//! Supported tag:
//!
//! - `!env_var NAME [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use retro_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::load("retroauto.yaml")?;
//! let policy = config.security_policy()?;
//! ```

mod config;
mod error;
mod loader;

pub use config::{AutomationConfig, LoggingConfig, RuntimeConfig, ScannerSection, SecurityConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml_file, load_yaml_str};
