//! Runtime configuration
//!
//! ```yaml
//! logging:
//!   level: info
//! security:
//!   permissions: [screen_read, input_control]
//!   allowed_domains: [example.com]
//!   max_execution_time_secs: !env_var RETRO_MAX_SECS 600
//! scanner:
//!   poll_interval_ms: 200
//! automation:
//!   wait_poll_ms: 100
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::loader::{load_yaml_file, load_yaml_str};
use retro_builtins::WaitSettings;
use retro_interrupt::ScannerConfig;
use retro_security::{Permission, SecurityPolicy};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Top-level runtime configuration; every section is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub scanner: ScannerSection,
    pub automation: AutomationConfig,

    /// File the config was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// The `security:` section; absent means no permissions at all
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub permissions: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub allowed_paths: Vec<PathBuf>,
    pub max_execution_time_secs: Option<u64>,
    pub max_memory_mb: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    pub poll_interval_ms: u64,
    pub idle_interval_ms: u64,
    pub idle_after: u32,
    pub cooldown_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for ScannerSection {
    fn default() -> Self {
        let defaults = ScannerConfig::default();
        Self {
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            idle_interval_ms: defaults.idle_interval.as_millis() as u64,
            idle_after: defaults.idle_after,
            cooldown_ms: defaults.cooldown.as_millis() as u64,
            join_timeout_ms: defaults.join_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub wait_poll_ms: u64,
    pub wait_backoff_max_ms: u64,
    pub default_wait_timeout_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        let defaults = WaitSettings::default();
        Self {
            wait_poll_ms: defaults.poll.as_millis() as u64,
            wait_backoff_max_ms: defaults.backoff_max.as_millis() as u64,
            default_wait_timeout_ms: defaults.default_timeout.as_millis() as u64,
        }
    }
}

impl RuntimeConfig {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let value = load_yaml_file(path)?;
        let mut config = Self::from_value(value, path)?;
        config.source = Some(path.to_path_buf());
        info!(path = %path.display(), "Runtime config loaded");
        Ok(config)
    }

    /// Parse YAML text; `source` names it in errors
    pub fn from_yaml_str(content: &str, source: impl AsRef<Path>) -> ConfigResult<Self> {
        let source = source.as_ref();
        let value = load_yaml_str(content, source)?;
        Self::from_value(value, source)
    }

    fn from_value(value: Value, source: &Path) -> ConfigResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(|e| ConfigError::Yaml {
            path: source.to_path_buf(),
            source: e,
        })
    }

    fn source_path(&self) -> PathBuf {
        self.source.clone().unwrap_or_else(|| PathBuf::from("<config>"))
    }

    /// Granted permissions, parsed from `security.permissions`
    pub fn permissions(&self) -> ConfigResult<Permission> {
        self.security
            .permissions
            .iter()
            .try_fold(Permission::empty(), |acc, name| {
                Permission::from_name(name)
                    .map(|p| acc | p)
                    .map_err(|_| ConfigError::InvalidPermission {
                        name: name.clone(),
                        path: self.source_path(),
                    })
            })
    }

    /// Build the immutable policy for a run
    pub fn security_policy(&self) -> ConfigResult<SecurityPolicy> {
        let security = &self.security;
        let mut policy = SecurityPolicy::none().with_permissions(self.permissions()?);
        for domain in &security.allowed_domains {
            policy = policy.allow_domain(domain.clone());
        }
        for path in &security.allowed_paths {
            policy = policy.allow_path(path.clone());
        }
        if let Some(secs) = security.max_execution_time_secs {
            policy = policy.with_max_execution_time(Duration::from_secs(secs));
        }
        if let Some(mb) = security.max_memory_mb {
            policy = policy.with_max_memory_mb(mb);
        }
        Ok(policy)
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        let s = &self.scanner;
        ScannerConfig {
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            idle_interval: Duration::from_millis(s.idle_interval_ms),
            idle_after: s.idle_after,
            cooldown: Duration::from_millis(s.cooldown_ms),
            join_timeout: Duration::from_millis(s.join_timeout_ms),
        }
    }

    pub fn wait_settings(&self) -> WaitSettings {
        let a = &self.automation;
        WaitSettings {
            poll: Duration::from_millis(a.wait_poll_ms),
            backoff_max: Duration::from_millis(a.wait_backoff_max_ms),
            default_timeout: Duration::from_millis(a.default_wait_timeout_ms),
        }
    }
}
