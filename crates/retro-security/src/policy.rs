//! The per-run security policy

use crate::error::SecurityViolation;
use crate::permission::Permission;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{trace, warn};

/// Granted permissions and resource allow-lists for one script run
///
/// Built once before execution and treated as immutable for the run.
/// The default policy grants nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityPolicy {
    permissions: Permission,
    allowed_domains: Vec<String>,
    allowed_paths: Vec<PathBuf>,
    max_execution_time: Option<Duration>,
    max_memory_mb: Option<u64>,
}

impl SecurityPolicy {
    /// A policy that grants nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// A policy that grants every permission with no allow-lists
    pub fn unrestricted() -> Self {
        Self::default().with_permissions(Permission::UNSAFE)
    }

    /// Add permissions to the granted set
    pub fn with_permissions(mut self, permissions: Permission) -> Self {
        self.permissions |= permissions;
        self
    }

    /// Restrict network access to `domain` and its subdomains
    pub fn allow_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains
            .push(domain.into().trim().trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Restrict filesystem access to paths under `path`
    pub fn allow_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.allowed_paths.push(normalize(&path.into()));
        self
    }

    pub fn with_max_execution_time(mut self, limit: Duration) -> Self {
        self.max_execution_time = Some(limit);
        self
    }

    pub fn with_max_memory_mb(mut self, limit: u64) -> Self {
        self.max_memory_mb = Some(limit);
        self
    }

    pub fn permissions(&self) -> Permission {
        self.permissions
    }

    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed_domains
    }

    pub fn allowed_paths(&self) -> &[PathBuf] {
        &self.allowed_paths
    }

    pub fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time
    }

    pub fn max_memory_mb(&self) -> Option<u64> {
        self.max_memory_mb
    }

    /// Whether every bit of `required` is granted
    pub fn allows(&self, required: Permission) -> bool {
        self.permissions.contains(required)
    }

    /// Fail closed unless every bit of `required` is granted
    pub fn check(&self, required: Permission) -> Result<(), SecurityViolation> {
        let missing = required.difference(self.permissions);
        if missing.is_empty() {
            trace!(permission = %required.describe(), "Permission granted");
            return Ok(());
        }

        warn!(permission = %missing.describe(), "Permission denied");
        Err(SecurityViolation::PermissionDenied {
            permission: missing.describe(),
        })
    }

    /// Check a network request to `url`
    ///
    /// `ws`/`wss` need `NET_WEBSOCKET`, `http`/`https` need `NET_HTTP`.
    /// A non-empty domain allow-list must contain the host or a parent of it.
    pub fn check_network(&self, url: &str) -> Result<(), SecurityViolation> {
        let invalid = || SecurityViolation::InvalidUrl {
            url: url.to_string(),
        };

        let (scheme, rest) = url.split_once("://").ok_or_else(invalid)?;
        let required = match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => Permission::NET_HTTP,
            "ws" | "wss" => Permission::NET_WEBSOCKET,
            _ => return Err(invalid()),
        };
        self.check(required)?;

        let host = extract_host(rest).ok_or_else(invalid)?;
        if self.allowed_domains.is_empty() {
            return Ok(());
        }

        let allowed = self
            .allowed_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)));
        if allowed {
            Ok(())
        } else {
            warn!(host = %host, "Domain not in allow-list");
            Err(SecurityViolation::DomainNotAllowed { host })
        }
    }

    /// Check filesystem access to `path`
    ///
    /// Paths are compared lexically after resolving `.` and `..`.
    pub fn check_fs(&self, path: impl AsRef<Path>, write: bool) -> Result<(), SecurityViolation> {
        self.check(if write {
            Permission::FS_WRITE
        } else {
            Permission::FS_READ
        })?;

        if self.allowed_paths.is_empty() {
            return Ok(());
        }

        let path = normalize(path.as_ref());
        if self.allowed_paths.iter().any(|root| path.starts_with(root)) {
            Ok(())
        } else {
            warn!(path = %path.display(), "Path not in allow-list");
            Err(SecurityViolation::PathNotAllowed { path })
        }
    }
}

fn extract_host(rest: &str) -> Option<String> {
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        bracketed.split(']').next()?
    } else {
        authority.split(':').next()?
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
