//! Security violations

use std::path::PathBuf;
use thiserror::Error;

/// A denied capability check
///
/// Scripts see this like any other fault; it is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: String },

    #[error("Network access to '{host}' is not allowed")]
    DomainNotAllowed { host: String },

    #[error("Invalid URL '{url}'")]
    InvalidUrl { url: String },

    #[error("Filesystem access to {} is not allowed", .path.display())]
    PathNotAllowed { path: PathBuf },
}

impl SecurityViolation {
    /// Name of the missing permission, when that is what failed
    pub fn permission(&self) -> Option<&str> {
        match self {
            Self::PermissionDenied { permission } => Some(permission),
            _ => None,
        }
    }
}
