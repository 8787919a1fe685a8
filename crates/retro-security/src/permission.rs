//! Capability bits required by effectful builtins

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

bitflags! {
    /// Permissions a script must be granted before an effectful builtin runs
    ///
    /// | Permission | Builtins |
    /// |------------|----------|
    /// | [`SCREEN_READ`](Self::SCREEN_READ) | `find`, `exists`, `wait`, `wait_vanish`, `read_text` |
    /// | [`INPUT_CONTROL`](Self::INPUT_CONTROL) | `click`, `move`, `press`, `type`, `scroll`, `drag`, `hotkey` |
    /// | [`FS_READ`](Self::FS_READ), [`FS_WRITE`](Self::FS_WRITE), [`FS_DELETE`](Self::FS_DELETE) | host file access |
    /// | [`NET_HTTP`](Self::NET_HTTP), [`NET_WEBSOCKET`](Self::NET_WEBSOCKET) | host network access |
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permission: u16 {
        const FS_READ       = 1 << 0;
        const FS_WRITE      = 1 << 1;
        const FS_DELETE     = 1 << 2;
        const NET_HTTP      = 1 << 3;
        const NET_WEBSOCKET = 1 << 4;
        const SHELL_EXEC    = 1 << 5;
        const ENV_READ      = 1 << 6;
        const INPUT_CONTROL = 1 << 7;
        const SCREEN_READ   = 1 << 8;
    }
}

/// A permission name that does not exist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl Default for Permission {
    fn default() -> Self {
        Self::empty()
    }
}

impl Permission {
    /// Every filesystem permission
    pub const FS_ALL: Self = Self::FS_READ.union(Self::FS_WRITE).union(Self::FS_DELETE);

    /// Every network permission
    pub const NET_ALL: Self = Self::NET_HTTP.union(Self::NET_WEBSOCKET);

    /// Everything
    pub const UNSAFE: Self = Self::all();

    /// Names of the single permissions contained in this set
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// Human-readable name, `NONE` for the empty set
    pub fn describe(&self) -> String {
        if self.is_empty() {
            "NONE".to_string()
        } else {
            self.names().join(" | ")
        }
    }

    /// Parse a permission name
    ///
    /// Case and `-`/`_` separators are ignored; the composite names
    /// `fs_all`, `net_all` and `unsafe` are accepted.
    pub fn from_name(name: &str) -> Result<Self, UnknownPermission> {
        let normalized = name.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "FS_ALL" => return Ok(Self::FS_ALL),
            "NET_ALL" => return Ok(Self::NET_ALL),
            "UNSAFE" | "ALL" => return Ok(Self::UNSAFE),
            "NONE" => return Ok(Self::empty()),
            _ => {}
        }
        Self::from_name_exact(&normalized).ok_or_else(|| UnknownPermission(name.to_string()))
    }

    fn from_name_exact(name: &str) -> Option<Self> {
        Self::all()
            .iter_names()
            .find(|(flag_name, _)| *flag_name == name)
            .map(|(_, flag)| flag)
    }

    /// Parse and combine a list of names
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownPermission>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .try_fold(Self::empty(), |acc, name| Ok(acc | Self::from_name(name.as_ref())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composites() {
        assert!(Permission::FS_ALL.contains(Permission::FS_DELETE));
        assert!(!Permission::FS_ALL.contains(Permission::NET_HTTP));
        assert!(Permission::UNSAFE.contains(Permission::SCREEN_READ | Permission::SHELL_EXEC));
        assert_eq!(Permission::NET_ALL.names(), vec!["NET_HTTP", "NET_WEBSOCKET"]);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Permission::from_name("screen_read"), Ok(Permission::SCREEN_READ));
        assert_eq!(Permission::from_name("Input-Control"), Ok(Permission::INPUT_CONTROL));
        assert_eq!(Permission::from_name("unsafe"), Ok(Permission::UNSAFE));
        assert_eq!(
            Permission::from_name("teleport"),
            Err(UnknownPermission("teleport".to_string()))
        );
    }

    #[test]
    fn test_from_names() {
        let set = Permission::from_names(["fs_read", "net_all"]).unwrap();
        assert_eq!(set, Permission::FS_READ | Permission::NET_HTTP | Permission::NET_WEBSOCKET);
        assert!(Permission::from_names(["fs_read", "bogus"]).is_err());
    }

    #[test]
    fn test_describe() {
        assert_eq!(Permission::empty().describe(), "NONE");
        assert_eq!(
            (Permission::FS_READ | Permission::SCREEN_READ).describe(),
            "FS_READ | SCREEN_READ"
        );
    }
}
