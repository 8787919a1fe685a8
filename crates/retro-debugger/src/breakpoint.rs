//! Breakpoint store

use crate::error::{DebugError, DebugResult};
use parking_lot::Mutex;
use retro_script::Location;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Unique, monotonically assigned breakpoint identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BreakpointId(u64);

impl BreakpointId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BreakpointId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakpoint {
    pub id: BreakpointId,
    pub location: Location,
    pub enabled: bool,
    /// Watch expression; the breakpoint only halts when it is truthy
    pub condition: Option<String>,
    pub hit_count: u64,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    by_id: BTreeMap<BreakpointId, Breakpoint>,
    by_location: HashMap<Location, BreakpointId>,
}

/// Breakpoints keyed by id and by location
///
/// Every operation takes the lock for its own duration only, so a controller
/// thread can edit breakpoints while the interpreter thread checks them and
/// the change is seen by the very next check.
#[derive(Debug, Default)]
pub struct BreakpointStore {
    inner: Mutex<Inner>,
}

impl BreakpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint, or return the existing one at this location
    pub fn add(&self, location: Location) -> Breakpoint {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.by_location.get(&location).and_then(|id| inner.by_id.get(id)) {
            return existing.clone();
        }
        inner.next_id += 1;
        let id = BreakpointId(inner.next_id);
        let breakpoint = Breakpoint {
            id,
            location: location.clone(),
            enabled: true,
            condition: None,
            hit_count: 0,
        };
        debug!(id = %id, %location, "Breakpoint added");
        inner.by_location.insert(location, id);
        inner.by_id.insert(id, breakpoint.clone());
        breakpoint
    }

    pub fn remove(&self, id: BreakpointId) -> DebugResult<Breakpoint> {
        let mut inner = self.inner.lock();
        let breakpoint = inner.by_id.remove(&id).ok_or(DebugError::UnknownBreakpoint(id))?;
        inner.by_location.remove(&breakpoint.location);
        debug!(id = %id, "Breakpoint removed");
        Ok(breakpoint)
    }

    /// Flip the enabled flag; returns the new state
    pub fn toggle(&self, id: BreakpointId) -> DebugResult<bool> {
        let mut inner = self.inner.lock();
        let breakpoint = inner.by_id.get_mut(&id).ok_or(DebugError::UnknownBreakpoint(id))?;
        breakpoint.enabled = !breakpoint.enabled;
        Ok(breakpoint.enabled)
    }

    pub fn set_condition(&self, id: BreakpointId, condition: Option<String>) -> DebugResult<()> {
        let mut inner = self.inner.lock();
        let breakpoint = inner.by_id.get_mut(&id).ok_or(DebugError::UnknownBreakpoint(id))?;
        breakpoint.condition = condition.filter(|c| !c.trim().is_empty());
        Ok(())
    }

    pub fn get(&self, id: BreakpointId) -> Option<Breakpoint> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    pub fn get_at(&self, location: &Location) -> Option<Breakpoint> {
        let inner = self.inner.lock();
        inner.by_location.get(location).and_then(|id| inner.by_id.get(id)).cloned()
    }

    /// All breakpoints in id order
    pub fn all(&self) -> Vec<Breakpoint> {
        self.inner.lock().by_id.values().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.by_id.clear();
        inner.by_location.clear();
    }

    pub fn has_breakpoint(&self, location: &Location) -> bool {
        self.inner.lock().by_location.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count a hit on the enabled breakpoint at `location`, if any
    pub(crate) fn hit(&self, location: &Location) -> Option<Breakpoint> {
        let mut inner = self.inner.lock();
        let id = *inner.by_location.get(location)?;
        let breakpoint = inner.by_id.get_mut(&id)?;
        if !breakpoint.enabled {
            return None;
        }
        breakpoint.hit_count += 1;
        Some(breakpoint.clone())
    }
}
