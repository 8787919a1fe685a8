//! Lexical scopes
//!
//! A [`ScopeManager`] owns every frame of a run in a stack. Frames refer to
//! their parent by stack index, so a child never owns its parent and the
//! chain always ends at the single global frame (index 0).

use crate::error::ScopeError;
use retro_core::Value;
use std::collections::HashMap;
use tracing::{trace, warn};

/// A single lexical frame
#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    variables: HashMap<String, Value>,
    parent: Option<usize>,
    is_flow: bool,
}

impl Scope {
    fn new(name: impl Into<String>, parent: Option<usize>, is_flow: bool) -> Self {
        Self {
            name: name.into(),
            variables: HashMap::new(),
            parent,
            is_flow,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn is_flow(&self) -> bool {
        self.is_flow
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Bind in this frame, replacing any existing binding
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Replace an existing binding; returns false if there is none
    pub fn update(&mut self, name: &str, value: Value) -> bool {
        match self.variables.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }
}

/// Stack of lexical frames for one script run
#[derive(Debug, Clone)]
pub struct ScopeManager {
    scopes: Vec<Scope>,
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeManager {
    /// Create a manager holding only the global frame
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new("global", None, false)],
        }
    }

    /// Push a frame whose parent is the current top
    pub fn push(&mut self, name: impl Into<String>, is_flow: bool) {
        let parent = self.scopes.len() - 1;
        let scope = Scope::new(name, Some(parent), is_flow);
        trace!(scope = %scope.name, depth = self.scopes.len(), "Push scope");
        self.scopes.push(scope);
    }

    /// Discard the top frame; refused at the global frame
    pub fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() == 1 {
            warn!("Refusing to pop the global scope");
            return None;
        }
        let scope = self.scopes.pop();
        if let Some(scope) = &scope {
            trace!(scope = %scope.name, "Pop scope");
        }
        scope
    }

    pub fn current(&self) -> &Scope {
        // The global frame is never popped, so the stack is never empty.
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let top = self.scopes.len() - 1;
        &mut self.scopes[top]
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    /// Number of frames, including the global frame
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Frames innermost first
    pub fn frames(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().rev()
    }

    /// Index of the nearest frame in the chain that binds `name`
    fn resolve(&self, name: &str) -> Option<usize> {
        let mut index = Some(self.scopes.len() - 1);
        while let Some(i) = index {
            let scope = &self.scopes[i];
            if scope.has(name) {
                return Some(i);
            }
            index = scope.parent;
        }
        None
    }

    /// Bind in the current frame, shadowing outer bindings
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.current_mut().set(name, value);
    }

    /// Update the nearest existing binding, or define in the current frame
    pub fn assign(&mut self, name: &str, value: Value) {
        match self.resolve(name) {
            Some(i) => {
                self.scopes[i].update(name, value);
            }
            None => self.define(name, value),
        }
    }

    /// Look `name` up through the chain
    pub fn get(&self, name: &str) -> Result<&Value, ScopeError> {
        self.resolve(name)
            .and_then(|i| self.scopes[i].get(name))
            .ok_or_else(|| ScopeError::UndefinedVariable(name.to_string()))
    }

    pub fn get_or_default(&self, name: &str, default: Value) -> Value {
        self.get(name).cloned().unwrap_or(default)
    }

    pub fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.scopes[0].set(name, value);
    }

    pub fn get_global(&self, name: &str) -> Result<&Value, ScopeError> {
        self.scopes[0]
            .get(name)
            .ok_or_else(|| ScopeError::UndefinedGlobal(name.to_string()))
    }

    /// Bindings of the current frame only
    pub fn get_all_locals(&self) -> HashMap<String, Value> {
        self.current().variables.clone()
    }

    pub fn get_all_globals(&self) -> HashMap<String, Value> {
        self.scopes[0].variables.clone()
    }

    /// Drop every frame above the global one
    pub fn clear_locals(&mut self) {
        self.scopes.truncate(1);
    }

    /// Back to a single empty global frame
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_shadows_outer_binding() {
        let mut scopes = ScopeManager::new();
        scopes.define("x", Value::Int(1));
        scopes.push("flow:main", true);
        scopes.define("x", Value::Int(2));

        assert_eq!(scopes.get("x").unwrap(), &Value::Int(2));
        scopes.pop();
        assert_eq!(scopes.get("x").unwrap(), &Value::Int(1));
    }

    #[test]
    fn test_shadowing_holds_for_many_names() {
        let names = ["a", "b", "count", "_tmp", "x1"];
        let mut scopes = ScopeManager::new();
        for (i, name) in names.iter().enumerate() {
            scopes.define(*name, Value::Int(i as i64));
        }
        scopes.push("inner", false);
        for name in names {
            scopes.define(name, Value::from("inner"));
            assert_eq!(scopes.get(name).unwrap(), &Value::from("inner"));
        }
    }

    #[test]
    fn test_assign_updates_outer_binding_in_place() {
        let mut scopes = ScopeManager::new();
        scopes.define("counter", Value::Int(0));
        scopes.push("flow:main", true);
        scopes.assign("counter", Value::Int(5));

        assert!(!scopes.get_all_locals().contains_key("counter"));
        scopes.pop();
        assert_eq!(scopes.get("counter").unwrap(), &Value::Int(5));
    }

    #[test]
    fn test_assign_without_binding_defines_locally() {
        let mut scopes = ScopeManager::new();
        scopes.push("flow:main", true);
        scopes.assign("fresh", Value::Bool(true));
        assert!(scopes.get_all_locals().contains_key("fresh"));
        scopes.pop();
        assert!(!scopes.has("fresh"));
    }

    #[test]
    fn test_get_undefined() {
        let scopes = ScopeManager::new();
        let err = scopes.get("ghost").unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable: ghost");
        assert_eq!(scopes.get_or_default("ghost", Value::Int(3)), Value::Int(3));
    }

    #[test]
    fn test_pop_refused_at_global() {
        let mut scopes = ScopeManager::new();
        scopes.define("keep", Value::Null);
        assert!(scopes.pop().is_none());
        assert_eq!(scopes.depth(), 1);
        assert!(scopes.has("keep"));
    }

    #[test]
    fn test_globals_and_reset() {
        let mut scopes = ScopeManager::new();
        scopes.push("flow:a", true);
        scopes.set_global("limit", Value::Int(9));
        scopes.define("local", Value::Int(1));

        assert_eq!(scopes.get_global("limit").unwrap(), &Value::Int(9));
        assert!(scopes.get_global("local").is_err());
        assert_eq!(scopes.get_all_globals().len(), 1);

        scopes.push("flow:b", true);
        scopes.clear_locals();
        assert_eq!(scopes.depth(), 1);
        assert!(scopes.has("limit"));

        scopes.reset();
        assert!(!scopes.has("limit"));
    }

    #[test]
    fn test_parent_chain_terminates_at_global() {
        let mut scopes = ScopeManager::new();
        scopes.push("a", true);
        scopes.push("b", false);
        let chain: Vec<&str> = scopes.frames().map(Scope::name).collect();
        assert_eq!(chain, vec!["b", "a", "global"]);
        assert_eq!(scopes.global().parent(), None);
        assert_eq!(scopes.current().parent(), Some(1));
    }
}
