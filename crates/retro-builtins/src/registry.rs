//! The builtin registry

use crate::args::CallArgs;
use crate::error::{BuiltinError, BuiltinResult};
use retro_security::{Permission, SecurityPolicy};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Host implementation of a builtin
pub type BuiltinHandler = Arc<dyn Fn(&CallArgs) -> BuiltinResult + Send + Sync>;

/// Accepted positional argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded
    pub max: Option<usize>,
}

impl Arity {
    pub fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

/// A registered builtin
#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: String,
    pub arity: Arity,
    /// Empty when the builtin is unrestricted
    pub permission: Permission,
    pub description: String,
    handler: BuiltinHandler,
}

impl BuiltinFunction {
    pub fn new<F>(name: impl Into<String>, arity: Arity, handler: F) -> Self
    where
        F: Fn(&CallArgs) -> BuiltinResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            permission: Permission::empty(),
            description: String::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Named host functions callable from scripts
///
/// Registration takes `&mut self` and happens before the run starts; during
/// the run the registry is shared behind an `Arc` and only read.
pub struct BuiltinRegistry {
    functions: HashMap<String, BuiltinFunction>,
    policy: Arc<SecurityPolicy>,
}

impl BuiltinRegistry {
    /// Create an empty registry checking calls against `policy`
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self {
            functions: HashMap::new(),
            policy,
        }
    }

    /// Create a registry preloaded with the standard library
    pub fn with_stdlib(policy: Arc<SecurityPolicy>) -> Self {
        let mut registry = Self::new(policy);
        crate::stdlib::register_all(&mut registry);
        registry
    }

    /// Register a builtin, replacing any previous one with the same name
    pub fn register(&mut self, function: BuiltinFunction) {
        debug!(
            name = %function.name,
            arity = %function.arity,
            permission = %function.permission.describe(),
            "Registering builtin"
        );
        if let Some(previous) = self.functions.insert(function.name.clone(), function) {
            warn!(name = %previous.name, "Builtin replaced");
        }
    }

    /// Shorthand for an unrestricted builtin
    pub fn register_fn<F>(&mut self, name: &str, arity: Arity, description: &str, handler: F)
    where
        F: Fn(&CallArgs) -> BuiltinResult + Send + Sync + 'static,
    {
        self.register(BuiltinFunction::new(name, arity, handler).with_description(description));
    }

    /// Call a builtin by name
    ///
    /// Checks run in a fixed order: unknown name, permission, arity.
    #[instrument(skip(self, args), fields(argc = args.len()))]
    pub fn call(&self, name: &str, args: CallArgs) -> BuiltinResult {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| BuiltinError::UnknownFunction(name.to_string()))?;

        if !function.permission.is_empty() {
            self.policy.check(function.permission)?;
        }

        if !function.arity.accepts(args.len()) {
            return Err(BuiltinError::Arity {
                name: name.to_string(),
                expected: function.arity.to_string(),
                got: args.len(),
            });
        }

        debug!(name = %name, "Calling builtin");
        (function.handler)(&args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFunction> {
        self.functions.get(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinRegistry")
            .field("functions", &self.functions.len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(policy: SecurityPolicy) -> BuiltinRegistry {
        BuiltinRegistry::new(Arc::new(policy))
    }

    #[test]
    fn test_unknown_function() {
        let registry = registry(SecurityPolicy::unrestricted());
        let err = registry.call("nope", CallArgs::default()).unwrap_err();
        assert!(matches!(err, BuiltinError::UnknownFunction(ref n) if n == "nope"));
        assert_eq!(err.to_string(), "Unknown function: nope");
    }

    #[test]
    fn test_permission_checked_before_arity() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = registry(SecurityPolicy::none());
        registry.register(
            BuiltinFunction::new("click", Arity::range(1, 3), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            })
            .with_permission(Permission::INPUT_CONTROL),
        );

        // Wrong arity and missing permission: the permission failure wins
        let err = registry.call("click", CallArgs::default()).unwrap_err();
        assert!(matches!(err, BuiltinError::Security(_)));
        assert!(err.to_string().contains("INPUT_CONTROL"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arity_bounds() {
        let mut registry = registry(SecurityPolicy::none());
        registry.register_fn("pair", Arity::exactly(2), "", |args| {
            Ok(Value::List(args.values().to_vec()))
        });

        let err = registry
            .call("pair", CallArgs::positional(vec![Value::Int(1)]))
            .unwrap_err();
        assert_eq!(err.to_string(), "pair() takes exactly 2 arguments, got 1");

        let ok = registry
            .call("pair", CallArgs::positional(vec![Value::Int(1), Value::Int(2)]))
            .unwrap();
        assert_eq!(ok, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_unbounded_arity() {
        assert!(Arity::at_least(1).accepts(100));
        assert!(!Arity::at_least(1).accepts(0));
        assert_eq!(Arity::at_least(1).to_string(), "at least 1");
        assert_eq!(Arity::range(1, 3).to_string(), "1 to 3");
    }

    #[test]
    fn test_granted_permission_invokes_handler() {
        let mut registry = registry(SecurityPolicy::none().with_permissions(Permission::SCREEN_READ));
        registry.register(
            BuiltinFunction::new("peek", Arity::exactly(0), |_| Ok(Value::Bool(true)))
                .with_permission(Permission::SCREEN_READ),
        );
        assert_eq!(registry.call("peek", CallArgs::default()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_registries_are_independent() {
        let mut first = registry(SecurityPolicy::none());
        first.register_fn("only_here", Arity::exactly(0), "", |_| Ok(Value::Null));
        let second = registry(SecurityPolicy::none());

        assert!(first.contains("only_here"));
        assert!(!second.contains("only_here"));
    }
}
