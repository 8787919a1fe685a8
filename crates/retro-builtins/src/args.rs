//! Call arguments and typed accessors for builtin implementations

use crate::error::BuiltinError;
use retro_core::{parse_duration_ms, Value, ValueMap};
use std::time::Duration;

/// Arguments of one builtin call
///
/// Arity bounds apply to positional arguments only. Keyword arguments are
/// passed through for builtins that accept them (`wait(asset, timeout=5s)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: ValueMap,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>, named: ValueMap) -> Self {
        Self { positional, named }
    }

    pub fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            named: ValueMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, key: &str) -> Option<&Value> {
        self.named.get(key)
    }

    /// Positional argument `index`, falling back to keyword `key`
    pub fn arg(&self, index: usize, key: &str) -> Option<&Value> {
        self.get(index).or_else(|| self.named(key))
    }

    pub fn values(&self) -> &[Value] {
        &self.positional
    }

    pub fn str_at(&self, function: &str, index: usize) -> Result<&str, BuiltinError> {
        match self.get(index) {
            Some(Value::Str(s)) => Ok(s),
            Some(other) => Err(type_error(function, index, "string", other)),
            None => Err(missing(function, index)),
        }
    }

    pub fn int_at(&self, function: &str, index: usize) -> Result<i64, BuiltinError> {
        let value = self.get(index).ok_or_else(|| missing(function, index))?;
        value
            .as_int()
            .ok_or_else(|| type_error(function, index, "integer", value))
    }

    /// Integer argument narrowed to screen coordinates
    pub fn coord_at(&self, function: &str, index: usize) -> Result<i32, BuiltinError> {
        let value = self.int_at(function, index)?;
        i32::try_from(value)
            .map_err(|_| BuiltinError::invalid(function, format!("coordinate {} out of range", value)))
    }

    pub fn number_at(&self, function: &str, index: usize) -> Result<f64, BuiltinError> {
        match self.get(index) {
            Some(value @ (Value::Int(_) | Value::Float(_))) => Ok(value.as_f64().unwrap_or(0.0)),
            Some(other) => Err(type_error(function, index, "number", other)),
            None => Err(missing(function, index)),
        }
    }

    pub fn list_at(&self, function: &str, index: usize) -> Result<&[Value], BuiltinError> {
        match self.get(index) {
            Some(Value::List(items)) => Ok(items),
            Some(other) => Err(type_error(function, index, "list", other)),
            None => Err(missing(function, index)),
        }
    }
}

/// Interpret a value as a duration: numbers are milliseconds, strings are
/// duration literals
pub fn value_to_duration(function: &str, value: &Value) -> Result<Duration, BuiltinError> {
    let millis = match value {
        Value::Int(ms) => *ms,
        Value::Float(ms) if ms.is_finite() => ms.round() as i64,
        Value::Str(text) => {
            parse_duration_ms(text).map_err(|e| BuiltinError::invalid(function, e.to_string()))?
        }
        other => {
            return Err(BuiltinError::invalid(
                function,
                format!("expected a duration, got {}", other.type_name()),
            ))
        }
    };
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| BuiltinError::invalid(function, "duration must not be negative"))
}

fn missing(function: &str, index: usize) -> BuiltinError {
    BuiltinError::invalid(function, format!("missing argument {}", index + 1))
}

fn type_error(function: &str, index: usize, expected: &str, got: &Value) -> BuiltinError {
    BuiltinError::invalid(
        function,
        format!(
            "argument {} must be a {}, got {}",
            index + 1,
            expected,
            got.type_name()
        ),
    )
}
