//! Type inspection builtins
//!
//! The type-name builtin is `typeof`; `type` is the input builtin that
//! types text.

use crate::registry::{Arity, BuiltinRegistry};
use retro_core::Value;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register_fn("typeof", Arity::exactly(1), "Type name of a value", |args| {
        Ok(Value::from(args.values()[0].type_name()))
    });
    registry.register_fn("is_null", Arity::exactly(1), "Check for null", |args| {
        Ok(Value::Bool(args.values()[0].is_null()))
    });
    registry.register_fn("is_number", Arity::exactly(1), "Check for a number", |args| {
        Ok(Value::Bool(args.values()[0].is_number()))
    });
    registry.register_fn("is_string", Arity::exactly(1), "Check for a string", |args| {
        Ok(Value::Bool(matches!(args.values()[0], Value::Str(_))))
    });
    registry.register_fn("is_list", Arity::exactly(1), "Check for a list", |args| {
        Ok(Value::Bool(matches!(args.values()[0], Value::List(_))))
    });
}
