//! String conversion and manipulation builtins

use crate::error::BuiltinError;
use crate::registry::{Arity, BuiltinRegistry};
use retro_core::{parse_duration_ms, Value};

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register_fn("str", Arity::exactly(1), "Convert to string", |args| {
        Ok(Value::Str(args.values()[0].to_string()))
    });

    registry.register_fn("int", Arity::exactly(1), "Convert to integer", |args| {
        to_int(&args.values()[0])
    });

    registry.register_fn("float", Arity::exactly(1), "Convert to float", |args| {
        match &args.values()[0] {
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| BuiltinError::invalid("float", format!("cannot convert '{}'", s))),
            other => other.as_f64().map(Value::Float).ok_or_else(|| {
                BuiltinError::invalid("float", format!("cannot convert {}", other.type_name()))
            }),
        }
    });

    registry.register_fn("len", Arity::exactly(1), "Length of a string, list or map", |args| {
        let value = &args.values()[0];
        value
            .len()
            .map(|n| Value::Int(n as i64))
            .ok_or_else(|| BuiltinError::invalid("len", format!("{} has no length", value.type_name())))
    });

    registry.register_fn("upper", Arity::exactly(1), "Uppercase string", |args| {
        Ok(Value::Str(args.values()[0].to_string().to_uppercase()))
    });

    registry.register_fn("lower", Arity::exactly(1), "Lowercase string", |args| {
        Ok(Value::Str(args.values()[0].to_string().to_lowercase()))
    });

    registry.register_fn("trim", Arity::exactly(1), "Trim whitespace", |args| {
        Ok(Value::Str(args.values()[0].to_string().trim().to_string()))
    });

    registry.register_fn("split", Arity::range(1, 2), "Split a string", |args| {
        let text = args.values()[0].to_string();
        let sep = if args.len() > 1 {
            args.str_at("split", 1)?
        } else {
            " "
        };
        if sep.is_empty() {
            return Err(BuiltinError::invalid("split", "empty separator"));
        }
        Ok(Value::List(
            text.split(sep).map(|part| Value::Str(part.to_string())).collect(),
        ))
    });

    registry.register_fn("join", Arity::exactly(2), "Join a list with a separator", |args| {
        let items = args.list_at("join", 0)?;
        let sep = args.str_at("join", 1)?;
        Ok(Value::Str(
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(sep),
        ))
    });

    registry.register_fn("contains", Arity::exactly(2), "Membership test", |args| {
        let needle = &args.values()[1];
        let found = match &args.values()[0] {
            Value::Str(hay) => match needle {
                Value::Str(n) => hay.contains(n.as_str()),
                other => {
                    return Err(BuiltinError::invalid(
                        "contains",
                        format!("cannot search a string for {}", other.type_name()),
                    ))
                }
            },
            Value::List(items) => items.contains(needle),
            Value::Map(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
            other => {
                return Err(BuiltinError::invalid(
                    "contains",
                    format!("{} is not a container", other.type_name()),
                ))
            }
        };
        Ok(Value::Bool(found))
    });

    registry.register_fn("replace", Arity::exactly(3), "Replace in a string", |args| {
        let text = args.values()[0].to_string();
        let old = args.str_at("replace", 1)?;
        let new = args.str_at("replace", 2)?;
        if old.is_empty() {
            return Err(BuiltinError::invalid("replace", "empty pattern"));
        }
        Ok(Value::Str(text.replace(old, new)))
    });
}

/// Integers pass through, floats truncate, and strings may hold an integer,
/// a float or a duration literal (`"2s"` is 2000)
fn to_int(value: &Value) -> Result<Value, BuiltinError> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            if let Ok(f) = s.parse::<f64>() {
                if f.is_finite() {
                    return Ok(Value::Int(f.trunc() as i64));
                }
            }
            parse_duration_ms(s)
                .map(Value::Int)
                .map_err(|_| BuiltinError::invalid("int", format!("cannot convert '{}'", s)))
        }
        other => Err(BuiltinError::invalid(
            "int",
            format!("cannot convert {}", other.type_name()),
        )),
    }
}
