//! List builtins

use crate::error::BuiltinError;
use crate::registry::{Arity, BuiltinRegistry};
use retro_core::Value;

/// Largest list `range` will build
const MAX_RANGE_LEN: usize = 1_000_000;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register_fn("range", Arity::range(1, 3), "Generate a list of integers", |args| {
        let (start, stop, step) = match args.len() {
            1 => (0, args.int_at("range", 0)?, 1),
            2 => (args.int_at("range", 0)?, args.int_at("range", 1)?, 1),
            _ => (
                args.int_at("range", 0)?,
                args.int_at("range", 1)?,
                args.int_at("range", 2)?,
            ),
        };
        range(start, stop, step).map(Value::List)
    });

    registry.register_fn("list", Arity::range(0, 1), "Create a list", |args| {
        Ok(Value::List(match args.get(0) {
            None => Vec::new(),
            Some(Value::List(items)) => items.clone(),
            Some(Value::Str(s)) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            Some(Value::Map(map)) => map.keys().map(|k| Value::Str(k.clone())).collect(),
            Some(other) => {
                return Err(BuiltinError::invalid(
                    "list",
                    format!("{} is not iterable", other.type_name()),
                ))
            }
        }))
    });

    registry.register_fn("append", Arity::exactly(2), "List with an item appended", |args| {
        let mut items = args.list_at("append", 0)?.to_vec();
        items.push(args.values()[1].clone());
        Ok(Value::List(items))
    });

    registry.register_fn("pop", Arity::range(1, 2), "List with an item removed", |args| {
        let mut items = args.list_at("pop", 0)?.to_vec();
        let index = if args.len() > 1 {
            args.int_at("pop", 1)?
        } else {
            -1
        };
        let position = resolve_index(index, items.len())
            .ok_or_else(|| BuiltinError::invalid("pop", format!("index {} out of range", index)))?;
        items.remove(position);
        Ok(Value::List(items))
    });

    registry.register_fn("first", Arity::exactly(1), "First element or null", |args| {
        Ok(args.list_at("first", 0)?.first().cloned().unwrap_or(Value::Null))
    });

    registry.register_fn("last", Arity::exactly(1), "Last element or null", |args| {
        Ok(args.list_at("last", 0)?.last().cloned().unwrap_or(Value::Null))
    });
}

fn range(start: i64, stop: i64, step: i64) -> Result<Vec<Value>, BuiltinError> {
    if step == 0 {
        return Err(BuiltinError::invalid("range", "step must not be zero"));
    }

    let span = if step > 0 {
        stop.saturating_sub(start)
    } else {
        start.saturating_sub(stop)
    };
    let len = if span <= 0 {
        0
    } else {
        (span.unsigned_abs() - 1) / step.unsigned_abs() + 1
    };
    if len > MAX_RANGE_LEN as u64 {
        return Err(BuiltinError::invalid(
            "range",
            format!("range of {} elements is too large", len),
        ));
    }

    Ok((0..len as i64)
        .map(|i| Value::Int(start + i * step))
        .collect())
}

/// Python-style index: negative values count from the end
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}
