//! Numeric builtins

use crate::error::BuiltinError;
use crate::registry::{Arity, BuiltinRegistry};
use rand::Rng;
use retro_core::Value;
use std::cmp::Ordering;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register_fn("random", Arity::range(0, 2), "Random number", |args| {
        let mut rng = rand::thread_rng();
        match args.len() {
            0 => Ok(Value::Float(rng.gen::<f64>())),
            1 => {
                let max = args.int_at("random", 0)?;
                if max < 0 {
                    return Err(BuiltinError::invalid("random", "upper bound must not be negative"));
                }
                Ok(Value::Int(rng.gen_range(0..=max)))
            }
            _ => {
                let min = args.int_at("random", 0)?;
                let max = args.int_at("random", 1)?;
                if min > max {
                    return Err(BuiltinError::invalid(
                        "random",
                        format!("empty range {}..={}", min, max),
                    ));
                }
                Ok(Value::Int(rng.gen_range(min..=max)))
            }
        }
    });

    registry.register_fn("abs", Arity::exactly(1), "Absolute value", |args| {
        match &args.values()[0] {
            Value::Int(i) => i
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| BuiltinError::invalid("abs", "integer overflow")),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(BuiltinError::invalid(
                "abs",
                format!("expected a number, got {}", other.type_name()),
            )),
        }
    });

    registry.register_fn("min", Arity::at_least(1), "Minimum value", |args| {
        extreme("min", args.values(), Ordering::Less)
    });

    registry.register_fn("max", Arity::at_least(1), "Maximum value", |args| {
        extreme("max", args.values(), Ordering::Greater)
    });

    registry.register_fn("round", Arity::range(1, 2), "Round a number", |args| {
        let x = args.number_at("round", 0)?;
        if args.len() == 1 {
            return to_int("round", x.round());
        }
        let digits = args.int_at("round", 1)?;
        let digits = i32::try_from(digits)
            .map_err(|_| BuiltinError::invalid("round", "digit count out of range"))?;
        let scale = 10f64.powi(digits);
        Ok(Value::Float((x * scale).round() / scale))
    });

    registry.register_fn("floor", Arity::exactly(1), "Round down", |args| {
        to_int("floor", args.number_at("floor", 0)?.floor())
    });

    registry.register_fn("ceil", Arity::exactly(1), "Round up", |args| {
        to_int("ceil", args.number_at("ceil", 0)?.ceil())
    });
}

/// Smallest (`Less`) or largest (`Greater`) of the arguments, or of a single
/// list argument
fn extreme(function: &str, values: &[Value], want: Ordering) -> Result<Value, BuiltinError> {
    let candidates = match values {
        [Value::List(items)] => items.as_slice(),
        _ => values,
    };
    let (first, rest) = candidates
        .split_first()
        .ok_or_else(|| BuiltinError::invalid(function, "no values to compare"))?;

    let mut best = first;
    for candidate in rest {
        match candidate.partial_cmp(best) {
            Some(ord) if ord == want => best = candidate,
            Some(_) => {}
            None => {
                return Err(BuiltinError::invalid(
                    function,
                    format!(
                        "cannot compare {} and {}",
                        candidate.type_name(),
                        best.type_name()
                    ),
                ))
            }
        }
    }
    Ok(best.clone())
}

fn to_int(function: &str, x: f64) -> Result<Value, BuiltinError> {
    if x.is_finite() && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Ok(Value::Int(x as i64))
    } else {
        Err(BuiltinError::invalid(function, "value out of integer range"))
    }
}

#[cfg(test)]
mod tests {
    use crate::{BuiltinRegistry, CallArgs};
    use retro_core::Value;
    use retro_security::SecurityPolicy;
    use std::sync::Arc;

    fn call(name: &str, args: Vec<Value>) -> Value {
        BuiltinRegistry::with_stdlib(Arc::new(SecurityPolicy::none()))
            .call(name, CallArgs::positional(args))
            .unwrap()
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call("min", vec![3.into(), 1.into(), 2.into()]), Value::Int(1));
        assert_eq!(call("max", vec![3.into(), Value::Float(4.5)]), Value::Float(4.5));
        let list = Value::List(vec![5.into(), 9.into(), 7.into()]);
        assert_eq!(call("max", vec![list]), Value::Int(9));
    }

    #[test]
    fn test_min_mixed_types_fails() {
        let registry = BuiltinRegistry::with_stdlib(Arc::new(SecurityPolicy::none()));
        let err = registry
            .call("min", CallArgs::positional(vec![1.into(), "a".into()]))
            .unwrap_err();
        assert!(err.to_string().contains("cannot compare"));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(call("round", vec![Value::Float(2.6)]), Value::Int(3));
        assert_eq!(call("round", vec![Value::Float(3.14159), 2.into()]), Value::Float(3.14));
        assert_eq!(call("floor", vec![Value::Float(-1.5)]), Value::Int(-2));
        assert_eq!(call("ceil", vec![Value::Float(1.1)]), Value::Int(2));
        assert_eq!(call("abs", vec![Value::Int(-4)]), Value::Int(4));
    }

    #[test]
    fn test_random_bounds() {
        for _ in 0..50 {
            let n = call("random", vec![5.into(), 7.into()]).as_int().unwrap();
            assert!((5..=7).contains(&n));
        }
        let f = call("random", vec![]);
        assert!(matches!(f, Value::Float(x) if (0.0..1.0).contains(&x)));
    }
}
