//! Operator semantics
//!
//! Pure functions over [`Value`]; the evaluator handles `and`/`or`
//! short-circuiting before it gets here.

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{FaultKind, ScriptError, ScriptResult};
use retro_core::Value;
use std::cmp::Ordering;

fn unsupported(op: &str, left: &Value, right: &Value) -> ScriptError {
    ScriptError::fault_at(
        FaultKind::TypeMismatch,
        "binary",
        format!(
            "'{}' not supported between {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ),
    )
}

fn overflow(op: &str) -> ScriptError {
    ScriptError::fault_at(FaultKind::Overflow, "binary", format!("Integer overflow in '{}'", op))
}

/// Both operands as floats, if both are numbers
fn floats(left: &Value, right: &Value) -> Option<(f64, f64)> {
    if left.is_number() && right.is_number() {
        Some((left.as_f64()?, right.as_f64()?))
    } else {
        None
    }
}

/// Apply a non-logical binary operator
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> ScriptResult<Value> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(op, left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Div => divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt => compare(op, left, right, Ordering::is_lt),
        BinaryOp::Le => compare(op, left, right, Ordering::is_le),
        BinaryOp::Gt => compare(op, left, right, Ordering::is_gt),
        BinaryOp::Ge => compare(op, left, right, Ordering::is_ge),
        // Only reached when a caller skips short-circuiting
        BinaryOp::And => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        BinaryOp::Or => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
    }
}

fn add(left: &Value, right: &Value) -> ScriptResult<Value> {
    match (left, right) {
        (Value::Str(a), b) => Ok(Value::Str(format!("{}{}", a, b))),
        (a, Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut joined = a.clone();
            joined.extend(b.iter().cloned());
            Ok(Value::List(joined))
        }
        _ => arithmetic(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b),
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> ScriptResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        return int_op(*a, *b).map(Value::Int).ok_or_else(|| overflow(op.symbol()));
    }
    let (a, b) = floats(left, right).ok_or_else(|| unsupported(op.symbol(), left, right))?;
    Ok(Value::Float(float_op(a, b)))
}

/// True division; the result is always a float
fn divide(left: &Value, right: &Value) -> ScriptResult<Value> {
    let (a, b) = floats(left, right).ok_or_else(|| unsupported("/", left, right))?;
    if b == 0.0 {
        return Err(ScriptError::fault_at(
            FaultKind::DivisionByZero,
            "binary",
            "Division by zero",
        ));
    }
    Ok(Value::Float(a / b))
}

/// Remainder taking the sign of the divisor
fn modulo(left: &Value, right: &Value) -> ScriptResult<Value> {
    let zero = || ScriptError::fault_at(FaultKind::DivisionByZero, "binary", "Modulo by zero");
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        if *b == 0 {
            return Err(zero());
        }
        let r = a.checked_rem(*b).ok_or_else(|| overflow("%"))?;
        let r = if r != 0 && (r < 0) != (*b < 0) { r + b } else { r };
        return Ok(Value::Int(r));
    }
    let (a, b) = floats(left, right).ok_or_else(|| unsupported("%", left, right))?;
    if b == 0.0 {
        return Err(zero());
    }
    let r = a % b;
    let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
    Ok(Value::Float(r))
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    test: fn(Ordering) -> bool,
) -> ScriptResult<Value> {
    left.partial_cmp(right)
        .map(|ord| Value::Bool(test(ord)))
        .ok_or_else(|| unsupported(op.symbol(), left, right))
}

/// Apply a unary operator
pub fn unary(op: UnaryOp, operand: &Value) -> ScriptResult<Value> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::fault_at(FaultKind::Overflow, "unary", "Integer overflow in '-'")),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) => Err(ScriptError::fault_at(
            FaultKind::TypeMismatch,
            "unary",
            format!("Bad operand type for unary -: {}", v.type_name()),
        )),
    }
}

/// `object.property` on a map
pub fn member(object: &Value, property: &str) -> ScriptResult<Value> {
    match object {
        Value::Map(map) => map.get(property).cloned().ok_or_else(|| {
            ScriptError::fault_at(
                FaultKind::KeyNotFound,
                "member",
                format!("Key not found: {}", property),
            )
        }),
        other => Err(ScriptError::fault_at(
            FaultKind::TypeMismatch,
            "member",
            format!("Cannot access '{}' on {}", property, other.type_name()),
        )),
    }
}

fn resolve_position(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let pos = if index < 0 { len + index } else { index };
    (0..len).contains(&pos).then_some(pos as usize)
}

/// `object[index]` on a list, string or map; negative list and string
/// indices count from the end
pub fn index(object: &Value, index: &Value) -> ScriptResult<Value> {
    let out_of_range = |i: i64| {
        ScriptError::fault_at(
            FaultKind::IndexOutOfRange,
            "index",
            format!("Index {} out of range", i),
        )
    };
    match (object, index) {
        (Value::List(items), Value::Int(i)) => resolve_position(*i, items.len())
            .map(|p| items[p].clone())
            .ok_or_else(|| out_of_range(*i)),
        (Value::Str(s), Value::Int(i)) => resolve_position(*i, s.chars().count())
            .and_then(|p| s.chars().nth(p))
            .map(|c| Value::Str(c.to_string()))
            .ok_or_else(|| out_of_range(*i)),
        (Value::Map(map), Value::Str(key)) => map.get(key).cloned().ok_or_else(|| {
            ScriptError::fault_at(FaultKind::KeyNotFound, "index", format!("Key not found: {}", key))
        }),
        (object, index) => Err(ScriptError::fault_at(
            FaultKind::TypeMismatch,
            "index",
            format!("Cannot index {} with {}", object.type_name(), index.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::ValueMap;

    #[test]
    fn test_add() {
        assert_eq!(binary(BinaryOp::Add, &Value::Int(10), &Value::Int(5)).unwrap(), Value::Int(15));
        assert_eq!(
            binary(BinaryOp::Add, &Value::from("n="), &Value::Int(3)).unwrap(),
            Value::from("n=3")
        );
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            binary(
                BinaryOp::Add,
                &Value::List(vec![Value::Int(1)]),
                &Value::List(vec![Value::Int(2)])
            )
            .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_division_is_float_and_rejects_zero() {
        assert_eq!(binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
        let err = binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::DivisionByZero));
        assert_eq!(err.to_string(), "Division by zero");
    }

    #[test]
    fn test_modulo_follows_divisor_sign() {
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(7), &Value::Int(-3)).unwrap(), Value::Int(-2));
        assert!(binary(BinaryOp::Mod, &Value::Int(7), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_overflow_is_a_fault() {
        let err = binary(BinaryOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Overflow));
        assert!(unary(UnaryOp::Neg, &Value::Int(i64::MIN)).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinaryOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOp::Ge, &Value::from("b"), &Value::from("a")).unwrap(), Value::Bool(true));
        assert_eq!(binary(BinaryOp::Eq, &Value::Int(2), &Value::Float(2.0)).unwrap(), Value::Bool(true));
        let err = binary(BinaryOp::Lt, &Value::from("a"), &Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "'<' not supported between string and int");
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOp::Not, &Value::Int(0)).unwrap(), Value::Bool(true));
        assert_eq!(unary(UnaryOp::Neg, &Value::Float(2.5)).unwrap(), Value::Float(-2.5));
        assert!(unary(UnaryOp::Neg, &Value::from("x")).is_err());
    }

    #[test]
    fn test_index_and_member() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(index(&list, &Value::Int(-1)).unwrap(), Value::Int(3));
        let err = index(&list, &Value::Int(3)).unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::IndexOutOfRange));

        assert_eq!(index(&Value::from("abc"), &Value::Int(1)).unwrap(), Value::from("b"));

        let mut map = ValueMap::new();
        map.insert("x".into(), Value::Int(40));
        let map = Value::Map(map);
        assert_eq!(member(&map, "x").unwrap(), Value::Int(40));
        assert_eq!(index(&map, &Value::from("x")).unwrap(), Value::Int(40));
        assert_eq!(member(&map, "y").unwrap_err().fault_kind(), Some(FaultKind::KeyNotFound));
        assert!(member(&Value::Int(1), "x").is_err());
    }
}
