//! Expression evaluation
//!
//! [`evaluate`] is shared by the interpreter and by anything else that needs
//! to evaluate the expression subset against its own variables, such as a
//! debugger watch. The caller decides what names resolve to and whether
//! calls are allowed by implementing [`Environment`].

use crate::ast::{BinaryOp, Expr};
use crate::error::{FaultKind, ScriptError, ScriptResult};
use crate::ops;
use crate::strip_sigil;
use retro_core::{parse_duration_ms, Value, ValueMap};

/// Name resolution and call dispatch for [`evaluate`]
pub trait Environment {
    fn lookup(&self, name: &str) -> ScriptResult<Value>;

    fn call(&mut self, callee: &str, args: Vec<Value>, kwargs: ValueMap) -> ScriptResult<Value>;
}

/// Evaluate `expr`
///
/// `and`/`or` short-circuit and yield the deciding operand. Array elements and
/// call arguments are evaluated left to right.
pub fn evaluate(expr: &Expr, env: &mut dyn Environment) -> ScriptResult<Value> {
    match expr {
        Expr::Literal { value } => Ok(value.clone()),
        Expr::Duration { value } => parse_duration_ms(value).map(Value::Int).map_err(|e| {
            ScriptError::fault_at(
                FaultKind::InvalidLiteral,
                "duration",
                format!("Invalid duration '{}': {}", value, e),
            )
        }),
        Expr::Identifier { name } => env.lookup(strip_sigil(name)),
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, env)?;
            match op {
                BinaryOp::And if !left.is_truthy() => Ok(left),
                BinaryOp::Or if left.is_truthy() => Ok(left),
                BinaryOp::And | BinaryOp::Or => evaluate(right, env),
                _ => {
                    let right = evaluate(right, env)?;
                    ops::binary(*op, &left, &right)
                }
            }
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, env)?;
            ops::unary(*op, &value)
        }
        Expr::Call {
            callee,
            args,
            kwargs,
        } => {
            let args = args
                .iter()
                .map(|a| evaluate(a, env))
                .collect::<ScriptResult<Vec<_>>>()?;
            let mut named = ValueMap::new();
            for (key, value) in kwargs {
                named.insert(key.clone(), evaluate(value, env)?);
            }
            env.call(callee, args, named)
        }
        Expr::Array { elements } => elements
            .iter()
            .map(|e| evaluate(e, env))
            .collect::<ScriptResult<Vec<_>>>()
            .map(Value::List),
        Expr::Member { object, property } => {
            let object = evaluate(object, env)?;
            ops::member(&object, property)
        }
        Expr::Index { object, index } => {
            let object = evaluate(object, env)?;
            let index = evaluate(index, env)?;
            ops::index(&object, &index)
        }
    }
}
