//! `log` and `print`

use crate::registry::{Arity, BuiltinRegistry};
use retro_core::Value;
use tracing::{debug, error, info, warn};

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register_fn("log", Arity::at_least(1), "Log a message", |args| {
        let message = join_display(args.values());
        match args.named("level").and_then(Value::as_str).unwrap_or("info") {
            "debug" => debug!(target: "script", "{}", message),
            "warn" | "warning" => warn!(target: "script", "{}", message),
            "error" => error!(target: "script", "{}", message),
            _ => info!(target: "script", "{}", message),
        }
        Ok(Value::Null)
    });

    registry.register_fn("print", Arity::at_least(1), "Print a message", |args| {
        let message = join_display(args.values());
        debug!(target: "script", "{}", message);
        println!("{}", message);
        Ok(Value::Null)
    });
}

fn join_display(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
