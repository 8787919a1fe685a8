//! `sleep`, `timestamp`, `time`

use crate::args::value_to_duration;
use crate::registry::{Arity, BuiltinRegistry};
use chrono::{Local, Utc};
use retro_core::Value;
use tracing::trace;

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.register_fn("sleep", Arity::exactly(1), "Sleep for a duration", |args| {
        let duration = value_to_duration("sleep", &args.values()[0])?;
        trace!(ms = duration.as_millis() as u64, "Sleeping");
        std::thread::sleep(duration);
        Ok(Value::Null)
    });

    registry.register_fn("timestamp", Arity::exactly(0), "Current local date and time", |_| {
        Ok(Value::Str(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()))
    });

    registry.register_fn("time", Arity::exactly(0), "Seconds since the Unix epoch", |_| {
        Ok(Value::Float(Utc::now().timestamp_millis() as f64 / 1000.0))
    });
}

#[cfg(test)]
mod tests {
    use crate::{BuiltinRegistry, CallArgs};
    use retro_core::Value;
    use retro_security::SecurityPolicy;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_sleep_accepts_duration_text() {
        let registry = BuiltinRegistry::with_stdlib(Arc::new(SecurityPolicy::none()));
        let start = Instant::now();
        registry
            .call("sleep", CallArgs::positional(vec![Value::from("20ms")]))
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_timestamp_format() {
        let registry = BuiltinRegistry::with_stdlib(Arc::new(SecurityPolicy::none()));
        let stamp = registry.call("timestamp", CallArgs::default()).unwrap();
        let text = stamp.as_str().unwrap();
        assert_eq!(text.len(), 19);
        assert_eq!(&text[4..5], "-");
    }
}
