//! Screen and input builtins bound to capability backends
//!
//! `find`, `exists`, `wait`, `wait_vanish` and `read_text` need
//! `SCREEN_READ`. `click`, `move`, `press`, `type`, `scroll`, `drag` and
//! `hotkey` need `INPUT_CONTROL` and hold the [`InputGate`] for the duration
//! of their device call.

use crate::args::{value_to_duration, CallArgs};
use crate::error::BuiltinError;
use crate::registry::{Arity, BuiltinFunction, BuiltinRegistry};
use crate::wait::{ImageWaiter, WaitOutcome, WaitSettings};
use retro_core::{
    CapabilityError, ImageSource, InputGate, Matcher, MouseButton, Region, TextReader, Value,
};
use retro_security::Permission;
use std::sync::Arc;
use tracing::debug;

/// Capability backends the automation builtins drive
#[derive(Clone)]
pub struct Automation {
    pub matcher: Arc<dyn Matcher>,
    pub reader: Option<Arc<dyn TextReader>>,
    pub input: Arc<InputGate>,
    pub wait: WaitSettings,
}

impl Automation {
    pub fn new(matcher: Arc<dyn Matcher>, input: Arc<InputGate>) -> Self {
        Self {
            matcher,
            reader: None,
            input,
            wait: WaitSettings::default(),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn TextReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_wait_settings(mut self, wait: WaitSettings) -> Self {
        self.wait = wait;
        self
    }
}

/// Register the screen and input builtins
pub fn register_automation(registry: &mut BuiltinRegistry, automation: Automation) {
    register_screen(registry, &automation);
    register_input(registry, &automation);
}

fn screen<F>(name: &str, arity: Arity, description: &str, handler: F) -> BuiltinFunction
where
    F: Fn(&CallArgs) -> crate::BuiltinResult + Send + Sync + 'static,
{
    BuiltinFunction::new(name, arity, handler)
        .with_permission(Permission::SCREEN_READ)
        .with_description(description)
}

fn input<F>(name: &str, arity: Arity, description: &str, handler: F) -> BuiltinFunction
where
    F: Fn(&CallArgs) -> crate::BuiltinResult + Send + Sync + 'static,
{
    BuiltinFunction::new(name, arity, handler)
        .with_permission(Permission::INPUT_CONTROL)
        .with_description(description)
}

fn register_screen(registry: &mut BuiltinRegistry, automation: &Automation) {
    let matcher = automation.matcher.clone();
    registry.register(screen("find", Arity::range(1, 2), "Find an image on screen", move |args| {
        let asset = args.str_at("find", 0)?;
        let region = region_arg("find", args.arg(1, "region"))?;
        let found = matcher.find(asset, region)?;
        debug!(asset = %asset, found = found.is_some(), "find");
        Ok(found.map(|m| m.to_value()).unwrap_or(Value::Null))
    }));

    let matcher = automation.matcher.clone();
    registry.register(screen("exists", Arity::range(1, 2), "Whether an image is on screen", move |args| {
        let asset = args.str_at("exists", 0)?;
        let region = region_arg("exists", args.arg(1, "region"))?;
        Ok(Value::Bool(matcher.find(asset, region)?.is_some()))
    }));

    let waiter = Arc::new(ImageWaiter::new(automation.matcher.clone(), automation.wait));
    let appear = waiter.clone();
    registry.register(screen("wait", Arity::range(1, 2), "Wait for an image to appear", move |args| {
        let asset = args.str_at("wait", 0)?;
        let timeout = args
            .arg(1, "timeout")
            .map(|v| value_to_duration("wait", v))
            .transpose()?;
        let region = region_arg("wait", args.named("region"))?;
        Ok(match appear.wait_appear(asset, region, timeout)? {
            WaitOutcome::Found(m) => m.to_value(),
            _ => Value::Null,
        })
    }));

    registry.register(screen(
        "wait_vanish",
        Arity::range(1, 2),
        "Wait for an image to disappear",
        move |args| {
            let asset = args.str_at("wait_vanish", 0)?;
            let timeout = args
                .arg(1, "timeout")
                .map(|v| value_to_duration("wait_vanish", v))
                .transpose()?;
            let region = region_arg("wait_vanish", args.named("region"))?;
            Ok(Value::Bool(matches!(
                waiter.wait_vanish(asset, region, timeout)?,
                WaitOutcome::Vanished
            )))
        },
    ));

    let reader = automation.reader.clone();
    registry.register(screen("read_text", Arity::range(0, 1), "Read text from the screen", move |args| {
        let reader = reader
            .as_ref()
            .ok_or(CapabilityError::Unavailable("text reader"))?;
        let region = region_arg("read_text", args.arg(0, "region"))?;
        let blocks = reader.read(&ImageSource::Screen { region })?;
        Ok(Value::Str(
            blocks
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        ))
    }));
}

fn register_input(registry: &mut BuiltinRegistry, automation: &Automation) {
    let gate = automation.input.clone();
    registry.register(input("click", Arity::range(1, 3), "Click at a point or match", move |args| {
        let (x, y, button_arg) = match args.get(0) {
            Some(target @ Value::Map(_)) => {
                let (x, y) = point_of("click", target)?;
                (x, y, args.arg(1, "button"))
            }
            _ => (
                args.coord_at("click", 0)?,
                args.coord_at("click", 1)?,
                args.arg(2, "button"),
            ),
        };
        let button = match button_arg {
            None | Some(Value::Null) => MouseButton::Left,
            Some(Value::Str(name)) => MouseButton::parse(name)
                .ok_or_else(|| BuiltinError::invalid("click", format!("unknown button '{}'", name)))?,
            Some(other) => {
                return Err(BuiltinError::invalid(
                    "click",
                    format!("button must be a string, got {}", other.type_name()),
                ))
            }
        };
        let count = match args.named("clicks") {
            Some(v) => v
                .as_int()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| BuiltinError::invalid("click", "clicks must be a positive integer"))?,
            None => 1,
        };

        gate.acquire().click(x, y, button, count)?;
        Ok(Value::Null)
    }));

    let gate = automation.input.clone();
    registry.register(input("move", Arity::exactly(2), "Move the mouse", move |args| {
        let (x, y) = (args.coord_at("move", 0)?, args.coord_at("move", 1)?);
        gate.acquire().move_to(x, y)?;
        Ok(Value::Null)
    }));

    let gate = automation.input.clone();
    registry.register(input("press", Arity::exactly(1), "Press a key", move |args| {
        let key = args.str_at("press", 0)?;
        gate.acquire().press(key)?;
        Ok(Value::Null)
    }));

    let gate = automation.input.clone();
    registry.register(input("type", Arity::exactly(1), "Type text", move |args| {
        let text = args.values()[0].to_string();
        gate.acquire().type_text(&text)?;
        Ok(Value::Null)
    }));

    let gate = automation.input.clone();
    registry.register(input("scroll", Arity::exactly(1), "Scroll the wheel", move |args| {
        let amount = args.coord_at("scroll", 0)?;
        gate.acquire().scroll(amount)?;
        Ok(Value::Null)
    }));

    let gate = automation.input.clone();
    registry.register(input("drag", Arity::exactly(4), "Drag between two points", move |args| {
        let x1 = args.coord_at("drag", 0)?;
        let y1 = args.coord_at("drag", 1)?;
        let x2 = args.coord_at("drag", 2)?;
        let y2 = args.coord_at("drag", 3)?;
        gate.acquire().drag(x1, y1, x2, y2)?;
        Ok(Value::Null)
    }));

    let gate = automation.input.clone();
    registry.register(input("hotkey", Arity::at_least(1), "Press a key combination", move |args| {
        let keys = hotkey_keys(args)?;
        gate.acquire().hotkey(&keys)?;
        Ok(Value::Null)
    }));
}

/// Optional region argument; null means the whole screen
fn region_arg(function: &str, value: Option<&Value>) -> Result<Option<Region>, BuiltinError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Region::from_value(v)
            .map(Some)
            .ok_or_else(|| BuiltinError::invalid(function, "region must be {x, y, w, h} or [x, y, w, h]")),
    }
}

/// Click target from a match or point map: the centre when present,
/// otherwise `x`/`y`
fn point_of(function: &str, target: &Value) -> Result<(i32, i32), BuiltinError> {
    let map = target
        .as_map()
        .ok_or_else(|| BuiltinError::invalid(function, "expected a map"))?;
    let coord = |centre: &str, plain: &str| {
        map.get(centre)
            .or_else(|| map.get(plain))
            .and_then(Value::as_int)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| BuiltinError::invalid(function, format!("target has no '{}'", plain)))
    };
    Ok((coord("center_x", "x")?, coord("center_y", "y")?))
}

/// `hotkey("ctrl", "c")` and `hotkey("ctrl+c")` are equivalent
fn hotkey_keys(args: &CallArgs) -> Result<Vec<String>, BuiltinError> {
    let mut keys = Vec::new();
    for (index, _) in args.values().iter().enumerate() {
        let combo = args.str_at("hotkey", index)?;
        keys.extend(
            combo
                .split('+')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_ascii_lowercase),
        );
    }
    if keys.is_empty() {
        return Err(BuiltinError::invalid("hotkey", "no keys given"));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retro_core::testing::{InputAction, RecordingInput, ScriptedMatcher, StaticTextReader};
    use retro_security::SecurityPolicy;

    struct Fixture {
        registry: BuiltinRegistry,
        matcher: Arc<ScriptedMatcher>,
        device: Arc<RecordingInput>,
    }

    fn fixture(policy: SecurityPolicy) -> Fixture {
        let matcher = Arc::new(ScriptedMatcher::new());
        let device = Arc::new(RecordingInput::new());
        let automation = Automation::new(matcher.clone(), Arc::new(InputGate::new(device.clone())))
            .with_reader(Arc::new(StaticTextReader::from_words("Level 12 complete")))
            .with_wait_settings(WaitSettings {
                poll: std::time::Duration::from_millis(5),
                backoff_max: std::time::Duration::from_millis(10),
                default_timeout: std::time::Duration::from_millis(40),
            });
        let mut registry = BuiltinRegistry::with_stdlib(Arc::new(policy));
        register_automation(&mut registry, automation);
        Fixture {
            registry,
            matcher,
            device,
        }
    }

    fn args(values: Vec<Value>) -> CallArgs {
        CallArgs::positional(values)
    }

    #[test]
    fn test_find_then_click_match_center() {
        let f = fixture(SecurityPolicy::unrestricted());
        f.matcher.show("play", 100, 200, 40, 20);

        let found = f.registry.call("find", args(vec!["play".into()])).unwrap();
        assert!(found.as_map().is_some());

        f.registry.call("click", args(vec![found])).unwrap();
        assert_eq!(
            f.device.actions(),
            vec![InputAction::Click {
                x: 120,
                y: 210,
                button: MouseButton::Left,
                count: 1
            }]
        );
    }

    #[test]
    fn test_input_requires_permission() {
        let f = fixture(SecurityPolicy::none().with_permissions(Permission::SCREEN_READ));
        let err = f
            .registry
            .call("click", args(vec![1.into(), 2.into()]))
            .unwrap_err();
        assert!(matches!(err, BuiltinError::Security(_)));
        assert!(f.device.actions().is_empty());
    }

    #[test]
    fn test_find_requires_screen_read() {
        let f = fixture(SecurityPolicy::none());
        let err = f.registry.call("find", args(vec!["x".into()])).unwrap_err();
        assert_eq!(err.to_string(), "Permission denied: SCREEN_READ");
    }

    #[test]
    fn test_wait_returns_null_on_timeout() {
        let f = fixture(SecurityPolicy::unrestricted());
        let result = f
            .registry
            .call("wait", args(vec!["never".into(), "20ms".into()]))
            .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_hotkey_combo_forms() {
        let f = fixture(SecurityPolicy::unrestricted());
        f.registry.call("hotkey", args(vec!["Ctrl+C".into()])).unwrap();
        f.registry
            .call("hotkey", args(vec!["ctrl".into(), "shift".into(), "s".into()]))
            .unwrap();
        assert_eq!(
            f.device.actions(),
            vec![
                InputAction::Hotkey(vec!["ctrl".into(), "c".into()]),
                InputAction::Hotkey(vec!["ctrl".into(), "shift".into(), "s".into()]),
            ]
        );
    }

    #[test]
    fn test_read_text() {
        let f = fixture(SecurityPolicy::unrestricted());
        let text = f.registry.call("read_text", CallArgs::default()).unwrap();
        assert_eq!(text, Value::from("Level 12 complete"));
    }

    #[test]
    fn test_device_error_surfaces() {
        let f = fixture(SecurityPolicy::unrestricted());
        f.device.set_failing(true);
        let err = f.registry.call("press", args(vec!["enter".into()])).unwrap_err();
        assert!(matches!(err, BuiltinError::Capability(_)));
    }
}
