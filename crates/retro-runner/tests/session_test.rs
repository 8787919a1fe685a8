//! Run sessions against in-memory backends

use retro_builtins::Automation;
use retro_core::testing::{InputAction, RecordingInput, ScriptedMatcher, StaticHotkeys};
use retro_core::{InputGate, MouseButton, Value};
use retro_debugger::{DebugState, Debugger};
use retro_interrupt::{ScannerConfig, ScannerState};
use retro_runner::{RunSession, RunnerError, ScriptDocument};
use retro_script::ScriptError;
use retro_security::{Permission, SecurityPolicy};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Fixtures
// ============================================================================

/// Main flow presses `a`, then sleeps 20ms per iteration for `rounds`
/// iterations before returning the count
fn busy_document(rounds: i64, interrupts: &str) -> ScriptDocument {
    let yaml = format!(
        r#"
file: busy.ra
flows:
  - name: main
    body:
      - {{type: expr, span: {{line: 1}}, expr: {{type: call, callee: press, args: [{{type: literal, value: a}}]}}}}
      - {{type: let, name: i, span: {{line: 2}}, value: {{type: literal, value: 0}}}}
      - type: while
        span: {{line: 3}}
        condition: {{type: binary, op: "<", left: {{type: identifier, name: i}}, right: {{type: literal, value: {rounds}}}}}
        body:
          - {{type: expr, span: {{line: 4}}, expr: {{type: call, callee: sleep, args: [{{type: literal, value: 20}}]}}}}
          - {{type: assign, span: {{line: 5}}, target: {{type: identifier, name: i}}, value: {{type: binary, op: "+", left: {{type: identifier, name: i}}, right: {{type: literal, value: 1}}}}}}
      - {{type: return, span: {{line: 6}}, value: {{type: identifier, name: i}}}}
  - name: recover
    body:
      - {{type: expr, span: {{line: 20}}, expr: {{type: call, callee: press, args: [{{type: literal, value: esc}}]}}}}
      - {{type: return, span: {{line: 21}}, value: {{type: literal, value: recovered}}}}
interrupts: {interrupts}
"#,
        rounds = rounds,
        interrupts = interrupts,
    );
    serde_yaml::from_str(&yaml).unwrap()
}

struct Backends {
    matcher: Arc<ScriptedMatcher>,
    input: Arc<RecordingInput>,
    automation: Automation,
}

fn backends() -> Backends {
    let matcher = Arc::new(ScriptedMatcher::new());
    let input = Arc::new(RecordingInput::new());
    let automation = Automation::new(matcher.clone(), Arc::new(InputGate::new(input.clone())));
    Backends {
        matcher,
        input,
        automation,
    }
}

fn input_policy() -> SecurityPolicy {
    SecurityPolicy::none().with_permissions(Permission::SCREEN_READ | Permission::INPUT_CONTROL)
}

fn fast_scanner() -> ScannerConfig {
    ScannerConfig {
        poll_interval: Duration::from_millis(5),
        idle_interval: Duration::from_millis(10),
        cooldown: Duration::from_secs(30),
        join_timeout: Duration::from_millis(500),
        ..ScannerConfig::default()
    }
}

// ============================================================================
// Plain runs
// ============================================================================

#[test]
fn test_run_returns_main_result() {
    let b = backends();
    let session = RunSession::builder(busy_document(2, "[]"), input_policy(), b.automation).build();

    assert_eq!(session.run().unwrap(), Value::Int(2));
    assert_eq!(b.input.actions(), vec![InputAction::Press("a".into())]);
    assert!(session.scanner().is_none());
}

#[test]
fn test_missing_permission_fails_run() {
    let b = backends();
    let session = RunSession::builder(busy_document(1, "[]"), SecurityPolicy::none(), b.automation).build();

    match session.run() {
        Err(RunnerError::Script(e)) => assert!(e.to_string().contains("INPUT_CONTROL")),
        other => panic!("expected a security failure, got {:?}", other),
    }
    assert!(b.input.actions().is_empty());
}

#[test]
fn test_main_flow_override() {
    let b = backends();
    let session = RunSession::builder(busy_document(1, "[]"), input_policy(), b.automation)
        .main_flow("recover")
        .build();

    assert_eq!(session.run().unwrap(), Value::from("recovered"));
    assert_eq!(b.input.actions(), vec![InputAction::Press("esc".into())]);
}

#[test]
fn test_stop_from_another_thread_aborts() {
    let b = backends();
    let session = Arc::new(
        RunSession::builder(busy_document(10_000, "[]"), input_policy(), b.automation).build(),
    );

    let stopper = session.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        stopper.stop();
    });

    let started = Instant::now();
    let result = session.run();
    assert!(matches!(result, Err(RunnerError::Script(ScriptError::Aborted))));
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ============================================================================
// Interrupts
// ============================================================================

#[test]
fn test_inline_interrupt_runs_during_main_flow() {
    let b = backends();
    b.matcher.show("popup", 100, 100, 20, 20);
    let rules = "[{id: popup, priority: 5, trigger: {type: image, asset: popup}, handler: {actions: [{type: click}]}}]";
    let session = RunSession::builder(busy_document(25, rules), input_policy(), b.automation)
        .scanner_config(fast_scanner())
        .build();

    assert_eq!(session.run().unwrap(), Value::Int(25));

    let clicks: Vec<InputAction> = b
        .input
        .actions()
        .into_iter()
        .filter(|a| matches!(a, InputAction::Click { .. }))
        .collect();
    assert_eq!(
        clicks,
        vec![InputAction::Click { x: 110, y: 110, button: MouseButton::Left, count: 1 }]
    );
    let scanner = session.scanner().unwrap();
    assert!(!scanner.is_running());
    assert_eq!(scanner.state(), ScannerState::Stopped);
}

#[test]
fn test_flow_interrupt_preempts_main_flow() {
    let b = backends();
    let hotkeys = Arc::new(StaticHotkeys::new());
    hotkeys.hold("ctrl+q");
    let rules = "[{id: panic, trigger: {type: hotkey, combo: ctrl+q}, handler: {flow: recover}}]";
    let session = RunSession::builder(busy_document(25, rules), input_policy(), b.automation)
        .scanner_config(fast_scanner())
        .hotkeys(hotkeys)
        .build();

    assert_eq!(session.run().unwrap(), Value::Int(25));
    let actions = b.input.actions();
    assert!(actions.contains(&InputAction::Press("a".into())));
    assert_eq!(
        actions.iter().filter(|a| **a == InputAction::Press("esc".into())).count(),
        1
    );
}

#[test]
fn test_without_interrupts_ignores_rules() {
    let b = backends();
    b.matcher.show("popup", 0, 0, 10, 10);
    let rules = "[{id: popup, trigger: {type: image, asset: popup}, handler: {actions: [{type: click}]}}]";
    let session = RunSession::builder(busy_document(3, rules), input_policy(), b.automation)
        .scanner_config(fast_scanner())
        .without_interrupts()
        .build();

    assert_eq!(session.run().unwrap(), Value::Int(3));
    assert!(session.scanner().is_none());
    assert_eq!(b.input.actions(), vec![InputAction::Press("a".into())]);
}

#[test]
fn test_constants_evaluate_once_and_reach_interrupt_flows() {
    let b = backends();
    let hotkeys = Arc::new(StaticHotkeys::new());
    hotkeys.hold("ctrl+q");
    let rules = "[{id: panic, trigger: {type: hotkey, combo: ctrl+q}, handler: {flow: announce}}]";
    let yaml = format!(
        r#"
file: consts.ra
constants:
  - {{name: marker, value: {{type: call, callee: press, args: [{{type: literal, value: x}}]}}}}
  - {{name: key, value: {{type: literal, value: f1}}}}
flows:
  - name: main
    body:
      - {{type: let, name: i, span: {{line: 1}}, value: {{type: literal, value: 0}}}}
      - type: while
        span: {{line: 2}}
        condition: {{type: binary, op: "<", left: {{type: identifier, name: i}}, right: {{type: literal, value: 25}}}}
        body:
          - {{type: expr, span: {{line: 3}}, expr: {{type: call, callee: sleep, args: [{{type: literal, value: 20}}]}}}}
          - {{type: assign, span: {{line: 4}}, target: {{type: identifier, name: i}}, value: {{type: binary, op: "+", left: {{type: identifier, name: i}}, right: {{type: literal, value: 1}}}}}}
      - {{type: return, span: {{line: 5}}, value: {{type: literal, value: 1}}}}
  - name: announce
    body:
      - {{type: expr, span: {{line: 10}}, expr: {{type: call, callee: press, args: [{{type: identifier, name: key}}]}}}}
interrupts: {rules}
"#,
        rules = rules,
    );
    let document: ScriptDocument = serde_yaml::from_str(&yaml).unwrap();
    let session = RunSession::builder(document, input_policy(), b.automation)
        .scanner_config(fast_scanner())
        .hotkeys(hotkeys)
        .build();

    assert_eq!(session.run().unwrap(), Value::Int(1));
    let actions = b.input.actions();
    assert_eq!(actions.iter().filter(|a| **a == InputAction::Press("x".into())).count(), 1);
    assert_eq!(actions.iter().filter(|a| **a == InputAction::Press("f1".into())).count(), 1);
    assert_eq!(actions[0], InputAction::Press("x".into()));
}

// ============================================================================
// Debugger
// ============================================================================

#[test]
fn test_breakpoint_pauses_session() {
    let b = backends();
    let debugger = Arc::new(Debugger::new());
    debugger.add_breakpoint("busy.ra", 6);
    let session = Arc::new(
        RunSession::builder(busy_document(2, "[]"), input_policy(), b.automation)
            .debugger(debugger.clone())
            .build(),
    );

    let worker = session.clone();
    let run = thread::spawn(move || worker.run());

    let deadline = Instant::now() + Duration::from_secs(5);
    while debugger.state() != DebugState::Paused {
        assert!(Instant::now() < deadline, "never paused");
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(debugger.location().map(|l| l.line), Some(6));
    assert_eq!(debugger.evaluate("i * 10"), Ok(Value::Int(20)));

    debugger.continue_execution().unwrap();
    assert_eq!(run.join().unwrap().unwrap(), Value::Int(2));
    assert_eq!(debugger.state(), DebugState::Idle);
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_json_and_yaml_documents() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("doc.json");
    let yaml_path = dir.path().join("doc.yaml");
    std::fs::write(
        &json_path,
        r#"{"file": "j.ra", "flows": [{"name": "main", "body": [
            {"type": "return", "value": {"type": "literal", "value": 7}}]}]}"#,
    )
    .unwrap();
    std::fs::write(
        &yaml_path,
        "file: y.ra\nflows:\n  - name: main\n    body:\n      - {type: return, value: {type: literal, value: 8}}\n",
    )
    .unwrap();

    for (path, expected) in [(json_path, 7), (yaml_path, 8)] {
        let document = ScriptDocument::load(&path).unwrap();
        let b = backends();
        let session = RunSession::builder(document, SecurityPolicy::none(), b.automation).build();
        assert_eq!(session.run().unwrap(), Value::Int(expected));
    }

    let missing = ScriptDocument::load(dir.path().join("nope.yaml"));
    assert!(matches!(missing, Err(RunnerError::Io { .. })));
}
