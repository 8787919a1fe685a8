//! Scanner behavior with in-memory capabilities

use parking_lot::Mutex;
use retro_core::testing::{InputAction, RecordingInput, ScriptedMatcher};
use retro_core::{CapabilityResult, InputController, InputGate, Match, Matcher, MouseButton, Region};
use retro_interrupt::{
    Handler, InterruptAction, InterruptObserver, InterruptRule, InterruptScanner, ScannerConfig,
    ScannerState, Trigger,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Recorder {
    fired: Mutex<Vec<String>>,
    completed: Mutex<Vec<(String, bool)>>,
}

impl InterruptObserver for Recorder {
    fn on_interrupt(&self, rule: &InterruptRule, _matched: &Match) {
        self.fired.lock().push(rule.id.clone());
    }

    fn on_interrupt_complete(&self, rule: &InterruptRule, _matched: &Match, success: bool) {
        self.completed.lock().push((rule.id.clone(), success));
    }
}

struct Panicker;

impl InterruptObserver for Panicker {
    fn on_interrupt(&self, _rule: &InterruptRule, _matched: &Match) {
        panic!("observer bug");
    }
}

/// Input driver whose clicks crash
struct CrashingInput;

impl InputController for CrashingInput {
    fn click(&self, _x: i32, _y: i32, _button: MouseButton, _count: u32) -> CapabilityResult<()> {
        panic!("driver crashed");
    }
    fn move_to(&self, _x: i32, _y: i32) -> CapabilityResult<()> {
        Ok(())
    }
    fn press(&self, _key: &str) -> CapabilityResult<()> {
        Ok(())
    }
    fn type_text(&self, _text: &str) -> CapabilityResult<()> {
        Ok(())
    }
    fn hotkey(&self, _keys: &[String]) -> CapabilityResult<()> {
        Ok(())
    }
    fn scroll(&self, _amount: i32) -> CapabilityResult<()> {
        Ok(())
    }
    fn drag(&self, _x1: i32, _y1: i32, _x2: i32, _y2: i32) -> CapabilityResult<()> {
        Ok(())
    }
}

/// Matcher that crashes on one asset and defers to a scripted screen otherwise
struct CrashingMatcher {
    broken: String,
    screen: ScriptedMatcher,
}

impl Matcher for CrashingMatcher {
    fn find_adaptive(&self, asset_id: &str, region: Option<Region>, adaptive: bool) -> CapabilityResult<Option<Match>> {
        if asset_id == self.broken {
            panic!("matcher crashed");
        }
        self.screen.find_adaptive(asset_id, region, adaptive)
    }
}

fn click_rule(id: &str, priority: i32, asset: &str) -> InterruptRule {
    InterruptRule::new(
        id,
        priority,
        Trigger::image(asset),
        Handler::Actions(vec![InterruptAction::Click {
            x: None,
            y: None,
            button: Default::default(),
            clicks: 1,
        }]),
    )
}

fn fast_config(cooldown_ms: u64) -> ScannerConfig {
    ScannerConfig {
        poll_interval: Duration::from_millis(5),
        idle_interval: Duration::from_millis(10),
        idle_after: 10,
        cooldown: Duration::from_millis(cooldown_ms),
        join_timeout: Duration::from_millis(500),
    }
}

fn setup(cooldown_ms: u64) -> (InterruptScanner, Arc<ScriptedMatcher>, Arc<RecordingInput>, Arc<Recorder>) {
    let matcher = Arc::new(ScriptedMatcher::new());
    let input = Arc::new(RecordingInput::new());
    let scanner = InterruptScanner::new(
        matcher.clone(),
        Arc::new(InputGate::new(input.clone())),
        fast_config(cooldown_ms),
    );
    let recorder = Arc::new(Recorder::default());
    scanner.add_observer(recorder.clone());
    (scanner, matcher, input, recorder)
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_priority_then_cooldown_then_eligible_again() {
    let (scanner, matcher, _input, recorder) = setup(150);
    matcher.show("low_asset", 0, 0, 10, 10);
    matcher.show("high_asset", 50, 50, 10, 10);
    scanner.add_rule(click_rule("low", 5, "low_asset"));
    scanner.add_rule(click_rule("high", 10, "high_asset"));

    assert!(scanner.scan_once());
    // high is cooling, so the next pass falls through to low
    assert!(scanner.scan_once());
    // both cooling
    assert!(!scanner.scan_once());
    assert_eq!(*recorder.fired.lock(), vec!["high", "low"]);

    thread::sleep(Duration::from_millis(200));
    assert!(scanner.scan_once());
    assert_eq!(recorder.fired.lock().last().map(String::as_str), Some("high"));
}

#[test]
fn test_clear_cooldowns_makes_rule_eligible() {
    let (scanner, matcher, input, _recorder) = setup(60_000);
    matcher.show("popup", 10, 10, 10, 10);
    scanner.add_rule(click_rule("popup", 1, "popup"));

    assert!(scanner.scan_once());
    assert!(!scanner.scan_once());
    scanner.clear_cooldowns();
    assert!(scanner.scan_once());
    assert_eq!(input.actions().len(), 2);
}

#[test]
fn test_disabled_rules_and_hidden_assets_never_fire() {
    let (scanner, matcher, _input, recorder) = setup(10);
    let mut rule = click_rule("off", 1, "popup");
    rule.enabled = false;
    matcher.show("popup", 0, 0, 1, 1);
    scanner.add_rule(rule);
    scanner.add_rule(click_rule("absent", 1, "not_on_screen"));

    assert!(!scanner.scan_once());
    assert!(recorder.fired.lock().is_empty());
}

#[test]
fn test_action_failure_is_reported_not_propagated() {
    let (scanner, matcher, input, recorder) = setup(10);
    matcher.show("popup", 0, 0, 10, 10);
    input.set_failing(true);
    scanner.add_rule(click_rule("popup", 1, "popup"));

    assert!(scanner.scan_once());
    assert_eq!(*recorder.completed.lock(), vec![("popup".to_string(), false)]);
    assert_eq!(scanner.state(), ScannerState::Scanning);
}

#[test]
fn test_panicking_observer_does_not_kill_scanner() {
    let (scanner, matcher, input, recorder) = setup(10);
    scanner.add_observer(Arc::new(Panicker));
    matcher.show("popup", 0, 0, 10, 10);
    scanner.add_rule(click_rule("popup", 1, "popup"));

    scanner.start().unwrap();
    wait_until("completion", || !recorder.completed.lock().is_empty());
    assert!(scanner.is_running());
    scanner.stop();

    assert!(!input.actions().is_empty());
    assert_eq!(recorder.completed.lock()[0], ("popup".to_string(), true));
}

#[test]
fn test_background_loop_pause_resume_and_stop() {
    let (scanner, matcher, input, _recorder) = setup(1);
    scanner.add_rule(click_rule("popup", 1, "popup"));
    scanner.start().unwrap();
    assert!(scanner.is_running());

    scanner.pause();
    // Let the loop reach the gate
    thread::sleep(Duration::from_millis(50));
    matcher.show("popup", 0, 0, 10, 10);
    thread::sleep(Duration::from_millis(50));
    assert!(input.actions().is_empty());

    scanner.resume();
    wait_until("an interrupt click", || !input.actions().is_empty());

    scanner.stop();
    assert!(!scanner.is_running());
    assert_eq!(scanner.state(), ScannerState::Stopped);

    let count = input.actions().len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(input.actions().len(), count);
}

#[test]
fn test_stop_interrupts_long_delay() {
    let (scanner, matcher, input, recorder) = setup(10);
    matcher.show("popup", 0, 0, 10, 10);
    scanner.add_rule(InterruptRule::new(
        "slow",
        1,
        Trigger::image("popup"),
        Handler::Actions(vec![
            InterruptAction::Delay { ms: 60_000 },
            InterruptAction::Press { key: "esc".into() },
        ]),
    ));

    scanner.start().unwrap();
    wait_until("the interrupt to begin", || !recorder.fired.lock().is_empty());
    let started = Instant::now();
    scanner.stop();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!input.actions().contains(&InputAction::Press("esc".into())));
    assert_eq!(*recorder.completed.lock(), vec![("slow".to_string(), false)]);
}

#[test]
fn test_interrupt_actions_wait_for_input_gate() {
    let matcher = Arc::new(ScriptedMatcher::new());
    let input = Arc::new(RecordingInput::new());
    let gate = Arc::new(InputGate::new(input.clone()));
    let scanner = InterruptScanner::new(matcher.clone(), gate.clone(), fast_config(10));
    matcher.show("popup", 0, 0, 10, 10);
    scanner.add_rule(click_rule("popup", 1, "popup"));

    let held = gate.acquire();
    scanner.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(input.actions().is_empty());
    drop(held);

    wait_until("the gated click", || !input.actions().is_empty());
    scanner.stop();
}

#[test]
fn test_rules_from_yaml_drive_scanner() {
    let rules: Vec<InterruptRule> = serde_yaml::from_str(
        r#"
- id: close_popup
  priority: 10
  trigger: {type: image, asset: popup_close}
  handler:
    actions:
      - {type: click, x: 5, y: 6}
      - {type: press, key: esc}
- id: panic_key
  priority: 100
  trigger: {type: hotkey, combo: ctrl+shift+q}
  handler: {flow: emergency_stop}
"#,
    )
    .unwrap();

    let (scanner, matcher, input, _recorder) = setup(10);
    for rule in rules {
        scanner.add_rule(rule);
    }
    let order: Vec<String> = scanner.rules().into_iter().map(|r| r.id).collect();
    assert_eq!(order, vec!["panic_key", "close_popup"]);

    matcher.show("popup_close", 0, 0, 10, 10);
    assert!(scanner.scan_once());
    assert_eq!(input.actions().len(), 2);
    assert_eq!(input.actions()[1], InputAction::Press("esc".into()));
}

#[test]
fn test_crashing_input_driver_does_not_kill_scanner() {
    let matcher = Arc::new(ScriptedMatcher::new());
    let scanner = InterruptScanner::new(
        matcher.clone(),
        Arc::new(InputGate::new(Arc::new(CrashingInput))),
        fast_config(10),
    );
    let recorder = Arc::new(Recorder::default());
    scanner.add_observer(recorder.clone());
    matcher.show("popup", 0, 0, 10, 10);
    scanner.add_rule(click_rule("popup", 1, "popup"));

    scanner.start().unwrap();
    wait_until("two failed interrupts", || recorder.completed.lock().len() >= 2);
    assert!(scanner.is_running());
    assert!(recorder.completed.lock().iter().all(|(id, ok)| id == "popup" && !ok));

    let started = Instant::now();
    scanner.stop();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(scanner.state(), ScannerState::Stopped);
}

#[test]
fn test_crashing_matcher_skips_to_next_rule() {
    let screen = ScriptedMatcher::new();
    screen.show("popup", 0, 0, 10, 10);
    let input = Arc::new(RecordingInput::new());
    let scanner = InterruptScanner::new(
        Arc::new(CrashingMatcher { broken: "glitch".into(), screen }),
        Arc::new(InputGate::new(input.clone())),
        fast_config(60_000),
    );
    scanner.add_rule(click_rule("glitch", 10, "glitch"));
    scanner.add_rule(click_rule("popup", 1, "popup"));

    assert!(scanner.scan_once());
    assert_eq!(input.actions().len(), 1);
    assert!(!scanner.scan_once());
}

#[test]
fn test_stop_while_waiting_for_input_gate() {
    let matcher = Arc::new(ScriptedMatcher::new());
    let input = Arc::new(RecordingInput::new());
    let gate = Arc::new(InputGate::new(input.clone()));
    let scanner = InterruptScanner::new(matcher.clone(), gate.clone(), fast_config(10));
    let recorder = Arc::new(Recorder::default());
    scanner.add_observer(recorder.clone());
    matcher.show("popup", 0, 0, 10, 10);
    scanner.add_rule(click_rule("popup", 1, "popup"));

    let _held = gate.acquire();
    scanner.start().unwrap();
    wait_until("the interrupt to fire", || !recorder.fired.lock().is_empty());

    let started = Instant::now();
    scanner.stop();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(input.actions().is_empty());
    assert_eq!(*recorder.completed.lock(), vec![("popup".to_string(), false)]);
}
