//! Background interrupt scanner

use crate::cooldown::{CooldownTracker, DEFAULT_COOLDOWN};
use crate::error::{InterruptError, InterruptResult};
use crate::rule::{Handler, InterruptAction, InterruptRule, Trigger};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use retro_core::{CapabilityResult, HotkeyProbe, InputGate, InputSession, Match, Matcher, Signal};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Scanner pacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Sleep after a pass while the screen is busy
    pub poll_interval: Duration,
    /// Sleep after `idle_after` consecutive quiet passes
    pub idle_interval: Duration,
    pub idle_after: u32,
    pub cooldown: Duration,
    /// How long `stop` waits for the thread before abandoning it
    pub join_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            idle_interval: Duration::from_millis(500),
            idle_after: 10,
            cooldown: DEFAULT_COOLDOWN,
            join_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerState {
    Idle,
    Scanning,
    Executing,
    Stopped,
}

/// Request to run a flow, produced by rules with a [`Handler::Flow`]
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequest {
    pub rule_id: String,
    pub flow: String,
    pub matched: Match,
}

/// Interrupt notifications, called on the scanner thread
///
/// A panicking observer is logged and does not stop the scanner.
pub trait InterruptObserver: Send + Sync {
    fn on_interrupt(&self, _rule: &InterruptRule, _matched: &Match) {}

    fn on_interrupt_complete(&self, _rule: &InterruptRule, _matched: &Match, _success: bool) {}
}

struct Shared {
    config: ScannerConfig,
    matcher: Arc<dyn Matcher>,
    hotkeys: Option<Arc<dyn HotkeyProbe>>,
    input: Arc<InputGate>,
    rules: RwLock<Vec<InterruptRule>>,
    observers: RwLock<Vec<Arc<dyn InterruptObserver>>>,
    state: Mutex<ScannerState>,
    cooldowns: Mutex<CooldownTracker>,
    /// Set while scanning may proceed; cleared by `pause`
    run_gate: Signal,
    stop: Signal,
    finished: Signal,
    flow_tx: mpsc::UnboundedSender<FlowRequest>,
}

/// Watches for interrupt triggers on its own thread and pre-empts the main
/// script by running the matching rule's handler
///
/// Inline actions run while holding the shared [`InputGate`], so they never
/// interleave with the interpreter's own input.
pub struct InterruptScanner {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
    flow_rx: Mutex<Option<mpsc::UnboundedReceiver<FlowRequest>>>,
}

impl InterruptScanner {
    pub fn new(matcher: Arc<dyn Matcher>, input: Arc<InputGate>, config: ScannerConfig) -> Self {
        let (flow_tx, flow_rx) = mpsc::unbounded_channel();
        let cooldowns = CooldownTracker::new(config.cooldown);
        Self {
            shared: Arc::new(Shared {
                config,
                matcher,
                hotkeys: None,
                input,
                rules: RwLock::new(Vec::new()),
                observers: RwLock::new(Vec::new()),
                state: Mutex::new(ScannerState::Idle),
                cooldowns: Mutex::new(cooldowns),
                run_gate: Signal::new(true),
                stop: Signal::new(false),
                finished: Signal::new(false),
                flow_tx,
            }),
            handle: Mutex::new(None),
            flow_rx: Mutex::new(Some(flow_rx)),
        }
    }

    /// Enable hotkey triggers; without a probe they never fire
    ///
    /// Must be called before the scanner is shared.
    pub fn with_hotkeys(mut self, hotkeys: Arc<dyn HotkeyProbe>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.hotkeys = Some(hotkeys);
        } else {
            warn!("Scanner already shared, hotkey probe ignored");
        }
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.shared.config
    }

    /// Register a rule, keeping rules in descending priority order
    ///
    /// Rules of equal priority keep their registration order.
    pub fn add_rule(&self, rule: InterruptRule) {
        debug!(rule = %rule.id, priority = rule.priority, trigger = %rule.trigger, "Interrupt rule added");
        let mut rules = self.shared.rules.write();
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn remove_rule(&self, id: &str) -> Option<InterruptRule> {
        let mut rules = self.shared.rules.write();
        let index = rules.iter().position(|r| r.id == id)?;
        Some(rules.remove(index))
    }

    /// Rules in the order they are checked
    pub fn rules(&self) -> Vec<InterruptRule> {
        self.shared.rules.read().clone()
    }

    pub fn add_observer(&self, observer: Arc<dyn InterruptObserver>) {
        self.shared.observers.write().push(observer);
    }

    /// Take the receiving end of the flow request channel
    ///
    /// Only the first call gets the receiver.
    pub fn take_flow_requests(&self) -> Option<mpsc::UnboundedReceiver<FlowRequest>> {
        self.flow_rx.lock().take()
    }

    pub fn state(&self) -> ScannerState {
        *self.shared.state.lock()
    }

    pub fn clear_cooldowns(&self) {
        self.shared.cooldowns.lock().clear();
        debug!("Interrupt cooldowns cleared");
    }

    /// Start the scan loop on a background thread
    pub fn start(&self) -> InterruptResult<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            warn!("Interrupt scanner already running");
            return Ok(());
        }

        self.shared.stop.clear();
        self.shared.finished.clear();
        self.shared.run_gate.set();

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("interrupt-scanner".to_string())
            .spawn(move || shared.run())?;
        *handle = Some(spawned);
        info!(rules = self.shared.rules.read().len(), "Interrupt scanner started");
        Ok(())
    }

    /// Signal the loop to stop and wait up to the join timeout
    ///
    /// A thread that does not finish in time is abandoned.
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        self.shared.stop.set();
        self.shared.run_gate.set();

        if self.shared.finished.wait_timeout(self.shared.config.join_timeout) {
            if handle.join().is_err() {
                error!("Interrupt scanner thread panicked");
            }
        } else {
            warn!(
                timeout_ms = self.shared.config.join_timeout.as_millis() as u64,
                "Interrupt scanner did not stop in time, abandoning thread"
            );
        }
        self.shared.set_state(ScannerState::Stopped);
        info!("Interrupt scanner stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some() && !self.shared.finished.is_set()
    }

    /// Block the scan loop before its next pass
    pub fn pause(&self) {
        self.shared.run_gate.clear();
        info!("Interrupt scanner paused");
    }

    pub fn resume(&self) {
        self.shared.run_gate.set();
        info!("Interrupt scanner resumed");
    }

    pub fn is_paused(&self) -> bool {
        !self.shared.run_gate.is_set()
    }

    /// Run a single pass on the calling thread; returns whether a rule fired
    pub fn scan_once(&self) -> bool {
        self.shared.scan_once()
    }
}

impl Drop for InterruptScanner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn set_state(&self, state: ScannerState) {
        *self.state.lock() = state;
    }

    fn run(&self) {
        let _exit = LoopExit(self);
        let mut quiet_passes: u32 = 0;
        loop {
            // Blocks entirely while paused
            self.run_gate.wait();
            if self.stop.is_set() {
                break;
            }

            self.set_state(ScannerState::Scanning);
            let fired = self.scan_once();
            quiet_passes = if fired { 0 } else { quiet_passes.saturating_add(1) };

            let interval = if quiet_passes >= self.config.idle_after {
                self.config.idle_interval
            } else {
                self.config.poll_interval
            };
            if self.stop.wait_timeout(interval) {
                break;
            }
        }
    }

    fn scan_once(&self) -> bool {
        let rules = self.rules.read().clone();
        for rule in rules.iter().filter(|r| r.enabled) {
            if self.stop.is_set() {
                return false;
            }
            let key = rule.trigger.cooldown_key();
            if self.cooldowns.lock().is_cooling(&key) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| self.check_trigger(&rule.trigger))) {
                Ok(Ok(Some(matched))) => {
                    self.cooldowns.lock().mark(key);
                    self.fire(rule, matched);
                    return true;
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => warn!(rule = %rule.id, error = %e, "Interrupt trigger check failed"),
                Err(_) => error!(rule = %rule.id, "Interrupt trigger check panicked"),
            }
        }
        false
    }

    fn check_trigger(&self, trigger: &Trigger) -> CapabilityResult<Option<Match>> {
        match trigger {
            Trigger::Image { asset, region } => self.matcher.find(asset, *region),
            Trigger::Hotkey { combo } => Ok(self
                .hotkeys
                .as_ref()
                .filter(|probe| probe.is_active(combo))
                .map(|_| Match::new(0, 0, 0, 0, 1.0))),
        }
    }

    #[instrument(skip(self, rule, matched), fields(rule = %rule.id))]
    fn fire(&self, rule: &InterruptRule, matched: Match) {
        self.set_state(ScannerState::Executing);
        info!(
            priority = rule.priority,
            x = matched.x,
            y = matched.y,
            confidence = matched.confidence,
            "Interrupt triggered"
        );
        self.notify(|o| o.on_interrupt(rule, &matched));

        let success = match &rule.handler {
            Handler::Actions(actions) => {
                match catch_unwind(AssertUnwindSafe(|| self.run_actions(actions, &matched))) {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        error!(error = %e, "Interrupt actions failed");
                        false
                    }
                    Err(_) => {
                        error!("Interrupt actions panicked");
                        false
                    }
                }
            }
            Handler::Flow(flow) => {
                let request = FlowRequest {
                    rule_id: rule.id.clone(),
                    flow: flow.clone(),
                    matched: matched.clone(),
                };
                match self.flow_tx.send(request) {
                    Ok(()) => true,
                    Err(_) => {
                        warn!(%flow, "No receiver for interrupt flow request");
                        false
                    }
                }
            }
        };

        self.notify(|o| o.on_interrupt_complete(rule, &matched, success));
        self.set_state(ScannerState::Scanning);
    }

    fn notify(&self, f: impl Fn(&dyn InterruptObserver)) {
        let observers = self.observers.read().clone();
        for observer in &observers {
            if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
                error!("Interrupt observer panicked");
            }
        }
    }

    /// Run the action list while holding the input gate
    fn run_actions(&self, actions: &[InterruptAction], matched: &Match) -> InterruptResult<()> {
        let device = self.acquire_input()?;
        for action in actions {
            if self.stop.is_set() {
                return Err(InterruptError::Stopped);
            }
            debug!(action = action.name(), "Interrupt action");
            match action {
                InterruptAction::Click { x, y, button, clicks } => {
                    let (cx, cy) = matched.center();
                    device.click(x.unwrap_or(cx), y.unwrap_or(cy), *button, *clicks)?;
                }
                InterruptAction::Delay { ms } => self.delay(Duration::from_millis(*ms))?,
                InterruptAction::DelayRandom { min_ms, max_ms } => {
                    let (lo, hi) = if min_ms <= max_ms { (*min_ms, *max_ms) } else { (*max_ms, *min_ms) };
                    let ms = rand::thread_rng().gen_range(lo..=hi);
                    self.delay(Duration::from_millis(ms))?;
                }
                InterruptAction::Hotkey { keys } => device.hotkey(keys)?,
                InterruptAction::Press { key } => device.press(key)?,
                InterruptAction::TypeText { text, enter } => {
                    device.type_text(text)?;
                    if *enter {
                        device.press("enter")?;
                    }
                }
                InterruptAction::Scroll { amount } => device.scroll(*amount)?,
                InterruptAction::Drag { x1, y1, x2, y2 } => device.drag(*x1, *y1, *x2, *y2)?,
            }
        }
        Ok(())
    }

    /// Wait for the input gate, giving up if the scanner is stopped meanwhile
    fn acquire_input(&self) -> InterruptResult<InputSession<'_>> {
        let mut contended = false;
        loop {
            if let Some(device) = self.input.try_acquire_for(self.config.poll_interval.max(Duration::from_millis(1))) {
                return Ok(device);
            }
            if !contended {
                debug!("Input gate busy, waiting for the script");
                contended = true;
            }
            if self.stop.is_set() {
                return Err(InterruptError::Stopped);
            }
        }
    }

    /// Sleep that wakes early when the scanner is stopped
    fn delay(&self, duration: Duration) -> InterruptResult<()> {
        if self.stop.wait_timeout(duration) {
            return Err(InterruptError::Stopped);
        }
        Ok(())
    }
}

/// Reports the loop as finished however it exits, unwinding included
struct LoopExit<'a>(&'a Shared);

impl Drop for LoopExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Interrupt scan loop panicked");
        }
        self.0.set_state(ScannerState::Stopped);
        self.0.finished.set();
        debug!("Interrupt scan loop exited");
    }
}
