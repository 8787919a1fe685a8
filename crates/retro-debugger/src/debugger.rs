//! Debugger state machine

use crate::breakpoint::{Breakpoint, BreakpointId, BreakpointStore};
use crate::error::{DebugError, DebugResult};
use crate::frame::{variables_of, FrameId, StackFrame, Variable};
use crate::watch::evaluate_watch;
use parking_lot::{Condvar, Mutex, RwLock};
use retro_core::Value;
use retro_script::{Location, StepHook, StepVerdict};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Debugger run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugState {
    Idle,
    Running,
    Paused,
    /// A step command is in flight; settles back into `Paused`
    Stepping,
}

impl fmt::Display for DebugState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DebugState::Idle => "idle",
            DebugState::Running => "running",
            DebugState::Paused => "paused",
            DebugState::Stepping => "stepping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// Next line in this flow or a caller
    Over,
    /// Next line anywhere, including inside a called flow
    Into,
    /// Next line after the current flow returns
    Out,
}

impl StepMode {
    fn should_stop(self, depth: usize, recorded: usize) -> bool {
        match self {
            StepMode::Over => depth <= recorded,
            StepMode::Into => true,
            StepMode::Out => depth < recorded,
        }
    }
}

/// Why execution halted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Breakpoint(BreakpointId),
    Step,
    Pause,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::Breakpoint(_) => f.write_str("breakpoint"),
            PauseReason::Step => f.write_str("step"),
            PauseReason::Pause => f.write_str("pause"),
        }
    }
}

/// Receives debugger notifications
///
/// Callbacks run on the thread that caused them: `on_step` and `on_paused`
/// on the interpreter thread, the rest on the controller thread. No debugger
/// lock is held while they run.
pub trait DebugObserver: Send + Sync {
    fn on_paused(&self, _reason: PauseReason, _location: &Location) {}

    fn on_resumed(&self) {}

    fn on_step(&self, _flow: &str, _line: u32, _action: &str) {}

    fn on_stopped(&self) {}
}

#[derive(Debug)]
struct Session {
    state: DebugState,
    step: Option<(StepMode, usize)>,
    /// Set by `stop()`; releases a blocked interpreter with an abort verdict
    abort: bool,
    pause_reason: Option<PauseReason>,
    location: Option<Location>,
    frames: Vec<StackFrame>,
    next_frame_id: u64,
    /// Last known value of every variable the interpreter reported
    snapshot: HashMap<String, Value>,
    /// Bindings reported outside any flow
    globals: HashMap<String, Value>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: DebugState::Idle,
            step: None,
            abort: false,
            pause_reason: None,
            location: None,
            frames: Vec::new(),
            next_frame_id: 0,
            snapshot: HashMap::new(),
            globals: HashMap::new(),
        }
    }
}

/// Breakpoint and stepping debugger
///
/// Attach it to an interpreter as its [`StepHook`] and drive it from another
/// thread. When `before_step` decides to halt it blocks the interpreter
/// thread until `continue_execution`, a step command or `stop`.
///
/// ```text
/// idle --start--> running --pause/breakpoint--> paused --step_*--> stepping
///   ^                ^                            |                   |
///   |                +-------continue_execution---+                   |
///   +-------------------stop (any state)          +<---next stop------+
/// ```
pub struct Debugger {
    session: Mutex<Session>,
    resumed: Condvar,
    breakpoints: BreakpointStore,
    observers: RwLock<Vec<Arc<dyn DebugObserver>>>,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("state", &self.state())
            .field("breakpoints", &self.breakpoints.len())
            .finish()
    }
}

impl Debugger {
    pub fn new() -> Self {
        Self {
            session: Mutex::new(Session::default()),
            resumed: Condvar::new(),
            breakpoints: BreakpointStore::new(),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn DebugObserver>) {
        self.observers.write().push(observer);
    }

    fn notify(&self, f: impl Fn(&dyn DebugObserver)) {
        // Snapshot the list so observers can call back into the debugger
        let observers = self.observers.read().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }

    pub fn breakpoints(&self) -> &BreakpointStore {
        &self.breakpoints
    }

    pub fn add_breakpoint(&self, file: impl Into<String>, line: u32) -> Breakpoint {
        self.breakpoints.add(Location::new(file, line))
    }

    pub fn remove_breakpoint(&self, id: BreakpointId) -> DebugResult<Breakpoint> {
        self.breakpoints.remove(id)
    }

    pub fn toggle_breakpoint(&self, id: BreakpointId) -> DebugResult<bool> {
        self.breakpoints.toggle(id)
    }

    pub fn state(&self) -> DebugState {
        self.session.lock().state
    }

    pub fn step_mode(&self) -> Option<StepMode> {
        self.session.lock().step.map(|(mode, _)| mode)
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        self.session.lock().pause_reason
    }

    /// Location of the last step the interpreter reported
    pub fn location(&self) -> Option<Location> {
        self.session.lock().location.clone()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Begin a debugging session: any state to running
    pub fn start(&self) {
        let mut session = self.session.lock();
        *session = Session {
            state: DebugState::Running,
            ..Session::default()
        };
        info!("Debugger started");
    }

    /// Ask the interpreter to halt before its next step
    pub fn pause(&self) -> DebugResult<()> {
        let mut session = self.session.lock();
        if session.state != DebugState::Running {
            return Err(DebugError::InvalidState {
                command: "pause",
                state: session.state,
            });
        }
        session.state = DebugState::Paused;
        session.pause_reason = Some(PauseReason::Pause);
        debug!("Pause requested");
        Ok(())
    }

    pub fn continue_execution(&self) -> DebugResult<()> {
        self.resume("continue", DebugState::Running, None)
    }

    pub fn step_over(&self) -> DebugResult<()> {
        self.step(StepMode::Over)
    }

    pub fn step_into(&self) -> DebugResult<()> {
        self.step(StepMode::Into)
    }

    pub fn step_out(&self) -> DebugResult<()> {
        self.step(StepMode::Out)
    }

    fn step(&self, mode: StepMode) -> DebugResult<()> {
        self.resume("step", DebugState::Stepping, Some(mode))
    }

    fn resume(&self, command: &'static str, next: DebugState, mode: Option<StepMode>) -> DebugResult<()> {
        {
            let mut session = self.session.lock();
            if session.state != DebugState::Paused {
                return Err(DebugError::InvalidState {
                    command,
                    state: session.state,
                });
            }
            let depth = session.frames.len();
            session.state = next;
            session.step = mode.map(|m| (m, depth));
            session.pause_reason = None;
            debug!(?mode, depth, "Resuming");
        }
        self.resumed.notify_all();
        self.notify(|o| o.on_resumed());
        Ok(())
    }

    /// End the session from any state; a blocked interpreter is released
    /// and told to abort
    pub fn stop(&self) {
        {
            let mut session = self.session.lock();
            session.abort = session.state != DebugState::Idle;
            session.state = DebugState::Idle;
            session.step = None;
            session.pause_reason = None;
        }
        self.resumed.notify_all();
        info!("Debugger stopped");
        self.notify(|o| o.on_stopped());
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Active frames, innermost first
    pub fn stack_frames(&self) -> Vec<StackFrame> {
        self.session.lock().frames.iter().rev().cloned().collect()
    }

    /// Locals of the given frame (innermost when `None`), sorted by name
    ///
    /// Outside any flow the globals are returned.
    pub fn get_variables(&self, frame: Option<FrameId>) -> DebugResult<Vec<Variable>> {
        let session = self.session.lock();
        match frame {
            Some(id) => session
                .frames
                .iter()
                .find(|f| f.id == id)
                .map(|f| variables_of(&f.locals))
                .ok_or(DebugError::UnknownFrame(id)),
            None => Ok(match session.frames.last() {
                Some(frame) => variables_of(&frame.locals),
                None => variables_of(&session.globals),
            }),
        }
    }

    /// Overwrite a variable in the tracked snapshot and the innermost frame
    ///
    /// Only the debugger's view changes; the running script is unaffected.
    pub fn set_variable(&self, name: &str, value: Value) {
        let mut guard = self.session.lock();
        let session = &mut *guard;
        session.snapshot.insert(name.to_string(), value.clone());
        match session.frames.last_mut() {
            Some(frame) => frame.locals.insert(name.to_string(), value),
            None => session.globals.insert(name.to_string(), value),
        };
    }

    /// Evaluate a watch expression against the tracked snapshot
    pub fn evaluate(&self, expression: &str) -> Result<Value, String> {
        let snapshot = self.session.lock().snapshot.clone();
        evaluate_watch(expression, &snapshot)
    }

    /// Innermost locals layered over the snapshot
    fn condition_scope(&self) -> HashMap<String, Value> {
        let session = self.session.lock();
        let mut scope = session.snapshot.clone();
        if let Some(frame) = session.frames.last() {
            scope.extend(frame.locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        scope
    }

    // ------------------------------------------------------------------
    // Step hook internals
    // ------------------------------------------------------------------

    fn halt_reason(&self, location: &Location, depth: usize) -> Option<PauseReason> {
        let step = {
            let session = self.session.lock();
            if session.state == DebugState::Paused {
                return Some(PauseReason::Pause);
            }
            session.step
        };

        if let Some(breakpoint) = self.breakpoints.hit(location) {
            let halt = match &breakpoint.condition {
                None => true,
                Some(condition) => match evaluate_watch(condition, &self.condition_scope()) {
                    Ok(value) => value.is_truthy(),
                    Err(e) => {
                        warn!(id = %breakpoint.id, %condition, error = %e, "Breakpoint condition failed");
                        true
                    }
                },
            };
            if halt {
                return Some(PauseReason::Breakpoint(breakpoint.id));
            }
        }

        match step {
            Some((mode, recorded)) if mode.should_stop(depth, recorded) => Some(PauseReason::Step),
            _ => None,
        }
    }

    /// Enter the paused state and block until resumed or stopped
    fn halt(&self, reason: PauseReason, location: &Location) -> StepVerdict {
        {
            let mut session = self.session.lock();
            if session.abort {
                return StepVerdict::Abort;
            }
            session.state = DebugState::Paused;
            session.step = None;
            session.pause_reason = Some(reason);
        }
        info!(%reason, %location, "Execution paused");
        self.notify(|o| o.on_paused(reason, location));

        let mut session = self.session.lock();
        while session.state == DebugState::Paused && !session.abort {
            self.resumed.wait(&mut session);
        }
        if session.abort {
            StepVerdict::Abort
        } else {
            StepVerdict::Continue
        }
    }
}

impl StepHook for Debugger {
    fn before_step(&self, location: &Location, action: &str) -> StepVerdict {
        let (flow, depth) = {
            let mut session = self.session.lock();
            if session.abort {
                return StepVerdict::Abort;
            }
            if session.state == DebugState::Idle {
                return StepVerdict::Continue;
            }
            session.location = Some(location.clone());
            let flow = match session.frames.last_mut() {
                Some(frame) => {
                    frame.line = location.line;
                    frame.flow_name.clone()
                }
                None => String::new(),
            };
            (flow, session.frames.len())
        };
        self.notify(|o| o.on_step(&flow, location.line, action));

        match self.halt_reason(location, depth) {
            Some(reason) => self.halt(reason, location),
            None => StepVerdict::Continue,
        }
    }

    fn enter_flow(&self, name: &str, location: Option<&Location>) {
        let mut session = self.session.lock();
        session.next_frame_id += 1;
        let frame = StackFrame {
            id: FrameId::new(session.next_frame_id),
            flow_name: name.to_string(),
            line: location.map(|l| l.line).unwrap_or(0),
            locals: HashMap::new(),
        };
        session.frames.push(frame);
    }

    fn exit_flow(&self, _name: &str) {
        self.session.lock().frames.pop();
    }

    fn variable_changed(&self, name: &str, value: &Value) {
        let mut guard = self.session.lock();
        let session = &mut *guard;
        session.snapshot.insert(name.to_string(), value.clone());
        match session.frames.last_mut() {
            Some(frame) => frame.locals.insert(name.to_string(), value.clone()),
            None => session.globals.insert(name.to_string(), value.clone()),
        };
    }
}
