//! Step hook installed on every session run
//!
//! At each statement boundary it checks the session's stop signal, runs any
//! flows requested by interrupt rules, then hands over to the debugger.
//! Requested flows run to completion before the main flow's next statement,
//! on a separate interpreter that shares the main run's evaluated constants.

use parking_lot::Mutex;
use retro_builtins::BuiltinRegistry;
use retro_core::{Signal, Value};
use retro_interrupt::FlowRequest;
use retro_script::{Interpreter, Location, Program, ScriptResult, StepHook, StepVerdict};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub(crate) struct SessionHook {
    stop: Arc<Signal>,
    debugger: Option<Arc<dyn StepHook>>,
    requests: Option<Mutex<mpsc::UnboundedReceiver<FlowRequest>>>,
    handler: Mutex<Interpreter>,
}

impl SessionHook {
    pub(crate) fn new(
        registry: Arc<BuiltinRegistry>,
        stop: Arc<Signal>,
        debugger: Option<Arc<dyn StepHook>>,
        requests: Option<mpsc::UnboundedReceiver<FlowRequest>>,
    ) -> Self {
        Self {
            stop,
            debugger,
            requests: requests.map(Mutex::new),
            handler: Mutex::new(Interpreter::new(registry)),
        }
    }

    /// Drop requests left over from earlier runs
    pub(crate) fn reset(&self) {
        if let Some(requests) = &self.requests {
            let mut requests = requests.lock();
            while requests.try_recv().is_ok() {}
        }
    }

    /// Load the interrupt-flow interpreter with the main run's globals
    pub(crate) fn prepare(&self, program: &Program, globals: HashMap<String, Value>) {
        if self.requests.is_some() {
            self.handler.lock().load_flows(program, globals);
        }
    }

    /// Run every pending interrupt flow; returns how many ran
    pub(crate) fn serve_interrupts(&self) -> usize {
        let Some(requests) = &self.requests else {
            return 0;
        };

        let mut served = 0;
        loop {
            let Ok(request) = requests.lock().try_recv() else {
                break;
            };
            served += 1;
            if self.stop.is_set() {
                continue;
            }

            info!(rule = %request.rule_id, flow = %request.flow, "Running interrupt flow");
            let result: ScriptResult<Value> = self.handler.lock().call_flow(&request.flow, Vec::new());
            match result {
                Ok(value) => info!(flow = %request.flow, result = %value, "Interrupt flow finished"),
                Err(e) => warn!(flow = %request.flow, error = %e, "Interrupt flow failed"),
            }
        }
        served
    }
}

impl StepHook for SessionHook {
    fn before_step(&self, location: &Location, action: &str) -> StepVerdict {
        if self.stop.is_set() {
            return StepVerdict::Abort;
        }
        self.serve_interrupts();
        match &self.debugger {
            Some(debugger) => debugger.before_step(location, action),
            None => StepVerdict::Continue,
        }
    }

    fn enter_flow(&self, name: &str, location: Option<&Location>) {
        if let Some(debugger) = &self.debugger {
            debugger.enter_flow(name, location);
        }
    }

    fn exit_flow(&self, name: &str) {
        if let Some(debugger) = &self.debugger {
            debugger.exit_flow(name);
        }
    }

    fn variable_changed(&self, name: &str, value: &Value) {
        if let Some(debugger) = &self.debugger {
            debugger.variable_changed(name, value);
        }
    }
}
