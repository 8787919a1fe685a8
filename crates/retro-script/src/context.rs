//! Control-flow signalling around the scope stack

use crate::scope::ScopeManager;
use retro_core::Value;
use tracing::debug;

/// Per-run execution state: scopes, return/break/continue flags and the
/// stack of active flow names
///
/// Owned by the interpreter thread for the whole run.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    scopes: ScopeManager,
    call_stack: Vec<String>,
    should_return: bool,
    should_break: bool,
    should_continue: bool,
    return_value: Option<Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeManager {
        &mut self.scopes
    }

    /// Push a flow frame and record the flow on the call stack
    pub fn enter_flow(&mut self, name: &str) {
        debug!(flow = %name, depth = self.call_stack.len() + 1, "Enter flow");
        self.scopes.push(format!("flow:{}", name), true);
        self.call_stack.push(name.to_string());
    }

    /// Pop the flow frame and call-stack entry, clearing any return
    ///
    /// Loops never span a flow boundary, so a pending break or continue
    /// here is an interpreter bug.
    pub fn exit_flow(&mut self) {
        debug_assert!(
            !self.should_break && !self.should_continue,
            "break/continue leaked out of flow {:?}",
            self.call_stack.last()
        );
        self.unwind_flow();
    }

    /// Pop the flow frame after a fault, discarding every pending signal
    pub fn abandon_flow(&mut self) {
        self.should_break = false;
        self.should_continue = false;
        self.unwind_flow();
    }

    fn unwind_flow(&mut self) {
        self.scopes.pop();
        if let Some(name) = self.call_stack.pop() {
            debug!(flow = %name, "Exit flow");
        }
        self.should_return = false;
        self.return_value = None;
    }

    pub fn set_return(&mut self, value: Value) {
        self.should_return = true;
        self.return_value = Some(value);
    }

    /// Take the pending return value, null if there is none
    pub fn take_return(&mut self) -> Value {
        self.return_value.take().unwrap_or(Value::Null)
    }

    /// Sticky until the flow exits
    pub fn should_return(&self) -> bool {
        self.should_return
    }

    pub fn set_break(&mut self) {
        self.should_break = true;
    }

    pub fn set_continue(&mut self) {
        self.should_continue = true;
    }

    /// Test and clear the break flag
    pub fn clear_break(&mut self) -> bool {
        std::mem::take(&mut self.should_break)
    }

    /// Test and clear the continue flag
    pub fn clear_continue(&mut self) -> bool {
        std::mem::take(&mut self.should_continue)
    }

    pub fn should_break(&self) -> bool {
        self.should_break
    }

    pub fn should_continue(&self) -> bool {
        self.should_continue
    }

    /// Whether a block must stop executing its remaining statements
    pub fn has_pending_signal(&self) -> bool {
        self.should_return || self.should_break || self.should_continue
    }

    /// Active flow names, outermost first
    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    pub fn current_flow(&self) -> Option<&str> {
        self.call_stack.last().map(String::as_str)
    }

    /// Number of active flow calls
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }
}
