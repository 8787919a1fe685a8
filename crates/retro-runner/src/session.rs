//! Run sessions
//!
//! A [`RunSession`] wires one script document to its capability backends:
//! the builtin registry, an optional debugger and, when the document declares
//! interrupt rules, an interrupt scanner sharing the registry's input gate.

use crate::document::ScriptDocument;
use crate::error::RunResult;
use crate::hook::SessionHook;
use retro_builtins::{register_automation, Automation, BuiltinRegistry};
use retro_core::{HotkeyProbe, Signal, Value};
use retro_debugger::Debugger;
use retro_interrupt::{InterruptScanner, ScannerConfig};
use retro_script::{Interpreter, ScriptError, StepHook};
use retro_security::SecurityPolicy;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use ulid::Ulid;

/// Configures a [`RunSession`] before it is built
pub struct RunSessionBuilder {
    document: ScriptDocument,
    policy: SecurityPolicy,
    automation: Automation,
    debugger: Option<Arc<Debugger>>,
    hotkeys: Option<Arc<dyn HotkeyProbe>>,
    scanner_config: ScannerConfig,
    interrupts: bool,
}

impl RunSessionBuilder {
    /// Attach a debugger; breakpoints can be set before or after building
    pub fn debugger(mut self, debugger: Arc<Debugger>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    pub fn hotkeys(mut self, hotkeys: Arc<dyn HotkeyProbe>) -> Self {
        self.hotkeys = Some(hotkeys);
        self
    }

    pub fn scanner_config(mut self, config: ScannerConfig) -> Self {
        self.scanner_config = config;
        self
    }

    /// Override the document's main flow
    pub fn main_flow(mut self, name: impl Into<String>) -> Self {
        self.document.program.main_flow = Some(name.into());
        self
    }

    /// Ignore the document's interrupt rules
    pub fn without_interrupts(mut self) -> Self {
        self.interrupts = false;
        self
    }

    pub fn build(self) -> RunSession {
        let id = Ulid::new();
        let mut registry = BuiltinRegistry::with_stdlib(Arc::new(self.policy));
        register_automation(&mut registry, self.automation.clone());
        let registry = Arc::new(registry);

        let scanner = (self.interrupts && !self.document.interrupts.is_empty()).then(|| {
            let mut scanner = InterruptScanner::new(
                self.automation.matcher.clone(),
                self.automation.input.clone(),
                self.scanner_config.clone(),
            );
            if let Some(hotkeys) = self.hotkeys.clone() {
                scanner = scanner.with_hotkeys(hotkeys);
            }
            for rule in &self.document.interrupts {
                scanner.add_rule(rule.clone());
            }
            scanner
        });

        let stop = Arc::new(Signal::new(false));
        let requests = scanner.as_ref().and_then(|s| s.take_flow_requests());
        let debug_hook = self.debugger.clone().map(|d| d as Arc<dyn StepHook>);
        let hook = Arc::new(SessionHook::new(registry.clone(), stop.clone(), debug_hook, requests));

        info!(
            run_id = %id,
            file = %self.document.program.file,
            builtins = registry.len(),
            interrupts = scanner.as_ref().map(|s| s.rules().len()).unwrap_or(0),
            debugger = self.debugger.is_some(),
            "Run session created"
        );

        RunSession {
            id,
            document: self.document,
            registry,
            debugger: self.debugger,
            scanner,
            hook,
            stop,
        }
    }
}

/// One script document bound to its backends
///
/// `run` blocks the calling thread; `stop` may be called from any other
/// thread and makes the run fail with [`ScriptError::Aborted`].
pub struct RunSession {
    id: Ulid,
    document: ScriptDocument,
    registry: Arc<BuiltinRegistry>,
    debugger: Option<Arc<Debugger>>,
    scanner: Option<InterruptScanner>,
    hook: Arc<SessionHook>,
    stop: Arc<Signal>,
}

impl RunSession {
    pub fn builder(document: ScriptDocument, policy: SecurityPolicy, automation: Automation) -> RunSessionBuilder {
        RunSessionBuilder {
            document,
            policy,
            automation,
            debugger: None,
            hotkeys: None,
            scanner_config: ScannerConfig::default(),
            interrupts: true,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn document(&self) -> &ScriptDocument {
        &self.document
    }

    pub fn registry(&self) -> &Arc<BuiltinRegistry> {
        &self.registry
    }

    pub fn debugger(&self) -> Option<&Arc<Debugger>> {
        self.debugger.as_ref()
    }

    pub fn scanner(&self) -> Option<&InterruptScanner> {
        self.scanner.as_ref()
    }

    /// Execute the main flow
    ///
    /// The scanner starts before the first statement and is stopped before
    /// this returns, ahead of the debugger.
    #[instrument(skip(self), fields(run_id = %self.id))]
    pub fn run(&self) -> RunResult<Value> {
        self.stop.clear();
        let program = &self.document.program;
        self.hook.reset();

        let mut interpreter = Interpreter::new(self.registry.clone()).with_hook(self.hook.clone());
        if let Some(debugger) = &self.debugger {
            debugger.start();
        }
        if let Some(scanner) = &self.scanner {
            if let Err(e) = scanner.start() {
                self.teardown();
                return Err(e.into());
            }
        }

        let result = interpreter.load(program).and_then(|()| {
            self.hook
                .prepare(program, interpreter.context().scopes().get_all_globals());
            interpreter.run_main(program)
        });
        self.teardown();

        match &result {
            Ok(value) => info!(result = %value, "Run finished"),
            Err(ScriptError::Aborted) => warn!("Run aborted"),
            Err(e) => warn!(error = %e, "Run failed"),
        }
        Ok(result?)
    }

    /// Abort a run in progress from another thread
    pub fn stop(&self) {
        info!(run_id = %self.id, "Stopping run");
        self.stop.set();
        self.teardown();
    }

    fn teardown(&self) {
        if let Some(scanner) = &self.scanner {
            scanner.stop();
        }
        if let Some(debugger) = &self.debugger {
            debugger.stop();
        }
    }
}
