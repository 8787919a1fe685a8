//! Tree-walking interpreter

use crate::ast::{FlowDecl, Program, Stmt, StmtKind};
use crate::context::ExecutionContext;
use crate::error::{FaultKind, ScriptError, ScriptResult};
use crate::eval::{self, Environment};
use crate::hook::{Location, StepHook, StepVerdict};
use crate::strip_sigil;
use retro_builtins::{BuiltinRegistry, CallArgs};
use retro_core::{Value, ValueMap};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, trace, warn};

/// Maximum nesting of flow calls
pub const MAX_CALL_DEPTH: usize = 256;

/// Builtin that invokes a flow whose name is computed at runtime
const RUN_FLOW: &str = "run";

/// Executes programs against one [`ExecutionContext`]
///
/// The interpreter is single-threaded; each run owns exactly one. The
/// builtin registry is shared read-only.
pub struct Interpreter {
    builtins: Arc<BuiltinRegistry>,
    context: ExecutionContext,
    flows: HashMap<String, Arc<FlowDecl>>,
    hook: Option<Arc<dyn StepHook>>,
    file: String,
    started: Instant,
    time_limit: Option<Duration>,
    loop_depth: usize,
}

impl Interpreter {
    pub fn new(builtins: Arc<BuiltinRegistry>) -> Self {
        let time_limit = builtins.policy().max_execution_time();
        Self {
            builtins,
            context: ExecutionContext::new(),
            flows: HashMap::new(),
            hook: None,
            file: String::new(),
            started: Instant::now(),
            time_limit,
            loop_depth: 0,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn StepHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn set_hook(&mut self, hook: Option<Arc<dyn StepHook>>) {
        self.hook = hook;
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// Names of the flows recorded by the last `load`/`execute`
    pub fn flow_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Reset the context, bind the program's constants in declaration order,
    /// then record its flows
    ///
    /// Flows are not callable from constant initializers.
    #[instrument(skip(self, program), fields(file = %program.file))]
    pub fn load(&mut self, program: &Program) -> ScriptResult<()> {
        self.reset(program);

        for constant in &program.constants {
            let value = eval::evaluate(&constant.value, self)
                .map_err(|e| e.with_span("const", constant.span))?;
            let name = strip_sigil(&constant.name);
            self.notify(|hook| hook.variable_changed(name, &value));
            self.context.scopes_mut().set_global(name, value);
        }
        self.flows = collect_flows(program);

        debug!(
            flows = self.flows.len(),
            constants = program.constants.len(),
            "Program loaded"
        );
        Ok(())
    }

    /// Reset the context and record the program's flows over globals that
    /// were already evaluated elsewhere
    ///
    /// Constant initializers are not run again.
    pub fn load_flows(&mut self, program: &Program, globals: impl IntoIterator<Item = (String, Value)>) {
        self.reset(program);
        for (name, value) in globals {
            self.context.scopes_mut().set_global(name, value);
        }
        self.flows = collect_flows(program);
        debug!(flows = self.flows.len(), "Flows loaded");
    }

    fn reset(&mut self, program: &Program) {
        self.context = ExecutionContext::new();
        self.flows.clear();
        self.file = program.file.clone();
        self.started = Instant::now();
        self.loop_depth = 0;
    }

    /// Run a program and return its main flow's return value
    ///
    /// A program without flows returns null. An explicit `main_flow` that
    /// names no flow is an unknown-flow fault.
    #[instrument(skip(self, program), fields(file = %program.file))]
    pub fn execute(&mut self, program: &Program) -> ScriptResult<Value> {
        self.load(program)?;
        self.run_main(program)
    }

    /// Run the main flow of a program that has already been loaded
    pub fn run_main(&mut self, program: &Program) -> ScriptResult<Value> {
        let Some(main) = program.main() else {
            if let Some(name) = &program.main_flow {
                return Err(unknown_flow(name));
            }
            info!("Program has no main flow");
            return Ok(Value::Null);
        };

        info!(flow = %main.name, "Executing program");
        let result = self.call_flow(&main.name, Vec::new());
        match &result {
            Ok(value) => info!(result = %value, elapsed_ms = self.started.elapsed().as_millis() as u64, "Program finished"),
            Err(e) => warn!(error = %e, "Program failed"),
        }
        result
    }

    /// Invoke a loaded flow with positional arguments
    pub fn call_flow(&mut self, name: &str, args: Vec<Value>) -> ScriptResult<Value> {
        let flow = self
            .flows
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_flow(name))?;
        self.run_flow(&flow, args)
    }

    /// Evaluate an expression in the current context
    pub fn evaluate(&mut self, expr: &crate::ast::Expr) -> ScriptResult<Value> {
        eval::evaluate(expr, self)
    }

    fn notify(&self, f: impl FnOnce(&dyn StepHook)) {
        if let Some(hook) = &self.hook {
            f(hook.as_ref());
        }
    }

    fn run_flow(&mut self, flow: &FlowDecl, args: Vec<Value>) -> ScriptResult<Value> {
        if self.context.call_depth() >= MAX_CALL_DEPTH {
            return Err(ScriptError::fault_at(
                FaultKind::CallDepthExceeded,
                "call",
                format!("Maximum flow call depth of {} exceeded in {}", MAX_CALL_DEPTH, flow.name),
            ));
        }
        if args.len() != flow.params.len() {
            return Err(ScriptError::fault_at(
                FaultKind::ArgumentMismatch,
                "call",
                format!(
                    "{}() takes {} arguments, got {}",
                    flow.name,
                    flow.params.len(),
                    args.len()
                ),
            ));
        }

        self.context.enter_flow(&flow.name);
        let location = flow.span.map(|span| Location::new(self.file.clone(), span.line));
        self.notify(|hook| hook.enter_flow(&flow.name, location.as_ref()));

        for (param, value) in flow.params.iter().zip(args) {
            let name = strip_sigil(param);
            self.notify(|hook| hook.variable_changed(name, &value));
            self.context.scopes_mut().define(name, value);
        }

        let saved_loops = std::mem::take(&mut self.loop_depth);
        let outcome = self.exec_block(&flow.body);
        self.loop_depth = saved_loops;

        let result = match outcome {
            Ok(()) => {
                let value = self.context.take_return();
                self.context.exit_flow();
                Ok(value)
            }
            Err(e) => {
                self.context.abandon_flow();
                Err(e)
            }
        };
        self.notify(|hook| hook.exit_flow(&flow.name));
        result
    }

    /// Run statements in order, stopping once a control-flow signal is set
    fn exec_block(&mut self, body: &[Stmt]) -> ScriptResult<()> {
        for stmt in body {
            self.exec_stmt(stmt)?;
            if self.context.has_pending_signal() {
                break;
            }
        }
        Ok(())
    }

    fn check_deadline(&self) -> ScriptResult<()> {
        match self.time_limit {
            Some(limit) if self.started.elapsed() > limit => {
                warn!(limit_secs = limit.as_secs_f64(), "Execution time limit exceeded");
                Err(ScriptError::DeadlineExceeded { limit })
            }
            _ => Ok(()),
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> ScriptResult<()> {
        self.check_deadline()?;

        let action = stmt.kind.name();
        if let Some(span) = stmt.span {
            let location = Location::new(self.file.clone(), span.line);
            trace!(%location, action, "Step");
            if let Some(hook) = &self.hook {
                if hook.before_step(&location, action) == StepVerdict::Abort {
                    info!(%location, "Execution aborted by step hook");
                    return Err(ScriptError::Aborted);
                }
            }
        }

        self.exec_kind(&stmt.kind)
            .map_err(|e| e.with_span(action, stmt.span))
    }

    fn bind(&mut self, name: &str, value: Value, define: bool) {
        self.notify(|hook| hook.variable_changed(name, &value));
        let scopes = self.context.scopes_mut();
        if define {
            scopes.define(name, value);
        } else {
            scopes.assign(name, value);
        }
    }

    fn exec_kind(&mut self, kind: &StmtKind) -> ScriptResult<()> {
        match kind {
            StmtKind::Let { name, value } => {
                let value = match value {
                    Some(expr) => eval::evaluate(expr, self)?,
                    None => Value::Null,
                };
                self.bind(strip_sigil(name), value, true);
            }
            StmtKind::Assign { target, value } => {
                let crate::ast::Expr::Identifier { name } = target else {
                    return Err(ScriptError::fault_at(
                        FaultKind::InvalidAssignment,
                        "assign",
                        format!("Cannot assign to {} expression", target.kind()),
                    ));
                };
                let value = eval::evaluate(value, self)?;
                self.bind(strip_sigil(name), value, false);
            }
            StmtKind::If {
                condition,
                then,
                elif,
                otherwise,
            } => {
                if eval::evaluate(condition, self)?.is_truthy() {
                    return self.exec_block(then);
                }
                for branch in elif {
                    if eval::evaluate(&branch.condition, self)?.is_truthy() {
                        return self.exec_block(&branch.body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            StmtKind::While { condition, body } => {
                while eval::evaluate(condition, self)?.is_truthy() {
                    if self.run_iteration(body)? {
                        break;
                    }
                }
            }
            StmtKind::For {
                variable,
                iterable,
                body,
            } => {
                let items = match eval::evaluate(iterable, self)? {
                    Value::List(items) => items,
                    Value::Str(text) => text.chars().map(|c| Value::Str(c.to_string())).collect(),
                    Value::Map(map) => map.into_keys().map(Value::Str).collect(),
                    other => {
                        return Err(ScriptError::Iteration {
                            type_name: other.type_name(),
                            node: None,
                        })
                    }
                };
                let variable = strip_sigil(variable);
                for item in items {
                    self.bind(variable, item, true);
                    if self.run_iteration(body)? {
                        break;
                    }
                }
            }
            StmtKind::Try {
                body,
                catch_var,
                catch,
            } => match self.exec_block(body) {
                Ok(()) => {}
                Err(e) if e.is_catchable() => {
                    debug!(error = %e, "Caught error");
                    if let Some(var) = catch_var {
                        self.bind(strip_sigil(var), Value::Str(e.to_string()), true);
                    }
                    self.exec_block(catch)?;
                }
                Err(e) => return Err(e),
            },
            StmtKind::Return { value } => {
                let value = match value {
                    Some(expr) => eval::evaluate(expr, self)?,
                    None => Value::Null,
                };
                self.context.set_return(value);
            }
            StmtKind::Break => {
                self.require_loop("break")?;
                self.context.set_break();
            }
            StmtKind::Continue => {
                self.require_loop("continue")?;
                self.context.set_continue();
            }
            StmtKind::Block { body } => self.exec_block(body)?,
            StmtKind::Expr { expr } => {
                eval::evaluate(expr, self)?;
            }
        }
        Ok(())
    }

    /// Run one loop iteration; returns true when the loop must stop
    fn run_iteration(&mut self, body: &[Stmt]) -> ScriptResult<bool> {
        self.loop_depth += 1;
        let outcome = self.exec_block(body);
        self.loop_depth -= 1;
        outcome?;

        if self.context.clear_break() {
            return Ok(true);
        }
        self.context.clear_continue();
        Ok(self.context.should_return())
    }

    fn require_loop(&self, keyword: &str) -> ScriptResult<()> {
        if self.loop_depth == 0 {
            return Err(ScriptError::fault_at(
                FaultKind::MisplacedControl,
                "control",
                format!("'{}' outside of a loop", keyword),
            ));
        }
        Ok(())
    }
}

fn collect_flows(program: &Program) -> HashMap<String, Arc<FlowDecl>> {
    program
        .flows
        .iter()
        .map(|flow| (flow.name.clone(), Arc::new(flow.clone())))
        .collect()
}

fn unknown_flow(name: &str) -> ScriptError {
    ScriptError::fault_at(FaultKind::UnknownFlow, "call", format!("Unknown flow: {}", name))
}

impl Environment for Interpreter {
    fn lookup(&self, name: &str) -> ScriptResult<Value> {
        self.context
            .scopes()
            .get(name)
            .cloned()
            .map_err(|e| ScriptError::fault_at(FaultKind::UndefinedVariable, "identifier", e.to_string()))
    }

    /// Flows first, then builtins, then `run(name, ...)`
    fn call(&mut self, callee: &str, args: Vec<Value>, kwargs: ValueMap) -> ScriptResult<Value> {
        if let Some(flow) = self.flows.get(callee).cloned() {
            if !kwargs.is_empty() {
                return Err(ScriptError::fault_at(
                    FaultKind::ArgumentMismatch,
                    "call",
                    format!("Flow {} does not take keyword arguments", callee),
                ));
            }
            return self.run_flow(&flow, args);
        }

        if self.builtins.contains(callee) {
            return self
                .builtins
                .call(callee, CallArgs::new(args, kwargs))
                .map_err(ScriptError::from);
        }

        if callee == RUN_FLOW {
            let mut args = args.into_iter();
            let target = match args.next() {
                Some(Value::Str(name)) => name,
                Some(other) => {
                    return Err(ScriptError::fault_at(
                        FaultKind::TypeMismatch,
                        "call",
                        format!("run() expects a flow name, got {}", other.type_name()),
                    ))
                }
                None => {
                    return Err(ScriptError::fault_at(
                        FaultKind::ArgumentMismatch,
                        "call",
                        "run() takes a flow name",
                    ))
                }
            };
            debug!(flow = %target, "Dynamic flow call");
            return self.call_flow(&target, args.collect());
        }

        Err(ScriptError::fault_at(
            FaultKind::UnknownFunction,
            "call",
            format!("Unknown function: {}", callee),
        ))
    }
}
