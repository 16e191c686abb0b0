//! Interpreter for executing the script AST
//!
//! A single async tree-walking evaluator. Every node evaluation returns a
//! [`LocalBoxFuture`]; synchronous evaluation drives the same future with
//! [`FutureExt::now_or_never`]. Two counters track how a body runs: blocking
//! mode (no checkpoints, no frames) lasts for the whole driven future, while
//! the synchronous-subset restriction applies to the top-level program,
//! expression-bodied arrows and accessors, and is lifted inside any other
//! function they call.

pub(crate) mod builtins;
mod classes;
mod expressions;
mod functions;
mod members;
mod statements;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::ast::{Expression, Program, Statement};
use crate::config::InterpreterConfig;
use crate::context::{BindingKind, ContextArena, ContextId, ExecutionContext};
use crate::error::{ScriptError, StackFrame};
use crate::lexer::Span;
use crate::module::{ModuleCache, ModuleResolver};
use crate::parser::{DefaultParser, SourceParser};
use crate::pause::{CallFrame, FrameKind, FrameNode, NodeInfo, Tracker};
use crate::value::{Function, JsString, NativeFunction, NativeReturn, Value};

pub use builtins::BuiltinClasses;

/// Result of evaluating a node
pub type EvalResult<T = Value> = Result<T, Signal>;

/// Abrupt completion travelling up the evaluator.
///
/// `Return`, `Break` and `Continue` are caught at their boundary (function
/// exit or the matching loop). `Pause` is only ever produced by a checkpoint
/// and unwinds everything without being catchable by script code.
#[derive(Debug)]
pub enum Signal {
    Return(Value),
    Break(Option<JsString>),
    Continue(Option<JsString>),
    /// A script `throw`, carrying the exact thrown value
    Throw(Value),
    /// An engine error
    Error(ScriptError),
    Pause,
}

impl From<ScriptError> for Signal {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Thrown { value, .. } => Signal::Throw(value),
            other => Signal::Error(other),
        }
    }
}

impl Signal {
    /// Convert a signal that reached a host boundary into an error
    pub fn into_error(self) -> ScriptError {
        match self {
            Signal::Throw(value) => ScriptError::thrown(value),
            Signal::Error(err) => err,
            Signal::Return(_) => ScriptError::runtime("Illegal return statement"),
            Signal::Break(_) => ScriptError::runtime("Illegal break statement"),
            Signal::Continue(_) => ScriptError::runtime("Illegal continue statement"),
            Signal::Pause => ScriptError::runtime("Execution was paused"),
        }
    }
}

/// The interpreter state
pub struct Interpreter {
    pub(crate) config: InterpreterConfig,
    parser: Rc<dyn SourceParser>,
    pub(crate) contexts: RefCell<ContextArena>,
    /// Builtins scope above the global context; never serialized
    root: ContextId,
    global: Cell<ContextId>,
    pub(crate) modules: RefCell<ModuleCache>,
    resolver: RefCell<Option<Rc<dyn ModuleResolver>>>,
    pub(crate) tracker: Tracker,
    /// Non-zero while evaluating a body restricted to the synchronous subset
    sync_depth: Cell<usize>,
    /// Non-zero while a future is driven with `now_or_never`
    blocking_depth: Cell<usize>,
    /// Host-level evaluations in progress; contexts are collected at zero
    evaluations: Cell<usize>,
    call_depth: Cell<usize>,
    trace: RefCell<Vec<StackFrame>>,
    /// Parsed `${...}` spans keyed by source text
    templates: RefCell<FxHashMap<String, Rc<Expression>>>,
    pub(crate) builtins: BuiltinClasses,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let mut arena = ContextArena::new();
        let mut root_ctx = ExecutionContext::new(None);
        root_ctx.captured = true;
        let builtins = builtins::install(&mut root_ctx);
        let root = arena.alloc(root_ctx);
        let global = arena.alloc(Self::global_scope(root));

        Self {
            config,
            parser: Rc::new(DefaultParser),
            contexts: RefCell::new(arena),
            root,
            global: Cell::new(global),
            modules: RefCell::new(ModuleCache::default()),
            resolver: RefCell::new(None),
            tracker: Tracker::default(),
            sync_depth: Cell::new(0),
            blocking_depth: Cell::new(0),
            evaluations: Cell::new(0),
            call_depth: Cell::new(0),
            trace: RefCell::new(Vec::new()),
            templates: RefCell::new(FxHashMap::default()),
            builtins,
        }
    }

    fn global_scope(root: ContextId) -> ExecutionContext {
        let mut global = ExecutionContext::new(Some(root));
        global.this_value = Some(Value::Undefined);
        global.captured = true;
        global
    }

    /// Replace the source parser
    pub fn with_parser(mut self, parser: impl SourceParser + 'static) -> Self {
        self.parser = Rc::new(parser);
        self
    }

    /// Use `resolver` for `import` statements
    pub fn with_resolver(self, resolver: impl ModuleResolver + 'static) -> Self {
        self.set_resolver(Rc::new(resolver));
        self
    }

    pub fn set_resolver(&self, resolver: Rc<dyn ModuleResolver>) {
        *self.resolver.borrow_mut() = Some(resolver);
    }

    pub(crate) fn resolver(&self) -> Option<Rc<dyn ModuleResolver>> {
        self.resolver.borrow().clone()
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn parse(&self, code: &str) -> Result<Program, ScriptError> {
        self.parser.parse(code)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Host API
    // ═══════════════════════════════════════════════════════════════════════════

    /// Parse and run `code` in the global context
    pub async fn execute(&self, code: &str) -> Result<Value, ScriptError> {
        self.execute_in(code, self.global_context()).await
    }

    /// Parse and run `code` in an existing context
    pub async fn execute_in(&self, code: &str, context: ContextId) -> Result<Value, ScriptError> {
        let program = self.parse(code)?;
        let _evaluation = self.begin_evaluation();
        self.run_program(&program.body, context)
            .await
            .map_err(Signal::into_error)
    }

    /// Run `code` to completion without awaiting.
    ///
    /// Only the synchronous subset is available: loops, `try`, `new`, classes,
    /// `await` and modules fail with [`ScriptError::SyncUnsupported`].
    pub fn evaluate_sync(&self, code: &str) -> Result<Value, ScriptError> {
        let program = self.parse(code)?;
        let global = self.global_context();
        let _evaluation = self.begin_evaluation();
        let _sync = self.enter_sync();
        self.drive_sync(self.run_program(&program.body, global))
    }

    /// Call a script or native function from the host
    pub async fn call(
        &self,
        callee: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let _evaluation = self.begin_evaluation();
        self.call_function(callee.clone(), this, args)
            .await
            .map_err(Signal::into_error)
    }

    /// Call a function where awaiting is impossible (native callbacks).
    ///
    /// The callee runs under its own rules: an expression-bodied arrow is
    /// restricted to the synchronous subset, other functions are not, but
    /// anything that would actually suspend fails with
    /// [`ScriptError::SyncUnsupported`].
    pub fn call_sync(
        &self,
        callee: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        let _evaluation = self.begin_evaluation();
        self.drive_sync(self.call_function(callee.clone(), this, args))
    }

    /// Run a getter or setter body, which is always restricted to the
    /// synchronous subset
    pub(crate) fn call_accessor(
        &self,
        accessor: &Value,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value, ScriptError> {
        match accessor {
            Value::Function(func) => match func.as_ref() {
                Function::Closure(closure) => {
                    self.drive_sync(self.call_closure(closure, this, args, true))
                }
                _ => self.call_sync(accessor, this, args),
            },
            _ => self.call_sync(accessor, this, args),
        }
    }

    pub(crate) fn drive_sync<'a>(
        &'a self,
        future: impl Future<Output = EvalResult> + 'a,
    ) -> Result<Value, ScriptError> {
        let _blocking = ModeGuard::enter(&self.blocking_depth);
        match future.now_or_never() {
            Some(result) => result.map_err(Signal::into_error),
            None => Err(ScriptError::sync_unsupported("await")),
        }
    }

    pub fn global_context(&self) -> ContextId {
        self.global.get()
    }

    pub fn root_context(&self) -> ContextId {
        self.root
    }

    pub(crate) fn set_global_context(&self, id: ContextId) {
        let old = self.global.replace(id);
        if old != id {
            self.contexts.borrow_mut().remove(old);
        }
    }

    /// Bind a variable in the global context
    pub fn set_global(&self, name: &str, value: Value) {
        self.declare(self.global_context(), name.into(), value, BindingKind::Var);
    }

    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.contexts.borrow().lookup(self.global_context(), name)
    }

    /// Inject a host function. It shadows any builtin of the same name.
    pub fn register_function<F>(&self, name: &str, func: F)
    where
        F: Fn(&Interpreter, Value, Vec<Value>) -> Result<NativeReturn, ScriptError> + 'static,
    {
        self.register_native(NativeFunction::new(name, func));
    }

    /// Inject a host function that completes asynchronously
    pub fn register_async_function<F, Fut>(&self, name: &str, func: F)
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value, ScriptError>> + 'static,
    {
        self.register_function(name, move |_, _, args| {
            Ok(NativeReturn::Pending(Box::pin(func(args))))
        });
    }

    /// Inject a whole function table
    pub fn register_functions(&self, table: impl IntoIterator<Item = NativeFunction>) {
        for native in table {
            self.register_native(native);
        }
    }

    fn register_native(&self, native: NativeFunction) {
        let mut contexts = self.contexts.borrow_mut();
        if let Some(root) = contexts.get_mut(self.root) {
            root.variables.shift_remove(native.name.as_str());
            root.functions.insert(
                native.name.clone(),
                Value::Function(Rc::new(Function::Native(native))),
            );
        }
    }

    /// Exports recorded in the global context
    pub fn exports(&self) -> IndexMap<JsString, Value> {
        self.contexts
            .borrow()
            .get(self.global_context())
            .map(|ctx| ctx.exports.clone())
            .unwrap_or_default()
    }

    /// Drop every global binding, loaded module and pause state
    pub fn reset(&self) {
        let fresh = self
            .contexts
            .borrow_mut()
            .alloc(Self::global_scope(self.root));
        self.set_global_context(fresh);
        let stale: Vec<ContextId> = self.modules.borrow_mut().clear();
        let mut contexts = self.contexts.borrow_mut();
        for id in stale {
            contexts.remove(id);
        }
        drop(contexts);
        self.templates.borrow_mut().clear();
        self.tracker.reset();
    }

    /// Number of live execution contexts, including builtins and global
    pub fn context_count(&self) -> usize {
        self.contexts.borrow().len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Program execution
    // ═══════════════════════════════════════════════════════════════════════════

    /// Hoist then run a statement list; a top-level `return` becomes the result
    pub(crate) async fn run_program(
        &self,
        body: &Rc<[Statement]>,
        ctx: ContextId,
    ) -> EvalResult {
        self.hoist(body, ctx);
        match self.eval_statements(body, ctx).await {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(Signal::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    /// Program run with a `Program` frame on the pause stack
    pub(crate) async fn run_tracked_program(
        &self,
        body: &Rc<[Statement]>,
        ctx: ContextId,
    ) -> EvalResult {
        let frame = self.push_frame(
            FrameKind::Program,
            || FrameNode::Program(body.clone()),
            ctx,
            None,
        );
        let result = self.run_program(body, ctx).await;
        self.pop_frame(frame, &result);
        result
    }

    /// Re-run a saved frame from its start in its saved context
    pub(crate) async fn rerun_frame(&self, frame: &CallFrame) -> EvalResult {
        tracing::debug!(kind = ?frame.kind, context = frame.context.index(), "re-running frame");
        let ctx = frame.context;
        if self.contexts.borrow().get(ctx).is_none() {
            return Err(ScriptError::runtime("Paused frame refers to a released context").into());
        }
        match &frame.node {
            FrameNode::Program(body) => self.run_tracked_program(body, ctx).await,
            FrameNode::Module(body) => {
                let pushed = self.push_frame(
                    FrameKind::Module,
                    || frame.node.clone(),
                    ctx,
                    frame.name.clone(),
                );
                let result = self.run_program(body, ctx).await;
                self.pop_frame(pushed, &result);
                if result.is_ok() {
                    let path = self.contexts.borrow().module_path(ctx);
                    if let Some(path) = path {
                        self.modules.borrow_mut().mark_loaded(&path);
                    }
                }
                result
            }
            FrameNode::Block(body) => {
                let pushed = self.push_frame(FrameKind::Block, || frame.node.clone(), ctx, None);
                let result = self.run_block_body(body, ctx).await;
                self.pop_frame(pushed, &result);
                result.map(Option::unwrap_or_default)
            }
            FrameNode::Loop(stmt) => self
                .eval_stmt(stmt, ctx)
                .await
                .map(Option::unwrap_or_default),
            FrameNode::Function(node) => {
                let pushed = self.push_frame(
                    FrameKind::Function,
                    || frame.node.clone(),
                    ctx,
                    frame.name.clone(),
                );
                let result = self.run_function_body(node, ctx).await;
                self.pop_frame(pushed, &result);
                result
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Pause bookkeeping
    // ═══════════════════════════════════════════════════════════════════════════

    /// Count an operation, yield periodically and honour pause requests
    pub(crate) async fn checkpoint(&self, type_name: &'static str, span: Span) -> EvalResult<()> {
        if !self.tracker.is_enabled() || self.is_blocking() {
            return Ok(());
        }
        if self.tracker.count_operation(self.config.checkpoint_interval) {
            tokio::task::yield_now().await;
        }
        if self.tracker.enter_node(NodeInfo::new(type_name, span)) {
            return Err(Signal::Pause);
        }
        Ok(())
    }

    /// Push a frame when tracking; returns whether one was pushed
    pub(crate) fn push_frame(
        &self,
        kind: FrameKind,
        node: impl FnOnce() -> FrameNode,
        context: ContextId,
        name: Option<String>,
    ) -> bool {
        if !self.tracker.is_enabled() || self.is_blocking() {
            return false;
        }
        tracing::trace!(?kind, context = context.index(), "push frame");
        self.tracker.push_frame(CallFrame {
            kind,
            node: node(),
            context,
            name,
        });
        true
    }

    /// Pop a frame unless the evaluation was paused
    pub(crate) fn pop_frame<T>(&self, pushed: bool, result: &EvalResult<T>) {
        if pushed && !matches!(result, Err(Signal::Pause)) {
            tracing::trace!("pop frame");
            self.tracker.pop_frame();
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Sync mode and call depth
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn is_sync(&self) -> bool {
        self.sync_depth.get() > 0
    }

    pub(crate) fn is_blocking(&self) -> bool {
        self.blocking_depth.get() > 0
    }

    pub(crate) fn enter_sync(&self) -> ModeGuard<'_> {
        ModeGuard::enter(&self.sync_depth)
    }

    /// Lift the synchronous-subset restriction for a function body
    pub(crate) fn suspend_sync(&self) -> ModeGuard<'_> {
        ModeGuard::replace(&self.sync_depth, 0)
    }

    pub(crate) fn enter_call(&self, name: &str, span: Span, ctx: ContextId) -> EvalResult<CallGuard<'_>> {
        let depth = self.call_depth.get();
        if depth >= self.config.max_call_depth {
            return Err(ScriptError::runtime(format!(
                "Maximum call stack size exceeded ({} frames)",
                self.config.max_call_depth
            ))
            .into());
        }
        self.call_depth.set(depth + 1);
        let file = self.contexts.borrow().module_path(ctx);
        self.trace.borrow_mut().push(StackFrame {
            function_name: Some(name.to_string()),
            file,
            line: span.line,
            column: span.column,
        });
        Ok(CallGuard { interpreter: self })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Context helpers
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn begin_evaluation(&self) -> EvaluationGuard<'_> {
        self.evaluations.set(self.evaluations.get() + 1);
        EvaluationGuard { interpreter: self }
    }

    /// Free contexts nothing can reach: roots are builtins, globals, module
    /// scopes and paused frames
    fn collect_contexts(&self) {
        let (Ok(mut contexts), Ok(modules)) =
            (self.contexts.try_borrow_mut(), self.modules.try_borrow())
        else {
            return;
        };
        let roots: Vec<ContextId> = [self.root, self.global_context()]
            .into_iter()
            .chain(modules.contexts())
            .chain(self.tracker.frames().into_iter().map(|frame| frame.context))
            .collect();
        drop(modules);
        let before = contexts.len();
        let freed = contexts.collect(roots);
        if freed > 0 {
            tracing::trace!(freed, live = before - freed, "collected contexts");
        }
    }

    pub(crate) fn new_context(&self, parent: ContextId) -> ContextId {
        self.contexts
            .borrow_mut()
            .alloc(ExecutionContext::new(Some(parent)))
    }

    /// Release a context after its evaluation finished, unless it was paused
    pub(crate) fn finish_context<T>(&self, ctx: ContextId, result: &EvalResult<T>) {
        if !matches!(result, Err(Signal::Pause)) {
            self.contexts.borrow_mut().release(ctx);
        }
    }

    /// Resolve a name or fail with suggestions
    pub(crate) fn lookup(&self, ctx: ContextId, name: &str) -> Result<Value, ScriptError> {
        let contexts = self.contexts.borrow();
        contexts.lookup(ctx, name).ok_or_else(|| {
            ScriptError::undefined_variable(
                name,
                contexts.suggestions(ctx, name, self.config.max_suggestions),
            )
        })
    }

    pub(crate) fn declare(&self, ctx: ContextId, name: JsString, value: Value, kind: BindingKind) {
        self.contexts.borrow_mut().declare(ctx, name, value, kind);
    }

    /// Assign to an existing binding, or bind in `ctx` when none exists
    pub(crate) fn assign_variable(
        &self,
        ctx: ContextId,
        name: &JsString,
        value: Value,
    ) -> Result<(), ScriptError> {
        let assigned = self
            .contexts
            .borrow_mut()
            .assign(ctx, name.as_str(), value.clone());
        match assigned {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.declare(ctx, name.clone(), value, BindingKind::Var);
                Ok(())
            }
            Err(()) => Err(ScriptError::runtime(format!(
                "Assignment to constant variable '{}'",
                name
            ))),
        }
    }

    pub(crate) fn this_value(&self, ctx: ContextId) -> Value {
        self.contexts.borrow().this_value(ctx)
    }

    /// Record an export locally and on the module's shared exports object
    pub(crate) fn write_export(&self, ctx: ContextId, name: JsString, value: Value) {
        let module_path = {
            let mut contexts = self.contexts.borrow_mut();
            let Some(context) = contexts.get_mut(ctx) else {
                return;
            };
            context.exports.insert(name.clone(), value.clone());
            context.module_path.clone()
        };
        if let Some(path) = module_path {
            if let Some(exports) = self.modules.borrow().exports_of(&path) {
                exports.borrow_mut().properties.insert(name, value);
            }
        }
    }

    /// Parsed expression for a template `${...}` span
    pub(crate) fn template_expression(&self, source: &str) -> Result<Rc<Expression>, ScriptError> {
        if let Some(expr) = self.templates.borrow().get(source) {
            return Ok(expr.clone());
        }
        let expr = Rc::new(self.parser.parse_expression(source)?);
        self.templates
            .borrow_mut()
            .insert(source.to_string(), expr.clone());
        Ok(expr)
    }

    /// Attach location, scope and trace to an engine error that has none
    pub(crate) fn annotate(&self, signal: Signal, span: Span, ctx: ContextId) -> Signal {
        match signal {
            Signal::Error(err) if err.location().is_none() => {
                let (file, scope) = {
                    let contexts = self.contexts.borrow();
                    (
                        contexts.module_path(ctx),
                        contexts.scope_snapshot(ctx, self.config.snapshot_limit),
                    )
                };
                let mut err = err.with_location(span.line, span.column, file.as_deref());
                let diagnostics = err.diagnostics_mut();
                diagnostics.scope = scope;
                diagnostics.trace = self.trace.borrow().iter().rev().cloned().collect();
                Signal::Error(err)
            }
            other => other,
        }
    }

    /// Current call trace, innermost frame first
    pub(crate) fn stack_trace(&self) -> String {
        self.trace
            .borrow()
            .iter()
            .rev()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Engine error as a catchable script value
    pub(crate) fn error_to_value(&self, err: &ScriptError) -> Value {
        builtins::make_error(
            &self.builtins.error,
            err.kind().as_str(),
            &err.message(),
            &err.format_trace(),
        )
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores an evaluation mode counter when dropped
pub(crate) struct ModeGuard<'a> {
    counter: &'a Cell<usize>,
    previous: usize,
}

impl<'a> ModeGuard<'a> {
    fn enter(counter: &'a Cell<usize>) -> Self {
        Self::replace(counter, counter.get() + 1)
    }

    fn replace(counter: &'a Cell<usize>, value: usize) -> Self {
        let previous = counter.replace(value);
        Self { counter, previous }
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        self.counter.set(self.previous);
    }
}

/// Collects unreachable contexts when the outermost evaluation ends
pub(crate) struct EvaluationGuard<'a> {
    interpreter: &'a Interpreter,
}

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        let interp = self.interpreter;
        let remaining = interp.evaluations.get().saturating_sub(1);
        interp.evaluations.set(remaining);
        if remaining == 0 {
            interp.collect_contexts();
        }
    }
}

/// Pops the call depth counter and trace frame when dropped
pub(crate) struct CallGuard<'a> {
    interpreter: &'a Interpreter,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let depth = self.interpreter.call_depth.get();
        self.interpreter.call_depth.set(depth.saturating_sub(1));
        self.interpreter.trace.borrow_mut().pop();
    }
}

/// Boxed evaluation future
pub(crate) type EvalFuture<'a, T = Value> = LocalBoxFuture<'a, EvalResult<T>>;
