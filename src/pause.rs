//! Cooperative pause, resume and execution tracking
//!
//! A [`PauseController`] owns an [`Interpreter`] and turns on tracking: every
//! node dispatch passes a checkpoint that counts operations, yields to the
//! host scheduler every `checkpoint_interval` operations and honours pause
//! requests. Function bodies, blocks, loops, modules and the program push
//! [`CallFrame`]s; a pause unwinds without popping them, so the stack left
//! behind records where execution stood.
//!
//! Resuming re-runs the top frame from its start in its saved context, then
//! each frame below it the same way. This is not a program-counter resume:
//! it is exact only when re-running a frame from the beginning is
//! idempotent.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::ast::{FunctionNode, Statement};
use crate::context::ContextId;
use crate::error::ScriptError;
use crate::interpreter::{Interpreter, Signal};
use crate::lexer::Span;
use crate::snapshot::{self, DeserializeOptions, SerializedState};
use crate::value::Value;

/// Lifecycle of a tracked execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Running,
    Paused,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Function,
    Block,
    Loop,
    Module,
    Program,
}

/// The node a frame re-runs on resume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "node")]
pub enum FrameNode {
    Program(Rc<[Statement]>),
    Module(Rc<[Statement]>),
    Block(Rc<[Statement]>),
    Loop(Box<Statement>),
    Function(Rc<FunctionNode>),
}

/// Last node entered, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub line: u32,
    pub column: u32,
}

impl NodeInfo {
    pub fn new(type_name: &str, span: Span) -> Self {
        Self {
            type_name: type_name.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    pub kind: FrameKind,
    pub node: FrameNode,
    pub context: ContextId,
    pub name: Option<String>,
}

/// Host-facing view of the tracker
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub call_stack_depth: usize,
    pub current_node: Option<NodeInfo>,
    pub operations: u64,
    /// Kinds of the frames on the stack, bottom first
    pub frames: Vec<FrameKind>,
    pub error: Option<String>,
}

/// Outcome of [`PauseController::execute`] and [`PauseController::resume`]
#[derive(Debug, Clone)]
pub enum RunResult {
    Completed(Value),
    Paused,
}

impl RunResult {
    pub fn is_paused(&self) -> bool {
        matches!(self, RunResult::Paused)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            RunResult::Completed(value) => Some(value),
            RunResult::Paused => None,
        }
    }
}

/// Execution bookkeeping shared by the evaluator and the controller
pub(crate) struct Tracker {
    enabled: Cell<bool>,
    status: Cell<ExecutionStatus>,
    pause_requested: Cell<bool>,
    operations: Cell<u64>,
    current_node: RefCell<Option<NodeInfo>>,
    frames: RefCell<Vec<CallFrame>>,
    result: RefCell<Option<Value>>,
    error: RefCell<Option<ScriptError>>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            enabled: Cell::new(false),
            status: Cell::new(ExecutionStatus::Completed),
            pause_requested: Cell::new(false),
            operations: Cell::new(0),
            current_node: RefCell::new(None),
            frames: RefCell::new(Vec::new()),
            result: RefCell::new(None),
            error: RefCell::new(None),
        }
    }
}

impl Tracker {
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: ExecutionStatus) {
        self.status.set(status);
    }

    /// Count one operation; true when it is time to yield
    pub fn count_operation(&self, interval: u64) -> bool {
        let count = self.operations.get().wrapping_add(1);
        self.operations.set(count);
        interval > 0 && count % interval == 0
    }

    pub fn operations(&self) -> u64 {
        self.operations.get()
    }

    /// Record the node being entered; true when a pending pause takes effect
    pub fn enter_node(&self, node: NodeInfo) -> bool {
        *self.current_node.borrow_mut() = Some(node);
        if self.pause_requested.get() && self.status.get() == ExecutionStatus::Running {
            self.pause_requested.set(false);
            self.status.set(ExecutionStatus::Paused);
            tracing::debug!(operations = self.operations.get(), "execution paused");
            return true;
        }
        false
    }

    pub fn push_frame(&self, frame: CallFrame) {
        self.frames.borrow_mut().push(frame);
    }

    pub fn pop_frame(&self) {
        self.frames.borrow_mut().pop();
    }

    pub fn frames(&self) -> Vec<CallFrame> {
        self.frames.borrow().clone()
    }

    pub fn set_frames(&self, frames: Vec<CallFrame>) {
        *self.frames.borrow_mut() = frames;
    }

    pub fn current_node(&self) -> Option<NodeInfo> {
        self.current_node.borrow().clone()
    }

    pub fn result(&self) -> Option<Value> {
        self.result.borrow().clone()
    }

    pub fn error(&self) -> Option<ScriptError> {
        self.error.borrow().clone()
    }

    /// Start a fresh tracked run
    pub fn begin(&self) {
        self.enabled.set(true);
        self.status.set(ExecutionStatus::Running);
        self.pause_requested.set(false);
        self.operations.set(0);
        *self.current_node.borrow_mut() = None;
        self.frames.borrow_mut().clear();
        *self.result.borrow_mut() = None;
        *self.error.borrow_mut() = None;
    }

    pub fn request_pause(&self) {
        self.pause_requested.set(true);
    }

    pub fn complete(&self, value: Value) {
        self.status.set(ExecutionStatus::Completed);
        self.frames.borrow_mut().clear();
        *self.result.borrow_mut() = Some(value);
    }

    pub fn fail(&self, error: ScriptError) {
        self.status.set(ExecutionStatus::Error);
        self.frames.borrow_mut().clear();
        *self.error.borrow_mut() = Some(error);
    }

    /// Restore a paused state read from a snapshot
    pub fn restore(
        &self,
        status: ExecutionStatus,
        frames: Vec<CallFrame>,
        current_node: Option<NodeInfo>,
        operations: u64,
        result: Option<Value>,
        error: Option<ScriptError>,
    ) {
        self.enabled.set(true);
        self.status.set(status);
        self.pause_requested.set(false);
        self.operations.set(operations);
        *self.current_node.borrow_mut() = current_node;
        *self.frames.borrow_mut() = frames;
        *self.result.borrow_mut() = result;
        *self.error.borrow_mut() = error;
    }

    pub fn reset(&self) {
        self.begin();
        self.enabled.set(false);
        self.status.set(ExecutionStatus::Completed);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs scripts with pause, resume and snapshot support
pub struct PauseController {
    interpreter: Interpreter,
}

impl PauseController {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn into_interpreter(self) -> Interpreter {
        self.interpreter
    }

    fn tracker(&self) -> &Tracker {
        &self.interpreter.tracker
    }

    /// Run `code` in the global context until it completes or pauses
    pub async fn execute(&self, code: &str) -> Result<RunResult, ScriptError> {
        match self.tracker().status() {
            ExecutionStatus::Running | ExecutionStatus::Paused => {
                return Err(ScriptError::runtime(format!(
                    "Cannot execute while another execution is {}",
                    self.tracker().status().as_str()
                )));
            }
            ExecutionStatus::Completed | ExecutionStatus::Error => {}
        }
        let program = self.interpreter.parse(code)?;
        let _evaluation = self.interpreter.begin_evaluation();
        self.tracker().begin();
        tracing::debug!("tracked execution started");

        let global = self.interpreter.global_context();
        let result = self
            .interpreter
            .run_tracked_program(&program.body, global)
            .await;
        self.settle(result)
    }

    /// Ask a running execution to stop at its next checkpoint
    pub fn pause(&self) -> Result<(), ScriptError> {
        let status = self.tracker().status();
        if status != ExecutionStatus::Running {
            return Err(ScriptError::runtime(format!(
                "Cannot pause: execution is {}",
                status.as_str()
            )));
        }
        tracing::debug!("pause requested");
        self.tracker().request_pause();
        Ok(())
    }

    /// Continue a paused execution by re-running its saved frames
    pub async fn resume(&self) -> Result<RunResult, ScriptError> {
        let status = self.tracker().status();
        if status != ExecutionStatus::Paused {
            return Err(ScriptError::runtime(format!(
                "Cannot resume: execution is {}",
                status.as_str()
            )));
        }
        let _evaluation = self.interpreter.begin_evaluation();
        let frames = self.tracker().frames();
        tracing::debug!(frames = frames.len(), "resuming");
        self.tracker().set_status(ExecutionStatus::Running);

        let mut last = Ok(Value::Undefined);
        for depth in (0..frames.len()).rev() {
            let Some(frame) = frames.get(depth) else {
                continue;
            };
            // Frames below stay recorded if the re-run pauses again
            self.tracker()
                .set_frames(frames.iter().take(depth).cloned().collect());
            let result = self.interpreter.rerun_frame(frame).await;
            match result {
                Err(Signal::Pause) => return Ok(RunResult::Paused),
                Err(Signal::Throw(_) | Signal::Error(_)) => return self.settle(result),
                _ => {}
            }
            if matches!(frame.kind, FrameKind::Function | FrameKind::Block) {
                self.interpreter.contexts.borrow_mut().release(frame.context);
            }
            last = result;
        }
        self.settle(last)
    }

    fn settle(&self, result: Result<Value, Signal>) -> Result<RunResult, ScriptError> {
        match result {
            Ok(value) => {
                tracing::debug!("tracked execution completed");
                self.tracker().complete(value.clone());
                Ok(RunResult::Completed(value))
            }
            Err(Signal::Pause) => Ok(RunResult::Paused),
            // A top-level `return` is the program's value
            Err(Signal::Return(value)) => self.settle(Ok(value)),
            Err(other) => {
                let error = other.into_error();
                tracing::debug!(%error, "tracked execution failed");
                self.tracker().fail(error.clone());
                Err(error)
            }
        }
    }

    /// Snapshot the global state, contexts and call stack
    pub fn serialize(&self) -> Result<SerializedState, ScriptError> {
        snapshot::serialize_state(&self.interpreter)
    }

    /// Rebuild a controller from a snapshot
    pub async fn deserialize(
        state: SerializedState,
        options: DeserializeOptions,
    ) -> Result<PauseController, ScriptError> {
        let interpreter = snapshot::restore_state(state, options)?;
        Ok(PauseController::new(interpreter))
    }

    pub fn execution_state(&self) -> ExecutionState {
        let tracker = self.tracker();
        let frames = tracker.frames();
        ExecutionState {
            status: tracker.status(),
            call_stack_depth: frames.len(),
            current_node: tracker.current_node(),
            operations: tracker.operations(),
            frames: frames.iter().map(|f| f.kind).collect(),
            error: tracker.error().map(|e| e.to_string()),
        }
    }

    /// Value of the last completed execution
    pub fn result(&self) -> Option<Value> {
        self.tracker().result()
    }

    pub fn is_paused(&self) -> bool {
        self.tracker().status() == ExecutionStatus::Paused
    }

    pub fn is_running(&self) -> bool {
        self.tracker().status() == ExecutionStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.tracker().status() == ExecutionStatus::Completed
    }

    pub fn has_error(&self) -> bool {
        self.tracker().status() == ExecutionStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_counter_yields_on_interval() {
        let tracker = Tracker::default();
        let yields = (0..10).filter(|_| tracker.count_operation(4)).count();
        assert_eq!(yields, 2);
        assert_eq!(tracker.operations(), 10);
        assert!(!tracker.count_operation(0));
    }

    #[test]
    fn test_pause_takes_effect_only_while_running() {
        let tracker = Tracker::default();
        tracker.request_pause();
        assert!(!tracker.enter_node(NodeInfo::new("Identifier", Span::default())));

        tracker.begin();
        tracker.request_pause();
        assert!(tracker.enter_node(NodeInfo::new("Identifier", Span::default())));
        assert_eq!(tracker.status(), ExecutionStatus::Paused);
        // The request is consumed
        tracker.set_status(ExecutionStatus::Running);
        assert!(!tracker.enter_node(NodeInfo::new("Identifier", Span::default())));
    }
}
