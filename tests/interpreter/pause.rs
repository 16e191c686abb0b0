//! Cooperative pause and resume through the PauseController

use sandrun::pause::FrameKind;
use sandrun::{ErrorKind, ExecutionStatus, Interpreter, InterpreterConfig, PauseController, RunResult, Value};

fn controller() -> PauseController {
    PauseController::new(Interpreter::with_config(
        InterpreterConfig::default().with_checkpoint_interval(10),
    ))
}

/// Start `source` and request a pause once it has yielded twice
async fn run_until_paused(controller: &PauseController, source: &str) -> RunResult {
    let (run, ()) = futures::join!(controller.execute(source), async {
        tokio::task::yield_now().await;
        controller.pause().unwrap();
    });
    run.unwrap()
}

const LOOP_SUM: &str = "
    let sum = 0;
    for (let i = 0; i < 200; i++) {
        sum += i;
    }
    sum
";

#[tokio::test]
async fn test_uninterrupted_run_completes() {
    let controller = controller();
    let result = controller.execute(LOOP_SUM).await.unwrap();
    assert_eq!(result.value(), Some(&Value::Number(19900.0)));
    assert!(controller.is_completed());
    assert_eq!(controller.result(), Some(Value::Number(19900.0)));
    assert!(controller.execution_state().operations > 200);
}

#[tokio::test]
async fn test_pause_then_resume_gives_same_result() {
    let controller = controller();
    let paused = run_until_paused(&controller, LOOP_SUM).await;
    assert!(paused.is_paused());
    assert!(controller.is_paused());

    let state = controller.execution_state();
    assert_eq!(state.status, ExecutionStatus::Paused);
    assert!(state.call_stack_depth >= 2, "{:?}", state.frames);
    assert_eq!(state.frames.first(), Some(&FrameKind::Program));
    assert!(state.current_node.is_some());

    let resumed = controller.resume().await.unwrap();
    assert_eq!(resumed.value(), Some(&Value::Number(19900.0)));
    assert!(controller.is_completed());
    assert_eq!(controller.execution_state().call_stack_depth, 0);
}

#[tokio::test]
async fn test_pause_inside_function_call() {
    let source = "
        function work(n) {
            let total = 0;
            for (let i = 0; i < n; i++) {
                total += i;
            }
            return total;
        }
        const result = work(100) + work(100);
        result
    ";
    let controller = controller();
    assert!(run_until_paused(&controller, source).await.is_paused());
    let resumed = controller.resume().await.unwrap();
    assert_eq!(resumed.value(), Some(&Value::Number(9900.0)));
}

#[tokio::test]
async fn test_paused_state_reports_as_json() {
    let controller = controller();
    run_until_paused(&controller, LOOP_SUM).await;
    let json = serde_json::to_value(controller.execution_state()).unwrap();
    assert_eq!(json["status"], "paused");
    assert_eq!(json["frames"][0], "program");
    assert!(json["current_node"]["line"].is_number());
}

#[tokio::test]
async fn test_resume_requires_paused_state() {
    let controller = controller();
    let err = controller.resume().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);

    controller.execute("1 + 1").await.unwrap();
    assert!(controller.resume().await.is_err());
}

#[tokio::test]
async fn test_pause_requires_running_state() {
    let controller = controller();
    assert!(controller.pause().is_err());
    controller.execute("1").await.unwrap();
    assert!(controller.pause().is_err());
}

#[tokio::test]
async fn test_execute_rejected_while_paused() {
    let controller = controller();
    run_until_paused(&controller, LOOP_SUM).await;
    let err = controller.execute("2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert!(controller.is_paused());
}

#[tokio::test]
async fn test_failed_run_records_error() {
    let controller = controller();
    let err = controller.execute("let a = 1; missing(a)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FunctionNotFoundError);
    assert!(controller.has_error());
    let state = controller.execution_state();
    assert_eq!(state.status, ExecutionStatus::Error);
    assert!(state.error.is_some());

    // A failed run can be followed by a fresh one
    let result = controller.execute("'again'").await.unwrap();
    assert_eq!(result.value(), Some(&Value::from("again")));
}

#[tokio::test]
async fn test_top_level_return_completes_tracked_run() {
    let controller = controller();
    let result = controller.execute("let x = 4; return x * 2;").await.unwrap();
    assert_eq!(result.value(), Some(&Value::Number(8.0)));
    assert!(controller.is_completed());
}

#[tokio::test]
async fn test_resumed_module_finishes_loading() {
    let resolver = sandrun::MemoryResolver::new().with_module(
        "m.js",
        "
        let acc = 0;
        for (let i = 0; i < 200; i++) { acc += i }
        export const total = acc;
        ",
    );
    let controller = PauseController::new(
        Interpreter::with_config(InterpreterConfig::default().with_checkpoint_interval(10))
            .with_resolver(resolver),
    );
    let paused = run_until_paused(&controller, "import { total } from './m'; total").await;
    assert!(paused.is_paused());
    assert!(controller.execution_state().frames.contains(&FrameKind::Module));

    let resumed = controller.resume().await.unwrap();
    assert_eq!(resumed.value(), Some(&Value::Number(19900.0)));

    // The module now counts as loaded, so unknown names are rejected
    let err = controller
        .interpreter()
        .execute("import { absent } from './m';")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModuleError);
}
