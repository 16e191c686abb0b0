//! Snapshot serialization and restoration of interpreter state

use futures::executor::block_on;
use sandrun::pause::FrameKind;
use sandrun::{
    DeserializeOptions, ErrorKind, ExecutionStatus, Interpreter, InterpreterConfig, NativeFunction,
    NativeReturn, PauseController, SerializedState, Value,
};

/// Run `source` untracked, snapshot, and rebuild a controller from the snapshot
fn round_trip(source: &str, options: DeserializeOptions) -> PauseController {
    let controller = PauseController::new(Interpreter::new());
    block_on(controller.interpreter().execute(source)).unwrap();
    let state = controller.serialize().unwrap();
    block_on(PauseController::deserialize(state, options)).unwrap()
}

fn eval_in(controller: &PauseController, source: &str) -> Value {
    block_on(controller.interpreter().execute(source)).unwrap()
}

#[test]
fn test_globals_survive_round_trip() {
    let restored = round_trip(
        "
        const num = 42;
        let str = 'hello';
        let arr = [1, 'two', null];
        let obj = { nested: { deep: true }, list: [1, 2] };
        let date = new Date(86400000);
        let undefinedVal = undefined;
        let lookup = new Map([['k', 'v']]);
        let tags = new Set(['a', 'b']);
        let pattern = /ab+c/i;
        let notANumber = NaN;
        ",
        DeserializeOptions::new(),
    );
    let interp = restored.interpreter();
    assert_eq!(interp.get_global("num"), Some(Value::Number(42.0)));
    assert_eq!(interp.get_global("str"), Some(Value::from("hello")));
    assert_eq!(interp.get_global("date"), Some(Value::Date(86400000.0)));
    assert_eq!(interp.get_global("undefinedVal"), Some(Value::Undefined));

    assert_eq!(eval_in(&restored, "arr.length + arr[1] + arr[2]"), Value::from("3twonull"));
    assert_eq!(eval_in(&restored, "obj.nested.deep && obj.list[1] === 2"), Value::Boolean(true));
    assert_eq!(eval_in(&restored, "lookup.get('k') + tags.size"), Value::from("v2"));
    assert_eq!(eval_in(&restored, "pattern.test('xABBCx')"), Value::Boolean(true));
    assert_eq!(eval_in(&restored, "isNaN(notANumber)"), Value::Boolean(true));
}

#[test]
fn test_binding_kinds_survive_round_trip() {
    let restored = round_trip("const fixed = 1; let open = 2;", DeserializeOptions::new());
    let err = block_on(restored.interpreter().execute("fixed = 5")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert_eq!(eval_in(&restored, "open = 3; open"), Value::Number(3.0));
}

#[test]
fn test_script_functions_become_stubs() {
    let restored = round_trip(
        "function helper(x) { return x + 1 } const arrow = x => x;",
        DeserializeOptions::new(),
    );
    for call in ["helper(1)", "arrow(1)"] {
        let err = block_on(restored.interpreter().execute(call)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeError, "{}", call);
        assert!(err.to_string().contains("restored from a snapshot"), "{}", err);
    }
}

#[test]
fn test_stubs_rebind_to_supplied_functions() {
    let options = DeserializeOptions::new().with_function(NativeFunction::new("helper", |_, _, args| {
        let n = args.first().map_or(0.0, Value::to_number);
        Ok(NativeReturn::Ready(Value::Number(n * 100.0)))
    }));
    let restored = round_trip("function helper(x) { return x + 1 } let h = helper;", options);
    assert_eq!(eval_in(&restored, "helper(2)"), Value::Number(200.0));
    assert_eq!(eval_in(&restored, "h(3)"), Value::Number(300.0));
}

#[test]
fn test_class_instances_keep_their_data() {
    let restored = round_trip(
        "
        class Point { constructor(x, y) { this.x = x; this.y = y } }
        let p = new Point(1, 2);
        let failure = new Error('kept');
        ",
        DeserializeOptions::new(),
    );
    assert_eq!(eval_in(&restored, "p.x + p.y"), Value::Number(3.0));
    assert_eq!(eval_in(&restored, "failure.message"), Value::from("kept"));
    assert_eq!(eval_in(&restored, "failure instanceof Error"), Value::Boolean(true));
    // The class body is gone
    let err = block_on(restored.interpreter().execute("new Point(0, 0)")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
}

#[test]
fn test_cycles_are_cut() {
    let restored = round_trip("let node = { name: 'n' }; node.self = node;", DeserializeOptions::new());
    assert_eq!(eval_in(&restored, "node.self"), Value::from("[Circular]"));
    assert_eq!(eval_in(&restored, "node.name"), Value::from("n"));
}

#[test]
fn test_state_json_round_trip() {
    let controller = PauseController::new(Interpreter::new());
    block_on(controller.interpreter().execute("let counter = 7;")).unwrap();
    let json = controller.serialize().unwrap().to_json().unwrap();
    let state = SerializedState::from_json(&json).unwrap();
    assert_eq!(state.status, ExecutionStatus::Completed);
    let restored = block_on(PauseController::deserialize(state, DeserializeOptions::new())).unwrap();
    assert_eq!(restored.interpreter().get_global("counter"), Some(Value::Number(7.0)));
}

#[test]
fn test_rejects_unknown_version() {
    let controller = PauseController::new(Interpreter::new());
    let mut state = controller.serialize().unwrap();
    state.version += 1;
    assert!(block_on(PauseController::deserialize(state, DeserializeOptions::new())).is_err());
    assert!(SerializedState::from_json("{ not json").is_err());
}

#[tokio::test]
async fn test_paused_run_resumes_after_restore() {
    let config = InterpreterConfig::default().with_checkpoint_interval(10);
    let controller = PauseController::new(Interpreter::with_config(config.clone()));
    let source = "
        let sum = 0;
        for (let i = 0; i < 100; i++) {
            sum += i;
        }
        sum
    ";
    let (run, ()) = futures::join!(controller.execute(source), async {
        tokio::task::yield_now().await;
        controller.pause().unwrap();
    });
    assert!(run.unwrap().is_paused());

    let json = controller.serialize().unwrap().to_json().unwrap();
    drop(controller);

    let state = SerializedState::from_json(&json).unwrap();
    assert_eq!(state.status, ExecutionStatus::Paused);
    assert!(state.call_stack.iter().any(|f| f.kind == FrameKind::Loop));

    let restored = PauseController::deserialize(state, DeserializeOptions::new().with_config(config))
        .await
        .unwrap();
    assert!(restored.is_paused());
    let result = restored.resume().await.unwrap();
    assert_eq!(result.value(), Some(&Value::Number(4950.0)));
}

#[tokio::test]
async fn test_declared_functions_work_after_restore() {
    let config = InterpreterConfig::default().with_checkpoint_interval(10);
    let controller = PauseController::new(Interpreter::with_config(config.clone()));
    let source = "
        function step(i) { return i * 2 }
        let sum = 0;
        for (let i = 0; i < 100; i++) {
            sum += step(i);
        }
        sum
    ";
    let (run, ()) = futures::join!(controller.execute(source), async {
        tokio::task::yield_now().await;
        controller.pause().unwrap();
    });
    assert!(run.unwrap().is_paused());

    let json = controller.serialize().unwrap().to_json().unwrap();
    drop(controller);

    let state = SerializedState::from_json(&json).unwrap();
    let restored = PauseController::deserialize(state, DeserializeOptions::new().with_config(config))
        .await
        .unwrap();
    let result = restored.resume().await.unwrap();
    assert_eq!(result.value(), Some(&Value::Number(9900.0)));
}
