//! Synchronous evaluation and its restricted subset

use futures::executor::block_on;
use sandrun::{ErrorKind, Interpreter, NativeReturn, ScriptError, Value};

fn sync_err(source: &str) -> ScriptError {
    match Interpreter::new().evaluate_sync(source) {
        Ok(value) => panic!("expected an error, got {:?}", value),
        Err(err) => err,
    }
}

#[test]
fn test_simple_code_runs_synchronously() {
    let interp = Interpreter::new();
    assert_eq!(interp.evaluate_sync("let x = 10; let y = x * 2; y + 5").unwrap(), Value::Number(25.0));
    assert_eq!(
        interp
            .evaluate_sync("function fact(n) { if (n <= 1) { return 1 } return n * fact(n - 1) } fact(5)")
            .unwrap(),
        Value::Number(120.0)
    );
    assert_eq!(
        interp.evaluate_sync("[1, 2, 3].map(n => n * n).filter(n => n > 1).join('-')").unwrap(),
        Value::from("4-9")
    );
    assert_eq!(
        interp.evaluate_sync("const o = { a: { b: [5] } }; `${o.a.b[0]}!`").unwrap(),
        Value::from("5!")
    );
}

#[test]
fn test_bindings_persist_across_modes() {
    let interp = Interpreter::new();
    interp.evaluate_sync("var shared = 1;").unwrap();
    block_on(interp.execute("shared += 1")).unwrap();
    assert_eq!(interp.evaluate_sync("shared").unwrap(), Value::Number(2.0));
}

#[test]
fn test_loops_are_unsupported() {
    for source in [
        "for (let i = 0; i < 2; i++) {}",
        "while (false) {}",
        "for (const x of []) {}",
    ] {
        let err = sync_err(source);
        assert!(matches!(err, ScriptError::SyncUnsupported { .. }), "{}: {:?}", source, err);
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
    }
}

#[test]
fn test_unsupported_node_is_named() {
    assert!(sync_err("try { 1 } catch (e) {}").to_string().contains("TryStatement"));
    assert!(sync_err("new Map()").to_string().contains("NewExpression"));
    assert!(sync_err("class A {}").to_string().contains("ClassDeclaration"));
}

#[test]
fn test_called_function_runs_its_loops() {
    let interp = Interpreter::new();
    let source = "function sum() { let s = 0; for (let i = 0; i < 4; i++) { s += i } return s } sum()";
    assert_eq!(interp.evaluate_sync(source).unwrap(), Value::Number(6.0));
}

#[test]
fn test_restriction_does_not_leak_through_arrows() {
    let interp = Interpreter::new();
    let setup = "function main() { let s = 0; for (let i = 0; i < 4; i++) { s += i } return s }";
    block_on(interp.execute(setup)).unwrap();
    assert_eq!(block_on(interp.execute("const run = () => main(); run()")).unwrap(), Value::Number(6.0));
    assert_eq!(interp.evaluate_sync("(() => main())()").unwrap(), Value::Number(6.0));
}

#[test]
fn test_callback_may_call_looping_function() {
    let source = "
        function transform(x) { let out = 0; for (let i = 0; i < x; i++) { out += 10 } return out }
        [1, 2, 3].map(x => transform(x)).join(',')
    ";
    assert_eq!(Interpreter::new().evaluate_sync(source).unwrap(), Value::from("10,20,30"));
    assert_eq!(block_on(Interpreter::new().execute(source)).unwrap(), Value::from("10,20,30"));
}

#[test]
fn test_block_comparator_sorts() {
    let source = "
        const byDigits = (a, b) => {
            let da = 0;
            for (let n = a; n >= 1; n = n / 10) { da++ }
            let db = 0;
            for (let n = b; n >= 1; n = n / 10) { db++ }
            return da - db;
        };
        [300, 7, 42].sort(byDigits).join(' ')
    ";
    assert_eq!(block_on(Interpreter::new().execute(source)).unwrap(), Value::from("7 42 300"));
}

#[test]
fn test_expression_arrow_body_stays_restricted() {
    let err = block_on(Interpreter::new().execute("[1].map(x => new Map())")).unwrap_err();
    assert!(matches!(err, ScriptError::SyncUnsupported { .. }), "{:?}", err);
}

#[test]
fn test_getter_body_is_restricted() {
    let source = "
        class Counter {
            get total() { let s = 0; for (let i = 0; i < 3; i++) { s += i } return s }
        }
        new Counter().total
    ";
    let err = block_on(Interpreter::new().execute(source)).unwrap_err();
    assert!(err.to_string().contains("ForStatement"), "{}", err);
}

#[test]
fn test_pending_host_function_in_callback() {
    let interp = Interpreter::new();
    interp.register_async_function("later", |_| async {
        futures::future::pending::<()>().await;
        Ok(Value::Null)
    });
    let err = block_on(interp.execute("[1, 2].forEach(x => later())")).unwrap_err();
    assert!(matches!(&err, ScriptError::SyncUnsupported { node, .. } if node == "await"), "{:?}", err);
}

#[test]
fn test_ready_host_function_in_sync_mode() {
    let interp = Interpreter::new();
    interp.register_function("answer", |_, _, _| Ok(NativeReturn::Ready(Value::Number(42.0))));
    assert_eq!(interp.evaluate_sync("answer() + 1").unwrap(), Value::Number(43.0));
}

#[test]
fn test_pending_host_function_in_sync_mode() {
    let interp = Interpreter::new();
    interp.register_async_function("later", |_| async {
        futures::future::pending::<()>().await;
        Ok(Value::Null)
    });
    let err = interp.evaluate_sync("later()").unwrap_err();
    assert!(matches!(&err, ScriptError::SyncUnsupported { node, .. } if node == "await"), "{:?}", err);
}

#[test]
fn test_errors_propagate_in_sync_mode() {
    let interp = Interpreter::new();
    assert_eq!(interp.evaluate_sync("undefinedThing").unwrap_err().kind(), ErrorKind::UndefinedVariableError);
    assert_eq!(interp.evaluate_sync("throw 'sync'").unwrap_err().kind(), ErrorKind::Uncaught);
}
