//! Scoping: let/const/var, shadowing, hoisting, closures over scopes

use super::{eval, eval_err};
use sandrun::{ErrorKind, Value};

#[test]
fn test_block_shadowing_leaves_outer_binding() {
    let source = "
        let x = 'outer';
        let seen;
        {
            let x = 'inner';
            seen = x;
        }
        seen + ':' + x
    ";
    assert_eq!(eval(source), Value::from("inner:outer"));
}

#[test]
fn test_nested_block_shadowing() {
    let source = "
        let x = 1;
        let trail = [];
        {
            let x = 2;
            {
                let x = 3;
                trail.push(x);
            }
            trail.push(x);
        }
        trail.push(x);
        trail.join(',')
    ";
    assert_eq!(eval(source), Value::from("3,2,1"));
}

#[test]
fn test_const_reassignment_is_runtime_error() {
    let err = eval_err("const x = 1; x = 2;");
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert!(err.to_string().contains("constant"), "{}", err);
}

#[test]
fn test_const_reassignment_in_nested_scope_keeps_value() {
    let source = "
        const limit = 10;
        let message = '';
        try {
            (function () { limit = 20; })();
        } catch (e) {
            message = e.name;
        }
        message + ':' + limit
    ";
    assert_eq!(eval(source), Value::from("RuntimeError:10"));
}

#[test]
fn test_var_is_function_scoped() {
    let source = "
        function f() {
            if (true) {
                var inner = 'visible';
            }
            return inner;
        }
        f()
    ";
    assert_eq!(eval(source), Value::from("visible"));
}

#[test]
fn test_var_hoisting_reads_undefined() {
    assert_eq!(eval("let before = typeof hoisted; var hoisted = 1; before"), Value::from("undefined"));
    assert_eq!(eval("function f() { let r = v; var v = 2; return r; } f()"), Value::Undefined);
}

#[test]
fn test_var_in_nested_block_updates_hoisted_binding() {
    let source = "
        var count = 1;
        {
            var count = 2;
        }
        count
    ";
    assert_eq!(eval(source), Value::Number(2.0));
}

#[test]
fn test_function_declarations_are_hoisted() {
    assert_eq!(eval("let r = later(); function later() { return 'ok'; } r"), Value::from("ok"));
}

#[test]
fn test_let_is_not_visible_outside_block() {
    let err = eval_err("{ let hidden = 1; } hidden");
    assert_eq!(err.kind(), ErrorKind::UndefinedVariableError);
}

#[test]
fn test_assignment_to_undeclared_binds_locally() {
    assert_eq!(eval("fresh = 3; fresh + 1"), Value::Number(4.0));
}

#[test]
fn test_for_let_binding_is_per_iteration() {
    let source = "
        let fns = [];
        for (let i = 0; i < 3; i++) {
            fns.push(() => i);
        }
        fns.map(f => f()).join(',')
    ";
    assert_eq!(eval(source), Value::from("0,1,2"));
}

#[test]
fn test_for_var_binding_is_shared() {
    let source = "
        let fns = [];
        for (var i = 0; i < 3; i++) {
            fns.push(() => i);
        }
        fns.map(f => f()).join(',')
    ";
    assert_eq!(eval(source), Value::from("3,3,3"));
}

#[test]
fn test_destructuring_declarations() {
    assert_eq!(eval("let { a, b: renamed } = { a: 1, b: 2 }; a + renamed"), Value::Number(3.0));
    assert_eq!(eval("let [first, , third] = [1, 2, 3]; first + third"), Value::Number(4.0));
    assert_eq!(eval("let [head, ...tail] = [1, 2, 3]; tail.length"), Value::Number(2.0));
    assert_eq!(eval("let { x = 5 } = {}; x"), Value::Number(5.0));
    assert_eq!(
        eval("let { a, ...rest } = { a: 1, b: 2, c: 3 }; Object.keys(rest).join()"),
        Value::from("b,c")
    );
    assert_eq!(eval("let { p: { q } } = { p: { q: 'deep' } }; q"), Value::from("deep"));
}

#[test]
fn test_destructuring_assignment_swaps() {
    assert_eq!(eval("let a = 1; let b = 2; [a, b] = [b, a]; a * 10 + b"), Value::Number(21.0));
}

#[test]
fn test_destructuring_null_is_type_mismatch() {
    let err = eval_err("let { a } = null;");
    assert_eq!(err.kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_undefined_variable_has_suggestions() {
    let err = eval_err("let counter = 1; countr + 1");
    assert_eq!(err.kind(), ErrorKind::UndefinedVariableError);
    assert!(err.suggestions().iter().any(|s| s == "counter"), "{:?}", err.suggestions());
}

#[test]
fn test_finished_call_contexts_are_collected() {
    let interp = sandrun::Interpreter::new();
    let setup = "
        function f(a) {
            function helper(x) { return x * 2 }
            return a.map(x => helper(x + 1));
        }
    ";
    futures::executor::block_on(interp.execute(setup)).unwrap();
    let baseline = interp.context_count();
    let source = "let out; for (let i = 0; i < 2000; i++) { out = f([1, 2]) } out.join(',')";
    assert_eq!(futures::executor::block_on(interp.execute(source)).unwrap(), Value::from("4,6"));
    assert!(
        interp.context_count() <= baseline + 4,
        "{} contexts live, baseline {}",
        interp.context_count(),
        baseline
    );
}

#[test]
fn test_closure_held_by_host_survives_collection() {
    let interp = sandrun::Interpreter::new();
    let source = "function make() { let n = 0; return () => ++n } make()";
    let counter = futures::executor::block_on(interp.execute(source)).unwrap();
    futures::executor::block_on(interp.execute("let unrelated = [1, 2, 3].map(x => x)")).unwrap();
    let call = || futures::executor::block_on(interp.call(&counter, Value::Undefined, Vec::new()));
    assert_eq!(call().unwrap(), Value::Number(1.0));
    assert_eq!(call().unwrap(), Value::Number(2.0));
}
