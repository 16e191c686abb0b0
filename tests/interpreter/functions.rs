//! Functions: declarations, arrows, closures, parameters, `this`, host functions

use std::cell::Cell;
use std::rc::Rc;

use futures::executor::block_on;
use sandrun::{ErrorKind, Interpreter, InterpreterConfig, NativeReturn, Value};

use super::{eval, eval_err};

#[test]
fn test_declarations_and_expressions() {
    assert_eq!(eval("function add(a, b) { return a + b } add(2, 3)"), Value::Number(5.0));
    assert_eq!(eval("const mul = function (a, b) { return a * b }; mul(2, 3)"), Value::Number(6.0));
    assert_eq!(eval("const sq = x => x * x; sq(4)"), Value::Number(16.0));
    assert_eq!(eval("const pair = (a, b) => { return [a, b] }; pair(1, 2).length"), Value::Number(2.0));
}

#[test]
fn test_missing_arguments_are_undefined() {
    assert_eq!(eval("function f(a, b) { return typeof b } f(1)"), Value::from("undefined"));
}

#[test]
fn test_default_and_rest_parameters() {
    assert_eq!(eval("function greet(name = 'anon') { return 'hi ' + name } greet()"), Value::from("hi anon"));
    assert_eq!(eval("function count(first, ...rest) { return rest.length } count(1, 2, 3)"), Value::Number(2.0));
    assert_eq!(eval("function pick({ a, b = 2 }) { return a + b } pick({ a: 1 })"), Value::Number(3.0));
}

#[test]
fn test_counter_closure_accumulates() {
    let source = "
        function makeCounter() {
            let count = 0;
            return function () {
                count = count + 1;
                return count;
            };
        }
        const counter = makeCounter();
        const sibling = makeCounter();
        counter();
        sibling();
        counter()
    ";
    assert_eq!(eval(source), Value::Number(2.0));
}

#[test]
fn test_closures_share_captured_scope() {
    let source = "
        function account() {
            let balance = 0;
            return {
                deposit: amount => { balance += amount },
                read: () => balance,
            };
        }
        const acct = account();
        acct.deposit(5);
        acct.deposit(7);
        acct.read()
    ";
    assert_eq!(eval(source), Value::Number(12.0));
}

#[test]
fn test_recursion() {
    assert_eq!(eval("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2) } fib(15)"), Value::Number(610.0));
}

#[test]
fn test_call_depth_limit() {
    let interp = Interpreter::with_config(InterpreterConfig::default().with_max_call_depth(32));
    let err = block_on(interp.execute("function down(n) { return down(n + 1) } down(0)")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
    assert!(err.to_string().contains("Maximum call stack"), "{}", err);
}

#[test]
fn test_method_this() {
    assert_eq!(eval("const o = { n: 3, get() { return this.n } }; o.get()"), Value::Number(3.0));
}

#[test]
fn test_arrow_captures_this() {
    let source = "
        const o = {
            items: [1, 2, 3],
            factor: 10,
            scaled() { return this.items.map(x => x * this.factor) },
        };
        o.scaled().join(',')
    ";
    assert_eq!(eval(source), Value::from("10,20,30"));
}

#[test]
fn test_function_name_inference() {
    assert_eq!(eval("const named = () => 1; named.name"), Value::from("named"));
}

#[test]
fn test_calling_non_function_is_type_mismatch() {
    let err = eval_err("let x = 5; x()");
    assert_eq!(err.kind(), ErrorKind::TypeMismatchError);
    let err = eval_err("let o = {}; o.missing()");
    assert_eq!(err.kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_unknown_function_is_reported() {
    let err = eval_err("function compute() { return 1 } compte()");
    assert_eq!(err.kind(), ErrorKind::FunctionNotFoundError);
    assert!(err.suggestions().iter().any(|s| s == "compute"), "{:?}", err.suggestions());
}

#[test]
fn test_host_function_receives_arguments() {
    let interp = Interpreter::new();
    interp.register_function("double", |_, _, args| {
        let n = args.first().map_or(0.0, Value::to_number);
        Ok(NativeReturn::Ready(Value::Number(n * 2.0)))
    });
    assert_eq!(block_on(interp.execute("double(21)")).unwrap(), Value::Number(42.0));
}

#[test]
fn test_host_function_shadows_builtin() {
    let interp = Interpreter::new();
    interp.register_function("parseInt", |_, _, _| Ok(NativeReturn::Ready(Value::from("custom"))));
    assert_eq!(block_on(interp.execute("parseInt('12')")).unwrap(), Value::from("custom"));
}

#[test]
fn test_async_host_function_is_awaited() {
    let interp = Interpreter::new();
    interp.register_async_function("fetchValue", |args| async move {
        let key = args.first().map(|v| v.to_js_string().to_string()).unwrap_or_default();
        Ok(Value::from(format!("value-of-{}", key)))
    });
    let source = "
        async function load() {
            const v = await fetchValue('a');
            return v.toUpperCase();
        }
        await load()
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::from("VALUE-OF-A"));
}

#[test]
fn test_host_errors_propagate_and_are_catchable() {
    let interp = Interpreter::new();
    interp.register_function("fail", |_, _, _| Err(sandrun::ScriptError::runtime("host refused")));
    let source = "let m; try { fail() } catch (e) { m = e.message } m";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::from("host refused"));
}

#[test]
fn test_host_calls_script_function() {
    let interp = Interpreter::new();
    block_on(interp.execute("function triple(x) { return x * 3 }")).unwrap();
    let triple = interp.get_global("triple").unwrap();
    let result = block_on(interp.call(&triple, Value::Undefined, vec![Value::Number(5.0)])).unwrap();
    assert_eq!(result, Value::Number(15.0));
}

#[test]
fn test_host_callback_runs_per_element() {
    let interp = Interpreter::new();
    let seen = Rc::new(Cell::new(0));
    let counter = seen.clone();
    interp.register_function("tick", move |_, _, _| {
        counter.set(counter.get() + 1);
        Ok(NativeReturn::Ready(Value::Undefined))
    });
    block_on(interp.execute("[1, 2, 3].forEach(() => tick())")).unwrap();
    assert_eq!(seen.get(), 3);
}
