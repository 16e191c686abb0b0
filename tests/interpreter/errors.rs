//! Error kinds, locations, suggestions and diagnostics

use super::{eval, eval_err};
use sandrun::{ErrorKind, Value};

#[test]
fn test_parse_error_has_location() {
    let err = eval_err("let x = 1;\nlet = ;");
    assert_eq!(err.kind(), ErrorKind::ParseError);
    let location = err.location().expect("parse errors carry a location");
    assert_eq!(location.line, 2);
}

#[test]
fn test_runtime_error_location_points_at_failing_line() {
    let err = eval_err("let a = 1;\nlet b = 2;\nlet c = a + missing;");
    assert_eq!(err.kind(), ErrorKind::UndefinedVariableError);
    assert_eq!(err.location().map(|l| l.line), Some(3));
    assert!(err.to_string().starts_with("UndefinedVariableError: missing is not defined"), "{}", err);
}

#[test]
fn test_type_mismatch_messages() {
    let err = eval_err("let cfg = null; cfg.port");
    assert_eq!(err.kind(), ErrorKind::TypeMismatchError);
    assert!(err.message().contains("Cannot read properties of null"), "{}", err);

    let err = eval_err("let n = 5; n.field = 1;");
    assert_eq!(err.kind(), ErrorKind::TypeMismatchError);

    let err = eval_err("1 instanceof 2");
    assert_eq!(err.kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_function_suggestions_rank_closest_first() {
    let source = "
        function processData() {}
        function processDate() {}
        function unrelated() {}
        procesData()
    ";
    let err = eval_err(source);
    assert_eq!(err.kind(), ErrorKind::FunctionNotFoundError);
    assert_eq!(err.suggestions().first().map(String::as_str), Some("processData"));
    assert!(!err.suggestions().iter().any(|s| s == "unrelated"));
    assert!(err.to_string().contains("Did you mean: processData"), "{}", err);
}

#[test]
fn test_scope_snapshot_lists_visible_bindings() {
    let source = "
        const limit = 10;
        function check(value) {
            let doubled = value * 2;
            return doubled + unknownName;
        }
        check(4)
    ";
    let err = eval_err(source);
    let names: Vec<&str> = err.diagnostics().scope.iter().map(|(name, _)| name.as_str()).collect();
    assert!(names.contains(&"doubled"), "{:?}", names);
    assert!(names.contains(&"value"), "{:?}", names);
    assert!(names.contains(&"limit"), "{:?}", names);
    let doubled = err.diagnostics().scope.iter().find(|(name, _)| name == "doubled");
    assert_eq!(doubled.map(|(_, value)| value.as_str()), Some("8"));
}

#[test]
fn test_trace_lists_calls_innermost_first() {
    let source = "
        function inner() { return nothing.here; }
        function outer() { return inner(); }
        outer()
    ";
    let err = eval_err(source);
    let names: Vec<Option<&str>> = err
        .diagnostics()
        .trace
        .iter()
        .map(|frame| frame.function_name.as_deref())
        .collect();
    assert_eq!(names, vec![Some("inner"), Some("outer")]);
    assert!(err.format_trace().contains("at inner"), "{}", err.format_trace());
}

#[test]
fn test_engine_errors_are_catchable_values() {
    let source = "
        let caught = [];
        try { notDeclared } catch (e) { caught.push(e.name) }
        try { null.x } catch (e) { caught.push(e.name) }
        try { nope() } catch (e) { caught.push(e.name) }
        try { const c = 1; c = 2; } catch (e) { caught.push(e.name) }
        caught.join()
    ";
    assert_eq!(
        eval(source),
        Value::from("UndefinedVariableError,TypeMismatchError,FunctionNotFoundError,RuntimeError")
    );
}

#[test]
fn test_caught_error_message_and_stack() {
    let source = "
        function fail() { return missing; }
        let info;
        try { fail() } catch (e) { info = e.message + '|' + e.stack.includes('fail') }
        info
    ";
    assert_eq!(eval(source), Value::from("missing is not defined|true"));
}

#[test]
fn test_uncaught_values_display() {
    assert_eq!(eval_err("throw new Error('boom')").to_string(), "Uncaught Error: boom");
    assert_eq!(eval_err("throw 'plain'").to_string(), "Uncaught plain");
    assert_eq!(eval_err("throw new TypeError('bad type')").to_string(), "Uncaught TypeError: bad type");
}

#[test]
fn test_error_properties_are_not_enumerable() {
    assert_eq!(eval("Object.keys(new Error('x')).length"), Value::Number(0.0));
    assert_eq!(eval("JSON.stringify(new Error('x'))"), Value::from("{}"));
}
