//! Basic language features: arithmetic, operators, literals, templates

use super::{eval, eval_display};
use sandrun::Value;

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2"), Value::Number(3.0));
    assert_eq!(eval("10 - 4"), Value::Number(6.0));
    assert_eq!(eval("3 * 4"), Value::Number(12.0));
    assert_eq!(eval("15 / 3"), Value::Number(5.0));
    assert_eq!(eval("7 % 3"), Value::Number(1.0));
    assert_eq!(eval("2 ** 10"), Value::Number(1024.0));
}

#[test]
fn test_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Value::Number(7.0));
    assert_eq!(eval("(1 + 2) * 3"), Value::Number(9.0));
}

#[test]
fn test_program_value_is_last_expression() {
    assert_eq!(eval("let x = 10; let y = x * 2; y + 5"), Value::Number(25.0));
    assert_eq!(
        eval("let sum = 0; for (let i = 1; i <= 5; i = i + 1) { sum = sum + i } sum"),
        Value::Number(15.0)
    );
}

#[test]
fn test_top_level_return_is_the_result() {
    assert_eq!(eval("let a = 1; return a + 1; a"), Value::Number(2.0));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'a' + 1"), Value::from("a1"));
    assert_eq!(eval("1 + 2 + 'x'"), Value::from("3x"));
    assert_eq!(eval("true + 1"), Value::Number(2.0));
}

#[test]
fn test_equality() {
    assert_eq!(eval("1 == '1'"), Value::Boolean(true));
    assert_eq!(eval("1 === '1'"), Value::Boolean(false));
    assert_eq!(eval("null == undefined"), Value::Boolean(true));
    assert_eq!(eval("null === undefined"), Value::Boolean(false));
    assert_eq!(eval("NaN === NaN"), Value::Boolean(false));
}

#[test]
fn test_comparison() {
    assert_eq!(eval("1 < 2"), Value::Boolean(true));
    assert_eq!(eval("'apple' < 'banana'"), Value::Boolean(true));
    assert_eq!(eval("3 >= 3"), Value::Boolean(true));
}

#[test]
fn test_typeof() {
    assert_eq!(eval("typeof 1"), Value::from("number"));
    assert_eq!(eval("typeof 'a'"), Value::from("string"));
    assert_eq!(eval("typeof null"), Value::from("object"));
    assert_eq!(eval("typeof undefined"), Value::from("undefined"));
    assert_eq!(eval("typeof notDeclared"), Value::from("undefined"));
    assert_eq!(eval("typeof (() => 1)"), Value::from("function"));
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(eval("0 || 'fallback'"), Value::from("fallback"));
    assert_eq!(eval("'first' && 'second'"), Value::from("second"));
    assert_eq!(eval("null ?? 5"), Value::Number(5.0));
    assert_eq!(eval("0 ?? 5"), Value::Number(0.0));
}

#[test]
fn test_short_circuit_calls_right_side_once() {
    let source = r#"
        let calls = 0;
        function sideEffect() { calls = calls + 1; return 'called'; }
        function getFalsy() { return null; }
        function getTruthy() { return 1; }
        getFalsy() || sideEffect();
        getTruthy() || sideEffect();
        getTruthy() && sideEffect();
        getFalsy() && sideEffect();
        calls
    "#;
    assert_eq!(eval(source), Value::Number(2.0));
}

#[test]
fn test_bitwise() {
    assert_eq!(eval("5 & 3"), Value::Number(1.0));
    assert_eq!(eval("5 | 3"), Value::Number(7.0));
    assert_eq!(eval("5 ^ 3"), Value::Number(6.0));
    assert_eq!(eval("1 << 4"), Value::Number(16.0));
    assert_eq!(eval("-16 >> 2"), Value::Number(-4.0));
    assert_eq!(eval("-1 >>> 28"), Value::Number(15.0));
    assert_eq!(eval("~5"), Value::Number(-6.0));
}

#[test]
fn test_compound_assignment() {
    assert_eq!(eval("let x = 2; x += 3; x *= 4; x -= 1; x"), Value::Number(19.0));
    assert_eq!(eval("let s = 'a'; s += 'b'; s"), Value::from("ab"));
    assert_eq!(eval("let n = null; n ??= 7; n"), Value::Number(7.0));
    assert_eq!(eval("let t = 1; t ||= 9; t"), Value::Number(1.0));
    assert_eq!(eval("let f = 1; f &&= 9; f"), Value::Number(9.0));
}

#[test]
fn test_update_expressions() {
    assert_eq!(eval("let i = 1; let j = i++; j * 10 + i"), Value::Number(12.0));
    assert_eq!(eval("let i = 1; let j = ++i; j * 10 + i"), Value::Number(22.0));
    assert_eq!(eval("let o = { n: 5 }; o.n--; o.n"), Value::Number(4.0));
}

#[test]
fn test_template_literals() {
    assert_eq!(eval("let name = 'World'; `Hello, ${name}!`"), Value::from("Hello, World!"));
    assert_eq!(eval("let a = 2; `${a} * 3 = ${a * 3}`"), Value::from("2 * 3 = 6"));
    assert_eq!(eval("`${[1, 2].length} items`"), Value::from("2 items"));
}

#[test]
fn test_object_and_array_literals() {
    assert_eq!(eval_display("[1, 'two', null]"), "[1, \"two\", null]");
    assert_eq!(eval("let o = { a: 1, 'b': 2, [`c${1}`]: 3 }; o.a + o.b + o.c1"), Value::Number(6.0));
    assert_eq!(eval("let x = 4; let o = { x }; o.x"), Value::Number(4.0));
}

#[test]
fn test_spread() {
    assert_eq!(eval("let a = [1, 2]; let b = [0, ...a, 3]; b.join('-')"), Value::from("0-1-2-3"));
    assert_eq!(
        eval("let base = { a: 1, b: 2 }; let o = { ...base, b: 3 }; JSON.stringify(o)"),
        Value::from(r#"{"a":1,"b":3}"#)
    );
    assert_eq!(eval("function sum(a, b, c) { return a + b + c } sum(...[1, 2, 3])"), Value::Number(6.0));
}

#[test]
fn test_optional_chaining() {
    assert_eq!(eval("let o = null; o?.a"), Value::Undefined);
    assert_eq!(eval("let o = { a: { b: 2 } }; o?.a?.b"), Value::Number(2.0));
    assert_eq!(eval("let o = {}; o.missing?.deep.deeper"), Value::Undefined);
    assert_eq!(eval("let o = {}; o.fn?.()"), Value::Undefined);
}

#[test]
fn test_in_and_delete() {
    assert_eq!(eval("let o = { a: 1 }; 'a' in o"), Value::Boolean(true));
    assert_eq!(eval("let o = { a: 1 }; delete o.a; 'a' in o"), Value::Boolean(false));
    assert_eq!(eval("let o = { a: 1, b: 2 }; delete o['a']; Object.keys(o).join()"), Value::from("b"));
}

#[test]
fn test_automatic_semicolons() {
    let source = "
        let a = 1
        let b = 2
        a + b
    ";
    assert_eq!(eval(source), Value::Number(3.0));
}

#[test]
fn test_void_and_sequence() {
    assert_eq!(eval("void 0"), Value::Undefined);
    assert_eq!(eval("let x = (1, 2, 3); x"), Value::Number(3.0));
}
