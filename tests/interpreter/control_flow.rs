//! Control flow: conditionals, loops, labels, switch, try/catch/finally

use super::{eval, eval_err};
use sandrun::{ErrorKind, Value};

#[test]
fn test_if_else() {
    assert_eq!(eval("let r; if (1 > 2) { r = 'a' } else if (2 > 1) { r = 'b' } else { r = 'c' } r"), Value::from("b"));
    assert_eq!(eval("true ? 1 : 2"), Value::Number(1.0));
}

#[test]
fn test_while_and_do_while() {
    assert_eq!(eval("let i = 0; while (i < 5) { i++ } i"), Value::Number(5.0));
    assert_eq!(eval("let runs = 0; do { runs++ } while (false); runs"), Value::Number(1.0));
}

#[test]
fn test_break_and_continue() {
    let source = "
        let odd = [];
        for (let i = 0; i < 10; i++) {
            if (i % 2 === 0) continue;
            if (i > 7) break;
            odd.push(i);
        }
        odd.join(',')
    ";
    assert_eq!(eval(source), Value::from("1,3,5,7"));
}

#[test]
fn test_labeled_break_and_continue() {
    let source = "
        let pairs = [];
        outer: for (let i = 0; i < 3; i++) {
            for (let j = 0; j < 3; j++) {
                if (j === 1) continue outer;
                if (i === 2) break outer;
                pairs.push(i + '' + j);
            }
        }
        pairs.join(',')
    ";
    assert_eq!(eval(source), Value::from("00,10"));
}

#[test]
fn test_labeled_block_break() {
    assert_eq!(eval("let r = 'start'; done: { r = 'inside'; break done; r = 'never'; } r"), Value::from("inside"));
}

#[test]
fn test_for_of_collections() {
    assert_eq!(eval("let t = 0; for (const n of [1, 2, 3]) { t += n } t"), Value::Number(6.0));
    assert_eq!(eval("let s = ''; for (const c of 'abc') { s = c + s } s"), Value::from("cba"));
    assert_eq!(
        eval("let m = new Map([['a', 1], ['b', 2]]); let s = ''; for (const [k, v] of m) { s += k + v } s"),
        Value::from("a1b2")
    );
    assert_eq!(eval("let t = 0; for (const v of new Set([1, 1, 2])) { t += v } t"), Value::Number(3.0));
}

#[test]
fn test_for_in_keys() {
    assert_eq!(eval("let ks = []; for (const k in { x: 1, y: 2 }) { ks.push(k) } ks.join()"), Value::from("x,y"));
    assert_eq!(eval("let ks = []; for (const k in ['a', 'b']) { ks.push(k) } ks.join()"), Value::from("0,1"));
}

#[test]
fn test_switch_with_fallthrough() {
    let source = "
        function classify(n) {
            let out = [];
            switch (n) {
                case 1:
                    out.push('one');
                case 2:
                    out.push('two');
                    break;
                case 3:
                    out.push('three');
                    break;
                default:
                    out.push('other');
            }
            return out.join('+');
        }
        [classify(1), classify(2), classify(3), classify(9)].join(' ')
    ";
    assert_eq!(eval(source), Value::from("one+two two three other"));
}

#[test]
fn test_switch_uses_strict_equality() {
    assert_eq!(eval("let r = 'none'; switch ('1') { case 1: r = 'number'; break; case '1': r = 'string'; } r"), Value::from("string"));
}

#[test]
fn test_try_catch_user_throw() {
    assert_eq!(eval("let r; try { throw 'boom' } catch (e) { r = 'caught ' + e } r"), Value::from("caught boom"));
    assert_eq!(
        eval("let r; try { throw { code: 42 } } catch ({ code }) { r = code } r"),
        Value::Number(42.0)
    );
}

#[test]
fn test_try_catch_engine_error() {
    let source = "
        let info;
        try {
            let x = null;
            x.property;
        } catch (e) {
            info = e.name + '|' + (e instanceof Error);
        }
        info
    ";
    assert_eq!(eval(source), Value::from("TypeMismatchError|true"));
}

#[test]
fn test_finally_always_runs() {
    let source = "
        let log = [];
        function run(fail) {
            try {
                if (fail) throw new Error('bad');
                log.push('body');
                return 'returned';
            } catch (e) {
                log.push('catch:' + e.message);
                return 'recovered';
            } finally {
                log.push('finally');
            }
        }
        let a = run(false);
        let b = run(true);
        [a, b, log.join(',')].join(' ')
    ";
    assert_eq!(eval(source), Value::from("returned recovered body,finally,catch:bad,finally"));
}

#[test]
fn test_finally_abrupt_completion_overrides() {
    assert_eq!(
        eval("function f() { try { return 'try' } finally { return 'finally' } } f()"),
        Value::from("finally")
    );
}

#[test]
fn test_uncaught_throw_reaches_host() {
    let err = eval_err("throw new Error('escaped')");
    assert_eq!(err.kind(), ErrorKind::Uncaught);
    assert!(err.to_string().contains("escaped"), "{}", err);
}

#[test]
fn test_rethrow_from_catch() {
    let source = "
        let r;
        try {
            try { throw 'inner' } catch (e) { throw e + '!' }
        } catch (e) {
            r = e;
        }
        r
    ";
    assert_eq!(eval(source), Value::from("inner!"));
}

#[test]
fn test_break_outside_loop_is_error() {
    let err = eval_err("function f() { break; } f()");
    assert_eq!(err.kind(), ErrorKind::RuntimeError);
}
