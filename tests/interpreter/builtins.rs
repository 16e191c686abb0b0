//! Built-in globals and methods on built-in values

use super::{eval, eval_err, number};
use sandrun::{ErrorKind, Value};

#[test]
fn test_json() {
    assert_eq!(
        eval(r#"JSON.stringify({ a: [1, 'x', null], b: undefined, c: true })"#),
        Value::from(r#"{"a":[1,"x",null],"c":true}"#)
    );
    assert_eq!(eval("JSON.stringify([1, 2], null, 2)"), Value::from("[\n  1,\n  2\n]"));
    assert_eq!(eval(r#"JSON.parse('{"n": 1.5, "list": [true]}').list[0]"#), Value::Boolean(true));
    assert_eq!(eval("JSON.stringify(new Date(0))"), Value::from("\"1970-01-01T00:00:00.000Z\""));
    assert_eq!(eval_err("JSON.parse('{bad')").kind(), ErrorKind::RuntimeError);
    assert_eq!(
        eval_err("let o = {}; o.self = o; JSON.stringify(o)").kind(),
        ErrorKind::TypeMismatchError
    );
}

#[test]
fn test_math() {
    assert_eq!(eval("Math.max(1, 5, 3) + Math.min(4, 2)"), Value::Number(7.0));
    assert_eq!(eval("Math.floor(2.7) + Math.ceil(2.1) + Math.abs(-4)"), Value::Number(9.0));
    assert_eq!(eval("Math.round(2.5) + Math.round(-2.5)"), Value::Number(1.0));
    assert_eq!(eval("Math.pow(2, 8)"), Value::Number(256.0));
    assert_eq!(eval("Math.hypot(3, 4)"), Value::Number(5.0));
    assert!((number(&eval("Math.PI")) - std::f64::consts::PI).abs() < 1e-12);
    assert!(number(&eval("Math.sqrt(-1)")).is_nan());
}

#[test]
fn test_conversions() {
    assert_eq!(eval("parseInt('42px')"), Value::Number(42.0));
    assert_eq!(eval("parseInt('ff', 16)"), Value::Number(255.0));
    assert_eq!(eval("parseFloat('3.5kg')"), Value::Number(3.5));
    assert_eq!(eval("Number('12') + 1"), Value::Number(13.0));
    assert_eq!(eval("String(12) + 1"), Value::from("121"));
    assert_eq!(eval("Boolean('') || Boolean('x')"), Value::Boolean(true));
    assert_eq!(eval("isNaN('abc') && isFinite(1)"), Value::Boolean(true));
    assert_eq!(eval("(255).toString(16) + (3.14159).toFixed(2)"), Value::from("ff3.14"));
}

#[test]
fn test_object_statics() {
    assert_eq!(eval("Object.keys({ a: 1, b: 2 }).join()"), Value::from("a,b"));
    assert_eq!(eval("Object.values({ a: 1, b: 2 }).join()"), Value::from("1,2"));
    assert_eq!(eval("Object.entries({ a: 1 })[0].join('=')"), Value::from("a=1"));
    assert_eq!(
        eval("JSON.stringify(Object.assign({ a: 1 }, { b: 2 }, null))"),
        Value::from(r#"{"a":1,"b":2}"#)
    );
    assert_eq!(eval("Object.fromEntries([['x', 1], ['y', 2]]).y"), Value::Number(2.0));
    assert_eq!(eval_err("Object.keys(null)").kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_array_statics() {
    assert_eq!(eval("Array.isArray([]) && !Array.isArray({})"), Value::Boolean(true));
    assert_eq!(eval("Array.from('abc').join('|')"), Value::from("a|b|c"));
    assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * 2).join()"), Value::from("0,2,4"));
    assert_eq!(eval("Array.of(7, 8).length"), Value::Number(2.0));
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("let a = [1, 2]; a.push(3, 4); a.pop(); a.shift(); a.unshift(0); a.join()"), Value::from("0,2,3"));
    assert_eq!(eval("[1, 2, 3, 2].indexOf(2) + [1, 2, 3, 2].lastIndexOf(2)"), Value::Number(4.0));
    assert_eq!(eval("[1, 2, 3].includes(2)"), Value::Boolean(true));
    assert_eq!(eval("[1, 2, 3, 4].slice(1, -1).join()"), Value::from("2,3"));
    assert_eq!(eval("let a = [1, 2, 3, 4]; let r = a.splice(1, 2, 'x'); a.join() + '/' + r.join()"), Value::from("1,x,4/2,3"));
    assert_eq!(eval("[1].concat([2, 3], 4).reverse().join('')"), Value::from("4321"));
    assert_eq!(eval("[1, [2, [3]]].flat().length"), Value::Number(3.0));
    assert_eq!(eval("[1, 2, 3].at(-1)"), Value::Number(3.0));
}

#[test]
fn test_array_iteration_methods() {
    assert_eq!(eval("[1, 2, 3, 4].filter(n => n % 2).map(n => n * 10).join()"), Value::from("10,30"));
    assert_eq!(eval("[1, 2, 3].reduce((acc, n) => acc + n, 10)"), Value::Number(16.0));
    assert_eq!(eval("[5, 8, 12].find(n => n > 6)"), Value::Number(8.0));
    assert_eq!(eval("[5, 8, 12].findIndex(n => n > 100)"), Value::Number(-1.0));
    assert_eq!(eval("[1, 2].some(n => n > 1) && [1, 2].every(n => n > 0)"), Value::Boolean(true));
    assert_eq!(eval("[[1, 2], [3]].flatMap(x => x).length"), Value::Number(3.0));
    assert_eq!(eval("[10, 9, 1, 100].sort().join()"), Value::from("1,10,100,9"));
    assert_eq!(eval("[10, 9, 1, 100].sort((a, b) => a - b).join()"), Value::from("1,9,10,100"));
    assert_eq!(eval_err("[].reduce((a, b) => a + b)").kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_await_inside_for_of() {
    let source = "
        async function double(n) { return n * 2 }
        const out = [];
        for (const n of [1, 2]) {
            out.push(await double(n));
        }
        out.join()
    ";
    assert_eq!(eval(source), Value::from("2,4"));
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("'Hello'.charAt(1) + 'Hello'.at(-1)"), Value::from("eo"));
    assert_eq!(eval("'banana'.indexOf('an') + 'banana'.lastIndexOf('an')"), Value::Number(4.0));
    assert_eq!(eval("'abcdef'.slice(1, 3) + 'abcdef'.substring(4)"), Value::from("bcef"));
    assert_eq!(eval("'  pad  '.trim() + '|'"), Value::from("pad|"));
    assert_eq!(eval("'a,b,,c'.split(',').length"), Value::Number(4.0));
    assert_eq!(eval("'x'.repeat(3) + '7'.padStart(3, '0') + '7'.padEnd(2, '.')"), Value::from("xxx0077."));
    assert_eq!(eval("'Mixed'.toUpperCase() + 'Mixed'.toLowerCase()"), Value::from("MIXEDmixed"));
    assert_eq!(eval("'a-b-c'.replace('-', '+') + ' ' + 'a-b-c'.replaceAll('-', '+')"), Value::from("a+b-c a+b+c"));
    assert_eq!(eval("'start'.startsWith('st') && 'start'.endsWith('rt') && 'start'.includes('ar')"), Value::Boolean(true));
    assert_eq!(eval("'héllo'.length"), Value::Number(5.0));
}

#[test]
fn test_regexp() {
    assert_eq!(eval("/^\\d+$/.test('123')"), Value::Boolean(true));
    assert_eq!(eval("'2024-01-15'.replace(/(\\d+)-(\\d+)-(\\d+)/, '$3/$2/$1')"), Value::from("15/01/2024"));
    assert_eq!(eval("'a1b22c333'.match(/\\d+/g).join()"), Value::from("1,22,333"));
    assert_eq!(eval("'one  two three'.split(/\\s+/).length"), Value::Number(3.0));
    assert_eq!(eval("/abc/gi.flags + /abc/.source"), Value::from("giabc"));
    assert_eq!(eval("new RegExp('a+', 'g').global"), Value::Boolean(true));
}

#[test]
fn test_map_and_set() {
    let source = "
        const m = new Map();
        m.set('a', 1).set('b', 2);
        m.set('a', 3);
        m.delete('b');
        [m.size, m.get('a'), m.has('b')].join()
    ";
    assert_eq!(eval(source), Value::from("1,3,false"));
    assert_eq!(eval("const s = new Set([1, 2, 2, 3]); s.add(3).add(4); s.size"), Value::Number(4.0));
    assert_eq!(eval("let t = 0; new Map([['x', 1], ['y', 2]]).forEach((v, k) => { t += v }); t"), Value::Number(3.0));
    assert_eq!(eval("[...new Set(['a', 'a', 'b'])].join()"), Value::from("a,b"));
    assert_eq!(eval("new Map([[1, 'one']]) instanceof Map"), Value::Boolean(true));
}

#[test]
fn test_dates_are_utc() {
    let source = "
        const d = new Date('2024-03-15T10:30:00Z');
        [d.getFullYear(), d.getMonth(), d.getDate(), d.getHours(), d.getMinutes()].join()
    ";
    assert_eq!(eval(source), Value::from("2024,2,15,10,30"));
    assert_eq!(eval("new Date(0).toISOString()"), Value::from("1970-01-01T00:00:00.000Z"));
    assert_eq!(eval("new Date(2024, 0, 2).getTime() === Date.UTC(2024, 0, 2)"), Value::Boolean(true));
    assert_eq!(eval("typeof Date.now()"), Value::from("number"));
    assert!(number(&eval("new Date('not a date').getTime()")).is_nan());
}
