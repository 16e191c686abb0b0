//! ES module imports and exports through a host resolver

use futures::executor::block_on;
use sandrun::{ErrorKind, Interpreter, MemoryResolver, Value};

fn with_modules(modules: &[(&str, &str)]) -> Interpreter {
    let resolver = modules
        .iter()
        .fold(MemoryResolver::new(), |r, (path, code)| r.with_module(path, code));
    Interpreter::new().with_resolver(resolver)
}

#[test]
fn test_named_and_default_imports() {
    let interp = with_modules(&[(
        "math.js",
        "
        export const PI = 3;
        export function square(x) { return x * x }
        export default function cube(x) { return x * x * x }
        ",
    )]);
    let source = "
        import cube, { PI, square as sq } from './math';
        cube(2) + sq(PI)
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::Number(17.0));
}

#[test]
fn test_namespace_import() {
    let interp = with_modules(&[("config.js", "export const host = 'localhost'; export const port = 8080;")]);
    let source = "
        import * as config from './config.js';
        config.host + ':' + config.port
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::from("localhost:8080"));
}

#[test]
fn test_module_state_is_shared_between_importers() {
    let interp = with_modules(&[
        (
            "counter.js",
            "
            let count = 0;
            export function increment() { count += 1; return count }
            ",
        ),
        ("user.js", "import { increment } from './counter'; export const first = increment();"),
    ]);
    let source = "
        import { first } from './user';
        import { increment } from './counter';
        first * 10 + increment()
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::Number(12.0));
    assert_eq!(interp.loaded_module_count(), 2);
}

#[test]
fn test_circular_imports_see_partial_exports() {
    let interp = with_modules(&[
        (
            "a.js",
            "
            import { b } from './b';
            export const a = 'A';
            export function readB() { return b }
            ",
        ),
        (
            "b.js",
            "
            import { a } from './a';
            export const b = 'B';
            export function readA() { return typeof a }
            ",
        ),
    ]);
    let source = "
        import { readB } from './a';
        import { readA } from './b';
        readB() + ':' + readA()
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::from("B:undefined"));
}

#[test]
fn test_circular_namespace_import_is_live() {
    let interp = with_modules(&[
        (
            "a.js",
            "
            import { b } from './b';
            export const a = 'A';
            export function readB() { return b }
            ",
        ),
        (
            "b.js",
            "
            import * as modA from './a';
            export const b = 'B';
            export function readA() { return modA.a }
            ",
        ),
    ]);
    let source = "
        import { readB } from './a';
        import { readA } from './b';
        readB() + ':' + readA()
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::from("B:A"));
}

#[test]
fn test_re_exports() {
    let interp = with_modules(&[
        ("lib/strings.js", "export const upper = s => s.toUpperCase(); export default 'ignored';"),
        ("lib/numbers.js", "export const double = n => n * 2;"),
        (
            "lib/index.js",
            "
            export * from './strings';
            export { double as twice } from './numbers';
            ",
        ),
    ]);
    let source = "
        import * as lib from './lib';
        [lib.upper('a'), lib.twice(4), lib.default].join('|')
    ";
    assert_eq!(block_on(interp.execute(source)).unwrap(), Value::from("A|8|"));
}

#[test]
fn test_missing_module_is_module_error() {
    let interp = with_modules(&[]);
    let err = block_on(interp.execute("import { x } from './nowhere';")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModuleError);
    assert!(err.to_string().contains("nowhere"), "{}", err);
}

#[test]
fn test_missing_export_is_module_error() {
    let interp = with_modules(&[("m.js", "export const present = 1;")]);
    let err = block_on(interp.execute("import { absent } from './m';")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModuleError);
}

#[test]
fn test_import_without_resolver() {
    let err = block_on(Interpreter::new().execute("import x from './x';")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModuleError);
}

#[test]
fn test_failed_module_is_not_cached() {
    let interp = with_modules(&[("broken.js", "export const ok = 1; throw new Error('init failed');")]);
    assert!(block_on(interp.execute("import { ok } from './broken';")).is_err());
    assert_eq!(interp.loaded_module_count(), 0);
}

#[test]
fn test_host_import_module() {
    let interp = with_modules(&[("greeting.js", "export const hello = name => 'hello ' + name;")]);
    let exports = block_on(interp.import_module("greeting.js")).unwrap();
    let Value::Object(exports) = exports else {
        panic!("exports should be an object");
    };
    let hello = exports.borrow().get_own("hello").unwrap();
    let result = block_on(interp.call(&hello, Value::Undefined, vec![Value::from("you")])).unwrap();
    assert_eq!(result, Value::from("hello you"));
}

#[test]
fn test_program_exports_are_recorded() {
    let interp = Interpreter::new();
    block_on(interp.execute("export const version = 2; const hidden = 1; export { hidden as alias };")).unwrap();
    let exports = interp.exports();
    assert_eq!(exports.get("version"), Some(&Value::Number(2.0)));
    assert_eq!(exports.get("alias"), Some(&Value::Number(1.0)));
    assert!(!exports.contains_key("hidden"));
}
