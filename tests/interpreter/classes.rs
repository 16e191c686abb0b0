//! Classes: construction, methods, accessors, statics, inheritance, super

use super::{eval, eval_err};
use sandrun::{ErrorKind, Value};

#[test]
fn test_constructor_and_methods() {
    let source = "
        class Point {
            constructor(x, y) {
                this.x = x;
                this.y = y;
            }
            sum() { return this.x + this.y }
        }
        const p = new Point(2, 3);
        p.sum()
    ";
    assert_eq!(eval(source), Value::Number(5.0));
}

#[test]
fn test_fields_initialize_per_instance() {
    let source = "
        class Bag {
            items = [];
            label = 'bag';
            add(x) { this.items.push(x); return this }
        }
        const a = new Bag();
        const b = new Bag();
        a.add(1).add(2);
        a.items.length * 10 + b.items.length
    ";
    assert_eq!(eval(source), Value::Number(20.0));
}

#[test]
fn test_getters_and_setters() {
    let source = "
        class Temperature {
            constructor() { this.celsius = 0 }
            get fahrenheit() { return this.celsius * 9 / 5 + 32 }
            set fahrenheit(f) { this.celsius = (f - 32) * 5 / 9 }
        }
        const t = new Temperature();
        t.fahrenheit = 212;
        t.celsius + ':' + t.fahrenheit
    ";
    assert_eq!(eval(source), Value::from("100:212"));
}

#[test]
fn test_getter_without_setter_rejects_assignment() {
    let source = "
        class Fixed { get value() { return 1 } }
        const f = new Fixed();
        f.value = 2;
    ";
    assert_eq!(eval_err(source).kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_static_members() {
    let source = "
        class Registry {
            static count = 0;
            static register() { Registry.count += 1; return Registry.count }
        }
        Registry.register();
        Registry.register()
    ";
    assert_eq!(eval(source), Value::Number(2.0));
}

#[test]
fn test_inheritance_and_instanceof() {
    let source = "
        class Animal {
            constructor(name) { this.name = name }
            speak() { return this.name + ' makes a sound' }
            kind() { return 'animal' }
        }
        class Dog extends Animal {
            speak() { return this.name + ' barks' }
        }
        const d = new Dog('Rex');
        [d.speak(), d.kind(), d instanceof Dog, d instanceof Animal].join('|')
    ";
    assert_eq!(eval(source), Value::from("Rex barks|animal|true|true"));
}

#[test]
fn test_super_constructor_merges_parent_state() {
    let source = "
        class Base {
            constructor(id) { this.id = id; this.createdBy = 'base' }
        }
        class Child extends Base {
            extra = 'field';
            constructor(id, tag) {
                super(id);
                this.tag = tag;
            }
        }
        const c = new Child(7, 'x');
        JSON.stringify(c)
    ";
    assert_eq!(eval(source), Value::from(r#"{"id":7,"createdBy":"base","extra":"field","tag":"x"}"#));
}

#[test]
fn test_super_method_call() {
    let source = "
        class Shape {
            describe() { return 'shape' }
        }
        class Square extends Shape {
            describe() { return super.describe() + ':square' }
        }
        class Tile extends Square {
            describe() { return super.describe() + ':tile' }
        }
        new Tile().describe()
    ";
    assert_eq!(eval(source), Value::from("shape:square:tile"));
}

#[test]
fn test_derived_without_super_call_fails() {
    let source = "
        class A {}
        class B extends A { constructor() { this.x = 1 } }
        new B()
    ";
    assert_eq!(eval_err(source).kind(), ErrorKind::RuntimeError);
}

#[test]
fn test_class_called_without_new() {
    assert_eq!(eval_err("class A {} A()").kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_extending_error() {
    let source = "
        class ValidationError extends Error {
            constructor(field) {
                super('invalid ' + field);
                this.field = field;
            }
        }
        let out;
        try {
            throw new ValidationError('email');
        } catch (e) {
            out = [e.message, e.field, e instanceof ValidationError, e instanceof Error].join('|');
        }
        out
    ";
    assert_eq!(eval(source), Value::from("invalid email|email|true|true"));
}

#[test]
fn test_builtin_error_subclasses() {
    assert_eq!(eval("new TypeError('t') instanceof Error"), Value::Boolean(true));
    assert_eq!(eval("new RangeError('r').name"), Value::from("RangeError"));
    assert_eq!(eval("String(new Error('plain'))"), Value::from("Error: plain"));
}

#[test]
fn test_extending_map_is_rejected() {
    assert_eq!(eval_err("class M extends Map {}").kind(), ErrorKind::TypeMismatchError);
}

#[test]
fn test_class_expression_name_inference() {
    assert_eq!(eval("const Thing = class {}; Thing.name"), Value::from("Thing"));
}
