//! Integration tests for the interpreter, organized by feature
//!
//! Every test drives the public API. Plain evaluation needs no runtime and
//! is driven with `futures::executor::block_on`; tests that pause or yield
//! run under `#[tokio::test]`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

mod basics;
mod builtins;
mod classes;
mod control_flow;
mod errors;
mod functions;
mod modules;
mod pause;
mod scoping;
mod snapshot;
mod sync_mode;

use futures::executor::block_on;
use sandrun::{Interpreter, ScriptError, Value};

/// Run `source` in a fresh interpreter and return its completion value
pub fn eval(source: &str) -> Value {
    eval_result(source).expect("eval failed")
}

pub fn eval_result(source: &str) -> Result<Value, ScriptError> {
    let interp = Interpreter::new();
    block_on(interp.execute(source))
}

/// Run `source` and return the error it fails with
pub fn eval_err(source: &str) -> ScriptError {
    match eval_result(source) {
        Ok(value) => panic!("expected an error, got {:?}", value),
        Err(err) => err,
    }
}

/// Completion value rendered the way the host would display it
pub fn eval_display(source: &str) -> String {
    eval(source).to_display_string()
}

pub fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        other => panic!("expected a number, got {:?}", other),
    }
}
