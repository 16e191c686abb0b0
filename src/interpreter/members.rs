//! Property access and the method catalogs of built-in value types
//!
//! Strings, arrays, maps, sets, dates, regular expressions and numbers have
//! no prototype objects. Reading a method name off such a value looks the
//! name up in a fixed catalog and returns a native function bound to the
//! receiver. Array and collection methods that take callbacks are evaluated
//! by the async evaluator when called directly, so their callbacks may use
//! the full language.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::context::ContextId;
use crate::error::ScriptError;
use crate::interpreter::{EvalResult, Interpreter, Signal};
use crate::value::{
    ArrayRef, CheapClone, Function, JsString, MapRef, NativeReturn, RegExpValue, SetRef, Value,
    number_to_string,
};
use std::rc::Rc;

type Method<R> = fn(&Interpreter, &R, &[Value]) -> Result<Value, ScriptError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Generic helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Canonical array index (`"3"` but not `"03"` or `"+3"`)
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let index = key.parse::<usize>().ok()?;
    (index.to_string() == key).then_some(index)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// ToIntegerOrInfinity, clamped to i64, with a default for missing arguments
fn integer_arg(args: &[Value], index: usize, default: i64) -> i64 {
    match args.get(index) {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() {
                0
            } else {
                n.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64
            }
        }
    }
}

/// Resolve a possibly negative position against `len`
fn relative_index(n: i64, len: usize) -> usize {
    let len = len as i64;
    let resolved = if n < 0 { (len + n).max(0) } else { n.min(len) };
    resolved as usize
}

fn collect_chars(chars: &[char], start: usize, end: usize) -> String {
    chars
        .get(start..end.max(start))
        .map(|slice| slice.iter().collect())
        .unwrap_or_default()
}

fn find_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    hay.windows(needle.len())
        .enumerate()
        .skip(from)
        .find(|(_, window)| *window == needle)
        .map(|(i, _)| i)
}

fn rfind_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    hay.windows(needle.len())
        .enumerate()
        .rev()
        .find(|(i, window)| *i <= from && *window == needle)
        .map(|(i, _)| i)
}

fn not_a_function(value: &Value) -> ScriptError {
    ScriptError::type_mismatch(format!("{} is not a function", value.to_display_string()))
}

fn find_method<R>(table: &'static [(&'static str, Method<R>)], key: &str) -> Option<(&'static str, Method<R>)> {
    table.iter().find(|(name, _)| *name == key).copied()
}

/// Native function with `receiver` baked in
fn bind_method<R: Clone + 'static>(name: &'static str, receiver: R, method: Method<R>) -> Value {
    Value::native(name, move |interp, _this, args| {
        method(interp, &receiver, &args).map(NativeReturn::Ready)
    })
}

/// Values produced by iterating `value` (`for...of`, spread, array patterns)
pub(crate) fn iterable_values(value: &Value, what: &str) -> Result<Vec<Value>, ScriptError> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::String(s) => Ok(s
            .as_str()
            .chars()
            .map(|c| Value::string(c.to_string()))
            .collect()),
        Value::Map(entries) => Ok(entries
            .borrow()
            .iter()
            .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
            .collect()),
        Value::Set(values) => Ok(values.borrow().clone()),
        other => Err(ScriptError::type_mismatch(format!(
            "{} is not iterable (found {})",
            what,
            other.type_of()
        ))),
    }
}

/// Keys visited by `for...in`
pub(crate) fn for_in_keys(value: &Value) -> Vec<JsString> {
    match value {
        Value::Object(obj) => obj.borrow().properties.keys().cloned().collect(),
        Value::Array(items) => (0..items.borrow().len())
            .map(|i| JsString::from(i.to_string()))
            .collect(),
        Value::String(s) => (0..s.as_str().chars().count())
            .map(|i| JsString::from(i.to_string()))
            .collect(),
        Value::Class(class) => class.statics.borrow().keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// The `in` operator
pub(crate) fn has_property(object: &Value, key: &JsString) -> Result<bool, ScriptError> {
    Ok(match object {
        Value::Object(obj) => {
            let obj = obj.borrow();
            obj.properties.contains_key(key.as_str())
                || obj.hidden.contains_key(key.as_str())
                || obj.class.as_ref().is_some_and(|class| {
                    class.find_getter(key.as_str()).is_some()
                        || class.find_method(key.as_str()).is_some()
                })
        }
        Value::Array(items) => {
            key.as_str() == "length"
                || array_index(key.as_str()).is_some_and(|i| i < items.borrow().len())
        }
        Value::Class(class) => class.find_static(key.as_str()).is_some(),
        Value::Map(_) | Value::Set(_) => key.as_str() == "size",
        Value::Function(_) | Value::Date(_) | Value::RegExp(_) => false,
        other => {
            return Err(ScriptError::type_mismatch(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key,
                other.to_display_string()
            )));
        }
    })
}

/// The `delete` operator
pub(crate) fn delete_property(object: &Value, key: &JsString) -> Result<bool, ScriptError> {
    match object {
        Value::Object(obj) => {
            obj.borrow_mut().properties.shift_remove(key.as_str());
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if let Some(slot) = array_index(key.as_str()).and_then(|i| items.get_mut(i)) {
                *slot = Value::Undefined;
            }
        }
        Value::Class(class) => {
            class.statics.borrow_mut().shift_remove(key.as_str());
        }
        Value::Null | Value::Undefined => {
            return Err(ScriptError::type_mismatch(format!(
                "Cannot delete property '{}' of {}",
                key,
                object.type_of()
            )));
        }
        _ => {}
    }
    Ok(true)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Property reads and writes
// ═══════════════════════════════════════════════════════════════════════════════

impl Interpreter {
    /// Read `object[key]` for a non-nullish receiver
    pub(crate) fn get_member(&self, object: &Value, key: &JsString) -> Result<Value, ScriptError> {
        let name = key.as_str();
        Ok(match object {
            Value::Object(obj) => {
                let (own, class) = {
                    let obj = obj.borrow();
                    (obj.get_own(name), obj.class.clone())
                };
                if let Some(value) = own {
                    return Ok(value);
                }
                let Some(class) = class else {
                    return Ok(Value::Undefined);
                };
                if let Some(getter) = class.find_getter(name) {
                    return self.call_accessor(&getter, object.clone(), Vec::new());
                }
                class.find_method(name).unwrap_or_default()
            }

            Value::Array(items) => {
                if name == "length" {
                    return Ok(Value::Number(items.borrow().len() as f64));
                }
                if let Some(index) = array_index(name) {
                    return Ok(items.borrow().get(index).cloned().unwrap_or_default());
                }
                if let Some(method) = ARRAY_ITERATION_METHODS.iter().find(|m| **m == name) {
                    return Ok(self.bind_iteration_method(method, object.clone()));
                }
                find_method(ARRAY_METHODS, name)
                    .map(|(name, method)| bind_method(name, items.cheap_clone(), method))
                    .unwrap_or_default()
            }

            Value::String(s) => {
                if name == "length" {
                    return Ok(Value::Number(s.as_str().chars().count() as f64));
                }
                if let Some(index) = array_index(name) {
                    return Ok(s
                        .as_str()
                        .chars()
                        .nth(index)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or_default());
                }
                find_method(STRING_METHODS, name)
                    .map(|(name, method)| bind_method(name, s.cheap_clone(), method))
                    .unwrap_or_default()
            }

            Value::Map(entries) => {
                if name == "size" {
                    return Ok(Value::Number(entries.borrow().len() as f64));
                }
                if name == "forEach" {
                    return Ok(self.bind_iteration_method("forEach", object.clone()));
                }
                find_method(MAP_METHODS, name)
                    .map(|(name, method)| bind_method(name, entries.cheap_clone(), method))
                    .unwrap_or_default()
            }

            Value::Set(values) => {
                if name == "size" {
                    return Ok(Value::Number(values.borrow().len() as f64));
                }
                if name == "forEach" {
                    return Ok(self.bind_iteration_method("forEach", object.clone()));
                }
                find_method(SET_METHODS, name)
                    .map(|(name, method)| bind_method(name, values.cheap_clone(), method))
                    .unwrap_or_default()
            }

            Value::Date(time) => find_method(DATE_METHODS, name)
                .map(|(name, method)| bind_method(name, *time, method))
                .unwrap_or_default(),

            Value::RegExp(re) => match name {
                "source" => Value::string(re.source.as_str()),
                "flags" => Value::string(re.flags.as_str()),
                "global" => Value::Boolean(re.is_global()),
                _ => find_method(REGEXP_METHODS, name)
                    .map(|(name, method)| bind_method(name, re.cheap_clone(), method))
                    .unwrap_or_default(),
            },

            Value::Class(class) => match class.find_static(name) {
                Some(value) => value,
                None if name == "name" => Value::String(class.name.clone()),
                None => Value::Undefined,
            },

            Value::Function(func) => match name {
                "name" => Value::string(func.name()),
                "length" => match func.as_ref() {
                    Function::Closure(closure) => Value::Number(closure.node.params.len() as f64),
                    _ => Value::Number(0.0),
                },
                _ => Value::Undefined,
            },

            Value::Number(n) => find_method(NUMBER_METHODS, name)
                .map(|(name, method)| bind_method(name, *n, method))
                .unwrap_or_default(),

            Value::Boolean(b) => match name {
                "toString" => {
                    let text = b.to_string();
                    Value::native("toString", move |_, _, _| Ok(Value::string(text.as_str()).into()))
                }
                _ => Value::Undefined,
            },

            Value::Null | Value::Undefined => {
                return Err(ScriptError::type_mismatch(format!(
                    "Cannot read properties of {} (reading '{}')",
                    object.type_of(),
                    key
                )));
            }
        })
    }

    /// Write `object[key] = value`
    pub(crate) fn set_member(&self, object: &Value, key: JsString, value: Value) -> Result<(), ScriptError> {
        match object {
            Value::Object(obj) => {
                let class = obj.borrow().class.clone();
                if let Some(class) = class {
                    if let Some(setter) = class.find_setter(key.as_str()) {
                        self.call_accessor(&setter, object.clone(), vec![value])?;
                        return Ok(());
                    }
                    if class.find_getter(key.as_str()).is_some() {
                        return Err(ScriptError::type_mismatch(format!(
                            "Cannot set property {} of {} which has only a getter",
                            key, class.name
                        )));
                    }
                }
                obj.borrow_mut().properties.insert(key, value);
                Ok(())
            }

            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if key.as_str() == "length" {
                    let len = value.to_number();
                    if !(len >= 0.0 && len.fract() == 0.0 && len <= MAX_ARRAY_GROWTH as f64) {
                        return Err(ScriptError::runtime("Invalid array length"));
                    }
                    items.resize(len as usize, Value::Undefined);
                    return Ok(());
                }
                let Some(index) = array_index(key.as_str()) else {
                    return Err(ScriptError::type_mismatch(format!(
                        "Cannot set property '{}' on an array",
                        key
                    )));
                };
                if index >= items.len() {
                    if index - items.len() > MAX_ARRAY_GROWTH {
                        return Err(ScriptError::runtime("Invalid array length"));
                    }
                    items.resize(index + 1, Value::Undefined);
                }
                if let Some(slot) = items.get_mut(index) {
                    *slot = value;
                }
                Ok(())
            }

            Value::Class(class) => {
                class.statics.borrow_mut().insert(key, value);
                Ok(())
            }

            Value::Null | Value::Undefined => Err(ScriptError::type_mismatch(format!(
                "Cannot set properties of {} (setting '{}')",
                object.type_of(),
                key
            ))),

            other => Err(ScriptError::type_mismatch(format!(
                "Cannot create property '{}' on {} '{}'",
                key,
                other.type_of(),
                other.to_display_string()
            ))),
        }
    }

    /// A host-injected native of the same name shadows a string/array method.
    /// It receives the receiver as its first argument.
    pub(crate) fn method_override(&self, receiver: &Value, key: &JsString, ctx: ContextId) -> Option<Value> {
        let candidate = self.contexts.borrow().lookup_function(ctx, key.as_str())?;
        let Value::Function(func) = &candidate else {
            return None;
        };
        let Function::Native(native) = func.as_ref() else {
            return None;
        };
        let native = native.clone();
        let receiver = receiver.clone();
        Some(Value::native(key.as_str(), move |interp, _this, args| {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(receiver.clone());
            full.extend(args);
            (native.func)(interp, Value::Undefined, full)
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Callback-taking methods
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bound form used when the method is read as a value rather than called
    fn bind_iteration_method(&self, name: &'static str, receiver: Value) -> Value {
        Value::native(name, move |interp, _this, args| {
            interp
                .call_iteration_method(&receiver, name, args)
                .map_err(Signal::into_error)
                .map(NativeReturn::Ready)
        })
    }

    /// Evaluate a callback-taking collection method. Callbacks go through
    /// [`Interpreter::call_sync`], so they cannot pause or await pending work.
    pub(crate) fn call_iteration_method(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> EvalResult {
        let callback = arg(&args, 0);
        match receiver {
            Value::Array(items) => self.array_iteration(items, receiver, name, &args),
            Value::Map(entries) => {
                if !callback.is_callable() {
                    return Err(not_a_function(&callback).into());
                }
                let snapshot = entries.borrow().clone();
                for (key, value) in snapshot {
                    self.call_sync(&callback, Value::Undefined, vec![value, key, receiver.clone()])?;
                }
                Ok(Value::Undefined)
            }
            Value::Set(values) => {
                if !callback.is_callable() {
                    return Err(not_a_function(&callback).into());
                }
                let snapshot = values.borrow().clone();
                for value in snapshot {
                    self.call_sync(
                        &callback,
                        Value::Undefined,
                        vec![value.clone(), value, receiver.clone()],
                    )?;
                }
                Ok(Value::Undefined)
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn array_iteration(
        &self,
        items: &ArrayRef,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> EvalResult {
        let callback = arg(args, 0);
        if name == "sort" {
            let comparator = match callback {
                Value::Undefined => None,
                ref f if f.is_callable() => Some(callback.clone()),
                ref other => {
                    return Err(ScriptError::type_mismatch(format!(
                        "The comparison function must be either a function or undefined (found {})",
                        other.type_of()
                    ))
                    .into());
                }
            };
            let snapshot = items.borrow().clone();
            let sorted = self.sort_values(snapshot, comparator.as_ref())?;
            *items.borrow_mut() = sorted;
            return Ok(receiver.clone());
        }

        if !callback.is_callable() {
            return Err(not_a_function(&callback).into());
        }
        let snapshot = items.borrow().clone();
        let call = |item: &Value, index: usize| {
            self.call_sync(
                &callback,
                Value::Undefined,
                vec![item.clone(), Value::Number(index as f64), receiver.clone()],
            )
        };

        match name {
            "forEach" => {
                for (i, item) in snapshot.iter().enumerate() {
                    call(item, i)?;
                }
                Ok(Value::Undefined)
            }
            "map" => {
                let mut out = Vec::with_capacity(snapshot.len());
                for (i, item) in snapshot.iter().enumerate() {
                    out.push(call(item, i)?);
                }
                Ok(Value::array(out))
            }
            "filter" => {
                let mut out = Vec::new();
                for (i, item) in snapshot.iter().enumerate() {
                    if call(item, i)?.to_boolean() {
                        out.push(item.clone());
                    }
                }
                Ok(Value::array(out))
            }
            "find" | "findIndex" => {
                for (i, item) in snapshot.iter().enumerate() {
                    if call(item, i)?.to_boolean() {
                        return Ok(if name == "find" {
                            item.clone()
                        } else {
                            Value::Number(i as f64)
                        });
                    }
                }
                Ok(if name == "find" {
                    Value::Undefined
                } else {
                    Value::Number(-1.0)
                })
            }
            "some" => {
                for (i, item) in snapshot.iter().enumerate() {
                    if call(item, i)?.to_boolean() {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }
            "every" => {
                for (i, item) in snapshot.iter().enumerate() {
                    if !call(item, i)?.to_boolean() {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }
            "reduce" => {
                let mut iter = snapshot.iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match iter.next() {
                        Some((_, first)) => first.clone(),
                        None => {
                            return Err(ScriptError::type_mismatch(
                                "Reduce of empty array with no initial value",
                            )
                            .into());
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.call_sync(
                        &callback,
                        Value::Undefined,
                        vec![acc, item.clone(), Value::Number(i as f64), receiver.clone()],
                    )?;
                }
                Ok(acc)
            }
            "flatMap" => {
                let mut out = Vec::new();
                for (i, item) in snapshot.iter().enumerate() {
                    match call(item, i)? {
                        Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                        other => out.push(other),
                    }
                }
                Ok(Value::array(out))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Stable bottom-up merge sort with a possibly script-defined comparator.
    /// Inconsistent comparators give an unspecified order, never a failure.
    fn sort_values(&self, mut items: Vec<Value>, comparator: Option<&Value>) -> EvalResult<Vec<Value>> {
        let len = items.len();
        let mut width = 1;
        while width < len {
            let mut merged = Vec::with_capacity(len);
            for chunk in items.chunks(width * 2) {
                let (left, right) = chunk.split_at(width.min(chunk.len()));
                let (mut i, mut j) = (0, 0);
                while let (Some(a), Some(b)) = (left.get(i), right.get(j)) {
                    if self.sort_compare(b, a, comparator)? < 0.0 {
                        merged.push(b.clone());
                        j += 1;
                    } else {
                        merged.push(a.clone());
                        i += 1;
                    }
                }
                merged.extend(left.iter().skip(i).cloned());
                merged.extend(right.iter().skip(j).cloned());
            }
            items = merged;
            width *= 2;
        }
        Ok(items)
    }

    fn sort_compare(&self, a: &Value, b: &Value, comparator: Option<&Value>) -> EvalResult<f64> {
        // undefined sorts last without consulting the comparator
        match (a, b) {
            (Value::Undefined, Value::Undefined) => return Ok(0.0),
            (Value::Undefined, _) => return Ok(1.0),
            (_, Value::Undefined) => return Ok(-1.0),
            _ => {}
        }
        match comparator {
            Some(cmp) => {
                let result = self
                    .call_sync(cmp, Value::Undefined, vec![a.clone(), b.clone()])?
                    .to_number();
                Ok(if result.is_nan() { 0.0 } else { result })
            }
            None => Ok(match a.to_js_string().as_str().cmp(b.to_js_string().as_str()) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            }),
        }
    }
}

/// Callback-taking array methods
pub(crate) const ARRAY_ITERATION_METHODS: &[&str] = &[
    "forEach", "map", "filter", "find", "findIndex", "some", "every", "reduce", "flatMap", "sort",
];

/// Whether calling `key` on `receiver` goes through [`Interpreter::call_iteration_method`]
pub(crate) fn is_iteration_method(receiver: &Value, key: &str) -> bool {
    match receiver {
        Value::Array(_) => ARRAY_ITERATION_METHODS.contains(&key),
        Value::Map(_) | Value::Set(_) => key == "forEach",
        _ => false,
    }
}

/// Upper bound on how far a single write may grow an array
const MAX_ARRAY_GROWTH: usize = 10_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// String methods
// ═══════════════════════════════════════════════════════════════════════════════

const STRING_METHODS: &[(&str, Method<JsString>)] = &[
    ("charAt", string_char_at),
    ("charCodeAt", string_char_code_at),
    ("at", string_at),
    ("indexOf", string_index_of),
    ("lastIndexOf", string_last_index_of),
    ("includes", string_includes),
    ("startsWith", string_starts_with),
    ("endsWith", string_ends_with),
    ("slice", string_slice),
    ("substring", string_substring),
    ("toUpperCase", string_to_upper_case),
    ("toLowerCase", string_to_lower_case),
    ("trim", string_trim),
    ("trimStart", string_trim_start),
    ("trimEnd", string_trim_end),
    ("split", string_split),
    ("replace", string_replace),
    ("replaceAll", string_replace_all),
    ("repeat", string_repeat),
    ("padStart", string_pad_start),
    ("padEnd", string_pad_end),
    ("concat", string_concat),
    ("match", string_match),
    ("toString", string_to_string),
];

fn chars_of(s: &JsString) -> Vec<char> {
    s.as_str().chars().collect()
}

fn string_char_at(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let index = integer_arg(args, 0, 0);
    if index < 0 {
        return Ok(Value::string(""));
    }
    Ok(Value::string(
        s.as_str()
            .chars()
            .nth(index as usize)
            .map(|c| c.to_string())
            .unwrap_or_default(),
    ))
}

fn string_char_code_at(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let index = integer_arg(args, 0, 0);
    if index < 0 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(
        s.as_str()
            .chars()
            .nth(index as usize)
            .map_or(f64::NAN, |c| f64::from(u32::from(c))),
    ))
}

fn string_at(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let chars = chars_of(s);
    let index = integer_arg(args, 0, 0);
    let resolved = if index < 0 { chars.len() as i64 + index } else { index };
    if resolved < 0 {
        return Ok(Value::Undefined);
    }
    Ok(chars
        .get(resolved as usize)
        .map(|c| Value::string(c.to_string()))
        .unwrap_or_default())
}

fn string_index_of(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let hay = chars_of(s);
    let needle = chars_of(&arg(args, 0).to_js_string());
    let from = relative_index(integer_arg(args, 1, 0).max(0), hay.len());
    Ok(Value::Number(
        find_chars(&hay, &needle, from).map_or(-1.0, |i| i as f64),
    ))
}

fn string_last_index_of(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let hay = chars_of(s);
    let needle = chars_of(&arg(args, 0).to_js_string());
    let from = relative_index(integer_arg(args, 1, i64::MAX).max(0), hay.len());
    Ok(Value::Number(
        rfind_chars(&hay, &needle, from).map_or(-1.0, |i| i as f64),
    ))
}

fn string_includes(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg(args, 0).to_js_string();
    Ok(Value::Boolean(s.as_str().contains(needle.as_str())))
}

fn string_starts_with(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg(args, 0).to_js_string();
    Ok(Value::Boolean(s.as_str().starts_with(needle.as_str())))
}

fn string_ends_with(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg(args, 0).to_js_string();
    Ok(Value::Boolean(s.as_str().ends_with(needle.as_str())))
}

fn string_slice(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let chars = chars_of(s);
    let len = chars.len();
    let start = relative_index(integer_arg(args, 0, 0), len);
    let end = relative_index(integer_arg(args, 1, len as i64), len);
    Ok(Value::string(collect_chars(&chars, start, end)))
}

fn string_substring(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let chars = chars_of(s);
    let len = chars.len();
    let clamp = |n: i64| relative_index(n.max(0), len);
    let start = clamp(integer_arg(args, 0, 0));
    let end = clamp(integer_arg(args, 1, len as i64));
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Ok(Value::string(collect_chars(&chars, start, end)))
}

fn string_to_upper_case(_: &Interpreter, s: &JsString, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(s.as_str().to_uppercase()))
}

fn string_to_lower_case(_: &Interpreter, s: &JsString, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(s.as_str().to_lowercase()))
}

fn string_trim(_: &Interpreter, s: &JsString, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(s.as_str().trim()))
}

fn string_trim_start(_: &Interpreter, s: &JsString, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(s.as_str().trim_start()))
}

fn string_trim_end(_: &Interpreter, s: &JsString, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(s.as_str().trim_end()))
}

fn string_split(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let limit = match args.get(1) {
        None | Some(Value::Undefined) => usize::MAX,
        Some(v) => to_length(v.to_number()),
    };
    let parts: Vec<Value> = match arg(args, 0) {
        Value::Undefined => vec![Value::String(s.clone())],
        Value::RegExp(re) => regex_split(&re, s.as_str())?
            .into_iter()
            .map(Value::string)
            .collect(),
        sep => {
            let sep = sep.to_js_string();
            if sep.is_empty() {
                s.as_str().chars().map(|c| Value::string(c.to_string())).collect()
            } else {
                s.as_str().split(sep.as_str()).map(Value::string).collect()
            }
        }
    };
    Ok(Value::array(parts.into_iter().take(limit).collect()))
}

fn to_length(n: f64) -> usize {
    if n.is_nan() || n <= 0.0 {
        0
    } else {
        n.min(usize::MAX as f64) as usize
    }
}

fn string_replace(interp: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let replacement = arg(args, 1);
    match arg(args, 0) {
        Value::RegExp(re) => {
            let global = re.is_global();
            Ok(Value::string(regex_replace(interp, &re, s.as_str(), &replacement, global)?))
        }
        pattern => {
            let pattern = pattern.to_js_string();
            Ok(Value::string(literal_replace(
                interp,
                s.as_str(),
                pattern.as_str(),
                &replacement,
                false,
            )?))
        }
    }
}

fn string_replace_all(interp: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let replacement = arg(args, 1);
    match arg(args, 0) {
        Value::RegExp(re) => {
            if !re.is_global() {
                return Err(ScriptError::type_mismatch(
                    "replaceAll must be called with a global RegExp",
                ));
            }
            Ok(Value::string(regex_replace(interp, &re, s.as_str(), &replacement, true)?))
        }
        pattern => {
            let pattern = pattern.to_js_string();
            Ok(Value::string(literal_replace(
                interp,
                s.as_str(),
                pattern.as_str(),
                &replacement,
                true,
            )?))
        }
    }
}

/// Compute one replacement: call the function or expand `$` patterns
fn replacement_text(
    interp: &Interpreter,
    replacement: &Value,
    matched: &str,
    groups: &[Option<String>],
    offset: usize,
    input: &str,
) -> Result<String, ScriptError> {
    if replacement.is_callable() {
        let mut call_args = vec![Value::string(matched)];
        call_args.extend(
            groups
                .iter()
                .map(|g| g.as_deref().map(Value::string).unwrap_or_default()),
        );
        call_args.push(Value::Number(offset as f64));
        call_args.push(Value::string(input));
        return Ok(interp
            .call_sync(replacement, Value::Undefined, call_args)?
            .to_js_string()
            .to_string());
    }
    let template = replacement.to_js_string();
    let byte_offset = input
        .char_indices()
        .nth(offset)
        .map_or(input.len(), |(i, _)| i);
    let before = input.get(..byte_offset).unwrap_or_default();
    let after = input.get(byte_offset + matched.len()..).unwrap_or_default();
    Ok(expand_replacement(template.as_str(), matched, before, after, groups))
}

fn literal_replace(
    interp: &Interpreter,
    input: &str,
    pattern: &str,
    replacement: &Value,
    all: bool,
) -> Result<String, ScriptError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for (start, matched) in input.match_indices(pattern) {
        out.push_str(input.get(last..start).unwrap_or_default());
        let offset = input.get(..start).map_or(0, |p| p.chars().count());
        out.push_str(&replacement_text(interp, replacement, matched, &[], offset, input)?);
        last = start + matched.len();
        if !all {
            break;
        }
    }
    out.push_str(input.get(last..).unwrap_or_default());
    Ok(out)
}

/// Expand `$$`, `$&`, `` $` ``, `$'` and `$n` in a replacement template
fn expand_replacement(
    template: &str,
    matched: &str,
    before: &str,
    after: &str,
    groups: &[Option<String>],
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(matched);
            }
            Some('`') => {
                chars.next();
                out.push_str(before);
            }
            Some('\'') => {
                chars.next();
                out.push_str(after);
            }
            Some(d) if d.is_ascii_digit() && d != '0' => {
                chars.next();
                let mut group = d.to_digit(10).unwrap_or(0) as usize;
                // Two-digit references only when that group exists
                if let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                    let two = group * 10 + next as usize;
                    if two <= groups.len() {
                        chars.next();
                        group = two;
                    }
                }
                match groups.get(group - 1) {
                    Some(Some(text)) => out.push_str(text),
                    Some(None) => {}
                    None => {
                        out.push('$');
                        out.push_str(&group.to_string());
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

fn string_repeat(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let count = arg(args, 0).to_number();
    if count < 0.0 || count.is_infinite() {
        return Err(ScriptError::runtime(format!(
            "Invalid count value: {}",
            number_to_string(count)
        )));
    }
    let count = if count.is_nan() { 0 } else { count as usize };
    if s.len().saturating_mul(count) > MAX_ARRAY_GROWTH * 10 {
        return Err(ScriptError::runtime("Invalid string length"));
    }
    Ok(Value::string(s.as_str().repeat(count)))
}

fn pad(s: &JsString, args: &[Value], at_start: bool) -> Value {
    let target = to_length(arg(args, 0).to_number());
    let fill = match args.get(1) {
        None | Some(Value::Undefined) => " ".to_string(),
        Some(v) => v.to_js_string().to_string(),
    };
    let len = s.as_str().chars().count();
    if target <= len || fill.is_empty() || target > MAX_ARRAY_GROWTH {
        return Value::String(s.clone());
    }
    let padding: String = fill.chars().cycle().take(target - len).collect();
    if at_start {
        Value::string(format!("{}{}", padding, s))
    } else {
        Value::string(format!("{}{}", s, padding))
    }
}

fn string_pad_start(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(pad(s, args, true))
}

fn string_pad_end(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(pad(s, args, false))
}

fn string_concat(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let mut out = s.to_string();
    for value in args {
        out.push_str(value.to_js_string().as_str());
    }
    Ok(Value::string(out))
}

fn string_match(_: &Interpreter, s: &JsString, args: &[Value]) -> Result<Value, ScriptError> {
    let re = match arg(args, 0) {
        Value::RegExp(re) => re,
        other => Rc::new(RegExpValue::new(other.to_js_string().as_str(), "")?),
    };
    if re.is_global() {
        let matches = regex_matches(&re, s.as_str())?;
        if matches.is_empty() {
            return Ok(Value::Null);
        }
        return Ok(Value::array(matches.into_iter().map(Value::string).collect()));
    }
    regexp_exec_value(&re, s.as_str())
}

fn string_to_string(_: &Interpreter, s: &JsString, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(s.clone()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Regular expressions
// ═══════════════════════════════════════════════════════════════════════════════

const REGEXP_METHODS: &[(&str, Method<Rc<RegExpValue>>)] = &[
    ("test", regexp_test),
    ("exec", regexp_exec),
    ("toString", regexp_to_string),
];

fn regexp_test(_: &Interpreter, re: &Rc<RegExpValue>, args: &[Value]) -> Result<Value, ScriptError> {
    let input = arg(args, 0).to_js_string();
    Ok(Value::Boolean(regex_is_match(re, input.as_str())?))
}

fn regexp_exec(_: &Interpreter, re: &Rc<RegExpValue>, args: &[Value]) -> Result<Value, ScriptError> {
    let input = arg(args, 0).to_js_string();
    regexp_exec_value(re, input.as_str())
}

fn regexp_to_string(_: &Interpreter, re: &Rc<RegExpValue>, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::string(format!("/{}/{}", re.source, re.flags)))
}

/// `[match, ...groups]` for the first match, or `null`
fn regexp_exec_value(re: &RegExpValue, input: &str) -> Result<Value, ScriptError> {
    Ok(match regex_first_captures(re, input)? {
        Some(groups) => Value::array(
            groups
                .into_iter()
                .map(|g| g.map(Value::string).unwrap_or_default())
                .collect(),
        ),
        None => Value::Null,
    })
}

#[cfg(feature = "regex")]
fn regex_error(err: fancy_regex::Error) -> ScriptError {
    ScriptError::runtime(format!("Regular expression failed: {}", err))
}

#[cfg(feature = "regex")]
fn regex_is_match(re: &RegExpValue, input: &str) -> Result<bool, ScriptError> {
    re.regex.is_match(input).map_err(regex_error)
}

#[cfg(feature = "regex")]
fn regex_first_captures(re: &RegExpValue, input: &str) -> Result<Option<Vec<Option<String>>>, ScriptError> {
    let Some(caps) = re.regex.captures(input).map_err(regex_error)? else {
        return Ok(None);
    };
    Ok(Some(
        caps.iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect(),
    ))
}

#[cfg(feature = "regex")]
fn regex_matches(re: &RegExpValue, input: &str) -> Result<Vec<String>, ScriptError> {
    re.regex
        .find_iter(input)
        .map(|m| m.map(|m| m.as_str().to_string()).map_err(regex_error))
        .collect()
}

#[cfg(feature = "regex")]
fn regex_split(re: &RegExpValue, input: &str) -> Result<Vec<String>, ScriptError> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in re.regex.find_iter(input) {
        let m = m.map_err(regex_error)?;
        if m.start() == m.end() && (m.start() == 0 || m.start() == input.len()) {
            continue;
        }
        parts.push(input.get(last..m.start()).unwrap_or_default().to_string());
        last = m.end();
    }
    parts.push(input.get(last..).unwrap_or_default().to_string());
    Ok(parts)
}

#[cfg(feature = "regex")]
fn regex_replace(
    interp: &Interpreter,
    re: &RegExpValue,
    input: &str,
    replacement: &Value,
    all: bool,
) -> Result<String, ScriptError> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in re.regex.captures_iter(input) {
        let caps = caps.map_err(regex_error)?;
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(input.get(last..whole.start()).unwrap_or_default());
        let groups: Vec<Option<String>> = caps
            .iter()
            .skip(1)
            .map(|g| g.map(|g| g.as_str().to_string()))
            .collect();
        let offset = input.get(..whole.start()).map_or(0, |p| p.chars().count());
        out.push_str(&replacement_text(
            interp,
            replacement,
            whole.as_str(),
            &groups,
            offset,
            input,
        )?);
        last = whole.end();
        if !all {
            break;
        }
    }
    out.push_str(input.get(last..).unwrap_or_default());
    Ok(out)
}

#[cfg(not(feature = "regex"))]
fn regex_disabled() -> ScriptError {
    ScriptError::runtime("Regular expressions are not available in this build")
}

#[cfg(not(feature = "regex"))]
fn regex_is_match(_: &RegExpValue, _: &str) -> Result<bool, ScriptError> {
    Err(regex_disabled())
}

#[cfg(not(feature = "regex"))]
fn regex_first_captures(_: &RegExpValue, _: &str) -> Result<Option<Vec<Option<String>>>, ScriptError> {
    Err(regex_disabled())
}

#[cfg(not(feature = "regex"))]
fn regex_matches(_: &RegExpValue, _: &str) -> Result<Vec<String>, ScriptError> {
    Err(regex_disabled())
}

#[cfg(not(feature = "regex"))]
fn regex_split(_: &RegExpValue, _: &str) -> Result<Vec<String>, ScriptError> {
    Err(regex_disabled())
}

#[cfg(not(feature = "regex"))]
fn regex_replace(
    _: &Interpreter,
    _: &RegExpValue,
    _: &str,
    _: &Value,
    _: bool,
) -> Result<String, ScriptError> {
    Err(regex_disabled())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Array methods
// ═══════════════════════════════════════════════════════════════════════════════

const ARRAY_METHODS: &[(&str, Method<ArrayRef>)] = &[
    ("push", array_push),
    ("pop", array_pop),
    ("shift", array_shift),
    ("unshift", array_unshift),
    ("indexOf", array_index_of),
    ("lastIndexOf", array_last_index_of),
    ("includes", array_includes),
    ("join", array_join),
    ("slice", array_slice),
    ("splice", array_splice),
    ("concat", array_concat),
    ("reverse", array_reverse),
    ("at", array_at),
    ("fill", array_fill),
    ("flat", array_flat),
    ("toString", array_to_string),
];

fn array_push(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let mut items = items.borrow_mut();
    items.extend(args.iter().cloned());
    Ok(Value::Number(items.len() as f64))
}

fn array_pop(_: &Interpreter, items: &ArrayRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(items.borrow_mut().pop().unwrap_or_default())
}

fn array_shift(_: &Interpreter, items: &ArrayRef, _: &[Value]) -> Result<Value, ScriptError> {
    let mut items = items.borrow_mut();
    if items.is_empty() {
        return Ok(Value::Undefined);
    }
    Ok(items.remove(0))
}

fn array_unshift(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let mut items = items.borrow_mut();
    items.splice(0..0, args.iter().cloned());
    Ok(Value::Number(items.len() as f64))
}

fn array_index_of(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg(args, 0);
    let items = items.borrow();
    let from = relative_index(integer_arg(args, 1, 0), items.len());
    Ok(Value::Number(
        items
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, v)| v.strict_equals(&needle))
            .map_or(-1.0, |(i, _)| i as f64),
    ))
}

fn array_last_index_of(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg(args, 0);
    let items = items.borrow();
    Ok(Value::Number(
        items
            .iter()
            .rposition(|v| v.strict_equals(&needle))
            .map_or(-1.0, |i| i as f64),
    ))
}

fn array_includes(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let needle = arg(args, 0);
    Ok(Value::Boolean(
        items.borrow().iter().any(|v| v.same_value_zero(&needle)),
    ))
}

fn array_join(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let sep = match args.first() {
        None | Some(Value::Undefined) => JsString::from(","),
        Some(v) => v.to_js_string(),
    };
    let parts: Vec<String> = items
        .borrow()
        .iter()
        .map(|v| {
            if v.is_nullish() {
                String::new()
            } else {
                v.to_js_string().to_string()
            }
        })
        .collect();
    Ok(Value::string(parts.join(sep.as_str())))
}

fn array_slice(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let items = items.borrow();
    let len = items.len();
    let start = relative_index(integer_arg(args, 0, 0), len);
    let end = relative_index(integer_arg(args, 1, len as i64), len);
    Ok(Value::array(
        items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default(),
    ))
}

fn array_splice(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let mut items = items.borrow_mut();
    let len = items.len();
    let start = relative_index(integer_arg(args, 0, 0), len);
    let delete = match args.get(1) {
        None => len - start,
        Some(_) => (integer_arg(args, 1, 0).max(0) as usize).min(len - start),
    };
    let inserted = args.iter().skip(2).cloned();
    let removed: Vec<Value> = items.splice(start..start + delete, inserted).collect();
    Ok(Value::array(removed))
}

fn array_concat(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let mut out = items.borrow().clone();
    for value in args {
        match value {
            Value::Array(other) => out.extend(other.borrow().iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::array(out))
}

fn array_reverse(_: &Interpreter, items: &ArrayRef, _: &[Value]) -> Result<Value, ScriptError> {
    items.borrow_mut().reverse();
    Ok(Value::Array(items.cheap_clone()))
}

fn array_at(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let items = items.borrow();
    let index = integer_arg(args, 0, 0);
    let resolved = if index < 0 { items.len() as i64 + index } else { index };
    if resolved < 0 {
        return Ok(Value::Undefined);
    }
    Ok(items.get(resolved as usize).cloned().unwrap_or_default())
}

fn array_fill(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let value = arg(args, 0);
    {
        let mut list = items.borrow_mut();
        let len = list.len();
        let start = relative_index(integer_arg(args, 1, 0), len);
        let end = relative_index(integer_arg(args, 2, len as i64), len);
        for slot in list.iter_mut().take(end).skip(start) {
            *slot = value.clone();
        }
    }
    Ok(Value::Array(items.cheap_clone()))
}

fn flatten_into(out: &mut Vec<Value>, items: &[Value], depth: usize) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten_into(out, &inner.borrow(), depth - 1),
            other => out.push(other.clone()),
        }
    }
}

fn array_flat(_: &Interpreter, items: &ArrayRef, args: &[Value]) -> Result<Value, ScriptError> {
    let depth = integer_arg(args, 0, 1).clamp(0, 64) as usize;
    let mut out = Vec::new();
    flatten_into(&mut out, &items.borrow(), depth);
    Ok(Value::array(out))
}

fn array_to_string(_: &Interpreter, items: &ArrayRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::String(Value::Array(items.cheap_clone()).to_js_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Map and Set methods
// ═══════════════════════════════════════════════════════════════════════════════

const MAP_METHODS: &[(&str, Method<MapRef>)] = &[
    ("get", map_get),
    ("set", map_set),
    ("has", map_has),
    ("delete", map_delete),
    ("clear", map_clear),
    ("keys", map_keys),
    ("values", map_values),
    ("entries", map_entries),
];

fn map_position(entries: &[(Value, Value)], key: &Value) -> Option<usize> {
    entries.iter().position(|(k, _)| k.same_value_zero(key))
}

fn map_get(_: &Interpreter, entries: &MapRef, args: &[Value]) -> Result<Value, ScriptError> {
    let key = arg(args, 0);
    let entries = entries.borrow();
    Ok(entries
        .iter()
        .find(|(k, _)| k.same_value_zero(&key))
        .map(|(_, v)| v.clone())
        .unwrap_or_default())
}

fn map_set(_: &Interpreter, entries: &MapRef, args: &[Value]) -> Result<Value, ScriptError> {
    let key = arg(args, 0);
    let value = arg(args, 1);
    {
        let mut list = entries.borrow_mut();
        match map_position(&list, &key).and_then(|i| list.get_mut(i)) {
            Some(entry) => entry.1 = value,
            None => list.push((key, value)),
        }
    }
    Ok(Value::Map(entries.cheap_clone()))
}

fn map_has(_: &Interpreter, entries: &MapRef, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(
        map_position(&entries.borrow(), &arg(args, 0)).is_some(),
    ))
}

fn map_delete(_: &Interpreter, entries: &MapRef, args: &[Value]) -> Result<Value, ScriptError> {
    let mut list = entries.borrow_mut();
    Ok(Value::Boolean(match map_position(&list, &arg(args, 0)) {
        Some(i) => {
            list.remove(i);
            true
        }
        None => false,
    }))
}

fn map_clear(_: &Interpreter, entries: &MapRef, _: &[Value]) -> Result<Value, ScriptError> {
    entries.borrow_mut().clear();
    Ok(Value::Undefined)
}

fn map_keys(_: &Interpreter, entries: &MapRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::array(
        entries.borrow().iter().map(|(k, _)| k.clone()).collect(),
    ))
}

fn map_values(_: &Interpreter, entries: &MapRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::array(
        entries.borrow().iter().map(|(_, v)| v.clone()).collect(),
    ))
}

fn map_entries(_: &Interpreter, entries: &MapRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::array(
        entries
            .borrow()
            .iter()
            .map(|(k, v)| Value::array(vec![k.clone(), v.clone()]))
            .collect(),
    ))
}

const SET_METHODS: &[(&str, Method<SetRef>)] = &[
    ("add", set_add),
    ("has", set_has),
    ("delete", set_delete),
    ("clear", set_clear),
    ("values", set_values),
    ("keys", set_values),
    ("entries", set_entries),
];

fn set_add(_: &Interpreter, values: &SetRef, args: &[Value]) -> Result<Value, ScriptError> {
    let value = arg(args, 0);
    {
        let mut list = values.borrow_mut();
        if !list.iter().any(|v| v.same_value_zero(&value)) {
            list.push(value);
        }
    }
    Ok(Value::Set(values.cheap_clone()))
}

fn set_has(_: &Interpreter, values: &SetRef, args: &[Value]) -> Result<Value, ScriptError> {
    let value = arg(args, 0);
    Ok(Value::Boolean(
        values.borrow().iter().any(|v| v.same_value_zero(&value)),
    ))
}

fn set_delete(_: &Interpreter, values: &SetRef, args: &[Value]) -> Result<Value, ScriptError> {
    let value = arg(args, 0);
    let mut list = values.borrow_mut();
    Ok(Value::Boolean(
        match list.iter().position(|v| v.same_value_zero(&value)) {
            Some(i) => {
                list.remove(i);
                true
            }
            None => false,
        },
    ))
}

fn set_clear(_: &Interpreter, values: &SetRef, _: &[Value]) -> Result<Value, ScriptError> {
    values.borrow_mut().clear();
    Ok(Value::Undefined)
}

fn set_values(_: &Interpreter, values: &SetRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::array(values.borrow().clone()))
}

fn set_entries(_: &Interpreter, values: &SetRef, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::array(
        values
            .borrow()
            .iter()
            .map(|v| Value::array(vec![v.clone(), v.clone()]))
            .collect(),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Date methods (UTC)
// ═══════════════════════════════════════════════════════════════════════════════

const DATE_METHODS: &[(&str, Method<f64>)] = &[
    ("getTime", date_get_time),
    ("valueOf", date_get_time),
    ("toISOString", date_to_iso_string),
    ("toJSON", date_to_json),
    ("toString", date_to_iso_string),
    ("getFullYear", date_get_full_year),
    ("getMonth", date_get_month),
    ("getDate", date_get_date),
    ("getDay", date_get_day),
    ("getHours", date_get_hours),
    ("getMinutes", date_get_minutes),
    ("getSeconds", date_get_seconds),
    ("getMilliseconds", date_get_milliseconds),
    ("getTimezoneOffset", date_get_timezone_offset),
];

pub(crate) fn date_time(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
}

fn date_field(ms: f64, field: impl Fn(&DateTime<Utc>) -> f64) -> Value {
    Value::Number(date_time(ms).as_ref().map_or(f64::NAN, field))
}

fn date_get_time(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(*ms))
}

fn date_to_iso_string(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    crate::interpreter::builtins::date_to_iso_string(*ms)
        .map(Value::string)
        .ok_or_else(|| ScriptError::runtime("Invalid time value"))
}

fn date_to_json(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(crate::interpreter::builtins::date_to_iso_string(*ms)
        .map(Value::string)
        .unwrap_or(Value::Null))
}

fn date_get_full_year(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.year())))
}

fn date_get_month(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.month0())))
}

fn date_get_date(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.day())))
}

fn date_get_day(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.weekday().num_days_from_sunday())))
}

fn date_get_hours(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.hour())))
}

fn date_get_minutes(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.minute())))
}

fn date_get_seconds(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.second())))
}

fn date_get_milliseconds(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |d| f64::from(d.timestamp_subsec_millis())))
}

fn date_get_timezone_offset(_: &Interpreter, ms: &f64, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(date_field(*ms, |_| 0.0))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Number methods
// ═══════════════════════════════════════════════════════════════════════════════

const NUMBER_METHODS: &[(&str, Method<f64>)] = &[
    ("toFixed", number_to_fixed),
    ("toString", number_to_string_radix),
];

fn number_to_fixed(_: &Interpreter, n: &f64, args: &[Value]) -> Result<Value, ScriptError> {
    let digits = integer_arg(args, 0, 0);
    if !(0..=100).contains(&digits) {
        return Err(ScriptError::runtime(
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    if !n.is_finite() {
        return Ok(Value::string(number_to_string(*n)));
    }
    Ok(Value::string(format!("{:.*}", digits as usize, n)))
}

fn number_to_string_radix(_: &Interpreter, n: &f64, args: &[Value]) -> Result<Value, ScriptError> {
    let radix = integer_arg(args, 0, 10);
    if !(2..=36).contains(&radix) {
        return Err(ScriptError::runtime(
            "toString() radix must be between 2 and 36",
        ));
    }
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() > 9.007_199_254_740_991e15 {
        return Ok(Value::string(number_to_string(*n)));
    }
    let mut value = n.abs() as u64;
    let radix = radix as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (value % radix) as u32;
        digits.push(std::char::from_digit(digit, radix as u32).unwrap_or('0'));
        value /= radix;
        if value == 0 {
            break;
        }
    }
    if *n < 0.0 {
        digits.push('-');
    }
    Ok(Value::string(digits.into_iter().rev().collect::<String>()))
}
