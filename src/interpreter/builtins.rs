//! Built-in globals
//!
//! Everything installed here lives in the root context, above the global
//! context, so host functions registered later shadow it and snapshots never
//! carry it.

use std::collections::HashSet;
use std::rc::Rc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::context::{BindingKind, ExecutionContext};
use crate::error::ScriptError;
use crate::interpreter::Interpreter;
use crate::interpreter::members::{for_in_keys, iterable_values};
use crate::value::{
    BuiltinClass, Class, ClassKind, ClassRef, JsString, NativeReturn, Object, RegExpValue, Value,
};

type Builtin = fn(&Interpreter, Value, &[Value]) -> Result<Value, ScriptError>;

/// Constructors the evaluator refers to directly
#[derive(Debug, Clone)]
pub struct BuiltinClasses {
    pub error: ClassRef,
    pub type_error: ClassRef,
    pub range_error: ClassRef,
    pub map: ClassRef,
    pub set: ClassRef,
    pub date: ClassRef,
    pub regexp: ClassRef,
}

fn builtin(name: &str, func: Builtin) -> Value {
    Value::native(name, move |interp, this, args| {
        func(interp, this, &args).map(NativeReturn::Ready)
    })
}

fn namespace(methods: &[(&str, Builtin)], constants: &[(&str, f64)]) -> Value {
    let mut object = Object::new();
    for (name, value) in constants {
        object
            .properties
            .insert(JsString::from(*name), Value::Number(*value));
    }
    for (name, func) in methods {
        object
            .properties
            .insert(JsString::from(*name), builtin(name, *func));
    }
    Value::object(object)
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Populate the root context and return the classes the evaluator needs
pub(crate) fn install(root: &mut ExecutionContext) -> BuiltinClasses {
    let class = |name: &str, parent: Option<&ClassRef>, kind: BuiltinClass| {
        Rc::new(Class::new(
            JsString::from(name),
            parent.cloned(),
            ClassKind::Builtin(kind),
        ))
    };
    let error = class("Error", None, BuiltinClass::Error);
    let classes = BuiltinClasses {
        type_error: class("TypeError", Some(&error), BuiltinClass::Error),
        range_error: class("RangeError", Some(&error), BuiltinClass::Error),
        map: class("Map", None, BuiltinClass::Map),
        set: class("Set", None, BuiltinClass::Set),
        date: class("Date", None, BuiltinClass::Date),
        regexp: class("RegExp", None, BuiltinClass::RegExp),
        error,
    };
    {
        let mut statics = classes.date.statics.borrow_mut();
        statics.insert("now".into(), builtin("now", date_now));
        statics.insert("parse".into(), builtin("parse", date_parse));
        statics.insert("UTC".into(), builtin("UTC", date_utc));
    }
    for class in [
        &classes.error,
        &classes.type_error,
        &classes.range_error,
        &classes.map,
        &classes.set,
        &classes.date,
        &classes.regexp,
    ] {
        root.classes.insert(class.name.clone(), class.clone());
    }

    let functions: &[(&str, Builtin)] = &[
        ("String", global_string),
        ("Number", global_number),
        ("Boolean", global_boolean),
        ("parseInt", global_parse_int),
        ("parseFloat", global_parse_float),
        ("isNaN", global_is_nan),
        ("isFinite", global_is_finite),
    ];
    for (name, func) in functions {
        root.functions
            .insert(JsString::from(*name), builtin(name, *func));
    }

    let constants = [
        ("undefined", Value::Undefined),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        (
            "Object",
            namespace(
                &[
                    ("keys", object_keys),
                    ("values", object_values),
                    ("entries", object_entries),
                    ("assign", object_assign),
                    ("fromEntries", object_from_entries),
                ],
                &[],
            ),
        ),
        (
            "Array",
            namespace(
                &[
                    ("isArray", array_is_array),
                    ("from", array_from),
                    ("of", array_of),
                ],
                &[],
            ),
        ),
        (
            "JSON",
            namespace(&[("stringify", json_stringify), ("parse", json_parse)], &[]),
        ),
        ("Math", math_object()),
    ];
    for (name, value) in constants {
        let name = JsString::from(name);
        root.kinds.insert(name.clone(), BindingKind::Const);
        root.variables.insert(name, value);
    }

    classes
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constructors
// ═══════════════════════════════════════════════════════════════════════════════

/// Error instance with non-enumerable `name`, `message` and `stack`
pub(crate) fn make_error(class: &ClassRef, name: &str, message: &str, stack: &str) -> Value {
    let mut object = Object::with_class(class.clone());
    object.hidden.insert("name".into(), Value::string(name));
    object.hidden.insert("message".into(), Value::string(message));
    let stack = if stack.is_empty() {
        format!("{}: {}", name, message)
    } else {
        format!("{}: {}\n{}", name, message, stack)
    };
    object.hidden.insert("stack".into(), Value::string(stack));
    Value::object(object)
}

/// `new X(...)` for an interpreter-provided class
pub(crate) fn construct_builtin(
    interp: &Interpreter,
    class: &ClassRef,
    kind: BuiltinClass,
    args: Vec<Value>,
) -> Result<Value, ScriptError> {
    match kind {
        BuiltinClass::Error => {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(v) => v.to_js_string().to_string(),
            };
            // Subclasses report the nearest built-in name until they set their own
            let name = class
                .ancestry()
                .find(|c| matches!(c.kind, ClassKind::Builtin(_)))
                .map_or_else(|| class.name.to_string(), |c| c.name.to_string());
            Ok(make_error(class, &name, &message, &interp.stack_trace()))
        }

        BuiltinClass::Map => {
            let mut entries: Vec<(Value, Value)> = Vec::new();
            if let Some(source) = args.first().filter(|v| !v.is_nullish()) {
                for entry in iterable_values(source, "Map constructor argument")? {
                    let Value::Array(pair) = &entry else {
                        return Err(ScriptError::type_mismatch(format!(
                            "Iterator value {} is not an entry object",
                            entry.to_display_string()
                        )));
                    };
                    let pair = pair.borrow();
                    let key = pair.first().cloned().unwrap_or_default();
                    let value = pair.get(1).cloned().unwrap_or_default();
                    match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                        Some(existing) => existing.1 = value,
                        None => entries.push((key, value)),
                    }
                }
            }
            Ok(Value::Map(Rc::new(std::cell::RefCell::new(entries))))
        }

        BuiltinClass::Set => {
            let mut values: Vec<Value> = Vec::new();
            if let Some(source) = args.first().filter(|v| !v.is_nullish()) {
                for value in iterable_values(source, "Set constructor argument")? {
                    if !values.iter().any(|v| v.same_value_zero(&value)) {
                        values.push(value);
                    }
                }
            }
            Ok(Value::Set(Rc::new(std::cell::RefCell::new(values))))
        }

        BuiltinClass::Date => Ok(Value::Date(match args.as_slice() {
            [] => now_millis(),
            [Value::Date(ms)] => *ms,
            [Value::String(text)] => parse_date(text.as_str()),
            [single] => time_clip(single.to_number()),
            fields => utc_from_fields(fields),
        })),

        BuiltinClass::RegExp => {
            let (source, default_flags) = match arg(&args, 0) {
                Value::RegExp(re) => (re.source.clone(), re.flags.clone()),
                Value::Undefined => ("(?:)".to_string(), String::new()),
                other => (other.to_js_string().to_string(), String::new()),
            };
            let flags = match args.get(1) {
                None | Some(Value::Undefined) => default_flags,
                Some(v) => v.to_js_string().to_string(),
            };
            Ok(Value::RegExp(Rc::new(RegExpValue::new(&source, &flags)?)))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dates
// ═══════════════════════════════════════════════════════════════════════════════

const MAX_TIME: f64 = 8.64e15;

fn time_clip(ms: f64) -> f64 {
    if ms.is_finite() && ms.abs() <= MAX_TIME {
        ms.trunc()
    } else {
        f64::NAN
    }
}

fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// ISO-8601 rendering, `None` for an invalid date
pub(crate) fn date_to_iso_string(ms: f64) -> Option<String> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// Parse the date formats scripts commonly use; NaN when unrecognised
fn parse_date(text: &str) -> f64 {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return dt.timestamp_millis() as f64;
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return dt.and_utc().timestamp_millis() as f64;
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(f64::NAN, |dt| dt.and_utc().timestamp_millis() as f64)
}

/// `Date.UTC`-style fields: year, month (0-based), day, hours, minutes, seconds, ms
fn utc_from_fields(fields: &[Value]) -> f64 {
    let numbers: Vec<f64> = fields.iter().map(Value::to_number).collect();
    if numbers.iter().any(|n| !n.is_finite()) {
        return f64::NAN;
    }
    let field = |i: usize, default: f64| numbers.get(i).copied().unwrap_or(default).trunc();
    let year = field(0, 1970.0);
    let month = field(1, 0.0);
    // Month overflow rolls into the year
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0);
    let Some(first) = NaiveDate::from_ymd_opt(year as i32, month as u32 + 1, 1) else {
        return f64::NAN;
    };
    let Some(midnight) = first.and_hms_opt(0, 0, 0) else {
        return f64::NAN;
    };
    let base = midnight.and_utc().timestamp_millis() as f64;
    let day_ms = 86_400_000.0;
    time_clip(
        base + (field(2, 1.0) - 1.0) * day_ms
            + field(3, 0.0) * 3_600_000.0
            + field(4, 0.0) * 60_000.0
            + field(5, 0.0) * 1000.0
            + field(6, 0.0),
    )
}

fn date_now(_: &Interpreter, _: Value, _: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(now_millis()))
}

fn date_parse(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(parse_date(arg(args, 0).to_js_string().as_str())))
}

fn date_utc(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(utc_from_fields(args)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Conversion functions
// ═══════════════════════════════════════════════════════════════════════════════

fn global_string(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(match args.first() {
        None => Value::string(""),
        Some(v) => Value::String(v.to_js_string()),
    })
}

fn global_number(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn global_boolean(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(arg(args, 0).to_boolean()))
}

fn global_is_nan(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(arg(args, 0).to_number().is_nan()))
}

fn global_is_finite(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(arg(args, 0).to_number().is_finite()))
}

fn global_parse_int(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let text = arg(args, 0).to_js_string();
    let radix = match args.get(1) {
        None | Some(Value::Undefined) => 0,
        Some(v) => {
            let r = v.to_number();
            if r.is_nan() { 0 } else { r.trunc() as i64 }
        }
    };
    Ok(Value::Number(parse_int(text.as_str(), radix)))
}

fn parse_int(text: &str, radix: i64) -> f64 {
    let mut rest = text.trim_start();
    let negative = rest.starts_with('-');
    rest = rest.strip_prefix(['-', '+']).unwrap_or(rest);

    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
            rest = hex;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut value = 0.0_f64;
    let mut seen = false;
    for c in rest.chars() {
        let Some(digit) = c.to_digit(radix as u32) else {
            break;
        };
        value = value * radix as f64 + f64::from(digit);
        seen = true;
    }
    match (seen, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

fn global_parse_float(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let text = arg(args, 0).to_js_string();
    Ok(Value::Number(parse_float(text.as_str())))
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    if unsigned.starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    // Longest prefix that still parses as a decimal literal
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        let ok = match b {
            b'0'..=b'9' => true,
            b'+' | b'-' => i == 0 || matches!(bytes.get(i - 1), Some(b'e' | b'E')),
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                true
            }
            b'e' | b'E' if !seen_exp && i > 0 => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        i += 1;
        if text.get(..i).and_then(|p| p.parse::<f64>().ok()).is_some() {
            end = i;
        }
    }
    text.get(..end)
        .and_then(|p| p.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Object and Array statics
// ═══════════════════════════════════════════════════════════════════════════════

fn object_keys(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let target = require_object(&arg(args, 0), "Object.keys")?;
    Ok(Value::array(
        for_in_keys(&target).into_iter().map(Value::String).collect(),
    ))
}

fn object_values(interp: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let target = require_object(&arg(args, 0), "Object.values")?;
    let values = for_in_keys(&target)
        .into_iter()
        .map(|key| interp.get_member(&target, &key))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(values))
}

fn object_entries(interp: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let target = require_object(&arg(args, 0), "Object.entries")?;
    let entries = for_in_keys(&target)
        .into_iter()
        .map(|key| {
            let value = interp.get_member(&target, &key)?;
            Ok(Value::array(vec![Value::String(key), value]))
        })
        .collect::<Result<Vec<_>, ScriptError>>()?;
    Ok(Value::array(entries))
}

fn object_assign(interp: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let target = require_object(&arg(args, 0), "Object.assign")?;
    for source in args.iter().skip(1).filter(|v| !v.is_nullish()) {
        for key in for_in_keys(source) {
            let value = interp.get_member(source, &key)?;
            interp.set_member(&target, key, value)?;
        }
    }
    Ok(target)
}

fn object_from_entries(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let mut object = Object::new();
    for entry in iterable_values(&arg(args, 0), "Object.fromEntries argument")? {
        let Value::Array(pair) = &entry else {
            return Err(ScriptError::type_mismatch(format!(
                "Iterator value {} is not an entry object",
                entry.to_display_string()
            )));
        };
        let pair = pair.borrow();
        let key = pair.first().map(Value::to_property_key).unwrap_or_else(|| "undefined".into());
        object
            .properties
            .insert(key, pair.get(1).cloned().unwrap_or_default());
    }
    Ok(Value::object(object))
}

fn require_object(value: &Value, what: &str) -> Result<Value, ScriptError> {
    if value.is_nullish() {
        return Err(ScriptError::type_mismatch(format!(
            "{} called on {}",
            what,
            value.type_of()
        )));
    }
    Ok(value.clone())
}

fn array_is_array(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Boolean(matches!(args.first(), Some(Value::Array(_)))))
}

fn array_from(interp: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let source = arg(args, 0);
    let items = match &source {
        Value::Object(obj) => {
            // Array-likes: `{ length: n }`
            let len = obj
                .borrow()
                .get_own("length")
                .map_or(0.0, |v| v.to_number());
            let len = if len.is_finite() && len > 0.0 { len as usize } else { 0 };
            (0..len.min(10_000_000))
                .map(|i| interp.get_member(&source, &JsString::from(i.to_string())))
                .collect::<Result<Vec<_>, _>>()?
        }
        other => iterable_values(other, "Array.from argument")?,
    };
    let Some(mapper) = args.get(1).filter(|f| f.is_callable()) else {
        return Ok(Value::array(items));
    };
    let mapped = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            interp.call_sync(mapper, Value::Undefined, vec![item, Value::Number(i as f64)])
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(mapped))
}

fn array_of(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::array(args.to_vec()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON
// ═══════════════════════════════════════════════════════════════════════════════

fn json_stringify(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let mut visited = HashSet::new();
    let Some(json) = to_json(&arg(args, 0), &mut visited)? else {
        return Ok(Value::Undefined);
    };

    let indent = match args.get(2) {
        Some(Value::Number(n)) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Some(Value::String(s)) => s.as_str().chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        json.serialize(&mut serializer)
            .map(|()| String::from_utf8_lossy(&out).into_owned())
    };
    text.map(Value::string)
        .map_err(|e| ScriptError::runtime(format!("JSON.stringify failed: {}", e)))
}

/// Convert to JSON; `None` for values JSON omits (undefined, functions)
fn to_json(
    value: &Value,
    visited: &mut HashSet<usize>,
) -> Result<Option<serde_json::Value>, ScriptError> {
    use serde_json::Value as Json;

    if let Some(address) = value.heap_address() {
        if !visited.insert(address) {
            return Err(ScriptError::type_mismatch(
                "Converting circular structure to JSON",
            ));
        }
    }

    let json = match value {
        Value::Undefined | Value::Function(_) | Value::Class(_) => None,
        Value::Null => Some(Json::Null),
        Value::Boolean(b) => Some(Json::Bool(*b)),
        Value::Number(n) => Some(number_to_json(*n)),
        Value::String(s) => Some(Json::String(s.to_string())),
        Value::Date(ms) => Some(date_to_iso_string(*ms).map_or(Json::Null, Json::String)),
        Value::RegExp(_) | Value::Map(_) | Value::Set(_) => Some(Json::Object(Default::default())),
        Value::Array(items) => {
            let items = items.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(to_json(item, visited)?.unwrap_or(Json::Null));
            }
            Some(Json::Array(out))
        }
        Value::Object(obj) => {
            let entries: Vec<(JsString, Value)> = obj
                .borrow()
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut out = serde_json::Map::new();
            for (key, item) in &entries {
                if let Some(json) = to_json(item, visited)? {
                    out.insert(key.to_string(), json);
                }
            }
            Some(Json::Object(out))
        }
    };

    // Shared (non-cyclic) references may appear more than once
    if let Some(address) = value.heap_address() {
        visited.remove(&address);
    }
    Ok(json)
}

pub(crate) fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn json_parse(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let text = arg(args, 0).to_js_string();
    let json: serde_json::Value = serde_json::from_str(text.as_str())
        .map_err(|e| ScriptError::runtime(format!("Unexpected token in JSON: {}", e)))?;
    Ok(from_json(&json))
}

pub(crate) fn from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::string(s.as_str()),
        Json::Array(items) => Value::array(items.iter().map(from_json).collect()),
        Json::Object(map) => {
            Value::object_from(map.iter().map(|(k, v)| (k.as_str(), from_json(v))))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Math
// ═══════════════════════════════════════════════════════════════════════════════

const MATH_UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("abs", f64::abs),
    ("floor", f64::floor),
    ("ceil", f64::ceil),
    ("round", math_round),
    ("trunc", f64::trunc),
    ("sign", math_sign),
    ("sqrt", f64::sqrt),
    ("cbrt", f64::cbrt),
    ("exp", f64::exp),
    ("log", f64::ln),
    ("log2", f64::log2),
    ("log10", f64::log10),
    ("sin", f64::sin),
    ("cos", f64::cos),
    ("tan", f64::tan),
    ("asin", f64::asin),
    ("acos", f64::acos),
    ("atan", f64::atan),
];

fn math_object() -> Value {
    let math = namespace(
        &[
            ("atan2", math_atan2),
            ("pow", math_pow),
            ("hypot", math_hypot),
            ("min", math_min),
            ("max", math_max),
        ],
        &[
            ("PI", std::f64::consts::PI),
            ("E", std::f64::consts::E),
            ("LN2", std::f64::consts::LN_2),
            ("LN10", std::f64::consts::LN_10),
            ("LOG2E", std::f64::consts::LOG2_E),
            ("LOG10E", std::f64::consts::LOG10_E),
            ("SQRT2", std::f64::consts::SQRT_2),
            ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ],
    );
    if let Value::Object(object) = &math {
        let mut object = object.borrow_mut();
        for &(name, op) in MATH_UNARY {
            let func = Value::native(name, move |_, _, args| {
                Ok(Value::Number(op(arg(&args, 0).to_number())).into())
            });
            object.properties.insert(JsString::from(name), func);
        }
    }
    math
}

/// Rounds half up, so `-2.5` becomes `-2`
fn math_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn math_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 { x } else { x.signum() }
}

fn math_atan2(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let y = arg(args, 0).to_number();
    Ok(Value::Number(y.atan2(arg(args, 1).to_number())))
}

fn math_pow(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    let base = arg(args, 0).to_number();
    Ok(Value::Number(base.powf(arg(args, 1).to_number())))
}

fn math_hypot(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(
        args.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt(),
    ))
}

fn math_min(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(
        f64::INFINITY,
        |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) },
    )))
}

fn math_max(_: &Interpreter, _: Value, args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::Number(args.iter().map(Value::to_number).fold(
        f64::NEG_INFINITY,
        |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("  -0x1f", 0), -31.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("px", 10).is_nan());
        assert!(parse_int("1", 40).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.25abc"), 3.25);
        assert_eq!(parse_float("-1e3x"), -1000.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn test_date_round_trip() {
        let ms = parse_date("2024-01-02T03:04:05Z");
        assert_eq!(date_to_iso_string(ms).unwrap(), "2024-01-02T03:04:05.000Z");
        assert_eq!(parse_date("2024-01-02"), parse_date("2024-01-02T00:00:00Z"));
        assert!(parse_date("yesterday").is_nan());
        assert!(date_to_iso_string(f64::NAN).is_none());
    }

    #[test]
    fn test_utc_fields() {
        let fields = [Value::from(2024), Value::from(0), Value::from(2)];
        assert_eq!(utc_from_fields(&fields), parse_date("2024-01-02T00:00:00Z"));
        let overflow = [Value::from(2023), Value::from(12), Value::from(2)];
        assert_eq!(utc_from_fields(&overflow), utc_from_fields(&fields));
    }

    #[test]
    fn test_number_to_json() {
        assert_eq!(number_to_json(3.0).to_string(), "3");
        assert_eq!(number_to_json(0.5).to_string(), "0.5");
        assert_eq!(number_to_json(f64::NAN), serde_json::Value::Null);
    }
}
