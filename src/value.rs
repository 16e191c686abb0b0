//! Script value representation
//!
//! The core [`Value`] type and the heap structures it points at. Arrays,
//! objects, maps and sets are shared mutable handles; everything else is
//! immutable.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ast::{Expression, FunctionNode};
use crate::context::{CaptureHandle, ContextId};
use crate::error::ScriptError;
use crate::interpreter::Interpreter;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// This makes it explicit at the call site when a clone is just a reference
/// count increment rather than a deep copy.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<Object>>;
pub type FunctionRef = Rc<Function>;
pub type ClassRef = Rc<Class>;
/// Insertion-ordered entries, keys compared with SameValueZero
pub type MapRef = Rc<RefCell<Vec<(Value, Value)>>>;
pub type SetRef = Rc<RefCell<Vec<Value>>>;

/// A script value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    Class(ClassRef),
    /// Milliseconds since the Unix epoch (NaN for an invalid date)
    Date(f64),
    RegExp(Rc<RegExpValue>),
    Map(MapRef),
    Set(SetRef),
}

impl CheapClone for Value {}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Plain object from `(key, value)` pairs
    pub fn object_from<K: Into<JsString>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        let mut object = Object::default();
        for (key, value) in entries {
            object.properties.insert(key.into(), value);
        }
        Value::object(object)
    }

    pub fn string(s: impl Into<JsString>) -> Value {
        Value::String(s.into())
    }

    /// Wrap a native callback as a function value
    pub fn native<F>(name: &str, func: F) -> Value
    where
        F: Fn(&Interpreter, Value, Vec<Value>) -> Result<NativeReturn, ScriptError> + 'static,
    {
        Value::Function(Rc::new(Function::Native(NativeFunction::new(name, func))))
    }

    /// Check if this value is null or undefined
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Class(_) => "function",
            Value::Array(_)
            | Value::Object(_)
            | Value::Date(_)
            | Value::RegExp(_)
            | Value::Map(_)
            | Value::Set(_) => "object",
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Convert to number (ToNumber)
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s.as_str()),
            Value::Date(t) => *t,
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// Convert to string (ToString)
    pub fn to_js_string(&self) -> JsString {
        match self {
            Value::String(s) => s.cheap_clone(),
            other => JsString::from(other.to_string_depth(0)),
        }
    }

    fn to_string_depth(&self, depth: usize) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => {
                // Cyclic or very deep arrays render as empty, like a join would
                if depth > MAX_RENDER_DEPTH {
                    return String::new();
                }
                items
                    .borrow()
                    .iter()
                    .map(|v| {
                        if v.is_nullish() {
                            String::new()
                        } else {
                            v.to_string_depth(depth + 1)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",")
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                match obj.error_parts() {
                    Some((name, message)) if message.is_empty() => name,
                    Some((name, message)) => format!("{}: {}", name, message),
                    None => "[object Object]".to_string(),
                }
            }
            Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            Value::Class(c) => format!("class {} {{ }}", c.name),
            Value::Date(t) => crate::interpreter::builtins::date_to_iso_string(*t)
                .unwrap_or_else(|| "Invalid Date".to_string()),
            Value::RegExp(re) => format!("/{}/{}", re.source, re.flags),
            Value::Map(_) => "[object Map]".to_string(),
            Value::Set(_) => "[object Set]".to_string(),
        }
    }

    /// Human oriented rendering used in error messages and diagnostics
    pub fn to_display_string(&self) -> String {
        self.display_depth(0, true)
    }

    fn display_depth(&self, depth: usize, top: bool) -> String {
        if depth > MAX_RENDER_DEPTH {
            return "...".to_string();
        }
        match self {
            Value::String(s) if top => s.to_string(),
            Value::String(s) => format!("\"{}\"", s),
            Value::Array(items) => {
                let items = items.borrow();
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| v.display_depth(depth + 1, false))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                if let Some((name, message)) = obj.error_parts() {
                    return if message.is_empty() {
                        name
                    } else {
                        format!("{}: {}", name, message)
                    };
                }
                if obj.properties.is_empty() {
                    return match &obj.class {
                        Some(class) => format!("{} {{}}", class.name),
                        None => "{}".to_string(),
                    };
                }
                let parts: Vec<String> = obj
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.display_depth(depth + 1, false)))
                    .collect();
                match &obj.class {
                    Some(class) => format!("{} {{ {} }}", class.name, parts.join(", ")),
                    None => format!("{{ {} }}", parts.join(", ")),
                }
            }
            Value::Function(f) => format!("[Function: {}]", f.name()),
            Value::Class(c) => format!("[class {}]", c.name),
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{} => {}",
                            k.display_depth(depth + 1, false),
                            v.display_depth(depth + 1, false)
                        )
                    })
                    .collect();
                format!("Map({}) {{{}}}", parts.len(), parts.join(", "))
            }
            Value::Set(values) => {
                let parts: Vec<String> = values
                    .borrow()
                    .iter()
                    .map(|v| v.display_depth(depth + 1, false))
                    .collect();
                format!("Set({}) {{{}}}", parts.len(), parts.join(", "))
            }
            other => other.to_string_depth(depth),
        }
    }

    /// Property key form of a value (`obj[1]` and `obj["1"]` are the same slot)
    pub fn to_property_key(&self) -> JsString {
        self.to_js_string()
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN !== NaN falls out of f64 comparison
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::RegExp(a), Value::RegExp(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (==)
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Boolean(_), _)
            | (_, Value::Boolean(_)) => self.to_number() == other.to_number(),
            (Value::String(a), b @ (Value::Array(_) | Value::Object(_) | Value::Date(_))) => {
                *a == b.to_js_string()
            }
            (a @ (Value::Array(_) | Value::Object(_) | Value::Date(_)), Value::String(b)) => {
                a.to_js_string() == *b
            }
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by Map/Set keys and `includes`
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// Address of the shared allocation behind reference values
    pub(crate) fn heap_address(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(Rc::as_ptr(a) as *const u8 as usize),
            Value::Object(o) => Some(Rc::as_ptr(o) as *const u8 as usize),
            Value::Map(m) => Some(Rc::as_ptr(m) as *const u8 as usize),
            Value::Set(s) => Some(Rc::as_ptr(s) as *const u8 as usize),
            _ => None,
        }
    }
}

const MAX_RENDER_DEPTH: usize = 16;

/// Number to string following the script language's formatting
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust accepts "inf" and "nan" spellings that scripts must not
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.display_depth(0, false)),
        }
    }
}

// Conversions from Rust types

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(JsString::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(JsString::from(s))
    }
}

impl From<JsString> for Value {
    fn from(s: JsString) -> Self {
        Value::String(s)
    }
}

/// Reference-counted string for efficient string handling
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl From<&String> for JsString {
    fn from(s: &String) -> Self {
        JsString(s.as_str().into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for JsString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JsString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(JsString::from)
    }
}

/// Plain object or class instance
#[derive(Default)]
pub struct Object {
    /// Enumerable own properties in insertion order
    pub properties: IndexMap<JsString, Value>,
    /// Non-enumerable slots (error `message`/`name`/`stack`)
    pub hidden: IndexMap<JsString, Value>,
    /// Class this object was constructed from
    pub class: Option<ClassRef>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(class: ClassRef) -> Self {
        Self {
            class: Some(class),
            ..Self::default()
        }
    }

    /// Own lookup: enumerable properties first, then hidden slots
    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.properties
            .get(key)
            .or_else(|| self.hidden.get(key))
            .cloned()
    }

    /// `(name, message)` for error instances
    pub fn error_parts(&self) -> Option<(String, String)> {
        let is_error = self.class.as_ref().is_some_and(|c| c.is_error_class());
        if !is_error {
            return None;
        }
        let name = self
            .get_own("name")
            .map(|v| v.to_js_string().to_string())
            .unwrap_or_else(|| "Error".to_string());
        let message = self
            .get_own("message")
            .map(|v| v.to_js_string().to_string())
            .unwrap_or_default();
        Some((name, message))
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Property values may point back at this object
        f.debug_struct("Object")
            .field("keys", &self.properties.keys().collect::<Vec<_>>())
            .field("hidden", &self.hidden.keys().collect::<Vec<_>>())
            .field("class", &self.class.as_ref().map(|c| c.name.clone()))
            .finish()
    }
}

/// What kind of constructor a class is backed by
#[derive(Debug, Clone)]
pub enum ClassKind {
    /// Declared in script source
    Script {
        constructor: Option<Rc<FunctionNode>>,
        context: ContextId,
        capture: CaptureHandle,
    },
    /// Constructor implemented by the interpreter itself
    Builtin(BuiltinClass),
    /// Restored from a snapshot without a definition; constructing it fails
    Stub,
}

/// Constructors the interpreter provides natively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinClass {
    /// Error, TypeError and RangeError
    Error,
    Map,
    Set,
    Date,
    RegExp,
}

/// Instance field initializer, evaluated per construction
#[derive(Debug, Clone)]
pub struct FieldInit {
    pub key: JsString,
    pub value: Option<Rc<Expression>>,
}

/// A class: constructor, prototype tables and static members
pub struct Class {
    pub name: JsString,
    pub superclass: Option<ClassRef>,
    pub kind: ClassKind,
    pub methods: RefCell<IndexMap<JsString, Value>>,
    pub getters: RefCell<IndexMap<JsString, Value>>,
    pub setters: RefCell<IndexMap<JsString, Value>>,
    pub statics: RefCell<IndexMap<JsString, Value>>,
    pub fields: RefCell<Vec<FieldInit>>,
}

impl Class {
    pub fn new(name: JsString, superclass: Option<ClassRef>, kind: ClassKind) -> Self {
        Self {
            name,
            superclass,
            kind,
            methods: RefCell::default(),
            getters: RefCell::default(),
            setters: RefCell::default(),
            statics: RefCell::default(),
            fields: RefCell::default(),
        }
    }

    /// Iterate this class and its ancestors, nearest first
    pub fn ancestry(self: &Rc<Self>) -> impl Iterator<Item = ClassRef> {
        std::iter::successors(Some(self.cheap_clone()), |c| c.superclass.clone())
    }

    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.ancestry()
            .find_map(|c| c.methods.borrow().get(name).cloned())
    }

    pub fn find_getter(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.ancestry()
            .find_map(|c| c.getters.borrow().get(name).cloned())
    }

    pub fn find_setter(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.ancestry()
            .find_map(|c| c.setters.borrow().get(name).cloned())
    }

    pub fn find_static(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.ancestry()
            .find_map(|c| c.statics.borrow().get(name).cloned())
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &ClassRef) -> bool {
        self.ancestry().any(|c| Rc::ptr_eq(&c, other))
    }

    pub fn is_error_class(self: &Rc<Self>) -> bool {
        self.ancestry()
            .any(|c| matches!(c.kind, ClassKind::Builtin(BuiltinClass::Error)))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[class {}]", self.name)
    }
}

/// A callable value
pub enum Function {
    Closure(Closure),
    Native(NativeFunction),
    /// Restored from a snapshot; fails loudly until re-bound
    Stub(JsString),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure(c) => c.name.as_ref().map_or("anonymous", |n| n.as_str()),
            Function::Native(n) => n.name.as_str(),
            Function::Stub(name) => name.as_str(),
        }
    }
}

/// Script-defined function with its captured defining context
pub struct Closure {
    pub name: Option<JsString>,
    pub node: Rc<FunctionNode>,
    pub context: ContextId,
    pub capture: CaptureHandle,
    /// `this` captured at creation (arrow functions only)
    pub this_value: Option<Value>,
    /// Class whose method table holds this function, for `super.method()`
    pub home: Option<Weak<Class>>,
}

pub type NativeFn = dyn Fn(&Interpreter, Value, Vec<Value>) -> Result<NativeReturn, ScriptError>;

/// Host or built-in function
#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&Interpreter, Value, Vec<Value>) -> Result<NativeReturn, ScriptError> + 'static,
    {
        Self {
            name: JsString::from(name),
            func: Rc::new(func),
        }
    }
}

/// Result of a native call: either a value now, or a future the caller awaits
pub enum NativeReturn {
    Ready(Value),
    Pending(LocalBoxFuture<'static, Result<Value, ScriptError>>),
}

impl From<Value> for NativeReturn {
    fn from(value: Value) -> Self {
        NativeReturn::Ready(value)
    }
}

/// Compiled regular expression with its source and flags
pub struct RegExpValue {
    pub source: String,
    pub flags: String,
    #[cfg(feature = "regex")]
    pub(crate) regex: fancy_regex::Regex,
}

impl RegExpValue {
    pub fn new(source: &str, flags: &str) -> Result<Self, ScriptError> {
        if let Some(bad) = flags.chars().find(|c| !"gimsuy".contains(*c)) {
            return Err(ScriptError::runtime(format!(
                "Invalid regular expression flags '{}'",
                bad
            )));
        }

        #[cfg(feature = "regex")]
        {
            let mut inline = String::new();
            for (flag, modifier) in [('i', 'i'), ('m', 'm'), ('s', 's')] {
                if flags.contains(flag) {
                    inline.push(modifier);
                }
            }
            let pattern = if inline.is_empty() {
                source.to_string()
            } else {
                format!("(?{}){}", inline, source)
            };
            let regex = fancy_regex::Regex::new(&pattern).map_err(|e| {
                ScriptError::runtime(format!("Invalid regular expression /{}/: {}", source, e))
            })?;
            Ok(Self {
                source: source.to_string(),
                flags: flags.to_string(),
                regex,
            })
        }

        #[cfg(not(feature = "regex"))]
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
        })
    }

    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(25.0), "25");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(Value::from("  42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from("0x10").to_number(), 16.0);
        assert!(Value::from("inf").to_number().is_nan());
        assert!(Value::from("12px").to_number().is_nan());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::from("1").loose_equals(&Value::from(1)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));

        let a = Value::array(vec![]);
        assert!(a.strict_equals(&a.cheap_clone()));
        assert!(!a.strict_equals(&Value::array(vec![])));
    }

    #[test]
    fn test_array_to_string() {
        let arr = Value::array(vec![Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(arr.to_js_string().as_str(), "1,,x");
        assert_eq!(arr.to_display_string(), "[1, null, \"x\"]");
    }

    #[test]
    fn test_object_display() {
        let obj = Value::object_from([("a", Value::from(1)), ("b", Value::from("two"))]);
        assert_eq!(obj.to_display_string(), "{ a: 1, b: \"two\" }");
        assert_eq!(obj.type_of(), "object");
    }

    #[test]
    fn test_self_referencing_object_debug() {
        let obj = Value::object_from([("name", Value::from("n"))]);
        if let Value::Object(inner) = &obj {
            inner.borrow_mut().properties.insert("me".into(), obj.clone());
            let rendered = format!("{:?}", inner.borrow());
            assert!(rendered.contains("\"me\""), "{}", rendered);
        }
    }

    #[test]
    fn test_regexp_flags() {
        assert!(RegExpValue::new("a+", "gi").is_ok());
        assert!(RegExpValue::new("a+", "q").is_err());
    }
}
