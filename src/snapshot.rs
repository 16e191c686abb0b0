//! Snapshot serialization of interpreter state
//!
//! A [`SerializedState`] is a plain-data projection of the global context,
//! every context a paused frame can reach, and the pause call stack. Values
//! go through a tagger that wraps everything JSON cannot express in a
//! `{"__type": ...}` object. Function and class bodies are never written:
//! callables become name-only stubs that fail loudly when invoked unless a
//! function of the same name is supplied at deserialize time.

use std::collections::HashSet;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as Json, json};

use crate::config::InterpreterConfig;
use crate::context::{BindingKind, ContextId, ExecutionContext};
use crate::error::ScriptError;
use crate::interpreter::Interpreter;
use crate::interpreter::builtins::number_to_json;
use crate::module::ModuleResolver;
use crate::pause::{CallFrame, ExecutionStatus, FrameKind, FrameNode, NodeInfo};
use crate::value::{
    Class, ClassKind, ClassRef, Function, JsString, NativeFunction, Object, RegExpValue, Value,
    number_to_string,
};

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

const TYPE_KEY: &str = "__type";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedState {
    pub version: u32,
    pub status: ExecutionStatus,
    /// Id of the global context
    pub global: u32,
    /// Id of the context the innermost frame runs in
    pub current: u32,
    /// Contexts in parent-first order
    pub contexts: Vec<SerializedContext>,
    pub call_stack: Vec<SerializedFrame>,
    pub current_node: Option<NodeInfo>,
    pub result: Option<Json>,
    pub error: Option<String>,
    pub operations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedContext {
    pub id: u32,
    /// `None` when the parent is the builtins scope
    pub parent: Option<u32>,
    pub variables: Vec<(JsString, Json)>,
    pub kinds: Vec<(JsString, BindingKind)>,
    /// Names only
    pub functions: Vec<JsString>,
    /// Names only
    pub classes: Vec<JsString>,
    pub exports: Vec<(JsString, Json)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this_value: Option<Json>,
    #[serde(default)]
    pub captured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedFrame {
    pub kind: FrameKind,
    pub node: FrameNode,
    pub context: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Collaborators for rebuilding an interpreter from a snapshot
#[derive(Default)]
pub struct DeserializeOptions {
    /// Re-binds function stubs by name and is registered as the function table
    pub functions: Vec<NativeFunction>,
    pub resolver: Option<Rc<dyn ModuleResolver>>,
    pub config: Option<InterpreterConfig>,
}

impl DeserializeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, function: NativeFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = Some(config);
        self
    }
}

impl SerializedState {
    pub fn to_json(&self) -> Result<String, ScriptError> {
        serde_json::to_string(self)
            .map_err(|e| ScriptError::runtime(format!("Failed to serialize state: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(json)
            .map_err(|e| ScriptError::runtime(format!("Invalid serialized state: {}", e)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Value tagging
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert a value to its tagged JSON form
pub fn tag_value(value: &Value) -> Json {
    tag(value, &mut HashSet::new())
}

fn tag(value: &Value, path: &mut HashSet<usize>) -> Json {
    let address = value.heap_address();
    if let Some(address) = address {
        if !path.insert(address) {
            return json!({ TYPE_KEY: "circular_reference" });
        }
    }
    let tagged = tag_inner(value, path);
    if let Some(address) = address {
        path.remove(&address);
    }
    tagged
}

fn tag_inner(value: &Value, path: &mut HashSet<usize>) -> Json {
    match value {
        Value::Undefined => json!({ TYPE_KEY: "undefined" }),
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Number(n) if n.is_finite() => number_to_json(*n),
        Value::Number(n) => json!({ TYPE_KEY: "number", "value": number_to_string(*n) }),
        Value::String(s) => Json::String(s.to_string()),
        Value::Array(items) => Json::Array(items.borrow().iter().map(|v| tag(v, path)).collect()),
        Value::Object(object) => {
            let object = object.borrow();
            let properties = tag_entries(&object.properties, path);
            match &object.class {
                Some(class) => {
                    let mut wrapper = JsonMap::new();
                    wrapper.insert(TYPE_KEY.into(), "instance".into());
                    wrapper.insert("class".into(), class.name.to_string().into());
                    wrapper.insert("properties".into(), Json::Object(properties));
                    if !object.hidden.is_empty() {
                        wrapper.insert("hidden".into(), Json::Object(tag_entries(&object.hidden, path)));
                    }
                    Json::Object(wrapper)
                }
                None if properties.contains_key(TYPE_KEY) => {
                    json!({ TYPE_KEY: "object", "properties": properties })
                }
                None => Json::Object(properties),
            }
        }
        Value::Function(func) => json!({ TYPE_KEY: "function", "name": func.name() }),
        Value::Class(class) => json!({ TYPE_KEY: "class", "name": class.name.as_str() }),
        Value::Date(time) => json!({ TYPE_KEY: "Date", "value": number_to_json(*time) }),
        Value::RegExp(re) => {
            json!({ TYPE_KEY: "RegExp", "source": re.source.as_str(), "flags": re.flags.as_str() })
        }
        Value::Map(entries) => {
            let entries: Vec<Json> = entries
                .borrow()
                .iter()
                .map(|(k, v)| Json::Array(vec![tag(k, path), tag(v, path)]))
                .collect();
            json!({ TYPE_KEY: "Map", "entries": entries })
        }
        Value::Set(values) => {
            let values: Vec<Json> = values.borrow().iter().map(|v| tag(v, path)).collect();
            json!({ TYPE_KEY: "Set", "values": values })
        }
    }
}

fn tag_entries(
    entries: &indexmap::IndexMap<JsString, Value>,
    path: &mut HashSet<usize>,
) -> JsonMap<String, Json> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), tag(v, path)))
        .collect()
}

/// Convert tagged JSON back to a value; every callable becomes a stub
pub fn untag_value(json: &Json) -> Value {
    Restorer::default().untag(json)
}

/// Name tables used to re-link callables and classes while untagging
#[derive(Default)]
struct Restorer {
    functions: FxHashMap<String, Value>,
    classes: FxHashMap<String, ClassRef>,
}

impl Restorer {
    fn for_interpreter(interp: &Interpreter) -> Self {
        let mut restorer = Restorer::default();
        let contexts = interp.contexts.borrow();
        if let Some(root) = contexts.get(interp.root_context()) {
            for (name, value) in &root.functions {
                restorer.functions.insert(name.to_string(), value.clone());
            }
            for (name, class) in &root.classes {
                restorer.classes.insert(name.to_string(), class.clone());
            }
        }
        restorer
    }

    fn function(&self, name: &str) -> Value {
        self.functions.get(name).cloned().unwrap_or_else(|| {
            Value::Function(Rc::new(Function::Stub(JsString::from(name))))
        })
    }

    /// Known class, or a shared stub standing in for it
    fn class(&mut self, name: &str) -> ClassRef {
        self.classes
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(Class::new(name.into(), None, ClassKind::Stub)))
            .clone()
    }

    fn untag(&mut self, json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::string(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(|v| self.untag(v)).collect()),
            Json::Object(map) => match map.get(TYPE_KEY).and_then(Json::as_str) {
                Some(tag) => self.untag_tagged(tag, map),
                None => self.untag_object(map, None),
            },
        }
    }

    fn untag_object(&mut self, map: &JsonMap<String, Json>, class: Option<ClassRef>) -> Value {
        let mut object = Object::new();
        object.class = class;
        for (key, value) in map {
            object.properties.insert(key.as_str().into(), self.untag(value));
        }
        Value::object(object)
    }

    fn untag_tagged(&mut self, tag: &str, map: &JsonMap<String, Json>) -> Value {
        let field = |key: &str| map.get(key).unwrap_or(&Json::Null);
        let text = |key: &str| map.get(key).and_then(Json::as_str).unwrap_or_default();
        match tag {
            "undefined" => Value::Undefined,
            "number" => Value::Number(match text("value") {
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                _ => f64::NAN,
            }),
            "Date" => Value::Date(field("value").as_f64().unwrap_or(f64::NAN)),
            "RegExp" => match RegExpValue::new(text("source"), text("flags")) {
                Ok(re) => Value::RegExp(Rc::new(re)),
                Err(err) => {
                    tracing::debug!(%err, "regexp in snapshot failed to compile");
                    Value::Undefined
                }
            },
            "Map" => {
                let entries = field("entries")
                    .as_array()
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(Json::as_array)
                            .map(|pair| {
                                let key = pair.first().map_or(Value::Undefined, |k| self.untag(k));
                                let value = pair.get(1).map_or(Value::Undefined, |v| self.untag(v));
                                (key, value)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Map(Rc::new(std::cell::RefCell::new(entries)))
            }
            "Set" => {
                let values = field("values")
                    .as_array()
                    .map(|values| values.iter().map(|v| self.untag(v)).collect())
                    .unwrap_or_default();
                Value::Set(Rc::new(std::cell::RefCell::new(values)))
            }
            "function" => self.function(text("name")),
            "class" => Value::Class(self.class(text("name"))),
            "instance" => {
                let class = self.class(text("class"));
                let value = match field("properties").as_object() {
                    Some(properties) => self.untag_object(properties, Some(class)),
                    None => Value::object(Object::with_class(class)),
                };
                if let (Value::Object(object), Some(hidden)) = (&value, field("hidden").as_object()) {
                    let hidden: Vec<(JsString, Value)> = hidden
                        .iter()
                        .map(|(k, v)| (k.as_str().into(), self.untag(v)))
                        .collect();
                    object.borrow_mut().hidden.extend(hidden);
                }
                value
            }
            "object" => match field("properties").as_object() {
                Some(properties) => self.untag_object(properties, None),
                None => Value::object(Object::new()),
            },
            "circular_reference" => Value::string("[Circular]"),
            other => {
                tracing::debug!(tag = other, "unknown value tag in snapshot");
                self.untag_object(map, None)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Serialize
// ═══════════════════════════════════════════════════════════════════════════════

/// Id table built by walking parent chains, parents first
struct ContextIds {
    order: Vec<ContextId>,
    ids: FxHashMap<ContextId, u32>,
}

impl ContextIds {
    fn collect(interp: &Interpreter, starts: impl IntoIterator<Item = ContextId>) -> Self {
        let root = interp.root_context();
        let contexts = interp.contexts.borrow();
        let mut table = ContextIds {
            order: Vec::new(),
            ids: FxHashMap::default(),
        };
        for start in starts {
            let mut chain: Vec<ContextId> = contexts
                .chain(start)
                .map(|(id, _)| id)
                .take_while(|id| *id != root && !table.ids.contains_key(id))
                .collect();
            chain.reverse();
            for id in chain {
                table.ids.insert(id, table.order.len() as u32);
                table.order.push(id);
            }
        }
        table
    }

    fn id(&self, ctx: ContextId) -> Result<u32, ScriptError> {
        self.ids
            .get(&ctx)
            .copied()
            .ok_or_else(|| ScriptError::runtime("Frame refers to a context outside the snapshot"))
    }
}

pub(crate) fn serialize_state(interp: &Interpreter) -> Result<SerializedState, ScriptError> {
    let tracker = &interp.tracker;
    let frames = tracker.frames();
    let global = interp.global_context();
    let ids = ContextIds::collect(
        interp,
        std::iter::once(global).chain(frames.iter().map(|f| f.context)),
    );

    let contexts = {
        let arena = interp.contexts.borrow();
        ids.order
            .iter()
            .filter_map(|id| arena.get(*id).map(|ctx| (*id, ctx)))
            .map(|(id, ctx)| serialize_context(&ids, id, ctx))
            .collect::<Result<Vec<_>, _>>()?
    };

    let call_stack = frames
        .iter()
        .map(|frame| {
            Ok(SerializedFrame {
                kind: frame.kind,
                node: frame.node.clone(),
                context: ids.id(frame.context)?,
                name: frame.name.clone(),
            })
        })
        .collect::<Result<Vec<_>, ScriptError>>()?;

    let current = frames.last().map_or(global, |f| f.context);
    let state = SerializedState {
        version: SNAPSHOT_VERSION,
        status: tracker.status(),
        global: ids.id(global)?,
        current: ids.id(current)?,
        contexts,
        call_stack,
        current_node: tracker.current_node(),
        result: tracker.result().as_ref().map(tag_value),
        error: tracker.error().map(|e| e.to_string()),
        operations: tracker.operations(),
    };
    tracing::debug!(
        contexts = state.contexts.len(),
        frames = state.call_stack.len(),
        "state serialized"
    );
    Ok(state)
}

fn serialize_context(
    ids: &ContextIds,
    id: ContextId,
    ctx: &ExecutionContext,
) -> Result<SerializedContext, ScriptError> {
    let parent = match ctx.parent {
        Some(parent) => ids.ids.get(&parent).copied(),
        None => None,
    };
    Ok(SerializedContext {
        id: ids.id(id)?,
        parent,
        variables: ctx
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), tag_value(v)))
            .collect(),
        kinds: ctx.kinds.iter().map(|(k, kind)| (k.clone(), *kind)).collect(),
        functions: ctx.functions.keys().cloned().collect(),
        classes: ctx.classes.keys().cloned().collect(),
        exports: ctx
            .exports
            .iter()
            .map(|(k, v)| (k.clone(), tag_value(v)))
            .collect(),
        module_path: ctx.module_path.clone(),
        this_value: ctx.this_value.as_ref().map(tag_value),
        captured: ctx.captured,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Deserialize
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn restore_state(
    state: SerializedState,
    options: DeserializeOptions,
) -> Result<Interpreter, ScriptError> {
    if state.version != SNAPSHOT_VERSION {
        return Err(ScriptError::runtime(format!(
            "Unsupported snapshot version {} (expected {})",
            state.version, SNAPSHOT_VERSION
        )));
    }
    let interp = Interpreter::with_config(options.config.unwrap_or_default());
    if let Some(resolver) = options.resolver {
        interp.set_resolver(resolver);
    }
    interp.register_functions(options.functions);
    let mut restorer = Restorer::for_interpreter(&interp);

    let mut mapping: FxHashMap<u32, ContextId> = FxHashMap::default();
    for saved in &state.contexts {
        let parent = match saved.parent {
            Some(parent) => Some(mapping.get(&parent).copied().ok_or_else(|| {
                ScriptError::runtime(format!(
                    "Context {} appears before its parent {}",
                    saved.id, parent
                ))
            })?),
            None => Some(interp.root_context()),
        };
        let ctx = restore_context(&mut restorer, saved, parent);
        let id = interp.contexts.borrow_mut().alloc(ctx);
        mapping.insert(saved.id, id);
    }
    let lookup = |id: u32| {
        mapping
            .get(&id)
            .copied()
            .ok_or_else(|| ScriptError::runtime(format!("Unknown context id {}", id)))
    };

    interp.set_global_context(lookup(state.global)?);

    let frames = state
        .call_stack
        .into_iter()
        .map(|frame| {
            Ok(CallFrame {
                kind: frame.kind,
                node: frame.node,
                context: lookup(frame.context)?,
                name: frame.name,
            })
        })
        .collect::<Result<Vec<_>, ScriptError>>()?;

    for frame in &frames {
        interp.rebind_frame(frame);
    }

    // A snapshot taken mid-run resumes like a paused one
    let status = match state.status {
        ExecutionStatus::Running => ExecutionStatus::Paused,
        other => other,
    };
    interp.tracker.restore(
        status,
        frames,
        state.current_node,
        state.operations,
        state.result.as_ref().map(|r| restorer.untag(r)),
        state.error.map(ScriptError::runtime),
    );
    tracing::debug!(contexts = mapping.len(), ?status, "state deserialized");
    Ok(interp)
}

fn restore_context(
    restorer: &mut Restorer,
    saved: &SerializedContext,
    parent: Option<ContextId>,
) -> ExecutionContext {
    let mut ctx = ExecutionContext::new(parent);
    for (name, value) in &saved.variables {
        ctx.variables.insert(name.clone(), restorer.untag(value));
    }
    for (name, kind) in &saved.kinds {
        ctx.kinds.insert(name.clone(), *kind);
    }
    for name in &saved.functions {
        ctx.functions.insert(name.clone(), restorer.function(name.as_str()));
    }
    for name in &saved.classes {
        ctx.classes.insert(name.clone(), restorer.class(name.as_str()));
    }
    for (name, value) in &saved.exports {
        ctx.exports.insert(name.clone(), restorer.untag(value));
    }
    ctx.module_path = saved.module_path.clone();
    ctx.this_value = saved.this_value.as_ref().map(|v| restorer.untag(v));
    ctx.captured = saved.captured;
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_values_json_cannot_express() {
        assert_eq!(tag_value(&Value::Undefined), json!({ "__type": "undefined" }));
        assert_eq!(tag_value(&Value::Number(3.0)), json!(3));
        assert_eq!(
            tag_value(&Value::Number(f64::NEG_INFINITY)),
            json!({ "__type": "number", "value": "-Infinity" })
        );
        assert_eq!(
            tag_value(&Value::Date(0.0)),
            json!({ "__type": "Date", "value": 0 })
        );
        assert!(matches!(
            untag_value(&json!({ "__type": "number", "value": "NaN" })),
            Value::Number(n) if n.is_nan()
        ));
    }

    #[test]
    fn test_cycle_becomes_marker() {
        let array = Value::array(vec![Value::Number(1.0)]);
        if let Value::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }
        let tagged = tag_value(&array);
        assert_eq!(tagged, json!([1, { "__type": "circular_reference" }]));
    }

    #[test]
    fn test_shared_reference_is_not_a_cycle() {
        let shared = Value::array(vec![Value::Number(1.0)]);
        let outer = Value::array(vec![shared.clone(), shared]);
        assert_eq!(tag_value(&outer), json!([[1], [1]]));
    }

    #[test]
    fn test_object_with_type_key_is_escaped() {
        let object = Value::object_from([("__type", Value::string("Date"))]);
        let tagged = tag_value(&object);
        assert_eq!(tagged, json!({ "__type": "object", "properties": { "__type": "Date" } }));
        let restored = untag_value(&tagged);
        let Value::Object(object) = restored else {
            panic!("expected an object");
        };
        assert_eq!(object.borrow().get_own("__type"), Some(Value::string("Date")));
    }

    #[test]
    fn test_functions_restore_as_stubs() {
        let restored = untag_value(&json!({ "__type": "function", "name": "tick" }));
        let Value::Function(func) = restored else {
            panic!("expected a function");
        };
        assert!(matches!(func.as_ref(), Function::Stub(name) if name.as_str() == "tick"));
    }

    #[test]
    fn test_map_and_set_restore_entries() {
        let map = untag_value(&json!({ "__type": "Map", "entries": [["a", 1], [2, { "__type": "undefined" }]] }));
        let Value::Map(entries) = map else {
            panic!("expected a map");
        };
        assert_eq!(entries.borrow().len(), 2);
        assert_eq!(entries.borrow()[1].1, Value::Undefined);

        let set = untag_value(&json!({ "__type": "Set", "values": [1, 1.5] }));
        let Value::Set(values) = set else {
            panic!("expected a set");
        };
        assert_eq!(values.borrow().as_slice(), &[Value::Number(1.0), Value::Number(1.5)]);
    }
}
