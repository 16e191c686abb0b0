//! Execution contexts (scopes)
//!
//! Contexts live in a [`ContextArena`] and refer to their parent by
//! [`ContextId`]. The parent link is used for lookup only; the arena owns
//! every context and frees a slot once nothing (closure, class or paused
//! frame) can reach it any more.

use std::collections::hash_map::Entry;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::value::{ClassKind, ClassRef, Function, JsString, ObjectRef, Value};

/// Handle to a context slot in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u32);

impl ContextId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// How a variable was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Const,
    Let,
    Var,
}

/// State of a class constructor body while it runs
#[derive(Debug, Clone)]
pub struct ConstructFrame {
    pub class: ClassRef,
    pub instance: ObjectRef,
    pub super_called: bool,
}

/// A scope node: bindings plus a link to the enclosing scope
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub variables: IndexMap<JsString, Value>,
    pub kinds: FxHashMap<JsString, BindingKind>,
    pub functions: IndexMap<JsString, Value>,
    pub classes: IndexMap<JsString, ClassRef>,
    pub exports: IndexMap<JsString, Value>,
    pub parent: Option<ContextId>,
    pub module_path: Option<String>,
    /// `this` for function call contexts; other contexts inherit it
    pub this_value: Option<Value>,
    /// Class whose method is executing, for `super.method()`
    pub home: Option<ClassRef>,
    pub construct: Option<ConstructFrame>,
    /// Set once a closure or class captures this context
    pub captured: bool,
    /// Shared with every [`CaptureHandle`] on this context
    handle: Weak<()>,
}

/// Held by each closure and class for the context it captured.
///
/// The collector compares the number of live handles with the captures it
/// can see from inside the arena; the difference is held by the host.
#[derive(Debug, Clone)]
pub struct CaptureHandle(Rc<()>);

impl ExecutionContext {
    pub fn new(parent: Option<ContextId>) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}

/// Owner of every live context
#[derive(Debug, Default)]
pub struct ContextArena {
    slots: Vec<Option<ExecutionContext>>,
    free: Vec<u32>,
}

impl ContextArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, context: ExecutionContext) -> ContextId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                *slot = Some(context);
                return ContextId(index);
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Some(context));
        ContextId(index)
    }

    pub fn get(&self, id: ContextId) -> Option<&ExecutionContext> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut ExecutionContext> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Free a context unless something captured it
    pub fn release(&mut self, id: ContextId) {
        let Some(slot) = self.slots.get_mut(id.0 as usize) else {
            return;
        };
        if slot.as_ref().is_some_and(|ctx| !ctx.captured) {
            *slot = None;
            self.free.push(id.0);
        }
    }

    /// Unconditionally drop a context
    pub fn remove(&mut self, id: ContextId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            if slot.take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    /// Number of live contexts
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The context itself followed by its ancestors
    pub fn chain(&self, from: ContextId) -> impl Iterator<Item = (ContextId, &ExecutionContext)> {
        std::iter::successors(self.get(from).map(|ctx| (from, ctx)), move |(_, ctx)| {
            ctx.parent
                .and_then(|parent| self.get(parent).map(|p| (parent, p)))
        })
    }

    /// Resolve a name: variables up the chain, then functions, then classes
    pub fn lookup(&self, from: ContextId, name: &str) -> Option<Value> {
        self.chain(from)
            .find_map(|(_, ctx)| ctx.variables.get(name).cloned())
            .or_else(|| {
                self.chain(from)
                    .find_map(|(_, ctx)| ctx.functions.get(name).cloned())
            })
            .or_else(|| {
                self.chain(from)
                    .find_map(|(_, ctx)| ctx.classes.get(name).cloned().map(Value::Class))
            })
    }

    /// Nearest function-table entry with this name
    pub fn lookup_function(&self, from: ContextId, name: &str) -> Option<Value> {
        self.chain(from)
            .find_map(|(_, ctx)| ctx.functions.get(name).cloned())
    }

    /// Context that owns the variable binding for `name`
    pub fn variable_owner(&self, from: ContextId, name: &str) -> Option<ContextId> {
        self.chain(from)
            .find(|(_, ctx)| ctx.variables.contains_key(name))
            .map(|(id, _)| id)
    }

    /// Declare a binding.
    ///
    /// `let`/`const` bind in `at`. `var` reuses an existing `var` binding up
    /// the chain and otherwise binds in `at`.
    pub fn declare(&mut self, at: ContextId, name: JsString, value: Value, kind: BindingKind) {
        let target = if kind == BindingKind::Var {
            self.chain(at)
                .find(|(_, ctx)| ctx.kinds.get(name.as_str()) == Some(&BindingKind::Var))
                .map_or(at, |(id, _)| id)
        } else {
            at
        };
        if let Some(ctx) = self.get_mut(target) {
            ctx.kinds.insert(name.clone(), kind);
            ctx.variables.insert(name, value);
        }
    }

    /// Assign to an existing binding.
    ///
    /// Returns `Ok(false)` when no binding exists, `Err(())` when the binding
    /// is `const`. The const check happens where the binding lives.
    #[allow(clippy::result_unit_err)]
    pub fn assign(&mut self, from: ContextId, name: &str, value: Value) -> Result<bool, ()> {
        let Some(owner) = self.variable_owner(from, name) else {
            return Ok(false);
        };
        let Some(ctx) = self.get_mut(owner) else {
            return Ok(false);
        };
        if ctx.kinds.get(name) == Some(&BindingKind::Const) {
            return Err(());
        }
        if let Some(slot) = ctx.variables.get_mut(name) {
            *slot = value;
        }
        Ok(true)
    }

    /// Capture a context for a closure or class
    pub fn capture(&mut self, id: ContextId) -> CaptureHandle {
        self.mark_captured(id);
        let Some(ctx) = self.get_mut(id) else {
            return CaptureHandle(Rc::new(()));
        };
        if let Some(shared) = ctx.handle.upgrade() {
            return CaptureHandle(shared);
        }
        let shared = Rc::new(());
        ctx.handle = Rc::downgrade(&shared);
        CaptureHandle(shared)
    }

    /// Mark a context and all of its ancestors as captured
    pub fn mark_captured(&mut self, from: ContextId) {
        let mut current = Some(from);
        while let Some(id) = current {
            match self.get_mut(id) {
                Some(ctx) if !ctx.captured => {
                    ctx.captured = true;
                    current = ctx.parent;
                }
                _ => break,
            }
        }
    }

    /// `this` of the nearest context that defines one
    pub fn this_value(&self, from: ContextId) -> Value {
        self.chain(from)
            .find_map(|(_, ctx)| ctx.this_value.clone())
            .unwrap_or_default()
    }

    pub fn home_class(&self, from: ContextId) -> Option<ClassRef> {
        self.chain(from).find_map(|(_, ctx)| ctx.home.clone())
    }

    /// Nearest constructor frame, with the context that holds it
    pub fn construct_frame(&self, from: ContextId) -> Option<(ContextId, ConstructFrame)> {
        self.chain(from)
            .find_map(|(id, ctx)| ctx.construct.clone().map(|frame| (id, frame)))
    }

    pub fn module_path(&self, from: ContextId) -> Option<String> {
        self.chain(from).find_map(|(_, ctx)| ctx.module_path.clone())
    }

    /// Every name visible from `from`, nearest first, without duplicates
    pub fn visible_names(&self, from: ContextId) -> Vec<JsString> {
        let mut names: Vec<JsString> = Vec::new();
        for (_, ctx) in self.chain(from) {
            let all = ctx
                .variables
                .keys()
                .chain(ctx.functions.keys())
                .chain(ctx.classes.keys());
            for name in all {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Variables visible from `from` as `(name, rendered value)`
    pub fn scope_snapshot(&self, from: ContextId, limit: usize) -> Vec<(String, String)> {
        let mut seen: Vec<&JsString> = Vec::new();
        let mut out = Vec::new();
        for (_, ctx) in self.chain(from) {
            // The builtins root is noise in a diagnostic
            if ctx.parent.is_none() {
                break;
            }
            for (name, value) in &ctx.variables {
                if out.len() >= limit {
                    return out;
                }
                if seen.contains(&name) {
                    continue;
                }
                seen.push(name);
                out.push((name.to_string(), truncate(&value.to_display_string(), 60)));
            }
        }
        out
    }

    /// "Did you mean" candidates for an unknown name
    pub fn suggestions(&self, from: ContextId, name: &str, max: usize) -> Vec<String> {
        let mut scored: Vec<(usize, JsString)> = self
            .visible_names(from)
            .into_iter()
            .filter_map(|candidate| {
                let distance = strsim::levenshtein(name, candidate.as_str());
                let related = distance <= 2
                    || (name.len() > 1 && candidate.as_str().contains(name))
                    || (candidate.len() > 1 && name.contains(candidate.as_str()));
                (related && candidate.as_str() != name).then_some((distance, candidate))
            })
            .collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(max)
            .map(|(_, n)| n.to_string())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Collection
// ═══════════════════════════════════════════════════════════════════════════════

/// A shared allocation reached from the arena
struct HeapNode {
    value: Value,
    /// References to it from contexts and other nodes
    internal: usize,
}

impl ContextArena {
    /// Free every context that no root and no live value can reach.
    ///
    /// Must only run while nothing is evaluating. Values held outside the
    /// arena are detected by reference counts: a shared allocation with more
    /// owners than the arena accounts for, or a context with more live
    /// [`CaptureHandle`]s than visible captures, is treated as a root.
    /// Returns the number of contexts freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ContextId>) -> usize {
        let mut nodes: FxHashMap<usize, HeapNode> = FxHashMap::default();
        let mut captures: FxHashMap<ContextId, usize> = FxHashMap::default();
        let mut pending: Vec<Value> = Vec::new();
        for ctx in self.slots.iter().flatten() {
            ctx.for_each_value(|value| pending.push(value.clone()));
        }
        while let Some(value) = pending.pop() {
            let Some(address) = node_address(&value) else {
                continue;
            };
            match nodes.entry(address) {
                Entry::Occupied(mut node) => node.get_mut().internal += 1,
                Entry::Vacant(slot) => {
                    if let Some(id) = captured_context(&value) {
                        *captures.entry(id).or_default() += 1;
                    }
                    for_each_child(&value, |child| pending.push(child.clone()));
                    slot.insert(HeapNode { value, internal: 1 });
                }
            }
        }

        let mut marked: FxHashSet<ContextId> = FxHashSet::default();
        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut contexts: Vec<ContextId> = roots.into_iter().collect();
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(ctx) = slot else { continue };
            let id = ContextId(index as u32);
            if ctx.handle.strong_count() > captures.get(&id).copied().unwrap_or(0) {
                contexts.push(id);
            }
        }
        // One extra owner is the clone held in `nodes`
        pending.extend(
            nodes
                .values()
                .filter(|node| strong_count(&node.value) > node.internal + 1)
                .map(|node| node.value.clone()),
        );

        while !contexts.is_empty() || !pending.is_empty() {
            while let Some(id) = contexts.pop() {
                if !marked.insert(id) {
                    continue;
                }
                if let Some(ctx) = self.get(id) {
                    contexts.extend(ctx.parent);
                    ctx.for_each_value(|value| pending.push(value.clone()));
                }
            }
            while let Some(value) = pending.pop() {
                if let Some(address) = node_address(&value) {
                    if !visited.insert(address) {
                        continue;
                    }
                }
                contexts.extend(captured_context(&value));
                for_each_child(&value, |child| pending.push(child.clone()));
            }
        }
        drop(nodes);

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let id = ContextId(index as u32);
            if slot.is_some() && !marked.contains(&id) {
                *slot = None;
                self.free.push(id.0);
                freed += 1;
            }
        }
        freed
    }
}

impl ExecutionContext {
    fn for_each_value(&self, mut visit: impl FnMut(&Value)) {
        self.variables
            .values()
            .chain(self.functions.values())
            .chain(self.exports.values())
            .chain(self.this_value.iter())
            .for_each(&mut visit);
        for class in self.classes.values().chain(self.home.iter()) {
            visit(&Value::Class(class.clone()));
        }
        if let Some(frame) = &self.construct {
            visit(&Value::Class(frame.class.clone()));
            visit(&Value::Object(frame.instance.clone()));
        }
    }
}

fn node_address(value: &Value) -> Option<usize> {
    match value {
        Value::Function(f) => Some(Rc::as_ptr(f) as *const u8 as usize),
        Value::Class(c) => Some(Rc::as_ptr(c) as *const u8 as usize),
        other => other.heap_address(),
    }
}

fn strong_count(value: &Value) -> usize {
    match value {
        Value::Array(a) => Rc::strong_count(a),
        Value::Object(o) => Rc::strong_count(o),
        Value::Function(f) => Rc::strong_count(f),
        Value::Class(c) => Rc::strong_count(c),
        Value::Map(m) => Rc::strong_count(m),
        Value::Set(s) => Rc::strong_count(s),
        _ => 0,
    }
}

/// Context a closure or script class keeps alive
fn captured_context(value: &Value) -> Option<ContextId> {
    match value {
        Value::Function(f) => match f.as_ref() {
            Function::Closure(closure) => Some(closure.context),
            _ => None,
        },
        Value::Class(class) => match &class.kind {
            ClassKind::Script { context, .. } => Some(*context),
            _ => None,
        },
        _ => None,
    }
}

/// Strong references held by a shared allocation
fn for_each_child(value: &Value, mut visit: impl FnMut(&Value)) {
    match value {
        Value::Array(items) => items.borrow().iter().for_each(visit),
        Value::Object(object) => {
            let object = object.borrow();
            object
                .properties
                .values()
                .chain(object.hidden.values())
                .for_each(&mut visit);
            if let Some(class) = &object.class {
                visit(&Value::Class(class.clone()));
            }
        }
        Value::Map(entries) => {
            for (key, item) in entries.borrow().iter() {
                visit(key);
                visit(item);
            }
        }
        Value::Set(items) => items.borrow().iter().for_each(visit),
        Value::Function(f) => {
            if let Function::Closure(closure) = f.as_ref() {
                closure.this_value.iter().for_each(visit);
            }
        }
        Value::Class(class) => {
            if let Some(parent) = &class.superclass {
                visit(&Value::Class(parent.clone()));
            }
            for table in [&class.methods, &class.getters, &class.setters, &class.statics] {
                table.borrow().values().for_each(&mut visit);
            }
        }
        _ => {}
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with_chain() -> (ContextArena, ContextId, ContextId) {
        let mut arena = ContextArena::new();
        let outer = arena.alloc(ExecutionContext::new(None));
        let inner = arena.alloc(ExecutionContext::new(Some(outer)));
        (arena, outer, inner)
    }

    #[test]
    fn lookup_walks_parents() {
        let (mut arena, outer, inner) = arena_with_chain();
        arena.declare(outer, "x".into(), Value::from(1), BindingKind::Let);
        assert_eq!(arena.lookup(inner, "x"), Some(Value::from(1)));
        assert_eq!(arena.lookup(inner, "y"), None);
    }

    #[test]
    fn let_shadows_in_nearest_context() {
        let (mut arena, outer, inner) = arena_with_chain();
        arena.declare(outer, "x".into(), Value::from(1), BindingKind::Let);
        arena.declare(inner, "x".into(), Value::from(2), BindingKind::Let);
        assert_eq!(arena.lookup(inner, "x"), Some(Value::from(2)));
        assert_eq!(arena.lookup(outer, "x"), Some(Value::from(1)));
    }

    #[test]
    fn var_reuses_hoisted_binding() {
        let (mut arena, outer, inner) = arena_with_chain();
        arena.declare(outer, "v".into(), Value::Undefined, BindingKind::Var);
        arena.declare(inner, "v".into(), Value::from(5), BindingKind::Var);
        assert_eq!(arena.lookup(outer, "v"), Some(Value::from(5)));
        assert!(!arena.get(inner).is_some_and(|c| c.has_binding("v")));
    }

    #[test]
    fn const_assignment_is_rejected_where_it_lives() {
        let (mut arena, outer, inner) = arena_with_chain();
        arena.declare(outer, "c".into(), Value::from(1), BindingKind::Const);
        assert_eq!(arena.assign(inner, "c", Value::from(2)), Err(()));
        assert_eq!(arena.lookup(outer, "c"), Some(Value::from(1)));
        assert_eq!(arena.assign(inner, "missing", Value::from(2)), Ok(false));
    }

    #[test]
    fn release_respects_capture() {
        let (mut arena, outer, inner) = arena_with_chain();
        arena.mark_captured(inner);
        arena.release(inner);
        assert!(arena.get(inner).is_some());
        assert!(arena.get(outer).is_some_and(|c| c.captured));

        let fresh = arena.alloc(ExecutionContext::new(Some(outer)));
        arena.release(fresh);
        assert!(arena.get(fresh).is_none());
        // Freed slots are reused
        let reused = arena.alloc(ExecutionContext::new(None));
        assert_eq!(reused, fresh);
    }

    #[test]
    fn collect_frees_unreachable_contexts() {
        let (mut arena, outer, inner) = arena_with_chain();
        let orphan = arena.alloc(ExecutionContext::new(Some(outer)));
        let held = arena.alloc(ExecutionContext::new(Some(outer)));
        let handle = arena.capture(held);

        let freed = arena.collect([inner]);
        assert_eq!(freed, 1);
        assert!(arena.get(orphan).is_none());
        // Parents of roots and contexts the host still captures survive
        assert!(arena.get(outer).is_some());
        assert!(arena.get(held).is_some());

        drop(handle);
        assert_eq!(arena.collect([inner]), 1);
        assert!(arena.get(held).is_none());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn suggestions_rank_by_distance() {
        let (mut arena, outer, inner) = arena_with_chain();
        for name in ["count", "counter", "total"] {
            arena.declare(outer, name.into(), Value::Null, BindingKind::Let);
        }
        let found = arena.suggestions(inner, "conut", 3);
        assert_eq!(found.first().map(String::as_str), Some("count"));
        assert!(!found.contains(&"total".to_string()));
    }
}
