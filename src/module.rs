//! Module resolution, caching and loading
//!
//! Resolution is delegated to a [`ModuleResolver`]. Loaded modules live in a
//! per-interpreter [`ModuleCache`] keyed by resolved path. A module's exports
//! object is inserted into the cache before its body runs, so a circular
//! import sees the live, partially filled object instead of recursing.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use indexmap::IndexMap;

use crate::ast::{ExportDeclaration, ExportKind, ImportDeclaration, ImportSpecifier, Statement};
use crate::context::{BindingKind, ContextId};
use crate::error::ScriptError;
use crate::interpreter::{EvalResult, Interpreter, Signal};
use crate::pause::{FrameKind, FrameNode};
use crate::value::{CheapClone, JsString, Object, ObjectRef, Value};

/// Source code located by a resolver
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub code: String,
    /// Canonical path; the cache key
    pub path: String,
    pub metadata: Option<serde_json::Value>,
}

/// Host-provided module lookup
pub trait ModuleResolver {
    /// Locate `path`, relative to the importing module's path when given
    fn resolve<'a>(
        &'a self,
        path: &'a str,
        from: Option<&'a str>,
    ) -> LocalBoxFuture<'a, Result<ResolvedModule, ScriptError>>;

    fn exists<'a>(&'a self, path: &'a str, from: Option<&'a str>) -> LocalBoxFuture<'a, bool>;

    /// Known module paths, optionally filtered by prefix
    fn list<'a>(&'a self, prefix: Option<&'a str>) -> LocalBoxFuture<'a, Vec<String>>;
}

/// Resolver over an in-memory `path -> source` table
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    modules: IndexMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, path: &str, code: &str) -> Self {
        self.insert(path, code);
        self
    }

    pub fn insert(&mut self, path: &str, code: &str) {
        self.modules
            .insert(normalize_path(path, None), code.to_string());
    }

    fn find(&self, path: &str, from: Option<&str>) -> Option<(String, &String)> {
        let base = normalize_path(path, from);
        ["", ".js", ".ts", "/index.js"].iter().find_map(|suffix| {
            let candidate = format!("{}{}", base, suffix);
            self.modules
                .get(&candidate)
                .map(|code| (candidate, code))
        })
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve<'a>(
        &'a self,
        path: &'a str,
        from: Option<&'a str>,
    ) -> LocalBoxFuture<'a, Result<ResolvedModule, ScriptError>> {
        Box::pin(async move {
            let (path_found, code) = self.find(path, from).ok_or_else(|| {
                ScriptError::module_error(format!("Cannot find module '{}'", path))
            })?;
            Ok(ResolvedModule {
                code: code.clone(),
                path: path_found,
                metadata: None,
            })
        })
    }

    fn exists<'a>(&'a self, path: &'a str, from: Option<&'a str>) -> LocalBoxFuture<'a, bool> {
        Box::pin(async move { self.find(path, from).is_some() })
    }

    fn list<'a>(&'a self, prefix: Option<&'a str>) -> LocalBoxFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.modules
                .keys()
                .filter(|path| prefix.is_none_or(|p| path.starts_with(p)))
                .cloned()
                .collect()
        })
    }
}

/// Join a relative specifier onto the importer's directory and fold `.`/`..`
pub fn normalize_path(path: &str, from: Option<&str>) -> String {
    let relative = path.starts_with("./") || path.starts_with("../");
    let joined = match from {
        Some(from) if relative => match from.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, path),
            None => path.to_string(),
        },
        _ => path.to_string(),
    };

    let absolute = joined.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    let folded = parts.join("/");
    if absolute {
        format!("/{}", folded)
    } else {
        folded
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModuleState {
    /// Body running; exports may be incomplete
    Loading,
    Loaded,
}

pub(crate) struct ModuleRecord {
    pub state: ModuleState,
    pub exports: ObjectRef,
    pub context: ContextId,
}

/// Loaded modules keyed by resolved path
#[derive(Default)]
pub(crate) struct ModuleCache {
    records: IndexMap<String, ModuleRecord>,
}

impl ModuleCache {
    pub fn exports_of(&self, path: &str) -> Option<ObjectRef> {
        self.records.get(path).map(|r| r.exports.cheap_clone())
    }

    pub fn state_of(&self, path: &str) -> Option<ModuleState> {
        self.records.get(path).map(|r| r.state)
    }

    fn insert(&mut self, path: String, record: ModuleRecord) {
        self.records.insert(path, record);
    }

    pub fn mark_loaded(&mut self, path: &str) {
        if let Some(record) = self.records.get_mut(path) {
            record.state = ModuleState::Loaded;
        }
    }

    fn remove(&mut self, path: &str) -> Option<ModuleRecord> {
        self.records.shift_remove(path)
    }

    pub fn contexts(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.records.values().map(|r| r.context)
    }

    /// Forget every module, returning their contexts for release
    pub fn clear(&mut self) -> Vec<ContextId> {
        self.records.drain(..).map(|(_, r)| r.context).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════════════

impl Interpreter {
    /// Import a module from the host and return its exports object
    pub async fn import_module(&self, path: &str) -> Result<Value, ScriptError> {
        let (_, exports) = self
            .load_module(path, self.global_context())
            .await
            .map_err(Signal::into_error)?;
        Ok(Value::Object(exports))
    }

    /// Number of modules in the cache, including ones still loading
    pub fn loaded_module_count(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Resolve, then load `specifier` unless it is already cached
    async fn load_module(&self, specifier: &str, ctx: ContextId) -> EvalResult<(String, ObjectRef)> {
        let resolver = self.resolver().ok_or_else(|| {
            ScriptError::module_error(format!(
                "Cannot import '{}': no module resolver is configured",
                specifier
            ))
        })?;
        let from = self.contexts.borrow().module_path(ctx);
        let resolved = resolver.resolve(specifier, from.as_deref()).await?;
        let path = resolved.path;

        if let Some(exports) = self.modules.borrow().exports_of(&path) {
            tracing::debug!(%path, "module cache hit");
            return Ok((path, exports));
        }
        tracing::debug!(%path, "loading module");

        let exports = Rc::new(RefCell::new(Object::new()));
        let module_ctx = self.new_context(self.root_context());
        if let Some(frame) = self.contexts.borrow_mut().get_mut(module_ctx) {
            frame.module_path = Some(path.clone());
            frame.this_value = Some(Value::Undefined);
            frame.captured = true;
        }
        self.modules.borrow_mut().insert(
            path.clone(),
            ModuleRecord {
                state: ModuleState::Loading,
                exports: exports.cheap_clone(),
                context: module_ctx,
            },
        );

        let result = self.run_module(&resolved.code, &path, module_ctx).await;
        match result {
            Ok(()) => {
                self.modules.borrow_mut().mark_loaded(&path);
                tracing::debug!(%path, "module loaded");
                Ok((path, exports))
            }
            Err(Signal::Pause) => Err(Signal::Pause),
            Err(other) => {
                self.modules.borrow_mut().remove(&path);
                self.contexts.borrow_mut().remove(module_ctx);
                Err(other)
            }
        }
    }

    async fn run_module(&self, code: &str, path: &str, ctx: ContextId) -> EvalResult<()> {
        let program = self.parse(code)?;
        let body = program.body;
        let frame = self.push_frame(
            FrameKind::Module,
            || FrameNode::Module(body.clone()),
            ctx,
            Some(path.to_string()),
        );
        let result = self.run_program(&body, ctx).await;
        self.pop_frame(frame, &result);
        result.map(|_| ())
    }

    /// `import ... from "specifier"`
    pub(crate) async fn eval_import(&self, import: &ImportDeclaration, ctx: ContextId) -> EvalResult<()> {
        let (path, exports) = self.load_module(import.source.as_str(), ctx).await?;
        let complete = self.modules.borrow().state_of(&path) == Some(ModuleState::Loaded);

        for specifier in &import.specifiers {
            let (local, value) = match specifier {
                ImportSpecifier::Namespace { local } => (local, Value::Object(exports.cheap_clone())),
                ImportSpecifier::Named { imported, local } => {
                    (local, self.read_export(&exports, imported, &path, complete)?)
                }
                ImportSpecifier::Default { local } => {
                    (local, self.read_export(&exports, &JsString::from("default"), &path, complete)?)
                }
            };
            self.declare(ctx, local.clone(), value, BindingKind::Const);
        }
        Ok(())
    }

    /// Named export of a module. Missing names are an error only once the
    /// module finished loading; a circular importer sees `undefined`.
    fn read_export(
        &self,
        exports: &ObjectRef,
        name: &JsString,
        path: &str,
        complete: bool,
    ) -> Result<Value, ScriptError> {
        match exports.borrow().properties.get(name.as_str()) {
            Some(value) => Ok(value.clone()),
            None if complete => Err(ScriptError::module_error(format!(
                "Module '{}' has no export named '{}'",
                path, name
            ))),
            None => Ok(Value::Undefined),
        }
    }

    /// `export ...`
    pub(crate) async fn eval_export(
        &self,
        export: &ExportDeclaration,
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        match &export.kind {
            ExportKind::Declaration(stmt) => {
                let completion = self.eval_stmt(stmt, ctx).await?;
                for name in declared_names(stmt) {
                    let value = self.lookup(ctx, name.as_str())?;
                    self.write_export(ctx, name, value);
                }
                Ok(completion)
            }

            ExportKind::Default(expr) => {
                let value = self
                    .eval_with_name(expr, Some(JsString::from("default")), ctx)
                    .await?;
                self.write_export(ctx, JsString::from("default"), value);
                Ok(None)
            }

            ExportKind::Named {
                specifiers,
                source: None,
            } => {
                for specifier in specifiers {
                    let value = self.lookup(ctx, specifier.local.as_str())?;
                    self.write_export(ctx, specifier.exported.clone(), value);
                }
                Ok(None)
            }

            ExportKind::Named {
                specifiers,
                source: Some(source),
            } => {
                let (path, exports) = self.load_module(source.as_str(), ctx).await?;
                let complete = self.modules.borrow().state_of(&path) == Some(ModuleState::Loaded);
                for specifier in specifiers {
                    let value = self.read_export(&exports, &specifier.local, &path, complete)?;
                    self.write_export(ctx, specifier.exported.clone(), value);
                }
                Ok(None)
            }

            ExportKind::All { source } => {
                let (_, exports) = self.load_module(source.as_str(), ctx).await?;
                let entries: Vec<(JsString, Value)> = exports
                    .borrow()
                    .properties
                    .iter()
                    .filter(|(name, _)| name.as_str() != "default")
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                for (name, value) in entries {
                    self.write_export(ctx, name, value);
                }
                Ok(None)
            }
        }
    }
}

/// Names an exported declaration introduces
fn declared_names(stmt: &Statement) -> Vec<JsString> {
    let mut names = Vec::new();
    match stmt {
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarations {
                declarator.id.bound_names(&mut names);
            }
        }
        Statement::FunctionDeclaration(node) => names.extend(node.name().cloned()),
        Statement::ClassDeclaration(node) => names.extend(node.name().cloned()),
        _ => {}
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./b.js", Some("/lib/a.js")), "/lib/b.js");
        assert_eq!(normalize_path("../util", Some("/lib/sub/a.js")), "/lib/util");
        assert_eq!(normalize_path("lib/./x.js", None), "lib/x.js");
        assert_eq!(normalize_path("./b", Some("a.js")), "b");
    }

    #[tokio::test]
    async fn test_memory_resolver_extensions() {
        let resolver = MemoryResolver::new()
            .with_module("/lib/math.js", "export const one = 1;")
            .with_module("/lib/util/index.js", "export default 2;");

        let found = resolver.resolve("./math", Some("/lib/main.js")).await.unwrap();
        assert_eq!(found.path, "/lib/math.js");
        let index = resolver.resolve("/lib/util", None).await.unwrap();
        assert_eq!(index.path, "/lib/util/index.js");

        assert!(resolver.exists("/lib/math", None).await);
        assert!(!resolver.exists("/lib/missing", None).await);
        assert!(resolver.resolve("/lib/missing", None).await.is_err());
        assert_eq!(resolver.list(Some("/lib/u")).await, vec!["/lib/util/index.js"]);
    }
}
