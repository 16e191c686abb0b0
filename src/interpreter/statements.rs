//! Statement evaluation, hoisting and loops

use std::rc::Rc;

use crate::ast::{
    CatchClause, DoWhileStatement, ExportDeclaration, ExportKind, ForBinding, ForInStatement,
    ForInit, ForOfStatement, ForStatement, FunctionBody, FunctionNode, Statement,
    SwitchStatement, TryStatement, VariableDeclaration, VariableKind, WhileStatement,
    collect_var_names,
};
use crate::context::{BindingKind, ContextId};
use crate::error::ScriptError;
use crate::interpreter::functions::BindMode;
use crate::interpreter::members::{for_in_keys, iterable_values};
use crate::interpreter::{EvalFuture, EvalResult, Interpreter, Signal};
use crate::pause::{CallFrame, FrameKind, FrameNode};
use crate::value::{Function, JsString, Value};

/// What a loop does after one body evaluation
enum Flow {
    Next,
    Exit,
}

/// Fold a body completion into loop control, honouring the loop's labels
fn loop_flow(
    result: EvalResult<Option<Value>>,
    labels: &[JsString],
    last: &mut Option<Value>,
) -> EvalResult<Flow> {
    match result {
        Ok(value) => {
            if value.is_some() {
                *last = value;
            }
            Ok(Flow::Next)
        }
        Err(Signal::Break(None)) => Ok(Flow::Exit),
        Err(Signal::Break(Some(label))) if labels.contains(&label) => Ok(Flow::Exit),
        Err(Signal::Continue(None)) => Ok(Flow::Next),
        Err(Signal::Continue(Some(label))) if labels.contains(&label) => Ok(Flow::Next),
        Err(other) => Err(other),
    }
}

pub(crate) fn binding_kind(kind: VariableKind) -> BindingKind {
    match kind {
        VariableKind::Var => BindingKind::Var,
        VariableKind::Let => BindingKind::Let,
        VariableKind::Const => BindingKind::Const,
    }
}

/// Function declarations of a body, with whether each is exported
fn function_declarations(body: &[Statement]) -> impl Iterator<Item = (&Rc<FunctionNode>, bool)> {
    body.iter().filter_map(|stmt| match stmt {
        Statement::FunctionDeclaration(node) => Some((node, false)),
        Statement::Export(ExportDeclaration {
            kind: ExportKind::Declaration(inner),
            ..
        }) => match inner.as_ref() {
            Statement::FunctionDeclaration(node) => Some((node, true)),
            _ => None,
        },
        _ => None,
    })
}

/// Statements the synchronous evaluator accepts
fn check_sync_statement(stmt: &Statement) -> Result<(), ScriptError> {
    match stmt {
        Statement::Block(_)
        | Statement::If(_)
        | Statement::Return(_)
        | Statement::Throw(_)
        | Statement::Expression(_)
        | Statement::VariableDeclaration(_)
        | Statement::FunctionDeclaration(_)
        | Statement::Empty(_) => Ok(()),
        other => Err(ScriptError::sync_unsupported(other.type_name())),
    }
}

impl Interpreter {
    /// Evaluate one statement; `Some` carries a completion value
    pub(crate) fn eval_stmt<'a>(
        &'a self,
        stmt: &'a Statement,
        ctx: ContextId,
    ) -> EvalFuture<'a, Option<Value>> {
        self.eval_labeled_stmt(stmt, ctx, &[])
    }

    fn eval_labeled_stmt<'a>(
        &'a self,
        stmt: &'a Statement,
        ctx: ContextId,
        labels: &'a [JsString],
    ) -> EvalFuture<'a, Option<Value>> {
        Box::pin(async move {
            let result = self.eval_stmt_checked(stmt, ctx, labels).await;
            result.map_err(|signal| self.annotate(signal, stmt.span(), ctx))
        })
    }

    async fn eval_stmt_checked(
        &self,
        stmt: &Statement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        if self.is_sync() {
            check_sync_statement(stmt)?;
        } else {
            self.checkpoint(stmt.type_name(), stmt.span()).await?;
        }

        match stmt {
            Statement::Expression(expr) => Ok(Some(self.eval_expr(&expr.expression, ctx).await?)),

            Statement::VariableDeclaration(decl) => {
                self.eval_variable_declaration(decl, ctx).await?;
                Ok(None)
            }

            // Hoisted when the enclosing body was entered
            Statement::FunctionDeclaration(_) | Statement::Empty(_) => Ok(None),

            Statement::ClassDeclaration(node) => {
                let class = self.eval_class(node, ctx, None).await?;
                if let Some(ctx) = self.contexts.borrow_mut().get_mut(ctx) {
                    ctx.classes.insert(class.name.clone(), class);
                }
                Ok(None)
            }

            Statement::Block(block) => self.eval_block(&block.body, ctx).await,

            Statement::If(if_stmt) => {
                let test = self.eval_expr(&if_stmt.test, ctx).await?;
                if test.to_boolean() {
                    self.eval_stmt(&if_stmt.consequent, ctx).await
                } else if let Some(alt) = &if_stmt.alternate {
                    self.eval_stmt(alt, ctx).await
                } else {
                    Ok(None)
                }
            }

            Statement::Switch(switch) => self.eval_switch(switch, ctx).await,

            Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::While(_)
            | Statement::DoWhile(_) => {
                let frame = self.push_frame(
                    FrameKind::Loop,
                    || FrameNode::Loop(Box::new(stmt.clone())),
                    ctx,
                    None,
                );
                let result = self.eval_loop(stmt, ctx, labels).await;
                self.pop_frame(frame, &result);
                result
            }

            Statement::Try(try_stmt) => self.eval_try(try_stmt, ctx).await,

            Statement::Return(ret) => {
                let value = match &ret.argument {
                    Some(arg) => self.eval_expr(arg, ctx).await?,
                    None => Value::Undefined,
                };
                Err(Signal::Return(value))
            }

            Statement::Break(jump) => Err(Signal::Break(jump.label.clone())),
            Statement::Continue(jump) => Err(Signal::Continue(jump.label.clone())),

            Statement::Throw(throw) => {
                let value = self.eval_expr(&throw.argument, ctx).await?;
                Err(Signal::Throw(value))
            }

            Statement::Labeled(labeled) => {
                let mut nested = labels.to_vec();
                nested.push(labeled.label.clone());
                match self.eval_labeled_stmt(&labeled.body, ctx, &nested).await {
                    Err(Signal::Break(Some(label))) if label == labeled.label => Ok(None),
                    other => other,
                }
            }

            Statement::Import(import) => {
                self.eval_import(import, ctx).await?;
                Ok(None)
            }

            Statement::Export(export) => self.eval_export(export, ctx).await,
        }
    }

    /// Evaluate statements in order, keeping the last completion value
    pub(crate) async fn eval_statements(
        &self,
        body: &[Statement],
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        let mut last = None;
        for stmt in body {
            if let Some(value) = self.eval_stmt(stmt, ctx).await? {
                last = Some(value);
            }
        }
        Ok(last)
    }

    /// Run a block in a fresh context with a `Block` frame
    pub(crate) async fn eval_block(
        &self,
        body: &Rc<[Statement]>,
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        let block_ctx = self.new_context(ctx);
        let frame = self.push_frame(
            FrameKind::Block,
            || FrameNode::Block(body.clone()),
            block_ctx,
            None,
        );
        let result = self.run_block_body(body, block_ctx).await;
        self.pop_frame(frame, &result);
        self.finish_context(block_ctx, &result);
        result
    }

    pub(crate) async fn run_block_body(
        &self,
        body: &[Statement],
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        self.hoist_functions(body, ctx);
        self.eval_statements(body, ctx).await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Hoisting
    // ═══════════════════════════════════════════════════════════════════════════

    /// Pre-bind `var` names and function declarations of a function or program body
    pub(crate) fn hoist(&self, body: &[Statement], ctx: ContextId) {
        let mut names = Vec::new();
        collect_var_names(body, &mut names);
        if !names.is_empty() {
            let mut contexts = self.contexts.borrow_mut();
            if let Some(context) = contexts.get_mut(ctx) {
                for name in names {
                    if !context.variables.contains_key(name.as_str()) {
                        context.kinds.insert(name.clone(), BindingKind::Var);
                        context.variables.insert(name, Value::Undefined);
                    }
                }
            }
        }
        self.hoist_functions(body, ctx);
    }

    /// Bind function declarations before any statement runs
    pub(crate) fn hoist_functions(&self, body: &[Statement], ctx: ContextId) {
        for (node, exported) in function_declarations(body) {
            self.bind_declaration(node, exported, ctx);
        }
    }

    /// Re-create declarations that a snapshot restored as stubs, so a resumed
    /// frame can call functions declared in its own body
    pub(crate) fn rebind_declarations(&self, body: &[Statement], ctx: ContextId) {
        for (node, exported) in function_declarations(body) {
            let Some(name) = node.name() else { continue };
            let stub = self
                .contexts
                .borrow()
                .get(ctx)
                .and_then(|context| context.functions.get(name.as_str()))
                .is_some_and(|value| {
                    matches!(value, Value::Function(f) if matches!(f.as_ref(), Function::Stub(_)))
                });
            if stub {
                self.bind_declaration(node, exported, ctx);
            }
        }
    }

    /// Rebind stub declarations visible to a restored frame's body
    pub(crate) fn rebind_frame(&self, frame: &CallFrame) {
        match &frame.node {
            FrameNode::Program(body) | FrameNode::Module(body) | FrameNode::Block(body) => {
                self.rebind_declarations(body, frame.context)
            }
            FrameNode::Function(node) => {
                if let FunctionBody::Block(block) = &node.body {
                    self.rebind_declarations(&block.body, frame.context);
                }
            }
            FrameNode::Loop(_) => {}
        }
    }

    fn bind_declaration(&self, node: &Rc<FunctionNode>, exported: bool, ctx: ContextId) {
        let Some(name) = node.name().cloned() else {
            return;
        };
        let closure = self.create_closure(node, ctx, None, None);
        if let Some(context) = self.contexts.borrow_mut().get_mut(ctx) {
            context.functions.insert(name.clone(), closure.clone());
        }
        if exported {
            self.write_export(ctx, name, closure);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Declarations
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) async fn eval_variable_declaration(
        &self,
        decl: &VariableDeclaration,
        ctx: ContextId,
    ) -> EvalResult<()> {
        let kind = binding_kind(decl.kind);
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval_named(init, &declarator.id, ctx).await?,
                // `var x;` keeps the hoisted value
                None if kind == BindingKind::Var => continue,
                None => Value::Undefined,
            };
            self.bind_pattern(&declarator.id, value, ctx, BindMode::Declare(kind))
                .await?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Loops
    // ═══════════════════════════════════════════════════════════════════════════

    async fn eval_loop(
        &self,
        stmt: &Statement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        match stmt {
            Statement::While(s) => self.eval_while(s, ctx, labels).await,
            Statement::DoWhile(s) => self.eval_do_while(s, ctx, labels).await,
            Statement::For(s) => {
                let loop_ctx = self.new_context(ctx);
                let result = self.eval_for(s, loop_ctx, labels).await;
                self.finish_context(loop_ctx, &result);
                result
            }
            Statement::ForOf(s) => self.eval_for_of(s, ctx, labels).await,
            Statement::ForIn(s) => self.eval_for_in(s, ctx, labels).await,
            _ => Ok(None),
        }
    }

    async fn eval_while(
        &self,
        s: &WhileStatement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        let mut last = None;
        while self.eval_expr(&s.test, ctx).await?.to_boolean() {
            let body = self.eval_stmt(&s.body, ctx).await;
            if let Flow::Exit = loop_flow(body, labels, &mut last)? {
                break;
            }
        }
        Ok(last)
    }

    async fn eval_do_while(
        &self,
        s: &DoWhileStatement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        let mut last = None;
        loop {
            let body = self.eval_stmt(&s.body, ctx).await;
            if let Flow::Exit = loop_flow(body, labels, &mut last)? {
                break;
            }
            if !self.eval_expr(&s.test, ctx).await?.to_boolean() {
                break;
            }
        }
        Ok(last)
    }

    async fn eval_for(
        &self,
        s: &ForStatement,
        loop_ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        // let/const loop variables get a fresh binding per iteration
        let mut per_iteration: Vec<JsString> = Vec::new();
        let mut per_iteration_kind = BindingKind::Let;
        match &s.init {
            Some(ForInit::Variable(decl)) => {
                if decl.kind != VariableKind::Var {
                    per_iteration_kind = binding_kind(decl.kind);
                    for declarator in &decl.declarations {
                        declarator.id.bound_names(&mut per_iteration);
                    }
                }
                self.eval_variable_declaration(decl, loop_ctx).await?;
            }
            Some(ForInit::Expression(expr)) => {
                self.eval_expr(expr, loop_ctx).await?;
            }
            None => {}
        }

        let mut last = None;
        loop {
            if let Some(test) = &s.test {
                if !self.eval_expr(test, loop_ctx).await?.to_boolean() {
                    break;
                }
            }

            let body = if per_iteration.is_empty() {
                self.eval_stmt(&s.body, loop_ctx).await
            } else {
                let iter_ctx = self.new_context(loop_ctx);
                self.copy_bindings(loop_ctx, iter_ctx, &per_iteration, Some(per_iteration_kind));
                let body = self.eval_stmt(&s.body, iter_ctx).await;
                if !matches!(body, Err(Signal::Pause)) {
                    self.copy_bindings(iter_ctx, loop_ctx, &per_iteration, None);
                }
                self.finish_context(iter_ctx, &body);
                body
            };
            if let Flow::Exit = loop_flow(body, labels, &mut last)? {
                break;
            }

            if let Some(update) = &s.update {
                self.eval_expr(update, loop_ctx).await?;
            }
        }
        Ok(last)
    }

    /// Copy bindings between contexts; `kind` declares them, `None` overwrites
    fn copy_bindings(
        &self,
        from: ContextId,
        to: ContextId,
        names: &[JsString],
        kind: Option<BindingKind>,
    ) {
        let mut contexts = self.contexts.borrow_mut();
        let values: Vec<(JsString, Value)> = match contexts.get(from) {
            Some(source) => names
                .iter()
                .filter_map(|name| {
                    source
                        .variables
                        .get(name.as_str())
                        .map(|v| (name.clone(), v.clone()))
                })
                .collect(),
            None => return,
        };
        let Some(target) = contexts.get_mut(to) else {
            return;
        };
        for (name, value) in values {
            if let Some(kind) = kind {
                target.kinds.insert(name.clone(), kind);
            }
            target.variables.insert(name, value);
        }
    }

    async fn eval_for_of(
        &self,
        s: &ForOfStatement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        let iterable = self.eval_expr(&s.right, ctx).await?;
        let items = iterable_values(&iterable, &s.right.describe())?;
        self.eval_for_each(&s.left, items, &s.body, ctx, labels)
            .await
    }

    async fn eval_for_in(
        &self,
        s: &ForInStatement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        let object = self.eval_expr(&s.right, ctx).await?;
        let keys = for_in_keys(&object).into_iter().map(Value::String).collect();
        self.eval_for_each(&s.left, keys, &s.body, ctx, labels)
            .await
    }

    async fn eval_for_each(
        &self,
        left: &ForBinding,
        items: Vec<Value>,
        body: &Statement,
        ctx: ContextId,
        labels: &[JsString],
    ) -> EvalResult<Option<Value>> {
        let mut last = None;
        for item in items {
            let iter_ctx = self.new_context(ctx);
            let bound = match left {
                ForBinding::Declaration { kind, pattern } => {
                    self.bind_pattern(pattern, item, iter_ctx, BindMode::Declare(binding_kind(*kind)))
                        .await
                }
                ForBinding::Pattern(pattern) => {
                    self.bind_pattern(pattern, item, iter_ctx, BindMode::Assign)
                        .await
                }
            };
            let result = match bound {
                Ok(()) => self.eval_stmt(body, iter_ctx).await,
                Err(signal) => Err(signal),
            };
            self.finish_context(iter_ctx, &result);
            if let Flow::Exit = loop_flow(result, labels, &mut last)? {
                break;
            }
        }
        Ok(last)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // switch / try
    // ═══════════════════════════════════════════════════════════════════════════

    async fn eval_switch(
        &self,
        switch: &SwitchStatement,
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        let discriminant = self.eval_expr(&switch.discriminant, ctx).await?;
        let switch_ctx = self.new_context(ctx);
        let result = self.eval_switch_cases(switch, &discriminant, switch_ctx).await;
        self.finish_context(switch_ctx, &result);
        result
    }

    async fn eval_switch_cases(
        &self,
        switch: &SwitchStatement,
        discriminant: &Value,
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        let mut start = None;
        for (index, case) in switch.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval_expr(test, ctx).await?.strict_equals(discriminant) {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| switch.cases.iter().position(|c| c.test.is_none()));
        let Some(start) = start else {
            return Ok(None);
        };

        let mut last = None;
        // Fall through from the matched case until a break
        for case in switch.cases.iter().skip(start) {
            self.hoist_functions(&case.consequent, ctx);
            match self.eval_statements(&case.consequent, ctx).await {
                Ok(value) => {
                    if value.is_some() {
                        last = value;
                    }
                }
                Err(Signal::Break(None)) => return Ok(last),
                Err(other) => return Err(other),
            }
        }
        Ok(last)
    }

    async fn eval_try(&self, try_stmt: &TryStatement, ctx: ContextId) -> EvalResult<Option<Value>> {
        let result = self.eval_block(&try_stmt.block.body, ctx).await;

        let result = match (result, &try_stmt.handler) {
            (Err(signal @ (Signal::Throw(_) | Signal::Error(_))), Some(handler)) => {
                let thrown = match signal {
                    Signal::Throw(value) => value,
                    Signal::Error(err) => self.error_to_value(&err),
                    _ => Value::Undefined,
                };
                self.eval_catch(handler, thrown, ctx).await
            }
            (other, _) => other,
        };

        let Some(finalizer) = &try_stmt.finalizer else {
            return result;
        };
        // A pause unwinds without running user cleanup
        if matches!(result, Err(Signal::Pause)) {
            return result;
        }
        self.eval_block(&finalizer.body, ctx).await?;
        result
    }

    async fn eval_catch(
        &self,
        handler: &CatchClause,
        thrown: Value,
        ctx: ContextId,
    ) -> EvalResult<Option<Value>> {
        let catch_ctx = self.new_context(ctx);
        let result = async {
            if let Some(param) = &handler.param {
                self.bind_pattern(param, thrown, catch_ctx, BindMode::Declare(BindingKind::Let))
                    .await?;
            }
            self.eval_block(&handler.body.body, catch_ctx).await
        }
        .await;
        self.finish_context(catch_ctx, &result);
        result
    }
}
