//! Closures, calls and destructuring

use std::rc::{Rc, Weak};

use futures::FutureExt;

use crate::ast::{
    Expression, FunctionBody, FunctionNode, ObjectPatternProperty, Pattern,
};
use crate::context::{BindingKind, ContextId};
use crate::error::ScriptError;
use crate::interpreter::members::iterable_values;
use crate::interpreter::{EvalFuture, EvalResult, Interpreter, Signal};
use crate::pause::{FrameKind, FrameNode};
use crate::value::{Class, Closure, Function, JsString, NativeFunction, NativeReturn, Value};

/// How a pattern introduces its names
#[derive(Debug, Clone, Copy)]
pub(crate) enum BindMode {
    Declare(BindingKind),
    Assign,
}

impl Interpreter {
    /// Create a closure over `ctx`; the context stays alive with it
    pub(crate) fn create_closure(
        &self,
        node: &Rc<FunctionNode>,
        ctx: ContextId,
        name: Option<JsString>,
        home: Option<Weak<Class>>,
    ) -> Value {
        let capture = self.contexts.borrow_mut().capture(ctx);
        let this_value = node.is_arrow.then(|| self.this_value(ctx));
        Value::Function(Rc::new(Function::Closure(Closure {
            name: node.name().cloned().or(name),
            node: node.clone(),
            context: ctx,
            capture,
            this_value,
            home,
        })))
    }

    /// Evaluate an initializer, naming anonymous functions and classes
    /// after the identifier they are bound to
    pub(crate) async fn eval_named(
        &self,
        expr: &Expression,
        target: &Pattern,
        ctx: ContextId,
    ) -> EvalResult {
        let name = match target {
            Pattern::Identifier(id) => Some(id.name.clone()),
            _ => None,
        };
        self.eval_with_name(expr, name, ctx).await
    }

    pub(crate) async fn eval_with_name(
        &self,
        expr: &Expression,
        name: Option<JsString>,
        ctx: ContextId,
    ) -> EvalResult {
        match (expr, name) {
            (Expression::Function(node) | Expression::Arrow(node), Some(name))
                if node.id.is_none() =>
            {
                Ok(self.create_closure(node, ctx, Some(name), None))
            }
            (Expression::Class(node), Some(name)) if node.id.is_none() => {
                // Class fields evaluate through here, so the future recurses
                let class = Box::pin(self.eval_class(node, ctx, Some(name))).await?;
                Ok(Value::Class(class))
            }
            (other, _) => self.eval_expr(other, ctx).await,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════════

    /// Invoke any callable value
    pub(crate) fn call_function<'a>(
        &'a self,
        callee: Value,
        this: Value,
        args: Vec<Value>,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            let func = match &callee {
                Value::Function(func) => func,
                Value::Class(class) => {
                    return Err(ScriptError::type_mismatch(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        class.name
                    ))
                    .into());
                }
                other => {
                    return Err(ScriptError::type_mismatch(format!(
                        "{} is not a function",
                        other.to_display_string()
                    ))
                    .into());
                }
            };
            match func.as_ref() {
                Function::Closure(closure) => self.call_closure(closure, this, args, false).await,
                Function::Native(native) => self.call_native(native, this, args).await,
                Function::Stub(name) => Err(ScriptError::runtime(format!(
                    "Function '{}' was restored from a snapshot without a definition; \
                     provide it when deserializing",
                    name
                ))
                .into()),
            }
        })
    }

    /// Run a closure body. Expression-bodied arrows and `restricted` bodies
    /// (accessors) are limited to the synchronous subset; every other body
    /// lifts that limit for its own duration.
    pub(crate) async fn call_closure(
        &self,
        closure: &Closure,
        this: Value,
        args: Vec<Value>,
        restricted: bool,
    ) -> EvalResult {
        let name = closure.name.as_ref().map_or("<anonymous>", |n| n.as_str());
        let _guard = self.enter_call(name, closure.node.span, closure.context)?;
        let _mode = if restricted || closure.node.is_sync() {
            self.enter_sync()
        } else {
            self.suspend_sync()
        };

        let call_ctx = self.new_context(closure.context);
        if let Some(frame) = self.contexts.borrow_mut().get_mut(call_ctx) {
            frame.this_value = Some(closure.this_value.clone().unwrap_or(this));
            frame.home = closure.home.as_ref().and_then(Weak::upgrade);
        }

        let result = self.invoke_closure_body(closure, args, call_ctx).await;
        self.finish_context(call_ctx, &result);
        result
    }

    async fn invoke_closure_body(
        &self,
        closure: &Closure,
        args: Vec<Value>,
        ctx: ContextId,
    ) -> EvalResult {
        self.bind_parameters(&closure.node.params, args, ctx).await?;
        let node = &closure.node;
        match &node.body {
            FunctionBody::Expression(expr) => self.eval_expr(expr, ctx).await,
            FunctionBody::Block(_) => {
                let frame = self.push_frame(
                    FrameKind::Function,
                    || FrameNode::Function(node.clone()),
                    ctx,
                    closure.name.as_ref().map(ToString::to_string),
                );
                let result = self.run_function_body(node, ctx).await;
                self.pop_frame(frame, &result);
                result
            }
        }
    }

    /// Hoist and run a function body; `return` becomes the call's value
    pub(crate) async fn run_function_body(&self, node: &FunctionNode, ctx: ContextId) -> EvalResult {
        match &node.body {
            FunctionBody::Block(block) => {
                self.hoist(&block.body, ctx);
                match self.eval_statements(&block.body, ctx).await {
                    Ok(_) => Ok(Value::Undefined),
                    Err(Signal::Return(value)) => Ok(value),
                    Err(signal @ (Signal::Break(_) | Signal::Continue(_))) => {
                        Err(signal.into_error().into())
                    }
                    Err(other) => Err(other),
                }
            }
            FunctionBody::Expression(expr) => self.eval_expr(expr, ctx).await,
        }
    }

    async fn call_native(&self, native: &NativeFunction, this: Value, args: Vec<Value>) -> EvalResult {
        match (native.func)(self, this, args)? {
            NativeReturn::Ready(value) => Ok(value),
            NativeReturn::Pending(future) if self.is_sync() || self.is_blocking() => {
                match future.now_or_never() {
                    Some(result) => Ok(result?),
                    None => Err(ScriptError::sync_unsupported("await").into()),
                }
            }
            NativeReturn::Pending(future) => Ok(future.await?),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Patterns
    // ═══════════════════════════════════════════════════════════════════════════

    /// Bind call arguments to parameters; missing ones are `undefined`
    pub(crate) async fn bind_parameters(
        &self,
        params: &[Pattern],
        args: Vec<Value>,
        ctx: ContextId,
    ) -> EvalResult<()> {
        let mut args = args.into_iter();
        let mode = BindMode::Declare(BindingKind::Let);
        for param in params {
            match param {
                Pattern::Rest(rest) => {
                    let remaining: Vec<Value> = args.by_ref().collect();
                    self.bind_pattern(&rest.argument, Value::array(remaining), ctx, mode)
                        .await?;
                }
                other => {
                    let arg = args.next().unwrap_or_default();
                    self.bind_pattern(other, arg, ctx, mode).await?;
                }
            }
        }
        Ok(())
    }

    /// Bind or assign every name in `pattern` from `value`
    pub(crate) fn bind_pattern<'a>(
        &'a self,
        pattern: &'a Pattern,
        value: Value,
        ctx: ContextId,
        mode: BindMode,
    ) -> EvalFuture<'a, ()> {
        Box::pin(async move {
            match pattern {
                Pattern::Identifier(id) => match mode {
                    BindMode::Declare(kind) => {
                        self.declare(ctx, id.name.clone(), value, kind);
                        Ok(())
                    }
                    BindMode::Assign => Ok(self.assign_variable(ctx, &id.name, value)?),
                },

                Pattern::Object(object) => {
                    if value.is_nullish() {
                        return Err(ScriptError::type_mismatch(format!(
                            "Cannot destructure '{}' as it is {}",
                            value.to_display_string(),
                            value.type_of()
                        ))
                        .into());
                    }
                    let mut used: Vec<JsString> = Vec::new();
                    for prop in &object.properties {
                        match prop {
                            ObjectPatternProperty::KeyValue { key, value: target, .. } => {
                                let key = self.property_name(key, ctx).await?;
                                let item = self.get_member(&value, &key)?;
                                used.push(key);
                                self.bind_pattern(target, item, ctx, mode).await?;
                            }
                            ObjectPatternProperty::Rest(target) => {
                                let rest = match &value {
                                    Value::Object(obj) => Value::object_from(
                                        obj.borrow()
                                            .properties
                                            .iter()
                                            .filter(|(k, _)| !used.contains(k))
                                            .map(|(k, v)| (k.clone(), v.clone())),
                                    ),
                                    _ => Value::object_from(Vec::<(JsString, Value)>::new()),
                                };
                                self.bind_pattern(target, rest, ctx, mode).await?;
                            }
                        }
                    }
                    Ok(())
                }

                Pattern::Array(array) => {
                    let items = iterable_values(&value, "value")?;
                    for (index, element) in array.elements.iter().enumerate() {
                        match element {
                            None => {}
                            Some(Pattern::Rest(rest)) => {
                                let remaining = items.get(index..).map(<[Value]>::to_vec);
                                let remaining = Value::array(remaining.unwrap_or_default());
                                self.bind_pattern(&rest.argument, remaining, ctx, mode)
                                    .await?;
                            }
                            Some(target) => {
                                let item = items.get(index).cloned().unwrap_or_default();
                                self.bind_pattern(target, item, ctx, mode).await?;
                            }
                        }
                    }
                    Ok(())
                }

                Pattern::Assignment(assign) => {
                    let value = match value {
                        Value::Undefined => {
                            self.eval_named(&assign.right, &assign.left, ctx).await?
                        }
                        other => other,
                    };
                    self.bind_pattern(&assign.left, value, ctx, mode).await
                }

                Pattern::Rest(rest) => self.bind_pattern(&rest.argument, value, ctx, mode).await,
            }
        })
    }
}
