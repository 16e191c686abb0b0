//! Class definitions, construction and `super`

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{ClassMember, ClassNode, FunctionNode, MethodKind};
use crate::context::{BindingKind, ConstructFrame, ContextId};
use crate::error::ScriptError;
use crate::interpreter::builtins::construct_builtin;
use crate::interpreter::{EvalFuture, EvalResult, Interpreter};
use crate::pause::{FrameKind, FrameNode};
use crate::value::{
    BuiltinClass, CheapClone, Class, ClassKind, ClassRef, FieldInit, JsString, Object, ObjectRef,
    Value,
};

impl Interpreter {
    /// Evaluate a class declaration or expression
    pub(crate) async fn eval_class(
        &self,
        node: &ClassNode,
        ctx: ContextId,
        inferred_name: Option<JsString>,
    ) -> EvalResult<ClassRef> {
        let superclass = match &node.super_class {
            Some(expr) => Some(self.eval_superclass(expr, ctx).await?),
            None => None,
        };
        let name = node
            .name()
            .cloned()
            .or(inferred_name)
            .unwrap_or_else(|| JsString::from("anonymous"));
        tracing::trace!(class = %name, "define class");

        let class_ctx = self.new_context(ctx);
        let capture = self.contexts.borrow_mut().capture(class_ctx);

        let constructor = node.members.iter().find_map(|member| match member {
            ClassMember::Constructor(function) => Some(function.clone()),
            _ => None,
        });
        let class = Rc::new(Class::new(
            name,
            superclass,
            ClassKind::Script {
                constructor,
                context: class_ctx,
                capture,
            },
        ));
        if let Some(id) = &node.id {
            self.declare(
                class_ctx,
                id.name.clone(),
                Value::Class(class.cheap_clone()),
                BindingKind::Const,
            );
        }

        let mut static_fields = Vec::new();
        for member in &node.members {
            match member {
                ClassMember::Constructor(_) => {}
                ClassMember::Method {
                    key,
                    function,
                    kind,
                    is_static,
                } => {
                    let key = self.property_name(key, class_ctx).await?;
                    let method = self.create_closure(
                        function,
                        class_ctx,
                        Some(key.clone()),
                        Some(Rc::downgrade(&class)),
                    );
                    let table = match (kind, is_static) {
                        (MethodKind::Method, false) => &class.methods,
                        (MethodKind::Method, true) => &class.statics,
                        (MethodKind::Get, false) => &class.getters,
                        (MethodKind::Set, false) => &class.setters,
                        (MethodKind::Get | MethodKind::Set, true) => {
                            return Err(ScriptError::runtime(format!(
                                "Static accessor '{}' is not supported",
                                key
                            ))
                            .into());
                        }
                    };
                    table.borrow_mut().insert(key, method);
                }
                ClassMember::Field {
                    key,
                    value,
                    is_static,
                } => {
                    let key = self.property_name(key, class_ctx).await?;
                    let init = FieldInit {
                        key,
                        value: value.clone(),
                    };
                    if *is_static {
                        static_fields.push(init);
                    } else {
                        class.fields.borrow_mut().push(init);
                    }
                }
            }
        }

        // Static initializers see the finished class as `this`
        let class_value = Value::Class(class.cheap_clone());
        for field in static_fields {
            let value = self
                .eval_field(&field, class_value.clone(), &class, class_ctx)
                .await?;
            class.statics.borrow_mut().insert(field.key, value);
        }

        Ok(class)
    }

    async fn eval_superclass(
        &self,
        expr: &crate::ast::Expression,
        ctx: ContextId,
    ) -> EvalResult<ClassRef> {
        match self.eval_expr(expr, ctx).await? {
            Value::Class(parent) => match parent.kind {
                ClassKind::Builtin(
                    BuiltinClass::Map | BuiltinClass::Set | BuiltinClass::Date | BuiltinClass::RegExp,
                ) => Err(ScriptError::type_mismatch(format!(
                    "Class extends value {} cannot be subclassed",
                    parent.name
                ))
                .into()),
                _ => Ok(parent),
            },
            other => Err(ScriptError::type_mismatch(format!(
                "Class extends value {} is not a constructor or null",
                other.to_display_string()
            ))
            .into()),
        }
    }

    /// Evaluate one field initializer in a fresh scope with `this` bound
    async fn eval_field(
        &self,
        field: &FieldInit,
        this: Value,
        class: &ClassRef,
        class_ctx: ContextId,
    ) -> EvalResult {
        let Some(expr) = &field.value else {
            return Ok(Value::Undefined);
        };
        let field_ctx = self.new_context(class_ctx);
        if let Some(frame) = self.contexts.borrow_mut().get_mut(field_ctx) {
            frame.this_value = Some(this);
            frame.home = Some(class.cheap_clone());
        }
        let result = self
            .eval_with_name(expr, Some(field.key.clone()), field_ctx)
            .await;
        self.finish_context(field_ctx, &result);
        result
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Construction
    // ═══════════════════════════════════════════════════════════════════════════

    /// `new Class(...args)`
    pub(crate) fn construct(&self, class: ClassRef, args: Vec<Value>) -> EvalFuture<'_> {
        Box::pin(async move {
            match class.kind {
                ClassKind::Builtin(kind) => Ok(construct_builtin(self, &class, kind, args)?),
                ClassKind::Stub => Err(stub_class_error(&class).into()),
                ClassKind::Script { .. } => {
                    let instance = Rc::new(RefCell::new(Object::with_class(class.cheap_clone())));
                    self.run_constructor(&class, &instance, args).await
                }
            }
        })
    }

    /// Run `class`'s constructor against an existing instance.
    ///
    /// Derived constructors reach their parent through `super(...)`, which
    /// runs the parent's constructor on the same instance.
    fn run_constructor<'a>(
        &'a self,
        class: &'a ClassRef,
        instance: &'a ObjectRef,
        args: Vec<Value>,
    ) -> EvalFuture<'a> {
        Box::pin(async move {
            let (constructor, context) = match &class.kind {
                ClassKind::Script {
                    constructor,
                    context,
                    ..
                } => (constructor.clone(), *context),
                ClassKind::Builtin(kind) => {
                    let parent = construct_builtin(self, class, *kind, args)?;
                    merge_parent(instance, &parent);
                    return Ok(Value::Object(instance.cheap_clone()));
                }
                ClassKind::Stub => return Err(stub_class_error(class).into()),
            };

            let Some(node) = constructor else {
                if let Some(parent) = &class.superclass {
                    self.run_constructor(parent, instance, args).await?;
                }
                self.init_fields(class, instance).await?;
                return Ok(Value::Object(instance.cheap_clone()));
            };

            let _guard = self.enter_call(class.name.as_str(), node.span, context)?;
            let call_ctx = self.new_context(context);
            if let Some(frame) = self.contexts.borrow_mut().get_mut(call_ctx) {
                frame.this_value = Some(Value::Object(instance.cheap_clone()));
                frame.home = Some(class.cheap_clone());
                frame.construct = Some(ConstructFrame {
                    class: class.cheap_clone(),
                    instance: instance.cheap_clone(),
                    super_called: false,
                });
            }

            let result = self
                .run_constructor_body(class, instance, &node, args, call_ctx)
                .await;
            let super_called = self
                .contexts
                .borrow()
                .get(call_ctx)
                .and_then(|frame| frame.construct.as_ref())
                .is_some_and(|frame| frame.super_called);
            self.finish_context(call_ctx, &result);

            match result? {
                returned @ Value::Object(_) => Ok(returned),
                _ if class.superclass.is_some() && !super_called => Err(ScriptError::runtime(
                    format!(
                        "Must call super constructor in derived class '{}' before returning",
                        class.name
                    ),
                )
                .into()),
                _ => Ok(Value::Object(instance.cheap_clone())),
            }
        })
    }

    async fn run_constructor_body(
        &self,
        class: &ClassRef,
        instance: &ObjectRef,
        node: &Rc<FunctionNode>,
        args: Vec<Value>,
        call_ctx: ContextId,
    ) -> EvalResult {
        // Base classes initialize fields before the body; derived ones after super()
        if class.superclass.is_none() {
            self.init_fields(class, instance).await?;
        }
        self.bind_parameters(&node.params, args, call_ctx).await?;
        let frame = self.push_frame(
            FrameKind::Function,
            || FrameNode::Function(node.clone()),
            call_ctx,
            Some(class.name.to_string()),
        );
        let result = self.run_function_body(node, call_ctx).await;
        self.pop_frame(frame, &result);
        result
    }

    /// Evaluate `class`'s own instance fields onto `instance`
    async fn init_fields(&self, class: &ClassRef, instance: &ObjectRef) -> EvalResult<()> {
        let ClassKind::Script { context, .. } = class.kind else {
            return Ok(());
        };
        let fields = class.fields.borrow().clone();
        let this = Value::Object(instance.cheap_clone());
        for field in fields {
            let value = self.eval_field(&field, this.clone(), class, context).await?;
            instance.borrow_mut().properties.insert(field.key, value);
        }
        Ok(())
    }

    /// `super(...args)` inside a derived constructor
    pub(crate) async fn eval_super_call(&self, args: Vec<Value>, ctx: ContextId) -> EvalResult {
        let Some((frame_ctx, frame)) = self.contexts.borrow().construct_frame(ctx) else {
            return Err(ScriptError::runtime("'super' keyword unexpected here").into());
        };
        let Some(parent) = frame.class.superclass.clone() else {
            return Err(ScriptError::runtime(format!(
                "Class '{}' has no parent to call with super()",
                frame.class.name
            ))
            .into());
        };
        if frame.super_called {
            return Err(ScriptError::runtime("Super constructor may only be called once").into());
        }
        if let Some(construct) = self
            .contexts
            .borrow_mut()
            .get_mut(frame_ctx)
            .and_then(|c| c.construct.as_mut())
        {
            construct.super_called = true;
        }

        self.run_constructor(&parent, &frame.instance, args).await?;
        self.init_fields(&frame.class, &frame.instance).await?;
        Ok(Value::Undefined)
    }

    /// `super.key`: the parent's member, read with the current `this`
    pub(crate) fn super_member(&self, key: &JsString, ctx: ContextId) -> Result<(Value, Value), ScriptError> {
        let (home, this) = {
            let contexts = self.contexts.borrow();
            (contexts.home_class(ctx), contexts.this_value(ctx))
        };
        let Some(home) = home else {
            return Err(ScriptError::runtime("'super' keyword unexpected here"));
        };
        let Some(parent) = home.superclass.clone() else {
            return Ok((Value::Undefined, this));
        };
        if let Value::Class(_) = this {
            return Ok((parent.find_static(key.as_str()).unwrap_or_default(), this));
        }
        if let Some(getter) = parent.find_getter(key.as_str()) {
            let value = self.call_accessor(&getter, this.clone(), Vec::new())?;
            return Ok((value, this));
        }
        Ok((parent.find_method(key.as_str()).unwrap_or_default(), this))
    }
}

/// Copy what a built-in parent constructor produced onto a derived instance
fn merge_parent(instance: &ObjectRef, parent: &Value) {
    let Value::Object(parent) = parent else {
        return;
    };
    let parent = parent.borrow();
    let mut instance = instance.borrow_mut();
    for (key, value) in &parent.properties {
        instance.properties.insert(key.clone(), value.clone());
    }
    for (key, value) in &parent.hidden {
        instance.hidden.insert(key.clone(), value.clone());
    }
}

fn stub_class_error(class: &ClassRef) -> ScriptError {
    ScriptError::runtime(format!(
        "Class '{}' was restored from a snapshot without a definition and cannot be constructed",
        class.name
    ))
}

/// `left instanceof right`
pub(crate) fn instance_of(left: &Value, right: &Value) -> Result<bool, ScriptError> {
    let class = match right {
        Value::Class(class) => class,
        Value::Function(_) => return Ok(false),
        other => {
            return Err(ScriptError::type_mismatch(format!(
                "Right-hand side of 'instanceof' is not callable (found {})",
                other.type_of()
            )));
        }
    };
    Ok(match (left, &class.kind) {
        (Value::Object(obj), _) => obj
            .borrow()
            .class
            .as_ref()
            .is_some_and(|own| own.is_subclass_of(class)),
        (Value::Map(_), ClassKind::Builtin(BuiltinClass::Map))
        | (Value::Set(_), ClassKind::Builtin(BuiltinClass::Set))
        | (Value::Date(_), ClassKind::Builtin(BuiltinClass::Date))
        | (Value::RegExp(_), ClassKind::Builtin(BuiltinClass::RegExp)) => true,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_of_walks_ancestry() {
        let base = Rc::new(Class::new("Base".into(), None, ClassKind::Stub));
        let derived = Rc::new(Class::new("Derived".into(), Some(base.clone()), ClassKind::Stub));
        let other = Rc::new(Class::new("Other".into(), None, ClassKind::Stub));
        let instance = Value::object(Object::with_class(derived.clone()));

        assert!(instance_of(&instance, &Value::Class(derived)).unwrap());
        assert!(instance_of(&instance, &Value::Class(base)).unwrap());
        assert!(!instance_of(&instance, &Value::Class(other)).unwrap());
        assert!(instance_of(&instance, &Value::from(1)).is_err());
    }

    #[test]
    fn test_builtin_instance_of() {
        let map = Rc::new(Class::new("Map".into(), None, ClassKind::Builtin(BuiltinClass::Map)));
        let value = Value::Map(Rc::new(RefCell::new(Vec::new())));
        assert!(instance_of(&value, &Value::Class(map.clone())).unwrap());
        assert!(!instance_of(&Value::array(vec![]), &Value::Class(map)).unwrap());
    }
}
