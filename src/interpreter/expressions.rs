//! Expression evaluation and operators

use std::rc::Rc;

use crate::ast::{
    Argument, ArrayElement, ArrayExpression, AssignmentExpression, AssignmentOp, AssignmentTarget,
    BinaryOp, CallExpression, Expression, LiteralValue, LogicalExpression, LogicalOp,
    MemberExpression, MemberProperty, NewExpression, ObjectExpression, ObjectMember, PropertyName,
    TemplateLiteral, UnaryExpression, UnaryOp, UpdateExpression, UpdateOp,
};
use crate::context::ContextId;
use crate::error::ScriptError;
use crate::interpreter::functions::BindMode;
use crate::interpreter::members::{array_index, is_iteration_method, iterable_values};
use crate::interpreter::{EvalFuture, EvalResult, Interpreter};
use crate::value::{number_to_string, JsString, Object, RegExpValue, Value};

/// Expressions the synchronous evaluator accepts
fn check_sync_expression(expr: &Expression) -> Result<(), ScriptError> {
    match expr {
        Expression::Literal(_)
        | Expression::Template(_)
        | Expression::Identifier(_)
        | Expression::This(_)
        | Expression::Unary(_)
        | Expression::Update(_)
        | Expression::Binary(_)
        | Expression::Logical(_)
        | Expression::Conditional(_)
        | Expression::Assignment(_)
        | Expression::Member(_)
        | Expression::Call(_)
        | Expression::Array(_)
        | Expression::Object(_)
        | Expression::Function(_)
        | Expression::Arrow(_)
        | Expression::Sequence(_) => Ok(()),
        other => Err(ScriptError::sync_unsupported(other.type_name())),
    }
}

fn literal_value(value: &LiteralValue) -> Result<Value, ScriptError> {
    Ok(match value {
        LiteralValue::Null => Value::Null,
        LiteralValue::Boolean(b) => Value::Boolean(*b),
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::RegExp { pattern, flags } => {
            Value::RegExp(Rc::new(RegExpValue::new(pattern, flags)?))
        }
    })
}

/// ToInt32
pub(crate) fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32
pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

/// Apply a binary operator to two evaluated operands
pub(crate) fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptError> {
    let value = match op {
        BinaryOp::Add => {
            let numeric = |v: &Value| {
                matches!(
                    v,
                    Value::Number(_) | Value::Boolean(_) | Value::Null | Value::Undefined
                )
            };
            if numeric(left) && numeric(right) {
                Value::Number(left.to_number() + right.to_number())
            } else {
                let mut out = left.to_js_string().to_string();
                out.push_str(right.to_js_string().as_str());
                Value::string(out)
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Exp => Value::Number(left.to_number().powf(right.to_number())),

        BinaryOp::Eq => Value::Boolean(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Boolean(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Boolean(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Boolean(!left.strict_equals(right)),

        BinaryOp::Lt => Value::Boolean(compare(left, right, |o| o.is_lt())),
        BinaryOp::LtEq => Value::Boolean(compare(left, right, |o| o.is_le())),
        BinaryOp::Gt => Value::Boolean(compare(left, right, |o| o.is_gt())),
        BinaryOp::GtEq => Value::Boolean(compare(left, right, |o| o.is_ge())),

        BinaryOp::BitAnd => int32_op(left, right, |a, b| a & b),
        BinaryOp::BitOr => int32_op(left, right, |a, b| a | b),
        BinaryOp::BitXor => int32_op(left, right, |a, b| a ^ b),
        BinaryOp::LShift => {
            let shift = to_uint32(right.to_number()) & 31;
            Value::Number(f64::from(to_int32(left.to_number()).wrapping_shl(shift)))
        }
        BinaryOp::RShift => {
            let shift = to_uint32(right.to_number()) & 31;
            Value::Number(f64::from(to_int32(left.to_number()) >> shift))
        }
        BinaryOp::URShift => {
            let shift = to_uint32(right.to_number()) & 31;
            Value::Number(f64::from(to_uint32(left.to_number()) >> shift))
        }

        BinaryOp::In => Value::Boolean(crate::interpreter::members::has_property(
            right,
            &left.to_property_key(),
        )?),
        BinaryOp::Instanceof => Value::Boolean(crate::interpreter::classes::instance_of(left, right)?),
    };
    Ok(value)
}

fn int32_op(left: &Value, right: &Value, op: impl Fn(i32, i32) -> i32) -> Value {
    Value::Number(f64::from(op(
        to_int32(left.to_number()),
        to_int32(right.to_number()),
    )))
}

/// Relational comparison; strings compare lexically, anything else numerically
fn compare(left: &Value, right: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return test(a.as_str().cmp(b.as_str()));
    }
    left.to_number()
        .partial_cmp(&right.to_number())
        .is_some_and(test)
}

impl Interpreter {
    /// Evaluate one expression
    pub(crate) fn eval_expr<'a>(&'a self, expr: &'a Expression, ctx: ContextId) -> EvalFuture<'a> {
        Box::pin(async move {
            let result = self.eval_expr_checked(expr, ctx).await;
            result.map_err(|signal| self.annotate(signal, expr.span(), ctx))
        })
    }

    async fn eval_expr_checked(&self, expr: &Expression, ctx: ContextId) -> EvalResult {
        if self.is_sync() {
            check_sync_expression(expr)?;
        } else {
            self.checkpoint(expr.type_name(), expr.span()).await?;
        }

        match expr {
            Expression::Literal(lit) => Ok(literal_value(&lit.value)?),
            Expression::Template(template) => self.eval_template(template, ctx).await,
            Expression::Array(array) => self.eval_array(array, ctx).await,
            Expression::Object(object) => self.eval_object(object, ctx).await,
            Expression::Function(node) | Expression::Arrow(node) => {
                Ok(self.create_closure(node, ctx, None, None))
            }
            Expression::Class(node) => Ok(Value::Class(self.eval_class(node, ctx, None).await?)),

            Expression::Identifier(id) => Ok(self.lookup(ctx, id.name.as_str())?),
            Expression::This(_) => Ok(self.this_value(ctx)),
            Expression::Super(_) => {
                Err(ScriptError::runtime("'super' keyword unexpected here").into())
            }

            Expression::Unary(unary) => self.eval_unary(unary, ctx).await,
            Expression::Update(update) => self.eval_update(update, ctx).await,
            Expression::Binary(binary) => {
                let left = self.eval_expr(&binary.left, ctx).await?;
                let right = self.eval_expr(&binary.right, ctx).await?;
                Ok(binary_op(binary.operator, &left, &right)?)
            }
            Expression::Logical(logical) => self.eval_logical(logical, ctx).await,
            Expression::Conditional(cond) => {
                if self.eval_expr(&cond.test, ctx).await?.to_boolean() {
                    self.eval_expr(&cond.consequent, ctx).await
                } else {
                    self.eval_expr(&cond.alternate, ctx).await
                }
            }
            Expression::Assignment(assign) => self.eval_assignment(assign, ctx).await,
            Expression::Sequence(seq) => {
                let mut last = Value::Undefined;
                for expr in &seq.expressions {
                    last = self.eval_expr(expr, ctx).await?;
                }
                Ok(last)
            }

            Expression::Member(_) | Expression::Call(_) => {
                Ok(self.eval_chain(expr, ctx).await?.unwrap_or_default())
            }
            Expression::New(new) => self.eval_new(new, ctx).await,
            // Calls already complete before their value is observed
            Expression::Await(await_expr) => self.eval_expr(&await_expr.argument, ctx).await,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Literals
    // ═══════════════════════════════════════════════════════════════════════════

    async fn eval_template(&self, template: &TemplateLiteral, ctx: ContextId) -> EvalResult {
        let mut out = String::new();
        for (index, quasi) in template.quasis.iter().enumerate() {
            out.push_str(quasi.as_str());
            if let Some(part) = template.expressions.get(index) {
                let expr = self
                    .template_expression(&part.source)
                    .map_err(|e| e.with_location(part.span.line, part.span.column, None))?;
                let value = self.eval_expr(&expr, ctx).await?;
                out.push_str(value.to_js_string().as_str());
            }
        }
        Ok(Value::string(out))
    }

    async fn eval_array(&self, array: &ArrayExpression, ctx: ContextId) -> EvalResult {
        let mut items = Vec::with_capacity(array.elements.len());
        for element in &array.elements {
            match element {
                ArrayElement::Expression(expr) => items.push(self.eval_expr(expr, ctx).await?),
                ArrayElement::Spread(expr) => {
                    let value = self.eval_expr(expr, ctx).await?;
                    items.extend(iterable_values(&value, &expr.describe())?);
                }
                ArrayElement::Hole => items.push(Value::Undefined),
            }
        }
        Ok(Value::array(items))
    }

    async fn eval_object(&self, object: &ObjectExpression, ctx: ContextId) -> EvalResult {
        let mut result = Object::new();
        for member in &object.properties {
            match member {
                ObjectMember::Property { key, value } => {
                    let key = self.property_name(key, ctx).await?;
                    let value = self.eval_with_name(value, Some(key.clone()), ctx).await?;
                    result.properties.insert(key, value);
                }
                ObjectMember::Spread(expr) => {
                    let source = self.eval_expr(expr, ctx).await?;
                    match &source {
                        Value::Object(obj) => {
                            for (k, v) in &obj.borrow().properties {
                                result.properties.insert(k.clone(), v.clone());
                            }
                        }
                        Value::Array(_) | Value::String(_) => {
                            for (index, item) in iterable_values(&source, "value")?
                                .into_iter()
                                .enumerate()
                            {
                                result.properties.insert(JsString::from(index.to_string()), item);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(Value::object(result))
    }

    /// Resolve an object-literal or class member key
    pub(crate) async fn property_name(&self, key: &PropertyName, ctx: ContextId) -> EvalResult<JsString> {
        Ok(match key {
            PropertyName::Identifier(name) | PropertyName::String(name) => name.clone(),
            PropertyName::Number(n) => JsString::from(number_to_string(*n)),
            PropertyName::Computed(expr) => self.eval_expr(expr, ctx).await?.to_property_key(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════

    async fn eval_unary(&self, unary: &UnaryExpression, ctx: ContextId) -> EvalResult {
        match unary.operator {
            UnaryOp::Typeof => {
                // typeof tolerates undeclared names
                if let Expression::Identifier(id) = unary.argument.as_ref() {
                    let found = self.contexts.borrow().lookup(ctx, id.name.as_str());
                    return Ok(Value::string(found.unwrap_or_default().type_of()));
                }
                let value = self.eval_expr(&unary.argument, ctx).await?;
                Ok(Value::string(value.type_of()))
            }
            UnaryOp::Delete => {
                if let Expression::Member(member) = unary.argument.as_ref() {
                    let object = self.eval_expr(&member.object, ctx).await?;
                    let key = self.member_key(&member.property, ctx).await?;
                    return Ok(Value::Boolean(crate::interpreter::members::delete_property(
                        &object, &key,
                    )?));
                }
                Ok(Value::Boolean(true))
            }
            op => {
                let value = self.eval_expr(&unary.argument, ctx).await?;
                Ok(match op {
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Boolean(!value.to_boolean()),
                    UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
                    _ => Value::Undefined,
                })
            }
        }
    }

    async fn eval_update(&self, update: &UpdateExpression, ctx: ContextId) -> EvalResult {
        let delta = match update.operator {
            UpdateOp::Increment => 1.0,
            UpdateOp::Decrement => -1.0,
        };
        let old = match update.argument.as_ref() {
            Expression::Identifier(id) => {
                let old = self.lookup(ctx, id.name.as_str())?.to_number();
                self.assign_variable(ctx, &id.name, Value::Number(old + delta))?;
                old
            }
            Expression::Member(member) => {
                let object = self.eval_expr(&member.object, ctx).await?;
                let key = self.member_key(&member.property, ctx).await?;
                let old = self.read_member(&object, &key, &member.object)?.to_number();
                self.set_member(&object, key, Value::Number(old + delta))?;
                old
            }
            _ => {
                return Err(
                    ScriptError::runtime("Invalid left-hand side expression in update").into(),
                );
            }
        };
        Ok(Value::Number(if update.prefix { old + delta } else { old }))
    }

    async fn eval_logical(&self, logical: &LogicalExpression, ctx: ContextId) -> EvalResult {
        let left = self.eval_expr(&logical.left, ctx).await?;
        let short_circuit = match logical.operator {
            LogicalOp::And => !left.to_boolean(),
            LogicalOp::Or => left.to_boolean(),
            LogicalOp::NullishCoalescing => !left.is_nullish(),
        };
        if short_circuit {
            Ok(left)
        } else {
            self.eval_expr(&logical.right, ctx).await
        }
    }

    /// Whether a logical assignment keeps the current value
    fn logical_assign_skips(op: AssignmentOp, current: &Value) -> bool {
        match op {
            AssignmentOp::AndAssign => !current.to_boolean(),
            AssignmentOp::OrAssign => current.to_boolean(),
            AssignmentOp::NullishAssign => !current.is_nullish(),
            _ => false,
        }
    }

    async fn eval_assignment(&self, assign: &AssignmentExpression, ctx: ContextId) -> EvalResult {
        match &assign.target {
            AssignmentTarget::Identifier(id) => {
                let value = if assign.operator == AssignmentOp::Assign {
                    self.eval_with_name(&assign.value, Some(id.name.clone()), ctx)
                        .await?
                } else {
                    let current = self.lookup(ctx, id.name.as_str())?;
                    if Self::logical_assign_skips(assign.operator, &current) {
                        return Ok(current);
                    }
                    let right = self.eval_expr(&assign.value, ctx).await?;
                    match assign.operator.binary_op() {
                        Some(op) => binary_op(op, &current, &right)?,
                        None => right,
                    }
                };
                self.assign_variable(ctx, &id.name, value.clone())?;
                Ok(value)
            }

            AssignmentTarget::Member(member) => {
                let object = self.eval_expr(&member.object, ctx).await?;
                let key = self.member_key(&member.property, ctx).await?;
                let value = if assign.operator == AssignmentOp::Assign {
                    self.eval_expr(&assign.value, ctx).await?
                } else {
                    let current = self.read_member(&object, &key, &member.object)?;
                    if Self::logical_assign_skips(assign.operator, &current) {
                        return Ok(current);
                    }
                    let right = self.eval_expr(&assign.value, ctx).await?;
                    match assign.operator.binary_op() {
                        Some(op) => binary_op(op, &current, &right)?,
                        None => right,
                    }
                };
                self.set_member(&object, key, value.clone())?;
                Ok(value)
            }

            AssignmentTarget::Pattern(pattern) => {
                let value = self.eval_expr(&assign.value, ctx).await?;
                self.bind_pattern(pattern, value.clone(), ctx, BindMode::Assign)
                    .await?;
                Ok(value)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Member access and calls
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) async fn member_key(&self, property: &MemberProperty, ctx: ContextId) -> EvalResult<JsString> {
        Ok(match property {
            MemberProperty::Identifier(id) => id.name.clone(),
            MemberProperty::Computed(expr) => self.eval_expr(expr, ctx).await?.to_property_key(),
        })
    }

    /// Evaluate a member/call chain; `None` means an optional link short-circuited
    fn eval_chain<'a>(&'a self, expr: &'a Expression, ctx: ContextId) -> EvalFuture<'a, Option<Value>> {
        Box::pin(async move {
            match expr {
                Expression::Member(member) => Ok(self
                    .eval_member_ref(member, ctx)
                    .await?
                    .map(|member| member.value)),
                Expression::Call(call) => self.eval_call(call, ctx).await,
                other => self.eval_expr(other, ctx).await.map(Some),
            }
        })
    }

    /// Property value together with the receiver it was read from
    async fn eval_member_ref(&self, member: &MemberExpression, ctx: ContextId) -> EvalResult<Option<MemberRef>> {
        if let Expression::Super(_) = member.object.as_ref() {
            let key = self.member_key(&member.property, ctx).await?;
            let (value, receiver) = self.super_member(&key, ctx)?;
            return Ok(Some(MemberRef {
                value,
                receiver,
                iteration: None,
            }));
        }

        let Some(object) = self.eval_chain(&member.object, ctx).await? else {
            return Ok(None);
        };
        if member.optional && object.is_nullish() {
            return Ok(None);
        }
        let key = self.member_key(&member.property, ctx).await?;

        if matches!(object, Value::String(_) | Value::Array(_))
            && key.as_str() != "length"
            && array_index(key.as_str()).is_none()
        {
            if let Some(method) = self.method_override(&object, &key, ctx) {
                return Ok(Some(MemberRef {
                    value: method,
                    receiver: object,
                    iteration: None,
                }));
            }
        }

        let value = self.read_member(&object, &key, &member.object)?;
        let iteration = is_iteration_method(&object, key.as_str()).then_some(key);
        Ok(Some(MemberRef {
            value,
            receiver: object,
            iteration,
        }))
    }

    /// Read a property, naming the receiver expression when it is nullish
    fn read_member(
        &self,
        object: &Value,
        key: &JsString,
        receiver: &Expression,
    ) -> Result<Value, ScriptError> {
        if object.is_nullish() {
            return Err(ScriptError::type_mismatch(format!(
                "Cannot read properties of {} (reading '{}') from '{}'",
                nullish_name(object),
                key,
                receiver.describe()
            )));
        }
        self.get_member(object, key)
    }

    async fn eval_arguments(&self, arguments: &[Argument], ctx: ContextId) -> EvalResult<Vec<Value>> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match argument {
                Argument::Expression(expr) => args.push(self.eval_expr(expr, ctx).await?),
                Argument::Spread(expr) => {
                    let value = self.eval_expr(expr, ctx).await?;
                    args.extend(iterable_values(&value, &expr.describe())?);
                }
            }
        }
        Ok(args)
    }

    async fn eval_call(&self, call: &CallExpression, ctx: ContextId) -> EvalResult<Option<Value>> {
        if let Expression::Super(_) = call.callee.as_ref() {
            let args = self.eval_arguments(&call.arguments, ctx).await?;
            return self.eval_super_call(args, ctx).await.map(Some);
        }

        let (callee, this) = match call.callee.as_ref() {
            Expression::Member(member) => match self.eval_member_ref(member, ctx).await? {
                Some(MemberRef {
                    receiver,
                    iteration: Some(name),
                    ..
                }) => {
                    // Callbacks are driven to completion without suspending
                    let args = self.eval_arguments(&call.arguments, ctx).await?;
                    return self
                        .call_iteration_method(&receiver, name.as_str(), args)
                        .map(Some);
                }
                Some(member) => (member.value, member.receiver),
                None => return Ok(None),
            },
            Expression::Identifier(id) => {
                let contexts = self.contexts.borrow();
                match contexts.lookup(ctx, id.name.as_str()) {
                    Some(callee) => (callee, Value::Undefined),
                    None => {
                        return Err(ScriptError::function_not_found(
                            id.name.as_str(),
                            contexts.suggestions(ctx, id.name.as_str(), self.config.max_suggestions),
                        )
                        .into());
                    }
                }
            }
            other => match self.eval_chain(other, ctx).await? {
                Some(callee) => (callee, Value::Undefined),
                None => return Ok(None),
            },
        };

        if call.optional && callee.is_nullish() {
            return Ok(None);
        }
        if !matches!(callee, Value::Function(_) | Value::Class(_)) {
            return Err(self.not_callable(&call.callee, &callee).into());
        }

        let args = self.eval_arguments(&call.arguments, ctx).await?;
        self.call_function(callee, this, args).await.map(Some)
    }

    fn not_callable(&self, callee_expr: &Expression, callee: &Value) -> ScriptError {
        match callee_expr {
            Expression::Member(member) => ScriptError::type_mismatch(format!(
                "{} is not a function (receiver '{}', found {})",
                callee_expr.describe(),
                member.object.describe(),
                callee.type_of()
            )),
            _ => ScriptError::type_mismatch(format!(
                "{} is not a function (found {})",
                callee_expr.describe(),
                callee.type_of()
            )),
        }
    }

    async fn eval_new(&self, new: &NewExpression, ctx: ContextId) -> EvalResult {
        let callee = self.eval_expr(&new.callee, ctx).await?;
        let args = self.eval_arguments(&new.arguments, ctx).await?;
        match callee {
            Value::Class(class) => self.construct(class, args).await,
            Value::Function(_) => {
                let instance = Value::object(Object::new());
                let result = self.call_function(callee, instance.clone(), args).await?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) => result,
                    _ => instance,
                })
            }
            _ => Err(ScriptError::type_mismatch(format!(
                "{} is not a constructor",
                new.callee.describe()
            ))
            .into()),
        }
    }
}

/// Result of evaluating `object.key`
struct MemberRef {
    value: Value,
    receiver: Value,
    /// Set when the call goes through the async collection-method path
    iteration: Option<JsString>,
}

/// `undefined` or `null`, for nullish-access messages
fn nullish_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        _ => "undefined",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int32_conversion() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
    }

    #[test]
    fn test_add_concatenates_strings() {
        let v = binary_op(BinaryOp::Add, &Value::from("a"), &Value::from(1)).unwrap();
        assert_eq!(v, Value::from("a1"));
        let v = binary_op(BinaryOp::Add, &Value::Boolean(true), &Value::from(1)).unwrap();
        assert_eq!(v, Value::from(2));
    }

    #[test]
    fn test_relational_comparison() {
        let lt = binary_op(BinaryOp::Lt, &Value::from("apple"), &Value::from("banana")).unwrap();
        assert_eq!(lt, Value::Boolean(true));
        let nan = binary_op(BinaryOp::Lt, &Value::Number(f64::NAN), &Value::from(1)).unwrap();
        assert_eq!(nan, Value::Boolean(false));
    }
}
