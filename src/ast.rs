//! Abstract Syntax Tree types for the script language
//!
//! Every node is serde-serializable (tagged with `"type"`) so that paused call
//! frames can carry the node they will resume from.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::lexer::Span;
use crate::value::JsString;

/// A complete program (script or module)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub body: Rc<[Statement]>,
    #[serde(default)]
    pub span: Span,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    // Declarations
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<FunctionNode>),
    ClassDeclaration(Rc<ClassNode>),

    // Control Flow
    Block(BlockStatement),
    If(IfStatement),
    Switch(SwitchStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    ForOf(ForOfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    Try(TryStatement),

    // Jump
    Return(ReturnStatement),
    Break(JumpStatement),
    Continue(JumpStatement),
    Throw(ThrowStatement),

    // Module
    Import(ImportDeclaration),
    Export(ExportDeclaration),

    // Other
    Expression(ExpressionStatement),
    Labeled(LabeledStatement),
    Empty(EmptyStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::VariableDeclaration(d) => d.span,
            Statement::FunctionDeclaration(f) => f.span,
            Statement::ClassDeclaration(c) => c.span,
            Statement::Block(b) => b.span,
            Statement::If(s) => s.span,
            Statement::Switch(s) => s.span,
            Statement::For(s) => s.span,
            Statement::ForIn(s) => s.span,
            Statement::ForOf(s) => s.span,
            Statement::While(s) => s.span,
            Statement::DoWhile(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::Break(s) | Statement::Continue(s) => s.span,
            Statement::Throw(s) => s.span,
            Statement::Import(s) => s.span,
            Statement::Export(s) => s.span,
            Statement::Expression(s) => s.span,
            Statement::Labeled(s) => s.span,
            Statement::Empty(s) => s.span,
        }
    }

    /// ESTree-style node type name, used in diagnostics and pause reports
    pub fn type_name(&self) -> &'static str {
        match self {
            Statement::VariableDeclaration(_) => "VariableDeclaration",
            Statement::FunctionDeclaration(_) => "FunctionDeclaration",
            Statement::ClassDeclaration(_) => "ClassDeclaration",
            Statement::Block(_) => "BlockStatement",
            Statement::If(_) => "IfStatement",
            Statement::Switch(_) => "SwitchStatement",
            Statement::For(_) => "ForStatement",
            Statement::ForIn(_) => "ForInStatement",
            Statement::ForOf(_) => "ForOfStatement",
            Statement::While(_) => "WhileStatement",
            Statement::DoWhile(_) => "DoWhileStatement",
            Statement::Try(_) => "TryStatement",
            Statement::Return(_) => "ReturnStatement",
            Statement::Break(_) => "BreakStatement",
            Statement::Continue(_) => "ContinueStatement",
            Statement::Throw(_) => "ThrowStatement",
            Statement::Import(_) => "ImportDeclaration",
            Statement::Export(_) => "ExportDeclaration",
            Statement::Expression(_) => "ExpressionStatement",
            Statement::Labeled(_) => "LabeledStatement",
            Statement::Empty(_) => "EmptyStatement",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyStatement {
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStatement {
    pub body: Rc<[Statement]>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Expression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForInStatement {
    pub left: ForBinding,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForOfStatement {
    pub left: ForBinding,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: Span,
}

/// Left-hand side of `for...in` / `for...of`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForBinding {
    Declaration { kind: VariableKind, pattern: Pattern },
    Pattern(Pattern),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Expression,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryStatement {
    pub block: BlockStatement,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStatement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: BlockStatement,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub argument: Option<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// `break` and `continue`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpStatement {
    pub label: Option<JsString>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowStatement {
    pub argument: Expression,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledStatement {
    pub label: JsString,
    pub body: Box<Statement>,
    #[serde(default)]
    pub span: Span,
}

// ============ MODULES ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDeclaration {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: JsString,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImportSpecifier {
    /// `import { imported as local }`
    Named { imported: JsString, local: JsString },
    /// `import local from`
    Default { local: JsString },
    /// `import * as local from`
    Namespace { local: JsString },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDeclaration {
    pub kind: ExportKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExportKind {
    /// `export const x = 1`, `export function f() {}`, `export class C {}`
    Declaration(Box<Statement>),
    /// `export default expr`
    Default(Expression),
    /// `export { a, b as c }` with an optional `from "module"`
    Named {
        specifiers: Vec<ExportSpecifier>,
        source: Option<JsString>,
    },
    /// `export * from "module"`
    All { source: JsString },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSpecifier {
    pub local: JsString,
    pub exported: JsString,
}

// ============ FUNCTIONS AND CLASSES ============

/// Shared node for function declarations, function expressions, arrows and methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNode {
    pub id: Option<Identifier>,
    pub params: Rc<[Pattern]>,
    pub body: FunctionBody,
    pub is_async: bool,
    pub is_arrow: bool,
    #[serde(default)]
    pub span: Span,
}

impl FunctionNode {
    pub fn name(&self) -> Option<&JsString> {
        self.id.as_ref().map(|id| &id.name)
    }

    /// Non-async arrows with an expression body run on the synchronous
    /// evaluator so they can be handed to native callbacks.
    pub fn is_sync(&self) -> bool {
        self.is_arrow && !self.is_async && matches!(self.body, FunctionBody::Expression(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FunctionBody {
    Block(BlockStatement),
    Expression(Rc<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassNode {
    pub id: Option<Identifier>,
    pub super_class: Option<Rc<Expression>>,
    pub members: Vec<ClassMember>,
    #[serde(default)]
    pub span: Span,
}

impl ClassNode {
    pub fn name(&self) -> Option<&JsString> {
        self.id.as_ref().map(|id| &id.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassMember {
    Constructor(Rc<FunctionNode>),
    Method {
        key: PropertyName,
        function: Rc<FunctionNode>,
        kind: MethodKind,
        is_static: bool,
    },
    Field {
        key: PropertyName,
        value: Option<Rc<Expression>>,
        is_static: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Method,
    Get,
    Set,
}

// ============ PATTERNS ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    Identifier(Identifier),
    Object(ObjectPattern),
    Array(ArrayPattern),
    /// `target = default`
    Assignment(AssignmentPattern),
    /// `...target`
    Rest(RestElement),
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Identifier(id) => id.span,
            Pattern::Object(p) => p.span,
            Pattern::Array(p) => p.span,
            Pattern::Assignment(p) => p.span,
            Pattern::Rest(p) => p.span,
        }
    }

    /// Collect every name this pattern binds
    pub fn bound_names(&self, out: &mut Vec<JsString>) {
        match self {
            Pattern::Identifier(id) => out.push(id.name.clone()),
            Pattern::Object(obj) => {
                for prop in &obj.properties {
                    match prop {
                        ObjectPatternProperty::KeyValue { value, .. } => value.bound_names(out),
                        ObjectPatternProperty::Rest(rest) => rest.bound_names(out),
                    }
                }
            }
            Pattern::Array(arr) => {
                for elem in arr.elements.iter().flatten() {
                    elem.bound_names(out);
                }
            }
            Pattern::Assignment(assign) => assign.left.bound_names(out),
            Pattern::Rest(rest) => rest.argument.bound_names(out),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectPattern {
    pub properties: Vec<ObjectPatternProperty>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectPatternProperty {
    KeyValue {
        key: PropertyName,
        value: Pattern,
        shorthand: bool,
    },
    Rest(Box<Pattern>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayPattern {
    /// `None` marks an elision (`[, b]`)
    pub elements: Vec<Option<Pattern>>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentPattern {
    pub left: Box<Pattern>,
    pub right: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestElement {
    pub argument: Box<Pattern>,
    #[serde(default)]
    pub span: Span,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    // Literals
    Literal(Literal),
    Template(TemplateLiteral),
    Array(ArrayExpression),
    Object(ObjectExpression),
    Function(Rc<FunctionNode>),
    Arrow(Rc<FunctionNode>),
    Class(Rc<ClassNode>),

    // Identifiers
    Identifier(Identifier),
    This(Keyword),
    Super(Keyword),

    // Operations
    Unary(UnaryExpression),
    Update(UpdateExpression),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Conditional(ConditionalExpression),
    Assignment(AssignmentExpression),
    Sequence(SequenceExpression),

    // Access
    Member(MemberExpression),
    Call(CallExpression),
    New(NewExpression),

    Await(AwaitExpression),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(l) => l.span,
            Expression::Template(t) => t.span,
            Expression::Array(a) => a.span,
            Expression::Object(o) => o.span,
            Expression::Function(f) | Expression::Arrow(f) => f.span,
            Expression::Class(c) => c.span,
            Expression::Identifier(i) => i.span,
            Expression::This(k) | Expression::Super(k) => k.span,
            Expression::Unary(u) => u.span,
            Expression::Update(u) => u.span,
            Expression::Binary(b) => b.span,
            Expression::Logical(l) => l.span,
            Expression::Conditional(c) => c.span,
            Expression::Assignment(a) => a.span,
            Expression::Sequence(s) => s.span,
            Expression::Member(m) => m.span,
            Expression::Call(c) => c.span,
            Expression::New(n) => n.span,
            Expression::Await(a) => a.span,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Expression::Literal(_) => "Literal",
            Expression::Template(_) => "TemplateLiteral",
            Expression::Array(_) => "ArrayExpression",
            Expression::Object(_) => "ObjectExpression",
            Expression::Function(_) => "FunctionExpression",
            Expression::Arrow(_) => "ArrowFunctionExpression",
            Expression::Class(_) => "ClassExpression",
            Expression::Identifier(_) => "Identifier",
            Expression::This(_) => "ThisExpression",
            Expression::Super(_) => "Super",
            Expression::Unary(_) => "UnaryExpression",
            Expression::Update(_) => "UpdateExpression",
            Expression::Binary(_) => "BinaryExpression",
            Expression::Logical(_) => "LogicalExpression",
            Expression::Conditional(_) => "ConditionalExpression",
            Expression::Assignment(_) => "AssignmentExpression",
            Expression::Sequence(_) => "SequenceExpression",
            Expression::Member(_) => "MemberExpression",
            Expression::Call(_) => "CallExpression",
            Expression::New(_) => "NewExpression",
            Expression::Await(_) => "AwaitExpression",
        }
    }

    /// Short source-like rendering (`a.b.c`, `items[0]`) for error messages
    pub fn describe(&self) -> String {
        match self {
            Expression::Identifier(id) => id.name.to_string(),
            Expression::This(_) => "this".to_string(),
            Expression::Super(_) => "super".to_string(),
            Expression::Member(m) => {
                let object = m.object.describe();
                let dot = if m.optional { "?." } else { "." };
                match &m.property {
                    MemberProperty::Identifier(id) => format!("{}{}{}", object, dot, id.name),
                    MemberProperty::Computed(expr) => match expr.as_ref() {
                        Expression::Literal(Literal {
                            value: LiteralValue::Number(n),
                            ..
                        }) => format!("{}[{}]", object, n),
                        Expression::Literal(Literal {
                            value: LiteralValue::String(s),
                            ..
                        }) => format!("{}[\"{}\"]", object, s),
                        other => format!("{}[{}]", object, other.describe()),
                    },
                }
            }
            Expression::Call(c) => format!("{}(...)", c.callee.describe()),
            Expression::Literal(l) => match &l.value {
                LiteralValue::Null => "null".to_string(),
                LiteralValue::Boolean(b) => b.to_string(),
                LiteralValue::Number(n) => n.to_string(),
                LiteralValue::String(s) => format!("\"{}\"", s),
                LiteralValue::RegExp { pattern, flags } => format!("/{}/{}", pattern, flags),
            },
            _ => "<expression>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    pub name: JsString,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    /// `/pattern/flags`, compiled each time the literal is evaluated
    RegExp { pattern: String, flags: String },
}

/// Template literal: `quasis` are the raw text chunks and each expression is
/// kept as source text, parsed lazily when the template is evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLiteral {
    pub quasis: Vec<JsString>,
    pub expressions: Vec<TemplateExpression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateExpression {
    pub source: String,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayExpression {
    pub elements: Vec<ArrayElement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArrayElement {
    Expression(Expression),
    Spread(Expression),
    Hole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectMember>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectMember {
    Property { key: PropertyName, value: Expression },
    Spread(Expression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropertyName {
    Identifier(JsString),
    String(JsString),
    Number(f64),
    Computed(Rc<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,  // -
    Plus,   // +
    Not,    // !
    BitNot, // ~
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub prefix: bool,
    pub argument: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,

    // Comparison
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    URShift,

    // Relational
    In,
    Instanceof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    NullishCoalescing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub test: Rc<Expression>,
    pub consequent: Rc<Expression>,
    pub alternate: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentExpression {
    pub operator: AssignmentOp,
    pub target: AssignmentTarget,
    pub value: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignmentTarget {
    Identifier(Identifier),
    Member(MemberExpression),
    Pattern(Pattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOp {
    Assign,    // =
    AddAssign, // +=
    SubAssign, // -=
    MulAssign, // *=
    DivAssign, // /=
    ModAssign, // %=
    ExpAssign, // **=
    AndAssign, // &&=
    OrAssign,  // ||=
    NullishAssign, // ??=
}

impl AssignmentOp {
    /// The arithmetic operator a compound assignment applies
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
            AssignmentOp::ExpAssign => Some(BinaryOp::Exp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberExpression {
    pub object: Rc<Expression>,
    pub property: MemberProperty,
    /// `?.` directly before this property
    pub optional: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberProperty {
    Identifier(Identifier),
    Computed(Rc<Expression>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExpression {
    pub callee: Rc<Expression>,
    pub arguments: Vec<Argument>,
    /// `?.(` call
    pub optional: bool,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Argument {
    Expression(Expression),
    Spread(Expression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpression {
    pub callee: Rc<Expression>,
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwaitExpression {
    pub argument: Rc<Expression>,
    #[serde(default)]
    pub span: Span,
}

/// Collect `var`-declared names reachable from a statement list without
/// crossing a function boundary.
pub fn collect_var_names(statements: &[Statement], out: &mut Vec<JsString>) {
    for stmt in statements {
        collect_var_names_in(stmt, out);
    }
}

fn collect_var_names_in(stmt: &Statement, out: &mut Vec<JsString>) {
    match stmt {
        Statement::VariableDeclaration(decl) if decl.kind == VariableKind::Var => {
            for d in &decl.declarations {
                d.id.bound_names(out);
            }
        }
        Statement::Block(block) => collect_var_names(&block.body, out),
        Statement::If(s) => {
            collect_var_names_in(&s.consequent, out);
            if let Some(alt) = &s.alternate {
                collect_var_names_in(alt, out);
            }
        }
        Statement::For(s) => {
            if let Some(ForInit::Variable(decl)) = &s.init {
                if decl.kind == VariableKind::Var {
                    for d in &decl.declarations {
                        d.id.bound_names(out);
                    }
                }
            }
            collect_var_names_in(&s.body, out);
        }
        Statement::ForIn(ForInStatement { left, body, .. })
        | Statement::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForBinding::Declaration {
                kind: VariableKind::Var,
                pattern,
            } = left
            {
                pattern.bound_names(out);
            }
            collect_var_names_in(body, out);
        }
        Statement::While(s) => collect_var_names_in(&s.body, out),
        Statement::DoWhile(s) => collect_var_names_in(&s.body, out),
        Statement::Try(s) => {
            collect_var_names(&s.block.body, out);
            if let Some(handler) = &s.handler {
                collect_var_names(&handler.body.body, out);
            }
            if let Some(finalizer) = &s.finalizer {
                collect_var_names(&finalizer.body, out);
            }
        }
        Statement::Switch(s) => {
            for case in &s.cases {
                collect_var_names(&case.consequent, out);
            }
        }
        Statement::Labeled(s) => collect_var_names_in(&s.body, out),
        Statement::Export(ExportDeclaration {
            kind: ExportKind::Declaration(inner),
            ..
        }) => collect_var_names_in(inner, out),
        _ => {}
    }
}
