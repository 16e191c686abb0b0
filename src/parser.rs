//! Parser for script source code
//!
//! Uses recursive descent with Pratt parsing for expressions.

use std::rc::Rc;

use crate::ast::*;
use crate::error::ScriptError;
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};
use crate::value::JsString;

/// The parsing oracle used by the interpreter.
///
/// The default implementation is [`DefaultParser`]; hosts may plug in their
/// own front end as long as it produces the same tree.
pub trait SourceParser {
    fn parse(&self, source: &str) -> Result<Program, ScriptError>;

    /// Parse source that must consist of exactly one expression
    fn parse_expression(&self, source: &str) -> Result<Expression, ScriptError> {
        let program = self.parse(source)?;
        match program.body.as_ref() {
            [Statement::Expression(stmt)] => Ok(stmt.expression.clone()),
            _ => Err(ScriptError::parse_error(
                format!("Expected a single expression, got '{}'", source.trim()),
                program.span.line,
                program.span.column,
            )),
        }
    }
}

/// Built-in recursive descent front end
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultParser;

impl SourceParser for DefaultParser {
    fn parse(&self, source: &str) -> Result<Program, ScriptError> {
        Parser::new(source).parse_program()
    }
}

/// Parser for script source code
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::eof(0, 1, 1),
        }
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program, ScriptError> {
        let start = self.current.span;
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program {
            body: body.into(),
            span: self.span_from(start),
        })
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<Statement, ScriptError> {
        if self.check_identifier() && self.peek_is(&TokenKind::Colon) {
            return self.parse_labeled_statement();
        }

        if self.check_keyword(Keyword::Async) && self.peek_is(&TokenKind::Keyword(Keyword::Function)) {
            let start = self.current.span;
            self.advance(); // async
            self.advance(); // function
            return Ok(Statement::FunctionDeclaration(
                self.parse_function_rest(start, true, true)?,
            ));
        }

        match &self.current.kind {
            TokenKind::Keyword(Keyword::Let | Keyword::Const | Keyword::Var) => {
                let decl = self.parse_variable_declaration()?;
                self.expect_semicolon()?;
                Ok(Statement::VariableDeclaration(decl))
            }
            TokenKind::Keyword(Keyword::Function) => {
                let start = self.current.span;
                self.advance();
                Ok(Statement::FunctionDeclaration(
                    self.parse_function_rest(start, false, true)?,
                ))
            }
            TokenKind::Keyword(Keyword::Class) => Ok(Statement::ClassDeclaration(self.parse_class(true)?)),
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Break | Keyword::Continue) => self.parse_jump_statement(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw_statement(),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block_statement()?)),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance();
                Ok(Statement::Empty(EmptyStatement { span }))
            }
            TokenKind::Keyword(Keyword::Import) => Ok(Statement::Import(self.parse_import()?)),
            TokenKind::Keyword(Keyword::Export) => Ok(Statement::Export(self.parse_export()?)),
            _ => {
                let start = self.current.span;
                let expression = self.parse_expression()?;
                self.expect_semicolon()?;
                Ok(Statement::Expression(ExpressionStatement {
                    expression,
                    span: self.span_from(start),
                }))
            }
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration, ScriptError> {
        let start = self.current.span;
        let kind = self.parse_variable_kind()?;

        let mut declarations = vec![self.parse_variable_declarator(kind)?];
        while self.match_token(&TokenKind::Comma) {
            declarations.push(self.parse_variable_declarator(kind)?);
        }

        Ok(VariableDeclaration {
            kind,
            declarations,
            span: self.span_from(start),
        })
    }

    fn parse_variable_kind(&mut self) -> Result<VariableKind, ScriptError> {
        let kind = match &self.current.kind {
            TokenKind::Keyword(Keyword::Let) => VariableKind::Let,
            TokenKind::Keyword(Keyword::Const) => VariableKind::Const,
            TokenKind::Keyword(Keyword::Var) => VariableKind::Var,
            _ => return Err(self.unexpected_token("variable declaration")),
        };
        self.advance();
        Ok(kind)
    }

    fn parse_variable_declarator(
        &mut self,
        kind: VariableKind,
    ) -> Result<VariableDeclarator, ScriptError> {
        let start = self.current.span;
        let id = self.parse_binding_target()?;
        let init = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };

        if init.is_none() && (kind == VariableKind::Const || !matches!(id, Pattern::Identifier(_)))
        {
            // `for (const x of ...)` never reaches here: the for parser handles it
            return Err(self.error("Missing initializer in destructuring or const declaration"));
        }

        Ok(VariableDeclarator {
            id,
            init,
            span: self.span_from(start),
        })
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement, ScriptError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;

        Ok(BlockStatement {
            body: body.into(),
            span: self.span_from(start),
        })
    }

    fn parse_labeled_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        let label = self.parse_identifier_name()?;
        self.require_token(&TokenKind::Colon)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::Labeled(LabeledStatement {
            label,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_if_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::If)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;

        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
            span: self.span_from(start),
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::For)?;
        self.require_token(&TokenKind::LParen)?;

        // for (let x of ...) / for (const k in ...)
        if matches!(
            self.current.kind,
            TokenKind::Keyword(Keyword::Let | Keyword::Const | Keyword::Var)
        ) {
            let decl_start = self.current.span;
            let kind = self.parse_variable_kind()?;
            let pattern = self.parse_binding_target()?;
            if let Some(is_of) = self.match_for_in_of() {
                let left = ForBinding::Declaration { kind, pattern };
                return self.parse_for_in_of_rest(start, left, is_of);
            }

            let init = if self.match_token(&TokenKind::Eq) {
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            let mut declarations = vec![VariableDeclarator {
                id: pattern,
                init,
                span: self.span_from(decl_start),
            }];
            while self.match_token(&TokenKind::Comma) {
                declarations.push(self.parse_variable_declarator(kind)?);
            }
            let init = ForInit::Variable(VariableDeclaration {
                kind,
                declarations,
                span: self.span_from(decl_start),
            });
            return self.parse_for_rest(start, Some(init));
        }

        // for (x of ...) / for (key in ...)
        if self.check_identifier() {
            let checkpoint = self.save();
            let name_start = self.current.span;
            let name = self.parse_identifier_name()?;
            if let Some(is_of) = self.match_for_in_of() {
                let left = ForBinding::Pattern(Pattern::Identifier(Identifier {
                    name,
                    span: name_start,
                }));
                return self.parse_for_in_of_rest(start, left, is_of);
            }
            self.restore(checkpoint);
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(ForInit::Expression(self.parse_expression()?))
        };
        self.parse_for_rest(start, init)
    }

    /// Consume `of` / `in` after a for-loop binding; `Some(true)` for `of`
    fn match_for_in_of(&mut self) -> Option<bool> {
        if self.check_word("of") {
            self.advance();
            Some(true)
        } else if self.match_keyword(Keyword::In) {
            Some(false)
        } else {
            None
        }
    }

    fn parse_for_in_of_rest(
        &mut self,
        start: Span,
        left: ForBinding,
        is_of: bool,
    ) -> Result<Statement, ScriptError> {
        let right = if is_of {
            self.parse_assignment_expression()?
        } else {
            self.parse_expression()?
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(start);
        Ok(if is_of {
            Statement::ForOf(ForOfStatement {
                left,
                right,
                body,
                span,
            })
        } else {
            Statement::ForIn(ForInStatement {
                left,
                right,
                body,
                span,
            })
        })
    }

    fn parse_for_rest(
        &mut self,
        start: Span,
        init: Option<ForInit>,
    ) -> Result<Statement, ScriptError> {
        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::While(WhileStatement {
            test,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Do)?;
        let body = Box::new(self.parse_statement()?);
        self.require_keyword(Keyword::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        self.match_token(&TokenKind::Semicolon);

        Ok(Statement::DoWhile(DoWhileStatement {
            body,
            test,
            span: self.span_from(start),
        }))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Switch)?;
        self.require_token(&TokenKind::LParen)?;
        let discriminant = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        self.require_token(&TokenKind::LBrace)?;

        let mut cases = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = if self.match_keyword(Keyword::Case) {
                Some(self.parse_expression()?)
            } else {
                self.require_keyword(Keyword::Default)?;
                None
            };
            self.require_token(&TokenKind::Colon)?;

            let mut consequent = Vec::new();
            while !matches!(
                self.current.kind,
                TokenKind::Keyword(Keyword::Case | Keyword::Default) | TokenKind::RBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase {
                test,
                consequent,
                span: self.span_from(case_start),
            });
        }
        self.require_token(&TokenKind::RBrace)?;

        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span: self.span_from(start),
        }))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Try)?;
        let block = self.parse_block_statement()?;

        let handler = if self.check_keyword(Keyword::Catch) {
            let catch_start = self.current.span;
            self.advance();
            let param = if self.match_token(&TokenKind::LParen) {
                let param = self.parse_binding_target()?;
                self.require_token(&TokenKind::RParen)?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block_statement()?;
            Some(CatchClause {
                param,
                body,
                span: self.span_from(catch_start),
            })
        } else {
            None
        };

        let finalizer = if self.match_keyword(Keyword::Finally) {
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Return)?;

        let argument = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon()?;

        Ok(Statement::Return(ReturnStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    fn parse_jump_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        let is_break = self.check_keyword(Keyword::Break);
        self.advance();

        let label = if self.check_identifier() && !self.lexer.had_newline_before() {
            Some(self.parse_identifier_name()?)
        } else {
            None
        };
        self.expect_semicolon()?;

        let stmt = JumpStatement {
            label,
            span: self.span_from(start),
        };
        Ok(if is_break {
            Statement::Break(stmt)
        } else {
            Statement::Continue(stmt)
        })
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Throw)?;
        if self.lexer.had_newline_before() {
            return Err(self.error("Illegal newline after throw"));
        }
        let argument = self.parse_expression()?;
        self.expect_semicolon()?;

        Ok(Statement::Throw(ThrowStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    // ============ MODULES ============

    fn parse_import(&mut self) -> Result<ImportDeclaration, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Import)?;

        let mut specifiers = Vec::new();

        // import "side-effect";
        if let TokenKind::String(source) = &self.current.kind {
            let source = source.clone();
            self.advance();
            self.expect_semicolon()?;
            return Ok(ImportDeclaration {
                specifiers,
                source,
                span: self.span_from(start),
            });
        }

        if self.check_identifier() {
            let local = self.parse_identifier_name()?;
            specifiers.push(ImportSpecifier::Default { local });
            if !self.match_token(&TokenKind::Comma) {
                return self.finish_import(start, specifiers);
            }
        }

        if self.match_token(&TokenKind::Star) {
            self.require_word("as")?;
            let local = self.parse_identifier_name()?;
            specifiers.push(ImportSpecifier::Namespace { local });
        } else if self.match_token(&TokenKind::LBrace) {
            while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                let imported = self.parse_property_identifier()?;
                let local = if self.check_word("as") {
                    self.advance();
                    self.parse_identifier_name()?
                } else {
                    imported.clone()
                };
                specifiers.push(ImportSpecifier::Named { imported, local });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.require_token(&TokenKind::RBrace)?;
        }

        self.finish_import(start, specifiers)
    }

    fn finish_import(
        &mut self,
        start: Span,
        specifiers: Vec<ImportSpecifier>,
    ) -> Result<ImportDeclaration, ScriptError> {
        self.require_word("from")?;
        let source = self.parse_module_specifier()?;
        self.expect_semicolon()?;
        Ok(ImportDeclaration {
            specifiers,
            source,
            span: self.span_from(start),
        })
    }

    fn parse_module_specifier(&mut self) -> Result<JsString, ScriptError> {
        match &self.current.kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected_token("module specifier string")),
        }
    }

    fn parse_export(&mut self) -> Result<ExportDeclaration, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Export)?;

        let kind = match &self.current.kind {
            TokenKind::Keyword(Keyword::Default) => {
                self.advance();
                let expr = self.parse_assignment_expression()?;
                self.expect_semicolon()?;
                ExportKind::Default(expr)
            }
            TokenKind::Star => {
                self.advance();
                self.require_word("from")?;
                let source = self.parse_module_specifier()?;
                self.expect_semicolon()?;
                ExportKind::All { source }
            }
            TokenKind::LBrace => {
                self.advance();
                let mut specifiers = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                    let local = self.parse_property_identifier()?;
                    let exported = if self.check_word("as") {
                        self.advance();
                        self.parse_property_identifier()?
                    } else {
                        local.clone()
                    };
                    specifiers.push(ExportSpecifier { local, exported });
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
                self.require_token(&TokenKind::RBrace)?;
                let source = if self.check_word("from") {
                    self.advance();
                    Some(self.parse_module_specifier()?)
                } else {
                    None
                };
                self.expect_semicolon()?;
                ExportKind::Named { specifiers, source }
            }
            TokenKind::Keyword(
                Keyword::Let | Keyword::Const | Keyword::Var | Keyword::Function | Keyword::Async | Keyword::Class,
            ) => ExportKind::Declaration(Box::new(self.parse_statement()?)),
            _ => return Err(self.unexpected_token("export declaration")),
        };

        Ok(ExportDeclaration {
            kind,
            span: self.span_from(start),
        })
    }

    // ============ FUNCTIONS AND CLASSES ============

    /// Parse a function after the `function` keyword
    fn parse_function_rest(
        &mut self,
        start: Span,
        is_async: bool,
        require_name: bool,
    ) -> Result<Rc<FunctionNode>, ScriptError> {
        if self.check(&TokenKind::Star) {
            return Err(self.error("Generator functions are not supported"));
        }
        let id = if self.check_identifier() {
            let span = self.current.span;
            Some(Identifier {
                name: self.parse_identifier_name()?,
                span,
            })
        } else if require_name {
            return Err(self.unexpected_token("function name"));
        } else {
            None
        };

        let params = self.parse_params()?;
        let body = FunctionBody::Block(self.parse_block_statement()?);

        Ok(Rc::new(FunctionNode {
            id,
            params,
            body,
            is_async,
            is_arrow: false,
            span: self.span_from(start),
        }))
    }

    fn parse_params(&mut self) -> Result<Rc<[Pattern]>, ScriptError> {
        self.require_token(&TokenKind::LParen)?;
        let mut params = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let param_start = self.current.span;
            if self.match_token(&TokenKind::DotDotDot) {
                let argument = Box::new(self.parse_binding_target()?);
                params.push(Pattern::Rest(RestElement {
                    argument,
                    span: self.span_from(param_start),
                }));
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RParen)?;
        Ok(params.into())
    }

    fn parse_arrow_function(
        &mut self,
        start: Span,
        params: Rc<[Pattern]>,
        is_async: bool,
    ) -> Result<Expression, ScriptError> {
        self.require_token(&TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_block_statement()?)
        } else {
            FunctionBody::Expression(Rc::new(self.parse_assignment_expression()?))
        };

        Ok(Expression::Arrow(Rc::new(FunctionNode {
            id: None,
            params,
            body,
            is_async,
            is_arrow: true,
            span: self.span_from(start),
        })))
    }

    fn parse_class(&mut self, require_name: bool) -> Result<Rc<ClassNode>, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::Class)?;

        let id = if self.check_identifier() {
            let span = self.current.span;
            Some(Identifier {
                name: self.parse_identifier_name()?,
                span,
            })
        } else if require_name {
            return Err(self.unexpected_token("class name"));
        } else {
            None
        };

        let super_class = if self.match_keyword(Keyword::Extends) {
            Some(Rc::new(self.parse_left_hand_side_expression()?))
        } else {
            None
        };

        self.require_token(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            members.push(self.parse_class_member()?);
        }
        self.require_token(&TokenKind::RBrace)?;

        Ok(Rc::new(ClassNode {
            id,
            super_class,
            members,
            span: self.span_from(start),
        }))
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, ScriptError> {
        let start = self.current.span;

        // `static` is a modifier unless used as the member name itself
        let is_static = self.check_word("static")
            && !self.peek_is(&TokenKind::LParen)
            && !self.peek_is(&TokenKind::Eq);
        if is_static {
            self.advance();
        }

        let mut kind = MethodKind::Method;
        let mut is_async = false;
        if (self.check_word("get") || self.check_word("set"))
            && !self.peek_is(&TokenKind::LParen)
            && !self.peek_is(&TokenKind::Eq)
            && !self.peek_is(&TokenKind::Semicolon)
        {
            kind = if self.check_word("get") {
                MethodKind::Get
            } else {
                MethodKind::Set
            };
            self.advance();
        } else if self.check_keyword(Keyword::Async) && !self.peek_is(&TokenKind::LParen) {
            is_async = true;
            self.advance();
        }

        let is_constructor = !is_static && self.check_word("constructor");
        let key = self.parse_property_name()?;

        if self.check(&TokenKind::LParen) {
            let params = self.parse_params()?;
            let body = FunctionBody::Block(self.parse_block_statement()?);
            let id = match &key {
                PropertyName::Identifier(name) | PropertyName::String(name) => Some(Identifier {
                    name: name.clone(),
                    span: start,
                }),
                _ => None,
            };
            let function = Rc::new(FunctionNode {
                id,
                params,
                body,
                is_async,
                is_arrow: false,
                span: self.span_from(start),
            });
            if is_constructor {
                return Ok(ClassMember::Constructor(function));
            }
            return Ok(ClassMember::Method {
                key,
                function,
                kind,
                is_static,
            });
        }

        let value = if self.match_token(&TokenKind::Eq) {
            Some(Rc::new(self.parse_assignment_expression()?))
        } else {
            None
        };
        self.expect_semicolon()?;
        Ok(ClassMember::Field {
            key,
            value,
            is_static,
        })
    }

    // ============ PATTERNS ============

    /// Identifier, object pattern or array pattern
    fn parse_binding_target(&mut self) -> Result<Pattern, ScriptError> {
        let start = self.current.span;
        match &self.current.kind {
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            _ => {
                let name = self.parse_identifier_name()?;
                Ok(Pattern::Identifier(Identifier { name, span: start }))
            }
        }
    }

    /// Binding target with an optional `= default`
    fn parse_binding_element(&mut self) -> Result<Pattern, ScriptError> {
        let start = self.current.span;
        let target = self.parse_binding_target()?;
        if self.match_token(&TokenKind::Eq) {
            let right = Rc::new(self.parse_assignment_expression()?);
            return Ok(Pattern::Assignment(AssignmentPattern {
                left: Box::new(target),
                right,
                span: self.span_from(start),
            }));
        }
        Ok(target)
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, ScriptError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::DotDotDot) {
                properties.push(ObjectPatternProperty::Rest(Box::new(
                    self.parse_binding_target()?,
                )));
                break;
            }

            let prop_start = self.current.span;
            let key = self.parse_property_name()?;
            let (value, shorthand) = if self.match_token(&TokenKind::Colon) {
                (self.parse_binding_element()?, false)
            } else {
                let PropertyName::Identifier(name) = &key else {
                    return Err(self.unexpected_token("':' in object pattern"));
                };
                let target = Pattern::Identifier(Identifier {
                    name: name.clone(),
                    span: prop_start,
                });
                if self.match_token(&TokenKind::Eq) {
                    let right = Rc::new(self.parse_assignment_expression()?);
                    let pattern = Pattern::Assignment(AssignmentPattern {
                        left: Box::new(target),
                        right,
                        span: self.span_from(prop_start),
                    });
                    (pattern, true)
                } else {
                    (target, true)
                }
            };
            properties.push(ObjectPatternProperty::KeyValue {
                key,
                value,
                shorthand,
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RBrace)?;

        Ok(Pattern::Object(ObjectPattern {
            properties,
            span: self.span_from(start),
        }))
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, ScriptError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            let elem_start = self.current.span;
            if self.match_token(&TokenKind::DotDotDot) {
                let argument = Box::new(self.parse_binding_target()?);
                elements.push(Some(Pattern::Rest(RestElement {
                    argument,
                    span: self.span_from(elem_start),
                })));
                break;
            }
            elements.push(Some(self.parse_binding_element()?));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RBracket)?;

        Ok(Pattern::Array(ArrayPattern {
            elements,
            span: self.span_from(start),
        }))
    }

    // ============ EXPRESSIONS ============

    pub fn parse_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        let first = self.parse_assignment_expression()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut expressions = vec![first];
        while self.match_token(&TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression()?);
        }
        Ok(Expression::Sequence(SequenceExpression {
            expressions,
            span: self.span_from(start),
        }))
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;

        if let Some(arrow) = self.try_parse_arrow(start)? {
            return Ok(arrow);
        }

        let expr = self.parse_conditional_expression()?;

        if let Some(operator) = self.current_assignment_op() {
            let target = self.expression_to_assignment_target(expr)?;
            self.advance();
            let value = Rc::new(self.parse_assignment_expression()?);
            return Ok(Expression::Assignment(AssignmentExpression {
                operator,
                target,
                value,
                span: self.span_from(start),
            }));
        }

        Ok(expr)
    }

    /// Recognise `x =>`, `(a, b) =>`, `async x =>` and `async (a) =>`
    fn try_parse_arrow(&mut self, start: Span) -> Result<Option<Expression>, ScriptError> {
        let is_async = self.check_keyword(Keyword::Async)
            && !self.peek_is(&TokenKind::Arrow)
            && (self.peek_is(&TokenKind::LParen) || self.peek_is_identifier());
        if is_async {
            let checkpoint = self.save();
            self.advance();
            if self.check_identifier() && self.peek_is(&TokenKind::Arrow) {
                let param = self.parse_binding_target()?;
                return self.parse_arrow_function(start, vec![param].into(), true).map(Some);
            }
            if self.check(&TokenKind::LParen) && self.is_arrow_ahead() {
                let params = self.parse_params()?;
                return self.parse_arrow_function(start, params, true).map(Some);
            }
            // `async(...)` as a plain call
            self.restore(checkpoint);
            return Ok(None);
        }

        if (self.check_identifier() || self.check_keyword(Keyword::Async))
            && self.peek_is(&TokenKind::Arrow)
        {
            let name = match &self.current.kind {
                TokenKind::Identifier(name) => name.clone(),
                _ => JsString::from("async"),
            };
            self.advance();
            let param = Pattern::Identifier(Identifier { name, span: start });
            return self.parse_arrow_function(start, vec![param].into(), false).map(Some);
        }

        if self.check(&TokenKind::LParen) && self.is_arrow_ahead() {
            let params = self.parse_params()?;
            return self.parse_arrow_function(start, params, false).map(Some);
        }

        Ok(None)
    }

    /// With the current token at `(`, check whether the matching `)` is followed by `=>`
    fn is_arrow_ahead(&mut self) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let mut depth = 1usize;
        let mut result = false;
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        result = self.lexer.next_token().kind == TokenKind::Arrow;
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
        }
        self.lexer.restore(checkpoint);
        result
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        let test = self.parse_binary_expression(0)?;

        if self.match_token(&TokenKind::Question) {
            let consequent = Rc::new(self.parse_assignment_expression()?);
            self.require_token(&TokenKind::Colon)?;
            let alternate = Rc::new(self.parse_assignment_expression()?);
            return Ok(Expression::Conditional(ConditionalExpression {
                test: Rc::new(test),
                consequent,
                alternate,
                span: self.span_from(start),
            }));
        }

        Ok(test)
    }

    /// Pratt parser for binary and logical expressions
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        let mut left = self.parse_unary_expression()?;

        while let Some((op, prec)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            self.advance();

            // ** is right associative
            let right_assoc = matches!(op, Operator::Binary(BinaryOp::Exp));
            let next_prec = if right_assoc { prec } else { prec + 1 };
            let right = Rc::new(self.parse_binary_expression(next_prec)?);
            let span = self.span_from(start);

            left = match op {
                Operator::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: Rc::new(left),
                    right,
                    span,
                }),
                Operator::Logical(operator) => Expression::Logical(LogicalExpression {
                    operator,
                    left: Rc::new(left),
                    right,
                    span,
                }),
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;

        if self.check_keyword(Keyword::Await) {
            self.advance();
            let argument = Rc::new(self.parse_unary_expression()?);
            return Ok(Expression::Await(AwaitExpression {
                argument,
                span: self.span_from(start),
            }));
        }

        if let Some(operator) = self.current_update_op() {
            self.advance();
            let argument = Rc::new(self.parse_unary_expression()?);
            self.check_update_target(&argument)?;
            return Ok(Expression::Update(UpdateExpression {
                operator,
                prefix: true,
                argument,
                span: self.span_from(start),
            }));
        }

        if let Some(operator) = self.current_unary_op() {
            self.advance();
            let argument = Rc::new(self.parse_unary_expression()?);
            if operator == UnaryOp::Minus || operator == UnaryOp::Plus {
                // `-x ** 2` is ambiguous and rejected
                if self.check(&TokenKind::StarStar) {
                    return Err(self.error("Unary operator before ** requires parentheses"));
                }
            }
            return Ok(Expression::Unary(UnaryExpression {
                operator,
                argument,
                span: self.span_from(start),
            }));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        let expr = self.parse_left_hand_side_expression()?;

        if !self.lexer.had_newline_before() {
            if let Some(operator) = self.current_update_op() {
                self.check_update_target(&expr)?;
                self.advance();
                return Ok(Expression::Update(UpdateExpression {
                    operator,
                    prefix: false,
                    argument: Rc::new(expr),
                    span: self.span_from(start),
                }));
            }
        }

        Ok(expr)
    }

    fn check_update_target(&self, expr: &Expression) -> Result<(), ScriptError> {
        match expr {
            Expression::Identifier(_) | Expression::Member(_) => Ok(()),
            _ => Err(self.error("Invalid left-hand side expression in update operation")),
        }
    }

    /// Member access, calls and `new`
    fn parse_left_hand_side_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;

        let mut expr = if self.check_keyword(Keyword::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };

        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    expr = Expression::Member(MemberExpression {
                        object: Rc::new(expr),
                        property,
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    expr = match &self.current.kind {
                        TokenKind::LParen => {
                            let arguments = self.parse_arguments()?;
                            Expression::Call(CallExpression {
                                callee: Rc::new(expr),
                                arguments,
                                optional: true,
                                span: self.span_from(start),
                            })
                        }
                        TokenKind::LBracket => {
                            self.advance();
                            let property = self.parse_expression()?;
                            self.require_token(&TokenKind::RBracket)?;
                            Expression::Member(MemberExpression {
                                object: Rc::new(expr),
                                property: MemberProperty::Computed(Rc::new(property)),
                                optional: true,
                                span: self.span_from(start),
                            })
                        }
                        _ => {
                            let property = self.parse_member_name()?;
                            Expression::Member(MemberExpression {
                                object: Rc::new(expr),
                                property,
                                optional: true,
                                span: self.span_from(start),
                            })
                        }
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let property = self.parse_expression()?;
                    self.require_token(&TokenKind::RBracket)?;
                    expr = Expression::Member(MemberExpression {
                        object: Rc::new(expr),
                        property: MemberProperty::Computed(Rc::new(property)),
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::LParen => {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call(CallExpression {
                        callee: Rc::new(expr),
                        arguments,
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::Template(..) => {
                    return Err(self.error("Tagged templates are not supported"));
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        self.require_keyword(Keyword::New)?;

        let mut callee = if self.check_keyword(Keyword::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };

        // The callee stops at the first argument list
        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    callee = Expression::Member(MemberExpression {
                        object: Rc::new(callee),
                        property,
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                TokenKind::LBracket => {
                    self.advance();
                    let property = self.parse_expression()?;
                    self.require_token(&TokenKind::RBracket)?;
                    callee = Expression::Member(MemberExpression {
                        object: Rc::new(callee),
                        property: MemberProperty::Computed(Rc::new(property)),
                        optional: false,
                        span: self.span_from(start),
                    });
                }
                _ => break,
            }
        }

        let arguments = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expression::New(NewExpression {
            callee: Rc::new(callee),
            arguments,
            span: self.span_from(start),
        }))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ScriptError> {
        self.require_token(&TokenKind::LParen)?;
        let mut arguments = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            if self.match_token(&TokenKind::DotDotDot) {
                arguments.push(Argument::Spread(self.parse_assignment_expression()?));
            } else {
                arguments.push(Argument::Expression(self.parse_assignment_expression()?));
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_member_name(&mut self) -> Result<MemberProperty, ScriptError> {
        let span = self.current.span;
        let name = self.parse_property_identifier()?;
        Ok(MemberProperty::Identifier(Identifier { name, span }))
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;

        let literal = |value| {
            Ok(Expression::Literal(Literal {
                value,
                span: start,
            }))
        };

        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                literal(LiteralValue::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                literal(LiteralValue::String(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                literal(LiteralValue::Boolean(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                literal(LiteralValue::Boolean(false))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                literal(LiteralValue::Null)
            }
            TokenKind::Template(quasis, expressions) => {
                self.advance();
                let expressions = expressions
                    .into_iter()
                    .map(|(source, span)| TemplateExpression { source, span })
                    .collect();
                Ok(Expression::Template(TemplateLiteral {
                    quasis,
                    expressions,
                    span: start,
                }))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expression::Identifier(Identifier { name, span: start }))
            }
            TokenKind::Keyword(Keyword::Async) if self.peek_is(&TokenKind::Keyword(Keyword::Function)) => {
                self.advance();
                self.advance();
                Ok(Expression::Function(self.parse_function_rest(start, true, false)?))
            }
            TokenKind::Keyword(Keyword::Async) => {
                // `async` used as a plain identifier
                self.advance();
                Ok(Expression::Identifier(Identifier {
                    name: JsString::from("async"),
                    span: start,
                }))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expression::This(crate::ast::Keyword { span: start }))
            }
            TokenKind::Keyword(Keyword::Super) => {
                self.advance();
                if !matches!(
                    self.current.kind,
                    TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket
                ) {
                    return Err(self.error("'super' keyword unexpected here"));
                }
                Ok(Expression::Super(crate::ast::Keyword { span: start }))
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                Ok(Expression::Function(self.parse_function_rest(start, false, false)?))
            }
            TokenKind::Keyword(Keyword::Class) => Ok(Expression::Class(self.parse_class(false)?)),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.require_token(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Slash | TokenKind::SlashEq => {
                let token = self.lexer.rescan_regexp(start);
                let TokenKind::RegExp(pattern, flags) = token.kind.clone() else {
                    return Err(self.error("Unterminated regular expression literal"));
                };
                let span = token.span;
                self.current = token;
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::RegExp { pattern, flags },
                    span,
                }))
            }
            TokenKind::Unterminated => Err(self.error("Unterminated string or template literal")),
            _ => Err(self.unexpected_token("expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.match_token(&TokenKind::Comma) {
                elements.push(ArrayElement::Hole);
                continue;
            }
            if self.match_token(&TokenKind::DotDotDot) {
                elements.push(ArrayElement::Spread(self.parse_assignment_expression()?));
            } else {
                elements.push(ArrayElement::Expression(
                    self.parse_assignment_expression()?,
                ));
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RBracket)?;

        Ok(Expression::Array(ArrayExpression {
            elements,
            span: self.span_from(start),
        }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, ScriptError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::DotDotDot) {
                properties.push(ObjectMember::Spread(self.parse_assignment_expression()?));
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                continue;
            }

            let prop_start = self.current.span;
            let is_async = self.check_keyword(Keyword::Async)
                && !matches!(
                    self.peek_kind(),
                    TokenKind::Colon | TokenKind::Comma | TokenKind::LParen | TokenKind::RBrace
                );
            if is_async {
                self.advance();
            }
            if (self.check_word("get") || self.check_word("set"))
                && !matches!(
                    self.peek_kind(),
                    TokenKind::Colon | TokenKind::Comma | TokenKind::LParen | TokenKind::RBrace
                )
            {
                return Err(self.error("Accessors in object literals are not supported"));
            }

            let key = self.parse_property_name()?;
            let value = if self.check(&TokenKind::LParen) {
                // Method shorthand
                let params = self.parse_params()?;
                let body = FunctionBody::Block(self.parse_block_statement()?);
                let id = match &key {
                    PropertyName::Identifier(name) | PropertyName::String(name) => {
                        Some(Identifier {
                            name: name.clone(),
                            span: prop_start,
                        })
                    }
                    _ => None,
                };
                Expression::Function(Rc::new(FunctionNode {
                    id,
                    params,
                    body,
                    is_async,
                    is_arrow: false,
                    span: self.span_from(prop_start),
                }))
            } else if self.match_token(&TokenKind::Colon) {
                self.parse_assignment_expression()?
            } else {
                let PropertyName::Identifier(name) = &key else {
                    return Err(self.unexpected_token("':' after property name"));
                };
                Expression::Identifier(Identifier {
                    name: name.clone(),
                    span: prop_start,
                })
            };
            properties.push(ObjectMember::Property { key, value });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RBrace)?;

        Ok(Expression::Object(ObjectExpression {
            properties,
            span: self.span_from(start),
        }))
    }

    fn parse_property_name(&mut self) -> Result<PropertyName, ScriptError> {
        match self.current.kind.clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(PropertyName::String(s))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(PropertyName::Number(n))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_assignment_expression()?;
                self.require_token(&TokenKind::RBracket)?;
                Ok(PropertyName::Computed(Rc::new(expr)))
            }
            _ => Ok(PropertyName::Identifier(self.parse_property_identifier()?)),
        }
    }

    // ============ ASSIGNMENT TARGETS ============

    fn expression_to_assignment_target(
        &self,
        expr: Expression,
    ) -> Result<AssignmentTarget, ScriptError> {
        match expr {
            Expression::Identifier(id) => Ok(AssignmentTarget::Identifier(id)),
            Expression::Member(member) if !member.optional => Ok(AssignmentTarget::Member(member)),
            Expression::Array(_) | Expression::Object(_) => {
                Ok(AssignmentTarget::Pattern(self.expression_to_pattern(expr)?))
            }
            _ => Err(self.error("Invalid left-hand side in assignment")),
        }
    }

    /// Reinterpret an array/object literal as a destructuring pattern
    fn expression_to_pattern(&self, expr: Expression) -> Result<Pattern, ScriptError> {
        match expr {
            Expression::Identifier(id) => Ok(Pattern::Identifier(id)),
            Expression::Assignment(assign) if assign.operator == AssignmentOp::Assign => {
                let left = match assign.target {
                    AssignmentTarget::Identifier(id) => Pattern::Identifier(id),
                    AssignmentTarget::Pattern(p) => p,
                    AssignmentTarget::Member(_) => {
                        return Err(self.error("Invalid destructuring assignment target"));
                    }
                };
                Ok(Pattern::Assignment(AssignmentPattern {
                    left: Box::new(left),
                    right: assign.value,
                    span: assign.span,
                }))
            }
            Expression::Array(arr) => {
                let mut elements = Vec::new();
                for elem in arr.elements {
                    elements.push(match elem {
                        ArrayElement::Hole => None,
                        ArrayElement::Expression(e) => Some(self.expression_to_pattern(e)?),
                        ArrayElement::Spread(e) => {
                            let span = e.span();
                            Some(Pattern::Rest(RestElement {
                                argument: Box::new(self.expression_to_pattern(e)?),
                                span,
                            }))
                        }
                    });
                }
                Ok(Pattern::Array(ArrayPattern {
                    elements,
                    span: arr.span,
                }))
            }
            Expression::Object(obj) => {
                let mut properties = Vec::new();
                for member in obj.properties {
                    properties.push(match member {
                        ObjectMember::Property { key, value } => {
                            let shorthand = matches!(
                                (&key, &value),
                                (PropertyName::Identifier(k), Expression::Identifier(v)) if k == &v.name
                            );
                            ObjectPatternProperty::KeyValue {
                                key,
                                value: self.expression_to_pattern(value)?,
                                shorthand,
                            }
                        }
                        ObjectMember::Spread(e) => {
                            ObjectPatternProperty::Rest(Box::new(self.expression_to_pattern(e)?))
                        }
                    });
                }
                Ok(Pattern::Object(ObjectPattern {
                    properties,
                    span: obj.span,
                }))
            }
            _ => Err(self.error("Invalid destructuring assignment target")),
        }
    }

    // ============ TOKEN HELPERS ============

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn save(&self) -> (crate::lexer::LexerCheckpoint, Token, Token) {
        (
            self.lexer.checkpoint(),
            self.current.clone(),
            self.previous.clone(),
        )
    }

    fn restore(&mut self, saved: (crate::lexer::LexerCheckpoint, Token, Token)) {
        let (checkpoint, current, previous) = saved;
        self.lexer.restore(checkpoint);
        self.current = current;
        self.previous = previous;
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), ScriptError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&describe_token(kind)))
        }
    }

    /// Contextual words such as `of` and `from` arrive as identifiers
    fn require_word(&mut self, word: &str) -> Result<(), ScriptError> {
        if self.check_word(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("'{}'", word)))
        }
    }

    fn require_keyword(&mut self, keyword: Keyword) -> Result<(), ScriptError> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("keyword '{}'", keyword.as_str())))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), ScriptError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }

        // ASI: accept if at end, before }, or after newline
        if self.is_at_end() || self.check(&TokenKind::RBrace) || self.lexer.had_newline_before() {
            return Ok(());
        }

        Err(self.unexpected_token("';'"))
    }

    fn at_statement_end(&self) -> bool {
        self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.lexer.had_newline_before()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        same_kind(&self.current.kind, kind)
    }

    fn peek_kind(&mut self) -> TokenKind {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        next.kind
    }

    /// Check if the next token (after current) is of the given kind
    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        same_kind(&self.peek_kind(), kind)
    }

    fn peek_is_identifier(&mut self) -> bool {
        matches!(self.peek_kind(), TokenKind::Identifier(_))
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current.kind, TokenKind::Identifier(_))
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(s) if s == word)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current.kind == TokenKind::Keyword(keyword)
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn parse_identifier_name(&mut self) -> Result<JsString, ScriptError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword(Keyword::Async) => {
                self.advance();
                Ok(JsString::from("async"))
            }
            _ => Err(self.unexpected_token("identifier")),
        }
    }

    /// Identifier or reserved word, as allowed after `.` and in property keys
    fn parse_property_identifier(&mut self) -> Result<JsString, ScriptError> {
        if let TokenKind::Keyword(keyword) = self.current.kind {
            self.advance();
            return Ok(JsString::from(keyword.as_str()));
        }
        self.parse_identifier_name()
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(
            start.start,
            self.previous.span.end,
            start.line,
            start.column,
        )
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::parse_error(message, self.current.span.line, self.current.span.column)
    }

    fn unexpected_token(&self, expected: &str) -> ScriptError {
        ScriptError::parse_error(
            format!(
                "Unexpected {}, expected {}",
                describe_token(&self.current.kind),
                expected
            ),
            self.current.span.line,
            self.current.span.column,
        )
    }

    fn current_binary_op(&self) -> Option<(Operator, u8)> {
        let op = match &self.current.kind {
            TokenKind::QuestionQuestion => (Operator::Logical(LogicalOp::NullishCoalescing), 1),
            TokenKind::PipePipe => (Operator::Logical(LogicalOp::Or), 2),
            TokenKind::AmpAmp => (Operator::Logical(LogicalOp::And), 3),
            TokenKind::Pipe => (Operator::Binary(BinaryOp::BitOr), 4),
            TokenKind::Caret => (Operator::Binary(BinaryOp::BitXor), 5),
            TokenKind::Amp => (Operator::Binary(BinaryOp::BitAnd), 6),
            TokenKind::EqEq => (Operator::Binary(BinaryOp::Eq), 7),
            TokenKind::BangEq => (Operator::Binary(BinaryOp::NotEq), 7),
            TokenKind::EqEqEq => (Operator::Binary(BinaryOp::StrictEq), 7),
            TokenKind::BangEqEq => (Operator::Binary(BinaryOp::StrictNotEq), 7),
            TokenKind::Lt => (Operator::Binary(BinaryOp::Lt), 8),
            TokenKind::LtEq => (Operator::Binary(BinaryOp::LtEq), 8),
            TokenKind::Gt => (Operator::Binary(BinaryOp::Gt), 8),
            TokenKind::GtEq => (Operator::Binary(BinaryOp::GtEq), 8),
            TokenKind::Keyword(Keyword::In) => (Operator::Binary(BinaryOp::In), 8),
            TokenKind::Keyword(Keyword::Instanceof) => (Operator::Binary(BinaryOp::Instanceof), 8),
            TokenKind::LtLt => (Operator::Binary(BinaryOp::LShift), 9),
            TokenKind::GtGt => (Operator::Binary(BinaryOp::RShift), 9),
            TokenKind::GtGtGt => (Operator::Binary(BinaryOp::URShift), 9),
            TokenKind::Plus => (Operator::Binary(BinaryOp::Add), 10),
            TokenKind::Minus => (Operator::Binary(BinaryOp::Sub), 10),
            TokenKind::Star => (Operator::Binary(BinaryOp::Mul), 11),
            TokenKind::Slash => (Operator::Binary(BinaryOp::Div), 11),
            TokenKind::Percent => (Operator::Binary(BinaryOp::Mod), 11),
            TokenKind::StarStar => (Operator::Binary(BinaryOp::Exp), 12),
            _ => return None,
        };
        Some(op)
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        match &self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Keyword(Keyword::Typeof) => Some(UnaryOp::Typeof),
            TokenKind::Keyword(Keyword::Void) => Some(UnaryOp::Void),
            TokenKind::Keyword(Keyword::Delete) => Some(UnaryOp::Delete),
            _ => None,
        }
    }

    fn current_update_op(&self) -> Option<UpdateOp> {
        match &self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        }
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        match &self.current.kind {
            TokenKind::Eq => Some(AssignmentOp::Assign),
            TokenKind::PlusEq => Some(AssignmentOp::AddAssign),
            TokenKind::MinusEq => Some(AssignmentOp::SubAssign),
            TokenKind::StarEq => Some(AssignmentOp::MulAssign),
            TokenKind::SlashEq => Some(AssignmentOp::DivAssign),
            TokenKind::PercentEq => Some(AssignmentOp::ModAssign),
            TokenKind::StarStarEq => Some(AssignmentOp::ExpAssign),
            TokenKind::AmpAmpEq => Some(AssignmentOp::AndAssign),
            TokenKind::PipePipeEq => Some(AssignmentOp::OrAssign),
            TokenKind::QuestionQuestionEq => Some(AssignmentOp::NullishAssign),
            _ => None,
        }
    }
}

/// Operator found by the Pratt loop
#[derive(Debug, Clone, Copy)]
enum Operator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Token kinds match on variant, except keywords which must be the same word
fn same_kind(a: &TokenKind, b: &TokenKind) -> bool {
    match (a, b) {
        (TokenKind::Keyword(x), TokenKind::Keyword(y)) => x == y,
        _ => std::mem::discriminant(a) == std::mem::discriminant(b),
    }
}

fn describe_token(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::String(s) => format!("string \"{}\"", s),
        TokenKind::Template(..) => "template literal".to_string(),
        TokenKind::RegExp(..) => "regular expression".to_string(),
        TokenKind::Identifier(name) => format!("identifier '{}'", name),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Invalid(c) => format!("character '{}'", c),
        TokenKind::Unterminated => "unterminated literal".to_string(),
        TokenKind::Keyword(keyword) => format!("keyword '{}'", keyword.as_str()),
        other => match other.text() {
            Some(text) => format!("'{}'", text),
            None => format!("token {:?}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).parse_program().unwrap()
    }

    fn parse_expr(source: &str) -> Expression {
        DefaultParser.parse_expression(source).unwrap()
    }

    #[test]
    fn test_precedence() {
        let Expression::Binary(add) = parse_expr("1 + 2 * 3") else {
            panic!("expected binary expression");
        };
        assert_eq!(add.operator, BinaryOp::Add);
        assert!(matches!(add.right.as_ref(), Expression::Binary(b) if b.operator == BinaryOp::Mul));
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let Expression::Binary(outer) = parse_expr("2 ** 3 ** 2") else {
            panic!("expected binary expression");
        };
        assert!(matches!(outer.left.as_ref(), Expression::Literal(_)));
        assert!(matches!(outer.right.as_ref(), Expression::Binary(_)));
    }

    #[test]
    fn test_arrow_functions() {
        assert!(matches!(parse_expr("x => x * 2"), Expression::Arrow(f) if f.is_sync()));
        assert!(matches!(parse_expr("(a, b = 1) => { return a + b }"), Expression::Arrow(f) if !f.is_sync()));
        assert!(matches!(parse_expr("async (a) => a"), Expression::Arrow(f) if f.is_async));
        assert!(matches!(parse_expr("(a + b)"), Expression::Binary(_)));
    }

    #[test]
    fn test_asi() {
        let program = parse("let a = 1\nlet b = 2\na + b");
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_return_newline_terminates() {
        let program = parse("function f() { return\n42 }");
        let Some(Statement::FunctionDeclaration(f)) = program.body.first() else {
            panic!("expected function declaration");
        };
        let FunctionBody::Block(body) = &f.body else {
            panic!("expected block body");
        };
        assert!(matches!(body.body.first(), Some(Statement::Return(r)) if r.argument.is_none()));
    }

    #[test]
    fn test_for_of_and_in() {
        let program = parse("for (const [k, v] of entries) {} for (key in obj) {}");
        assert!(matches!(program.body.first(), Some(Statement::ForOf(_))));
        assert!(matches!(program.body.get(1), Some(Statement::ForIn(_))));
    }

    #[test]
    fn test_destructuring_assignment() {
        let Expression::Assignment(assign) = parse_expr("[a, b] = [b, a]") else {
            panic!("expected assignment");
        };
        assert!(matches!(assign.target, AssignmentTarget::Pattern(Pattern::Array(_))));
    }

    #[test]
    fn test_class_member_kinds() {
        let program = parse(
            "class A extends B { static count = 0; constructor(x) { super(x) } get size() { return 1 } static make() {} }",
        );
        let Some(Statement::ClassDeclaration(class)) = program.body.first() else {
            panic!("expected class");
        };
        assert!(class.super_class.is_some());
        assert_eq!(class.members.len(), 4);
        assert!(matches!(
            class.members.get(2),
            Some(ClassMember::Method { kind: MethodKind::Get, .. })
        ));
    }

    #[test]
    fn test_modules() {
        let program = parse(
            "import def, { a as b } from './m'; import * as ns from 'n'; export const x = 1; export default x; export { x as y };",
        );
        assert_eq!(program.body.len(), 5);
    }

    #[test]
    fn test_parse_error_location() {
        let err = Parser::new("let x = ;").parse_program().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
        let loc = err.location().unwrap();
        assert_eq!((loc.line, loc.column), (1, 9));
    }

    #[test]
    fn test_optional_chain_and_template() {
        assert!(matches!(parse_expr("a?.b?.[0]"), Expression::Member(m) if m.optional));
        let Expression::Template(t) = parse_expr("`sum: ${a + b}`") else {
            panic!("expected template");
        };
        assert_eq!(t.expressions.len(), 1);
    }
}
