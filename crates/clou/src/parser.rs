//! Recursive-descent parser: token stream → AST (§4.2).
//!
//! Precedence, lowest to highest: assignment, logical-or, logical-and,
//! equality, comparison, additive, multiplicative, unary (prefix `!`/`-`),
//! power (right-associative `^`), call/member/index (postfix), primary.

use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, Literal, Param, Params, Stmt};
use crate::error::ParseError;
use crate::token::{Literal as TokLiteral, Token, TokenKind};

const MAX_PARAMS: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parses the whole token stream into a program. Per §7, a parse reports
    /// at most one error — the first encountered — and aborts.
    pub fn parse(mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.synchronize();
                    return Err(e);
                }
            }
        }
        Ok(statements)
    }

    // ---- declarations ----

    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.match_kind(TokenKind::Class) {
            return self.class_declaration();
        }
        if self.match_kind(TokenKind::Function) {
            return self.function_declaration("function");
        }
        if self.match_kind(TokenKind::Let) {
            return self.var_declaration(false);
        }
        if self.match_kind(TokenKind::Const) {
            return self.var_declaration(true);
        }
        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect class name")?.clone();
        let superclass = if self.match_kind(TokenKind::Extends) {
            Some(self.consume(TokenKind::Identifier, "Expect superclass name")?.clone())
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            self.consume(TokenKind::Function, "Expect method declaration")?;
            let decl = self.function_body("method")?;
            methods.push(Rc::new(decl));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body")?;
        Ok(Stmt::Class { name, superclass, methods })
    }

    fn function_declaration(&mut self, kind: &str) -> Result<Stmt, ParseError> {
        let decl = self.function_body(kind)?;
        Ok(Stmt::FunctionDecl(Rc::new(decl)))
    }

    /// Parses `name? '(' params ')' '{' body '}'`. Function declarations and
    /// methods require a name; the caller supplies it via `consume` before
    /// reaching here for both cases (so `name` is always present except for
    /// anonymous function expressions, which call `function_params_and_body`
    /// directly).
    fn function_body(&mut self, kind: &str) -> Result<FunctionDecl, ParseError> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name"))?.clone();
        let (params, body) = self.function_params_and_body(kind)?;
        Ok(FunctionDecl {
            name: Some(name.lexeme),
            params,
            body,
        })
    }

    fn function_params_and_body(&mut self, kind: &str) -> Result<(Params, Rc<[Stmt]>), ParseError> {
        self.consume(TokenKind::LeftParen, &format!("Expect '(' after {kind} name"))?;
        let mut positional = Vec::new();
        let mut rest = None;
        if !self.check(TokenKind::RightParen) {
            loop {
                if positional.len() >= MAX_PARAMS {
                    return Err(self.error_at_current("Can't have more than 255 parameters"));
                }
                if self.match_kind(TokenKind::Spread) {
                    let name = self.consume(TokenKind::Identifier, "Expect rest parameter name")?.clone();
                    rest = Some(name.lexeme);
                    break;
                }
                let name = self.consume(TokenKind::Identifier, "Expect parameter name")?.clone();
                let default = if self.match_kind(TokenKind::Equal) {
                    Some(Box::new(self.expression()?))
                } else {
                    None
                };
                positional.push(Param { name: name.lexeme, default });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters")?;
        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {kind} body"))?;
        let body = self.block()?;
        Ok((Params { positional, rest }, body))
    }

    fn var_declaration(&mut self, is_const: bool) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name")?.clone();
        let initializer = if self.match_kind(TokenKind::Equal) {
            Some(self.expression()?)
        } else if is_const {
            return Err(ParseError::new("Expect initializer for const declaration", &name));
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration")?;
        Ok(Stmt::Var { name, is_const, initializer })
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_kind(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_kind(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_kind(TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expression_statement()
    }

    fn block(&mut self) -> Result<Rc<[Stmt]>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block")?;
        Ok(statements.into())
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after while condition")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// Desugars `for (init; cond; incr) body` into the equivalent `While`,
    /// with the increment appended to the loop body and the initializer
    /// prepended as a surrounding block (§4.2).
    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'")?;

        let initializer = if self.match_kind(TokenKind::Semicolon) {
            None
        } else if self.match_kind(TokenKind::Let) {
            Some(self.var_declaration(false)?)
        } else if self.match_kind(TokenKind::Const) {
            Some(self.var_declaration(true)?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semicolon) {
            Expr::Literal(Literal::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition")?;

        let increment = if self.check(TokenKind::RightParen) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses")?;

        let mut body = self.statement()?;
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)].into());
        }
        let while_stmt = Stmt::While { condition, body: Box::new(body) };
        Ok(match initializer {
            Some(initializer) => Stmt::Block(vec![initializer, while_stmt].into()),
            None => while_stmt,
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.logic_or()?;
        if self.match_kind(TokenKind::Equal) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);
            return match target {
                Expr::Variable(name) => Ok(Expr::Assign { name, value }),
                Expr::Get { object, name } => Ok(Expr::Set { object, name, value }),
                Expr::Index { object, bracket, index } => Ok(Expr::IndexAssign { object, bracket, index, value }),
                _ => Err(ParseError::new("Invalid assignment target", &equals)),
            };
        }
        Ok(target)
    }

    fn logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logic_and()?;
        while self.match_kind(TokenKind::Or) {
            let op = self.previous().clone();
            let right = Box::new(self.logic_and()?);
            expr = Expr::Logical { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_kind(TokenKind::And) {
            let op = self.previous().clone();
            let right = Box::new(self.equality()?);
            expr = Expr::Logical { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while self.match_any(&[TokenKind::EqualEqual, TokenKind::BangEqual]) {
            let op = self.previous().clone();
            let right = Box::new(self.comparison()?);
            expr = Expr::Binary { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.additive()?;
        while self.match_any(&[TokenKind::Less, TokenKind::LessEqual, TokenKind::Greater, TokenKind::GreaterEqual]) {
            let op = self.previous().clone();
            let right = Box::new(self.additive()?);
            expr = Expr::Binary { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.multiplicative()?;
        while self.match_any(&[TokenKind::Plus, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = Box::new(self.multiplicative()?);
            expr = Expr::Binary { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while self.match_any(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent]) {
            let op = self.previous().clone();
            let right = Box::new(self.unary()?);
            expr = Expr::Binary { left: Box::new(expr), op, right };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus, TokenKind::Not]) {
            let op = self.previous().clone();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { op, right });
        }
        self.power()
    }

    /// Right-associative: `2^3^2` parses as `2^(3^2)`.
    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.call_or_member()?;
        if self.match_kind(TokenKind::Caret) {
            let op = self.previous().clone();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Binary { left: Box::new(base), op, right });
        }
        Ok(base)
    }

    fn call_or_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(TokenKind::Dot) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'")?.clone();
                expr = Expr::Get { object: Box::new(expr), name };
            } else if self.match_kind(TokenKind::LeftBracket) {
                let bracket = self.previous().clone();
                let index = Box::new(self.expression()?);
                self.consume(TokenKind::RightBracket, "Expect ']' after index")?;
                expr = Expr::Index { object: Box::new(expr), bracket, index };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let (args, paren) = self.argument_list()?;
        Ok(Expr::Call { callee: Box::new(callee), paren, args })
    }

    /// Parses a comma-separated argument list up to the closing `)`, which
    /// the caller has not yet consumed when this is called (the opening `(`
    /// has already been consumed). Shared by `Call` and `New`.
    fn argument_list(&mut self) -> Result<(Vec<Expr>, Token), ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_PARAMS {
                    return Err(self.error_at_current("Can't have more than 255 arguments"));
                }
                args.push(self.expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments")?.clone();
        Ok((args, paren))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(TokenKind::False) {
            return Ok(Expr::Literal(Literal::Boolean(false)));
        }
        if self.match_kind(TokenKind::True) {
            return Ok(Expr::Literal(Literal::Boolean(true)));
        }
        if self.match_kind(TokenKind::Null) {
            return Ok(Expr::Literal(Literal::Null));
        }
        if self.match_kind(TokenKind::Number) {
            let Some(TokLiteral::Number(n)) = self.previous().literal else {
                unreachable!("Number token always carries a Literal::Number")
            };
            return Ok(Expr::Literal(Literal::Number(n)));
        }
        if self.match_kind(TokenKind::String) {
            let lit = match &self.previous().literal {
                Some(TokLiteral::String(s)) => Rc::clone(s),
                _ => unreachable!("String token always carries a Literal::String"),
            };
            return Ok(Expr::Literal(Literal::String(lit)));
        }
        if self.match_kind(TokenKind::This) {
            return Ok(Expr::This(self.previous().clone()));
        }
        if self.match_kind(TokenKind::Super) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expect '.' after 'super'")?;
            let method = self.consume(TokenKind::Identifier, "Expect superclass method name")?.clone();
            return Ok(Expr::Super { keyword, method });
        }
        if self.match_kind(TokenKind::New) {
            let class_name = self.consume(TokenKind::Identifier, "Expect class name after 'new'")?.clone();
            self.consume(TokenKind::LeftParen, "Expect '(' after class name")?;
            let (args, paren) = self.argument_list()?;
            return Ok(Expr::New { class_name, paren, args });
        }
        if self.match_kind(TokenKind::Function) {
            let (params, body) = self.function_params_and_body("function")?;
            return Ok(Expr::Function(Rc::new(FunctionDecl { name: None, params, body })));
        }
        if self.match_kind(TokenKind::Identifier) {
            return Ok(Expr::Variable(self.previous().clone()));
        }
        if self.match_kind(TokenKind::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }
        if self.match_kind(TokenKind::LeftBracket) {
            let bracket = self.previous().clone();
            let mut elements = Vec::new();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    elements.push(self.expression()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightBracket, "Expect ']' after array elements")?;
            return Ok(Expr::Array { bracket, elements });
        }
        if self.match_kind(TokenKind::LeftBrace) {
            let brace = self.previous().clone();
            let mut entries = Vec::new();
            if !self.check(TokenKind::RightBrace) {
                loop {
                    let key = self.consume(TokenKind::Identifier, "Expect property name")?.clone();
                    self.consume(TokenKind::Colon, "Expect ':' after property name")?;
                    let value = self.expression()?;
                    entries.push((key.lexeme, value));
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightBrace, "Expect '}' after object literal")?;
            return Ok(Expr::Object { brace, entries });
        }
        Err(self.error_at_current("Expect expression"))
    }

    // ---- token-stream helpers ----

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(ParseError::new(message.to_string(), self.peek()))
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        ParseError::new(message.to_string(), self.peek())
    }

    /// Advances past the current statement so that (in principle) parsing
    /// could resume after an error. `parse()` always aborts on the first
    /// error (§7), so this only leaves the parser in a sane state rather
    /// than being relied on to recover multiple errors.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Function
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
