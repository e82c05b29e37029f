//! Parser for Snake
//!
//! Recursive descent parser with Pratt parsing for expressions.

use log::debug;

use crate::frontend::ast::*;
use crate::frontend::lexer::{self, Lexer};
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Create a parser from pre-tokenized input
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = if tokens.is_empty() {
            vec![Token::eof(Span::dummy())]
        } else {
            tokens
        };
        Self { tokens, pos: 0 }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    /// Kind of the token `n` positions ahead (clamped to EOF)
    fn peek_kind(&self, n: usize) -> &TokenKind {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn unexpected(&self, expected: impl Into<String>) -> Error {
        Error::UnexpectedToken {
            expected: expected.into(),
            got: self.current_kind().to_string(),
            span: self.current().span,
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected.to_string()))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Span from `start` through the last consumed token
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.previous().span)
    }

    /// Skip a stray `;` or blank logical line
    fn skip_separator(&mut self) -> bool {
        if matches!(self.current_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(
            self.current_kind(),
            TokenKind::Semicolon | TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof
        )
    }

    /// Terminate a simple statement: a required `;`, optionally followed by
    /// the line break
    fn end_simple_stmt(&mut self) -> Result<()> {
        if self.consume(&TokenKind::Semicolon) {
            self.consume(&TokenKind::Newline);
            return Ok(());
        }
        match self.current_kind() {
            TokenKind::Orelse => Err(Error::InvalidFallbackContext { span: self.current().span }),
            _ => Err(self.unexpected("';'")),
        }
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.skip_separator() {
                continue;
            }
            items.push(self.parse_item()?);
        }

        debug!("parsed {} top-level items", items.len());
        Ok(Program::new(items))
    }

    /// Parse a top-level item
    fn parse_item(&mut self) -> Result<Item> {
        match self.current_kind() {
            TokenKind::Def => Ok(Item::Function(self.parse_function()?)),
            TokenKind::Struct => Ok(Item::Struct(self.parse_struct()?)),
            TokenKind::Enum => Ok(Item::Enum(self.parse_enum()?)),
            TokenKind::Const => Ok(Item::Const(self.parse_const()?)),
            TokenKind::Import | TokenKind::From => Ok(Item::Import(self.parse_import()?)),
            TokenKind::Ident(name) if name == "error" && self.is_error_decl() => {
                Ok(Item::Error(self.parse_error_decl()?))
            }
            _ => Ok(Item::Stmt(self.parse_stmt()?)),
        }
    }

    /// `error` is contextual: `error Name(...)`, but `error x = ...` is a
    /// declaration of a variable whose type happens to be named `error`.
    fn is_error_decl(&self) -> bool {
        matches!(self.peek_kind(1), TokenKind::Ident(_))
            && !matches!(self.peek_kind(2), TokenKind::Eq)
    }

    /// Parse a function definition
    fn parse_function(&mut self) -> Result<FunctionDecl> {
        let start = self.current().span;
        self.expect(TokenKind::Def)?;

        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        if !self.consume(&TokenKind::Arrow) {
            return Err(Error::MissingTypeAnnotation {
                what: format!("return type of function '{}'", name.name),
                span: name.span,
            });
        }
        let ret_type = self.parse_type()?;

        let body = self.parse_block()?;

        Ok(FunctionDecl {
            name,
            params,
            ret_type,
            body,
            globals: Vec::new(),
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_param()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param> {
        let name = self.parse_ident()?;
        if !self.consume(&TokenKind::Colon) {
            return Err(Error::MissingTypeAnnotation {
                what: format!("parameter '{}'", name.name),
                span: name.span,
            });
        }
        let ty = self.parse_type()?;
        Ok(Param { span: self.span_from(name.span), name, ty })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Ident::new(name, token.span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Parse a type annotation
    fn parse_type(&mut self) -> Result<TypeExpr> {
        let token = self.current().clone();
        let kind = match &token.kind {
            TokenKind::None => {
                self.advance();
                TypeExprKind::None
            }
            TokenKind::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "int" => TypeExprKind::Int,
                    "float" => TypeExprKind::Float,
                    "str" => TypeExprKind::Str,
                    "bool" => TypeExprKind::Bool,
                    "any" => TypeExprKind::Any,
                    "list" => {
                        if self.consume(&TokenKind::LBracket) {
                            let elem = self.parse_type()?;
                            self.expect(TokenKind::RBracket)?;
                            TypeExprKind::List(Box::new(elem))
                        } else {
                            TypeExprKind::List(Box::new(TypeExpr::new(TypeExprKind::Any, token.span)))
                        }
                    }
                    "dict" => {
                        if self.consume(&TokenKind::LBracket) {
                            let key = self.parse_type()?;
                            self.expect(TokenKind::Comma)?;
                            let value = self.parse_type()?;
                            self.expect(TokenKind::RBracket)?;
                            TypeExprKind::Dict(Box::new(key), Box::new(value))
                        } else {
                            let any = TypeExpr::new(TypeExprKind::Any, token.span);
                            TypeExprKind::Dict(Box::new(any.clone()), Box::new(any))
                        }
                    }
                    _ => TypeExprKind::Named(name.clone()),
                }
            }
            _ => return Err(self.unexpected("type")),
        };
        Ok(TypeExpr::new(kind, self.span_from(token.span)))
    }

    /// Parse `:` followed by an indented block or simple statements on the
    /// same line
    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current().span;
        self.expect(TokenKind::Colon)?;

        let mut stmts = Vec::new();
        if self.consume(&TokenKind::Newline) {
            self.expect(TokenKind::Indent)?;
            while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
                if self.skip_separator() {
                    continue;
                }
                stmts.push(self.parse_stmt()?);
            }
            self.expect(TokenKind::Dedent)?;
        } else {
            loop {
                stmts.push(self.parse_stmt()?);
                if matches!(self.previous().kind, TokenKind::Newline)
                    || self.current_kind().is_line_end()
                {
                    break;
                }
            }
        }

        Ok(Block { stmts, span: self.span_from(start) })
    }

    // ==================== Statements ====================

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        match self.current_kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => {
                self.advance();
                let value = if self.at_stmt_end() { None } else { Some(self.parse_expr()?) };
                let span = self.span_from(start);
                self.end_simple_stmt()?;
                Ok(Stmt::Return { value, span })
            }
            TokenKind::Raise => {
                self.advance();
                let value = if self.at_stmt_end() { None } else { Some(self.parse_expr()?) };
                let span = self.span_from(start);
                self.end_simple_stmt()?;
                Ok(Stmt::Raise { value, span })
            }
            TokenKind::Break => {
                self.advance();
                self.end_simple_stmt()?;
                Ok(Stmt::Break { span: start })
            }
            TokenKind::Continue => {
                self.advance();
                self.end_simple_stmt()?;
                Ok(Stmt::Continue { span: start })
            }
            TokenKind::Pass => {
                self.advance();
                self.end_simple_stmt()?;
                Ok(Stmt::Pass { span: start })
            }
            TokenKind::Def => Err(self.unexpected("statement (functions are declared at top level)")),
            TokenKind::Import | TokenKind::From => {
                Err(self.unexpected("statement (imports are only allowed at top level)"))
            }
            TokenKind::Struct | TokenKind::Enum | TokenKind::Const => {
                Err(self.unexpected("statement (type and constant declarations are top level)"))
            }
            TokenKind::Ident(_) if matches!(self.peek_kind(1), TokenKind::Colon) => {
                self.parse_var_decl()
            }
            _ => {
                if let Some(stmt) = self.try_typed_decl()? {
                    return Ok(stmt);
                }
                self.parse_expr_or_assign()
            }
        }
    }

    /// `name: T = value;`
    fn parse_var_decl(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        let name = self.parse_ident()?;
        self.expect(TokenKind::Colon)?;
        if self.check(&TokenKind::Eq) {
            return Err(Error::MissingTypeAnnotation {
                what: format!("variable '{}'", name.name),
                span: name.span,
            });
        }
        let ty = self.parse_type()?;
        self.finish_var_decl(name, ty, start)
    }

    /// `T name = value;`, detected by backtracking over a type
    fn try_typed_decl(&mut self) -> Result<Option<Stmt>> {
        if !matches!(self.current_kind(), TokenKind::Ident(_)) {
            return Ok(None);
        }
        let saved = self.pos;
        let start = self.current().span;
        if let Ok(ty) = self.parse_type() {
            if matches!(self.current_kind(), TokenKind::Ident(_)) {
                match self.peek_kind(1) {
                    TokenKind::Eq => {
                        let name = self.parse_ident()?;
                        return self.finish_var_decl(name, ty, start).map(Some);
                    }
                    TokenKind::Semicolon | TokenKind::Newline | TokenKind::Eof => {
                        self.advance();
                        return Err(self.unexpected("'=' (declarations need an initializer)"));
                    }
                    _ => {}
                }
            }
        }
        self.pos = saved;
        Ok(None)
    }

    fn finish_var_decl(&mut self, name: Ident, ty: TypeExpr, start: Span) -> Result<Stmt> {
        if !self.consume(&TokenKind::Eq) {
            return Err(self.unexpected("'=' (declarations need an initializer)"));
        }
        let value = self.parse_initializer()?;
        let span = self.span_from(start);
        self.end_simple_stmt()?;
        Ok(Stmt::VarDecl(VarDecl { name, ty, value, span }))
    }

    /// Declaration initializer, the only place `orelse` may appear.
    /// Chains associate to the right.
    fn parse_initializer(&mut self) -> Result<Expr> {
        let primary = self.parse_expr_bp(0)?;
        if self.consume(&TokenKind::Orelse) {
            let default = self.parse_initializer()?;
            let span = primary.span.merge(&default.span);
            return Ok(Expr::new(
                ExprKind::Fallback { primary: Box::new(primary), default: Box::new(default) },
                span,
            ));
        }
        Ok(primary)
    }

    fn parse_expr_or_assign(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        let target = self.parse_expr()?;

        let op = match self.current_kind() {
            TokenKind::Eq => Some(AssignOp::Assign),
            TokenKind::PlusEq => Some(AssignOp::AddAssign),
            TokenKind::MinusEq => Some(AssignOp::SubAssign),
            TokenKind::StarEq => Some(AssignOp::MulAssign),
            TokenKind::SlashEq => Some(AssignOp::DivAssign),
            TokenKind::PercentEq => Some(AssignOp::ModAssign),
            _ => None,
        };

        if let Some(op) = op {
            if !matches!(
                target.kind,
                ExprKind::Ident(_) | ExprKind::Field { .. } | ExprKind::Index { .. }
            ) {
                return Err(Error::UnexpectedToken {
                    expected: "assignable target".to_string(),
                    got: "expression".to_string(),
                    span: target.span,
                });
            }
            self.advance();
            let value = self.parse_expr()?;
            let span = self.span_from(start);
            self.end_simple_stmt()?;
            return Ok(Stmt::Assign { target, op, value, span });
        }

        self.end_simple_stmt()?;
        Ok(Stmt::Expr(target))
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::If)?;

        let cond = self.parse_expr()?;
        let block = self.parse_block()?;
        let mut branches = vec![(cond, block)];
        let mut else_block = None;

        loop {
            if self.consume(&TokenKind::Elif) {
                let cond = self.parse_expr()?;
                let block = self.parse_block()?;
                branches.push((cond, block));
            } else if self.consume(&TokenKind::Else) {
                else_block = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }

        Ok(Stmt::If { branches, else_block, span: self.span_from(start) })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body, span: self.span_from(start) })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::For)?;
        let var = self.parse_ident()?;
        let var_ty = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::In)?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::For { var, var_ty, iter, body, span: self.span_from(start) })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::Try)?;
        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.check(&TokenKind::Except) {
            let handler_start = self.advance().span;
            let class = if matches!(self.current_kind(), TokenKind::Ident(_)) {
                Some(self.parse_ident()?)
            } else {
                None
            };
            let binding = if class.is_some() && self.consume(&TokenKind::As) {
                Some(self.parse_ident()?)
            } else {
                None
            };
            let body = self.parse_block()?;
            handlers.push(ExceptHandler { class, binding, body, span: self.span_from(handler_start) });
        }

        let finally = if self.consume(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handlers.is_empty() && finally.is_none() {
            return Err(self.unexpected("'except' or 'finally'"));
        }

        Ok(Stmt::Try { body, handlers, finally, span: self.span_from(start) })
    }

    // ==================== Declarations ====================

    fn parse_import(&mut self) -> Result<Import> {
        let start = self.current().span;

        if self.consume(&TokenKind::Import) {
            let token = self.current().clone();
            let TokenKind::StringLit(path) = token.kind else {
                return Err(self.unexpected("import path string"));
            };
            self.advance();
            let span = self.span_from(start);
            self.end_simple_stmt()?;
            return Ok(Import::Local { path, span });
        }

        self.expect(TokenKind::From)?;
        let ecosystem = self.parse_ident()?.name;
        self.expect(TokenKind::Import)?;

        let mut modules = Vec::new();
        loop {
            let module_start = self.current().span;
            let mut name = self.parse_ident()?.name;
            while self.consume(&TokenKind::Dot) {
                name.push('.');
                name.push_str(&self.parse_ident()?.name);
            }
            let alias = if self.consume(&TokenKind::As) {
                Some(self.parse_ident()?.name)
            } else {
                None
            };
            modules.push(HostModule { name, alias, span: self.span_from(module_start) });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        let span = self.span_from(start);
        self.end_simple_stmt()?;
        Ok(Import::Host { ecosystem, modules, span })
    }

    /// Member list of a struct or enum: `{ a; b }`, an indented block, or
    /// members on the header line.
    fn parse_body<T>(
        &mut self,
        mut member: impl FnMut(&mut Self) -> Result<Option<T>>,
    ) -> Result<Vec<T>> {
        let mut members = Vec::new();

        if self.consume(&TokenKind::LBrace) {
            while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                if self.consume(&TokenKind::Semicolon) || self.consume(&TokenKind::Comma) {
                    continue;
                }
                members.extend(member(self)?);
            }
            self.expect(TokenKind::RBrace)?;
            self.consume(&TokenKind::Semicolon);
            self.consume(&TokenKind::Newline);
            return Ok(members);
        }

        self.expect(TokenKind::Colon)?;
        if self.consume(&TokenKind::Newline) {
            self.expect(TokenKind::Indent)?;
            while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
                if matches!(
                    self.current_kind(),
                    TokenKind::Semicolon | TokenKind::Comma | TokenKind::Newline
                ) {
                    self.advance();
                    continue;
                }
                members.extend(member(self)?);
            }
            self.expect(TokenKind::Dedent)?;
        } else {
            while !matches!(self.current_kind(), TokenKind::Newline | TokenKind::Eof) {
                if self.consume(&TokenKind::Semicolon) || self.consume(&TokenKind::Comma) {
                    continue;
                }
                members.extend(member(self)?);
            }
            self.consume(&TokenKind::Newline);
        }
        Ok(members)
    }

    fn parse_struct(&mut self) -> Result<StructDecl> {
        let start = self.current().span;
        self.expect(TokenKind::Struct)?;
        let name = self.parse_ident()?;

        let fields = self.parse_body(|p| {
            if p.consume(&TokenKind::Pass) {
                return Ok(None);
            }
            let name = p.parse_ident()?;
            if !p.consume(&TokenKind::Colon) {
                return Err(Error::MissingTypeAnnotation {
                    what: format!("field '{}'", name.name),
                    span: name.span,
                });
            }
            let ty = p.parse_type()?;
            Ok(Some(Field { span: p.span_from(name.span), name, ty }))
        })?;

        Ok(StructDecl { name, fields, span: self.span_from(start) })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl> {
        let start = self.current().span;
        self.expect(TokenKind::Enum)?;
        let name = self.parse_ident()?;

        let members = self.parse_body(|p| {
            if p.consume(&TokenKind::Pass) {
                return Ok(None);
            }
            let name = p.parse_ident()?;
            let ty = if p.consume(&TokenKind::Colon) {
                Some(p.parse_type()?)
            } else {
                None
            };
            let value = if p.consume(&TokenKind::Eq) {
                Some(p.parse_literal()?)
            } else if ty.is_some() {
                return Err(p.unexpected("'=' after a typed enum member"));
            } else {
                None
            };
            Ok(Some(EnumMember { span: p.span_from(name.span), name, ty, value }))
        })?;

        Ok(EnumDecl { name, members, span: self.span_from(start) })
    }

    /// Literal enum member value, optionally a negated number
    fn parse_literal(&mut self) -> Result<Literal> {
        let negate = self.consume(&TokenKind::Minus);
        let literal = match self.current_kind() {
            TokenKind::IntLit(n) => Literal::Int(if negate { -n } else { *n }),
            TokenKind::FloatLit(n) => Literal::Float(if negate { -n } else { *n }),
            TokenKind::StringLit(s) if !negate => Literal::Str(s.clone()),
            TokenKind::True if !negate => Literal::Bool(true),
            TokenKind::False if !negate => Literal::Bool(false),
            _ => return Err(self.unexpected("literal value")),
        };
        self.advance();
        Ok(literal)
    }

    /// `const NAME: T = value;` or `const T NAME = value;`
    fn parse_const(&mut self) -> Result<ConstDecl> {
        let start = self.current().span;
        self.expect(TokenKind::Const)?;

        let (name, ty) = match self.peek_kind(1) {
            TokenKind::Colon => {
                let name = self.parse_ident()?;
                self.advance();
                if self.check(&TokenKind::Eq) {
                    return Err(Error::MissingTypeAnnotation {
                        what: format!("constant '{}'", name.name),
                        span: name.span,
                    });
                }
                let ty = self.parse_type()?;
                (name, ty)
            }
            TokenKind::Eq => {
                let name = self.parse_ident()?;
                return Err(Error::MissingTypeAnnotation {
                    what: format!("constant '{}'", name.name),
                    span: name.span,
                });
            }
            _ => {
                let ty = self.parse_type()?;
                let name = self.parse_ident()?;
                (name, ty)
            }
        };

        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        let span = self.span_from(start);
        self.end_simple_stmt()?;

        Ok(ConstDecl { name, ty, value, span })
    }

    /// `error Name(p: T, ...) -> "message";`
    fn parse_error_decl(&mut self) -> Result<ErrorDecl> {
        let start = self.advance().span;
        let name = self.parse_ident()?;

        let params = if self.consume(&TokenKind::LParen) {
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen)?;
            params
        } else {
            Vec::new()
        };

        let message = if self.consume(&TokenKind::Arrow) {
            let token = self.current().clone();
            match token.kind {
                TokenKind::StringLit(text) => {
                    self.advance();
                    Expr::new(ExprKind::Literal(Literal::Str(text)), token.span)
                }
                TokenKind::FString(raw) => {
                    self.advance();
                    Self::parse_fstring(&raw, token.span)?
                }
                _ => return Err(self.unexpected("error message string")),
            }
        } else {
            Expr::new(ExprKind::Literal(Literal::Str(name.name.clone())), name.span)
        };

        let span = self.span_from(start);
        self.end_simple_stmt()?;
        Ok(ErrorDecl { name, params, message, span })
    }

    // ==================== Expression Parsing (Pratt) ====================

    /// Parse an expression outside a declaration initializer
    fn parse_expr(&mut self) -> Result<Expr> {
        let expr = self.parse_expr_bp(0)?;
        if self.check(&TokenKind::Orelse) {
            return Err(Error::InvalidFallbackContext { span: self.current().span });
        }
        Ok(expr)
    }

    /// Parse expression with binding power (Pratt parsing)
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut left = self.parse_prefix()?;

        loop {
            let (op, bp, width) = match (self.current_kind(), self.peek_kind(1)) {
                (TokenKind::Not, TokenKind::In) => (BinOp::NotIn, 4, 2),
                (TokenKind::Is, TokenKind::Not) => (BinOp::IsNot, 4, 2),
                (kind, _) => {
                    let (Some(bp), Some(op)) = (kind.binary_precedence(), Self::token_to_binop(kind))
                    else {
                        break;
                    };
                    (op, bp, 1)
                }
            };

            if bp < min_bp {
                break;
            }
            for _ in 0..width {
                self.advance();
            }

            // `**` is right-associative
            let next_bp = if op == BinOp::Pow { bp } else { bp + 1 };
            let right = self.parse_expr_bp(next_bp)?;
            if op.chains() {
                left = self.parse_comparison_chain(left, op, right, next_bp)?;
                continue;
            }
            let span = left.span.merge(&right.span);

            left = Expr::new(
                ExprKind::Binary { left: Box::new(left), op, right: Box::new(right) },
                span,
            );
        }

        Ok(left)
    }

    /// Comparison operator at the cursor and its width in tokens
    fn comparison_op(&self) -> Option<(BinOp, usize)> {
        match (self.current_kind(), self.peek_kind(1)) {
            (TokenKind::Not, TokenKind::In) => Some((BinOp::NotIn, 2)),
            (TokenKind::Is, TokenKind::Not) => Some((BinOp::IsNot, 2)),
            (kind, _) => Self::token_to_binop(kind).filter(|op| op.chains()).map(|op| (op, 1)),
        }
    }

    /// `a < b` followed by more comparisons becomes one chain, not nested
    /// binaries: `a < b < c` means `a < b and b < c`.
    fn parse_comparison_chain(&mut self, first: Expr, op: BinOp, operand: Expr, operand_bp: u8) -> Result<Expr> {
        let mut rest = vec![(op, operand)];
        while let Some((op, width)) = self.comparison_op() {
            for _ in 0..width {
                self.advance();
            }
            rest.push((op, self.parse_expr_bp(operand_bp)?));
        }

        let end = rest.last().map_or(first.span, |(_, operand)| operand.span);
        let span = first.span.merge(&end);
        if rest.len() == 1 {
            let (op, right) = rest.remove(0);
            let kind = ExprKind::Binary { left: Box::new(first), op, right: Box::new(right) };
            return Ok(Expr::new(kind, span));
        }
        Ok(Expr::new(ExprKind::Compare { first: Box::new(first), rest }, span))
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        let (op, bp) = match token.kind {
            TokenKind::Not => (UnOp::Not, 3),
            TokenKind::Minus => (UnOp::Neg, 7),
            TokenKind::Plus => (UnOp::Pos, 7),
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };
        self.advance();
        let operand = self.parse_expr_bp(bp)?;
        let span = token.span.merge(&operand.span);
        Ok(Expr::new(ExprKind::Unary { op, expr: Box::new(operand) }, span))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();

        let kind = match token.kind {
            TokenKind::IntLit(n) => {
                self.advance();
                ExprKind::Literal(Literal::Int(n))
            }
            TokenKind::FloatLit(n) => {
                self.advance();
                ExprKind::Literal(Literal::Float(n))
            }
            TokenKind::StringLit(mut text) => {
                self.advance();
                // adjacent literals concatenate
                while let TokenKind::StringLit(more) = self.current_kind() {
                    text.push_str(more);
                    self.advance();
                }
                ExprKind::Literal(Literal::Str(text))
            }
            TokenKind::FString(raw) => {
                self.advance();
                return Self::parse_fstring(&raw, token.span);
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            TokenKind::None => {
                self.advance();
                ExprKind::Literal(Literal::None)
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
                    elements.push(self.parse_expr()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                ExprKind::List(elements)
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                ExprKind::Dict(entries)
            }
            _ => return Err(self.unexpected("expression")),
        };

        Ok(Expr::new(kind, self.span_from(token.span)))
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            if self.consume(&TokenKind::LParen) {
                let (args, kwargs) = self.parse_call_args()?;
                self.expect(TokenKind::RParen)?;
                let span = self.span_from(expr.span);
                expr = Expr::new(ExprKind::Call { func: Box::new(expr), args, kwargs }, span);
            } else if self.consume(&TokenKind::Dot) {
                let field = self.parse_ident()?;
                let span = expr.span.merge(&field.span);
                expr = Expr::new(ExprKind::Field { expr: Box::new(expr), field }, span);
            } else if self.consume(&TokenKind::LBracket) {
                expr = self.parse_subscript(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<(Ident, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            if matches!(self.current_kind(), TokenKind::Ident(_))
                && matches!(self.peek_kind(1), TokenKind::Eq)
            {
                let name = self.parse_ident()?;
                self.advance();
                kwargs.push((name, self.parse_expr()?));
            } else if !kwargs.is_empty() {
                return Err(self.unexpected("keyword argument"));
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok((args, kwargs))
    }

    /// `expr[index]` or `expr[lower:upper]`, after the `[`
    fn parse_subscript(&mut self, expr: Expr) -> Result<Expr> {
        let start = expr.span;
        let expr = Box::new(expr);
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        let kind = if self.consume(&TokenKind::Colon) {
            let upper = if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            ExprKind::Slice { expr, lower, upper }
        } else {
            let Some(index) = lower else {
                return Err(self.unexpected("index expression"));
            };
            ExprKind::Index { expr, index }
        };

        self.expect(TokenKind::RBracket)?;
        Ok(Expr::new(kind, self.span_from(start)))
    }

    fn token_to_binop(kind: &TokenKind) -> Option<BinOp> {
        Some(match kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::SlashSlash => BinOp::FloorDiv,
            TokenKind::Percent => BinOp::Mod,
            TokenKind::StarStar => BinOp::Pow,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::In => BinOp::In,
            TokenKind::Is => BinOp::Is,
            TokenKind::And => BinOp::And,
            TokenKind::Or => BinOp::Or,
            _ => return None,
        })
    }

    // ==================== Template Strings ====================

    /// Split the raw body of `f"..."` into text and expression segments.
    /// `span` is the span of the whole template token.
    fn parse_fstring(raw: &str, span: Span) -> Result<Expr> {
        let invalid = |reason: &str| Error::InvalidTemplate { reason: reason.to_string(), span };
        let chars: Vec<char> = raw.chars().collect();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    text.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    text.push('}');
                    i += 2;
                }
                '}' => return Err(invalid("single '}' is not allowed")),
                '{' => {
                    let close = find_segment_end(&chars, i + 1)
                        .ok_or_else(|| invalid("expected '}' before end of string"))?;
                    if !text.is_empty() {
                        parts.push(FStringPart::Text(lexer::unescape(&std::mem::take(&mut text)).map_err(|r| invalid(r.as_str()))?));
                    }
                    let body: String = chars[i + 1..close].iter().collect();
                    let (source, spec) = split_format_spec(&body);
                    if source.trim().is_empty() {
                        return Err(invalid("empty expression not allowed"));
                    }
                    let expr = Self::parse_segment(source, span, i + 1)?;
                    parts.push(FStringPart::Expr { expr, spec });
                    i = close + 1;
                }
                '\\' => {
                    text.push('\\');
                    if let Some(&next) = chars.get(i + 1) {
                        text.push(next);
                    }
                    i += 2;
                }
                c => {
                    text.push(c);
                    i += 1;
                }
            }
        }

        if !text.is_empty() {
            parts.push(FStringPart::Text(lexer::unescape(&text).map_err(|r| invalid(r.as_str()))?));
        }
        Ok(Expr::new(ExprKind::FString(parts), span))
    }

    /// Parse one `{expr}` segment found `offset` chars into the body
    fn parse_segment(source: &str, span: Span, offset: usize) -> Result<Expr> {
        // the body starts after `f"`
        let mut lexer = Lexer::with_origin(
            source,
            span.file_id,
            span.start + 2 + offset,
            span.line,
            span.column + 2 + offset,
        );
        let mut parser = Parser::new(lexer.tokenize()?);
        let expr = parser.parse_expr()?;
        parser.consume(&TokenKind::Newline);
        if !parser.is_at_end() {
            return Err(parser.unexpected("'}'"));
        }
        Ok(expr)
    }
}

/// Index of the `}` closing a segment that starts at `from`
fn find_segment_end(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, &c) in chars.iter().enumerate().skip(from) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split `expr:spec` at the first top-level colon
fn split_format_spec(body: &str) -> (&str, Option<String>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return (&body[..i], Some(body[i + 1..].to_string())),
            _ => {}
        }
    }
    (body, None)
}

/// Parse a token stream into a program
pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::new(tokens).parse_program()
}

/// Lex and parse one source file
pub fn parse_source(source: &str, file_id: usize) -> Result<Program> {
    let tokens = lexer::tokenize(source, file_id)?;
    parse(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program> {
        parse_source(source, 0)
    }

    /// Render an expression as an s-expression to check grouping
    fn render(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(Literal::Int(n)) => n.to_string(),
            ExprKind::Literal(Literal::None) => "None".to_string(),
            ExprKind::Literal(lit) => format!("{:?}", lit),
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Binary { left, op, right } => {
                format!("({} {} {})", op.as_str(), render(left), render(right))
            }
            ExprKind::Compare { first, rest } => {
                let mut out = format!("(chain {}", render(first));
                for (op, operand) in rest {
                    out.push_str(&format!(" {} {}", op.as_str(), render(operand)));
                }
                out.push(')');
                out
            }
            ExprKind::Unary { op, expr } => format!("({} {})", op.as_str(), render(expr)),
            ExprKind::Call { func, args, .. } => {
                let args: Vec<String> = args.iter().map(render).collect();
                format!("{}({})", render(func), args.join(", "))
            }
            ExprKind::Field { expr, field } => format!("{}.{}", render(expr), field.name),
            ExprKind::Fallback { primary, default } => {
                format!("(orelse {} {})", render(primary), render(default))
            }
            other => format!("{:?}", other),
        }
    }

    fn decl_value(program: &Program, index: usize) -> &Expr {
        match &program.items[index] {
            Item::Stmt(Stmt::VarDecl(decl)) => &decl.value,
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    fn expr_of(source: &str) -> String {
        let program = parse(&format!("x: any = {};", source)).unwrap();
        render(decl_value(&program, 0))
    }

    #[test]
    fn test_function_decl() {
        let program = parse("def add(a: int, b: int) -> int:\n    return a + b;\n").unwrap();
        assert_eq!(program.items.len(), 1);
        let Item::Function(func) = &program.items[0] else { panic!("expected function") };
        assert_eq!(func.name.name, "add");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.ret_type.kind, TypeExprKind::Int);
        assert!(matches!(func.body.stmts[0], Stmt::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_missing_annotations() {
        let cases = [
            "def f(a: int):\n    pass;\n",
            "def f(a) -> None:\n    pass;\n",
            "const PI = 3.14;",
            "x: = 1;",
            "struct P:\n    x;\n",
        ];
        for source in cases {
            let err = parse(source).unwrap_err();
            assert_eq!(err.kind(), "MissingTypeAnnotation", "{}", source);
        }
    }

    #[test]
    fn test_both_declaration_forms() {
        let program = parse("x: list[int] = [1, 2];\nlist[int] y = [3];\n").unwrap();
        for (index, expected) in ["x", "y"].iter().enumerate() {
            let Item::Stmt(Stmt::VarDecl(decl)) = &program.items[index] else {
                panic!("expected declaration")
            };
            assert_eq!(decl.name.name, *expected);
            assert!(matches!(&decl.ty.kind, TypeExprKind::List(elem) if elem.kind == TypeExprKind::Int));
        }
    }

    #[test]
    fn test_declaration_requires_initializer() {
        assert_eq!(parse("x: int;").unwrap_err().kind(), "UnexpectedToken");
        assert_eq!(parse("int x;").unwrap_err().kind(), "UnexpectedToken");
    }

    #[test]
    fn test_orelse_chain_is_right_associative() {
        assert_eq!(
            expr_of("int(a) orelse int(b) orelse 0"),
            "(orelse int(a) (orelse int(b) 0))"
        );
    }

    #[test]
    fn test_orelse_outside_declaration() {
        let cases = [
            "print(int(a) orelse 0);",
            "x = int(a) orelse 0;",
            "const X: int = a orelse 1;",
            "def f() -> int:\n    return a orelse 1;\n",
            "int(a) orelse 0;",
        ];
        for source in cases {
            let err = parse(source).unwrap_err();
            assert_eq!(err.kind(), "InvalidFallbackContext", "{}", source);
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr_of("a + b * c"), "(+ a (* b c))");
        assert_eq!(expr_of("not a == b and c or d"), "(or (and (not (== a b)) c) d)");
        assert_eq!(expr_of("-2 ** 2"), "(- (** 2 2))");
        assert_eq!(expr_of("2 ** 3 ** 2"), "(** 2 (** 3 2))");
        assert_eq!(expr_of("a - b - c"), "(- (- a b) c)");
        assert_eq!(expr_of("a // b % c"), "(% (// a b) c)");
        assert_eq!(expr_of("a not in b"), "(not in a b)");
        assert_eq!(expr_of("a is not None"), "(is not a None)");
        assert_eq!(expr_of("(a + b) * c"), "(* (+ a b) c)");
        assert_eq!(expr_of("p.x.y(1)"), "p.x.y(1)");
    }

    #[test]
    fn test_comparison_chains() {
        assert_eq!(expr_of("0 < x < 10"), "(chain 0 < x < 10)");
        assert_eq!(expr_of("a == b != c is not None"), "(chain a == b != c is not None)");
        assert_eq!(expr_of("a < b + 1 <= c and d"), "(and (chain a < (+ b 1) <= c) d)");
        assert_eq!(expr_of("x in xs not in ys"), "(chain x in xs not in ys)");
        assert_eq!(expr_of("(a < b) < c"), "(< (< a b) c)");
        assert_eq!(expr_of("a < b"), "(< a b)");
    }

    #[test]
    fn test_symbolic_operators_parse_identically() {
        assert_eq!(expr_of("a && !b || c"), expr_of("a and not b or c"));
    }

    #[test]
    fn test_fstring_parts() {
        let program = parse("s: str = f\"x={x:>4} {{literal}} {p.y}\";").unwrap();
        let ExprKind::FString(parts) = &decl_value(&program, 0).kind else {
            panic!("expected template")
        };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], FStringPart::Text(t) if t == "x="));
        match &parts[1] {
            FStringPart::Expr { expr, spec } => {
                assert_eq!(render(expr), "x");
                assert_eq!(spec.as_deref(), Some(">4"));
                assert_eq!((expr.span.line, expr.span.column), (1, 15));
            }
            other => panic!("unexpected part {:?}", other),
        }
        assert!(matches!(&parts[2], FStringPart::Text(t) if t == " {literal} "));
        assert!(matches!(&parts[3], FStringPart::Expr { expr, spec: None } if render(expr) == "p.y"));
    }

    #[test]
    fn test_fstring_text_escapes() {
        let program = parse("s: str = f\"\\x41{n}\\u00e9\\n\";").unwrap();
        let ExprKind::FString(parts) = &decl_value(&program, 0).kind else {
            panic!("expected template")
        };
        assert!(matches!(&parts[0], FStringPart::Text(t) if t == "A"));
        assert!(matches!(&parts[2], FStringPart::Text(t) if t == "\u{e9}\n"));
        assert_eq!(parse("s: str = f\"\\x4{n}\";").unwrap_err().kind(), "InvalidTemplate");
    }

    #[test]
    fn test_invalid_template() {
        assert_eq!(parse("s: str = f\"{}\";").unwrap_err().kind(), "InvalidTemplate");
        assert_eq!(parse("s: str = f\"a}b\";").unwrap_err().kind(), "InvalidTemplate");
        assert_eq!(parse("s: str = f\"{a\";").unwrap_err().kind(), "InvalidTemplate");
    }

    #[test]
    fn test_enum_forms() {
        let source = "enum Color: RED, GREEN, BLUE\n\
                      enum Level:\n    LOW = 1;\n    HIGH: int = 10;\n\
                      enum Sign { NEG = -1; POS = 1 }\n";
        let program = parse(source).unwrap();
        let enums: Vec<&EnumDecl> = program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Enum(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(enums.len(), 3);
        assert_eq!(enums[0].members.len(), 3);
        assert!(enums[0].members.iter().all(|m| m.value.is_none()));
        assert_eq!(enums[1].members[1].value, Some(Literal::Int(10)));
        assert!(enums[1].members[1].ty.is_some());
        assert_eq!(enums[2].members[0].value, Some(Literal::Int(-1)));
    }

    #[test]
    fn test_struct_forms() {
        let program =
            parse("struct Point:\n    x: int;\n    y: int;\nstruct Size { w: int; h: int }\nstruct Empty:\n    pass;\n")
                .unwrap();
        let sizes: Vec<usize> = program
            .items
            .iter()
            .map(|item| match item {
                Item::Struct(s) => s.fields.len(),
                _ => panic!("expected struct"),
            })
            .collect();
        assert_eq!(sizes, vec![2, 2, 0]);
    }

    #[test]
    fn test_error_decl() {
        let program = parse("error NotFound(path: str) -> f\"missing {path}\";\nerror Oops;\n").unwrap();
        let Item::Error(decl) = &program.items[0] else { panic!("expected error decl") };
        assert_eq!(decl.name.name, "NotFound");
        assert_eq!(decl.params.len(), 1);
        assert!(matches!(decl.message.kind, ExprKind::FString(_)));
        let Item::Error(bare) = &program.items[1] else { panic!("expected error decl") };
        assert!(bare.params.is_empty());
    }

    #[test]
    fn test_error_is_contextual() {
        let program = parse("error: int = 1;\nerror = 2;\n").unwrap();
        assert!(matches!(program.items[0], Item::Stmt(Stmt::VarDecl(_))));
        assert!(matches!(program.items[1], Item::Stmt(Stmt::Assign { .. })));
    }

    #[test]
    fn test_imports() {
        let program =
            parse("from python import math, os.path, numpy as np;\nimport \"shapes.sk\";\n").unwrap();
        let Item::Import(Import::Host { ecosystem, modules, .. }) = &program.items[0] else {
            panic!("expected host import")
        };
        assert_eq!(ecosystem, "python");
        let bindings: Vec<&str> = modules.iter().map(|m| m.binding()).collect();
        assert_eq!(bindings, vec!["math", "os", "np"]);
        assert_eq!(modules[1].name, "os.path");
        assert!(matches!(&program.items[1], Item::Import(Import::Local { path, .. }) if path == "shapes.sk"));
    }

    #[test]
    fn test_import_inside_function_rejected() {
        let err = parse("def f() -> None:\n    import \"a.sk\";\n").unwrap_err();
        assert_eq!(err.kind(), "UnexpectedToken");
    }

    #[test]
    fn test_control_flow() {
        let source = "\
def main() -> None:
    for i: int in range(10):
        if i % 2 == 0:
            continue;
        elif i == 7:
            break;
        else:
            pass;
    while True: pass;
    try:
        raise NotFound(\"x\");
    except NotFound as e:
        print(e.path);
    except:
        pass;
    finally:
        print(\"done\");
";
        let program = parse(source).unwrap();
        let Item::Function(main) = &program.items[0] else { panic!("expected function") };
        assert_eq!(main.body.stmts.len(), 3);
        let Stmt::For { var_ty: Some(_), body, .. } = &main.body.stmts[0] else {
            panic!("expected annotated for")
        };
        let Stmt::If { branches, else_block: Some(_), .. } = &body.stmts[0] else {
            panic!("expected if")
        };
        assert_eq!(branches.len(), 2);
        let Stmt::Try { handlers, finally: Some(_), .. } = &main.body.stmts[2] else {
            panic!("expected try")
        };
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0].binding.as_ref().map(|b| b.name.as_str()), Some("e"));
        assert!(handlers[1].class.is_none());
    }

    #[test]
    fn test_call_kwargs_and_slices() {
        let program = parse("print(xs[1:], xs[:2], xs[0], end=\"\");").unwrap();
        let Item::Stmt(Stmt::Expr(expr)) = &program.items[0] else { panic!("expected call") };
        let ExprKind::Call { args, kwargs, .. } = &expr.kind else { panic!("expected call") };
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0].kind, ExprKind::Slice { lower: Some(_), upper: None, .. }));
        assert!(matches!(&args[1].kind, ExprKind::Slice { lower: None, upper: Some(_), .. }));
        assert!(matches!(&args[2].kind, ExprKind::Index { .. }));
        assert_eq!(kwargs[0].0.name, "end");
    }

    #[test]
    fn test_assignments() {
        let program = parse("p.x += 1; xs[0] = 2; n -= 3;\n").unwrap();
        let ops: Vec<AssignOp> = program
            .items
            .iter()
            .map(|item| match item {
                Item::Stmt(Stmt::Assign { op, .. }) => *op,
                _ => panic!("expected assignment"),
            })
            .collect();
        assert_eq!(ops, vec![AssignOp::AddAssign, AssignOp::Assign, AssignOp::SubAssign]);
        assert_eq!(parse("f() = 1;").unwrap_err().kind(), "UnexpectedToken");
    }

    #[test]
    fn test_simple_statements_require_semicolon() {
        let err = parse("x: int = 1\nprint(x);\n").unwrap_err();
        assert_eq!(err.kind(), "UnexpectedToken");
        assert_eq!(err.span().map(|s| s.line), Some(1));
        assert_eq!(parse("x: int = 1;\nprint(x)\n").unwrap_err().kind(), "UnexpectedToken");
        assert_eq!(parse("import \"a.sk\"\n").unwrap_err().kind(), "UnexpectedToken");
        assert_eq!(parse("def f() -> None:\n    return\n").unwrap_err().kind(), "UnexpectedToken");

        // Block headers end with ':'; `;` may share a line or end it
        let program = parse("if True:\n    pass;\nx: int = 1; print(x);\n").unwrap();
        assert_eq!(program.items.len(), 3);
    }

    #[test]
    fn test_unexpected_token() {
        let err = parse("x: int = ;").unwrap_err();
        assert_eq!(err.kind(), "UnexpectedToken");
        assert_eq!(err.span().map(|s| (s.line, s.column)), Some((1, 10)));
        assert!(parse("def f( -> None:\n    pass;\n").is_err());
    }
}
