//! Semantic Analysis for Snake
//!
//! Performs:
//! - Symbol table management (scopes, definitions)
//! - Type checking of every expression, assignment, call and field access
//! - Constant immutability
//!
//! Pass 1 registers every global declaration, so declarations may be used
//! before they appear. Pass 2 checks bodies and fills `Expr::ty`.
//!
//! Checking is best-effort: a sub-expression that produced a diagnostic is
//! typed `Unknown`, which every check accepts, so one mistake is reported once.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::frontend::ast::*;
use crate::stdlib::{method_signature, BuiltinRegistry, MethodSig, HOST_EXCEPTIONS};
use crate::types::Type;
use crate::utils::{Error, Result, Span};

// ==================== Symbol Table ====================

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Builtins and host-provided globals (`argc`, `argv`, `__name__`)
pub const BUILTIN_SCOPE: ScopeId = ScopeId(0);
/// Module scope of the merged program
pub const GLOBAL_SCOPE: ScopeId = ScopeId(1);

/// Symbol information
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub span: Span,
}

/// Kind of symbol
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Param,
    Function { params: Vec<(String, Type)>, ret: Type },
    Struct { fields: Vec<(String, Type)> },
    Error { params: Vec<(String, Type)> },
    Enum { members: Vec<String>, value_ty: Type },
    /// Name bound by `from python import ...`
    HostModule,
    /// Host exception class such as `ValueError`
    HostException,
    Builtin,
}

/// A scope containing symbols
#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
}

/// Symbol table with nested scopes
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl SymbolTable {
    /// Create a table holding the builtin scope, with the global scope current
    pub fn new() -> Self {
        let builtins = Scope {
            parent: None,
            symbols: Default::default(),
        };
        let globals = Scope {
            parent: Some(BUILTIN_SCOPE),
            symbols: Default::default(),
        };
        Self {
            scopes: vec![builtins, globals],
            current: GLOBAL_SCOPE,
        }
    }

    /// Enter a new scope
    pub fn enter_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            symbols: Default::default(),
        });
        self.current = id;
        id
    }

    /// Exit the current scope
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    /// Define a symbol in the current scope
    pub fn define(&mut self, symbol: Symbol) -> Result<()> {
        self.define_in(self.current, symbol)
    }

    /// Define a symbol in a specific scope
    pub fn define_in(&mut self, scope: ScopeId, symbol: Symbol) -> Result<()> {
        let scope = &mut self.scopes[scope.0];
        if scope.symbols.contains_key(&symbol.name) {
            return Err(Error::DuplicateDefinition {
                name: symbol.name.clone(),
                span: symbol.span,
            });
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Look up a symbol, searching from current scope upward
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.lookup_scoped(name).map(|(_, symbol)| symbol)
    }

    /// Like `lookup`, also returning the scope the symbol lives in
    pub fn lookup_scoped(&self, name: &str) -> Option<(ScopeId, &Symbol)> {
        let mut scope_id = Some(self.current);
        while let Some(id) = scope_id {
            if let Some(symbol) = self.scopes[id.0].symbols.get(name) {
                return Some((id, symbol));
            }
            scope_id = self.scopes[id.0].parent;
        }
        None
    }

    /// Look up a symbol only in the given scope
    pub fn lookup_in(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope.0].symbols.get(name)
    }

    fn lookup_in_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Symbol> {
        self.scopes[scope.0].symbols.get_mut(name)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Semantic Analyzer ====================

/// Semantic analyzer
pub struct SemanticAnalyzer {
    pub symbols: SymbolTable,
    pub errors: Vec<Error>,
    builtins: BuiltinRegistry,
    /// Name and declared return type of the function being checked
    current_function: Option<(String, Type)>,
    /// Module-level variables assigned by the function being checked
    current_globals: Vec<String>,
    loop_depth: usize,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        let mut analyzer = Self {
            symbols: SymbolTable::new(),
            errors: Vec::new(),
            builtins: BuiltinRegistry::new(),
            current_function: None,
            current_globals: Vec::new(),
            loop_depth: 0,
        };
        analyzer.register_builtins();
        analyzer
    }

    /// Register built-in functions, host exceptions and program globals
    fn register_builtins(&mut self) {
        let mut predefined: Vec<(String, SymbolKind, Type)> = self
            .builtins
            .all()
            .map(|func| (func.name.to_string(), SymbolKind::Builtin, Type::Unknown))
            .collect();
        predefined.extend(
            HOST_EXCEPTIONS
                .iter()
                .map(|name| (name.to_string(), SymbolKind::HostException, Type::Unknown)),
        );
        predefined.push(("argc".into(), SymbolKind::Variable, Type::Int));
        predefined.push(("argv".into(), SymbolKind::Variable, Type::list(Type::Str)));
        predefined.push(("__name__".into(), SymbolKind::Variable, Type::Str));

        for (name, kind, ty) in predefined {
            let symbol = Symbol {
                name,
                kind,
                ty,
                span: Span::dummy(),
            };
            let _ = self.symbols.define_in(BUILTIN_SCOPE, symbol);
        }
    }

    /// Analyze a program, filling expression types and function globals
    pub fn analyze(&mut self, program: &mut Program) {
        // Pass 1: Collect all top-level definitions
        self.declare_types(&program.items);
        for item in &program.items {
            self.collect_definition(item);
        }

        // Pass 2: Type check all items
        for item in &mut program.items {
            self.check_item(item);
        }

        self.errors.sort_by_key(|err| {
            err.span()
                .map(|span| (span.file_id, span.line, span.column))
                .unwrap_or_default()
        });
    }

    fn report(&mut self, error: Error) {
        self.errors.push(error);
    }

    fn mismatch(&mut self, context: impl Into<String>, expected: impl ToString, got: &Type, span: Span) {
        self.report(Error::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            got: got.to_string(),
            span,
        });
    }

    /// Define `symbol` in the current scope, reporting redeclarations
    fn declare(&mut self, symbol: Symbol) -> bool {
        if let Some(existing) = self.symbols.lookup(&symbol.name) {
            if existing.kind == SymbolKind::Constant {
                self.report(Error::ConstantReassignment {
                    name: symbol.name,
                    span: symbol.span,
                });
                return false;
            }
        }
        match self.symbols.define(symbol) {
            Ok(()) => true,
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    // ==================== Pass 1 ====================

    /// Declare struct, error and enum names so annotations can refer to them
    fn declare_types(&mut self, items: &[Item]) {
        for item in items {
            let (name, kind) = match item {
                Item::Struct(s) => (&s.name, SymbolKind::Struct { fields: Vec::new() }),
                Item::Error(e) => (&e.name, SymbolKind::Error { params: Vec::new() }),
                Item::Enum(e) => (
                    &e.name,
                    SymbolKind::Enum {
                        members: Vec::new(),
                        value_ty: Type::Int,
                    },
                ),
                _ => continue,
            };
            self.declare(Symbol {
                name: name.name.clone(),
                kind,
                ty: Type::Unknown,
                span: name.span,
            });
        }
    }

    /// Collect a top-level definition
    fn collect_definition(&mut self, item: &Item) {
        match item {
            Item::Function(func) => {
                let params = self.resolve_params(&func.params, true);
                let ret = self.resolve_type(&func.ret_type);
                let ty = Type::Function {
                    params: params.iter().map(|(_, ty)| ty.clone()).collect(),
                    ret: Box::new(ret.clone()),
                };
                self.declare(Symbol {
                    name: func.name.name.clone(),
                    kind: SymbolKind::Function { params, ret },
                    ty,
                    span: func.name.span,
                });
            }
            Item::Struct(s) => {
                let mut seen = HashSet::new();
                let mut fields = Vec::new();
                for field in &s.fields {
                    if !seen.insert(field.name.name.as_str()) {
                        self.report(Error::DuplicateDefinition {
                            name: field.name.name.clone(),
                            span: field.name.span,
                        });
                        continue;
                    }
                    fields.push((field.name.name.clone(), self.resolve_type(&field.ty)));
                }
                let ty = constructor_type(&fields, Type::Struct(s.name.name.clone()));
                self.complete_type(&s.name, SymbolKind::Struct { fields }, ty);
            }
            Item::Error(e) => {
                let params = self.resolve_params(&e.params, true);
                let ty = constructor_type(&params, Type::Struct(e.name.name.clone()));
                self.complete_type(&e.name, SymbolKind::Error { params }, ty);
            }
            Item::Enum(e) => self.collect_enum(e),
            Item::Const(c) => {
                let ty = self.resolve_type(&c.ty);
                self.declare(Symbol {
                    name: c.name.name.clone(),
                    kind: SymbolKind::Constant,
                    ty,
                    span: c.name.span,
                });
            }
            Item::Import(Import::Host { modules, .. }) => {
                for module in modules {
                    let binding = module.binding();
                    if let Some(existing) = self.symbols.lookup_in(GLOBAL_SCOPE, binding) {
                        if existing.kind == SymbolKind::HostModule {
                            continue;
                        }
                    }
                    self.declare(Symbol {
                        name: binding.to_string(),
                        kind: SymbolKind::HostModule,
                        ty: Type::Unknown,
                        span: module.span,
                    });
                }
            }
            Item::Import(Import::Local { .. }) => {}
            Item::Stmt(Stmt::VarDecl(decl)) => {
                let ty = self.resolve_type(&decl.ty);
                self.declare(Symbol {
                    name: decl.name.name.clone(),
                    kind: SymbolKind::Variable,
                    ty,
                    span: decl.name.span,
                });
            }
            Item::Stmt(_) => {}
        }
    }

    /// Fill in the shape of a type declared by `declare_types`
    fn complete_type(&mut self, name: &Ident, kind: SymbolKind, ty: Type) {
        if let Some(symbol) = self.symbols.lookup_in_mut(GLOBAL_SCOPE, &name.name) {
            // A duplicate declaration keeps the first shape
            if symbol.span == name.span {
                symbol.kind = kind;
                symbol.ty = ty;
            }
        }
    }

    fn collect_enum(&mut self, decl: &EnumDecl) {
        let enum_name = &decl.name.name;
        let mut members: Vec<String> = Vec::new();
        let mut values: Vec<Literal> = Vec::new();
        let mut explicit_ty: Option<Type> = None;
        let mut has_auto = false;

        for (index, member) in decl.members.iter().enumerate() {
            let name = &member.name.name;
            if members.contains(name) {
                self.report(Error::DuplicateDefinition {
                    name: name.clone(),
                    span: member.name.span,
                });
                continue;
            }
            members.push(name.clone());

            let value = match &member.value {
                Some(lit) => {
                    let lit_ty = lit.ty();
                    if let Some(annotation) = &member.ty {
                        let declared = self.resolve_type(annotation);
                        if !declared.accepts(&lit_ty) {
                            self.mismatch(format!("enum member '{}'", name), &declared, &lit_ty, member.span);
                        }
                    }
                    match &explicit_ty {
                        Some(first) if *first != lit_ty => {
                            self.report(Error::EnumValueMismatch {
                                enum_name: enum_name.clone(),
                                member: name.clone(),
                                expected: first.to_string(),
                                got: lit_ty.to_string(),
                                span: member.span,
                            });
                        }
                        Some(_) => {}
                        None => explicit_ty = Some(lit_ty),
                    }
                    lit.clone()
                }
                None => {
                    has_auto = true;
                    Literal::Int(index as i64)
                }
            };

            let key = enum_value_key(&value);
            if values.contains(&key) {
                self.report(Error::DuplicateEnumValue {
                    enum_name: enum_name.clone(),
                    member: name.clone(),
                    value: describe_literal(&value),
                    span: member.span,
                });
            } else {
                values.push(key);
            }
        }

        let value_ty = match (explicit_ty, has_auto) {
            (None, _) => Type::Int,
            (Some(ty), false) => ty,
            (Some(Type::Int), true) => Type::Int,
            (Some(_), true) => Type::Unknown,
        };
        self.complete_type(&decl.name, SymbolKind::Enum { members, value_ty }, Type::Unknown);
    }

    fn resolve_params(&mut self, params: &[Param], report: bool) -> Vec<(String, Type)> {
        params
            .iter()
            .map(|param| {
                let ty = self.resolve_annotation(&param.ty, report);
                (param.name.name.clone(), ty)
            })
            .collect()
    }

    /// Resolve a written annotation, reporting unknown names
    fn resolve_type(&mut self, ty: &TypeExpr) -> Type {
        self.resolve_annotation(ty, true)
    }

    /// Resolve an annotation pass 1 already reported on
    fn resolve_type_quiet(&mut self, ty: &TypeExpr) -> Type {
        self.resolve_annotation(ty, false)
    }

    fn resolve_annotation(&mut self, ty: &TypeExpr, report: bool) -> Type {
        match &ty.kind {
            TypeExprKind::Int => Type::Int,
            TypeExprKind::Float => Type::Float,
            TypeExprKind::Str => Type::Str,
            TypeExprKind::Bool => Type::Bool,
            TypeExprKind::None => Type::None,
            TypeExprKind::Any => Type::Unknown,
            TypeExprKind::List(elem) => Type::list(self.resolve_annotation(elem, report)),
            TypeExprKind::Dict(key, value) => {
                let key = self.resolve_annotation(key, report);
                Type::dict(key, self.resolve_annotation(value, report))
            }
            TypeExprKind::Named(name) => {
                let kind = self
                    .symbols
                    .lookup_in(GLOBAL_SCOPE, name)
                    .or_else(|| self.symbols.lookup_in(BUILTIN_SCOPE, name))
                    .map(|symbol| &symbol.kind);
                match kind {
                    Some(SymbolKind::Struct { .. }) | Some(SymbolKind::Error { .. }) => {
                        Type::Struct(name.clone())
                    }
                    Some(SymbolKind::Enum { .. }) => Type::Enum(name.clone()),
                    Some(SymbolKind::HostException) => Type::Unknown,
                    _ => {
                        if report {
                            self.report(Error::UnknownType {
                                name: name.clone(),
                                span: ty.span,
                            });
                        }
                        Type::Unknown
                    }
                }
            }
        }
    }

    // ==================== Pass 2 ====================

    /// Type check an item
    fn check_item(&mut self, item: &mut Item) {
        match item {
            Item::Function(func) => self.check_function(func),
            Item::Struct(_) | Item::Enum(_) | Item::Import(_) => {} // Already collected
            Item::Error(decl) => {
                let params = self.resolve_params(&decl.params, false);
                self.symbols.enter_scope();
                for ((name, ty), param) in params.into_iter().zip(&decl.params) {
                    self.declare(Symbol {
                        name,
                        kind: SymbolKind::Param,
                        ty,
                        span: param.name.span,
                    });
                }
                let context = format!("message of error {}", decl.name.name);
                self.check_against(&mut decl.message, &Type::Str, &context);
                self.symbols.exit_scope();
            }
            Item::Const(c) => {
                let ty = self.resolve_type_quiet(&c.ty);
                let context = format!("constant '{}'", c.name.name);
                self.check_against(&mut c.value, &ty, &context);
            }
            Item::Stmt(Stmt::VarDecl(decl)) => self.check_var_decl(decl, true),
            Item::Stmt(stmt) => self.check_stmt(stmt),
        }
    }

    /// Type check a function
    fn check_function(&mut self, func: &mut FunctionDecl) {
        let ret = self.resolve_type_quiet(&func.ret_type);
        let params = self.resolve_params(&func.params, false);

        self.symbols.enter_scope();
        for ((name, ty), param) in params.into_iter().zip(&func.params) {
            self.declare(Symbol {
                name,
                kind: SymbolKind::Param,
                ty,
                span: param.name.span,
            });
        }

        self.current_function = Some((func.name.name.clone(), ret.clone()));
        self.current_globals.clear();
        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);

        self.check_stmts(&mut func.body.stmts);

        self.loop_depth = outer_loops;
        self.current_function = None;
        self.symbols.exit_scope();
        func.globals = std::mem::take(&mut self.current_globals);

        if !matches!(ret, Type::None | Type::Unknown) && !block_returns(&func.body) {
            self.report(Error::MissingReturn {
                func: func.name.name.clone(),
                span: func.name.span,
            });
        }
    }

    /// Type check a block in its own scope
    fn check_block(&mut self, block: &mut Block) {
        self.symbols.enter_scope();
        self.check_stmts(&mut block.stmts);
        self.symbols.exit_scope();
    }

    fn check_stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    /// Type check a statement
    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::VarDecl(decl) => self.check_var_decl(decl, false),
            Stmt::Assign {
                target,
                op,
                value,
                span,
            } => self.check_assign(target, *op, value, *span),
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
            Stmt::If {
                branches,
                else_block,
                ..
            } => {
                for (cond, block) in branches {
                    self.check_expr(cond);
                    self.check_block(block);
                }
                if let Some(block) = else_block {
                    self.check_block(block);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_expr(cond);
                self.loop_depth += 1;
                self.check_block(body);
                self.loop_depth -= 1;
            }
            Stmt::For {
                var,
                var_ty,
                iter,
                body,
                ..
            } => {
                let iter_ty = self.check_expr(iter);
                let elem = match iter_ty.iter_elem() {
                    Some(elem) => elem,
                    None => {
                        self.mismatch("for loop", "iterable", &iter_ty, iter.span);
                        Type::Unknown
                    }
                };
                let ty = match var_ty {
                    Some(annotation) => {
                        let declared = self.resolve_type(annotation);
                        if !declared.accepts(&elem) {
                            self.mismatch(format!("loop variable '{}'", var.name), &declared, &elem, var.span);
                        }
                        declared
                    }
                    None => elem,
                };

                self.symbols.enter_scope();
                self.declare(Symbol {
                    name: var.name.clone(),
                    kind: SymbolKind::Variable,
                    ty,
                    span: var.span,
                });
                self.loop_depth += 1;
                self.check_stmts(&mut body.stmts);
                self.loop_depth -= 1;
                self.symbols.exit_scope();
            }
            Stmt::Try {
                body,
                handlers,
                finally,
                ..
            } => {
                self.check_block(body);
                for handler in handlers {
                    let ty = match &handler.class {
                        Some(class) => self.exception_type(class),
                        None => Type::Unknown,
                    };
                    self.symbols.enter_scope();
                    if let Some(binding) = &handler.binding {
                        self.declare(Symbol {
                            name: binding.name.clone(),
                            kind: SymbolKind::Variable,
                            ty,
                            span: binding.span,
                        });
                    }
                    self.check_stmts(&mut handler.body.stmts);
                    self.symbols.exit_scope();
                }
                if let Some(block) = finally {
                    self.check_block(block);
                }
            }
            Stmt::Raise { value, .. } => {
                if let Some(value) = value {
                    let ty = self.check_expr(value);
                    if !self.is_exception(&ty) {
                        self.mismatch("raise", "exception", &ty, value.span);
                    }
                }
            }
            Stmt::Return { value, span } => {
                let expected = match self.current_function.as_ref().map(|(_, ret)| ret.clone()) {
                    Some(ret) => ret,
                    None => {
                        self.report(Error::ReturnOutsideFunction { span: *span });
                        if let Some(value) = value {
                            self.check_expr(value);
                        }
                        return;
                    }
                };
                match value {
                    Some(value) => {
                        self.check_against(value, &expected, "return value");
                    }
                    None => {
                        if !expected.accepts(&Type::None) {
                            self.mismatch("return value", &expected, &Type::None, *span);
                        }
                    }
                }
            }
            Stmt::Break { span } => self.check_in_loop("break", *span),
            Stmt::Continue { span } => self.check_in_loop("continue", *span),
            Stmt::Pass { .. } => {}
        }
    }

    fn check_in_loop(&mut self, keyword: &str, span: Span) {
        if self.loop_depth == 0 {
            self.report(Error::OutsideLoop {
                keyword: keyword.to_string(),
                span,
            });
        }
    }

    /// Check a declaration; top-level ones were registered by pass 1
    fn check_var_decl(&mut self, decl: &mut VarDecl, predeclared: bool) {
        let ty = if predeclared {
            self.resolve_type_quiet(&decl.ty)
        } else {
            self.resolve_type(&decl.ty)
        };
        let context = format!("declaration of '{}'", decl.name.name);
        self.check_against(&mut decl.value, &ty, &context);

        if !predeclared {
            self.declare(Symbol {
                name: decl.name.name.clone(),
                kind: SymbolKind::Variable,
                ty,
                span: decl.name.span,
            });
        }
    }

    fn check_assign(&mut self, target: &mut Expr, op: AssignOp, value: &mut Expr, span: Span) {
        let target_ty = match &target.kind {
            ExprKind::Ident(name) => {
                let name = name.clone();
                let ty = self.assign_target_type(&name, target.span);
                target.ty = Some(ty.clone());
                ty
            }
            _ => self.check_expr(target),
        };

        match op.binary_op() {
            None => {
                let context = format!("assignment to {}", describe_target(target));
                self.check_against(value, &target_ty, &context);
            }
            Some(bin) => {
                let value_ty = self.check_expr(value);
                let result = self.binary_result(bin, &target_ty, &value_ty, span);
                if !target_ty.accepts(&result) {
                    self.mismatch(format!("'{}' assignment", op.as_str()), &target_ty, &result, span);
                }
            }
        }
    }

    /// Type of a plain name being assigned; records module-level writes
    fn assign_target_type(&mut self, name: &str, span: Span) -> Type {
        let Some((scope, symbol)) = self.symbols.lookup_scoped(name) else {
            self.report(Error::UndefinedSymbol {
                name: name.to_string(),
                span,
            });
            return Type::Unknown;
        };

        match symbol.kind {
            SymbolKind::Constant => {
                self.report(Error::ConstantReassignment {
                    name: name.to_string(),
                    span,
                });
                Type::Unknown
            }
            SymbolKind::Variable => {
                let ty = symbol.ty.clone();
                let in_function = self.current_function.is_some();
                if scope == GLOBAL_SCOPE && in_function && !self.current_globals.iter().any(|g| g == name) {
                    self.current_globals.push(name.to_string());
                }
                ty
            }
            _ => symbol.ty.clone(),
        }
    }

    /// Type of the class named in an `except` clause
    fn exception_type(&mut self, class: &Ident) -> Type {
        match self.symbols.lookup(&class.name).map(|symbol| symbol.kind.clone()) {
            Some(SymbolKind::Error { .. }) => Type::Struct(class.name.clone()),
            Some(SymbolKind::Struct { .. }) => {
                let got = Type::Struct(class.name.clone());
                self.mismatch("except clause", "exception", &got, class.span);
                Type::Unknown
            }
            Some(_) => Type::Unknown,
            None => {
                self.report(Error::UndefinedSymbol {
                    name: class.name.clone(),
                    span: class.span,
                });
                Type::Unknown
            }
        }
    }

    fn is_exception(&self, ty: &Type) -> bool {
        match ty {
            Type::Unknown => true,
            Type::Struct(name) => matches!(
                self.symbols.lookup_in(GLOBAL_SCOPE, name).map(|symbol| &symbol.kind),
                Some(SymbolKind::Error { .. })
            ),
            _ => false,
        }
    }

    // ==================== Expressions ====================

    /// Check `expr` where a value of type `expected` is required.
    ///
    /// List and dict literals are checked element by element, and both sides
    /// of an `orelse` chain must fit.
    fn check_against(&mut self, expr: &mut Expr, expected: &Type, context: &str) -> Type {
        let structural = matches!(
            (&expr.kind, expected),
            (ExprKind::List(_), Type::List(_))
                | (ExprKind::Dict(_), Type::Dict(_, _))
                | (ExprKind::Fallback { .. }, _)
        );
        if !structural {
            let got = self.check_expr(expr);
            if !expected.accepts(&got) {
                self.mismatch(context, expected, &got, expr.span);
                return Type::Unknown;
            }
            return got;
        }

        match (&mut expr.kind, expected) {
            (ExprKind::List(elems), Type::List(elem_ty)) => {
                for (index, elem) in elems.iter_mut().enumerate() {
                    self.check_against(elem, elem_ty, &format!("element {} of {}", index, context));
                }
            }
            (ExprKind::Dict(entries), Type::Dict(key_ty, value_ty)) => {
                for (index, (key, value)) in entries.iter_mut().enumerate() {
                    self.check_against(key, key_ty, &format!("key {} of {}", index, context));
                    self.check_against(value, value_ty, &format!("value {} of {}", index, context));
                }
            }
            (ExprKind::Fallback { primary, default }, _) => {
                self.check_against(primary, expected, context);
                self.check_against(default, expected, &format!("fallback of {}", context));
            }
            _ => {}
        }
        expr.ty = Some(expected.clone());
        expected.clone()
    }

    /// Type check an expression and record its type
    fn check_expr(&mut self, expr: &mut Expr) -> Type {
        let ty = self.infer_expr(expr);
        expr.ty = Some(ty.clone());
        ty
    }

    fn infer_expr(&mut self, expr: &mut Expr) -> Type {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Literal(lit) => lit.ty(),
            ExprKind::FString(parts) => {
                for part in parts {
                    if let FStringPart::Expr { expr, .. } = part {
                        self.check_expr(expr);
                    }
                }
                Type::Str
            }
            ExprKind::Ident(name) => match self.symbols.lookup(name) {
                Some(symbol) => symbol.ty.clone(),
                None => {
                    self.report(Error::UndefinedSymbol {
                        name: name.clone(),
                        span,
                    });
                    Type::Unknown
                }
            },
            ExprKind::Binary { left, op, right } => {
                let left = self.check_expr(left);
                let right = self.check_expr(right);
                self.binary_result(*op, &left, &right, span)
            }
            ExprKind::Compare { first, rest } => {
                let mut left_ty = self.check_expr(first);
                let mut left_span = first.span;
                let mut result = Type::Bool;
                for (op, operand) in rest.iter_mut() {
                    let right_ty = self.check_expr(operand);
                    let pair = left_span.merge(&operand.span);
                    if self.binary_result(*op, &left_ty, &right_ty, pair).is_unknown() {
                        result = Type::Unknown;
                    }
                    left_ty = right_ty;
                    left_span = operand.span;
                }
                result
            }
            ExprKind::Unary { op, expr: operand } => {
                let ty = self.check_expr(operand);
                match op {
                    UnOp::Not => Type::Bool,
                    UnOp::Neg | UnOp::Pos if ty.is_numeric() || ty.is_unknown() => ty,
                    UnOp::Neg | UnOp::Pos => {
                        self.report(Error::InvalidOperand {
                            op: op.as_str().to_string(),
                            operand: ty.to_string(),
                            span,
                        });
                        Type::Unknown
                    }
                }
            }
            ExprKind::Call { func, args, kwargs } => self.check_call(func, args, kwargs, span),
            ExprKind::Field { expr: receiver, field } => {
                if let Some(enum_name) = self.enum_ref(receiver) {
                    receiver.ty = Some(Type::Unknown);
                    return self.enum_member(&enum_name, field);
                }
                let receiver_ty = self.check_expr(receiver);
                self.member_type(&receiver_ty, field)
            }
            ExprKind::Index { expr: base, index } => {
                let base_ty = self.check_expr(base);
                let index_ty = self.check_expr(index);
                let index_span = index.span;
                match base_ty {
                    Type::List(elem) => {
                        if !Type::Int.accepts(&index_ty) {
                            self.mismatch("list index", Type::Int, &index_ty, index_span);
                        }
                        *elem
                    }
                    Type::Dict(key, value) => {
                        if !key.accepts(&index_ty) {
                            self.mismatch("dict key", &key, &index_ty, index_span);
                        }
                        *value
                    }
                    Type::Str => {
                        if !Type::Int.accepts(&index_ty) {
                            self.mismatch("string index", Type::Int, &index_ty, index_span);
                        }
                        Type::Str
                    }
                    Type::Unknown => Type::Unknown,
                    other => {
                        self.report(Error::NotIndexable {
                            ty: other.to_string(),
                            span,
                        });
                        Type::Unknown
                    }
                }
            }
            ExprKind::Slice { expr: base, lower, upper } => {
                let base_ty = self.check_expr(base);
                for bound in [lower, upper].into_iter().flatten() {
                    let ty = self.check_expr(bound);
                    if !Type::Int.accepts(&ty) {
                        self.mismatch("slice bound", Type::Int, &ty, bound.span);
                    }
                }
                match base_ty {
                    Type::List(_) | Type::Str | Type::Unknown => base_ty,
                    other => {
                        self.report(Error::NotIndexable {
                            ty: other.to_string(),
                            span,
                        });
                        Type::Unknown
                    }
                }
            }
            ExprKind::List(elems) => {
                let types: Vec<Type> = elems.iter_mut().map(|elem| self.check_expr(elem)).collect();
                Type::list(join_all(&types))
            }
            ExprKind::Dict(entries) => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for (key, value) in entries.iter_mut() {
                    keys.push(self.check_expr(key));
                    values.push(self.check_expr(value));
                }
                Type::dict(join_all(&keys), join_all(&values))
            }
            ExprKind::Fallback { primary, default } => {
                let primary = self.check_expr(primary);
                let default = self.check_expr(default);
                primary.unify(&default)
            }
        }
    }

    /// Result type of a binary operation, reporting incompatible operands
    fn binary_result(&mut self, op: BinOp, left: &Type, right: &Type, span: Span) -> Type {
        use BinOp::*;

        let result = match op {
            And | Or => Some(if *left == Type::Bool && *right == Type::Bool {
                Type::Bool
            } else {
                left.unify(right)
            }),
            Eq | Ne | Is | IsNot => Some(Type::Bool),
            Lt | Le | Gt | Ge => {
                let comparable = left.is_unknown()
                    || right.is_unknown()
                    || (left.is_numeric() && right.is_numeric())
                    || (left == right && matches!(left, Type::Str | Type::List(_)));
                comparable.then_some(Type::Bool)
            }
            In | NotIn => match right.iter_elem() {
                Some(elem) if elem.accepts(left) => Some(Type::Bool),
                _ => None,
            },
            _ if left.is_unknown() || right.is_unknown() => Some(Type::Unknown),
            Add => match (left, right) {
                (Type::Str, Type::Str) => Some(Type::Str),
                (Type::List(a), Type::List(b)) => Some(Type::list(a.unify(b))),
                _ => left.numeric_join(right),
            },
            Mul => match (left, right) {
                (Type::Str, Type::Int) | (Type::Int, Type::Str) => Some(Type::Str),
                (Type::List(_), Type::Int) => Some(left.clone()),
                (Type::Int, Type::List(_)) => Some(right.clone()),
                _ => left.numeric_join(right),
            },
            Div => left.numeric_join(right).map(|_| Type::Float),
            Mod if *left == Type::Str => Some(Type::Str),
            Sub | FloorDiv | Mod | Pow => left.numeric_join(right),
        };

        match result {
            Some(ty) => ty,
            None => {
                self.report(Error::InvalidOperands {
                    op: op.as_str().to_string(),
                    left: left.to_string(),
                    right: right.to_string(),
                    span,
                });
                Type::Unknown
            }
        }
    }

    /// Name of the enum `expr` refers to, if it is a bare enum name
    fn enum_ref(&self, expr: &Expr) -> Option<String> {
        let ExprKind::Ident(name) = &expr.kind else {
            return None;
        };
        match self.symbols.lookup(name) {
            Some(Symbol {
                kind: SymbolKind::Enum { .. },
                ..
            }) => Some(name.clone()),
            _ => None,
        }
    }

    fn enum_member(&mut self, enum_name: &str, member: &Ident) -> Type {
        let known = match self.symbols.lookup_in(GLOBAL_SCOPE, enum_name).map(|symbol| &symbol.kind) {
            Some(SymbolKind::Enum { members, .. }) => members.contains(&member.name),
            _ => false,
        };
        if known {
            Type::Enum(enum_name.to_string())
        } else {
            self.report(Error::UnknownEnumMember {
                enum_name: enum_name.to_string(),
                member: member.name.clone(),
                span: member.span,
            });
            Type::Unknown
        }
    }

    /// Type of `receiver.field` for a value receiver
    fn member_type(&mut self, receiver: &Type, field: &Ident) -> Type {
        let found = match receiver {
            Type::Struct(name) => {
                match self.symbols.lookup_in(GLOBAL_SCOPE, name).map(|symbol| &symbol.kind) {
                    Some(SymbolKind::Struct { fields }) => lookup_field(fields, &field.name),
                    // Exceptions also carry the host's `args`
                    Some(SymbolKind::Error { params }) => {
                        lookup_field(params, &field.name).or_else(|| (field.name == "args").then_some(Type::Unknown))
                    }
                    _ => Some(Type::Unknown),
                }
            }
            Type::Enum(name) => match field.name.as_str() {
                "name" => Some(Type::Str),
                "value" => match self.symbols.lookup_in(GLOBAL_SCOPE, name).map(|symbol| &symbol.kind) {
                    Some(SymbolKind::Enum { value_ty, .. }) => Some(value_ty.clone()),
                    _ => Some(Type::Unknown),
                },
                _ => None,
            },
            _ => Some(Type::Unknown),
        };

        found.unwrap_or_else(|| {
            self.report(Error::UnknownField {
                ty: receiver.to_string(),
                field: field.name.clone(),
                span: field.span,
            });
            Type::Unknown
        })
    }

    // ==================== Calls ====================

    fn check_call(
        &mut self,
        func: &mut Expr,
        args: &mut [Expr],
        kwargs: &mut [(Ident, Expr)],
        span: Span,
    ) -> Type {
        let callee_ty = match &mut func.kind {
            ExprKind::Ident(name) => {
                let name = name.clone();
                let Some(symbol) = self.symbols.lookup(&name).cloned() else {
                    self.report(Error::UndefinedSymbol {
                        name,
                        span: func.span,
                    });
                    func.ty = Some(Type::Unknown);
                    self.check_loose_args(args, kwargs);
                    return Type::Unknown;
                };
                func.ty = Some(symbol.ty.clone());
                match symbol.kind {
                    SymbolKind::Builtin => return self.check_builtin_call(&name, args, kwargs, span),
                    SymbolKind::Function { params, ret } => {
                        self.check_params(&name, "argument", &params, args, kwargs, span);
                        return ret;
                    }
                    SymbolKind::Struct { fields } => {
                        self.check_params(&name, "field", &fields, args, kwargs, span);
                        return Type::Struct(name);
                    }
                    SymbolKind::Error { params } => {
                        self.check_params(&name, "argument", &params, args, kwargs, span);
                        return Type::Struct(name);
                    }
                    SymbolKind::Enum { .. } => {
                        // Lookup by value: `Color(1)`
                        self.check_params(&name, "argument", &[("value".into(), Type::Unknown)], args, kwargs, span);
                        return Type::Enum(name);
                    }
                    SymbolKind::HostModule | SymbolKind::HostException => {
                        self.check_loose_args(args, kwargs);
                        return Type::Unknown;
                    }
                    SymbolKind::Variable | SymbolKind::Constant | SymbolKind::Param => symbol.ty,
                }
            }
            ExprKind::Field { expr: receiver, field } if self.enum_ref(receiver).is_none() => {
                let receiver_ty = self.check_expr(receiver);
                if let Some(sig) = method_signature(&receiver_ty, &field.name) {
                    let callee = format!("{}.{}", type_head(&receiver_ty), field.name);
                    func.ty = Some(Type::Unknown);
                    self.check_method_call(&callee, &sig, args, kwargs, span);
                    return sig.ret;
                }
                let ty = self.member_type(&receiver_ty, field);
                func.ty = Some(ty.clone());
                ty
            }
            _ => self.check_expr(func),
        };

        match callee_ty {
            Type::Function { params, ret } => {
                let params: Vec<(String, Type)> = params
                    .into_iter()
                    .enumerate()
                    .map(|(index, ty)| (format!("#{}", index + 1), ty))
                    .collect();
                let callee = describe_callee(func);
                self.check_params(&callee, "argument", &params, args, kwargs, span);
                *ret
            }
            Type::Unknown => {
                self.check_loose_args(args, kwargs);
                Type::Unknown
            }
            other => {
                self.report(Error::NotCallable {
                    ty: other.to_string(),
                    span: func.span,
                });
                self.check_loose_args(args, kwargs);
                Type::Unknown
            }
        }
    }

    /// Check arguments against a declared parameter list
    fn check_params(
        &mut self,
        owner: &str,
        label: &str,
        params: &[(String, Type)],
        args: &mut [Expr],
        kwargs: &mut [(Ident, Expr)],
        span: Span,
    ) {
        let given = args.len() + kwargs.len();
        if given != params.len() {
            self.report(Error::ArgCountMismatch {
                callee: owner.to_string(),
                expected: params.len(),
                got: given,
                span,
            });
        }

        for (index, arg) in args.iter_mut().enumerate() {
            match params.get(index) {
                Some((name, ty)) => {
                    let context = format!("{} '{}' of {}", label, name, owner);
                    self.check_against(arg, ty, &context);
                }
                None => {
                    self.check_expr(arg);
                }
            }
        }

        let positional = args.len();
        for (key, value) in kwargs.iter_mut() {
            match params.iter().position(|(name, _)| *name == key.name) {
                Some(index) if index >= positional => {
                    let context = format!("{} '{}' of {}", label, key.name, owner);
                    self.check_against(value, &params[index].1, &context);
                }
                Some(_) => {
                    self.report(Error::DuplicateDefinition {
                        name: key.name.clone(),
                        span: key.span,
                    });
                    self.check_expr(value);
                }
                None => {
                    self.report(Error::UndefinedSymbol {
                        name: key.name.clone(),
                        span: key.span,
                    });
                    self.check_expr(value);
                }
            }
        }
    }

    fn check_builtin_call(
        &mut self,
        name: &str,
        args: &mut [Expr],
        kwargs: &mut [(Ident, Expr)],
        span: Span,
    ) -> Type {
        let mut arg_types: Vec<Type> = args.iter_mut().map(|arg| self.check_expr(arg)).collect();
        for (_, value) in kwargs.iter_mut() {
            self.check_expr(value);
        }
        let Some(builtin) = self.builtins.get(name).cloned() else {
            return Type::Unknown;
        };

        if !builtin.accepts_arity(args.len()) {
            let expected = if args.len() < builtin.min_args {
                builtin.min_args
            } else {
                builtin.max_args.unwrap_or(builtin.min_args)
            };
            self.report(Error::ArgCountMismatch {
                callee: name.to_string(),
                expected,
                got: args.len(),
                span,
            });
        }

        for (index, (param, arg)) in builtin.params.iter().zip(args.iter()).enumerate() {
            if !param.accepts(&arg_types[index]) {
                self.mismatch(format!("argument {} of {}", index + 1, name), param, &arg_types[index], arg.span);
                arg_types[index] = Type::Unknown;
            }
        }
        if builtin.takes_iterable() {
            if let (Some(first), Some(arg)) = (arg_types.first_mut(), args.first()) {
                if first.iter_elem().is_none() {
                    self.mismatch(format!("argument 1 of {}", name), "iterable", first, arg.span);
                    *first = Type::Unknown;
                }
            }
        }

        builtin.return_type(&arg_types)
    }

    fn check_method_call(
        &mut self,
        callee: &str,
        sig: &MethodSig,
        args: &mut [Expr],
        kwargs: &mut [(Ident, Expr)],
        span: Span,
    ) {
        if !sig.accepts_arity(args.len()) {
            let expected = if args.len() < sig.min_args {
                sig.min_args
            } else {
                sig.max_args.unwrap_or(sig.min_args)
            };
            self.report(Error::ArgCountMismatch {
                callee: callee.to_string(),
                expected,
                got: args.len(),
                span,
            });
        }
        for (index, arg) in args.iter_mut().enumerate() {
            match sig.params.get(index) {
                Some(ty) => {
                    let context = format!("argument {} of {}", index + 1, callee);
                    self.check_against(arg, ty, &context);
                }
                None => {
                    self.check_expr(arg);
                }
            }
        }
        for (_, value) in kwargs.iter_mut() {
            self.check_expr(value);
        }
    }

    /// Check arguments of a call whose signature is unknown
    fn check_loose_args(&mut self, args: &mut [Expr], kwargs: &mut [(Ident, Expr)]) {
        for arg in args.iter_mut() {
            self.check_expr(arg);
        }
        for (_, value) in kwargs.iter_mut() {
            self.check_expr(value);
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a whole program, returning its diagnostics sorted by position.
/// An empty list means the program is well typed.
pub fn check(program: &mut Program) -> Vec<Error> {
    let mut analyzer = SemanticAnalyzer::new();
    analyzer.analyze(program);
    debug!("checked {} items: {} diagnostics", program.items.len(), analyzer.errors.len());
    analyzer.errors
}

fn constructor_type(fields: &[(String, Type)], ret: Type) -> Type {
    Type::Function {
        params: fields.iter().map(|(_, ty)| ty.clone()).collect(),
        ret: Box::new(ret),
    }
}

fn lookup_field(fields: &[(String, Type)], name: &str) -> Option<Type> {
    fields
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, ty)| ty.clone())
}

fn join_all(types: &[Type]) -> Type {
    match types.split_first() {
        Some((first, rest)) => rest.iter().fold(first.clone(), |acc, ty| acc.unify(ty)),
        None => Type::Unknown,
    }
}

/// Value identity the host uses for enum members (`True == 1 == 1.0`)
fn enum_value_key(value: &Literal) -> Literal {
    match value {
        Literal::Bool(b) => Literal::Int(*b as i64),
        Literal::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Literal::Int(*f as i64),
        other => other.clone(),
    }
}

fn describe_literal(value: &Literal) -> String {
    match value {
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => format!("{:?}", f),
        Literal::Str(s) => format!("{:?}", s),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::None => "None".to_string(),
    }
}

fn describe_target(target: &Expr) -> String {
    match &target.kind {
        ExprKind::Ident(name) => format!("'{}'", name),
        ExprKind::Field { field, .. } => format!("field '{}'", field.name),
        _ => "element".to_string(),
    }
}

fn describe_callee(func: &Expr) -> String {
    match &func.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Field { field, .. } => field.name.clone(),
        _ => "call".to_string(),
    }
}

/// `list` for `list[int]`, used in method names
fn type_head(ty: &Type) -> &'static str {
    match ty {
        Type::Str => "str",
        Type::List(_) => "list",
        Type::Dict(_, _) => "dict",
        _ => "value",
    }
}

/// Whether a `return` statement appears anywhere in the block
fn block_returns(block: &Block) -> bool {
    block.stmts.iter().any(stmt_returns)
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::If {
            branches,
            else_block,
            ..
        } => {
            branches.iter().any(|(_, block)| block_returns(block))
                || else_block.as_ref().map_or(false, block_returns)
        }
        Stmt::While { body, .. } | Stmt::For { body, .. } => block_returns(body),
        Stmt::Try {
            body,
            handlers,
            finally,
            ..
        } => {
            block_returns(body)
                || handlers.iter().any(|handler| block_returns(&handler.body))
                || finally.as_ref().map_or(false, block_returns)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;

    fn diagnostics(source: &str) -> Vec<Error> {
        let mut program = parse_source(source, 0).unwrap();
        check(&mut program)
    }

    fn kinds(source: &str) -> Vec<&'static str> {
        diagnostics(source).iter().map(|err| err.kind()).collect()
    }

    #[test]
    fn test_well_typed_program() {
        let source = "\
from python import math;

const PI: float = 3.14159;
const TAU: float = PI * 2;

struct Point:
    x: int;
    y: int;

enum Color: RED, GREEN, BLUE

error NotFound(path: str) -> f\"missing {path}\";

def area(w: int, h: int) -> int:
    return w * h;

def describe(p: Point) -> str:
    return f\"{p.x},{p.y}\";

def main() -> None:
    n: int = int(argv[1]) orelse 0;
    list[int] xs = [1, 2, 3];
    scores: dict[str, float] = {\"a\": 1, \"b\": 2.5};
    p: Point = Point(1, 2);
    p.x = area(p.x, 3);
    c: Color = Color.GREEN;
    if c == Color.RED && !(n > 3):
        print(describe(p));
    for i in range(n):
        xs.append(i * 2);
    total: int = sum(xs) + len(xs);
    root: float = math.sqrt(total);
    try:
        raise NotFound(\"x\");
    except NotFound as e:
        print(e.path, c.value, c.name);

if __name__ == \"__main__\":
    main();
";
        let errors = diagnostics(source);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_forward_and_mutual_reference() {
        let source = "\
def is_even(n: int) -> bool:
    if n == 0:
        return True;
    return is_odd(n - 1);

def is_odd(n: int) -> bool:
    if n == 0:
        return False;
    return is_even(n - 1);

def origin() -> Later:
    return Later(0);

struct Later:
    v: int;
";
        assert!(kinds(source).is_empty());
    }

    #[test]
    fn test_constant_reassignment() {
        assert_eq!(kinds("const PI: float = 3.14;\nPI = 3.14;\n"), vec!["ConstantReassignment"]);
        assert_eq!(
            kinds("const PI: float = 3.14;\ndef f() -> None:\n    PI += 1.0;\n"),
            vec!["ConstantReassignment"]
        );
        assert_eq!(
            kinds("const PI: float = 3.14;\ndef f() -> None:\n    PI: float = 1.0;\n"),
            vec!["ConstantReassignment"]
        );
    }

    #[test]
    fn test_struct_argument_names_field() {
        let errors = diagnostics("struct Point { x: int; y: int }\np: Point = Point(\"10\", 20);\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), "TypeMismatch");
        assert!(errors[0].to_string().contains("field 'x' of Point"), "{}", errors[0]);
    }

    #[test]
    fn test_list_element_homogeneity() {
        for source in ["mixed: list[int] = [1, \"two\", 3];", "list[int] mixed = [1, \"two\", 3];"] {
            let errors = diagnostics(source);
            assert_eq!(errors.len(), 1, "{}", source);
            assert!(errors[0].to_string().contains("element 1 of declaration of 'mixed'"));
        }
        assert!(kinds("ok: list[int] = [1, 2, 3];").is_empty());
        assert!(kinds("floats: list[float] = [1, 2.5];").is_empty());
        assert_eq!(kinds("d: dict[str, int] = {\"a\": 1, 2: 3};"), vec!["TypeMismatch"]);
    }

    #[test]
    fn test_unknown_cascade_is_suppressed() {
        assert_eq!(kinds("y: int = missing(1) + 2;"), vec!["UndefinedSymbol"]);
        assert_eq!(kinds("y: str = (1 + \"a\") * 3;"), vec!["InvalidOperands"]);
    }

    #[test]
    fn test_fallback_default_type() {
        assert!(kinds("n: int = int(\"b\") orelse 0;").is_empty());
        assert!(kinds("f: float = float(\"10.5\") orelse 0;").is_empty());
        let errors = diagnostics("n: int = int(\"b\") orelse \"zero\";");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("fallback of declaration of 'n'"));
    }

    #[test]
    fn test_field_access() {
        let source = "\
struct Inner { v: int }
struct Outer { inner: Inner }
o: Outer = Outer(Inner(1));
o.inner.v = 2;
o.inner.v = \"x\";
w: int = o.inner.w;
";
        assert_eq!(kinds(source), vec!["TypeMismatch", "UnknownField"]);
    }

    #[test]
    fn test_enum_rules() {
        assert_eq!(
            kinds("enum Color: RED, GREEN\nc: Color = Color.PURPLE;\n"),
            vec!["UnknownEnumMember"]
        );
        assert_eq!(kinds("enum E:\n    A = 1;\n    B = \"x\";\n"), vec!["EnumValueMismatch"]);
        assert_eq!(kinds("enum E:\n    A;\n    B = 0;\n"), vec!["DuplicateEnumValue"]);
        assert_eq!(kinds("enum E:\n    A = 1;\n    B = 1;\n"), vec!["DuplicateEnumValue"]);
        assert_eq!(
            kinds("enum Level { LOW = \"l\"; HIGH = \"h\" }\nv: int = Level.LOW.value;\n"),
            vec!["TypeMismatch"]
        );
        assert!(kinds("enum Color: RED, GREEN\nv: int = Color.RED.value;\nn: str = Color.RED.name;\n").is_empty());
    }

    #[test]
    fn test_returns() {
        assert_eq!(kinds("return 1;"), vec!["ReturnOutsideFunction"]);
        assert_eq!(kinds("def f() -> int:\n    pass;\n"), vec!["MissingReturn"]);
        assert_eq!(kinds("def f() -> int:\n    return \"a\";\n"), vec!["TypeMismatch"]);
        assert_eq!(kinds("def f() -> int:\n    return;\n"), vec!["TypeMismatch"]);
        assert!(kinds("def f() -> None:\n    return;\n").is_empty());
        assert_eq!(kinds("def f() -> None:\n    break;\n"), vec!["OutsideLoop"]);
    }

    #[test]
    fn test_calls() {
        let source = "\
def add(a: int, b: int) -> int:
    return a + b;
x: int = add(1);
y: int = add(1, \"2\");
z: int = 5;
w: int = z(1);
v: int = z[0];
";
        assert_eq!(
            kinds(source),
            vec!["ArgCountMismatch", "TypeMismatch", "NotCallable", "NotIndexable"]
        );
        assert_eq!(kinds("n: int = len(\"a\", \"b\");"), vec!["ArgCountMismatch"]);
        assert_eq!(kinds("xs: list[int] = [1];\nxs.append(\"a\");\n"), vec!["TypeMismatch"]);
    }

    #[test]
    fn test_scopes() {
        assert_eq!(kinds("x: int = 1;\nx: int = 2;\n"), vec!["DuplicateDefinition"]);
        let shadowing = "\
x: int = 1;
def f(x: str) -> None:
    if True:
        x: int = 3;
";
        assert!(kinds(shadowing).is_empty());
        assert_eq!(kinds("def f(a: int) -> None:\n    a: int = 2;\n"), vec!["DuplicateDefinition"]);
        assert_eq!(kinds("def f() -> None:\n    if True:\n        y: int = 1;\n    y = 2;\n"), vec!["UndefinedSymbol"]);
    }

    #[test]
    fn test_program_globals() {
        assert!(kinds("n: int = argc;\nfirst: str = argv[0];\n").is_empty());
        assert_eq!(kinds("n: str = argc;"), vec!["TypeMismatch"]);
    }

    #[test]
    fn test_records_assigned_globals() {
        let source = "\
counter: int = 0;
def bump() -> None:
    counter += 1;
    local: int = 1;
    local = 2;
";
        let mut program = parse_source(source, 0).unwrap();
        assert!(check(&mut program).is_empty());
        let Item::Function(func) = &program.items[1] else { panic!("expected function") };
        assert_eq!(func.globals, vec!["counter".to_string()]);
    }

    #[test]
    fn test_fills_expression_types() {
        let mut program = parse_source("x: float = 1 + 2.5;\n", 0).unwrap();
        assert!(check(&mut program).is_empty());
        let Item::Stmt(Stmt::VarDecl(decl)) = &program.items[0] else { panic!("expected declaration") };
        assert_eq!(decl.value.ty, Some(Type::Float));
        let ExprKind::Binary { left, .. } = &decl.value.kind else { panic!("expected binary") };
        assert_eq!(left.ty, Some(Type::Int));
    }

    #[test]
    fn test_symbolic_operators_check_identically() {
        let symbolic = kinds("b: bool = !(1 < 2) && (3 > 4 || True);");
        let words = kinds("b: bool = not (1 < 2) and (3 > 4 or True);");
        assert_eq!(symbolic, words);
        assert!(symbolic.is_empty());
    }

    #[test]
    fn test_comparison_chain_checks_each_pair() {
        assert!(kinds("x: int = 5;\nok: bool = 0 < x < 10;\n").is_empty());
        assert!(kinds("x: float = 0.5;\nok: bool = 0 <= x < 1 == True;\n").is_empty());
        assert_eq!(kinds("x: int = 5;\nbad: bool = 0 < x < \"10\";\n"), vec!["InvalidOperands"]);
        // A failing pair makes the chain Unknown, so the declaration is not reported again
        assert_eq!(kinds("bad: str = 1 < \"a\" < 2;\n"), vec!["InvalidOperands", "InvalidOperands"]);
    }

    #[test]
    fn test_raise_and_except() {
        assert_eq!(kinds("struct P { x: int }\nraise P(1);\n"), vec!["TypeMismatch"]);
        assert!(kinds("raise ValueError(\"bad\");").is_empty());
        assert!(kinds("try:\n    pass;\nexcept KeyError as e:\n    print(e);\n").is_empty());
    }

    #[test]
    fn test_diagnostics_sorted_by_position() {
        let source = "def f() -> None:\n    y: int = \"a\";\nx: int = \"b\";\nz: int = missing;\n";
        let lines: Vec<usize> = diagnostics(source)
            .iter()
            .filter_map(|err| err.span())
            .map(|span| span.line)
            .collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[test]
    fn test_unknown_type_annotation() {
        assert_eq!(kinds("p: Pointt = 1;"), vec!["UnknownType"]);
        assert_eq!(kinds("def f(p: Nope) -> None:\n    pass;\n"), vec!["UnknownType"]);
    }
}
