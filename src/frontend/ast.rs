//! Abstract Syntax Tree definitions for Snake

use std::path::PathBuf;

use crate::types::Type;
use crate::utils::Span;

/// A complete program (compilation unit)
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
    /// File table: `Span::file_id` indexes into this
    pub files: Vec<PathBuf>,
}

impl Program {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items, files: Vec::new() }
    }

    /// Path of the file a span belongs to, if known
    pub fn file_path(&self, file_id: usize) -> Option<&PathBuf> {
        self.files.get(file_id)
    }
}

/// Top-level items
#[derive(Debug, Clone)]
pub enum Item {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Const(ConstDecl),
    Error(ErrorDecl),
    Import(Import),
    /// Module-level statement, executed in order
    Stmt(Stmt),
}

/// Identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

/// Function definition
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret_type: TypeExpr,
    pub body: Block,
    /// Module-level variables this function assigns (filled by the checker)
    pub globals: Vec<String>,
    pub span: Span,
}

/// Function or error parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Struct definition
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: Ident,
    pub fields: Vec<Field>,
    pub span: Span,
}

/// Struct field
#[derive(Debug, Clone)]
pub struct Field {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Enum definition
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Ident,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

/// Enum member: `NAME`, `NAME = lit` or `NAME: type = lit`
#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub value: Option<Literal>,
    pub span: Span,
}

/// Constant definition
#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub value: Expr,
    pub span: Span,
}

/// `error Name(p: T, ...) -> message;`
#[derive(Debug, Clone)]
pub struct ErrorDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    /// String or template string; may reference the parameters
    pub message: Expr,
    pub span: Span,
}

/// Import statement
#[derive(Debug, Clone)]
pub enum Import {
    /// `import "path";`
    Local { path: String, span: Span },
    /// `from python import a, b.c as d;`
    Host {
        ecosystem: String,
        modules: Vec<HostModule>,
        span: Span,
    },
}

/// One module of a host import
#[derive(Debug, Clone, PartialEq)]
pub struct HostModule {
    /// Dotted module path
    pub name: String,
    pub alias: Option<String>,
    pub span: Span,
}

impl HostModule {
    /// Name the module is bound to in the program
    pub fn binding(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

/// Written type annotation
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Int,
    Float,
    Str,
    Bool,
    None,
    /// `any`
    Any,
    List(Box<TypeExpr>),
    Dict(Box<TypeExpr>, Box<TypeExpr>),
    /// Struct, enum or error name
    Named(String),
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Code block
#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Variable declaration: `name: T = value;` or `T name = value;`
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    /// May be an `orelse` chain
    pub value: Expr,
    pub span: Span,
}

/// `except [Name [as binding]]:` clause
#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub class: Option<Ident>,
    pub binding: Option<Ident>,
    pub body: Block,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone)]
pub enum Stmt {
    VarDecl(VarDecl),
    /// `target op value;`
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    /// Expression statement
    Expr(Expr),
    /// if / elif / else
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    For {
        var: Ident,
        var_ty: Option<TypeExpr>,
        iter: Expr,
        body: Block,
        span: Span,
    },
    Try {
        body: Block,
        handlers: Vec<ExceptHandler>,
        finally: Option<Block>,
        span: Span,
    },
    Raise {
        value: Option<Expr>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break { span: Span },
    Continue { span: Span },
    Pass { span: Span },
}

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl AssignOp {
    /// The binary operator an augmented assignment applies
    pub fn binary_op(&self) -> Option<BinOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinOp::Add),
            AssignOp::SubAssign => Some(BinOp::Sub),
            AssignOp::MulAssign => Some(BinOp::Mul),
            AssignOp::DivAssign => Some(BinOp::Div),
            AssignOp::ModAssign => Some(BinOp::Mod),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
        }
    }
}

/// Expression with the type slot filled in by the checker
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span, ty: None }
    }

    /// The literal this expression is, if any
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    /// `f"..."` split into segments
    FString(Vec<FStringPart>),
    Ident(String),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// Comparison chain `a < b <= c`: every adjacent pair is compared,
    /// each operand evaluated once
    Compare {
        first: Box<Expr>,
        rest: Vec<(BinOp, Expr)>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    /// Function, constructor or method call
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(Ident, Expr)>,
    },
    /// Field access (expr.field), also enum members and methods
    Field {
        expr: Box<Expr>,
        field: Ident,
    },
    /// Index access (expr[index])
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    /// Slice (expr[lower:upper])
    Slice {
        expr: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// `primary orelse default`, only as a declaration initializer
    Fallback {
        primary: Box<Expr>,
        default: Box<Expr>,
    },
}

/// Segment of a template string
#[derive(Debug, Clone)]
pub enum FStringPart {
    /// Literal text, escapes already processed
    Text(String),
    /// `{expr}` or `{expr:spec}`
    Expr { expr: Expr, spec: Option<String> },
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

impl Literal {
    /// Static type of the literal
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::Str(_) => Type::Str,
            Literal::Bool(_) => Type::Bool,
            Literal::None => Type::None,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
    // Logical
    And,
    Or,
}

impl BinOp {
    /// Host spelling of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Is => "is",
            BinOp::IsNot => "is not",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }

    /// Comparison, membership and identity operators, which chain
    pub fn chains(&self) -> bool {
        self.is_comparison() || matches!(self, BinOp::In | BinOp::NotIn | BinOp::Is | BinOp::IsNot)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Unary plus (+)
    Pos,
    /// Logical not (`not` / `!`)
    Not,
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Pos => "+",
            UnOp::Not => "not",
        }
    }
}
