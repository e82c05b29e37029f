//! Error handling for Snake

use serde::Serialize;
use thiserror::Error;

use crate::utils::Span;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lex,
    Parse,
    Resolve,
    Check,
    Fold,
    Codegen,
    Io,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Resolve => "resolve",
            Stage::Check => "check",
            Stage::Fold => "fold",
            Stage::Codegen => "codegen",
            Stage::Io => "io",
        };
        f.write_str(name)
    }
}

/// Compiler error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Lexer Errors ====================

    #[error("{reason}")]
    Lex { reason: String, span: Span },

    // ==================== Parser Errors ====================

    #[error("Unexpected token: expected {expected}, got {got}")]
    UnexpectedToken {
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Missing type annotation for {what}")]
    MissingTypeAnnotation { what: String, span: Span },

    #[error("'orelse' is only allowed as the initializer of a variable declaration")]
    InvalidFallbackContext { span: Span },

    #[error("Invalid template string: {reason}")]
    InvalidTemplate { reason: String, span: Span },

    // ==================== Resolver Errors ====================

    #[error("Could not find import \"{path}\" (searched: {searched})")]
    ImportNotFound {
        path: String,
        searched: String,
        span: Span,
    },

    #[error("Import cycle detected: {chain}")]
    ImportCycle { chain: String, span: Span },

    // ==================== Checker Diagnostics ====================

    #[error("Undefined symbol: {name}")]
    UndefinedSymbol { name: String, span: Span },

    #[error("Unknown type: {name}")]
    UnknownType { name: String, span: Span },

    #[error("Duplicate definition: {name}")]
    DuplicateDefinition { name: String, span: Span },

    #[error("Type mismatch in {context}: expected {expected}, got {got}")]
    TypeMismatch {
        context: String,
        expected: String,
        got: String,
        span: Span,
    },

    #[error("'{callee}' takes {expected} arguments, but {got} were given")]
    ArgCountMismatch {
        callee: String,
        expected: usize,
        got: usize,
        span: Span,
    },

    #[error("Type {ty} has no field '{field}'")]
    UnknownField {
        ty: String,
        field: String,
        span: Span,
    },

    #[error("Enum {enum_name} has no member '{member}'")]
    UnknownEnumMember {
        enum_name: String,
        member: String,
        span: Span,
    },

    #[error("Cannot reassign constant '{name}'")]
    ConstantReassignment { name: String, span: Span },

    #[error("Operator '{op}' cannot be applied to {left} and {right}")]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
        span: Span,
    },

    #[error("Operator '{op}' cannot be applied to {operand}")]
    InvalidOperand {
        op: String,
        operand: String,
        span: Span,
    },

    #[error("Value of type {ty} is not callable")]
    NotCallable { ty: String, span: Span },

    #[error("Value of type {ty} is not indexable")]
    NotIndexable { ty: String, span: Span },

    #[error("Function '{func}' is missing a return statement")]
    MissingReturn { func: String, span: Span },

    #[error("Return statement outside of function")]
    ReturnOutsideFunction { span: Span },

    #[error("'{keyword}' outside of loop")]
    OutsideLoop { keyword: String, span: Span },

    #[error("Enum {enum_name} member '{member}' has a {got} value, but earlier explicit members are {expected}")]
    EnumValueMismatch {
        enum_name: String,
        member: String,
        expected: String,
        got: String,
        span: Span,
    },

    #[error("Enum {enum_name} member '{member}' repeats the value {value}")]
    DuplicateEnumValue {
        enum_name: String,
        member: String,
        value: String,
        span: Span,
    },

    // ==================== Folder Errors ====================

    #[error("Constant cycle detected: {chain}")]
    ConstantCycle { chain: String, span: Span },

    // ==================== Driver Errors ====================

    #[error("Code generation error: {0}")]
    CodeGen(String),

    #[error("Could not read {path}: {message}")]
    Io { path: String, message: String },
}

impl Error {
    /// Get the span associated with this error
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lex { span, .. }
            | Self::UnexpectedToken { span, .. }
            | Self::MissingTypeAnnotation { span, .. }
            | Self::InvalidFallbackContext { span }
            | Self::InvalidTemplate { span, .. }
            | Self::ImportNotFound { span, .. }
            | Self::ImportCycle { span, .. }
            | Self::UndefinedSymbol { span, .. }
            | Self::UnknownType { span, .. }
            | Self::DuplicateDefinition { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::ArgCountMismatch { span, .. }
            | Self::UnknownField { span, .. }
            | Self::UnknownEnumMember { span, .. }
            | Self::ConstantReassignment { span, .. }
            | Self::InvalidOperands { span, .. }
            | Self::InvalidOperand { span, .. }
            | Self::NotCallable { span, .. }
            | Self::NotIndexable { span, .. }
            | Self::MissingReturn { span, .. }
            | Self::ReturnOutsideFunction { span }
            | Self::OutsideLoop { span, .. }
            | Self::EnumValueMismatch { span, .. }
            | Self::DuplicateEnumValue { span, .. }
            | Self::ConstantCycle { span, .. } => Some(*span),
            Self::CodeGen(_) | Self::Io { .. } => None,
        }
    }

    /// The pipeline stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Self::Lex { .. } => Stage::Lex,
            Self::UnexpectedToken { .. }
            | Self::MissingTypeAnnotation { .. }
            | Self::InvalidFallbackContext { .. }
            | Self::InvalidTemplate { .. } => Stage::Parse,
            Self::ImportNotFound { .. } | Self::ImportCycle { .. } => Stage::Resolve,
            Self::ConstantCycle { .. } => Stage::Fold,
            Self::CodeGen(_) => Stage::Codegen,
            Self::Io { .. } => Stage::Io,
            _ => Stage::Check,
        }
    }

    /// Stable kind name, used in reports and tests
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "LexError",
            Self::UnexpectedToken { .. } => "UnexpectedToken",
            Self::MissingTypeAnnotation { .. } => "MissingTypeAnnotation",
            Self::InvalidFallbackContext { .. } => "InvalidFallbackContext",
            Self::InvalidTemplate { .. } => "InvalidTemplate",
            Self::ImportNotFound { .. } => "NotFound",
            Self::ImportCycle { .. } => "ImportCycle",
            Self::UndefinedSymbol { .. } => "UndefinedSymbol",
            Self::UnknownType { .. } => "UnknownType",
            Self::DuplicateDefinition { .. } => "DuplicateDefinition",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::ArgCountMismatch { .. } => "ArgCountMismatch",
            Self::UnknownField { .. } => "UnknownField",
            Self::UnknownEnumMember { .. } => "UnknownEnumMember",
            Self::ConstantReassignment { .. } => "ConstantReassignment",
            Self::InvalidOperands { .. } | Self::InvalidOperand { .. } => "InvalidOperands",
            Self::NotCallable { .. } => "NotCallable",
            Self::NotIndexable { .. } => "NotIndexable",
            Self::MissingReturn { .. } => "MissingReturn",
            Self::ReturnOutsideFunction { .. } => "ReturnOutsideFunction",
            Self::OutsideLoop { .. } => "OutsideLoop",
            Self::EnumValueMismatch { .. } => "EnumValueMismatch",
            Self::DuplicateEnumValue { .. } => "DuplicateEnumValue",
            Self::ConstantCycle { .. } => "ConstantCycle",
            Self::CodeGen(_) => "CodeGen",
            Self::Io { .. } => "Io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_kind() {
        let err = Error::ConstantReassignment { name: "PI".into(), span: Span::dummy() };
        assert_eq!(err.stage(), Stage::Check);
        assert_eq!(err.kind(), "ConstantReassignment");
        assert_eq!(err.to_string(), "Cannot reassign constant 'PI'");

        let err = Error::ImportCycle { chain: "a.sk -> a.sk".into(), span: Span::dummy() };
        assert_eq!(err.stage(), Stage::Resolve);

        let err = Error::Io { path: "x.sk".into(), message: "gone".into() };
        assert!(err.span().is_none());
    }
}
