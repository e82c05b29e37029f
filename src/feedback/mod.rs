//! Structured Feedback Module
//!
//! External rendering of compiler errors:
//! - located diagnostics with file path, line and column
//! - the JSON report printed by `snakec --json`

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::utils::{Error, Stage};

// ==================== Diagnostics ====================

/// A compiler error resolved against the file table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Pipeline stage that rejected the program
    pub stage: Stage,
    /// Stable kind name (e.g., "TypeMismatch")
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Source file, when the error has a location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// 1-based column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Diagnostic {
    /// Create a diagnostic from a compiler error; `files` is the file table
    /// the error's span indexes into
    pub fn from_error(error: &Error, files: &[PathBuf]) -> Self {
        // Builtin spans carry line 0
        let span = error.span().filter(|span| span.line > 0);
        Self {
            stage: error.stage(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            file: span
                .and_then(|span| files.get(span.file_id))
                .map(|path| path.display().to_string()),
            line: span.map(|span| span.line),
            column: span.map(|span| span.column),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => write!(f, "{}:{}:{}: ", file, line, column)?,
            (None, Some(line), Some(column)) => write!(f, "{}:{}: ", line, column)?,
            _ => {}
        }
        write!(f, "{} error [{}]: {}", self.stage, self.kind, self.message)
    }
}

/// Render a batch of errors against a file table
pub fn diagnostics(errors: &[Error], files: &[PathBuf]) -> Vec<Diagnostic> {
    errors.iter().map(|e| Diagnostic::from_error(e, files)).collect()
}

// ==================== Report ====================

/// JSON document for a whole compilation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    /// Compilation status
    pub success: bool,
    /// Entry file
    pub source_file: String,
    /// Number of diagnostics
    pub error_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticReport {
    pub fn new(source_file: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: diagnostics.is_empty(),
            source_file: source_file.into(),
            error_count: diagnostics.len(),
            diagnostics,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Span;

    #[test]
    fn test_diagnostic_location() {
        let files = vec![PathBuf::from("main.sk"), PathBuf::from("lib.sk")];
        let error = Error::ConstantReassignment { name: "PI".into(), span: Span::new(30, 32, 3, 5, 1) };
        let diag = Diagnostic::from_error(&error, &files);
        assert_eq!(diag.stage, Stage::Check);
        assert_eq!(diag.kind, "ConstantReassignment");
        assert_eq!(diag.file.as_deref(), Some("lib.sk"));
        assert_eq!((diag.line, diag.column), (Some(3), Some(5)));
        assert_eq!(diag.to_string(), "lib.sk:3:5: check error [ConstantReassignment]: Cannot reassign constant 'PI'");
    }

    #[test]
    fn test_unlocated_diagnostic() {
        let error = Error::Io { path: "gone.sk".into(), message: "not found".into() };
        let diag = Diagnostic::from_error(&error, &[]);
        assert_eq!(diag.file, None);
        assert_eq!(diag.to_string(), "io error [Io]: Could not read gone.sk: not found");
    }

    #[test]
    fn test_report_json() {
        let error = Error::UndefinedSymbol { name: "y".into(), span: Span::new(0, 1, 1, 1, 0) };
        let report = DiagnosticReport::new("main.sk", diagnostics(&[error], &[PathBuf::from("main.sk")]));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_count"], 1);
        assert_eq!(json["diagnostics"][0]["stage"], "check");
        assert_eq!(json["diagnostics"][0]["kind"], "UndefinedSymbol");
        assert_eq!(json["diagnostics"][0]["line"], 1);

        let clean = DiagnosticReport::new("main.sk", Vec::new());
        assert!(clean.success);
    }
}
