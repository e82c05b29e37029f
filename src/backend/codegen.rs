//! Code Generation trait - Backend abstraction
//!
//! A backend turns a checked, folded program into source text for a host.

use crate::frontend::ast::Program;
use crate::utils::Result;

/// Code generation backend trait
pub trait CodeGen {
    /// Generate host source from a checked program
    fn generate(&mut self, program: &Program) -> Result<String>;

    /// File extension of the generated source (e.g., "py")
    fn extension(&self) -> &str;

    /// Get the backend name
    fn name(&self) -> &str;
}
