//! Snake: a statically typed superset of Python, compiled to Python source.
//!
//! Pipeline: lexer → parser → module resolver → checker → constant folder →
//! Python code generator. The driver functions below run all of it and
//! report failures as located [`Diagnostic`]s.

pub mod backend;
pub mod feedback;
pub mod frontend;
pub mod middle;
pub mod stdlib;
pub mod types;
pub mod utils;

use std::env;
use std::path::{Path, PathBuf};

use log::info;

use crate::backend::{CodeGen, GeneratorOptions, PythonCodeGen};
use crate::frontend::ast::Program;
use crate::frontend::module::ModuleResolver;
use crate::frontend::parser::parse_source;
use crate::frontend::semantic::check;
pub use crate::feedback::{Diagnostic, DiagnosticReport};
pub use crate::utils::{Error, Stage};

/// Driver configuration
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Library roots, searched in order after the importing file's directory
    pub search_roots: Vec<PathBuf>,
    /// Value of `argv[0]` in the generated program
    pub program_name: Option<String>,
}

impl CompileOptions {
    /// Options searching only the default library roots
    pub fn new() -> Self {
        Self {
            search_roots: Self::default_roots(),
            program_name: None,
        }
    }

    /// `~/snakelibs` and `/usr/local/lib/snakelibs`
    pub fn default_roots() -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(home) = env::var_os("HOME") {
            roots.push(PathBuf::from(home).join("snakelibs"));
        }
        roots.push(PathBuf::from("/usr/local/lib/snakelibs"));
        roots
    }
}

/// Compile the program rooted at `entry` to Python source
pub fn compile(entry: &Path, search_roots: &[PathBuf]) -> Result<String, Vec<Diagnostic>> {
    let options = CompileOptions {
        search_roots: search_roots.to_vec(),
        program_name: None,
    };
    compile_with(entry, &options)
}

/// Compile the program rooted at `entry` with explicit options
pub fn compile_with(entry: &Path, options: &CompileOptions) -> Result<String, Vec<Diagnostic>> {
    info!("compiling {}", entry.display());
    let mut resolver = ModuleResolver::new(options.search_roots.clone());
    let program = resolver
        .resolve(entry)
        .map_err(|e| vec![Diagnostic::from_error(&e, &resolver.files())])?;
    finish(program, options)
}

/// Compile in-memory source; `name` identifies it in diagnostics and its
/// imports resolve against the current directory
pub fn compile_source(source: &str, name: &str, options: &CompileOptions) -> Result<String, Vec<Diagnostic>> {
    info!("compiling {} from memory", name);
    let program =
        parse_source(source, 0).map_err(|e| vec![Diagnostic::from_error(&e, &[PathBuf::from(name)])])?;
    let mut resolver = ModuleResolver::new(options.search_roots.clone());
    let program = resolver
        .resolve_program(program, Path::new(name))
        .map_err(|e| vec![Diagnostic::from_error(&e, &resolver.files())])?;
    finish(program, options)
}

/// Check, fold and generate a resolved program
fn finish(mut program: Program, options: &CompileOptions) -> Result<String, Vec<Diagnostic>> {
    let errors = check(&mut program);
    if !errors.is_empty() {
        info!("rejected with {} diagnostic(s)", errors.len());
        return Err(feedback::diagnostics(&errors, &program.files));
    }

    let stats = middle::fold(&mut program).map_err(|e| vec![Diagnostic::from_error(&e, &program.files)])?;
    info!("folded {} of {} constant(s)", stats.folded, stats.constants);

    let mut codegen = PythonCodeGen::new(GeneratorOptions {
        program_name: options.program_name.clone(),
    });
    let source = codegen
        .generate(&program)
        .map_err(|e| vec![Diagnostic::from_error(&e, &program.files)])?;
    info!("generated {} ({} bytes)", codegen.name(), source.len());
    Ok(source)
}
