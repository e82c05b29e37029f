//! Python Backend - Generate Python source from the checked AST
//!
//! The output runs unmodified under `python3`; host imports are emitted as
//! plain `import` statements.

mod python_codegen;

pub use python_codegen::{GeneratorOptions, PythonCodeGen};
