//! Backend module - Code generation

pub mod codegen;

// Python Backend
pub mod python;

pub use codegen::CodeGen;
pub use python::{GeneratorOptions, PythonCodeGen};
