//! Standard library: builtin functions and methods known to the checker

pub mod builtins;

pub use builtins::{method_signature, BuiltinFunc, BuiltinRegistry, MethodSig, HOST_EXCEPTIONS};
