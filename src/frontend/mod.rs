//! Frontend module - Lexer, Parser, Module Resolution, Semantic Analysis

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod module;
pub mod semantic;
