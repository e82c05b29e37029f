//! Python Code Generator
//!
//! Translates the checked, folded Snake AST to Python source. Output order:
//! prelude, type declarations, functions, folded constants, then top-level
//! statements interleaved with the constants computed at run time.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::Write;

use log::debug;

use crate::backend::codegen::CodeGen;
use crate::frontend::ast::*;
use crate::utils::{Error, Result};

/// Python keywords that are plain identifiers in Snake
const PYTHON_ONLY_KEYWORDS: &[&str] = &[
    "assert", "async", "await", "class", "del", "global", "lambda", "nonlocal", "with", "yield",
];

/// Options for the Python generator
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Bound to `argv[0]` in place of the interpreter's `sys.argv[0]`
    pub program_name: Option<String>,
}

/// Python code generator
pub struct PythonCodeGen {
    options: GeneratorOptions,
    output: String,
    indent: usize,
    /// Module-level names the current function assigns
    globals: Vec<String>,
    /// Error parameters, read as `self.<name>` inside `__str__`
    self_fields: Vec<String>,
}

impl PythonCodeGen {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            output: String::new(),
            indent: 0,
            globals: Vec::new(),
            self_fields: Vec::new(),
        }
    }

    /// Write indented line
    fn writeln(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
            self.output.push_str(line);
        }
        self.output.push('\n');
    }

    /// Two blank lines before a top-level definition
    fn separate(&mut self) {
        self.writeln("");
        self.writeln("");
    }

    /// Generate the complete Python source file
    pub fn generate_source(&mut self, program: &Program) -> Result<String> {
        self.output.clear();
        self.indent = 0;

        self.generate_prelude(program)?;

        // Type declarations
        for item in &program.items {
            match item {
                Item::Enum(decl) => {
                    self.separate();
                    self.generate_enum(decl);
                }
                Item::Struct(decl) => {
                    self.separate();
                    self.generate_struct(decl);
                }
                Item::Error(decl) => {
                    self.separate();
                    self.generate_error(decl)?;
                }
                _ => {}
            }
        }

        // Functions
        for item in &program.items {
            if let Item::Function(func) = item {
                self.separate();
                self.generate_function(func)?;
            }
        }

        // Folded constants; the folder already put them in dependency order
        let mut hoisted = false;
        for item in &program.items {
            if let Item::Const(decl) = item {
                if decl.value.as_literal().is_some() {
                    if !hoisted {
                        self.separate();
                        hoisted = true;
                    }
                    self.generate_const(decl)?;
                }
            }
        }

        // Top-level statements, with constants computed at run time in
        // their merged position since they may read module variables
        let mut first = true;
        for item in &program.items {
            let runtime_const = matches!(item, Item::Const(decl) if decl.value.as_literal().is_none());
            if !runtime_const && !matches!(item, Item::Stmt(_)) {
                continue;
            }
            if first {
                self.separate();
                first = false;
            }
            match item {
                Item::Const(decl) => self.generate_const(decl)?,
                Item::Stmt(stmt) => self.generate_stmt(stmt)?,
                _ => {}
            }
        }

        debug!("generated {} lines of Python", self.output.lines().count());
        Ok(self.output.clone())
    }

    fn generate_const(&mut self, decl: &ConstDecl) -> Result<()> {
        let line = format!(
            "{}: {} = {}",
            py_name(&decl.name.name),
            python_type(&decl.ty),
            self.expr(&decl.value)?
        );
        self.writeln(&line);
        Ok(())
    }

    fn generate_prelude(&mut self, program: &Program) -> Result<()> {
        self.writeln("from __future__ import annotations");
        self.writeln("import sys");

        let mut seen: HashSet<(&str, Option<&str>)> = HashSet::new();
        for item in &program.items {
            let Item::Import(Import::Host { ecosystem, modules, .. }) = item else {
                continue;
            };
            if ecosystem != "python" {
                return Err(Error::CodeGen(format!("unsupported host ecosystem '{}'", ecosystem)));
            }
            for module in modules {
                let key = (module.name.as_str(), module.alias.as_deref());
                if key == ("sys", None) || !seen.insert(key) {
                    continue;
                }
                match &module.alias {
                    Some(alias) => self.writeln(&format!("import {} as {}", module.name, alias)),
                    None => self.writeln(&format!("import {}", module.name)),
                }
            }
        }

        if program.items.iter().any(|item| matches!(item, Item::Enum(_))) {
            self.writeln("from enum import Enum");
        }

        self.writeln("");
        match &self.options.program_name {
            Some(name) => {
                let line = format!("argv = [{}] + sys.argv[1:]", string_literal(name, '"'));
                self.writeln(&line);
            }
            None => self.writeln("argv = sys.argv"),
        }
        self.writeln("argc = len(argv)");
        Ok(())
    }

    fn generate_enum(&mut self, decl: &EnumDecl) {
        self.writeln(&format!("class {}(Enum):", py_name(&decl.name.name)));
        self.indent += 1;
        if decl.members.is_empty() {
            self.writeln("pass");
        }
        for (ordinal, member) in decl.members.iter().enumerate() {
            let value = match &member.value {
                Some(lit) => literal(lit, '"'),
                None => ordinal.to_string(),
            };
            self.writeln(&format!("{} = {}", py_name(&member.name.name), value));
        }
        self.indent -= 1;
    }

    fn generate_struct(&mut self, decl: &StructDecl) {
        let names: Vec<Cow<str>> = decl.fields.iter().map(|f| py_name(&f.name.name)).collect();
        let params: String = decl
            .fields
            .iter()
            .zip(&names)
            .map(|(field, name)| format!(", {}: {}", name, python_type(&field.ty)))
            .collect();

        self.writeln(&format!("class {}:", py_name(&decl.name.name)));
        self.indent += 1;

        self.writeln(&format!("def __init__(self{}) -> None:", params));
        self.indent += 1;
        if names.is_empty() {
            self.writeln("pass");
        }
        for name in &names {
            self.writeln(&format!("self.{} = {}", name, name));
        }
        self.indent -= 1;

        self.writeln("");
        self.writeln("def __repr__(self) -> str:");
        self.indent += 1;
        let shown: Vec<String> = decl
            .fields
            .iter()
            .zip(&names)
            .map(|(field, name)| format!("{}={{self.{}}}", field.name.name, name))
            .collect();
        self.writeln(&format!("return f\"{}({})\"", decl.name.name, shown.join(", ")));
        self.indent -= 2;
    }

    fn generate_error(&mut self, decl: &ErrorDecl) -> Result<()> {
        let names: Vec<Cow<str>> = decl.params.iter().map(|p| py_name(&p.name.name)).collect();
        let params: String = decl
            .params
            .iter()
            .zip(&names)
            .map(|(param, name)| format!(", {}: {}", name, python_type(&param.ty)))
            .collect();

        self.writeln(&format!("class {}(Exception):", py_name(&decl.name.name)));
        self.indent += 1;

        self.writeln(&format!("def __init__(self{}) -> None:", params));
        self.indent += 1;
        self.writeln(&format!("super().__init__({})", names.join(", ")));
        for name in &names {
            self.writeln(&format!("self.{} = {}", name, name));
        }
        self.indent -= 1;

        self.writeln("");
        self.writeln("def __str__(self) -> str:");
        self.indent += 1;
        self.self_fields = decl.params.iter().map(|p| p.name.name.clone()).collect();
        let message = self.expr(&decl.message);
        self.self_fields.clear();
        let line = format!("return {}", message?);
        self.writeln(&line);
        self.indent -= 2;
        Ok(())
    }

    /// Generate Python code for a function
    fn generate_function(&mut self, func: &FunctionDecl) -> Result<()> {
        let params: Vec<String> = func
            .params
            .iter()
            .map(|p| format!("{}: {}", py_name(&p.name.name), python_type(&p.ty)))
            .collect();
        self.writeln(&format!(
            "def {}({}) -> {}:",
            py_name(&func.name.name),
            params.join(", "),
            python_type(&func.ret_type)
        ));
        self.indent += 1;

        self.globals = func.globals.clone();
        if !self.globals.is_empty() {
            let names: Vec<Cow<str>> = self.globals.iter().map(|g| py_name(g)).collect();
            let line = format!("global {}", names.join(", "));
            self.writeln(&line);
        }
        let result = self.generate_body(&func.body.stmts);
        self.globals.clear();

        self.indent -= 1;
        result
    }

    /// Indented suite; an empty one becomes `pass`
    fn generate_block(&mut self, block: &Block) -> Result<()> {
        self.indent += 1;
        let result = self.generate_body(&block.stmts);
        self.indent -= 1;
        result
    }

    fn generate_body(&mut self, stmts: &[Stmt]) -> Result<()> {
        if stmts.is_empty() {
            self.writeln("pass");
        }
        for stmt in stmts {
            self.generate_stmt(stmt)?;
        }
        Ok(())
    }

    fn generate_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::VarDecl(decl) => self.generate_var_decl(decl)?,
            Stmt::Assign { target, op, value, .. } => {
                let line = format!("{} {} {}", self.expr(target)?, op.as_str(), self.expr(value)?);
                self.writeln(&line);
            }
            Stmt::Expr(expr) => {
                let line = self.expr(expr)?;
                self.writeln(&line);
            }
            Stmt::If {
                branches,
                else_block,
                ..
            } => {
                for (index, (cond, block)) in branches.iter().enumerate() {
                    let keyword = if index == 0 { "if" } else { "elif" };
                    let line = format!("{} {}:", keyword, self.expr(cond)?);
                    self.writeln(&line);
                    self.generate_block(block)?;
                }
                if let Some(block) = else_block {
                    self.writeln("else:");
                    self.generate_block(block)?;
                }
            }
            Stmt::While { cond, body, .. } => {
                let line = format!("while {}:", self.expr(cond)?);
                self.writeln(&line);
                self.generate_block(body)?;
            }
            Stmt::For { var, iter, body, .. } => {
                let line = format!("for {} in {}:", py_name(&var.name), self.expr(iter)?);
                self.writeln(&line);
                self.generate_block(body)?;
            }
            Stmt::Try {
                body,
                handlers,
                finally,
                ..
            } => {
                self.writeln("try:");
                self.generate_block(body)?;
                for handler in handlers {
                    let class = handler
                        .class
                        .as_ref()
                        .map_or(Cow::Borrowed("Exception"), |class| py_name(&class.name));
                    let line = match &handler.binding {
                        Some(binding) => format!("except {} as {}:", class, py_name(&binding.name)),
                        None => format!("except {}:", class),
                    };
                    self.writeln(&line);
                    self.generate_block(&handler.body)?;
                }
                if let Some(block) = finally {
                    self.writeln("finally:");
                    self.generate_block(block)?;
                }
            }
            Stmt::Raise { value, .. } => match value {
                Some(value) => {
                    let line = format!("raise {}", self.expr(value)?);
                    self.writeln(&line);
                }
                None => self.writeln("raise"),
            },
            Stmt::Return { value, .. } => match value {
                Some(value) => {
                    let line = format!("return {}", self.expr(value)?);
                    self.writeln(&line);
                }
                None => self.writeln("return"),
            },
            Stmt::Break { .. } => self.writeln("break"),
            Stmt::Continue { .. } => self.writeln("continue"),
            Stmt::Pass { .. } => self.writeln("pass"),
        }
        Ok(())
    }

    fn generate_var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        let name = py_name(&decl.name.name).into_owned();
        // `global x` forbids annotating x
        let target = if self.globals.contains(&decl.name.name) {
            name.clone()
        } else {
            format!("{}: {}", name, python_type(&decl.ty))
        };

        match &decl.value.kind {
            ExprKind::Fallback { primary, default } => self.generate_fallback(&target, &name, primary, default),
            _ => {
                let line = format!("{} = {}", target, self.expr(&decl.value)?);
                self.writeln(&line);
                Ok(())
            }
        }
    }

    /// `x: T = a orelse b` becomes an attempt with `b` substituted on any
    /// exception; chains nest
    fn generate_fallback(&mut self, target: &str, name: &str, primary: &Expr, default: &Expr) -> Result<()> {
        self.writeln("try:");
        self.indent += 1;
        let line = format!("{} = {}", target, self.expr(primary)?);
        self.writeln(&line);
        self.indent -= 1;

        self.writeln("except Exception:");
        self.indent += 1;
        match &default.kind {
            ExprKind::Fallback { primary, default } => self.generate_fallback(name, name, primary, default)?,
            _ => {
                let line = format!("{} = {}", name, self.expr(default)?);
                self.writeln(&line);
            }
        }
        self.indent -= 1;
        Ok(())
    }

    // ==================== Expressions ====================

    fn expr(&self, expr: &Expr) -> Result<String> {
        self.emit(expr, '"')
    }

    /// Emit an expression; `quote` is the quote character string literals use
    fn emit(&self, expr: &Expr, quote: char) -> Result<String> {
        Ok(match &expr.kind {
            ExprKind::Literal(lit) => literal(lit, quote),
            ExprKind::FString(parts) => self.fstring(parts, quote)?,
            ExprKind::Ident(name) => {
                if self.self_fields.contains(name) {
                    format!("self.{}", py_name(name))
                } else {
                    py_name(name).into_owned()
                }
            }
            ExprKind::Binary { left, op, right } => format!(
                "{} {} {}",
                self.operand(left, quote)?,
                op.as_str(),
                self.operand(right, quote)?
            ),
            ExprKind::Compare { first, rest } => {
                let mut code = self.operand(first, quote)?;
                for (op, operand) in rest {
                    code.push(' ');
                    code.push_str(op.as_str());
                    code.push(' ');
                    code.push_str(&self.operand(operand, quote)?);
                }
                code
            }
            ExprKind::Unary { op, expr } => match op {
                UnOp::Not => format!("not {}", self.operand(expr, quote)?),
                UnOp::Neg | UnOp::Pos => format!("{}{}", op.as_str(), self.operand(expr, quote)?),
            },
            ExprKind::Call { func, args, kwargs } => {
                let mut rendered = Vec::with_capacity(args.len() + kwargs.len());
                for arg in args {
                    rendered.push(self.emit(arg, quote)?);
                }
                for (key, value) in kwargs {
                    rendered.push(format!("{}={}", py_name(&key.name), self.emit(value, quote)?));
                }
                format!("{}({})", self.postfix(func, quote)?, rendered.join(", "))
            }
            ExprKind::Field { expr, field } => {
                format!("{}.{}", self.postfix(expr, quote)?, py_name(&field.name))
            }
            ExprKind::Index { expr, index } => {
                format!("{}[{}]", self.postfix(expr, quote)?, self.emit(index, quote)?)
            }
            ExprKind::Slice { expr, lower, upper } => {
                let bound = |b: &Option<Box<Expr>>| -> Result<String> {
                    match b {
                        Some(b) => self.emit(b, quote),
                        None => Ok(String::new()),
                    }
                };
                format!("{}[{}:{}]", self.postfix(expr, quote)?, bound(lower)?, bound(upper)?)
            }
            ExprKind::List(elems) => {
                let elems = elems
                    .iter()
                    .map(|e| self.emit(e, quote))
                    .collect::<Result<Vec<_>>>()?;
                format!("[{}]", elems.join(", "))
            }
            ExprKind::Dict(entries) => {
                let mut rendered = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    rendered.push(format!("{}: {}", self.emit(key, quote)?, self.emit(value, quote)?));
                }
                format!("{{{}}}", rendered.join(", "))
            }
            ExprKind::Fallback { .. } => {
                return Err(Error::CodeGen(
                    "'orelse' is only valid as a declaration initializer".to_string(),
                ))
            }
        })
    }

    /// Operand of an operator, parenthesized when it is itself an operation
    fn operand(&self, expr: &Expr, quote: char) -> Result<String> {
        let code = self.emit(expr, quote)?;
        Ok(match expr.kind {
            ExprKind::Binary { .. } | ExprKind::Compare { .. } | ExprKind::Unary { .. } => format!("({})", code),
            _ => code,
        })
    }

    /// Receiver of a call, field access or subscript
    fn postfix(&self, expr: &Expr, quote: char) -> Result<String> {
        let code = self.emit(expr, quote)?;
        Ok(match expr.kind {
            ExprKind::Binary { .. }
            | ExprKind::Compare { .. }
            | ExprKind::Unary { .. }
            | ExprKind::Literal(Literal::Int(_))
            | ExprKind::Literal(Literal::Float(_)) => format!("({})", code),
            _ => code,
        })
    }

    fn fstring(&self, parts: &[FStringPart], quote: char) -> Result<String> {
        // Strings inside the braces take the other quote
        let inner = if quote == '"' { '\'' } else { '"' };
        let mut out = String::from("f");
        out.push(quote);
        for part in parts {
            match part {
                FStringPart::Text(text) => escape_into(&mut out, text, quote, true),
                FStringPart::Expr { expr, spec } => {
                    let code = self.emit(expr, inner)?;
                    out.push('{');
                    // `{{` would read as an escaped brace
                    if code.starts_with('{') {
                        out.push(' ');
                    }
                    out.push_str(&code);
                    if let Some(spec) = spec {
                        out.push(':');
                        out.push_str(spec);
                    }
                    out.push('}');
                }
            }
        }
        out.push(quote);
        Ok(out)
    }
}

impl Default for PythonCodeGen {
    fn default() -> Self {
        Self::new(GeneratorOptions::default())
    }
}

impl CodeGen for PythonCodeGen {
    fn generate(&mut self, program: &Program) -> Result<String> {
        self.generate_source(program)
    }

    fn extension(&self) -> &str {
        "py"
    }

    fn name(&self) -> &str {
        "Python"
    }
}

/// Identifier as written in Python; Python-only keywords get a trailing `_`
fn py_name(name: &str) -> Cow<'_, str> {
    if PYTHON_ONLY_KEYWORDS.contains(&name) {
        Cow::Owned(format!("{}_", name))
    } else {
        Cow::Borrowed(name)
    }
}

/// Python spelling of a type annotation
fn python_type(ty: &TypeExpr) -> String {
    match &ty.kind {
        TypeExprKind::Int => "int".to_string(),
        TypeExprKind::Float => "float".to_string(),
        TypeExprKind::Str => "str".to_string(),
        TypeExprKind::Bool => "bool".to_string(),
        TypeExprKind::None => "None".to_string(),
        TypeExprKind::Any => "object".to_string(),
        TypeExprKind::List(elem) => format!("list[{}]", python_type(elem)),
        TypeExprKind::Dict(key, value) => format!("dict[{}, {}]", python_type(key), python_type(value)),
        TypeExprKind::Named(name) => py_name(name).into_owned(),
    }
}

fn literal(lit: &Literal, quote: char) -> String {
    match lit {
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => float_literal(*f),
        Literal::Str(s) => string_literal(s, quote),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::None => "None".to_string(),
    }
}

/// Floats always carry a decimal point or an exponent
fn float_literal(f: f64) -> String {
    if f.is_nan() {
        "float(\"nan\")".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "float(\"inf\")" } else { "-float(\"inf\")" }.to_string()
    } else {
        // Debug formatting keeps `.0` on whole numbers
        format!("{:?}", f)
    }
}

fn string_literal(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    escape_into(&mut out, s, quote, false);
    out.push(quote);
    out
}

/// Re-escape text for a Python string (or f-string, doubling braces)
fn escape_into(out: &mut String, text: &str, quote: char, template: bool) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '{' if template => out.push_str("{{"),
            '}' if template => out.push_str("}}"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;
    use crate::frontend::semantic::check;
    use crate::middle::fold;
    use pretty_assertions::assert_eq;

    fn generate_with(source: &str, options: GeneratorOptions) -> String {
        let mut program = parse_source(source, 0).unwrap();
        let errors = check(&mut program);
        assert!(errors.is_empty(), "{:?}", errors);
        fold(&mut program).unwrap();
        PythonCodeGen::new(options).generate(&program).unwrap()
    }

    fn generate_py(source: &str) -> String {
        generate_with(source, GeneratorOptions::default())
    }

    #[test]
    fn test_full_layout() {
        let source = "\
struct Point:
    x: int;
    y: int;

def main() -> None:
    p: Point = Point(1, 2);
    print(p);

main();
";
        let expected = r#"from __future__ import annotations
import sys

argv = sys.argv
argc = len(argv)


class Point:
    def __init__(self, x: int, y: int) -> None:
        self.x = x
        self.y = y

    def __repr__(self) -> str:
        return f"Point(x={self.x}, y={self.y})"


def main() -> None:
    p: Point = Point(1, 2)
    print(p)


main()
"#;
        assert_eq!(generate_py(source), expected);
    }

    #[test]
    fn test_symbolic_operators_generate_identically() {
        let symbolic = generate_py("a: bool = True;\nb: bool = !a && (a || False);\n");
        let words = generate_py("a: bool = True;\nb: bool = not a and (a or False);\n");
        assert_eq!(symbolic, words);
        assert!(words.contains("b: bool = (not a) and (a or False)"));
    }

    #[test]
    fn test_fallback_chain() {
        let py = generate_py("def f(s: str) -> None:\n    n: int = int(s) orelse int(s + \"0\") orelse 0;\n");
        let expected = "\
def f(s: str) -> None:
    try:
        n: int = int(s)
    except Exception:
        try:
            n = int(s + \"0\")
        except Exception:
            n = 0
";
        assert!(py.contains(expected), "{}", py);
    }

    #[test]
    fn test_struct_repr_shows_plain_field_values() {
        let py = generate_py("struct Tag:\n    name: str;\n    weight: float;\n");
        assert!(py.contains("        return f\"Tag(name={self.name}, weight={self.weight})\"\n"), "{}", py);
        assert!(!py.contains("!r}"));
    }

    #[test]
    fn test_enum_members() {
        let py = generate_py("enum Color: RED, GREEN, BLUE\nenum Level:\n    LOW = 1;\n    HIGH: int = 10;\n");
        assert!(py.contains("from enum import Enum\n"));
        assert!(py.contains("class Color(Enum):\n    RED = 0\n    GREEN = 1\n    BLUE = 2\n"));
        assert!(py.contains("class Level(Enum):\n    LOW = 1\n    HIGH = 10\n"));
        assert!(!generate_py("x: int = 1;").contains("from enum import Enum"));
    }

    #[test]
    fn test_error_class() {
        let py = generate_py("error NotFound(path: str) -> f\"missing {path}\";\nerror Oops;\n");
        let expected = "\
class NotFound(Exception):
    def __init__(self, path: str) -> None:
        super().__init__(path)
        self.path = path

    def __str__(self) -> str:
        return f\"missing {self.path}\"
";
        assert!(py.contains(expected), "{}", py);
        assert!(py.contains("    def __init__(self) -> None:\n        super().__init__()\n"));
        assert!(py.contains("        return \"Oops\"\n"));
    }

    #[test]
    fn test_global_declarations() {
        let source = "\
counter: int = 0;
def bump() -> None:
    counter += 1;
";
        let py = generate_py(source);
        assert!(py.contains("def bump() -> None:\n    global counter\n    counter += 1\n"), "{}", py);
        assert!(py.ends_with("counter: int = 0\n"));
    }

    #[test]
    fn test_host_imports_and_argv() {
        let py = generate_py("from python import math, sys, os.path, numpy as np, math;\n");
        assert_eq!(py.matches("import sys\n").count(), 1);
        assert_eq!(py.matches("import math\n").count(), 1);
        assert!(py.contains("import os.path\nimport numpy as np\n"));
        assert!(py.contains("argv = sys.argv\nargc = len(argv)\n"));

        let named = generate_with(
            "pass;",
            GeneratorOptions {
                program_name: Some("demo.sk".to_string()),
            },
        );
        assert!(named.contains("argv = [\"demo.sk\"] + sys.argv[1:]\n"));
    }

    #[test]
    fn test_grouping_is_preserved() {
        let py = generate_py("a: int = (1 + 2) * 3;\nb: int = 1 + 2 * 3;\nc: int = -(a ** 2);\nd: bool = not a == b;\n");
        assert!(py.contains("a: int = (1 + 2) * 3\n"));
        assert!(py.contains("b: int = 1 + (2 * 3)\n"));
        assert!(py.contains("c: int = -(a ** 2)\n"));
        assert!(py.contains("d: bool = not (a == b)\n"));
    }

    #[test]
    fn test_literals_are_reescaped() {
        let py = generate_py("s: str = \"a\\\"b\\n\";\nf: float = 2.0;\ng: float = 1e20;\nt: str = f\"{s:>5} {{lit}}\";\n");
        assert!(py.contains(r#"s: str = "a\"b\n""#), "{}", py);
        assert!(py.contains("f: float = 2.0\n"));
        assert!(py.contains("g: float = 1e20\n"));
        assert!(py.contains(r#"t: str = f"{s:>5} {{lit}}""#));
    }

    #[test]
    fn test_constants_follow_functions_in_dependency_order() {
        let py = generate_py("const B: int = A * 2;\ndef f() -> int:\n    return B;\nconst A: int = 3;\n");
        let func = py.find("def f()").unwrap();
        let a = py.find("A: int = 3").unwrap();
        let b = py.find("B: int = 6").unwrap();
        assert!(func < a && a < b, "{}", py);
    }

    #[test]
    fn test_runtime_constant_stays_after_its_inputs() {
        let py = generate_py("base: int = 5;\nconst C: int = base * 2;\nconst D: int = 4;\nprint(C + D);\n");
        assert!(py.ends_with("\n\nD: int = 4\n\n\nbase: int = 5\nC: int = base * 2\nprint(C + D)\n"), "{}", py);
    }

    #[test]
    fn test_comparison_chain_is_not_nested() {
        let py = generate_py("a: any = 1;\nb: any = 3;\nok: bool = 0 < a < b <= 10;\ngrouped: bool = (a < b) == True;\n");
        assert!(py.contains("ok: bool = 0 < a < b <= 10\n"), "{}", py);
        assert!(py.contains("grouped: bool = (a < b) == True\n"), "{}", py);
    }

    #[test]
    fn test_python_keywords_are_renamed() {
        let py = generate_py("lambda: int = 1;\nprint(lambda);\n");
        assert!(py.contains("lambda_: int = 1\nprint(lambda_)\n"));
    }

    #[test]
    fn test_control_flow() {
        let source = "\
def main() -> None:
    for i in range(3):
        if i == 0:
            continue;
        elif i == 1:
            pass;
        else:
            break;
    try:
        raise ValueError(\"x\");
    except ValueError as e:
        print(e);
    except:
        raise;
    finally:
        print(\"done\");
";
        let expected = "\
def main() -> None:
    for i in range(3):
        if i == 0:
            continue
        elif i == 1:
            pass
        else:
            break
    try:
        raise ValueError(\"x\")
    except ValueError as e:
        print(e)
    except Exception:
        raise
    finally:
        print(\"done\")
";
        let py = generate_py(source);
        assert!(py.contains(expected), "{}", py);
    }
}
