//! Built-in Functions Registry
//!
//! Signatures of the host builtins and of the methods on `str`, `list` and
//! `dict` values, as seen by the checker.

use std::collections::HashMap;

use crate::types::Type;

/// How a builtin's result type is derived from its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinReturn {
    Fixed(Type),
    /// Same type as the first argument (`abs`)
    FirstArg,
    /// Element type of the first argument (`sum`)
    Elem,
    /// List of the first argument's element type (`sorted`, `reversed`)
    ListOfElem,
    /// `int` with one argument, `float` with two (`round`)
    Round,
    /// Element type for a single iterable argument, otherwise the join of
    /// the arguments (`min`, `max`)
    Extremum,
}

/// Built-in function signature
#[derive(Debug, Clone)]
pub struct BuiltinFunc {
    pub name: &'static str,
    /// Types of the leading positional parameters; `Unknown` accepts anything
    pub params: Vec<Type>,
    pub min_args: usize,
    /// `None` for variadic builtins
    pub max_args: Option<usize>,
    pub ret: BuiltinReturn,
}

impl BuiltinFunc {
    fn new(name: &'static str, params: Vec<Type>, min_args: usize, max_args: Option<usize>, ret: BuiltinReturn) -> Self {
        Self { name, params, min_args, max_args, ret }
    }

    /// Whether `count` positional arguments are accepted
    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Whether the first argument must be iterable
    pub fn takes_iterable(&self) -> bool {
        matches!(self.ret, BuiltinReturn::Elem | BuiltinReturn::ListOfElem)
            || matches!(self.name, "len" | "enumerate")
    }

    /// Result type for the given argument types
    pub fn return_type(&self, args: &[Type]) -> Type {
        let first = args.first().cloned().unwrap_or(Type::Unknown);
        let elem = first.iter_elem().unwrap_or(Type::Unknown);
        match &self.ret {
            BuiltinReturn::Fixed(ty) => ty.clone(),
            BuiltinReturn::FirstArg => first,
            BuiltinReturn::Elem => elem,
            BuiltinReturn::ListOfElem => Type::list(elem),
            BuiltinReturn::Round => {
                if args.len() > 1 {
                    Type::Float
                } else {
                    Type::Int
                }
            }
            BuiltinReturn::Extremum => {
                if args.len() == 1 {
                    elem
                } else {
                    args.iter().skip(1).fold(first, |acc, ty| acc.unify(ty))
                }
            }
        }
    }
}

/// Exception classes the host provides, usable in `raise` and `except`
pub const HOST_EXCEPTIONS: &[&str] = &[
    "Exception",
    "ArithmeticError",
    "AssertionError",
    "AttributeError",
    "FileNotFoundError",
    "IndexError",
    "KeyError",
    "KeyboardInterrupt",
    "LookupError",
    "NameError",
    "NotImplementedError",
    "OSError",
    "RuntimeError",
    "StopIteration",
    "TypeError",
    "ValueError",
    "ZeroDivisionError",
];

/// Registry of all built-in functions
pub struct BuiltinRegistry {
    functions: HashMap<&'static str, BuiltinFunc>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register_all();
        registry
    }

    fn register_all(&mut self) {
        use BuiltinReturn::*;
        let any = || Type::Unknown;

        // I/O
        self.register(BuiltinFunc::new("print", vec![], 0, None, Fixed(Type::None)));
        self.register(BuiltinFunc::new("input", vec![Type::Str], 0, Some(1), Fixed(Type::Str)));
        self.register(BuiltinFunc::new("open", vec![Type::Str, Type::Str], 1, Some(2), Fixed(Type::Unknown)));

        // Conversions
        self.register(BuiltinFunc::new("int", vec![any(), Type::Int], 0, Some(2), Fixed(Type::Int)));
        self.register(BuiltinFunc::new("float", vec![any()], 0, Some(1), Fixed(Type::Float)));
        self.register(BuiltinFunc::new("str", vec![any()], 0, Some(1), Fixed(Type::Str)));
        self.register(BuiltinFunc::new("bool", vec![any()], 0, Some(1), Fixed(Type::Bool)));
        self.register(BuiltinFunc::new("repr", vec![any()], 1, Some(1), Fixed(Type::Str)));

        // Sequences
        self.register(BuiltinFunc::new("len", vec![any()], 1, Some(1), Fixed(Type::Int)));
        self.register(BuiltinFunc::new(
            "range",
            vec![Type::Int, Type::Int, Type::Int],
            1,
            Some(3),
            Fixed(Type::list(Type::Int)),
        ));
        self.register(BuiltinFunc::new("sorted", vec![any()], 1, Some(1), ListOfElem));
        self.register(BuiltinFunc::new("reversed", vec![any()], 1, Some(1), ListOfElem));
        self.register(BuiltinFunc::new("enumerate", vec![any(), Type::Int], 1, Some(2), Fixed(Type::Unknown)));
        self.register(BuiltinFunc::new("zip", vec![], 0, None, Fixed(Type::Unknown)));
        self.register(BuiltinFunc::new("sum", vec![any()], 1, Some(2), Elem));

        // Numbers
        self.register(BuiltinFunc::new("abs", vec![any()], 1, Some(1), FirstArg));
        self.register(BuiltinFunc::new("round", vec![any(), Type::Int], 1, Some(2), Round));
        self.register(BuiltinFunc::new("min", vec![], 1, None, Extremum));
        self.register(BuiltinFunc::new("max", vec![], 1, None, Extremum));

        // Introspection and process control
        self.register(BuiltinFunc::new("isinstance", vec![any(), any()], 2, Some(2), Fixed(Type::Bool)));
        self.register(BuiltinFunc::new("type", vec![any()], 1, Some(1), Fixed(Type::Unknown)));
        self.register(BuiltinFunc::new("exit", vec![any()], 0, Some(1), Fixed(Type::None)));
    }

    fn register(&mut self, func: BuiltinFunc) {
        self.functions.insert(func.name, func);
    }

    /// Check if a function is a built-in
    pub fn is_builtin(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Get a built-in function by name
    pub fn get(&self, name: &str) -> Option<&BuiltinFunc> {
        self.functions.get(name)
    }

    /// Get all built-in functions
    pub fn all(&self) -> impl Iterator<Item = &BuiltinFunc> {
        self.functions.values()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Signature of a method on a builtin value
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub params: Vec<Type>,
    pub min_args: usize,
    /// `None` for variadic methods
    pub max_args: Option<usize>,
    pub ret: Type,
}

impl MethodSig {
    fn new(params: Vec<Type>, min_args: usize, ret: Type) -> Self {
        let max_args = Some(params.len());
        Self { params, min_args, max_args, ret }
    }

    fn exact(params: Vec<Type>, ret: Type) -> Self {
        let min_args = params.len();
        Self::new(params, min_args, ret)
    }

    fn variadic(ret: Type) -> Self {
        Self { params: Vec::new(), min_args: 0, max_args: None, ret }
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

/// Look up `method` on a value of type `receiver`. `None` means the method is
/// not in the table (the checker then treats the result as `Unknown`).
pub fn method_signature(receiver: &Type, method: &str) -> Option<MethodSig> {
    match receiver {
        Type::Str => str_method(method),
        Type::List(elem) => list_method(elem, method),
        Type::Dict(key, value) => dict_method(key, value, method),
        _ => None,
    }
}

fn str_method(method: &str) -> Option<MethodSig> {
    let str_list = Type::list(Type::Str);
    Some(match method {
        "upper" | "lower" | "title" | "capitalize" | "casefold" | "swapcase" => {
            MethodSig::exact(vec![], Type::Str)
        }
        "strip" | "lstrip" | "rstrip" => MethodSig::new(vec![Type::Str], 0, Type::Str),
        "split" | "rsplit" => MethodSig::new(vec![Type::Str, Type::Int], 0, str_list),
        "splitlines" => MethodSig::exact(vec![], str_list),
        "join" => MethodSig::exact(vec![str_list], Type::Str),
        "replace" => MethodSig::new(vec![Type::Str, Type::Str, Type::Int], 2, Type::Str),
        "startswith" | "endswith" => MethodSig::exact(vec![Type::Str], Type::Bool),
        "find" | "rfind" | "index" | "count" => MethodSig::exact(vec![Type::Str], Type::Int),
        "isdigit" | "isalpha" | "isalnum" | "isspace" | "isupper" | "islower" => {
            MethodSig::exact(vec![], Type::Bool)
        }
        "zfill" => MethodSig::exact(vec![Type::Int], Type::Str),
        "center" | "ljust" | "rjust" => MethodSig::new(vec![Type::Int, Type::Str], 1, Type::Str),
        "format" => MethodSig::variadic(Type::Str),
        "encode" => MethodSig::new(vec![Type::Str], 0, Type::Unknown),
        _ => return None,
    })
}

fn list_method(elem: &Type, method: &str) -> Option<MethodSig> {
    let elem = elem.clone();
    Some(match method {
        "append" | "remove" => MethodSig::exact(vec![elem], Type::None),
        "extend" => MethodSig::exact(vec![Type::list(elem)], Type::None),
        "insert" => MethodSig::exact(vec![Type::Int, elem], Type::None),
        "pop" => MethodSig::new(vec![Type::Int], 0, elem),
        "index" | "count" => MethodSig::exact(vec![elem], Type::Int),
        "sort" => MethodSig::variadic(Type::None),
        "reverse" | "clear" => MethodSig::exact(vec![], Type::None),
        "copy" => MethodSig::exact(vec![], Type::list(elem)),
        _ => return None,
    })
}

fn dict_method(key: &Type, value: &Type, method: &str) -> Option<MethodSig> {
    let (key, value) = (key.clone(), value.clone());
    Some(match method {
        "get" => MethodSig::new(vec![key, value.clone()], 1, value),
        "pop" => MethodSig::new(vec![key, value.clone()], 1, value),
        "setdefault" => MethodSig::exact(vec![key, value.clone()], value),
        "keys" => MethodSig::exact(vec![], Type::list(key)),
        "values" => MethodSig::exact(vec![], Type::list(value)),
        "items" => MethodSig::exact(vec![], Type::Unknown),
        "update" => MethodSig::exact(vec![Type::dict(key, value)], Type::None),
        "copy" => MethodSig::exact(vec![], Type::dict(key, value)),
        "clear" => MethodSig::exact(vec![], Type::None),
        _ => return None,
    })
}
