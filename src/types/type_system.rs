//! Type System for Snake

use std::fmt;

/// Resolved type (after annotation resolution / type checking)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Str,
    Bool,
    None,
    /// Declared struct (or error) type, compared by name
    Struct(String),
    /// Declared enum type, compared by name
    Enum(String),
    List(Box<Type>),
    Dict(Box<Type>, Box<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    /// `any`, host-library values, and the recovery type after a diagnostic
    Unknown,
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn dict(key: Type, value: Type) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }

    /// Check if this is `int` or `float`
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether a value of type `got` may be stored where `self` is expected.
    ///
    /// `Unknown` on either side is accepted, `int` widens to `float`, and
    /// containers are checked element-wise.
    pub fn accepts(&self, got: &Type) -> bool {
        match (self, got) {
            (Self::Unknown, _) | (_, Self::Unknown) => true,
            (Self::Float, Self::Int) => true,
            (Self::List(a), Self::List(b)) => a.accepts(b),
            (Self::Dict(ka, va), Self::Dict(kb, vb)) => ka.accepts(kb) && va.accepts(vb),
            (
                Self::Function { params: pa, ret: ra },
                Self::Function { params: pb, ret: rb },
            ) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(a, b)| b.accepts(a))
                    && ra.accepts(rb)
            }
            (a, b) => a == b,
        }
    }

    /// Element type produced when iterating a value of this type
    pub fn iter_elem(&self) -> Option<Type> {
        match self {
            Self::List(elem) => Some((**elem).clone()),
            Self::Dict(key, _) => Some((**key).clone()),
            Self::Str => Some(Self::Str),
            Self::Unknown => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Result type of an arithmetic operation on two numeric types
    pub fn numeric_join(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Self::Int, Self::Int) => Some(Self::Int),
            (Self::Int | Self::Float, Self::Int | Self::Float) => Some(Self::Float),
            _ => None,
        }
    }

    /// Join of two element types seen in one literal, `Unknown` if they disagree
    pub fn unify(&self, other: &Type) -> Type {
        if self == other {
            self.clone()
        } else if let Some(joined) = self.numeric_join(other) {
            joined
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::Bool => write!(f, "bool"),
            Self::None => write!(f, "None"),
            Self::Struct(name) | Self::Enum(name) => write!(f, "{}", name),
            Self::List(elem) => write!(f, "list[{}]", elem),
            Self::Dict(key, value) => write!(f, "dict[{}, {}]", key, value),
            Self::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "function({}) -> {}", params.join(", "), ret)
            }
            Self::Unknown => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(Type::Float.accepts(&Type::Int));
        assert!(!Type::Int.accepts(&Type::Float));
        assert!(Type::list(Type::Int).accepts(&Type::list(Type::Unknown)));
        assert!(!Type::list(Type::Int).accepts(&Type::list(Type::Str)));
        assert!(Type::Struct("Point".into()).accepts(&Type::Struct("Point".into())));
        assert!(!Type::Struct("Point".into()).accepts(&Type::Enum("Point".into())));
        assert!(Type::Str.accepts(&Type::Unknown));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::dict(Type::Str, Type::list(Type::Int)).to_string(), "dict[str, list[int]]");
        assert_eq!(Type::Unknown.to_string(), "any");
    }
}
