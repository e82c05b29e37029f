//! Constant folding for Snake
//!
//! Reduces constant initializers built only from literals and other folded
//! constants to a single literal, and reorders the constant declarations so
//! every constant follows the constants it reads.

use std::collections::HashMap;

use log::debug;

use crate::frontend::ast::*;
use crate::utils::{Error, Result, Span};

/// Longest string a `str * int` fold may produce
const MAX_FOLDED_STR: usize = 4096;

/// Summary of a folding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Number of constant declarations seen
    pub constants: usize,
    /// Initializers reduced to a literal by this run
    pub folded: usize,
    /// Whether declarations were moved into dependency order
    pub reordered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

/// Folds constant initializers at compile time
pub struct ConstantFolding {
    /// Values of constants folded so far
    values: HashMap<String, Literal>,
}

impl ConstantFolding {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Fold every constant of the program
    pub fn run(&mut self, program: &mut Program) -> Result<FoldStats> {
        let slots: Vec<usize> = program
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| matches!(item, Item::Const(_)))
            .map(|(index, _)| index)
            .collect();

        let consts: Vec<&ConstDecl> = slots
            .iter()
            .filter_map(|&slot| match &program.items[slot] {
                Item::Const(decl) => Some(decl),
                _ => None,
            })
            .collect();
        let order = dependency_order(&consts)?;

        let mut stats = FoldStats {
            constants: slots.len(),
            folded: 0,
            reordered: order.iter().enumerate().any(|(pos, &index)| pos != index),
        };

        // Move the declarations into dependency order, reusing their slots
        let mut taken: Vec<Option<Item>> = slots
            .iter()
            .map(|&slot| {
                let placeholder = Item::Stmt(Stmt::Pass { span: Span::dummy() });
                Some(std::mem::replace(&mut program.items[slot], placeholder))
            })
            .collect();
        for (&slot, &index) in slots.iter().zip(&order) {
            if let Some(item) = taken[index].take() {
                program.items[slot] = item;
            }
        }

        for &slot in &slots {
            if let Item::Const(decl) = &mut program.items[slot] {
                if self.fold_const(decl) {
                    stats.folded += 1;
                }
            }
        }

        debug!(
            "folded {} of {} constants{}",
            stats.folded,
            stats.constants,
            if stats.reordered { " (reordered)" } else { "" }
        );
        Ok(stats)
    }

    /// Fold one declaration; returns whether its initializer changed
    fn fold_const(&mut self, decl: &mut ConstDecl) -> bool {
        let Some(value) = self.eval(&decl.value) else {
            return false;
        };
        let Some(value) = coerce(value, &decl.ty.kind) else {
            return false;
        };

        self.values.insert(decl.name.name.clone(), value.clone());
        if decl.value.as_literal() == Some(&value) {
            return false;
        }

        debug!("constant {} folded to {:?}", decl.name.name, value);
        let mut folded = Expr::new(ExprKind::Literal(value.clone()), decl.value.span);
        folded.ty = Some(value.ty());
        decl.value = folded;
        true
    }

    /// Evaluate an expression made only of literals and folded constants
    fn eval(&self, expr: &Expr) -> Option<Literal> {
        match &expr.kind {
            ExprKind::Literal(lit) => Some(lit.clone()),
            ExprKind::Ident(name) => self.values.get(name).cloned(),
            ExprKind::Binary { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Self::fold_binop(*op, &left, &right)
            }
            ExprKind::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                let mut holds = true;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    let Literal::Bool(pair) = Self::fold_binop(*op, &left, &right)? else {
                        return None;
                    };
                    holds &= pair;
                    left = right;
                }
                Some(Literal::Bool(holds))
            }
            ExprKind::Unary { op, expr } => Self::fold_unop(*op, &self.eval(expr)?),
            _ => None,
        }
    }

    fn fold_binop(op: BinOp, left: &Literal, right: &Literal) -> Option<Literal> {
        match (left, right) {
            (Literal::Int(l), Literal::Int(r)) => fold_int(op, *l, *r),
            (Literal::Int(_) | Literal::Float(_), Literal::Int(_) | Literal::Float(_)) => {
                fold_float(op, as_float(left)?, as_float(right)?)
            }
            (Literal::Str(l), Literal::Str(r)) => {
                let result = match op {
                    BinOp::Add => return Some(Literal::Str(format!("{}{}", l, r))),
                    BinOp::Eq => l == r,
                    BinOp::Ne => l != r,
                    BinOp::Lt => l < r,
                    BinOp::Le => l <= r,
                    BinOp::Gt => l > r,
                    BinOp::Ge => l >= r,
                    _ => return None,
                };
                Some(Literal::Bool(result))
            }
            (Literal::Str(s), Literal::Int(n)) | (Literal::Int(n), Literal::Str(s)) if op == BinOp::Mul => {
                let count = usize::try_from(*n).unwrap_or(0);
                if s.len().saturating_mul(count) > MAX_FOLDED_STR {
                    return None;
                }
                Some(Literal::Str(s.repeat(count)))
            }
            (Literal::Bool(l), Literal::Bool(r)) => {
                let result = match op {
                    BinOp::And => *l && *r,
                    BinOp::Or => *l || *r,
                    BinOp::Eq => l == r,
                    BinOp::Ne => l != r,
                    _ => return None,
                };
                Some(Literal::Bool(result))
            }
            _ => None,
        }
    }

    fn fold_unop(op: UnOp, operand: &Literal) -> Option<Literal> {
        match (op, operand) {
            (UnOp::Neg, Literal::Int(n)) => n.checked_neg().map(Literal::Int),
            (UnOp::Neg, Literal::Float(f)) => Some(Literal::Float(-f)),
            (UnOp::Pos, Literal::Int(_) | Literal::Float(_)) => Some(operand.clone()),
            (UnOp::Not, Literal::Bool(b)) => Some(Literal::Bool(!b)),
            _ => None,
        }
    }
}

impl Default for ConstantFolding {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold the program's constants and put them in dependency order
pub fn fold(program: &mut Program) -> Result<FoldStats> {
    ConstantFolding::new().run(program)
}

/// Integer arithmetic with host semantics; overflow and division by zero
/// stay unfolded
fn fold_int(op: BinOp, l: i64, r: i64) -> Option<Literal> {
    let result = match op {
        BinOp::Add => l.checked_add(r)?,
        BinOp::Sub => l.checked_sub(r)?,
        BinOp::Mul => l.checked_mul(r)?,
        BinOp::Div => {
            if r == 0 {
                return None;
            }
            return Some(Literal::Float(l as f64 / r as f64));
        }
        BinOp::FloorDiv => {
            let q = l.checked_div(r)?;
            if l % r != 0 && (l < 0) != (r < 0) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Mod => {
            let m = l.checked_rem(r)?;
            if m != 0 && (m < 0) != (r < 0) {
                m + r
            } else {
                m
            }
        }
        BinOp::Pow => {
            if r < 0 {
                return fold_float(op, l as f64, r as f64);
            }
            l.checked_pow(u32::try_from(r).ok()?)?
        }
        BinOp::Eq => return Some(Literal::Bool(l == r)),
        BinOp::Ne => return Some(Literal::Bool(l != r)),
        BinOp::Lt => return Some(Literal::Bool(l < r)),
        BinOp::Le => return Some(Literal::Bool(l <= r)),
        BinOp::Gt => return Some(Literal::Bool(l > r)),
        BinOp::Ge => return Some(Literal::Bool(l >= r)),
        _ => return None,
    };
    Some(Literal::Int(result))
}

fn fold_float(op: BinOp, l: f64, r: f64) -> Option<Literal> {
    let result = match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div if r != 0.0 => l / r,
        BinOp::FloorDiv if r != 0.0 => (l / r).floor(),
        BinOp::Mod if r != 0.0 => {
            let m = l % r;
            if m != 0.0 && (m < 0.0) != (r < 0.0) {
                m + r
            } else {
                m
            }
        }
        // A negative base with a fractional exponent is complex on the host
        BinOp::Pow if l >= 0.0 || r.fract() == 0.0 => l.powf(r),
        BinOp::Eq => return Some(Literal::Bool(l == r)),
        BinOp::Ne => return Some(Literal::Bool(l != r)),
        BinOp::Lt => return Some(Literal::Bool(l < r)),
        BinOp::Le => return Some(Literal::Bool(l <= r)),
        BinOp::Gt => return Some(Literal::Bool(l > r)),
        BinOp::Ge => return Some(Literal::Bool(l >= r)),
        _ => return None,
    };
    result.is_finite().then_some(Literal::Float(result))
}

fn as_float(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Int(n) => Some(*n as f64),
        Literal::Float(f) => Some(*f),
        _ => None,
    }
}

/// Fit a folded value to the declared type, widening `int` to `float`
fn coerce(value: Literal, declared: &TypeExprKind) -> Option<Literal> {
    match (declared, value) {
        (TypeExprKind::Int, value @ Literal::Int(_))
        | (TypeExprKind::Float, value @ Literal::Float(_))
        | (TypeExprKind::Str, value @ Literal::Str(_))
        | (TypeExprKind::Bool, value @ Literal::Bool(_)) => Some(value),
        (TypeExprKind::Float, Literal::Int(n)) => Some(Literal::Float(n as f64)),
        _ => None,
    }
}

/// Indices of the constants an initializer reads
fn collect_refs(expr: &Expr, known: &HashMap<&str, usize>, out: &mut Vec<usize>) {
    match &expr.kind {
        ExprKind::Ident(name) => {
            if let Some(&index) = known.get(name.as_str()) {
                out.push(index);
            }
        }
        ExprKind::Literal(_) => {}
        ExprKind::FString(parts) => {
            for part in parts {
                if let FStringPart::Expr { expr, .. } = part {
                    collect_refs(expr, known, out);
                }
            }
        }
        ExprKind::Binary { left, right, .. } => {
            collect_refs(left, known, out);
            collect_refs(right, known, out);
        }
        ExprKind::Compare { first, rest } => {
            collect_refs(first, known, out);
            for (_, operand) in rest {
                collect_refs(operand, known, out);
            }
        }
        ExprKind::Unary { expr, .. } | ExprKind::Field { expr, .. } => collect_refs(expr, known, out),
        ExprKind::Call { func, args, kwargs } => {
            collect_refs(func, known, out);
            for arg in args.iter().chain(kwargs.iter().map(|(_, value)| value)) {
                collect_refs(arg, known, out);
            }
        }
        ExprKind::Index { expr, index } => {
            collect_refs(expr, known, out);
            collect_refs(index, known, out);
        }
        ExprKind::Slice { expr, lower, upper } => {
            collect_refs(expr, known, out);
            for bound in lower.iter().chain(upper.iter()) {
                collect_refs(bound, known, out);
            }
        }
        ExprKind::List(elems) => {
            for elem in elems {
                collect_refs(elem, known, out);
            }
        }
        ExprKind::Dict(entries) => {
            for (key, value) in entries {
                collect_refs(key, known, out);
                collect_refs(value, known, out);
            }
        }
        ExprKind::Fallback { primary, default } => {
            collect_refs(primary, known, out);
            collect_refs(default, known, out);
        }
    }
}

/// Topological order of the constants (indices into `consts`); source order
/// is kept wherever dependencies allow.
fn dependency_order(consts: &[&ConstDecl]) -> Result<Vec<usize>> {
    let mut known: HashMap<&str, usize> = HashMap::new();
    for (index, decl) in consts.iter().enumerate() {
        known.entry(decl.name.name.as_str()).or_insert(index);
    }

    let deps: Vec<Vec<usize>> = consts
        .iter()
        .map(|decl| {
            let mut refs = Vec::new();
            collect_refs(&decl.value, &known, &mut refs);
            refs
        })
        .collect();

    let mut marks = vec![Mark::New; consts.len()];
    let mut order = Vec::with_capacity(consts.len());
    let mut path = Vec::new();
    for index in 0..consts.len() {
        visit_const(index, consts, &deps, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit_const(
    index: usize,
    consts: &[&ConstDecl],
    deps: &[Vec<usize>],
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<()> {
    match marks[index] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            let start = path.iter().position(|&i| i == index).unwrap_or(0);
            let mut chain: Vec<&str> = path[start..]
                .iter()
                .map(|&i| consts[i].name.name.as_str())
                .collect();
            chain.push(consts[index].name.name.as_str());
            return Err(Error::ConstantCycle {
                chain: chain.join(" -> "),
                span: consts[path[start]].name.span,
            });
        }
        Mark::New => {}
    }

    marks[index] = Mark::Active;
    path.push(index);
    for &dep in &deps[index] {
        visit_const(dep, consts, deps, marks, path, order)?;
    }
    path.pop();
    marks[index] = Mark::Done;
    order.push(index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse_source;

    fn folded(source: &str) -> (Program, FoldStats) {
        let mut program = parse_source(source, 0).unwrap();
        let stats = fold(&mut program).unwrap();
        (program, stats)
    }

    fn consts(program: &Program) -> Vec<(String, Option<Literal>)> {
        program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Const(decl) => Some((decl.name.name.clone(), decl.value.as_literal().cloned())),
                _ => None,
            })
            .collect()
    }

    fn value_of(source: &str) -> Option<Literal> {
        let (program, _) = folded(source);
        consts(&program).pop().and_then(|(_, value)| value)
    }

    #[test]
    fn test_forward_dependency_is_reordered() {
        let (program, stats) = folded("const B: int = A * 2;\nconst A: int = 3;\n");
        assert_eq!(
            consts(&program),
            vec![("A".to_string(), Some(Literal::Int(3))), ("B".to_string(), Some(Literal::Int(6)))]
        );
        assert_eq!(stats, FoldStats { constants: 2, folded: 1, reordered: true });
    }

    #[test]
    fn test_host_division_semantics() {
        assert_eq!(value_of("const X: int = -7 // 2;"), Some(Literal::Int(-4)));
        assert_eq!(value_of("const X: int = -7 % 2;"), Some(Literal::Int(1)));
        assert_eq!(value_of("const X: int = 7 % -2;"), Some(Literal::Int(-1)));
        assert_eq!(value_of("const X: float = -7.5 // 2.0;"), Some(Literal::Float(-4.0)));
        assert_eq!(value_of("const X: float = -1.0 % 3;"), Some(Literal::Float(2.0)));
        assert_eq!(value_of("const X: float = 1 / 2;"), Some(Literal::Float(0.5)));
        assert_eq!(value_of("const X: int = 2 ** 10;"), Some(Literal::Int(1024)));
    }

    #[test]
    fn test_int_result_widens_into_float_constant() {
        assert_eq!(value_of("const X: float = 2 * 3;"), Some(Literal::Float(6.0)));
        assert_eq!(value_of("const PI: float = 3.14;\nconst TAU: float = PI * 2;"), Some(Literal::Float(6.28)));
    }

    #[test]
    fn test_unfoldable_stays_runtime() {
        assert_eq!(value_of("const X: int = 1 // 0;"), None);
        assert_eq!(value_of("const X: int = 9223372036854775807 + 1;"), None);
        assert_eq!(value_of("const N: int = len(\"abc\");\nconst M: int = N + 1;"), None);
        assert_eq!(value_of("const S: str = 1 + 2;"), None);
    }

    #[test]
    fn test_strings_and_booleans() {
        assert_eq!(value_of("const S: str = \"ab\" + \"c\";"), Some(Literal::Str("abc".into())));
        assert_eq!(value_of("const S: str = \"-\" * 3;"), Some(Literal::Str("---".into())));
        assert_eq!(value_of("const B: bool = 1 < 2 && !False;"), Some(Literal::Bool(true)));
        assert_eq!(value_of("const B: bool = \"a\" == \"b\" or 2.0 >= 2;"), Some(Literal::Bool(true)));
        assert_eq!(value_of("const N: int = -(3 - 5);"), Some(Literal::Int(2)));
    }

    #[test]
    fn test_comparison_chain() {
        assert_eq!(value_of("const A: int = 3;\nconst B: bool = 0 < A < 10;"), Some(Literal::Bool(true)));
        assert_eq!(value_of("const B: bool = 1 < 3 < 2;"), Some(Literal::Bool(false)));
        assert_eq!(value_of("const B: bool = 1 < 3 > 2.5;"), Some(Literal::Bool(true)));
    }

    #[test]
    fn test_constant_cycle() {
        let mut program = parse_source("const A: int = B + 1;\nconst B: int = A;\n", 0).unwrap();
        let err = fold(&mut program).unwrap_err();
        assert_eq!(err.kind(), "ConstantCycle");
        assert_eq!(err.to_string(), "Constant cycle detected: A -> B -> A");

        let mut program = parse_source("const A: int = A + 1;\n", 0).unwrap();
        let err = fold(&mut program).unwrap_err();
        assert_eq!(err.to_string(), "Constant cycle detected: A -> A");
    }

    #[test]
    fn test_folding_is_idempotent() {
        let source = "x: int = 1;\nconst C: int = B + A;\nconst A: int = 1;\ndef f() -> None:\n    pass;\nconst B: int = A * 10;\n";
        let (mut program, stats) = folded(source);
        let first = consts(&program);
        assert_eq!(first.last(), Some(&("C".to_string(), Some(Literal::Int(11)))));
        assert!(stats.reordered);
        assert!(matches!(program.items[0], Item::Stmt(_)));
        assert!(matches!(program.items[3], Item::Function(_)));

        let again = fold(&mut program).unwrap();
        assert_eq!(consts(&program), first);
        assert_eq!(again, FoldStats { constants: 3, folded: 0, reordered: false });
    }
}
