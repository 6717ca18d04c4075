//! Constant folding (§4.5.2): literal arithmetic/comparison/boolean
//! evaluation plus a fixed set of algebraic identities. Runs bottom-up, so
//! by the time a `BinOp`/`UnOp` node is visited its operands have already
//! been folded as far as possible.
//!
//! JS numbers are f64-backed, so an `Int` result that would no longer
//! round-trip through a JS `number` (outside `±2^53`) is left unfolded --
//! folding it would bake in a value the eventual codegen couldn't represent
//! faithfully. The same caution applies to float results: NaN, ±Infinity
//! and -0.0 are never produced by a fold, since those are exactly the
//! results most likely to surprise a reader who only sees the folded
//! constant and not the original expression.

use crate::core::{CoreBinOp, CoreExpr, CoreLiteral, CoreUnOp};
use crate::types::Type;

use super::purity::is_pure;

const JS_MAX_SAFE_INT: i64 = 9_007_199_254_740_991;
const JS_MIN_SAFE_INT: i64 = -9_007_199_254_740_991;

pub struct FoldStats {
    pub folds: usize,
}

pub fn fold_expr(expr: &CoreExpr<Type>, stats: &mut FoldStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::BinOp { op, left, right, info, location } => {
            let left = fold_expr(left, stats);
            let right = fold_expr(right, stats);
            match fold_binop(*op, &left, &right, info) {
                Some(folded) => {
                    stats.folds += 1;
                    folded
                }
                None => CoreExpr::BinOp { op: *op, left: Box::new(left), right: Box::new(right), info: info.clone(), location: location.clone() },
            }
        }
        CoreExpr::UnOp { op, operand, info, location } => {
            let operand = fold_expr(operand, stats);
            match fold_unop(*op, &operand, info) {
                Some(folded) => {
                    stats.folds += 1;
                    folded
                }
                None => CoreExpr::UnOp { op: *op, operand: Box::new(operand), info: info.clone(), location: location.clone() },
            }
        }
        CoreExpr::Lambda { param, param_name, body, info, location } => CoreExpr::Lambda {
            param: *param,
            param_name: param_name.clone(),
            body: Box::new(fold_expr(body, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(fold_expr(func, stats)),
            arg: Box::new(fold_expr(arg, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => CoreExpr::Let {
            binder: *binder,
            name: name.clone(),
            mutable: *mutable,
            value: Box::new(fold_expr(value, stats)),
            body: Box::new(fold_expr(body, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, info, location } => CoreExpr::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), fold_expr(v, stats))).collect(),
            body: Box::new(fold_expr(body, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Match { scrutinee, cases, info, location } => CoreExpr::Match {
            scrutinee: Box::new(fold_expr(scrutinee, stats)),
            cases: cases
                .iter()
                .map(|case| crate::core::CoreMatchCase {
                    pattern: case.pattern.clone(),
                    guard: case.guard.as_ref().map(|g| fold_expr(g, stats)),
                    body: fold_expr(&case.body, stats),
                    location: case.location.clone(),
                })
                .collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => CoreExpr::Tuple(items.iter().map(|i| fold_expr(i, stats)).collect(), info.clone(), loc.clone()),
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), fold_expr(v, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(fold_expr(base, stats)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(fold_expr(base, stats)),
            fields: fields.iter().map(|(n, v)| (n.clone(), fold_expr(v, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => CoreExpr::RefNew(Box::new(fold_expr(inner, stats)), info.clone(), loc.clone()),
        // Opaque to every pass: nothing inside an `unsafe` block is folded,
        // inlined, or reordered (see `CoreExpr::Unsafe`'s doc comment).
        CoreExpr::Unsafe(..) => expr.clone(),
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(fold_expr(inner, stats)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) => expr.clone(),
    }
}

fn int_in_range(v: i64) -> bool {
    (JS_MIN_SAFE_INT..=JS_MAX_SAFE_INT).contains(&v)
}

fn float_is_presentable(v: f64) -> bool {
    v.is_finite() && v != 0.0 || v == 0.0 && !v.is_sign_negative()
}

fn lit_loc(expr: &CoreExpr<Type>) -> crate::lexer::token::Location {
    expr.location().clone()
}

fn fold_binop(op: CoreBinOp, left: &CoreExpr<Type>, right: &CoreExpr<Type>, info: &Type) -> Option<CoreExpr<Type>> {
    if let (CoreExpr::Literal(l, _, _), CoreExpr::Literal(r, _, _)) = (left, right) {
        if let Some(folded) = fold_literal_binop(op, l, r) {
            return Some(CoreExpr::Literal(folded, info.clone(), lit_loc(left)));
        }
    }
    fold_binop_identity(op, left, right, info)
}

fn fold_literal_binop(op: CoreBinOp, l: &CoreLiteral, r: &CoreLiteral) -> Option<CoreLiteral> {
    use CoreLiteral::*;
    match (op, l, r) {
        (CoreBinOp::Add, Int(a), Int(b)) => a.checked_add(*b).filter(|v| int_in_range(*v)).map(Int),
        (CoreBinOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).filter(|v| int_in_range(*v)).map(Int),
        (CoreBinOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).filter(|v| int_in_range(*v)).map(Int),
        (CoreBinOp::Div, Int(a), Int(b)) if *b != 0 => a.checked_div(*b).filter(|v| int_in_range(*v)).map(Int),
        (CoreBinOp::Mod, Int(a), Int(b)) if *b != 0 => a.checked_rem(*b).filter(|v| int_in_range(*v)).map(Int),

        (CoreBinOp::Add, Float(a), Float(b)) => fold_float(a + b),
        (CoreBinOp::Sub, Float(a), Float(b)) => fold_float(a - b),
        (CoreBinOp::Mul, Float(a), Float(b)) => fold_float(a * b),
        (CoreBinOp::Div, Float(a), Float(b)) if *b != 0.0 => fold_float(a / b),

        (CoreBinOp::Concat, Str(a), Str(b)) => Some(Str(format!("{a}{b}"))),

        (CoreBinOp::Eq, Int(a), Int(b)) => Some(Bool(a == b)),
        (CoreBinOp::NotEq, Int(a), Int(b)) => Some(Bool(a != b)),
        (CoreBinOp::Lt, Int(a), Int(b)) => Some(Bool(a < b)),
        (CoreBinOp::Le, Int(a), Int(b)) => Some(Bool(a <= b)),
        (CoreBinOp::Gt, Int(a), Int(b)) => Some(Bool(a > b)),
        (CoreBinOp::Ge, Int(a), Int(b)) => Some(Bool(a >= b)),

        (CoreBinOp::Eq, Bool(a), Bool(b)) => Some(Bool(a == b)),
        (CoreBinOp::NotEq, Bool(a), Bool(b)) => Some(Bool(a != b)),
        (CoreBinOp::And, Bool(a), Bool(b)) => Some(Bool(*a && *b)),
        (CoreBinOp::Or, Bool(a), Bool(b)) => Some(Bool(*a || *b)),

        (CoreBinOp::Eq, Str(a), Str(b)) => Some(Bool(a == b)),
        (CoreBinOp::NotEq, Str(a), Str(b)) => Some(Bool(a != b)),

        (CoreBinOp::Eq, Unit, Unit) => Some(Bool(true)),
        (CoreBinOp::NotEq, Unit, Unit) => Some(Bool(false)),

        _ => None,
    }
}

fn fold_float(v: f64) -> Option<CoreLiteral> {
    float_is_presentable(v).then_some(CoreLiteral::Float(v))
}

/// Identities that apply even when one side isn't a literal: `x + 0`,
/// `x * 1`, `x || true` (when `x` is pure, since a non-literal side might
/// still need to run for its effects even though its *value* is discarded).
fn fold_binop_identity(op: CoreBinOp, left: &CoreExpr<Type>, right: &CoreExpr<Type>, _info: &Type) -> Option<CoreExpr<Type>> {
    let left_zero = matches!(left, CoreExpr::Literal(CoreLiteral::Int(0), ..) | CoreExpr::Literal(CoreLiteral::Float(f), ..) if *f == 0.0);
    let right_zero = matches!(right, CoreExpr::Literal(CoreLiteral::Int(0), ..) | CoreExpr::Literal(CoreLiteral::Float(f), ..) if *f == 0.0);
    let left_one = matches!(left, CoreExpr::Literal(CoreLiteral::Int(1), ..) | CoreExpr::Literal(CoreLiteral::Float(f), ..) if *f == 1.0);
    let right_one = matches!(right, CoreExpr::Literal(CoreLiteral::Int(1), ..) | CoreExpr::Literal(CoreLiteral::Float(f), ..) if *f == 1.0);
    let left_true = matches!(left, CoreExpr::Literal(CoreLiteral::Bool(true), ..));
    let right_true = matches!(right, CoreExpr::Literal(CoreLiteral::Bool(true), ..));
    let left_false = matches!(left, CoreExpr::Literal(CoreLiteral::Bool(false), ..));
    let right_false = matches!(right, CoreExpr::Literal(CoreLiteral::Bool(false), ..));

    match op {
        CoreBinOp::Add if right_zero => Some(left.clone()),
        CoreBinOp::Add if left_zero => Some(right.clone()),
        CoreBinOp::Sub if right_zero => Some(left.clone()),
        CoreBinOp::Mul if right_one => Some(left.clone()),
        CoreBinOp::Mul if left_one => Some(right.clone()),
        CoreBinOp::Div if right_one => Some(left.clone()),
        CoreBinOp::Mul if right_zero && is_pure(left) => Some(right.clone()),
        CoreBinOp::Mul if left_zero && is_pure(right) => Some(left.clone()),
        CoreBinOp::And if right_true => Some(left.clone()),
        CoreBinOp::And if left_true => Some(right.clone()),
        CoreBinOp::Or if right_false => Some(left.clone()),
        CoreBinOp::Or if left_false => Some(right.clone()),
        CoreBinOp::Or if right_true && is_pure(left) => Some(right.clone()),
        CoreBinOp::Or if left_true && is_pure(right) => Some(left.clone()),
        CoreBinOp::And if right_false && is_pure(left) => Some(right.clone()),
        CoreBinOp::And if left_false && is_pure(right) => Some(left.clone()),
        _ => None,
    }
}

fn fold_unop(op: CoreUnOp, operand: &CoreExpr<Type>, info: &Type) -> Option<CoreExpr<Type>> {
    if let CoreExpr::Literal(lit, _, _) = operand {
        match (op, lit) {
            (CoreUnOp::Neg, CoreLiteral::Int(v)) => v.checked_neg().filter(|v| int_in_range(*v)).map(|v| CoreExpr::Literal(CoreLiteral::Int(v), info.clone(), lit_loc(operand))),
            (CoreUnOp::Neg, CoreLiteral::Float(v)) => fold_float(-v).map(|l| CoreExpr::Literal(l, info.clone(), lit_loc(operand))),
            _ => None,
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Location;

    fn loc() -> Location {
        Location::default()
    }

    fn int(v: i64) -> CoreExpr<Type> {
        CoreExpr::Literal(CoreLiteral::Int(v), Type::Int, loc())
    }

    #[test]
    fn test_fold_int_add() {
        let mut stats = FoldStats { folds: 0 };
        let expr = CoreExpr::BinOp { op: CoreBinOp::Add, left: Box::new(int(2)), right: Box::new(int(3)), info: Type::Int, location: loc() };
        let folded = fold_expr(&expr, &mut stats);
        assert_eq!(folded, int(5));
        assert_eq!(stats.folds, 1);
    }

    #[test]
    fn test_fold_never_divides_by_zero() {
        let mut stats = FoldStats { folds: 0 };
        let expr = CoreExpr::BinOp { op: CoreBinOp::Div, left: Box::new(int(1)), right: Box::new(int(0)), info: Type::Int, location: loc() };
        let folded = fold_expr(&expr, &mut stats);
        assert_eq!(stats.folds, 0);
        assert!(matches!(folded, CoreExpr::BinOp { .. }));
    }

    #[test]
    fn test_fold_add_zero_identity() {
        let mut stats = FoldStats { folds: 0 };
        let v = CoreExpr::Var(crate::core::BinderId(0), "x".into(), Type::Int, loc());
        let expr = CoreExpr::BinOp { op: CoreBinOp::Add, left: Box::new(v.clone()), right: Box::new(int(0)), info: Type::Int, location: loc() };
        let folded = fold_expr(&expr, &mut stats);
        assert_eq!(folded, v);
    }
}
