//! β-reduction, η-reduction and cost-bounded inlining (§4.5.3).
//!
//! β-reduction fires immediately wherever an `Application` wraps a literal
//! `Lambda` (no indirection through a `let`-bound name) and either the
//! argument is pure or the parameter is used at most once -- duplicating a
//! pure argument can't be observed, and an argument used once doesn't get
//! duplicated regardless of purity.
//!
//! Inlining is the same substitution applied at a `Let`/`LetRec` use site:
//! a pass-global cost budget (`O1` = 20 nodes, `O2` = 50, see
//! [`super::OptLevel`]) keeps it from blowing up the tree, with an
//! unconditional allowance for bindings used exactly once (inlining those
//! can only shrink the tree). Recursive bindings, externals, and anything
//! that closes over `unsafe`/`ref` are never inlined, since duplicating them
//! could change how many times a side effect runs.

use crate::core::{BinderId, CoreExpr};
use crate::types::Type;

use super::purity::{count_uses, free_vars, is_pure};
use super::subst::substitute;
use super::PassContext;

pub struct ReduceStats {
    pub beta: usize,
    pub eta: usize,
    pub inlines: usize,
}

/// Body AST size, used by the cost model. Mirrors [`super::ast_size`] but
/// lives here too so `reduce` doesn't need a cyclic `use` back into `mod.rs`.
fn size<T>(expr: &CoreExpr<T>) -> usize {
    super::ast_size_expr(expr)
}

pub fn reduce_expr(expr: &CoreExpr<Type>, ctx: &PassContext, inline_threshold: usize, stats: &mut ReduceStats) -> CoreExpr<Type> {
    let expr = reduce_children(expr, ctx, inline_threshold, stats);
    match &expr {
        CoreExpr::Application { func, arg, .. } => {
            if let CoreExpr::Lambda { param, body, .. } = func.as_ref() {
                if is_pure(arg) || count_uses(*param, body) <= 1 {
                    stats.beta += 1;
                    return reduce_expr(&substitute(body, *param, arg, &ctx.binder_gen), ctx, inline_threshold, stats);
                }
            }
            expr
        }
        CoreExpr::Lambda { param, body, .. } => {
            // η-reduction: `(p) => f(p)` collapses to `f` when `p` is not
            // free in `f` and `f` is a value (not itself effectful to
            // evaluate), matching "f is a pure value, not re-evaluated" in §4.5.3.
            if let CoreExpr::Application { func, arg, .. } = body.as_ref() {
                if let CoreExpr::Var(arg_binder, ..) = arg.as_ref() {
                    if arg_binder == param && !free_vars(func).contains(param) && is_pure(func) {
                        stats.eta += 1;
                        return (**func).clone();
                    }
                }
            }
            expr
        }
        CoreExpr::Let { binder, value, body, .. } => try_inline_let(*binder, value, body, &expr, ctx, inline_threshold, stats),
        _ => expr,
    }
}

fn try_inline_let(
    binder: BinderId,
    value: &CoreExpr<Type>,
    body: &CoreExpr<Type>,
    original: &CoreExpr<Type>,
    ctx: &PassContext,
    inline_threshold: usize,
    stats: &mut ReduceStats,
) -> CoreExpr<Type> {
    if !is_inlinable_value(value) {
        return original.clone();
    }
    let uses = count_uses(binder, body);
    if uses == 0 {
        return original.clone();
    }
    let within_budget = size(value) < inline_threshold;
    if uses == 1 || within_budget {
        stats.inlines += 1;
        return reduce_expr(&substitute(body, binder, value, &ctx.binder_gen), ctx, inline_threshold, stats);
    }
    original.clone()
}

/// Conservative inlining eligibility: never a `Lambda` that recurses on its
/// own binder, never something built from `unsafe`/ref/external, since those
/// could change the number of times a side effect executes if duplicated.
fn is_inlinable_value(value: &CoreExpr<Type>) -> bool {
    is_pure(value)
}

fn reduce_children(expr: &CoreExpr<Type>, ctx: &PassContext, inline_threshold: usize, stats: &mut ReduceStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) => expr.clone(),
        CoreExpr::Lambda { param, param_name, body, info, location } => CoreExpr::Lambda {
            param: *param,
            param_name: param_name.clone(),
            body: Box::new(reduce_expr(body, ctx, inline_threshold, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(reduce_expr(func, ctx, inline_threshold, stats)),
            arg: Box::new(reduce_expr(arg, ctx, inline_threshold, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => CoreExpr::Let {
            binder: *binder,
            name: name.clone(),
            mutable: *mutable,
            value: Box::new(reduce_expr(value, ctx, inline_threshold, stats)),
            body: Box::new(reduce_expr(body, ctx, inline_threshold, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, info, location } => CoreExpr::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), reduce_expr(v, ctx, inline_threshold, stats))).collect(),
            body: Box::new(reduce_expr(body, ctx, inline_threshold, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Match { scrutinee, cases, info, location } => CoreExpr::Match {
            scrutinee: Box::new(reduce_expr(scrutinee, ctx, inline_threshold, stats)),
            cases: cases
                .iter()
                .map(|case| crate::core::CoreMatchCase {
                    pattern: case.pattern.clone(),
                    guard: case.guard.as_ref().map(|g| reduce_expr(g, ctx, inline_threshold, stats)),
                    body: reduce_expr(&case.body, ctx, inline_threshold, stats),
                    location: case.location.clone(),
                })
                .collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, info, location } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(reduce_expr(left, ctx, inline_threshold, stats)),
            right: Box::new(reduce_expr(right, ctx, inline_threshold, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, info, location } => CoreExpr::UnOp {
            op: *op,
            operand: Box::new(reduce_expr(operand, ctx, inline_threshold, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => {
            CoreExpr::Tuple(items.iter().map(|i| reduce_expr(i, ctx, inline_threshold, stats)).collect(), info.clone(), loc.clone())
        }
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), reduce_expr(v, ctx, inline_threshold, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(reduce_expr(base, ctx, inline_threshold, stats)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(reduce_expr(base, ctx, inline_threshold, stats)),
            fields: fields.iter().map(|(n, v)| (n.clone(), reduce_expr(v, ctx, inline_threshold, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => CoreExpr::RefNew(Box::new(reduce_expr(inner, ctx, inline_threshold, stats)), info.clone(), loc.clone()),
        CoreExpr::Unsafe(inner, info, loc) => CoreExpr::Unsafe(Box::new(inner.as_ref().clone()), info.clone(), loc.clone()),
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(reduce_expr(inner, ctx, inline_threshold, stats)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::BinderIdGen;
    use crate::core::{BinderId, CoreLiteral};
    use crate::lexer::token::Location;

    fn loc() -> Location {
        Location::default()
    }

    fn ctx() -> PassContext {
        PassContext { binder_gen: BinderIdGen::starting_at(1000) }
    }

    #[test]
    fn test_beta_reduces_immediate_application() {
        let param = BinderId(0);
        let lambda = CoreExpr::Lambda {
            param,
            param_name: "x".into(),
            body: Box::new(CoreExpr::Var(param, "x".into(), Type::Int, loc())),
            info: Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
            location: loc(),
        };
        let app = CoreExpr::Application {
            func: Box::new(lambda),
            arg: Box::new(CoreExpr::Literal(CoreLiteral::Int(7), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let mut stats = ReduceStats { beta: 0, eta: 0, inlines: 0 };
        let result = reduce_expr(&app, &ctx(), 20, &mut stats);
        assert_eq!(result, CoreExpr::Literal(CoreLiteral::Int(7), Type::Int, loc()));
        assert_eq!(stats.beta, 1);
    }

    #[test]
    fn test_single_use_let_inlines() {
        let binder = BinderId(0);
        let expr = CoreExpr::Let {
            binder,
            name: "x".into(),
            mutable: false,
            value: Box::new(CoreExpr::Literal(CoreLiteral::Int(3), Type::Int, loc())),
            body: Box::new(CoreExpr::Var(binder, "x".into(), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let mut stats = ReduceStats { beta: 0, eta: 0, inlines: 0 };
        let result = reduce_expr(&expr, &ctx(), 20, &mut stats);
        assert_eq!(result, CoreExpr::Literal(CoreLiteral::Int(3), Type::Int, loc()));
        assert_eq!(stats.inlines, 1);
    }
}
