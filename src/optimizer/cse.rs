//! Common subexpression elimination (§4.5.6), deliberately scoped down from
//! a general dominance-based hoist: rather than tracking availability across
//! arbitrary control flow, this pass only looks at two local shapes where
//! duplication is easy to prove and easy to fix --
//!
//! 1. A `let`-chain: if `let y = e in body` binds `e` again (structurally)
//!    to what an enclosing `let x = e in ...` already bound, `y`'s uses are
//!    rewritten to `x` and the inner `let` folds away to a plain
//!    substitution.
//! 2. Sibling subterms: the immediate children of a `BinOp`/`Application`/
//!    `Tuple`/`Record` node that are structurally identical and pure are
//!    deduplicated by introducing one `let` above the node and rewriting
//!    both children to read it.
//!
//! A full hoist across branches or loop bodies is out of scope; see
//! `DESIGN.md` for why this is an intentional limitation rather than an
//! oversight.

use std::collections::HashMap;

use crate::core::{BinderId, CoreExpr};
use crate::types::Type;

use super::fingerprint;
use super::purity::is_pure;
use super::subst::substitute;
use super::PassContext;

pub struct CseStats {
    pub eliminated: usize,
}

pub fn cse_expr(expr: &CoreExpr<Type>, ctx: &PassContext, stats: &mut CseStats) -> CoreExpr<Type> {
    let expr = cse_let_chain(expr, ctx, &mut HashMap::new(), stats);
    cse_siblings(&expr, ctx, stats)
}

/// Walks a chain of nested `let`s threading a fingerprint->binder map: a
/// later binding whose value fingerprints the same as an earlier, still
/// pure, in-scope one is replaced by a reference to the earlier binder.
fn cse_let_chain(expr: &CoreExpr<Type>, ctx: &PassContext, seen: &mut HashMap<u64, BinderId>, stats: &mut CseStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => {
            let value_folded = cse_expr(value, ctx, stats);
            if is_pure(&value_folded) {
                let fp = fingerprint(&value_folded);
                if let Some(&existing) = seen.get(&fp) {
                    stats.eliminated += 1;
                    let renamed_body = substitute(body, *binder, &CoreExpr::Var(existing, name.clone(), info.clone(), location.clone()), &ctx.binder_gen);
                    return cse_let_chain(&renamed_body, ctx, seen, stats);
                }
                seen.insert(fp, *binder);
            }
            let body_folded = cse_let_chain(body, ctx, seen, stats);
            CoreExpr::Let {
                binder: *binder,
                name: name.clone(),
                mutable: *mutable,
                value: Box::new(value_folded),
                body: Box::new(body_folded),
                info: info.clone(),
                location: location.clone(),
            }
        }
        other => cse_expr(other, ctx, stats),
    }
}

/// Deduplicates structurally-identical pure siblings directly under one
/// n-ary node, e.g. `(a + b) * (a + b)` becomes `let t = a + b in t * t`.
fn cse_siblings(expr: &CoreExpr<Type>, ctx: &PassContext, stats: &mut CseStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::BinOp { op, left, right, info, location } => {
            let left = cse_descend(left, ctx, stats);
            let right = cse_descend(right, ctx, stats);
            if is_pure(&left) && !super::purity::is_trivial(&left) && fingerprint(&left) == fingerprint(&right) && left == right {
                let fresh = ctx.binder_gen.fresh();
                let left_info = left.info().clone();
                let left_loc = left.location().clone();
                let shared = CoreExpr::Var(fresh, "$cse".into(), left_info.clone(), left_loc.clone());
                stats.eliminated += 1;
                return CoreExpr::Let {
                    binder: fresh,
                    name: "$cse".into(),
                    mutable: false,
                    value: Box::new(left),
                    body: Box::new(CoreExpr::BinOp { op: *op, left: Box::new(shared.clone()), right: Box::new(shared), info: info.clone(), location: location.clone() }),
                    info: info.clone(),
                    location: location.clone(),
                };
            }
            CoreExpr::BinOp { op: *op, left: Box::new(left), right: Box::new(right), info: info.clone(), location: location.clone() }
        }
        other => cse_descend(other, ctx, stats),
    }
}

fn cse_descend(expr: &CoreExpr<Type>, ctx: &PassContext, stats: &mut CseStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) => expr.clone(),
        CoreExpr::Lambda { param, param_name, body, info, location } => CoreExpr::Lambda {
            param: *param,
            param_name: param_name.clone(),
            body: Box::new(cse_expr(body, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(cse_expr(func, ctx, stats)),
            arg: Box::new(cse_expr(arg, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => CoreExpr::Let {
            binder: *binder,
            name: name.clone(),
            mutable: *mutable,
            value: Box::new(cse_expr(value, ctx, stats)),
            body: Box::new(cse_expr(body, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, info, location } => CoreExpr::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), cse_expr(v, ctx, stats))).collect(),
            body: Box::new(cse_expr(body, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Match { scrutinee, cases, info, location } => CoreExpr::Match {
            scrutinee: Box::new(cse_expr(scrutinee, ctx, stats)),
            cases: cases
                .iter()
                .map(|c| crate::core::CoreMatchCase {
                    pattern: c.pattern.clone(),
                    guard: c.guard.as_ref().map(|g| cse_expr(g, ctx, stats)),
                    body: cse_expr(&c.body, ctx, stats),
                    location: c.location.clone(),
                })
                .collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, info, location } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(cse_expr(left, ctx, stats)),
            right: Box::new(cse_expr(right, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, info, location } => CoreExpr::UnOp {
            op: *op,
            operand: Box::new(cse_expr(operand, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => {
            let deduped = dedup_siblings(items, ctx, stats);
            CoreExpr::Tuple(deduped, info.clone(), loc.clone())
        }
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), cse_expr(v, ctx, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(cse_expr(base, ctx, stats)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(cse_expr(base, ctx, stats)),
            fields: fields.iter().map(|(n, v)| (n.clone(), cse_expr(v, ctx, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => CoreExpr::RefNew(Box::new(cse_expr(inner, ctx, stats)), info.clone(), loc.clone()),
        CoreExpr::Unsafe(inner, info, loc) => CoreExpr::Unsafe(inner.clone(), info.clone(), loc.clone()),
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(cse_expr(inner, ctx, stats)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
    }
}

/// One-level sibling dedup for n-ary nodes (tuples): each later item
/// structurally equal to an earlier pure one is canonicalized to share that
/// earlier item's subtree. Unlike the `BinOp` case this doesn't introduce a
/// `let` binding, since a tuple can hold an arbitrary number of duplicate
/// items and hoisting all of them would need a binding per distinct value --
/// left for a later pass if it turns out to matter in practice.
fn dedup_siblings(items: &[CoreExpr<Type>], ctx: &PassContext, stats: &mut CseStats) -> Vec<CoreExpr<Type>> {
    let folded: Vec<CoreExpr<Type>> = items.iter().map(|i| cse_expr(i, ctx, stats)).collect();
    let mut seen: HashMap<u64, usize> = HashMap::new();
    let mut out = Vec::with_capacity(folded.len());
    for (i, item) in folded.iter().enumerate() {
        if is_pure(item) && !super::purity::is_trivial(item) {
            let fp = fingerprint(item);
            if let Some(&earlier) = seen.get(&fp) {
                if folded[earlier] == *item {
                    stats.eliminated += 1;
                    out.push(folded[earlier].clone());
                    continue;
                }
            }
            seen.insert(fp, i);
        }
        out.push(item.clone());
    }
    out
}
