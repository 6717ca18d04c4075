//! Purity and free-variable analysis shared by every pass: constant folding
//! (§4.5.2), β-reduction/inlining (§4.5.3), dead-code elimination (§4.5.4)
//! and CSE (§4.5.6) all gate themselves on "can this subterm be dropped, or
//! shared, without changing observable behaviour?".
//!
//! "Pure" here is the conservative, structural notion the spec names
//! explicitly -- no `ref` allocation, no dereference or assignment, no
//! `external` reference, no `unsafe` boundary -- not a full effect
//! analysis. An ordinary function application is not itself treated as
//! impure (its callee's body is inspected on its own terms wherever it
//! appears in the tree), matching "arg is pure (no ref op, no external
//! call, no unsafe)" in §4.5.3.

use std::collections::HashSet;

use crate::core::{BinderId, CoreBinOp, CoreExpr, CoreMatchCase, CorePattern, CoreUnOp};

pub fn is_pure<T>(expr: &CoreExpr<T>) -> bool {
    match expr {
        CoreExpr::ExternalRef(..) => false,
        CoreExpr::RefNew(..) => false,
        CoreExpr::Unsafe(..) => false,
        CoreExpr::UnOp { op: CoreUnOp::Deref, .. } => false,
        CoreExpr::BinOp { op: CoreBinOp::RefAssign, .. } => false,
        CoreExpr::Literal(..) | CoreExpr::Var(..) => true,
        // Creating a closure has no effect; its body's effects happen only
        // when (and if) it is later applied, which is checked where that
        // application appears.
        CoreExpr::Lambda { .. } => true,
        CoreExpr::Application { func, arg, .. } => is_pure(func) && is_pure(arg),
        CoreExpr::Let { value, body, .. } => is_pure(value) && is_pure(body),
        CoreExpr::LetRec { bindings, body, .. } => bindings.iter().all(|(_, _, v)| is_pure(v)) && is_pure(body),
        CoreExpr::Match { scrutinee, cases, .. } => is_pure(scrutinee) && cases.iter().all(is_case_pure),
        CoreExpr::BinOp { op, left, right, .. } => {
            !matches!(op, CoreBinOp::RefAssign) && is_pure(left) && is_pure(right)
        }
        CoreExpr::UnOp { operand, .. } => is_pure(operand),
        CoreExpr::Tuple(items, ..) => items.iter().all(is_pure),
        CoreExpr::Record { fields, .. } => fields.iter().all(|(_, v)| is_pure(v)),
        CoreExpr::FieldAccess { base, .. } => is_pure(base),
        CoreExpr::RecordUpdate { base, fields, .. } => is_pure(base) && fields.iter().all(|(_, v)| is_pure(v)),
        CoreExpr::Annotation { expr, .. } => is_pure(expr),
    }
}

fn is_case_pure<T>(case: &CoreMatchCase<T>) -> bool {
    case.guard.as_ref().map(is_pure).unwrap_or(true) && is_pure(&case.body)
}

/// `true` for "not worth hoisting/sharing even if duplicated": a bare
/// variable or literal costs nothing to recompute, so CSE and the
/// algebraic-identity folds skip them rather than introducing a pointless
/// indirection.
pub fn is_trivial<T>(expr: &CoreExpr<T>) -> bool {
    matches!(expr, CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..))
}

/// Free [`BinderId`]s of `expr` -- every `Var` reference not bound by an
/// enclosing `Lambda`/`Let`/`LetRec`/pattern within `expr` itself. Used by
/// β-reduction's single-use check and capture-avoiding substitution.
pub fn free_vars<T>(expr: &CoreExpr<T>) -> HashSet<BinderId> {
    let mut out = HashSet::new();
    collect_free_vars(expr, &mut out);
    out
}

fn collect_free_vars<T>(expr: &CoreExpr<T>, out: &mut HashSet<BinderId>) {
    match expr {
        CoreExpr::Literal(..) => {}
        CoreExpr::Var(b, ..) => {
            out.insert(*b);
        }
        CoreExpr::ExternalRef(..) => {}
        CoreExpr::Lambda { param, body, .. } => {
            let mut inner = HashSet::new();
            collect_free_vars(body, &mut inner);
            inner.remove(param);
            out.extend(inner);
        }
        CoreExpr::Application { func, arg, .. } => {
            collect_free_vars(func, out);
            collect_free_vars(arg, out);
        }
        CoreExpr::Let { binder, value, body, .. } => {
            collect_free_vars(value, out);
            let mut inner = HashSet::new();
            collect_free_vars(body, &mut inner);
            inner.remove(binder);
            out.extend(inner);
        }
        CoreExpr::LetRec { bindings, body, .. } => {
            let mut inner = HashSet::new();
            collect_free_vars(body, &mut inner);
            for (_, _, value) in bindings {
                collect_free_vars(value, &mut inner);
            }
            for (binder, _, _) in bindings {
                inner.remove(binder);
            }
            out.extend(inner);
        }
        CoreExpr::Match { scrutinee, cases, .. } => {
            collect_free_vars(scrutinee, out);
            for case in cases {
                let mut inner = HashSet::new();
                if let Some(guard) = &case.guard {
                    collect_free_vars(guard, &mut inner);
                }
                collect_free_vars(&case.body, &mut inner);
                for b in pattern_bound_vars(&case.pattern) {
                    inner.remove(&b);
                }
                out.extend(inner);
            }
        }
        CoreExpr::BinOp { left, right, .. } => {
            collect_free_vars(left, out);
            collect_free_vars(right, out);
        }
        CoreExpr::UnOp { operand, .. } => collect_free_vars(operand, out),
        CoreExpr::Tuple(items, ..) => items.iter().for_each(|i| collect_free_vars(i, out)),
        CoreExpr::Record { fields, .. } => fields.iter().for_each(|(_, v)| collect_free_vars(v, out)),
        CoreExpr::FieldAccess { base, .. } => collect_free_vars(base, out),
        CoreExpr::RecordUpdate { base, fields, .. } => {
            collect_free_vars(base, out);
            fields.iter().for_each(|(_, v)| collect_free_vars(v, out));
        }
        CoreExpr::RefNew(inner, ..) => collect_free_vars(inner, out),
        CoreExpr::Unsafe(inner, ..) => collect_free_vars(inner, out),
        CoreExpr::Annotation { expr, .. } => collect_free_vars(expr, out),
    }
}

/// Every [`BinderId`] a pattern introduces, in no particular order.
pub fn pattern_bound_vars<T>(pattern: &CorePattern<T>) -> Vec<BinderId> {
    let mut out = Vec::new();
    collect_pattern_binders(pattern, &mut out);
    out
}

fn collect_pattern_binders<T>(pattern: &CorePattern<T>, out: &mut Vec<BinderId>) {
    match pattern {
        CorePattern::Wildcard(..) | CorePattern::Literal(..) => {}
        CorePattern::Variable(b, ..) => out.push(*b),
        CorePattern::Variant { args, .. } => args.iter().for_each(|p| collect_pattern_binders(p, out)),
        CorePattern::Tuple(items, ..) => items.iter().for_each(|p| collect_pattern_binders(p, out)),
        CorePattern::Record { fields, .. } => fields.iter().for_each(|(_, p)| collect_pattern_binders(p, out)),
    }
}

/// Counts free (non-shadowed) occurrences of `target` as a `Var` in
/// `expr` -- used by β-reduction's "used at most once" condition (§4.5.3).
/// Stops descending into a binder that rebinds `target`, since by
/// construction every `BinderId` is alpha-unique and so `target` can never
/// legitimately reappear as a *different* binding further down.
pub fn count_uses<T>(target: BinderId, expr: &CoreExpr<T>) -> usize {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::ExternalRef(..) => 0,
        CoreExpr::Var(b, ..) => (*b == target) as usize,
        CoreExpr::Lambda { param, body, .. } => {
            if *param == target {
                0
            } else {
                count_uses(target, body)
            }
        }
        CoreExpr::Application { func, arg, .. } => count_uses(target, func) + count_uses(target, arg),
        CoreExpr::Let { binder, value, body, .. } => {
            count_uses(target, value) + if *binder == target { 0 } else { count_uses(target, body) }
        }
        CoreExpr::LetRec { bindings, body, .. } => {
            if bindings.iter().any(|(b, _, _)| *b == target) {
                0
            } else {
                bindings.iter().map(|(_, _, v)| count_uses(target, v)).sum::<usize>() + count_uses(target, body)
            }
        }
        CoreExpr::Match { scrutinee, cases, .. } => {
            count_uses(target, scrutinee)
                + cases
                    .iter()
                    .map(|case| {
                        if pattern_bound_vars(&case.pattern).contains(&target) {
                            0
                        } else {
                            case.guard.as_ref().map(|g| count_uses(target, g)).unwrap_or(0) + count_uses(target, &case.body)
                        }
                    })
                    .sum::<usize>()
        }
        CoreExpr::BinOp { left, right, .. } => count_uses(target, left) + count_uses(target, right),
        CoreExpr::UnOp { operand, .. } => count_uses(target, operand),
        CoreExpr::Tuple(items, ..) => items.iter().map(|i| count_uses(target, i)).sum(),
        CoreExpr::Record { fields, .. } => fields.iter().map(|(_, v)| count_uses(target, v)).sum(),
        CoreExpr::FieldAccess { base, .. } => count_uses(target, base),
        CoreExpr::RecordUpdate { base, fields, .. } => {
            count_uses(target, base) + fields.iter().map(|(_, v)| count_uses(target, v)).sum::<usize>()
        }
        CoreExpr::RefNew(inner, ..) => count_uses(target, inner),
        CoreExpr::Unsafe(inner, ..) => count_uses(target, inner),
        CoreExpr::Annotation { expr, .. } => count_uses(target, expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Location;
    use crate::types::Type;

    fn loc() -> Location {
        Location::default()
    }

    #[test]
    fn test_is_pure_rejects_ref_new() {
        let e: CoreExpr<Type> = CoreExpr::RefNew(Box::new(CoreExpr::Literal(crate::core::CoreLiteral::Int(1), Type::Int, loc())), Type::Ref(Box::new(Type::Int)), loc());
        assert!(!is_pure(&e));
    }

    #[test]
    fn test_count_uses_stops_at_shadowing_lambda() {
        let target = BinderId(0);
        let shadow = BinderId(1);
        let body: CoreExpr<()> = CoreExpr::Var(target, "x".into(), (), loc());
        let lambda = CoreExpr::Lambda {
            param: shadow,
            param_name: "y".into(),
            body: Box::new(body),
            info: (),
            location: loc(),
        };
        assert_eq!(count_uses(target, &lambda), 1);
        let self_shadow = CoreExpr::Lambda {
            param: target,
            param_name: "x".into(),
            body: Box::new(CoreExpr::Var(target, "x".into(), (), loc())),
            info: (),
            location: loc(),
        };
        assert_eq!(count_uses(target, &self_shadow), 0);
    }
}
