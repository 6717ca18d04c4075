//! Dead-code elimination (§4.5.4): drops `let`-bindings nothing reads,
//! deletes match arms the exhaustiveness engine already proved unreachable,
//! and collapses a match whose scrutinee is a known constant down to the one
//! arm it would actually take.

use crate::core::{CoreExpr, CoreLiteral, CorePattern};
use crate::types::{prune, Type};

use super::purity::is_pure;
use super::subst::substitute;
use super::PassContext;
use crate::typechecker::exhaustiveness::unreachable_case_indices;

pub struct DceStats {
    pub dead_lets: usize,
    pub dead_arms: usize,
    pub constant_matches: usize,
}

pub fn dce_expr(expr: &CoreExpr<Type>, ctx: &PassContext, stats: &mut DceStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Let { binder, value, body, .. } => {
            let value = dce_expr(value, ctx, stats);
            let body = dce_expr(body, ctx, stats);
            if super::purity::count_uses(*binder, &body) == 0 && is_pure(&value) {
                stats.dead_lets += 1;
                return body;
            }
            match expr {
                CoreExpr::Let { name, mutable, info, location, .. } => CoreExpr::Let {
                    binder: *binder,
                    name: name.clone(),
                    mutable: *mutable,
                    value: Box::new(value),
                    body: Box::new(body),
                    info: info.clone(),
                    location: location.clone(),
                },
                _ => unreachable!(),
            }
        }
        CoreExpr::Match { scrutinee, cases, info, location } => {
            let scrutinee = dce_expr(scrutinee, ctx, stats);
            let cases: Vec<_> = cases
                .iter()
                .map(|c| crate::core::CoreMatchCase {
                    pattern: c.pattern.clone(),
                    guard: c.guard.as_ref().map(|g| dce_expr(g, ctx, stats)),
                    body: dce_expr(&c.body, ctx, stats),
                    location: c.location.clone(),
                })
                .collect();

            if let Some(result) = try_reduce_constant_match(&scrutinee, &cases, ctx) {
                stats.constant_matches += 1;
                return dce_expr(&result, ctx, stats);
            }

            let scrutinee_ty = prune(scrutinee.info());
            let unreachable = unreachable_case_indices(&cases, &scrutinee_ty, &is_unconditionally_true);
            let kept: Vec<_> = cases
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !unreachable.contains(i))
                .map(|(_, c)| c)
                .collect();
            stats.dead_arms += unreachable.len();

            CoreExpr::Match { scrutinee: Box::new(scrutinee), cases: kept, info: info.clone(), location: location.clone() }
        }
        other => dce_children(other, ctx, stats),
    }
}

/// A guard the checker's own exhaustiveness pass would treat as
/// unconditionally satisfied, i.e. folded down to a literal `true`.
fn is_unconditionally_true(guard: &CoreExpr<Type>) -> bool {
    matches!(guard, CoreExpr::Literal(CoreLiteral::Bool(true), ..))
}

fn try_reduce_constant_match(scrutinee: &CoreExpr<Type>, cases: &[crate::core::CoreMatchCase<Type>], ctx: &PassContext) -> Option<CoreExpr<Type>> {
    let CoreExpr::Literal(lit, ..) = scrutinee else { return None };
    for case in cases {
        match match_literal_pattern(&case.pattern, lit) {
            Some(bindings) => {
                if let Some(guard) = &case.guard {
                    if !is_unconditionally_true(guard) {
                        // Can't prove the guard's value statically; stop
                        // trying to reduce further to avoid reordering past
                        // a guard whose outcome we don't know.
                        return None;
                    }
                }
                let mut body = case.body.clone();
                for (binder, value) in bindings {
                    body = substitute(&body, binder, &value, &ctx.binder_gen);
                }
                return Some(body);
            }
            None => continue,
        }
    }
    None
}

fn match_literal_pattern(pattern: &CorePattern<Type>, lit: &CoreLiteral) -> Option<Vec<(crate::core::BinderId, CoreExpr<Type>)>> {
    match pattern {
        CorePattern::Wildcard(..) => Some(vec![]),
        CorePattern::Variable(b, _, ty, loc) => Some(vec![(*b, CoreExpr::Literal(lit.clone(), ty.clone(), loc.clone()))]),
        CorePattern::Literal(p, ..) if p == lit => Some(vec![]),
        CorePattern::Literal(..) => None,
        _ => None,
    }
}

fn dce_children(expr: &CoreExpr<Type>, ctx: &PassContext, stats: &mut DceStats) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) => expr.clone(),
        CoreExpr::Lambda { param, param_name, body, info, location } => CoreExpr::Lambda {
            param: *param,
            param_name: param_name.clone(),
            body: Box::new(dce_expr(body, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(dce_expr(func, ctx, stats)),
            arg: Box::new(dce_expr(arg, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, info, location } => CoreExpr::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), dce_expr(v, ctx, stats))).collect(),
            body: Box::new(dce_expr(body, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, info, location } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(dce_expr(left, ctx, stats)),
            right: Box::new(dce_expr(right, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, info, location } => CoreExpr::UnOp {
            op: *op,
            operand: Box::new(dce_expr(operand, ctx, stats)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => CoreExpr::Tuple(items.iter().map(|i| dce_expr(i, ctx, stats)).collect(), info.clone(), loc.clone()),
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), dce_expr(v, ctx, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(dce_expr(base, ctx, stats)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(dce_expr(base, ctx, stats)),
            fields: fields.iter().map(|(n, v)| (n.clone(), dce_expr(v, ctx, stats))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => CoreExpr::RefNew(Box::new(dce_expr(inner, ctx, stats)), info.clone(), loc.clone()),
        CoreExpr::Unsafe(inner, info, loc) => CoreExpr::Unsafe(inner.clone(), info.clone(), loc.clone()),
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(dce_expr(inner, ctx, stats)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { .. } | CoreExpr::Match { .. } => unreachable!("handled in dce_expr"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::BinderIdGen;
    use crate::core::BinderId;

    fn loc() -> crate::lexer::token::Location {
        crate::lexer::token::Location::default()
    }

    fn ctx() -> PassContext {
        PassContext { binder_gen: BinderIdGen::starting_at(1000) }
    }

    #[test]
    fn test_removes_unused_pure_let() {
        let binder = BinderId(0);
        let expr = CoreExpr::Let {
            binder,
            name: "unused".into(),
            mutable: false,
            value: Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())),
            body: Box::new(CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let mut stats = DceStats { dead_lets: 0, dead_arms: 0, constant_matches: 0 };
        let result = dce_expr(&expr, &ctx(), &mut stats);
        assert_eq!(result, CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc()));
        assert_eq!(stats.dead_lets, 1);
    }

    #[test]
    fn test_keeps_impure_unused_let() {
        let binder = BinderId(0);
        let value = CoreExpr::RefNew(Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())), Type::Ref(Box::new(Type::Int)), loc());
        let expr = CoreExpr::Let {
            binder,
            name: "cell".into(),
            mutable: false,
            value: Box::new(value),
            body: Box::new(CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let mut stats = DceStats { dead_lets: 0, dead_arms: 0, constant_matches: 0 };
        let result = dce_expr(&expr, &ctx(), &mut stats);
        assert!(matches!(result, CoreExpr::Let { .. }));
        assert_eq!(stats.dead_lets, 0);
    }
}
