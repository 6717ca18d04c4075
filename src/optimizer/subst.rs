//! Capture-avoiding substitution and alpha-renaming, used by β-reduction
//! and inlining (§4.5.3). §9's design notes call out exactly the
//! simplification this crate leans on: because every binder is a unique
//! numeric [`BinderId`] minted once at desugar time (never reused), two
//! `Var` nodes refer to the same binding iff their ids are equal, and an
//! id can never be "shadowed by coincidence" the way a textual name could.
//! That means alpha-renaming a binder only has to rewrite occurrences of
//! its *own* id -- there is no risk of accidentally renaming an unrelated
//! binding that happens to share a name.

use crate::core::binder::BinderIdGen;
use crate::core::{BinderId, CoreExpr, CoreMatchCase, CorePattern};
use crate::types::Type;

use super::purity::{free_vars, pattern_bound_vars};

/// Substitute every free occurrence of `target` in `expr` with `replacement`,
/// renaming any binder in `expr` that would otherwise capture one of
/// `replacement`'s free variables.
pub fn substitute(expr: &CoreExpr<Type>, target: BinderId, replacement: &CoreExpr<Type>, gen: &BinderIdGen) -> CoreExpr<Type> {
    let repl_free = free_vars(replacement);
    subst_expr(expr, target, replacement, &repl_free, gen)
}

fn subst_expr(
    expr: &CoreExpr<Type>,
    target: BinderId,
    replacement: &CoreExpr<Type>,
    repl_free: &std::collections::HashSet<BinderId>,
    gen: &BinderIdGen,
) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::ExternalRef(..) => expr.clone(),
        CoreExpr::Var(b, ..) => {
            if *b == target {
                replacement.clone()
            } else {
                expr.clone()
            }
        }
        CoreExpr::Lambda { param, param_name, body, info, location } => {
            if *param == target {
                expr.clone()
            } else if repl_free.contains(param) {
                let fresh = gen.fresh();
                let renamed = alpha_rename_expr(body, *param, fresh);
                CoreExpr::Lambda {
                    param: fresh,
                    param_name: param_name.clone(),
                    body: Box::new(subst_expr(&renamed, target, replacement, repl_free, gen)),
                    info: info.clone(),
                    location: location.clone(),
                }
            } else {
                CoreExpr::Lambda {
                    param: *param,
                    param_name: param_name.clone(),
                    body: Box::new(subst_expr(body, target, replacement, repl_free, gen)),
                    info: info.clone(),
                    location: location.clone(),
                }
            }
        }
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(subst_expr(func, target, replacement, repl_free, gen)),
            arg: Box::new(subst_expr(arg, target, replacement, repl_free, gen)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => {
            let new_value = subst_expr(value, target, replacement, repl_free, gen);
            if *binder == target {
                CoreExpr::Let {
                    binder: *binder,
                    name: name.clone(),
                    mutable: *mutable,
                    value: Box::new(new_value),
                    body: body.clone(),
                    info: info.clone(),
                    location: location.clone(),
                }
            } else if repl_free.contains(binder) {
                let fresh = gen.fresh();
                let renamed_body = alpha_rename_expr(body, *binder, fresh);
                CoreExpr::Let {
                    binder: fresh,
                    name: name.clone(),
                    mutable: *mutable,
                    value: Box::new(new_value),
                    body: Box::new(subst_expr(&renamed_body, target, replacement, repl_free, gen)),
                    info: info.clone(),
                    location: location.clone(),
                }
            } else {
                CoreExpr::Let {
                    binder: *binder,
                    name: name.clone(),
                    mutable: *mutable,
                    value: Box::new(new_value),
                    body: Box::new(subst_expr(body, target, replacement, repl_free, gen)),
                    info: info.clone(),
                    location: location.clone(),
                }
            }
        }
        CoreExpr::LetRec { bindings, body, info, location } => {
            if bindings.iter().any(|(b, _, _)| *b == target) {
                return expr.clone();
            }
            let colliding: Vec<BinderId> = bindings.iter().map(|(b, _, _)| *b).filter(|b| repl_free.contains(b)).collect();
            let mut renamed_bindings = bindings.clone();
            let mut renamed_body = (**body).clone();
            for old in colliding {
                let fresh = gen.fresh();
                renamed_bindings = renamed_bindings
                    .into_iter()
                    .map(|(b, n, v)| (b, n, alpha_rename_expr(&v, old, fresh)))
                    .map(|(b, n, v)| if b == old { (fresh, n, v) } else { (b, n, v) })
                    .collect();
                renamed_body = alpha_rename_expr(&renamed_body, old, fresh);
            }
            CoreExpr::LetRec {
                bindings: renamed_bindings
                    .into_iter()
                    .map(|(b, n, v)| (b, n, subst_expr(&v, target, replacement, repl_free, gen)))
                    .collect(),
                body: Box::new(subst_expr(&renamed_body, target, replacement, repl_free, gen)),
                info: info.clone(),
                location: location.clone(),
            }
        }
        CoreExpr::Match { scrutinee, cases, info, location } => CoreExpr::Match {
            scrutinee: Box::new(subst_expr(scrutinee, target, replacement, repl_free, gen)),
            cases: cases.iter().map(|case| subst_case(case, target, replacement, repl_free, gen)).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, info, location } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(subst_expr(left, target, replacement, repl_free, gen)),
            right: Box::new(subst_expr(right, target, replacement, repl_free, gen)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, info, location } => CoreExpr::UnOp {
            op: *op,
            operand: Box::new(subst_expr(operand, target, replacement, repl_free, gen)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => {
            CoreExpr::Tuple(items.iter().map(|i| subst_expr(i, target, replacement, repl_free, gen)).collect(), info.clone(), loc.clone())
        }
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), subst_expr(v, target, replacement, repl_free, gen))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(subst_expr(base, target, replacement, repl_free, gen)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(subst_expr(base, target, replacement, repl_free, gen)),
            fields: fields.iter().map(|(n, v)| (n.clone(), subst_expr(v, target, replacement, repl_free, gen))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => {
            CoreExpr::RefNew(Box::new(subst_expr(inner, target, replacement, repl_free, gen)), info.clone(), loc.clone())
        }
        CoreExpr::Unsafe(inner, info, loc) => {
            CoreExpr::Unsafe(Box::new(subst_expr(inner, target, replacement, repl_free, gen)), info.clone(), loc.clone())
        }
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(subst_expr(inner, target, replacement, repl_free, gen)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
    }
}

fn subst_case(
    case: &CoreMatchCase<Type>,
    target: BinderId,
    replacement: &CoreExpr<Type>,
    repl_free: &std::collections::HashSet<BinderId>,
    gen: &BinderIdGen,
) -> CoreMatchCase<Type> {
    let bound = pattern_bound_vars(&case.pattern);
    if bound.contains(&target) {
        return case.clone();
    }
    let colliding: Vec<BinderId> = bound.into_iter().filter(|b| repl_free.contains(b)).collect();
    let mut pattern = case.pattern.clone();
    let mut guard = case.guard.clone();
    let mut body = case.body.clone();
    for old in colliding {
        let fresh = gen.fresh();
        pattern = alpha_rename_pattern(&pattern, old, fresh);
        guard = guard.map(|g| alpha_rename_expr(&g, old, fresh));
        body = alpha_rename_expr(&body, old, fresh);
    }
    CoreMatchCase {
        pattern,
        guard: guard.map(|g| subst_expr(&g, target, replacement, repl_free, gen)),
        body: subst_expr(&body, target, replacement, repl_free, gen),
        location: case.location.clone(),
    }
}

/// Rewrite every occurrence of `old` (as a binder or as a `Var` reference)
/// to `new`, throughout `expr`. Always sound: `old` is alpha-unique to the
/// scope it was minted in, so this can never collide with an unrelated
/// binding.
pub fn alpha_rename_expr(expr: &CoreExpr<Type>, old: BinderId, new: BinderId) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::ExternalRef(..) => expr.clone(),
        CoreExpr::Var(b, name, info, loc) => {
            if *b == old {
                CoreExpr::Var(new, name.clone(), info.clone(), loc.clone())
            } else {
                expr.clone()
            }
        }
        CoreExpr::Lambda { param, param_name, body, info, location } => CoreExpr::Lambda {
            param: if *param == old { new } else { *param },
            param_name: param_name.clone(),
            body: Box::new(alpha_rename_expr(body, old, new)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(alpha_rename_expr(func, old, new)),
            arg: Box::new(alpha_rename_expr(arg, old, new)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => CoreExpr::Let {
            binder: if *binder == old { new } else { *binder },
            name: name.clone(),
            mutable: *mutable,
            value: Box::new(alpha_rename_expr(value, old, new)),
            body: Box::new(alpha_rename_expr(body, old, new)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, info, location } => CoreExpr::LetRec {
            bindings: bindings
                .iter()
                .map(|(b, n, v)| (if *b == old { new } else { *b }, n.clone(), alpha_rename_expr(v, old, new)))
                .collect(),
            body: Box::new(alpha_rename_expr(body, old, new)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Match { scrutinee, cases, info, location } => CoreExpr::Match {
            scrutinee: Box::new(alpha_rename_expr(scrutinee, old, new)),
            cases: cases
                .iter()
                .map(|case| CoreMatchCase {
                    pattern: alpha_rename_pattern(&case.pattern, old, new),
                    guard: case.guard.as_ref().map(|g| alpha_rename_expr(g, old, new)),
                    body: alpha_rename_expr(&case.body, old, new),
                    location: case.location.clone(),
                })
                .collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, info, location } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(alpha_rename_expr(left, old, new)),
            right: Box::new(alpha_rename_expr(right, old, new)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, info, location } => CoreExpr::UnOp {
            op: *op,
            operand: Box::new(alpha_rename_expr(operand, old, new)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => {
            CoreExpr::Tuple(items.iter().map(|i| alpha_rename_expr(i, old, new)).collect(), info.clone(), loc.clone())
        }
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), alpha_rename_expr(v, old, new))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(alpha_rename_expr(base, old, new)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(alpha_rename_expr(base, old, new)),
            fields: fields.iter().map(|(n, v)| (n.clone(), alpha_rename_expr(v, old, new))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => CoreExpr::RefNew(Box::new(alpha_rename_expr(inner, old, new)), info.clone(), loc.clone()),
        CoreExpr::Unsafe(inner, info, loc) => CoreExpr::Unsafe(Box::new(alpha_rename_expr(inner, old, new)), info.clone(), loc.clone()),
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(alpha_rename_expr(inner, old, new)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
    }
}

fn alpha_rename_pattern(pattern: &CorePattern<Type>, old: BinderId, new: BinderId) -> CorePattern<Type> {
    match pattern {
        CorePattern::Wildcard(..) | CorePattern::Literal(..) => pattern.clone(),
        CorePattern::Variable(b, name, info, loc) => {
            CorePattern::Variable(if *b == old { new } else { *b }, name.clone(), info.clone(), loc.clone())
        }
        CorePattern::Variant { name, args, info, location } => CorePattern::Variant {
            name: name.clone(),
            args: args.iter().map(|p| alpha_rename_pattern(p, old, new)).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CorePattern::Tuple(items, info, loc) => {
            CorePattern::Tuple(items.iter().map(|p| alpha_rename_pattern(p, old, new)).collect(), info.clone(), loc.clone())
        }
        CorePattern::Record { fields, info, location } => CorePattern::Record {
            fields: fields.iter().map(|(n, p)| (n.clone(), alpha_rename_pattern(p, old, new))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoreLiteral;
    use crate::lexer::token::Location;

    fn loc() -> Location {
        Location::default()
    }

    /// `((x) => (y) => x + y)(y)` must not let the argument's free `y`
    /// be captured by the inner lambda's own parameter `y` (§8).
    #[test]
    fn test_substitute_avoids_capture() {
        let gen = BinderIdGen::new();
        let x = BinderId(100);
        let y_outer = BinderId(101);
        let y_param = BinderId(102);

        let inner_body = CoreExpr::BinOp {
            op: crate::core::CoreBinOp::Add,
            left: Box::new(CoreExpr::Var(x, "x".into(), Type::Int, loc())),
            right: Box::new(CoreExpr::Var(y_param, "y".into(), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let inner_lambda = CoreExpr::Lambda {
            param: y_param,
            param_name: "y".into(),
            body: Box::new(inner_body),
            info: Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
            location: loc(),
        };

        // Substitute outer `x` with `Var(y_outer)` -- the free `y` the
        // argument carries in from the call site.
        let replacement = CoreExpr::Var(y_outer, "y".into(), Type::Int, loc());
        let result = substitute(&inner_lambda, x, &replacement, &gen);

        let CoreExpr::Lambda { param, body, .. } = &result else { panic!("expected lambda") };
        assert_ne!(*param, y_param, "inner parameter must be renamed to avoid capture");
        let CoreExpr::BinOp { left, right, .. } = &**body else { panic!("expected binop") };
        let CoreExpr::Var(left_id, ..) = &**left else { panic!() };
        let CoreExpr::Var(right_id, ..) = &**right else { panic!() };
        assert_eq!(*left_id, y_outer, "substituted occurrence must be the outer y");
        assert_eq!(*right_id, *param, "renamed parameter occurrence must track the rename");
        assert_ne!(left_id, right_id);
    }

    #[test]
    fn test_substitute_literal_identity() {
        let gen = BinderIdGen::new();
        let target = BinderId(0);
        let expr = CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc());
        let replacement = CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc());
        let result = substitute(&expr, target, &replacement, &gen);
        assert_eq!(result, expr);
    }
}
