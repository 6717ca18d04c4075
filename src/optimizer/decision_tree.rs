//! Conservative match-arm reordering (§4.5.5): groups arms that test the
//! same variant constructor together without ever moving an arm across a
//! guard or across a wildcard/variable arm.
//!
//! Full decision-tree compilation (turning a list of arms into a tree keyed
//! on a sequence of discriminant tests) is left to the code generator,
//! which is out of scope here (see `SPEC_FULL.md`'s Non-goals). What this
//! pass does is purely a source-level reordering that a later codegen pass
//! or a human reading the optimized IR can both take advantage of: arms
//! that test the same constructor end up adjacent, which is the
//! precondition a jump-table-style codegen needs without this pass having
//! to know anything about codegen itself.
//!
//! Safety rule: an arm may move earlier only by hopping over other arms
//! that (a) carry no guard, or a guard proven pure via
//! [`crate::typechecker::is_pure_guard`], and (b) are not themselves a
//! wildcard/variable pattern (catch-all arms must stay exactly where they
//! are, since moving anything ahead of one could change which arm a value
//! matches).

use crate::core::{CoreExpr, CoreMatchCase, CorePattern};
use crate::typechecker::is_pure_guard;
use crate::types::Type;

fn head_ctor_name(pattern: &CorePattern<Type>) -> Option<&str> {
    match pattern {
        CorePattern::Variant { name, .. } => Some(name.as_str()),
        _ => None,
    }
}

/// An arm blocks reordering past it when it's a catch-all (would steal the
/// match) or carries a guard we can't prove side-effect-free to reorder
/// around.
fn can_hop(case: &CoreMatchCase<Type>) -> bool {
    if matches!(case.pattern, CorePattern::Wildcard(..) | CorePattern::Variable(..)) {
        return false;
    }
    match &case.guard {
        Some(g) => is_pure_guard(g),
        None => true,
    }
}

/// Groups arms sharing the same variant constructor so they sit adjacent to
/// each other, preserving the relative order of first appearance and never
/// hopping an arm over a blocking arm (see module docs).
pub fn group_arms(cases: Vec<CoreMatchCase<Type>>) -> Vec<CoreMatchCase<Type>> {
    let mut result: Vec<CoreMatchCase<Type>> = Vec::with_capacity(cases.len());

    for case in cases {
        match head_ctor_name(&case.pattern) {
            None => {
                result.push(case);
            }
            Some(ctor) => {
                // Find the last position already holding this constructor
                // that we can still reach without hopping a blocker.
                let mut insert_at = result.len();
                let mut scan = result.len();
                while scan > 0 {
                    scan -= 1;
                    if can_hop(&result[scan]) {
                        if head_ctor_name(&result[scan].pattern) == Some(ctor) {
                            insert_at = scan + 1;
                            break;
                        }
                    } else {
                        break;
                    }
                }
                result.insert(insert_at, case);
            }
        }
    }

    result
}

pub fn decision_tree_expr(expr: &CoreExpr<Type>) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Match { scrutinee, cases, info, location } => CoreExpr::Match {
            scrutinee: Box::new(decision_tree_expr(scrutinee)),
            cases: group_arms(cases.iter().map(|c| CoreMatchCase {
                pattern: c.pattern.clone(),
                guard: c.guard.as_ref().map(decision_tree_expr),
                body: decision_tree_expr(&c.body),
                location: c.location.clone(),
            }).collect()),
            info: info.clone(),
            location: location.clone(),
        },
        other => decision_tree_children(other),
    }
}

fn decision_tree_children(expr: &CoreExpr<Type>) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) => expr.clone(),
        CoreExpr::Lambda { param, param_name, body, info, location } => CoreExpr::Lambda {
            param: *param,
            param_name: param_name.clone(),
            body: Box::new(decision_tree_expr(body)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, info, location } => CoreExpr::Application {
            func: Box::new(decision_tree_expr(func)),
            arg: Box::new(decision_tree_expr(arg)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, info, location } => CoreExpr::Let {
            binder: *binder,
            name: name.clone(),
            mutable: *mutable,
            value: Box::new(decision_tree_expr(value)),
            body: Box::new(decision_tree_expr(body)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, info, location } => CoreExpr::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), decision_tree_expr(v))).collect(),
            body: Box::new(decision_tree_expr(body)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, info, location } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(decision_tree_expr(left)),
            right: Box::new(decision_tree_expr(right)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, info, location } => CoreExpr::UnOp {
            op: *op,
            operand: Box::new(decision_tree_expr(operand)),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Tuple(items, info, loc) => CoreExpr::Tuple(items.iter().map(decision_tree_expr).collect(), info.clone(), loc.clone()),
        CoreExpr::Record { fields, info, location } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), decision_tree_expr(v))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, info, location } => CoreExpr::FieldAccess {
            base: Box::new(decision_tree_expr(base)),
            field: field.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RecordUpdate { base, fields, info, location } => CoreExpr::RecordUpdate {
            base: Box::new(decision_tree_expr(base)),
            fields: fields.iter().map(|(n, v)| (n.clone(), decision_tree_expr(v))).collect(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, info, loc) => CoreExpr::RefNew(Box::new(decision_tree_expr(inner)), info.clone(), loc.clone()),
        CoreExpr::Unsafe(inner, info, loc) => CoreExpr::Unsafe(inner.clone(), info.clone(), loc.clone()),
        CoreExpr::Annotation { expr: inner, ty, info, location } => CoreExpr::Annotation {
            expr: Box::new(decision_tree_expr(inner)),
            ty: ty.clone(),
            info: info.clone(),
            location: location.clone(),
        },
        CoreExpr::Match { .. } => unreachable!("handled in decision_tree_expr"),
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

    fn variant_case(name: &str) -> CoreMatchCase<Type> {
        CoreMatchCase {
            pattern: CorePattern::Variant { name: name.to_string(), args: vec![], info: Type::Unit, location: loc() },
            guard: None,
            body: CoreExpr::Literal(CoreLiteral::Int(0), Type::Int, loc()),
            location: loc(),
        }
    }

    fn wildcard_case() -> CoreMatchCase<Type> {
        CoreMatchCase { pattern: CorePattern::Wildcard(Type::Unit, loc()), guard: None, body: CoreExpr::Literal(CoreLiteral::Int(0), Type::Int, loc()), location: loc() }
    }

    #[test]
    fn test_groups_same_constructor_arms() {
        let cases = vec![variant_case("Red"), variant_case("Blue"), variant_case("Red")];
        let grouped = group_arms(cases);
        let names: Vec<&str> = grouped.iter().map(|c| head_ctor_name(&c.pattern).unwrap()).collect();
        assert_eq!(names, vec!["Red", "Red", "Blue"]);
    }

    #[test]
    fn test_never_hops_past_wildcard() {
        let cases = vec![variant_case("Red"), wildcard_case(), variant_case("Red")];
        let grouped = group_arms(cases);
        assert!(matches!(grouped[1].pattern, CorePattern::Wildcard(..)));
        assert_eq!(head_ctor_name(&grouped[0].pattern), Some("Red"));
        assert_eq!(head_ctor_name(&grouped[2].pattern), Some("Red"));
    }
}
