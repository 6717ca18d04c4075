//! Unification, with an occurs-check and level adjustment on variable
//! binding, and row unification for the structural width-subtyping records
//! get (§4.4.2: "two record types unify if one's fields are a subset of the
//! other's, with the narrower type's row left open").

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostic, Phase};
use crate::lexer::token::Location;
use crate::types::{prune, prune_row, Row, RowTail, RowVarState, Type, TypeVarState, VarGen, VarId};

pub fn unify(gen: &VarGen, expected: &Type, actual: &Type, location: &Location) -> Result<(), Diagnostic> {
    let a = prune(expected);
    let b = prune(actual);
    match (&a, &b) {
        (Type::Var(v1), Type::Var(v2)) => {
            let same = matches!(
                (&*v1.borrow(), &*v2.borrow()),
                (TypeVarState::Unbound { id: i1, .. }, TypeVarState::Unbound { id: i2, .. }) if i1 == i2
            );
            if same {
                return Ok(());
            }
            bind_var(v1, &b, location)
        }
        (Type::Var(v), _) => bind_var(v, &b, location),
        (_, Type::Var(v)) => bind_var(v, &a, location),
        // The absorptive error type unifies with anything silently, so a
        // single reported mismatch does not cascade into further errors on
        // every later use of the offending subterm (§4.4.5).
        (Type::Error, _) | (_, Type::Error) => Ok(()),
        (Type::Int, Type::Int)
        | (Type::Float, Type::Float)
        | (Type::Bool, Type::Bool)
        | (Type::Str, Type::Str)
        | (Type::Unit, Type::Unit)
        | (Type::Opaque, Type::Opaque) => Ok(()),
        (Type::Function(a1, a2), Type::Function(b1, b2)) => {
            unify(gen, a1, b1, location)?;
            unify(gen, a2, b2, location)
        }
        (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
            for (x, y) in xs.iter().zip(ys) {
                unify(gen, x, y, location)?;
            }
            Ok(())
        }
        (Type::Ref(x), Type::Ref(y)) => unify(gen, x, y, location),
        (Type::Nominal { name: n1, args: a1, .. }, Type::Nominal { name: n2, args: a2, .. })
            if n1 == n2 && a1.len() == a2.len() =>
        {
            // Invariant type parameters: unify each argument exactly rather
            // than checking only equality, so nested type variables still
            // get resolved (e.g. `List<a>` against `List<Int>`).
            for (x, y) in a1.iter().zip(a2) {
                unify(gen, x, y, location)?;
            }
            Ok(())
        }
        (Type::Record(r1), Type::Record(r2)) => unify_rows(gen, r1, r2, location),
        _ => Err(mismatch(&a, &b, location)),
    }
}

fn mismatch(expected: &Type, actual: &Type, location: &Location) -> Diagnostic {
    Diagnostic::error(
        "VF4001",
        Phase::TypeChecker,
        "type mismatch",
        location.clone(),
    )
    .with_types(expected.to_string(), actual.to_string())
}

fn bind_var(var: &crate::types::TypeVar, ty: &Type, location: &Location) -> Result<(), Diagnostic> {
    let (id, level) = match &*var.borrow() {
        TypeVarState::Unbound { id, level } => (*id, *level),
        TypeVarState::Link(_) => unreachable!("bind_var called on an already-bound variable"),
    };

    if occurs(id, ty) {
        return Err(Diagnostic::error(
            "VF4002",
            Phase::TypeChecker,
            format!("infinite type: 't{id} occurs in {ty}"),
            location.clone(),
        ));
    }

    adjust_levels(level, ty);
    *var.borrow_mut() = TypeVarState::Link(ty.clone());
    Ok(())
}

fn occurs(id: VarId, ty: &Type) -> bool {
    match prune(ty) {
        Type::Var(v) => matches!(&*v.borrow(), TypeVarState::Unbound { id: other, .. } if *other == id),
        Type::Function(a, b) => occurs(id, &a) || occurs(id, &b),
        Type::Tuple(items) => items.iter().any(|t| occurs(id, t)),
        Type::Ref(t) => occurs(id, &t),
        Type::Nominal { args, .. } => args.iter().any(|t| occurs(id, t)),
        Type::Record(row) => {
            let row = prune_row(&row);
            row.fields.values().any(|t| occurs(id, t))
        }
        Type::Int | Type::Float | Type::Bool | Type::Str | Type::Unit | Type::Opaque | Type::Param(_) | Type::Error => false,
    }
}

/// Lower the level of every unbound variable (type or row) reachable from
/// `ty` to at most `max_level`. Needed for soundness: once a variable is
/// bound to a type containing deeper-level variables, those variables must
/// no longer be generalizable past the binder's own level.
fn adjust_levels(max_level: usize, ty: &Type) {
    match prune(ty) {
        Type::Var(v) => {
            let mut state = v.borrow_mut();
            if let TypeVarState::Unbound { level, .. } = &mut *state {
                if *level > max_level {
                    *level = max_level;
                }
            }
        }
        Type::Function(a, b) => {
            adjust_levels(max_level, &a);
            adjust_levels(max_level, &b);
        }
        Type::Tuple(items) => items.iter().for_each(|t| adjust_levels(max_level, t)),
        Type::Ref(t) => adjust_levels(max_level, &t),
        Type::Nominal { args, .. } => args.iter().for_each(|t| adjust_levels(max_level, t)),
        Type::Record(row) => {
            let row = prune_row(&row);
            row.fields.values().for_each(|t| adjust_levels(max_level, t));
            if let RowTail::Open(v) = &row.tail {
                let mut state = v.borrow_mut();
                if let RowVarState::Unbound { level, .. } = &mut *state {
                    if *level > max_level {
                        *level = max_level;
                    }
                }
            }
        }
        Type::Int | Type::Float | Type::Bool | Type::Str | Type::Unit | Type::Opaque | Type::Param(_) | Type::Error => {}
    }
}

fn unify_rows(gen: &VarGen, r1: &Row, r2: &Row, location: &Location) -> Result<(), Diagnostic> {
    let r1 = prune_row(r1);
    let r2 = prune_row(r2);

    for (k, v1) in &r1.fields {
        if let Some(v2) = r2.fields.get(k) {
            unify(gen, v1, v2, location)?;
        }
    }

    let only_in_1: BTreeMap<String, Type> = r1
        .fields
        .iter()
        .filter(|(k, _)| !r2.fields.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let only_in_2: BTreeMap<String, Type> = r2
        .fields
        .iter()
        .filter(|(k, _)| !r1.fields.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    match (&r1.tail, &r2.tail) {
        (RowTail::Closed, RowTail::Closed) => {
            if !only_in_1.is_empty() || !only_in_2.is_empty() {
                return Err(unknown_field_error(&only_in_1, &only_in_2, location));
            }
            Ok(())
        }
        (RowTail::Closed, RowTail::Open(v2)) => {
            if !only_in_2.is_empty() {
                return Err(unknown_field_error(&BTreeMap::new(), &only_in_2, location));
            }
            *v2.borrow_mut() = RowVarState::Link(Row {
                fields: only_in_1,
                tail: RowTail::Closed,
            });
            Ok(())
        }
        (RowTail::Open(v1), RowTail::Closed) => {
            if !only_in_1.is_empty() {
                return Err(unknown_field_error(&only_in_1, &BTreeMap::new(), location));
            }
            *v1.borrow_mut() = RowVarState::Link(Row {
                fields: only_in_2,
                tail: RowTail::Closed,
            });
            Ok(())
        }
        (RowTail::Open(v1), RowTail::Open(v2)) => {
            let fresh_tail = gen.fresh_row_var();
            *v1.borrow_mut() = RowVarState::Link(Row {
                fields: only_in_2,
                tail: RowTail::Open(fresh_tail.clone()),
            });
            *v2.borrow_mut() = RowVarState::Link(Row {
                fields: only_in_1,
                tail: RowTail::Open(fresh_tail),
            });
            Ok(())
        }
    }
}

fn unknown_field_error(only_in_1: &BTreeMap<String, Type>, only_in_2: &BTreeMap<String, Type>, location: &Location) -> Diagnostic {
    let mut names: Vec<&str> = only_in_1.keys().chain(only_in_2.keys()).map(String::as_str).collect();
    names.sort_unstable();
    Diagnostic::error(
        "VF4501",
        Phase::TypeChecker,
        format!("record fields do not match: {}", names.join(", ")),
        location.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_record(fields: &[(&str, Type)]) -> Type {
        Type::Record(Row::closed(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()))
    }

    #[test]
    fn test_unify_primitives_ok() {
        let gen = VarGen::new();
        assert!(unify(&gen, &Type::Int, &Type::Int, &Location::default()).is_ok());
    }

    #[test]
    fn test_unify_primitive_mismatch_reports_vf4001() {
        let gen = VarGen::new();
        let err = unify(&gen, &Type::Int, &Type::Bool, &Location::default()).unwrap_err();
        assert_eq!(err.code, "VF4001");
    }

    #[test]
    fn test_unify_var_binds_to_concrete_type() {
        let gen = VarGen::new();
        let var = gen.fresh_var();
        unify(&gen, &var, &Type::Int, &Location::default()).expect("binding a fresh var should succeed");
        assert_eq!(prune(&var), Type::Int);
    }

    #[test]
    fn test_unify_occurs_check_rejects_infinite_type() {
        let gen = VarGen::new();
        let var = gen.fresh_var();
        let self_referential = Type::Function(Box::new(var.clone()), Box::new(Type::Int));
        let err = unify(&gen, &var, &self_referential, &Location::default()).unwrap_err();
        assert_eq!(err.code, "VF4002");
    }

    #[test]
    fn test_unify_error_type_absorbs_any_mismatch() {
        let gen = VarGen::new();
        assert!(unify(&gen, &Type::Error, &Type::Bool, &Location::default()).is_ok());
        assert!(unify(&gen, &Type::Int, &Type::Error, &Location::default()).is_ok());
    }

    #[test]
    fn test_unify_closed_rows_require_exact_field_match() {
        let gen = VarGen::new();
        let r1 = closed_record(&[("x", Type::Int)]);
        let r2 = closed_record(&[("x", Type::Int), ("y", Type::Int)]);
        let err = unify(&gen, &r1, &r2, &Location::default()).unwrap_err();
        assert_eq!(err.code, "VF4501");
    }

    #[test]
    fn test_unify_open_row_against_closed_row_binds_extra_fields() {
        // getX = (p) => p.x infers p : { x: a | rho }; calling it with a
        // closed { x: Int, y: Int } record should unify fine, leaving the
        // open tail bound to the extra `y` field.
        let gen = VarGen::new();
        let open = Type::Record(gen.fresh_open_row([("x".to_string(), Type::Int)].into_iter().collect()));
        let closed = closed_record(&[("x", Type::Int), ("y", Type::Int)]);
        unify(&gen, &open, &closed, &Location::default()).expect("open row should widen to accept extra fields");

        if let Type::Record(row) = &open {
            let pruned = prune_row(row);
            assert!(pruned.fields.contains_key("y"));
            assert!(matches!(pruned.tail, RowTail::Closed));
        } else {
            panic!("expected a record type");
        }
    }

    #[test]
    fn test_unify_two_open_rows_share_a_fresh_tail() {
        let gen = VarGen::new();
        let r1 = Type::Record(gen.fresh_open_row([("x".to_string(), Type::Int)].into_iter().collect()));
        let r2 = Type::Record(gen.fresh_open_row([("y".to_string(), Type::Int)].into_iter().collect()));
        unify(&gen, &r1, &r2, &Location::default()).expect("two open rows should unify by sharing a tail");

        for r in [&r1, &r2] {
            if let Type::Record(row) = r {
                let pruned = prune_row(row);
                assert!(pruned.fields.contains_key("x"));
                assert!(pruned.fields.contains_key("y"));
                assert!(matches!(pruned.tail, RowTail::Open(_)));
            } else {
                panic!("expected a record type");
            }
        }
    }

    #[test]
    fn test_unify_nominal_args_are_checked_invariantly() {
        use crate::types::NominalDef;
        use std::rc::Rc;

        let def = Rc::new(NominalDef {
            name: "List".to_string(),
            params: vec!["a".to_string()],
            shape: crate::types::NominalShape::Alias(Type::Param("a".to_string())),
        });
        let gen = VarGen::new();
        let list_int = Type::Nominal { name: "List".to_string(), args: vec![Type::Int], def: def.clone() };
        let list_bool = Type::Nominal { name: "List".to_string(), args: vec![Type::Bool], def };
        let err = unify(&gen, &list_int, &list_bool, &Location::default()).unwrap_err();
        assert_eq!(err.code, "VF4001");
    }
}
