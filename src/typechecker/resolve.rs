//! Converts surface [`TypeExpr`] annotations into checker-internal
//! [`Type`]s.
//!
//! A single resolver serves two call sites with slightly different
//! variable semantics, distinguished only by how the caller seeds `vars`:
//!
//! - Resolving a `type` declaration's own shape (variant/record fields,
//!   alias target): the caller pre-seeds `vars` with `Type::Param(p)` for
//!   every one of the declaration's own parameters, so occurrences reuse
//!   the same placeholder and get substituted later by
//!   [`crate::types::instantiate_nominal`].
//! - Resolving a user-written annotation on a `let`/lambda/`external`: the
//!   caller starts with an empty map; each distinct lowercase name seen is
//!   bound to one fresh unification variable (shared within that one
//!   annotation), giving the "rigid-ish" polymorphic-annotation behaviour
//!   spec.md §3.5 describes without a separate skolem representation.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::ast::ty::{is_type_var_name, TypeExpr};
use crate::diagnostics::{Diagnostic, Phase};
use crate::types::{NominalDef, Type, VarGen};

pub fn resolve_type_expr(
    types: &HashMap<String, Rc<NominalDef>>,
    vars: &mut HashMap<String, Type>,
    gen: &VarGen,
    expr: &TypeExpr,
) -> Result<Type, Diagnostic> {
    match expr {
        TypeExpr::Opaque(_) => Ok(Type::Opaque),
        TypeExpr::Name(name, loc) => match name.as_str() {
            "Int" => Ok(Type::Int),
            "Float" => Ok(Type::Float),
            "Bool" => Ok(Type::Bool),
            "String" => Ok(Type::Str),
            "Unit" => Ok(Type::Unit),
            _ if is_type_var_name(name) => Ok(vars
                .entry(name.clone())
                .or_insert_with(|| gen.fresh_var())
                .clone()),
            _ => resolve_nominal(types, vars, gen, name, &[], loc),
        },
        TypeExpr::App(name, args, loc) => {
            let resolved_args = args
                .iter()
                .map(|a| resolve_type_expr(types, vars, gen, a))
                .collect::<Result<Vec<_>, _>>()?;
            match name.as_str() {
                "Ref" if resolved_args.len() == 1 => Ok(Type::Ref(Box::new(resolved_args.into_iter().next().unwrap()))),
                _ => resolve_nominal(types, vars, gen, name, &resolved_args, loc),
            }
        }
        TypeExpr::Function(params, ret, _) => {
            let ret_ty = resolve_type_expr(types, vars, gen, ret)?;
            let mut result = ret_ty;
            for p in params.iter().rev() {
                let p_ty = resolve_type_expr(types, vars, gen, p)?;
                result = Type::Function(Box::new(p_ty), Box::new(result));
            }
            Ok(result)
        }
        TypeExpr::Tuple(items, _) => Ok(Type::Tuple(
            items
                .iter()
                .map(|i| resolve_type_expr(types, vars, gen, i))
                .collect::<Result<_, _>>()?,
        )),
        TypeExpr::Record(fields, _) => {
            let mut map = BTreeMap::new();
            for (name, ty) in fields {
                map.insert(name.clone(), resolve_type_expr(types, vars, gen, ty)?);
            }
            Ok(Type::Record(crate::types::Row::closed(map)))
        }
    }
}

fn resolve_nominal(
    types: &HashMap<String, Rc<NominalDef>>,
    vars: &mut HashMap<String, Type>,
    gen: &VarGen,
    name: &str,
    args: &[Type],
    loc: &crate::lexer::token::Location,
) -> Result<Type, Diagnostic> {
    match types.get(name) {
        Some(def) => Ok(Type::Nominal {
            name: name.to_string(),
            args: args.to_vec(),
            def: def.clone(),
        }),
        None if is_type_var_name(name) => Ok(vars.entry(name.to_string()).or_insert_with(|| gen.fresh_var()).clone()),
        None => Err(Diagnostic::error(
            "VF4200",
            Phase::TypeChecker,
            format!("unknown type `{name}`"),
            loc.clone(),
        )),
    }
}

/// Ensure every `Type::Nominal` reachable from `ty` carries the *current*
/// definition registered in `types` rather than a placeholder minted while
/// a (possibly still-recursive) type declaration's own shape was being
/// built -- see the module doc comment on self-reference in
/// `crate::typechecker::prelude::list_param_self`.
pub fn rehydrate(types: &HashMap<String, Rc<NominalDef>>, ty: &Type) -> Type {
    match crate::types::prune(ty) {
        Type::Nominal { name, args, def } => {
            let real = types.get(&name).cloned().unwrap_or(def);
            Type::Nominal {
                args: args.iter().map(|a| rehydrate(types, a)).collect(),
                name,
                def: real,
            }
        }
        Type::Function(a, b) => Type::Function(Box::new(rehydrate(types, &a)), Box::new(rehydrate(types, &b))),
        Type::Tuple(items) => Type::Tuple(items.iter().map(|t| rehydrate(types, t)).collect()),
        Type::Ref(t) => Type::Ref(Box::new(rehydrate(types, &t))),
        Type::Record(row) => {
            let row = crate::types::prune_row(&row);
            Type::Record(crate::types::Row {
                fields: row.fields.iter().map(|(k, v)| (k.clone(), rehydrate(types, v))).collect(),
                tail: row.tail,
            })
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Location;

    #[test]
    fn test_resolve_primitive() {
        let types = HashMap::new();
        let gen = VarGen::new();
        let mut vars = HashMap::new();
        let ty = resolve_type_expr(&types, &mut vars, &gen, &TypeExpr::Name("Int".into(), Location::default())).unwrap();
        assert_eq!(ty, Type::Int);
    }

    #[test]
    fn test_same_var_name_reuses_fresh_var() {
        let types = HashMap::new();
        let gen = VarGen::new();
        let mut vars = HashMap::new();
        let a1 = resolve_type_expr(&types, &mut vars, &gen, &TypeExpr::Name("a".into(), Location::default())).unwrap();
        let a2 = resolve_type_expr(&types, &mut vars, &gen, &TypeExpr::Name("a".into(), Location::default())).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_unknown_nominal_is_error() {
        let types = HashMap::new();
        let gen = VarGen::new();
        let mut vars = HashMap::new();
        let err = resolve_type_expr(&types, &mut vars, &gen, &TypeExpr::Name("Frobnicator".into(), Location::default()));
        assert!(err.is_err());
    }
}
