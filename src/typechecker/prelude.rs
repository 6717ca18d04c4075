//! Built-in nominal types the desugarer's sugar expansions target directly:
//! list literals lower to `Cons`/`Nil` applications, and `Option`/`Result`
//! are registered alongside them as the conventional minimal ADT vocabulary
//! a functional language ships even with its standard library out of
//! scope, so pattern matches over optional and fallible values have
//! something concrete to destructure.

use std::rc::Rc;

use crate::types::{NominalDef, NominalShape, Type, VariantCtorDef};

pub fn list_def() -> Rc<NominalDef> {
    Rc::new(NominalDef {
        name: "List".to_string(),
        params: vec!["a".to_string()],
        shape: NominalShape::Variant(vec![
            VariantCtorDef {
                name: "Nil".to_string(),
                fields: vec![],
            },
            VariantCtorDef {
                name: "Cons".to_string(),
                fields: vec![Type::Param("a".to_string()), list_param_self()],
            },
        ]),
    })
}

/// `List<a>` applied to its own parameter, used inside `Cons`'s own field
/// template. The `def` handle is filled in lazily by callers that already
/// hold the real `Rc<NominalDef>` (see `resolve_ctor_fields` in
/// `crate::typechecker`, which never dereferences a recursive `def` field
/// before substituting `a`) -- a placeholder definition here would dangle.
fn list_param_self() -> Type {
    Type::Nominal {
        name: "List".to_string(),
        args: vec![Type::Param("a".to_string())],
        def: Rc::new(NominalDef {
            name: "List".to_string(),
            params: vec!["a".to_string()],
            shape: NominalShape::Alias(Type::Unit),
        }),
    }
}

pub fn option_def() -> Rc<NominalDef> {
    Rc::new(NominalDef {
        name: "Option".to_string(),
        params: vec!["a".to_string()],
        shape: NominalShape::Variant(vec![
            VariantCtorDef {
                name: "None".to_string(),
                fields: vec![],
            },
            VariantCtorDef {
                name: "Some".to_string(),
                fields: vec![Type::Param("a".to_string())],
            },
        ]),
    })
}

pub fn result_def() -> Rc<NominalDef> {
    Rc::new(NominalDef {
        name: "Result".to_string(),
        params: vec!["ok".to_string(), "err".to_string()],
        shape: NominalShape::Variant(vec![
            VariantCtorDef {
                name: "Ok".to_string(),
                fields: vec![Type::Param("ok".to_string())],
            },
            VariantCtorDef {
                name: "Err".to_string(),
                fields: vec![Type::Param("err".to_string())],
            },
        ]),
    })
}
