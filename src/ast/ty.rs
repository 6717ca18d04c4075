//! Surface syntax for type annotations. Bare identifiers are classified by
//! case at resolution time rather than at parse time: a lowercase-initial
//! name (`a`, `elem`) is a type variable, an uppercase-initial name (`Int`,
//! `List`, `Option`) is nominal or a built-in primitive. This mirrors the
//! convention the ML family (and Elm) uses and lets the grammar stay free of
//! a dedicated sigil for type variables, which the lexical surface (§6.2)
//! does not reserve one for.

use crate::lexer::token::Location;

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// A bare name: primitive (`Int`, `Float`, `Bool`, `String`, `Unit`),
    /// nominal type, or (if lowercase-initial) a type variable.
    Name(String, Location),
    /// `Name<arg1, arg2, ...>` — a type constructor applied to arguments,
    /// e.g. `List<Int>`, `Option<a>`.
    App(String, Vec<TypeExpr>, Location),
    /// `(A, B) -> C`
    Function(Vec<TypeExpr>, Box<TypeExpr>, Location),
    Tuple(Vec<TypeExpr>, Location),
    Record(Vec<(String, TypeExpr)>, Location),
    /// `Type` — the fully opaque escape hatch type (unifies with nothing
    /// but itself, used by `external` declarations whose JS-side shape is
    /// not worth modeling precisely).
    Opaque(Location),
}

impl TypeExpr {
    pub fn location(&self) -> &Location {
        match self {
            TypeExpr::Name(_, loc)
            | TypeExpr::App(_, _, loc)
            | TypeExpr::Function(_, _, loc)
            | TypeExpr::Tuple(_, loc)
            | TypeExpr::Record(_, loc)
            | TypeExpr::Opaque(loc) => loc,
        }
    }
}

pub fn is_type_var_name(name: &str) -> bool {
    name.chars().next().map(|c| c.is_lowercase()).unwrap_or(false)
}
