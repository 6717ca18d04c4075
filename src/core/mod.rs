//! Core IR: the small, uniform language every surface program is lowered
//! into before type checking and optimization. `CoreExpr<T>` is generic over
//! a phase marker `T`, following `why_lib`'s `Expression<T>` pattern:
//!
//! - `T = ()` right after desugaring, before type information exists.
//! - `T = Type` once the type checker has successfully processed a node:
//!   inference builds the tree bottom-up (rather than mutating shared
//!   slots in place) and every surviving node's `info` is its fully
//!   unified [`crate::types::Type`], pruned to its representative. A type
//!   variable left unbound after generalization only remains in a node's
//!   type when that node sits inside a polymorphic `let`-bound value; the
//!   optimizer (which only ever sees the checker's output) treats it
//!   structurally like any other type.
//!
//! Core IR deliberately has no multi-arg application, no multi-param
//! lambda, no block, no `if`/`while`, no record shorthand or spread: all of
//! that sugar is expanded by the desugarer (see [`crate::desugar`]) so every
//! later phase only has to handle this smaller grammar.

use std::fmt;
use std::rc::Rc;

use crate::lexer::token::Location;

pub mod binder;

pub use binder::BinderId;

#[derive(Clone, Debug, PartialEq)]
pub enum CoreLiteral {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// String concatenation, `&`.
    Concat,
    RefAssign,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreUnOp {
    Neg,
    Deref,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CorePattern<T> {
    Wildcard(T, Location),
    Variable(BinderId, String, T, Location),
    Literal(CoreLiteral, T, Location),
    Variant {
        name: String,
        args: Vec<CorePattern<T>>,
        info: T,
        location: Location,
    },
    Tuple(Vec<CorePattern<T>>, T, Location),
    Record {
        fields: Vec<(String, CorePattern<T>)>,
        info: T,
        location: Location,
    },
}

impl<T> CorePattern<T> {
    pub fn info(&self) -> &T {
        match self {
            CorePattern::Wildcard(t, _)
            | CorePattern::Variable(_, _, t, _)
            | CorePattern::Literal(_, t, _)
            | CorePattern::Variant { info: t, .. }
            | CorePattern::Tuple(_, t, _)
            | CorePattern::Record { info: t, .. } => t,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            CorePattern::Wildcard(_, loc)
            | CorePattern::Variable(_, _, _, loc)
            | CorePattern::Literal(_, _, loc)
            | CorePattern::Variant { location: loc, .. }
            | CorePattern::Tuple(_, _, loc)
            | CorePattern::Record { location: loc, .. } => loc,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoreMatchCase<T> {
    pub pattern: CorePattern<T>,
    pub guard: Option<CoreExpr<T>>,
    pub body: CoreExpr<T>,
    pub location: Location,
}

/// The full Core IR expression grammar. Every surface-level sugar form is
/// gone by the time a tree reaches this type: multi-arg `Call` became
/// nested single-arg `Application`, `if` became `Match`, blocks became
/// nested `Let`, `while` became a `LetRec` of a tail-recursive helper, and
/// so on (see [`crate::desugar`] for the exact rules).
#[derive(Clone, Debug, PartialEq)]
pub enum CoreExpr<T> {
    Literal(CoreLiteral, T, Location),
    Var(BinderId, String, T, Location),
    /// A reference to a name bound by an `external` declaration. Distinct
    /// from `Var` so the optimizer can refuse to ever inline across it.
    ExternalRef(String, T, Location),
    Lambda {
        param: BinderId,
        param_name: String,
        body: Box<CoreExpr<T>>,
        info: T,
        location: Location,
    },
    Application {
        func: Box<CoreExpr<T>>,
        arg: Box<CoreExpr<T>>,
        info: T,
        location: Location,
    },
    Let {
        binder: BinderId,
        name: String,
        mutable: bool,
        value: Box<CoreExpr<T>>,
        body: Box<CoreExpr<T>>,
        info: T,
        location: Location,
    },
    /// A single, possibly self-recursive binding. Mutually recursive groups
    /// desugar into nested `LetRec` nodes, one per binding, all sharing the
    /// same scope (consistent with §4.3's "mutual recursion" rule: every
    /// binder in the group is in scope for every binding's value).
    LetRec {
        bindings: Vec<(BinderId, String, CoreExpr<T>)>,
        body: Box<CoreExpr<T>>,
        info: T,
        location: Location,
    },
    Match {
        scrutinee: Box<CoreExpr<T>>,
        cases: Vec<CoreMatchCase<T>>,
        info: T,
        location: Location,
    },
    BinOp {
        op: CoreBinOp,
        left: Box<CoreExpr<T>>,
        right: Box<CoreExpr<T>>,
        info: T,
        location: Location,
    },
    UnOp {
        op: CoreUnOp,
        operand: Box<CoreExpr<T>>,
        info: T,
        location: Location,
    },
    Tuple(Vec<CoreExpr<T>>, T, Location),
    Record {
        fields: Vec<(String, CoreExpr<T>)>,
        info: T,
        location: Location,
    },
    FieldAccess {
        base: Box<CoreExpr<T>>,
        field: String,
        info: T,
        location: Location,
    },
    /// `{ r | f1: v1, f2: v2 }`, preserved as its own node (rather than
    /// desugared further) because the type checker needs `r`'s row to
    /// resolve which fields are untouched -- see §4.3.11.
    RecordUpdate {
        base: Box<CoreExpr<T>>,
        fields: Vec<(String, CoreExpr<T>)>,
        info: T,
        location: Location,
    },
    RefNew(Box<CoreExpr<T>>, T, Location),
    /// A `unsafe { .. }` boundary. The optimizer treats anything inside as
    /// opaque (never inlined across, never constant-folded through), and
    /// the checker marks the surrounding context as having unknown effects
    /// (§4.4.3).
    Unsafe(Box<CoreExpr<T>>, T, Location),
    /// A user-written `expr : Type` annotation (§3.4). The annotation's own
    /// resolved type is kept alongside the phase marker so the checker can
    /// unify it against the inner expression's inferred type without
    /// needing to re-resolve the surface `TypeExpr` -- resolution already
    /// happened once, at desugar time (see `crate::typechecker::resolve`).
    Annotation {
        expr: Box<CoreExpr<T>>,
        ty: crate::types::Type,
        info: T,
        location: Location,
    },
}

impl<T> CoreExpr<T> {
    pub fn info(&self) -> &T {
        match self {
            CoreExpr::Literal(_, t, _)
            | CoreExpr::Var(_, _, t, _)
            | CoreExpr::ExternalRef(_, t, _)
            | CoreExpr::Lambda { info: t, .. }
            | CoreExpr::Application { info: t, .. }
            | CoreExpr::Let { info: t, .. }
            | CoreExpr::LetRec { info: t, .. }
            | CoreExpr::Match { info: t, .. }
            | CoreExpr::BinOp { info: t, .. }
            | CoreExpr::UnOp { info: t, .. }
            | CoreExpr::Tuple(_, t, _)
            | CoreExpr::Record { info: t, .. }
            | CoreExpr::FieldAccess { info: t, .. }
            | CoreExpr::RecordUpdate { info: t, .. }
            | CoreExpr::RefNew(_, t, _)
            | CoreExpr::Unsafe(_, t, _)
            | CoreExpr::Annotation { info: t, .. } => t,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            CoreExpr::Literal(_, _, loc)
            | CoreExpr::Var(_, _, _, loc)
            | CoreExpr::ExternalRef(_, _, loc)
            | CoreExpr::Lambda { location: loc, .. }
            | CoreExpr::Application { location: loc, .. }
            | CoreExpr::Let { location: loc, .. }
            | CoreExpr::LetRec { location: loc, .. }
            | CoreExpr::Match { location: loc, .. }
            | CoreExpr::BinOp { location: loc, .. }
            | CoreExpr::UnOp { location: loc, .. }
            | CoreExpr::Tuple(_, _, loc)
            | CoreExpr::Record { location: loc, .. }
            | CoreExpr::FieldAccess { location: loc, .. }
            | CoreExpr::RecordUpdate { location: loc, .. }
            | CoreExpr::RefNew(_, _, loc)
            | CoreExpr::Unsafe(_, _, loc)
            | CoreExpr::Annotation { location: loc, .. } => loc,
        }
    }
}

impl fmt::Display for CoreBinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoreBinOp::Add => "+",
            CoreBinOp::Sub => "-",
            CoreBinOp::Mul => "*",
            CoreBinOp::Div => "/",
            CoreBinOp::Mod => "%",
            CoreBinOp::Eq => "==",
            CoreBinOp::NotEq => "!=",
            CoreBinOp::Lt => "<",
            CoreBinOp::Le => "<=",
            CoreBinOp::Gt => ">",
            CoreBinOp::Ge => ">=",
            CoreBinOp::And => "&&",
            CoreBinOp::Or => "||",
            CoreBinOp::Concat => "&",
            CoreBinOp::RefAssign => ":=",
        };
        write!(f, "{s}")
    }
}

/// Top-level declarations after desugaring: still one-to-one with surface
/// declarations (desugaring only rewrites expressions/patterns), except
/// `external` blocks that bundled multiple names are split into one
/// `CoreDeclaration::External` per name (§4.3's "externals expand to
/// multiple single declarations").
#[derive(Clone, Debug, PartialEq)]
pub enum CoreDeclaration<T> {
    Let {
        binder: BinderId,
        name: String,
        mutable: bool,
        value: CoreExpr<T>,
        exported: bool,
        location: Location,
    },
    LetRec {
        bindings: Vec<(BinderId, String, CoreExpr<T>)>,
        exported: bool,
        location: Location,
    },
    External {
        name: String,
        ty: crate::types::TypeScheme,
        location: Location,
    },
    TypeDef {
        name: String,
        def: Rc<crate::types::NominalDef>,
        exported: bool,
        location: Location,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoreModule<T> {
    pub declarations: Vec<CoreDeclaration<T>>,
    pub location: Location,
}
