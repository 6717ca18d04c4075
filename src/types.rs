//! Types, type schemes and nominal type definitions shared by the type
//! checker and the Core IR's phase marker.
//!
//! Inference follows Algorithm W extended with Rémy-style levels (rather
//! than explicit scope sets) to decide what a type variable may be
//! generalized over: every variable records the binding depth (`level`) at
//! which it was created, `enter_level`/`leave_level` bracket a `let`-bound
//! value's inference, and `generalize` quantifies over exactly the
//! variables whose level is deeper than the enclosing one. This is the
//! same technique OCaml's own type checker uses and composes cleanly with
//! the value restriction (`generalize` only runs for syntactic values).
//!
//! Records are represented as rows: a finite map of known fields plus a
//! tail that is either closed (this and only this field set) or an
//! unbound row variable (at least these fields, possibly more) --
//! unifying two rows with different but overlapping field sets is what
//! gives width subtyping its structural behaviour (see
//! [`crate::typechecker::unify`]).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub type VarId = u64;

#[derive(Debug)]
pub enum TypeVarState {
    Unbound { id: VarId, level: usize },
    Link(Type),
}

pub type TypeVar = Rc<RefCell<TypeVarState>>;

#[derive(Debug)]
pub enum RowVarState {
    Unbound { id: VarId, level: usize },
    Link(Row),
}

pub type RowVar = Rc<RefCell<RowVarState>>;

/// A row's tail: `Closed` means exactly the listed fields exist (a nominal
/// record or a fully-resolved record literal), `Open(v)` means "at least
/// these fields, and possibly more described by `v`".
#[derive(Clone, Debug)]
pub enum RowTail {
    Closed,
    Open(RowVar),
}

#[derive(Clone, Debug)]
pub struct Row {
    pub fields: BTreeMap<String, Type>,
    pub tail: RowTail,
}

impl Row {
    pub fn closed(fields: BTreeMap<String, Type>) -> Self {
        Row {
            fields,
            tail: RowTail::Closed,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    Unit,
    Var(TypeVar),
    Function(Box<Type>, Box<Type>),
    Tuple(Vec<Type>),
    Record(Row),
    Ref(Box<Type>),
    /// A user-declared variant or record type, applied to concrete type
    /// arguments. Type parameters are invariant: `List<Int>` and
    /// `List<Float>` never unify, matching a nominal (name-identity) type
    /// system rather than the structural treatment records get.
    Nominal {
        name: String,
        args: Vec<Type>,
        def: Rc<NominalDef>,
    },
    /// The fully opaque escape-hatch type used by `external` declarations
    /// whose JS-side shape isn't worth modeling. Unifies only with itself.
    Opaque,
    /// A reference to one of a [`NominalDef`]'s own type parameters, used
    /// only inside `NominalDef::shape` templates before a concrete
    /// application substitutes it away (see `instantiate_nominal`). Never
    /// appears in a type that has been through the checker.
    Param(String),
    /// Absorptive error type (§3.5, §4.4.5): assigned to a subterm after
    /// its own type error has already been reported, so it unifies with
    /// anything without raising further diagnostics and a single mistake
    /// does not cascade into unrelated "expected X, got error" noise.
    Error,
}

#[derive(Clone, Debug)]
pub struct VariantCtorDef {
    pub name: String,
    pub fields: Vec<Type>,
}

#[derive(Clone, Debug)]
pub enum NominalShape {
    Alias(Type),
    Variant(Vec<VariantCtorDef>),
    Record(BTreeMap<String, Type>),
}

#[derive(Clone, Debug)]
pub struct NominalDef {
    pub name: String,
    pub params: Vec<String>,
    pub shape: NominalShape,
}

impl PartialEq for NominalDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A `forall a1 .. an. tau` scheme, produced by generalizing a `let`-bound
/// value's inferred type. Instantiating a scheme replaces each quantified
/// variable with a fresh one at the current level.
#[derive(Clone, Debug)]
pub struct TypeScheme {
    pub vars: Vec<VarId>,
    pub ty: Type,
}

impl TypeScheme {
    pub fn monomorphic(ty: Type) -> Self {
        TypeScheme { vars: vec![], ty }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        structurally_eq(self, other)
    }
}

/// Structural equality that follows `Var` links but does *not* unify --
/// used by tests and by the optimizer's structural-hash fixed-point check,
/// never by the checker itself (which always goes through `unify`).
fn structurally_eq(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Int, Type::Int)
        | (Type::Float, Type::Float)
        | (Type::Bool, Type::Bool)
        | (Type::Str, Type::Str)
        | (Type::Unit, Type::Unit)
        | (Type::Opaque, Type::Opaque)
        | (Type::Error, Type::Error) => true,
        (Type::Function(a1, a2), Type::Function(b1, b2)) => structurally_eq(a1, b1) && structurally_eq(a2, b2),
        (Type::Tuple(a), Type::Tuple(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structurally_eq(x, y)),
        (Type::Ref(a), Type::Ref(b)) => structurally_eq(a, b),
        (Type::Nominal { name: n1, args: a1, .. }, Type::Nominal { name: n2, args: a2, .. }) => {
            n1 == n2 && a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| structurally_eq(x, y))
        }
        (Type::Record(r1), Type::Record(r2)) => {
            r1.fields.len() == r2.fields.len()
                && r1
                    .fields
                    .iter()
                    .all(|(k, v)| r2.fields.get(k).map(|v2| structurally_eq(v, v2)).unwrap_or(false))
        }
        (Type::Param(n1), Type::Param(n2)) => n1 == n2,
        (Type::Var(v1), Type::Var(v2)) => match (&*v1.borrow(), &*v2.borrow()) {
            (TypeVarState::Link(t1), _) => structurally_eq(t1, b),
            (_, TypeVarState::Link(t2)) => structurally_eq(a, t2),
            (TypeVarState::Unbound { id: i1, .. }, TypeVarState::Unbound { id: i2, .. }) => i1 == i2,
        },
        (Type::Var(v), _) => match &*v.borrow() {
            TypeVarState::Link(t) => structurally_eq(t, b),
            TypeVarState::Unbound { .. } => false,
        },
        (_, Type::Var(v)) => match &*v.borrow() {
            TypeVarState::Link(t) => structurally_eq(a, t),
            TypeVarState::Unbound { .. } => false,
        },
        _ => false,
    }
}

/// Follow `Var` links until reaching a non-`Link` representative. Does not
/// allocate; callers that need to recurse into a type's structure should
/// call this first (path is not compressed, matching a straightforward
/// textbook union-find-less implementation -- fine at our expected
/// program sizes).
pub fn prune(ty: &Type) -> Type {
    match ty {
        Type::Var(v) => {
            let linked = match &*v.borrow() {
                TypeVarState::Link(t) => Some(t.clone()),
                TypeVarState::Unbound { .. } => None,
            };
            match linked {
                Some(t) => prune(&t),
                None => ty.clone(),
            }
        }
        other => other.clone(),
    }
}

pub fn prune_row(row: &Row) -> Row {
    match &row.tail {
        RowTail::Open(v) => {
            let linked = match &*v.borrow() {
                RowVarState::Link(r) => Some(r.clone()),
                RowVarState::Unbound { .. } => None,
            };
            match linked {
                Some(inner) => {
                    let mut merged = prune_row(&inner);
                    for (k, v) in &row.fields {
                        merged.fields.insert(k.clone(), v.clone());
                    }
                    merged
                }
                None => row.clone(),
            }
        }
        RowTail::Closed => row.clone(),
    }
}

/// Fresh-variable and level bookkeeping for Algorithm W. Shared between the
/// type checker driver and unification.
#[derive(Debug)]
pub struct VarGen {
    next_id: Cell<VarId>,
    level: Cell<usize>,
}

impl Default for VarGen {
    fn default() -> Self {
        VarGen {
            next_id: Cell::new(0),
            level: Cell::new(0),
        }
    }
}

impl VarGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> usize {
        self.level.get()
    }

    pub fn enter_level(&self) {
        self.level.set(self.level.get() + 1);
    }

    pub fn leave_level(&self) {
        self.level.set(self.level.get() - 1);
    }

    pub fn fresh_var(&self) -> Type {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Type::Var(Rc::new(RefCell::new(TypeVarState::Unbound {
            id,
            level: self.level.get(),
        })))
    }

    pub fn fresh_row_var(&self) -> RowVar {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        Rc::new(RefCell::new(RowVarState::Unbound {
            id,
            level: self.level.get(),
        }))
    }

    pub fn fresh_open_row(&self, fields: BTreeMap<String, Type>) -> Row {
        Row {
            fields,
            tail: RowTail::Open(self.fresh_row_var()),
        }
    }
}

/// Quantify over every unbound variable in `ty` whose level is deeper than
/// `boundary_level` (the level of the enclosing `let`). Value restriction:
/// callers only invoke this for syntactic values (see
/// [`crate::typechecker::is_syntactic_value`]); function application
/// results are never generalized even when their type contains only
/// deep-level variables.
pub fn generalize(ty: &Type, boundary_level: usize) -> TypeScheme {
    let mut vars = Vec::new();
    collect_generalizable(ty, boundary_level, &mut vars);
    TypeScheme { vars, ty: ty.clone() }
}

fn collect_generalizable(ty: &Type, boundary_level: usize, out: &mut Vec<VarId>) {
    match prune(ty) {
        Type::Var(v) => {
            if let TypeVarState::Unbound { id, level } = &*v.borrow() {
                if *level > boundary_level && !out.contains(id) {
                    out.push(*id);
                }
            }
        }
        Type::Function(a, b) => {
            collect_generalizable(&a, boundary_level, out);
            collect_generalizable(&b, boundary_level, out);
        }
        Type::Tuple(items) => items.iter().for_each(|t| collect_generalizable(t, boundary_level, out)),
        Type::Ref(t) => collect_generalizable(&t, boundary_level, out),
        Type::Nominal { args, .. } => args.iter().for_each(|t| collect_generalizable(t, boundary_level, out)),
        Type::Record(row) => {
            let row = prune_row(&row);
            row.fields.values().for_each(|t| collect_generalizable(t, boundary_level, out));
            if let RowTail::Open(v) = &row.tail {
                if let RowVarState::Unbound { id, level } = &*v.borrow() {
                    if *level > boundary_level && !out.contains(id) {
                        out.push(*id);
                    }
                }
            }
        }
        Type::Int | Type::Float | Type::Bool | Type::Str | Type::Unit | Type::Opaque | Type::Param(_) | Type::Error => {}
    }
}

/// Instantiate a scheme: replace every quantified variable with a fresh one
/// minted at the current level.
pub fn instantiate(scheme: &TypeScheme, gen: &VarGen) -> Type {
    if scheme.vars.is_empty() {
        return scheme.ty.clone();
    }
    let mut mapping = BTreeMap::new();
    for &v in &scheme.vars {
        mapping.insert(v, gen.fresh_var());
    }
    substitute_vars(&scheme.ty, &mapping)
}

fn substitute_vars(ty: &Type, mapping: &BTreeMap<VarId, Type>) -> Type {
    match prune(ty) {
        Type::Var(v) => {
            if let TypeVarState::Unbound { id, .. } = &*v.borrow() {
                if let Some(fresh) = mapping.get(id) {
                    return fresh.clone();
                }
            }
            Type::Var(v)
        }
        Type::Function(a, b) => Type::Function(
            Box::new(substitute_vars(&a, mapping)),
            Box::new(substitute_vars(&b, mapping)),
        ),
        Type::Tuple(items) => Type::Tuple(items.iter().map(|t| substitute_vars(t, mapping)).collect()),
        Type::Ref(t) => Type::Ref(Box::new(substitute_vars(&t, mapping))),
        Type::Nominal { name, args, def } => Type::Nominal {
            name,
            args: args.iter().map(|t| substitute_vars(t, mapping)).collect(),
            def,
        },
        Type::Record(row) => {
            let row = prune_row(&row);
            Type::Record(Row {
                fields: row
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute_vars(v, mapping)))
                    .collect(),
                tail: row.tail,
            })
        }
        other => other,
    }
}

/// Substitute a [`NominalDef`]'s own type parameters with concrete `args`
/// inside one of its field-type templates (positional: `def.params[i]`
/// pairs with `args[i]`). Used whenever a variant constructor or record
/// field is checked against a nominal type applied to specific arguments.
pub fn instantiate_nominal(def: &NominalDef, args: &[Type], template: &Type) -> Type {
    let subst: BTreeMap<&str, &Type> = def
        .params
        .iter()
        .map(String::as_str)
        .zip(args.iter())
        .collect();
    substitute_params(template, &subst)
}

fn substitute_params(ty: &Type, subst: &BTreeMap<&str, &Type>) -> Type {
    match ty {
        Type::Param(name) => subst.get(name.as_str()).map(|t| (*t).clone()).unwrap_or_else(|| ty.clone()),
        Type::Function(a, b) => Type::Function(
            Box::new(substitute_params(a, subst)),
            Box::new(substitute_params(b, subst)),
        ),
        Type::Tuple(items) => Type::Tuple(items.iter().map(|t| substitute_params(t, subst)).collect()),
        Type::Ref(t) => Type::Ref(Box::new(substitute_params(t, subst))),
        Type::Nominal { name, args: inner, def } => Type::Nominal {
            name: name.clone(),
            args: inner.iter().map(|t| substitute_params(t, subst)).collect(),
            def: def.clone(),
        },
        Type::Record(row) => Type::Record(Row {
            fields: row
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), substitute_params(v, subst)))
                .collect(),
            tail: row.tail.clone(),
        }),
        other => other.clone(),
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match prune(self) {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::Str => write!(f, "String"),
            Type::Unit => write!(f, "Unit"),
            Type::Opaque => write!(f, "Type"),
            Type::Error => write!(f, "<error>"),
            Type::Param(name) => write!(f, "{name}"),
            Type::Var(v) => match &*v.borrow() {
                TypeVarState::Unbound { id, .. } => write!(f, "'t{id}"),
                TypeVarState::Link(t) => write!(f, "{t}"),
            },
            Type::Function(a, b) => write!(f, "({a}) -> {b}"),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Type::Ref(t) => write!(f, "Ref<{t}>"),
            Type::Nominal { name, args, .. } => {
                if args.is_empty() {
                    write!(f, "{name}")
                } else {
                    write!(f, "{name}<")?;
                    for (i, t) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{t}")?;
                    }
                    write!(f, ">")
                }
            }
            Type::Record(row) => {
                let row = prune_row(&row);
                write!(f, "{{")?;
                for (i, (k, v)) in row.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                if let RowTail::Open(_) = row.tail {
                    if !row.fields.is_empty() {
                        write!(f, " | ..")?;
                    } else {
                        write!(f, "..")?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_function_type() {
        let ty = Type::Function(Box::new(Type::Int), Box::new(Type::Int));
        assert_eq!(ty.to_string(), "(Int) -> Int");
    }

    #[test]
    fn test_display_record_type_is_sorted_by_field_name() {
        let mut fields = BTreeMap::new();
        fields.insert("y".to_string(), Type::Int);
        fields.insert("x".to_string(), Type::Int);
        let ty = Type::Record(Row::closed(fields));
        assert_eq!(ty.to_string(), "{x: Int, y: Int}");
    }

    #[test]
    fn test_display_open_record_shows_ellipsis() {
        let gen = VarGen::new();
        let row = gen.fresh_open_row([("x".to_string(), Type::Int)].into_iter().collect());
        let ty = Type::Record(row);
        assert_eq!(ty.to_string(), "{x: Int | ..}");
    }

    #[test]
    fn test_display_nominal_with_args() {
        let def = Rc::new(NominalDef {
            name: "List".to_string(),
            params: vec!["a".to_string()],
            shape: NominalShape::Alias(Type::Param("a".to_string())),
        });
        let ty = Type::Nominal { name: "List".to_string(), args: vec![Type::Int], def };
        assert_eq!(ty.to_string(), "List<Int>");
    }

    #[test]
    fn test_generalize_only_quantifies_vars_above_boundary_level() {
        let gen = VarGen::new();
        let outer = gen.fresh_var();
        gen.enter_level();
        let inner = gen.fresh_var();
        let fn_ty = Type::Function(Box::new(outer.clone()), Box::new(inner));

        let scheme = generalize(&fn_ty, 0);
        assert_eq!(scheme.vars.len(), 1, "only the deeper-level variable should be generalized");

        gen.leave_level();
        let _ = outer;
    }

    #[test]
    fn test_instantiate_replaces_quantified_vars_with_fresh_ones() {
        let gen = VarGen::new();
        gen.enter_level();
        let var = gen.fresh_var();
        gen.leave_level();
        let scheme = generalize(&var, 0);

        let t1 = instantiate(&scheme, &gen);
        let t2 = instantiate(&scheme, &gen);
        assert_ne!(t1, t2, "each instantiation should mint distinct fresh variables");
    }

    #[test]
    fn test_instantiate_monomorphic_scheme_returns_same_type() {
        let scheme = TypeScheme::monomorphic(Type::Int);
        let gen = VarGen::new();
        assert_eq!(instantiate(&scheme, &gen), Type::Int);
    }

    #[test]
    fn test_structurally_eq_follows_links_but_does_not_unify() {
        let gen = VarGen::new();
        let v1 = gen.fresh_var();
        let v2 = gen.fresh_var();
        assert_ne!(v1, v2, "two distinct unbound variables are not structurally equal");

        if let Type::Var(v) = &v1 {
            *v.borrow_mut() = TypeVarState::Link(Type::Int);
        }
        assert_eq!(v1, Type::Int);
    }

    #[test]
    fn test_instantiate_nominal_substitutes_positionally() {
        let def = NominalDef {
            name: "Box".to_string(),
            params: vec!["a".to_string()],
            shape: NominalShape::Alias(Type::Param("a".to_string())),
        };
        let result = instantiate_nominal(&def, &[Type::Bool], &Type::Param("a".to_string()));
        assert_eq!(result, Type::Bool);
    }
}
