//! Damas-Milner inference over Core IR (§4.4): `check_module` walks every
//! declaration, extending a shared [`Context`] as it goes, and returns a
//! tree where every node's phase marker is its own resolved
//! [`crate::types::Type`] (see the doc comment on `CoreExpr`'s `T`
//! parameter for why that is simpler than a mutable-slot representation).
//!
//! Diagnostics never abort the whole module: a failed subterm is assigned
//! [`Type::Error`] and its parent keeps going, so one mistake produces one
//! diagnostic rather than a cascade (§4.4.5).

pub mod context;
pub mod exhaustiveness;
pub mod prelude;
pub mod resolve;
pub mod unify;

pub use context::Context;

use crate::core::{
    CoreBinOp, CoreDeclaration, CoreExpr, CoreLiteral, CoreMatchCase, CoreModule, CorePattern, CoreUnOp,
};
use crate::diagnostics::{Diagnostic, Phase, Severity};
use crate::lexer::token::Location;
use crate::types::{generalize, instantiate, prune, Row, RowTail, Type, TypeScheme};

/// The type checker's output (§6.4): always produced, even when `module`
/// contains subterms typed [`Type::Error`] after a reported failure --
/// callers decide whether to proceed to the optimizer by checking whether
/// `diagnostics` contains any [`Severity::Error`] (per §7: "on any error,
/// compilation of the affected module fails and no IR is handed to the
/// code generator"; the checker itself never refuses to produce a tree).
pub struct TypedCore {
    pub module: CoreModule<Type>,
    pub diagnostics: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl TypedCore {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

struct Checker {
    ctx: Context,
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn error_type(&mut self, diag: Diagnostic) -> Type {
        self.diagnostics.push(diag);
        Type::Error
    }

    fn unify(&mut self, expected: &Type, actual: &Type, location: &Location) {
        if let Err(diag) = unify::unify(&self.ctx.gen, expected, actual, location) {
            self.diagnostics.push(diag);
        }
    }
}

pub fn check_module(module: &CoreModule<()>) -> TypedCore {
    log::trace!("typechecker: {} declarations", module.declarations.len());
    let mut checker = Checker { ctx: Context::new(), diagnostics: Vec::new() };

    for def in [prelude::list_def(), prelude::option_def(), prelude::result_def()] {
        checker.ctx.add_type(def);
    }

    // Register type declarations and externals first, so a value-level
    // binding earlier in the module can still reference a type or
    // external declared later in source order.
    for decl in &module.declarations {
        match decl {
            CoreDeclaration::TypeDef { def, .. } => checker.ctx.add_type(def.clone()),
            CoreDeclaration::External { name, ty, .. } => checker.ctx.add_external(name.clone(), ty.clone()),
            _ => {}
        }
    }

    let mut declarations = Vec::new();
    for decl in &module.declarations {
        declarations.push(check_declaration(&mut checker, decl));
    }

    let mut diagnostics = checker.diagnostics;
    crate::diagnostics::sort_diagnostics(&mut diagnostics);
    let warnings = diagnostics.iter().filter(|d| d.severity == Severity::Warning).cloned().collect();

    TypedCore { module: CoreModule { declarations, location: module.location.clone() }, diagnostics, warnings }
}

fn check_declaration(c: &mut Checker, decl: &CoreDeclaration<()>) -> CoreDeclaration<Type> {
    match decl {
        CoreDeclaration::Let { binder, name, mutable, value, exported, location } => {
            c.ctx.gen.enter_level();
            let typed_value = infer(c, value);
            c.ctx.gen.leave_level();

            let value_ty = prune(typed_value.info());
            let scheme = if is_syntactic_value(value) {
                generalize(&value_ty, c.ctx.gen.level())
            } else {
                TypeScheme::monomorphic(value_ty)
            };
            c.ctx.bind_variable(*binder, scheme, *mutable);

            CoreDeclaration::Let {
                binder: *binder,
                name: name.clone(),
                mutable: *mutable,
                value: typed_value,
                exported: *exported,
                location: location.clone(),
            }
        }
        CoreDeclaration::LetRec { bindings, exported, location } => {
            let typed = check_letrec_bindings(c, bindings);
            CoreDeclaration::LetRec { bindings: typed, exported: *exported, location: location.clone() }
        }
        CoreDeclaration::External { name, ty, location } => {
            CoreDeclaration::External { name: name.clone(), ty: ty.clone(), location: location.clone() }
        }
        CoreDeclaration::TypeDef { name, def, exported, location } => {
            CoreDeclaration::TypeDef { name: name.clone(), def: def.clone(), exported: *exported, location: location.clone() }
        }
    }
}

fn check_letrec_bindings(c: &mut Checker, bindings: &[(crate::core::BinderId, String, CoreExpr<()>)]) -> Vec<(crate::core::BinderId, String, CoreExpr<Type>)> {
    c.ctx.gen.enter_level();
    c.ctx.enter_scope();

    let placeholders: Vec<Type> = bindings.iter().map(|_| c.ctx.gen.fresh_var()).collect();
    for ((binder, _, _), ty) in bindings.iter().zip(&placeholders) {
        c.ctx.bind_variable(*binder, TypeScheme::monomorphic(ty.clone()), false);
    }

    let mut typed = Vec::new();
    for ((binder, name, value), placeholder) in bindings.iter().zip(&placeholders) {
        let typed_value = infer(c, value);
        c.unify(placeholder, typed_value.info(), value.location());
        typed.push((*binder, name.clone(), typed_value));
    }

    c.ctx.exit_scope();
    c.ctx.gen.leave_level();

    // Each binding generalizes independently over its own (now fully
    // resolved) type, subject to value restriction (§4.4.1, §4.4.3), and
    // rebinds into whatever scope was already current when this function
    // was called: the module root scope for a top-level `let rec` (so the
    // bindings stay visible for the rest of the module, the same way a
    // top-level `let` does), or the caller's own bracketing scope for a
    // `let rec ... in` expression (so the bindings go out of scope at the
    // matching `exit_scope` the caller performs around its body).
    for ((binder, _, value), placeholder) in bindings.iter().zip(&placeholders) {
        let ty = prune(placeholder);
        let scheme = if is_syntactic_value(value) {
            generalize(&ty, c.ctx.gen.level())
        } else {
            TypeScheme::monomorphic(ty)
        };
        c.ctx.bind_variable(*binder, scheme, false);
    }
    typed
}

/// A `let`/`let rec` binding is only generalized if its right-hand side is
/// a syntactic value (§4.4.1, value restriction) -- checked directly on
/// the pre-typechecking Core IR shape, since "is this a value" never
/// depends on inferred types.
fn is_syntactic_value(expr: &CoreExpr<()>) -> bool {
    match expr {
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) | CoreExpr::Lambda { .. } => true,
        CoreExpr::Tuple(items, ..) => items.iter().all(is_syntactic_value),
        CoreExpr::Record { fields, .. } => fields.iter().all(|(_, v)| is_syntactic_value(v)),
        CoreExpr::Application { func, arg, .. } => is_constructor_application(func) && is_syntactic_value(arg),
        CoreExpr::Annotation { expr, .. } => is_syntactic_value(expr),
        _ => false,
    }
}

fn is_constructor_application(expr: &CoreExpr<()>) -> bool {
    match expr {
        CoreExpr::ExternalRef(name, ..) => name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false),
        CoreExpr::Application { func, arg, .. } => is_constructor_application(func) && is_syntactic_value(arg),
        _ => false,
    }
}

fn infer(c: &mut Checker, expr: &CoreExpr<()>) -> CoreExpr<Type> {
    match expr {
        CoreExpr::Literal(lit, _, loc) => {
            let ty = literal_type(lit);
            CoreExpr::Literal(lit.clone(), ty, loc.clone())
        }
        CoreExpr::Var(binder, name, _, loc) => {
            let ty = match c.ctx.lookup_variable(*binder) {
                Some(entry) => instantiate(&entry.scheme, &c.ctx.gen),
                None => c.error_type(Diagnostic::error(
                    "VF4101",
                    Phase::TypeChecker,
                    format!("unknown identifier `{name}`"),
                    loc.clone(),
                )),
            };
            CoreExpr::Var(*binder, name.clone(), ty, loc.clone())
        }
        CoreExpr::ExternalRef(name, _, loc) => {
            let ty = resolve_external_or_ctor(c, name, loc);
            CoreExpr::ExternalRef(name.clone(), ty, loc.clone())
        }
        CoreExpr::Lambda { param, param_name, body, location, .. } => {
            let param_ty = c.ctx.gen.fresh_var();
            c.ctx.enter_scope();
            c.ctx.bind_variable(*param, TypeScheme::monomorphic(param_ty.clone()), false);
            let typed_body = infer(c, body);
            c.ctx.exit_scope();
            let fn_ty = Type::Function(Box::new(param_ty), Box::new(typed_body.info().clone()));
            CoreExpr::Lambda {
                param: *param,
                param_name: param_name.clone(),
                body: Box::new(typed_body),
                info: fn_ty,
                location: location.clone(),
            }
        }
        CoreExpr::Application { func, arg, location, .. } => {
            let typed_func = infer(c, func);
            let typed_arg = infer(c, arg);
            let result_ty = c.ctx.gen.fresh_var();
            let expected_fn = Type::Function(Box::new(typed_arg.info().clone()), Box::new(result_ty.clone()));
            c.unify(&expected_fn, typed_func.info(), location);
            CoreExpr::Application {
                func: Box::new(typed_func),
                arg: Box::new(typed_arg),
                info: result_ty,
                location: location.clone(),
            }
        }
        CoreExpr::Let { binder, name, mutable, value, body, location, .. } => {
            c.ctx.gen.enter_level();
            let typed_value = infer(c, value);
            c.ctx.gen.leave_level();

            if *mutable {
                let inner = c.ctx.gen.fresh_var();
                c.unify(&Type::Ref(Box::new(inner)), typed_value.info(), location);
            }

            let scheme = if is_syntactic_value(value) {
                generalize(typed_value.info(), c.ctx.gen.level())
            } else {
                TypeScheme::monomorphic(prune(typed_value.info()))
            };
            c.ctx.enter_scope();
            c.ctx.bind_variable(*binder, scheme, *mutable);
            let typed_body = infer(c, body);
            c.ctx.exit_scope();

            let info = typed_body.info().clone();
            CoreExpr::Let {
                binder: *binder,
                name: name.clone(),
                mutable: *mutable,
                value: Box::new(typed_value),
                body: Box::new(typed_body),
                info,
                location: location.clone(),
            }
        }
        CoreExpr::LetRec { bindings, body, location, .. } => {
            c.ctx.enter_scope();
            let typed_bindings = check_letrec_bindings(c, bindings);
            let typed_body = infer(c, body);
            c.ctx.exit_scope();
            let info = typed_body.info().clone();
            CoreExpr::LetRec { bindings: typed_bindings, body: Box::new(typed_body), info, location: location.clone() }
        }
        CoreExpr::Match { scrutinee, cases, location, .. } => infer_match(c, scrutinee, cases, location),
        CoreExpr::BinOp { op, left, right, location, .. } => infer_binop(c, *op, left, right, location),
        CoreExpr::UnOp { op, operand, location, .. } => infer_unop(c, *op, operand, location),
        CoreExpr::Tuple(items, _, loc) => {
            let typed_items: Vec<_> = items.iter().map(|i| infer(c, i)).collect();
            let ty = Type::Tuple(typed_items.iter().map(|i| i.info().clone()).collect());
            CoreExpr::Tuple(typed_items, ty, loc.clone())
        }
        CoreExpr::Record { fields, location, .. } => {
            let mut typed_fields = Vec::new();
            let mut row = std::collections::BTreeMap::new();
            for (name, value) in fields {
                let typed_value = infer(c, value);
                row.insert(name.clone(), typed_value.info().clone());
                typed_fields.push((name.clone(), typed_value));
            }
            CoreExpr::Record { fields: typed_fields, info: Type::Record(Row::closed(row)), location: location.clone() }
        }
        CoreExpr::FieldAccess { base, field, location, .. } => {
            let typed_base = infer(c, base);
            let field_ty = c.ctx.gen.fresh_var();
            let mut fields = std::collections::BTreeMap::new();
            fields.insert(field.clone(), field_ty.clone());
            let expected = Type::Record(c.ctx.gen.fresh_open_row(fields));
            c.unify(&expected, typed_base.info(), location);
            CoreExpr::FieldAccess { base: Box::new(typed_base), field: field.clone(), info: field_ty, location: location.clone() }
        }
        CoreExpr::RecordUpdate { base, fields, location, .. } => {
            let typed_base = infer(c, base);
            let mut typed_fields = Vec::new();
            let mut required = std::collections::BTreeMap::new();
            for (name, value) in fields {
                let typed_value = infer(c, value);
                required.insert(name.clone(), typed_value.info().clone());
                typed_fields.push((name.clone(), typed_value));
            }
            let expected = Type::Record(c.ctx.gen.fresh_open_row(required));
            c.unify(&expected, typed_base.info(), location);
            let info = typed_base.info().clone();
            CoreExpr::RecordUpdate { base: Box::new(typed_base), fields: typed_fields, info, location: location.clone() }
        }
        CoreExpr::RefNew(inner, _, loc) => {
            let typed_inner = infer(c, inner);
            let ty = Type::Ref(Box::new(typed_inner.info().clone()));
            CoreExpr::RefNew(Box::new(typed_inner), ty, loc.clone())
        }
        CoreExpr::Unsafe(inner, _, loc) => {
            let typed_inner = infer(c, inner);
            let info = typed_inner.info().clone();
            CoreExpr::Unsafe(Box::new(typed_inner), info, loc.clone())
        }
        CoreExpr::Annotation { expr, ty, location, .. } => {
            let typed_expr = infer(c, expr);
            let resolved_ty = resolve::rehydrate(&c.ctx.types, ty);
            c.unify(&resolved_ty, typed_expr.info(), location);
            CoreExpr::Annotation {
                expr: Box::new(typed_expr),
                ty: resolved_ty.clone(),
                info: resolved_ty,
                location: location.clone(),
            }
        }
    }
}

fn literal_type(lit: &CoreLiteral) -> Type {
    match lit {
        CoreLiteral::Int(_) => Type::Int,
        CoreLiteral::Float(_) => Type::Float,
        CoreLiteral::Str(_) => Type::Str,
        CoreLiteral::Bool(_) => Type::Bool,
        CoreLiteral::Unit => Type::Unit,
    }
}

/// `ExternalRef` also carries the prelude's bare `Cons`/`Nil` constructor
/// names (minted by the desugarer's list-literal/cons-operator lowering),
/// so this resolves against both the external table and the variant
/// constructor table before giving up.
fn resolve_external_or_ctor(c: &mut Checker, name: &str, loc: &Location) -> Type {
    if let Some(scheme) = c.ctx.get_external(name) {
        return instantiate(scheme, &c.ctx.gen);
    }
    if let Some((def, field_templates)) = c.ctx.resolve_ctor(name) {
        let mut arg_vars = Vec::new();
        let subst_args: Vec<Type> = def.params.iter().map(|_| c.ctx.gen.fresh_var()).collect();
        for template in &field_templates {
            let field_ty = crate::types::instantiate_nominal(&def, &subst_args, template);
            arg_vars.push(resolve::rehydrate(&c.ctx.types, &field_ty));
        }
        let result = Type::Nominal { name: def.name.clone(), args: subst_args, def: def.clone() };
        let mut fn_ty = result;
        for arg_ty in arg_vars.into_iter().rev() {
            fn_ty = Type::Function(Box::new(arg_ty), Box::new(fn_ty));
        }
        return fn_ty;
    }
    c.error_type(Diagnostic::error(
        "VF4101",
        Phase::TypeChecker,
        format!("unknown external or constructor `{name}`"),
        loc.clone(),
    ))
}

fn infer_match(c: &mut Checker, scrutinee: &CoreExpr<()>, cases: &[CoreMatchCase<()>], location: &Location) -> CoreExpr<Type> {
    let typed_scrutinee = infer(c, scrutinee);
    let scrutinee_ty = typed_scrutinee.info().clone();
    let result_ty = c.ctx.gen.fresh_var();

    let mut typed_cases = Vec::new();
    for case in cases {
        c.ctx.enter_scope();
        let typed_pattern = check_pattern(c, &case.pattern, &scrutinee_ty);
        let typed_guard = case.guard.as_ref().map(|g| {
            let typed_g = infer(c, g);
            c.unify(&Type::Bool, typed_g.info(), g.location());
            typed_g
        });
        let typed_body = infer(c, &case.body);
        c.unify(&result_ty, typed_body.info(), case.body.location());
        c.ctx.exit_scope();
        typed_cases.push(CoreMatchCase { pattern: typed_pattern, guard: typed_guard, body: typed_body, location: case.location.clone() });
    }

    let scrutinee_resolved = prune(&scrutinee_ty);
    let exhaustiveness_diags = exhaustiveness::check_match(&typed_cases, &scrutinee_resolved, location, is_useless_guard);
    c.diagnostics.extend(exhaustiveness_diags);

    CoreExpr::Match {
        scrutinee: Box::new(typed_scrutinee),
        cases: typed_cases,
        info: result_ty,
        location: location.clone(),
    }
}

/// A guard is "useless" for exhaustiveness purposes only when it can never
/// actually reject the arm -- i.e. the literal `true`. Anything else (a
/// variable, a comparison, a call) might evaluate to `false` at runtime, so
/// the arm underneath it cannot be counted as unconditionally covering its
/// pattern.
fn is_useless_guard(guard: &CoreExpr<Type>) -> bool {
    matches!(guard, CoreExpr::Literal(CoreLiteral::Bool(true), ..))
}

/// Conservative syntactic rule for "does this guard touch externally
/// visible effects" (§9 Open Questions #3, resolved in `DESIGN.md`): a
/// guard is pure unless it references an `external` or performs a ref
/// operation, in which case reordering its arm could change observable
/// behaviour. Used by the optimizer's arm-reorder pass, not by
/// exhaustiveness checking.
pub(crate) fn is_pure_guard(guard: &CoreExpr<Type>) -> bool {
    match guard {
        CoreExpr::ExternalRef(..) => false,
        CoreExpr::UnOp { op: CoreUnOp::Deref, .. } => false,
        CoreExpr::BinOp { op: CoreBinOp::RefAssign, .. } => false,
        CoreExpr::Literal(..) | CoreExpr::Var(..) => true,
        CoreExpr::Application { func, arg, .. } => is_pure_guard(func) && is_pure_guard(arg),
        CoreExpr::BinOp { left, right, .. } => is_pure_guard(left) && is_pure_guard(right),
        CoreExpr::UnOp { operand, .. } => is_pure_guard(operand),
        CoreExpr::Tuple(items, ..) => items.iter().all(is_pure_guard),
        CoreExpr::FieldAccess { base, .. } => is_pure_guard(base),
        CoreExpr::Record { fields, .. } => fields.iter().all(|(_, v)| is_pure_guard(v)),
        CoreExpr::Annotation { expr, .. } => is_pure_guard(expr),
        CoreExpr::Match { .. } | CoreExpr::Let { .. } | CoreExpr::LetRec { .. } | CoreExpr::Lambda { .. } | CoreExpr::Unsafe(..) => false,
        _ => true,
    }
}

fn check_pattern(c: &mut Checker, pattern: &CorePattern<()>, scrutinee_ty: &Type) -> CorePattern<Type> {
    match pattern {
        CorePattern::Wildcard(_, loc) => CorePattern::Wildcard(scrutinee_ty.clone(), loc.clone()),
        CorePattern::Variable(binder, name, _, loc) => {
            c.ctx.bind_variable(*binder, TypeScheme::monomorphic(scrutinee_ty.clone()), false);
            CorePattern::Variable(*binder, name.clone(), scrutinee_ty.clone(), loc.clone())
        }
        CorePattern::Literal(lit, _, loc) => {
            let lit_ty = literal_type(lit);
            c.unify(scrutinee_ty, &lit_ty, loc);
            CorePattern::Literal(lit.clone(), lit_ty, loc.clone())
        }
        CorePattern::Variant { name, args, location, .. } => check_variant_pattern(c, name, args, scrutinee_ty, location),
        CorePattern::Tuple(items, _, loc) => {
            let item_vars: Vec<Type> = items.iter().map(|_| c.ctx.gen.fresh_var()).collect();
            c.unify(scrutinee_ty, &Type::Tuple(item_vars.clone()), loc);
            let typed_items = items.iter().zip(&item_vars).map(|(p, t)| check_pattern(c, p, t)).collect();
            CorePattern::Tuple(typed_items, Type::Tuple(item_vars), loc.clone())
        }
        CorePattern::Record { fields, info: _, location } => {
            let mut required = std::collections::BTreeMap::new();
            let mut field_vars = Vec::new();
            for (name, _) in fields {
                let v = c.ctx.gen.fresh_var();
                required.insert(name.clone(), v.clone());
                field_vars.push(v);
            }
            let expected = Type::Record(c.ctx.gen.fresh_open_row(required));
            c.unify(scrutinee_ty, &expected, location);
            let typed_fields = fields
                .iter()
                .zip(field_vars)
                .map(|((name, p), v)| (name.clone(), check_pattern(c, p, &v)))
                .collect();
            CorePattern::Record { fields: typed_fields, info: scrutinee_ty.clone(), location: location.clone() }
        }
    }
}

fn check_variant_pattern(c: &mut Checker, name: &str, args: &[CorePattern<()>], scrutinee_ty: &Type, location: &Location) -> CorePattern<Type> {
    let Some((def, field_templates)) = c.ctx.resolve_ctor(name) else {
        let err = c.error_type(Diagnostic::error(
            "VF4102",
            Phase::TypeChecker,
            format!("unknown constructor `{name}`"),
            location.clone(),
        ));
        let typed_args = args.iter().map(|p| check_pattern(c, p, &err)).collect();
        return CorePattern::Variant { name: name.to_string(), args: typed_args, info: err, location: location.clone() };
    };

    if field_templates.len() != args.len() {
        c.diagnostics.push(Diagnostic::error(
            "VF4103",
            Phase::TypeChecker,
            format!("constructor `{name}` expects {} argument(s), got {}", field_templates.len(), args.len()),
            location.clone(),
        ));
    }

    let subst_args: Vec<Type> = def.params.iter().map(|_| c.ctx.gen.fresh_var()).collect();
    let nominal_ty = Type::Nominal { name: def.name.clone(), args: subst_args.clone(), def: def.clone() };
    c.unify(scrutinee_ty, &nominal_ty, location);

    let mut typed_args = Vec::new();
    for (i, arg) in args.iter().enumerate() {
        let field_ty = field_templates
            .get(i)
            .map(|t| resolve::rehydrate(&c.ctx.types, &crate::types::instantiate_nominal(&def, &subst_args, t)))
            .unwrap_or(Type::Error);
        typed_args.push(check_pattern(c, arg, &field_ty));
    }

    CorePattern::Variant { name: name.to_string(), args: typed_args, info: nominal_ty, location: location.clone() }
}

fn infer_binop(c: &mut Checker, op: CoreBinOp, left: &CoreExpr<()>, right: &CoreExpr<()>, location: &Location) -> CoreExpr<Type> {
    let typed_left = infer(c, left);
    let typed_right = infer(c, right);
    let info = match op {
        CoreBinOp::Add | CoreBinOp::Sub | CoreBinOp::Mul | CoreBinOp::Div | CoreBinOp::Mod => {
            // Numeric operators do not implicitly convert: both operands
            // must already agree on Int vs. Float (§4.4.3 "Numeric"), and
            // neither side may be some other type that merely happens to
            // unify with itself (string concatenation has its own `&`
            // operator, see the Concat arm below).
            c.unify(typed_left.info(), typed_right.info(), location);
            match prune(typed_left.info()) {
                Type::Int | Type::Float | Type::Error => {}
                other => {
                    c.diagnostics.push(
                        Diagnostic::error("VF4104", Phase::TypeChecker, format!("operator `{op}` requires Int or Float operands"), location.clone())
                            .with_types("Int or Float", other.to_string()),
                    );
                }
            }
            typed_left.info().clone()
        }
        CoreBinOp::Eq | CoreBinOp::NotEq | CoreBinOp::Lt | CoreBinOp::Le | CoreBinOp::Gt | CoreBinOp::Ge => {
            c.unify(typed_left.info(), typed_right.info(), location);
            Type::Bool
        }
        CoreBinOp::And | CoreBinOp::Or => {
            c.unify(&Type::Bool, typed_left.info(), location);
            c.unify(&Type::Bool, typed_right.info(), location);
            Type::Bool
        }
        CoreBinOp::Concat => {
            c.unify(&Type::Str, typed_left.info(), location);
            c.unify(&Type::Str, typed_right.info(), location);
            Type::Str
        }
        CoreBinOp::RefAssign => {
            let inner = c.ctx.gen.fresh_var();
            c.unify(&Type::Ref(Box::new(inner.clone())), typed_left.info(), location);
            c.unify(&inner, typed_right.info(), location);
            Type::Unit
        }
    };
    CoreExpr::BinOp { op, left: Box::new(typed_left), right: Box::new(typed_right), info, location: location.clone() }
}

fn infer_unop(c: &mut Checker, op: CoreUnOp, operand: &CoreExpr<()>, location: &Location) -> CoreExpr<Type> {
    let typed_operand = infer(c, operand);
    let info = match op {
        CoreUnOp::Neg => typed_operand.info().clone(),
        CoreUnOp::Deref => {
            let inner = c.ctx.gen.fresh_var();
            c.unify(&Type::Ref(Box::new(inner.clone())), typed_operand.info(), location);
            inner
        }
    };
    CoreExpr::UnOp { op, operand: Box::new(typed_operand), info, location: location.clone() }
}

/// Re-type-checks already-typed Core IR (dropping its type annotations
/// first): used by the optimizer's invariant check (§4.5.7, §8 "optimize
/// is type-preserving") and by tests that assert `optimize` doesn't change
/// principal types.
pub fn recheck(module: &CoreModule<Type>) -> TypedCore {
    check_module(&erase_types(module))
}

fn erase_types(module: &CoreModule<Type>) -> CoreModule<()> {
    CoreModule {
        declarations: module.declarations.iter().map(erase_decl).collect(),
        location: module.location.clone(),
    }
}

fn erase_decl(decl: &CoreDeclaration<Type>) -> CoreDeclaration<()> {
    match decl {
        CoreDeclaration::Let { binder, name, mutable, value, exported, location } => CoreDeclaration::Let {
            binder: *binder,
            name: name.clone(),
            mutable: *mutable,
            value: erase_expr(value),
            exported: *exported,
            location: location.clone(),
        },
        CoreDeclaration::LetRec { bindings, exported, location } => CoreDeclaration::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), erase_expr(v))).collect(),
            exported: *exported,
            location: location.clone(),
        },
        CoreDeclaration::External { name, ty, location } => {
            CoreDeclaration::External { name: name.clone(), ty: ty.clone(), location: location.clone() }
        }
        CoreDeclaration::TypeDef { name, def, exported, location } => {
            CoreDeclaration::TypeDef { name: name.clone(), def: def.clone(), exported: *exported, location: location.clone() }
        }
    }
}

fn erase_expr(expr: &CoreExpr<Type>) -> CoreExpr<()> {
    match expr {
        CoreExpr::Literal(l, _, loc) => CoreExpr::Literal(l.clone(), (), loc.clone()),
        CoreExpr::Var(b, n, _, loc) => CoreExpr::Var(*b, n.clone(), (), loc.clone()),
        CoreExpr::ExternalRef(n, _, loc) => CoreExpr::ExternalRef(n.clone(), (), loc.clone()),
        CoreExpr::Lambda { param, param_name, body, location, .. } => CoreExpr::Lambda {
            param: *param,
            param_name: param_name.clone(),
            body: Box::new(erase_expr(body)),
            info: (),
            location: location.clone(),
        },
        CoreExpr::Application { func, arg, location, .. } => CoreExpr::Application {
            func: Box::new(erase_expr(func)),
            arg: Box::new(erase_expr(arg)),
            info: (),
            location: location.clone(),
        },
        CoreExpr::Let { binder, name, mutable, value, body, location, .. } => CoreExpr::Let {
            binder: *binder,
            name: name.clone(),
            mutable: *mutable,
            value: Box::new(erase_expr(value)),
            body: Box::new(erase_expr(body)),
            info: (),
            location: location.clone(),
        },
        CoreExpr::LetRec { bindings, body, location, .. } => CoreExpr::LetRec {
            bindings: bindings.iter().map(|(b, n, v)| (*b, n.clone(), erase_expr(v))).collect(),
            body: Box::new(erase_expr(body)),
            info: (),
            location: location.clone(),
        },
        CoreExpr::Match { scrutinee, cases, location, .. } => CoreExpr::Match {
            scrutinee: Box::new(erase_expr(scrutinee)),
            cases: cases
                .iter()
                .map(|case| CoreMatchCase {
                    pattern: erase_pattern(&case.pattern),
                    guard: case.guard.as_ref().map(erase_expr),
                    body: erase_expr(&case.body),
                    location: case.location.clone(),
                })
                .collect(),
            info: (),
            location: location.clone(),
        },
        CoreExpr::BinOp { op, left, right, location, .. } => CoreExpr::BinOp {
            op: *op,
            left: Box::new(erase_expr(left)),
            right: Box::new(erase_expr(right)),
            info: (),
            location: location.clone(),
        },
        CoreExpr::UnOp { op, operand, location, .. } => {
            CoreExpr::UnOp { op: *op, operand: Box::new(erase_expr(operand)), info: (), location: location.clone() }
        }
        CoreExpr::Tuple(items, _, loc) => CoreExpr::Tuple(items.iter().map(erase_expr).collect(), (), loc.clone()),
        CoreExpr::Record { fields, location, .. } => CoreExpr::Record {
            fields: fields.iter().map(|(n, v)| (n.clone(), erase_expr(v))).collect(),
            info: (),
            location: location.clone(),
        },
        CoreExpr::FieldAccess { base, field, location, .. } => {
            CoreExpr::FieldAccess { base: Box::new(erase_expr(base)), field: field.clone(), info: (), location: location.clone() }
        }
        CoreExpr::RecordUpdate { base, fields, location, .. } => CoreExpr::RecordUpdate {
            base: Box::new(erase_expr(base)),
            fields: fields.iter().map(|(n, v)| (n.clone(), erase_expr(v))).collect(),
            info: (),
            location: location.clone(),
        },
        CoreExpr::RefNew(inner, _, loc) => CoreExpr::RefNew(Box::new(erase_expr(inner)), (), loc.clone()),
        CoreExpr::Unsafe(inner, _, loc) => CoreExpr::Unsafe(Box::new(erase_expr(inner)), (), loc.clone()),
        CoreExpr::Annotation { expr, ty, location, .. } => {
            CoreExpr::Annotation { expr: Box::new(erase_expr(expr)), ty: ty.clone(), info: (), location: location.clone() }
        }
    }
}

fn erase_pattern(pattern: &CorePattern<Type>) -> CorePattern<()> {
    match pattern {
        CorePattern::Wildcard(_, loc) => CorePattern::Wildcard((), loc.clone()),
        CorePattern::Variable(b, n, _, loc) => CorePattern::Variable(*b, n.clone(), (), loc.clone()),
        CorePattern::Literal(l, _, loc) => CorePattern::Literal(l.clone(), (), loc.clone()),
        CorePattern::Variant { name, args, location, .. } => {
            CorePattern::Variant { name: name.clone(), args: args.iter().map(erase_pattern).collect(), info: (), location: location.clone() }
        }
        CorePattern::Tuple(items, _, loc) => CorePattern::Tuple(items.iter().map(erase_pattern).collect(), (), loc.clone()),
        CorePattern::Record { fields, location, .. } => CorePattern::Record {
            fields: fields.iter().map(|(n, p)| (n.clone(), erase_pattern(p))).collect(),
            info: (),
            location: location.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desugar;
    use crate::lexer;
    use crate::parser;

    fn check_source(src: &str) -> TypedCore {
        let tokens = lexer::lex("test.vf", src).expect("lex");
        let module = parser::parse(tokens, parser::ParserOptions::default()).expect("parse");
        let core = desugar::desugar(&module).expect("desugar");
        check_module(&core)
    }

    #[test]
    fn test_identity_function_is_polymorphic() {
        let typed = check_source("let id = (x) => x;");
        assert!(!typed.has_errors());
        let CoreDeclaration::Let { value, .. } = &typed.module.declarations[0] else { panic!() };
        assert!(matches!(value.info(), Type::Function(..)));
    }

    #[test]
    fn test_width_subtyping_via_field_access() {
        let typed = check_source("let getX = (p) => p.x;");
        assert!(!typed.has_errors());
        let CoreDeclaration::Let { value, .. } = &typed.module.declarations[0] else { panic!() };
        let Type::Function(param, ret) = value.info() else { panic!() };
        assert!(matches!(&**param, Type::Record(_)));
        assert!(matches!(&**ret, Type::Var(_)));
    }

    #[test]
    fn test_int_float_do_not_unify() {
        let typed = check_source("let bad = 1 + 1.0;");
        assert!(typed.has_errors());
    }

    #[test]
    fn test_non_exhaustive_match_is_error() {
        let typed = check_source("type Color = | Red | Green | Blue; let f = (c) => match c { | Red => 1 | Green => 2 };");
        assert!(typed.diagnostics.iter().any(|d| d.code == "VF4400"));
    }

    #[test]
    fn test_exhaustive_match_passes() {
        let typed = check_source("type Color = | Red | Green | Blue; let f = (c) => match c { | Red => 1 | Green => 2 | Blue => 3 };");
        assert!(!typed.has_errors());
    }

    #[test]
    fn test_mutable_let_requires_ref() {
        let typed = check_source("let mut x = 1; let y = !x;");
        assert!(!typed.has_errors());
        let CoreDeclaration::Let { value, .. } = &typed.module.declarations[0] else { panic!() };
        assert!(matches!(value.info(), Type::Ref(_)));
    }

    #[test]
    fn test_unknown_identifier_is_error() {
        let typed = check_source("let x = totallyUnknownName;");
        assert!(typed.diagnostics.iter().any(|d| d.code == "VF4101"));
    }

    #[test]
    fn test_string_concat_operator_returns_str() {
        let typed = check_source(r#"let x = "a" & "b";"#);
        assert!(!typed.has_errors());
        let CoreDeclaration::Let { value, .. } = &typed.module.declarations[0] else { panic!() };
        assert_eq!(*value.info(), Type::Str);
    }

    #[test]
    fn test_plus_on_strings_is_rejected_in_favor_of_concat() {
        let typed = check_source(r#"let x = "a" + "b";"#);
        assert!(typed.diagnostics.iter().any(|d| d.code == "VF4104"));
    }
}
