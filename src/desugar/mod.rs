//! Total, pure translation from the surface AST to Core IR (§4.3).
//!
//! Name resolution happens here, not in the type checker: every binding
//! occurrence (lambda parameter, `let`/`let rec` name, pattern variable) is
//! assigned a fresh [`BinderId`] the moment it is desugared, and every
//! variable reference is resolved against a lexical scope stack to either
//! that id, an [`crate::core::CoreExpr::ExternalRef`], or -- if the name is
//! genuinely unbound -- a binder id that resolves to nothing, deferring
//! "unknown identifier" to the type checker (§7: unknown-identifier is a
//! `VF4xxx`, not a desugarer error) rather than failing here.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::*;
use crate::core::{
    BinderId, CoreBinOp, CoreDeclaration, CoreExpr, CoreLiteral, CoreMatchCase, CoreModule, CorePattern, CoreUnOp,
};
use crate::diagnostics::{Diagnostic, Phase};
use crate::lexer::token::Location;
use crate::types::{NominalDef, NominalShape, Type, TypeScheme, VarGen, VariantCtorDef};
use crate::typechecker::resolve::resolve_type_expr;

struct Scope {
    frames: Vec<HashMap<String, BinderId>>,
}

impl Scope {
    fn new() -> Self {
        Scope { frames: vec![HashMap::new()] }
    }

    fn enter(&mut self) {
        self.frames.push(HashMap::new());
    }

    fn exit(&mut self) {
        self.frames.pop();
    }

    fn bind(&mut self, name: &str, id: BinderId) {
        self.frames.last_mut().expect("non-empty scope").insert(name.to_string(), id);
    }

    fn lookup(&self, name: &str) -> Option<BinderId> {
        self.frames.iter().rev().find_map(|f| f.get(name).copied())
    }
}

pub struct Desugarer {
    binder_gen: crate::core::binder::BinderIdGen,
    fresh_name_counter: Cell<u64>,
    scope: Scope,
    externals: HashSet<String>,
    types: HashMap<String, Rc<NominalDef>>,
    diagnostics: Vec<Diagnostic>,
    /// Used only to resolve `TypeExpr`s found in source (`type`/`external`
    /// declarations, `expr : Type` annotations) into checker-internal
    /// `Type`s. The checker's own inference runs with its own `VarGen`
    /// afterwards; the only property this one needs is "fresh within one
    /// resolution", since annotation type variables get re-unified against
    /// the checker's real variables the moment `infer` sees them.
    type_vars: VarGen,
}

impl Desugarer {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for def in [crate::typechecker::prelude::list_def(), crate::typechecker::prelude::option_def(), crate::typechecker::prelude::result_def()] {
            types.insert(def.name.clone(), def);
        }
        Desugarer {
            binder_gen: crate::core::binder::BinderIdGen::new(),
            fresh_name_counter: Cell::new(0),
            scope: Scope::new(),
            externals: HashSet::new(),
            types,
            diagnostics: Vec::new(),
            type_vars: VarGen::new(),
        }
    }

    fn fresh_name(&self, base: &str) -> String {
        let n = self.fresh_name_counter.get();
        self.fresh_name_counter.set(n + 1);
        format!("${base}{n}")
    }

    fn fresh_binder(&self) -> BinderId {
        self.binder_gen.fresh()
    }
}

pub fn desugar(module: &Module) -> Result<CoreModule<()>, Vec<Diagnostic>> {
    log::trace!("desugar: {} declarations", module.declarations.len());
    let mut d = Desugarer::new();

    // Pass 1: pre-register every type name and external/top-level-let name
    // so forward and mutual references resolve regardless of source order.
    for decl in &module.declarations {
        match decl {
            Declaration::Type { name, .. } => {
                d.types.insert(
                    name.clone(),
                    Rc::new(NominalDef {
                        name: name.clone(),
                        params: vec![],
                        shape: NominalShape::Alias(Type::Unit),
                    }),
                );
            }
            Declaration::External { name, .. } => {
                d.externals.insert(name.clone());
            }
            Declaration::Let { pattern, .. } => {
                for name in pattern.bound_names() {
                    d.scope.bind(name, d.fresh_binder());
                }
            }
            Declaration::LetRec { bindings, .. } => {
                for (name, _, _) in bindings {
                    d.scope.bind(name, d.fresh_binder());
                }
            }
            _ => {}
        }
    }

    let mut declarations = Vec::new();
    for decl in &module.declarations {
        match desugar_declaration(&mut d, decl) {
            Ok(mut out) => declarations.append(&mut out),
            Err(diag) => d.diagnostics.push(diag),
        }
    }

    if d.diagnostics.is_empty() {
        Ok(CoreModule { declarations, location: module.location.clone() })
    } else {
        Err(d.diagnostics)
    }
}

fn desugar_declaration(d: &mut Desugarer, decl: &Declaration) -> Result<Vec<CoreDeclaration<()>>, Diagnostic> {
    match decl {
        Declaration::Let { pattern, mutable, value, exported, location, .. } => {
            let core_value = desugar_expr(d, value)?;
            let core_value = if *mutable {
                CoreExpr::RefNew(Box::new(core_value), (), location.clone())
            } else {
                core_value
            };
            match pattern {
                Pattern::Variable(name, _) => {
                    let binder = d.scope.lookup(name).unwrap_or_else(|| d.fresh_binder());
                    Ok(vec![CoreDeclaration::Let {
                        binder,
                        name: name.clone(),
                        mutable: *mutable,
                        value: core_value,
                        exported: *exported,
                        location: location.clone(),
                    }])
                }
                _ => {
                    // A destructuring top-level `let` has no single name to
                    // bind the whole value to, so stash it under a hidden
                    // root and project each pattern-bound name into its own
                    // declaration with a `match` against that root -- the
                    // same "match in a hidden let" strategy `desugar_let_pattern`
                    // uses locally, generalized to module scope where there
                    // is no single `body` to scope the bound names to.
                    let root_name = d.fresh_name("destructure");
                    let root_binder = d.fresh_binder();
                    let mut decls = vec![CoreDeclaration::Let {
                        binder: root_binder,
                        name: root_name.clone(),
                        mutable: *mutable,
                        value: core_value,
                        exported: false,
                        location: location.clone(),
                    }];
                    let core_pattern = desugar_pattern_reuse_binders(d, pattern)?;
                    for name in pattern.bound_names() {
                        let binder = d.scope.lookup(name).expect("destructured name pre-bound in pass 1");
                        let case = CoreMatchCase {
                            pattern: core_pattern.clone(),
                            guard: None,
                            body: CoreExpr::Var(binder, name.to_string(), (), location.clone()),
                            location: location.clone(),
                        };
                        let matched = CoreExpr::Match {
                            scrutinee: Box::new(CoreExpr::Var(root_binder, root_name.clone(), (), location.clone())),
                            cases: vec![case],
                            info: (),
                            location: location.clone(),
                        };
                        decls.push(CoreDeclaration::Let {
                            binder,
                            name: name.to_string(),
                            mutable: false,
                            value: matched,
                            exported: *exported,
                            location: location.clone(),
                        });
                    }
                    Ok(decls)
                }
            }
        }
        Declaration::LetRec { bindings, exported, location } => {
            let mut core_bindings = Vec::new();
            for (name, _ty, value) in bindings {
                let binder = d.scope.lookup(name).expect("letrec names pre-bound in pass 1");
                let core_value = desugar_expr(d, value)?;
                core_bindings.push((binder, name.clone(), core_value));
            }
            Ok(vec![CoreDeclaration::LetRec { bindings: core_bindings, exported: *exported, location: location.clone() }])
        }
        Declaration::Type { name, params, def, exported, location } => {
            let mut param_vars = HashMap::new();
            for p in params {
                param_vars.insert(p.clone(), Type::Param(p.clone()));
            }
            let shape = match def {
                TypeDef::Alias(ty) => {
                    let gen = VarGen::new();
                    NominalShape::Alias(resolve_type_expr(&d.types, &mut param_vars, &gen, ty)?)
                }
                TypeDef::Variant(ctors) => {
                    let gen = VarGen::new();
                    let mut out = Vec::new();
                    for ctor in ctors {
                        let mut fields = Vec::new();
                        for f in &ctor.fields {
                            fields.push(resolve_type_expr(&d.types, &mut param_vars, &gen, f)?);
                        }
                        out.push(VariantCtorDef { name: ctor.name.clone(), fields });
                    }
                    NominalShape::Variant(out)
                }
                TypeDef::Record(fields) => {
                    let gen = VarGen::new();
                    let mut out = std::collections::BTreeMap::new();
                    for (name, ty) in fields {
                        out.insert(name.clone(), resolve_type_expr(&d.types, &mut param_vars, &gen, ty)?);
                    }
                    NominalShape::Record(out)
                }
            };
            let real_def = Rc::new(NominalDef { name: name.clone(), params: params.clone(), shape });
            d.types.insert(name.clone(), real_def.clone());
            Ok(vec![CoreDeclaration::TypeDef { name: name.clone(), def: real_def, exported: *exported, location: location.clone() }])
        }
        Declaration::External { name, generics, ty, location } => {
            let gen = VarGen::new();
            let mut var_map = HashMap::new();
            for g in generics {
                var_map.insert(g.clone(), gen.fresh_var());
            }
            let resolved = resolve_type_expr(&d.types, &mut var_map, &gen, ty)?;
            let vars = generics
                .iter()
                .filter_map(|g| var_map.get(g))
                .filter_map(|t| match t {
                    Type::Var(v) => match &*v.borrow() {
                        crate::types::TypeVarState::Unbound { id, .. } => Some(*id),
                        _ => None,
                    },
                    _ => None,
                })
                .collect();
            d.externals.insert(name.clone());
            Ok(vec![CoreDeclaration::External { name: name.clone(), ty: TypeScheme { vars, ty: resolved }, location: location.clone() }])
        }
        Declaration::Import { .. } | Declaration::Export { .. } => {
            // Module-loading and re-export wiring is the out-of-scope
            // loader's job (§1); the core pipeline only needs to know an
            // import/export *exists* syntactically, which it already does
            // by virtue of having parsed, so no Core declaration survives.
            Ok(vec![])
        }
    }
}

fn desugar_expr(d: &mut Desugarer, expr: &Expression) -> Result<CoreExpr<()>, Diagnostic> {
    match expr {
        Expression::Literal(lit, loc) => Ok(CoreExpr::Literal(desugar_literal(lit), (), loc.clone())),
        Expression::Unit(loc) => Ok(CoreExpr::Literal(CoreLiteral::Unit, (), loc.clone())),
        Expression::Var(name, loc) => Ok(resolve_var(d, name, loc)),
        Expression::Lambda { params, body, location, .. } => desugar_lambda(d, params, body, location),
        Expression::Call { func, args, location } => {
            let mut result = desugar_expr(d, func)?;
            for arg in args {
                let core_arg = desugar_expr(d, arg)?;
                result = CoreExpr::Application {
                    func: Box::new(result),
                    arg: Box::new(core_arg),
                    info: (),
                    location: location.clone(),
                };
            }
            Ok(result)
        }
        Expression::Let { pattern, mutable, value, body, location } => {
            let core_value = desugar_expr(d, value)?;
            let core_value = if *mutable {
                CoreExpr::RefNew(Box::new(core_value), (), location.clone())
            } else {
                core_value
            };
            desugar_let_pattern(d, pattern, *mutable, core_value, body, location)
        }
        Expression::LetRec { bindings, body, location } => {
            d.scope.enter();
            for (name, _, _) in bindings {
                d.scope.bind(name, d.fresh_binder());
            }
            let mut core_bindings = Vec::new();
            for (name, _ty, value) in bindings {
                let binder = d.scope.lookup(name).expect("just bound above");
                let core_value = desugar_expr(d, value)?;
                core_bindings.push((binder, name.clone(), core_value));
            }
            let core_body = desugar_expr(d, body)?;
            d.scope.exit();
            Ok(CoreExpr::LetRec { bindings: core_bindings, body: Box::new(core_body), info: (), location: location.clone() })
        }
        Expression::If { condition, then_branch, else_branch, location } => {
            let scrutinee = desugar_expr(d, condition)?;
            let then_case = CoreMatchCase {
                pattern: CorePattern::Literal(CoreLiteral::Bool(true), (), then_branch.location().clone()),
                guard: None,
                body: desugar_expr(d, then_branch)?,
                location: then_branch.location().clone(),
            };
            let else_body = match else_branch {
                Some(e) => desugar_expr(d, e)?,
                None => CoreExpr::Literal(CoreLiteral::Unit, (), location.clone()),
            };
            let else_loc = else_branch.as_ref().map(|e| e.location().clone()).unwrap_or_else(|| location.clone());
            let else_case = CoreMatchCase {
                pattern: CorePattern::Literal(CoreLiteral::Bool(false), (), else_loc.clone()),
                guard: None,
                body: else_body,
                location: else_loc,
            };
            Ok(CoreExpr::Match {
                scrutinee: Box::new(scrutinee),
                cases: vec![then_case, else_case],
                info: (),
                location: location.clone(),
            })
        }
        Expression::Match { scrutinee, cases, location } => {
            let core_scrutinee = desugar_expr(d, scrutinee)?;
            let mut core_cases = Vec::new();
            for case in cases {
                for pat in expand_or_pattern(&case.pattern) {
                    d.scope.enter();
                    let core_pat = desugar_pattern(d, &pat)?;
                    let guard = match &case.guard {
                        Some(g) => Some(desugar_expr(d, g)?),
                        None => None,
                    };
                    let body = desugar_expr(d, &case.body)?;
                    d.scope.exit();
                    core_cases.push(CoreMatchCase { pattern: core_pat, guard, body, location: case.location.clone() });
                }
            }
            Ok(CoreExpr::Match { scrutinee: Box::new(core_scrutinee), cases: core_cases, info: (), location: location.clone() })
        }
        Expression::Binary { operator, left, right, location } => desugar_binary(d, *operator, left, right, location),
        Expression::Unary { operator, operand, location } => {
            let core_operand = desugar_expr(d, operand)?;
            let op = match operator {
                UnaryOperator::Neg => CoreUnOp::Neg,
                UnaryOperator::Deref => CoreUnOp::Deref,
            };
            Ok(CoreExpr::UnOp { op, operand: Box::new(core_operand), info: (), location: location.clone() })
        }
        Expression::Record { fields, location } => {
            let mut core_fields = Vec::new();
            for f in fields {
                match f {
                    RecordField::Shorthand(name, loc) => core_fields.push((name.clone(), resolve_var(d, name, loc))),
                    RecordField::Full(name, e) => core_fields.push((name.clone(), desugar_expr(d, e)?)),
                }
            }
            Ok(CoreExpr::Record { fields: core_fields, info: (), location: location.clone() })
        }
        Expression::RecordUpdate { base, fields, location } => {
            let core_base = desugar_expr(d, base)?;
            let mut core_fields = Vec::new();
            for f in fields {
                match f {
                    RecordField::Shorthand(name, loc) => core_fields.push((name.clone(), resolve_var(d, name, loc))),
                    RecordField::Full(name, e) => core_fields.push((name.clone(), desugar_expr(d, e)?)),
                }
            }
            Ok(CoreExpr::RecordUpdate { base: Box::new(core_base), fields: core_fields, info: (), location: location.clone() })
        }
        Expression::FieldAccess { base, field, location } => Ok(CoreExpr::FieldAccess {
            base: Box::new(desugar_expr(d, base)?),
            field: field.clone(),
            info: (),
            location: location.clone(),
        }),
        Expression::Tuple(items, loc) => {
            let core_items = items.iter().map(|i| desugar_expr(d, i)).collect::<Result<_, _>>()?;
            Ok(CoreExpr::Tuple(core_items, (), loc.clone()))
        }
        Expression::List { items, location } => desugar_list(d, items, location),
        Expression::Block { statements, trailing, location } => desugar_block(d, statements, trailing, location),
        Expression::RefNew(inner, loc) => Ok(CoreExpr::RefNew(Box::new(desugar_expr(d, inner)?), (), loc.clone())),
        Expression::Assign { target, value, location } => {
            let core_target = desugar_expr(d, target)?;
            let core_value = desugar_expr(d, value)?;
            Ok(CoreExpr::BinOp {
                op: CoreBinOp::RefAssign,
                left: Box::new(core_target),
                right: Box::new(core_value),
                info: (),
                location: location.clone(),
            })
        }
        Expression::Unsafe(inner, loc) => Ok(CoreExpr::Unsafe(Box::new(desugar_expr(d, inner)?), (), loc.clone())),
        Expression::Annotation { expr, ty, location } => {
            let core_expr = desugar_expr(d, expr)?;
            let mut vars = HashMap::new();
            let resolved = resolve_type_expr(&d.types, &mut vars, &d.type_vars, ty)?;
            Ok(CoreExpr::Annotation { expr: Box::new(core_expr), ty: resolved, info: (), location: location.clone() })
        }
        Expression::While { condition, body, location } => desugar_while(d, condition, body, location),
    }
}

fn desugar_literal(lit: &Literal) -> CoreLiteral {
    match lit {
        Literal::Int(v) => CoreLiteral::Int(*v),
        Literal::Float(v) => CoreLiteral::Float(*v),
        Literal::Str(v) => CoreLiteral::Str(v.clone()),
        Literal::Bool(v) => CoreLiteral::Bool(*v),
        Literal::Unit => CoreLiteral::Unit,
    }
}

fn resolve_var(d: &Desugarer, name: &str, loc: &Location) -> CoreExpr<()> {
    if let Some(binder) = d.scope.lookup(name) {
        return CoreExpr::Var(binder, name.to_string(), (), loc.clone());
    }
    if d.externals.contains(name) {
        return CoreExpr::ExternalRef(name.to_string(), (), loc.clone());
    }
    // Unresolvable: mint a fresh binder id that is provably never bound,
    // so the type checker's scope lookup fails and reports the unknown
    // identifier (§7) rather than the desugarer panicking or guessing.
    CoreExpr::Var(d.fresh_binder(), name.to_string(), (), loc.clone())
}

fn desugar_lambda(d: &mut Desugarer, params: &[Pattern], body: &Expression, location: &Location) -> Result<CoreExpr<()>, Diagnostic> {
    let Some((first, rest)) = params.split_first() else {
        return desugar_expr(d, body);
    };
    d.scope.enter();
    let (binder, param_name, wrapped_body) = desugar_lambda_param(d, first, location, |d| {
        if rest.is_empty() {
            desugar_expr(d, body)
        } else {
            desugar_lambda(d, rest, body, location)
        }
    })?;
    d.scope.exit();
    Ok(CoreExpr::Lambda { param: binder, param_name, body: Box::new(wrapped_body), info: (), location: location.clone() })
}

/// Binds one lambda parameter pattern, invoking `cont` to build the
/// (already-desugared) body in the extended scope. Non-variable patterns
/// desugar to `(x) => match x { | pattern => body }`, matching the
/// strategy `desugar_let_pattern` uses for destructuring `let`.
fn desugar_lambda_param(
    d: &mut Desugarer,
    pattern: &Pattern,
    location: &Location,
    cont: impl FnOnce(&mut Desugarer) -> Result<CoreExpr<()>, Diagnostic>,
) -> Result<(BinderId, String, CoreExpr<()>), Diagnostic> {
    match pattern {
        Pattern::Variable(name, _) => {
            let binder = d.fresh_binder();
            d.scope.bind(name, binder);
            Ok((binder, name.clone(), cont(d)?))
        }
        Pattern::Wildcard(_) => {
            let binder = d.fresh_binder();
            Ok((binder, "_".to_string(), cont(d)?))
        }
        Pattern::Annotated { pattern, .. } => desugar_lambda_param(d, pattern, location, cont),
        _ => {
            let binder = d.fresh_binder();
            let name = d.fresh_name("param");
            let core_pattern = desugar_pattern(d, pattern)?;
            let body = cont(d)?;
            let case = CoreMatchCase { pattern: core_pattern, guard: None, body, location: location.clone() };
            let matched = CoreExpr::Match {
                scrutinee: Box::new(CoreExpr::Var(binder, name.clone(), (), location.clone())),
                cases: vec![case],
                info: (),
                location: location.clone(),
            };
            Ok((binder, name, matched))
        }
    }
}

fn desugar_let_pattern(
    d: &mut Desugarer,
    pattern: &Pattern,
    mutable: bool,
    value: CoreExpr<()>,
    body: &Expression,
    location: &Location,
) -> Result<CoreExpr<()>, Diagnostic> {
    match pattern {
        Pattern::Variable(name, _) => {
            d.scope.enter();
            let binder = d.fresh_binder();
            d.scope.bind(name, binder);
            let core_body = desugar_expr(d, body)?;
            d.scope.exit();
            Ok(CoreExpr::Let {
                binder,
                name: name.clone(),
                mutable,
                value: Box::new(value),
                body: Box::new(core_body),
                info: (),
                location: location.clone(),
            })
        }
        Pattern::Wildcard(_) => {
            let binder = d.fresh_binder();
            let core_body = desugar_expr(d, body)?;
            Ok(CoreExpr::Let {
                binder,
                name: "_".to_string(),
                mutable,
                value: Box::new(value),
                body: Box::new(core_body),
                info: (),
                location: location.clone(),
            })
        }
        Pattern::Annotated { pattern, .. } => desugar_let_pattern(d, pattern, mutable, value, body, location),
        _ => {
            let binder = d.fresh_binder();
            let name = d.fresh_name("let");
            d.scope.enter();
            let core_pattern = desugar_pattern(d, pattern)?;
            let core_body = desugar_expr(d, body)?;
            d.scope.exit();
            let case = CoreMatchCase { pattern: core_pattern, guard: None, body: core_body, location: location.clone() };
            let matched = CoreExpr::Match {
                scrutinee: Box::new(CoreExpr::Var(binder, name.clone(), (), location.clone())),
                cases: vec![case],
                info: (),
                location: location.clone(),
            };
            Ok(CoreExpr::Let {
                binder,
                name,
                mutable,
                value: Box::new(value),
                body: Box::new(matched),
                info: (),
                location: location.clone(),
            })
        }
    }
}

fn desugar_binary(d: &mut Desugarer, op: BinaryOperator, left: &Expression, right: &Expression, location: &Location) -> Result<CoreExpr<()>, Diagnostic> {
    match op {
        BinaryOperator::Pipe => {
            // `a |> f` -> `f(a)`; chains fold left-to-right since the
            // parser already built a left-associative binary tree.
            let arg = desugar_expr(d, left)?;
            let func = desugar_expr(d, right)?;
            Ok(CoreExpr::Application { func: Box::new(func), arg: Box::new(arg), info: (), location: location.clone() })
        }
        BinaryOperator::ComposeFwd | BinaryOperator::ComposeBack => {
            let f = desugar_expr(d, left)?;
            let g = desugar_expr(d, right)?;
            let param_name = d.fresh_name("compose");
            let binder = d.fresh_binder();
            let x = CoreExpr::Var(binder, param_name.clone(), (), location.clone());
            let (outer, inner) = if op == BinaryOperator::ComposeFwd { (g, f) } else { (f, g) };
            let applied_inner = CoreExpr::Application { func: Box::new(inner), arg: Box::new(x), info: (), location: location.clone() };
            let body = CoreExpr::Application { func: Box::new(outer), arg: Box::new(applied_inner), info: (), location: location.clone() };
            Ok(CoreExpr::Lambda { param: binder, param_name, body: Box::new(body), info: (), location: location.clone() })
        }
        BinaryOperator::Cons => {
            let head = desugar_expr(d, left)?;
            let tail = desugar_expr(d, right)?;
            Ok(cons(head, tail, location.clone()))
        }
        BinaryOperator::Or => {
            // Short-circuiting `a || b` keeps its binary shape rather than
            // desugaring into `if`/`match`: the optimizer's constant-folding
            // pass (§4.5.2) already special-cases `BinOp(Or, ..)` for the
            // short-circuit truth table, so there is nothing extra a
            // match-based encoding would buy here.
            let l = desugar_expr(d, left)?;
            let r = desugar_expr(d, right)?;
            Ok(CoreExpr::BinOp { op: CoreBinOp::Or, left: Box::new(l), right: Box::new(r), info: (), location: location.clone() })
        }
        _ => {
            let core_op = match op {
                BinaryOperator::And => CoreBinOp::And,
                BinaryOperator::Eq => CoreBinOp::Eq,
                BinaryOperator::NotEq => CoreBinOp::NotEq,
                BinaryOperator::Lt => CoreBinOp::Lt,
                BinaryOperator::Le => CoreBinOp::Le,
                BinaryOperator::Gt => CoreBinOp::Gt,
                BinaryOperator::Ge => CoreBinOp::Ge,
                BinaryOperator::Add => CoreBinOp::Add,
                BinaryOperator::Sub => CoreBinOp::Sub,
                BinaryOperator::Mul => CoreBinOp::Mul,
                BinaryOperator::Div => CoreBinOp::Div,
                BinaryOperator::Mod => CoreBinOp::Mod,
                BinaryOperator::Concat => CoreBinOp::Concat,
                BinaryOperator::Or | BinaryOperator::Pipe | BinaryOperator::ComposeFwd | BinaryOperator::ComposeBack | BinaryOperator::Cons => {
                    unreachable!("handled above")
                }
            };
            let l = desugar_expr(d, left)?;
            let r = desugar_expr(d, right)?;
            Ok(CoreExpr::BinOp { op: core_op, left: Box::new(l), right: Box::new(r), info: (), location: location.clone() })
        }
    }
}

fn cons(head: CoreExpr<()>, tail: CoreExpr<()>, loc: Location) -> CoreExpr<()> {
    CoreExpr::Application {
        func: Box::new(CoreExpr::Application {
            func: Box::new(CoreExpr::ExternalRef("Cons".to_string(), (), loc.clone())),
            arg: Box::new(head),
            info: (),
            location: loc.clone(),
        }),
        arg: Box::new(tail),
        info: (),
        location: loc,
    }
}

fn nil(loc: Location) -> CoreExpr<()> {
    CoreExpr::ExternalRef("Nil".to_string(), (), loc)
}

fn desugar_list(d: &mut Desugarer, items: &[ListItem], location: &Location) -> Result<CoreExpr<()>, Diagnostic> {
    // Build right-to-left so a trailing spread or `Nil` sits at the tail.
    let mut result: Option<CoreExpr<()>> = None;
    for item in items.iter().rev() {
        result = Some(match item {
            ListItem::Elem(e) => {
                let head = desugar_expr(d, e)?;
                let tail = result.unwrap_or_else(|| nil(location.clone()));
                cons(head, tail, location.clone())
            }
            ListItem::Spread(e) => {
                let spread = desugar_expr(d, e)?;
                match result {
                    Some(tail) => CoreExpr::Application {
                        func: Box::new(CoreExpr::Application {
                            func: Box::new(CoreExpr::ExternalRef("concat".to_string(), (), location.clone())),
                            arg: Box::new(spread),
                            info: (),
                            location: location.clone(),
                        }),
                        arg: Box::new(tail),
                        info: (),
                        location: location.clone(),
                    },
                    None => spread,
                }
            }
        });
    }
    Ok(result.unwrap_or_else(|| nil(location.clone())))
}

fn desugar_block(d: &mut Desugarer, statements: &[BlockStmt], trailing: &Expression, location: &Location) -> Result<CoreExpr<()>, Diagnostic> {
    d.scope.enter();
    let result = desugar_block_stmts(d, statements, trailing, location);
    d.scope.exit();
    result
}

fn desugar_block_stmts(d: &mut Desugarer, statements: &[BlockStmt], trailing: &Expression, location: &Location) -> Result<CoreExpr<()>, Diagnostic> {
    let Some((first, rest)) = statements.split_first() else {
        return desugar_expr(d, trailing);
    };
    match first {
        BlockStmt::Expr(e) => {
            let core_value = desugar_expr(d, e)?;
            let binder = d.fresh_binder();
            let name = d.fresh_name("seq");
            let core_body = desugar_block_stmts(d, rest, trailing, location)?;
            Ok(CoreExpr::Let { binder, name, mutable: false, value: Box::new(core_value), body: Box::new(core_body), info: (), location: e.location().clone() })
        }
        BlockStmt::Let { pattern, mutable, value, location: let_loc } => {
            let core_value = desugar_expr(d, value)?;
            let core_value = if *mutable {
                CoreExpr::RefNew(Box::new(core_value), (), let_loc.clone())
            } else {
                core_value
            };
            desugar_let_pattern_cont(d, pattern, *mutable, core_value, let_loc, |d| desugar_block_stmts(d, rest, trailing, location))
        }
        BlockStmt::LetRec { bindings, location: let_loc } => {
            d.scope.enter();
            for (name, _, _) in bindings {
                d.scope.bind(name, d.fresh_binder());
            }
            let mut core_bindings = Vec::new();
            for (name, _ty, value) in bindings {
                let binder = d.scope.lookup(name).expect("just bound above");
                let core_value = desugar_expr(d, value)?;
                core_bindings.push((binder, name.clone(), core_value));
            }
            let core_body = desugar_block_stmts(d, rest, trailing, location)?;
            d.scope.exit();
            Ok(CoreExpr::LetRec { bindings: core_bindings, body: Box::new(core_body), info: (), location: let_loc.clone() })
        }
    }
}

/// Like `desugar_let_pattern` but the continuation produces the body
/// itself (used for block statement sequencing, where the "body" is the
/// rest of the block rather than a single surface `Expression`).
fn desugar_let_pattern_cont(
    d: &mut Desugarer,
    pattern: &Pattern,
    mutable: bool,
    value: CoreExpr<()>,
    location: &Location,
    cont: impl FnOnce(&mut Desugarer) -> Result<CoreExpr<()>, Diagnostic>,
) -> Result<CoreExpr<()>, Diagnostic> {
    match pattern {
        Pattern::Variable(name, _) => {
            d.scope.enter();
            let binder = d.fresh_binder();
            d.scope.bind(name, binder);
            let body = cont(d)?;
            d.scope.exit();
            Ok(CoreExpr::Let { binder, name: name.clone(), mutable, value: Box::new(value), body: Box::new(body), info: (), location: location.clone() })
        }
        Pattern::Wildcard(_) => {
            let binder = d.fresh_binder();
            let body = cont(d)?;
            Ok(CoreExpr::Let { binder, name: "_".to_string(), mutable, value: Box::new(value), body: Box::new(body), info: (), location: location.clone() })
        }
        Pattern::Annotated { pattern, .. } => desugar_let_pattern_cont(d, pattern, mutable, value, location, cont),
        _ => {
            let binder = d.fresh_binder();
            let name = d.fresh_name("let");
            d.scope.enter();
            let core_pattern = desugar_pattern(d, pattern)?;
            let rest_body = cont(d)?;
            d.scope.exit();
            let case = CoreMatchCase { pattern: core_pattern, guard: None, body: rest_body, location: location.clone() };
            let matched = CoreExpr::Match {
                scrutinee: Box::new(CoreExpr::Var(binder, name.clone(), (), location.clone())),
                cases: vec![case],
                info: (),
                location: location.clone(),
            };
            Ok(CoreExpr::Let { binder, name, mutable, value: Box::new(value), body: Box::new(matched), info: (), location: location.clone() })
        }
    }
}

/// `while c { b }` -> `let rec $loopN = (_unit) => match c { true => (b;
/// $loopN(())) | false => () } in $loopN(())` (§4.3.10).
fn desugar_while(d: &mut Desugarer, condition: &Expression, body: &Expression, location: &Location) -> Result<CoreExpr<()>, Diagnostic> {
    let loop_name = d.fresh_name("loop");
    let loop_binder = d.fresh_binder();
    d.scope.enter();
    d.scope.bind(&loop_name, loop_binder);

    let param_binder = d.fresh_binder();
    let param_name = d.fresh_name("unit");

    let condition_core = desugar_expr(d, condition)?;
    let body_core = desugar_expr(d, body)?;
    let recurse = CoreExpr::Application {
        func: Box::new(CoreExpr::Var(loop_binder, loop_name.clone(), (), location.clone())),
        arg: Box::new(CoreExpr::Literal(CoreLiteral::Unit, (), location.clone())),
        info: (),
        location: location.clone(),
    };
    // `body; $loopN(())`, i.e. evaluate the loop body for effect then recurse.
    let seq_binder = d.fresh_binder();
    let step = CoreExpr::Let {
        binder: seq_binder,
        name: d.fresh_name("seq"),
        mutable: false,
        value: Box::new(body_core),
        body: Box::new(recurse),
        info: (),
        location: location.clone(),
    };
    let true_case = CoreMatchCase {
        pattern: CorePattern::Literal(CoreLiteral::Bool(true), (), location.clone()),
        guard: None,
        body: step,
        location: location.clone(),
    };
    let false_case = CoreMatchCase {
        pattern: CorePattern::Literal(CoreLiteral::Bool(false), (), location.clone()),
        guard: None,
        body: CoreExpr::Literal(CoreLiteral::Unit, (), location.clone()),
        location: location.clone(),
    };
    let match_expr = CoreExpr::Match {
        scrutinee: Box::new(condition_core),
        cases: vec![true_case, false_case],
        info: (),
        location: location.clone(),
    };
    let lambda = CoreExpr::Lambda { param: param_binder, param_name, body: Box::new(match_expr), info: (), location: location.clone() };
    d.scope.exit();

    let initial_call = CoreExpr::Application {
        func: Box::new(CoreExpr::Var(loop_binder, loop_name.clone(), (), location.clone())),
        arg: Box::new(CoreExpr::Literal(CoreLiteral::Unit, (), location.clone())),
        info: (),
        location: location.clone(),
    };
    Ok(CoreExpr::LetRec {
        bindings: vec![(loop_binder, loop_name, lambda)],
        body: Box::new(initial_call),
        info: (),
        location: location.clone(),
    })
}

/// Expands or-patterns (including ones nested inside constructor/tuple/
/// record/list sub-positions) by cartesian product, per §4.3.9.
fn expand_or_pattern(pattern: &Pattern) -> Vec<Pattern> {
    match pattern {
        Pattern::Or(alts, _) => alts.iter().flat_map(expand_or_pattern).collect(),
        Pattern::Variant { name, args, location } => cartesian(args, expand_or_pattern)
            .into_iter()
            .map(|args| Pattern::Variant { name: name.clone(), args, location: location.clone() })
            .collect(),
        Pattern::Tuple(items, location) => cartesian(items, expand_or_pattern)
            .into_iter()
            .map(|items| Pattern::Tuple(items, location.clone()))
            .collect(),
        Pattern::List { items, rest, location } => {
            let expanded_rest: Vec<Option<Box<Pattern>>> = match rest {
                Some(r) => expand_or_pattern(r).into_iter().map(|p| Some(Box::new(p))).collect(),
                None => vec![None],
            };
            cartesian(items, expand_or_pattern)
                .into_iter()
                .flat_map(|items| {
                    expanded_rest
                        .iter()
                        .map(|r| Pattern::List { items: items.clone(), rest: r.clone(), location: location.clone() })
                        .collect::<Vec<_>>()
                })
                .collect()
        }
        Pattern::Record { fields, location } => {
            let names: Vec<String> = fields
                .iter()
                .map(|f| match f {
                    RecordPatternField::Shorthand(n, _) => n.clone(),
                    RecordPatternField::Full(n, _) => n.clone(),
                })
                .collect();
            let sub_patterns: Vec<Pattern> = fields
                .iter()
                .map(|f| match f {
                    RecordPatternField::Shorthand(n, loc) => Pattern::Variable(n.clone(), loc.clone()),
                    RecordPatternField::Full(_, p) => p.clone(),
                })
                .collect();
            cartesian(&sub_patterns, expand_or_pattern)
                .into_iter()
                .map(|expanded| {
                    let fields = names
                        .iter()
                        .zip(expanded)
                        .map(|(n, p)| RecordPatternField::Full(n.clone(), p))
                        .collect();
                    Pattern::Record { fields, location: location.clone() }
                })
                .collect()
        }
        Pattern::Annotated { pattern, ty, location } => expand_or_pattern(pattern)
            .into_iter()
            .map(|p| Pattern::Annotated { pattern: Box::new(p), ty: ty.clone(), location: location.clone() })
            .collect(),
        _ => vec![pattern.clone()],
    }
}

fn cartesian(items: &[Pattern], expand: impl Fn(&Pattern) -> Vec<Pattern> + Copy) -> Vec<Vec<Pattern>> {
    items.iter().fold(vec![vec![]], |acc, item| {
        let options = expand(item);
        acc.into_iter()
            .flat_map(|prefix| {
                options.iter().map(move |opt| {
                    let mut next = prefix.clone();
                    next.push(opt.clone());
                    next
                })
            })
            .collect()
    })
}

/// Like [`desugar_pattern`], but a bound variable resolves to its already
/// pre-registered binder instead of minting a fresh one. Top-level `let`
/// destructuring pre-binds every name in pass 1 (so forward references
/// elsewhere in the module resolve to the same id); the pattern desugared
/// here must reuse those ids rather than shadow them with new ones.
fn desugar_pattern_reuse_binders(d: &mut Desugarer, pattern: &Pattern) -> Result<CorePattern<()>, Diagnostic> {
    match pattern {
        Pattern::Variable(name, loc) => {
            let binder = d.scope.lookup(name).expect("destructured name pre-bound in pass 1");
            Ok(CorePattern::Variable(binder, name.clone(), (), loc.clone()))
        }
        Pattern::Wildcard(loc) => Ok(CorePattern::Wildcard((), loc.clone())),
        Pattern::Literal(lit, loc) => Ok(CorePattern::Literal(desugar_literal(lit), (), loc.clone())),
        Pattern::Variant { name, args, location } => {
            let core_args = args.iter().map(|a| desugar_pattern_reuse_binders(d, a)).collect::<Result<_, _>>()?;
            Ok(CorePattern::Variant { name: name.clone(), args: core_args, info: (), location: location.clone() })
        }
        Pattern::Record { fields, location } => {
            let mut core_fields = Vec::new();
            for f in fields {
                match f {
                    RecordPatternField::Shorthand(name, loc) => {
                        let binder = d.scope.lookup(name).expect("destructured name pre-bound in pass 1");
                        core_fields.push((name.clone(), CorePattern::Variable(binder, name.clone(), (), loc.clone())));
                    }
                    RecordPatternField::Full(name, p) => core_fields.push((name.clone(), desugar_pattern_reuse_binders(d, p)?)),
                }
            }
            Ok(CorePattern::Record { fields: core_fields, info: (), location: location.clone() })
        }
        Pattern::Tuple(items, loc) => {
            let core_items = items.iter().map(|p| desugar_pattern_reuse_binders(d, p)).collect::<Result<_, _>>()?;
            Ok(CorePattern::Tuple(core_items, (), loc.clone()))
        }
        Pattern::List { items, rest, location } => {
            let mut tail = match rest {
                Some(r) => desugar_pattern_reuse_binders(d, r)?,
                None => CorePattern::Variant { name: "Nil".to_string(), args: vec![], info: (), location: location.clone() },
            };
            for item in items.iter().rev() {
                let head = desugar_pattern_reuse_binders(d, item)?;
                tail = CorePattern::Variant { name: "Cons".to_string(), args: vec![head, tail], info: (), location: location.clone() };
            }
            Ok(tail)
        }
        Pattern::Annotated { pattern, .. } => desugar_pattern_reuse_binders(d, pattern),
        Pattern::Or(alts, loc) => {
            let _ = alts;
            Err(Diagnostic::error(
                "VF3001",
                Phase::Desugarer,
                "or-pattern reached desugar_pattern_reuse_binders without cartesian expansion",
                loc.clone(),
            ))
        }
    }
}

fn desugar_pattern(d: &mut Desugarer, pattern: &Pattern) -> Result<CorePattern<()>, Diagnostic> {
    match pattern {
        Pattern::Wildcard(loc) => Ok(CorePattern::Wildcard((), loc.clone())),
        Pattern::Variable(name, loc) => {
            let binder = d.fresh_binder();
            d.scope.bind(name, binder);
            Ok(CorePattern::Variable(binder, name.clone(), (), loc.clone()))
        }
        Pattern::Literal(lit, loc) => Ok(CorePattern::Literal(desugar_literal(lit), (), loc.clone())),
        Pattern::Variant { name, args, location } => {
            let core_args = args.iter().map(|a| desugar_pattern(d, a)).collect::<Result<_, _>>()?;
            Ok(CorePattern::Variant { name: name.clone(), args: core_args, info: (), location: location.clone() })
        }
        Pattern::Record { fields, location } => {
            let mut core_fields = Vec::new();
            for f in fields {
                match f {
                    RecordPatternField::Shorthand(name, loc) => {
                        let binder = d.fresh_binder();
                        d.scope.bind(name, binder);
                        core_fields.push((name.clone(), CorePattern::Variable(binder, name.clone(), (), loc.clone())));
                    }
                    RecordPatternField::Full(name, p) => core_fields.push((name.clone(), desugar_pattern(d, p)?)),
                }
            }
            Ok(CorePattern::Record { fields: core_fields, info: (), location: location.clone() })
        }
        Pattern::Tuple(items, loc) => {
            let core_items = items.iter().map(|p| desugar_pattern(d, p)).collect::<Result<_, _>>()?;
            Ok(CorePattern::Tuple(core_items, (), loc.clone()))
        }
        Pattern::List { items, rest, location } => {
            let mut tail = match rest {
                Some(r) => desugar_pattern(d, r)?,
                None => CorePattern::Variant { name: "Nil".to_string(), args: vec![], info: (), location: location.clone() },
            };
            for item in items.iter().rev() {
                let head = desugar_pattern(d, item)?;
                tail = CorePattern::Variant { name: "Cons".to_string(), args: vec![head, tail], info: (), location: location.clone() };
            }
            Ok(tail)
        }
        Pattern::Or(alts, loc) => {
            // Reachable only if a caller desugars a pattern without first
            // calling `expand_or_pattern` on the enclosing match arm (a
            // desugarer bug, not a surface-program error -- §7's "unknown
            // AST kind" class).
            let _ = alts;
            Err(Diagnostic::error(
                "VF3001",
                Phase::Desugarer,
                "or-pattern reached desugar_pattern without cartesian expansion",
                loc.clone(),
            ))
        }
        Pattern::Annotated { pattern, .. } => desugar_pattern(d, pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn desugar_source(src: &str) -> CoreModule<()> {
        let tokens = lexer::lex("test.vf", src).expect("lex");
        let module = parser::parse(tokens, parser::ParserOptions::default()).expect("parse");
        desugar(&module).expect("desugar")
    }

    #[test]
    fn test_if_desugars_to_bool_match() {
        let m = desugar_source("let x = if true then 1 else 2;");
        let CoreDeclaration::Let { value, .. } = &m.declarations[0] else { panic!() };
        assert!(matches!(value, CoreExpr::Match { .. }));
    }

    #[test]
    fn test_pipe_desugars_to_application() {
        let m = desugar_source("let f = (x) => x; let y = 1 |> f;");
        let CoreDeclaration::Let { value, .. } = &m.declarations[1] else { panic!() };
        assert!(matches!(value, CoreExpr::Application { .. }));
    }

    #[test]
    fn test_multi_param_lambda_curries() {
        let m = desugar_source("let add = (x, y) => x;");
        let CoreDeclaration::Let { value, .. } = &m.declarations[0] else { panic!() };
        let CoreExpr::Lambda { body, .. } = value else { panic!() };
        assert!(matches!(**body, CoreExpr::Lambda { .. }));
    }

    #[test]
    fn test_while_desugars_to_let_rec() {
        let m = desugar_source("let f = () => while true { 1 };");
        let CoreDeclaration::Let { value, .. } = &m.declarations[0] else { panic!() };
        let CoreExpr::Lambda { body, .. } = value else { panic!() };
        assert!(matches!(**body, CoreExpr::LetRec { .. }));
    }

    #[test]
    fn test_cons_pattern_list_literal() {
        let m = desugar_source("let xs = [1, 2];");
        let CoreDeclaration::Let { value, .. } = &m.declarations[0] else { panic!() };
        assert!(matches!(value, CoreExpr::Application { .. }));
    }

    #[test]
    fn test_or_pattern_duplicates_arm() {
        let m = desugar_source("let f = (x) => match x { | 1 | 2 => true | _ => false };");
        let CoreDeclaration::Let { value, .. } = &m.declarations[0] else { panic!() };
        let CoreExpr::Lambda { body, .. } = value else { panic!() };
        let CoreExpr::Match { cases, .. } = &**body else { panic!() };
        assert_eq!(cases.len(), 3);
    }

    #[test]
    fn test_string_concat_maps_to_concat_binop() {
        let m = desugar_source(r#"let x = "a" & "b";"#);
        let CoreDeclaration::Let { value, .. } = &m.declarations[0] else { panic!() };
        assert!(matches!(value, CoreExpr::BinOp { op: CoreBinOp::Concat, .. }));
    }

    #[test]
    fn test_top_level_destructuring_binds_each_pattern_name() {
        let m = desugar_source("let (a, b) = (1, 2); let sum = a;");
        // declarations[0] is the hidden root the tuple is bound to;
        // [1] and [2] project `a` and `b` out of it; [3] is `sum`.
        assert_eq!(m.declarations.len(), 4);

        let CoreDeclaration::Let { name: root_name, .. } = &m.declarations[0] else { panic!() };
        assert!(root_name.starts_with("$destructure"), "got {root_name}");

        let CoreDeclaration::Let { name: a_name, value: a_value, binder: a_binder, .. } = &m.declarations[1] else { panic!() };
        assert_eq!(a_name, "a");
        assert!(matches!(a_value, CoreExpr::Match { .. }), "`a` should be projected via a match on the hidden root");

        let CoreDeclaration::Let { name: b_name, .. } = &m.declarations[2] else { panic!() };
        assert_eq!(b_name, "b");

        let CoreDeclaration::Let { value: sum_value, .. } = &m.declarations[3] else { panic!() };
        let CoreExpr::Var(sum_binder, sum_ref_name, ..) = sum_value else { panic!("expected `sum = a` to resolve to a Var") };
        assert_eq!(sum_ref_name, "a");
        assert_eq!(sum_binder, a_binder, "`sum`'s reference to `a` must resolve to the same binder `a` was bound to");
    }
}
