//! Optimizer over typed Core IR (§4.5): a small pipeline of independently
//! testable passes run behind a single [`OptimizerPass`] trait, the same
//! shape `why_lib`'s (stub) optimizer module already used --
//! `optimize()` there builds a `Vec<Box<&dyn OptimizerPass>>` and folds the
//! AST through each one in turn. Here the driver additionally iterates that
//! pipeline to a fixed point for `O2`, tracked by a structural
//! [`fingerprint`] rather than `CoreModule`'s `derive(PartialEq)` -- per
//! §9's note that deep tree equality is too expensive to call every
//! iteration of a hot optimization loop, a single `u64` compare is not.
//!
//! The optimizer never introduces a new [`crate::diagnostics::Diagnostic`]:
//! every pass here operates on a tree the type checker already accepted,
//! and every transformation it performs is type-preserving (§4.5.7) --
//! `crate::typechecker::recheck` exists specifically so tests can assert
//! that directly against a pass's output.

pub mod cse;
pub mod dce;
pub mod decision_tree;
pub mod fold;
pub mod purity;
pub mod reduce;
pub mod subst;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::core::binder::BinderIdGen;
use crate::core::{BinderId, CoreDeclaration, CoreExpr, CoreLiteral, CoreMatchCase, CoreModule, CorePattern};
use crate::types::Type;

/// How aggressively [`optimize`] should transform a module (§4.5.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptLevel {
    /// Identity: hand the checked tree through unchanged.
    O0,
    /// One pass of constant folding, β/η-reduction, and dead-code removal.
    O1,
    /// Every pass (including CSE and arm reordering), iterated to a fixed
    /// point or `max_iterations`, whichever comes first.
    O2,
}

impl Default for OptLevel {
    fn default() -> Self {
        OptLevel::O0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOptions {
    pub level: OptLevel,
    pub max_iterations: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        OptimizerOptions { level: OptLevel::O0, max_iterations: 16 }
    }
}

/// Inline-cost budget (AST node count) per level, see `reduce`'s module doc.
fn inline_threshold(level: OptLevel) -> usize {
    match level {
        OptLevel::O0 => 0,
        OptLevel::O1 => 20,
        OptLevel::O2 => 50,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub constant_folds: usize,
    pub beta_reductions: usize,
    pub eta_reductions: usize,
    pub inlines: usize,
    pub dead_code_removals: usize,
    pub cse_count: usize,
    pub iterations: usize,
    pub ast_size_before: usize,
    pub ast_size_after: usize,
}

pub struct OptimizerResult {
    pub module: CoreModule<Type>,
    pub metrics: Metrics,
}

/// Per-run state shared by every pass: mainly the binder generator passes
/// use to mint alpha-fresh ids when renaming around capture (see `subst`).
pub struct PassContext {
    pub binder_gen: BinderIdGen,
}

/// A single optimization pass over a whole module, in the shape
/// `why_lib::optimizer::OptimizerPass` already established: given a module
/// and a shared context, produce a new one, reporting (via `metrics`) how
/// much work it did so the overall driver can report its own
/// [`Metrics`].
pub trait OptimizerPass {
    fn run(&self, module: CoreModule<Type>, ctx: &PassContext, metrics: &mut Metrics) -> CoreModule<Type>;
}

struct FoldPass;
impl OptimizerPass for FoldPass {
    fn run(&self, module: CoreModule<Type>, _ctx: &PassContext, metrics: &mut Metrics) -> CoreModule<Type> {
        map_module(module, |expr| {
            let mut stats = fold::FoldStats { folds: 0 };
            let result = fold::fold_expr(&expr, &mut stats);
            metrics.constant_folds += stats.folds;
            result
        })
    }
}

struct ReducePass {
    inline_threshold: usize,
}
impl OptimizerPass for ReducePass {
    fn run(&self, module: CoreModule<Type>, ctx: &PassContext, metrics: &mut Metrics) -> CoreModule<Type> {
        map_module(module, |expr| {
            let mut stats = reduce::ReduceStats { beta: 0, eta: 0, inlines: 0 };
            let result = reduce::reduce_expr(&expr, ctx, self.inline_threshold, &mut stats);
            metrics.beta_reductions += stats.beta;
            metrics.eta_reductions += stats.eta;
            metrics.inlines += stats.inlines;
            result
        })
    }
}

struct DcePass;
impl OptimizerPass for DcePass {
    fn run(&self, module: CoreModule<Type>, ctx: &PassContext, metrics: &mut Metrics) -> CoreModule<Type> {
        map_module(module, |expr| {
            let mut stats = dce::DceStats { dead_lets: 0, dead_arms: 0, constant_matches: 0 };
            let result = dce::dce_expr(&expr, ctx, &mut stats);
            metrics.dead_code_removals += stats.dead_lets + stats.dead_arms + stats.constant_matches;
            result
        })
    }
}

struct CsePass;
impl OptimizerPass for CsePass {
    fn run(&self, module: CoreModule<Type>, ctx: &PassContext, metrics: &mut Metrics) -> CoreModule<Type> {
        map_module(module, |expr| {
            let mut stats = cse::CseStats { eliminated: 0 };
            let result = cse::cse_expr(&expr, ctx, &mut stats);
            metrics.cse_count += stats.eliminated;
            result
        })
    }
}

struct DecisionTreePass;
impl OptimizerPass for DecisionTreePass {
    fn run(&self, module: CoreModule<Type>, _ctx: &PassContext, _metrics: &mut Metrics) -> CoreModule<Type> {
        map_module(module, |expr| decision_tree::decision_tree_expr(&expr))
    }
}

fn map_module(module: CoreModule<Type>, f: impl Fn(CoreExpr<Type>) -> CoreExpr<Type>) -> CoreModule<Type> {
    let declarations = module
        .declarations
        .into_iter()
        .map(|decl| match decl {
            CoreDeclaration::Let { binder, name, mutable, value, exported, location } => {
                CoreDeclaration::Let { binder, name, mutable, value: f(value), exported, location }
            }
            CoreDeclaration::LetRec { bindings, exported, location } => CoreDeclaration::LetRec {
                bindings: bindings.into_iter().map(|(b, n, v)| (b, n, f(v))).collect(),
                exported,
                location,
            },
            other @ (CoreDeclaration::External { .. } | CoreDeclaration::TypeDef { .. }) => other,
        })
        .collect();
    CoreModule { declarations, location: module.location }
}

/// Runs the pipeline appropriate for `options.level` and reports what it
/// did. `O0` is the identity transform; `O1` runs fold/reduce/dce once;
/// `O2` runs the full pipeline (adding CSE and arm grouping) repeatedly
/// until the tree's [`fingerprint`] stops changing or `max_iterations` is
/// hit, whichever comes first (§4.5.1's "until no further change, bounded
/// by a max iteration count").
pub fn optimize(module: CoreModule<Type>, options: &OptimizerOptions) -> OptimizerResult {
    let mut metrics = Metrics { ast_size_before: ast_size(&module), ..Metrics::default() };

    if options.level == OptLevel::O0 {
        metrics.ast_size_after = metrics.ast_size_before;
        metrics.iterations = 0;
        return OptimizerResult { module, metrics };
    }

    let ctx = PassContext { binder_gen: BinderIdGen::starting_at(max_binder_id_in(&module) + 1) };
    let threshold = inline_threshold(options.level);

    let passes: Vec<Box<dyn OptimizerPass>> = if options.level == OptLevel::O1 {
        vec![Box::new(ReducePass { inline_threshold: threshold }), Box::new(FoldPass), Box::new(DcePass)]
    } else {
        vec![
            Box::new(ReducePass { inline_threshold: threshold }),
            Box::new(FoldPass),
            Box::new(DcePass),
            Box::new(CsePass),
            Box::new(DecisionTreePass),
        ]
    };

    let mut current = module;
    let mut iterations = 0;
    let max_iterations = if options.level == OptLevel::O1 { 1 } else { options.max_iterations.max(1) };

    loop {
        let before_fp = fingerprint_module(&current);
        for pass in &passes {
            current = pass.run(current, &ctx, &mut metrics);
        }
        iterations += 1;
        let after_fp = fingerprint_module(&current);

        if options.level == OptLevel::O1 || after_fp == before_fp || iterations >= max_iterations {
            break;
        }
    }

    metrics.iterations = iterations;
    metrics.ast_size_after = ast_size(&current);

    OptimizerResult { module: current, metrics }
}

fn max_binder_id_in(module: &CoreModule<Type>) -> u64 {
    let mut max = 0u64;
    for decl in &module.declarations {
        match decl {
            CoreDeclaration::Let { binder, value, .. } => {
                max = max.max(binder.0);
                max_binder_in_expr(value, &mut max);
            }
            CoreDeclaration::LetRec { bindings, .. } => {
                for (b, _, v) in bindings {
                    max = max.max(b.0);
                    max_binder_in_expr(v, &mut max);
                }
            }
            CoreDeclaration::External { .. } | CoreDeclaration::TypeDef { .. } => {}
        }
    }
    max
}

fn max_binder_in_expr(expr: &CoreExpr<Type>, max: &mut u64) {
    let track = |b: &BinderId, max: &mut u64| *max = (*max).max(b.0);
    match expr {
        CoreExpr::Literal(..) | CoreExpr::ExternalRef(..) => {}
        CoreExpr::Var(b, ..) => track(b, max),
        CoreExpr::Lambda { param, body, .. } => {
            track(param, max);
            max_binder_in_expr(body, max);
        }
        CoreExpr::Application { func, arg, .. } => {
            max_binder_in_expr(func, max);
            max_binder_in_expr(arg, max);
        }
        CoreExpr::Let { binder, value, body, .. } => {
            track(binder, max);
            max_binder_in_expr(value, max);
            max_binder_in_expr(body, max);
        }
        CoreExpr::LetRec { bindings, body, .. } => {
            for (b, _, v) in bindings {
                track(b, max);
                max_binder_in_expr(v, max);
            }
            max_binder_in_expr(body, max);
        }
        CoreExpr::Match { scrutinee, cases, .. } => {
            max_binder_in_expr(scrutinee, max);
            for case in cases {
                max_binder_in_pattern(&case.pattern, max);
                if let Some(g) = &case.guard {
                    max_binder_in_expr(g, max);
                }
                max_binder_in_expr(&case.body, max);
            }
        }
        CoreExpr::BinOp { left, right, .. } => {
            max_binder_in_expr(left, max);
            max_binder_in_expr(right, max);
        }
        CoreExpr::UnOp { operand, .. } => max_binder_in_expr(operand, max),
        CoreExpr::Tuple(items, ..) => items.iter().for_each(|i| max_binder_in_expr(i, max)),
        CoreExpr::Record { fields, .. } => fields.iter().for_each(|(_, v)| max_binder_in_expr(v, max)),
        CoreExpr::FieldAccess { base, .. } => max_binder_in_expr(base, max),
        CoreExpr::RecordUpdate { base, fields, .. } => {
            max_binder_in_expr(base, max);
            fields.iter().for_each(|(_, v)| max_binder_in_expr(v, max));
        }
        CoreExpr::RefNew(inner, ..) => max_binder_in_expr(inner, max),
        CoreExpr::Unsafe(inner, ..) => max_binder_in_expr(inner, max),
        CoreExpr::Annotation { expr, .. } => max_binder_in_expr(expr, max),
    }
}

fn max_binder_in_pattern(pattern: &CorePattern<Type>, max: &mut u64) {
    match pattern {
        CorePattern::Wildcard(..) | CorePattern::Literal(..) => {}
        CorePattern::Variable(b, ..) => *max = (*max).max(b.0),
        CorePattern::Variant { args, .. } => args.iter().for_each(|p| max_binder_in_pattern(p, max)),
        CorePattern::Tuple(items, ..) => items.iter().for_each(|p| max_binder_in_pattern(p, max)),
        CorePattern::Record { fields, .. } => fields.iter().for_each(|(_, p)| max_binder_in_pattern(p, max)),
    }
}

/// Node count of `expr`, used by the inlining cost model.
pub(crate) fn ast_size_expr<T>(expr: &CoreExpr<T>) -> usize {
    1 + match expr {
        CoreExpr::Literal(..) | CoreExpr::Var(..) | CoreExpr::ExternalRef(..) => 0,
        CoreExpr::Lambda { body, .. } => ast_size_expr(body),
        CoreExpr::Application { func, arg, .. } => ast_size_expr(func) + ast_size_expr(arg),
        CoreExpr::Let { value, body, .. } => ast_size_expr(value) + ast_size_expr(body),
        CoreExpr::LetRec { bindings, body, .. } => bindings.iter().map(|(_, _, v)| ast_size_expr(v)).sum::<usize>() + ast_size_expr(body),
        CoreExpr::Match { scrutinee, cases, .. } => {
            ast_size_expr(scrutinee)
                + cases
                    .iter()
                    .map(|c| c.guard.as_ref().map(ast_size_expr).unwrap_or(0) + ast_size_expr(&c.body))
                    .sum::<usize>()
        }
        CoreExpr::BinOp { left, right, .. } => ast_size_expr(left) + ast_size_expr(right),
        CoreExpr::UnOp { operand, .. } => ast_size_expr(operand),
        CoreExpr::Tuple(items, ..) => items.iter().map(ast_size_expr).sum(),
        CoreExpr::Record { fields, .. } => fields.iter().map(|(_, v)| ast_size_expr(v)).sum(),
        CoreExpr::FieldAccess { base, .. } => ast_size_expr(base),
        CoreExpr::RecordUpdate { base, fields, .. } => ast_size_expr(base) + fields.iter().map(|(_, v)| ast_size_expr(v)).sum::<usize>(),
        CoreExpr::RefNew(inner, ..) => ast_size_expr(inner),
        CoreExpr::Unsafe(inner, ..) => ast_size_expr(inner),
        CoreExpr::Annotation { expr, .. } => ast_size_expr(expr),
    }
}

pub fn ast_size(module: &CoreModule<Type>) -> usize {
    module
        .declarations
        .iter()
        .map(|decl| match decl {
            CoreDeclaration::Let { value, .. } => ast_size_expr(value),
            CoreDeclaration::LetRec { bindings, .. } => bindings.iter().map(|(_, _, v)| ast_size_expr(v)).sum(),
            CoreDeclaration::External { .. } | CoreDeclaration::TypeDef { .. } => 0,
        })
        .sum()
}

/// Structural hash of `expr`, ignoring [`Type`] and [`crate::lexer::token::Location`]:
/// a fixed-point driver only needs to know "did this pass change anything",
/// and two nodes differing only by source span or a resolved type variable
/// still count as the same tree for that purpose. Used instead of deriving
/// `Hash` on `CoreExpr` directly, since `Type` contains interior-mutable
/// `Cell`s that don't have a stable hash across unifications.
pub fn fingerprint(expr: &CoreExpr<Type>) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_expr(expr, &mut hasher);
    hasher.finish()
}

pub fn fingerprint_module(module: &CoreModule<Type>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for decl in &module.declarations {
        hash_decl(decl, &mut hasher);
    }
    hasher.finish()
}

fn hash_decl(decl: &CoreDeclaration<Type>, hasher: &mut impl Hasher) {
    match decl {
        CoreDeclaration::Let { binder, mutable, value, exported, .. } => {
            0u8.hash(hasher);
            binder.0.hash(hasher);
            mutable.hash(hasher);
            exported.hash(hasher);
            hash_expr(value, hasher);
        }
        CoreDeclaration::LetRec { bindings, exported, .. } => {
            1u8.hash(hasher);
            exported.hash(hasher);
            for (b, _, v) in bindings {
                b.0.hash(hasher);
                hash_expr(v, hasher);
            }
        }
        CoreDeclaration::External { name, .. } => {
            2u8.hash(hasher);
            name.hash(hasher);
        }
        CoreDeclaration::TypeDef { name, .. } => {
            3u8.hash(hasher);
            name.hash(hasher);
        }
    }
}

fn hash_lit(lit: &CoreLiteral, hasher: &mut impl Hasher) {
    match lit {
        CoreLiteral::Int(v) => {
            0u8.hash(hasher);
            v.hash(hasher);
        }
        CoreLiteral::Float(v) => {
            1u8.hash(hasher);
            v.to_bits().hash(hasher);
        }
        CoreLiteral::Str(v) => {
            2u8.hash(hasher);
            v.hash(hasher);
        }
        CoreLiteral::Bool(v) => {
            3u8.hash(hasher);
            v.hash(hasher);
        }
        CoreLiteral::Unit => 4u8.hash(hasher),
    }
}

fn hash_pattern(pattern: &CorePattern<Type>, hasher: &mut impl Hasher) {
    match pattern {
        CorePattern::Wildcard(..) => 0u8.hash(hasher),
        CorePattern::Variable(b, ..) => {
            1u8.hash(hasher);
            b.0.hash(hasher);
        }
        CorePattern::Literal(l, ..) => {
            2u8.hash(hasher);
            hash_lit(l, hasher);
        }
        CorePattern::Variant { name, args, .. } => {
            3u8.hash(hasher);
            name.hash(hasher);
            for a in args {
                hash_pattern(a, hasher);
            }
        }
        CorePattern::Tuple(items, ..) => {
            4u8.hash(hasher);
            for i in items {
                hash_pattern(i, hasher);
            }
        }
        CorePattern::Record { fields, .. } => {
            5u8.hash(hasher);
            for (n, p) in fields {
                n.hash(hasher);
                hash_pattern(p, hasher);
            }
        }
    }
}

fn hash_case(case: &CoreMatchCase<Type>, hasher: &mut impl Hasher) {
    hash_pattern(&case.pattern, hasher);
    match &case.guard {
        Some(g) => {
            true.hash(hasher);
            hash_expr(g, hasher);
        }
        None => false.hash(hasher),
    }
    hash_expr(&case.body, hasher);
}

fn hash_expr(expr: &CoreExpr<Type>, hasher: &mut impl Hasher) {
    match expr {
        CoreExpr::Literal(l, ..) => {
            0u8.hash(hasher);
            hash_lit(l, hasher);
        }
        CoreExpr::Var(b, ..) => {
            1u8.hash(hasher);
            b.0.hash(hasher);
        }
        CoreExpr::ExternalRef(name, ..) => {
            2u8.hash(hasher);
            name.hash(hasher);
        }
        CoreExpr::Lambda { param, body, .. } => {
            3u8.hash(hasher);
            param.0.hash(hasher);
            hash_expr(body, hasher);
        }
        CoreExpr::Application { func, arg, .. } => {
            4u8.hash(hasher);
            hash_expr(func, hasher);
            hash_expr(arg, hasher);
        }
        CoreExpr::Let { binder, mutable, value, body, .. } => {
            5u8.hash(hasher);
            binder.0.hash(hasher);
            mutable.hash(hasher);
            hash_expr(value, hasher);
            hash_expr(body, hasher);
        }
        CoreExpr::LetRec { bindings, body, .. } => {
            6u8.hash(hasher);
            for (b, _, v) in bindings {
                b.0.hash(hasher);
                hash_expr(v, hasher);
            }
            hash_expr(body, hasher);
        }
        CoreExpr::Match { scrutinee, cases, .. } => {
            7u8.hash(hasher);
            hash_expr(scrutinee, hasher);
            for case in cases {
                hash_case(case, hasher);
            }
        }
        CoreExpr::BinOp { op, left, right, .. } => {
            8u8.hash(hasher);
            op.hash(hasher);
            hash_expr(left, hasher);
            hash_expr(right, hasher);
        }
        CoreExpr::UnOp { op, operand, .. } => {
            9u8.hash(hasher);
            op.hash(hasher);
            hash_expr(operand, hasher);
        }
        CoreExpr::Tuple(items, ..) => {
            10u8.hash(hasher);
            for i in items {
                hash_expr(i, hasher);
            }
        }
        CoreExpr::Record { fields, .. } => {
            11u8.hash(hasher);
            for (n, v) in fields {
                n.hash(hasher);
                hash_expr(v, hasher);
            }
        }
        CoreExpr::FieldAccess { base, field, .. } => {
            12u8.hash(hasher);
            hash_expr(base, hasher);
            field.hash(hasher);
        }
        CoreExpr::RecordUpdate { base, fields, .. } => {
            13u8.hash(hasher);
            hash_expr(base, hasher);
            for (n, v) in fields {
                n.hash(hasher);
                hash_expr(v, hasher);
            }
        }
        CoreExpr::RefNew(inner, ..) => {
            14u8.hash(hasher);
            hash_expr(inner, hasher);
        }
        CoreExpr::Unsafe(inner, ..) => {
            15u8.hash(hasher);
            hash_expr(inner, hasher);
        }
        CoreExpr::Annotation { expr, .. } => {
            16u8.hash(hasher);
            hash_expr(expr, hasher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Location;

    fn loc() -> Location {
        Location::default()
    }

    fn module_with(value: CoreExpr<Type>) -> CoreModule<Type> {
        CoreModule {
            declarations: vec![CoreDeclaration::Let {
                binder: BinderId(0),
                name: "main".into(),
                mutable: false,
                value,
                exported: true,
                location: loc(),
            }],
            location: loc(),
        }
    }

    #[test]
    fn test_o0_is_identity() {
        let expr = CoreExpr::BinOp {
            op: crate::core::CoreBinOp::Add,
            left: Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())),
            right: Box::new(CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let module = module_with(expr.clone());
        let result = optimize(module, &OptimizerOptions { level: OptLevel::O0, max_iterations: 16 });
        assert_eq!(result.metrics.constant_folds, 0);
        assert_eq!(result.metrics.iterations, 0);
    }

    #[test]
    fn test_o1_folds_constant_addition() {
        let expr = CoreExpr::BinOp {
            op: crate::core::CoreBinOp::Add,
            left: Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())),
            right: Box::new(CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let module = module_with(expr);
        let result = optimize(module, &OptimizerOptions { level: OptLevel::O1, max_iterations: 16 });
        assert_eq!(result.metrics.constant_folds, 1);
        match &result.module.declarations[0] {
            CoreDeclaration::Let { value, .. } => assert_eq!(*value, CoreExpr::Literal(CoreLiteral::Int(3), Type::Int, loc())),
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn test_o2_chains_beta_then_fold() {
        // `((x) => x + 1)(41)` should reduce all the way to `42` once
        // β-reduction and constant folding run to a fixed point.
        let param = BinderId(0);
        let lambda = CoreExpr::Lambda {
            param,
            param_name: "x".into(),
            body: Box::new(CoreExpr::BinOp {
                op: crate::core::CoreBinOp::Add,
                left: Box::new(CoreExpr::Var(param, "x".into(), Type::Int, loc())),
                right: Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())),
                info: Type::Int,
                location: loc(),
            }),
            info: Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
            location: loc(),
        };
        let app = CoreExpr::Application {
            func: Box::new(lambda),
            arg: Box::new(CoreExpr::Literal(CoreLiteral::Int(41), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        let module = module_with(app);
        let result = optimize(module, &OptimizerOptions { level: OptLevel::O2, max_iterations: 16 });
        match &result.module.declarations[0] {
            CoreDeclaration::Let { value, .. } => assert_eq!(*value, CoreExpr::Literal(CoreLiteral::Int(42), Type::Int, loc())),
            _ => panic!("expected let"),
        }
        assert_eq!(result.metrics.beta_reductions, 1);
        assert!(result.metrics.constant_folds >= 1);
    }

    #[test]
    fn test_fingerprint_ignores_location_but_not_shape() {
        let a = CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc());
        let b = CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, Location::new(std::rc::Rc::from("other.vf"), Default::default(), Default::default()));
        assert_eq!(fingerprint(&a), fingerprint(&b));
        let c = CoreExpr::Literal(CoreLiteral::Int(2), Type::Int, loc());
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }
}
