//! `vibefun_core`: lexer, parser, desugarer, type checker and optimizer for
//! the Vibefun language, stopping short of code generation (see each
//! module's own doc comment, and `DESIGN.md` for how this crate maps onto
//! its reference material).
//!
//! [`compile`] glues the phases together end to end. Each phase is also
//! usable standalone -- a caller that only wants to typecheck an
//! already-parsed module can call [`typechecker::check_module`] directly.

pub mod ast;
pub mod core;
pub mod desugar;
pub mod diagnostics;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod typechecker;
pub mod types;

#[cfg(test)]
mod eval;

use std::rc::Rc;

use diagnostics::{sort_diagnostics, Diagnostic};
use optimizer::{Metrics, OptimizerOptions};
use parser::ParserOptions;
use types::Type;

/// The full pipeline's successful output: a fully checked and optimized
/// module plus every warning collected along the way (§7's "diagnostics
/// accumulate by phase, the pipeline only aborts on error").
pub struct CompileResult {
    pub module: core::CoreModule<Type>,
    pub warnings: Vec<Diagnostic>,
    pub metrics: Metrics,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct CompileOptions {
    pub parser: ParserOptions,
    pub optimizer: OptimizerOptions,
}

/// Runs `source` through every phase up to and including the optimizer.
/// Stops and returns `Err` at the first phase that reports an error,
/// carrying that phase's diagnostics (§7: "on any error, compilation of the
/// affected module fails and no IR is handed to the code generator").
pub fn compile(file: impl Into<Rc<str>>, source: &str, options: &CompileOptions) -> Result<CompileResult, Vec<Diagnostic>> {
    let file = file.into();

    log::debug!("compiling {file}");

    let tokens = lexer::lex(file.clone(), source).map_err(|errs| errs.into_iter().map(Diagnostic::from).collect::<Vec<_>>())?;

    let module = parser::parse(tokens, options.parser.clone())?;

    let core_module = desugar::desugar(&module)?;

    let typed = typechecker::check_module(&core_module);
    if typed.has_errors() {
        let mut diags = typed.diagnostics;
        sort_diagnostics(&mut diags);
        return Err(diags);
    }

    let optimized = optimizer::optimize(typed.module, &options.optimizer);

    let mut warnings = typed.warnings;
    sort_diagnostics(&mut warnings);

    log::debug!(
        "compiled {file}: {} declarations, optimizer iterations={}",
        optimized.module.declarations.len(),
        optimized.metrics.iterations
    );

    Ok(CompileResult { module: optimized.module, warnings, metrics: optimized.metrics })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_let() {
        let result = compile("test.vf", "let x = 1 + 2", &CompileOptions::default());
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_compile_lexer_error_short_circuits() {
        let result = compile("test.vf", "let x = \"unterminated", &CompileOptions::default());
        let errs = result.expect_err("unterminated string should fail to lex");
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].phase, diagnostics::Phase::Lexer);
    }

    #[test]
    fn test_compile_type_error_reported() {
        let result = compile("test.vf", "let x = 1 + true", &CompileOptions::default());
        let errs = result.expect_err("adding int and bool should fail to typecheck");
        assert!(errs.iter().any(|d| d.phase == diagnostics::Phase::TypeChecker));
    }

    #[test]
    fn test_compile_with_optimization_folds_constants() {
        let options = CompileOptions { parser: ParserOptions::default(), optimizer: OptimizerOptions { level: optimizer::OptLevel::O2, max_iterations: 16 } };
        let result = compile("test.vf", "let x = 40 + 2", &options).expect("should compile");
        assert!(result.metrics.constant_folds >= 1);
    }
}
