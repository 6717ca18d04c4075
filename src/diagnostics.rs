//! Cross-phase diagnostic type. Every fallible stage in the pipeline
//! (lexer, parser, desugarer, type checker, optimizer) reports failures and
//! warnings through this single type rather than a per-phase error enum, so
//! callers can merge and sort diagnostics from every phase uniformly.

use std::fmt;

use crate::lexer::token::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Which pipeline phase raised a diagnostic. Used to keep the `VF1xxx`
/// .. `VF5xxx` code ranges honest and to sort diagnostics phase-then-location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    Lexer,
    Parser,
    Desugarer,
    TypeChecker,
    Optimizer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Desugarer => "desugarer",
            Phase::TypeChecker => "typechecker",
            Phase::Optimizer => "optimizer",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub phase: Phase,
    pub severity: Severity,
    pub message: String,
    pub location: Location,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, phase: Phase, message: impl Into<String>, location: Location) -> Self {
        Diagnostic {
            code,
            phase,
            severity: Severity::Error,
            message: message.into(),
            location,
            expected: None,
            actual: None,
            hint: None,
        }
    }

    pub fn warning(code: &'static str, phase: Phase, message: impl Into<String>, location: Location) -> Self {
        Diagnostic {
            code,
            phase,
            severity: Severity::Warning,
            message: message.into(),
            location,
            expected: None,
            actual: None,
            hint: None,
        }
    }

    pub fn with_types(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn render(&self, source: &str) -> String {
        let mut msg = format!("[{}] {}", self.code, self.message);
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            msg.push_str(&format!(" (expected {expected}, got {actual})"));
        }
        if let Some(hint) = &self.hint {
            msg.push_str(&format!("\nhint: {hint}"));
        }
        self.location.render(source, &msg)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.phase, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Sort a batch of diagnostics into the stable order the pipeline promises:
/// phase of origin, then source position.
pub fn sort_diagnostics(diags: &mut [Diagnostic]) {
    diags.sort_by(|a, b| {
        a.phase
            .cmp(&b.phase)
            .then(a.location.start.offset.cmp(&b.location.start.offset))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Position;

    fn at(offset: usize) -> Location {
        Location::new(Rc::from("test.vf"), Position { line: 0, column: offset, offset }, Position { line: 0, column: offset, offset })
    }

    use std::rc::Rc;

    #[test]
    fn test_error_sets_severity_and_no_expected_actual() {
        let d = Diagnostic::error("VF1001", Phase::Lexer, "bad token", Location::default());
        assert_eq!(d.severity, Severity::Error);
        assert!(d.expected.is_none());
        assert!(d.actual.is_none());
    }

    #[test]
    fn test_warning_sets_severity() {
        let d = Diagnostic::warning("VF4900", Phase::TypeChecker, "unreachable arm", Location::default());
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn test_with_types_and_hint_populate_render() {
        let d = Diagnostic::error("VF4001", Phase::TypeChecker, "type mismatch", Location::default())
            .with_types("Int", "Bool")
            .with_hint("did you mean to compare?");
        let rendered = d.render("let x = 1 + true");
        assert!(rendered.contains("expected Int"));
        assert!(rendered.contains("got Bool"));
        assert!(rendered.contains("did you mean to compare?"));
    }

    #[test]
    fn test_display_is_phase_prefixed() {
        let d = Diagnostic::error("VF2001", Phase::Parser, "unexpected token", Location::default());
        let shown = d.to_string();
        assert!(shown.contains("VF2001"));
        assert!(shown.contains("parser"));
    }

    #[test]
    fn test_sort_diagnostics_orders_by_phase_then_offset() {
        let mut diags = vec![
            Diagnostic::error("VF4001", Phase::TypeChecker, "later phase, earlier offset", at(0)),
            Diagnostic::error("VF1001", Phase::Lexer, "earliest phase, later offset", at(5)),
            Diagnostic::error("VF1002", Phase::Lexer, "earliest phase, earliest offset", at(1)),
        ];
        sort_diagnostics(&mut diags);
        assert_eq!(diags[0].code, "VF1002");
        assert_eq!(diags[1].code, "VF1001");
        assert_eq!(diags[2].code, "VF4001");
    }
}
