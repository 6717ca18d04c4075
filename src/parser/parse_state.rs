use crate::diagnostics::{Diagnostic, Phase};
use crate::lexer::token::{Location, Token, TokenKind};

/// Token cursor with lookahead and error accumulation, in the spirit of
/// `why_lib`'s `ParseState`: a flat index into a pre-lexed token vector
/// rather than a streaming iterator, so the parser can freely backtrack for
/// disambiguation (tuple vs. parenthesized expr vs. lambda params).
pub struct ParseState {
    tokens: Vec<Token>,
    index: usize,
    pub errors: Vec<Diagnostic>,
    max_errors: usize,
}

impl ParseState {
    pub fn new(tokens: Vec<Token>, max_errors: usize) -> Self {
        ParseState {
            tokens,
            index: 0,
            errors: Vec::new(),
            max_errors,
        }
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    pub fn peek_at(&self, delta: usize) -> &Token {
        let idx = (self.index + delta).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    /// The token just consumed by the last `advance`, if any. Used to
    /// recognize an operator immediately to the left of the current
    /// (unexpected) token, e.g. the dangling `+` in `(x +)`.
    pub fn peek_prev(&self) -> Option<&Token> {
        if self.index == 0 {
            None
        } else {
            Some(&self.tokens[self.index - 1])
        }
    }

    /// Look ahead past any `Newline` tokens, without consuming them. Used to
    /// decide whether a newline should terminate a statement (ASI) or be
    /// treated as insignificant because the next significant token clearly
    /// continues the current construct (e.g. a binary operator, `.` method
    /// chain, or closing delimiter).
    pub fn peek_significant(&self) -> &Token {
        let mut idx = self.index;
        while matches!(self.tokens.get(idx).map(|t| &t.kind), Some(TokenKind::Newline)) {
            idx += 1;
        }
        &self.tokens[idx.min(self.tokens.len() - 1)]
    }

    pub fn advance(&mut self) -> Token {
        let tok = self.tokens[self.index.min(self.tokens.len() - 1)].clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    pub fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline) {
            self.advance();
        }
    }

    /// If the next non-newline token matches `kind`, consume the
    /// intervening newlines now so the caller's `eat`/`check` sees it
    /// directly. Used at points where a continuation keyword or operator
    /// (`else`, `:=`, a pattern-alternative `|`) is allowed to start on the
    /// following line without the newline being treated as a terminator.
    pub fn skip_newlines_if_continues(&mut self, kind: &TokenKind) {
        if std::mem::discriminant(&self.peek_significant().kind) == std::mem::discriminant(kind) {
            self.skip_newlines();
        }
    }

    /// Consume one or more `Newline`/`;` tokens, the statement separator.
    /// Returns `true` if at least one separator (or end-of-block/EOF) was
    /// found.
    pub fn skip_statement_separators(&mut self) -> bool {
        let mut found = false;
        loop {
            match self.peek().kind {
                TokenKind::Newline | TokenKind::Semi => {
                    self.advance();
                    found = true;
                }
                _ => break,
            }
        }
        found
    }

    pub fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub fn eat(&mut self, kind: &TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, Diagnostic> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let tok = self.peek().clone();
            Err(Diagnostic::error(
                "VF2001",
                Phase::Parser,
                format!("expected {what}, found `{}`", tok.kind),
                tok.location.clone(),
            ))
        }
    }

    pub fn last_location(&self) -> Location {
        let idx = self.index.saturating_sub(1);
        self.tokens[idx].location.clone()
    }

    pub fn add_error(&mut self, diag: Diagnostic) {
        self.errors.push(diag);
    }

    pub fn has_room_for_errors(&self) -> bool {
        self.errors.len() < self.max_errors
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Error recovery: skip tokens until a plausible declaration or
    /// statement boundary (`;`, newline, or a keyword that starts a new
    /// top-level declaration), so one malformed construct doesn't cascade
    /// into spurious errors for the rest of the file.
    pub fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semi | TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::Let
                | TokenKind::Type
                | TokenKind::External
                | TokenKind::Import
                | TokenKind::Export => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
