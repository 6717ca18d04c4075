//! Hand-written, Unicode-aware lexer.
//!
//! Tokens carry a precise [`Location`] (line, column, byte offset) and the
//! newline between two expressions is preserved as its own
//! [`TokenKind::Newline`] rather than being discarded as trivia, because the
//! parser needs it to run automatic semicolon insertion. Comments (`//` to
//! end of line, `/* */` arbitrarily nested) are the only trivia actually
//! dropped.
//!
//! Identifier and string literal *values* (not the surrounding source text)
//! are normalized to Unicode NFC before being stored on the token, so two
//! spellings of the same identifier that differ only by combining-character
//! order compare equal everywhere downstream.

pub mod token;

use std::fmt;
use std::rc::Rc;

use unicode_normalization::UnicodeNormalization;

pub use token::{is_reserved, keyword_kind, BoolLit, Location, Position, Token, TokenKind};

/// Reserved for future lexer configuration (the ambient-options convention
/// the parser and optimizer also follow, see `ParserOptions`/
/// `OptimizerOptions`). Currently empty: the lexer has no tunable
/// behaviour, since §4.1 fixes fail-fast-on-first-error as the only
/// failure mode.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LexerOptions {}

#[derive(Clone, Debug, PartialEq)]
pub struct LexError {
    pub message: String,
    pub location: Location,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LexError {}

impl From<LexError> for crate::diagnostics::Diagnostic {
    fn from(err: LexError) -> Self {
        crate::diagnostics::Diagnostic::error(
            "VF1001",
            crate::diagnostics::Phase::Lexer,
            err.message,
            err.location,
        )
    }
}

pub struct Lexer<'a> {
    file: Rc<str>,
    chars: Vec<char>,
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    #[allow(dead_code)]
    options: LexerOptions,
}

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<Rc<str>>, source: &'a str) -> Self {
        Lexer::with_options(file, source, LexerOptions::default())
    }

    pub fn with_options(file: impl Into<Rc<str>>, source: &'a str, options: LexerOptions) -> Self {
        Lexer {
            file: file.into(),
            chars: source.chars().collect(),
            source,
            pos: 0,
            line: 0,
            column: 0,
            tokens: Vec::new(),
            options,
        }
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.byte_offset(),
        }
    }

    fn byte_offset(&self) -> usize {
        self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, delta: usize) -> Option<char> {
        self.chars.get(self.pos + delta).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn loc(&self, start: Position) -> Location {
        Location::new(self.file.clone(), start, self.here())
    }

    /// Scans to `EOF` or the first error, whichever comes first. Per §4.1's
    /// failure semantics the lexer never recovers: one bad token aborts the
    /// whole scan and reports exactly that one diagnostic, rather than
    /// collecting a batch the way the parser and type checker do.
    pub fn lex(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        log::trace!("lexer: scanning {} bytes", self.source.len());
        loop {
            match self.scan_one() {
                Ok(Some(tok)) => {
                    let is_eof = tok.is_eof();
                    self.tokens.push(tok);
                    if is_eof {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    log::trace!("lexer: aborting at {}", e.message);
                    return Err(vec![e]);
                }
            }
        }
        log::trace!("lexer: produced {} tokens", self.tokens.len());
        Ok(self.tokens)
    }

    /// Scan the next token. `Ok(None)` means trivia was consumed (whitespace
    /// other than newline, or a comment) and the caller should loop again.
    fn scan_one(&mut self) -> Result<Option<Token>, LexError> {
        let Some(c) = self.peek() else {
            let start = self.here();
            return Ok(Some(Token::new(TokenKind::Eof, self.loc(start))));
        };

        if c == '\n' {
            let start = self.here();
            self.advance();
            return Ok(Some(Token::new(TokenKind::Newline, self.loc(start))));
        }

        if c.is_whitespace() {
            self.advance();
            return Ok(None);
        }

        if c == '/' && self.peek_at(1) == Some('/') {
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
            return Ok(None);
        }

        if c == '/' && self.peek_at(1) == Some('*') {
            self.scan_block_comment()?;
            return Ok(None);
        }

        if c == '"' && self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
            return self.scan_multiline_string().map(Some);
        }

        if c == '"' {
            return self.scan_string().map(Some);
        }

        if c.is_ascii_digit() {
            return self.scan_number().map(Some);
        }

        if is_ident_start(c) {
            return Ok(Some(self.scan_identifier_or_keyword()));
        }

        self.scan_operator().map(Some)
    }

    fn scan_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.here();
        self.advance(); // '/'
        self.advance(); // '*'
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => {
                    return Err(LexError {
                        message: "unterminated block comment".to_string(),
                        location: self.loc(start),
                    })
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        Ok(())
    }

    fn scan_string(&mut self) -> Result<Token, LexError> {
        let start = self.here();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError {
                        message: "unterminated string literal".to_string(),
                        location: self.loc(start),
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.scan_escape(start)?);
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        let normalized: String = value.nfc().collect();
        Ok(Token::new(TokenKind::Str(normalized), self.loc(start)))
    }

    /// `"""…"""` (§4.1 rule 6): like [`Lexer::scan_string`], but the closing
    /// delimiter is three quotes and an embedded newline is ordinary
    /// content rather than an error.
    fn scan_multiline_string(&mut self) -> Result<Token, LexError> {
        let start = self.here();
        self.advance(); // opening `"""`
        self.advance();
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        message: "unterminated multi-line string literal".to_string(),
                        location: self.loc(start),
                    })
                }
                Some('"') if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') => {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.scan_escape(start)?);
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        let normalized: String = value.nfc().collect();
        Ok(Token::new(TokenKind::Str(normalized), self.loc(start)))
    }

    fn scan_escape(&mut self, start: Position) -> Result<char, LexError> {
        let err = |msg: &str, loc: Location| LexError {
            message: msg.to_string(),
            location: loc,
        };
        let Some(c) = self.advance() else {
            return Err(err("unterminated escape sequence", self.loc(start)));
        };
        Ok(match c {
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            'x' => {
                let hi = self
                    .advance()
                    .ok_or_else(|| err("incomplete \\x escape", self.loc(start)))?;
                let lo = self
                    .advance()
                    .ok_or_else(|| err("incomplete \\x escape", self.loc(start)))?;
                let code = u32::from_str_radix(&format!("{hi}{lo}"), 16)
                    .map_err(|_| err("invalid \\x escape", self.loc(start)))?;
                char::from_u32(code).ok_or_else(|| err("invalid \\x escape codepoint", self.loc(start)))?
            }
            'u' => {
                if self.peek() == Some('{') {
                    self.advance();
                    let mut digits = String::new();
                    while let Some(c) = self.peek() {
                        if c == '}' {
                            break;
                        }
                        digits.push(c);
                        self.advance();
                    }
                    if self.peek() != Some('}') {
                        return Err(err("unterminated \\u{...} escape", self.loc(start)));
                    }
                    self.advance();
                    let code = u32::from_str_radix(&digits, 16)
                        .map_err(|_| err("invalid \\u{...} escape", self.loc(start)))?;
                    char::from_u32(code).ok_or_else(|| err("invalid \\u{...} escape codepoint", self.loc(start)))?
                } else {
                    let mut digits = String::new();
                    for _ in 0..4 {
                        let d = self
                            .advance()
                            .ok_or_else(|| err("incomplete \\u escape", self.loc(start)))?;
                        digits.push(d);
                    }
                    let code = u32::from_str_radix(&digits, 16)
                        .map_err(|_| err("invalid \\u escape", self.loc(start)))?;
                    char::from_u32(code).ok_or_else(|| err("invalid \\u escape codepoint", self.loc(start)))?
                }
            }
            other => return Err(err(&format!("unknown escape sequence '\\{other}'"), self.loc(start))),
        })
    }

    fn scan_number(&mut self) -> Result<Token, LexError> {
        let start = self.here();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits = self.scan_digits(|c| c.is_ascii_hexdigit());
            if digits.is_empty() {
                return Err(LexError {
                    message: "hexadecimal literal has no digits".to_string(),
                    location: self.loc(start),
                });
            }
            let value = i64::from_str_radix(&digits, 16).map_err(|_| LexError {
                message: "hexadecimal literal out of range".to_string(),
                location: self.loc(start),
            })?;
            return Ok(Token::new(TokenKind::Int(value), self.loc(start)));
        }

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('b') | Some('B')) {
            self.advance();
            self.advance();
            let digits = self.scan_digits(|c| c == '0' || c == '1');
            if digits.is_empty() {
                return Err(LexError {
                    message: "binary literal has no digits".to_string(),
                    location: self.loc(start),
                });
            }
            let value = i64::from_str_radix(&digits, 2).map_err(|_| LexError {
                message: "binary literal out of range".to_string(),
                location: self.loc(start),
            })?;
            return Ok(Token::new(TokenKind::Int(value), self.loc(start)));
        }

        let int_part = self.scan_digits(|c| c.is_ascii_digit());
        let mut is_float = false;
        let mut text = int_part;

        if self.peek() == Some('.') && self.peek_at(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            is_float = true;
            text.push(self.advance().unwrap());
            text.push_str(&self.scan_digits(|c| c.is_ascii_digit()));
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if self.peek_at(lookahead).map(|c| c.is_ascii_digit()).unwrap_or(false) {
                is_float = true;
                text.push(self.advance().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.advance().unwrap());
                }
                text.push_str(&self.scan_digits(|c| c.is_ascii_digit()));
            }
        }

        if is_float {
            let value: f64 = text.parse().map_err(|_| LexError {
                message: "invalid floating point literal".to_string(),
                location: self.loc(start),
            })?;
            Ok(Token::new(TokenKind::Float(value), self.loc(start)))
        } else {
            let value: i64 = text.parse().map_err(|_| LexError {
                message: "integer literal out of range".to_string(),
                location: self.loc(start),
            })?;
            Ok(Token::new(TokenKind::Int(value), self.loc(start)))
        }
    }

    /// Scan a run of digits matched by `matches`, allowing `_` separators
    /// anywhere except as the sole content (open question #1: resolved to
    /// allow `_` uniformly across decimal/hex/binary literals).
    fn scan_digits(&mut self, matches: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if matches(c) {
                out.push(c);
                self.advance();
            } else if c == '_' && self.peek_at(1).map(&matches).unwrap_or(false) {
                self.advance();
            } else {
                break;
            }
        }
        out
    }

    fn scan_identifier_or_keyword(&mut self) -> Token {
        let start = self.here();
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let location = self.loc(start);
        if ident == "true" {
            return Token::new(TokenKind::Bool(true), location);
        }
        if ident == "false" {
            return Token::new(TokenKind::Bool(false), location);
        }
        if let Some(kw) = keyword_kind(&ident) {
            return Token::new(kw, location);
        }
        let normalized: String = ident.nfc().collect();
        Token::new(TokenKind::Ident(normalized), location)
    }

    fn scan_operator(&mut self) -> Result<Token, LexError> {
        let start = self.here();
        let c0 = self.peek().unwrap();
        let c1 = self.peek_at(1);
        let c2 = self.peek_at(2);

        // length-3 operators
        if c0 == '.' && c1 == Some('.') && c2 == Some('.') {
            self.advance();
            self.advance();
            self.advance();
            return Ok(Token::new(TokenKind::DotDotDot, self.loc(start)));
        }

        // length-2 operators
        let two = match (c0, c1) {
            (':', Some('=')) => Some(TokenKind::ColonEq),
            (':', Some(':')) => Some(TokenKind::ColonColon),
            ('-', Some('>')) => Some(TokenKind::Arrow),
            ('=', Some('>')) => Some(TokenKind::FatArrow),
            ('.', Some('.')) => Some(TokenKind::DotDot),
            ('|', Some('>')) => Some(TokenKind::PipeOp),
            ('>', Some('>')) => Some(TokenKind::ComposeFwd),
            ('<', Some('<')) => Some(TokenKind::ComposeBack),
            ('=', Some('=')) => Some(TokenKind::EqEq),
            ('!', Some('=')) => Some(TokenKind::NotEq),
            ('<', Some('=')) => Some(TokenKind::Le),
            ('>', Some('=')) => Some(TokenKind::Ge),
            ('&', Some('&')) => Some(TokenKind::AndAnd),
            ('|', Some('|')) => Some(TokenKind::OrOr),
            _ => None,
        };
        if let Some(kind) = two {
            self.advance();
            self.advance();
            return Ok(Token::new(kind, self.loc(start)));
        }

        let one = match c0 {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '&' => TokenKind::Amp,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '!' => TokenKind::Bang,
            '|' => TokenKind::Bar,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            other => {
                self.advance();
                return Err(LexError {
                    message: format!("unexpected character '{other}'"),
                    location: self.loc(start),
                });
            }
        };
        self.advance();
        Ok(Token::new(one, self.loc(start)))
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_continue(c)
}

/// Run the lexer over `source` (conventionally a file's full contents),
/// attributing tokens to `file` for diagnostics.
pub fn lex(file: impl Into<Rc<str>>, source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    Lexer::new(file, source).lex()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex("test", src)
            .expect("lexing should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_lex_identifier() {
        assert_eq!(kinds("foo"), vec![TokenKind::Ident("foo".into()), TokenKind::Eof]);
    }

    #[test]
    fn test_lex_keywords() {
        assert_eq!(
            kinds("let mut x"),
            vec![
                TokenKind::Let,
                TokenKind::Mut,
                TokenKind::Ident("x".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_integer_and_float() {
        assert_eq!(kinds("42 3.14"), vec![TokenKind::Int(42), TokenKind::Float(3.14), TokenKind::Eof]);
    }

    #[test]
    fn test_lex_hex_and_binary_with_underscore() {
        assert_eq!(
            kinds("0xFF_00 0b1010_1010"),
            vec![TokenKind::Int(0xFF00), TokenKind::Int(0b10101010), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\u{1F600}""#),
            vec![TokenKind::Str("a\nb\u{1F600}".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_multiline_string_spans_newlines() {
        assert_eq!(
            kinds("\"\"\"line one\nline two\"\"\""),
            vec![TokenKind::Str("line one\nline two".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_multiline_string_supports_escapes() {
        assert_eq!(
            kinds("\"\"\"a\\tb\"\"\""),
            vec![TokenKind::Str("a\tb".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_unterminated_multiline_string_errors() {
        let err = lex("test.vf", "\"\"\"abc").unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err[0].message.contains("unterminated"));
    }

    #[test]
    fn test_lex_nested_block_comment() {
        assert_eq!(kinds("/* a /* b */ c */ 1"), vec![TokenKind::Int(1), TokenKind::Eof]);
    }

    #[test]
    fn test_lex_unterminated_block_comment_errors() {
        let err = lex("test", "/* never closed").unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_lex_maximal_munch_operators() {
        assert_eq!(
            kinds("a |> b >> c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::PipeOp,
                TokenKind::Ident("b".into()),
                TokenKind::ComposeFwd,
                TokenKind::Ident("c".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_colon_vs_colon_eq_vs_colon_colon() {
        assert_eq!(
            kinds(": := ::"),
            vec![TokenKind::Colon, TokenKind::ColonEq, TokenKind::ColonColon, TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_preserves_newline_token() {
        assert_eq!(
            kinds("a\nb"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Newline,
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_lex_dot_dot_dot_vs_dot_dot() {
        assert_eq!(kinds("...").pop().unwrap(), TokenKind::Eof);
        assert_eq!(kinds("..."), vec![TokenKind::DotDotDot, TokenKind::Eof]);
        assert_eq!(kinds(".."), vec![TokenKind::DotDot, TokenKind::Eof]);
    }
}
