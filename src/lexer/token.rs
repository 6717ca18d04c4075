use std::fmt;
use std::rc::Rc;

/// A single point in a source file: 1-based line/column plus a 0-based byte offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Source span shared by every token and every AST/IR node.
///
/// `PartialEq` is intentionally permissive (always `true`) so that AST/IR
/// trees built at different points in the pipeline can be compared for
/// structural equality without their locations getting in the way -- the
/// same trick `why_lib`'s `Span` uses.
#[derive(Clone, Debug, Eq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub file: Rc<str>,
    pub start: Position,
    pub end: Position,
}

impl Default for Location {
    fn default() -> Self {
        Location {
            file: Rc::from(""),
            start: Position::default(),
            end: Position::default(),
        }
    }
}

impl PartialEq for Location {
    fn eq(&self, _other: &Location) -> bool {
        true
    }
}

impl Location {
    pub fn new(file: Rc<str>, start: Position, end: Position) -> Self {
        Location { file, start, end }
    }

    /// Merge two locations into a span covering both, keeping this span's
    /// start and the other's end -- used to build the location of a
    /// synthesized node from its sub-nodes.
    pub fn merge(&self, other: &Location) -> Location {
        Location {
            file: self.file.clone(),
            start: self.start,
            end: other.end,
        }
    }

    /// Render `msg` as a single-line-caret diagnostic pointing at this span
    /// within `source`. Falls back to a bare message if the span's line is
    /// out of range (can happen for `Location::default()` in tests).
    pub fn render(&self, source: &str, msg: &str) -> String {
        use colored::Colorize;

        let lines: Vec<&str> = source.lines().collect();
        let Some(line_str) = lines.get(self.start.line) else {
            return format!("{msg} (at {}:{})", self.start.line + 1, self.start.column + 1);
        };

        let margin = format!("{}", self.start.line + 1).len();
        let fill = " ".repeat(margin);
        let caret_pad = " ".repeat(self.start.column);

        format!(
            "{fill} |\n{line} |{line_str}\n{fill} |{caret_pad}^--- {msg}",
            line = self.start.line + 1
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BoolLit {
    True,
    False,
}

/// Every distinct lexical category the lexer can produce. Punctuation and
/// operators are individually named (rather than carrying a `&'static str`
/// payload) so the parser can match on them exhaustively.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TokenKind {
    // literals
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Ident(String),

    // keywords
    Let,
    Mut,
    Rec,
    And,
    Type,
    If,
    Then,
    Else,
    Match,
    When,
    Import,
    Export,
    From,
    As,
    In,
    External,
    Unsafe,
    Ref,
    While,
    Try,
    Catch,

    // reserved words: tokenize successfully, rejected by the parser
    Async,
    Await,
    Trait,
    Impl,
    Where,
    Do,
    Yield,
    Return,

    // operators, maximal munch, longest listed first within a length class
    ColonEq,     // :=
    ColonColon,  // ::
    Arrow,       // ->
    FatArrow,    // =>
    DotDotDot,   // ...
    DotDot,      // ..
    PipeOp,      // |>
    ComposeFwd,  // >>
    ComposeBack, // <<
    EqEq,        // ==
    NotEq,       // !=
    Le,          // <=
    Ge,          // >=
    AndAnd,      // &&
    OrOr,        // ||

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Assign, // =
    Lt,
    Gt,
    Bang,
    Bar,
    Colon,
    Dot,
    Comma,
    Semi,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(v) => write!(f, "{v}"),
            TokenKind::Float(v) => write!(f, "{v}"),
            TokenKind::Str(v) => write!(f, "{v:?}"),
            TokenKind::Bool(v) => write!(f, "{v}"),
            TokenKind::Ident(v) => write!(f, "{v}"),
            TokenKind::Newline => write!(f, "<newline>"),
            TokenKind::Eof => write!(f, "<eof>"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, location: Location) -> Self {
        Token { kind, location }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

/// Keyword lookup table consulted once an identifier has been scanned.
/// `true`/`false` are handled separately because they carry a literal value.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "let" => TokenKind::Let,
        "mut" => TokenKind::Mut,
        "rec" => TokenKind::Rec,
        "and" => TokenKind::And,
        "type" => TokenKind::Type,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "match" => TokenKind::Match,
        "when" => TokenKind::When,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "in" => TokenKind::In,
        "external" => TokenKind::External,
        "unsafe" => TokenKind::Unsafe,
        "ref" => TokenKind::Ref,
        "while" => TokenKind::While,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "async" => TokenKind::Async,
        "await" => TokenKind::Await,
        "trait" => TokenKind::Trait,
        "impl" => TokenKind::Impl,
        "where" => TokenKind::Where,
        "do" => TokenKind::Do,
        "yield" => TokenKind::Yield,
        "return" => TokenKind::Return,
        _ => return None,
    })
}

/// Whether `kind` is one of the reserved-but-unimplemented keywords: they
/// lex fine but the parser must refuse to build anything from them.
pub fn is_reserved(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Async
            | TokenKind::Await
            | TokenKind::Trait
            | TokenKind::Impl
            | TokenKind::Where
            | TokenKind::Do
            | TokenKind::Yield
            | TokenKind::Return
    )
}
