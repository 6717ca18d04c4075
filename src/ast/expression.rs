//! Surface expression AST produced by the parser.
//!
//! The full 17-level precedence chain (loosest to tightest) is:
//!
//! ```text
//!  0  =>                 lambda body, right-assoc
//!  1  :=                 reference assign, right-assoc
//!  2  :  (postfix)        type annotation, none
//!  3  |>                 pipe, left
//!  4  >> <<              composition, left
//!  5  ||                 logical or, left
//!  6  &&                 logical and, left
//!  7  == !=              equality, none (not chainable)
//!  8  < <= > >=          comparison, none (not chainable)
//! 11  ::                 cons, right
//! 12  &                  string concat, left
//! 13  + -                additive, left
//! 14  * / %              multiplicative, left
//! 15  - ! (prefix)        unary
//! 16  . f(x)              field access / application
//! 17  ( ) [ ] { } / literal/identifier   grouping and atoms
//! ```
//!
//! Levels 0, 1, 2 and 15-17 are not binary operators and are handled by
//! dedicated parse functions outside the binary precedence climb; levels
//! 9-10 are unused (reserved by the gap between comparison and cons in the
//! reference table). [`BinaryOperator::precedence`] renumbers the climb's
//! own levels (3-14 above) onto a dense 2-11 scale -- what matters is the
//! relative order, not the absolute numbers.

use crate::ast::pattern::{Literal, Pattern};
use crate::ast::ty::TypeExpr;
use crate::lexer::token::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Pipe,
    ComposeBack,
    ComposeFwd,
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Cons,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    /// Lower precedence number binds looser. Orders the climb's own levels
    /// (pipe < composition < or < and < equality < comparison < cons <
    /// concat < additive < multiplicative) onto a dense 2-11 scale; see the
    /// module doc comment for how this maps onto the reference table.
    pub fn precedence(self) -> u8 {
        use BinaryOperator::*;
        match self {
            Pipe => 2,
            ComposeBack | ComposeFwd => 3,
            Or => 4,
            And => 5,
            Eq | NotEq => 6,
            Lt | Le | Gt | Ge => 7,
            Cons => 8,
            Concat => 9,
            Add | Sub => 10,
            Mul | Div | Mod => 11,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, BinaryOperator::Cons)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    /// Prefix `!`, dereferences a `Ref<T>`.
    Deref,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordField {
    /// `{ x }` meaning `{ x: x }`, expanded during desugaring.
    Shorthand(String, Location),
    Full(String, Expression),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ListItem {
    Elem(Expression),
    /// `...xs` inside a list literal.
    Spread(Expression),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expression>,
    pub body: Expression,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockStmt {
    Let {
        pattern: Pattern,
        mutable: bool,
        value: Expression,
        location: Location,
    },
    LetRec {
        bindings: Vec<(String, Option<TypeExpr>, Expression)>,
        location: Location,
    },
    Expr(Expression),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal(Literal, Location),
    Var(String, Location),
    Lambda {
        params: Vec<Pattern>,
        param_types: Vec<Option<TypeExpr>>,
        return_type: Option<TypeExpr>,
        body: Box<Expression>,
        location: Location,
    },
    /// `f(a, b, c)` — curried into nested single-argument applications
    /// during desugaring, since Core IR's function type is unary.
    Call {
        func: Box<Expression>,
        args: Vec<Expression>,
        location: Location,
    },
    /// `let pat = e in body` (explicit `in`). A `let` without `in` inside a
    /// block is represented as `BlockStmt::Let` instead.
    Let {
        pattern: Pattern,
        mutable: bool,
        value: Box<Expression>,
        body: Box<Expression>,
        location: Location,
    },
    LetRec {
        bindings: Vec<(String, Option<TypeExpr>, Expression)>,
        body: Box<Expression>,
        location: Location,
    },
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
        location: Location,
    },
    Match {
        scrutinee: Box<Expression>,
        cases: Vec<MatchCase>,
        location: Location,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        location: Location,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
        location: Location,
    },
    Record {
        fields: Vec<RecordField>,
        location: Location,
    },
    RecordUpdate {
        base: Box<Expression>,
        fields: Vec<RecordField>,
        location: Location,
    },
    FieldAccess {
        base: Box<Expression>,
        field: String,
        location: Location,
    },
    Tuple(Vec<Expression>, Location),
    List {
        items: Vec<ListItem>,
        location: Location,
    },
    Block {
        statements: Vec<BlockStmt>,
        trailing: Box<Expression>,
        location: Location,
    },
    RefNew(Box<Expression>, Location),
    /// `target := value`
    Assign {
        target: Box<Expression>,
        value: Box<Expression>,
        location: Location,
    },
    Unsafe(Box<Expression>, Location),
    Annotation {
        expr: Box<Expression>,
        ty: TypeExpr,
        location: Location,
    },
    While {
        condition: Box<Expression>,
        body: Box<Expression>,
        location: Location,
    },
    Unit(Location),
}

impl Expression {
    pub fn location(&self) -> &Location {
        match self {
            Expression::Literal(_, loc)
            | Expression::Var(_, loc)
            | Expression::Lambda { location: loc, .. }
            | Expression::Call { location: loc, .. }
            | Expression::Let { location: loc, .. }
            | Expression::LetRec { location: loc, .. }
            | Expression::If { location: loc, .. }
            | Expression::Match { location: loc, .. }
            | Expression::Binary { location: loc, .. }
            | Expression::Unary { location: loc, .. }
            | Expression::Record { location: loc, .. }
            | Expression::RecordUpdate { location: loc, .. }
            | Expression::FieldAccess { location: loc, .. }
            | Expression::Tuple(_, loc)
            | Expression::List { location: loc, .. }
            | Expression::Block { location: loc, .. }
            | Expression::RefNew(_, loc)
            | Expression::Assign { location: loc, .. }
            | Expression::Unsafe(_, loc)
            | Expression::Annotation { location: loc, .. }
            | Expression::While { location: loc, .. }
            | Expression::Unit(loc) => loc,
        }
    }
}
