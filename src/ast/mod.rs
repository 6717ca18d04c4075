//! Surface abstract syntax tree: the output of the parser, before
//! desugaring. Unlike the Core IR (see [`crate::core`]), the surface AST is
//! not generic over a compilation phase -- it carries only what the parser
//! can know (optional user-written type annotations), not inferred types.

pub mod declaration;
pub mod expression;
pub mod pattern;
pub mod ty;

pub use declaration::{Declaration, ImportItem, ImportKind, Module, TypeDef, VariantCtor};
pub use expression::{BinaryOperator, BlockStmt, Expression, ListItem, MatchCase, RecordField, UnaryOperator};
pub use pattern::{Literal, Pattern, RecordPatternField};
pub use ty::TypeExpr;
