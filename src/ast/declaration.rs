use crate::ast::expression::Expression;
use crate::ast::ty::TypeExpr;
use crate::lexer::token::Location;

#[derive(Clone, Debug, PartialEq)]
pub struct VariantCtor {
    pub name: String,
    pub fields: Vec<TypeExpr>,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDef {
    Alias(TypeExpr),
    Variant(Vec<VariantCtor>),
    Record(Vec<(String, TypeExpr)>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportItem {
    pub name: String,
    pub alias: Option<String>,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportKind {
    Named(Vec<ImportItem>),
    Namespace(String),
    TypeOnly(Vec<ImportItem>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    Let {
        pattern: crate::ast::pattern::Pattern,
        mutable: bool,
        type_annotation: Option<TypeExpr>,
        value: Expression,
        exported: bool,
        location: Location,
    },
    LetRec {
        bindings: Vec<(String, Option<TypeExpr>, Expression)>,
        exported: bool,
        location: Location,
    },
    Type {
        name: String,
        params: Vec<String>,
        def: TypeDef,
        exported: bool,
        location: Location,
    },
    External {
        name: String,
        generics: Vec<String>,
        ty: TypeExpr,
        location: Location,
    },
    Import {
        kind: ImportKind,
        path: String,
        location: Location,
    },
    /// `export name;` re-exporting an already-bound name.
    Export { name: String, location: Location },
}

impl Declaration {
    pub fn location(&self) -> &Location {
        match self {
            Declaration::Let { location, .. }
            | Declaration::LetRec { location, .. }
            | Declaration::Type { location, .. }
            | Declaration::External { location, .. }
            | Declaration::Import { location, .. }
            | Declaration::Export { location, .. } => location,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub declarations: Vec<Declaration>,
    pub location: Location,
}
