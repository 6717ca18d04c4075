use crate::ast::ty::TypeExpr;
use crate::lexer::token::Location;

#[derive(Clone, Debug, PartialEq)]
pub enum RecordPatternField {
    /// `{ x }` meaning `{ x: x }`
    Shorthand(String, Location),
    Full(String, Pattern),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Wildcard(Location),
    Variable(String, Location),
    Literal(Literal, Location),
    /// A nominal constructor pattern: `Some(x)`, `Cons(h, t)`, `Nil`.
    Variant {
        name: String,
        args: Vec<Pattern>,
        location: Location,
    },
    Record {
        fields: Vec<RecordPatternField>,
        location: Location,
    },
    Tuple(Vec<Pattern>, Location),
    /// `[]`, `[p1, .., pn]`, `[p1, .., pn, ...rest]`.
    List {
        items: Vec<Pattern>,
        rest: Option<Box<Pattern>>,
        location: Location,
    },
    Or(Vec<Pattern>, Location),
    Annotated {
        pattern: Box<Pattern>,
        ty: TypeExpr,
        location: Location,
    },
}

impl Pattern {
    pub fn location(&self) -> &Location {
        match self {
            Pattern::Wildcard(loc)
            | Pattern::Variable(_, loc)
            | Pattern::Literal(_, loc)
            | Pattern::Variant { location: loc, .. }
            | Pattern::Record { location: loc, .. }
            | Pattern::Tuple(_, loc)
            | Pattern::List { location: loc, .. }
            | Pattern::Or(_, loc)
            | Pattern::Annotated { location: loc, .. } => loc,
        }
    }

    /// Every variable bound by this pattern, left to right.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bound_names(&mut out);
        out
    }

    fn collect_bound_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Wildcard(_) | Pattern::Literal(_, _) => {}
            Pattern::Variable(name, _) => out.push(name),
            Pattern::Variant { args, .. } => args.iter().for_each(|p| p.collect_bound_names(out)),
            Pattern::Record { fields, .. } => fields.iter().for_each(|f| match f {
                RecordPatternField::Shorthand(name, _) => out.push(name),
                RecordPatternField::Full(_, p) => p.collect_bound_names(out),
            }),
            Pattern::Tuple(items, _) => items.iter().for_each(|p| p.collect_bound_names(out)),
            Pattern::List { items, rest, .. } => {
                items.iter().for_each(|p| p.collect_bound_names(out));
                if let Some(r) = rest {
                    r.collect_bound_names(out);
                }
            }
            Pattern::Or(alts, _) => {
                if let Some(first) = alts.first() {
                    first.collect_bound_names(out);
                }
            }
            Pattern::Annotated { pattern, .. } => pattern.collect_bound_names(out),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}
