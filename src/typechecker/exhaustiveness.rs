//! Pattern match exhaustiveness and reachability, via a usefulness check in
//! the style of Maranget's "Warnings for pattern matching" algorithm:
//! a match is exhaustive iff the wildcard row is *not* useful against the
//! matrix of already-covered rows, and a case is unreachable iff its own
//! row is not useful against the rows above it.
//!
//! The algorithm here works over a simplified pattern shape that drops
//! bindings and guards (a guarded arm can never be counted as covering its
//! pattern, since the guard might reject at runtime -- see
//! `is_exhaustive_match`, which treats a guarded row as absent from the
//! coverage matrix entirely).

use crate::core::{CoreExpr, CoreLiteral, CoreMatchCase, CorePattern};
use crate::diagnostics::{Diagnostic, Phase};
use crate::lexer::token::Location;
use crate::types::{prune, NominalShape, Type};

#[derive(Clone, Debug, PartialEq)]
enum Ctor {
    Wildcard,
    Lit(LitKey),
    Variant(String, usize),
    Tuple(usize),
    Record(Vec<String>),
}

#[derive(Clone, Debug, PartialEq)]
enum LitKey {
    Int(i64),
    Bool(bool),
    Str(String),
    Unit,
    Float(u64),
}

fn lit_key(l: &CoreLiteral) -> LitKey {
    match l {
        CoreLiteral::Int(v) => LitKey::Int(*v),
        CoreLiteral::Bool(v) => LitKey::Bool(*v),
        CoreLiteral::Str(v) => LitKey::Str(v.clone()),
        CoreLiteral::Unit => LitKey::Unit,
        CoreLiteral::Float(v) => LitKey::Float(v.to_bits()),
    }
}

#[derive(Clone, Debug)]
struct Row {
    ctor: Ctor,
    args: Vec<Row>,
}

fn simplify<T>(pattern: &CorePattern<T>) -> Row {
    match pattern {
        CorePattern::Wildcard(..) | CorePattern::Variable(..) => Row {
            ctor: Ctor::Wildcard,
            args: vec![],
        },
        CorePattern::Literal(l, ..) => Row {
            ctor: Ctor::Lit(lit_key(l)),
            args: vec![],
        },
        CorePattern::Variant { name, args, .. } => Row {
            ctor: Ctor::Variant(name.clone(), args.len()),
            args: args.iter().map(simplify).collect(),
        },
        CorePattern::Tuple(items, ..) => Row {
            ctor: Ctor::Tuple(items.len()),
            args: items.iter().map(simplify).collect(),
        },
        CorePattern::Record { fields, .. } => {
            let mut names: Vec<String> = fields.iter().map(|(n, _)| n.clone()).collect();
            names.sort();
            Row {
                ctor: Ctor::Record(names),
                args: fields.iter().map(|(_, p)| simplify(p)).collect(),
            }
        }
    }
}

/// All constructors a value of `scrutinee_ty` could ever be built with,
/// used to decide whether a set of matched constructors is complete.
/// Returns `None` for types with no finite constructor set (`Int`,
/// `Float`, `String`), where only a wildcard/variable can close a match.
fn known_ctors(scrutinee_ty: &Type) -> Option<Vec<Ctor>> {
    match prune(scrutinee_ty) {
        Type::Bool => Some(vec![Ctor::Lit(LitKey::Bool(true)), Ctor::Lit(LitKey::Bool(false))]),
        Type::Unit => Some(vec![Ctor::Lit(LitKey::Unit)]),
        Type::Tuple(items) => Some(vec![Ctor::Tuple(items.len())]),
        Type::Record(row) => {
            let row = crate::types::prune_row(&row);
            let mut names: Vec<String> = row.fields.keys().cloned().collect();
            names.sort();
            Some(vec![Ctor::Record(names)])
        }
        Type::Nominal { def, .. } => match &def.shape {
            NominalShape::Variant(ctors) => Some(
                ctors
                    .iter()
                    .map(|c| Ctor::Variant(c.name.clone(), c.fields.len()))
                    .collect(),
            ),
            NominalShape::Record(fields) => {
                let mut names: Vec<String> = fields.keys().cloned().collect();
                names.sort();
                Some(vec![Ctor::Record(names)])
            }
            NominalShape::Alias(t) => known_ctors(&t),
        },
        _ => None,
    }
}

fn ctor_arity(ctor: &Ctor) -> usize {
    match ctor {
        Ctor::Wildcard | Ctor::Lit(_) => 0,
        Ctor::Variant(_, n) | Ctor::Tuple(n) => *n,
        Ctor::Record(fields) => fields.len(),
    }
}

/// Specialize matrix `rows` for constructor `ctor`: rows whose head matches
/// `ctor` contribute their sub-patterns, wildcard rows contribute a run of
/// wildcards matching `ctor`'s arity, everything else is dropped.
fn specialize(rows: &[Vec<Row>], ctor: &Ctor) -> Vec<Vec<Row>> {
    let arity = ctor_arity(ctor);
    rows.iter()
        .filter_map(|row| {
            let (head, rest) = row.split_first()?;
            match &head.ctor {
                Ctor::Wildcard => {
                    let mut new_row: Vec<Row> = std::iter::repeat(Row {
                        ctor: Ctor::Wildcard,
                        args: vec![],
                    })
                    .take(arity)
                    .collect();
                    new_row.extend(rest.iter().cloned());
                    Some(new_row)
                }
                head_ctor if head_ctor == ctor => {
                    let mut new_row = head.args.clone();
                    new_row.extend(rest.iter().cloned());
                    Some(new_row)
                }
                _ => None,
            }
        })
        .collect()
}

fn default_matrix(rows: &[Vec<Row>]) -> Vec<Vec<Row>> {
    rows.iter()
        .filter_map(|row| {
            let (head, rest) = row.split_first()?;
            matches!(head.ctor, Ctor::Wildcard).then(|| rest.to_vec())
        })
        .collect()
}

fn head_ctors(rows: &[Vec<Row>]) -> Vec<Ctor> {
    let mut out: Vec<Ctor> = Vec::new();
    for row in rows {
        if let Some(head) = row.first() {
            if !matches!(head.ctor, Ctor::Wildcard) && !out.contains(&head.ctor) {
                out.push(head.ctor.clone());
            }
        }
    }
    out
}

/// Is `query` (one pattern row) useful against the matrix `rows` -- i.e.
/// does it match some value none of `rows` matches? Column-oriented
/// recursion following Maranget's `U` function; `scrutinee_tys` gives the
/// type of each remaining column so `known_ctors` can decide completeness.
fn is_useful(rows: &[Vec<Row>], query: &[Row], scrutinee_tys: &[Type]) -> bool {
    let Some((q_head, q_rest)) = query.split_first() else {
        return rows.is_empty();
    };
    let (ty_head, ty_rest) = scrutinee_tys.split_first().expect("type column matches pattern column");

    match &q_head.ctor {
        Ctor::Wildcard => {
            let used = head_ctors(rows);
            let complete = match known_ctors(ty_head) {
                None => false,
                Some(all) => all.iter().all(|c| used.contains(c)),
            };
            if !complete {
                return is_useful(&default_matrix(rows), q_rest, ty_rest);
            }
            used.iter().any(|ctor| {
                let arity = ctor_arity(ctor);
                let sub_tys: Vec<Type> = (0..arity).map(|_| ty_head.clone()).chain(ty_rest.iter().cloned()).collect();
                let wildcard_args: Vec<Row> = std::iter::repeat(Row {
                    ctor: Ctor::Wildcard,
                    args: vec![],
                })
                .take(arity)
                .collect();
                let mut new_query = wildcard_args;
                new_query.extend(q_rest.iter().cloned());
                is_useful(&specialize(rows, ctor), &new_query, &sub_tys)
            })
        }
        ctor => {
            let arity = ctor_arity(ctor);
            let sub_tys: Vec<Type> = (0..arity).map(|_| ty_head.clone()).chain(ty_rest.iter().cloned()).collect();
            let mut new_query = q_head.args.clone();
            new_query.extend(q_rest.iter().cloned());
            is_useful(&specialize(rows, ctor), &new_query, &sub_tys)
        }
    }
}

/// Indices of arms in `cases` that no input can ever reach, given the arms
/// above them -- the same usefulness check `check_match` uses for its
/// VF4900 warning, exposed separately so the optimizer's dead-arm removal
/// (§4.5.4) can recompute it directly against already-typed Core IR without
/// re-deriving diagnostics.
pub(crate) fn unreachable_case_indices<T>(
    cases: &[CoreMatchCase<T>],
    scrutinee_ty: &Type,
    is_useless_guard: &impl Fn(&CoreExpr<T>) -> bool,
) -> Vec<usize> {
    let mut unreachable = Vec::new();
    let mut covered: Vec<Vec<Row>> = Vec::new();

    for (i, case) in cases.iter().enumerate() {
        let row = vec![simplify(&case.pattern)];
        let guarded = case.guard.as_ref().map(|g| !is_useless_guard(g)).unwrap_or(false);

        if !is_useful(&covered, &row, std::slice::from_ref(scrutinee_ty)) {
            unreachable.push(i);
        }

        if !guarded {
            covered.push(row);
        }
    }

    unreachable
}

/// Is the match over `scrutinee_ty` with arm patterns `cases` exhaustive?
/// Shares the covered-rows bookkeeping with [`unreachable_case_indices`] so
/// the optimizer's constant-match and decision-tree passes can ask this
/// without re-deriving a `Vec<Diagnostic>`.
pub(crate) fn is_exhaustive<T>(cases: &[CoreMatchCase<T>], scrutinee_ty: &Type, is_useless_guard: &impl Fn(&CoreExpr<T>) -> bool) -> bool {
    let mut covered: Vec<Vec<Row>> = Vec::new();
    for case in cases {
        let guarded = case.guard.as_ref().map(|g| !is_useless_guard(g)).unwrap_or(false);
        if !guarded {
            covered.push(vec![simplify(&case.pattern)]);
        }
    }
    let wildcard_query = vec![Row { ctor: Ctor::Wildcard, args: vec![] }];
    !is_useful(&covered, &wildcard_query, std::slice::from_ref(scrutinee_ty))
}

/// When the scrutinee is a variant type and every unguarded arm matches a
/// bare constructor name (no arm is a catch-all wildcard/variable), names
/// the constructors no arm covers -- e.g. `Blue` for a `match` over `Color`
/// that only handles `Red` and `Green` (§8, scenario 4). Returns `None` for
/// any other shape (tuple/record scrutinee, or a match that already has a
/// wildcard arm), where `check_match` falls back to a plain message since
/// there's no finite, nameable list of missing cases.
fn missing_variant_names<T>(
    cases: &[CoreMatchCase<T>],
    scrutinee_ty: &Type,
    is_useless_guard: &impl Fn(&CoreExpr<T>) -> bool,
) -> Option<Vec<String>> {
    let Type::Nominal { def, .. } = prune(scrutinee_ty) else { return None };
    let NominalShape::Variant(ctors) = &def.shape else { return None };

    let mut used = std::collections::HashSet::new();
    for case in cases {
        let guarded = case.guard.as_ref().map(|g| !is_useless_guard(g)).unwrap_or(false);
        if guarded {
            continue;
        }
        match &case.pattern {
            CorePattern::Variant { name, .. } => {
                used.insert(name.clone());
            }
            _ => return None,
        }
    }

    let missing: Vec<String> = ctors.iter().map(|c| c.name.clone()).filter(|n| !used.contains(n)).collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing)
    }
}

/// Checks exhaustiveness and reachability of a `match`, emitting VF4400
/// (non-exhaustive, error) and VF4900 (unreachable arm, warning)
/// diagnostics. `scrutinee_ty` must already be the pruned, resolved type of
/// the scrutinee.
pub fn check_match<T>(
    cases: &[CoreMatchCase<T>],
    scrutinee_ty: &Type,
    match_location: &Location,
    is_useless_guard: impl Fn(&CoreExpr<T>) -> bool,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for &i in &unreachable_case_indices(cases, scrutinee_ty, &is_useless_guard) {
        diagnostics.push(Diagnostic::warning(
            "VF4900",
            Phase::TypeChecker,
            "unreachable match arm",
            cases[i].location.clone(),
        ));
    }

    if !is_exhaustive(cases, scrutinee_ty, &is_useless_guard) {
        let message = match missing_variant_names(cases, scrutinee_ty, &is_useless_guard) {
            Some(missing) => format!("match is not exhaustive: missing {}", missing.join(", ")),
            None => "match is not exhaustive".to_string(),
        };
        diagnostics.push(Diagnostic::error("VF4400", Phase::TypeChecker, message, match_location.clone()));
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::Location;
    use crate::types::{NominalDef, VariantCtorDef};

    fn color_def() -> std::rc::Rc<NominalDef> {
        std::rc::Rc::new(NominalDef {
            name: "Color".to_string(),
            params: vec![],
            shape: NominalShape::Variant(vec![
                VariantCtorDef { name: "Red".to_string(), fields: vec![] },
                VariantCtorDef { name: "Green".to_string(), fields: vec![] },
                VariantCtorDef { name: "Blue".to_string(), fields: vec![] },
            ]),
        })
    }

    fn variant_pattern(name: &str) -> CorePattern<()> {
        CorePattern::Variant { name: name.to_string(), args: vec![], info: (), location: Location::default() }
    }

    fn case(pattern: CorePattern<()>) -> CoreMatchCase<()> {
        CoreMatchCase {
            pattern,
            guard: None,
            body: CoreExpr::Literal(CoreLiteral::Unit, (), Location::default()),
            location: Location::default(),
        }
    }

    fn never_guarded(_: &CoreExpr<()>) -> bool {
        true
    }

    #[test]
    fn test_missing_variant_is_reported_by_name() {
        let def = color_def();
        let ty = Type::Nominal { name: "Color".to_string(), args: vec![], def: def.clone() };
        let cases = vec![case(variant_pattern("Red")), case(variant_pattern("Green"))];
        let diags = check_match(&cases, &ty, &Location::default(), never_guarded);
        let err = diags.iter().find(|d| d.code == "VF4400").expect("expected non-exhaustive error");
        assert!(err.message.contains("Blue"), "message was: {}", err.message);
    }

    #[test]
    fn test_exhaustive_variant_match_has_no_diagnostics() {
        let def = color_def();
        let ty = Type::Nominal { name: "Color".to_string(), args: vec![], def: def.clone() };
        let cases = vec![case(variant_pattern("Red")), case(variant_pattern("Green")), case(variant_pattern("Blue"))];
        let diags = check_match(&cases, &ty, &Location::default(), never_guarded);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_wildcard_after_all_variants_is_unreachable() {
        let def = color_def();
        let ty = Type::Nominal { name: "Color".to_string(), args: vec![], def: def.clone() };
        let cases = vec![
            case(variant_pattern("Red")),
            case(variant_pattern("Green")),
            case(variant_pattern("Blue")),
            case(CorePattern::Wildcard((), Location::default())),
        ];
        let diags = check_match(&cases, &ty, &Location::default(), never_guarded);
        assert!(diags.iter().any(|d| d.code == "VF4900"));
    }

    #[test]
    fn test_bool_match_requires_both_arms() {
        let cases = vec![case(CorePattern::Literal(CoreLiteral::Bool(true), (), Location::default()))];
        let diags = check_match(&cases, &Type::Bool, &Location::default(), never_guarded);
        assert!(diags.iter().any(|d| d.code == "VF4400"));
    }

    #[test]
    fn test_infinite_type_needs_wildcard() {
        let cases = vec![case(CorePattern::Literal(CoreLiteral::Int(1), (), Location::default()))];
        let diags = check_match(&cases, &Type::Int, &Location::default(), never_guarded);
        assert!(diags.iter().any(|d| d.code == "VF4400"));

        let cases_with_wildcard = vec![case(CorePattern::Literal(CoreLiteral::Int(1), (), Location::default())), case(CorePattern::Wildcard((), Location::default()))];
        let diags = check_match(&cases_with_wildcard, &Type::Int, &Location::default(), never_guarded);
        assert!(!diags.iter().any(|d| d.code == "VF4400"));
    }
}
