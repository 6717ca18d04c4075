//! Hand-written recursive-descent / precedence-climbing parser.
//!
//! Disambiguation between constructs that share a leading token is resolved
//! the way most production parsers resolve it: `{` is disambiguated by a
//! short, bounded lookahead (empty, `ident |` update, `ident :`/`,`/`}` vs.
//! anything else falls through to a block); `(...)` is parsed once as a
//! comma-separated expression list and only reinterpreted as a parameter
//! list if a `=>` follows, which avoids a second grammar for patterns in
//! argument position.

pub mod parse_state;

use crate::ast::*;
use crate::diagnostics::{Diagnostic, Phase};
use crate::lexer::token::{Token, TokenKind};
use parse_state::ParseState;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ParserOptions {
    pub max_errors: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions { max_errors: 10 }
    }
}

/// Strip `Newline` tokens that occur while nested inside `(...)` or
/// `[...]`, where line breaks are never significant. Tokens inside `{...}`
/// are left untouched because blocks and match arms use newlines for
/// automatic semicolon insertion.
fn strip_insignificant_newlines(tokens: Vec<Token>) -> Vec<Token> {
    let mut depth = 0i32;
    tokens
        .into_iter()
        .filter(|tok| {
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth -= 1,
                _ => {}
            }
            !(depth > 0 && matches!(tok.kind, TokenKind::Newline))
        })
        .collect()
}

pub fn parse(tokens: Vec<Token>, options: ParserOptions) -> Result<Module, Vec<Diagnostic>> {
    log::trace!("parser: {} tokens", tokens.len());
    let tokens = strip_insignificant_newlines(tokens);
    let start_location = tokens.first().map(|t| t.location.clone()).unwrap_or_default();
    let mut state = ParseState::new(tokens, options.max_errors);
    let mut declarations = Vec::new();

    state.skip_statement_separators();
    while !state.is_at_end() {
        if !state.has_room_for_errors() {
            break;
        }
        match parse_declaration(&mut state) {
            Ok(decl) => declarations.push(decl),
            Err(diag) => {
                state.add_error(diag);
                state.synchronize();
            }
        }
        state.skip_statement_separators();
    }

    log::trace!("parser: {} declarations, {} errors", declarations.len(), state.errors.len());
    if state.errors.is_empty() {
        Ok(Module {
            declarations,
            location: start_location,
        })
    } else {
        Err(state.errors)
    }
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

fn parse_declaration(state: &mut ParseState) -> Result<Declaration, Diagnostic> {
    if state.eat(&TokenKind::Export).is_some() {
        state.skip_newlines();
        return match state.peek().kind {
            TokenKind::Let => parse_let_or_let_rec(state, true),
            TokenKind::Type => parse_type_decl(state, true),
            _ => {
                let tok = state.advance();
                let TokenKind::Ident(name) = tok.kind else {
                    return Err(Diagnostic::error(
                        "VF2010",
                        Phase::Parser,
                        "expected a name after `export`",
                        tok.location,
                    ));
                };
                Ok(Declaration::Export {
                    name,
                    location: tok.location,
                })
            }
        };
    }

    match state.peek().kind {
        TokenKind::Let => parse_let_or_let_rec(state, false),
        TokenKind::Type => parse_type_decl(state, false),
        TokenKind::External => parse_external_decl(state),
        TokenKind::Import => parse_import_decl(state),
        _ => {
            let tok = state.peek().clone();
            Err(Diagnostic::error(
                "VF2000",
                Phase::Parser,
                format!("expected a declaration, found `{}`", tok.kind),
                tok.location,
            ))
        }
    }
}

fn parse_let_or_let_rec(state: &mut ParseState, exported: bool) -> Result<Declaration, Diagnostic> {
    let start = state.expect(TokenKind::Let, "`let`")?.location;
    state.skip_newlines();
    if state.eat(&TokenKind::Rec).is_some() {
        let bindings = parse_rec_bindings(state)?;
        let end = state.last_location();
        return Ok(Declaration::LetRec {
            bindings,
            exported,
            location: start.merge(&end),
        });
    }

    let mutable = state.eat(&TokenKind::Mut).is_some();
    let pattern = parse_pattern(state)?;
    state.skip_newlines();
    let type_annotation = if state.eat(&TokenKind::Colon).is_some() {
        state.skip_newlines();
        Some(parse_type(state)?)
    } else {
        None
    };
    state.skip_newlines();
    state.expect(TokenKind::Assign, "`=`")?;
    state.skip_newlines();
    let value = parse_expression(state)?;
    let end = value.location().clone();
    Ok(Declaration::Let {
        pattern,
        mutable,
        type_annotation,
        value,
        exported,
        location: start.merge(&end),
    })
}

fn parse_rec_bindings(state: &mut ParseState) -> Result<Vec<(String, Option<TypeExpr>, Expression)>, Diagnostic> {
    let mut bindings = Vec::new();
    loop {
        let name_tok = state.advance();
        let TokenKind::Ident(name) = name_tok.kind else {
            return Err(Diagnostic::error(
                "VF2011",
                Phase::Parser,
                "expected a binding name after `let rec`/`and`",
                name_tok.location,
            ));
        };
        state.skip_newlines();
        let ty = if state.eat(&TokenKind::Colon).is_some() {
            state.skip_newlines();
            Some(parse_type(state)?)
        } else {
            None
        };
        state.skip_newlines();
        state.expect(TokenKind::Assign, "`=`")?;
        state.skip_newlines();
        let value = parse_expression(state)?;
        bindings.push((name, ty, value));
        state.skip_newlines();
        if state.eat(&TokenKind::And).is_some() {
            state.skip_newlines();
            continue;
        }
        break;
    }
    Ok(bindings)
}

fn parse_type_decl(state: &mut ParseState, exported: bool) -> Result<Declaration, Diagnostic> {
    let start = state.expect(TokenKind::Type, "`type`")?.location;
    let name_tok = state.advance();
    let TokenKind::Ident(name) = name_tok.kind else {
        return Err(Diagnostic::error(
            "VF2020",
            Phase::Parser,
            "expected a type name",
            name_tok.location,
        ));
    };

    let mut params = Vec::new();
    if state.eat(&TokenKind::Lt).is_some() {
        loop {
            let p = state.advance();
            let TokenKind::Ident(p) = p.kind else {
                return Err(Diagnostic::error("VF2021", Phase::Parser, "expected type parameter", p.location));
            };
            params.push(p);
            if state.eat(&TokenKind::Comma).is_some() {
                continue;
            }
            break;
        }
        state.expect(TokenKind::Gt, "`>`")?;
    }

    state.skip_newlines();
    state.expect(TokenKind::Assign, "`=`")?;
    state.skip_newlines();

    let def = if state.check(&TokenKind::LBrace) {
        parse_record_type_def(state)?
    } else if matches!(state.peek().kind, TokenKind::Bar) || is_variant_start(state) {
        parse_variant_type_def(state)?
    } else {
        TypeDef::Alias(parse_type(state)?)
    };

    let end = state.last_location();
    Ok(Declaration::Type {
        name,
        params,
        def,
        exported,
        location: start.merge(&end),
    })
}

/// A type definition starts a variant body when it looks like
/// `Ctor(...)`/`Ctor` possibly preceded by a `|`, as opposed to a type
/// alias (which starts with a primitive/nominal name used as a *type*, not
/// a constructor declaration). We treat a leading `|` as unambiguous; with
/// no leading `|`, a bare capitalized identifier followed by `(` or a
/// statement separator is treated as the first variant constructor.
fn is_variant_start(state: &ParseState) -> bool {
    if let TokenKind::Ident(name) = &state.peek().kind {
        let is_ctor_case = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
        let next_continues = matches!(
            state.peek_at(1).kind,
            TokenKind::LParen | TokenKind::Bar | TokenKind::Newline | TokenKind::Semi | TokenKind::Eof
        );
        return is_ctor_case && next_continues;
    }
    false
}

fn parse_variant_type_def(state: &mut ParseState) -> Result<TypeDef, Diagnostic> {
    let mut ctors = Vec::new();
    state.eat(&TokenKind::Bar);
    loop {
        state.skip_newlines();
        let name_tok = state.advance();
        let TokenKind::Ident(name) = name_tok.kind else {
            return Err(Diagnostic::error(
                "VF2022",
                Phase::Parser,
                "expected a constructor name",
                name_tok.location,
            ));
        };
        let mut fields = Vec::new();
        if state.eat(&TokenKind::LParen).is_some() {
            if !state.check(&TokenKind::RParen) {
                loop {
                    fields.push(parse_type(state)?);
                    if state.eat(&TokenKind::Comma).is_some() {
                        continue;
                    }
                    break;
                }
            }
            state.expect(TokenKind::RParen, "`)`")?;
        }
        let end = state.last_location();
        ctors.push(VariantCtor {
            name,
            fields,
            location: name_tok.location.merge(&end),
        });
        state.skip_newlines();
        if state.eat(&TokenKind::Bar).is_some() {
            continue;
        }
        break;
    }
    Ok(TypeDef::Variant(ctors))
}

fn parse_record_type_def(state: &mut ParseState) -> Result<TypeDef, Diagnostic> {
    state.expect(TokenKind::LBrace, "`{`")?;
    let mut fields = Vec::new();
    state.skip_newlines();
    while !state.check(&TokenKind::RBrace) {
        let name_tok = state.advance();
        let TokenKind::Ident(name) = name_tok.kind else {
            return Err(Diagnostic::error("VF2023", Phase::Parser, "expected a field name", name_tok.location));
        };
        state.skip_newlines();
        state.expect(TokenKind::Colon, "`:`")?;
        state.skip_newlines();
        let ty = parse_type(state)?;
        fields.push((name, ty));
        state.skip_newlines();
        if state.eat(&TokenKind::Comma).is_some() {
            state.skip_newlines();
            continue;
        }
        break;
    }
    state.skip_newlines();
    state.expect(TokenKind::RBrace, "`}`")?;
    Ok(TypeDef::Record(fields))
}

fn parse_external_decl(state: &mut ParseState) -> Result<Declaration, Diagnostic> {
    let start = state.expect(TokenKind::External, "`external`")?.location;
    let name_tok = state.advance();
    let TokenKind::Ident(name) = name_tok.kind else {
        return Err(Diagnostic::error(
            "VF2030",
            Phase::Parser,
            "expected an external binding name",
            name_tok.location,
        ));
    };
    let mut generics = Vec::new();
    if state.eat(&TokenKind::Lt).is_some() {
        loop {
            let p = state.advance();
            let TokenKind::Ident(p) = p.kind else {
                return Err(Diagnostic::error("VF2031", Phase::Parser, "expected type parameter", p.location));
            };
            generics.push(p);
            if state.eat(&TokenKind::Comma).is_some() {
                continue;
            }
            break;
        }
        state.expect(TokenKind::Gt, "`>`")?;
    }
    state.skip_newlines();
    state.expect(TokenKind::Colon, "`:`")?;
    state.skip_newlines();
    let ty = parse_type(state)?;
    let end = state.last_location();
    Ok(Declaration::External {
        name,
        generics,
        ty,
        location: start.merge(&end),
    })
}

fn parse_import_decl(state: &mut ParseState) -> Result<Declaration, Diagnostic> {
    let start = state.expect(TokenKind::Import, "`import`")?.location;
    state.skip_newlines();

    let kind = if matches!(state.peek().kind, TokenKind::Star) {
        state.advance();
        state.skip_newlines();
        state.expect(TokenKind::As, "`as`")?;
        state.skip_newlines();
        let alias_tok = state.advance();
        let TokenKind::Ident(alias) = alias_tok.kind else {
            return Err(Diagnostic::error("VF2040", Phase::Parser, "expected a namespace name", alias_tok.location));
        };
        ImportKind::Namespace(alias)
    } else {
        let type_only = state.eat(&TokenKind::Type).is_some();
        state.skip_newlines();
        state.expect(TokenKind::LBrace, "`{`")?;
        let items = parse_import_items(state)?;
        state.expect(TokenKind::RBrace, "`}`")?;
        if type_only {
            ImportKind::TypeOnly(items)
        } else {
            ImportKind::Named(items)
        }
    };

    state.skip_newlines();
    state.expect(TokenKind::From, "`from`")?;
    state.skip_newlines();
    let path_tok = state.advance();
    let TokenKind::Str(path) = path_tok.kind else {
        return Err(Diagnostic::error("VF2041", Phase::Parser, "expected a module path string", path_tok.location));
    };
    let end = path_tok.location.clone();
    Ok(Declaration::Import {
        kind,
        path,
        location: start.merge(&end),
    })
}

fn parse_import_items(state: &mut ParseState) -> Result<Vec<ImportItem>, Diagnostic> {
    let mut items = Vec::new();
    state.skip_newlines();
    while !state.check(&TokenKind::RBrace) {
        let name_tok = state.advance();
        let TokenKind::Ident(name) = name_tok.kind else {
            return Err(Diagnostic::error("VF2042", Phase::Parser, "expected an import name", name_tok.location));
        };
        state.skip_newlines();
        let alias = if state.eat(&TokenKind::As).is_some() {
            state.skip_newlines();
            let alias_tok = state.advance();
            let TokenKind::Ident(alias) = alias_tok.kind else {
                return Err(Diagnostic::error("VF2043", Phase::Parser, "expected an alias name", alias_tok.location));
            };
            Some(alias)
        } else {
            None
        };
        items.push(ImportItem {
            name,
            alias,
            location: name_tok.location,
        });
        state.skip_newlines();
        if state.eat(&TokenKind::Comma).is_some() {
            state.skip_newlines();
            continue;
        }
        break;
    }
    state.skip_newlines();
    Ok(items)
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

pub fn parse_expression(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    parse_assign(state)
}

fn parse_assign(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let lhs = parse_binary(state, 2)?;
    state.skip_newlines_if_continues(&TokenKind::ColonEq);
    if state.eat(&TokenKind::ColonEq).is_some() {
        state.skip_newlines();
        let rhs = parse_assign(state)?;
        let loc = lhs.location().merge(rhs.location());
        return Ok(Expression::Assign {
            target: Box::new(lhs),
            value: Box::new(rhs),
            location: loc,
        });
    }
    Ok(lhs)
}

fn token_to_binop(kind: &TokenKind) -> Option<BinaryOperator> {
    Some(match kind {
        TokenKind::OrOr => BinaryOperator::Or,
        TokenKind::AndAnd => BinaryOperator::And,
        TokenKind::PipeOp => BinaryOperator::Pipe,
        TokenKind::ComposeBack => BinaryOperator::ComposeBack,
        TokenKind::ComposeFwd => BinaryOperator::ComposeFwd,
        TokenKind::EqEq => BinaryOperator::Eq,
        TokenKind::NotEq => BinaryOperator::NotEq,
        TokenKind::Lt => BinaryOperator::Lt,
        TokenKind::Le => BinaryOperator::Le,
        TokenKind::Gt => BinaryOperator::Gt,
        TokenKind::Ge => BinaryOperator::Ge,
        TokenKind::ColonColon => BinaryOperator::Cons,
        TokenKind::Amp => BinaryOperator::Concat,
        TokenKind::Plus => BinaryOperator::Add,
        TokenKind::Minus => BinaryOperator::Sub,
        TokenKind::Star => BinaryOperator::Mul,
        TokenKind::Slash => BinaryOperator::Div,
        TokenKind::Percent => BinaryOperator::Mod,
        _ => return None,
    })
}

/// Standard precedence-climbing binary parser (Pratt's algorithm).
fn parse_binary(state: &mut ParseState, min_prec: u8) -> Result<Expression, Diagnostic> {
    let mut lhs = parse_annotated_unary(state)?;
    loop {
        let Some(op) = token_to_binop(&state.peek().kind) else { break };
        let prec = op.precedence();
        if prec < min_prec {
            break;
        }
        state.advance();
        state.skip_newlines();
        let next_min = if op.is_right_associative() { prec } else { prec + 1 };
        let rhs = parse_binary(state, next_min)?;
        let loc = lhs.location().merge(rhs.location());
        lhs = Expression::Binary {
            operator: op,
            left: Box::new(lhs),
            right: Box::new(rhs),
            location: loc,
        };
    }
    Ok(lhs)
}

fn parse_annotated_unary(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let expr = parse_unary(state)?;
    if state.check(&TokenKind::Colon) {
        state.advance();
        state.skip_newlines();
        let ty = parse_type(state)?;
        let loc = expr.location().merge(ty.location());
        return Ok(Expression::Annotation {
            expr: Box::new(expr),
            ty,
            location: loc,
        });
    }
    Ok(expr)
}

fn parse_unary(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let tok = state.peek().clone();
    match tok.kind {
        TokenKind::Minus => {
            state.advance();
            let operand = parse_unary(state)?;
            let loc = tok.location.merge(operand.location());
            Ok(Expression::Unary {
                operator: UnaryOperator::Neg,
                operand: Box::new(operand),
                location: loc,
            })
        }
        TokenKind::Bang => {
            state.advance();
            let operand = parse_unary(state)?;
            let loc = tok.location.merge(operand.location());
            Ok(Expression::Unary {
                operator: UnaryOperator::Deref,
                operand: Box::new(operand),
                location: loc,
            })
        }
        _ => parse_postfix(state),
    }
}

fn parse_postfix(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let mut expr = parse_primary(state)?;
    loop {
        match state.peek().kind {
            TokenKind::Dot => {
                state.advance();
                let field_tok = state.advance();
                let TokenKind::Ident(field) = field_tok.kind else {
                    return Err(Diagnostic::error(
                        "VF2050",
                        Phase::Parser,
                        "expected a field name after `.`",
                        field_tok.location,
                    ));
                };
                let loc = expr.location().merge(&field_tok.location);
                expr = Expression::FieldAccess {
                    base: Box::new(expr),
                    field,
                    location: loc,
                };
            }
            TokenKind::LParen => {
                state.advance();
                let mut args = Vec::new();
                if !state.check(&TokenKind::RParen) {
                    loop {
                        args.push(parse_expression(state)?);
                        if state.eat(&TokenKind::Comma).is_some() {
                            continue;
                        }
                        break;
                    }
                }
                let close = state.expect(TokenKind::RParen, "`)`")?;
                let loc = expr.location().merge(&close.location);
                expr = Expression::Call {
                    func: Box::new(expr),
                    args,
                    location: loc,
                };
            }
            _ => break,
        }
    }
    Ok(expr)
}

fn parse_primary(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let tok = state.peek().clone();
    match tok.kind {
        TokenKind::Int(v) => {
            state.advance();
            Ok(Expression::Literal(Literal::Int(v), tok.location))
        }
        TokenKind::Float(v) => {
            state.advance();
            Ok(Expression::Literal(Literal::Float(v), tok.location))
        }
        TokenKind::Str(ref v) => {
            let v = v.clone();
            state.advance();
            Ok(Expression::Literal(Literal::Str(v), tok.location))
        }
        TokenKind::Bool(v) => {
            state.advance();
            Ok(Expression::Literal(Literal::Bool(v), tok.location))
        }
        TokenKind::Ident(ref name) => {
            let name = name.clone();
            state.advance();
            if state.check(&TokenKind::FatArrow) {
                state.advance();
                state.skip_newlines();
                let body = parse_expression(state)?;
                let loc = tok.location.merge(body.location());
                let param = if name == "_" {
                    Pattern::Wildcard(tok.location.clone())
                } else {
                    Pattern::Variable(name, tok.location.clone())
                };
                return Ok(Expression::Lambda {
                    params: vec![param],
                    param_types: vec![None],
                    return_type: None,
                    body: Box::new(body),
                    location: loc,
                });
            }
            Ok(Expression::Var(name, tok.location))
        }
        TokenKind::LParen => parse_paren_or_lambda(state),
        TokenKind::LBrace => parse_brace_expr(state),
        TokenKind::LBracket => parse_list_literal(state),
        TokenKind::If => parse_if(state),
        TokenKind::Match => parse_match(state),
        TokenKind::Let => parse_let_expr(state),
        TokenKind::While => parse_while(state),
        TokenKind::Ref => {
            state.advance();
            let inner = parse_unary(state)?;
            let loc = tok.location.merge(inner.location());
            Ok(Expression::RefNew(Box::new(inner), loc))
        }
        TokenKind::Unsafe => {
            state.advance();
            let inner = parse_primary(state)?;
            let loc = tok.location.merge(inner.location());
            Ok(Expression::Unsafe(Box::new(inner), loc))
        }
        ref k if crate::lexer::token::is_reserved(k) => Err(Diagnostic::error(
            "VF2090",
            Phase::Parser,
            format!("`{k}` is reserved and not yet implemented"),
            tok.location,
        )),
        _ => {
            // An operator token can never start a primary expression, so
            // landing here with one (`(+)`, `(+ x)`, `( + )`) or with `)`
            // right after one was consumed (`(x +)`) means the source wrote
            // a bare operator application -- operator sections (§4.2.3)
            // aren't supported, so point at a lambda instead of just
            // reporting the stray token.
            let is_operator_section = token_to_binop(&tok.kind).is_some()
                || (matches!(tok.kind, TokenKind::RParen)
                    && state.peek_prev().is_some_and(|p| token_to_binop(&p.kind).is_some()));
            let diag = Diagnostic::error("VF2002", Phase::Parser, format!("unexpected token `{}`", tok.kind), tok.location);
            Err(if is_operator_section {
                diag.with_hint("operator sections are not supported; write a lambda instead, e.g. `(x) => x + 1`")
            } else {
                diag
            })
        }
    }
}

fn parse_while(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::While, "`while`")?.location;
    let condition = parse_expression(state)?;
    state.skip_newlines();
    let body = parse_brace_block(state, false)?;
    let loc = start.merge(body.location());
    Ok(Expression::While {
        condition: Box::new(condition),
        body: Box::new(body),
        location: loc,
    })
}

fn parse_if(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::If, "`if`")?.location;
    let condition = parse_expression(state)?;
    state.skip_newlines();
    state.expect(TokenKind::Then, "`then`")?;
    state.skip_newlines();
    let then_branch = parse_expression(state)?;
    state.skip_newlines_if_continues(&TokenKind::Else);
    let (else_branch, end) = if state.eat(&TokenKind::Else).is_some() {
        state.skip_newlines();
        let e = parse_expression(state)?;
        let end = e.location().clone();
        (Some(Box::new(e)), end)
    } else {
        (None, then_branch.location().clone())
    };
    let loc = start.merge(&end);
    Ok(Expression::If {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch,
        location: loc,
    })
}

fn parse_match(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::Match, "`match`")?.location;
    let scrutinee = parse_expression(state)?;
    state.skip_newlines();
    state.expect(TokenKind::LBrace, "`{`")?;
    state.skip_newlines();
    let mut cases = Vec::new();
    while !state.check(&TokenKind::RBrace) {
        cases.push(parse_match_case(state)?);
        state.skip_newlines();
        state.eat(&TokenKind::Comma);
        state.skip_newlines();
    }
    let close = state.expect(TokenKind::RBrace, "`}`")?;
    let loc = start.merge(&close.location);
    if cases.is_empty() {
        return Err(Diagnostic::error(
            "VF2025",
            Phase::Parser,
            "match must have at least one case",
            loc,
        ));
    }
    Ok(Expression::Match {
        scrutinee: Box::new(scrutinee),
        cases,
        location: loc,
    })
}

fn parse_match_case(state: &mut ParseState) -> Result<MatchCase, Diagnostic> {
    state.expect(TokenKind::Bar, "`|`")?;
    state.skip_newlines();
    let pattern = parse_or_pattern(state)?;
    state.skip_newlines();
    let guard = if state.eat(&TokenKind::When).is_some() {
        state.skip_newlines();
        Some(parse_expression(state)?)
    } else {
        None
    };
    state.skip_newlines();
    state.expect(TokenKind::FatArrow, "`=>`")?;
    state.skip_newlines();
    let body = parse_expression(state)?;
    let loc = pattern.location().merge(body.location());
    Ok(MatchCase {
        pattern,
        guard,
        body,
        location: loc,
    })
}

fn parse_let_expr(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::Let, "`let`")?.location;
    state.skip_newlines();
    if state.eat(&TokenKind::Rec).is_some() {
        let bindings = parse_rec_bindings(state)?;
        state.skip_newlines();
        state.expect(TokenKind::In, "`in`")?;
        state.skip_newlines();
        let body = parse_expression(state)?;
        let loc = start.merge(body.location());
        return Ok(Expression::LetRec {
            bindings,
            body: Box::new(body),
            location: loc,
        });
    }

    let mutable = state.eat(&TokenKind::Mut).is_some();
    let pattern = parse_pattern(state)?;
    state.skip_newlines();
    state.expect(TokenKind::Assign, "`=`")?;
    state.skip_newlines();
    let value = parse_expression(state)?;
    state.skip_newlines();
    state.expect(TokenKind::In, "`in`")?;
    state.skip_newlines();
    let body = parse_expression(state)?;
    let loc = start.merge(body.location());
    Ok(Expression::Let {
        pattern,
        mutable,
        value: Box::new(value),
        body: Box::new(body),
        location: loc,
    })
}

fn parse_list_literal(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::LBracket, "`[`")?.location;
    state.skip_newlines();
    let mut items = Vec::new();
    while !state.check(&TokenKind::RBracket) {
        if state.eat(&TokenKind::DotDotDot).is_some() {
            items.push(ListItem::Spread(parse_expression(state)?));
        } else {
            items.push(ListItem::Elem(parse_expression(state)?));
        }
        state.skip_newlines();
        if state.eat(&TokenKind::Comma).is_some() {
            state.skip_newlines();
            continue;
        }
        break;
    }
    state.skip_newlines();
    let close = state.expect(TokenKind::RBracket, "`]`")?;
    Ok(Expression::List {
        items,
        location: start.merge(&close.location),
    })
}

/// Disambiguates `{` between: empty record `{}`, record update
/// `{ base | field: val }`, record literal `{ field: val, shorthand }`,
/// and block `{ stmt; ...; expr }`.
fn parse_brace_expr(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.peek().location.clone();
    if matches!(state.peek_at(1).kind, TokenKind::RBrace) {
        state.advance();
        let close = state.advance();
        return Ok(Expression::Record {
            fields: vec![],
            location: start.merge(&close.location),
        });
    }

    if matches!(state.peek_at(1).kind, TokenKind::Ident(_)) && matches!(state.peek_at(2).kind, TokenKind::Bar) {
        state.advance();
        let name_tok = state.advance();
        let TokenKind::Ident(name) = name_tok.kind else { unreachable!() };
        let base = Expression::Var(name, name_tok.location);
        state.expect(TokenKind::Bar, "`|`")?;
        state.skip_newlines();
        let fields = parse_record_fields(state)?;
        let close = state.expect(TokenKind::RBrace, "`}`")?;
        return Ok(Expression::RecordUpdate {
            base: Box::new(base),
            fields,
            location: start.merge(&close.location),
        });
    }

    let looks_like_record = matches!(state.peek_at(1).kind, TokenKind::Ident(_))
        && matches!(
            state.peek_at(2).kind,
            TokenKind::Colon | TokenKind::Comma | TokenKind::RBrace
        );

    if looks_like_record {
        state.advance();
        let fields = parse_record_fields(state)?;
        let close = state.expect(TokenKind::RBrace, "`}`")?;
        return Ok(Expression::Record {
            fields,
            location: start.merge(&close.location),
        });
    }

    parse_brace_block(state, true)
}

fn parse_record_fields(state: &mut ParseState) -> Result<Vec<RecordField>, Diagnostic> {
    let mut fields = Vec::new();
    state.skip_newlines();
    while !state.check(&TokenKind::RBrace) {
        let name_tok = state.advance();
        let TokenKind::Ident(name) = name_tok.kind else {
            return Err(Diagnostic::error("VF2070", Phase::Parser, "expected a field name", name_tok.location));
        };
        state.skip_newlines();
        if state.eat(&TokenKind::Colon).is_some() {
            state.skip_newlines();
            let value = parse_expression(state)?;
            fields.push(RecordField::Full(name, value));
        } else {
            fields.push(RecordField::Shorthand(name, name_tok.location));
        }
        state.skip_newlines();
        if state.eat(&TokenKind::Comma).is_some() {
            state.skip_newlines();
            continue;
        }
        break;
    }
    state.skip_newlines();
    Ok(fields)
}

/// `check_ambiguity` is true only when this `{` was reached through
/// `parse_brace_expr`'s "otherwise" fallback (§4.2.3) -- a `{` in a context
/// that is unambiguously a block already (a `while` body) never needs the
/// bare-single-expression check below, since there is no competing record
/// reading to disambiguate against.
fn parse_brace_block(state: &mut ParseState, check_ambiguity: bool) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::LBrace, "`{`")?.location;
    state.skip_statement_separators();

    if state.check(&TokenKind::RBrace) {
        return Err(Diagnostic::error(
            "VF2082",
            Phase::Parser,
            "block must contain at least a trailing expression",
            start.merge(&state.peek().location),
        ));
    }

    let mut statements = Vec::new();
    loop {
        if state.check(&TokenKind::RBrace) {
            // statements were parsed but none ended up as a trailing
            // expression (e.g. the block ended right after a `let`);
            // treat the block as yielding `()`.
            let close = state.advance();
            return Ok(Expression::Block {
                statements,
                trailing: Box::new(Expression::Unit(close.location.clone())),
                location: start.merge(&close.location),
            });
        }

        if state.check(&TokenKind::Let) {
            let stmt = parse_block_let(state)?;
            statements.push(stmt);
            if !state.skip_statement_separators() && !state.check(&TokenKind::RBrace) {
                return Err(Diagnostic::error(
                    "VF2080",
                    Phase::Parser,
                    "expected a statement separator (newline or `;`)",
                    state.peek().location.clone(),
                ));
            }
            continue;
        }

        // A block led by `if`/`match`/`unsafe` is unambiguously a block
        // (the dispatch in `parse_brace_expr` already committed to that
        // reading) even with a single bare trailing expression. Everything
        // else reaching here (when `check_ambiguity` is set) fell through
        // `parse_brace_expr`'s "otherwise" case, where a single expression
        // immediately followed by `}` is ambiguous (§4.2.3) -- require `;`
        // or a tagged form instead.
        let is_keyword_led = matches!(state.peek().kind, TokenKind::If | TokenKind::Match | TokenKind::Unsafe);
        let expr = parse_expression(state)?;
        if state.check(&TokenKind::RBrace) {
            if check_ambiguity && statements.is_empty() && !is_keyword_led {
                return Err(Diagnostic::error(
                    "VF2083",
                    Phase::Parser,
                    "ambiguous single expression in braces: could be a block or a misplaced record",
                    expr.location().clone(),
                )
                .with_hint("add a `;` to make this a block, or use `{ field: value }` for a record"));
            }
            let close = state.advance();
            return Ok(Expression::Block {
                statements,
                trailing: Box::new(expr),
                location: start.merge(&close.location),
            });
        }

        if !state.skip_statement_separators() {
            return Err(Diagnostic::error(
                "VF2081",
                Phase::Parser,
                "expected a statement separator (newline or `;`) or `}`",
                state.peek().location.clone(),
            ));
        }
        statements.push(BlockStmt::Expr(expr));
    }
}

fn parse_block_let(state: &mut ParseState) -> Result<BlockStmt, Diagnostic> {
    let start = state.expect(TokenKind::Let, "`let`")?.location;
    state.skip_newlines();
    if state.eat(&TokenKind::Rec).is_some() {
        let bindings = parse_rec_bindings(state)?;
        let end = state.last_location();
        return Ok(BlockStmt::LetRec {
            bindings,
            location: start.merge(&end),
        });
    }
    let mutable = state.eat(&TokenKind::Mut).is_some();
    let pattern = parse_pattern(state)?;
    state.skip_newlines();
    state.expect(TokenKind::Assign, "`=`")?;
    state.skip_newlines();
    let value = parse_expression(state)?;
    let end = value.location().clone();
    Ok(BlockStmt::Let {
        pattern,
        mutable,
        value,
        location: start.merge(&end),
    })
}

fn parse_paren_or_lambda(state: &mut ParseState) -> Result<Expression, Diagnostic> {
    let start = state.expect(TokenKind::LParen, "`(`")?.location;
    state.skip_newlines();

    if state.eat(&TokenKind::RParen).is_some() {
        let end = state.last_location();
        let loc = start.merge(&end);
        if state.check(&TokenKind::FatArrow) {
            state.advance();
            state.skip_newlines();
            let body = parse_expression(state)?;
            let full = loc.merge(body.location());
            return Ok(Expression::Lambda {
                params: vec![],
                param_types: vec![],
                return_type: None,
                body: Box::new(body),
                location: full,
            });
        }
        return Ok(Expression::Unit(loc));
    }

    let mut items = vec![parse_expression(state)?];
    let mut trailing_comma = false;
    state.skip_newlines();
    while state.eat(&TokenKind::Comma).is_some() {
        trailing_comma = true;
        state.skip_newlines();
        if state.check(&TokenKind::RParen) {
            break;
        }
        items.push(parse_expression(state)?);
        trailing_comma = false;
        state.skip_newlines();
    }
    let close = state.expect(TokenKind::RParen, "`)`")?;
    let loc = start.merge(&close.location);

    if state.check(&TokenKind::FatArrow) {
        state.advance();
        state.skip_newlines();
        let body = parse_expression(state)?;
        let full = loc.merge(body.location());
        let mut params = Vec::with_capacity(items.len());
        let mut param_types = Vec::with_capacity(items.len());
        for item in items {
            let (pat, ty) = expr_to_param(item)?;
            params.push(pat);
            param_types.push(ty);
        }
        return Ok(Expression::Lambda {
            params,
            param_types,
            return_type: None,
            body: Box::new(body),
            location: full,
        });
    }

    if items.len() == 1 {
        if trailing_comma {
            return Err(Diagnostic::error(
                "VF2024",
                Phase::Parser,
                "tuple must have at least 2 elements",
                loc,
            )
            .with_hint("drop the trailing comma to parenthesize a single expression"));
        }
        return Ok(items.into_iter().next().unwrap());
    }

    Ok(Expression::Tuple(items, loc))
}

/// Reinterprets an already-parsed expression as a lambda parameter,
/// splitting off a top-level `Annotation` into the parameter's declared
/// type. Used once `=>` confirms a parenthesized list was a parameter list,
/// not a tuple or a parenthesized expression.
fn expr_to_param(expr: Expression) -> Result<(Pattern, Option<TypeExpr>), Diagnostic> {
    if let Expression::Annotation { expr, ty, .. } = expr {
        let pattern = expr_to_pattern(*expr)?;
        return Ok((pattern, Some(ty)));
    }
    Ok((expr_to_pattern(expr)?, None))
}

fn expr_to_pattern(expr: Expression) -> Result<Pattern, Diagnostic> {
    match expr {
        Expression::Var(name, loc) if name == "_" => Ok(Pattern::Wildcard(loc)),
        Expression::Var(name, loc) => Ok(Pattern::Variable(name, loc)),
        Expression::Tuple(items, loc) => Ok(Pattern::Tuple(
            items.into_iter().map(expr_to_pattern).collect::<Result<_, _>>()?,
            loc,
        )),
        Expression::Record { fields, location } => {
            let fields = fields
                .into_iter()
                .map(|f| match f {
                    RecordField::Shorthand(name, loc) => Ok(crate::ast::RecordPatternField::Shorthand(name, loc)),
                    RecordField::Full(name, expr) => {
                        Ok(crate::ast::RecordPatternField::Full(name, expr_to_pattern(expr)?))
                    }
                })
                .collect::<Result<_, Diagnostic>>()?;
            Ok(Pattern::Record { fields, location })
        }
        Expression::List { items, location } => {
            let mut out = Vec::new();
            let mut rest = None;
            for item in items {
                match item {
                    ListItem::Elem(e) => out.push(expr_to_pattern(e)?),
                    ListItem::Spread(e) => rest = Some(Box::new(expr_to_pattern(e)?)),
                }
            }
            Ok(Pattern::List {
                items: out,
                rest,
                location,
            })
        }
        Expression::Annotation { expr, ty, location } => Ok(Pattern::Annotated {
            pattern: Box::new(expr_to_pattern(*expr)?),
            ty,
            location,
        }),
        other => Err(Diagnostic::error(
            "VF2091",
            Phase::Parser,
            "this expression cannot be used as a lambda parameter",
            other.location().clone(),
        )),
    }
}

// ---------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------

fn parse_or_pattern(state: &mut ParseState) -> Result<Pattern, Diagnostic> {
    let first = parse_pattern(state)?;
    let mut alts = vec![first];
    state.skip_newlines_if_continues(&TokenKind::Bar);
    while matches!(state.peek().kind, TokenKind::Bar)
        && !matches!(state.peek_significant().kind, TokenKind::When | TokenKind::FatArrow)
    {
        state.advance();
        state.skip_newlines();
        alts.push(parse_pattern(state)?);
    }
    if alts.len() == 1 {
        return Ok(alts.into_iter().next().unwrap());
    }
    let loc = alts.first().unwrap().location().clone();
    Ok(Pattern::Or(alts, loc))
}

fn parse_pattern(state: &mut ParseState) -> Result<Pattern, Diagnostic> {
    let base = parse_pattern_atom(state)?;
    if state.check(&TokenKind::Colon) {
        state.advance();
        state.skip_newlines();
        let ty = parse_type(state)?;
        let loc = base.location().merge(ty.location());
        return Ok(Pattern::Annotated {
            pattern: Box::new(base),
            ty,
            location: loc,
        });
    }
    Ok(base)
}

fn parse_pattern_atom(state: &mut ParseState) -> Result<Pattern, Diagnostic> {
    let tok = state.peek().clone();
    match tok.kind {
        TokenKind::Ident(ref name) if name == "_" => {
            state.advance();
            Ok(Pattern::Wildcard(tok.location))
        }
        TokenKind::Ident(ref name) => {
            let name = name.clone();
            state.advance();
            let is_ctor = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
            if is_ctor {
                let mut args = Vec::new();
                if state.eat(&TokenKind::LParen).is_some() {
                    if !state.check(&TokenKind::RParen) {
                        loop {
                            args.push(parse_or_pattern(state)?);
                            if state.eat(&TokenKind::Comma).is_some() {
                                continue;
                            }
                            break;
                        }
                    }
                    let close = state.expect(TokenKind::RParen, "`)`")?;
                    return Ok(Pattern::Variant {
                        name,
                        args,
                        location: tok.location.merge(&close.location),
                    });
                }
                return Ok(Pattern::Variant {
                    name,
                    args,
                    location: tok.location,
                });
            }
            Ok(Pattern::Variable(name, tok.location))
        }
        TokenKind::Int(v) => {
            state.advance();
            Ok(Pattern::Literal(Literal::Int(v), tok.location))
        }
        TokenKind::Float(v) => {
            state.advance();
            Ok(Pattern::Literal(Literal::Float(v), tok.location))
        }
        TokenKind::Str(ref v) => {
            let v = v.clone();
            state.advance();
            Ok(Pattern::Literal(Literal::Str(v), tok.location))
        }
        TokenKind::Bool(v) => {
            state.advance();
            Ok(Pattern::Literal(Literal::Bool(v), tok.location))
        }
        TokenKind::LParen => {
            state.advance();
            state.skip_newlines();
            if state.eat(&TokenKind::RParen).is_some() {
                return Ok(Pattern::Literal(Literal::Unit, tok.location));
            }
            let mut items = vec![parse_or_pattern(state)?];
            state.skip_newlines();
            while state.eat(&TokenKind::Comma).is_some() {
                state.skip_newlines();
                if state.check(&TokenKind::RParen) {
                    break;
                }
                items.push(parse_or_pattern(state)?);
                state.skip_newlines();
            }
            let close = state.expect(TokenKind::RParen, "`)`")?;
            if items.len() == 1 {
                return Ok(items.into_iter().next().unwrap());
            }
            Ok(Pattern::Tuple(items, tok.location.merge(&close.location)))
        }
        TokenKind::LBracket => {
            state.advance();
            state.skip_newlines();
            let mut items = Vec::new();
            let mut rest = None;
            while !state.check(&TokenKind::RBracket) {
                if state.eat(&TokenKind::DotDotDot).is_some() {
                    rest = Some(Box::new(parse_pattern(state)?));
                } else {
                    items.push(parse_or_pattern(state)?);
                }
                state.skip_newlines();
                if state.eat(&TokenKind::Comma).is_some() {
                    state.skip_newlines();
                    continue;
                }
                break;
            }
            state.skip_newlines();
            let close = state.expect(TokenKind::RBracket, "`]`")?;
            Ok(Pattern::List {
                items,
                rest,
                location: tok.location.merge(&close.location),
            })
        }
        TokenKind::LBrace => {
            state.advance();
            state.skip_newlines();
            let mut fields = Vec::new();
            while !state.check(&TokenKind::RBrace) {
                let name_tok = state.advance();
                let TokenKind::Ident(name) = name_tok.kind else {
                    return Err(Diagnostic::error(
                        "VF2071",
                        Phase::Parser,
                        "expected a field name",
                        name_tok.location,
                    ));
                };
                state.skip_newlines();
                if state.eat(&TokenKind::Colon).is_some() {
                    state.skip_newlines();
                    let p = parse_or_pattern(state)?;
                    fields.push(crate::ast::RecordPatternField::Full(name, p));
                } else {
                    fields.push(crate::ast::RecordPatternField::Shorthand(name, name_tok.location));
                }
                state.skip_newlines();
                if state.eat(&TokenKind::Comma).is_some() {
                    state.skip_newlines();
                    continue;
                }
                break;
            }
            state.skip_newlines();
            let close = state.expect(TokenKind::RBrace, "`}`")?;
            Ok(Pattern::Record {
                fields,
                location: tok.location.merge(&close.location),
            })
        }
        _ => Err(Diagnostic::error(
            "VF2003",
            Phase::Parser,
            format!("unexpected token `{}` in pattern", tok.kind),
            tok.location,
        )),
    }
}

// ---------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------

fn parse_type(state: &mut ParseState) -> Result<TypeExpr, Diagnostic> {
    if state.check(&TokenKind::LParen) {
        let start = state.advance().location;
        state.skip_newlines();
        if state.check(&TokenKind::RParen) {
            state.advance();
            state.skip_newlines();
            state.expect(TokenKind::Arrow, "`->`")?;
            state.skip_newlines();
            let ret = parse_type(state)?;
            let loc = start.merge(ret.location());
            return Ok(TypeExpr::Function(vec![], Box::new(ret), loc));
        }
        let mut items = vec![parse_type(state)?];
        state.skip_newlines();
        while state.eat(&TokenKind::Comma).is_some() {
            state.skip_newlines();
            items.push(parse_type(state)?);
            state.skip_newlines();
        }
        let close = state.expect(TokenKind::RParen, "`)`")?;
        state.skip_newlines();
        if state.eat(&TokenKind::Arrow).is_some() {
            state.skip_newlines();
            let ret = parse_type(state)?;
            let loc = start.merge(ret.location());
            return Ok(TypeExpr::Function(items, Box::new(ret), loc));
        }
        if items.len() == 1 {
            return Ok(items.into_iter().next().unwrap());
        }
        return Ok(TypeExpr::Tuple(items, start.merge(&close.location)));
    }

    if state.check(&TokenKind::LBrace) {
        let start = state.advance().location;
        state.skip_newlines();
        let mut fields = Vec::new();
        while !state.check(&TokenKind::RBrace) {
            let name_tok = state.advance();
            let TokenKind::Ident(name) = name_tok.kind else {
                return Err(Diagnostic::error(
                    "VF2072",
                    Phase::Parser,
                    "expected a field name in record type",
                    name_tok.location,
                ));
            };
            state.skip_newlines();
            state.expect(TokenKind::Colon, "`:`")?;
            state.skip_newlines();
            let ty = parse_type(state)?;
            fields.push((name, ty));
            state.skip_newlines();
            if state.eat(&TokenKind::Comma).is_some() {
                state.skip_newlines();
                continue;
            }
            break;
        }
        state.skip_newlines();
        let close = state.expect(TokenKind::RBrace, "`}`")?;
        return Ok(TypeExpr::Record(fields, start.merge(&close.location)));
    }

    let name_tok = state.advance();
    let TokenKind::Ident(name) = name_tok.kind else {
        return Err(Diagnostic::error(
            "VF2073",
            Phase::Parser,
            format!("expected a type, found `{}`", name_tok.kind),
            name_tok.location,
        ));
    };

    if name == "Type" {
        return Ok(TypeExpr::Opaque(name_tok.location));
    }

    if state.eat(&TokenKind::Lt).is_some() {
        let mut args = vec![parse_type(state)?];
        state.skip_newlines();
        while state.eat(&TokenKind::Comma).is_some() {
            state.skip_newlines();
            args.push(parse_type(state)?);
            state.skip_newlines();
        }
        let close = state.expect(TokenKind::Gt, "`>`")?;
        return Ok(TypeExpr::App(name, args, name_tok.location.merge(&close.location)));
    }

    Ok(TypeExpr::Name(name, name_tok.location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_src(src: &str) -> Result<Module, Vec<Diagnostic>> {
        let tokens = lexer::lex("test.vf", src).expect("lex");
        parse(tokens, ParserOptions::default())
    }

    fn parse_ok(src: &str) -> Module {
        parse_src(src).unwrap_or_else(|errs| panic!("expected {src:?} to parse, got {errs:?}"))
    }

    #[test]
    fn test_let_declaration() {
        let module = parse_ok("let x = 1;");
        assert_eq!(module.declarations.len(), 1);
        assert!(matches!(module.declarations[0], Declaration::Let { .. }));
    }

    #[test]
    fn test_parenthesized_expression_is_not_a_tuple() {
        let module = parse_ok("let x = (1 + 2);");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        assert!(matches!(value, Expression::Binary { .. }));
    }

    #[test]
    fn test_two_element_tuple_parses() {
        let module = parse_ok("let x = (1, 2);");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Tuple(items, _) = value else { panic!("expected a tuple, got {value:?}") };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_single_element_trailing_comma_tuple_is_rejected() {
        let errs = parse_src("let x = (1,);").unwrap_err();
        assert!(errs.iter().any(|d| d.code == "VF2024"));
    }

    #[test]
    fn test_unit_is_empty_parens() {
        let module = parse_ok("let x = ();");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        assert!(matches!(value, Expression::Unit(_)));
    }

    #[test]
    fn test_lambda_disambiguated_from_parenthesization() {
        let module = parse_ok("let f = (x) => x;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        assert!(matches!(value, Expression::Lambda { .. }));
    }

    #[test]
    fn test_multi_param_lambda_parses_all_params() {
        let module = parse_ok("let f = (x, y) => x;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Lambda { params, .. } = value else { panic!() };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_record_literal_with_shorthand_field() {
        let module = parse_ok("let p = { x: 1, y };");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Record { fields, .. } = value else { panic!("expected a record, got {value:?}") };
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields[1], RecordField::Shorthand(..)));
    }

    #[test]
    fn test_block_is_disambiguated_from_record_by_semicolon() {
        let module = parse_ok("let f = () => { let x = 1; x };");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Lambda { body, .. } = value else { panic!() };
        assert!(matches!(**body, Expression::Block { .. }));
    }

    #[test]
    fn test_bare_single_expression_in_braces_is_ambiguous() {
        let errs = parse_src("let f = () => { x + 1 };").unwrap_err();
        assert!(errs.iter().any(|d| d.code == "VF2083"), "{errs:?}");
    }

    #[test]
    fn test_single_expression_in_braces_disambiguated_by_semicolon() {
        let module = parse_ok("let f = () => { x + 1; };");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Lambda { body, .. } = value else { panic!() };
        assert!(matches!(**body, Expression::Block { .. }));
    }

    #[test]
    fn test_while_body_single_expression_is_not_ambiguous() {
        let module = parse_ok("let f = () => while true { 1 };");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Lambda { body, .. } = value else { panic!() };
        assert!(matches!(**body, Expression::While { .. }));
    }

    #[test]
    fn test_if_led_single_expression_in_braces_is_not_ambiguous() {
        let module = parse_ok(r#"let f = () => { if true then 1 else 2 };"#);
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Lambda { body, .. } = value else { panic!() };
        assert!(matches!(**body, Expression::Block { .. }));
    }

    #[test]
    fn test_operator_section_is_rejected_with_lambda_hint() {
        for src in ["let f = (+);", "let f = (+ 1);", "let f = (1 +);", "let f = ( + );"] {
            let errs = parse_src(src).unwrap_err();
            let diag = errs.iter().find(|d| d.code == "VF2002").unwrap_or_else(|| panic!("{src}: {errs:?}"));
            assert!(diag.hint.is_some(), "{src}: expected a lambda hint, got {diag:?}");
        }
    }

    #[test]
    fn test_record_update_syntax() {
        let module = parse_ok("let q = { p | x: 2 };");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        assert!(matches!(value, Expression::RecordUpdate { .. }));
    }

    #[test]
    fn test_match_requires_leading_bar() {
        let errs = parse_src("let f = (x) => match x { 1 => true };").unwrap_err();
        assert!(!errs.is_empty());
    }

    #[test]
    fn test_empty_match_is_rejected() {
        let errs = parse_src("let f = (x) => match x { };").unwrap_err();
        assert!(errs.iter().any(|d| d.code == "VF2025"));
    }

    #[test]
    fn test_match_with_cases_parses() {
        let module = parse_ok("let f = (x) => match x { | 1 => true | _ => false };");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Lambda { body, .. } = value else { panic!() };
        let Expression::Match { cases, .. } = &**body else { panic!() };
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn test_empty_while_body_is_rejected() {
        let errs = parse_src("let f = () => while true { };").unwrap_err();
        assert!(!errs.is_empty());
    }

    #[test]
    fn test_unary_minus_before_literal() {
        let module = parse_ok("let x = -1;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        assert!(matches!(value, Expression::Unary { .. }));
    }

    #[test]
    fn test_binary_minus_after_identifier() {
        let module = parse_ok("let x = y - 1;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        assert!(matches!(value, Expression::Binary { .. }));
    }

    #[test]
    fn test_pipe_is_left_associative() {
        let module = parse_ok("let x = 1 |> f |> g;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        // g(f(1)) -- the outer node applies g to the whole inner pipe chain.
        let Expression::Binary { right, .. } = value else { panic!("expected a pipe chain, got {value:?}") };
        assert!(matches!(&**right, Expression::Var(name, _) if name == "g"));
    }

    #[test]
    fn test_list_literal_with_spread() {
        let module = parse_ok("let xs = [1, 2, ...rest];");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::List { items, .. } = value else { panic!("expected a list, got {value:?}") };
        assert_eq!(items.len(), 3);
        assert!(matches!(items[2], ListItem::Spread(_)));
    }

    #[test]
    fn test_trailing_comma_allowed_in_call_args() {
        let module = parse_ok("let x = f(1, 2,);");
        assert!(module.declarations.len() == 1);
    }

    #[test]
    fn test_composition_operators_share_one_left_associative_level() {
        // `f >> g << h` groups as `(f >> g) << h`, not `f >> (g << h)`.
        let module = parse_ok("let x = f >> g << h;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        let Expression::Binary { operator: BinaryOperator::ComposeBack, left, .. } = value else {
            panic!("expected the outer node to be `<<`, got {value:?}")
        };
        assert!(matches!(&**left, Expression::Binary { operator: BinaryOperator::ComposeFwd, .. }));
    }

    #[test]
    fn test_string_concat_binds_tighter_than_cons_looser_than_additive() {
        let module = parse_ok("let x = a :: b & c + d;");
        let Declaration::Let { value, .. } = &module.declarations[0] else { panic!() };
        // `a :: (b & (c + d))`
        let Expression::Binary { operator: BinaryOperator::Cons, right, .. } = value else {
            panic!("expected the outer node to be `::`, got {value:?}")
        };
        let Expression::Binary { operator: BinaryOperator::Concat, right: concat_rhs, .. } = &**right else {
            panic!("expected the cons's tail to be `&`, got {right:?}")
        };
        assert!(matches!(&**concat_rhs, Expression::Binary { operator: BinaryOperator::Add, .. }));
    }
}
