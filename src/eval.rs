//! Test-only reference evaluator over typed Core IR.
//!
//! This is deliberately not part of the public API: it exists so the
//! optimizer's test suite can assert a semantics-preserving property
//! directly -- evaluate a module before and after `optimizer::optimize`,
//! check the two runs agree -- rather than only asserting against a
//! hand-written expected tree shape. A tree-walking interpreter is the
//! simplest oracle that can make that comparison, and simplicity matters
//! more than speed here since nothing outside `#[cfg(test)]` ever calls it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::{BinderId, CoreBinOp, CoreDeclaration, CoreExpr, CoreLiteral, CoreMatchCase, CoreModule, CorePattern, CoreUnOp};
use crate::types::Type;

#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
    Closure(BinderId, Rc<CoreExpr<Type>>, Env),
    Tuple(Vec<Value>),
    Record(HashMap<String, Value>),
    Variant(String, Vec<Value>),
    Ref(Rc<RefCell<Value>>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Variant(n1, a), Value::Variant(n2, b)) => n1 == n2 && a == b,
            (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            // Closures are never compared structurally in any test this
            // evaluator is used for; equal only by pointer-identity.
            (Value::Closure(..), Value::Closure(..)) => false,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Env {
    bindings: Rc<HashMap<BinderId, Value>>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    fn get(&self, id: BinderId) -> Option<Value> {
        self.bindings.get(&id).cloned()
    }

    fn extend(&self, id: BinderId, value: Value) -> Env {
        let mut map = (*self.bindings).clone();
        map.insert(id, value);
        Env { bindings: Rc::new(map) }
    }
}

#[derive(Debug, PartialEq)]
pub enum EvalError {
    UnboundVariable(BinderId),
    ExternalCall(String),
    DivisionByZero,
    NonExhaustiveMatch,
    NotAFunction,
}

pub fn eval_module(module: &CoreModule<Type>) -> Result<Env, EvalError> {
    let mut env = Env::new();
    for decl in &module.declarations {
        match decl {
            CoreDeclaration::Let { binder, value, .. } => {
                let v = eval(value, &env)?;
                env = env.extend(*binder, v);
            }
            CoreDeclaration::LetRec { bindings, .. } => {
                env = eval_letrec_bindings(bindings, &env)?;
            }
            CoreDeclaration::External { .. } | CoreDeclaration::TypeDef { .. } => {}
        }
    }
    Ok(env)
}

fn eval_letrec_bindings(bindings: &[(BinderId, String, CoreExpr<Type>)], env: &Env) -> Result<Env, EvalError> {
    // Closures close over the final `rec_env` via `Rc`, so mutually
    // recursive bindings all see each other regardless of textual order --
    // this only actually matters for `Lambda` values; a non-lambda
    // self-referential binding would deadlock a strict evaluator, which
    // matches why the type checker's value restriction requires `rec`
    // bindings to be syntactic lambdas.
    let mut rec_env = env.clone();
    let mut values = Vec::new();
    for (binder, _, value) in bindings {
        let v = eval(value, &rec_env)?;
        rec_env = rec_env.extend(*binder, v.clone());
        values.push((*binder, v));
    }
    for (binder, v) in &values {
        rec_env = rec_env.extend(*binder, v.clone());
    }
    Ok(rec_env)
}

pub fn eval(expr: &CoreExpr<Type>, env: &Env) -> Result<Value, EvalError> {
    match expr {
        CoreExpr::Literal(lit, ..) => Ok(eval_literal(lit)),
        CoreExpr::Var(b, ..) => env.get(*b).ok_or(EvalError::UnboundVariable(*b)),
        CoreExpr::ExternalRef(name, ..) => Err(EvalError::ExternalCall(name.clone())),
        CoreExpr::Lambda { param, body, .. } => Ok(Value::Closure(*param, Rc::new((**body).clone()), env.clone())),
        CoreExpr::Application { func, arg, .. } => {
            let f = eval(func, env)?;
            let a = eval(arg, env)?;
            match f {
                Value::Closure(param, body, closure_env) => eval(&body, &closure_env.extend(param, a)),
                _ => Err(EvalError::NotAFunction),
            }
        }
        CoreExpr::Let { binder, value, body, .. } => {
            let v = eval(value, env)?;
            eval(body, &env.extend(*binder, v))
        }
        CoreExpr::LetRec { bindings, body, .. } => {
            let rec_env = eval_letrec_bindings(bindings, env)?;
            eval(body, &rec_env)
        }
        CoreExpr::Match { scrutinee, cases, .. } => {
            let v = eval(scrutinee, env)?;
            eval_match(&v, cases, env)
        }
        CoreExpr::BinOp { op, left, right, .. } => {
            if *op == CoreBinOp::RefAssign {
                let cell = eval(left, env)?;
                let new_value = eval(right, env)?;
                match cell {
                    Value::Ref(cell) => {
                        *cell.borrow_mut() = new_value;
                        Ok(Value::Unit)
                    }
                    _ => Err(EvalError::NotAFunction),
                }
            } else {
                let l = eval(left, env)?;
                let r = eval(right, env)?;
                eval_binop(*op, l, r)
            }
        }
        CoreExpr::UnOp { op, operand, .. } => {
            let v = eval(operand, env)?;
            eval_unop(*op, v)
        }
        CoreExpr::Tuple(items, ..) => Ok(Value::Tuple(items.iter().map(|i| eval(i, env)).collect::<Result<_, _>>()?)),
        CoreExpr::Record { fields, .. } => {
            let mut map = HashMap::new();
            for (name, value) in fields {
                map.insert(name.clone(), eval(value, env)?);
            }
            Ok(Value::Record(map))
        }
        CoreExpr::FieldAccess { base, field, .. } => match eval(base, env)? {
            Value::Record(map) => Ok(map.get(field).cloned().expect("checked field access")),
            _ => Err(EvalError::NotAFunction),
        },
        CoreExpr::RecordUpdate { base, fields, .. } => match eval(base, env)? {
            Value::Record(mut map) => {
                for (name, value) in fields {
                    map.insert(name.clone(), eval(value, env)?);
                }
                Ok(Value::Record(map))
            }
            _ => Err(EvalError::NotAFunction),
        },
        CoreExpr::RefNew(inner, ..) => Ok(Value::Ref(Rc::new(RefCell::new(eval(inner, env)?)))),
        CoreExpr::Unsafe(inner, ..) => eval(inner, env),
        CoreExpr::Annotation { expr, .. } => eval(expr, env),
    }
}

fn eval_literal(lit: &CoreLiteral) -> Value {
    match lit {
        CoreLiteral::Int(v) => Value::Int(*v),
        CoreLiteral::Float(v) => Value::Float(*v),
        CoreLiteral::Str(v) => Value::Str(v.clone()),
        CoreLiteral::Bool(v) => Value::Bool(*v),
        CoreLiteral::Unit => Value::Unit,
    }
}

fn eval_binop(op: CoreBinOp, l: Value, r: Value) -> Result<Value, EvalError> {
    use Value::*;
    Ok(match (op, l, r) {
        (CoreBinOp::Add, Int(a), Int(b)) => Int(a + b),
        (CoreBinOp::Sub, Int(a), Int(b)) => Int(a - b),
        (CoreBinOp::Mul, Int(a), Int(b)) => Int(a * b),
        (CoreBinOp::Div, Int(_), Int(0)) => return Err(EvalError::DivisionByZero),
        (CoreBinOp::Div, Int(a), Int(b)) => Int(a / b),
        (CoreBinOp::Mod, Int(_), Int(0)) => return Err(EvalError::DivisionByZero),
        (CoreBinOp::Mod, Int(a), Int(b)) => Int(a % b),
        (CoreBinOp::Add, Float(a), Float(b)) => Float(a + b),
        (CoreBinOp::Sub, Float(a), Float(b)) => Float(a - b),
        (CoreBinOp::Mul, Float(a), Float(b)) => Float(a * b),
        (CoreBinOp::Div, Float(a), Float(b)) => Float(a / b),
        (CoreBinOp::Concat, Str(a), Str(b)) => Str(format!("{a}{b}")),
        (CoreBinOp::Eq, a, b) => Bool(a == b),
        (CoreBinOp::NotEq, a, b) => Bool(a != b),
        (CoreBinOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (CoreBinOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (CoreBinOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (CoreBinOp::Ge, Int(a), Int(b)) => Bool(a >= b),
        (CoreBinOp::Lt, Float(a), Float(b)) => Bool(a < b),
        (CoreBinOp::Le, Float(a), Float(b)) => Bool(a <= b),
        (CoreBinOp::Gt, Float(a), Float(b)) => Bool(a > b),
        (CoreBinOp::Ge, Float(a), Float(b)) => Bool(a >= b),
        (CoreBinOp::And, Bool(a), Bool(b)) => Bool(a && b),
        (CoreBinOp::Or, Bool(a), Bool(b)) => Bool(a || b),
        (op, l, r) => panic!("ill-typed binop reached the evaluator: {op:?} {l:?} {r:?}"),
    })
}

fn eval_unop(op: CoreUnOp, v: Value) -> Result<Value, EvalError> {
    Ok(match (op, v) {
        (CoreUnOp::Neg, Value::Int(v)) => Value::Int(-v),
        (CoreUnOp::Neg, Value::Float(v)) => Value::Float(-v),
        (CoreUnOp::Deref, Value::Ref(cell)) => cell.borrow().clone(),
        (op, v) => panic!("ill-typed unop reached the evaluator: {op:?} {v:?}"),
    })
}

fn eval_match(value: &Value, cases: &[CoreMatchCase<Type>], env: &Env) -> Result<Value, EvalError> {
    for case in cases {
        if let Some(bound) = try_match_pattern(&case.pattern, value) {
            let case_env = bound.into_iter().fold(env.clone(), |e, (b, v)| e.extend(b, v));
            if let Some(guard) = &case.guard {
                if !matches!(eval(guard, &case_env)?, Value::Bool(true)) {
                    continue;
                }
            }
            return eval(&case.body, &case_env);
        }
    }
    Err(EvalError::NonExhaustiveMatch)
}

fn try_match_pattern(pattern: &CorePattern<Type>, value: &Value) -> Option<Vec<(BinderId, Value)>> {
    match (pattern, value) {
        (CorePattern::Wildcard(..), _) => Some(vec![]),
        (CorePattern::Variable(b, ..), v) => Some(vec![(*b, v.clone())]),
        (CorePattern::Literal(lit, ..), v) => (&eval_literal(lit) == v).then(Vec::new),
        (CorePattern::Variant { name, args, .. }, Value::Variant(v_name, v_args)) => {
            if name != v_name {
                return None;
            }
            let mut out = Vec::new();
            for (p, v) in args.iter().zip(v_args) {
                out.extend(try_match_pattern(p, v)?);
            }
            Some(out)
        }
        (CorePattern::Tuple(items, ..), Value::Tuple(values)) => {
            let mut out = Vec::new();
            for (p, v) in items.iter().zip(values) {
                out.extend(try_match_pattern(p, v)?);
            }
            Some(out)
        }
        (CorePattern::Record { fields, .. }, Value::Record(map)) => {
            let mut out = Vec::new();
            for (name, p) in fields {
                out.extend(try_match_pattern(p, map.get(name)?)?);
            }
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::BinderIdGen;
    use crate::lexer::token::Location;

    fn loc() -> Location {
        Location::default()
    }

    #[test]
    fn test_eval_arithmetic() {
        let gen = BinderIdGen::new();
        let binder = gen.fresh();
        let module = CoreModule {
            declarations: vec![CoreDeclaration::Let {
                binder,
                name: "x".into(),
                mutable: false,
                value: CoreExpr::BinOp {
                    op: CoreBinOp::Mul,
                    left: Box::new(CoreExpr::Literal(CoreLiteral::Int(6), Type::Int, loc())),
                    right: Box::new(CoreExpr::Literal(CoreLiteral::Int(7), Type::Int, loc())),
                    info: Type::Int,
                    location: loc(),
                },
                exported: true,
                location: loc(),
            }],
            location: loc(),
        };
        let env = eval_module(&module).expect("should evaluate");
        assert_eq!(env.get(binder), Some(Value::Int(42)));
    }

    #[test]
    fn test_eval_division_by_zero_errors() {
        let expr = CoreExpr::BinOp {
            op: CoreBinOp::Div,
            left: Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())),
            right: Box::new(CoreExpr::Literal(CoreLiteral::Int(0), Type::Int, loc())),
            info: Type::Int,
            location: loc(),
        };
        assert_eq!(eval(&expr, &Env::new()), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_eval_ref_assign_mutates() {
        let gen = BinderIdGen::new();
        let r = gen.fresh();
        let body = CoreExpr::Let {
            binder: r,
            name: "r".into(),
            mutable: false,
            value: Box::new(CoreExpr::RefNew(Box::new(CoreExpr::Literal(CoreLiteral::Int(1), Type::Int, loc())), Type::Ref(Box::new(Type::Int)), loc())),
            body: Box::new(CoreExpr::Let {
                binder: gen.fresh(),
                name: "_".into(),
                mutable: false,
                value: Box::new(CoreExpr::BinOp {
                    op: CoreBinOp::RefAssign,
                    left: Box::new(CoreExpr::Var(r, "r".into(), Type::Ref(Box::new(Type::Int)), loc())),
                    right: Box::new(CoreExpr::Literal(CoreLiteral::Int(9), Type::Int, loc())),
                    info: Type::Unit,
                    location: loc(),
                }),
                body: Box::new(CoreExpr::UnOp {
                    op: CoreUnOp::Deref,
                    operand: Box::new(CoreExpr::Var(r, "r".into(), Type::Ref(Box::new(Type::Int)), loc())),
                    info: Type::Int,
                    location: loc(),
                }),
                info: Type::Int,
                location: loc(),
            }),
            info: Type::Int,
            location: loc(),
        };
        assert_eq!(eval(&body, &Env::new()), Ok(Value::Int(9)));
    }
}
