//! Expression evaluation.
//!
//! Evaluation is async end-to-end because a `venue.method(...)` call
//! embedded in an expression (e.g. `let price = @uniswap.quote(asset)`)
//! crosses an adapter boundary; the recursive calls are boxed with
//! `futures::future::BoxFuture` since `async fn` can't recurse unboxed.
//! Everything that doesn't touch a venue resolves without ever yielding,
//! so the async overhead for the common arithmetic/branching case is
//! negligible — there is no separate "sync fast path" type, just a future
//! that happens not to await anything.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use futures::future::BoxFuture;

use crate::parser::ast::{AliasDef, BinaryOp, Expr, UnaryOp};
use crate::types::{Address, Amount, Error, Result, Value};

/// Crosses the eval/adapter boundary without `eval` depending on
/// `adapters` directly, so `exec::context` can implement this by
/// delegating to its adapter registry.
pub trait VenueInvoker: Send + Sync {
    fn invoke<'a>(&'a self, venue: &'a str, method: &'a str, args: Vec<Value>) -> BoxFuture<'a, Result<Value>>;
}

pub struct EvalContext<'a> {
    pub bindings: &'a HashMap<String, Value>,
    pub params: Option<&'a HashMap<String, Value>>,
    pub persistent: Option<&'a HashMap<String, Value>>,
    pub ephemeral: Option<&'a HashMap<String, Value>>,
    pub aliases: Option<&'a HashMap<String, AliasDef>>,
    pub invoker: Option<&'a dyn VenueInvoker>,
}

impl<'a> EvalContext<'a> {
    pub fn new(bindings: &'a HashMap<String, Value>) -> Self {
        Self {
            bindings,
            params: None,
            persistent: None,
            ephemeral: None,
            aliases: None,
            invoker: None,
        }
    }

    pub fn with_invoker(bindings: &'a HashMap<String, Value>, invoker: &'a dyn VenueInvoker) -> Self {
        Self {
            bindings,
            params: None,
            persistent: None,
            ephemeral: None,
            aliases: None,
            invoker: Some(invoker),
        }
    }

    /// Full evaluation context used by the step executors: every expression
    /// form (`param`/`persistent`/`ephemeral`/`venueRef`) resolves against
    /// the run's actual state rather than falling back to empty/bare forms.
    pub fn full(
        bindings: &'a HashMap<String, Value>,
        params: &'a HashMap<String, Value>,
        persistent: &'a HashMap<String, Value>,
        ephemeral: &'a HashMap<String, Value>,
        aliases: &'a HashMap<String, AliasDef>,
        invoker: &'a dyn VenueInvoker,
    ) -> Self {
        Self {
            bindings,
            params: Some(params),
            persistent: Some(persistent),
            ephemeral: Some(ephemeral),
            aliases: Some(aliases),
            invoker: Some(invoker),
        }
    }
}

pub fn evaluate<'a>(expr: &'a Expr, ctx: &'a EvalContext<'a>) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Float(*n)),
            Expr::Percentage(p) => Ok(Value::Float(*p)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Address(a) => Ok(Value::Address(Address::parse(a)?)),
            Expr::VenueRef(name) => resolve_venue_ref(name, ctx),
            Expr::Ident(name) => ctx
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownBinding(name.clone())),
            Expr::Param(name) => ctx
                .params
                .and_then(|p| p.get(name))
                .cloned()
                .ok_or_else(|| Error::UnknownBinding(name.clone())),
            Expr::Persistent(name) => ctx
                .persistent
                .and_then(|p| p.get(name))
                .cloned()
                .ok_or_else(|| Error::UnknownBinding(name.clone())),
            Expr::Ephemeral(name) => ctx
                .ephemeral
                .and_then(|p| p.get(name))
                .cloned()
                .ok_or_else(|| Error::UnknownBinding(name.clone())),
            Expr::Index { base, index } => {
                let base_value = evaluate(base, ctx).await?;
                let index_value_ = evaluate(index, ctx).await?;
                index_into(&base_value, &index_value_)
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(evaluate(item, ctx).await?);
                }
                Ok(Value::Array(values))
            }
            Expr::Object(fields) => {
                let mut map = BTreeMap::new();
                for (key, value) in fields {
                    map.insert(key.clone(), evaluate(value, ctx).await?);
                }
                Ok(Value::Object(map))
            }
            Expr::Unary { op, expr } => {
                let value = evaluate(expr, ctx).await?;
                apply_unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, ctx).await,
            Expr::FieldAccess { base, field } => {
                let value = evaluate(base, ctx).await?;
                Ok(field_access(&value, field))
            }
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(evaluate(a, ctx).await?);
                }
                call_builtin(name, values)
            }
            Expr::MethodCall {
                venue,
                method,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(evaluate(a, ctx).await?);
                }
                match ctx.invoker {
                    Some(invoker) => invoker.invoke(venue, method, values).await,
                    None => Err(Error::type_error(format!(
                        "no venue invoker available for @{venue}.{method}"
                    ))),
                }
            }
        }
    })
}

async fn eval_binary<'a>(
    op: BinaryOp,
    lhs: &'a Expr,
    rhs: &'a Expr,
    ctx: &'a EvalContext<'a>,
) -> Result<Value> {
    // `and`/`or` short-circuit: the right side isn't evaluated if the left
    // already decides the result.
    if op == BinaryOp::And {
        let l = evaluate(lhs, ctx).await?;
        if !l.is_truthy() {
            return Ok(Value::Bool(false));
        }
        let r = evaluate(rhs, ctx).await?;
        return Ok(Value::Bool(r.is_truthy()));
    }
    if op == BinaryOp::Or {
        let l = evaluate(lhs, ctx).await?;
        if l.is_truthy() {
            return Ok(Value::Bool(true));
        }
        let r = evaluate(rhs, ctx).await?;
        return Ok(Value::Bool(r.is_truthy()));
    }

    let l = evaluate(lhs, ctx).await?;
    let r = evaluate(rhs, ctx).await?;
    apply_binary(op, l, r)
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(Error::type_error(format!(
            "cannot negate a {}",
            other.type_name()
        ))),
    }
}

fn apply_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => add(l, r),
        Sub => sub(l, r),
        Mul => mul(l, r),
        Div => div(l, r),
        Mod => rem(l, r),
        Eq => Ok(Value::Bool(values_equal(&l, &r))),
        NotEq => Ok(Value::Bool(!values_equal(&l, &r))),
        Lt => compare(&l, &r).map(|o| Value::Bool(o == Ordering::Less)),
        LtEq => compare(&l, &r).map(|o| Value::Bool(o != Ordering::Greater)),
        Gt => compare(&l, &r).map(|o| Value::Bool(o == Ordering::Greater)),
        GtEq => compare(&l, &r).map(|o| Value::Bool(o != Ordering::Less)),
        And | Or => unreachable!("handled by short-circuit path"),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn add(l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Amount(a), Value::Amount(b)) => Ok(Value::Amount(a.checked_add(&b))),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (a, b) => match (as_f64(&a), as_f64(&b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x + y)),
            _ => Err(type_mismatch("+", &a, &b)),
        },
    }
}

fn sub(l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Amount(a), Value::Amount(b)) => a
            .checked_sub(&b)
            .map(Value::Amount)
            .ok_or_else(|| Error::type_error("amount subtraction would underflow below zero")),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
        (a, b) => match (as_f64(&a), as_f64(&b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x - y)),
            _ => Err(type_mismatch("-", &a, &b)),
        },
    }
}

fn mul(l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Amount(a), Value::Float(bp)) => {
            Ok(Value::Amount(a.mul_bp(crate::types::BasisPoints::new((bp * 10_000.0).round() as i64))))
        }
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
        (a, b) => match (as_f64(&a), as_f64(&b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x * y)),
            _ => Err(type_mismatch("*", &a, &b)),
        },
    }
}

fn div(l: Value, r: Value) -> Result<Value> {
    match (&l, &r) {
        (Value::Int(_), Value::Int(0)) => return Err(Error::DivByZero),
        (_, Value::Float(f)) if *f == 0.0 => return Err(Error::DivByZero),
        _ => {}
    }
    match (l, r) {
        (Value::Int(a), Value::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
        (a, b) => match (as_f64(&a), as_f64(&b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x / y)),
            _ => Err(type_mismatch("/", &a, &b)),
        },
    }
}

fn rem(l: Value, r: Value) -> Result<Value> {
    match (l, r) {
        (Value::Int(_), Value::Int(0)) => Err(Error::DivByZero),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
        (a, b) => match (as_f64(&a), as_f64(&b)) {
            (Some(x), Some(y)) if y != 0.0 => Ok(Value::Float(x % y)),
            (Some(_), Some(_)) => Err(Error::DivByZero),
            _ => Err(type_mismatch("%", &a, &b)),
        },
    }
}

fn type_mismatch(op: &str, l: &Value, r: &Value) -> Error {
    Error::type_error(format!(
        "cannot apply `{}` to {} and {}",
        op,
        l.type_name(),
        r.type_name()
    ))
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_f64(l), as_f64(r)) {
        return x == y;
    }
    l == r
}

fn compare(l: &Value, r: &Value) -> Result<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(l), as_f64(r)) {
        return x.partial_cmp(&y).ok_or_else(|| Error::type_error("NaN is not orderable"));
    }
    match (l, r) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Amount(a), Value::Amount(b)) => Ok(a.cmp(b)),
        _ => Err(Error::type_error(format!(
            "cannot compare {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// A venue reference with a declared `aliases:` entry resolves to
/// `{alias, chain, address}`; an undeclared one (a bare adapter name like
/// `@mock`) falls back to its name as a plain string.
fn resolve_venue_ref(name: &str, ctx: &EvalContext) -> Result<Value> {
    match ctx.aliases.and_then(|aliases| aliases.get(name)) {
        Some(alias) => {
            let mut map = BTreeMap::new();
            map.insert("alias".to_string(), Value::String(alias.alias.clone()));
            map.insert("chain".to_string(), Value::String(alias.chain.clone()));
            map.insert("address".to_string(), Value::Address(Address::parse(&alias.address)?));
            Ok(Value::Object(map))
        }
        None => Ok(Value::String(name.to_string())),
    }
}

fn index_into(base: &Value, index: &Value) -> Result<Value> {
    match (base, index) {
        (Value::Array(items), idx) => {
            let i = as_f64(idx).ok_or_else(|| Error::type_error("array index must be numeric"))?;
            if i < 0.0 || i as usize >= items.len() {
                return Ok(Value::Null);
            }
            Ok(items[i as usize].clone())
        }
        (Value::Object(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        _ => Err(Error::type_error(format!(
            "cannot index a {} with a {}",
            base.type_name(),
            index.type_name()
        ))),
    }
}

fn field_access(value: &Value, field: &str) -> Value {
    match value {
        Value::Object(map) => map.get(field).cloned().unwrap_or(Value::Null),
        Value::Array(items) if field == "length" => Value::Int(items.len() as i64),
        _ => Value::Null,
    }
}

fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "min" => numeric_fold(args, |a, b| a.min(b)),
        "max" => numeric_fold(args, |a, b| a.max(b)),
        "abs" => match args.as_slice() {
            [Value::Int(i)] => Ok(Value::Int(i.abs())),
            [Value::Float(f)] => Ok(Value::Float(f.abs())),
            _ => Err(Error::type_error("abs() expects one numeric argument")),
        },
        "floor" => unary_float(args, f64::floor),
        "ceil" => unary_float(args, f64::ceil),
        "len" => match args.as_slice() {
            [Value::Array(items)] => Ok(Value::Int(items.len() as i64)),
            [Value::String(s)] => Ok(Value::Int(s.chars().count() as i64)),
            [Value::Object(map)] => Ok(Value::Int(map.len() as i64)),
            _ => Err(Error::type_error("len() expects an array, string, or object")),
        },
        "sum" => match args.as_slice() {
            [Value::Array(items)] => {
                let mut total = 0.0;
                for item in items {
                    total += as_f64(item).ok_or_else(|| Error::type_error("sum() expects numeric elements"))?;
                }
                Ok(Value::Float(total))
            }
            _ => Err(Error::type_error("sum() expects a single array argument")),
        },
        "avg" => match args.as_slice() {
            [Value::Array(items)] if !items.is_empty() => {
                let mut total = 0.0;
                for item in items {
                    total += as_f64(item).ok_or_else(|| Error::type_error("avg() expects numeric elements"))?;
                }
                Ok(Value::Float(total / items.len() as f64))
            }
            [Value::Array(_)] => Err(Error::type_error("avg() of an empty array is undefined")),
            _ => Err(Error::type_error("avg() expects a single array argument")),
        },
        other => Err(Error::type_error(format!("unknown function {other}()"))),
    }
}

fn numeric_fold(args: Vec<Value>, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    let values: Vec<Value> = match args.as_slice() {
        [Value::Array(items)] => items.clone(),
        _ => args,
    };
    if values.is_empty() {
        return Err(Error::type_error("min()/max() require at least one value"));
    }
    let mut acc = as_f64(&values[0]).ok_or_else(|| Error::type_error("min()/max() expect numeric arguments"))?;
    for v in &values[1..] {
        let n = as_f64(v).ok_or_else(|| Error::type_error("min()/max() expect numeric arguments"))?;
        acc = f(acc, n);
    }
    Ok(Value::Float(acc))
}

fn unary_float(args: Vec<Value>, f: impl Fn(f64) -> f64) -> Result<Value> {
    match args.as_slice() {
        [v] => {
            let n = as_f64(v).ok_or_else(|| Error::type_error("expected a numeric argument"))?;
            Ok(Value::Float(f(n)))
        }
        _ => Err(Error::type_error("expected exactly one numeric argument")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_expr(expr: &Expr) -> Value {
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&bindings);
        futures::executor::block_on(evaluate(expr, &ctx)).unwrap()
    }

    #[test]
    fn short_circuit_and_does_not_evaluate_rhs() {
        let expr = Expr::Binary {
            op: BinaryOp::And,
            lhs: Box::new(Expr::Bool(false)),
            rhs: Box::new(Expr::Ident("undefined".to_string())),
        };
        assert_eq!(eval_expr(&expr), Value::Bool(false));
    }

    #[test]
    fn division_by_zero_errors() {
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&bindings);
        let expr = Expr::Binary {
            op: BinaryOp::Div,
            lhs: Box::new(Expr::Number(1.0)),
            rhs: Box::new(Expr::Number(0.0)),
        };
        let err = futures::executor::block_on(evaluate(&expr, &ctx)).unwrap_err();
        assert_eq!(err.code(), "DIV_BY_ZERO");
    }

    #[test]
    fn unknown_binding_is_an_error() {
        let bindings = HashMap::new();
        let ctx = EvalContext::new(&bindings);
        let expr = Expr::Ident("nope".to_string());
        let err = futures::executor::block_on(evaluate(&expr, &ctx)).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_BINDING");
    }

    #[test]
    fn builtin_min_max_over_array() {
        let expr = Expr::Call {
            name: "max".to_string(),
            args: vec![Expr::Array(vec![
                Expr::Number(1.0),
                Expr::Number(5.0),
                Expr::Number(3.0),
            ])],
        };
        assert_eq!(eval_expr(&expr), Value::Float(5.0));
    }
}
