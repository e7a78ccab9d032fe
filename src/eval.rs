//! The tree-walking evaluator. [`eval`] maps an expression, an input
//! value and an environment to a lazy stream of output values; every
//! construct composes over streams, with `|` flat-mapping and `,`
//! concatenating.

use std::{iter, rc::Rc};

use itertools::Itertools;
use serde_json::{Map, Value};

use crate::{
    builtins,
    env::Env,
    errors::EvalError,
    iter::{AltIter, CrossIter, ErrorFuse, IfIter, OptionalIter, PipeIter, RecurseIter, TryIter},
    ops::{is_truthy, type_name},
    query::{BinaryOp, Expr},
};

pub type ValueResult = Result<Rc<Value>, EvalError>;

/// A lazy, finite, single-pass stream of JSON values. Abandoning the
/// stream cancels any remaining work.
pub type ValueIter<'a> = Box<dyn Iterator<Item = ValueResult> + 'a>;

/// Evaluate `expr` against `input`, producing a stream of zero or more
/// values. The input and the environment are never mutated; every
/// transformation yields fresh values.
pub fn eval<'a>(expr: &'a Expr, input: Rc<Value>, env: &'a Env) -> ValueIter<'a> {
    match expr {
        Expr::Identity => Box::new(iter::once(Ok(input))),
        Expr::Recurse => Box::new(RecurseIter::new(input)),
        Expr::Literal { value } => Box::new(iter::once(Ok(Rc::new(value.clone())))),
        Expr::Key { name } => Box::new(iter::once(key_access(&input, name))),
        Expr::Index { indices } if indices.is_empty() => iterate_value(input),
        Expr::Index { indices } => Box::new(ErrorFuse::new(Box::new(
            indices.iter().map(move |i| index_access(&input, *i)),
        ))),
        Expr::Slice { start, end } => Box::new(iter::once(slice_access(&input, *start, *end))),
        Expr::Optional { expr } => Box::new(OptionalIter::new(eval(expr, input, env))),
        Expr::Pipe { left, right } => Box::new(PipeIter::new(eval(left, input, env), right, env)),
        Expr::Comma { left, right } => {
            let first = eval(left, input.clone(), env);
            let second = eval(right, input, env);
            Box::new(ErrorFuse::new(Box::new(first.chain(second))))
        }
        Expr::Array { expr: None } => Box::new(iter::once(Ok(Rc::new(Value::Array(Vec::new()))))),
        Expr::Array { expr: Some(expr) } => Box::new(iter::once_with(move || {
            collect_array(expr, input, env).map(Rc::new)
        })),
        Expr::Object { entries } => {
            Box::new(iter::once_with(move || construct_objects(entries, &input, env)).flatten())
        }
        Expr::Op { left, op, right } => match op {
            BinaryOp::And => logic(left, right, input, env, false),
            BinaryOp::Or => logic(left, right, input, env, true),
            op => Box::new(CrossIter::new(
                *op,
                eval(left, input.clone(), env),
                eval(right, input, env),
            )),
        },
        Expr::Alternative { left, right } => {
            Box::new(AltIter::new(eval(left, input.clone(), env), right, input, env))
        }
        Expr::If { cond, then, alt } => Box::new(IfIter::new(
            eval(cond, input.clone(), env),
            then,
            alt,
            input,
            env,
        )),
        Expr::TryCatch { body, handler } => {
            Box::new(TryIter::new(eval(body, input, env), handler.as_deref(), env))
        }
        Expr::Variable { name } => Box::new(iter::once(
            env.get_var(name)
                .map(Rc::new)
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
        )),
        Expr::Call { name, args } => builtins::call(name, args, input, env),
    }
}

/// Short-circuiting `and`/`or` over the operand streams. For each
/// value of the left stream: a deciding value short-circuits without
/// touching the right side, anything else maps the right stream to its
/// truthiness.
fn logic<'a>(
    left: &'a Expr,
    right: &'a Expr,
    input: Rc<Value>,
    env: &'a Env,
    is_or: bool,
) -> ValueIter<'a> {
    let rhs_input = input.clone();
    Box::new(ErrorFuse::new(Box::new(eval(left, input, env).flat_map(
        move |result| -> ValueIter<'a> {
            match result {
                Err(err) => Box::new(iter::once(Err(err))),
                Ok(value) if is_truthy(&value) == is_or => {
                    Box::new(iter::once(Ok(Rc::new(Value::Bool(is_or)))))
                }
                Ok(_) => Box::new(
                    eval(right, rhs_input.clone(), env)
                        .map(|r| r.map(|v| Rc::new(Value::Bool(is_truthy(&v))))),
                ),
            }
        },
    ))))
}

/// `.key` on an object (null when absent), null on null, a type error
/// on anything else.
pub(crate) fn key_access(value: &Value, name: &str) -> ValueResult {
    match value {
        Value::Object(entries) => Ok(Rc::new(entries.get(name).cloned().unwrap_or(Value::Null))),
        Value::Null => Ok(Rc::new(Value::Null)),
        value => Err(EvalError::Type(format!(
            "Cannot index {} with \"{}\"",
            type_name(value),
            name
        ))),
    }
}

/// `.[i]` on an array: negative indices count from the end, anything
/// out of range folds to null.
fn index_access(value: &Value, index: i64) -> ValueResult {
    match value {
        Value::Array(items) => {
            let len = items.len() as i64;
            let norm = if index < 0 { index + len } else { index };
            if (0..len).contains(&norm) {
                Ok(Rc::new(items[norm as usize].clone()))
            } else {
                Ok(Rc::new(Value::Null))
            }
        }
        Value::Null => Ok(Rc::new(Value::Null)),
        value => Err(EvalError::Type(format!(
            "Cannot index {} with number",
            type_name(value)
        ))),
    }
}

fn slice_access(value: &Value, start: Option<i64>, end: Option<i64>) -> ValueResult {
    match value {
        Value::Array(items) => {
            let (lo, hi) = slice_bounds(items.len(), start, end);
            Ok(Rc::new(Value::Array(items[lo..hi].to_vec())))
        }
        Value::String(s) => {
            // slices address codepoints, not bytes
            let chars: Vec<char> = s.chars().collect();
            let (lo, hi) = slice_bounds(chars.len(), start, end);
            Ok(Rc::new(Value::String(chars[lo..hi].iter().collect())))
        }
        Value::Null => Ok(Rc::new(Value::Null)),
        value => Err(EvalError::Type(format!(
            "{} ({}) cannot be sliced, only arrays and strings can be sliced",
            type_name(value),
            value
        ))),
    }
}

fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let norm = |index: i64| {
        let index = if index < 0 { index + len } else { index };
        index.clamp(0, len) as usize
    };
    let lo = norm(start.unwrap_or(0));
    let hi = norm(end.unwrap_or(len));
    if lo > hi {
        (lo, lo)
    } else {
        (lo, hi)
    }
}

/// The iterator `.[]`: array elements in order, object values in
/// insertion order, nothing for null, a type error otherwise.
pub(crate) fn iterate_value<'a>(input: Rc<Value>) -> ValueIter<'a> {
    if matches!(&*input, Value::Null) {
        return Box::new(iter::empty());
    }
    if !matches!(&*input, Value::Array(_) | Value::Object(_)) {
        return Box::new(iter::once(Err(cannot_iterate(&input))));
    }

    let mut index = 0;
    Box::new(iter::from_fn(move || {
        // TODO: keep a cursor into the object instead of re-walking
        // its values on every pull
        let item = match &*input {
            Value::Array(items) => items.get(index).cloned(),
            Value::Object(entries) => entries.values().nth(index).cloned(),
            _ => None,
        };
        item.map(|value| {
            index += 1;
            Ok(Rc::new(value))
        })
    }))
}

pub(crate) fn cannot_iterate(value: &Value) -> EvalError {
    EvalError::Type(format!(
        "Cannot iterate over {} ({})",
        type_name(value),
        value
    ))
}

/// Unwraps a stream value, cloning only when it is still shared.
pub(crate) fn take_value(value: Rc<Value>) -> Value {
    Rc::try_unwrap(value).unwrap_or_else(|rc| (*rc).clone())
}

fn collect_array(expr: &Expr, input: Rc<Value>, env: &Env) -> Result<Value, EvalError> {
    let mut items = Vec::new();
    for result in eval(expr, input, env) {
        items.push(take_value(result?));
    }
    Ok(Value::Array(items))
}

/// Object construction takes the Cartesian product of every entry's
/// key and value streams, in source order, and yields one object per
/// combination. Keys keep their entry order in each produced object.
fn construct_objects<'a>(
    entries: &'a [(Expr, Option<Expr>)],
    input: &Rc<Value>,
    env: &'a Env,
) -> Vec<ValueResult> {
    if entries.is_empty() {
        return vec![Ok(Rc::new(Value::Object(Map::new())))];
    }

    let mut per_entry: Vec<Vec<(String, Value)>> = Vec::new();
    for (key_expr, value_expr) in entries {
        let mut choices = Vec::new();
        for key in eval(key_expr, input.clone(), env) {
            let key = match key {
                Ok(key) => key,
                Err(err) => return vec![Err(err)],
            };
            let name = match &*key {
                Value::String(name) => name.clone(),
                other => {
                    return vec![Err(EvalError::Type(format!(
                        "Object keys must be strings: got {} ({})",
                        type_name(other),
                        other
                    )))]
                }
            };
            match value_expr {
                Some(value_expr) => {
                    for value in eval(value_expr, input.clone(), env) {
                        match value {
                            Ok(value) => choices.push((name.clone(), (*value).clone())),
                            Err(err) => return vec![Err(err)],
                        }
                    }
                }
                // {foo} pulls .foo from the construct's own input
                None => match key_access(input, &name) {
                    Ok(value) => choices.push((name, (*value).clone())),
                    Err(err) => return vec![Err(err)],
                },
            }
        }
        per_entry.push(choices);
    }

    per_entry
        .into_iter()
        .map(|choices| choices.into_iter())
        .multi_cartesian_product()
        .map(|combo| {
            let mut object = Map::new();
            for (key, value) in combo {
                object.insert(key, value);
            }
            Ok(Rc::new(Value::Object(object)))
        })
        .collect()
}
