//! The built-in filter library, dispatched by name. Signatures are
//! validated at parse time, so every call that reaches this table has
//! a registered name and an acceptable argument count.

use std::cmp::Ordering;
use std::{iter, rc::Rc};

use serde_json::Value;

use crate::{
    env::Env,
    errors::EvalError,
    eval::{cannot_iterate, eval, iterate_value, take_value, ValueIter},
    iter::ErrorFuse,
    ops::{apply, cmp_values, is_truthy, number_value, type_name},
    query::{BinaryOp, Expr},
};

pub(crate) fn call<'a>(
    name: &'a str,
    args: &'a [Expr],
    input: Rc<Value>,
    env: &'a Env,
) -> ValueIter<'a> {
    match name {
        "length" => lazy_value(input, length),
        "keys" => lazy_value(input, keys),
        "values" => lazy_value(input, values),
        "type" => lazy_value(input, |v| Ok(Value::String(type_name(v).to_string()))),
        "empty" => Box::new(iter::empty()),
        "not" => lazy_value(input, |v| Ok(Value::Bool(!is_truthy(v)))),
        "map" => map_filter(&args[0], input, env),
        "select" => select_filter(&args[0], input, env),
        "sort" => lazy_value(input, sort),
        "reverse" => lazy_value(input, reverse),
        "flatten" => flatten_filter(args.first(), input, env),
        "unique" => lazy_value(input, unique),
        "add" => lazy_value(input, add_all),
        "min" => lazy_value(input, |v| extremum(v, Ordering::Less)),
        "max" => lazy_value(input, |v| extremum(v, Ordering::Greater)),
        "floor" => lazy_value(input, |v| numeric(v, f64::floor)),
        "sqrt" => lazy_value(input, |v| numeric(v, f64::sqrt)),
        // the parser only emits registered names
        _ => unreachable!("unknown built-in function"),
    }
}

/// A single-value builtin as a stream that does its work on the first
/// pull, not when the stream is constructed.
fn lazy_value<'a>(
    input: Rc<Value>,
    f: impl FnOnce(&Value) -> Result<Value, EvalError> + 'a,
) -> ValueIter<'a> {
    Box::new(iter::once_with(move || f(&input).map(Rc::new)))
}

fn length(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Null => Ok(Value::from(0)),
        Value::Number(n) => Ok(number_value(n.as_f64().unwrap_or(f64::NAN).abs())),
        Value::String(s) => Ok(Value::from(s.chars().count() as i64)),
        Value::Array(items) => Ok(Value::from(items.len() as i64)),
        Value::Object(entries) => Ok(Value::from(entries.len() as i64)),
        Value::Bool(_) => Err(EvalError::Type(format!(
            "{} ({}) has no length",
            type_name(value),
            value
        ))),
    }
}

fn keys(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Object(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            Ok(Value::Array(
                keys.into_iter().map(|k| Value::String(k.clone())).collect(),
            ))
        }
        Value::Array(items) => Ok(Value::Array(
            (0..items.len() as i64).map(Value::from).collect(),
        )),
        _ => Err(EvalError::Type(format!(
            "{} ({}) has no keys",
            type_name(value),
            value
        ))),
    }
}

fn values(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Object(entries) => {
            let mut pairs: Vec<(&String, &Value)> = entries.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            Ok(Value::Array(
                pairs.into_iter().map(|(_, v)| v.clone()).collect(),
            ))
        }
        Value::Array(_) => Ok(value.clone()),
        _ => Err(EvalError::Type(format!(
            "{} ({}) has no values",
            type_name(value),
            value
        ))),
    }
}

fn not_an_array(value: &Value) -> EvalError {
    EvalError::Type(format!(
        "{} ({}) cannot be sorted, as it is not an array",
        type_name(value),
        value
    ))
}

fn sort(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Array(items) => {
            let mut items = items.clone();
            items.sort_by(|a, b| cmp_values(a, b));
            Ok(Value::Array(items))
        }
        _ => Err(not_an_array(value)),
    }
}

fn reverse(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        _ => Err(EvalError::Type(format!(
            "{} ({}) cannot be reversed",
            type_name(value),
            value
        ))),
    }
}

fn unique(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Array(items) => {
            let mut items = items.clone();
            items.sort_by(|a, b| cmp_values(a, b));
            items.dedup_by(|a, b| cmp_values(a, b) == Ordering::Equal);
            Ok(Value::Array(items))
        }
        _ => Err(not_an_array(value)),
    }
}

/// Folds `+` over an array's elements or an object's values, starting
/// from null. The empty fold is therefore null.
fn add_all(value: &Value) -> Result<Value, EvalError> {
    let mut acc = Value::Null;
    match value {
        Value::Array(items) => {
            for item in items {
                acc = apply(BinaryOp::Add, &acc, item)?;
            }
        }
        Value::Object(entries) => {
            for item in entries.values() {
                acc = apply(BinaryOp::Add, &acc, item)?;
            }
        }
        _ => return Err(cannot_iterate(value)),
    }
    Ok(acc)
}

fn extremum(value: &Value, prefer: Ordering) -> Result<Value, EvalError> {
    match value {
        Value::Array(items) => {
            let mut best: Option<&Value> = None;
            for item in items {
                best = Some(match best {
                    Some(current) if cmp_values(item, current) != prefer => current,
                    _ => item,
                });
            }
            Ok(best.cloned().unwrap_or(Value::Null))
        }
        _ => Err(cannot_iterate(value)),
    }
}

fn numeric(value: &Value, f: impl FnOnce(f64) -> f64) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) => Ok(number_value(f(n.as_f64().unwrap_or(f64::NAN)))),
        _ => Err(EvalError::Type(format!(
            "{} ({}) is not a number",
            type_name(value),
            value
        ))),
    }
}

/// `map(f)` is `[.[] | f]`.
fn map_filter<'a>(f: &'a Expr, input: Rc<Value>, env: &'a Env) -> ValueIter<'a> {
    Box::new(iter::once_with(move || {
        let mut items = Vec::new();
        for element in iterate_value(input) {
            for output in eval(f, element?, env) {
                items.push(take_value(output?));
            }
        }
        Ok(Rc::new(Value::Array(items)))
    }))
}

/// `select(f)`: the input passes through once per truthy output of
/// `f`, and is dropped for falsy ones.
fn select_filter<'a>(f: &'a Expr, input: Rc<Value>, env: &'a Env) -> ValueIter<'a> {
    let passed = input.clone();
    Box::new(ErrorFuse::new(Box::new(eval(f, input, env).filter_map(
        move |result| match result {
            Ok(value) => is_truthy(&value).then(|| Ok(passed.clone())),
            Err(err) => Some(Err(err)),
        },
    ))))
}

fn flatten_filter<'a>(depth: Option<&'a Expr>, input: Rc<Value>, env: &'a Env) -> ValueIter<'a> {
    match depth {
        None => lazy_value(input, |v| flatten_value(v, 1)),
        Some(expr) => {
            let target = input.clone();
            Box::new(ErrorFuse::new(Box::new(eval(expr, input, env).map(
                move |result| {
                    let depth = result?;
                    match &*depth {
                        Value::Number(n) => {
                            let depth = n.as_f64().unwrap_or(f64::NAN);
                            if depth >= 0.0 {
                                flatten_value(&target, depth as u64).map(Rc::new)
                            } else {
                                Err(EvalError::Type(String::from(
                                    "flatten depth must not be negative",
                                )))
                            }
                        }
                        other => Err(EvalError::Type(format!(
                            "flatten depth must be a number, got {} ({})",
                            type_name(other),
                            other
                        ))),
                    }
                },
            ))))
        }
    }
}

fn flatten_value(value: &Value, depth: u64) -> Result<Value, EvalError> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::new();
            flatten_into(&mut out, items, depth);
            Ok(Value::Array(out))
        }
        _ => Err(cannot_iterate(value)),
    }
}

fn flatten_into(out: &mut Vec<Value>, items: &[Value], depth: u64) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten_into(out, inner, depth - 1),
            other => out.push(other.clone()),
        }
    }
}
