//! Value-level semantics for the binary operators: arithmetic, deep
//! equality, and the jq total order over all six JSON types.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use crate::{errors::EvalError, query::BinaryOp};

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Everything except `false` and `null` is truthy.
pub fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// A number result as a JSON value, collapsing integral floats back to
/// integers so arithmetic on integers prints the way jq prints it.
/// NaN and infinities become null, which is also what jq serializes.
pub fn number_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

pub fn apply(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => sub(left, right),
        BinaryOp::Mul => mul(left, right),
        BinaryOp::Div => div(left, right),
        BinaryOp::Mod => rem(left, right),
        BinaryOp::Eq => Ok(Value::Bool(cmp_values(left, right) == Ordering::Equal)),
        BinaryOp::Ne => Ok(Value::Bool(cmp_values(left, right) != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Bool(cmp_values(left, right) == Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(cmp_values(left, right) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(cmp_values(left, right) == Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(cmp_values(left, right) != Ordering::Less)),
        // and/or short-circuit over streams and never reach the
        // product evaluator
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators are stream operators"),
    }
}

fn type_error(left: &Value, right: &Value, verb: &str) -> EvalError {
    EvalError::Type(format!(
        "{} ({}) and {} ({}) cannot be {}",
        type_name(left),
        left,
        type_name(right),
        right,
        verb
    ))
}

fn add(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Null, v) | (v, Value::Null) => Ok(v.clone()),
        (Value::Number(a), Value::Number(b)) => Ok(number_value(as_f64(a) + as_f64(b))),
        (Value::String(a), Value::String(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            Ok(Value::String(s))
        }
        (Value::Array(a), Value::Array(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::Array(items))
        }
        (Value::Object(a), Value::Object(b)) => {
            // right-biased shallow merge
            let mut merged = a.clone();
            for (k, v) in b {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Value::Object(merged))
        }
        _ => Err(type_error(left, right, "added")),
    }
}

fn sub(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(number_value(as_f64(a) - as_f64(b))),
        (Value::Array(a), Value::Array(b)) => {
            // set difference, keeping the left operand's order
            let items = a
                .iter()
                .filter(|v| !b.iter().any(|w| cmp_values(v, w) == Ordering::Equal))
                .cloned()
                .collect();
            Ok(Value::Array(items))
        }
        _ => Err(type_error(left, right, "subtracted")),
    }
}

fn mul(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(number_value(as_f64(a) * as_f64(b))),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            let count = as_f64(n);
            if count < 0.0 || !count.is_finite() {
                Err(type_error(left, right, "multiplied"))
            } else {
                Ok(Value::String(s.repeat(count as usize)))
            }
        }
        (Value::Object(a), Value::Object(b)) => Ok(Value::Object(deep_merge(a, b))),
        _ => Err(type_error(left, right, "multiplied")),
    }
}

/// Recursive merge of two objects; the right side wins at leaves.
fn deep_merge(left: &Map<String, Value>, right: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = left.clone();
    for (k, rv) in right {
        match (merged.get(k), rv) {
            (Some(Value::Object(lo)), Value::Object(ro)) => {
                let combined = deep_merge(lo, ro);
                merged.insert(k.clone(), Value::Object(combined));
            }
            _ => {
                merged.insert(k.clone(), rv.clone());
            }
        }
    }
    merged
}

fn div(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let divisor = as_f64(b);
            if divisor == 0.0 {
                Err(EvalError::DivByZero)
            } else {
                Ok(number_value(as_f64(a) / divisor))
            }
        }
        _ => Err(type_error(left, right, "divided")),
    }
}

fn rem(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            // jq truncates both operands to integers before taking the
            // remainder
            let divisor = as_f64(b).trunc() as i64;
            if divisor == 0 {
                Err(EvalError::DivByZero)
            } else {
                Ok(Value::from(as_f64(a).trunc() as i64 % divisor))
            }
        }
        _ => Err(type_error(left, right, "divided")),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// The jq total order: `null < false < true < numbers < strings <
/// arrays < objects`. Doubles as deep structural equality, since two
/// values compare equal exactly when jq considers them `==`.
pub fn cmp_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            as_f64(a).partial_cmp(&as_f64(b)).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match cmp_values(x, y) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            // insertion order is irrelevant for comparison: objects
            // compare by sorted key sequence, then by the values in
            // that key order
            let mut a_keys: Vec<&String> = a.keys().collect();
            let mut b_keys: Vec<&String> = b.keys().collect();
            a_keys.sort();
            b_keys.sort();

            match a_keys.cmp(&b_keys) {
                Ordering::Equal => {}
                other => return other,
            }

            for k in a_keys {
                match cmp_values(&a[k.as_str()], &b[k.as_str()]) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        }
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}
