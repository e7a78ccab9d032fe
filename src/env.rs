use std::{collections::HashMap, ops::RangeInclusive};

use serde_json::Value;

/// How many arguments a built-in filter accepts.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub arity: RangeInclusive<usize>,
}

/// The evaluation environment: the registered built-in filters, checked
/// at parse time, and the variable bindings visible at eval time.
///
/// Environments are immutable; binding a variable produces a new
/// environment that shadows the old one.
#[derive(Debug, Clone)]
pub struct Env {
    pub functions: HashMap<&'static str, FunctionSignature>,
    vars: HashMap<String, Value>,
}

impl Env {
    pub fn standard() -> Self {
        let mut functions = HashMap::new();

        for name in [
            "length", "keys", "values", "type", "empty", "not", "sort", "reverse", "unique",
            "add", "min", "max", "floor", "sqrt",
        ] {
            functions.insert(name, FunctionSignature { arity: 0..=0 });
        }
        functions.insert("map", FunctionSignature { arity: 1..=1 });
        functions.insert("select", FunctionSignature { arity: 1..=1 });
        functions.insert("flatten", FunctionSignature { arity: 0..=1 });

        Env {
            functions,
            vars: HashMap::new(),
        }
    }

    /// A new environment with `name` bound to `value`, shadowing any
    /// existing binding. The receiver is left untouched.
    pub fn with_var(&self, name: impl Into<String>, value: Value) -> Self {
        let mut env = self.clone();
        env.vars.insert(name.into(), value);
        env
    }

    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}
