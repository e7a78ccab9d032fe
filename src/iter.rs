//! Iterator adapters implementing the stream semantics of the
//! evaluator: pipes flat-map, errors fuse the stream they arise in,
//! `?` suppresses access errors, `try`/`catch` switches to its handler
//! and `//` falls back when the left side produces nothing truthy.
//!
//! Each adapter drives its sources lazily; no value is computed before
//! the consumer pulls it.

use std::rc::Rc;

use serde_json::Value;

use crate::{
    env::Env,
    eval::{eval, ValueIter, ValueResult},
    ops::{self, is_truthy},
    query::{BinaryOp, Expr},
};

/// Ends the stream after the first `Err` it yields.
pub struct ErrorFuse<'a> {
    it: ValueIter<'a>,
    done: bool,
}

impl<'a> Iterator for ErrorFuse<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.it.next() {
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            item => item,
        }
    }
}

impl<'a> ErrorFuse<'a> {
    pub fn new(it: ValueIter<'a>) -> Self {
        Self { it, done: false }
    }
}

/// `left | right`: every output of the left stream becomes an input to
/// the right expression, outer before inner.
pub struct PipeIter<'a> {
    right: &'a Expr,
    env: &'a Env,
    outer: ValueIter<'a>,
    inner: Option<ValueIter<'a>>,
    failed: bool,
}

impl<'a> Iterator for PipeIter<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(inner) = self.inner.as_mut() {
                match inner.next() {
                    Some(Ok(value)) => return Some(Ok(value)),
                    Some(Err(err)) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                    None => self.inner = None,
                }
            }
            match self.outer.next()? {
                Ok(value) => self.inner = Some(eval(self.right, value, self.env)),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<'a> PipeIter<'a> {
    pub fn new(outer: ValueIter<'a>, right: &'a Expr, env: &'a Env) -> Self {
        Self {
            right,
            env,
            outer,
            inner: None,
            failed: false,
        }
    }
}

/// `if cond then a else b end`: each output of the condition stream
/// selects a branch, evaluated against the conditional's own input.
pub struct IfIter<'a> {
    cond: ValueIter<'a>,
    then_branch: &'a Expr,
    else_branch: &'a Expr,
    input: Rc<Value>,
    env: &'a Env,
    branch: Option<ValueIter<'a>>,
    failed: bool,
}

impl<'a> Iterator for IfIter<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(branch) = self.branch.as_mut() {
                match branch.next() {
                    Some(Ok(value)) => return Some(Ok(value)),
                    Some(Err(err)) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                    None => self.branch = None,
                }
            }
            match self.cond.next()? {
                Ok(cond) => {
                    let expr = if is_truthy(&cond) {
                        self.then_branch
                    } else {
                        self.else_branch
                    };
                    self.branch = Some(eval(expr, self.input.clone(), self.env));
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<'a> IfIter<'a> {
    pub fn new(
        cond: ValueIter<'a>,
        then_branch: &'a Expr,
        else_branch: &'a Expr,
        input: Rc<Value>,
        env: &'a Env,
    ) -> Self {
        Self {
            cond,
            then_branch,
            else_branch,
            input,
            env,
            branch: None,
            failed: false,
        }
    }
}

/// `expr?`: forwards the operand's stream, but the access-shaped
/// errors end the stream instead of propagating.
pub struct OptionalIter<'a> {
    inner: ValueIter<'a>,
    done: bool,
}

impl<'a> Iterator for OptionalIter<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Err(err)) if err.is_suppressible() => {
                self.done = true;
                None
            }
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            item => item,
        }
    }
}

impl<'a> OptionalIter<'a> {
    pub fn new(inner: ValueIter<'a>) -> Self {
        Self { inner, done: false }
    }
}

/// `try body catch handler`: forwards the body's stream until the
/// first error, which is caught; with a handler present the error's
/// message becomes the handler's input, otherwise the stream just
/// ends.
pub struct TryIter<'a> {
    body: ValueIter<'a>,
    handler: Option<&'a Expr>,
    env: &'a Env,
    caught: Option<ValueIter<'a>>,
    done: bool,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(caught) = self.caught.as_mut() {
                match caught.next() {
                    Some(Err(err)) => {
                        // handler errors are not caught again
                        self.done = true;
                        return Some(Err(err));
                    }
                    item => return item,
                }
            }
            match self.body.next() {
                Some(Ok(value)) => return Some(Ok(value)),
                Some(Err(err)) => match self.handler {
                    Some(handler) => {
                        let message = Rc::new(Value::String(err.to_string()));
                        self.caught = Some(eval(handler, message, self.env));
                    }
                    None => {
                        self.done = true;
                        return None;
                    }
                },
                None => return None,
            }
        }
    }
}

impl<'a> TryIter<'a> {
    pub fn new(body: ValueIter<'a>, handler: Option<&'a Expr>, env: &'a Env) -> Self {
        Self {
            body,
            handler,
            env,
            caught: None,
            done: false,
        }
    }
}

/// `left // right`: yields the truthy values of the left stream; when
/// the left stream completes without error and produced none, yields
/// the right stream instead.
pub struct AltIter<'a> {
    left: ValueIter<'a>,
    right: &'a Expr,
    input: Rc<Value>,
    env: &'a Env,
    yielded: bool,
    fallback: Option<ValueIter<'a>>,
    failed: bool,
}

impl<'a> Iterator for AltIter<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(fallback) = self.fallback.as_mut() {
            return match fallback.next() {
                Some(Err(err)) => {
                    self.failed = true;
                    Some(Err(err))
                }
                item => item,
            };
        }
        loop {
            match self.left.next() {
                Some(Ok(value)) if is_truthy(&value) => {
                    self.yielded = true;
                    return Some(Ok(value));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.failed = true;
                    return Some(Err(err));
                }
                None => {
                    if self.yielded {
                        return None;
                    }
                    self.fallback = Some(eval(self.right, self.input.clone(), self.env));
                    return self.next();
                }
            }
        }
    }
}

impl<'a> AltIter<'a> {
    pub fn new(left: ValueIter<'a>, right: &'a Expr, input: Rc<Value>, env: &'a Env) -> Self {
        Self {
            left,
            right,
            input,
            env,
            yielded: false,
            fallback: None,
            failed: false,
        }
    }
}

/// `..`: the input itself, then every reachable sub-value in pre-order
/// (array elements in order, object values in insertion order).
pub struct RecurseIter {
    stack: Vec<Rc<Value>>,
}

impl Iterator for RecurseIter {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        let value = self.stack.pop()?;
        match &*value {
            Value::Array(items) => {
                self.stack
                    .extend(items.iter().rev().map(|v| Rc::new(v.clone())));
            }
            Value::Object(entries) => {
                self.stack
                    .extend(entries.values().rev().map(|v| Rc::new(v.clone())));
            }
            _ => {}
        }
        Some(Ok(value))
    }
}

impl RecurseIter {
    pub fn new(root: Rc<Value>) -> Self {
        Self { stack: vec![root] }
    }
}

/// A binary operator broadcast over the Cartesian product of its
/// operand streams. The left stream is collected once; the right
/// stream drives the outer loop, which is the order jq emits:
/// `[(1,2) + (10,20)]` is `[11, 12, 21, 22]`.
pub struct CrossIter<'a> {
    op: BinaryOp,
    left: Option<ValueIter<'a>>,
    lefts: Vec<Rc<Value>>,
    right: ValueIter<'a>,
    current: Option<(Rc<Value>, usize)>,
    failed: bool,
}

impl<'a> Iterator for CrossIter<'a> {
    type Item = ValueResult;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some(left) = self.left.take() {
            for item in left {
                match item {
                    Ok(value) => self.lefts.push(value),
                    Err(err) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                }
            }
        }

        loop {
            if let Some((right, index)) = self.current.as_mut() {
                if *index < self.lefts.len() {
                    let left = &self.lefts[*index];
                    *index += 1;
                    return match ops::apply(self.op, left, right) {
                        Ok(value) => Some(Ok(Rc::new(value))),
                        Err(err) => {
                            self.failed = true;
                            Some(Err(err))
                        }
                    };
                }
                self.current = None;
            }
            match self.right.next()? {
                Ok(right) => {
                    if self.lefts.is_empty() {
                        continue;
                    }
                    self.current = Some((right, 0));
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<'a> CrossIter<'a> {
    pub fn new(op: BinaryOp, left: ValueIter<'a>, right: ValueIter<'a>) -> Self {
        Self {
            op,
            left: Some(left),
            lefts: Vec::new(),
            right,
            current: None,
            failed: false,
        }
    }
}
