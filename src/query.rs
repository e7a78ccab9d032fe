use std::fmt;
use std::rc::Rc;

use lazy_static::lazy_static;
use serde_json::Value;

use crate::{
    env::Env,
    errors::{JqError, RunError},
    eval::{eval, ValueIter},
    lexer::lex,
    parser::Parser,
};

lazy_static! {
    static ref PARSER: Parser = Parser::new(Env::standard());
    static ref ENV: Env = Env::standard();
}

/// A compiled jq program: an immutable expression tree that can be
/// evaluated any number of times against different input values.
#[derive(Debug)]
pub struct Query {
    pub expr: Expr,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl Query {
    pub fn new(program: &str) -> Result<Self, JqError> {
        Ok(Query {
            expr: PARSER.parse(lex(program)?)?,
        })
    }

    /// Evaluate this program against `input`, producing a lazy stream
    /// of result values. No work happens until the stream is pulled.
    pub fn eval<'q>(&'q self, input: &Value) -> ValueIter<'q> {
        eval(&self.expr, Rc::new(input.clone()), &ENV)
    }

    /// Like [`Query::eval`], but with host-supplied variable bindings.
    pub fn eval_in<'q>(&'q self, env: &'q Env, input: &Value) -> ValueIter<'q> {
        eval(&self.expr, Rc::new(input.clone()), env)
    }
}

/// Compile jq program text into an expression tree.
pub fn parse(program: &str) -> Result<Expr, JqError> {
    Ok(PARSER.parse(lex(program)?)?)
}

/// Compile `program`, evaluate it against the JSON document `input`,
/// and join the serialized results with newlines.
pub fn run(program: &str, input: &str) -> Result<String, RunError> {
    let query = Query::new(program)?;
    let value: Value = serde_json::from_str(input)?;

    let mut lines = Vec::new();
    for result in query.eval(&value) {
        lines.push(result?.to_string());
    }

    Ok(lines.join("\n"))
}

/// A node in the jq expression tree.
///
/// Every expression maps an input value to a stream of output values:
/// `|` feeds each output of its left side through its right side, `,`
/// concatenates two streams, and the access forms below emit zero or
/// more parts of their input.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `.`: the input value itself.
    Identity,
    /// `..`: the input and, in pre-order, every descendant value.
    Recurse,
    /// A `null`, boolean, number or string constant.
    Literal { value: Value },
    /// `.foo` or `."foo"`.
    Key { name: String },
    /// `.[i, j, ...]`; an empty index list is the iterator `.[]`.
    Index { indices: Vec<i64> },
    /// `.[lo:hi]`, with either endpoint optional.
    Slice { start: Option<i64>, end: Option<i64> },
    /// `expr?`: suppresses access and type errors from its operand.
    Optional { expr: Box<Expr> },
    Pipe {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Comma {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `[expr]`; the whole output stream of `expr` collected into one
    /// array. `[]` when the expression is absent.
    Array { expr: Option<Box<Expr>> },
    /// `{k1: v1, ...}`. A missing value expression is the `{foo}`
    /// shorthand for `foo: .foo`.
    Object {
        entries: Vec<(Expr, Option<Expr>)>,
    },
    Op {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// `left // right`: the truthy values of `left`, or the whole of
    /// `right` when there are none.
    Alternative {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        alt: Box<Expr>,
    },
    /// `try body` or `try body catch handler`.
    TryCatch {
        body: Box<Expr>,
        handler: Option<Box<Expr>>,
    },
    /// `$name`, looked up in the environment.
    Variable { name: String },
    /// A built-in filter call, validated against [`Env`] at parse time.
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => f.write_str("+"),
            BinaryOp::Sub => f.write_str("-"),
            BinaryOp::Mul => f.write_str("*"),
            BinaryOp::Div => f.write_str("/"),
            BinaryOp::Mod => f.write_str("%"),
            BinaryOp::Eq => f.write_str("=="),
            BinaryOp::Ne => f.write_str("!="),
            BinaryOp::Lt => f.write_str("<"),
            BinaryOp::Le => f.write_str("<="),
            BinaryOp::Gt => f.write_str(">"),
            BinaryOp::Ge => f.write_str(">="),
            BinaryOp::And => f.write_str("and"),
            BinaryOp::Or => f.write_str("or"),
        }
    }
}

fn is_plain_key(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identity => f.write_str("."),
            Expr::Recurse => f.write_str(".."),
            Expr::Literal { value } => write!(f, "{}", value),
            Expr::Key { name } => {
                if is_plain_key(name) {
                    write!(f, ".{}", name)
                } else {
                    write!(f, ".{}", Value::String(name.clone()))
                }
            }
            Expr::Index { indices } => {
                write!(
                    f,
                    ".[{}]",
                    indices
                        .iter()
                        .map(|i| i.to_string())
                        .collect::<Vec<String>>()
                        .join(",")
                )
            }
            Expr::Slice { start, end } => {
                write!(
                    f,
                    ".[{}:{}]",
                    start.map(|i| i.to_string()).unwrap_or_default(),
                    end.map(|i| i.to_string()).unwrap_or_default(),
                )
            }
            Expr::Optional { expr } => write!(f, "{}?", expr),
            Expr::Pipe { left, right } => write!(f, "{} | {}", left, right),
            Expr::Comma { left, right } => write!(f, "{}, {}", left, right),
            Expr::Array { expr: Some(expr) } => write!(f, "[{}]", expr),
            Expr::Array { expr: None } => f.write_str("[]"),
            Expr::Object { entries } => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match (key, value) {
                        (Expr::Literal { value: Value::String(name) }, None) => {
                            f.write_str(name)?;
                        }
                        (Expr::Literal { value: key }, Some(value)) => {
                            write!(f, "{}: {}", key, value)?;
                        }
                        (key, Some(value)) => write!(f, "({}): {}", key, value)?,
                        (key, None) => write!(f, "({})", key)?,
                    }
                }
                f.write_str("}")
            }
            Expr::Op { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Alternative { left, right } => write!(f, "({} // {})", left, right),
            Expr::If { cond, then, alt } => {
                write!(f, "if {} then {} else {} end", cond, then, alt)
            }
            Expr::TryCatch {
                body,
                handler: Some(handler),
            } => write!(f, "try {} catch {}", body, handler),
            Expr::TryCatch {
                body,
                handler: None,
            } => write!(f, "try {}", body),
            Expr::Variable { name } => write!(f, "${}", name),
            Expr::Call { name, args } => {
                if args.is_empty() {
                    f.write_str(name)
                } else {
                    write!(
                        f,
                        "{}({})",
                        name,
                        args.iter()
                            .map(|a| a.to_string())
                            .collect::<Vec<String>>()
                            .join("; ")
                    )
                }
            }
        }
    }
}
