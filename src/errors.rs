use std::fmt;

use thiserror::Error;

/// The broad category of a compile-time error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JqErrorType {
    LexerError,
    SyntaxError,
    TypeError,
    NameError,
}

impl fmt::Display for JqErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JqErrorType::LexerError => f.write_str("lexer error"),
            JqErrorType::SyntaxError => f.write_str("syntax error"),
            JqErrorType::TypeError => f.write_str("type error"),
            JqErrorType::NameError => f.write_str("name error"),
        }
    }
}

/// An error raised while lexing or parsing a jq program, carrying the
/// byte index into the program text where the problem was found.
#[derive(Debug, Error, PartialEq)]
#[error("{kind}: {msg} ({index})")]
pub struct JqError {
    pub kind: JqErrorType,
    pub msg: String,
    pub index: usize,
}

impl JqError {
    pub fn new(kind: JqErrorType, msg: String, index: usize) -> Self {
        Self { kind, msg, index }
    }

    pub fn lex(msg: String, index: usize) -> Self {
        Self {
            kind: JqErrorType::LexerError,
            msg,
            index,
        }
    }

    pub fn syntax(msg: String, index: usize) -> Self {
        Self {
            kind: JqErrorType::SyntaxError,
            msg,
            index,
        }
    }

    pub fn typ(msg: String, index: usize) -> Self {
        Self {
            kind: JqErrorType::TypeError,
            msg,
            index,
        }
    }

    pub fn name(msg: String, index: usize) -> Self {
        Self {
            kind: JqErrorType::NameError,
            msg,
            index,
        }
    }
}

/// An error raised while evaluating a compiled program against an input
/// value. Eval errors terminate the stream they arise in; `try`/`catch`
/// catches any of them, while the `?` postfix suppresses only the
/// access-shaped subset (see [`EvalError::is_suppressible`]).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    Type(String),
    #[error("object has no key \"{0}\"")]
    KeyMissing(String),
    #[error("index {0} is out of range")]
    IndexOutOfRange(i64),
    #[error("cannot divide by zero")]
    DivByZero,
    #[error("${0} is not defined")]
    UnboundVariable(String),
    #[error("{0}")]
    UserError(String),
}

impl EvalError {
    /// Errors the `?` postfix converts into end-of-stream.
    pub fn is_suppressible(&self) -> bool {
        matches!(
            self,
            EvalError::Type(_) | EvalError::KeyMissing(_) | EvalError::IndexOutOfRange(_)
        )
    }
}

/// Everything that can go wrong inside [`run`][crate::run]: compiling
/// the program, decoding the input document, or evaluating one against
/// the other.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Compile(#[from] JqError),
    #[error("invalid input document: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
