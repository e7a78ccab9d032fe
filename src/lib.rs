//! A jq-compatible query interpreter. A program is compiled once into
//! an immutable expression tree, then evaluated against JSON input
//! values, producing a lazy stream of results.
//!
//! ## Running a query
//!
//! ```
//! use rust_jq::{errors::JqError, Query};
//! use serde_json::json;
//!
//! fn main() -> Result<(), JqError> {
//!     let query = Query::new(".users[] | select(.age >= 18) | .name")?;
//!     let data = json!({
//!         "users": [
//!             {"name": "Sue", "age": 28},
//!             {"name": "John", "age": 17},
//!         ]
//!     });
//!
//!     let names: Vec<String> = query
//!         .eval(&data)
//!         .map(|result| result.expect("evaluation failed").to_string())
//!         .collect();
//!     assert_eq!(names, ["\"Sue\""]);
//!     Ok(())
//! }
//! ```
//!
//! Values are produced on demand: work for later results does not
//! happen until earlier ones have been consumed, and dropping the
//! stream cancels whatever is left.
//!
//! ## One-shot evaluation
//!
//! [`run`] compiles a program, applies it to a serialized JSON
//! document, and joins the printed results with newlines:
//!
//! ```
//! let output = rust_jq::run(".numbers | map(. * 2) | add", r#"{"numbers": [1, 2, 3]}"#).unwrap();
//! assert_eq!(output, "12");
//! ```
//!
//! ## The expression tree
//!
//! [`parse`] exposes the compiled [`Expr`] tree directly, and a
//! [`Query`] prints as its canonical form:
//!
//! ```
//! use rust_jq::Query;
//!
//! let query = Query::new(".users[0] | {name, age: .age}").unwrap();
//! assert_eq!(query.to_string(), r#".users | .[0] | {name, "age": .age}"#);
//! ```
mod builtins;
pub mod env;
pub mod errors;
pub mod eval;
pub mod iter;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod query;
pub mod token;

pub use env::Env;
pub use errors::{EvalError, JqError, JqErrorType, RunError};
pub use eval::{eval, ValueIter, ValueResult};
pub use parser::Parser;
pub use query::{parse, run, Expr, Query};
