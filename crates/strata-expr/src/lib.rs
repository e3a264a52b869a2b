//! Small expression language for scripts and control bindings.
//!
//! # Primary API
//!
//! - [`Expr`]: a parsed expression, evaluated any number of times
//! - [`Value`]: null, boolean, integer, float or string
//! - [`Variables`]: where named variables are read from and written to
//!
//! ```
//! use std::collections::HashMap;
//! use strata_expr::{Expr, Value};
//!
//! let mut vars = HashMap::from([("cycles".to_string(), Value::Int(4))]);
//! let expr = Expr::parse("cycles * 2 + 1").unwrap();
//! assert_eq!(expr.eval(&mut vars), Value::Int(9));
//! ```
//!
//! Parsing reports errors. Evaluation does not: `5 / 0` and `5 % 0` are both 0.

use std::collections::HashMap;

pub mod error;
pub use error::{Error, Result};

mod builtin;
pub use builtin::Builtin;

mod eval;
mod lexer;

mod parser;
pub use parser::{BinaryOp, Node, UnaryOp};

mod value;
pub use value::Value;

/// Named variable storage seen by an expression.
pub trait Variables {
    fn get(&self, name: &str) -> Option<Value>;

    /// Stores `value`. Returns false when the variable cannot be written.
    fn set(&mut self, _name: &str, _value: Value) -> bool {
        false
    }
}

impl Variables for HashMap<String, Value> {
    fn get(&self, name: &str) -> Option<Value> {
        HashMap::get(self, name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) -> bool {
        self.insert(name.to_string(), value);
        true
    }
}

/// No variables at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVariables;

impl Variables for NoVariables {
    fn get(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    root: Node,
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self> {
        let root = parser::parse(source)?;
        tracing::trace!(source, "expression parsed");
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn eval(&self, vars: &mut dyn Variables) -> Value {
        eval::eval(&self.root, vars)
    }

    /// Evaluates without variables.
    pub fn eval_const(&self) -> Value {
        self.eval(&mut NoVariables)
    }
}

impl std::str::FromStr for Expr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expr::parse(s)
    }
}
