//! Registry of externally provided builtin functions.
//!
//! The interpreter dispatches builtin calls by name: statement-position calls
//! run for effect, expression-position calls produce a value. The language
//! core registers nothing itself beyond [`Builtins::standard`]; a host (such
//! as a binary-stream reader) installs its own entries.

use std::collections::HashMap;

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub type StatementBuiltin = Box<dyn Fn(&[Value]) -> EvalResult<()>>;
pub type ExpressionBuiltin = Box<dyn Fn(&[Value]) -> EvalResult<Value>>;

#[derive(Default)]
pub struct Builtins {
    statements: HashMap<String, StatementBuiltin>,
    expressions: HashMap<String, ExpressionBuiltin>,
}

impl Builtins {
    pub fn new() -> Self {
        Builtins::default()
    }

    /// The standard set: just `print`, which writes each argument's display
    /// form to stdout, space-separated.
    pub fn standard() -> Self {
        let mut builtins = Builtins::new();
        builtins.register_statement("print", |args| {
            let rendered: Vec<String> = args.iter().map(Value::to_string).collect();
            println!("{}", rendered.join(" "));
            Ok(())
        });
        builtins
    }

    pub fn register_statement(
        &mut self,
        name: &str,
        function: impl Fn(&[Value]) -> EvalResult<()> + 'static,
    ) {
        self.statements.insert(name.to_string(), Box::new(function));
    }

    pub fn register_expression(
        &mut self,
        name: &str,
        function: impl Fn(&[Value]) -> EvalResult<Value> + 'static,
    ) {
        self.expressions.insert(name.to_string(), Box::new(function));
    }

    pub fn execute(&self, name: &str, args: &[Value]) -> EvalResult<()> {
        match self.statements.get(name) {
            Some(function) => function(args),
            None => Err(EvalError::UnknownBuiltin { name: name.to_string() }),
        }
    }

    pub fn evaluate(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        match self.expressions.get(name) {
            Some(function) => function(args),
            None => Err(EvalError::UnknownBuiltin { name: name.to_string() }),
        }
    }
}
