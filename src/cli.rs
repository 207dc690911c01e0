//! Command-line front end: `decode_bin <source-file>`.
//!
//! Diagnostics go to stderr; the root struct goes to stdout. Exit code 0
//! covers successful runs and diagnosed parse/evaluation errors; 1 is
//! reserved for an unreadable input file or a tokenization failure.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::builtins::Builtins;
use crate::diagnostics::{self, SourceBuffer};
use crate::interpreter;
use crate::lexer;
use crate::parser;
use crate::style::Style;
use crate::value::Value;

#[derive(Parser)]
#[command(name = "decode_bin")]
#[command(about = "Interpret a binary-format layout program", version)]
pub struct Cli {
    /// Layout source file to interpret
    pub file: PathBuf,

    /// Print the root struct as JSON instead of the display form
    #[arg(long)]
    pub json: bool,
}

pub fn run_cli() -> ExitCode {
    run(&Cli::parse())
}

pub fn run(cli: &Cli) -> ExitCode {
    let source = match fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!(
                "{}: failed to open {}: {}",
                Style::bold_red("error"),
                cli.file.display(),
                err
            );
            return ExitCode::from(1);
        }
    };
    let buffer = SourceBuffer::from_source(&source);

    let tokens = match lexer::tokenize(buffer.lines()) {
        Ok(tokens) => tokens,
        Err(err) => {
            eprint!("{}", diagnostics::render_token_error(&buffer, &err.token, &err.to_string()));
            return ExitCode::from(1);
        }
    };

    let statements = match parser::parse(tokens) {
        Ok(statements) => statements,
        Err(err) => {
            eprint!("{}", diagnostics::render_token_error(&buffer, &err.token, &err.to_string()));
            return ExitCode::SUCCESS;
        }
    };

    let builtins = Builtins::standard();
    match interpreter::execute(&statements, &builtins) {
        Ok(root) => {
            let root = Value::Struct(root);
            if cli.json {
                println!("{}", value_to_json(&root));
            } else {
                println!("{}", root);
            }
        }
        Err(trace) => {
            eprint!("{}", diagnostics::render_eval_trace(&buffer, &trace));
        }
    }
    ExitCode::SUCCESS
}

/// JSON form of a runtime value; uninitialized array cells and non-finite
/// floats render as `null`.
fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int32(v) => (*v).into(),
        Value::Int64(v) => (*v).into(),
        Value::Float32(v) => float_to_json(*v as f64),
        Value::Float64(v) => float_to_json(*v),
        Value::Bool(v) => (*v).into(),
        Value::Array(cells) => serde_json::Value::Array(
            cells
                .borrow()
                .iter()
                .map(|cell| cell.as_ref().map_or(serde_json::Value::Null, value_to_json))
                .collect(),
        ),
        Value::Struct(fields) => {
            let mut object = serde_json::Map::new();
            for (name, field) in fields.borrow().iter() {
                object.insert(name.clone(), value_to_json(field));
            }
            serde_json::Value::Object(object)
        }
    }
}

fn float_to_json(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_conversion_handles_every_variant() {
        let array = Value::new_array(2);
        if let Value::Array(cells) = &array {
            cells.borrow_mut()[0] = Some(Value::Int32(5));
        }
        let fields = Value::new_struct();
        fields.borrow_mut().insert("n".into(), Value::Int64(7));
        fields.borrow_mut().insert("x".into(), Value::Float64(1.5));
        fields.borrow_mut().insert("ok".into(), Value::Bool(true));
        fields.borrow_mut().insert("a".into(), array);

        let json = value_to_json(&Value::Struct(fields));
        assert_eq!(
            json.to_string(),
            r#"{"n":7,"x":1.5,"ok":true,"a":[5,null]}"#
        );
    }
}
