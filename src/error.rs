//! Error types for the three phases: tokenization, parsing, evaluation.
//!
//! Tokenizer and parser failures surface a single offending token; the
//! diagnostics module renders its line and an underline. Evaluation failures
//! carry no position of their own — the interpreter's trace stacks pin the
//! source ranges of every enclosing statement and expression.

use std::fmt;

use crate::token::Token;

/// Tokenization failure: malformed or unterminated literal, or an unclosed
/// block comment (whose token text is empty, positioned at end of input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub token: Token,
}

impl LexError {
    pub fn at(token: Token) -> Self {
        LexError { token }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Syntax error {}:{}", self.token.line, self.token.col)
    }
}

/// Parse failure: the token the grammar could not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub token: Token,
}

impl ParseError {
    pub fn at(token: Token) -> Self {
        ParseError { token }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parsing error {}:{}", self.token.line, self.token.col)
    }
}

/// Evaluation failure. The `Display` texts are stable: diagnostics print them
/// verbatim and tests match on them.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UndefinedVariable { name: String },
    Redeclaration { name: String },
    UndefinedBinaryOperator { op: &'static str, left: String, right: String },
    UndefinedUnaryOperator { op: &'static str, operand: String },
    NotABoolean { value: String },
    DivisionByZero,
    IndexNotInteger { index: String },
    IndexOutOfBounds { index: i32 },
    UninitializedArrayValue,
    FieldOnNonStruct,
    MissingField { name: String },
    UnknownStructType { name: String },
    StructRefRedeclaration { name: String },
    StructRefOutsideStruct,
    DimensionNotInteger,
    NegativeArraySize,
    ArraySizeTooLarge,
    UnknownBuiltin { name: String },
    UnhandledBreak,
    UnhandledContinue,
}

pub type EvalResult<T> = Result<T, EvalError>;

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UndefinedVariable { name } => {
                write!(f, "Reference to undefined variable {}", name)
            }
            EvalError::Redeclaration { name } => {
                write!(f, "Redeclaration of variable {}", name)
            }
            EvalError::UndefinedBinaryOperator { op, left, right } => {
                write!(f, "Undefined operator {} for operands ({}, {})", op, left, right)
            }
            EvalError::UndefinedUnaryOperator { op, operand } => {
                write!(f, "Undefined operator {} for operand {}", op, operand)
            }
            EvalError::NotABoolean { value } => {
                write!(f, "Cannot interpret {} as a boolean", value)
            }
            EvalError::DivisionByZero => write!(f, "Division by zero"),
            EvalError::IndexNotInteger { index } => {
                write!(f, "Can only index arrays with integers, {} used", index)
            }
            EvalError::IndexOutOfBounds { index } => {
                write!(f, "Array index {} is out of bounds", index)
            }
            EvalError::UninitializedArrayValue => {
                write!(f, "Reference to uninitialized array value")
            }
            EvalError::FieldOnNonStruct => {
                write!(f, "Cannot get field from non-struct type")
            }
            EvalError::MissingField { name } => {
                write!(f, "Cannot find field {} in struct", name)
            }
            EvalError::UnknownStructType { name } => {
                write!(f, "Could not resolve struct {}", name)
            }
            EvalError::StructRefRedeclaration { name } => {
                write!(f, "Redeclaration of struct reference {}", name)
            }
            EvalError::StructRefOutsideStruct => {
                write!(f, "Struct reference declared outside of any struct")
            }
            EvalError::DimensionNotInteger => {
                write!(f, "Array dimension must be an integer")
            }
            EvalError::NegativeArraySize => write!(f, "Negative array size"),
            EvalError::ArraySizeTooLarge => write!(f, "Array size too large"),
            EvalError::UnknownBuiltin { name } => {
                write!(f, "Unknown builtin function {}", name)
            }
            EvalError::UnhandledBreak => write!(f, "break statement not handled"),
            EvalError::UnhandledContinue => write!(f, "continue statement not handled"),
        }
    }
}

impl std::error::Error for LexError {}
impl std::error::Error for ParseError {}
impl std::error::Error for EvalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_variable_message_is_stable() {
        let err = EvalError::UndefinedVariable { name: "z".into() };
        assert_eq!(err.to_string(), "Reference to undefined variable z");
    }

    #[test]
    fn operator_mismatch_names_both_operands() {
        let err = EvalError::UndefinedBinaryOperator {
            op: "&",
            left: "1.5".into(),
            right: "2".into(),
        };
        assert_eq!(err.to_string(), "Undefined operator & for operands (1.5, 2)");
    }

    #[test]
    fn lex_error_prints_position() {
        let err = LexError::at(Token::new("0x", 4, 7));
        assert_eq!(err.to_string(), "Syntax error 4:7");
    }
}
