//! Expression grammar: fourteen precedence levels, lowest first.
//!
//! Binary levels parse left-associatively by looping on their own level's
//! operators. Postfix position accepts a chain of `.field` and `[index]`
//! accesses; parenthesized expressions keep the inner node's source range.
//!
//! Numeric literals are evaluated here, at parse time, into runtime values.

use super::{ParseResult, Parser};
use crate::ast::{Expr, ExprKind};
use crate::error::ParseError;
use crate::token::{is_valid_identifier, Radix, SourceRange};
use crate::value::{BinaryOpKind, UnaryOpKind, Value};

/// Generates one left-associative binary precedence level.
macro_rules! binary_level {
    ($name:ident => $next:ident, { $($text:literal => $op:ident),+ $(,)? }) => {
        fn $name(&mut self) -> ParseResult<Expr> {
            let mut expr = self.$next()?;
            loop {
                let op = match self.peek().text.as_str() {
                    $($text => BinaryOpKind::$op,)+
                    _ => break,
                };
                self.advance(); // operator
                let right = self.$next()?;
                let range = expr.range.span_to(&right.range);
                expr = Expr {
                    kind: ExprKind::Binary { op, left: Box::new(expr), right: Box::new(right) },
                    range,
                };
            }
            Ok(expr)
        }
    };
}

impl Parser {
    pub(crate) fn expression(&mut self) -> ParseResult<Expr> {
        self.logical_or()
    }

    binary_level!(logical_or => logical_and, { "||" => LogicalOr });
    binary_level!(logical_and => bit_or, { "&&" => LogicalAnd });
    binary_level!(bit_or => bit_xor, { "|" => BitOr });
    binary_level!(bit_xor => bit_and, { "^" => BitXor });
    binary_level!(bit_and => equality, { "&" => BitAnd });
    binary_level!(equality => relational, { "==" => Eq, "!=" => Ne });
    binary_level!(relational => shift, { "<" => Lt, "<=" => Le, ">" => Gt, ">=" => Ge });
    binary_level!(shift => additive, { "<<" => Shl, ">>" => Shr });
    binary_level!(additive => multiplicative, { "+" => Add, "-" => Sub });
    binary_level!(multiplicative => unary, { "*" => Mul, "/" => Div, "%" => Rem });

    fn unary(&mut self) -> ParseResult<Expr> {
        let token = self.peek();
        let op = match token.text.as_str() {
            "+" => Some(UnaryOpKind::Plus),
            "-" => Some(UnaryOpKind::Minus),
            "!" => Some(UnaryOpKind::Not),
            "~" => Some(UnaryOpKind::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance(); // operator
            let operand = self.unary()?;
            let range = SourceRange::new(token, operand.range.end.clone());
            return Ok(Expr { kind: ExprKind::Unary { op, operand: Box::new(operand) }, range });
        }

        if token.text == "++" || token.text == "--" {
            self.advance(); // operator
            let var = self.peek();
            if !is_valid_identifier(&var.text) {
                return Err(ParseError::at(var));
            }
            self.advance(); // name
            let delta = if token.text == "++" { 1 } else { -1 };
            let range = SourceRange::new(token, var.clone());
            return Ok(Expr { kind: ExprKind::PreIncrement { name: var.text, delta }, range });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let first = self.peek();
        let second = self.peek_second();

        if second.text == "++" || second.text == "--" {
            if !is_valid_identifier(&first.text) {
                return Err(ParseError::at(first));
            }
            self.advance(); // name
            let op_token = self.peek();
            self.advance(); // operator
            let delta = if second.text == "++" { 1 } else { -1 };
            let range = SourceRange::new(first.clone(), op_token);
            return Ok(Expr { kind: ExprKind::PostIncrement { name: first.text, delta }, range });
        }

        if is_valid_identifier(&first.text) && second.text == "(" {
            self.advance(); // name
            self.advance(); // (
            let args = self.call_arguments()?;
            let end = self.peek();
            self.advance(); // )
            let range = SourceRange::new(first.clone(), end);
            return Ok(Expr { kind: ExprKind::BuiltinCall { name: first.text, args }, range });
        }

        let mut expr = self.parenthesized()?;
        loop {
            match self.peek().text.as_str() {
                "." => {
                    self.advance(); // .
                    let field = self.peek();
                    if !is_valid_identifier(&field.text) {
                        return Err(ParseError::at(field));
                    }
                    self.advance(); // field
                    let range = SourceRange::new(expr.range.begin.clone(), field.clone());
                    expr = Expr {
                        kind: ExprKind::FieldAccess { receiver: Box::new(expr), field: field.text },
                        range,
                    };
                }
                "[" => {
                    self.advance(); // [
                    let index = self.expression()?;
                    let end = self.expect("]")?;
                    let range = SourceRange::new(expr.range.begin.clone(), end);
                    expr = Expr {
                        kind: ExprKind::Binary {
                            op: BinaryOpKind::Index,
                            left: Box::new(expr),
                            right: Box::new(index),
                        },
                        range,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        if self.peek().text == "(" {
            self.advance(); // (
            let expr = self.logical_or()?;
            self.expect(")")?;
            return Ok(expr);
        }
        self.atom()
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek();
        match token.text.as_str() {
            "true" => {
                self.advance();
                return Ok(Expr {
                    kind: ExprKind::Literal(Value::Bool(true)),
                    range: SourceRange::at(token),
                });
            }
            "false" => {
                self.advance();
                return Ok(Expr {
                    kind: ExprKind::Literal(Value::Bool(false)),
                    range: SourceRange::at(token),
                });
            }
            _ => {}
        }

        let bytes = token.text.as_bytes();
        let starts_number = match bytes.first() {
            Some(b) if b.is_ascii_digit() => true,
            Some(b'.') => bytes.get(1).is_some_and(|b| b.is_ascii_digit()),
            _ => false,
        };
        if starts_number {
            return self.literal_expression();
        }
        if is_valid_identifier(&token.text) {
            return self.var_reference();
        }
        Err(ParseError::at(token))
    }

    fn literal_expression(&mut self) -> ParseResult<Expr> {
        let token = self.peek();
        let value =
            parse_number_literal(&token.text).ok_or_else(|| ParseError::at(token.clone()))?;
        self.advance(); // literal
        Ok(Expr { kind: ExprKind::Literal(value), range: SourceRange::at(token) })
    }

    /// Identifier, optionally namespaced with one `::` segment.
    fn var_reference(&mut self) -> ParseResult<Expr> {
        let token = self.peek();
        self.advance(); // name
        let mut name = token.text.clone();
        let mut end = token.clone();
        if self.peek().text == "::" {
            self.advance(); // ::
            let segment = self.peek();
            if !is_valid_identifier(&segment.text) {
                return Err(ParseError::at(segment));
            }
            self.advance(); // segment
            name.push_str("::");
            name.push_str(&segment.text);
            end = segment;
        }
        Ok(Expr { kind: ExprKind::VarReference { name }, range: SourceRange::new(token, end) })
    }
}

/// Builds the `name + 1` / `name - 1` right-hand side for increment
/// statements; every synthesized node spans the whole statement.
pub(super) fn increment_desugar(name: &str, op: BinaryOpKind, range: &SourceRange) -> Expr {
    let var = Expr {
        kind: ExprKind::VarReference { name: name.to_string() },
        range: range.clone(),
    };
    let one = Expr { kind: ExprKind::Literal(Value::Int32(1)), range: range.clone() };
    Expr {
        kind: ExprKind::Binary { op, left: Box::new(var), right: Box::new(one) },
        range: range.clone(),
    }
}

/// Evaluate a numeric literal token, or `None` when the token is malformed
/// (stray digits for its radix, overflow, or a trailing suffix mismatch).
///
/// Integers: `l`/`L` selects 64-bit; decimal literals fail above the signed
/// maximum, other radixes wrap through the unsigned 32-bit range. Floats:
/// decimal-family text is parsed directly; hexadecimal floats accumulate a
/// mantissa scaled by powers of two (four per fraction digit, plus the `p`
/// exponent).
fn parse_number_literal(text: &str) -> Option<Value> {
    let chars: Vec<char> = text.chars().collect();
    let mut radix = Radix::Dec;
    let mut start = 0;
    if chars[0] == '0' && chars.len() > 1 {
        match chars[1] {
            'x' | 'X' => {
                radix = Radix::Hex;
                start = 2;
            }
            'b' | 'B' => {
                radix = Radix::Bin;
                start = 2;
            }
            _ => radix = Radix::Oct,
        }
    }

    let contains = |c: char| chars.contains(&c);
    let last = *chars.last()?;
    let mut is_float = contains('.');
    is_float |= matches!(radix, Radix::Dec | Radix::Oct) && (contains('e') || contains('E'));
    is_float |= radix == Radix::Hex && (contains('p') || contains('P'));
    is_float |= radix != Radix::Hex && matches!(last, 'f' | 'F' | 'd' | 'D');
    if is_float && radix == Radix::Oct {
        radix = Radix::Dec;
    }

    if !is_float {
        return parse_integer_literal(&chars, radix, start, last);
    }
    match radix {
        Radix::Dec => parse_decimal_float(text),
        _ => parse_scaled_float(&chars, radix, start),
    }
}

fn parse_integer_literal(chars: &[char], radix: Radix, start: usize, last: char) -> Option<Value> {
    let base = radix.base();
    let mut mantissa: u64 = 0;
    let mut i = start;
    while i < chars.len() && radix.has_digit(chars[i]) {
        mantissa = mantissa.checked_mul(base)?.checked_add(Radix::digit_value(chars[i]))?;
        i += 1;
    }

    if last == 'l' || last == 'L' {
        if i != chars.len() - 1 {
            return None;
        }
        if radix == Radix::Dec && mantissa > i64::MAX as u64 {
            return None;
        }
        Some(Value::Int64(mantissa as i64))
    } else {
        if i != chars.len() {
            return None;
        }
        if radix == Radix::Dec && mantissa > i32::MAX as u64 {
            return None;
        }
        if mantissa > u32::MAX as u64 {
            return None;
        }
        // non-decimal values above i32::MAX wrap by reinterpretation
        Some(Value::Int32(mantissa as u32 as i32))
    }
}

/// Decimal-family float: strip the one optional suffix character and let the
/// standard parser handle mantissa and exponent without precision loss.
fn parse_decimal_float(text: &str) -> Option<Value> {
    let (body, is_double) = match text.as_bytes().last() {
        Some(b'f' | b'F') => (&text[..text.len() - 1], false),
        Some(b'd' | b'D') => (&text[..text.len() - 1], true),
        _ => (text, true),
    };
    let value: f64 = body.parse().ok()?;
    Some(if is_double { Value::Float64(value) } else { Value::Float32(value as f32) })
}

/// Hexadecimal (and degenerate binary-radix) float: mantissa digits scale by
/// the radix, fraction digits subtract bits from the exponent, and the `p`
/// exponent is a power of two.
fn parse_scaled_float(chars: &[char], radix: Radix, start: usize) -> Option<Value> {
    let n = chars.len();
    let base = radix.base();
    let mut mantissa: u64 = 0;
    let mut exponent: i32 = 0;
    let mut i = start;

    while i < n && radix.has_digit(chars[i]) {
        mantissa = mantissa.checked_mul(base)?.checked_add(Radix::digit_value(chars[i]))?;
        i += 1;
    }
    if i < n && chars[i] == '.' {
        i += 1;
        while i < n && radix.has_digit(chars[i]) {
            mantissa = mantissa.checked_mul(base)?.checked_add(Radix::digit_value(chars[i]))?;
            exponent -= if radix == Radix::Hex { 4 } else { 1 };
            i += 1;
        }
    }
    if i < n && (chars[i] == 'p' || chars[i] == 'P') {
        i += 1;
        if i < n && chars[i] == '+' {
            i += 1;
        }
        let negative = i < n && chars[i] == '-';
        if negative {
            i += 1;
        }
        if i == n || !chars[i].is_ascii_digit() {
            return None;
        }
        let mut magnitude: i32 = 0;
        while i < n && chars[i].is_ascii_digit() && magnitude < 1100 {
            magnitude = 10 * magnitude + chars[i].to_digit(10)? as i32;
            i += 1;
        }
        if i < n && chars[i].is_ascii_digit() {
            return None;
        }
        exponent += if negative { -magnitude } else { magnitude };
    }

    let mut is_double = true;
    if i < n && (chars[i] == 'd' || chars[i] == 'D') {
        i += 1;
    }
    if i < n && (chars[i] == 'f' || chars[i] == 'F') {
        is_double = false;
        i += 1;
    }
    if i < n {
        return None;
    }

    let value = mantissa as f64 * 2f64.powi(exponent);
    Some(if is_double { Value::Float64(value) } else { Value::Float32(value as f32) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_radixes() {
        assert!(matches!(parse_number_literal("42"), Some(Value::Int32(42))));
        assert!(matches!(parse_number_literal("0x1F"), Some(Value::Int32(31))));
        assert!(matches!(parse_number_literal("0b101"), Some(Value::Int32(5))));
        assert!(matches!(parse_number_literal("017"), Some(Value::Int32(15))));
    }

    #[test]
    fn hex_wraps_into_signed_range() {
        assert!(matches!(parse_number_literal("0xFFFFFFFF"), Some(Value::Int32(-1))));
        assert!(matches!(parse_number_literal("0x80000000"), Some(Value::Int32(i32::MIN))));
    }

    #[test]
    fn decimal_overflow_fails() {
        assert!(parse_number_literal("2147483648").is_none());
        assert!(matches!(parse_number_literal("2147483647"), Some(Value::Int32(i32::MAX))));
        assert!(parse_number_literal("9223372036854775808l").is_none());
    }

    #[test]
    fn long_suffix_selects_int64() {
        assert!(matches!(parse_number_literal("2147483647l"), Some(Value::Int64(2147483647))));
        assert!(matches!(parse_number_literal("5L"), Some(Value::Int64(5))));
        assert!(matches!(parse_number_literal("0x10l"), Some(Value::Int64(16))));
    }

    #[test]
    fn float_suffixes_and_exponents() {
        assert!(matches!(parse_number_literal("0.1f"), Some(Value::Float32(v)) if v == 0.1f32));
        assert!(matches!(parse_number_literal("1.5"), Some(Value::Float64(v)) if v == 1.5));
        assert!(matches!(parse_number_literal("1e3"), Some(Value::Float64(v)) if v == 1000.0));
        assert!(matches!(parse_number_literal("2d"), Some(Value::Float64(v)) if v == 2.0));
        assert!(matches!(parse_number_literal(".5e-1"), Some(Value::Float64(v)) if v == 0.05));
    }

    #[test]
    fn hex_floats_scale_by_powers_of_two() {
        assert!(matches!(parse_number_literal("0x1.8p1"), Some(Value::Float64(v)) if v == 3.0));
        assert!(matches!(parse_number_literal("0x1p-2"), Some(Value::Float64(v)) if v == 0.25));
        assert!(matches!(parse_number_literal("0x1p1f"), Some(Value::Float32(v)) if v == 2.0));
    }

    #[test]
    fn stray_digits_for_radix_fail() {
        assert!(parse_number_literal("09").is_none());
        assert!(parse_number_literal("0b102").is_none());
        assert!(parse_number_literal("1.5l").is_none());
    }
}
