//! Tokenizer for the layout language.
//!
//! Segments source lines into tokens tagged with `(text, line, col)`. The
//! scanner classifies each token by its first character and then consumes as
//! far as that token class allows: words, radix-prefixed numbers, operators
//! under maximal munch, single-line character and string literals, and the
//! two comment forms. Only block comments carry state across line
//! boundaries; every other token class ends at end-of-line.

use crate::error::LexError;
use crate::token::{is_operator, Radix, Token};

/// Token classes recognized from a leading character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Whitespace,
    Word,
    Number,
    Operator,
    CharLit,
    StringLit,
    LineComment,
    BlockComment,
}

fn is_line_whitespace(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

fn is_operator_char(ch: char) -> bool {
    let mut buf = [0u8; 4];
    is_operator(ch.encode_utf8(&mut buf))
}

/// Classify the token starting at `chars[i]`. `.` and `/` need one character
/// of lookahead: `.5` is a number, `//` and `/*` open comments.
fn classify(chars: &[char], i: usize) -> CharClass {
    let ch = chars[i];
    if is_line_whitespace(ch) {
        CharClass::Whitespace
    } else if ch == '.' {
        match chars.get(i + 1) {
            Some(next) if next.is_ascii_digit() => CharClass::Number,
            _ => CharClass::Operator,
        }
    } else if ch == '/' {
        match chars.get(i + 1) {
            Some('/') => CharClass::LineComment,
            Some('*') => CharClass::BlockComment,
            _ => CharClass::Operator,
        }
    } else if ch.is_ascii_digit() {
        CharClass::Number
    } else if ch == '\'' {
        CharClass::CharLit
    } else if ch == '"' {
        CharClass::StringLit
    } else if is_operator_char(ch) {
        CharClass::Operator
    } else {
        CharClass::Word
    }
}

/// Word tokens absorb digits; anything classified as another token class
/// ends the word.
fn word_continues(chars: &[char], i: usize) -> bool {
    chars[i].is_ascii_digit() || classify(chars, i) == CharClass::Word
}

pub struct Lexer {
    tokens: Vec<Token>,
    in_block_comment: bool,
    last_line: u32,
    last_line_len: u32,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer { tokens: Vec::new(), in_block_comment: false, last_line: 1, last_line_len: 0 }
    }

    /// Scan one source line (without its trailing newline).
    pub fn scan_line(&mut self, line: &str, lineno: u32) -> Result<(), LexError> {
        let chars: Vec<char> = line.chars().collect();
        let n = chars.len();
        self.last_line = lineno;
        self.last_line_len = n as u32;

        let mut i = 0;
        if self.in_block_comment {
            match block_comment_end(&chars, 0) {
                Some(end) => {
                    self.in_block_comment = false;
                    i = end;
                }
                None => return Ok(()),
            }
        }

        while i < n {
            match classify(&chars, i) {
                CharClass::Whitespace => i += 1,
                CharClass::LineComment => return Ok(()),
                CharClass::BlockComment => {
                    // skip past "/*", then look for the close on this line
                    match block_comment_end(&chars, i + 2) {
                        Some(end) => i = end,
                        None => {
                            self.in_block_comment = true;
                            return Ok(());
                        }
                    }
                }
                CharClass::Word => {
                    let mut j = i + 1;
                    while j < n && word_continues(&chars, j) {
                        j += 1;
                    }
                    self.push(&chars, i, j, lineno);
                    i = j;
                }
                CharClass::Operator => {
                    let mut j = i + 1;
                    while j < n && is_operator(&collect(&chars, i, j + 1)) {
                        j += 1;
                    }
                    self.push(&chars, i, j, lineno);
                    i = j;
                }
                CharClass::Number => {
                    let j = scan_number(&chars, i)
                        .map_err(|end| LexError::at(token_of(&chars, i, end, lineno)))?;
                    self.push(&chars, i, j, lineno);
                    i = j;
                }
                CharClass::CharLit | CharClass::StringLit => {
                    let quote = chars[i];
                    let mut j = i + 1;
                    loop {
                        if j >= n {
                            return Err(LexError::at(token_of(&chars, i, n, lineno)));
                        }
                        if chars[j] == quote && !is_escaped(&chars, j) {
                            break;
                        }
                        j += 1;
                    }
                    self.push(&chars, i, j + 1, lineno);
                    i = j + 1;
                }
            }
        }
        Ok(())
    }

    /// Finish tokenization. An unclosed block comment is a syntax error
    /// positioned one column past the end of the last line.
    pub fn finish(self) -> Result<Vec<Token>, LexError> {
        if self.in_block_comment {
            return Err(LexError::at(Token::new("", self.last_line, self.last_line_len)));
        }
        Ok(self.tokens)
    }

    fn push(&mut self, chars: &[char], start: usize, end: usize, lineno: u32) {
        self.tokens.push(token_of(chars, start, end, lineno));
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

fn collect(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

fn token_of(chars: &[char], start: usize, end: usize, lineno: u32) -> Token {
    Token::new(collect(chars, start, end), lineno, start as u32)
}

/// The closing quote counts only when preceded by an even number of
/// consecutive backslashes.
fn is_escaped(chars: &[char], quote_pos: usize) -> bool {
    let mut backslashes = 0;
    let mut k = quote_pos;
    while k > 0 && chars[k - 1] == '\\' {
        backslashes += 1;
        k -= 1;
    }
    backslashes % 2 == 1
}

/// Find the index just past a `*/` close at or after `from`, if any on this
/// line.
fn block_comment_end(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from.max(1);
    while i < chars.len() {
        if chars[i] == '/' && chars[i - 1] == '*' {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Consume a numeric literal starting at `start`, returning the index one
/// past its last character. Validates shape only (radix prefix followed by a
/// digit, exponent followed by digits); the value is evaluated at parse time.
/// On failure, returns the index one past the malformed prefix.
fn scan_number(chars: &[char], start: usize) -> Result<usize, usize> {
    let n = chars.len();
    let had_leading_dot = chars[start] == '.';
    let mut radix = Radix::Dec;
    let mut i = start;

    if had_leading_dot {
        i = start + 1;
    } else if chars[start] == '0' && start + 1 < n {
        match chars[start + 1] {
            'x' | 'X' => {
                radix = Radix::Hex;
                i = start + 2;
            }
            'b' | 'B' => {
                radix = Radix::Bin;
                i = start + 2;
            }
            _ => radix = Radix::Oct,
        }
        if (radix == Radix::Hex || radix == Radix::Bin)
            && (i == n || !(radix.has_digit(chars[i]) || chars[i].is_ascii_digit()))
        {
            return Err(i);
        }
    }

    // main digit run; stray decimal digits are accepted here and rejected
    // when the literal's value is evaluated
    while i < n && (radix.has_digit(chars[i]) || chars[i].is_ascii_digit()) {
        i += 1;
    }

    if !had_leading_dot && i < n && chars[i] == '.' && radix != Radix::Bin {
        if radix == Radix::Oct {
            radix = Radix::Dec;
        }
        i += 1;
        while i < n && radix.has_digit(chars[i]) {
            i += 1;
        }
    }

    let at_exponent = i < n
        && match radix {
            Radix::Dec | Radix::Oct => chars[i] == 'e' || chars[i] == 'E',
            Radix::Hex => chars[i] == 'p' || chars[i] == 'P',
            Radix::Bin => false,
        };
    if at_exponent {
        i += 1;
        if i < n && (chars[i] == '+' || chars[i] == '-') {
            i += 1;
        }
        if i == n || !chars[i].is_ascii_digit() {
            return Err(i);
        }
        while i < n && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    if i < n && matches!(chars[i], 'f' | 'F' | 'd' | 'D' | 'l' | 'L') {
        i += 1;
    }

    Ok(i)
}

/// Tokenize a whole source, given as lines with newlines already stripped.
pub fn tokenize(lines: &[String]) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new();
    for (i, line) in lines.iter().enumerate() {
        lexer.scan_line(line, i as u32 + 1)?;
    }
    lexer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        let lines: Vec<String> = source.lines().map(String::from).collect();
        tokenize(&lines).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn splits_statement_into_tokens() {
        assert_eq!(texts("var a = 3;"), ["var", "a", "=", "3", ";"]);
    }

    #[test]
    fn maximal_munch_on_operators() {
        assert_eq!(texts("a <<= b >> c"), ["a", "<<=", "b", ">>", "c"]);
        assert_eq!(texts("x::y++"), ["x", "::", "y", "++"]);
        assert_eq!(texts("(-1)"), ["(", "-", "1", ")"]);
    }

    #[test]
    fn number_shapes() {
        assert_eq!(texts("1.5 0x1F .5e-3 2147483647l 0b101 07"),
                   ["1.5", "0x1F", ".5e-3", "2147483647l", "0b101", "07"]);
        assert_eq!(texts("0x1.8p1 1f 1e+9"), ["0x1.8p1", "1f", "1e+9"]);
    }

    #[test]
    fn dot_after_identifier_is_field_operator() {
        // "1." is a float literal; ".b" after an identifier is a field access
        assert_eq!(texts("a.b 1.x"), ["a", ".", "b", "1.", "x"]);
    }

    #[test]
    fn token_positions() {
        let lines = vec!["  var x;".to_string()];
        let tokens = tokenize(&lines).unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].col, 2);
        assert_eq!(tokens[1].col, 6);
        assert_eq!(tokens[2].col, 7);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(texts("a // rest ignored\nb"), ["a", "b"]);
        assert_eq!(texts("a /* one\ntwo\nthree */ b"), ["a", "b"]);
        assert_eq!(texts("a /* inline */ b"), ["a", "b"]);
    }

    #[test]
    fn string_and_char_literals_keep_quotes() {
        assert_eq!(texts(r#"f("hi", 'c')"#), ["f", "(", "\"hi\"", ",", "'c'", ")"]);
        assert_eq!(texts(r#" "a\"b" "#), [r#""a\"b""#]);
        assert_eq!(texts(r#" "a\\" x"#), [r#""a\\""#, "x"]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let lines = vec!["var s = \"oops".to_string()];
        let err = tokenize(&lines).unwrap_err();
        assert_eq!(err.token.text, "\"oops");
        assert_eq!(err.token.col, 8);
    }

    #[test]
    fn unclosed_block_comment_is_an_error() {
        let lines = vec!["a = 1; /* no close".to_string(), "still open".to_string()];
        let err = tokenize(&lines).unwrap_err();
        assert_eq!(err.token.text, "");
        assert_eq!(err.token.line, 2);
        assert_eq!(err.token.col, 10);
    }

    #[test]
    fn bad_radix_prefix_is_an_error() {
        let lines = vec!["var n = 0x;".to_string()];
        let err = tokenize(&lines).unwrap_err();
        assert_eq!(err.token.text, "0x");
    }

    #[test]
    fn exponent_without_digits_is_an_error() {
        let lines = vec!["var n = 1e+;".to_string()];
        let err = tokenize(&lines).unwrap_err();
        assert_eq!(err.token.text, "1e+");
    }

    #[test]
    fn retokenizing_token_texts_is_stable() {
        let source = "var a = 3; if (a <= 0x1F) { a <<= 2; } /*x*/ s.f[1]++;";
        let lines = vec![source.to_string()];
        let first: Vec<String> =
            tokenize(&lines).unwrap().into_iter().map(|t| t.text).collect();
        let rejoined = vec![first.join(" ")];
        let second: Vec<String> =
            tokenize(&rejoined).unwrap().into_iter().map(|t| t.text).collect();
        assert_eq!(first, second);
    }
}
