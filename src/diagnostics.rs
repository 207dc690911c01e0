//! Source-range rendering for diagnostics.
//!
//! The rendering format is stable. A single-line range prints the source line
//! and a caret underline:
//!
//! ```text
//! var w = z;
//!         ^
//! ```
//!
//! A multi-line range prints the first line with carets to its end, an
//! `... N line(s) omitted` marker when lines are skipped, and the last line
//! with carets up to the range's end column. Evaluation traces add one
//! `  at :<line>:<col>` header per enclosing statement, its range rendering
//! indented by four spaces.

use crate::interpreter::EvalTrace;
use crate::token::{SourceRange, Token};

/// The original source lines, for quoting in diagnostics.
pub struct SourceBuffer {
    lines: Vec<String>,
}

impl SourceBuffer {
    pub fn from_source(source: &str) -> Self {
        SourceBuffer { lines: source.lines().map(String::from).collect() }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        SourceBuffer { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 1-based line access; out-of-range lines render empty.
    pub fn line(&self, lineno: u32) -> &str {
        self.lines.get(lineno.saturating_sub(1) as usize).map(String::as_str).unwrap_or("")
    }
}

fn caret_line(col: u32, width: usize) -> String {
    format!("{}{}", " ".repeat(col as usize), "^".repeat(width.max(1)))
}

/// Underline for a single token.
pub fn underline(token: &Token) -> String {
    caret_line(token.col, token.text.len())
}

/// Render a node's source range, each output line prefixed with `padding`.
pub fn render_range(buffer: &SourceBuffer, range: &SourceRange, padding: &str) -> String {
    let begin = &range.begin;
    let end = &range.end;
    let mut out = String::new();

    if begin.line == end.line {
        let width = end.end_col().saturating_sub(begin.col) as usize;
        out.push_str(&format!("{}{}\n", padding, buffer.line(begin.line)));
        out.push_str(&format!("{}{}\n", padding, caret_line(begin.col, width)));
    } else {
        let first = buffer.line(begin.line);
        let width = first.len().saturating_sub(begin.col as usize);
        out.push_str(&format!("{}{}\n", padding, first));
        out.push_str(&format!("{}{}\n", padding, caret_line(begin.col, width)));
        if end.line > begin.line + 1 {
            let omitted = end.line - begin.line - 1;
            let noun = if omitted == 1 { "line" } else { "lines" };
            out.push_str(&format!("{}... {} {} omitted\n", padding, omitted, noun));
        }
        out.push_str(&format!("{}{}\n", padding, buffer.line(end.line)));
        out.push_str(&format!("{}{}\n", padding, caret_line(0, end.end_col() as usize)));
    }
    out
}

/// Render a tokenizer or parser failure: the offending line, an underline,
/// and the error's own message.
pub fn render_token_error(buffer: &SourceBuffer, token: &Token, message: &str) -> String {
    format!("{}\n{}\n{}\n", buffer.line(token.line), underline(token), message)
}

/// Render an evaluation failure with its trace: the failing node (the
/// innermost expression if any, otherwise the innermost statement), then each
/// enclosing statement. When the failing node is itself the innermost
/// statement it is not repeated in the trace.
pub fn render_eval_trace(buffer: &SourceBuffer, trace: &EvalTrace) -> String {
    let failing = match trace.expressions.last().or_else(|| trace.statements.last()) {
        Some(range) => range,
        None => return format!("{}\n", trace.error),
    };

    let mut out = String::new();
    out.push_str(&format!(
        ":{}:{}: {}\n",
        failing.begin.line, failing.begin.col, trace.error
    ));
    out.push_str(&render_range(buffer, failing, ""));

    let mut enclosing = trace.statements.iter().rev();
    if trace.expressions.is_empty() {
        enclosing.next();
    }
    for range in enclosing {
        out.push_str(&format!("  at :{}:{}\n", range.begin.line, range.begin.col));
        out.push_str(&render_range(buffer, range, "    "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;

    fn range(
        begin: (&str, u32, u32),
        end: (&str, u32, u32),
    ) -> SourceRange {
        SourceRange::new(
            Token::new(begin.0, begin.1, begin.2),
            Token::new(end.0, end.1, end.2),
        )
    }

    #[test]
    fn single_line_underline_covers_node() {
        let buffer = SourceBuffer::from_source("var w = z;");
        let rendered = render_range(&buffer, &range(("var", 1, 0), (";", 1, 9)), "");
        assert_eq!(rendered, "var w = z;\n^^^^^^^^^^\n");
    }

    #[test]
    fn empty_token_still_gets_one_caret() {
        let _buffer = SourceBuffer::from_source("var a = 1");
        assert_eq!(underline(&Token::new("", 1, 9)), "         ^");
    }

    #[test]
    fn adjacent_lines_have_no_omitted_marker() {
        let buffer = SourceBuffer::from_source("while (1) {\n}");
        let rendered = render_range(&buffer, &range(("while", 1, 0), ("}", 2, 0)), "");
        assert_eq!(rendered, "while (1) {\n^^^^^^^^^^^\n}\n^\n");
    }

    #[test]
    fn omitted_marker_counts_lines_between() {
        let buffer =
            SourceBuffer::from_source("while (1) {\n  a = 1;\n  b = 2;\n}");
        let rendered = render_range(&buffer, &range(("while", 1, 0), ("}", 4, 0)), "  ");
        assert_eq!(
            rendered,
            "  while (1) {\n  ^^^^^^^^^^^\n  ... 2 lines omitted\n  }\n  ^\n"
        );

        let buffer = SourceBuffer::from_source("do {\n  ;\n} while (1);");
        let rendered = render_range(&buffer, &range(("do", 1, 0), (";", 3, 11)), "");
        assert!(rendered.contains("... 1 line omitted\n"));
    }

    #[test]
    fn eval_trace_renders_failing_expression_then_enclosing_statements() {
        let buffer = SourceBuffer::from_source("{ var w = z; }");
        let trace = EvalTrace {
            error: EvalError::UndefinedVariable { name: "z".into() },
            statements: vec![
                range(("{", 1, 0), ("}", 1, 13)),
                range(("var", 1, 2), (";", 1, 11)),
            ],
            expressions: vec![range(("z", 1, 10), ("z", 1, 10))],
        };
        let rendered = render_eval_trace(&buffer, &trace);
        let expected = "\
:1:10: Reference to undefined variable z\n\
{ var w = z; }\n\
          ^\n\
  at :1:2\n\
    { var w = z; }\n\
      ^^^^^^^^^^\n\
  at :1:0\n\
    { var w = z; }\n\
    ^^^^^^^^^^^^^^\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn statement_failure_is_not_repeated_in_trace() {
        let buffer = SourceBuffer::from_source("break;");
        let trace = EvalTrace {
            error: EvalError::UnhandledBreak,
            statements: vec![range(("break", 1, 0), (";", 1, 5))],
            expressions: vec![],
        };
        let rendered = render_eval_trace(&buffer, &trace);
        assert_eq!(rendered, ":1:0: break statement not handled\nbreak;\n^^^^^^\n");
    }
}
