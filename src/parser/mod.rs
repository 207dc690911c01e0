//! Recursive-descent parser.
//!
//! One token of lookahead plus a single backtrack slot: `peek_second` peeks
//! past the next token and undoes the advance. Statement selection is by the
//! first-token keyword; otherwise the second token anchors an assignment, an
//! increment, or a builtin call, and everything else is a struct reference.
//!
//! Parse failures surface the single offending token.

mod expr;


use std::rc::Rc;

use crate::ast::{
    Declarator, Stmt, StmtKind, StructDef, StructKind, StructModifiers, StructTypeRef,
};
use crate::error::ParseError;
use crate::token::{is_valid_identifier, SourceRange, Token};
use crate::value::BinaryOpKind;

pub(crate) type ParseResult<T> = Result<T, ParseError>;

/// Parse a token stream into the top-level statement list.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Vec<Stmt>> {
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    while !parser.eof() {
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

/// `Some(None)` is plain `=`, `Some(Some(op))` a compound assignment.
fn assignment_operator(text: &str) -> Option<Option<BinaryOpKind>> {
    use BinaryOpKind::*;
    match text {
        "=" => Some(None),
        "+=" => Some(Some(Add)),
        "-=" => Some(Some(Sub)),
        "*=" => Some(Some(Mul)),
        "/=" => Some(Some(Div)),
        "%=" => Some(Some(Rem)),
        "&=" => Some(Some(BitAnd)),
        "|=" => Some(Some(BitOr)),
        "^=" => Some(Some(BitXor)),
        "<<=" => Some(Some(Shl)),
        ">>=" => Some(Some(Shr)),
        _ => None,
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    pub fn eof(&self) -> bool {
        self.current >= self.tokens.len()
    }

    /// Current token; past the end, a synthetic empty token positioned one
    /// column past the last real token.
    pub(crate) fn peek(&self) -> Token {
        if let Some(token) = self.tokens.get(self.current) {
            token.clone()
        } else {
            match self.tokens.last() {
                Some(last) => Token::new("", last.line, last.end_col()),
                None => Token::new("", 1, 0),
            }
        }
    }

    pub(crate) fn advance(&mut self) {
        self.current += 1;
    }

    fn backtrack(&mut self) {
        self.current -= 1;
    }

    /// One token past `peek`, using the backtrack slot.
    pub(crate) fn peek_second(&mut self) -> Token {
        self.advance();
        let token = self.peek();
        self.backtrack();
        token
    }

    /// Consume the current token if it matches, otherwise fail on it.
    pub(crate) fn expect(&mut self, text: &str) -> ParseResult<Token> {
        let token = self.peek();
        if token.text == text {
            self.advance();
            Ok(token)
        } else {
            Err(ParseError::at(token))
        }
    }

    fn fail<T>(&self) -> ParseResult<T> {
        Err(ParseError::at(self.peek()))
    }

    pub fn statement(&mut self) -> ParseResult<Stmt> {
        let first = self.peek();
        match first.text.as_str() {
            "{" => return self.block_statement(),
            "if" => return self.if_statement(),
            "while" => return self.while_statement(),
            "do" => return self.do_while_statement(),
            "switch" => return self.switch_statement(),
            "break" => return self.flag_statement(StmtKind::Break),
            "continue" => return self.flag_statement(StmtKind::Continue),
            ";" => return self.empty_statement(),
            "var" => return self.var_decl_statement(),
            _ => {}
        }

        let second = self.peek_second();
        if assignment_operator(&second.text).is_some() {
            self.assignment_statement()
        } else if first.text == "++"
            || first.text == "--"
            || second.text == "++"
            || second.text == "--"
        {
            self.var_incr_statement()
        } else if second.text == "(" {
            self.builtin_call_statement()
        } else {
            self.struct_ref_statement()
        }
    }

    fn block_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // {
        let mut statements = Vec::new();
        while self.peek().text != "}" {
            if self.eof() {
                return self.fail();
            }
            statements.push(self.statement()?);
        }
        let end = self.peek();
        self.advance(); // }
        Ok(Stmt { kind: StmtKind::Block(statements), range: SourceRange::new(begin, end) })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // if
        self.expect("(")?;
        let condition = self.expression()?;
        self.expect(")")?;
        let if_true = Box::new(self.statement()?);
        let mut end = if_true.range.end.clone();
        let mut if_false = None;
        if self.peek().text == "else" {
            self.advance(); // else
            let alternative = self.statement()?;
            end = alternative.range.end.clone();
            if_false = Some(Box::new(alternative));
        }
        Ok(Stmt {
            kind: StmtKind::If { condition, if_true, if_false },
            range: SourceRange::new(begin, end),
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // while
        self.expect("(")?;
        let condition = self.expression()?;
        self.expect(")")?;
        let body = Box::new(self.statement()?);
        let end = body.range.end.clone();
        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            range: SourceRange::new(begin, end),
        })
    }

    fn do_while_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // do
        let body = Box::new(self.statement()?);
        self.expect("while")?;
        self.expect("(")?;
        let condition = self.expression()?;
        self.expect(")")?;
        let end = self.expect(";")?;
        Ok(Stmt {
            kind: StmtKind::DoWhile { body, condition },
            range: SourceRange::new(begin, end),
        })
    }

    fn switch_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // switch
        self.expect("(")?;
        let value = self.expression()?;
        self.expect(")")?;
        self.expect("{")?;

        let mut body = Vec::new();
        let mut case_labels = Vec::new();
        let mut default_label = None;
        while self.peek().text != "}" {
            if self.eof() {
                return self.fail();
            }
            match self.peek().text.as_str() {
                "case" => {
                    self.advance(); // case
                    case_labels.push((self.expression()?, body.len()));
                    self.expect(":")?;
                }
                "default" => {
                    if default_label.is_some() {
                        return self.fail();
                    }
                    self.advance(); // default
                    self.expect(":")?;
                    default_label = Some(body.len());
                }
                _ => body.push(self.statement()?),
            }
        }
        let end = self.peek();
        self.advance(); // }

        let default_label = default_label.unwrap_or(body.len());
        Ok(Stmt {
            kind: StmtKind::Switch { value, body, case_labels, default_label },
            range: SourceRange::new(begin, end),
        })
    }

    fn flag_statement(&mut self, kind: StmtKind) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // break / continue
        let end = self.expect(";")?;
        Ok(Stmt { kind, range: SourceRange::new(begin, end) })
    }

    fn empty_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.peek();
        self.advance(); // ;
        Ok(Stmt { kind: StmtKind::Empty, range: SourceRange::at(token) })
    }

    fn var_decl_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        self.advance(); // var
        let mut declarations = Vec::new();
        loop {
            let declarator = self.var_decl()?;
            let mut initializer = None;
            if declarator.dimensions.is_empty() && self.peek().text == "=" {
                self.advance(); // =
                initializer = Some(self.expression()?);
            }
            declarations.push((declarator, initializer));
            if self.peek().text == ";" {
                break;
            }
            self.expect(",")?;
        }
        let end = self.peek();
        self.advance(); // ;
        Ok(Stmt {
            kind: StmtKind::VarDecl { declarations },
            range: SourceRange::new(begin, end),
        })
    }

    fn assignment_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        let name = begin.text.clone();
        self.advance(); // name
        let op_token = self.peek();
        let op = assignment_operator(&op_token.text).ok_or(ParseError::at(op_token))?;
        self.advance(); // operator
        let value = self.expression()?;
        let end = self.expect(";")?;
        Ok(Stmt {
            kind: StmtKind::Assignment { name, op, value },
            range: SourceRange::new(begin, end),
        })
    }

    /// `i++;` and `--i;` desugar to `i = i + 1;` / `i = i - 1;` over the
    /// statement's whole source range.
    fn var_incr_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        let (op_text, name) = if begin.text == "++" || begin.text == "--" {
            self.advance(); // op
            let var = self.peek();
            if !is_valid_identifier(&var.text) {
                return Err(ParseError::at(var));
            }
            self.advance(); // name
            (begin.text.clone(), var.text)
        } else {
            if !is_valid_identifier(&begin.text) {
                return Err(ParseError::at(begin));
            }
            self.advance(); // name
            let op = self.peek();
            self.advance(); // op
            (op.text, begin.text.clone())
        };
        let end = self.expect(";")?;

        let range = SourceRange::new(begin, end);
        let op = if op_text == "++" { BinaryOpKind::Add } else { BinaryOpKind::Sub };
        let value = expr::increment_desugar(&name, op, &range);
        Ok(Stmt {
            kind: StmtKind::Assignment { name, op: None, value },
            range,
        })
    }

    fn builtin_call_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        let name = begin.text.clone();
        if !is_valid_identifier(&name) {
            return Err(ParseError::at(begin));
        }
        self.advance(); // name
        self.advance(); // (
        let args = self.call_arguments()?;
        self.advance(); // )
        let end = self.expect(";")?;
        Ok(Stmt {
            kind: StmtKind::BuiltinCall { name, args },
            range: SourceRange::new(begin, end),
        })
    }

    /// Comma-separated arguments up to a closing `)`; the caller consumes the
    /// parenthesis (its token may be a node's end token).
    pub(crate) fn call_arguments(&mut self) -> ParseResult<Vec<crate::ast::Expr>> {
        let mut args = Vec::new();
        if self.peek().text != ")" {
            loop {
                args.push(self.expression()?);
                if self.peek().text == ")" {
                    break;
                }
                self.expect(",")?;
            }
        }
        Ok(args)
    }

    fn struct_ref_statement(&mut self) -> ParseResult<Stmt> {
        let begin = self.peek();
        let ty = self.struct_ref()?;
        let mut hide = false;
        while self.peek().text == "hide" {
            if hide {
                return self.fail();
            }
            self.advance(); // hide
            hide = true;
        }
        let mut declarators = Vec::new();
        while self.peek().text != ";" {
            if self.eof() {
                return self.fail();
            }
            declarators.push(self.var_decl()?);
            if self.peek().text == ";" {
                break;
            }
            self.expect(",")?;
        }
        let end = self.peek();
        self.advance(); // ;
        Ok(Stmt {
            kind: StmtKind::StructRef { ty, hide, declarators },
            range: SourceRange::new(begin, end),
        })
    }

    fn var_decl(&mut self) -> ParseResult<Declarator> {
        let name = self.peek();
        if !is_valid_identifier(&name.text) {
            return Err(ParseError::at(name));
        }
        self.advance(); // name
        let mut dimensions = Vec::new();
        while self.peek().text == "[" {
            self.advance(); // [
            dimensions.push(self.expression()?);
            self.expect("]")?;
        }
        Ok(Declarator { name: name.text, dimensions })
    }

    fn struct_ref(&mut self) -> ParseResult<StructTypeRef> {
        let mut modifiers = StructModifiers::default();
        let mut is_decl = false;
        while self.peek().text == "array_value" {
            if modifiers.array_value.is_some() {
                return self.fail();
            }
            self.advance(); // array_value
            let id = self.peek();
            if !is_valid_identifier(&id.text) {
                return Err(ParseError::at(id));
            }
            self.advance(); // id
            modifiers.array_value = Some(id.text);
            is_decl = true;
        }

        let kind = match self.peek().text.as_str() {
            "struct" => {
                self.advance();
                Some(StructKind::Struct)
            }
            "enum" => {
                self.advance();
                modifiers.element_type = Some(Box::new(self.struct_ref()?));
                Some(StructKind::Enum)
            }
            "flags" => {
                self.advance();
                modifiers.element_type = Some(Box::new(self.struct_ref()?));
                Some(StructKind::Flags)
            }
            "union" => {
                self.advance();
                Some(StructKind::Union)
            }
            "choose" => {
                self.advance();
                Some(StructKind::Choose)
            }
            _ => None,
        };

        let kind = match kind {
            Some(kind) => kind,
            None if is_decl => return self.fail(),
            None => {
                let name = self.peek();
                if !is_valid_identifier(&name.text) {
                    return Err(ParseError::at(name));
                }
                self.advance(); // name
                return Ok(StructTypeRef::Resolving { name: name.text });
            }
        };

        let mut name = None;
        if self.peek().text != "{" {
            let token = self.peek();
            if !is_valid_identifier(&token.text) {
                return Err(ParseError::at(token));
            }
            self.advance(); // name
            name = Some(token.text);
        }
        self.expect("{")?;
        let mut body = Vec::new();
        while self.peek().text != "}" {
            if self.eof() {
                return self.fail();
            }
            body.push(self.statement()?);
        }
        self.advance(); // }

        Ok(StructTypeRef::Declaring(Rc::new(StructDef { kind, modifiers, name, body })))
    }
}
