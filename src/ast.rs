//! Statement and expression trees.
//!
//! Every node carries the `SourceRange` spanning the tokens that produced it,
//! inclusive on both ends; diagnostics underline these ranges. Nodes
//! synthesized by desugaring (`x++;` becomes `x = x + 1;`) reuse the range of
//! the statement they came from.

use std::rc::Rc;

use crate::token::SourceRange;
use crate::value::{BinaryOpKind, UnaryOpKind, Value};

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: SourceRange,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        if_true: Box<Stmt>,
        if_false: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
    },
    /// Case labels pair an expression with the index into `body` where its
    /// statements begin. `default_label` is one-past-the-last statement when
    /// the switch has no `default:` clause.
    Switch {
        value: Expr,
        body: Vec<Stmt>,
        case_labels: Vec<(Expr, usize)>,
        default_label: usize,
    },
    Break,
    Continue,
    Empty,
    VarDecl {
        declarations: Vec<(Declarator, Option<Expr>)>,
    },
    /// `op` is `None` for plain `=`, which stores a shallow copy; a compound
    /// operator requires the variable to already hold a value.
    Assignment {
        name: String,
        op: Option<BinaryOpKind>,
        value: Expr,
    },
    BuiltinCall {
        name: String,
        args: Vec<Expr>,
    },
    StructRef {
        ty: StructTypeRef,
        hide: bool,
        declarators: Vec<Declarator>,
    },
}

/// A declared name with zero or more dimension expressions.
#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: String,
    pub dimensions: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Enum,
    Flags,
    Union,
    Choose,
}

#[derive(Debug, Clone, Default)]
pub struct StructModifiers {
    /// Name of an array the struct iterates over (`array_value <id>`).
    pub array_value: Option<String>,
    /// Element type parsed after `enum`/`flags`.
    pub element_type: Option<Box<StructTypeRef>>,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub kind: StructKind,
    pub modifiers: StructModifiers,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// Reference to a struct type: either a fresh declaration (registered under
/// its name, if any, when first resolved) or a lookup by name that fails at
/// evaluation time if nothing declared it.
#[derive(Debug, Clone)]
pub enum StructTypeRef {
    Declaring(Rc<StructDef>),
    Resolving { name: String },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: SourceRange,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Value evaluated from the literal token at parse time.
    Literal(Value),
    VarReference {
        name: String,
    },
    Binary {
        op: BinaryOpKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },
    FieldAccess {
        receiver: Box<Expr>,
        field: String,
    },
    /// `delta` is +1 or -1. Pre yields the updated value, post yields a copy
    /// of the prior value.
    PreIncrement {
        name: String,
        delta: i32,
    },
    PostIncrement {
        name: String,
        delta: i32,
    },
    BuiltinCall {
        name: String,
        args: Vec<Expr>,
    },
}
