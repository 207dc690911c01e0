//! Tree-walking evaluator.
//!
//! The interpreter context holds a stack of frames, each with local variables
//! and an optional current struct. Variable lookup walks frames from the
//! innermost outward, consulting a frame's current-struct fields before its
//! locals. Executing a struct body pushes a frame whose current struct is the
//! record being populated; the root frame's current struct accumulates
//! top-level declarations.
//!
//! Diagnostics ride on two range stacks. Every statement pushes its source
//! range before executing and pops it on a clean exit; a statement that
//! observes a break/continue flag stays pinned until the enclosing loop
//! handles the flag and pops the pinned slice. On failure nothing is popped,
//! so the error carries the full chain of enclosing statements and the
//! expression under evaluation.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, ExprKind, Stmt, StmtKind, StructDef, StructTypeRef};
use crate::builtins::Builtins;
use crate::error::{EvalError, EvalResult};
use crate::token::SourceRange;
use crate::value::{self, BinaryOpKind, SharedStruct, Value};

/// An evaluation failure together with the pinned diagnostic stacks: the
/// source ranges of every enclosing statement and of the expressions under
/// evaluation, innermost last.
#[derive(Debug)]
pub struct EvalTrace {
    pub error: EvalError,
    pub statements: Vec<SourceRange>,
    pub expressions: Vec<SourceRange>,
}

struct StackFrame {
    /// A key mapped to `None` is declared but uninitialized.
    vars: HashMap<String, Option<Value>>,
    current_struct: Option<SharedStruct>,
}

impl StackFrame {
    fn new(current_struct: Option<SharedStruct>) -> Self {
        StackFrame { vars: HashMap::new(), current_struct }
    }
}

pub struct InterpreterContext<'b> {
    root: SharedStruct,
    frames: Vec<StackFrame>,
    struct_types: HashMap<String, Rc<StructDef>>,
    broken: bool,
    continued: bool,
    executing_statements: Vec<SourceRange>,
    evaluating_expressions: Vec<SourceRange>,
    pending_pops: usize,
    builtins: &'b Builtins,
}

/// Run a program against a fresh context. On success the root struct holds
/// everything the program declared; on failure the trace carries the error
/// and both pinned stacks for rendering.
pub fn execute(statements: &[Stmt], builtins: &Builtins) -> Result<SharedStruct, Box<EvalTrace>> {
    let mut context = InterpreterContext::new(builtins);
    match context.run(statements) {
        Ok(()) => Ok(context.root_struct()),
        Err(error) => Err(Box::new(EvalTrace {
            error,
            statements: context.executing_statements,
            expressions: context.evaluating_expressions,
        })),
    }
}

impl<'b> InterpreterContext<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        let root = Value::new_struct();
        let mut context = InterpreterContext {
            root: root.clone(),
            frames: vec![StackFrame::new(Some(root))],
            struct_types: HashMap::new(),
            broken: false,
            continued: false,
            executing_statements: Vec::new(),
            evaluating_expressions: Vec::new(),
            pending_pops: 0,
            builtins,
        };
        context.predeclare("std::little_endian", Value::Int32(0));
        context.predeclare("std::big_endian", Value::Int32(1));
        context
    }

    pub fn root_struct(&self) -> SharedStruct {
        self.root.clone()
    }

    pub fn run(&mut self, statements: &[Stmt]) -> EvalResult<()> {
        for statement in statements {
            self.execute_statement(statement)?;
            if self.broken {
                return Err(EvalError::UnhandledBreak);
            }
            if self.continued {
                return Err(EvalError::UnhandledContinue);
            }
        }
        Ok(())
    }

    /// Number of live frames; exactly 1 after a successful run.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Depths of the statement and expression trace stacks.
    pub fn trace_depth(&self) -> (usize, usize) {
        (self.executing_statements.len(), self.evaluating_expressions.len())
    }

    fn predeclare(&mut self, name: &str, value: Value) {
        self.top_frame().vars.insert(name.to_string(), Some(value));
    }

    fn top_frame(&mut self) -> &mut StackFrame {
        self.frames.last_mut().expect("interpreter always holds the root frame")
    }

    fn push_frame(&mut self, current_struct: Option<SharedStruct>) {
        self.frames.push(StackFrame::new(current_struct));
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn execute_statement(&mut self, statement: &Stmt) -> EvalResult<()> {
        self.executing_statements.push(statement.range.clone());
        self.dispatch_statement(statement)?; // on failure the range stays pinned
        if self.broken || self.continued {
            self.pending_pops += 1;
        } else {
            self.executing_statements.pop();
        }
        Ok(())
    }

    fn dispatch_statement(&mut self, statement: &Stmt) -> EvalResult<()> {
        match &statement.kind {
            StmtKind::Block(body) => {
                self.push_frame(None);
                let result = self.execute_block(body);
                self.pop_frame();
                result
            }
            StmtKind::If { condition, if_true, if_false } => {
                if self.evaluate_expression(condition)?.truthy()? {
                    self.execute_statement(if_true)
                } else if let Some(alternative) = if_false {
                    self.execute_statement(alternative)
                } else {
                    Ok(())
                }
            }
            StmtKind::While { condition, body } => {
                while self.evaluate_expression(condition)?.truthy()? {
                    self.execute_statement(body)?;
                    if self.broken {
                        self.handle_break();
                        break;
                    }
                    if self.continued {
                        self.handle_continue();
                    }
                }
                Ok(())
            }
            StmtKind::DoWhile { body, condition } => {
                loop {
                    self.execute_statement(body)?;
                    if self.broken {
                        self.handle_break();
                        break;
                    }
                    if self.continued {
                        self.handle_continue();
                    }
                    if !self.evaluate_expression(condition)?.truthy()? {
                        break;
                    }
                }
                Ok(())
            }
            StmtKind::Switch { value, body, case_labels, default_label } => {
                let scrutinee = self.evaluate_expression(value)?;
                let mut target = *default_label;
                for (case_expr, index) in case_labels {
                    let case_value = self.evaluate_expression(case_expr)?;
                    if scrutinee.matches_case(&case_value) {
                        target = *index;
                        break;
                    }
                }
                self.push_frame(None);
                let result = self.execute_switch_body(&body[target.min(body.len())..]);
                self.pop_frame();
                result
            }
            StmtKind::Break => {
                self.broken = true;
                Ok(())
            }
            StmtKind::Continue => {
                self.continued = true;
                Ok(())
            }
            StmtKind::Empty => Ok(()),
            StmtKind::VarDecl { declarations } => {
                for (declarator, initializer) in declarations {
                    // declare first: the initializer sees the (uninitialized)
                    // entry, so `var a = a;` fails rather than capturing an
                    // outer `a`
                    self.declare_variable(&declarator.name)?;
                    let value = if !declarator.dimensions.is_empty() {
                        let size = self.array_dimension(&declarator.dimensions[0])?;
                        Some(Value::new_array(size))
                    } else if let Some(initializer) = initializer {
                        Some(self.evaluate_expression(initializer)?)
                    } else {
                        None
                    };
                    if let Some(value) = value {
                        self.bind_declared(&declarator.name, value);
                    }
                }
                Ok(())
            }
            StmtKind::Assignment { name, op, value } => match op {
                None => {
                    self.ensure_declared(name)?;
                    let value = self.evaluate_expression(value)?;
                    self.assign_variable(name, value)
                }
                Some(op) => {
                    let current = self.lookup_variable(name)?;
                    let rhs = self.evaluate_expression(value)?;
                    let result = value::apply_binary(*op, &current, &rhs)?;
                    self.assign_variable(name, result)
                }
            },
            StmtKind::BuiltinCall { name, args } => {
                let values = self.evaluate_arguments(args)?;
                self.builtins.execute(name, &values)
            }
            StmtKind::StructRef { ty, hide, declarators } => {
                let def = self.resolve_struct_ref(ty)?;
                for declarator in declarators {
                    let value = if declarator.dimensions.is_empty() {
                        Value::Struct(self.build_struct(&def, &declarator.name, *hide)?)
                    } else {
                        let mut dims = Vec::with_capacity(declarator.dimensions.len());
                        for dimension in &declarator.dimensions {
                            dims.push(self.array_dimension(dimension)?);
                        }
                        self.build_struct_array(
                            &def,
                            &declarator.name,
                            *hide,
                            &dims,
                            &mut Vec::new(),
                        )?
                    };
                    self.define_struct_field(&declarator.name, value)?;
                }
                Ok(())
            }
        }
    }

    fn execute_block(&mut self, body: &[Stmt]) -> EvalResult<()> {
        for statement in body {
            self.execute_statement(statement)?;
            if self.broken || self.continued {
                break;
            }
        }
        Ok(())
    }

    /// Like a block, except `continue` exits without being handled here: the
    /// flag propagates to the enclosing loop.
    fn execute_switch_body(&mut self, body: &[Stmt]) -> EvalResult<()> {
        for statement in body {
            self.execute_statement(statement)?;
            if self.broken {
                self.handle_break();
                break;
            }
            if self.continued {
                break;
            }
        }
        Ok(())
    }

    fn handle_break(&mut self) {
        self.broken = false;
        self.drain_pinned();
    }

    fn handle_continue(&mut self) {
        self.continued = false;
        self.drain_pinned();
    }

    fn drain_pinned(&mut self) {
        for _ in 0..self.pending_pops {
            self.executing_statements.pop();
        }
        self.pending_pops = 0;
    }

    pub fn evaluate_expression(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.evaluating_expressions.push(expr.range.clone());
        let value = self.dispatch_expression(expr)?; // on failure the range stays pinned
        self.evaluating_expressions.pop();
        Ok(value)
    }

    fn dispatch_expression(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::VarReference { name } => self.lookup_variable(name),
            ExprKind::Binary { op, left, right } => {
                let lhs = self.evaluate_expression(left)?;
                match op {
                    BinaryOpKind::LogicalAnd => {
                        if !lhs.truthy()? {
                            return Ok(Value::Bool(false));
                        }
                        Ok(Value::Bool(self.evaluate_expression(right)?.truthy()?))
                    }
                    BinaryOpKind::LogicalOr => {
                        if lhs.truthy()? {
                            return Ok(Value::Bool(true));
                        }
                        Ok(Value::Bool(self.evaluate_expression(right)?.truthy()?))
                    }
                    _ => {
                        let rhs = self.evaluate_expression(right)?;
                        value::apply_binary(*op, &lhs, &rhs)
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.evaluate_expression(operand)?;
                value::apply_unary(*op, &operand)
            }
            ExprKind::FieldAccess { receiver, field } => {
                let owner = self.evaluate_expression(receiver)?;
                match owner {
                    Value::Struct(fields) => {
                        let fields = fields.borrow();
                        fields
                            .get(field)
                            .cloned()
                            .ok_or_else(|| EvalError::MissingField { name: field.clone() })
                    }
                    _ => Err(EvalError::FieldOnNonStruct),
                }
            }
            ExprKind::PreIncrement { name, delta } => {
                let current = self.lookup_variable(name)?;
                let updated =
                    value::apply_binary(BinaryOpKind::Add, &current, &Value::Int32(*delta))?;
                self.assign_variable(name, updated.clone())?;
                Ok(updated)
            }
            ExprKind::PostIncrement { name, delta } => {
                let current = self.lookup_variable(name)?;
                let updated =
                    value::apply_binary(BinaryOpKind::Add, &current, &Value::Int32(*delta))?;
                self.assign_variable(name, updated)?;
                Ok(current)
            }
            ExprKind::BuiltinCall { name, args } => {
                let values = self.evaluate_arguments(args)?;
                self.builtins.evaluate(name, &values)
            }
        }
    }

    fn evaluate_arguments(&mut self, args: &[Expr]) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.evaluate_expression(arg)).collect()
    }

    fn declare_variable(&mut self, name: &str) -> EvalResult<()> {
        let frame = self.top_frame();
        if frame.vars.contains_key(name) {
            return Err(EvalError::Redeclaration { name: name.to_string() });
        }
        frame.vars.insert(name.to_string(), None);
        Ok(())
    }

    /// An initialized declaration binds in the frame's current struct when
    /// one is present (so top-level and struct-body declarations become
    /// fields of the record), otherwise in the frame's locals.
    fn bind_declared(&mut self, name: &str, value: Value) {
        let frame = self.top_frame();
        match &frame.current_struct {
            Some(fields) => fields.borrow_mut().set(name, value),
            None => {
                frame.vars.insert(name.to_string(), Some(value));
            }
        }
    }

    /// Innermost-out search: a frame's current-struct fields shadow its
    /// locals, an inner frame shadows an outer one.
    fn lookup_variable(&self, name: &str) -> EvalResult<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(fields) = &frame.current_struct {
                if let Some(value) = fields.borrow().get(name) {
                    return Ok(value.clone());
                }
            }
            if let Some(entry) = frame.vars.get(name) {
                return entry
                    .clone()
                    .ok_or_else(|| EvalError::UndefinedVariable { name: name.to_string() });
            }
        }
        Err(EvalError::UndefinedVariable { name: name.to_string() })
    }

    /// A declared-but-uninitialized entry is enough for plain assignment.
    fn ensure_declared(&self, name: &str) -> EvalResult<()> {
        for frame in self.frames.iter().rev() {
            if let Some(fields) = &frame.current_struct {
                if fields.borrow().contains(name) {
                    return Ok(());
                }
            }
            if frame.vars.contains_key(name) {
                return Ok(());
            }
        }
        Err(EvalError::UndefinedVariable { name: name.to_string() })
    }

    fn assign_variable(&mut self, name: &str, value: Value) -> EvalResult<()> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(fields) = &frame.current_struct {
                if fields.borrow().contains(name) {
                    fields.borrow_mut().set(name, value);
                    return Ok(());
                }
            }
            if let Some(entry) = frame.vars.get_mut(name) {
                *entry = Some(value);
                return Ok(());
            }
        }
        Err(EvalError::UndefinedVariable { name: name.to_string() })
    }

    /// Evaluate an array dimension: a non-negative `int` below the maximum.
    fn array_dimension(&mut self, expr: &Expr) -> EvalResult<usize> {
        match self.evaluate_expression(expr)? {
            Value::Int32(n) => {
                if n < 0 {
                    Err(EvalError::NegativeArraySize)
                } else if n == i32::MAX {
                    Err(EvalError::ArraySizeTooLarge)
                } else {
                    Ok(n as usize)
                }
            }
            _ => Err(EvalError::DimensionNotInteger),
        }
    }

    /// A declaring reference registers its name on first resolution; later
    /// registrations under a taken name are ignored, so lookups always return
    /// the first definition.
    fn resolve_struct_ref(&mut self, ty: &StructTypeRef) -> EvalResult<Rc<StructDef>> {
        match ty {
            StructTypeRef::Declaring(def) => {
                if let Some(name) = &def.name {
                    self.struct_types.entry(name.clone()).or_insert_with(|| def.clone());
                }
                Ok(def.clone())
            }
            StructTypeRef::Resolving { name } => self
                .struct_types
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownStructType { name: name.clone() }),
        }
    }

    /// Hook for an external binary reader: called when a struct reference
    /// opens a record. The core only creates the empty value; a reader would
    /// bind stream positions and honor `hide` here.
    pub fn begin_struct_ref(&mut self, _name: &str, _hide: bool) -> SharedStruct {
        Value::new_struct()
    }

    /// Hook paired with [`Self::begin_struct_ref`].
    pub fn end_struct_ref(&mut self) {}

    fn build_struct(&mut self, def: &StructDef, name: &str, hide: bool) -> EvalResult<SharedStruct> {
        let value = self.begin_struct_ref(name, hide);
        let result = self.execute_struct(def, value.clone());
        self.end_struct_ref();
        result.map(|()| value)
    }

    /// Execute a struct body against the record receiving its declarations.
    pub fn execute_struct(&mut self, def: &StructDef, value: SharedStruct) -> EvalResult<()> {
        self.push_frame(Some(value));
        let result = self.execute_block(&def.body);
        self.pop_frame();
        result
    }

    /// Build the (possibly multidimensional) array of records for a
    /// dimensioned struct-ref declarator; leaves are named `name[i0][i1]…`.
    fn build_struct_array(
        &mut self,
        def: &StructDef,
        name: &str,
        hide: bool,
        dims: &[usize],
        indices: &mut Vec<usize>,
    ) -> EvalResult<Value> {
        let Some((&len, rest)) = dims.split_first() else {
            let mut element_name = name.to_string();
            for index in indices.iter() {
                element_name.push_str(&format!("[{}]", index));
            }
            return Ok(Value::Struct(self.build_struct(def, &element_name, hide)?));
        };

        let array = Value::new_array(len);
        if let Value::Array(cells) = &array {
            for index in 0..len {
                indices.push(index);
                let element = self.build_struct_array(def, name, hide, rest, indices)?;
                indices.pop();
                cells.borrow_mut()[index] = Some(element);
            }
        }
        Ok(array)
    }

    /// Bind a finished struct (or struct array) in the nearest enclosing
    /// current struct.
    fn define_struct_field(&mut self, name: &str, value: Value) -> EvalResult<()> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(fields) = &frame.current_struct {
                if fields.borrow().contains(name) {
                    return Err(EvalError::StructRefRedeclaration { name: name.to_string() });
                }
                fields.borrow_mut().insert(name.to_string(), value);
                return Ok(());
            }
        }
        Err(EvalError::StructRefOutsideStruct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn program(source: &str) -> Vec<Stmt> {
        let lines: Vec<String> = source.lines().map(String::from).collect();
        parse(tokenize(&lines).expect("tokenize")).expect("parse")
    }

    fn run_program(source: &str) -> SharedStruct {
        let builtins = Builtins::new();
        execute(&program(source), &builtins).expect("execute")
    }

    fn fail_program(source: &str) -> Box<EvalTrace> {
        let builtins = Builtins::new();
        execute(&program(source), &builtins).expect_err("expected evaluation failure")
    }

    fn field(root: &SharedStruct, name: &str) -> Value {
        root.borrow().get(name).cloned().unwrap_or_else(|| panic!("missing field {}", name))
    }

    #[test]
    fn block_scoping_shadows_and_expires() {
        let root = run_program("var a = 3; var b = a + 2; { var a = 7; b = b + a; }");
        assert!(matches!(field(&root, "a"), Value::Int32(3)));
        assert!(matches!(field(&root, "b"), Value::Int32(12)));

        let trace = fail_program("var a = 1; { var c = 2; } var d = c;");
        assert_eq!(trace.error, EvalError::UndefinedVariable { name: "c".into() });
    }

    #[test]
    fn struct_ref_populates_root() {
        let root = run_program("struct Pair { var first = 9; var second = first + 1; } p;");
        match field(&root, "p") {
            Value::Struct(fields) => {
                assert!(matches!(fields.borrow().get("first"), Some(Value::Int32(9))));
                assert!(matches!(fields.borrow().get("second"), Some(Value::Int32(10))));
            }
            other => panic!("expected struct, got {}", other),
        }
    }

    #[test]
    fn struct_ref_arrays_name_their_leaves() {
        let root = run_program("struct Cell { } grid[2][2];");
        match field(&root, "grid") {
            Value::Array(cells) => {
                let cells = cells.borrow();
                assert_eq!(cells.len(), 2);
                match &cells[0] {
                    Some(Value::Array(inner)) => assert_eq!(inner.borrow().len(), 2),
                    other => panic!("expected nested array, got {:?}", other),
                }
            }
            other => panic!("expected array, got {}", other),
        }
    }

    #[test]
    fn struct_type_registry_resolves_later_references() {
        let root = run_program("struct Header { };\nHeader h;");
        assert!(matches!(field(&root, "h"), Value::Struct(_)));
    }

    #[test]
    fn unknown_struct_type_fails() {
        let trace = fail_program("Mystery m;");
        assert_eq!(trace.error, EvalError::UnknownStructType { name: "Mystery".into() });
    }

    #[test]
    fn duplicate_field_fails() {
        let trace = fail_program("struct S { } x;\nstruct T { } x;");
        assert_eq!(trace.error, EvalError::StructRefRedeclaration { name: "x".into() });
    }

    #[test]
    fn predeclared_endianness_variables() {
        let builtins = Builtins::new();
        let context = InterpreterContext::new(&builtins);
        assert!(matches!(
            context.lookup_variable("std::little_endian"),
            Ok(Value::Int32(0))
        ));
        assert!(matches!(context.lookup_variable("std::big_endian"), Ok(Value::Int32(1))));
    }

    #[test]
    fn frames_and_traces_balance_after_success() {
        let builtins = Builtins::new();
        let mut context = InterpreterContext::new(&builtins);
        let stmts = program("var i = 0; while (i < 3) { i++; if (i == 1) continue; }");
        context.run(&stmts).unwrap();
        assert_eq!(context.frame_count(), 1);
        assert_eq!(context.trace_depth(), (0, 0));
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let trace = fail_program("break;");
        assert_eq!(trace.error, EvalError::UnhandledBreak);
        assert_eq!(trace.statements.len(), 1);
    }

    #[test]
    fn continue_in_switch_reaches_enclosing_loop() {
        let root = run_program(
            "var n = 0; var i = 0;\n\
             while (i < 4) { i++; switch (i) { case 2: continue; } n = n + 1; }",
        );
        assert!(matches!(field(&root, "n"), Value::Int32(3)));
        assert!(matches!(field(&root, "i"), Value::Int32(4)));
    }

    #[test]
    fn error_trace_pins_statement_chain() {
        let trace = fail_program("{ var w = z; }");
        assert_eq!(trace.error, EvalError::UndefinedVariable { name: "z".into() });
        assert_eq!(trace.statements.len(), 2); // block, then declaration
        assert_eq!(trace.expressions.len(), 1); // the variable reference
        assert_eq!(trace.expressions[0].begin.text, "z");
    }
}
