//! AST builders and runners shared by the integration tests. The parser is
//! an external collaborator, so programs are assembled as trees directly.

#![allow(dead_code)]

use aql_vm::ast::{Block, Expr, Program, Stmt};
use aql_vm::prelude::*;

pub fn program(stmts: Vec<Stmt>) -> Program {
    Program { stmts }
}

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block { stmts }
}

/* EXPRESSIONS */

pub fn int(i: i64) -> Expr {
    Expr::Int(i)
}

pub fn float(n: f64) -> Expr {
    Expr::Float(n)
}

pub fn string(s: &str) -> Expr {
    Expr::String(s.into())
}

pub fn boolean(b: bool) -> Expr {
    Expr::Bool(b)
}

pub fn null() -> Expr {
    Expr::Null
}

pub fn ident(name: &str) -> Expr {
    Expr::Ident(name.into())
}

pub fn prefix(op: &str, expr: Expr) -> Expr {
    Expr::Prefix {
        op: op.into(),
        expr: Box::new(expr),
    }
}

pub fn infix(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Infix {
        op: op.into(),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
    }
}

pub fn index(target: Expr, idx: Expr) -> Expr {
    Expr::Index {
        target: Box::new(target),
        index: Box::new(idx),
    }
}

pub fn array(elems: Vec<Expr>) -> Expr {
    Expr::Array { elems }
}

pub fn array_ctor(capacity: Expr, default: Option<Expr>) -> Expr {
    Expr::ArrayCtor {
        capacity: Box::new(capacity),
        default: default.map(Box::new),
    }
}

pub fn func(name: Option<&str>, params: &[&str], body: Vec<Stmt>) -> Expr {
    Expr::FuncLit {
        name: name.map(Into::into),
        params: params.iter().map(|param| (*param).into()).collect(),
        body: block(body),
    }
}

/* STATEMENTS */

pub fn let_stmt(name: &str, value: Expr) -> Stmt {
    Stmt::Let {
        name: name.into(),
        value,
    }
}

pub fn const_stmt(name: &str, value: Expr) -> Stmt {
    Stmt::Const {
        name: name.into(),
        value,
    }
}

pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        name: name.into(),
        value,
    }
}

pub fn index_assign(target: Expr, idx: Expr, value: Expr) -> Stmt {
    Stmt::IndexAssign {
        target,
        index: idx,
        value,
    }
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return { value }
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::ExprStmt { expr }
}

pub fn if_stmt(cond: Expr, then: Vec<Stmt>, alt: Option<Vec<Stmt>>) -> Stmt {
    Stmt::If {
        cond,
        then: block(then),
        elifs: vec![],
        alt: alt.map(block),
    }
}

pub fn if_elif(
    cond: Expr,
    then: Vec<Stmt>,
    elifs: Vec<(Expr, Vec<Stmt>)>,
    alt: Option<Vec<Stmt>>,
) -> Stmt {
    Stmt::If {
        cond,
        then: block(then),
        elifs: elifs
            .into_iter()
            .map(|(cond, body)| (cond, block(body)))
            .collect(),
        alt: alt.map(block),
    }
}

pub fn while_stmt(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::While {
        cond,
        body: block(body),
    }
}

pub fn for_stmt(
    init: Option<Stmt>,
    cond: Option<Expr>,
    update: Option<Stmt>,
    body: Vec<Stmt>,
) -> Stmt {
    Stmt::For {
        init: init.map(Box::new),
        cond,
        update: update.map(Box::new),
        body: block(body),
    }
}

/* RUNNERS */

/// Execute a program and hand back the interpreter with the final value.
pub fn run(stmts: Vec<Stmt>) -> (Interpreter, Value) {
    let mut vm = Interpreter::default();
    let value = vm.run(&program(stmts)).expect("program failed");

    (vm, value)
}

/// Execute a program and render its final value with the canonical
/// printer, checking that the heap drains completely afterwards.
pub fn run_display(stmts: Vec<Stmt>) -> String {
    let (mut vm, value) = run(stmts);
    let rendered = vm.render(value);

    vm.release(value);
    vm.shutdown();
    assert_eq!(vm.heap().allocated_bytes(), 0, "heap leak after shutdown");

    rendered
}

/// Execute a program expected to fail at runtime.
pub fn run_err(stmts: Vec<Stmt>) -> (Interpreter, InterpreterError) {
    let mut vm = Interpreter::default();
    let error = match vm.run(&program(stmts)) {
        Err(Error::Runtime(error)) => error,
        other => panic!("expected a runtime error, got {other:?}"),
    };

    (vm, error)
}

/// Compile a program expected to fail.
pub fn compile_err(stmts: Vec<Stmt>) -> CompileError {
    match Interpreter::default().run(&program(stmts)) {
        Err(Error::Compile(error)) => error,
        other => panic!("expected a compile error, got {other:?}"),
    }
}
