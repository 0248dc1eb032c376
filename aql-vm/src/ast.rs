//! Abstract syntax tree consumed by the compiler.
//!
//! The parser owns operator precedence and produces an already-structured
//! tree; the compiler only lowers it. Operators travel as the literal
//! source spelling so the compiler can reject unknown ones.

/// A whole program: the statement list of the implicit top-level function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements, in source order.
    pub stmts: Vec<Stmt>,
}

/// Statement nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = value;`
    Let {
        /// Binding name.
        name: String,
        /// Initializer.
        value: Expr,
    },
    /// `const name = value;` — later assignment is a compile error.
    Const {
        /// Binding name.
        name: String,
        /// Initializer.
        value: Expr,
    },
    /// `name = value;` — defines the name when it is not in scope.
    Assign {
        /// Assignment target.
        name: String,
        /// Assigned expression.
        value: Expr,
    },
    /// `target[index] = value;`
    IndexAssign {
        /// Indexed container.
        target: Expr,
        /// Index expression.
        index: Expr,
        /// Assigned expression.
        value: Expr,
    },
    /// `return;` / `return value;`
    Return {
        /// Returned expression, when present.
        value: Option<Expr>,
    },
    /// An expression evaluated for its effect; the last one of a program is
    /// the program's result.
    ExprStmt {
        /// The expression.
        expr: Expr,
    },
    /// `if` with optional `elif` chain and `else`.
    If {
        /// Condition of the `if` arm.
        cond: Expr,
        /// Consequence of the `if` arm.
        then: Block,
        /// `elif` arms, in order.
        elifs: Vec<(Expr, Block)>,
        /// `else` arm, when present.
        alt: Option<Block>,
    },
    /// `while (cond) { body }`
    While {
        /// Loop condition.
        cond: Expr,
        /// Loop body.
        body: Block,
    },
    /// C-style `for (init; cond; update) { body }`; every section optional.
    For {
        /// Initializer statement.
        init: Option<Box<Stmt>>,
        /// Loop condition.
        cond: Option<Expr>,
        /// Update statement.
        update: Option<Box<Stmt>>,
        /// Loop body.
        body: Block,
    },
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `{ stmts }`
    Block(Block),
}

/// A braced statement list. Blocks share the enclosing function's scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    /// Statements, in source order.
    pub stmts: Vec<Stmt>,
}

/// Expression nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Int(i64),
    /// Floating-point literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Boolean literal.
    Bool(bool),
    /// `null` literal.
    Null,
    /// Identifier reference.
    Ident(String),
    /// Prefix operation, e.g. `!x`, `-x`.
    Prefix {
        /// Operator spelling.
        op: String,
        /// Operand.
        expr: Box<Expr>,
    },
    /// Infix operation, e.g. `a + b`.
    Infix {
        /// Operator spelling.
        op: String,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Call expression.
    Call {
        /// Callee expression.
        callee: Box<Expr>,
        /// Arguments, in order.
        args: Vec<Expr>,
    },
    /// Indexing expression `target[index]`.
    Index {
        /// Indexed container.
        target: Box<Expr>,
        /// Index expression.
        index: Box<Expr>,
    },
    /// Array literal `[e1, e2, …]`.
    Array {
        /// Element expressions.
        elems: Vec<Expr>,
    },
    /// Array constructor `Array(n)` / `Array(n, default)`.
    ArrayCtor {
        /// Element count.
        capacity: Box<Expr>,
        /// Fill value; `nil` when absent.
        default: Option<Box<Expr>>,
    },
    /// Function literal, optionally named.
    ///
    /// A named literal additionally binds its name in the enclosing scope,
    /// which is what makes top-level recursion by name work.
    FuncLit {
        /// Function name, when present.
        name: Option<String>,
        /// Parameter names.
        params: Vec<String>,
        /// Function body.
        body: Block,
    },
}
