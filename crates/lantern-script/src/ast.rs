//! Syntax tree for lantern scripts.

use std::sync::Arc;

use smol_str::SmolStr;

/// A parsed source unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Canonical unit identity the script was parsed under.
    pub unit: SmolStr,
    /// Top-level `fn` declarations, hoisted.
    pub functions: Vec<Arc<Function>>,
    /// Module-level statements in source order.
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: SmolStr,
    pub params: Vec<SmolStr>,
    pub body: Vec<Stmt>,
    /// Line of the `fn` keyword.
    pub line: u32,
    pub unit: SmolStr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let { name: SmolStr, value: Expr },
    /// `set target = value`; target is a variable, index or field place.
    Set { target: Expr, value: Expr },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    Return(Option<Expr>),
    Print(Expr),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Var(SmolStr),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    /// `new Type { field: expr, ... }`
    New {
        type_name: SmolStr,
        fields: Vec<(SmolStr, Expr)>,
    },
    Index { target: Box<Expr>, index: Box<Expr> },
    Field { target: Box<Expr>, name: SmolStr },
    Call { name: SmolStr, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}
