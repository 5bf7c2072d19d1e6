use crate::expr::ast::{Expr, Value, ValueType};
use crate::expr::token::Pos;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Value(ValueType),
    /// Qualified type name, bound as text
    Type,
    /// Instruction text, bound as text
    Block,
}

impl ParamKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "type" => Some(ParamKind::Type),
            "block" => Some(ParamKind::Block),
            _ => s.parse::<ValueType>().ok().map(ParamKind::Value),
        }
    }

    /// Type of the variable the parameter is bound to.
    pub fn value_type(&self) -> ValueType {
        match self {
            ParamKind::Value(ty) => *ty,
            ParamKind::Type | ParamKind::Block => ValueType::Str,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Value(ty) => write!(f, "{ty}"),
            ParamKind::Type => write!(f, "type"),
            ParamKind::Block => write!(f, "block"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Var(String, ValueType, Option<Expr>),
    Expr(Expr),
    If(Expr, Vec<Stmt>, Vec<Stmt>),
    While(Expr, Vec<Stmt>),
    For {
        var: String,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    Emit(Expr),
    Error(Expr),
    Break,
    Continue,
    Exit,
}

impl StmtKind {
    /// Control never reaches the statement after this one.
    pub fn diverges(&self) -> bool {
        matches!(
            self,
            StmtKind::Break | StmtKind::Continue | StmtKind::Exit | StmtKind::Error(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

impl MacroDef {
    /// `name(a:int, b:str = "x")`, for listings and messages.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| match &p.default {
                Some(v) => format!("{}:{} = {}", p.name, p.kind, v),
                None => format!("{}:{}", p.name, p.kind),
            })
            .collect::<Vec<_>>();
        format!("{}({})", self.name, params.join(", "))
    }

    pub fn required(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}
