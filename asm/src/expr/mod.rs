//! Compile-time expression language shared by macro bodies and instruction operands.

pub mod ast;
pub mod env;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod parsercore;
pub mod token;

pub use ast::{Expr, Value, ValueType};
pub use env::Env;
pub use eval::evaluate;

use crate::error::Located;
use token::{Pos, Suffix};

/// Parse and evaluate an operand expression with no variables in scope.
pub fn eval_const(text: &str, pos: Pos) -> Result<Value, Located> {
    let expr = parser::parse(text, pos)?;
    evaluate(&expr, &mut Env::new()).map_err(|e| e.at(pos))
}

/// First width suffix (`L`, `f`, `d`) written on a literal of `text`.
pub fn literal_suffix(text: &str) -> Option<Suffix> {
    lexer::LineLexer::new(text, 1, 1)
        .parse()
        .iter()
        .find_map(|t| t.kind.suffix())
}
