//! Compile-time macros: definitions are compiled once per unit and
//! interpreted on every invocation.

pub mod ast;
pub mod compiler;
pub mod executor;
pub mod registry;

pub use ast::MacroDef;
pub use compiler::compile;
pub use executor::{expand, Arg};
pub use registry::{MacroRegistry, MacroSource};
