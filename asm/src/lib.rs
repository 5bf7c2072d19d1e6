pub mod assembler;
pub mod config;
pub mod diag;
pub mod dump;
pub mod error;
pub mod expr;
pub mod macros;
pub mod module;
pub mod resolver;
pub mod source;

pub use assembler::{assemble_str, Assembler, Output, State};
pub use config::Config;
pub use diag::{Console, Diagnostic, DiagnosticSink, Diagnostics, Severity};
pub use error::{Error, ErrorKind, Located};
pub use module::{read, write, write_to, Module};
pub use resolver::{DescriptorProvider, MetadataTable};
pub use source::{LineSource, ReaderSource, StrSource};
