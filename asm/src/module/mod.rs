//! In-memory form of a binary module and its serialization.

pub mod disasm;
pub mod reader;
pub mod writer;

pub use reader::read;
pub use writer::{write, write_to};

use crate::resolver::ConstantPool;
use arch::access::AccessFlags;

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access: AccessFlags,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access: AccessFlags,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

impl MethodInfo {
    pub fn code(&self) -> Option<&Code> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Code(code) => Some(code),
            _ => None,
        })
    }
}

/// Attributes carry the pool index of their name, interned before writing.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    ConstantValue { name: u16, value: u16 },
    Code(Code),
    LineNumberTable { name: u16, lines: Vec<LineNumber> },
    LocalVariableTable { name: u16, vars: Vec<LocalVar> },
    SourceFile { name: u16, file: u16 },
    Unknown { name: u16, data: Vec<u8> },
}

impl Attribute {
    pub fn name(&self) -> u16 {
        match self {
            Attribute::ConstantValue { name, .. }
            | Attribute::LineNumberTable { name, .. }
            | Attribute::LocalVariableTable { name, .. }
            | Attribute::SourceFile { name, .. }
            | Attribute::Unknown { name, .. } => *name,
            Attribute::Code(code) => code.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub name: u16,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionEntry>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    /// 0 catches everything
    pub catch_type: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start: u16,
    pub line: u16,
}

/// One `LocalVariableTable` row; `name` and `descriptor` are Utf8 indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVar {
    pub start: u16,
    pub length: u16,
    pub name: u16,
    pub descriptor: u16,
    pub slot: u16,
}

impl Module {
    pub fn class_name(&self) -> Option<&str> {
        self.pool.class_name(self.this_class)
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| self.pool.utf8_at(f.name) == Some(name))
    }

    /// First method named `name`; pass a descriptor to pick an overload.
    pub fn method(&self, name: &str, descriptor: Option<&str>) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| {
            self.pool.utf8_at(m.name) == Some(name)
                && descriptor
                    .map(|d| self.pool.utf8_at(m.descriptor) == Some(d))
                    .unwrap_or(true)
        })
    }
}
