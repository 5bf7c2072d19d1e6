use super::{Attribute, Code, ExceptionEntry, FieldInfo, MethodInfo, Module};
use crate::resolver::{Constant, ConstantPool};
use arch::cp::MAGIC;
use std::io::Write;

/// Serialize a module. All multi-byte values are big-endian.
pub fn write(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    put_u4(&mut out, MAGIC);
    put_u2(&mut out, module.minor_version);
    put_u2(&mut out, module.major_version);
    put_pool(&mut out, &module.pool);
    put_u2(&mut out, module.access.bits());
    put_u2(&mut out, module.this_class);
    put_u2(&mut out, module.super_class);
    put_u2(&mut out, module.interfaces.len() as u16);
    for idx in &module.interfaces {
        put_u2(&mut out, *idx);
    }
    put_u2(&mut out, module.fields.len() as u16);
    for field in &module.fields {
        put_field(&mut out, field);
    }
    put_u2(&mut out, module.methods.len() as u16);
    for method in &module.methods {
        put_method(&mut out, method);
    }
    put_attributes(&mut out, &module.attributes);
    out
}

pub fn write_to(module: &Module, sink: &mut impl Write) -> std::io::Result<()> {
    sink.write_all(&write(module))?;
    sink.flush()
}

// ----------------------------------------------------------------------------

fn put_u1(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

fn put_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_pool(out: &mut Vec<u8>, pool: &ConstantPool) {
    put_u2(out, pool.count());
    for (_, constant) in pool.iter() {
        put_u1(out, constant.tag().into());
        match constant {
            Constant::Utf8(s) => {
                let bytes = modified_utf8(s);
                put_u2(out, bytes.len() as u16);
                out.extend_from_slice(&bytes);
            }
            Constant::Integer(n) => put_u4(out, *n as u32),
            Constant::Float(bits) => put_u4(out, *bits),
            Constant::Long(n) => out.extend_from_slice(&n.to_be_bytes()),
            Constant::Double(bits) => out.extend_from_slice(&bits.to_be_bytes()),
            Constant::Class(idx) | Constant::String(idx) => put_u2(out, *idx),
            Constant::Fieldref(a, b)
            | Constant::Methodref(a, b)
            | Constant::InterfaceMethodref(a, b)
            | Constant::NameAndType(a, b) => {
                put_u2(out, *a);
                put_u2(out, *b);
            }
        }
    }
}

fn put_field(out: &mut Vec<u8>, field: &FieldInfo) {
    put_u2(out, field.access.bits());
    put_u2(out, field.name);
    put_u2(out, field.descriptor);
    put_attributes(out, &field.attributes);
}

fn put_method(out: &mut Vec<u8>, method: &MethodInfo) {
    put_u2(out, method.access.bits());
    put_u2(out, method.name);
    put_u2(out, method.descriptor);
    put_attributes(out, &method.attributes);
}

fn put_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) {
    put_u2(out, attributes.len() as u16);
    for attr in attributes {
        // body first, so its length is known
        let mut body = Vec::new();
        match attr {
            Attribute::ConstantValue { value, .. } => put_u2(&mut body, *value),
            Attribute::Code(code) => put_code(&mut body, code),
            Attribute::LineNumberTable { lines, .. } => {
                put_u2(&mut body, lines.len() as u16);
                for ln in lines {
                    put_u2(&mut body, ln.start);
                    put_u2(&mut body, ln.line);
                }
            }
            Attribute::LocalVariableTable { vars, .. } => {
                put_u2(&mut body, vars.len() as u16);
                for v in vars {
                    put_u2(&mut body, v.start);
                    put_u2(&mut body, v.length);
                    put_u2(&mut body, v.name);
                    put_u2(&mut body, v.descriptor);
                    put_u2(&mut body, v.slot);
                }
            }
            Attribute::SourceFile { file, .. } => put_u2(&mut body, *file),
            Attribute::Unknown { data, .. } => body.extend_from_slice(data),
        }
        put_u2(out, attr.name());
        put_u4(out, body.len() as u32);
        out.extend_from_slice(&body);
    }
}

fn put_code(out: &mut Vec<u8>, code: &Code) {
    put_u2(out, code.max_stack);
    put_u2(out, code.max_locals);
    put_u4(out, code.code.len() as u32);
    out.extend_from_slice(&code.code);
    put_u2(out, code.exceptions.len() as u16);
    for ExceptionEntry {
        start,
        end,
        handler,
        catch_type,
    } in &code.exceptions
    {
        put_u2(out, *start);
        put_u2(out, *end);
        put_u2(out, *handler);
        put_u2(out, *catch_type);
    }
    put_attributes(out, &code.attributes);
}

/// Length of `s` once written by [`modified_utf8`].
pub fn modified_utf8_len(s: &str) -> usize {
    s.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Class-file flavour of UTF-8: NUL as two bytes, supplementary characters as surrogate pairs.
pub fn modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
