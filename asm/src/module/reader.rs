use super::{
    Attribute, Code, ExceptionEntry, FieldInfo, LineNumber, LocalVar, MethodInfo, Module,
};
use crate::error::Error;
use crate::resolver::{Constant, ConstantPool};
use arch::access::AccessFlags;
use arch::cp::{Tag, MAGIC};

struct Bytes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Bytes<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(malformed(format!("truncated at byte {}", self.pos)));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8_pair(&mut self) -> Result<u64, Error> {
        let hi = self.u4()? as u64;
        let lo = self.u4()? as u64;
        Ok(hi << 32 | lo)
    }
}

fn malformed(msg: impl Into<String>) -> Error {
    Error::MalformedModule(msg.into())
}

/// Parse a module written by [`super::write`].
pub fn read(data: &[u8]) -> Result<Module, Error> {
    let mut b = Bytes { data, pos: 0 };
    if b.u4()? != MAGIC {
        return Err(malformed("bad magic"));
    }
    let minor_version = b.u2()?;
    let major_version = b.u2()?;
    let pool = read_pool(&mut b)?;
    let access = AccessFlags(b.u2()?);
    let this_class = b.u2()?;
    let super_class = b.u2()?;
    let n = b.u2()?;
    let mut interfaces = Vec::with_capacity(n as usize);
    for _ in 0..n {
        interfaces.push(b.u2()?);
    }
    let n = b.u2()?;
    let mut fields = Vec::with_capacity(n as usize);
    for _ in 0..n {
        fields.push(FieldInfo {
            access: AccessFlags(b.u2()?),
            name: b.u2()?,
            descriptor: b.u2()?,
            attributes: read_attributes(&mut b, &pool)?,
        });
    }
    let n = b.u2()?;
    let mut methods = Vec::with_capacity(n as usize);
    for _ in 0..n {
        methods.push(MethodInfo {
            access: AccessFlags(b.u2()?),
            name: b.u2()?,
            descriptor: b.u2()?,
            attributes: read_attributes(&mut b, &pool)?,
        });
    }
    let attributes = read_attributes(&mut b, &pool)?;
    if b.pos != data.len() {
        return Err(malformed("trailing bytes"));
    }
    Ok(Module {
        minor_version,
        major_version,
        pool,
        access,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn read_pool(b: &mut Bytes) -> Result<ConstantPool, Error> {
    let count = b.u2()?;
    let mut pool = ConstantPool::new();
    while pool.count() < count {
        let expected = pool.count();
        let tag = Tag::try_from(b.u1()?)
            .map_err(|e| malformed(format!("unknown constant tag {}", e.number)))?;
        let constant = match tag {
            Tag::Utf8 => {
                let len = b.u2()? as usize;
                Constant::Utf8(decode_utf8(b.take(len)?)?)
            }
            Tag::Integer => Constant::Integer(b.u4()? as i32),
            Tag::Float => Constant::Float(b.u4()?),
            Tag::Long => Constant::Long(b.u8_pair()? as i64),
            Tag::Double => Constant::Double(b.u8_pair()?),
            Tag::Class => Constant::Class(b.u2()?),
            Tag::String => Constant::String(b.u2()?),
            Tag::Fieldref => Constant::Fieldref(b.u2()?, b.u2()?),
            Tag::Methodref => Constant::Methodref(b.u2()?, b.u2()?),
            Tag::InterfaceMethodref => Constant::InterfaceMethodref(b.u2()?, b.u2()?),
            Tag::NameAndType => Constant::NameAndType(b.u2()?, b.u2()?),
        };
        if pool.intern(constant)? != expected {
            return Err(malformed(format!("duplicate constant at #{expected}")));
        }
    }
    if pool.count() != count {
        return Err(malformed("constant pool count mismatch"));
    }
    Ok(pool)
}

fn read_attributes(b: &mut Bytes, pool: &ConstantPool) -> Result<Vec<Attribute>, Error> {
    let n = b.u2()?;
    let mut attributes = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let name = b.u2()?;
        let len = b.u4()? as usize;
        let body = b.take(len)?;
        let mut inner = Bytes { data: body, pos: 0 };
        let attr = match pool.utf8_at(name) {
            Some("ConstantValue") => Attribute::ConstantValue {
                name,
                value: inner.u2()?,
            },
            Some("SourceFile") => Attribute::SourceFile {
                name,
                file: inner.u2()?,
            },
            Some("LineNumberTable") => {
                let n = inner.u2()?;
                let mut lines = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    lines.push(LineNumber {
                        start: inner.u2()?,
                        line: inner.u2()?,
                    });
                }
                Attribute::LineNumberTable { name, lines }
            }
            Some("LocalVariableTable") => {
                let n = inner.u2()?;
                let mut vars = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    vars.push(LocalVar {
                        start: inner.u2()?,
                        length: inner.u2()?,
                        name: inner.u2()?,
                        descriptor: inner.u2()?,
                        slot: inner.u2()?,
                    });
                }
                Attribute::LocalVariableTable { name, vars }
            }
            Some("Code") => Attribute::Code(read_code(&mut inner, name, pool)?),
            Some(_) => {
                inner.pos = body.len();
                Attribute::Unknown {
                    name,
                    data: body.to_vec(),
                }
            }
            None => return Err(malformed(format!("attribute name #{name} is not Utf8"))),
        };
        if inner.pos != body.len() {
            return Err(malformed(format!("attribute length mismatch at #{name}")));
        }
        attributes.push(attr);
    }
    Ok(attributes)
}

fn read_code(b: &mut Bytes, name: u16, pool: &ConstantPool) -> Result<Code, Error> {
    let max_stack = b.u2()?;
    let max_locals = b.u2()?;
    let len = b.u4()? as usize;
    let code = b.take(len)?.to_vec();
    let n = b.u2()?;
    let mut exceptions = Vec::with_capacity(n as usize);
    for _ in 0..n {
        exceptions.push(ExceptionEntry {
            start: b.u2()?,
            end: b.u2()?,
            handler: b.u2()?,
            catch_type: b.u2()?,
        });
    }
    let attributes = read_attributes(b, pool)?;
    Ok(Code {
        name,
        max_stack,
        max_locals,
        code,
        exceptions,
        attributes,
    })
}

fn decode_utf8(bytes: &[u8]) -> Result<String, Error> {
    let bad = || malformed("invalid modified UTF-8");
    let mut units = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(a) = iter.next() {
        let a = a as u16;
        let unit = match a {
            0x01..=0x7F => a,
            0xC0..=0xDF => {
                let b = iter.next().ok_or_else(bad)? as u16;
                ((a & 0x1F) << 6) | (b & 0x3F)
            }
            0xE0..=0xEF => {
                let b = iter.next().ok_or_else(bad)? as u16;
                let c = iter.next().ok_or_else(bad)? as u16;
                ((a & 0x0F) << 12) | ((b & 0x3F) << 6) | (c & 0x3F)
            }
            _ => return Err(bad()),
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| bad())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::writer::modified_utf8;

    #[test]
    fn utf8_round_trip() {
        for s in ["", "hello", "\0nul", "ñandú", "\u{1F600} smile"] {
            assert_eq!(decode_utf8(&modified_utf8(s)).unwrap(), s);
        }
        assert!(decode_utf8(&[0xFF]).is_err());
        assert!(decode_utf8(&[0xC3]).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(read(&[0, 1, 2]), Err(Error::MalformedModule(_))));
        assert!(matches!(
            read(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 49]),
            Err(Error::MalformedModule(_))
        ));
    }
}
