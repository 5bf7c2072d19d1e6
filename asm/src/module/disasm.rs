use crate::error::Error;
use crate::resolver::ConstantPool;
use arch::op::{Arg, ArrayType, Opcode};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    None,
    Int(i32),
    Local(u16),
    Pool(u16),
    /// Absolute target offset
    Branch(u32),
    Iinc(u16, i16),
    NewArray(ArrayType),
    Interface(u16, u8),
    MultiANewArray(u16, u8),
    Table {
        default: u32,
        low: i32,
        targets: Vec<u32>,
    },
    Lookup {
        default: u32,
        pairs: Vec<(i32, u32)>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    pub offset: u32,
    pub op: Opcode,
    pub wide: bool,
    pub operand: Operand,
}

struct Cursor<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let slice = self
            .code
            .get(self.pos..self.pos + N)
            .ok_or_else(|| Error::MalformedModule(format!("truncated code at {}", self.pos)))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u1(&mut self) -> Result<u8, Error> {
        Ok(self.bytes::<1>()?[0])
    }

    fn u2(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.bytes()?))
    }

    fn s4(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.bytes()?))
    }
}

fn target(base: u32, rel: i32) -> Result<u32, Error> {
    let abs = base as i64 + rel as i64;
    u32::try_from(abs).map_err(|_| Error::MalformedModule(format!("branch to {abs}")))
}

/// Decode a code array into instructions.
pub fn decode(code: &[u8]) -> Result<Vec<Insn>, Error> {
    let mut c = Cursor { code, pos: 0 };
    let mut insns = Vec::new();
    while c.pos < code.len() {
        let offset = c.pos as u32;
        let byte = c.u1()?;
        let mut op = Opcode::try_from(byte)
            .map_err(|_| Error::MalformedModule(format!("unknown opcode 0x{byte:02X}")))?;
        let mut wide = false;
        if op == Opcode::WIDE {
            let byte = c.u1()?;
            op = Opcode::try_from(byte)
                .map_err(|_| Error::MalformedModule(format!("unknown opcode 0x{byte:02X}")))?;
            wide = true;
            if !matches!(op.arg(), Arg::Local | Arg::Iinc) {
                return Err(Error::MalformedModule(format!("wide {}", op.mnemonic())));
            }
        }
        let operand = match op.arg() {
            Arg::None => Operand::None,
            Arg::Byte => Operand::Int(c.u1()? as i8 as i32),
            Arg::Short => Operand::Int(c.u2()? as i16 as i32),
            Arg::Local if wide => Operand::Local(c.u2()?),
            Arg::Local => Operand::Local(c.u1()? as u16),
            Arg::Const => Operand::Pool(c.u1()? as u16),
            Arg::ConstW | Arg::Const2W | Arg::Field | Arg::Method | Arg::Class => {
                Operand::Pool(c.u2()?)
            }
            Arg::InterfaceMethod => {
                let idx = c.u2()?;
                let count = c.u1()?;
                c.u1()?;
                Operand::Interface(idx, count)
            }
            Arg::Branch => Operand::Branch(target(offset, c.u2()? as i16 as i32)?),
            Arg::BranchW => Operand::Branch(target(offset, c.s4()?)?),
            Arg::Iinc if wide => Operand::Iinc(c.u2()?, c.u2()? as i16),
            Arg::Iinc => Operand::Iinc(c.u1()? as u16, c.u1()? as i8 as i16),
            Arg::NewArray => {
                let code = c.u1()?;
                let ty = ArrayType::try_from(code)
                    .map_err(|_| Error::MalformedModule(format!("array type {code}")))?;
                Operand::NewArray(ty)
            }
            Arg::MultiANewArray => Operand::MultiANewArray(c.u2()?, c.u1()?),
            Arg::TableSwitch => {
                c.pos = (c.pos + 3) & !3;
                let default = target(offset, c.s4()?)?;
                let low = c.s4()?;
                let high = c.s4()?;
                if high < low {
                    return Err(Error::MalformedModule("tableswitch bounds".to_string()));
                }
                let mut targets = Vec::new();
                for _ in low..=high {
                    targets.push(target(offset, c.s4()?)?);
                }
                Operand::Table {
                    default,
                    low,
                    targets,
                }
            }
            Arg::LookupSwitch => {
                c.pos = (c.pos + 3) & !3;
                let default = target(offset, c.s4()?)?;
                let n = c.s4()?;
                let mut pairs = Vec::new();
                for _ in 0..n.max(0) {
                    let key = c.s4()?;
                    pairs.push((key, target(offset, c.s4()?)?));
                }
                Operand::Lookup { default, pairs }
            }
            Arg::Restricted => {
                return Err(Error::MalformedModule(format!(
                    "unsupported instruction {}",
                    op.mnemonic()
                )))
            }
        };
        insns.push(Insn {
            offset,
            op,
            wide,
            operand,
        });
    }
    Ok(insns)
}

impl Insn {
    /// `iload 4`, `getstatic java/lang/System.out:Ljava/io/PrintStream;`
    pub fn render(&self, pool: &ConstantPool) -> String {
        let mut s = self.op.mnemonic();
        if self.wide {
            s.insert_str(0, "wide ");
        }
        match &self.operand {
            Operand::None => {}
            Operand::Int(n) => {
                let _ = write!(s, " {n}");
            }
            Operand::Local(n) => {
                let _ = write!(s, " {n}");
            }
            Operand::Pool(idx) => {
                let _ = write!(s, " #{idx} {}", pool.describe(*idx));
            }
            Operand::Branch(t) => {
                let _ = write!(s, " {t}");
            }
            Operand::Iinc(n, d) => {
                let _ = write!(s, " {n}, {d}");
            }
            Operand::NewArray(ty) => {
                let _ = write!(s, " {ty}");
            }
            Operand::Interface(idx, count) => {
                let _ = write!(s, " #{idx} {}, {count}", pool.describe(*idx));
            }
            Operand::MultiANewArray(idx, dims) => {
                let _ = write!(s, " #{idx} {}, {dims}", pool.describe(*idx));
            }
            Operand::Table {
                default,
                low,
                targets,
            } => {
                for (i, t) in targets.iter().enumerate() {
                    let _ = write!(s, " {}:{t}", *low as i64 + i as i64);
                }
                let _ = write!(s, " default:{default}");
            }
            Operand::Lookup { default, pairs } => {
                for (k, t) in pairs {
                    let _ = write!(s, " {k}:{t}");
                }
                let _ = write!(s, " default:{default}");
            }
        }
        s
    }
}
