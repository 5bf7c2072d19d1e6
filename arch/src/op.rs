use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[allow(non_camel_case_types)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[repr(u8)]
pub enum Opcode {
    NOP = 0x00,
    ACONST_NULL = 0x01,
    ICONST_M1 = 0x02,
    ICONST_0 = 0x03,
    ICONST_1 = 0x04,
    ICONST_2 = 0x05,
    ICONST_3 = 0x06,
    ICONST_4 = 0x07,
    ICONST_5 = 0x08,
    LCONST_0 = 0x09,
    LCONST_1 = 0x0A,
    FCONST_0 = 0x0B,
    FCONST_1 = 0x0C,
    FCONST_2 = 0x0D,
    DCONST_0 = 0x0E,
    DCONST_1 = 0x0F,
    BIPUSH = 0x10,
    SIPUSH = 0x11,
    LDC = 0x12,
    LDC_W = 0x13,
    LDC2_W = 0x14,
    ILOAD = 0x15,
    LLOAD = 0x16,
    FLOAD = 0x17,
    DLOAD = 0x18,
    ALOAD = 0x19,
    ILOAD_0 = 0x1A,
    ILOAD_1 = 0x1B,
    ILOAD_2 = 0x1C,
    ILOAD_3 = 0x1D,
    LLOAD_0 = 0x1E,
    LLOAD_1 = 0x1F,
    LLOAD_2 = 0x20,
    LLOAD_3 = 0x21,
    FLOAD_0 = 0x22,
    FLOAD_1 = 0x23,
    FLOAD_2 = 0x24,
    FLOAD_3 = 0x25,
    DLOAD_0 = 0x26,
    DLOAD_1 = 0x27,
    DLOAD_2 = 0x28,
    DLOAD_3 = 0x29,
    ALOAD_0 = 0x2A,
    ALOAD_1 = 0x2B,
    ALOAD_2 = 0x2C,
    ALOAD_3 = 0x2D,
    IALOAD = 0x2E,
    LALOAD = 0x2F,
    FALOAD = 0x30,
    DALOAD = 0x31,
    AALOAD = 0x32,
    BALOAD = 0x33,
    CALOAD = 0x34,
    SALOAD = 0x35,
    ISTORE = 0x36,
    LSTORE = 0x37,
    FSTORE = 0x38,
    DSTORE = 0x39,
    ASTORE = 0x3A,
    ISTORE_0 = 0x3B,
    ISTORE_1 = 0x3C,
    ISTORE_2 = 0x3D,
    ISTORE_3 = 0x3E,
    LSTORE_0 = 0x3F,
    LSTORE_1 = 0x40,
    LSTORE_2 = 0x41,
    LSTORE_3 = 0x42,
    FSTORE_0 = 0x43,
    FSTORE_1 = 0x44,
    FSTORE_2 = 0x45,
    FSTORE_3 = 0x46,
    DSTORE_0 = 0x47,
    DSTORE_1 = 0x48,
    DSTORE_2 = 0x49,
    DSTORE_3 = 0x4A,
    ASTORE_0 = 0x4B,
    ASTORE_1 = 0x4C,
    ASTORE_2 = 0x4D,
    ASTORE_3 = 0x4E,
    IASTORE = 0x4F,
    LASTORE = 0x50,
    FASTORE = 0x51,
    DASTORE = 0x52,
    AASTORE = 0x53,
    BASTORE = 0x54,
    CASTORE = 0x55,
    SASTORE = 0x56,
    POP = 0x57,
    POP2 = 0x58,
    DUP = 0x59,
    DUP_X1 = 0x5A,
    DUP_X2 = 0x5B,
    DUP2 = 0x5C,
    DUP2_X1 = 0x5D,
    DUP2_X2 = 0x5E,
    SWAP = 0x5F,
    IADD = 0x60,
    LADD = 0x61,
    FADD = 0x62,
    DADD = 0x63,
    ISUB = 0x64,
    LSUB = 0x65,
    FSUB = 0x66,
    DSUB = 0x67,
    IMUL = 0x68,
    LMUL = 0x69,
    FMUL = 0x6A,
    DMUL = 0x6B,
    IDIV = 0x6C,
    LDIV = 0x6D,
    FDIV = 0x6E,
    DDIV = 0x6F,
    IREM = 0x70,
    LREM = 0x71,
    FREM = 0x72,
    DREM = 0x73,
    INEG = 0x74,
    LNEG = 0x75,
    FNEG = 0x76,
    DNEG = 0x77,
    ISHL = 0x78,
    LSHL = 0x79,
    ISHR = 0x7A,
    LSHR = 0x7B,
    IUSHR = 0x7C,
    LUSHR = 0x7D,
    IAND = 0x7E,
    LAND = 0x7F,
    IOR = 0x80,
    LOR = 0x81,
    IXOR = 0x82,
    LXOR = 0x83,
    IINC = 0x84,
    I2L = 0x85,
    I2F = 0x86,
    I2D = 0x87,
    L2I = 0x88,
    L2F = 0x89,
    L2D = 0x8A,
    F2I = 0x8B,
    F2L = 0x8C,
    F2D = 0x8D,
    D2I = 0x8E,
    D2L = 0x8F,
    D2F = 0x90,
    I2B = 0x91,
    I2C = 0x92,
    I2S = 0x93,
    LCMP = 0x94,
    FCMPL = 0x95,
    FCMPG = 0x96,
    DCMPL = 0x97,
    DCMPG = 0x98,
    IFEQ = 0x99,
    IFNE = 0x9A,
    IFLT = 0x9B,
    IFGE = 0x9C,
    IFGT = 0x9D,
    IFLE = 0x9E,
    IF_ICMPEQ = 0x9F,
    IF_ICMPNE = 0xA0,
    IF_ICMPLT = 0xA1,
    IF_ICMPGE = 0xA2,
    IF_ICMPGT = 0xA3,
    IF_ICMPLE = 0xA4,
    IF_ACMPEQ = 0xA5,
    IF_ACMPNE = 0xA6,
    GOTO = 0xA7,
    JSR = 0xA8,
    RET = 0xA9,
    TABLESWITCH = 0xAA,
    LOOKUPSWITCH = 0xAB,
    IRETURN = 0xAC,
    LRETURN = 0xAD,
    FRETURN = 0xAE,
    DRETURN = 0xAF,
    ARETURN = 0xB0,
    RETURN = 0xB1,
    GETSTATIC = 0xB2,
    PUTSTATIC = 0xB3,
    GETFIELD = 0xB4,
    PUTFIELD = 0xB5,
    INVOKEVIRTUAL = 0xB6,
    INVOKESPECIAL = 0xB7,
    INVOKESTATIC = 0xB8,
    INVOKEINTERFACE = 0xB9,
    INVOKEDYNAMIC = 0xBA,
    NEW = 0xBB,
    NEWARRAY = 0xBC,
    ANEWARRAY = 0xBD,
    ARRAYLENGTH = 0xBE,
    ATHROW = 0xBF,
    CHECKCAST = 0xC0,
    INSTANCEOF = 0xC1,
    MONITORENTER = 0xC2,
    MONITOREXIT = 0xC3,
    WIDE = 0xC4,
    MULTIANEWARRAY = 0xC5,
    IFNULL = 0xC6,
    IFNONNULL = 0xC7,
    GOTO_W = 0xC8,
    JSR_W = 0xC9,
}

impl Opcode {
    /// Mnemonics are lower-case only; `LDC` is not an instruction.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().parse::<Self>() {
            Ok(op) if op.mnemonic() == s => Ok(op),
            _ => Err(format!("Undefined instruction: {s}")),
        }
    }

    /// Lower-case mnemonic as written in source text
    pub fn mnemonic(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// Shape of the operand field following the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    None,
    Byte,            // bipush: s1
    Short,           // sipush: s2
    Local,           // xload/xstore/ret: u1 (u2 under wide)
    Const,           // ldc: u1 pool index
    ConstW,          // ldc_w: u2 pool index
    Const2W,         // ldc2_w: u2 pool index of long/double
    Field,           // get/put: u2 Fieldref
    Method,          // invokevirtual/special/static: u2 Methodref
    InterfaceMethod, // invokeinterface: u2 + count + 0
    Class,           // new/anewarray/checkcast/instanceof: u2 Class
    Branch,          // s2 relative offset
    BranchW,         // s4 relative offset
    Iinc,            // u1 local + s1 delta (u2 + s2 under wide)
    NewArray,        // u1 primitive array type
    MultiANewArray,  // u2 Class + u1 dimensions
    TableSwitch,
    LookupSwitch,
    Restricted, // wide prefix and invokedynamic are not written directly
}

impl Opcode {
    pub fn arg(&self) -> Arg {
        use Opcode::*;
        match self {
            BIPUSH => Arg::Byte,
            SIPUSH => Arg::Short,
            ILOAD | LLOAD | FLOAD | DLOAD | ALOAD | ISTORE | LSTORE | FSTORE | DSTORE | ASTORE
            | RET => Arg::Local,
            LDC => Arg::Const,
            LDC_W => Arg::ConstW,
            LDC2_W => Arg::Const2W,
            GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => Arg::Field,
            INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => Arg::Method,
            INVOKEINTERFACE => Arg::InterfaceMethod,
            NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => Arg::Class,
            IFEQ | IFNE | IFLT | IFGE | IFGT | IFLE | IF_ICMPEQ | IF_ICMPNE | IF_ICMPLT
            | IF_ICMPGE | IF_ICMPGT | IF_ICMPLE | IF_ACMPEQ | IF_ACMPNE | GOTO | JSR | IFNULL
            | IFNONNULL => Arg::Branch,
            GOTO_W | JSR_W => Arg::BranchW,
            IINC => Arg::Iinc,
            NEWARRAY => Arg::NewArray,
            MULTIANEWARRAY => Arg::MultiANewArray,
            TABLESWITCH => Arg::TableSwitch,
            LOOKUPSWITCH => Arg::LookupSwitch,
            WIDE | INVOKEDYNAMIC => Arg::Restricted,
            _ => Arg::None,
        }
    }

    /// Encoded size in bytes, excluding switch bodies.
    pub fn size(&self, wide: bool) -> usize {
        match self.arg() {
            Arg::None | Arg::Restricted => 1,
            Arg::Byte | Arg::Const | Arg::NewArray => 2,
            Arg::Local if wide => 4,
            Arg::Local => 2,
            Arg::Short | Arg::ConstW | Arg::Const2W | Arg::Field | Arg::Method | Arg::Class => 3,
            Arg::Branch => 3,
            Arg::Iinc if wide => 6,
            Arg::Iinc => 3,
            Arg::MultiANewArray => 4,
            Arg::InterfaceMethod | Arg::BranchW => 5,
            Arg::TableSwitch | Arg::LookupSwitch => 1,
        }
    }

    /// Slot implied by the `_0` .. `_3` load/store forms.
    pub fn local_slot(&self) -> Option<u16> {
        use Opcode::*;
        let base = match self {
            ILOAD_0 | LLOAD_0 | FLOAD_0 | DLOAD_0 | ALOAD_0 => 0,
            ILOAD_1 | LLOAD_1 | FLOAD_1 | DLOAD_1 | ALOAD_1 => 1,
            ILOAD_2 | LLOAD_2 | FLOAD_2 | DLOAD_2 | ALOAD_2 => 2,
            ILOAD_3 | LLOAD_3 | FLOAD_3 | DLOAD_3 | ALOAD_3 => 3,
            ISTORE_0 | LSTORE_0 | FSTORE_0 | DSTORE_0 | ASTORE_0 => 0,
            ISTORE_1 | LSTORE_1 | FSTORE_1 | DSTORE_1 | ASTORE_1 => 1,
            ISTORE_2 | LSTORE_2 | FSTORE_2 | DSTORE_2 | ASTORE_2 => 2,
            ISTORE_3 | LSTORE_3 | FSTORE_3 | DSTORE_3 | ASTORE_3 => 3,
            _ => return None,
        };
        Some(base)
    }

    /// Operand-stack words popped and pushed.
    /// `None` when the effect depends on a descriptor (field access, calls, multianewarray).
    pub fn stack_effect(&self) -> Option<(u16, u16)> {
        use Opcode::*;
        let effect = match self {
            NOP | IINC | GOTO | GOTO_W | RET | RETURN | WIDE => (0, 0),
            ACONST_NULL | ICONST_M1 | ICONST_0 | ICONST_1 | ICONST_2 | ICONST_3 | ICONST_4
            | ICONST_5 | FCONST_0 | FCONST_1 | FCONST_2 | BIPUSH | SIPUSH | LDC | LDC_W => (0, 1),
            LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 | LDC2_W => (0, 2),
            ILOAD | FLOAD | ALOAD | ILOAD_0 | ILOAD_1 | ILOAD_2 | ILOAD_3 | FLOAD_0 | FLOAD_1
            | FLOAD_2 | FLOAD_3 | ALOAD_0 | ALOAD_1 | ALOAD_2 | ALOAD_3 => (0, 1),
            LLOAD | DLOAD | LLOAD_0 | LLOAD_1 | LLOAD_2 | LLOAD_3 | DLOAD_0 | DLOAD_1 | DLOAD_2
            | DLOAD_3 => (0, 2),
            IALOAD | FALOAD | AALOAD | BALOAD | CALOAD | SALOAD => (2, 1),
            LALOAD | DALOAD => (2, 2),
            ISTORE | FSTORE | ASTORE | ISTORE_0 | ISTORE_1 | ISTORE_2 | ISTORE_3 | FSTORE_0
            | FSTORE_1 | FSTORE_2 | FSTORE_3 | ASTORE_0 | ASTORE_1 | ASTORE_2 | ASTORE_3 => (1, 0),
            LSTORE | DSTORE | LSTORE_0 | LSTORE_1 | LSTORE_2 | LSTORE_3 | DSTORE_0 | DSTORE_1
            | DSTORE_2 | DSTORE_3 => (2, 0),
            IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => (3, 0),
            LASTORE | DASTORE => (4, 0),
            POP => (1, 0),
            POP2 => (2, 0),
            DUP => (1, 2),
            DUP_X1 => (2, 3),
            DUP_X2 => (3, 4),
            DUP2 => (2, 4),
            DUP2_X1 => (3, 5),
            DUP2_X2 => (4, 6),
            SWAP => (2, 2),
            IADD | ISUB | IMUL | IDIV | IREM | IAND | IOR | IXOR | ISHL | ISHR | IUSHR | FADD
            | FSUB | FMUL | FDIV | FREM => (2, 1),
            LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR | DADD | DSUB | DMUL | DDIV
            | DREM => (4, 2),
            LSHL | LSHR | LUSHR => (3, 2),
            INEG | FNEG | I2F | F2I | I2B | I2C | I2S => (1, 1),
            LNEG | DNEG | L2D | D2L => (2, 2),
            I2L | I2D | F2L | F2D => (1, 2),
            L2I | L2F | D2I | D2F => (2, 1),
            LCMP | DCMPL | DCMPG => (4, 1),
            FCMPL | FCMPG => (2, 1),
            IFEQ | IFNE | IFLT | IFGE | IFGT | IFLE | IFNULL | IFNONNULL => (1, 0),
            IF_ICMPEQ | IF_ICMPNE | IF_ICMPLT | IF_ICMPGE | IF_ICMPGT | IF_ICMPLE | IF_ACMPEQ
            | IF_ACMPNE => (2, 0),
            JSR | JSR_W => (0, 1),
            TABLESWITCH | LOOKUPSWITCH => (1, 0),
            IRETURN | FRETURN | ARETURN | ATHROW => (1, 0),
            LRETURN | DRETURN => (2, 0),
            NEW => (0, 1),
            NEWARRAY | ANEWARRAY | ARRAYLENGTH | CHECKCAST | INSTANCEOF => (1, 1),
            MONITORENTER | MONITOREXIT => (1, 0),
            GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD | INVOKEVIRTUAL | INVOKESPECIAL
            | INVOKESTATIC | INVOKEINTERFACE | INVOKEDYNAMIC | MULTIANEWARRAY => return None,
        };
        Some(effect)
    }

    /// Control never falls through to the next instruction.
    pub fn is_terminal(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            GOTO | GOTO_W
                | RET
                | TABLESWITCH
                | LOOKUPSWITCH
                | IRETURN
                | LRETURN
                | FRETURN
                | DRETURN
                | ARETURN
                | RETURN
                | ATHROW
        )
    }

    /// Number of local slots the load/store form occupies (long and double take two).
    pub fn local_width(&self) -> u16 {
        use Opcode::*;
        match self {
            LLOAD | DLOAD | LSTORE | DSTORE | LLOAD_0 | LLOAD_1 | LLOAD_2 | LLOAD_3 | DLOAD_0
            | DLOAD_1 | DLOAD_2 | DLOAD_3 | LSTORE_0 | LSTORE_1 | LSTORE_2 | LSTORE_3
            | DSTORE_0 | DSTORE_1 | DSTORE_2 | DSTORE_3 => 2,
            _ => 1,
        }
    }
}

/// Element codes accepted by `newarray`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, EnumString, Display,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum ArrayType {
    Boolean = 4,
    Char = 5,
    Float = 6,
    Double = 7,
    Byte = 8,
    Short = 9,
    Int = 10,
    Long = 11,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn parse_mnemonics() {
        assert_eq!(Opcode::parse("iload_0"), Ok(Opcode::ILOAD_0));
        assert_eq!(Opcode::parse("ldc2_w"), Ok(Opcode::LDC2_W));
        assert!(Opcode::parse("LDC2_W").is_err());
        assert!(Opcode::parse("Nop").is_err());
        assert_eq!(Opcode::parse("goto_w"), Ok(Opcode::GOTO_W));
        assert!(Opcode::parse("hoge").is_err());
    }

    #[test]
    fn stack_effects() {
        assert_eq!(Opcode::DUP2_X1.stack_effect(), Some((3, 5)));
        assert_eq!(Opcode::LADD.stack_effect(), Some((4, 2)));
        assert_eq!(Opcode::LDC2_W.stack_effect(), Some((0, 2)));
        assert_eq!(Opcode::INVOKESTATIC.stack_effect(), None);
        let described = Opcode::iter().filter(|op| op.stack_effect().is_some()).count();
        assert_eq!(described, Opcode::iter().count() - 10);
        assert!(Opcode::ATHROW.is_terminal());
        assert!(!Opcode::IFEQ.is_terminal());
    }

    #[test]
    fn mnemonic_round_trip() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::parse(&op.mnemonic()), Ok(op));
            assert_eq!(Opcode::try_from(u8::from(op)), Ok(op));
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(Opcode::NOP.size(false), 1);
        assert_eq!(Opcode::BIPUSH.size(false), 2);
        assert_eq!(Opcode::ILOAD.size(true), 4);
        assert_eq!(Opcode::IINC.size(true), 6);
        assert_eq!(Opcode::INVOKEINTERFACE.size(false), 5);
        assert_eq!(Opcode::GOTO.size(false), 3);
    }

    #[test]
    fn array_types() {
        assert_eq!("int".parse::<ArrayType>(), Ok(ArrayType::Int));
        assert_eq!(u8::from(ArrayType::Boolean), 4);
        assert!("string".parse::<ArrayType>().is_err());
    }
}
