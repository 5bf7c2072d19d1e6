//! Operand resolution: turns the operand text of one instruction into an
//! encoded [`Operand`], interning whatever pool entries it needs.

use super::line::Word;
use super::method::{field_effect, MethodBuilder, Operand};
use crate::error::{Error, Located};
use crate::expr::token::{Pos, Suffix};
use crate::expr::{eval_const, literal_suffix, Value};
use crate::resolver::{is_identifier, ConstantPool, Owner, Resolver};
use arch::op::{Arg, ArrayType, Opcode};
use arch::types::JavaType;
use indexmap::IndexMap;

pub struct Ctx<'a, 'p> {
    pub resolver: &'a Resolver<'p>,
    pub pool: &'a mut ConstantPool,
    pub method: &'a mut MethodBuilder,
    /// Fields declared so far: name to descriptor
    pub fields: &'a IndexMap<String, String>,
    /// The class being assembled is an interface
    pub interface: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub op: Opcode,
    pub wide: bool,
    pub operand: Operand,
    /// Stack words popped and pushed
    pub stack: Option<(u16, u16)>,
}

impl Resolved {
    pub fn new(op: Opcode, operand: Operand) -> Self {
        Self {
            op,
            wide: false,
            operand,
            stack: op.stack_effect(),
        }
    }

    fn with_stack(mut self, pop: u16, push: u16) -> Self {
        self.stack = Some((pop, push));
        self
    }
}

fn arity(op: Opcode) -> usize {
    match op.arg() {
        Arg::None | Arg::TableSwitch | Arg::LookupSwitch | Arg::Restricted => 0,
        Arg::Iinc | Arg::MultiANewArray => 2,
        _ => 1,
    }
}

fn check_arity(op: Opcode, args: &[Word], pos: Pos) -> Result<(), Located> {
    let want = arity(op);
    if args.len() > want {
        let extra = &args[want];
        return Err(Error::ExtraOperand(extra.text.clone()).at(Pos::new(pos.line, extra.column)));
    }
    if args.len() < want || args.iter().any(|a| a.text.is_empty()) {
        return Err(Error::MissingOperand(format!("`{}` needs {want}", op.mnemonic())).at(pos));
    }
    Ok(())
}

fn value(arg: &Word, line: usize) -> Result<Value, Located> {
    eval_const(&arg.text, Pos::new(line, arg.column))
}

fn int(arg: &Word, line: usize) -> Result<i64, Located> {
    match value(arg, line)? {
        Value::Int(n) => Ok(n),
        other => Err(Error::mismatch("int", other.ty()).at(Pos::new(line, arg.column))),
    }
}

fn locate(pos: Pos) -> impl Fn(Error) -> Located {
    move |e| e.at(pos)
}

fn ranged<T: TryFrom<i64>>(n: i64, what: &str, pos: Pos) -> Result<T, Located> {
    T::try_from(n).map_err(|_| Error::ValueOutOfRange(n.to_string(), what.to_string()).at(pos))
}

/// Type a load/store expects in its local slot.
fn slot_kind(op: Opcode) -> Option<&'static str> {
    use Opcode::*;
    Some(match op {
        ILOAD | ISTORE => "int",
        LLOAD | LSTORE => "long",
        FLOAD | FSTORE => "float",
        DLOAD | DSTORE => "double",
        ALOAD | ASTORE => "reference",
        _ => return None,
    })
}

fn fits_kind(kind: &str, ty: &JavaType) -> bool {
    match kind {
        "int" => matches!(
            ty,
            JavaType::Boolean | JavaType::Byte | JavaType::Char | JavaType::Short | JavaType::Int
        ),
        "long" => *ty == JavaType::Long,
        "float" => *ty == JavaType::Float,
        "double" => *ty == JavaType::Double,
        _ => ty.is_reference(),
    }
}

impl<'a, 'p> Ctx<'a, 'p> {
    fn pos(&self, arg: &Word) -> Pos {
        Pos::new(self.line, arg.column)
    }

    /// Local given by name or by slot expression.
    fn local(&mut self, op: Opcode, arg: &Word) -> Result<u16, Located> {
        let pos = self.pos(arg);
        if let Some(local) = self.method.local(&arg.text) {
            if let Some(kind) = slot_kind(op) {
                if !fits_kind(kind, &local.ty) {
                    return Err(Error::mismatch(kind, &local.ty).at(pos));
                }
            }
            return Ok(local.slot);
        }
        if is_identifier(&arg.text) {
            return Err(Error::UnboundSymbol(arg.text.clone()).at(pos));
        }
        let n = int(arg, self.line)?;
        let slot = u16::try_from(n).map_err(|_| Error::LocalOutOfRange(n.to_string()).at(pos))?;
        self.method.touch_slot(slot, op.local_width());
        Ok(slot)
    }

    fn constant(&mut self, op: Opcode, arg: &Word) -> Result<Resolved, Located> {
        let pos = self.pos(arg);
        let at = locate(pos);
        let suffix = literal_suffix(&arg.text);
        let idx = match (value(arg, self.line)?, suffix) {
            (Value::Int(_), Some(Suffix::Long)) => {
                return Err(Error::mismatch("int, float or str", "long").at(pos))
            }
            (Value::Real(_), Some(Suffix::Double)) => {
                return Err(Error::mismatch("int, float or str", "double").at(pos))
            }
            (Value::Int(n), _) => {
                let n: i32 = ranged(n, "int constant", pos)?;
                self.pool.integer(n).map_err(at)?
            }
            (Value::Real(r), _) => self.pool.float(r as f32).map_err(at)?,
            (Value::Str(s), _) => self.pool.string(&s).map_err(at)?,
            (Value::Bool(_), _) => return Err(Error::mismatch("int, real or str", "bool").at(pos)),
        };
        Ok(match u8::try_from(idx) {
            Ok(small) if op == Opcode::LDC => Resolved::new(op, Operand::U1(small)),
            _ => Resolved::new(Opcode::LDC_W, Operand::U2(idx)),
        })
    }

    /// Integers need an `L` suffix; reals are doubles unless marked `f`.
    fn constant2(&mut self, op: Opcode, arg: &Word) -> Result<Resolved, Located> {
        let pos = self.pos(arg);
        let at = locate(pos);
        let suffix = literal_suffix(&arg.text);
        let idx = match (value(arg, self.line)?, suffix) {
            (Value::Int(n), Some(Suffix::Long)) => self.pool.long(n).map_err(at)?,
            (Value::Int(_), _) => return Err(Error::mismatch("long or double", "int").at(pos)),
            (Value::Real(_), Some(Suffix::Float)) => {
                return Err(Error::mismatch("long or double", "float").at(pos))
            }
            (Value::Real(r), _) => self.pool.double(r).map_err(at)?,
            (other, _) => return Err(Error::mismatch("long or double", other.ty()).at(pos)),
        };
        Ok(Resolved::new(op, Operand::U2(idx)))
    }

    fn field(&mut self, op: Opcode, arg: &Word) -> Result<Resolved, Located> {
        let pos = self.pos(arg);
        let at = locate(pos);
        let r = self.resolver.field_ref(&arg.text).map_err(&at)?;
        let descriptor = match (&r.owner, r.descriptor) {
            (_, Some(d)) => d,
            (Owner::This, None) => match self.fields.get(&r.name) {
                Some(d) => d.clone(),
                None => {
                    return Ok(Resolved::new(
                        op,
                        Operand::OwnField {
                            name: r.name,
                            descriptor: None,
                        },
                    ))
                }
            },
            (Owner::External(q), None) => return Err(Error::UnknownField(format!("{q}.{}", r.name)).at(pos)),
        };
        let owner = self.resolver.owner_internal(&r.owner);
        let idx = self.pool.fieldref(&owner, &r.name, &descriptor).map_err(at)?;
        let (pop, push) = field_effect(op, &descriptor);
        Ok(Resolved::new(op, Operand::U2(idx)).with_stack(pop, push))
    }

    fn method_operand(&mut self, op: Opcode, arg: &Word) -> Result<Resolved, Located> {
        let pos = self.pos(arg);
        let at = locate(pos);
        let r = self.resolver.method_ref(&arg.text).map_err(&at)?;
        let interface = match &r.owner {
            Owner::This => self.interface,
            Owner::External(q) => self
                .resolver
                .describe(q)
                .map(|d| d.interface)
                .unwrap_or(false),
        };
        let owner = self.resolver.owner_internal(&r.owner);
        let desc = r.descriptor.descriptor();
        let receiver = (op != Opcode::INVOKESTATIC) as u16;
        let pop = r.descriptor.arg_slots() + receiver;
        let push = r.descriptor.ret.slots();
        if op == Opcode::INVOKEINTERFACE {
            if !interface {
                return Err(Error::InvalidType(owner.replace('/', ".")).at(pos));
            }
            let idx = self
                .pool
                .interface_methodref(&owner, &r.name, &desc)
                .map_err(at)?;
            let count: u8 = ranged(1 + r.descriptor.arg_slots() as i64, "argument slots", pos)?;
            return Ok(Resolved::new(op, Operand::Interface(idx, count)).with_stack(pop, push));
        }
        if r.name == "<init>" && op != Opcode::INVOKESPECIAL {
            return Err(Error::UnknownMethod(arg.text.clone()).at(pos));
        }
        let idx = if interface {
            self.pool.interface_methodref(&owner, &r.name, &desc)
        } else {
            self.pool.methodref(&owner, &r.name, &desc)
        }
        .map_err(at)?;
        Ok(Resolved::new(op, Operand::U2(idx)).with_stack(pop, push))
    }

    fn class(&mut self, op: Opcode, arg: &Word) -> Result<Resolved, Located> {
        let pos = self.pos(arg);
        let at = locate(pos);
        let ty = self.resolver.resolve_type(&arg.text).map_err(&at)?;
        let name = match (op, &ty) {
            (Opcode::NEW, JavaType::Object(name)) => name.clone(),
            (Opcode::NEW, _) => return Err(Error::InvalidType(arg.text.clone()).at(pos)),
            // anewarray names the component type
            (Opcode::ANEWARRAY, ty) if ty.is_reference() => ty.class_name().unwrap_or_default(),
            (Opcode::ANEWARRAY, _) => return Err(Error::InvalidType(arg.text.clone()).at(pos)),
            (_, ty) => ty
                .class_name()
                .ok_or_else(|| Error::InvalidType(arg.text.clone()).at(pos))?,
        };
        let idx = self.pool.class(&name).map_err(at)?;
        Ok(Resolved::new(op, Operand::U2(idx)))
    }

    fn multi_array(&mut self, op: Opcode, args: &[Word]) -> Result<Resolved, Located> {
        let pos = self.pos(&args[0]);
        let ty = self.resolver.resolve_type(&args[0].text).map_err(|e| e.at(pos))?;
        let dims = int(&args[1], self.line)?;
        let max = ty.dimensions().min(255) as i64;
        if !(1..=max).contains(&dims) {
            return Err(Error::ValueOutOfRange(dims.to_string(), format!("dimensions of `{}`", args[0].text))
                .at(self.pos(&args[1])));
        }
        let name = ty
            .class_name()
            .ok_or_else(|| Error::InvalidType(args[0].text.clone()).at(pos))?;
        let idx = self.pool.class(&name).map_err(|e| e.at(pos))?;
        Ok(Resolved::new(op, Operand::MultiANewArray(idx, dims as u8)).with_stack(dims as u16, 1))
    }

    fn iinc(&mut self, op: Opcode, args: &[Word]) -> Result<Resolved, Located> {
        let slot = self.local(Opcode::ISTORE, &args[0])?;
        let delta: i16 = ranged(int(&args[1], self.line)?, "iinc", self.pos(&args[1]))?;
        let wide = slot > u8::MAX as u16 || i8::try_from(delta).is_err();
        Ok(Resolved {
            wide,
            ..Resolved::new(op, Operand::Iinc(slot, delta))
        })
    }

    fn branch(&mut self, op: Opcode, arg: &Word) -> Result<Resolved, Located> {
        if !is_identifier(&arg.text) {
            return Err(Error::UnexpectedToken(arg.text.clone()).at(self.pos(arg)));
        }
        self.method.reference(&arg.text, self.line);
        Ok(Resolved::new(op, Operand::Label(arg.text.clone())))
    }
}

/// Resolve the operands of `op`.
///
/// `pos` locates the mnemonic; errors about one operand carry its column.
/// Switch opcodes resolve to [`Operand::None`]; their bodies follow on later lines.
pub fn resolve(op: Opcode, args: &[Word], pos: Pos, ctx: &mut Ctx) -> Result<Resolved, Located> {
    if op.arg() == Arg::Restricted {
        return Err(Error::RestrictedInstruction(op.mnemonic()).at(pos));
    }
    check_arity(op, args, pos)?;
    let line = ctx.line;
    match op.arg() {
        Arg::None | Arg::TableSwitch | Arg::LookupSwitch | Arg::Restricted => {
            if let Some(slot) = op.local_slot() {
                ctx.method.touch_slot(slot, op.local_width());
            }
            Ok(Resolved::new(op, Operand::None))
        }
        Arg::Byte => {
            let n: i8 = ranged(int(&args[0], line)?, "bipush", ctx.pos(&args[0]))?;
            Ok(Resolved::new(op, Operand::Byte(n)))
        }
        Arg::Short => {
            let n: i16 = ranged(int(&args[0], line)?, "sipush", ctx.pos(&args[0]))?;
            Ok(Resolved::new(op, Operand::Short(n)))
        }
        Arg::Local => {
            let slot = ctx.local(op, &args[0])?;
            let width = match ctx.method.local(&args[0].text) {
                Some(local) => local.ty.slots(),
                None => op.local_width(),
            };
            ctx.method.touch_slot(slot, width);
            Ok(Resolved {
                wide: slot > u8::MAX as u16,
                ..Resolved::new(op, Operand::Local(slot))
            })
        }
        Arg::Const | Arg::ConstW => ctx.constant(op, &args[0]),
        Arg::Const2W => ctx.constant2(op, &args[0]),
        Arg::Field => ctx.field(op, &args[0]),
        Arg::Method | Arg::InterfaceMethod => ctx.method_operand(op, &args[0]),
        Arg::Class => ctx.class(op, &args[0]),
        Arg::Branch | Arg::BranchW => ctx.branch(op, &args[0]),
        Arg::Iinc => ctx.iinc(op, args),
        Arg::NewArray => {
            let ty = args[0]
                .text
                .parse::<ArrayType>()
                .map_err(|_| Error::InvalidType(args[0].text.clone()).at(ctx.pos(&args[0])))?;
            Ok(Resolved::new(op, Operand::U1(ty.into())))
        }
        Arg::MultiANewArray => ctx.multi_array(op, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::line::split_args;
    use crate::resolver::{Constant, MetadataTable};
    use arch::access::{AccessFlags, ACC_STATIC};

    struct Fixture {
        table: MetadataTable,
        pool: ConstantPool,
        method: MethodBuilder,
        fields: IndexMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut method = MethodBuilder::new(
                "run",
                "run",
                AccessFlags(ACC_STATIC),
                JavaType::Void,
                JavaType::object("demo.Main"),
                Pos::new(1, 1),
            );
            method.add_parameter("count", JavaType::Int).unwrap();
            method.add_parameter("name", JavaType::object("java.lang.String")).unwrap();
            let mut fields = IndexMap::new();
            fields.insert("total".to_string(), "J".to_string());
            Self {
                table: MetadataTable::new(),
                pool: ConstantPool::new(),
                method,
                fields,
            }
        }

        fn run(&mut self, mnemonic: &str, operands: &str) -> Result<Resolved, Located> {
            let mut resolver = Resolver::new(&self.table);
            resolver.set_package("demo").unwrap();
            resolver.enter_class("Main").unwrap();
            let op = Opcode::parse(mnemonic).unwrap();
            let args = split_args(&Word::new(operands, 10));
            let mut ctx = Ctx {
                resolver: &resolver,
                pool: &mut self.pool,
                method: &mut self.method,
                fields: &self.fields,
                interface: false,
                line: 3,
            };
            resolve(op, &args, Pos::new(3, 5), &mut ctx)
        }
    }

    #[test]
    fn immediates() {
        let mut f = Fixture::new();
        assert_eq!(f.run("bipush", "(2+1)*4-2").unwrap().operand, Operand::Byte(10));
        assert_eq!(f.run("sipush", "-300").unwrap().operand, Operand::Short(-300));
        let e = f.run("bipush", "200").unwrap_err();
        assert!(matches!(e.error, Error::ValueOutOfRange(_, _)));
        assert_eq!(e.pos, Pos::new(3, 10));
        assert!(matches!(
            f.run("bipush", "").unwrap_err().error,
            Error::MissingOperand(_)
        ));
        assert!(matches!(
            f.run("iconst_0", "1").unwrap_err().error,
            Error::ExtraOperand(_)
        ));
        assert!(matches!(
            f.run("invokedynamic", "x").unwrap_err().error,
            Error::RestrictedInstruction(_)
        ));
    }

    #[test]
    fn locals() {
        let mut f = Fixture::new();
        assert_eq!(f.run("iload", "count").unwrap().operand, Operand::Local(0));
        assert_eq!(f.run("aload", "name").unwrap().operand, Operand::Local(1));
        assert!(matches!(
            f.run("aload", "count").unwrap_err().error,
            Error::TypeMismatch { .. }
        ));
        assert!(matches!(
            f.run("iload", "missing").unwrap_err().error,
            Error::UnboundSymbol(_)
        ));
        let wide = f.run("istore", "300").unwrap();
        assert!(wide.wide);
        assert_eq!(wide.operand, Operand::Local(300));

        let inc = f.run("iinc", "count, 10").unwrap();
        assert!(!inc.wide);
        assert_eq!(inc.operand, Operand::Iinc(0, 10));
        assert!(f.run("iinc", "count, 1000").unwrap().wide);
    }

    #[test]
    fn constants() {
        let mut f = Fixture::new();
        assert!(matches!(f.run("ldc", "\"hi\"").unwrap().operand, Operand::U1(_)));
        assert!(matches!(f.run("ldc", "1.5f").unwrap().operand, Operand::U1(_)));
        assert!(matches!(
            f.run("ldc", "5000000000").unwrap_err().error,
            Error::ValueOutOfRange(_, _)
        ));
        let long = f.run("ldc2_w", "5000000000L").unwrap();
        let Operand::U2(idx) = long.operand else {
            panic!("unexpected {long:?}")
        };
        assert_eq!(f.pool.describe(idx), "5000000000L");
        assert!(matches!(
            f.run("ldc", "true").unwrap_err().error,
            Error::TypeMismatch { .. }
        ));
    }

    #[test]
    fn constant_widths() {
        let mut f = Fixture::new();
        for (op, text, found) in [
            ("ldc", "5L", "long"),
            ("ldc_w", "1.5d", "double"),
            ("ldc2_w", "5", "int"),
            ("ldc2_w", "1.5f", "float"),
        ] {
            match f.run(op, text).unwrap_err().error {
                Error::TypeMismatch { found: actual, .. } => assert_eq!(actual, found, "{op} {text}"),
                other => panic!("{op} {text}: {other:?}"),
            }
        }
        let Operand::U2(idx) = f.run("ldc2_w", "1.5").unwrap().operand else {
            panic!("ldc2_w 1.5")
        };
        assert_eq!(f.pool.get(idx), Some(&Constant::Double(1.5f64.to_bits())));
        let Operand::U1(idx) = f.run("ldc", "2.5").unwrap().operand else {
            panic!("ldc 2.5")
        };
        assert_eq!(f.pool.get(idx as u16), Some(&Constant::Float(2.5f32.to_bits())));
    }

    #[test]
    fn members() {
        let mut f = Fixture::new();
        let out = f.run("getstatic", "System.out").unwrap();
        let Operand::U2(idx) = out.operand else {
            panic!("unexpected {out:?}")
        };
        assert!(f.pool.describe(idx).contains("java/lang/System.out"));

        let own = f.run("getstatic", "total").unwrap();
        assert!(matches!(own.operand, Operand::U2(_)));
        assert_eq!(
            f.run("putstatic", "later").unwrap().operand,
            Operand::OwnField {
                name: "later".into(),
                descriptor: None
            }
        );

        let call = f.run("invokevirtual", "java.io.PrintStream.println(I)V").unwrap();
        assert!(matches!(call.operand, Operand::U2(_)));
        assert_eq!(call.stack, Some((2, 0)));
        assert_eq!(f.run("getstatic", "total").unwrap().stack, Some((0, 2)));
        assert_eq!(f.run("putstatic", "later").unwrap().stack, None);
        let init = f.run("invokespecial", "java.lang.Object.Object()V").unwrap();
        let Operand::U2(idx) = init.operand else {
            panic!("unexpected {init:?}")
        };
        assert!(f.pool.describe(idx).contains("<init>"));

        let run = f.run("invokeinterface", "Runnable.run()V").unwrap();
        assert!(matches!(run.operand, Operand::Interface(_, 1)));
        assert_eq!(run.stack, Some((1, 0)));
        assert!(matches!(
            f.run("invokeinterface", "String.length()I").unwrap_err().error,
            Error::InvalidType(_)
        ));
    }

    #[test]
    fn types() {
        let mut f = Fixture::new();
        assert!(f.run("new", "StringBuilder").is_ok());
        assert!(f.run("new", "int[]").is_err());
        assert!(f.run("anewarray", "String").is_ok());
        assert!(f.run("anewarray", "int").is_err());
        assert_eq!(
            f.run("newarray", "int").unwrap().operand,
            Operand::U1(ArrayType::Int.into())
        );
        assert!(matches!(
            f.run("newarray", "string").unwrap_err().error,
            Error::InvalidType(_)
        ));
        assert!(matches!(
            f.run("multianewarray", "String[][], 2").unwrap().operand,
            Operand::MultiANewArray(_, 2)
        ));
        assert!(matches!(
            f.run("multianewarray", "String[][], 3").unwrap_err().error,
            Error::ValueOutOfRange(_, _)
        ));
    }

    #[test]
    fn labels() {
        let mut f = Fixture::new();
        assert_eq!(
            f.run("goto", "L1").unwrap().operand,
            Operand::Label("L1".into())
        );
        assert!(f.run("goto", "1 + 2").is_err());
    }
}
