use arch::access::AccessFlags;
use cfasm::module::disasm::{decode, Operand};
use cfasm::module::Attribute;
use cfasm::resolver::Constant;
use cfasm::{read, write, Assembler, Config, MetadataTable, Module, StrSource};

const COUNTER: &str = "\
.package demo
.import com.example.Greeter

Counter .class public implements Greeter
LIMIT .field int public static final = 1000
NAME .field String public static final = \"counter\"
RATIO .field double public static final = 0.5
count .field int private

Counter .method void public
    .stack 2
    aload_0
    invokespecial Object.Object()V
    aload_0
    iconst_0
    putfield count
    return
Counter .end

greet .method void public
who .parameter String
    .stack 3
    getstatic System.out
    aload who
    invokevirtual java.io.PrintStream.println(Ljava/lang/String;)V
    aload_0
    dup
    getfield count
    iconst_1
    iadd
    putfield count
    return
greet .end

limit .method int public static
    .stack 1
    ldc 1000
    ireturn
limit .end
Counter .end
";

const METADATA: &str = r#"
- name: com.example.Greeter
  interface: true
  methods:
    - name: greet
      descriptor: (Ljava/lang/String;)V
"#;

const LATER: &str = "\
.version 1.4
.source \"Later.src\"
.vartable
Later .class public
bump .method void public static
    .begin
n .var long
    lload n
    putstatic later
    return
    .end
bump .end
later .field long public static
Later .end
";

fn assemble(src: &str) -> Module {
    let mut table = MetadataTable::new();
    table.extend_yaml(METADATA).unwrap();
    let out = Assembler::new(Config::default(), &table)
        .with_source_name("Counter.jasm")
        .assemble(&mut StrSource::new(src))
        .unwrap();
    for d in out.diagnostics.iter() {
        println!("{:>3}:{:<3} {}", d.line, d.column, d.message);
    }
    out.module.unwrap()
}

fn assert(name: &str, descriptor: &str, access: u16) {
    let module = assemble(COUNTER);
    let member = match descriptor.starts_with('(') {
        true => module.method(name, Some(descriptor)).map(|m| m.access),
        false => module.field(name).map(|f| f.access),
    };
    assert_eq!(member, Some(AccessFlags(access)), "{name}{descriptor}");
}

macro_rules! case {
    ($name:ident, $member:expr, $descriptor:expr, $access:expr) => {
        #[test]
        fn $name() {
            assert($member, $descriptor, $access);
        }
    };
}

case!(constant_field, "LIMIT", "I", 0x0019);
case!(instance_field, "count", "I", 0x0002);
case!(constructor, "<init>", "()V", 0x0001);
case!(interface_method, "greet", "(Ljava/lang/String;)V", 0x0001);
case!(static_method, "limit", "()I", 0x0009);

#[test]
fn header() {
    let module = assemble(COUNTER);
    assert_eq!(module.major_version, 49);
    assert_eq!(module.class_name(), Some("demo/Counter"));
    assert_eq!(
        module.pool.class_name(module.super_class),
        Some("java/lang/Object")
    );
    let interfaces: Vec<_> = module
        .interfaces
        .iter()
        .map(|i| module.pool.class_name(*i))
        .collect();
    assert_eq!(interfaces, vec![Some("com/example/Greeter")]);
    assert!(module.attributes.iter().any(|a| matches!(
        a,
        Attribute::SourceFile { file, .. } if module.pool.utf8_at(*file) == Some("Counter.jasm")
    )));
}

#[test]
fn constant_values() {
    let module = assemble(COUNTER);
    let value = |name: &str| {
        module.field(name).and_then(|f| {
            f.attributes.iter().find_map(|a| match a {
                Attribute::ConstantValue { value, .. } => module.pool.get(*value).cloned(),
                _ => None,
            })
        })
    };
    assert_eq!(value("LIMIT"), Some(Constant::Integer(1000)));
    assert_eq!(value("NAME").map(|c| matches!(c, Constant::String(_))), Some(true));
    assert_eq!(value("RATIO").map(|c| matches!(c, Constant::Double(_))), Some(true));
    assert_eq!(value("count"), None);
}

#[test]
fn pool_is_deduplicated() {
    let module = assemble(COUNTER);
    // `count` fieldref and the 1000 integer are shared by every user
    let entries: Vec<&Constant> = module.pool.iter().map(|(_, c)| c).collect();
    let ints = entries
        .iter()
        .filter(|c| matches!(c, Constant::Integer(1000)))
        .count();
    assert_eq!(ints, 1);
    let fieldrefs = entries
        .iter()
        .filter(|c| matches!(c, Constant::Fieldref(..)))
        .count();
    assert_eq!(fieldrefs, 2);
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn read_back() {
    let module = assemble(COUNTER);
    let bytes = write(&module);
    let parsed = read(&bytes).unwrap();
    assert_eq!(parsed, module);
    assert_eq!(write(&parsed), bytes);
}

#[test]
fn reassembly_is_byte_identical() {
    let first = write(&assemble(COUNTER));
    let second = write(&assemble(COUNTER));
    assert_eq!(first, second);
}

#[test]
fn line_numbers() {
    let module = assemble(COUNTER);
    let limit = module.method("limit", None).unwrap();
    let code = limit.code().unwrap();
    let lines = code
        .attributes
        .iter()
        .find_map(|a| match a {
            Attribute::LineNumberTable { lines, .. } => Some(lines.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!((lines[0].start, lines[0].line), (0, 37));
    assert_eq!((lines[1].start, lines[1].line), (2, 38));
}

#[test]
fn forward_own_field() {
    let module = assemble(LATER);
    let code = module.method("bump", Some("()V")).unwrap().code().unwrap();
    let insns = decode(&code.code).unwrap();
    let Operand::Pool(idx) = insns[1].operand else {
        panic!("{:?}", insns[1].operand);
    };
    assert_eq!(module.pool.describe(idx), "Later.later:J");
    assert_eq!(code.max_stack, 2);
}

#[test]
fn class_directives() {
    let module = assemble(LATER);
    assert_eq!((module.major_version, module.minor_version), (48, 0));
    assert!(module.attributes.iter().any(|a| matches!(
        a,
        Attribute::SourceFile { file, .. } if module.pool.utf8_at(*file) == Some("Later.src")
    )));

    let code = module.method("bump", None).unwrap().code().unwrap();
    let vars = code
        .attributes
        .iter()
        .find_map(|a| match a {
            Attribute::LocalVariableTable { vars, .. } => Some(vars.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(vars.len(), 1);
    assert_eq!(module.pool.utf8_at(vars[0].name), Some("n"));
    assert_eq!(module.pool.utf8_at(vars[0].descriptor), Some("J"));
    assert_eq!((vars[0].start, vars[0].slot), (0, 0));
    assert_eq!(vars[0].length as usize, code.code.len());
}

#[test]
fn no_var_table_by_default() {
    let module = assemble(COUNTER);
    let code = module.method("greet", None).unwrap().code().unwrap();
    assert!(!code
        .attributes
        .iter()
        .any(|a| matches!(a, Attribute::LocalVariableTable { .. })));
}
