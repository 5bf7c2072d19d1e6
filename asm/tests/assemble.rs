use arch::op::Opcode::{self, *};
use cfasm::module::disasm::{decode, Insn, Operand};
use cfasm::{assemble_str, Config, Error, Output};

fn unit(body: &str) -> String {
    format!(
        "\
Test .class public
run .method void public static
n .parameter int
    .stack 4
{body}
run .end
Test .end
"
    )
}

fn code(out: &Output) -> Vec<Insn> {
    let module = out.module.as_ref().unwrap();
    let method = module.method("run", Some("(I)V")).unwrap();
    decode(&method.code().unwrap().code).unwrap()
}

fn assert(body: &str, expects: Vec<Opcode>) {
    let out = assemble_str(&unit(body), &Config::default()).unwrap();
    for d in out.diagnostics.iter() {
        println!("{:>3}:{:<3} {}", d.line, d.column, d.message);
    }
    assert!(out.is_ok());

    let insns = code(&out);
    for insn in &insns {
        println!("{:>4}: {}", insn.offset, insn.op);
    }
    let ops: Vec<Opcode> = insns.iter().map(|i| i.op).collect();
    assert_eq!(ops, expects);
}

fn errors(body: &str) -> Vec<(usize, String)> {
    let out = assemble_str(&unit(body), &Config::default()).unwrap();
    assert!(out.module.is_none());
    out.diagnostics
        .iter()
        .filter(|d| d.error.is_some())
        .map(|d| (d.line, d.message.clone()))
        .collect()
}

macro_rules! case {
    ($name:ident, $body:expr, $expects:expr) => {
        #[test]
        fn $name() {
            assert($body, $expects);
        }
    };
}

case!(return_only, "    return", vec![RETURN]);

case!(
    constant_expressions,
    "    bipush (2+1)*4-2\n    sipush 0x7fff\n    pop2\n    return",
    vec![BIPUSH, SIPUSH, POP2, RETURN]
);

case!(
    named_locals,
    "    iload n\n    istore n\n    iinc n, -1\n    return",
    vec![ILOAD, ISTORE, IINC, RETURN]
);

case!(
    wide_locals,
    "    iload 300\n    istore 1\n    return",
    vec![ILOAD, ISTORE, RETURN]
);

case!(
    forward_label,
    "    iload n\n    ifeq Zero\n    iconst_1\n    pop\nZero:\n    return",
    vec![ILOAD, IFEQ, ICONST_1, POP, RETURN]
);

case!(
    backward_label,
    "Top:\n    iinc n, -1\n    iload n\n    ifne Top\n    return",
    vec![IINC, ILOAD, IFNE, RETURN]
);

case!(
    pool_constants,
    "    ldc 100000\n    pop\n    ldc2_w 5000000000L\n    pop2\n    ldc \"text\"\n    pop\n    return",
    vec![LDC, POP, LDC2_W, POP2, LDC, POP, RETURN]
);

case!(
    member_references,
    "    getstatic System.out\n    iload n\n    invokevirtual java.io.PrintStream.println(I)V\n    return",
    vec![GETSTATIC, ILOAD, INVOKEVIRTUAL, RETURN]
);

case!(
    object_creation,
    "    new StringBuilder\n    dup\n    invokespecial StringBuilder.StringBuilder()V\n    pop\n    return",
    vec![NEW, DUP, INVOKESPECIAL, POP, RETURN]
);

case!(
    arrays,
    "    iload n\n    newarray int\n    pop\n    iload n\n    anewarray String\n    pop\n    return",
    vec![ILOAD, NEWARRAY, POP, ILOAD, ANEWARRAY, POP, RETURN]
);

#[test]
fn operand_values() {
    let out = assemble_str(
        &unit("    bipush (2+1)*4-2\n    pop\n    iload n\n    ifeq End\n    nop\nEnd:\n    return"),
        &Config::default(),
    )
    .unwrap();
    let insns = code(&out);
    assert_eq!(insns[0].operand, Operand::Int(10));
    assert_eq!(insns[2].operand, Operand::Local(0));
    assert_eq!(insns[3].operand, Operand::Branch(9));
}

#[test]
fn wide_is_automatic() {
    let out = assemble_str(
        &unit("    iload 300\n    iinc n, 1000\n    iinc n, 1\n    return"),
        &Config::default(),
    )
    .unwrap();
    let insns = code(&out);
    assert!(insns[0].wide);
    assert_eq!(insns[0].operand, Operand::Local(300));
    assert!(insns[1].wide);
    assert_eq!(insns[1].operand, Operand::Iinc(0, 1000));
    assert!(!insns[2].wide);
    let method = out.module.as_ref().unwrap().method("run", None).unwrap();
    assert_eq!(method.code().unwrap().max_locals, 301);
}

#[test]
fn table_switch() {
    let body = "\
    iload n
    tableswitch
    1, One
    3, Three
    .default Other
    .end
One:
    return
Three:
    return
Other:
    return";
    let out = assemble_str(&unit(body), &Config::default()).unwrap();
    assert!(out.is_ok());
    let insns = code(&out);
    assert_eq!(insns[1].op, TABLESWITCH);
    // ILOAD takes two bytes, so the table starts after one pad byte
    let Operand::Table {
        default,
        low,
        targets,
    } = &insns[1].operand
    else {
        panic!("{:?}", insns[1].operand);
    };
    assert_eq!(*low, 1);
    assert_eq!(targets.len(), 3);
    assert_eq!(insns[2].offset, targets[0]);
    assert_eq!(targets[1], *default);
    assert_eq!(insns[3].offset, targets[2]);
    assert_eq!(insns[4].offset, *default);
}

#[test]
fn lookup_switch_sorts_keys() {
    let body = "\
    iload n
    lookupswitch
    100, Big
    -5, Small
    .default Small
    .end
Big:
    return
Small:
    return";
    let out = assemble_str(&unit(body), &Config::default()).unwrap();
    assert!(out.is_ok());
    let insns = code(&out);
    let Operand::Lookup { pairs, .. } = &insns[1].operand else {
        panic!("{:?}", insns[1].operand);
    };
    let keys: Vec<i32> = pairs.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![-5, 100]);
}

#[test]
fn try_catch() {
    let body = "\
    .try
    iload n
    iconst_1
    idiv
    pop
    return
    .catch ArithmeticException
    pop
    return
    .catch
    athrow
    .endtry";
    let out = assemble_str(&unit(body), &Config::default()).unwrap();
    assert!(out.is_ok());
    let module = out.module.as_ref().unwrap();
    let code = module.method("run", None).unwrap().code().unwrap();
    assert_eq!(code.exceptions.len(), 2);
    let first = code.exceptions[0];
    assert_eq!((first.start, first.end, first.handler), (0, 6, 6));
    assert_eq!(
        module.pool.class_name(first.catch_type),
        Some("java/lang/ArithmeticException")
    );
    let second = code.exceptions[1];
    assert_eq!((second.start, second.end, second.handler), (0, 6, 8));
    assert_eq!(second.catch_type, 0);
}

#[test]
fn division_by_zero_keeps_going() {
    let errs = errors("    bipush 10 / 0\n    bipush 1\n    pop\n    bogus\n    return");
    assert_eq!(errs.len(), 2);
    assert_eq!(errs[0].0, 5);
    assert!(errs[0].1.contains("10 / 0"), "{}", errs[0].1);
    assert_eq!(errs[1].0, 8);
}

#[test]
fn unresolved_label() {
    let out = assemble_str(&unit("    goto Nowhere\n    return"), &Config::default()).unwrap();
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], Error::UnresolvedSymbol(name, 5) if name == "Nowhere"));
}

#[test]
fn duplicate_label() {
    let out = assemble_str(&unit("L:\n    nop\nL:\n    return"), &Config::default()).unwrap();
    assert!(matches!(
        out.diagnostics.errors().next(),
        Some(Error::DuplicateLabel(name)) if name == "L"
    ));
}

#[test]
fn operand_errors() {
    let out = assemble_str(
        &unit("    bipush 200\n    iload missing\n    iadd 1\n    invokedynamic x\n    return"),
        &Config::default(),
    )
    .unwrap();
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 4);
    assert!(matches!(errs[0], Error::ValueOutOfRange(_, _)));
    assert!(matches!(errs[1], Error::UnboundSymbol(_)));
    assert!(matches!(errs[2], Error::ExtraOperand(_)));
    assert!(matches!(errs[3], Error::RestrictedInstruction(_)));
}

#[test]
fn deterministic_output() {
    let src = unit("    getstatic System.out\n    ldc \"x\"\n    invokevirtual java.io.PrintStream.println(Ljava/lang/String;)V\n    return");
    let a = assemble_str(&src, &Config::default()).unwrap();
    let b = assemble_str(&src, &Config::default()).unwrap();
    assert_eq!(
        cfasm::write(a.module.as_ref().unwrap()),
        cfasm::write(b.module.as_ref().unwrap())
    );
}

#[test]
fn oversized_string_constant() {
    let text = "a".repeat(70000);
    let out = assemble_str(&unit(&format!("    ldc \"{text}\"\n    pop\n    return")), &Config::default())
        .unwrap();
    assert!(out.module.is_none());
    let errs: Vec<(usize, &Error)> = out
        .diagnostics
        .iter()
        .filter_map(|d| d.error.as_ref().map(|e| (d.line, e)))
        .collect();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].0, 5);
    assert!(matches!(errs[0].1, Error::ConstantTooLong(70000)));
}

#[test]
fn literal_suffixes_select_constant_width() {
    let out = assemble_str(
        &unit("    ldc 5L\n    ldc_w 1.5d\n    ldc2_w 1.5f\n    ldc2_w 5\n    return"),
        &Config::default(),
    )
    .unwrap();
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 4);
    for e in errs {
        assert!(matches!(e, Error::TypeMismatch { .. }), "{e}");
    }
}

case!(
    wide_constants,
    "    ldc2_w 2.5\n    pop2\n    ldc2_w 7l\n    pop2\n    ldc 1.5f\n    pop\n    return",
    vec![LDC2_W, POP2, LDC2_W, POP2, LDC, POP, RETURN]
);

fn max_stack(mode: &str) -> u16 {
    let src = format!(
        "\
Test .class public
run .method int public static
n .parameter int
    .stack {mode}
    iload n
    iconst_1
    iadd
    iconst_2
    imul
    ireturn
run .end
Test .end
"
    );
    let out = assemble_str(&src, &Config::default()).unwrap();
    assert!(out.is_ok());
    let module = out.module.unwrap();
    let code = module.method("run", None).unwrap().code().unwrap();
    code.max_stack
}

#[test]
fn stack_modes() {
    assert_eq!(max_stack("7"), 7);
    assert_eq!(max_stack("optimistic"), 2);
    // every push counts, pops are ignored
    assert_eq!(max_stack("pessimistic"), 3);
}

#[test]
fn scopes_reuse_slots() {
    let src = "\
Test .class public
run .method void public static
    .begin
a .var int
    iinc a, 1
    .end
    .begin
b .var int
    iinc b, 1
    .end
    return
run .end
Test .end
";
    let out = assemble_str(src, &Config::default()).unwrap();
    assert!(out.is_ok());
    let module = out.module.unwrap();
    let code = module.method("run", None).unwrap().code().unwrap();
    assert_eq!(code.max_locals, 1);
    let insns = decode(&code.code).unwrap();
    assert_eq!(insns[0].operand, Operand::Iinc(0, 1));
    assert_eq!(insns[1].operand, Operand::Iinc(0, 1));
}

#[test]
fn scope_names_end_with_scope() {
    let errs = errors("    .begin\nx .var int\n    .end\n    iinc x, 1\n    return");
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].0, 8);
}
