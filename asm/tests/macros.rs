use arch::op::Opcode::{self, *};
use cfasm::module::disasm::decode;
use cfasm::{assemble_str, Config, Error, Output};

fn unit(macros: &str, body: &str) -> String {
    format!(
        "\
{macros}
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

fn run(macros: &str, body: &str, config: &Config) -> Output {
    let out = assemble_str(&unit(macros, body), config).unwrap();
    for d in out.diagnostics.iter() {
        println!("{:>3}:{:<3} {:?} {}", d.line, d.column, d.severity, d.message);
    }
    out
}

fn ops(out: &Output) -> Vec<Opcode> {
    let module = out.module.as_ref().unwrap();
    let code = &module.method("run", None).unwrap().code().unwrap().code;
    decode(code).unwrap().iter().map(|i| i.op).collect()
}

fn assert(macros: &str, body: &str, expects: Vec<Opcode>) {
    let out = run(macros, body, &Config::default());
    assert!(out.is_ok());
    assert_eq!(ops(&out), expects);
}

macro_rules! case {
    ($name:ident, $macros:expr, $body:expr, $expects:expr) => {
        #[test]
        fn $name() {
            assert($macros, $body, $expects);
        }
    };
}

const REPEAT: &str = "\
macro repeat(count: int, op: str = \"nop\") {
    for i = 1 to count {
        emit op;
    }
}";

case!(
    loop_yields_each_iteration,
    REPEAT,
    "    repeat 4\n    return",
    vec![NOP, NOP, NOP, NOP, RETURN]
);

case!(
    named_argument,
    REPEAT,
    "    repeat op = \"iconst_0\", count = 2\n    pop2\n    return",
    vec![ICONST_0, ICONST_0, POP2, RETURN]
);

case!(
    zero_iterations,
    REPEAT,
    "    repeat 0\n    return",
    vec![RETURN]
);

case!(
    nested_invocation,
    "\
macro push(v: int) {
    if (v >= -1 && v <= 5) {
        emit \"iconst_&v\";
    } else {
        emit \"bipush &v\";
    }
}
macro pair(a: int, b: int) {
    emit \"push &a\";
    emit \"push &b\";
}",
    "    pair 3, 40\n    pop2\n    return",
    vec![ICONST_3, BIPUSH, POP2, RETURN]
);

case!(
    unique_labels,
    "\
macro skip() {
    emit \"goto Skip&{uniqueG()}\";
    emit \"nop\";
    emit \"Skip&{uniqueG()}:\";
}",
    "    skip\n    skip\n    return",
    vec![GOTO, NOP, GOTO, NOP, RETURN]
);

#[test]
fn loop_count_matches_argument() {
    for count in [1usize, 7, 64] {
        let out = run(REPEAT, &format!("    repeat {count}\n    return"), &Config::default());
        assert!(out.is_ok());
        let nops = ops(&out).iter().filter(|op| **op == NOP).count();
        assert_eq!(nops, count);
    }
}

#[test]
fn arity_mismatch_emits_nothing() {
    let out = run(REPEAT, "    repeat\n    repeat 1, \"nop\", 3\n    return", &Config::default());
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 2);
    assert!(errs
        .iter()
        .all(|e| matches!(e, Error::ArgumentCountMismatch(_, _))));
    assert!(out.module.is_none());
}

#[test]
fn recursion_is_bounded() {
    let config = Config {
        max_recursion_depth: 8,
        ..Config::default()
    };
    let out = run("macro again() {\n    emit \"again\";\n}", "    again\n    return", &config);
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], Error::MacroRecursionLimitExceeded(8)));
    // reported once, at the outermost invocation
    let first = out.diagnostics.iter().next().unwrap();
    assert_eq!(first.line, 8);
}

#[test]
fn iteration_limit() {
    let config = Config {
        max_iterations: 10,
        ..Config::default()
    };
    let out = run(REPEAT, "    repeat 100\n    return", &config);
    assert!(matches!(
        out.diagnostics.errors().next(),
        Some(Error::MacroExpansionLimitExceeded(10))
    ));
}

#[test]
fn division_by_zero_in_macro() {
    let out = run(
        "macro half(v: int) {\n    emit \"bipush &{v / 0}\";\n}",
        "    half 10\n    nop\n    return",
        &Config::default(),
    );
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], Error::ArithmeticError(_)));
}

#[test]
fn user_error_aborts_expansion() {
    let out = run(
        "\
macro checked(v: int) {
    emit \"nop\";
    if (v < 0) {
        error \"negative value \" # v;
    }
}",
        "    checked -3\n    return",
        &Config::default(),
    );
    assert!(matches!(
        out.diagnostics.errors().next(),
        Some(Error::MacroError(msg)) if msg == "negative value -3"
    ));
}

#[test]
fn duplicate_macro() {
    let out = run(
        "macro m() {\n}\nmacro m() {\n}",
        "    return",
        &Config::default(),
    );
    assert!(matches!(
        out.diagnostics.errors().next(),
        Some(Error::DuplicateMacroDefinition(name)) if name == "m"
    ));
}

#[test]
fn expansion_is_deterministic() {
    let src = unit(REPEAT, "    repeat 5, \"iconst_1\"\n    repeat 5, \"pop\"\n    return");
    let a = assemble_str(&src, &Config::default()).unwrap();
    let b = assemble_str(&src, &Config::default()).unwrap();
    assert_eq!(
        cfasm::write(a.module.as_ref().unwrap()),
        cfasm::write(b.module.as_ref().unwrap())
    );
}

const TWO: &str = "\
macro two(tag: str) {
    emit \"&tag:\";
    emit \"nop\";
    emit \"bipush 1000\";
}";

#[test]
fn failed_invocation_emits_nothing() {
    let out = run(TWO, "    two \"Here\"\n    two \"Here\"\n    return", &Config::default());
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 2);
    for e in errs {
        assert!(matches!(e, Error::ValueOutOfRange(_, _)), "{e}");
    }
}

#[test]
fn failed_invocation_leaves_no_label() {
    // a label surviving the failed expansion would stay defined here
    let out = run(TWO, "    two \"Here\"\nHere:\n    return", &Config::default());
    let errs: Vec<&Error> = out.diagnostics.errors().collect();
    assert_eq!(errs.len(), 1);
    assert!(matches!(errs[0], Error::ValueOutOfRange(_, _)));
}

#[test]
fn label_redefined_by_macro() {
    let out = run(
        "macro mark(tag: str) {\n    emit \"&tag:\";\n}",
        "Top:\n    mark \"Top\"\n    return",
        &Config::default(),
    );
    assert!(matches!(
        out.diagnostics.errors().next(),
        Some(Error::DuplicateLabel(name)) if name == "Top"
    ));
}

#[test]
fn block_arguments_are_not_interpolated() {
    let out = run(
        "macro put(b: block) {\n    emit b;\n}",
        "    put \"ldc \\\"a&&b\\\"\"\n    pop\n    return",
        &Config::default(),
    );
    let module = out.module.as_ref().unwrap();
    assert!(module
        .pool
        .iter()
        .any(|(idx, _)| module.pool.utf8_at(idx) == Some("a&&b")));
}
