use crate::error::Error;
use crate::module::disasm::decode;
use crate::module::{Attribute, Module};
use arch::access::{Target, ACC_INTERFACE};
use color_print::cformat;

const RULE: &str = "+---------+-----------------------------------------------------------------";

fn section(name: &str) -> String {
    format!("+-[{name:<6}]{}", &RULE[10..])
}

/// Colored listing of a module: header, constant pool, fields and disassembled methods.
pub fn listing(module: &Module) -> Result<Vec<String>, Error> {
    let pool = &module.pool;
    let mut out = Vec::new();

    let target = match module.access.contains(ACC_INTERFACE) {
        true => Target::Interface,
        false => Target::Class,
    };
    out.push(section("Class"));
    out.push(cformat!(
        "| <g>{}</> {} {} (version {}.{})",
        pool.class_name(module.this_class).unwrap_or("?"),
        target,
        module.access.keywords(target).join(" "),
        module.major_version,
        module.minor_version
    ));
    out.push(format!(
        "| extends {}",
        pool.class_name(module.super_class).unwrap_or("?")
    ));
    for idx in &module.interfaces {
        out.push(format!("| implements {}", pool.class_name(*idx).unwrap_or("?")));
    }
    for attr in &module.attributes {
        if let Attribute::SourceFile { file, .. } = attr {
            out.push(format!("| source {}", pool.describe(*file)));
        }
    }

    out.push(section("Pool"));
    for (idx, constant) in pool.iter() {
        out.push(cformat!(
            "| #{:<6} <m>{:<18}</> {}",
            idx,
            constant.tag().to_string(),
            pool.describe(idx)
        ));
    }

    out.push(section("Field"));
    for field in &module.fields {
        let mut line = cformat!(
            "| <c>{}</> : {} {}",
            pool.describe(field.name),
            pool.describe(field.descriptor),
            field.access.keywords(Target::Field).join(" ")
        );
        for attr in &field.attributes {
            if let Attribute::ConstantValue { value, .. } = attr {
                line.push_str(&format!(" = {}", pool.describe(*value)));
            }
        }
        out.push(line);
    }

    out.push(section("Method"));
    for method in &module.methods {
        out.push(cformat!(
            "+---------+ <g>{}</>{} {}",
            pool.describe(method.name),
            pool.describe(method.descriptor),
            method.access.keywords(Target::Method).join(" ")
        ));
        let Some(code) = method.code() else {
            continue;
        };
        out.push(format!(
            "| stack {} locals {}",
            code.max_stack, code.max_locals
        ));
        for insn in decode(&code.code)? {
            out.push(format!("| 0x{:04X} : {}", insn.offset, insn.render(pool)));
        }
        for e in &code.exceptions {
            let ty = match e.catch_type {
                0 => "any".to_string(),
                idx => pool.describe(idx),
            };
            out.push(cformat!(
                "| <y>try</> 0x{:04X}..0x{:04X} -> 0x{:04X} {}",
                e.start,
                e.end,
                e.handler,
                ty
            ));
        }
        for attr in &code.attributes {
            if let Attribute::LocalVariableTable { vars, .. } = attr {
                for v in vars {
                    out.push(cformat!(
                        "| <c>var</> {} {} : {} 0x{:04X}+{}",
                        v.slot,
                        pool.describe(v.name),
                        pool.describe(v.descriptor),
                        v.start,
                        v.length
                    ));
                }
            }
        }
    }
    out.push(RULE.to_string());
    Ok(out)
}
