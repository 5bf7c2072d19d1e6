//! Line-driven assembler: directives, instructions and macro invocations.

pub mod class;
pub mod directive;
pub mod line;
pub mod method;
pub mod operand;

use crate::config::Config;
use crate::diag::Diagnostics;
use crate::error::{Error, Located};
use crate::expr::eval_const;
use crate::expr::token::Pos;
use crate::expr::Value;
use crate::macros::registry::header_name;
use crate::macros::{expand, Arg, MacroRegistry, MacroSource};
use crate::module::Module;
use crate::resolver::{is_identifier, ConstantPool, DescriptorProvider, MetadataTable, Resolver};
use crate::source::{LineSource, StrSource};
use arch::op::{Arg as Shape, Opcode};
use class::ClassBuilder;
use directive::{class_header, class_version, declaration, Directive, Naming};
use line::{split_args, strip_comment, Line, Word};
use method::{MethodBuilder, StackMode};
use operand::Ctx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ReadingLine,
    ParsingMnemonic,
    ExpandingMacro,
    ResolvingOperands,
    Emitting,
    Done,
    Failed,
}

/// Result of one assembly unit.
#[derive(Debug)]
pub struct Output {
    /// Present only when no error was reported
    pub module: Option<Module>,
    pub diagnostics: Diagnostics,
}

impl Output {
    pub fn is_ok(&self) -> bool {
        self.module.is_some() && !self.diagnostics.has_errors()
    }
}

#[derive(Debug)]
struct Frame {
    name: String,
    pos: Pos,
}

/// Assembly state restored when a macro invocation fails.
struct Snapshot<'p> {
    resolver: Resolver<'p>,
    pool: ConstantPool,
    class: Option<ClassBuilder>,
    method: Option<MethodBuilder>,
    module: Option<Module>,
    config: Config,
    source_name: Option<String>,
    var_table: bool,
}

pub struct Assembler<'p> {
    config: Config,
    registry: MacroRegistry,
    resolver: Resolver<'p>,
    pool: ConstantPool,
    class: Option<ClassBuilder>,
    method: Option<MethodBuilder>,
    module: Option<Module>,
    diags: Diagnostics,
    expansions: Vec<Frame>,
    invocations: i64,
    aborted: bool,
    state: State,
    source_name: Option<String>,
    /// `.vartable` given outside a method
    var_table: bool,
}

fn at(pos: Pos) -> impl Fn(Error) -> Located {
    move |e| e.at(pos)
}

impl<'p> Assembler<'p> {
    pub fn new(config: Config, provider: &'p dyn DescriptorProvider) -> Self {
        Self {
            config,
            registry: MacroRegistry::new(),
            resolver: Resolver::new(provider),
            pool: ConstantPool::new(),
            class: None,
            method: None,
            module: None,
            diags: Diagnostics::new(),
            expansions: Vec::new(),
            invocations: 0,
            aborted: false,
            state: State::ReadingLine,
            source_name: None,
            var_table: false,
        }
    }

    /// File name recorded in the `SourceFile` attribute.
    pub fn with_source_name(mut self, name: &str) -> Self {
        self.source_name = Some(name.to_string());
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Assemble the whole unit.
    ///
    /// Only IO failures return `Err`; every other defect becomes a diagnostic.
    pub fn assemble(mut self, src: &mut impl LineSource) -> Result<Output, Error> {
        let mut lines = Vec::new();
        while !src.end_of_input() {
            match src.next_line() {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break,
                Err(e) => {
                    self.state = State::Failed;
                    return Err(e);
                }
            }
        }

        let consumed = self.collect_macros(&lines);
        for (idx, raw) in lines.iter().enumerate() {
            if consumed[idx] {
                continue;
            }
            self.process_line(raw, idx + 1, 0);
        }
        self.finish(lines.len());
        self.state = State::Done;

        let module = match self.diags.has_errors() {
            true => None,
            false => self.module,
        };
        Ok(Output {
            module,
            diagnostics: self.diags,
        })
    }

    // ------------------------------------------------------------------------
    // Macro pre-scan

    /// Register every `macro` definition of the unit; returns the lines they occupy.
    fn collect_macros(&mut self, lines: &[String]) -> Vec<bool> {
        let mut consumed = vec![false; lines.len()];
        let mut sources = Vec::new();
        let mut idx = 0;
        while idx < lines.len() {
            let Some(name) = header_name(strip_comment(&lines[idx])) else {
                idx += 1;
                continue;
            };
            let start = idx;
            let mut depth = 0i32;
            let mut opened = false;
            let mut text = Vec::new();
            while idx < lines.len() {
                let line = &lines[idx];
                consumed[idx] = true;
                text.push(line.as_str());
                idx += 1;
                for delta in braces(strip_comment(line)) {
                    depth += delta;
                    opened = true;
                }
                if opened && depth <= 0 {
                    break;
                }
            }
            if !opened || depth > 0 {
                self.diags
                    .error(Error::UnclosedMacro(name), start + 1, 1);
                continue;
            }
            sources.push(MacroSource {
                name,
                text: text.join("\n"),
                line: start + 1,
            });
        }
        for e in self.registry.register_all(&sources) {
            self.diags.error(e.error, e.pos.line, e.pos.column);
        }
        consumed
    }

    // ------------------------------------------------------------------------
    // Line processing

    fn report(&mut self, e: Located) {
        match self.expansions.first() {
            None => self.diags.error(e.error, e.pos.line, e.pos.column),
            Some(outer) => {
                let pos = outer.pos;
                self.diags.error(e.error, pos.line, pos.column);
                for frame in self.expansions.iter().rev() {
                    self.diags.note(
                        format!("in expansion of macro `{}`", frame.name),
                        pos.line,
                        pos.column,
                    );
                }
            }
        }
    }

    fn process_line(&mut self, raw: &str, line: usize, depth: usize) {
        self.state = State::ParsingMnemonic;
        let parsed = line::parse(raw);
        if let Err(e) = self.dispatch(parsed, line, depth) {
            self.report(e);
        }
        self.state = State::ReadingLine;
    }

    fn dispatch(&mut self, line: Line, n: usize, depth: usize) -> Result<(), Located> {
        if let Some(label) = &line.label {
            let pos = Pos::new(n, label.column);
            let method = match self.method.as_mut() {
                Some(m) if !m.in_switch() => m,
                _ => return Err(Error::Misplaced(format!("{}:", label.text)).at(pos)),
            };
            method.define_label(&label.text, n).map_err(at(pos))?;
        }

        let Some(command) = line.command else {
            return match (line.name, line.operands) {
                (_, Some(ops)) => self.switch_entry(&ops, n),
                (Some(name), None) => Err(Error::MissingOperand(format!(
                    "directive after `{}`",
                    name.text
                ))
                .at(Pos::new(n, name.column))),
                (None, None) => Ok(()),
            };
        };
        let pos = Pos::new(n, command.column);
        if command.text.starts_with('.') {
            let directive = Directive::parse(&command.text).map_err(at(pos))?;
            return self.directive(directive, line.name, line.operands, pos);
        }
        if self.registry.contains(&command.text) {
            return self.expand_macro(&command.text, line.operands, pos, depth);
        }
        let op = Opcode::parse(&command.text)
            .map_err(|_| Error::UnknownInstruction(command.text.clone()).at(pos))?;
        self.instruction(op, line.operands, pos)
    }

    fn expand_macro(
        &mut self,
        name: &str,
        operands: Option<Word>,
        pos: Pos,
        depth: usize,
    ) -> Result<(), Located> {
        self.state = State::ExpandingMacro;
        if depth >= self.config.max_recursion_depth {
            self.aborted = true;
            return Err(Error::MacroRecursionLimitExceeded(self.config.max_recursion_depth).at(pos));
        }
        let args: Vec<Arg> = operands
            .map(|ops| split_args(&ops))
            .unwrap_or_default()
            .iter()
            .map(|w| Arg::from_text(&w.text))
            .collect();
        self.invocations += 1;
        let lines = match self.registry.get(name) {
            Some(Ok(def)) => expand(def, &args, self.config.max_iterations, self.invocations),
            Some(Err(e)) => Err(e),
            None => Err(Error::UnknownInstruction(name.to_string())),
        }
        .map_err(at(pos))?;

        let snapshot = (depth == 0).then(|| self.snapshot());
        let errors = self.diags.error_count();
        self.expansions.push(Frame {
            name: name.to_string(),
            pos,
        });
        for text in &lines {
            if self.aborted {
                break;
            }
            self.process_line(text, pos.line, depth + 1);
        }
        self.expansions.pop();
        if depth == 0 {
            self.aborted = false;
        }
        // a failed invocation leaves nothing behind
        if let Some(snapshot) = snapshot {
            if self.diags.error_count() > errors {
                self.restore(snapshot);
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot<'p> {
        Snapshot {
            resolver: self.resolver.clone(),
            pool: self.pool.clone(),
            class: self.class.clone(),
            method: self.method.clone(),
            module: self.module.clone(),
            config: self.config.clone(),
            source_name: self.source_name.clone(),
            var_table: self.var_table,
        }
    }

    fn restore(&mut self, s: Snapshot<'p>) {
        self.resolver = s.resolver;
        self.pool = s.pool;
        self.class = s.class;
        self.method = s.method;
        self.module = s.module;
        self.config = s.config;
        self.source_name = s.source_name;
        self.var_table = s.var_table;
    }

    // ------------------------------------------------------------------------
    // Instructions

    fn instruction(&mut self, op: Opcode, operands: Option<Word>, pos: Pos) -> Result<(), Located> {
        let (Some(method), Some(class)) = (self.method.as_mut(), self.class.as_ref()) else {
            return Err(Error::Misplaced(op.mnemonic()).at(pos));
        };
        if method.in_switch() {
            return Err(Error::Misplaced(op.mnemonic()).at(pos));
        }
        if !method.code_allowed() {
            return Err(Error::UnexpectedCode(method.name.clone()).at(pos));
        }
        if method.stack.is_none() {
            return Err(Error::MissingStack(method.name.clone()).at(pos));
        }

        self.state = State::ResolvingOperands;
        let args = operands.map(|ops| split_args(&ops)).unwrap_or_default();
        let mut ctx = Ctx {
            resolver: &self.resolver,
            pool: &mut self.pool,
            method: &mut *method,
            fields: class.field_types(),
            interface: class.is_interface(),
            line: pos.line,
        };
        let resolved = operand::resolve(op, &args, pos, &mut ctx)?;

        self.state = State::Emitting;
        match resolved.op.arg() {
            Shape::TableSwitch | Shape::LookupSwitch => method.begin_switch(resolved.op, pos),
            _ => method.emit(resolved, pos, &self.config),
        }
        Ok(())
    }

    /// `key, label` inside a switch body.
    fn switch_entry(&mut self, operands: &Word, n: usize) -> Result<(), Located> {
        let pos = Pos::new(n, operands.column);
        let method = match self.method.as_mut() {
            Some(m) if m.in_switch() => m,
            _ => return Err(Error::UnexpectedToken(operands.text.clone()).at(pos)),
        };
        let args = split_args(operands);
        let [key, label] = args.as_slice() else {
            return Err(Error::MissingOperand("`key, label`".to_string()).at(pos));
        };
        let key_pos = Pos::new(n, key.column);
        let key = match eval_const(&key.text, key_pos)? {
            Value::Int(k) => i32::try_from(k)
                .map_err(|_| Error::ValueOutOfRange(k.to_string(), "switch key".to_string()))
                .map_err(at(key_pos))?,
            other => return Err(Error::mismatch("int", other.ty()).at(key_pos)),
        };
        if !is_identifier(&label.text) {
            return Err(Error::UnexpectedToken(label.text.clone()).at(Pos::new(n, label.column)));
        }
        method.switch_entry(key, &label.text, n).map_err(at(pos))
    }

    // ------------------------------------------------------------------------
    // Directives

    fn directive(
        &mut self,
        d: Directive,
        name: Option<Word>,
        operands: Option<Word>,
        pos: Pos,
    ) -> Result<(), Located> {
        let here = at(pos);
        match (d.naming(), &name) {
            (Naming::Required, None) => {
                return Err(here(Error::MissingOperand(format!("name before `.{d}`"))))
            }
            (Naming::Forbidden, Some(n)) => {
                return Err(Error::UnexpectedToken(n.text.clone()).at(Pos::new(pos.line, 1)))
            }
            _ => {}
        }
        let in_switch = self.method.as_ref().map(|m| m.in_switch()).unwrap_or(false);
        if in_switch && !matches!(d, Directive::Default | Directive::End) {
            return Err(here(Error::Misplaced(format!(".{d}"))));
        }
        let name = name.map(|w| w.text).unwrap_or_default();
        let text = operands.as_ref().map(|w| w.text.clone()).unwrap_or_default();
        let no_operands = || match &operands {
            Some(w) => Err(Error::ExtraOperand(w.text.clone()).at(Pos::new(pos.line, w.column))),
            None => Ok(()),
        };

        match d {
            Directive::Package | Directive::Import => {
                if self.class.is_some() || self.module.is_some() {
                    return Err(here(Error::Misplaced(format!(".{d}"))));
                }
                if text.is_empty() {
                    return Err(here(Error::MissingOperand(format!("name after `.{d}`"))));
                }
                match d {
                    Directive::Package => self.resolver.set_package(&text),
                    _ => self.resolver.import(&text),
                }
                .map_err(here)
            }
            Directive::Class | Directive::Interface => {
                if self.class.is_some() || self.module.is_some() {
                    return Err(here(Error::Misplaced(format!(".{d}"))));
                }
                let header = class_header(&text).map_err(&here)?;
                let class = ClassBuilder::open(
                    &mut self.resolver,
                    &mut self.pool,
                    &name,
                    d == Directive::Interface,
                    header,
                    pos,
                )
                .map_err(here)?;
                self.class = Some(class);
                Ok(())
            }
            Directive::Field => {
                let class = match (self.class.as_mut(), &self.method) {
                    (Some(c), None) => c,
                    _ => return Err(here(Error::Misplaced(".field".to_string()))),
                };
                let decl = declaration(operands.as_ref()).map_err(&here)?;
                class.add_field(&self.resolver, &mut self.pool, &name, decl, pos.line)
            }
            Directive::Method => {
                let class = match (self.class.as_ref(), &self.method) {
                    (Some(c), None) => c,
                    _ => return Err(here(Error::Misplaced(".method".to_string()))),
                };
                let decl = declaration(operands.as_ref()).map_err(&here)?;
                let mut method = class
                    .begin_method(&self.resolver, &name, decl, pos)
                    .map_err(here)?;
                method.var_table = self.var_table;
                self.method = Some(method);
                Ok(())
            }
            Directive::Parameter | Directive::Var => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(format!(".{d}"))))?;
                let decl = declaration(operands.as_ref()).map_err(&here)?;
                if let Some(value) = decl.value {
                    return Err(Error::UnexpectedToken(value.text).at(Pos::new(pos.line, value.column)));
                }
                if let Some(m) = decl.modifiers.iter().find(|m| m.as_str() != "final") {
                    return Err(here(Error::InvalidModifier(m.clone())));
                }
                if !is_identifier(&name) {
                    return Err(Error::InvalidType(name).at(Pos::new(pos.line, 1)));
                }
                let ty = self.resolver.resolve_type(&decl.ty).map_err(&here)?;
                match d {
                    Directive::Parameter => method.add_parameter(&name, ty),
                    _ => method.add_var(&name, ty),
                }
                .map(|_| ())
                .map_err(here)
            }
            Directive::Stack => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(".stack".to_string())))?;
                let ops = operands
                    .as_ref()
                    .ok_or_else(|| here(Error::MissingOperand("value after `.stack`".to_string())))?;
                let value_pos = Pos::new(pos.line, ops.column);
                let mode = match ops.text.as_str() {
                    "optimistic" => StackMode::Optimistic,
                    "pessimistic" => StackMode::Pessimistic,
                    text => StackMode::Fixed(u16_value(text, value_pos, ".stack")?),
                };
                method.set_stack(mode).map_err(here)
            }
            Directive::Line => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(".line".to_string())))?;
                let ops = operands
                    .as_ref()
                    .ok_or_else(|| here(Error::MissingOperand("value after `.line`".to_string())))?;
                let value = u16_value(&ops.text, Pos::new(pos.line, ops.column), ".line")?;
                method.set_line(pos.line, value as u32);
                Ok(())
            }
            Directive::Begin => {
                no_operands()?;
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(".begin".to_string())))?;
                method.begin_scope().map_err(here)
            }
            Directive::Vartable => {
                no_operands()?;
                match self.method.as_mut() {
                    Some(method) => method.var_table = true,
                    None => self.var_table = true,
                }
                Ok(())
            }
            Directive::Version => {
                if self.class.is_some() || self.module.is_some() {
                    return Err(here(Error::Misplaced(".version".to_string())));
                }
                let ops = operands
                    .as_ref()
                    .ok_or_else(|| here(Error::MissingOperand("release after `.version`".to_string())))?;
                let (major, minor) =
                    class_version(&ops.text).map_err(at(Pos::new(pos.line, ops.column)))?;
                if major >= 50 {
                    self.diags.warn(
                        format!("class version {major} expects a StackMapTable, none is written"),
                        pos.line,
                        pos.column,
                    );
                }
                self.config.major_version = major;
                self.config.minor_version = minor;
                Ok(())
            }
            Directive::Source => {
                if self.method.is_some() {
                    return Err(here(Error::Misplaced(".source".to_string())));
                }
                let ops = operands
                    .as_ref()
                    .ok_or_else(|| here(Error::MissingOperand("file name after `.source`".to_string())))?;
                let value_pos = Pos::new(pos.line, ops.column);
                match eval_const(&ops.text, value_pos)? {
                    Value::Str(file) => {
                        self.source_name = Some(file);
                        Ok(())
                    }
                    other => Err(Error::mismatch("str", other.ty()).at(value_pos)),
                }
            }
            Directive::Try | Directive::Endtry => {
                no_operands()?;
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(format!(".{d}"))))?;
                match d {
                    Directive::Try => method.begin_try(),
                    _ => method.end_try(),
                }
                .map_err(here)
            }
            Directive::Catch => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(".catch".to_string())))?;
                let catch_type = match &operands {
                    None => 0,
                    Some(w) => {
                        let type_pos = Pos::new(pos.line, w.column);
                        let class = self.resolver.resolve_class(&w.text).map_err(at(type_pos))?;
                        self.pool.class(&class).map_err(at(type_pos))?
                    }
                };
                method.catch(catch_type).map_err(here)
            }
            Directive::Default => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or_else(|| here(Error::Misplaced(".default".to_string())))?;
                if !is_identifier(&text) {
                    return Err(here(Error::MissingOperand("label after `.default`".to_string())));
                }
                method.switch_default(&text, pos.line).map_err(here)
            }
            Directive::End => {
                no_operands()?;
                self.end(name, pos)
            }
        }
    }

    /// `.end`: closes the innermost switch, scope, method or class.
    fn end(&mut self, name: String, pos: Pos) -> Result<(), Located> {
        if let Some(method) = self.method.as_mut() {
            if method.in_switch() && name.is_empty() {
                return method.end_switch(&self.config).map_err(at(pos));
            }
            if method.in_scope() && name.is_empty() {
                return method.end_scope().map_err(at(pos));
            }
            if !name.is_empty() && name != method.name {
                return Err(Error::MismatchedEnd(method.name.clone(), name).at(pos));
            }
            let (Some(method), Some(class)) = (self.method.take(), self.class.as_mut()) else {
                return Ok(());
            };
            if let Err(errors) = class.end_method(method) {
                for e in errors {
                    self.report(e);
                }
            }
            return Ok(());
        }
        let Some(class) = self.class.as_ref() else {
            return Err(Error::Misplaced(".end".to_string()).at(pos));
        };
        if !name.is_empty() && name != class.short {
            return Err(Error::MismatchedEnd(class.short.clone(), name).at(pos));
        }
        let Some(class) = self.class.take() else {
            return Ok(());
        };
        let pool = std::mem::take(&mut self.pool);
        match class.finish(&self.resolver, pool, &self.config, self.source_name.as_deref()) {
            Ok(module) => self.module = Some(module),
            Err(errors) => {
                for e in errors {
                    self.report(e);
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, last_line: usize) {
        let eof = Pos::new(last_line.max(1), 1);
        if let Some(method) = self.method.take() {
            self.report(Error::Unclosed(format!("{} .method", method.name)).at(method.pos));
        }
        if let Some(class) = self.class.take() {
            self.report(Error::Unclosed(format!("{} .class", class.short)).at(class.pos));
        } else if self.module.is_none() && !self.diags.has_errors() {
            self.diags
                .warn("no class defined in this unit".to_string(), eof.line, eof.column);
        }
    }
}

fn u16_value(text: &str, pos: Pos, directive: &str) -> Result<u16, Located> {
    match eval_const(text, pos)? {
        Value::Int(n) => u16::try_from(n)
            .map_err(|_| Error::ValueOutOfRange(n.to_string(), directive.to_string()).at(pos)),
        other => Err(Error::mismatch("int", other.ty()).at(pos)),
    }
}

/// +1 / -1 for each brace outside string literals.
fn braces(text: &str) -> Vec<i32> {
    let mut out = Vec::new();
    let mut in_str = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_str {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' => out.push(1),
            '}' => out.push(-1),
            _ => {}
        }
    }
    out
}

/// Assemble `src` against the bundled descriptor table.
pub fn assemble_str(src: &str, config: &Config) -> Result<Output, Error> {
    let table = MetadataTable::new();
    Assembler::new(config.clone(), &table).assemble(&mut StrSource::new(src))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::disasm::decode;

    fn assemble(src: &str) -> Output {
        assemble_str(src, &Config::default()).unwrap()
    }

    fn errors(out: &Output) -> Vec<String> {
        out.diagnostics.errors().map(|e| e.to_string()).collect()
    }

    const HELLO: &str = "\
Hello .class public
main .method void public static
args .parameter String[]
    .stack 2
    getstatic System.out
    ldc \"hello\"
    invokevirtual java.io.PrintStream.println(Ljava/lang/String;)V
    return
main .end
Hello .end
";

    #[test]
    fn hello() {
        let out = assemble(HELLO);
        assert!(out.is_ok(), "{:?}", errors(&out));
        let module = out.module.unwrap();
        assert_eq!(module.class_name(), Some("Hello"));
        let main = module.method("main", Some("([Ljava/lang/String;)V")).unwrap();
        let code = main.code().unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 1);
        let ops: Vec<Opcode> = decode(&code.code).unwrap().iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![Opcode::GETSTATIC, Opcode::LDC, Opcode::INVOKEVIRTUAL, Opcode::RETURN]
        );
    }

    #[test]
    fn state_after_run() {
        let table = MetadataTable::new();
        let asm = Assembler::new(Config::default(), &table);
        assert_eq!(asm.state(), State::ReadingLine);
    }

    #[test]
    fn misplaced_and_unclosed() {
        let out = assemble("    nop\nT .class public\n");
        let errs = errors(&out);
        assert_eq!(errs.len(), 2);
        assert!(errs[0].contains("not allowed"));
        assert!(errs[1].contains("Unclosed"));
        assert!(out.module.is_none());
    }

    #[test]
    fn macro_errors_point_at_invocation() {
        let src = "\
macro bad() {
    emit \"hoge\";
}
T .class public
m .method void static
    .stack 1
    bad
    return
m .end
T .end
";
        let out = assemble(src);
        let diags: Vec<_> = out.diagnostics.iter().collect();
        assert_eq!(diags.len(), 2);
        assert_eq!((diags[0].line, diags[0].column), (7, 5));
        assert!(diags[0].message.contains("hoge"));
        assert!(diags[1].message.contains("`bad`"));
    }

    #[test]
    fn unclosed_macro() {
        let out = assemble("macro m() {\n emit \"nop\";\n");
        assert!(matches!(
            out.diagnostics.errors().next(),
            Some(Error::UnclosedMacro(_))
        ));
    }

    #[test]
    fn version_directive() {
        let out = assemble(&format!(".version 1.6\n{HELLO}"));
        assert!(out.is_ok(), "{:?}", errors(&out));
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.module.unwrap().major_version, 50);

        let out = assemble(&format!("{HELLO}.version 1.9\n"));
        assert!(out.module.is_none());
        let errs = errors(&out);
        assert_eq!(errs.len(), 1, "{errs:?}");
    }

    #[test]
    fn empty_unit_warns() {
        let out = assemble("// nothing\n");
        assert!(out.module.is_none());
        assert!(!out.diagnostics.has_errors());
        assert_eq!(out.diagnostics.len(), 1);
    }
}
