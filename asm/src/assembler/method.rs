use super::operand::Resolved;
use crate::config::Config;
use crate::error::{Error, Located};
use crate::expr::token::Pos;
use crate::module::{Attribute, Code, ExceptionEntry, LineNumber, LocalVar, MethodInfo};
use crate::resolver::{ConstantPool, SymbolTable};
use arch::access::{AccessFlags, ACC_ABSTRACT, ACC_NATIVE, ACC_STATIC};
use arch::op::{Arg, Opcode};
use arch::types::{JavaType, MethodDescriptor};
use indexmap::IndexMap;

/// Encoded operand of one instruction record.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Byte(i8),
    Short(i16),
    U1(u8),
    U2(u16),
    Local(u16),
    Iinc(u16, i16),
    Interface(u16, u8),
    MultiANewArray(u16, u8),
    Label(String),
    /// Field of the class being assembled, declared later in the unit
    OwnField {
        name: String,
        descriptor: Option<String>,
    },
    Table {
        low: i32,
        labels: Vec<String>,
        default: String,
    },
    Lookup {
        pairs: Vec<(i32, String)>,
        default: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insn {
    pub op: Opcode,
    pub wide: bool,
    pub operand: Operand,
    /// Words popped and pushed; unknown until an own field is bound
    pub stack: Option<(u16, u16)>,
    pub offset: u32,
    pub pos: Pos,
}

fn padding(offset: u32) -> u32 {
    (4 - (offset + 1) % 4) % 4
}

impl Insn {
    pub fn size(&self) -> u32 {
        match &self.operand {
            Operand::Table { labels, .. } => 1 + padding(self.offset) + 12 + 4 * labels.len() as u32,
            Operand::Lookup { pairs, .. } => 1 + padding(self.offset) + 8 + 8 * pairs.len() as u32,
            _ => self.op.size(self.wide) as u32,
        }
    }

    fn targets(&self) -> Vec<&str> {
        match &self.operand {
            Operand::Label(l) => vec![l.as_str()],
            Operand::Table { labels, default, .. } => {
                labels.iter().chain(Some(default)).map(|l| l.as_str()).collect()
            }
            Operand::Lookup { pairs, default } => pairs
                .iter()
                .map(|(_, l)| l)
                .chain(Some(default))
                .map(|l| l.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Stack words a field access moves, given the field descriptor.
pub fn field_effect(op: Opcode, descriptor: &str) -> (u16, u16) {
    let width = match descriptor.chars().next() {
        Some('J' | 'D') => 2,
        _ => 1,
    };
    match op {
        Opcode::GETSTATIC => (0, width),
        Opcode::PUTSTATIC => (width, 0),
        Opcode::GETFIELD => (1, width),
        _ => (1 + width, 0),
    }
}

/// How `max_stack` is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Fixed(u16),
    /// Deepest point reached along the control flow
    Optimistic,
    /// Sum of every net push in the body
    Pessimistic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub slot: u16,
    pub ty: JavaType,
    depth: usize,
    var: usize,
}

/// Live range of a named local, for `LocalVariableTable`.
#[derive(Debug, Clone)]
struct VarRange {
    name: String,
    ty: JavaType,
    slot: u16,
    start: u32,
    end: Option<u32>,
}

/// `.begin` frame: locals declared inside are dropped at its `.end`.
#[derive(Debug, Clone)]
struct Scope {
    next_slot: u32,
    shadowed: Vec<(String, Option<Local>)>,
}

#[derive(Debug, Clone)]
struct TryBlock {
    start: u32,
    end: Option<u32>,
    handlers: Vec<(u32, u16)>,
}

#[derive(Debug, Clone)]
struct Switch {
    op: Opcode,
    keys: Vec<(i32, String)>,
    default: Option<String>,
    pos: Pos,
}

#[derive(Debug, Clone)]
pub struct MethodBuilder {
    /// Name as written; the class name for constructors
    pub name: String,
    pub jvm_name: String,
    pub access: AccessFlags,
    pub ret: JavaType,
    pub params: Vec<JavaType>,
    pub stack: Option<StackMode>,
    /// Emit a `LocalVariableTable`
    pub var_table: bool,
    pub pos: Pos,
    locals: IndexMap<String, Local>,
    vars: Vec<VarRange>,
    scopes: Vec<Scope>,
    next_slot: u32,
    max_slot: u32,
    vars_started: bool,
    insns: Vec<Insn>,
    offset: u32,
    labels: SymbolTable,
    tries: Vec<TryBlock>,
    exceptions: Vec<(u32, u32, u32, u16)>,
    lines: Vec<(u32, u16)>,
    line_base: Option<(usize, u32)>,
    switch: Option<Switch>,
}

impl MethodBuilder {
    /// `this_type` occupies slot 0 unless the method is static.
    pub fn new(
        name: &str,
        jvm_name: &str,
        access: AccessFlags,
        ret: JavaType,
        this_type: JavaType,
        pos: Pos,
    ) -> Self {
        let mut m = Self {
            name: name.to_string(),
            jvm_name: jvm_name.to_string(),
            access,
            ret,
            params: Vec::new(),
            stack: None,
            var_table: false,
            pos,
            locals: IndexMap::new(),
            vars: Vec::new(),
            scopes: Vec::new(),
            next_slot: 0,
            max_slot: 0,
            vars_started: false,
            insns: Vec::new(),
            offset: 0,
            labels: SymbolTable::new(),
            tries: Vec::new(),
            exceptions: Vec::new(),
            lines: Vec::new(),
            line_base: None,
            switch: None,
        };
        if !access.contains(ACC_STATIC) {
            // slot 0 is always free here
            let _ = m.allocate("this", this_type);
        }
        m
    }

    pub fn code_allowed(&self) -> bool {
        !self.access.contains(ACC_ABSTRACT) && !self.access.contains(ACC_NATIVE)
    }

    pub fn has_code(&self) -> bool {
        !self.insns.is_empty()
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// `name(descriptor)` for duplicate detection.
    pub fn signature(&self) -> String {
        format!("{}{}", self.jvm_name, self.descriptor().descriptor())
    }

    // ------------------------------------------------------------------------
    // Locals

    fn allocate(&mut self, name: &str, ty: JavaType) -> Result<u16, Error> {
        let depth = self.scopes.len();
        if self.locals.get(name).is_some_and(|l| l.depth == depth) {
            return Err(Error::DuplicateVariable(name.to_string()));
        }
        if ty == JavaType::Void {
            return Err(Error::InvalidType("void".to_string()));
        }
        let slot = self.next_slot;
        let end = slot + ty.slots() as u32;
        if end > u16::MAX as u32 {
            return Err(Error::LocalOutOfRange(name.to_string()));
        }
        self.next_slot = end;
        self.max_slot = self.max_slot.max(end);
        self.vars.push(VarRange {
            name: name.to_string(),
            ty: ty.clone(),
            slot: slot as u16,
            start: self.offset,
            end: None,
        });
        let local = Local {
            slot: slot as u16,
            ty,
            depth,
            var: self.vars.len() - 1,
        };
        let previous = self.locals.insert(name.to_string(), local);
        if let Some(scope) = self.scopes.last_mut() {
            scope.shadowed.push((name.to_string(), previous));
        }
        Ok(slot as u16)
    }

    pub fn add_parameter(&mut self, name: &str, ty: JavaType) -> Result<u16, Error> {
        if self.vars_started || self.stack.is_some() || self.has_code() {
            return Err(Error::Misplaced(".parameter".to_string()));
        }
        let slot = self.allocate(name, ty.clone())?;
        self.params.push(ty);
        Ok(slot)
    }

    pub fn add_var(&mut self, name: &str, ty: JavaType) -> Result<u16, Error> {
        let slot = self.allocate(name, ty)?;
        self.vars_started = true;
        Ok(slot)
    }

    pub fn local(&self, name: &str) -> Option<&Local> {
        self.locals.get(name)
    }

    /// Record use of a numbered slot so `max_locals` covers it.
    pub fn touch_slot(&mut self, slot: u16, width: u16) {
        self.max_slot = self.max_slot.max(slot as u32 + width as u32);
    }

    pub fn descriptor(&self) -> MethodDescriptor {
        MethodDescriptor::new(self.params.clone(), self.ret.clone())
    }

    // ------------------------------------------------------------------------
    // Directives

    pub fn set_stack(&mut self, mode: StackMode) -> Result<(), Error> {
        if self.stack.is_some() {
            return Err(Error::Misplaced(".stack".to_string()));
        }
        if !self.code_allowed() {
            return Err(Error::UnexpectedCode(self.name.clone()));
        }
        self.stack = Some(mode);
        Ok(())
    }

    /// `.begin`; opens the body with an optimistic stack when `.stack` was not given.
    pub fn begin_scope(&mut self) -> Result<(), Error> {
        if !self.code_allowed() {
            return Err(Error::UnexpectedCode(self.name.clone()));
        }
        self.stack.get_or_insert(StackMode::Optimistic);
        self.vars_started = true;
        self.scopes.push(Scope {
            next_slot: self.next_slot,
            shadowed: Vec::new(),
        });
        Ok(())
    }

    pub fn in_scope(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// Closes the innermost `.begin`; its slots are reused by later locals.
    pub fn end_scope(&mut self) -> Result<(), Error> {
        let scope = self
            .scopes
            .pop()
            .ok_or_else(|| Error::Misplaced(".end".to_string()))?;
        for (name, previous) in scope.shadowed.into_iter().rev() {
            if let Some(local) = self.locals.shift_remove(&name) {
                self.vars[local.var].end = Some(self.offset);
            }
            if let Some(previous) = previous {
                self.locals.insert(name, previous);
            }
        }
        self.next_slot = scope.next_slot;
        Ok(())
    }

    /// Following code on source line `l` is recorded as `value + (l - at - 1)`.
    pub fn set_line(&mut self, at: usize, value: u32) {
        self.line_base = Some((at, value));
    }

    pub fn define_label(&mut self, name: &str, line: usize) -> Result<(), Error> {
        if !self.code_allowed() {
            return Err(Error::UnexpectedCode(self.name.clone()));
        }
        self.labels.define_label(name, self.offset, line)
    }

    pub fn reference(&mut self, name: &str, line: usize) {
        self.labels.reference(name, line);
    }

    pub fn label(&self, name: &str) -> Option<u32> {
        self.labels.lookup(name)
    }

    pub fn begin_try(&mut self) -> Result<(), Error> {
        if !self.code_allowed() {
            return Err(Error::UnexpectedCode(self.name.clone()));
        }
        self.tries.push(TryBlock {
            start: self.offset,
            end: None,
            handlers: Vec::new(),
        });
        Ok(())
    }

    /// `catch_type` is a Class pool index, 0 for any throwable.
    pub fn catch(&mut self, catch_type: u16) -> Result<(), Error> {
        let offset = self.offset;
        let block = self
            .tries
            .last_mut()
            .ok_or_else(|| Error::Misplaced(".catch".to_string()))?;
        if block.end.is_none() {
            if offset == block.start {
                return Err(Error::EmptyTry);
            }
            block.end = Some(offset);
        }
        block.handlers.push((offset, catch_type));
        Ok(())
    }

    pub fn end_try(&mut self) -> Result<(), Error> {
        let block = self
            .tries
            .pop()
            .ok_or_else(|| Error::Misplaced(".endtry".to_string()))?;
        let end = match block.end {
            Some(end) if !block.handlers.is_empty() => end,
            _ => return Err(Error::MissingOperand("`.catch` clause".to_string())),
        };
        for (handler, ty) in block.handlers {
            self.exceptions.push((block.start, end, handler, ty));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Switches

    pub fn in_switch(&self) -> bool {
        self.switch.is_some()
    }

    pub fn begin_switch(&mut self, op: Opcode, pos: Pos) {
        self.switch = Some(Switch {
            op,
            keys: Vec::new(),
            default: None,
            pos,
        });
    }

    pub fn switch_entry(&mut self, key: i32, label: &str, line: usize) -> Result<(), Error> {
        let switch = self
            .switch
            .as_mut()
            .ok_or_else(|| Error::UnexpectedToken(format!("{key}, {label}")))?;
        if switch.keys.iter().any(|(k, _)| *k == key) {
            return Err(Error::DuplicateSwitchKey(key));
        }
        switch.keys.push((key, label.to_string()));
        self.labels.reference(label, line);
        Ok(())
    }

    pub fn switch_default(&mut self, label: &str, line: usize) -> Result<(), Error> {
        let switch = self
            .switch
            .as_mut()
            .ok_or_else(|| Error::Misplaced(".default".to_string()))?;
        if switch.default.is_some() {
            return Err(Error::Misplaced(".default".to_string()));
        }
        switch.default = Some(label.to_string());
        self.labels.reference(label, line);
        Ok(())
    }

    pub fn end_switch(&mut self, config: &Config) -> Result<(), Error> {
        let Some(switch) = self.switch.take() else {
            return Err(Error::Misplaced(".end".to_string()));
        };
        let default = switch.default.ok_or(Error::MissingDefault)?;
        let mut keys = switch.keys;
        keys.sort_by_key(|(k, _)| *k);
        let operand = if switch.op == Opcode::TABLESWITCH {
            let (low, high) = match (keys.first(), keys.last()) {
                (Some(l), Some(h)) => (l.0, h.0),
                _ => return Err(Error::MissingOperand("switch entries".to_string())),
            };
            let span = high as i64 - low as i64 + 1;
            if span > u16::MAX as i64 {
                return Err(Error::ValueOutOfRange(
                    span.to_string(),
                    "tableswitch".to_string(),
                ));
            }
            let mut labels = vec![default.clone(); span as usize];
            for (k, label) in keys {
                labels[(k as i64 - low as i64) as usize] = label;
            }
            Operand::Table {
                low,
                labels,
                default,
            }
        } else {
            Operand::Lookup {
                pairs: keys,
                default,
            }
        };
        self.emit(Resolved::new(switch.op, operand), switch.pos, config);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Code

    fn recorded_line(&self, line: usize) -> u16 {
        let value = match self.line_base {
            Some((at, base)) if line > at => base as usize + (line - at - 1),
            Some((_, base)) => base as usize,
            None => line,
        };
        u16::try_from(value).unwrap_or(u16::MAX)
    }

    pub fn emit(&mut self, resolved: Resolved, pos: Pos, config: &Config) {
        if config.line_numbers {
            let line = self.recorded_line(pos.line);
            if self.lines.last().map(|(_, l)| *l) != Some(line) {
                self.lines.push((self.offset, line));
            }
        }
        let insn = Insn {
            op: resolved.op,
            wide: resolved.wide,
            operand: resolved.operand,
            stack: resolved.stack,
            offset: self.offset,
            pos,
        };
        self.offset += insn.size();
        self.insns.push(insn);
    }

    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    /// Check the body at its `.end`. Records stay symbolic until [`Self::encode`].
    pub fn close(&self) -> Result<(), Vec<Located>> {
        let mut errors = Vec::new();
        if let Some(switch) = &self.switch {
            errors.push(Error::Unclosed(switch.op.mnemonic()).at(switch.pos));
        }
        if !self.tries.is_empty() {
            errors.push(Error::Unclosed(".try".to_string()).at(self.pos));
        }
        if !self.scopes.is_empty() {
            errors.push(Error::Unclosed(".begin".to_string()).at(self.pos));
        }
        if self.code_allowed() && self.insns.is_empty() {
            errors.push(Error::MissingCode(self.name.clone()).at(self.pos));
        }
        for (line, e) in self.labels.finalize() {
            errors.push(e.at(Pos::new(line, 1)));
        }
        match errors.is_empty() {
            true => Ok(()),
            false => Err(errors),
        }
    }

    /// Replace own-field references with the Fieldref index `bind` returns
    /// together with the field descriptor. `bind` also gets the referencing line.
    pub fn bind_fields<F>(&mut self, mut bind: F) -> Vec<Located>
    where
        F: FnMut(&str, Option<&str>, usize) -> Result<(u16, String), Error>,
    {
        let mut errors = Vec::new();
        for insn in self.insns.iter_mut() {
            let Operand::OwnField { name, descriptor } = &insn.operand else {
                continue;
            };
            match bind(name, descriptor.as_deref(), insn.pos.line) {
                Ok((idx, descriptor)) => {
                    insn.stack = Some(field_effect(insn.op, &descriptor));
                    insn.operand = Operand::U2(idx);
                }
                Err(e) => errors.push(e.at(insn.pos)),
            }
        }
        errors
    }

    /// Encode the method once every record is bound.
    pub fn encode(&self, pool: &mut ConstantPool, config: &Config) -> Result<MethodInfo, Vec<Located>> {
        let at_method = |e: Error| vec![e.at(self.pos)];
        let name = pool.utf8(&self.jvm_name).map_err(at_method)?;
        let desc = pool.utf8(&self.descriptor().descriptor()).map_err(at_method)?;

        let mut attributes = Vec::new();
        if self.code_allowed() {
            let (code, mut errors) = self.code_bytes();
            if code.len() > u16::MAX as usize {
                errors.push(Error::CodeTooLarge(self.name.clone()).at(self.pos));
            }
            if !errors.is_empty() {
                return Err(errors);
            }
            let code_name = pool.utf8("Code").map_err(at_method)?;
            let mut code_attrs = Vec::new();
            if config.line_numbers && !self.lines.is_empty() {
                let lnt = pool.utf8("LineNumberTable").map_err(at_method)?;
                code_attrs.push(Attribute::LineNumberTable {
                    name: lnt,
                    lines: self
                        .lines
                        .iter()
                        .map(|(start, line)| LineNumber {
                            start: *start as u16,
                            line: *line,
                        })
                        .collect(),
                });
            }
            if self.var_table && !self.vars.is_empty() {
                code_attrs.push(self.local_variable_table(pool).map_err(at_method)?);
            }
            attributes.push(Attribute::Code(Code {
                name: code_name,
                max_stack: self.max_stack(),
                max_locals: self.max_slot.min(u16::MAX as u32) as u16,
                code,
                exceptions: self
                    .exceptions
                    .iter()
                    .map(|(start, end, handler, ty)| ExceptionEntry {
                        start: *start as u16,
                        end: *end as u16,
                        handler: *handler as u16,
                        catch_type: *ty,
                    })
                    .collect(),
                attributes: code_attrs,
            }));
        }
        Ok(MethodInfo {
            access: self.access,
            name,
            descriptor: desc,
            attributes,
        })
    }

    fn local_variable_table(&self, pool: &mut ConstantPool) -> Result<Attribute, Error> {
        let mut vars = Vec::with_capacity(self.vars.len());
        for v in &self.vars {
            let end = v.end.unwrap_or(self.offset);
            vars.push(LocalVar {
                start: v.start as u16,
                length: (end - v.start) as u16,
                name: pool.utf8(&v.name)?,
                descriptor: pool.utf8(&v.ty.descriptor())?,
                slot: v.slot,
            });
        }
        Ok(Attribute::LocalVariableTable {
            name: pool.utf8("LocalVariableTable")?,
            vars,
        })
    }

    // ------------------------------------------------------------------------
    // Stack depth

    pub fn max_stack(&self) -> u16 {
        let depth = match self.stack {
            Some(StackMode::Fixed(n)) => return n,
            Some(StackMode::Pessimistic) => self
                .insns
                .iter()
                .filter_map(|i| i.stack)
                .map(|(pop, push)| push.saturating_sub(pop) as u32)
                .sum(),
            _ => self.flow_depth(),
        };
        depth.min(u16::MAX as u32) as u16
    }

    fn index_at(&self, offset: u32) -> Option<usize> {
        self.insns.binary_search_by_key(&offset, |i| i.offset).ok()
    }

    /// Walk every path from the entry and the handlers; each record is
    /// visited once with the depth of the first path reaching it.
    fn flow_depth(&self) -> u32 {
        let mut seen = vec![false; self.insns.len()];
        let mut work: Vec<(usize, u32)> = vec![(0, 0)];
        for (_, _, handler, _) in &self.exceptions {
            if let Some(idx) = self.index_at(*handler) {
                work.push((idx, 1));
            }
        }
        let mut max = 0;
        while let Some((idx, depth)) = work.pop() {
            if idx >= self.insns.len() || seen[idx] {
                continue;
            }
            seen[idx] = true;
            let insn = &self.insns[idx];
            let (pop, push) = insn.stack.unwrap_or((0, 0));
            let after = depth.saturating_sub(pop as u32) + push as u32;
            max = max.max(depth).max(after);
            for label in insn.targets() {
                if let Some(target) = self.labels.lookup(label).and_then(|o| self.index_at(o)) {
                    work.push((target, after));
                }
            }
            if !insn.op.is_terminal() {
                // a subroutine returns with its address popped
                let next = match insn.op {
                    Opcode::JSR | Opcode::JSR_W => depth,
                    _ => after,
                };
                work.push((idx + 1, next));
            }
        }
        max
    }

    // ------------------------------------------------------------------------
    // Encoding

    fn branch(&self, insn: &Insn, label: &str) -> i32 {
        // unresolved labels were reported by close
        let target = self.labels.lookup(label).unwrap_or(insn.offset);
        target as i32 - insn.offset as i32
    }

    fn code_bytes(&self) -> (Vec<u8>, Vec<Located>) {
        let mut code: Vec<u8> = Vec::with_capacity(self.offset as usize);
        let mut errors = Vec::new();
        for insn in &self.insns {
            if insn.wide {
                code.push(Opcode::WIDE.into());
            }
            code.push(insn.op.into());
            match &insn.operand {
                Operand::None => {}
                Operand::Byte(b) => code.push(*b as u8),
                Operand::Short(s) => code.extend_from_slice(&s.to_be_bytes()),
                Operand::U1(v) => code.push(*v),
                Operand::U2(v) => code.extend_from_slice(&v.to_be_bytes()),
                Operand::Local(n) if insn.wide => code.extend_from_slice(&n.to_be_bytes()),
                Operand::Local(n) => code.push(*n as u8),
                Operand::Iinc(n, d) if insn.wide => {
                    code.extend_from_slice(&n.to_be_bytes());
                    code.extend_from_slice(&d.to_be_bytes());
                }
                Operand::Iinc(n, d) => {
                    code.push(*n as u8);
                    code.push(*d as i8 as u8);
                }
                Operand::Interface(idx, count) => {
                    code.extend_from_slice(&idx.to_be_bytes());
                    code.push(*count);
                    code.push(0);
                }
                Operand::MultiANewArray(idx, dims) => {
                    code.extend_from_slice(&idx.to_be_bytes());
                    code.push(*dims);
                }
                Operand::Label(label) => {
                    let rel = self.branch(insn, label);
                    if insn.op.arg() == Arg::BranchW {
                        code.extend_from_slice(&rel.to_be_bytes());
                    } else {
                        match i16::try_from(rel) {
                            Ok(rel) => code.extend_from_slice(&rel.to_be_bytes()),
                            Err(_) => {
                                errors.push(Error::BranchOutOfRange(label.clone()).at(insn.pos));
                                code.extend_from_slice(&[0, 0]);
                            }
                        }
                    }
                }
                Operand::OwnField { name, .. } => {
                    errors.push(Error::UnresolvedSymbol(name.clone(), insn.pos.line).at(insn.pos));
                    code.extend_from_slice(&[0, 0]);
                }
                Operand::Table {
                    low,
                    labels,
                    default,
                } => {
                    while code.len() % 4 != 0 {
                        code.push(0);
                    }
                    let rel = |l: &str| self.branch(insn, l);
                    code.extend_from_slice(&rel(default).to_be_bytes());
                    code.extend_from_slice(&low.to_be_bytes());
                    let high = *low + labels.len() as i32 - 1;
                    code.extend_from_slice(&high.to_be_bytes());
                    for label in labels {
                        code.extend_from_slice(&rel(label).to_be_bytes());
                    }
                }
                Operand::Lookup { pairs, default } => {
                    while code.len() % 4 != 0 {
                        code.push(0);
                    }
                    let rel = |l: &str| self.branch(insn, l);
                    code.extend_from_slice(&rel(default).to_be_bytes());
                    code.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                    for (key, label) in pairs {
                        code.extend_from_slice(&key.to_be_bytes());
                        code.extend_from_slice(&rel(label).to_be_bytes());
                    }
                }
            }
        }
        (code, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::access::{ACC_PUBLIC, ACC_STATIC};

    fn builder(flags: u16) -> MethodBuilder {
        MethodBuilder::new(
            "m",
            "m",
            AccessFlags(flags),
            JavaType::Int,
            JavaType::object("demo.T"),
            Pos::new(1, 1),
        )
    }

    fn emit(m: &mut MethodBuilder, op: Opcode, operand: Operand, line: usize) {
        m.emit(Resolved::new(op, operand), Pos::new(line, 1), &Config::default());
    }

    fn finish(m: MethodBuilder, pool: &mut ConstantPool) -> Result<MethodInfo, Vec<Located>> {
        m.close()?;
        m.encode(pool, &Config::default())
    }

    fn code_of(info: &MethodInfo) -> &Code {
        match &info.attributes[0] {
            Attribute::Code(code) => code,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slots() {
        let mut m = builder(ACC_PUBLIC);
        assert_eq!(m.local("this").unwrap().slot, 0);
        assert_eq!(m.add_parameter("a", JavaType::Long).unwrap(), 1);
        assert_eq!(m.add_parameter("b", JavaType::Int).unwrap(), 3);
        assert_eq!(m.add_var("c", JavaType::Double).unwrap(), 4);
        assert!(matches!(
            m.add_parameter("d", JavaType::Int),
            Err(Error::Misplaced(_))
        ));
        assert!(matches!(
            m.add_var("c", JavaType::Int),
            Err(Error::DuplicateVariable(_))
        ));
        assert_eq!(m.descriptor().descriptor(), "(JI)I");
        assert_eq!(m.signature(), "m(JI)I");
    }

    #[test]
    fn scopes_reuse_slots() {
        let mut m = builder(ACC_STATIC);
        m.add_parameter("n", JavaType::Int).unwrap();
        m.begin_scope().unwrap();
        assert_eq!(m.stack, Some(StackMode::Optimistic));
        assert_eq!(m.add_var("x", JavaType::Long).unwrap(), 1);
        // shadowing an outer name is allowed, redeclaring in the same scope is not
        assert_eq!(m.add_var("n", JavaType::Int).unwrap(), 3);
        assert!(matches!(
            m.add_var("x", JavaType::Int),
            Err(Error::DuplicateVariable(_))
        ));
        emit(&mut m, Opcode::ICONST_0, Operand::None, 2);
        emit(&mut m, Opcode::POP, Operand::None, 2);
        m.end_scope().unwrap();
        assert!(m.local("x").is_none());
        assert_eq!(m.local("n").unwrap().slot, 0);
        assert_eq!(m.add_var("y", JavaType::Int).unwrap(), 1);
        assert!(matches!(m.end_scope(), Err(Error::Misplaced(_))));
        emit(&mut m, Opcode::ICONST_0, Operand::None, 3);
        emit(&mut m, Opcode::IRETURN, Operand::None, 3);

        m.var_table = true;
        let mut pool = ConstantPool::new();
        let info = finish(m, &mut pool).unwrap();
        let code = code_of(&info);
        assert_eq!(code.max_locals, 4);
        let Some(Attribute::LocalVariableTable { vars, .. }) = code.attributes.get(1) else {
            panic!("{:?}", code.attributes)
        };
        let rows: Vec<(&str, u16, u16, u16)> = vars
            .iter()
            .map(|v| (pool.utf8_at(v.name).unwrap_or("?"), v.slot, v.start, v.length))
            .collect();
        assert_eq!(
            rows,
            vec![("n", 0, 0, 4), ("x", 1, 0, 2), ("n", 3, 0, 2), ("y", 1, 2, 2)]
        );
    }

    #[test]
    fn unclosed_scope() {
        let mut m = builder(ACC_STATIC);
        m.begin_scope().unwrap();
        emit(&mut m, Opcode::ICONST_0, Operand::None, 2);
        emit(&mut m, Opcode::IRETURN, Operand::None, 2);
        let errors = m.close().unwrap_err();
        assert!(matches!(&errors[0].error, Error::Unclosed(what) if what == ".begin"));
    }

    #[test]
    fn forward_branch() {
        let mut m = builder(ACC_PUBLIC | ACC_STATIC);
        m.set_stack(StackMode::Fixed(2)).unwrap();
        m.reference("end", 2);
        emit(&mut m, Opcode::GOTO, Operand::Label("end".into()), 2);
        emit(&mut m, Opcode::NOP, Operand::None, 3);
        m.define_label("end", 4).unwrap();
        emit(&mut m, Opcode::ICONST_0, Operand::None, 4);
        emit(&mut m, Opcode::IRETURN, Operand::None, 4);

        let mut pool = ConstantPool::new();
        let info = finish(m, &mut pool).unwrap();
        let code = code_of(&info);
        assert_eq!(code.code, vec![0xA7, 0x00, 0x04, 0x00, 0x03, 0xAC]);
        assert_eq!(code.max_stack, 2);
        match &code.attributes[0] {
            Attribute::LineNumberTable { lines, .. } => {
                assert_eq!(lines.len(), 3);
                assert_eq!(lines[2], LineNumber { start: 4, line: 4 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stack_modes() {
        let body = |mode: StackMode| {
            let mut m = builder(ACC_STATIC);
            m.set_stack(mode).unwrap();
            m.reference("skip", 1);
            emit(&mut m, Opcode::ICONST_1, Operand::None, 1);
            emit(&mut m, Opcode::IFEQ, Operand::Label("skip".into()), 1);
            emit(&mut m, Opcode::LCONST_1, Operand::None, 2);
            emit(&mut m, Opcode::POP2, Operand::None, 2);
            m.define_label("skip", 3).unwrap();
            emit(&mut m, Opcode::ICONST_2, Operand::None, 3);
            emit(&mut m, Opcode::DUP, Operand::None, 3);
            emit(&mut m, Opcode::IADD, Operand::None, 3);
            emit(&mut m, Opcode::IRETURN, Operand::None, 3);
            m.max_stack()
        };
        assert_eq!(body(StackMode::Fixed(9)), 9);
        assert_eq!(body(StackMode::Optimistic), 2);
        // iconst_1, lconst_1, iconst_2 and dup each add to the total
        assert_eq!(body(StackMode::Pessimistic), 5);
    }

    #[test]
    fn handlers_enter_with_one_word() {
        let mut m = builder(ACC_STATIC);
        m.set_stack(StackMode::Optimistic).unwrap();
        m.begin_try().unwrap();
        emit(&mut m, Opcode::ICONST_0, Operand::None, 1);
        emit(&mut m, Opcode::IRETURN, Operand::None, 1);
        m.catch(0).unwrap();
        emit(&mut m, Opcode::DUP, Operand::None, 2);
        emit(&mut m, Opcode::POP2, Operand::None, 2);
        emit(&mut m, Opcode::ICONST_1, Operand::None, 2);
        emit(&mut m, Opcode::IRETURN, Operand::None, 2);
        m.end_try().unwrap();
        assert_eq!(m.max_stack(), 2);
    }

    #[test]
    fn own_fields_bind_before_encoding() {
        let mut m = builder(ACC_STATIC);
        m.set_stack(StackMode::Optimistic).unwrap();
        let field = |name: &str| Operand::OwnField {
            name: name.into(),
            descriptor: None,
        };
        emit(&mut m, Opcode::GETSTATIC, field("total"), 1);
        emit(&mut m, Opcode::GETSTATIC, field("missing"), 2);
        emit(&mut m, Opcode::L2I, Operand::None, 3);
        emit(&mut m, Opcode::IRETURN, Operand::None, 3);
        assert_eq!(m.insns()[0].stack, None);
        m.close().unwrap();

        let errors = m.bind_fields(|name, _, line| match name {
            "total" => Ok((0x0102, "J".to_string())),
            _ => Err(Error::UnresolvedSymbol(name.to_string(), line)),
        });
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pos.line, 2);
        assert_eq!(m.insns()[0].operand, Operand::U2(0x0102));
        assert_eq!(m.insns()[0].stack, Some((0, 2)));
        // the record left unbound is reported again by the encoder
        assert!(m.encode(&mut ConstantPool::new(), &Config::default()).is_err());
    }

    #[test]
    fn unresolved_and_empty() {
        let mut m = builder(ACC_STATIC);
        m.set_stack(StackMode::Fixed(1)).unwrap();
        m.reference("nowhere", 7);
        m.emit(
            Resolved::new(Opcode::GOTO, Operand::Label("nowhere".into())),
            Pos::new(7, 5),
            &Config::default(),
        );
        let errors = m.close().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0].error, Error::UnresolvedSymbol(n, 7) if n == "nowhere"));

        let errors = builder(ACC_STATIC).close().unwrap_err();
        assert!(matches!(errors[0].error, Error::MissingCode(_)));

        let info = finish(builder(ACC_PUBLIC | ACC_ABSTRACT), &mut ConstantPool::new()).unwrap();
        assert!(info.attributes.is_empty());
    }

    #[test]
    fn switch_layout() {
        let config = Config::default();
        let mut m = builder(ACC_STATIC);
        m.set_stack(StackMode::Fixed(1)).unwrap();
        emit(&mut m, Opcode::ILOAD_0, Operand::None, 1);
        m.begin_switch(Opcode::TABLESWITCH, Pos::new(2, 1));
        m.switch_entry(11, "b", 3).unwrap();
        m.switch_entry(10, "a", 3).unwrap();
        assert!(matches!(
            m.switch_entry(10, "a", 4),
            Err(Error::DuplicateSwitchKey(10))
        ));
        assert!(matches!(m.end_switch(&config), Err(Error::MissingDefault)));

        m.begin_switch(Opcode::TABLESWITCH, Pos::new(2, 1));
        m.switch_entry(10, "a", 3).unwrap();
        m.switch_entry(12, "b", 3).unwrap();
        m.switch_default("c", 5).unwrap();
        m.end_switch(&config).unwrap();
        // 1 opcode + 2 padding + 12 + 3 targets
        assert_eq!(m.offset(), 1 + 1 + 2 + 12 + 12);
        match &m.insns()[1].operand {
            Operand::Table { low, labels, .. } => {
                assert_eq!(*low, 10);
                assert_eq!(labels, &vec!["a".to_string(), "c".into(), "b".into()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn try_ranges() {
        let mut m = builder(ACC_STATIC);
        m.set_stack(StackMode::Fixed(1)).unwrap();
        m.begin_try().unwrap();
        assert!(matches!(m.catch(0), Err(Error::EmptyTry)));
        emit(&mut m, Opcode::ACONST_NULL, Operand::None, 1);
        emit(&mut m, Opcode::ATHROW, Operand::None, 1);
        m.catch(7).unwrap();
        emit(&mut m, Opcode::POP, Operand::None, 2);
        m.catch(0).unwrap();
        emit(&mut m, Opcode::ICONST_0, Operand::None, 3);
        emit(&mut m, Opcode::IRETURN, Operand::None, 3);
        m.end_try().unwrap();
        assert!(matches!(m.end_try(), Err(Error::Misplaced(_))));

        let info = finish(m, &mut ConstantPool::new()).unwrap();
        let code = code_of(&info);
        assert_eq!(
            code.exceptions,
            vec![
                ExceptionEntry { start: 0, end: 2, handler: 2, catch_type: 7 },
                ExceptionEntry { start: 0, end: 2, handler: 3, catch_type: 0 },
            ]
        );
    }
}
