use super::ast::MacroDef;
use super::compiler::compile;
use crate::error::{Error, Located};
use crate::expr::token::Pos;
use indexmap::IndexMap;

/// Raw text of one definition, as collected from the unit.
#[derive(Debug, Clone)]
pub struct MacroSource {
    pub name: String,
    pub text: String,
    pub line: usize,
}

#[derive(Debug)]
enum Slot {
    Reserved,
    Ready(MacroDef),
    Broken,
}

/// Macros of one assembly unit, in definition order.
#[derive(Debug, Default)]
pub struct MacroRegistry {
    slots: IndexMap<String, Slot>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every name first, then compile bodies, so definitions may
    /// refer to macros defined later in the unit.
    pub fn register_all(&mut self, sources: &[MacroSource]) -> Vec<Located> {
        let mut errors = Vec::new();
        let mut accepted = Vec::new();
        for source in sources {
            match self.reserve(&source.name) {
                Ok(()) => accepted.push(source),
                Err(e) => errors.push(e.at(Pos::new(source.line, 1))),
            }
        }
        for source in accepted {
            if let Err(e) = self.define(source) {
                errors.push(e);
            }
        }
        errors
    }

    pub fn reserve(&mut self, name: &str) -> Result<(), Error> {
        if self.slots.contains_key(name) {
            return Err(Error::DuplicateMacroDefinition(name.to_string()));
        }
        self.slots.insert(name.to_string(), Slot::Reserved);
        Ok(())
    }

    pub fn define(&mut self, source: &MacroSource) -> Result<(), Located> {
        match compile(&source.text, source.line) {
            Ok(def) => {
                self.slots.insert(source.name.clone(), Slot::Ready(def));
                Ok(())
            }
            Err(e) => {
                self.slots.insert(source.name.clone(), Slot::Broken);
                Err(e)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// `None` when `name` is not a macro of this unit.
    pub fn get(&self, name: &str) -> Option<Result<&MacroDef, Error>> {
        match self.slots.get(name)? {
            Slot::Ready(def) => Some(Ok(def)),
            Slot::Reserved | Slot::Broken => Some(Err(Error::InvalidMacro(name.to_string()))),
        }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MacroDef> {
        self.slots.values().filter_map(|slot| match slot {
            Slot::Ready(def) => Some(def),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Name of the macro declared by a `macro name(...)` header line.
pub fn header_name(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix("macro")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, text: &str, line: usize) -> MacroSource {
        MacroSource {
            name: name.to_string(),
            text: text.to_string(),
            line,
        }
    }

    #[test]
    fn headers() {
        assert_eq!(header_name("macro twice(n: int) {"), Some("twice".into()));
        assert_eq!(header_name("  macro  m() {"), Some("m".into()));
        assert_eq!(header_name("macros x"), None);
        assert_eq!(header_name("iload p1"), None);
    }

    #[test]
    fn two_pass_registration() {
        let mut registry = MacroRegistry::new();
        let errors = registry.register_all(&[
            source("outer", "macro outer() { emit \"inner\"; }", 1),
            source("inner", "macro inner() { emit \"nop\"; }", 2),
            source("outer", "macro outer() { }", 3),
            source("bad", "macro bad() { emit x; }", 4),
        ]);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0].error,
            Error::DuplicateMacroDefinition(_)
        ));
        assert_eq!(errors[0].pos.line, 3);
        assert!(matches!(errors[1].error, Error::UnboundSymbol(_)));

        assert!(matches!(registry.get("outer"), Some(Ok(_))));
        assert!(matches!(registry.get("bad"), Some(Err(Error::InvalidMacro(_)))));
        assert!(registry.get("iload").is_none());
        assert_eq!(registry.definitions().count(), 2);
    }
}
