use crate::error::Error;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub offset: Option<u32>,
    pub defined_at: Option<usize>,
    pub first_ref: Option<usize>,
}

/// Labels of one method body.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    labels: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_label(&mut self, name: &str, offset: u32, line: usize) -> Result<(), Error> {
        let entry = self.labels.entry(name.to_string()).or_insert(Symbol {
            offset: None,
            defined_at: None,
            first_ref: None,
        });
        if entry.offset.is_some() {
            return Err(Error::DuplicateLabel(name.to_string()));
        }
        entry.offset = Some(offset);
        entry.defined_at = Some(line);
        Ok(())
    }

    /// Record a use; the first one is kept for unresolved-symbol reports.
    pub fn reference(&mut self, name: &str, line: usize) {
        let entry = self.labels.entry(name.to_string()).or_insert(Symbol {
            offset: None,
            defined_at: None,
            first_ref: None,
        });
        if entry.first_ref.is_none() {
            entry.first_ref = Some(line);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.labels.get(name).and_then(|s| s.offset)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.labels.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.labels.iter()
    }

    /// Every referenced label never defined, with its first reference line.
    pub fn finalize(&self) -> Vec<(usize, Error)> {
        self.labels
            .iter()
            .filter(|(_, s)| s.offset.is_none())
            .map(|(name, s)| {
                let line = s.first_ref.unwrap_or(0);
                (line, Error::UnresolvedSymbol(name.clone(), line))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_reference() {
        let mut table = SymbolTable::new();
        table.reference("loop", 3);
        assert_eq!(table.lookup("loop"), None);
        table.define_label("loop", 12, 7).unwrap();
        assert_eq!(table.lookup("loop"), Some(12));
        assert!(table.finalize().is_empty());
        assert_eq!(table.get("loop").unwrap().first_ref, Some(3));
    }

    #[test]
    fn duplicate() {
        let mut table = SymbolTable::new();
        table.define_label("a", 0, 1).unwrap();
        assert!(matches!(
            table.define_label("a", 4, 2),
            Err(Error::DuplicateLabel(_))
        ));
        assert_eq!(table.lookup("a"), Some(0));
    }

    #[test]
    fn unresolved() {
        let mut table = SymbolTable::new();
        table.reference("x", 5);
        table.reference("x", 9);
        let errors = table.finalize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 5);
        assert!(matches!(&errors[0].1, Error::UnresolvedSymbol(n, 5) if n == "x"));
    }
}
