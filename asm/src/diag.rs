use crate::error::{Error, ErrorKind};
use color_print::cprintln;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warn,
    Note,
}

#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub error: Option<Error>,
}

impl Diagnostic {
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind())
    }
}

/// Ordered diagnostics of one assembly unit.
#[derive(Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn error(&mut self, error: Error, line: usize, column: usize) {
        self.0.push(Diagnostic {
            severity: Severity::Error,
            message: error.to_string(),
            line,
            column,
            error: Some(error),
        });
    }

    pub fn warn(&mut self, message: String, line: usize, column: usize) {
        self.push(Severity::Warn, message, line, column);
    }

    pub fn note(&mut self, message: String, line: usize, column: usize) {
        self.push(Severity::Note, message, line, column);
    }

    fn push(&mut self, severity: Severity, message: String, line: usize, column: usize) {
        self.0.push(Diagnostic {
            severity,
            message,
            line,
            column,
            error: None,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.0
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.0.iter().filter_map(|d| d.error.as_ref())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn emit(&self, sink: &mut impl DiagnosticSink) {
        for diag in &self.0 {
            sink.report(diag);
        }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, diag: &Diagnostic);
}

/// Prints reports with a source excerpt to the terminal.
pub struct Console<'a> {
    file: &'a str,
    lines: &'a [String],
}

impl<'a> Console<'a> {
    pub fn new(file: &'a str, lines: &'a [String]) -> Self {
        Self { file, lines }
    }
}

impl<'a> DiagnosticSink for Console<'a> {
    fn report(&mut self, diag: &Diagnostic) {
        match diag.severity {
            Severity::Error => cprintln!("<red,bold>error</>: {}", diag.message),
            Severity::Warn => cprintln!("<yellow,bold>warn</>: {}", diag.message),
            Severity::Note => cprintln!("<green,bold>note</>: {}", diag.message),
        }
        cprintln!(
            "     <blue>--></> <underline>{}:{}:{}</>",
            self.file,
            diag.line,
            diag.column
        );
        cprintln!("      <blue>|</>");
        let raw = diag
            .line
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(|s| s.as_str())
            .unwrap_or("");
        cprintln!(" <blue>{:>4} |</> {}", diag.line, raw);
        cprintln!(
            "      <blue>|</> {}<red,bold>^</>",
            " ".repeat(diag.column.saturating_sub(1))
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Vec<String>);

    impl DiagnosticSink for Collect {
        fn report(&mut self, diag: &Diagnostic) {
            self.0.push(format!("{}:{} {}", diag.line, diag.column, diag.message));
        }
    }

    #[test]
    fn counts_and_order() {
        let mut diags = Diagnostics::new();
        diags.error(Error::UnknownInstruction("hoge".into()), 3, 5);
        diags.note("in expansion of macro `m`".into(), 3, 1);
        diags.warn("unused".into(), 1, 1);
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.len(), 3);

        let mut sink = Collect(vec![]);
        diags.emit(&mut sink);
        assert_eq!(sink.0[0], "3:5 Unknown instruction: `hoge`");
        assert_eq!(sink.0[2], "1:1 unused");
    }
}
