use std::fmt;

use pest::Span;
use std::fmt::Write;

use crate::ast::StringSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    DuplicateDeclaration,
    UnknownType,
    AssignToParameter,
    MissingDerivative,
    DuplicateDerivative,
    DuplicateDefinition,
    IncompleteDefinition,
    UndeclaredReference,
    CircularDefinition,
    UnknownFunction,
    InvalidCall,
    RecursiveComposition,
    UnusedAlgebraicVariable,
    MissingInitialValue,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnusedAlgebraicVariable | DiagnosticKind::MissingInitialValue => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

/// A single semantic finding. Diagnostics are collected, never raised.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    text: String,
    names: Vec<String>,
    source_ref: Option<StringSpan>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, text: String, span: Option<StringSpan>) -> Self {
        Self {
            kind,
            text,
            names: Vec::new(),
            source_ref: span,
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn text(&self) -> &str {
        self.text.as_str()
    }

    /// The quantities involved, as flat dotted names (e.g. the members of a cycle).
    pub fn names(&self) -> &[String] {
        self.names.as_slice()
    }

    pub fn source_ref(&self) -> Option<StringSpan> {
        self.source_ref
    }

    pub fn as_error_message(&self, f: &mut String, input: &str) -> fmt::Result {
        let position = self
            .source_ref
            .and_then(|source_ref| Span::new(input, source_ref.pos_start, source_ref.pos_end))
            .map(|span| span.start_pos().line_col());
        match position {
            Some((line, col)) => write!(
                f,
                "Line {}, Column {}: {}: {}",
                line,
                col,
                self.severity(),
                self.text
            ),
            None => write!(f, "{}: {}", self.severity(), self.text),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(source_ref) = self.source_ref {
            write!(f, "{}: {}: {}", source_ref, self.severity(), self.text)
        } else {
            write!(f, "{}: {}", self.severity(), self.text)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Identical findings (an embedded model instantiated twice) are recorded once.
    pub fn push(&mut self, new: Diagnostic) {
        if !self.diagnostics.contains(&new) {
            self.diagnostics.push(new);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Warning)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn has_kind(&self, kind: DiagnosticKind) -> bool {
        self.of_kind(kind).next().is_some()
    }

    pub fn as_error_message(&self, input: &str) -> String {
        let mut buf = String::new();
        for diagnostic in &self.diagnostics {
            // writing into a String cannot fail
            let _ = diagnostic.as_error_message(&mut buf, input);
            buf.push('\n');
        }
        buf
    }

    pub fn has_error_contains(&self, text: &str) -> bool {
        self.diagnostics.iter().any(|d| d.text.contains(text))
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_line_and_column() {
        let input = "process P {\n    data a: Real;\n}\n";
        let start = input.find("data").unwrap();
        let mut errs = Diagnostics::new();
        errs.push(Diagnostic::new(
            DiagnosticKind::UnusedAlgebraicVariable,
            "variable `a` is never used".to_string(),
            Some(StringSpan {
                pos_start: start,
                pos_end: start + 4,
            }),
        ));
        errs.push(Diagnostic::new(
            DiagnosticKind::UndeclaredReference,
            "undeclared reference `b`".to_string(),
            None,
        ));
        assert_eq!(
            errs.as_error_message(input),
            "Line 2, Column 5: Warning: variable `a` is never used\nError: undeclared reference `b`\n"
        );
        assert!(errs.has_errors());
        assert_eq!(errs.warnings().count(), 1);
    }

    #[test]
    fn identical_diagnostics_are_merged() {
        let mut errs = Diagnostics::new();
        for _ in 0..2 {
            errs.push(Diagnostic::new(
                DiagnosticKind::UnknownType,
                "unknown type `Foo`".to_string(),
                Some(StringSpan {
                    pos_start: 3,
                    pos_end: 6,
                }),
            ));
        }
        assert_eq!(errs.len(), 1);
        assert!(errs.has_kind(DiagnosticKind::UnknownType));
        assert!(!errs.has_kind(DiagnosticKind::CircularDefinition));
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut errs = Diagnostics::new();
        errs.push(Diagnostic::new(
            DiagnosticKind::MissingInitialValue,
            "state `X` has no initial value".to_string(),
            None,
        ));
        assert!(!errs.has_errors());
        assert!(errs.has_error_contains("initial value"));
    }
}
