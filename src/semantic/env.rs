use indexmap::IndexMap;

use crate::ast::{Ast, Class, StringSpan};

use super::{Diagnostic, DiagnosticKind, Diagnostics};

/// Names with a fixed meaning in every expression.
pub const RESERVED_NAMES: [&str; 3] = ["time", "pi", "e"];

/// Compilation context for one process class. Holds the class lookup of the
/// unit and collects the diagnostics of every stage.
pub struct Env<'a> {
    classes: IndexMap<&'a str, &'a Class<'a>>,
    errs: Diagnostics,
}

impl<'a> Env<'a> {
    pub fn new(unit: &'a [Ast<'a>]) -> Self {
        let mut classes = IndexMap::new();
        for class in unit.iter().filter_map(|c| c.kind.as_class()) {
            // a repeated class name is reported once per unit, the first definition wins
            classes.entry(class.name).or_insert(class);
        }
        Env {
            classes,
            errs: Diagnostics::new(),
        }
    }

    pub fn class(&self, name: &str) -> Option<&'a Class<'a>> {
        self.classes.get(name).copied()
    }

    /// Classes that can be embedded as a data member.
    pub fn model(&self, name: &str) -> Option<&'a Class<'a>> {
        self.class(name).filter(|c| !c.is_process())
    }

    pub fn is_reserved(name: &str) -> bool {
        RESERVED_NAMES.contains(&name)
    }

    pub fn push(&mut self, kind: DiagnosticKind, text: String, span: Option<StringSpan>) {
        self.errs.push(Diagnostic::new(kind, text, span));
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.errs.push(diagnostic);
    }

    pub fn errs(&self) -> &Diagnostics {
        &self.errs
    }

    pub fn into_errs(self) -> Diagnostics {
        self.errs
    }
}
