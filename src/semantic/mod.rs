pub mod error;
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, Severity};

pub mod env;
pub use env::Env;

pub mod expr;
pub use expr::{BinaryOp, Builtin, Constant, Expr, QuantityId};

pub mod symbols;
pub use symbols::{resolve, Declaration, Declarations, NumericType};

pub mod flatten;
pub use flatten::{
    flatten, Branch, Equation, EquationForm, FinalStmt, FlatProcess, InitStmt, PrintArg, Section,
};

pub mod dependency;
pub use dependency::{analyze, CompiledProcess, Symbol, SymbolKind, SymbolTable};
