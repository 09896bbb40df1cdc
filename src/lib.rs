extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod execution;
pub mod parser;
pub mod semantic;
pub mod utils;

pub use compiler::{compile, compile_str, CompiledUnit, CompilerOptions};
pub use execution::Evaluator;
