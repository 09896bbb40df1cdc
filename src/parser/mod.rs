pub mod siml_parser;
pub use siml_parser::{Rule, SimlParser};

use crate::ast::Ast;
use pest::error::Error;

pub fn parse_siml_string(text: &str) -> Result<Vec<Ast>, Box<Error<Rule>>> {
    siml_parser::parse_string(text)
}
