pub mod writer;
pub use writer::CodeWriter;

pub mod python;
pub use python::{
    expr_to_python, generate_process, generate_program, is_reserved_class_name, PythonNames,
};
