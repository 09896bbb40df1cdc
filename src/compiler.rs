use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use crate::ast::{Ast, Class};
use crate::codegen::{generate_program, is_reserved_class_name};
use crate::parser::parse_siml_string;
use crate::semantic::{
    analyze, flatten, resolve, CompiledProcess, Diagnostic, DiagnosticKind, Diagnostics, Env,
};

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Emit the `graph(...)` statements of `final`.
    pub emit_graphs: bool,
    /// Shown in the header of the generated program.
    pub source_name: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            emit_graphs: true,
            source_name: "<string>".to_string(),
        }
    }
}

/// Result of compiling one process class.
#[derive(Debug)]
pub struct ClassOutcome {
    pub name: String,
    pub diagnostics: Diagnostics,
    /// `None` when a fatal diagnostic was found.
    pub process: Option<CompiledProcess>,
}

#[derive(Debug)]
pub struct CompiledUnit {
    pub outcomes: Vec<ClassOutcome>,
    /// Findings that concern the unit rather than a single process.
    pub unit_diagnostics: Diagnostics,
    /// Present when at least one process compiled.
    pub program: Option<String>,
}

impl CompiledUnit {
    /// Every process compiled and there was at least one.
    pub fn success(&self) -> bool {
        !self.outcomes.is_empty()
            && !self.unit_diagnostics.has_errors()
            && self.outcomes.iter().all(|o| o.process.is_some())
    }

    pub fn processes(&self) -> impl Iterator<Item = &CompiledProcess> {
        self.outcomes.iter().filter_map(|o| o.process.as_ref())
    }

    pub fn process(&self, name: &str) -> Option<&CompiledProcess> {
        self.processes().find(|p| p.name == name)
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.unit_diagnostics
            .iter()
            .chain(self.outcomes.iter().flat_map(|o| o.diagnostics.iter()))
    }

    pub fn as_error_message(&self, input: &str) -> String {
        let mut message = self.unit_diagnostics.as_error_message(input);
        for outcome in &self.outcomes {
            message.push_str(&outcome.diagnostics.as_error_message(input));
        }
        message
    }
}

/// Runs the semantic pipeline on one process class of `unit`.
pub fn compile_process<'a>(process: &'a Class<'a>, unit: &'a [Ast<'a>]) -> ClassOutcome {
    info!("compiling process {}", process.name);
    let mut env = Env::new(unit);
    let decls = resolve(process, &mut env);
    let flat = flatten(process, &decls, &mut env);
    let compiled = analyze(process.name, &decls, flat, &mut env);
    let diagnostics = env.into_errs();
    let compiled = if diagnostics.has_errors() {
        info!(
            "process {} has {} error(s), no code is generated",
            process.name,
            diagnostics.errors().count()
        );
        None
    } else {
        Some(compiled)
    };
    ClassOutcome {
        name: process.name.to_string(),
        diagnostics,
        process: compiled,
    }
}

/// Compiles every process class of a source text. Syntax errors are returned
/// as `Err`; semantic problems are reported in the returned unit.
pub fn compile_str(text: &str, options: &CompilerOptions) -> Result<CompiledUnit> {
    let unit = parse_siml_string(text)
        .map_err(|e| anyhow!("{}", (*e).with_path(&options.source_name)))?;
    debug!("parsed {} classes from {}", unit.len(), options.source_name);

    let mut unit_diagnostics = Diagnostics::new();
    let classes = unit.iter().filter_map(|c| c.kind.as_class().map(|class| (class, c)));
    let mut seen = Vec::new();
    let mut outcomes = Vec::new();
    for (class, ast) in classes {
        if seen.contains(&class.name) {
            // the first definition wins, as in name lookup
            unit_diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateDeclaration,
                format!("class `{}` is defined more than once", class.name),
                ast.span,
            ));
            continue;
        }
        seen.push(class.name);
        if !class.is_process() {
            continue;
        }
        if is_reserved_class_name(class.name) {
            let mut diagnostics = Diagnostics::new();
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateDeclaration,
                format!(
                    "process `{}` would clash with a name of the generated program",
                    class.name
                ),
                ast.span,
            ));
            outcomes.push(ClassOutcome {
                name: class.name.to_string(),
                diagnostics,
                process: None,
            });
            continue;
        }
        outcomes.push(compile_process(class, &unit));
    }
    if outcomes.is_empty() {
        warn!("{} contains no process class", options.source_name);
    }

    let compiled = outcomes
        .iter()
        .filter_map(|o| o.process.clone())
        .collect::<Vec<_>>();
    let program = if compiled.is_empty() {
        None
    } else {
        Some(generate_program(&compiled, options))
    };
    Ok(CompiledUnit {
        outcomes,
        unit_diagnostics,
        program,
    })
}

/// `model.siml` becomes `model.py`.
pub fn default_output_path(input: &str) -> PathBuf {
    Path::new(input).with_extension("py")
}

/// A compiled source file.
#[derive(Debug)]
pub struct Compilation {
    pub unit: CompiledUnit,
    pub source: String,
    pub outfile: PathBuf,
}

/// Reads `input`, compiles it and writes the generated program to `out`
/// (or next to the input). The file is written when at least one process
/// compiled.
pub fn compile(input: &str, out: Option<&str>, options: CompilerOptions) -> Result<Compilation> {
    let inputfile = Path::new(input);
    if inputfile.extension().and_then(|e| e.to_str()) != Some("siml") {
        warn!("input file {} does not have the extension .siml", input);
    }
    let source = fs::read_to_string(inputfile)
        .with_context(|| format!("Failed to read input file {}", input))?;
    let outfile = match out {
        Some(out) => PathBuf::from(out),
        None => default_output_path(input),
    };
    let unit = compile_str(&source, &options)?;
    if let Some(program) = &unit.program {
        fs::write(&outfile, program)
            .with_context(|| format!("Failed to write output file {}", outfile.display()))?;
        make_executable(&outfile)?;
        info!("wrote {}", outfile.display());
    }
    Ok(Compilation {
        unit,
        source,
        outfile,
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to make {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_names_source() {
        let options = CompilerOptions {
            source_name: "broken.siml".to_string(),
            ..Default::default()
        };
        let err = compile_str("process P { data a Real; }", &options).unwrap_err();
        assert!(err.to_string().contains("broken.siml"), "{}", err);
    }

    #[test]
    fn failing_process_does_not_block_others() {
        let text = "
            process Good { data x: Real; func dynamic() { $x = -x; } func init() { x = 1; } }
            process Bad { data a, b: Real; func dynamic() { a = b; b = a; } }
        ";
        let unit = compile_str(text, &CompilerOptions::default()).unwrap();
        assert!(!unit.success());
        assert!(unit.process("Good").is_some());
        assert!(unit.process("Bad").is_none());
        let program = unit.program.unwrap();
        assert!(program.contains("class Good(SimulatorBase):"));
        assert!(!program.contains("class Bad"));
    }

    #[test]
    fn unit_without_process_fails() {
        let unit = compile_str("model M { data x: Real; }", &CompilerOptions::default()).unwrap();
        assert!(!unit.success());
        assert!(unit.program.is_none());
    }

    #[test]
    fn duplicate_class_names() {
        let text = "model M { } model M { } process P { }";
        let unit = compile_str(text, &CompilerOptions::default()).unwrap();
        assert!(unit.unit_diagnostics.has_kind(DiagnosticKind::DuplicateDeclaration));
        assert!(!unit.success());
        let message = unit.as_error_message(text);
        assert!(message.starts_with("Line 1, Column 13: Error: class `M`"), "{}", message);
    }

    #[test]
    fn duplicate_process_is_emitted_once() {
        let text = "
            process P { data x: Real; func dynamic() { $x = 1; } func init() { x = 0; } }
            process P { data y: Real; func dynamic() { $y = 2; } func init() { y = 0; } }
        ";
        let unit = compile_str(text, &CompilerOptions::default()).unwrap();
        assert!(!unit.success());
        assert_eq!(unit.outcomes.len(), 1);
        assert!(unit.unit_diagnostics.has_error_contains("class `P` is defined more than once"));
        let program = unit.program.unwrap();
        assert_eq!(program.matches("class P(SimulatorBase):").count(), 1);
        assert!(program.contains("v_x_dt = 1.0"));
        assert!(!program.contains("v_y"));
        assert!(program.contains("simulatorMainFunc([P])"));
    }

    #[test]
    fn process_named_like_python_global() {
        let text = "
            process array { data x: Real; func dynamic() { $x = 1; } func init() { x = 0; } }
            process lambda { }
            process Ok { data x: Real; func dynamic() { $x = 1; } func init() { x = 0; } }
        ";
        let unit = compile_str(text, &CompilerOptions::default()).unwrap();
        assert!(!unit.success());
        assert!(unit.process("array").is_none());
        assert!(unit.process("lambda").is_none());
        let clashes = unit
            .diagnostics()
            .filter(|d| d.kind() == DiagnosticKind::DuplicateDeclaration)
            .count();
        assert_eq!(clashes, 2);
        let program = unit.program.unwrap();
        assert!(!program.contains("class array("));
        assert!(program.contains("simulatorMainFunc([Ok])"));
    }

    #[test]
    fn output_path_defaults_next_to_input() {
        assert_eq!(default_output_path("models/batch.siml"), PathBuf::from("models/batch.py"));
        assert_eq!(default_output_path("batch"), PathBuf::from("batch.py"));
    }
}
