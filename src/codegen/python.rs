use std::collections::HashSet;

use itertools::Itertools;
use log::debug;

use crate::compiler::CompilerOptions;
use crate::semantic::expr::{NEG_PRECEDENCE, NOT_PRECEDENCE, PIECEWISE_PRECEDENCE};
use crate::semantic::{
    Branch, Builtin, CompiledProcess, Expr, FinalStmt, InitStmt, PrintArg, QuantityId, SymbolKind,
};

use super::CodeWriter;

/// Runtime support copied into every generated program.
pub const PRELUDE: &str = include_str!("simulatorbase.py");

/// Globals of the generated module (prelude imports and definitions),
/// Python keywords and the builtins the generated code calls. A process
/// class with one of these names would shadow or break the program.
const RESERVED_CLASS_NAMES: &[&str] = &[
    "sys", "ArgumentParser", "array", "linspace", "zeros", "nan", "pi", "e", "sin", "cos",
    "tan", "sqrt", "exp", "log", "absolute", "minimum", "maximum", "odeint", "SimulatorBase",
    "simulatorMainFunc", "float", "print", "super", "object", "int", "round", "range", "len",
    "True", "False", "None", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub fn is_reserved_class_name(name: &str) -> bool {
    RESERVED_CLASS_NAMES.contains(&name)
}

/// Python identifiers of the quantities of one process.
#[derive(Debug, Clone)]
pub struct PythonNames {
    names: Vec<String>,
    derivatives: Vec<String>,
}

fn mangle(name: &str) -> String {
    name.replace('.', "_")
}

fn unique(candidate: String, used: &mut HashSet<String>) -> String {
    let mut name = candidate.clone();
    let mut suffix = 1;
    while used.contains(&name) {
        name = format!("{}_{}", candidate, suffix);
        suffix += 1;
    }
    used.insert(name.clone());
    name
}

impl PythonNames {
    /// Variables become locals `v_<path>`, parameters become fields
    /// `self.p_<path>`, derivatives `v_<path>_dt`. Clashes get a numeric
    /// suffix in declaration order.
    pub fn new(process: &CompiledProcess) -> Self {
        let mut used = HashSet::new();
        let names = process
            .symbols
            .iter()
            .map(|(_, symbol)| {
                let base = match symbol.kind {
                    SymbolKind::Parameter => format!("self.p_{}", mangle(&symbol.name)),
                    _ => format!("v_{}", mangle(&symbol.name)),
                };
                unique(base, &mut used)
            })
            .collect::<Vec<_>>();
        let derivatives = process
            .symbols
            .states()
            .iter()
            .map(|id| unique(format!("{}_dt", names[*id]), &mut used))
            .collect();
        Self { names, derivatives }
    }

    pub fn name(&self, id: QuantityId) -> &str {
        self.names[id].as_str()
    }

    /// Derivative local of the state with the given state index.
    pub fn derivative(&self, state_index: usize) -> &str {
        self.derivatives[state_index].as_str()
    }
}

fn builtin_name(builtin: Builtin) -> &'static str {
    match builtin {
        Builtin::Abs => "absolute",
        Builtin::Min => "minimum",
        Builtin::Max => "maximum",
        other => other.name(),
    }
}

fn string_literal(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("'{}'", escaped)
}

fn number_literal(value: f64) -> String {
    if value.is_nan() {
        "float('nan')".to_string()
    } else if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        format!("float('{}inf')", sign)
    } else {
        format!("{:?}", value)
    }
}

fn parens_if(text: String, needed: bool) -> String {
    if needed {
        format!("({})", text)
    } else {
        text
    }
}

/// Python source of `expr`, with parentheses only where precedence needs them.
pub fn expr_to_python(expr: &Expr, names: &PythonNames) -> String {
    match expr {
        Expr::Number(value) => number_literal(*value),
        Expr::Time => "time".to_string(),
        Expr::Constant(c) => c.name().to_string(),
        Expr::Quantity(id) => names.name(*id).to_string(),
        Expr::Neg(child) => {
            let child_str = expr_to_python(child, names);
            if child.precedence() <= NEG_PRECEDENCE {
                format!("-({})", child_str)
            } else {
                format!("-{}", child_str)
            }
        }
        Expr::Not(child) => {
            let child_str = expr_to_python(child, names);
            format!("not {}", parens_if(child_str, child.precedence() < NOT_PRECEDENCE))
        }
        Expr::Binary(op, lhs, rhs) => {
            let prec = op.precedence();
            let lhs_str = expr_to_python(lhs, names);
            let rhs_str = expr_to_python(rhs, names);
            // comparisons would chain in Python
            let lhs_parens = lhs.precedence() < prec
                || ((op.is_right_assoc() || op.is_comparison()) && lhs.precedence() == prec);
            let rhs_parens = rhs.precedence() < prec || (!op.is_right_assoc() && rhs.precedence() == prec);
            format!(
                "{} {} {}",
                parens_if(lhs_str, lhs_parens),
                op,
                parens_if(rhs_str, rhs_parens),
            )
        }
        Expr::Piecewise(cases, otherwise) => {
            let operand = |e: &Expr| {
                parens_if(expr_to_python(e, names), e.precedence() == PIECEWISE_PRECEDENCE)
            };
            let mut text = String::new();
            for (condition, value) in cases {
                text.push_str(&format!("{} if {} else ", operand(value), operand(condition)));
            }
            text.push_str(&expr_to_python(otherwise, names));
            text
        }
        Expr::Call(builtin, args) => format!(
            "{}({})",
            builtin_name(*builtin),
            args.iter().map(|a| expr_to_python(a, names)).join(", ")
        ),
    }
}

struct ProcessGenerator<'p> {
    process: &'p CompiledProcess,
    names: PythonNames,
    options: &'p CompilerOptions,
}

impl<'p> ProcessGenerator<'p> {
    fn new(process: &'p CompiledProcess, options: &'p CompilerOptions) -> Self {
        Self {
            process,
            names: PythonNames::new(process),
            options,
        }
    }

    fn expr(&self, expr: &Expr) -> String {
        expr_to_python(expr, &self.names)
    }

    /// A piecewise right hand side becomes an if/elif/else statement.
    fn assign(&self, w: &mut CodeWriter, target: &str, rhs: &Expr) {
        match rhs {
            Expr::Piecewise(cases, otherwise) if !cases.is_empty() => {
                for (i, (condition, value)) in cases.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    w.line(&format!("{} {}:", keyword, self.expr(condition)));
                    w.indent();
                    self.assign(w, target, value);
                    w.dedent();
                }
                w.line("else:");
                w.indent();
                self.assign(w, target, otherwise);
                w.dedent();
            }
            _ => w.line(&format!("{} = {}", target, self.expr(rhs))),
        }
    }

    fn branches<T>(
        &self,
        w: &mut CodeWriter,
        branches: &[Branch<T>],
        body: impl Fn(&mut CodeWriter, &[T]),
    ) {
        for (i, branch) in branches.iter().enumerate() {
            match (&branch.condition, i) {
                (Some(condition), 0) => w.line(&format!("if {}:", self.expr(condition))),
                (Some(condition), _) => w.line(&format!("elif {}:", self.expr(condition))),
                (None, _) => w.line("else:"),
            }
            w.indent();
            let start = w.len();
            body(w, &branch.body);
            if w.len() == start {
                w.line("pass");
            }
            w.dedent();
        }
    }

    fn init_stmts(&self, w: &mut CodeWriter, stmts: &[InitStmt]) {
        for stmt in stmts {
            match stmt {
                InitStmt::Assign { target, rhs, .. } => {
                    w.line(&format!("{} = {}", self.names.name(*target), self.expr(rhs)))
                }
                InitStmt::SolutionParameters {
                    duration,
                    reporting_interval,
                } => {
                    w.line(&format!("self.simulation_time = float({})", self.expr(duration)));
                    w.line(&format!(
                        "self.reporting_interval = float({})",
                        self.expr(reporting_interval)
                    ));
                }
                InitStmt::If(branches) => {
                    self.branches(w, branches, |w, body| self.init_stmts(w, body))
                }
            }
        }
    }

    fn final_stmts(&self, w: &mut CodeWriter, stmts: &[FinalStmt]) {
        for stmt in stmts {
            match stmt {
                FinalStmt::Graph(ids) => {
                    if self.options.emit_graphs {
                        let paths = ids
                            .iter()
                            .map(|id| self.process.symbols.get(*id).name.as_str())
                            .join(" ");
                        w.line(&format!("self.graph({})", string_literal(&paths)));
                    }
                }
                FinalStmt::Print(args) => {
                    let args = args
                        .iter()
                        .map(|arg| match arg {
                            PrintArg::Text(text) => string_literal(text),
                            PrintArg::Value(expr) => self.expr(expr),
                        })
                        .join(", ");
                    w.line(&format!("print({})", args));
                }
                FinalStmt::If(branches) => {
                    self.branches(w, branches, |w, body| self.final_stmts(w, body))
                }
            }
        }
    }

    fn generate(&self, w: &mut CodeWriter) {
        let name = &self.process.name;
        w.line(&format!("class {}(SimulatorBase):", name));
        w.indent();
        w.line(&format!("\"\"\"Simulation object of process {}.\"\"\"", name));
        w.blank();
        self.constructor(w);
        w.blank();
        self.initialize(w);
        w.blank();
        self.dynamic(w);
        w.blank();
        self.final_func(w);
        w.dedent();
    }

    fn constructor(&self, w: &mut CodeWriter) {
        w.line("def __init__(self):");
        w.indent();
        w.line(&format!("super({}, self).__init__()", self.process.name));
        for id in self.process.symbols.parameters() {
            w.line(&format!("{} = 0.0", self.names.name(id)));
        }
        w.line("self.initialize()");
        w.dedent();
    }

    fn initialize(&self, w: &mut CodeWriter) {
        let symbols = &self.process.symbols;
        w.line("def initialize(self):");
        w.indent();
        w.line("time = 0.0");
        for (id, symbol) in symbols.iter() {
            if symbol.kind != SymbolKind::Parameter {
                w.line(&format!("{} = 0.0", self.names.name(id)));
            }
        }
        self.init_stmts(w, &self.process.init);
        let states = symbols
            .states()
            .iter()
            .map(|id| self.names.name(*id).to_string())
            .collect::<Vec<_>>();
        w.list_line("self.initialValues = array([", &states, "], 'float64')");
        w.line(&format!("self.stateVectorLen = {}", symbols.states().len()));
        w.line(&format!("self.algVectorLen = {}", symbols.algebraics().len()));
        let columns = symbols
            .states()
            .iter()
            .chain(symbols.algebraics())
            .enumerate()
            .map(|(column, id)| {
                format!("{}: {}", string_literal(&symbols.get(*id).name), column)
            })
            .collect::<Vec<_>>();
        w.list_line("self.variableNameMap = {", &columns, "}");
        w.dedent();
    }

    /// Unpacks the state vector and evaluates every algebraic variable.
    fn compute_variables(&self, w: &mut CodeWriter) {
        for (index, id) in self.process.symbols.states().iter().enumerate() {
            w.line(&format!("{} = state[{}]", self.names.name(*id), index));
        }
        for id in self.process.undefined_algebraics() {
            w.line(&format!("{} = nan", self.names.name(id)));
        }
        for eq in &self.process.algebraic_order {
            self.assign(w, self.names.name(eq.target), &eq.rhs);
        }
    }

    fn dynamic(&self, w: &mut CodeWriter) {
        w.line("def dynamic(self, time, state, returnAlgVars=False):");
        w.indent();
        self.compute_variables(w);
        w.line("if returnAlgVars:");
        w.indent();
        let algebraics = self
            .process
            .symbols
            .algebraics()
            .iter()
            .map(|id| self.names.name(*id).to_string())
            .collect::<Vec<_>>();
        w.list_line("return array([", &algebraics, "], 'float64')");
        w.dedent();
        for (index, derivative) in self.process.derivatives.iter().enumerate() {
            self.assign(w, self.names.derivative(index), derivative);
        }
        let derivatives = (0..self.process.derivatives.len())
            .map(|index| self.names.derivative(index).to_string())
            .collect::<Vec<_>>();
        w.list_line("return array([", &derivatives, "], 'float64')");
        w.dedent();
    }

    fn final_func(&self, w: &mut CodeWriter) {
        w.line("def final(self, time, state):");
        w.indent();
        let start = w.len();
        self.compute_variables(w);
        self.final_stmts(w, &self.process.final_stmts);
        if w.len() == start {
            w.line("pass");
        }
        w.dedent();
    }
}

fn header(w: &mut CodeWriter, options: &CompilerOptions) {
    w.line("#!/usr/bin/env python3");
    w.line(&format!(
        "# Simulation program generated by siml {} from '{}'.",
        env!("CARGO_PKG_VERSION"),
        options.source_name
    ));
    w.line("# Changes are lost when the source is compiled again.");
    w.blank();
}

/// Python source of one process class, without header or prelude.
pub fn generate_process(process: &CompiledProcess, options: &CompilerOptions) -> String {
    let mut w = CodeWriter::new();
    ProcessGenerator::new(process, options).generate(&mut w);
    w.finish()
}

/// A complete program: header, runtime prelude, one class per process and
/// a main block that runs them.
pub fn generate_program(processes: &[CompiledProcess], options: &CompilerOptions) -> String {
    let mut w = CodeWriter::new();
    header(&mut w, options);
    w.raw(PRELUDE);
    for process in processes {
        w.blank();
        w.blank();
        let class = generate_process(process, options);
        debug!("generated {} bytes for {}", class.len(), process.name);
        w.raw(&class);
    }
    w.blank();
    w.blank();
    w.line("if __name__ == '__main__':");
    w.indent();
    let classes = processes.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
    w.list_line("simulatorMainFunc([", &classes, "])");
    w.dedent();
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{BinaryOp, Constant};

    fn names() -> PythonNames {
        PythonNames {
            names: vec!["v_a".to_string(), "v_b".to_string(), "self.p_k".to_string()],
            derivatives: vec![],
        }
    }

    fn q(id: QuantityId) -> Box<Expr> {
        Box::new(Expr::Quantity(id))
    }

    fn bin(op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>) -> Box<Expr> {
        Box::new(Expr::Binary(op, lhs, rhs))
    }

    macro_rules! python_expr_tests {
        ($($name:ident: $expr:expr, $expect:literal,)*) => {
        $(
            #[test]
            fn $name() {
                assert_eq!(expr_to_python(&$expr, &names()), $expect);
            }
        )*
        }
    }

    python_expr_tests! {
        number: Expr::Number(20.0), "20.0",
        small_number: Expr::Number(2e-3), "0.002",
        left_chain: *bin(BinaryOp::Sub, bin(BinaryOp::Sub, q(0), q(1)), q(2)), "v_a - v_b - self.p_k",
        right_nested: *bin(BinaryOp::Sub, q(0), bin(BinaryOp::Sub, q(1), q(2))), "v_a - (v_b - self.p_k)",
        mixed: *bin(BinaryOp::Mul, bin(BinaryOp::Add, q(0), q(1)), q(2)), "(v_a + v_b) * self.p_k",
        no_extra_parens: *bin(BinaryOp::Add, q(0), bin(BinaryOp::Mul, q(1), q(2))), "v_a + v_b * self.p_k",
        division_chain: *bin(BinaryOp::Div, q(0), bin(BinaryOp::Div, q(1), q(2))), "v_a / (v_b / self.p_k)",
        pow_right_assoc: *bin(BinaryOp::Pow, q(0), bin(BinaryOp::Pow, q(1), q(2))), "v_a ** v_b ** self.p_k",
        pow_left_nested: *bin(BinaryOp::Pow, bin(BinaryOp::Pow, q(0), q(1)), q(2)), "(v_a ** v_b) ** self.p_k",
        neg_base: *bin(BinaryOp::Pow, Box::new(Expr::Neg(q(0))), q(1)), "(-v_a) ** v_b",
        neg_of_pow: Expr::Neg(bin(BinaryOp::Pow, q(0), q(1))), "-v_a ** v_b",
        neg_of_sum: Expr::Neg(bin(BinaryOp::Add, q(0), q(1))), "-(v_a + v_b)",
        neg_times: *bin(BinaryOp::Div, Box::new(Expr::Neg(Box::new(Expr::Number(1.0)))), q(2)), "-1.0 / self.p_k",
        builtins: Expr::Call(Builtin::Max, vec![Expr::Time, Expr::Constant(Constant::Pi)]), "maximum(time, pi)",
        abs: Expr::Call(Builtin::Abs, vec![Expr::Quantity(0)]), "absolute(v_a)",
        nan: Expr::Number(f64::NAN), "float('nan')",
        infinity: Expr::Number(f64::INFINITY), "float('inf')",
        negative_infinity: Expr::Number(f64::NEG_INFINITY), "float('-inf')",
        comparison_does_not_chain: *bin(BinaryOp::Lt, bin(BinaryOp::Lt, q(0), q(1)), q(2)), "(v_a < v_b) < self.p_k",
        comparison_of_sums: *bin(BinaryOp::Ge, bin(BinaryOp::Add, q(0), q(1)), q(2)), "v_a + v_b >= self.p_k",
        and_binds_tighter: *bin(BinaryOp::Or, bin(BinaryOp::And, q(0), q(1)), Box::new(Expr::Not(q(2)))), "v_a and v_b or not self.p_k",
        or_inside_and: *bin(BinaryOp::And, bin(BinaryOp::Or, q(0), q(1)), q(2)), "(v_a or v_b) and self.p_k",
        not_of_comparison: Expr::Not(bin(BinaryOp::Ne, q(0), q(1))), "not v_a != v_b",
        not_of_or: Expr::Not(bin(BinaryOp::Or, q(0), q(1))), "not (v_a or v_b)",
        not_in_sum: *bin(BinaryOp::Add, q(0), Box::new(Expr::Not(q(1)))), "v_a + (not v_b)",
        neg_of_comparison: Expr::Neg(bin(BinaryOp::Lt, q(0), q(1))), "-(v_a < v_b)",
        conditional: Expr::Piecewise(
            vec![(*bin(BinaryOp::Gt, q(0), Box::new(Expr::Number(0.0))), Expr::Quantity(1))],
            Box::new(Expr::Number(1.0)),
        ), "v_b if v_a > 0.0 else 1.0",
        conditional_operand: *bin(
            BinaryOp::Mul,
            Box::new(Expr::Piecewise(vec![(Expr::Quantity(0), Expr::Quantity(1))], Box::new(Expr::Number(1.0)))),
            q(2),
        ), "(v_b if v_a else 1.0) * self.p_k",
    }

    #[test]
    fn conditional_statements() {
        let text = "
            process P {
                data x, y: Real;
                data k: Real parameter;
                func dynamic() {
                    if x > k { y = 1; } elif x < 0 { y = 2; } else { y = 3; }
                    $x = -y;
                }
                func init() { x = 1; if k == 0 { k = 2; } else { } }
                func final() { if x > 0 { graph(x); } }
            }
        ";
        let options = CompilerOptions {
            emit_graphs: false,
            ..Default::default()
        };
        let unit = crate::compiler::compile_str(text, &options).unwrap();
        assert!(unit.success(), "{}", unit.as_error_message(text));
        let class = generate_process(unit.process("P").unwrap(), &options);
        let expected = [
            "        if v_x > self.p_k:\n",
            "            v_y = 1.0\n",
            "        elif v_x < 0.0:\n",
            "            v_y = 2.0\n",
            "        else:\n",
            "            v_y = 3.0\n",
            "        if returnAlgVars:\n",
        ]
        .concat();
        assert!(class.contains(&expected), "{}", class);
        assert!(class.contains("        v_x_dt = -v_y\n"), "{}", class);
        let init = [
            "        v_x = 1.0\n",
            "        if self.p_k == 0.0:\n",
            "            self.p_k = 2.0\n",
            "        else:\n",
            "            pass\n",
        ]
        .concat();
        assert!(class.contains(&init), "{}", class);
        assert!(class.contains("        if v_x > 0.0:\n            pass\n"), "{}", class);
        assert!(!class.contains("self.graph"));
    }

    #[test]
    fn reserved_class_names() {
        assert!(is_reserved_class_name("SimulatorBase"));
        assert!(is_reserved_class_name("odeint"));
        assert!(is_reserved_class_name("None"));
        assert!(!is_reserved_class_name("Batch"));
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(string_literal("it's"), "'it\\'s'");
        assert_eq!(string_literal("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn unique_names_get_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(unique("v_a_b".to_string(), &mut used), "v_a_b");
        assert_eq!(unique("v_a_b".to_string(), &mut used), "v_a_b_1");
        assert_eq!(unique("v_a_b".to_string(), &mut used), "v_a_b_2");
    }
}
