use anyhow::{anyhow, Result};

use crate::compiler::{compile_str, CompilerOptions};
use crate::semantic::{CompiledProcess, InitStmt, QuantityId};

/// Interprets the ordered equations of a compiled process, with the same
/// calling convention as the generated simulator: the caller owns the state
/// vectors and a `data` buffer holding every quantity.
///
/// `data` layout: one slot per quantity (indexed by [`QuantityId`]), then the
/// simulation duration and the reporting interval.
pub struct Evaluator {
    process: CompiledProcess,
    undefined: Vec<QuantityId>,
}

impl Evaluator {
    pub fn new(process: CompiledProcess) -> Self {
        let undefined = process.undefined_algebraics();
        Self { process, undefined }
    }

    pub fn from_siml_str(text: &str, process_name: &str) -> Result<Self> {
        let unit = compile_str(text, &CompilerOptions::default())?;
        let outcome = unit
            .outcomes
            .iter()
            .find(|o| o.name == process_name)
            .ok_or_else(|| anyhow!("no process named {}", process_name))?;
        match &outcome.process {
            Some(process) => Ok(Self::new(process.clone())),
            None => Err(anyhow!(
                "process {} has errors:\n{}",
                process_name,
                outcome.diagnostics.as_error_message(text)
            )),
        }
    }

    pub fn process(&self) -> &CompiledProcess {
        &self.process
    }

    pub fn number_of_states(&self) -> usize {
        self.process.number_of_states()
    }

    pub fn number_of_algebraics(&self) -> usize {
        self.process.number_of_algebraics()
    }

    pub fn number_of_parameters(&self) -> usize {
        self.process.symbols.parameters().count()
    }

    fn number_of_quantities(&self) -> usize {
        self.process.symbols.len()
    }

    pub fn data_len(&self) -> usize {
        self.number_of_quantities() + 2
    }

    pub fn get_new_data(&self) -> Vec<f64> {
        let mut data = vec![0.0; self.data_len()];
        let n = self.number_of_quantities();
        data[n] = f64::NAN;
        data[n + 1] = f64::NAN;
        data
    }

    fn check_data(&self, data: &[f64]) {
        if data.len() != self.data_len() {
            panic!("Expected {} data, got {}", self.data_len(), data.len());
        }
    }

    fn check_states(&self, yy: &[f64]) {
        if yy.len() != self.number_of_states() {
            panic!(
                "Expected {} states, got {}",
                self.number_of_states(),
                yy.len()
            );
        }
    }

    /// Runs `init` with every quantity starting at 0.0 and writes the initial
    /// state vector.
    pub fn set_u0(&self, yy: &mut [f64], data: &mut [f64]) {
        self.check_states(yy);
        self.check_data(data);
        let n = self.number_of_quantities();
        data[..n].fill(0.0);
        self.run_init(&self.process.init, data);
        for (index, id) in self.process.symbols.states().iter().enumerate() {
            yy[index] = data[*id];
        }
    }

    fn run_init(&self, stmts: &[InitStmt], data: &mut [f64]) {
        let n = self.number_of_quantities();
        for stmt in stmts {
            match stmt {
                InitStmt::Assign { target, rhs, .. } => {
                    data[*target] = rhs.eval(0.0, data);
                }
                InitStmt::SolutionParameters {
                    duration,
                    reporting_interval,
                } => {
                    data[n] = duration.eval(0.0, data);
                    data[n + 1] = reporting_interval.eval(0.0, data);
                }
                InitStmt::If(branches) => {
                    let taken = branches.iter().find(|branch| match &branch.condition {
                        Some(condition) => condition.eval(0.0, data) != 0.0,
                        None => true,
                    });
                    if let Some(branch) = taken {
                        self.run_init(&branch.body, data);
                    }
                }
            }
        }
    }

    fn compute_variables(&self, t: f64, yy: &[f64], data: &mut [f64]) {
        for (index, id) in self.process.symbols.states().iter().enumerate() {
            data[*id] = yy[index];
        }
        for id in &self.undefined {
            data[*id] = f64::NAN;
        }
        for eq in &self.process.algebraic_order {
            data[eq.target] = eq.rhs.eval(t, data);
        }
    }

    /// Time derivatives of the states, in state index order.
    pub fn rhs(&self, t: f64, yy: &[f64], data: &mut [f64], rr: &mut [f64]) {
        self.check_states(yy);
        self.check_data(data);
        if rr.len() != self.number_of_states() {
            panic!(
                "Expected {} residual states, got {}",
                self.number_of_states(),
                rr.len()
            );
        }
        self.compute_variables(t, yy, data);
        for (r, derivative) in rr.iter_mut().zip(&self.process.derivatives) {
            *r = derivative.eval(t, data);
        }
    }

    /// Algebraic variables in algebraic index order.
    pub fn calc_alg(&self, t: f64, yy: &[f64], data: &mut [f64], out: &mut [f64]) {
        self.check_states(yy);
        self.check_data(data);
        if out.len() != self.number_of_algebraics() {
            panic!(
                "Expected {} algebraic variables, got {}",
                self.number_of_algebraics(),
                out.len()
            );
        }
        self.compute_variables(t, yy, data);
        for (o, id) in out.iter_mut().zip(self.process.symbols.algebraics()) {
            *o = data[*id];
        }
    }

    pub fn get_value(&self, name: &str, data: &[f64]) -> Option<f64> {
        let (id, _) = self.process.symbols.by_name(name)?;
        data.get(id).copied()
    }

    /// Duration and reporting interval set by `solution_parameters` in `init`.
    pub fn solution_parameters(&self, data: &[f64]) -> Option<(f64, f64)> {
        let n = self.number_of_quantities();
        match (data.get(n), data.get(n + 1)) {
            (Some(duration), Some(interval)) if !duration.is_nan() && !interval.is_nan() => {
                Some((*duration, *interval))
            }
            _ => None,
        }
    }
}
