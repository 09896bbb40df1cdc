use std::collections::{BTreeSet, VecDeque};

use itertools::Itertools;
use log::debug;

use crate::ast::StringSpan;

use super::{
    Declarations, Diagnostic, DiagnosticKind, Env, Equation, EquationForm, Expr, FinalStmt,
    FlatProcess, InitStmt, QuantityId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Parameter,
    State(usize),
    Algebraic(usize),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

/// Every quantity of a process with its role, indexed by [`QuantityId`].
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    states: Vec<QuantityId>,
    algebraics: Vec<QuantityId>,
}

impl SymbolTable {
    pub fn get(&self, id: QuantityId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn by_name(&self, name: &str) -> Option<(QuantityId, &Symbol)> {
        self.symbols.iter().enumerate().find(|(_, s)| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuantityId, &Symbol)> {
        self.symbols.iter().enumerate()
    }

    /// State quantities in state index order.
    pub fn states(&self) -> &[QuantityId] {
        self.states.as_slice()
    }

    /// Algebraic quantities in algebraic index order.
    pub fn algebraics(&self) -> &[QuantityId] {
        self.algebraics.as_slice()
    }

    pub fn parameters(&self) -> impl Iterator<Item = QuantityId> + '_ {
        self.iter()
            .filter(|(_, s)| s.kind == SymbolKind::Parameter)
            .map(|(id, _)| id)
    }
}

/// The analysed process, read-only input of the code generator.
#[derive(Debug, Clone)]
pub struct CompiledProcess {
    pub name: String,
    pub symbols: SymbolTable,
    /// One expression per state, in state index order.
    pub derivatives: Vec<Expr>,
    /// Defining equations of the algebraic variables in evaluation order.
    pub algebraic_order: Vec<Equation>,
    pub init: Vec<InitStmt>,
    pub final_stmts: Vec<FinalStmt>,
}

impl CompiledProcess {
    /// Algebraic variables without a defining equation, they evaluate to NaN.
    pub fn undefined_algebraics(&self) -> Vec<QuantityId> {
        self.symbols
            .algebraics()
            .iter()
            .copied()
            .filter(|id| !self.algebraic_order.iter().any(|eq| eq.target == *id))
            .collect()
    }

    pub fn number_of_states(&self) -> usize {
        self.symbols.states().len()
    }

    pub fn number_of_algebraics(&self) -> usize {
        self.symbols.algebraics().len()
    }
}

/// An assignment inside any branch counts as initialised.
fn mark_initialised(stmts: &[InitStmt], initialised: &mut [bool]) {
    for stmt in stmts {
        match stmt {
            InitStmt::Assign { target, .. } => initialised[*target] = true,
            InitStmt::If(branches) => {
                for branch in branches {
                    mark_initialised(&branch.body, initialised);
                }
            }
            InitStmt::SolutionParameters { .. } => (),
        }
    }
}

/// Classifies the variables of a flattened process and orders its algebraic
/// equations. Problems are recorded in `env`; the returned process is only
/// meaningful when no error was recorded.
pub fn analyze(name: &str, decls: &Declarations, flat: FlatProcess, env: &mut Env) -> CompiledProcess {
    let n = decls.len();
    let mut plain: Vec<Vec<&Equation>> = vec![Vec::new(); n];
    let mut derivative: Vec<Vec<&Equation>> = vec![Vec::new(); n];
    for eq in &flat.dynamic {
        match eq.form {
            EquationForm::Plain => plain[eq.target].push(eq),
            EquationForm::Derivative => derivative[eq.target].push(eq),
        }
    }
    let referenced = (0..n)
        .map(|id| flat.dynamic.iter().any(|eq| eq.rhs.references(id)))
        .collect::<Vec<_>>();
    let mut initialised = vec![false; n];
    mark_initialised(&flat.init, &mut initialised);

    let mut symbols = Vec::with_capacity(n);
    let mut states = Vec::new();
    let mut algebraics = Vec::new();
    let mut definitions: Vec<Option<&Equation>> = vec![None; n];
    for (id, decl) in decls.iter() {
        let name = decls.name(id).to_string();
        if decl.is_parameter() {
            if !initialised[id] {
                env.push(
                    DiagnosticKind::MissingInitialValue,
                    format!("parameter `{}` is never assigned in init, it starts at 0.0", name),
                    decl.span,
                );
            }
            symbols.push(Symbol {
                name,
                kind: SymbolKind::Parameter,
            });
            continue;
        }
        if let Some(second) = derivative[id].get(1) {
            env.push_diagnostic(
                Diagnostic::new(
                    DiagnosticKind::DuplicateDerivative,
                    format!("`${}` is assigned more than once", name),
                    second.span,
                )
                .with_names(vec![name.clone()]),
            );
        }
        let kind = if !derivative[id].is_empty() {
            if let Some(first) = plain[id].first() {
                env.push_diagnostic(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateDefinition,
                        format!(
                            "state variable `{}` is also assigned by an algebraic equation",
                            name
                        ),
                        first.span,
                    )
                    .with_names(vec![name.clone()]),
                );
            }
            if !initialised[id] {
                env.push(
                    DiagnosticKind::MissingInitialValue,
                    format!("state variable `{}` is never assigned in init, it starts at 0.0", name),
                    decl.span,
                );
            }
            states.push(id);
            SymbolKind::State(states.len() - 1)
        } else {
            if let Some(second) = plain[id].get(1) {
                env.push_diagnostic(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateDefinition,
                        format!("`{}` is assigned more than once", name),
                        second.span,
                    )
                    .with_names(vec![name.clone()]),
                );
            }
            match plain[id].first() {
                Some(eq) => definitions[id] = Some(*eq),
                None if referenced[id] || initialised[id] => env.push_diagnostic(
                    Diagnostic::new(
                        DiagnosticKind::MissingDerivative,
                        format!(
                            "`{}` is used as a state variable but `${}` is never assigned",
                            name, name
                        ),
                        decl.span,
                    )
                    .with_names(vec![name.clone()]),
                ),
                None => env.push(
                    DiagnosticKind::UnusedAlgebraicVariable,
                    format!("variable `{}` is never assigned or used", name),
                    decl.span,
                ),
            }
            algebraics.push(id);
            SymbolKind::Algebraic(algebraics.len() - 1)
        };
        symbols.push(Symbol { name, kind });
    }

    let order = order_algebraics(decls, &definitions, env);
    debug!(
        "{}: states [{}], algebraic evaluation order [{}]",
        name,
        states.iter().map(|id| decls.name(*id)).join(", "),
        order.iter().map(|id| decls.name(*id)).join(", ")
    );

    let derivatives = states
        .iter()
        .map(|id| derivative[*id][0].rhs.clone())
        .collect();
    let algebraic_order = order
        .iter()
        .filter_map(|id| definitions[*id].cloned())
        .collect();
    CompiledProcess {
        name: name.to_string(),
        symbols: SymbolTable {
            symbols,
            states,
            algebraics,
        },
        derivatives,
        algebraic_order,
        init: flat.init,
        final_stmts: flat.final_stmts,
    }
}

/// Kahn's algorithm over the algebraic variables that have a definition. The
/// ready set is ordered by declaration so the result does not depend on the
/// order of the equations. Variables left over are on or behind a cycle.
fn order_algebraics(
    decls: &Declarations,
    definitions: &[Option<&Equation>],
    env: &mut Env,
) -> Vec<QuantityId> {
    let n = definitions.len();
    let edges = definitions
        .iter()
        .map(|def| match def {
            Some(eq) => eq
                .rhs
                .quantities()
                .into_iter()
                .filter(|dep| definitions[*dep].is_some())
                .collect(),
            None => Vec::new(),
        })
        .collect::<Vec<Vec<QuantityId>>>();
    let mut dependents = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    for (id, deps) in edges.iter().enumerate() {
        indegree[id] = deps.len();
        for dep in deps {
            dependents[*dep].push(id);
        }
    }

    let mut ready = (0..n)
        .filter(|id| definitions[*id].is_some() && indegree[*id] == 0)
        .collect::<BTreeSet<_>>();
    let mut order = Vec::new();
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for dependent in &dependents[next] {
            indegree[*dependent] -= 1;
            if indegree[*dependent] == 0 {
                ready.insert(*dependent);
            }
        }
    }

    let remaining = (0..n)
        .filter(|id| definitions[*id].is_some() && !order.contains(id))
        .collect::<Vec<_>>();
    if !remaining.is_empty() {
        report_cycles(decls, definitions, &edges, &remaining, env);
    }
    order
}

fn reachable(edges: &[Vec<QuantityId>], start: QuantityId, within: &[QuantityId]) -> Vec<bool> {
    let mut seen = vec![false; edges.len()];
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for next in &edges[node] {
            if within.contains(next) && !seen[*next] {
                seen[*next] = true;
                stack.push(*next);
            }
        }
    }
    seen
}

/// One diagnostic per strongly connected group, carrying the shortest cycle
/// through its earliest declared member.
fn report_cycles(
    decls: &Declarations,
    definitions: &[Option<&Equation>],
    edges: &[Vec<QuantityId>],
    remaining: &[QuantityId],
    env: &mut Env,
) {
    let n = edges.len();
    let reverse = {
        let mut reverse = vec![Vec::new(); n];
        for (id, deps) in edges.iter().enumerate() {
            for dep in deps {
                reverse[*dep].push(id);
            }
        }
        reverse
    };
    let mut assigned = vec![false; n];
    for &start in remaining {
        if assigned[start] {
            continue;
        }
        let forward = reachable(edges, start, remaining);
        let backward = reachable(&reverse, start, remaining);
        let group = remaining
            .iter()
            .copied()
            .filter(|id| *id == start || (forward[*id] && backward[*id]))
            .collect::<Vec<_>>();
        for id in &group {
            assigned[*id] = true;
        }
        // nodes merely downstream of a cycle do not reach back to themselves
        if !forward[start] {
            continue;
        }
        let cycle = shortest_cycle(edges, start, &group);
        let names = cycle
            .iter()
            .map(|id| decls.name(*id).to_string())
            .collect::<Vec<_>>();
        let span: Option<StringSpan> = definitions[start].and_then(|eq| eq.span);
        env.push_diagnostic(
            Diagnostic::new(
                DiagnosticKind::CircularDefinition,
                format!(
                    "circular definition: {} -> {}",
                    names.join(" -> "),
                    names[0]
                ),
                span,
            )
            .with_names(names),
        );
    }
}

fn shortest_cycle(edges: &[Vec<QuantityId>], start: QuantityId, group: &[QuantityId]) -> Vec<QuantityId> {
    let mut parent: Vec<Option<QuantityId>> = vec![None; edges.len()];
    let mut queue = VecDeque::from([start]);
    let mut visited = vec![false; edges.len()];
    visited[start] = true;
    while let Some(node) = queue.pop_front() {
        for next in &edges[node] {
            if *next == start {
                let mut cycle = vec![node];
                let mut current = node;
                while let Some(p) = parent[current] {
                    cycle.push(p);
                    current = p;
                }
                cycle.reverse();
                return cycle;
            }
            if group.contains(next) && !visited[*next] {
                visited[*next] = true;
                parent[*next] = Some(node);
                queue.push_back(*next);
            }
        }
    }
    vec![start]
}
