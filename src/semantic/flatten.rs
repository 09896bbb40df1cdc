use std::mem;

use indexmap::IndexMap;
use log::debug;

use crate::ast::{self, Ast, AstKind, Class, StringSpan};

use super::{Builtin, BinaryOp, Constant, Declarations, DiagnosticKind, Env, Expr, QuantityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquationForm {
    Plain,
    Derivative,
}

#[derive(Debug, Clone)]
pub struct Equation {
    pub target: QuantityId,
    pub form: EquationForm,
    pub rhs: Expr,
    pub span: Option<StringSpan>,
}

/// One arm of an `if`; the `else` arm has no condition.
#[derive(Debug, Clone)]
pub struct Branch<T> {
    pub condition: Option<Expr>,
    pub body: Vec<T>,
}

#[derive(Debug, Clone)]
pub enum InitStmt {
    Assign {
        target: QuantityId,
        rhs: Expr,
        span: Option<StringSpan>,
    },
    SolutionParameters {
        duration: Expr,
        reporting_interval: Expr,
    },
    If(Vec<Branch<InitStmt>>),
}

#[derive(Debug, Clone)]
pub enum PrintArg {
    Text(String),
    Value(Expr),
}

#[derive(Debug, Clone)]
pub enum FinalStmt {
    Graph(Vec<QuantityId>),
    Print(Vec<PrintArg>),
    If(Vec<Branch<FinalStmt>>),
}

/// The member functions a process exposes to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Init,
    Dynamic,
    Final,
}

impl Section {
    pub fn func_name(&self) -> &'static str {
        match self {
            Section::Init => "init",
            Section::Dynamic => "dynamic",
            Section::Final => "final",
        }
    }
}

/// Function bodies of a process with every call to an embedded instance
/// inlined and every name resolved.
#[derive(Debug, Clone, Default)]
pub struct FlatProcess {
    pub dynamic: Vec<Equation>,
    pub init: Vec<InitStmt>,
    pub final_stmts: Vec<FinalStmt>,
}

struct Flattener<'a, 'd, 'e> {
    decls: &'d Declarations<'a>,
    env: &'e mut Env<'a>,
    out: FlatProcess,
}

pub fn flatten<'a>(
    process: &'a Class<'a>,
    decls: &Declarations<'a>,
    env: &mut Env<'a>,
) -> FlatProcess {
    let mut flattener = Flattener {
        decls,
        env,
        out: FlatProcess::default(),
    };
    for section in [Section::Init, Section::Dynamic, Section::Final] {
        if let Some((func, _)) = process.func(section.func_name()) {
            for stmt in &func.statements {
                flattener.statement(stmt, section, "");
            }
        }
    }
    debug!(
        "flattened {}: {} init statements, {} equations, {} final statements",
        process.name,
        flattener.out.init.len(),
        flattener.out.dynamic.len(),
        flattener.out.final_stmts.len()
    );
    flattener.out
}

impl<'a> Flattener<'a, '_, '_> {
    fn statement(&mut self, stmt: &Ast<'a>, section: Section, prefix: &str) {
        match &stmt.kind {
            AstKind::Assignment(a) => self.assignment(a, stmt.span, section, prefix),
            AstKind::CallStmt(call) => self.call_stmt(call, stmt.span, section, prefix),
            AstKind::If(stmt) => self.if_stmt(stmt, section, prefix),
            _ => unreachable!("{}", stmt),
        }
    }

    fn assignment(
        &mut self,
        a: &ast::Assignment<'a>,
        span: Option<StringSpan>,
        section: Section,
        prefix: &str,
    ) {
        let rhs = self.lower(&a.expr, prefix);
        let path = format!("{}{}", prefix, a.target);
        let (target, is_parameter) = match self.decls.get(&path) {
            Some((id, decl)) => (id, decl.is_parameter()),
            None => {
                self.env.push(
                    DiagnosticKind::UndeclaredReference,
                    format!("undeclared reference `{}`", a.target),
                    span,
                );
                return;
            }
        };
        match section {
            Section::Dynamic if is_parameter => self.env.push(
                DiagnosticKind::AssignToParameter,
                format!("cannot assign to parameter `{}` in dynamic", a.target),
                span,
            ),
            Section::Dynamic => {
                if let Some(rhs) = rhs {
                    let form = if a.is_derivative {
                        EquationForm::Derivative
                    } else {
                        EquationForm::Plain
                    };
                    self.out.dynamic.push(Equation {
                        target,
                        form,
                        rhs,
                        span,
                    });
                }
            }
            Section::Init if a.is_derivative => self.env.push(
                DiagnosticKind::InvalidCall,
                format!(
                    "derivative assignment `${}` is only allowed in dynamic",
                    a.target
                ),
                span,
            ),
            Section::Init => {
                if let Some(rhs) = rhs {
                    self.out.init.push(InitStmt::Assign { target, rhs, span });
                }
            }
            Section::Final => self.env.push(
                DiagnosticKind::InvalidCall,
                format!("assignment to `{}` is not allowed in final", a.target),
                span,
            ),
        }
    }

    /// In init and final an `if` stays a statement. In dynamic every branch
    /// must define the same quantities, which become one piecewise equation
    /// per target.
    fn if_stmt(&mut self, stmt: &ast::If<'a>, section: Section, prefix: &str) {
        let errs_before = self.env.errs().len();
        let mut lowered = true;
        let mut branches = Vec::with_capacity(stmt.clauses.len());
        for clause in &stmt.clauses {
            let condition = match &clause.condition {
                Some(condition) => {
                    let condition = self.lower(condition, prefix);
                    lowered &= condition.is_some();
                    condition
                }
                None => None,
            };
            let outer = mem::take(&mut self.out);
            for stmt in &clause.statements {
                self.statement(stmt, section, prefix);
            }
            let body = mem::replace(&mut self.out, outer);
            branches.push((condition, body));
        }
        if !lowered {
            return;
        }
        match section {
            Section::Init => {
                let branches = branches
                    .into_iter()
                    .map(|(condition, body)| Branch {
                        condition,
                        body: body.init,
                    })
                    .collect();
                self.out.init.push(InitStmt::If(branches));
            }
            Section::Final => {
                let branches = branches
                    .into_iter()
                    .map(|(condition, body)| Branch {
                        condition,
                        body: body.final_stmts,
                    })
                    .collect();
                self.out.final_stmts.push(FinalStmt::If(branches));
            }
            Section::Dynamic => {
                let complete = self.env.errs().len() == errs_before;
                let branches = branches
                    .into_iter()
                    .map(|(condition, body)| (condition, body.dynamic))
                    .collect::<Vec<_>>();
                self.merge_branches(branches, complete);
            }
        }
    }

    fn merge_branches(&mut self, branches: Vec<(Option<Expr>, Vec<Equation>)>, report: bool) {
        let has_else = branches.last().is_some_and(|(c, _)| c.is_none());
        // (target, form) -> (first span, rhs per branch)
        let mut merged: IndexMap<(QuantityId, EquationForm), (Option<StringSpan>, Vec<Option<Expr>>)> =
            IndexMap::new();
        let n = branches.len();
        let mut conditions = Vec::with_capacity(n);
        for (i, (condition, equations)) in branches.into_iter().enumerate() {
            conditions.push(condition);
            for eq in equations {
                let (_, arms) = merged
                    .entry((eq.target, eq.form))
                    .or_insert_with(|| (eq.span, vec![None; n]));
                if arms[i].is_some() {
                    // a second definition in the same branch is left to the analyzer
                    self.out.dynamic.push(eq);
                } else {
                    arms[i] = Some(eq.rhs);
                }
            }
        }
        for ((target, form), (span, arms)) in merged {
            if report && (!has_else || arms.iter().any(|arm| arm.is_none())) {
                let name = match form {
                    EquationForm::Plain => self.decls.name(target).to_string(),
                    EquationForm::Derivative => format!("${}", self.decls.name(target)),
                };
                let text = if has_else {
                    format!("`{}` is not assigned in every branch of the if", name)
                } else {
                    format!("`{}` is assigned in an if without else", name)
                };
                self.env
                    .push(DiagnosticKind::IncompleteDefinition, text, span);
            }
            let mut arms = arms
                .into_iter()
                .map(|arm| arm.unwrap_or(Expr::Number(f64::NAN)))
                .collect::<Vec<_>>();
            let otherwise = if has_else {
                arms.pop().unwrap_or(Expr::Number(f64::NAN))
            } else {
                Expr::Number(f64::NAN)
            };
            let cases = conditions
                .iter()
                .flatten()
                .cloned()
                .zip(arms)
                .collect::<Vec<_>>();
            self.out.dynamic.push(Equation {
                target,
                form,
                rhs: Expr::Piecewise(cases, Box::new(otherwise)),
                span,
            });
        }
    }

    fn call_stmt(
        &mut self,
        call: &ast::Call<'a>,
        span: Option<StringSpan>,
        section: Section,
        prefix: &str,
    ) {
        if let Some((instance, func_name)) = call.fn_name.rsplit_once('.') {
            self.inline_call(call, instance, func_name, span, section, prefix);
            return;
        }
        match (call.fn_name, section) {
            ("solution_parameters", Section::Init) => {
                if call.args.len() != 2 {
                    self.env.push(
                        DiagnosticKind::InvalidCall,
                        format!(
                            "solution_parameters takes 2 arguments (duration, reporting interval), got {}",
                            call.args.len()
                        ),
                        span,
                    );
                    return;
                }
                let duration = self.lower(&call.args[0], prefix);
                let reporting_interval = self.lower(&call.args[1], prefix);
                if let (Some(duration), Some(reporting_interval)) = (duration, reporting_interval) {
                    self.out.init.push(InitStmt::SolutionParameters {
                        duration,
                        reporting_interval,
                    });
                }
            }
            ("graph", Section::Final) => {
                if call.args.is_empty() {
                    self.env.push(
                        DiagnosticKind::InvalidCall,
                        "graph needs at least one variable".to_string(),
                        span,
                    );
                    return;
                }
                let mut ids = Vec::new();
                for arg in &call.args {
                    if let Some(id) = self.graph_arg(arg, prefix) {
                        ids.push(id);
                    }
                }
                if ids.len() == call.args.len() {
                    self.out.final_stmts.push(FinalStmt::Graph(ids));
                }
            }
            ("print", Section::Final) => {
                let mut args = Vec::new();
                for arg in &call.args {
                    match arg.kind {
                        AstKind::Str(text) => args.push(PrintArg::Text(text.to_string())),
                        _ => {
                            if let Some(expr) = self.lower(arg, prefix) {
                                args.push(PrintArg::Value(expr));
                            }
                        }
                    }
                }
                if args.len() == call.args.len() {
                    self.out.final_stmts.push(FinalStmt::Print(args));
                }
            }
            ("solution_parameters", _) => self.misplaced(call.fn_name, Section::Init, span),
            ("graph", _) | ("print", _) => self.misplaced(call.fn_name, Section::Final, span),
            (name, _) if Builtin::from_name(name).is_some() => self.env.push(
                DiagnosticKind::InvalidCall,
                format!("the result of `{}` is unused", name),
                span,
            ),
            (name, _) => self.env.push(
                DiagnosticKind::UnknownFunction,
                format!("unknown function `{}`", name),
                span,
            ),
        }
    }

    fn misplaced(&mut self, name: &str, allowed: Section, span: Option<StringSpan>) {
        self.env.push(
            DiagnosticKind::InvalidCall,
            format!("`{}` can only be called in {}", name, allowed.func_name()),
            span,
        );
    }

    /// `inst.f()` pastes the body of `f` of the embedded instance, with the
    /// instance path prepended to every name.
    fn inline_call(
        &mut self,
        call: &ast::Call<'a>,
        instance: &str,
        func_name: &str,
        span: Option<StringSpan>,
        section: Section,
        prefix: &str,
    ) {
        let path = format!("{}{}", prefix, instance);
        let class = match self.decls.instance(&path) {
            Some(class) => class,
            None => {
                self.env.push(
                    DiagnosticKind::UndeclaredReference,
                    format!("`{}` is not a model instance", instance),
                    span,
                );
                return;
            }
        };
        if !call.args.is_empty() {
            self.env.push(
                DiagnosticKind::InvalidCall,
                format!("`{}` takes no arguments", call.fn_name),
                span,
            );
        }
        match class.func(func_name) {
            Some((func, _)) => {
                let inner_prefix = format!("{}.", path);
                for stmt in &func.statements {
                    self.statement(stmt, section, &inner_prefix);
                }
            }
            None => self.env.push(
                DiagnosticKind::UnknownFunction,
                format!("{} has no function `{}`", class.name, func_name),
                span,
            ),
        }
    }

    fn graph_arg(&mut self, arg: &Ast<'a>, prefix: &str) -> Option<QuantityId> {
        let name = match arg.kind.as_name() {
            Some(name) => name,
            None => {
                self.env.push(
                    DiagnosticKind::InvalidCall,
                    format!("graph takes variable names, got `{}`", arg),
                    arg.span,
                );
                return None;
            }
        };
        match self.decls.get(&format!("{}{}", prefix, name)) {
            Some((id, decl)) if !decl.is_parameter() => Some(id),
            Some(_) => {
                self.env.push(
                    DiagnosticKind::InvalidCall,
                    format!("parameter `{}` cannot be graphed", name),
                    arg.span,
                );
                None
            }
            None => {
                self.env.push(
                    DiagnosticKind::UndeclaredReference,
                    format!("undeclared reference `{}`", name),
                    arg.span,
                );
                None
            }
        }
    }

    /// Lowers an expression; `None` when a diagnostic was recorded for it.
    fn lower(&mut self, expr: &Ast<'a>, prefix: &str) -> Option<Expr> {
        match &expr.kind {
            AstKind::Number(value) => Some(Expr::Number(*value)),
            AstKind::Name(name) => self.lower_name(name, expr.span, prefix),
            AstKind::Binop(binop) => {
                let lhs = self.lower(&binop.left, prefix);
                let rhs = self.lower(&binop.right, prefix);
                let op = BinaryOp::from_symbol(binop.op)?;
                Some(Expr::Binary(op, Box::new(lhs?), Box::new(rhs?)))
            }
            AstKind::Monop(monop) => {
                let child = self.lower(&monop.child, prefix)?;
                match monop.op {
                    "-" => Some(Expr::Neg(Box::new(child))),
                    "not" => Some(Expr::Not(Box::new(child))),
                    _ => Some(child),
                }
            }
            AstKind::Call(call) => self.lower_call(call, expr.span, prefix),
            AstKind::Str(text) => {
                self.env.push(
                    DiagnosticKind::InvalidCall,
                    format!("string \"{}\" is only allowed as an argument of print", text),
                    expr.span,
                );
                None
            }
            _ => unreachable!("{}", expr),
        }
    }

    fn lower_name(&mut self, name: &str, span: Option<StringSpan>, prefix: &str) -> Option<Expr> {
        if name == "time" {
            return Some(Expr::Time);
        }
        if let Some(constant) = Constant::from_name(name) {
            return Some(Expr::Constant(constant));
        }
        let path = format!("{}{}", prefix, name);
        if let Some((id, _)) = self.decls.get(&path) {
            return Some(Expr::Quantity(id));
        }
        let text = if self.decls.instance(&path).is_some() {
            format!("`{}` is a model instance, not a quantity", name)
        } else {
            format!("undeclared reference `{}`", name)
        };
        self.env.push(DiagnosticKind::UndeclaredReference, text, span);
        None
    }

    fn lower_call(
        &mut self,
        call: &ast::Call<'a>,
        span: Option<StringSpan>,
        prefix: &str,
    ) -> Option<Expr> {
        let args = call
            .args
            .iter()
            .map(|arg| self.lower(arg, prefix))
            .collect::<Vec<_>>();
        let builtin = match Builtin::from_name(call.fn_name) {
            Some(builtin) => builtin,
            None => {
                let text = match call.fn_name {
                    "solution_parameters" | "graph" | "print" => {
                        format!("`{}` cannot be used in an expression", call.fn_name)
                    }
                    name => format!("unknown function `{}`", name),
                };
                self.env.push(DiagnosticKind::UnknownFunction, text, span);
                return None;
            }
        };
        if args.len() != builtin.arity() {
            self.env.push(
                DiagnosticKind::InvalidCall,
                format!(
                    "`{}` takes {} argument{}, got {}",
                    call.fn_name,
                    builtin.arity(),
                    if builtin.arity() == 1 { "" } else { "s" },
                    args.len()
                ),
                span,
            );
            return None;
        }
        let args = args.into_iter().collect::<Option<Vec<_>>>()?;
        Some(Expr::Call(builtin, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_siml_string;
    use crate::semantic::resolve;

    const BIOREACTOR: &str = "
        class Reactor(model) {
            data mu, X, S: Real;
            data mu_max, Ks, Yxs: Real parameter;
            func dynamic() {
                mu = mu_max*S/(S + Ks);
                $X = mu*X;
                $S = -1/Yxs*mu*X;
            }
            func init() {
                X = 0.1; S = 20;
                mu_max = 0.32; Ks = 0.01; Yxs = 0.5;
            }
        }
        class Batch(process) {
            data r: Reactor;
            func dynamic() { r.dynamic(); }
            func init() { r.init(); solution_parameters(20, 0.1); }
            func final() { graph(r.X, r.S); print(\"final-values:\", r.X, time); }
        }
    ";

    fn flatten_unit(text: &str) -> (FlatProcess, Vec<DiagnosticKind>, Vec<String>) {
        let unit = parse_siml_string(text).unwrap();
        let process = unit
            .iter()
            .filter_map(|c| c.kind.as_class())
            .find(|c| c.is_process())
            .unwrap();
        let mut env = Env::new(&unit);
        let decls = resolve(process, &mut env);
        let flat = flatten(process, &decls, &mut env);
        let names = decls
            .iter()
            .map(|(id, _)| decls.name(id).to_string())
            .collect();
        let errs = env.errs().iter().map(|e| e.kind()).collect();
        (flat, errs, names)
    }

    #[test]
    fn bioreactor_is_inlined() {
        let (flat, errs, names) = flatten_unit(BIOREACTOR);
        assert!(errs.is_empty(), "{:?}", errs);
        assert_eq!(
            names,
            vec!["r.mu", "r.X", "r.S", "r.mu_max", "r.Ks", "r.Yxs"]
        );
        let targets = flat
            .dynamic
            .iter()
            .map(|eq| (eq.target, eq.form))
            .collect::<Vec<_>>();
        assert_eq!(
            targets,
            vec![
                (0, EquationForm::Plain),
                (1, EquationForm::Derivative),
                (2, EquationForm::Derivative),
            ]
        );
        // mu_max*S/(S + Ks)
        assert_eq!(flat.dynamic[0].rhs.quantities(), vec![3, 2, 4]);
        assert_eq!(flat.init.len(), 6);
        assert!(matches!(
            flat.init[5],
            InitStmt::SolutionParameters { .. }
        ));
        assert_eq!(flat.final_stmts.len(), 2);
        match &flat.final_stmts[0] {
            FinalStmt::Graph(ids) => assert_eq!(ids, &vec![1, 2]),
            other => panic!("unexpected {:?}", other),
        }
        match &flat.final_stmts[1] {
            FinalStmt::Print(args) => {
                assert!(matches!(&args[0], PrintArg::Text(t) if t == "final-values:"));
                assert!(matches!(&args[2], PrintArg::Value(Expr::Time)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    macro_rules! flatten_error_tests {
        ($($name:ident: $dynamic:literal, $expect:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let text = format!(
                    "model M {{ data v: Real; func dynamic() {{ $v = 1; }} }}
                     process P {{ data a, b: Real; data k: Real parameter; data m: M; {} }}",
                    $dynamic
                );
                let (_, errs, _) = flatten_unit(&text);
                assert_eq!(errs, $expect);
            }
        )*
        }
    }

    flatten_error_tests! {
        undeclared_target: "func dynamic() { c = 1; }", vec![DiagnosticKind::UndeclaredReference],
        undeclared_in_expr: "func dynamic() { a = c + d; }",
            vec![DiagnosticKind::UndeclaredReference, DiagnosticKind::UndeclaredReference],
        instance_as_value: "func dynamic() { a = m; }", vec![DiagnosticKind::UndeclaredReference],
        assign_parameter: "func dynamic() { k = 1; }", vec![DiagnosticKind::AssignToParameter],
        derivative_of_parameter: "func dynamic() { $k = 1; }", vec![DiagnosticKind::AssignToParameter],
        unknown_function: "func dynamic() { a = foo(b); }", vec![DiagnosticKind::UnknownFunction],
        wrong_arity: "func dynamic() { a = max(b); }", vec![DiagnosticKind::InvalidCall],
        builtin_statement: "func dynamic() { sin(a); }", vec![DiagnosticKind::InvalidCall],
        misplaced_solution_parameters: "func dynamic() { solution_parameters(1, 1); }",
            vec![DiagnosticKind::InvalidCall],
        misplaced_graph: "func init() { graph(a); }", vec![DiagnosticKind::InvalidCall],
        derivative_in_init: "func init() { $a = 1; }", vec![DiagnosticKind::InvalidCall],
        assignment_in_final: "func final() { a = 1; }", vec![DiagnosticKind::InvalidCall],
        graph_parameter: "func final() { graph(k); }", vec![DiagnosticKind::InvalidCall],
        string_in_expr: "func dynamic() { a = sin(\"x\"); }", vec![DiagnosticKind::InvalidCall],
        missing_member_func: "func dynamic() { m.final(); }", vec![DiagnosticKind::UnknownFunction],
        unknown_instance: "func dynamic() { n.dynamic(); }", vec![DiagnosticKind::UndeclaredReference],
        valid_body: "func dynamic() { m.dynamic(); a = -b + time * pi; $b = +e; }", vec![],
        if_without_else: "func dynamic() { $b = 1; if b > 1 { a = 1; } }",
            vec![DiagnosticKind::IncompleteDefinition],
        branch_missing_target: "func dynamic() { if b > 1 { a = 1; $b = 2; } else { a = 2; } }",
            vec![DiagnosticKind::IncompleteDefinition],
        branch_errors_take_precedence: "func dynamic() { if b > 1 { a = c; $b = 1; } }",
            vec![DiagnosticKind::UndeclaredReference],
        undeclared_condition: "func dynamic() { if c { a = 1; } else { a = 2; } }",
            vec![DiagnosticKind::UndeclaredReference],
        complete_if: "func dynamic() { if b > 1 and not a { a = 1; } elif b < 0 { a = 2; } else { a = 3; } }",
            vec![],
        derivative_in_init_branch: "func init() { if 1 { $a = 1; } }", vec![DiagnosticKind::InvalidCall],
    }

    #[test]
    fn dynamic_if_becomes_piecewise() {
        let (flat, errs, _) = flatten_unit(
            "process P {
                data x, y, z: Real;
                func dynamic() {
                    if x > 1 { y = 1; $x = -1; } elif x < 0 { $x = 1; y = 2; } else { y = 3; $x = 0; }
                    z = y;
                }
            }",
        );
        assert!(errs.is_empty(), "{:?}", errs);
        let targets = flat
            .dynamic
            .iter()
            .map(|eq| (eq.target, eq.form))
            .collect::<Vec<_>>();
        assert_eq!(
            targets,
            vec![
                (1, EquationForm::Plain),
                (0, EquationForm::Derivative),
                (2, EquationForm::Plain),
            ]
        );
        match &flat.dynamic[0].rhs {
            Expr::Piecewise(cases, otherwise) => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[1].1, Expr::Number(2.0));
                assert_eq!(**otherwise, Expr::Number(3.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        // the condition is a dependency of every branch target
        assert_eq!(flat.dynamic[0].rhs.quantities(), vec![0]);
        assert_eq!(flat.dynamic[1].rhs.eval(0.0, &[-2.0, 0.0, 0.0]), 1.0);
    }

    #[test]
    fn init_and_final_keep_branches() {
        let (flat, errs, _) = flatten_unit(
            "model M { data v: Real; func init() { if 1 { v = 1; } } }
            process P {
                data m: M;
                data k: Real parameter;
                func init() { m.init(); if k > 0 { k = 1; } else { k = 2; solution_parameters(1, 1); } }
                func final() { if m.v > 0 { print(\"positive\"); } else { } }
            }",
        );
        assert!(errs.is_empty(), "{:?}", errs);
        assert_eq!(flat.init.len(), 2);
        match &flat.init[1] {
            InitStmt::If(branches) => {
                assert_eq!(branches.len(), 2);
                assert!(branches[0].condition.is_some());
                assert!(branches[1].condition.is_none());
                assert_eq!(branches[1].body.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &flat.final_stmts[0] {
            FinalStmt::If(branches) => {
                assert!(matches!(branches[0].body[0], FinalStmt::Print(_)));
                assert!(branches[1].body.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
