use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;

use crate::ast::{Ast, Class, DataKind, Func, StringSpan};

use super::{DiagnosticKind, Env, QuantityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericType {
    Real,
    Float,
}

impl NumericType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Real" => Some(NumericType::Real),
            "Float" => Some(NumericType::Float),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: DataKind,
    pub span: Option<StringSpan>,
}

impl Declaration {
    pub fn is_parameter(&self) -> bool {
        self.kind == DataKind::Parameter
    }
}

/// The flat scope of a process: every quantity reachable through composition,
/// keyed by its dotted path, in declaration order.
#[derive(Debug, Clone)]
pub struct Declarations<'a> {
    quantities: IndexMap<String, Declaration>,
    instances: IndexMap<String, &'a Class<'a>>,
}

impl<'a> Declarations<'a> {
    pub fn get(&self, name: &str) -> Option<(QuantityId, &Declaration)> {
        self.quantities.get_full(name).map(|(id, _, decl)| (id, decl))
    }

    pub fn name(&self, id: QuantityId) -> &str {
        self.quantities
            .get_index(id)
            .map(|(name, _)| name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuantityId, &Declaration)> {
        self.quantities.values().enumerate()
    }

    /// The model class embedded under the dotted path `prefix`.
    pub fn instance(&self, prefix: &str) -> Option<&'a Class<'a>> {
        self.instances.get(prefix).copied()
    }
}

struct Resolver<'a, 'e> {
    env: &'e mut Env<'a>,
    quantities: IndexMap<String, Declaration>,
    instances: IndexMap<String, &'a Class<'a>>,
    checked: HashSet<&'a str>,
}

/// Builds the flat declaration map of `process`, embedding every model
/// instance under its field name.
pub fn resolve<'a>(process: &'a Class<'a>, env: &mut Env<'a>) -> Declarations<'a> {
    let mut resolver = Resolver {
        env,
        quantities: IndexMap::new(),
        instances: IndexMap::new(),
        checked: HashSet::new(),
    };
    let mut stack = vec![process.name];
    resolver.resolve_class(process, "", &mut stack);
    debug!(
        "resolved {} quantities and {} instances in {}",
        resolver.quantities.len(),
        resolver.instances.len(),
        process.name
    );
    Declarations {
        quantities: resolver.quantities,
        instances: resolver.instances,
    }
}

impl<'a> Resolver<'a, '_> {
    fn resolve_class(&mut self, class: &'a Class<'a>, prefix: &str, stack: &mut Vec<&'a str>) {
        if self.checked.insert(class.name) {
            self.check_funcs(class);
        }
        let mut local: HashSet<&str> = HashSet::new();
        for (decl, ast) in class.data_decls() {
            for &name in &decl.names {
                if Env::is_reserved(name) {
                    self.env.push(
                        DiagnosticKind::DuplicateDeclaration,
                        format!("`{}` is a built-in name and cannot be declared", name),
                        ast.span,
                    );
                    continue;
                }
                if !local.insert(name) {
                    self.env.push(
                        DiagnosticKind::DuplicateDeclaration,
                        format!("`{}` is already declared in {}", name, class.name),
                        ast.span,
                    );
                    continue;
                }
                let path = format!("{}{}", prefix, name);
                if NumericType::from_name(decl.type_name).is_some() {
                    self.quantities.insert(
                        path,
                        Declaration {
                            name: name.to_string(),
                            kind: decl.kind,
                            span: ast.span,
                        },
                    );
                } else if let Some(model) = self.env.model(decl.type_name) {
                    self.embed(model, name, &path, ast, stack);
                } else {
                    let text = match self.env.class(decl.type_name) {
                        Some(_) => format!(
                            "`{}` is a process and cannot be used as a data type",
                            decl.type_name
                        ),
                        None => format!("unknown type `{}`", decl.type_name),
                    };
                    self.env.push(DiagnosticKind::UnknownType, text, ast.span);
                }
            }
        }
    }

    fn embed(
        &mut self,
        model: &'a Class<'a>,
        field: &str,
        path: &str,
        ast: &Ast<'a>,
        stack: &mut Vec<&'a str>,
    ) {
        if stack.contains(&model.name) {
            let mut chain = stack.clone();
            chain.push(model.name);
            self.env.push(
                DiagnosticKind::RecursiveComposition,
                format!(
                    "field `{}` makes {} contain itself ({})",
                    field,
                    model.name,
                    chain.join(" -> ")
                ),
                ast.span,
            );
            return;
        }
        self.instances.insert(path.to_string(), model);
        stack.push(model.name);
        self.resolve_class(model, &format!("{}.", path), stack);
        stack.pop();
    }

    fn check_funcs(&mut self, class: &'a Class<'a>) {
        let mut seen: HashSet<&str> = HashSet::new();
        for func in &class.funcs {
            if let Some(f) = func.kind.as_func() {
                if !seen.insert(Func::canonical_name(f.name)) {
                    self.env.push(
                        DiagnosticKind::DuplicateDeclaration,
                        format!("function `{}` is defined twice in {}", f.name, class.name),
                        func.span,
                    );
                }
            }
        }
    }
}
