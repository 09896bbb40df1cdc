use std::boxed::Box;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRole {
    Model,
    Process,
}

impl ClassRole {
    pub fn from_str(role: &str) -> Option<Self> {
        match role {
            "model" => Some(ClassRole::Model),
            "process" => Some(ClassRole::Process),
            _ => None,
        }
    }
}

impl fmt::Display for ClassRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClassRole::Model => write!(f, "model"),
            ClassRole::Process => write!(f, "process"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Parameter,
    Variable,
}

#[derive(Debug, Clone)]
pub struct Class<'a> {
    pub name: &'a str,
    pub role: Option<ClassRole>,
    pub data: Vec<Box<Ast<'a>>>,
    pub funcs: Vec<Box<Ast<'a>>>,
}

impl<'a> Class<'a> {
    /// Only processes can be compiled on their own; an untagged class is a model.
    pub fn is_process(&self) -> bool {
        self.role == Some(ClassRole::Process)
    }

    pub fn data_decls(&self) -> impl Iterator<Item = (&DataDecl<'a>, &Ast<'a>)> + '_ {
        self.data
            .iter()
            .filter_map(|d| d.kind.as_data().map(|decl| (decl, d.as_ref())))
    }

    pub fn func(&self, name: &str) -> Option<(&Func<'a>, &Ast<'a>)> {
        let canonical = Func::canonical_name(name);
        self.funcs.iter().find_map(|f| match f.kind.as_func() {
            Some(func) if Func::canonical_name(func.name) == canonical => Some((func, f.as_ref())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DataDecl<'a> {
    pub names: Vec<&'a str>,
    pub type_name: &'a str,
    pub kind: DataKind,
}

#[derive(Debug, Clone)]
pub struct Func<'a> {
    pub name: &'a str,
    pub statements: Vec<Box<Ast<'a>>>,
}

impl Func<'_> {
    /// `initialize` is an alias for `init`
    pub fn canonical_name(name: &str) -> &str {
        match name {
            "initialize" => "init",
            _ => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assignment<'a> {
    pub target: &'a str,
    pub is_derivative: bool,
    pub expr: Box<Ast<'a>>,
}

/// One arm of an `if` statement; `else` has no condition.
#[derive(Debug, Clone)]
pub struct IfClause<'a> {
    pub condition: Option<Box<Ast<'a>>>,
    pub statements: Vec<Box<Ast<'a>>>,
}

#[derive(Debug, Clone)]
pub struct If<'a> {
    pub clauses: Vec<IfClause<'a>>,
}

#[derive(Debug, Clone)]
pub struct Binop<'a> {
    pub op: &'a str,
    pub left: Box<Ast<'a>>,
    pub right: Box<Ast<'a>>,
}

#[derive(Debug, Clone)]
pub struct Monop<'a> {
    pub op: &'a str,
    pub child: Box<Ast<'a>>,
}

#[derive(Debug, Clone)]
pub struct Call<'a> {
    pub fn_name: &'a str,
    pub args: Vec<Box<Ast<'a>>>,
}

#[derive(Debug, Clone)]
pub enum AstKind<'a> {
    Class(Class<'a>),
    Data(DataDecl<'a>),
    Func(Func<'a>),
    Assignment(Assignment<'a>),
    CallStmt(Call<'a>),
    If(If<'a>),
    Binop(Binop<'a>),
    Monop(Monop<'a>),
    Call(Call<'a>),
    Number(f64),
    Str(&'a str),
    Name(&'a str),
}

impl<'a> AstKind<'a> {
    pub fn as_class(&self) -> Option<&Class<'a>> {
        match self {
            AstKind::Class(c) => Some(c),
            _ => None,
        }
    }
    pub fn as_data(&self) -> Option<&DataDecl<'a>> {
        match self {
            AstKind::Data(d) => Some(d),
            _ => None,
        }
    }
    pub fn as_func(&self) -> Option<&Func<'a>> {
        match self {
            AstKind::Func(f) => Some(f),
            _ => None,
        }
    }
    pub fn as_assignment(&self) -> Option<&Assignment<'a>> {
        match self {
            AstKind::Assignment(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_name(&self) -> Option<&'a str> {
        match self {
            AstKind::Name(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringSpan {
    pub pos_start: usize,
    pub pos_end: usize,
}

impl fmt::Display for StringSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.pos_start, self.pos_end)
    }
}

#[derive(Debug, Clone)]
pub struct Ast<'a> {
    pub kind: AstKind<'a>,
    pub span: Option<StringSpan>,
}

impl fmt::Display for Ast<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            AstKind::Class(class) => {
                match class.role {
                    Some(role) => writeln!(f, "class {}({}) {{", class.name, role)?,
                    None => writeln!(f, "class {} {{", class.name)?,
                }
                for d in &class.data {
                    writeln!(f, "    {d}")?;
                }
                for func in &class.funcs {
                    writeln!(f, "    {func}")?;
                }
                write!(f, "}}")
            }
            AstKind::Data(data) => {
                write!(f, "data {}: {}", data.names.join(", "), data.type_name)?;
                if data.kind == DataKind::Parameter {
                    write!(f, " parameter")?;
                }
                write!(f, ";")
            }
            AstKind::Func(func) => {
                write!(f, "func {}() {{", func.name)?;
                for stmt in &func.statements {
                    write!(f, " {stmt}")?;
                }
                write!(f, " }}")
            }
            AstKind::Assignment(a) => {
                if a.is_derivative {
                    write!(f, "${} = {};", a.target, a.expr)
                } else {
                    write!(f, "{} = {};", a.target, a.expr)
                }
            }
            AstKind::CallStmt(call) => write!(f, "{};", Call::display(call)),
            AstKind::Call(call) => write!(f, "{}", Call::display(call)),
            AstKind::Binop(binop) => write!(f, "({} {} {})", binop.left, binop.op, binop.right),
            AstKind::If(stmt) => {
                for (i, clause) in stmt.clauses.iter().enumerate() {
                    match (&clause.condition, i) {
                        (Some(cond), 0) => write!(f, "if {cond} {{")?,
                        (Some(cond), _) => write!(f, " elif {cond} {{")?,
                        (None, _) => write!(f, " else {{")?,
                    }
                    for stmt in &clause.statements {
                        write!(f, " {stmt}")?;
                    }
                    write!(f, " }}")?;
                }
                Ok(())
            }
            AstKind::Monop(monop) if monop.op == "not" => write!(f, "not {}", monop.child),
            AstKind::Monop(monop) => write!(f, "{}{}", monop.op, monop.child),
            AstKind::Number(num) => write!(f, "{num}"),
            AstKind::Str(text) => write!(f, "\"{text}\""),
            AstKind::Name(name) => write!(f, "{name}"),
        }
    }
}

impl Call<'_> {
    fn display(call: &Call) -> String {
        let args = call
            .args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", call.fn_name, args)
    }
}
