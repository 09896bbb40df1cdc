use std::fmt;

/// Position of a declaration in the flat declaration map.
pub type QuantityId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Constant::Pi),
            "e" => Some(Constant::E),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "e",
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Exp,
    Log,
    Abs,
    Min,
    Max,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Builtin::Sin),
            "cos" => Some(Builtin::Cos),
            "tan" => Some(Builtin::Tan),
            "sqrt" => Some(Builtin::Sqrt),
            "exp" => Some(Builtin::Exp),
            "log" | "ln" => Some(Builtin::Log),
            "abs" => Some(Builtin::Abs),
            "min" => Some(Builtin::Min),
            "max" => Some(Builtin::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Sqrt => "sqrt",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Builtin::Min | Builtin::Max => 2,
            _ => 1,
        }
    }

    pub fn eval(&self, args: &[f64]) -> f64 {
        match self {
            Builtin::Sin => args[0].sin(),
            Builtin::Cos => args[0].cos(),
            Builtin::Tan => args[0].tan(),
            Builtin::Sqrt => args[0].sqrt(),
            Builtin::Exp => args[0].exp(),
            Builtin::Log => args[0].ln(),
            Builtin::Abs => args[0].abs(),
            Builtin::Min => args[0].min(args[1]),
            Builtin::Max => args[0].max(args[1]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl BinaryOp {
    pub fn from_symbol(op: &str) -> Option<Self> {
        match op {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "/" => Some(BinaryOp::Div),
            "%" => Some(BinaryOp::Rem),
            "^" | "**" => Some(BinaryOp::Pow),
            "<" => Some(BinaryOp::Lt),
            "<=" => Some(BinaryOp::Le),
            ">" => Some(BinaryOp::Gt),
            ">=" => Some(BinaryOp::Ge),
            "==" => Some(BinaryOp::Eq),
            "!=" => Some(BinaryOp::Ne),
            "and" => Some(BinaryOp::And),
            "or" => Some(BinaryOp::Or),
            _ => None,
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
            BinaryOp::Pow => 8,
        }
    }

    pub fn is_right_assoc(&self) -> bool {
        matches!(self, BinaryOp::Pow)
    }

    /// Comparisons do not associate: `a < b < c` would chain in Python.
    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    /// Truth values are 1.0 and 0.0, any non-zero value counts as true.
    /// `and` and `or` return one of their operands, as in Python.
    pub fn eval(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            // floored modulo, the result takes the sign of the divisor
            BinaryOp::Rem => {
                let r = lhs % rhs;
                if r != 0.0 && (r < 0.0) != (rhs < 0.0) {
                    r + rhs
                } else {
                    r
                }
            }
            BinaryOp::Pow => lhs.powf(rhs),
            BinaryOp::Lt => truth(lhs < rhs),
            BinaryOp::Le => truth(lhs <= rhs),
            BinaryOp::Gt => truth(lhs > rhs),
            BinaryOp::Ge => truth(lhs >= rhs),
            BinaryOp::Eq => truth(lhs == rhs),
            BinaryOp::Ne => truth(lhs != rhs),
            BinaryOp::And => {
                if lhs != 0.0 {
                    rhs
                } else {
                    lhs
                }
            }
            BinaryOp::Or => {
                if lhs != 0.0 {
                    lhs
                } else {
                    rhs
                }
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{op}")
    }
}

/// Conditional expressions bind loosest of all.
pub const PIECEWISE_PRECEDENCE: u8 = 0;
/// `not` sits between `and` and the comparisons.
pub const NOT_PRECEDENCE: u8 = 3;
/// Precedence of unary minus, between the multiplicative operators and `**`.
pub const NEG_PRECEDENCE: u8 = 7;
const ATOM_PRECEDENCE: u8 = 9;

/// Lowered expression with every name resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Time,
    Constant(Constant),
    Quantity(QuantityId),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    /// `(condition, value)` cases tried in order, then the fallback.
    Piecewise(Vec<(Expr, Expr)>, Box<Expr>),
}

impl Expr {
    pub fn precedence(&self) -> u8 {
        match self {
            Expr::Piecewise(_, _) => PIECEWISE_PRECEDENCE,
            Expr::Not(_) => NOT_PRECEDENCE,
            Expr::Neg(_) => NEG_PRECEDENCE,
            Expr::Binary(op, _, _) => op.precedence(),
            _ => ATOM_PRECEDENCE,
        }
    }

    /// Referenced quantities, first occurrence order, without repeats.
    pub fn quantities(&self) -> Vec<QuantityId> {
        let mut ids = Vec::new();
        self.collect_quantities(&mut ids);
        ids
    }

    fn collect_quantities(&self, ids: &mut Vec<QuantityId>) {
        match self {
            Expr::Quantity(id) => {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
            Expr::Neg(child) | Expr::Not(child) => child.collect_quantities(ids),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_quantities(ids);
                rhs.collect_quantities(ids);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_quantities(ids);
                }
            }
            Expr::Piecewise(cases, otherwise) => {
                for (condition, value) in cases {
                    condition.collect_quantities(ids);
                    value.collect_quantities(ids);
                }
                otherwise.collect_quantities(ids);
            }
            Expr::Number(_) | Expr::Time | Expr::Constant(_) => (),
        }
    }

    pub fn references(&self, id: QuantityId) -> bool {
        match self {
            Expr::Quantity(other) => *other == id,
            Expr::Neg(child) | Expr::Not(child) => child.references(id),
            Expr::Binary(_, lhs, rhs) => lhs.references(id) || rhs.references(id),
            Expr::Call(_, args) => args.iter().any(|a| a.references(id)),
            Expr::Piecewise(cases, otherwise) => {
                cases
                    .iter()
                    .any(|(condition, value)| condition.references(id) || value.references(id))
                    || otherwise.references(id)
            }
            Expr::Number(_) | Expr::Time | Expr::Constant(_) => false,
        }
    }

    /// `values` is indexed by [`QuantityId`].
    pub fn eval(&self, time: f64, values: &[f64]) -> f64 {
        match self {
            Expr::Number(value) => *value,
            Expr::Time => time,
            Expr::Constant(c) => c.value(),
            Expr::Quantity(id) => values[*id],
            Expr::Neg(child) => -child.eval(time, values),
            Expr::Not(child) => truth(child.eval(time, values) == 0.0),
            Expr::Binary(op, lhs, rhs) => op.eval(lhs.eval(time, values), rhs.eval(time, values)),
            Expr::Call(builtin, args) => {
                let args = args.iter().map(|a| a.eval(time, values)).collect::<Vec<_>>();
                builtin.eval(&args)
            }
            Expr::Piecewise(cases, otherwise) => cases
                .iter()
                .find(|(condition, _)| condition.eval(time, values) != 0.0)
                .map_or(&**otherwise, |(_, value)| value)
                .eval(time, values),
        }
    }
}
