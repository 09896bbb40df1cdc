#![allow(clippy::empty_docs)]
#[derive(Parser)]
#[grammar = "parser/siml_grammar.pest"] // relative to src
pub struct SimlParser;

use crate::ast::StringSpan;

use pest::error::Error;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use std::boxed::Box;

use crate::ast;
use crate::ast::Ast;
use crate::ast::AstKind;

//term_op    = @{ "+" | "-" }
//factor_op  = @{ "*" | "/" | "%" }
//pow_op     = @{ "**" | "^" }
//cmp_op     = @{ "<=" | ">=" | "==" | "!=" | "<" | ">" }
fn parse_op(pair: Pair<Rule>) -> &str {
    match pair.as_str() {
        "**" => "^",
        op => op,
    }
}

//name       = @{ (ASCII_ALPHA | "_") ~ ident_char* }
//path       = @{ name ~ ("." ~ name)* }
fn parse_name(pair: Pair<Rule>) -> &str {
    pair.as_str()
}

fn span_of(pair: &Pair<Rule>) -> Option<StringSpan> {
    Some(StringSpan {
        pos_start: pair.as_span().start(),
        pos_end: pair.as_span().end(),
    })
}

fn join_spans(left: &Ast, right: &Ast) -> Option<StringSpan> {
    match (left.span, right.span) {
        (Some(l), Some(r)) => Some(StringSpan {
            pos_start: l.pos_start,
            pos_end: r.pos_end,
        }),
        _ => None,
    }
}

/// Folds `head (op operand)*` into a left associative chain of binops.
fn parse_left_assoc<'a>(mut inner: Pairs<'a, Rule>) -> Ast<'a> {
    let mut head = parse_value(inner.next().unwrap());
    while inner.peek().is_some() {
        let op = parse_op(inner.next().unwrap());
        let rhs = parse_value(inner.next().unwrap());
        let span = join_spans(&head, &rhs);
        head = Ast {
            kind: AstKind::Binop(ast::Binop {
                op,
                left: Box::new(head),
                right: Box::new(rhs),
            }),
            span,
        };
    }
    head
}

fn parse_value(pair: Pair<'_, Rule>) -> Ast<'_> {
    let span = span_of(&pair);
    match pair.as_rule() {
        Rule::name | Rule::path => Ast {
            kind: AstKind::Name(parse_name(pair)),
            span,
        },

        // real       = @{ digits ~ ("." ~ digits?)? ~ exponent? | "." ~ digits ~ exponent? }
        Rule::real => Ast {
            kind: AstKind::Number(pair.as_str().parse().unwrap()),
            span,
        },

        // string     = @{ "\"" ~ (!"\"" ~ ANY)* ~ "\"" }
        Rule::string => {
            let text = pair.as_str();
            Ast {
                kind: AstKind::Str(&text[1..text.len() - 1]),
                span,
            }
        }

        // class      = { class_head ~ "{" ~ data* ~ func* ~ "}" }
        Rule::class => {
            let mut name = "";
            let mut role = None;
            let mut data = Vec::new();
            let mut funcs = Vec::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::name => name = parse_name(inner),
                    Rule::role => role = ast::ClassRole::from_str(inner.as_str()),
                    Rule::data => data.push(Box::new(parse_value(inner))),
                    Rule::func => funcs.push(Box::new(parse_value(inner))),
                    _ => unreachable!("{:?}", inner.to_string()),
                }
            }
            Ast {
                kind: AstKind::Class(ast::Class {
                    name,
                    role,
                    data,
                    funcs,
                }),
                span,
            }
        }

        // data       = { "data" ~ name ~ ("," ~ name)* ~ ":" ~ name ~ data_kind? ~ ";" }
        Rule::data => {
            let mut names = Vec::new();
            let mut kind = ast::DataKind::Variable;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::name => names.push(parse_name(inner)),
                    Rule::data_kind => kind = ast::DataKind::Parameter,
                    _ => unreachable!("{:?}", inner.to_string()),
                }
            }
            // the last name is the type
            let type_name = names.pop().unwrap();
            Ast {
                kind: AstKind::Data(ast::DataDecl {
                    names,
                    type_name,
                    kind,
                }),
                span,
            }
        }

        // func       = { "func" ~ name ~ ("(" ~ ")")? ~ "{" ~ statement* ~ "}" }
        Rule::func => {
            let mut inner = pair.into_inner();
            let name = parse_name(inner.next().unwrap());
            Ast {
                kind: AstKind::Func(ast::Func {
                    name,
                    statements: inner.map(parse_value).map(Box::new).collect(),
                }),
                span,
            }
        }

        // derivative = { "$" ~ path ~ "=" ~ expression ~ ";" }
        // assignment = { path ~ "=" ~ expression ~ ";" }
        Rule::derivative | Rule::assignment => {
            let is_derivative = pair.as_rule() == Rule::derivative;
            let mut inner = pair.into_inner();
            let target = parse_name(inner.next().unwrap());
            let expr = Box::new(parse_value(inner.next().unwrap()));
            Ast {
                kind: AstKind::Assignment(ast::Assignment {
                    target,
                    is_derivative,
                    expr,
                }),
                span,
            }
        }

        // call_stmt  = { call ~ ";" }
        Rule::call_stmt => {
            let call = parse_value(pair.into_inner().next().unwrap());
            match call.kind {
                AstKind::Call(call) => Ast {
                    kind: AstKind::CallStmt(call),
                    span,
                },
                _ => unreachable!(),
            }
        }

        // call       = { path ~ "(" ~ (call_arg ~ ("," ~ call_arg)*)? ~ ")" }
        Rule::call => {
            let mut inner = pair.into_inner();
            Ast {
                kind: AstKind::Call(ast::Call {
                    fn_name: parse_name(inner.next().unwrap()),
                    args: inner.map(parse_value).map(Box::new).collect(),
                }),
                span,
            }
        }

        // if_stmt    = { if_kw ~ expression ~ block ~ (elif_kw ~ expression ~ block)* ~ (else_kw ~ block)? }
        Rule::if_stmt => {
            let mut clauses = Vec::new();
            let mut condition = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::if_kw | Rule::elif_kw | Rule::else_kw => (),
                    Rule::expression => condition = Some(Box::new(parse_value(inner))),
                    Rule::block => clauses.push(ast::IfClause {
                        condition: condition.take(),
                        statements: inner.into_inner().map(parse_value).map(Box::new).collect(),
                    }),
                    _ => unreachable!("{:?}", inner.to_string()),
                }
            }
            Ast {
                kind: AstKind::If(ast::If { clauses }),
                span,
            }
        }

        // expression  = { conjunction ~ (or_op ~ conjunction)* }
        // conjunction = { negation ~ (and_op ~ negation)* }
        // comparison  = { sum ~ (cmp_op ~ sum)? }
        // sum         = { term ~ (term_op ~ term)* }
        // term        = { unary ~ (factor_op ~ unary)* }
        Rule::expression | Rule::conjunction | Rule::comparison | Rule::sum | Rule::term => {
            parse_left_assoc(pair.into_inner())
        }

        // negation    = { not_op* ~ comparison }
        // unary       = { sign* ~ power }
        Rule::negation | Rule::unary => {
            let inner = pair.into_inner();
            let mut signs = Vec::new();
            let mut operand = None;
            for p in inner {
                match p.as_rule() {
                    Rule::sign | Rule::not_op => signs.push(parse_op(p)),
                    _ => operand = Some(parse_value(p)),
                }
            }
            let mut child = operand.unwrap();
            for op in signs.into_iter().rev() {
                child = Ast {
                    kind: AstKind::Monop(ast::Monop {
                        op,
                        child: Box::new(child),
                    }),
                    span,
                };
            }
            child
        }

        // power      = { primary ~ (pow_op ~ unary)? }
        Rule::power => {
            let mut inner = pair.into_inner();
            let base = parse_value(inner.next().unwrap());
            match inner.next() {
                Some(op) => {
                    let op = parse_op(op);
                    let exponent = parse_value(inner.next().unwrap());
                    Ast {
                        kind: AstKind::Binop(ast::Binop {
                            op,
                            left: Box::new(base),
                            right: Box::new(exponent),
                        }),
                        span,
                    }
                }
                None => base,
            }
        }

        _ => unreachable!("{:?}", pair.to_string()),
    }
}

pub fn parse_string(text: &str) -> Result<Vec<Ast>, Box<Error<Rule>>> {
    let main = SimlParser::parse(Rule::main, text)?.next().unwrap();
    let classes = main
        .into_inner()
        .filter(|p| p.as_rule() == Rule::class)
        .map(parse_value)
        .collect();
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::parse_string;
    use crate::ast::{ClassRole, DataKind};

    #[test]
    fn numbers_and_operators() {
        const TEXT: &str = "
            process P {
                data a: Real;
                func dynamic() {
                    a = 1 + 1.5 * 2e-3 - .5 / 1.;
                    a = -2 ** 3 ** 2;
                    a = 7 % 4 ^ 2;
                }
            }
        ";
        let classes = parse_string(TEXT).unwrap();
        let class = classes[0].kind.as_class().unwrap();
        let (func, _) = class.func("dynamic").unwrap();
        let exprs = func
            .statements
            .iter()
            .map(|s| s.kind.as_assignment().unwrap().expr.to_string())
            .collect::<Vec<_>>();
        assert_eq!(exprs[0], "((1 + (1.5 * 0.002)) - (0.5 / 1))");
        assert_eq!(exprs[1], "-(2 ^ (3 ^ 2))");
        assert_eq!(exprs[2], "(7 % (4 ^ 2))");
    }

    #[test]
    fn class_headers() {
        const TEXT: &str = "
            class A(model) { }
            class B(process) { }
            class C { }
            model D { }
            process E { }
        ";
        let classes = parse_string(TEXT).unwrap();
        let roles = classes
            .iter()
            .map(|c| {
                let c = c.kind.as_class().unwrap();
                (c.name, c.role)
            })
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![
                ("A", Some(ClassRole::Model)),
                ("B", Some(ClassRole::Process)),
                ("C", None),
                ("D", Some(ClassRole::Model)),
                ("E", Some(ClassRole::Process)),
            ]
        );
    }

    #[test]
    fn bioreactor() {
        const TEXT: &str = "
            # a comment
            class Reactor(model) {
                data mu, X, S: Real;
                data mu_max, Ks, Yxs: Real parameter;   // trailing comment

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
                func initialize() { r.init(); solution_parameters(20, 0.1); }
                func final() { graph(r.X, r.S); print(\"final-values:\", r.X, time); }
            }
        ";
        let classes = parse_string(TEXT).unwrap();
        assert_eq!(classes.len(), 2);

        let reactor = classes[0].kind.as_class().unwrap();
        assert_eq!(reactor.name, "Reactor");
        let decls = reactor.data_decls().map(|(d, _)| d).collect::<Vec<_>>();
        assert_eq!(decls[0].names, vec!["mu", "X", "S"]);
        assert_eq!(decls[0].type_name, "Real");
        assert_eq!(decls[0].kind, DataKind::Variable);
        assert_eq!(decls[1].names, vec!["mu_max", "Ks", "Yxs"]);
        assert_eq!(decls[1].kind, DataKind::Parameter);

        let (dynamic, _) = reactor.func("dynamic").unwrap();
        assert_eq!(dynamic.statements.len(), 3);
        let x = dynamic.statements[1].kind.as_assignment().unwrap();
        assert!(x.is_derivative);
        assert_eq!(x.target, "X");
        assert_eq!(x.expr.to_string(), "(mu * X)");
        let s = dynamic.statements[2].kind.as_assignment().unwrap();
        assert_eq!(s.expr.to_string(), "(((-1 / Yxs) * mu) * X)");
        assert_eq!(
            dynamic.statements[0].kind.as_assignment().unwrap().expr.to_string(),
            "((mu_max * S) / (S + Ks))"
        );

        let batch = classes[1].kind.as_class().unwrap();
        assert!(batch.is_process());
        let (init, _) = batch.func("init").unwrap();
        assert_eq!(init.name, "initialize");
        assert_eq!(init.statements[0].to_string(), "r.init();");
        assert_eq!(init.statements[1].to_string(), "solution_parameters(20, 0.1);");
        let (fin, _) = batch.func("final").unwrap();
        assert_eq!(
            fin.statements[1].to_string(),
            "print(\"final-values:\", r.X, time);"
        );
    }

    #[test]
    fn conditions_and_logic() {
        const TEXT: &str = "
            process P {
                data a, b, c: Real;
                func dynamic() {
                    if a < 0 and not b >= 1 or c != 2 {
                        a = 1;
                    } elif (b == a) {
                        a = 2; $b = 0;
                    } else {
                        if c > 0 { a = 3; } else { a = 4; }
                    }
                    notes = 1 <= 2;
                }
            }
        ";
        let classes = parse_string(TEXT).unwrap();
        let class = classes[0].kind.as_class().unwrap();
        let (func, _) = class.func("dynamic").unwrap();
        assert_eq!(func.statements.len(), 2);
        assert_eq!(
            func.statements[0].to_string(),
            "if (((a < 0) and not (b >= 1)) or (c != 2)) { a = 1; } \
             elif (b == a) { a = 2; $b = 0; } \
             else { if (c > 0) { a = 3; } else { a = 4; } }"
        );
        let notes = func.statements[1].kind.as_assignment().unwrap();
        assert_eq!(notes.target, "notes");
        assert_eq!(notes.expr.to_string(), "(1 <= 2)");
    }

    #[test]
    fn syntax_errors() {
        let bad = [
            "process P { data a Real; }",
            "process P { func dynamic() { a = ; } }",
            "process P { func dynamic() { $a = 1 } }",
            "process P { data data: Real; }",
            "process { }",
            "process P { func dynamic() { a = 1 < 2 < 3; } }",
            "process P { func dynamic() { else { a = 1; } } }",
            "process P { func dynamic() { if a { b = 1; } else { } elif b { } } }",
            "process P { data or: Real; }",
        ];
        for text in bad {
            assert!(parse_string(text).is_err(), "expected error for {text}");
        }
    }
}
