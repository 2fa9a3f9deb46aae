//! Lowering from the generated pest parse tree to the arena AST.

use bumpalo::Bump;
use pest::iterators::Pair;
use pest::Parser as _;
use pest_derive::Parser;

use crate::error::{EngineError, Result};
use crate::interpret::ast::{BinaryOp, Expr, Pattern, Program, Stmt, UnaryOp};

#[derive(Parser)]
#[grammar = "interpret/lang.pest"]
struct LangParser;

pub fn parse_program<'a>(source: &'a str, arena: &'a Bump) -> Result<Program<'a>> {
    let mut pairs = LangParser::parse(Rule::program, source).map_err(syntax_error)?;
    let root = pairs.next().expect("the program rule always matches once");

    let mut program = Program::default();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::let_stmt => {
                let mut inner = pair.into_inner();
                let name = inner.next().unwrap().as_str();
                let value = lower_expr(inner.next().unwrap(), arena)?;
                program.statements.push(Stmt::Let(name, value));
            }
            Rule::print_stmt => {
                let mut inner = pair.into_inner();
                let value = lower_expr(inner.next().unwrap(), arena)?;
                program.statements.push(Stmt::Print(value));
            }
            Rule::EOI => {}
            other => unreachable!("unexpected statement rule {other:?}"),
        }
    }
    Ok(program)
}

fn syntax_error(err: pest::error::Error<Rule>) -> EngineError {
    let (line, column) = match err.line_col {
        pest::error::LineColLocation::Pos(position) => position,
        pest::error::LineColLocation::Span(start, _) => start,
    };
    EngineError::Syntax(format!("malformed query at line {line}, column {column}"))
}

fn lower_expr<'a>(pair: Pair<'a, Rule>, arena: &'a Bump) -> Result<&'a Expr<'a>> {
    match pair.as_rule() {
        Rule::expr => lower_expr(pair.into_inner().next().unwrap(), arena),
        Rule::or_expr => lower_fold(pair, arena, |_| BinaryOp::Or),
        Rule::and_expr => lower_fold(pair, arena, |_| BinaryOp::And),
        Rule::not_expr => {
            let inner = pair.into_inner().next().unwrap();
            match inner.as_rule() {
                Rule::not_expr => {
                    let operand = lower_expr(inner, arena)?;
                    Ok(arena.alloc(Expr::Unary(UnaryOp::Not, operand)))
                }
                _ => lower_expr(inner, arena),
            }
        }
        Rule::in_expr => {
            let mut inner = pair.into_inner();
            let left = lower_expr(inner.next().unwrap(), arena)?;
            match inner.next() {
                Some(right) => {
                    let right = lower_expr(right, arena)?;
                    Ok(arena.alloc(Expr::Binary(BinaryOp::In, left, right)))
                }
                None => Ok(left),
            }
        }
        Rule::lang_expr => {
            let mut inner = pair.into_inner();
            let mut accumulated = lower_expr(inner.next().unwrap(), arena)?;
            while let Some(op) = inner.next() {
                let operator = match op.as_str() {
                    "intersect" => BinaryOp::Intersect,
                    "union" => BinaryOp::Union,
                    "concat" => BinaryOp::Concat,
                    other => unreachable!("unexpected language operator {other:?}"),
                };
                let right = lower_expr(inner.next().unwrap(), arena)?;
                accumulated = arena.alloc(Expr::Binary(operator, accumulated, right));
            }
            Ok(accumulated)
        }
        Rule::postfix_expr => {
            let mut inner = pair.into_inner();
            let mut accumulated = lower_expr(inner.next().unwrap(), arena)?;
            for op in inner {
                accumulated = lower_postfix(op, accumulated, arena)?;
            }
            Ok(accumulated)
        }
        Rule::tuple_or_group => {
            let parts: Vec<&Expr> = pair
                .into_inner()
                .map(|part| lower_expr(part, arena))
                .collect::<Result<_>>()?;
            match parts.as_slice() {
                [single] => Ok(single),
                [first, second] => Ok(arena.alloc(Expr::Pair(first, second))),
                [first, mark, second] => Ok(arena.alloc(Expr::Triple(first, mark, second))),
                _ => unreachable!("tuples have one to three components"),
            }
        }
        Rule::set_lit => {
            let elems: Vec<&Expr> = pair
                .into_inner()
                .map(|elem| lower_expr(elem, arena))
                .collect::<Result<_>>()?;
            Ok(arena.alloc(Expr::SetLit(arena.alloc_slice_copy(&elems))))
        }
        Rule::range_lit => {
            let mut inner = pair.into_inner();
            let low = lower_int(inner.next().unwrap())?;
            let high = lower_int(inner.next().unwrap())?;
            Ok(arena.alloc(Expr::Range(low, high)))
        }
        Rule::int => Ok(arena.alloc(Expr::Int(lower_int(pair)?))),
        Rule::bool_lit => Ok(arena.alloc(Expr::Bool(pair.as_str() == "true"))),
        Rule::string => Ok(arena.alloc(Expr::Str(inner_text(pair)))),
        Rule::regex_lit => Ok(arena.alloc(Expr::RegexLit(inner_text(pair)))),
        Rule::cfg_lit => Ok(arena.alloc(Expr::CfgLit(inner_text(pair)))),
        Rule::load_dot => {
            let name = inner_text(pair.into_inner().next().unwrap());
            Ok(arena.alloc(Expr::LoadDot(name)))
        }
        Rule::load_graph => {
            let name = inner_text(pair.into_inner().next().unwrap());
            Ok(arena.alloc(Expr::LoadGraph(name)))
        }
        Rule::ident => Ok(arena.alloc(Expr::Var(pair.as_str()))),
        other => unreachable!("unexpected expression rule {other:?}"),
    }
}

fn lower_fold<'a>(
    pair: Pair<'a, Rule>,
    arena: &'a Bump,
    operator: impl Fn(&str) -> BinaryOp,
) -> Result<&'a Expr<'a>> {
    let mut inner = pair.into_inner();
    let mut accumulated = lower_expr(inner.next().unwrap(), arena)?;
    for next in inner {
        let op = operator(next.as_str());
        let right = lower_expr(next, arena)?;
        accumulated = arena.alloc(Expr::Binary(op, accumulated, right));
    }
    Ok(accumulated)
}

fn lower_postfix<'a>(
    op: Pair<'a, Rule>,
    operand: &'a Expr<'a>,
    arena: &'a Bump,
) -> Result<&'a Expr<'a>> {
    let unary = |arena: &'a Bump, operator: UnaryOp| -> &'a Expr<'a> {
        arena.alloc(Expr::Unary(operator, operand))
    };
    Ok(match op.as_rule() {
        Rule::star_op => unary(arena, UnaryOp::Star),
        Rule::starting_op => unary(arena, UnaryOp::Starting),
        Rule::final_op => unary(arena, UnaryOp::Final),
        Rule::nodes_op => unary(arena, UnaryOp::Nodes),
        Rule::edges_op => unary(arena, UnaryOp::Edges),
        Rule::marks_op => unary(arena, UnaryOp::Marks),
        Rule::reachables_op => unary(arena, UnaryOp::Reachables),
        Rule::set_starting_op | Rule::set_final_op | Rule::add_starting_op
        | Rule::add_final_op => {
            let operator = match op.as_rule() {
                Rule::set_starting_op => BinaryOp::SetStarting,
                Rule::set_final_op => BinaryOp::SetFinal,
                Rule::add_starting_op => BinaryOp::AddStarting,
                _ => BinaryOp::AddFinal,
            };
            let argument = lower_expr(op.into_inner().next().unwrap(), arena)?;
            arena.alloc(Expr::Binary(operator, operand, argument))
        }
        Rule::map_op | Rule::filter_op => {
            let is_map = op.as_rule() == Rule::map_op;
            let mut inner = op.into_inner();
            let pattern = lower_pattern(inner.next().unwrap(), arena)?;
            let body = lower_expr(inner.next().unwrap(), arena)?;
            if is_map {
                arena.alloc(Expr::Map {
                    set: operand,
                    pattern,
                    body,
                })
            } else {
                arena.alloc(Expr::Filter {
                    set: operand,
                    pattern,
                    body,
                })
            }
        }
        other => unreachable!("unexpected postfix rule {other:?}"),
    })
}

fn lower_pattern<'a>(pair: Pair<'a, Rule>, arena: &'a Bump) -> Result<&'a Pattern<'a>> {
    match pair.as_rule() {
        Rule::pattern => lower_pattern(pair.into_inner().next().unwrap(), arena),
        Rule::any_pat => Ok(arena.alloc(Pattern::Any)),
        Rule::name_pat => Ok(arena.alloc(Pattern::Name(pair.as_str()))),
        Rule::tuple_pat => {
            let parts: Vec<&Pattern> = pair
                .into_inner()
                .map(|part| lower_pattern(part, arena))
                .collect::<Result<_>>()?;
            match parts.as_slice() {
                [first, second] => Ok(arena.alloc(Pattern::Pair(first, second))),
                [first, mark, second] => {
                    Ok(arena.alloc(Pattern::Triple(first, mark, second)))
                }
                _ => unreachable!("tuple patterns have two or three parts"),
            }
        }
        other => unreachable!("unexpected pattern rule {other:?}"),
    }
}

fn lower_int(pair: Pair<'_, Rule>) -> Result<i64> {
    pair.as_str()
        .parse()
        .map_err(|_| EngineError::Syntax(format!("integer {} overflows", pair.as_str())))
}

fn inner_text<'a>(pair: Pair<'a, Rule>) -> &'a str {
    let pair = match pair.as_rule() {
        Rule::string | Rule::regex_lit | Rule::cfg_lit => pair.into_inner().next().unwrap(),
        _ => pair,
    };
    pair.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> bool {
        let arena = Bump::new();
        parse_program(source, &arena).is_ok()
    }

    #[test]
    fn statements_and_literals_parse() {
        assert!(parse_ok("let x := 5\nprint x"));
        assert!(parse_ok("let g := load_graph \"skos\""));
        assert!(parse_ok("print r\"a*|b\""));
        assert!(parse_ok("print c\"S -> a S b | a b\""));
        assert!(parse_ok("print <|1, 2, 3|>"));
        assert!(parse_ok("print <|1..10|>"));
        assert!(parse_ok("print (1, 2)"));
        assert!(parse_ok("print (1, \"a\", 2)"));
    }

    #[test]
    fn operator_chains_parse() {
        assert!(parse_ok("print not 1 in <|1, 2|> and true or false"));
        assert!(parse_ok("let q := r\"a\" union r\"b\" concat r\"c\" star"));
        assert!(parse_ok(
            "let g := load_graph \"skos\" set_starting <|1..10|>\n\
             print (g reachables map ((_, f) => f))"
        ));
        assert!(parse_ok("print s filter ((u, v) => u in vs)"));
        assert!(parse_ok("print (g nodes) intersect (h nodes)"));
    }

    #[test]
    fn keywords_do_not_become_identifiers() {
        let arena = Bump::new();
        assert!(parse_program("let union := 5", &arena).is_err());
        assert!(parse_program("print let", &arena).is_err());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert!(parse_ok(
            "// header\n\nlet x := 1\n// middle\nprint x\n\n"
        ));
    }

    #[test]
    fn map_lowering_produces_the_right_shape() {
        let arena = Bump::new();
        let program =
            parse_program("print <|1, 2|> map (x => x)", &arena).unwrap();
        assert_eq!(program.statements.len(), 1);
        let Stmt::Print(expr) = &program.statements[0] else {
            panic!("expected a print statement");
        };
        assert!(matches!(expr, Expr::Map { .. }));
    }
}

