//! The tree-walking evaluator. An environment is a stack of scopes over
//! interned names: lookups search inner to outer, bindings always land
//! in the innermost scope, and `map`/`filter` push a scope produced by
//! matching their pattern against each element.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use bumpalo::Bump;
use lasso::{Rodeo, Spur};
use log::debug;

use crate::atom::Atom;
use crate::error::{EngineError, Result};
use crate::graph::catalog::Catalog;
use crate::graph::dot::read_dot;
use crate::interpret::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::interpret::parser::parse_program;
use crate::interpret::pattern::match_atom;
use crate::interpret::value::{CfgValue, FaValue, LSet, Value};
use crate::regex::Regex;

pub struct Interpreter {
    interner: Rodeo,
    scopes: Vec<HashMap<Spur, Value>>,
    catalog: Catalog,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter::with_catalog(Catalog::from_env())
    }

    pub fn with_catalog(catalog: Catalog) -> Interpreter {
        Interpreter {
            interner: Rodeo::new(),
            scopes: vec![HashMap::new()],
            catalog,
        }
    }

    /// Parse and run a whole program. Bindings persist across calls, so
    /// a REPL can feed lines one at a time.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let arena = Bump::new();
        let program = parse_program(source, &arena)?;
        for statement in &program.statements {
            self.eval_stmt(statement)?;
        }
        Ok(())
    }

    /// Value of a bound name, for hosts that inspect results.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let key = self.interner.get(name)?;
        self.scopes.iter().rev().find_map(|scope| scope.get(&key))
    }

    fn eval_stmt(&mut self, statement: &Stmt<'_>) -> Result<()> {
        match statement {
            Stmt::Let(name, value) => {
                let value = self.eval_expr(value)?;
                let key = self.interner.get_or_intern(name);
                self.scopes
                    .last_mut()
                    .expect("the global scope is never popped")
                    .insert(key, value);
                Ok(())
            }
            Stmt::Print(value) => {
                let value = self.eval_expr(value)?;
                println!("{value}");
                Ok(())
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr<'_>) -> Result<Value> {
        match expr {
            Expr::Int(value) => Ok(Value::Atom(Atom::Int(*value))),
            Expr::Bool(value) => Ok(Value::Atom(Atom::Bool(*value))),
            Expr::Str(value) => Ok(Value::Atom(Atom::Str((*value).to_string()))),
            Expr::Var(name) => self.lookup(name).cloned().ok_or_else(|| {
                EngineError::Type(format!("unknown variable name: {name}"))
            }),
            Expr::RegexLit(text) => {
                Ok(Value::Fa(Rc::new(FaValue::from_regex(&Regex::parse(text)?))))
            }
            Expr::CfgLit(text) => Ok(Value::Cfg(Rc::new(CfgValue::from_text(text)?))),
            Expr::Pair(first, second) => {
                let first = self.eval_expr(first)?.into_atom("a pair component")?;
                let second = self.eval_expr(second)?.into_atom("a pair component")?;
                if first.kind() != second.kind() {
                    return Err(EngineError::Type(format!(
                        "pair endpoints must share a type, not {} and {}",
                        first.kind(),
                        second.kind()
                    )));
                }
                Ok(Value::Atom(Atom::pair(first, second)))
            }
            Expr::Triple(first, mark, second) => {
                let first = self.eval_expr(first)?.into_atom("a triple component")?;
                let mark = self.eval_expr(mark)?.into_atom("a triple mark")?;
                let second = self.eval_expr(second)?.into_atom("a triple component")?;
                if first.kind() != second.kind() {
                    return Err(EngineError::Type(format!(
                        "triple endpoints must share a type, not {} and {}",
                        first.kind(),
                        second.kind()
                    )));
                }
                Ok(Value::Atom(Atom::triple(first, mark, second)))
            }
            Expr::SetLit(elems) => {
                let mut set = LSet::new();
                for elem in elems.iter() {
                    set.insert(self.eval_expr(elem)?.into_atom("a set element")?)?;
                }
                Ok(Value::Set(set))
            }
            Expr::Range(low, high) => {
                let set = LSet::from_atoms((*low..=*high).map(Atom::Int))?;
                Ok(Value::Set(set))
            }
            Expr::Unary(op, operand) => self.eval_unary(*op, operand),
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right),
            Expr::Map { set, pattern, body } => {
                let elems = self.eval_expr(set)?.into_set("map")?;
                let mut mapped = LSet::new();
                for atom in elems.iter() {
                    let value = self.under_match(pattern, atom, body)?;
                    mapped.insert(value.into_atom("a map result")?)?;
                }
                Ok(Value::Set(mapped))
            }
            Expr::Filter { set, pattern, body } => {
                let elems = self.eval_expr(set)?.into_set("filter")?;
                let mut kept = LSet::new();
                for atom in elems.iter() {
                    let verdict = self.under_match(pattern, atom, body)?;
                    if verdict.into_bool("a filter predicate")? {
                        kept.insert(atom.clone())?;
                    }
                }
                Ok(Value::Set(kept))
            }
            Expr::LoadDot(name) => self.load_dot(name),
            Expr::LoadGraph(name) => {
                debug!("loading graph {name:?} from the catalog");
                let graph = self.catalog.load(name)?;
                Ok(Value::Fa(Rc::new(FaValue::from_graph(&graph)?)))
            }
        }
    }

    /// Evaluate `body` in a fresh scope holding the pattern bindings.
    fn under_match(
        &mut self,
        pattern: &crate::interpret::ast::Pattern<'_>,
        atom: &Atom,
        body: &Expr<'_>,
    ) -> Result<Value> {
        let mut scope = HashMap::new();
        for (name, bound) in match_atom(pattern, atom)? {
            scope.insert(self.interner.get_or_intern(name), Value::Atom(bound));
        }
        self.scopes.push(scope);
        let result = self.eval_expr(body);
        self.scopes.pop();
        result
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr<'_>) -> Result<Value> {
        let value = self.eval_expr(operand)?;
        match op {
            UnaryOp::Not => Ok(Value::Atom(Atom::Bool(!value.into_bool("\"not\"")?))),
            UnaryOp::Star => match value {
                Value::Fa(automaton) => Ok(Value::Fa(Rc::new(automaton.star()))),
                other => Err(EngineError::Type(format!(
                    "\"star\" applies to a finite automaton, not a {}",
                    other.type_name()
                ))),
            },
            UnaryOp::Starting => match value {
                Value::Fa(automaton) => Ok(Value::Set(automaton.starting()?)),
                Value::Cfg(grammar) => Ok(Value::Set(grammar.starting()?)),
                other => unsupported("starting", &other),
            },
            UnaryOp::Final => match value {
                Value::Fa(automaton) => Ok(Value::Set(automaton.final_states()?)),
                Value::Cfg(grammar) => Ok(Value::Set(grammar.final_states()?)),
                other => unsupported("final", &other),
            },
            UnaryOp::Nodes => match value {
                Value::Fa(automaton) => Ok(Value::Set(automaton.nodes()?)),
                Value::Cfg(grammar) => Ok(Value::Set(grammar.nodes()?)),
                other => unsupported("nodes", &other),
            },
            UnaryOp::Edges => match value {
                Value::Fa(automaton) => Ok(Value::Set(automaton.edges()?)),
                Value::Cfg(grammar) => Ok(Value::Set(grammar.edges()?)),
                other => unsupported("edges", &other),
            },
            UnaryOp::Marks => match value {
                Value::Fa(automaton) => Ok(Value::Set(automaton.marks()?)),
                Value::Cfg(grammar) => Ok(Value::Set(grammar.marks()?)),
                other => unsupported("marks", &other),
            },
            UnaryOp::Reachables => match value {
                Value::Fa(automaton) => Ok(Value::Set(automaton.reachables()?)),
                Value::Cfg(grammar) => Ok(Value::Set(grammar.reachables()?)),
                other => unsupported("reachables", &other),
            },
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr<'_>, right: &Expr<'_>) -> Result<Value> {
        let left = self.eval_expr(left)?;
        let right = self.eval_expr(right)?;
        match op {
            BinaryOp::In => {
                let elem = left.into_atom("the left operand of \"in\"")?;
                let set = right.into_set("the right operand of \"in\"")?;
                Ok(Value::Atom(Atom::Bool(set.contains(&elem)?)))
            }
            BinaryOp::And => Ok(Value::Atom(Atom::Bool(
                left.into_bool("\"and\"")? & right.into_bool("\"and\"")?,
            ))),
            BinaryOp::Or => Ok(Value::Atom(Atom::Bool(
                left.into_bool("\"or\"")? | right.into_bool("\"or\"")?,
            ))),
            BinaryOp::Intersect => match (left, right) {
                (Value::Fa(first), Value::Fa(second)) => {
                    Ok(Value::Fa(Rc::new(first.intersect(&second)?)))
                }
                (Value::Cfg(grammar), Value::Fa(automaton))
                | (Value::Fa(automaton), Value::Cfg(grammar)) => {
                    Ok(Value::Cfg(Rc::new(grammar.intersect(&automaton))))
                }
                (left, right) => unsupported_pair("intersect", &left, &right),
            },
            BinaryOp::Union => match (left, right) {
                (Value::Fa(first), Value::Fa(second)) => {
                    Ok(Value::Fa(Rc::new(first.union(&second)?)))
                }
                (Value::Cfg(first), Value::Cfg(second)) => {
                    Ok(Value::Cfg(Rc::new(first.union(&second))))
                }
                (left, right) => unsupported_pair("union", &left, &right),
            },
            BinaryOp::Concat => match (left, right) {
                (Value::Fa(first), Value::Fa(second)) => {
                    Ok(Value::Fa(Rc::new(first.concat(&second)?)))
                }
                (Value::Cfg(first), Value::Cfg(second)) => {
                    Ok(Value::Cfg(Rc::new(first.concat(&second))))
                }
                (left, right) => unsupported_pair("concat", &left, &right),
            },
            BinaryOp::SetStarting
            | BinaryOp::SetFinal
            | BinaryOp::AddStarting
            | BinaryOp::AddFinal => {
                let name = match op {
                    BinaryOp::SetStarting => "set_starting",
                    BinaryOp::SetFinal => "set_final",
                    BinaryOp::AddStarting => "add_starting",
                    _ => "add_final",
                };
                let chosen = right.into_set(name)?;
                match left {
                    Value::Fa(automaton) => {
                        let rebuilt = match op {
                            BinaryOp::SetStarting => automaton.set_starting(&chosen)?,
                            BinaryOp::SetFinal => automaton.set_final(&chosen)?,
                            BinaryOp::AddStarting => automaton.add_starting(&chosen)?,
                            _ => automaton.add_final(&chosen)?,
                        };
                        Ok(Value::Fa(Rc::new(rebuilt)))
                    }
                    Value::Cfg(_) => Err(EngineError::Domain(format!(
                        "{name} cannot change the states of a grammar"
                    ))),
                    other => unsupported(name, &other),
                }
            }
        }
    }

    fn load_dot(&mut self, name: &str) -> Result<Value> {
        let path = Path::new(name);
        let stem = path
            .file_name()
            .and_then(|file| file.to_str())
            .unwrap_or(name);
        let text = std::fs::read_to_string(path)
            .map_err(|err| EngineError::Io(format!("cannot read {name}: {err}")))?;
        if stem.starts_with("cfg") {
            Ok(Value::Cfg(Rc::new(CfgValue::from_text(&text)?)))
        } else {
            let graph = read_dot(&text)?;
            Ok(Value::Fa(Rc::new(FaValue::from_graph(&graph)?)))
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

fn unsupported(operation: &str, value: &Value) -> Result<Value> {
    Err(EngineError::Type(format!(
        "\"{operation}\" does not apply to a {}",
        value.type_name()
    )))
}

fn unsupported_pair(operation: &str, left: &Value, right: &Value) -> Result<Value> {
    Err(EngineError::Type(format!(
        "\"{operation}\" does not apply to a {} and a {}",
        left.type_name(),
        right.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Interpreter {
        let mut interpreter = Interpreter::new();
        interpreter.run(source).unwrap();
        interpreter
    }

    fn shown(interpreter: &Interpreter, name: &str) -> String {
        interpreter.lookup(name).unwrap().to_string()
    }

    #[test]
    fn let_binds_and_shadows_nothing_outside() {
        let interpreter = run("let x := 5\nlet y := x in <|1..10|>");
        assert_eq!(shown(&interpreter, "x"), "5");
        assert_eq!(shown(&interpreter, "y"), "true");
    }

    #[test]
    fn boolean_connectives() {
        let interpreter = run(
            "let a := true and false\n\
             let b := true or false\n\
             let c := not true",
        );
        assert_eq!(shown(&interpreter, "a"), "false");
        assert_eq!(shown(&interpreter, "b"), "true");
        assert_eq!(shown(&interpreter, "c"), "false");
    }

    #[test]
    fn sets_and_ranges() {
        let interpreter = run("let s := <|3, 1, 2|>\nlet r := <|1..3|>");
        assert_eq!(shown(&interpreter, "s"), "<|1, 2, 3|>");
        assert_eq!(shown(&interpreter, "r"), "<|1, 2, 3|>");
    }

    #[test]
    fn heterogeneous_sets_are_type_errors() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.run("let s := <|1, \"x\"|>"),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn map_and_filter_with_patterns() {
        let interpreter = run(
            "let pairs := <|(1, 2), (3, 4)|>\n\
             let seconds := pairs map ((_, f) => f)\n\
             let low := pairs filter ((u, _) => u in <|1|>)",
        );
        assert_eq!(shown(&interpreter, "seconds"), "<|2, 4|>");
        assert_eq!(shown(&interpreter, "low"), "<|1 -> 2|>");
    }

    #[test]
    fn filter_requires_a_boolean_body() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.run("let s := <|1|> filter (x => x)"),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn lambda_bindings_do_not_leak() {
        let interpreter = run("let s := <|1|> map (x => x)");
        assert!(interpreter.lookup("x").is_none());
    }

    #[test]
    fn regex_automaton_pipeline() {
        let interpreter = run(
            "let q := r\"a*|b\"\n\
             let ns := q nodes\n\
             let ms := q marks",
        );
        assert_eq!(shown(&interpreter, "ms"), "<|a, b|>");
        assert!(shown(&interpreter, "ns").starts_with("<|"));
    }

    #[test]
    fn fa_reachables_via_language() {
        let interpreter = run(
            "let q := r\"a b\"\n\
             let rs := q reachables map ((_, f) => f)",
        );
        // the only final state of the minimal a-b automaton
        assert_eq!(shown(&interpreter, "rs"), "<|2|>");
    }

    #[test]
    fn cfg_star_is_unsupported() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.run("let g := c\"S -> a\" star"),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn cfg_flag_changes_are_domain_errors() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.run("let g := c\"S -> a\" set_starting <|1|>"),
            Err(EngineError::Domain(_))
        ));
    }

    #[test]
    fn cfg_with_cfg_intersection_is_unsupported() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.run("let g := c\"S -> a\" intersect c\"S -> b\""),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn grammar_union_concat_stay_grammars() {
        let interpreter = run("let g := c\"S -> a\" union c\"S -> b\"");
        assert!(matches!(
            interpreter.lookup("g"),
            Some(Value::Cfg(_))
        ));
    }

    #[test]
    fn pair_endpoint_types_must_agree() {
        let mut interpreter = Interpreter::new();
        assert!(matches!(
            interpreter.run("let p := (1, \"x\")"),
            Err(EngineError::Type(_))
        ));
    }

    #[test]
    fn unknown_variables_are_reported() {
        let mut interpreter = Interpreter::new();
        assert!(interpreter.run("print ghost").is_err());
    }
}
