//! The literal end-to-end scenarios: regex reachability on the two
//! cycle graph, the BFS sweep over `fifth.dot`, kernel agreement on
//! `extended_simple_graph.dot`, nullable grammars, grammar union, and
//! an interpreter session against the catalog fixture.

use std::collections::BTreeSet;
use std::fs;

use cfpq_engine::atom::Atom;
use cfpq_engine::graph::catalog::Catalog;
use cfpq_engine::graph::dot::read_dot;
use cfpq_engine::graph::labeled_two_cycles;
use cfpq_engine::grammar::Cfg;
use cfpq_engine::interpret::{Interpreter, Value};
use cfpq_engine::query::{
    bfs_reachable, bfs_reachable_per_source, cfpq, regular_query, Algorithm,
};
use cfpq_engine::regex::Regex;

fn ints(values: &[i64]) -> BTreeSet<Atom> {
    values.iter().map(|&n| Atom::Int(n)).collect()
}

fn strs(values: &[&str]) -> BTreeSet<Atom> {
    values.iter().map(|&s| Atom::Str(s.to_string())).collect()
}

#[test]
fn s1_regex_reachability_on_two_cycles() {
    let graph = labeled_two_cycles(3, 2, ("a", "b"));
    let request = Regex::parse("a*|b").unwrap();
    let answer = regular_query(
        &graph,
        &request,
        Some(&ints(&[0])),
        Some(&ints(&[1, 2, 3, 4])),
    )
    .unwrap();
    let expected: BTreeSet<(Atom, Atom)> = [(0, 1), (0, 2), (0, 3), (0, 4)]
        .into_iter()
        .map(|(u, v)| (Atom::Int(u), Atom::Int(v)))
        .collect();
    assert_eq!(answer, expected);
}

#[test]
fn s2_bfs_on_fifth_dot() {
    let text = fs::read_to_string("tests/data/fifth.dot").unwrap();
    let graph = read_dot(&text).unwrap();
    let request = Regex::parse("a*c").unwrap();
    let sources = strs(&["1"]);

    let reached = bfs_reachable(&graph, &request, &sources, None).unwrap();
    assert_eq!(reached, strs(&["3", "4"]));

    let per_source = bfs_reachable_per_source(&graph, &request, &sources, None).unwrap();
    let expected: BTreeSet<(Atom, Atom)> = [("1", "3"), ("1", "4")]
        .into_iter()
        .map(|(u, v)| (Atom::Str(u.into()), Atom::Str(v.into())))
        .collect();
    assert_eq!(per_source, expected);
}

#[test]
fn s3_kernels_agree_on_extended_simple_graph() {
    let text = fs::read_to_string("tests/data/extended_simple_graph.dot").unwrap();
    let graph = read_dot(&text).unwrap();
    let grammar_text = fs::read_to_string("tests/data/cfg_brackets").unwrap();
    let grammar = Cfg::from_text(&grammar_text, "S").unwrap();

    let hellings = cfpq(&graph, &grammar, None, None, None, Algorithm::Hellings).unwrap();
    let matrix = cfpq(&graph, &grammar, None, None, None, Algorithm::Matrix).unwrap();
    let tensor = cfpq(&graph, &grammar, None, None, None, Algorithm::Tensor).unwrap();
    assert_eq!(hellings, matrix);
    assert_eq!(matrix, tensor);
    assert!(!hellings.is_empty());
}

#[test]
fn s4_nullable_start_yields_all_self_loops() {
    let graph = labeled_two_cycles(2, 2, ("a", "b"));
    let grammar = Cfg::from_text("S -> epsilon", "S").unwrap();
    for algorithm in [Algorithm::Hellings, Algorithm::Matrix, Algorithm::Tensor] {
        let answer = cfpq(&graph, &grammar, None, None, None, algorithm).unwrap();
        let expected: BTreeSet<(Atom, Atom)> = graph
            .nodes()
            .map(|node| (node.clone(), node.clone()))
            .collect();
        assert_eq!(answer, expected, "algorithm {algorithm:?}");
    }
}

#[test]
fn s5_grammar_union_accepts_both_labels() {
    let first = Cfg::from_text("S -> a", "S").unwrap();
    let second = Cfg::from_text("S -> b", "S").unwrap();
    let union = first.union(&second);

    for (label, expected_hits) in [("a", 1), ("b", 1), ("c", 0)] {
        let mut graph = cfpq_engine::graph::LabeledGraph::new();
        graph.add_edge(Atom::Int(0), label, Atom::Int(1));
        let answer = cfpq(&graph, &union, None, None, None, Algorithm::Hellings).unwrap();
        assert_eq!(answer.len(), expected_hits, "label {label}");
    }
}

#[test]
fn s6_interpreter_session_over_the_catalog() {
    let mut interpreter = Interpreter::with_catalog(Catalog::open("tests/data/catalog"));
    interpreter
        .run(
            "let g := load_graph \"skos\" set_starting <|1..10|>\n\
             let finals := g reachables map ((_, f) => f)",
        )
        .unwrap();

    let Some(Value::Set(finals)) = interpreter.lookup("finals") else {
        panic!("finals should be a set");
    };
    let expected: BTreeSet<Atom> = (1..=12).map(Atom::Int).collect();
    let got: BTreeSet<Atom> = finals.iter().cloned().collect();
    assert_eq!(got, expected);
}

#[test]
fn regular_and_bfs_engines_agree() {
    let graph = labeled_two_cycles(3, 2, ("a", "b"));
    for pattern in ["a*|b", "a a", "b b*", "a*c"] {
        let request = Regex::parse(pattern).unwrap();
        let sources = ints(&[0]);
        let by_closure: BTreeSet<Atom> = regular_query(&graph, &request, Some(&sources), None)
            .unwrap()
            .into_iter()
            .map(|(_, to)| to)
            .collect();
        let by_bfs = bfs_reachable(&graph, &request, &sources, None).unwrap();
        assert_eq!(by_closure, by_bfs, "pattern {pattern}");
    }
}

#[test]
fn interpreter_loads_dot_and_grammar_files() {
    let mut interpreter = Interpreter::new();
    interpreter
        .run(
            "let g := load_dot \"tests/data/fifth.dot\"\n\
             let ns := g nodes\n\
             let c := load_dot \"tests/data/cfg_brackets\"\n\
             let ms := c marks",
        )
        .unwrap();

    let Some(Value::Set(nodes)) = interpreter.lookup("ns") else {
        panic!("ns should be a set");
    };
    assert_eq!(nodes.len(), 4);

    let Some(Value::Set(marks)) = interpreter.lookup("ms") else {
        panic!("ms should be a set");
    };
    assert!(marks.contains(&Atom::Str("a".into())).unwrap());
    assert!(marks.contains(&Atom::Str("S".into())).unwrap());
}

#[test]
fn missing_files_are_io_errors() {
    let mut interpreter = Interpreter::new();
    let err = interpreter
        .run("let g := load_dot \"tests/data/no_such.dot\"")
        .unwrap_err();
    assert!(err.to_string().starts_with("io error"));

    let mut catalog = Interpreter::with_catalog(Catalog::open("tests/data/catalog"));
    let err = catalog
        .run("let g := load_graph \"unknown\"")
        .unwrap_err();
    assert!(err.to_string().starts_with("io error"));
}
