//! Context-free path queries by three interchangeable kernels. Each
//! computes the grammar-constrained transitive closure, the set of
//! facts `(u, A, v)` meaning "some `A`-path leads from `u` to `v`",
//! and the shared wrapper projects the start nonterminal's facts onto
//! the requested vertex sets. The kernels agree on every input; they
//! differ only in how the fixed point is driven.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::atom::Atom;
use crate::error::{EngineError, Result};
use crate::graph::LabeledGraph;
use crate::grammar::rsm::Rsm;
use crate::grammar::{Cfg, Symbol};
use crate::lts::Lts;
use crate::matrix::SparseBool;

/// One grammar-constrained reachability fact.
pub type Fact = (Atom, String, Atom);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Hellings,
    Matrix,
    Tensor,
}

/// Pairs `(u, v)` with a `start_symbol`-path between them, restricted
/// to the given vertex sets. Omitted sets default to every vertex; an
/// omitted symbol defaults to the grammar's start nonterminal.
pub fn cfpq(
    graph: &LabeledGraph,
    grammar: &Cfg,
    starts: Option<&BTreeSet<Atom>>,
    finals: Option<&BTreeSet<Atom>>,
    start_symbol: Option<&str>,
    algorithm: Algorithm,
) -> Result<BTreeSet<(Atom, Atom)>> {
    for (set, role) in [(starts, "start"), (finals, "final")] {
        if let Some(set) = set {
            for vertex in set {
                if !graph.contains_node(vertex) {
                    return Err(EngineError::Domain(format!(
                        "{role} vertex {vertex} is not a graph node"
                    )));
                }
            }
        }
    }

    let closure = match algorithm {
        Algorithm::Hellings => hellings_closure(graph, grammar),
        Algorithm::Matrix => matrix_closure(graph, grammar),
        Algorithm::Tensor => tensor_closure(graph, grammar)?,
    };
    let symbol = start_symbol.unwrap_or_else(|| grammar.start());

    Ok(closure
        .into_iter()
        .filter(|(from, head, to)| {
            head == symbol
                && starts.is_none_or(|set| set.contains(from))
                && finals.is_none_or(|set| set.contains(to))
        })
        .map(|(from, _, to)| (from, to))
        .collect())
}

/// Set-saturation kernel: a worklist over reachability facts.
pub fn hellings_closure(graph: &LabeledGraph, grammar: &Cfg) -> BTreeSet<Fact> {
    let parts = grammar.wcnf_parts();
    let nodes: Vec<Atom> = graph.nodes().cloned().collect();

    let mut facts: BTreeSet<Fact> = BTreeSet::new();
    for node in &nodes {
        for head in &parts.epsilon_heads {
            facts.insert((node.clone(), head.clone(), node.clone()));
        }
    }
    for (from, label, to) in graph.edges() {
        if let Some(heads) = parts.terminal_heads.get(label) {
            for head in heads {
                facts.insert((from.clone(), head.clone(), to.clone()));
            }
        }
    }

    let mut worklist: Vec<Fact> = facts.iter().cloned().collect();
    while let Some((from, symbol, to)) = worklist.pop() {
        let mut derived: Vec<Fact> = Vec::new();
        for (other_from, other_symbol, other_to) in &facts {
            // an existing fact ending where this one starts composes on
            // the left, one starting where this one ends on the right
            if *other_to == from {
                for (head, left, right) in &parts.binary {
                    if *left == *other_symbol && *right == symbol {
                        let fact = (other_from.clone(), head.clone(), to.clone());
                        if !facts.contains(&fact) {
                            derived.push(fact);
                        }
                    }
                }
            }
            if *other_from == to {
                for (head, left, right) in &parts.binary {
                    if *left == symbol && *right == *other_symbol {
                        let fact = (from.clone(), head.clone(), other_to.clone());
                        if !facts.contains(&fact) {
                            derived.push(fact);
                        }
                    }
                }
            }
        }
        for fact in derived {
            if facts.insert(fact.clone()) {
                worklist.push(fact);
            }
        }
    }
    facts
}

/// Boolean-matrix kernel: one `|V| x |V|` relation per nonterminal,
/// saturated production by production until no `nnz` grows.
pub fn matrix_closure(graph: &LabeledGraph, grammar: &Cfg) -> BTreeSet<Fact> {
    let parts = grammar.wcnf_parts();
    let nodes: Vec<Atom> = graph.nodes().cloned().collect();
    let index_of: BTreeMap<&Atom, usize> =
        nodes.iter().enumerate().map(|(i, node)| (node, i)).collect();
    let n = nodes.len();

    let mut relations: BTreeMap<String, SparseBool> = parts
        .nonterminals
        .iter()
        .map(|name| (name.clone(), SparseBool::new(n, n)))
        .collect();

    for (from, label, to) in graph.edges() {
        if let Some(heads) = parts.terminal_heads.get(label) {
            for head in heads {
                relations
                    .get_mut(head)
                    .expect("terminal head is a wcnf nonterminal")
                    .set(index_of[from], index_of[to]);
            }
        }
    }
    let identity = SparseBool::identity(n);
    for head in &parts.epsilon_heads {
        let relation = relations
            .get_mut(head)
            .expect("epsilon head is a wcnf nonterminal");
        *relation = relation.or(&identity);
    }

    loop {
        let mut grown = false;
        for (head, left, right) in &parts.binary {
            let product = relations[left].matmul(&relations[right]);
            let relation = relations.get_mut(head).unwrap();
            let before = relation.nnz();
            *relation = relation.or(&product);
            grown |= relation.nnz() != before;
        }
        if !grown {
            break;
        }
    }

    let mut facts = BTreeSet::new();
    for (head, relation) in &relations {
        for (i, j) in relation.iter_nonzero() {
            facts.insert((nodes[i].clone(), head.clone(), nodes[j].clone()));
        }
    }
    facts
}

/// Kronecker kernel: intersect the minimized recursive state machine
/// with the graph, read start-to-final witnesses out of the closure,
/// feed them back as nonterminal-labeled graph edges, repeat. Nullable
/// nonterminals must seed the identity before the first intersection
/// or epsilon self-loops are lost.
pub fn tensor_closure(graph: &LabeledGraph, grammar: &Cfg) -> Result<BTreeSet<Fact>> {
    let machine = Rsm::from_cfg(grammar).minimize();
    let machine_lts = machine.to_lts();
    let mut graph_lts = Lts::from_nfa(&graph.to_nfa(None, None)?);
    let v = graph_lts.len();

    if v > 0 {
        let identity = SparseBool::identity(v);
        for name in grammar.nullables() {
            let relation = graph_lts.matrix_mut(Symbol::nonterminal(name));
            *relation = relation.or(&identity);
        }
    }

    let mut closure_size = usize::MAX;
    loop {
        let product = machine_lts.intersect(&graph_lts);
        let closure = product.transitive_closure();
        if closure.nnz() == closure_size {
            break;
        }
        closure_size = closure.nnz();
        debug!("tensor kernel: closure nnz {closure_size}");

        for (i, j) in closure.iter_nonzero() {
            let machine_from = machine_lts.state(i / v);
            let machine_to = machine_lts.state(j / v);
            if machine_from.is_start
                && machine_to.is_final
                && machine_from.value.0 == machine_to.value.0
            {
                graph_lts
                    .matrix_mut(Symbol::nonterminal(machine_from.value.0.clone()))
                    .set(i % v, j % v);
            }
        }
    }

    let mut facts = BTreeSet::new();
    for (label, relation) in graph_lts.matrices() {
        if let Symbol::Nonterminal(head) = label {
            for (i, j) in relation.iter_nonzero() {
                facts.insert((
                    graph_lts.state(i).value.clone(),
                    head.clone(),
                    graph_lts.state(j).value.clone(),
                ));
            }
        }
    }
    Ok(facts)
}
