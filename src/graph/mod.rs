pub mod catalog;
pub mod dot;

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::atom::Atom;
use crate::automaton::Nfa;
use crate::error::{EngineError, Result};

/// An edge-labeled directed multigraph. Parallel edges are allowed;
/// vertices are identified by [`Atom`]s.
#[derive(Debug, Clone, Default)]
pub struct LabeledGraph {
    graph: DiGraph<Atom, String>,
    index_of: HashMap<Atom, NodeIndex>,
}

/// Vertex, edge and label counts of a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInfo {
    pub nodes: usize,
    pub edges: usize,
    pub marks: BTreeSet<String>,
}

impl LabeledGraph {
    pub fn new() -> Self {
        LabeledGraph::default()
    }

    pub fn add_node(&mut self, value: Atom) -> NodeIndex {
        match self.index_of.get(&value) {
            Some(&index) => index,
            None => {
                let index = self.graph.add_node(value.clone());
                self.index_of.insert(value, index);
                index
            }
        }
    }

    pub fn add_edge(&mut self, from: Atom, label: impl Into<String>, to: Atom) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.graph.add_edge(from, to, label.into());
    }

    pub fn contains_node(&self, value: &Atom) -> bool {
        self.index_of.contains_key(value)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Vertices in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Atom> {
        self.graph.node_indices().map(|index| &self.graph[index])
    }

    /// Edges as `(from, label, to)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (&Atom, &str, &Atom)> {
        self.graph.edge_indices().map(|index| {
            let (from, to) = self.graph.edge_endpoints(index).unwrap();
            (
                &self.graph[from],
                self.graph[index].as_str(),
                &self.graph[to],
            )
        })
    }

    pub fn info(&self) -> GraphInfo {
        GraphInfo {
            nodes: self.node_count(),
            edges: self.edge_count(),
            marks: self
                .edges()
                .map(|(_, label, _)| label.to_string())
                .collect(),
        }
    }

    /// Promote the graph to an NFA whose states are the vertices.
    /// Omitted start/final sets make every vertex both. A supplied set
    /// must be a subset of the vertices.
    pub fn to_nfa(
        &self,
        starts: Option<&BTreeSet<Atom>>,
        finals: Option<&BTreeSet<Atom>>,
    ) -> Result<Nfa<String>> {
        for (set, role) in [(starts, "start"), (finals, "final")] {
            if let Some(set) = set {
                for vertex in set {
                    if !self.contains_node(vertex) {
                        return Err(EngineError::Domain(format!(
                            "{role} vertex {vertex} is not a graph node"
                        )));
                    }
                }
            }
        }

        let mut nfa = Nfa::new();
        let mut state_of = HashMap::new();
        for index in self.graph.node_indices() {
            let value = self.graph[index].clone();
            let state = nfa.add_state(value.clone());
            state_of.insert(index, state);
            match starts {
                Some(set) if !set.contains(&value) => {}
                _ => nfa.mark_start(state),
            }
            match finals {
                Some(set) if !set.contains(&value) => {}
                _ => nfa.mark_final(state),
            }
        }
        for edge in self.graph.edge_indices() {
            let (from, to) = self.graph.edge_endpoints(edge).unwrap();
            nfa.add_transition(state_of[&from], self.graph[edge].clone(), state_of[&to]);
        }
        Ok(nfa)
    }
}

/// Two cycles sharing vertex `0`: the first runs through `1..=n` under
/// `first_label`, the second through `n+1..=n+m` under `second_label`.
pub fn labeled_two_cycles(
    n: usize,
    m: usize,
    (first_label, second_label): (&str, &str),
) -> LabeledGraph {
    let mut graph = LabeledGraph::new();
    let node = |i: usize| Atom::Int(i as i64);
    for i in 0..n {
        graph.add_edge(node(i), first_label, node(i + 1));
    }
    graph.add_edge(node(n), first_label, node(0));
    graph.add_edge(node(0), second_label, node(n + 1));
    for i in n + 1..n + m {
        graph.add_edge(node(i), second_label, node(i + 1));
    }
    graph.add_edge(node(n + m), second_label, node(0));
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_cycles_shape() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.edge_count(), 7);
        let info = graph.info();
        assert_eq!(info.marks, BTreeSet::from(["a".to_string(), "b".to_string()]));
        let edges: BTreeSet<(Atom, String, Atom)> = graph
            .edges()
            .map(|(u, l, v)| (u.clone(), l.to_string(), v.clone()))
            .collect();
        assert!(edges.contains(&(Atom::Int(3), "a".into(), Atom::Int(0))));
        assert!(edges.contains(&(Atom::Int(0), "b".into(), Atom::Int(4))));
        assert!(edges.contains(&(Atom::Int(5), "b".into(), Atom::Int(0))));
    }

    #[test]
    fn parallel_edges_are_kept() {
        let mut graph = LabeledGraph::new();
        graph.add_edge(Atom::Int(0), "a", Atom::Int(1));
        graph.add_edge(Atom::Int(0), "b", Atom::Int(1));
        graph.add_edge(Atom::Int(0), "a", Atom::Int(1));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn to_nfa_defaults_to_all_start_all_final() {
        let graph = labeled_two_cycles(1, 1, ("a", "b"));
        let nfa = graph.to_nfa(None, None).unwrap();
        assert_eq!(nfa.starts().len(), 3);
        assert_eq!(nfa.finals().len(), 3);
    }

    #[test]
    fn to_nfa_rejects_foreign_vertices() {
        let graph = labeled_two_cycles(1, 1, ("a", "b"));
        let bad = BTreeSet::from([Atom::Int(99)]);
        assert!(matches!(
            graph.to_nfa(Some(&bad), None),
            Err(EngineError::Domain(_))
        ));
    }
}
