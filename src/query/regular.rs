//! Regular-path queries: which vertex pairs are joined by a path whose
//! label word the request regex accepts. Two engines share the sparse
//! substrate: automaton intersection plus closure, and a multi-source
//! breadth-first sweep over the direct sum of request and graph.

use std::collections::BTreeSet;

use log::debug;

use crate::atom::Atom;
use crate::error::Result;
use crate::graph::LabeledGraph;
use crate::lts::Lts;
use crate::matrix::SparseBool;
use crate::regex::Regex;

/// Vertex pairs `(u, v)` such that some `u -> v` path spells a word of
/// `L(request)`. Omitted vertex sets default to every vertex.
pub fn regular_query(
    graph: &LabeledGraph,
    request: &Regex,
    starts: Option<&BTreeSet<Atom>>,
    finals: Option<&BTreeSet<Atom>>,
) -> Result<BTreeSet<(Atom, Atom)>> {
    let request_lts = Lts::from_nfa(&request.to_min_dfa().to_nfa());
    let graph_lts = Lts::from_nfa(&graph.to_nfa(starts, finals)?);
    let product = request_lts.intersect(&graph_lts);
    let closure = product.transitive_closure();
    debug!(
        "regular query: {} x {} product states, closure nnz {}",
        request_lts.len(),
        graph_lts.len(),
        closure.nnz()
    );

    let mut result = BTreeSet::new();
    for (i, j) in closure.iter_nonzero() {
        let from = product.state(i);
        let to = product.state(j);
        if from.is_start && to.is_final {
            result.insert((from.value.1.clone(), to.value.1.clone()));
        }
    }
    Ok(result)
}

/// Vertices reachable from any source along an accepted word.
pub fn bfs_reachable(
    graph: &LabeledGraph,
    request: &Regex,
    sources: &BTreeSet<Atom>,
    finals: Option<&BTreeSet<Atom>>,
) -> Result<BTreeSet<Atom>> {
    let reached = bfs_sweep(graph, request, sources, finals, false)?;
    Ok(reached.into_iter().map(|(_, vertex)| vertex).collect())
}

/// Like [`bfs_reachable`], but each reached vertex is paired with the
/// source it was reached from.
pub fn bfs_reachable_per_source(
    graph: &LabeledGraph,
    request: &Regex,
    sources: &BTreeSet<Atom>,
    finals: Option<&BTreeSet<Atom>>,
) -> Result<BTreeSet<(Atom, Atom)>> {
    bfs_sweep(graph, request, sources, finals, true)
}

/// The shared front engine. The front matrix has a request half (one
/// column per request state) and a graph half; multiplying it by the
/// block-diagonal direct sum advances both halves in lockstep, and
/// re-aligning rows keeps every request state on its own row. In
/// separated mode one front block is stacked per source.
fn bfs_sweep(
    graph: &LabeledGraph,
    request: &Regex,
    sources: &BTreeSet<Atom>,
    finals: Option<&BTreeSet<Atom>>,
    separated: bool,
) -> Result<BTreeSet<(Atom, Atom)>> {
    let request_lts = Lts::from_nfa(&request.to_min_dfa().to_nfa());
    let graph_lts = Lts::from_nfa(&graph.to_nfa(Some(sources), finals)?);
    let sum = request_lts.direct_sum(&graph_lts);

    let q = request_lts.len();
    let v = graph_lts.len();
    let width = q + v;

    let source_indices: Vec<usize> = (0..v)
        .filter(|&index| graph_lts.state(index).is_start)
        .collect();

    let blocks = if separated {
        source_indices.len().max(1)
    } else {
        1
    };
    let mut front = SparseBool::new(blocks * q, width);
    for block in 0..blocks {
        for state in 0..q {
            if !request_lts.state(state).is_start {
                continue;
            }
            front.set(block * q + state, state);
            if separated {
                if let Some(&source) = source_indices.get(block) {
                    front.set(block * q + state, q + source);
                }
            } else {
                for &source in &source_indices {
                    front.set(block * q + state, q + source);
                }
            }
        }
    }

    let mut visited = front.clone();
    loop {
        let before = visited.nnz();
        let basis = if front.is_empty() { &visited } else { &front };
        let mut step = SparseBool::new(blocks * q, width);
        for (_, matrix) in sum.matrices() {
            step = step.or(&realign(&basis.matmul(matrix), q));
        }
        front = step.difference(&visited);
        visited = visited.or(&step);
        if visited.nnz() == before {
            break;
        }
        debug!("bfs sweep: visited nnz {}", visited.nnz());
    }

    let mut result = BTreeSet::new();
    for (row, column) in visited.iter_nonzero() {
        if column < q {
            continue;
        }
        let request_state = row % q;
        let graph_state = column - q;
        if request_lts.state(request_state).is_final && graph_lts.state(graph_state).is_final {
            let source = if separated {
                graph_lts.state(source_indices[row / q]).value.clone()
            } else {
                graph_lts.state(graph_state).value.clone()
            };
            result.insert((source, graph_lts.state(graph_state).value.clone()));
        }
    }
    Ok(result)
}

/// Move every row of a freshly multiplied front so that a non-zero in
/// request column `j` lands on row `j` of its block, dragging the
/// row's graph half along. Rows whose request half died out are
/// dropped.
fn realign(step: &SparseBool, q: usize) -> SparseBool {
    let mut aligned = SparseBool::new(step.nrows(), step.ncols());
    for row in 0..step.nrows() {
        let block_base = (row / q) * q;
        let request_columns: Vec<usize> =
            step.iter_row(row).take_while(|&column| column < q).collect();
        for &request_column in &request_columns {
            let target = block_base + request_column;
            aligned.set(target, request_column);
            for column in step.iter_row(row).skip_while(|&column| column < q) {
                aligned.set(target, column);
            }
        }
    }
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labeled_two_cycles;

    fn ints(values: &[i64]) -> BTreeSet<Atom> {
        values.iter().map(|&n| Atom::Int(n)).collect()
    }

    fn pairs(values: &[(i64, i64)]) -> BTreeSet<(Atom, Atom)> {
        values
            .iter()
            .map(|&(a, b)| (Atom::Int(a), Atom::Int(b)))
            .collect()
    }

    #[test]
    fn two_cycles_restricted_endpoints() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        let request = Regex::parse("a*|b").unwrap();
        let result = regular_query(
            &graph,
            &request,
            Some(&ints(&[0])),
            Some(&ints(&[1, 2, 3, 4])),
        )
        .unwrap();
        assert_eq!(result, pairs(&[(0, 1), (0, 2), (0, 3), (0, 4)]));
    }

    #[test]
    fn foreign_labels_give_nothing() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        let request = Regex::parse("x*|y").unwrap();
        let result = regular_query(&graph, &request, None, None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn second_cycle_only() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        let request = Regex::parse("b").unwrap();
        assert_eq!(
            regular_query(&graph, &request, Some(&ints(&[0])), Some(&ints(&[4]))).unwrap(),
            pairs(&[(0, 4)])
        );
        assert!(
            regular_query(&graph, &request, Some(&ints(&[0])), Some(&ints(&[0, 1, 2, 3])))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn empty_regex_matches_nothing() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        let request = Regex::parse("").unwrap();
        let result = regular_query(&graph, &request, Some(&ints(&[0])), None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn bfs_agrees_with_the_closure_engine() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        let request = Regex::parse("a*|b").unwrap();
        let sources = ints(&[0]);
        let finals = ints(&[1, 2, 3, 4]);

        let by_closure: BTreeSet<Atom> =
            regular_query(&graph, &request, Some(&sources), Some(&finals))
                .unwrap()
                .into_iter()
                .map(|(_, to)| to)
                .collect();
        let by_bfs = bfs_reachable(&graph, &request, &sources, Some(&finals)).unwrap();
        assert_eq!(by_closure, by_bfs);
    }

    #[test]
    fn bfs_accepts_the_empty_word_at_the_source() {
        let graph = labeled_two_cycles(1, 1, ("a", "b"));
        let request = Regex::parse("a*").unwrap();
        let sources = ints(&[1]);
        let result = bfs_reachable_per_source(&graph, &request, &sources, Some(&ints(&[1])))
            .unwrap();
        assert_eq!(result, pairs(&[(1, 1)]));
    }

    #[test]
    fn bfs_separated_tracks_each_source() {
        let graph = labeled_two_cycles(3, 2, ("a", "b"));
        let request = Regex::parse("a a").unwrap();
        let sources = ints(&[0, 1]);
        let result =
            bfs_reachable_per_source(&graph, &request, &sources, None).unwrap();
        assert_eq!(result, pairs(&[(0, 2), (1, 3)]));
    }
}
