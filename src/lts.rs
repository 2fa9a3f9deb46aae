use std::collections::{BTreeSet, HashMap};

use crate::atom::Atom;
use crate::automaton::Nfa;
use crate::grammar::Symbol;
use crate::matrix::SparseBool;

/// One state of a labeled transition system. The dense index of a state
/// is its position in the owning [`Lts`]; the flags are fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct State<V> {
    pub value: V,
    pub is_start: bool,
    pub is_final: bool,
}

/// A labeled transition system: indexed states plus one boolean matrix
/// per label. A label without a matrix is the empty relation.
#[derive(Debug, Clone)]
pub struct Lts<V> {
    states: Vec<State<V>>,
    matrices: HashMap<Symbol, SparseBool>,
}

impl<V: Clone> Lts<V> {
    pub fn from_parts(states: Vec<State<V>>, matrices: HashMap<Symbol, SparseBool>) -> Self {
        let n = states.len();
        for matrix in matrices.values() {
            assert_eq!((matrix.nrows(), matrix.ncols()), (n, n), "matrix shape");
        }
        Lts { states, matrices }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[State<V>] {
        &self.states
    }

    pub fn state(&self, index: usize) -> &State<V> {
        &self.states[index]
    }

    pub fn matrix(&self, label: &Symbol) -> Option<&SparseBool> {
        self.matrices.get(label)
    }

    pub fn matrices(&self) -> impl Iterator<Item = (&Symbol, &SparseBool)> {
        self.matrices.iter()
    }

    pub fn labels(&self) -> BTreeSet<Symbol> {
        self.matrices.keys().cloned().collect()
    }

    /// Matrix for `label`, created empty on first access. Used by the
    /// tensor kernel, which grows nonterminal relations in place.
    pub fn matrix_mut(&mut self, label: Symbol) -> &mut SparseBool {
        let n = self.states.len();
        self.matrices
            .entry(label)
            .or_insert_with(|| SparseBool::new(n, n))
    }

    /// Remove and return the relation of one label.
    pub fn take_matrix(&mut self, label: &Symbol) -> Option<SparseBool> {
        self.matrices.remove(label)
    }

    pub fn insert_matrix(&mut self, label: Symbol, matrix: SparseBool) {
        let n = self.states.len();
        assert_eq!((matrix.nrows(), matrix.ncols()), (n, n), "matrix shape");
        self.matrices.insert(label, matrix);
    }

    /// Union of all label relations.
    pub fn adjacency(&self) -> SparseBool {
        let n = self.states.len();
        self.matrices
            .values()
            .fold(SparseBool::new(n, n), |sum, matrix| sum.or(matrix))
    }

    /// Reflexivity-free transitive closure of the union relation,
    /// computed by repeated squaring until `nnz` stops growing.
    pub fn transitive_closure(&self) -> SparseBool {
        let mut closure = self.adjacency();
        let mut previous = usize::MAX;
        while previous != closure.nnz() {
            previous = closure.nnz();
            closure = closure.or(&closure.matmul(&closure));
        }
        closure
    }

    /// Tensor product. The state `(a_i, b_j)` of the result sits at
    /// index `i * |other| + j`; its flags are the conjunctions of the
    /// operand flags. Labels carried by only one side stay present as
    /// all-false matrices so that label sets agree across products.
    pub fn intersect<W: Clone>(&self, other: &Lts<W>) -> Lts<(V, W)> {
        let n = self.len() * other.len();
        let mut states = Vec::with_capacity(n);
        for left in &self.states {
            for right in &other.states {
                states.push(State {
                    value: (left.value.clone(), right.value.clone()),
                    is_start: left.is_start && right.is_start,
                    is_final: left.is_final && right.is_final,
                });
            }
        }
        let mut matrices = HashMap::new();
        let left_labels = self.labels();
        let right_labels = other.labels();
        for label in left_labels.union(&right_labels) {
            let product = match (self.matrices.get(label), other.matrices.get(label)) {
                (Some(left), Some(right)) => left.kronecker(right),
                _ => SparseBool::new(n, n),
            };
            matrices.insert(label.clone(), product);
        }
        Lts { states, matrices }
    }

    /// Block-diagonal sum over the labels both operands carry. The
    /// state list is the concatenation of the operands' state lists.
    pub fn direct_sum(&self, other: &Lts<V>) -> Lts<V> {
        let states: Vec<State<V>> = self
            .states
            .iter()
            .chain(&other.states)
            .cloned()
            .collect();
        let mut matrices = HashMap::new();
        let left_labels = self.labels();
        let right_labels = other.labels();
        for label in left_labels.intersection(&right_labels) {
            let left = &self.matrices[label];
            let right = &other.matrices[label];
            matrices.insert(label.clone(), left.block_diag(right));
        }
        Lts { states, matrices }
    }
}

impl Lts<Atom> {
    /// Decompose an epsilon-free NFA into per-label boolean matrices.
    pub fn from_nfa(nfa: &Nfa<String>) -> Lts<Atom> {
        assert!(
            !nfa.has_epsilons(),
            "matrix decomposition needs an epsilon-free automaton"
        );
        let n = nfa.len();
        let states = (0..n)
            .map(|index| State {
                value: nfa.value(index).clone(),
                is_start: nfa.is_start(index),
                is_final: nfa.is_final(index),
            })
            .collect();
        let mut matrices: HashMap<Symbol, SparseBool> = HashMap::new();
        for (from, label, to) in nfa.transitions() {
            matrices
                .entry(Symbol::terminal(label))
                .or_insert_with(|| SparseBool::new(n, n))
                .set(from, to);
        }
        Lts { states, matrices }
    }

    /// Inverse of [`Lts::from_nfa`]; nonterminal-labeled relations (the
    /// tensor kernel adds them) have no automaton counterpart and are
    /// skipped.
    pub fn to_nfa(&self) -> Nfa<String> {
        let mut nfa = Nfa::new();
        for state in &self.states {
            nfa.add_state(state.value.clone());
        }
        for (index, state) in self.states.iter().enumerate() {
            if state.is_start {
                nfa.mark_start(index);
            }
            if state.is_final {
                nfa.mark_final(index);
            }
        }
        for (label, matrix) in &self.matrices {
            if let Symbol::Terminal(name) = label {
                for (from, to) in matrix.iter_nonzero() {
                    nfa.add_transition(from, name.clone(), to);
                }
            }
        }
        nfa
    }
}
