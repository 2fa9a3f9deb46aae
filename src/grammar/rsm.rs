//! Recursive state machines: one finite sub-automaton per nonterminal,
//! whose transitions may call other nonterminals. Together with the
//! start nonterminal they recognize exactly the grammar's language.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::atom::Atom;
use crate::automaton::Nfa;
use crate::grammar::ecfg::Ecfg;
use crate::grammar::{Cfg, Symbol};
use crate::lts::{Lts, State};
use crate::matrix::SparseBool;

/// Identity of a recursive-state-machine state: which sub-automaton it
/// belongs to, and its identity inside it.
pub type RsmState = (String, Atom);

#[derive(Debug, Clone)]
pub struct Rsm {
    start: String,
    automata: BTreeMap<String, Nfa<Symbol>>,
}

impl Rsm {
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn automata(&self) -> impl Iterator<Item = (&String, &Nfa<Symbol>)> {
        self.automata.iter()
    }

    pub fn automaton(&self, nonterminal: &str) -> Option<&Nfa<Symbol>> {
        self.automata.get(nonterminal)
    }

    /// Build the machine of an extended grammar: every production regex
    /// becomes a sub-automaton; symbols that head a production turn
    /// into nonterminal call transitions.
    pub fn from_ecfg(extended: &Ecfg) -> Rsm {
        let classify = |name: &str| {
            if extended.nonterminals().contains(name) {
                Symbol::nonterminal(name)
            } else {
                Symbol::terminal(name)
            }
        };
        let mut automata: BTreeMap<String, Nfa<Symbol>> = extended
            .productions()
            .map(|(head, regex)| (head.clone(), regex.to_nfa(&classify)))
            .collect();
        automata
            .entry(extended.start().to_string())
            .or_insert_with(|| crate::regex::Regex::Empty.to_nfa(&classify));
        Rsm {
            start: extended.start().to_string(),
            automata,
        }
    }

    pub fn from_cfg(grammar: &Cfg) -> Rsm {
        Rsm::from_ecfg(&Ecfg::from_cfg(grammar))
    }

    /// Minimize every sub-automaton independently; each keeps its
    /// language, so the whole machine keeps the grammar's.
    pub fn minimize(&self) -> Rsm {
        let automata = self
            .automata
            .iter()
            .map(|(head, automaton)| {
                (head.clone(), automaton.determinize().minimize().to_nfa())
            })
            .collect();
        Rsm {
            start: self.start.clone(),
            automata,
        }
    }

    /// Decompose the whole machine into one labeled transition system.
    /// States are `(nonterminal, sub-state)` pairs in deterministic
    /// order; epsilon transitions must already be gone (minimize
    /// first).
    pub fn to_lts(&self) -> Lts<RsmState> {
        let mut states: Vec<State<RsmState>> = Vec::new();
        let mut offset: HashMap<&str, usize> = HashMap::new();
        for (head, automaton) in &self.automata {
            assert!(
                !automaton.has_epsilons(),
                "rsm must be epsilon-free before matrix decomposition"
            );
            offset.insert(head.as_str(), states.len());
            for index in 0..automaton.len() {
                states.push(State {
                    value: (head.clone(), automaton.value(index).clone()),
                    is_start: automaton.is_start(index),
                    is_final: automaton.is_final(index),
                });
            }
        }

        let n = states.len();
        let mut matrices: HashMap<Symbol, SparseBool> = HashMap::new();
        for (head, automaton) in &self.automata {
            let base = offset[head.as_str()];
            for (from, label, to) in automaton.transitions() {
                matrices
                    .entry(label.clone())
                    .or_insert_with(|| SparseBool::new(n, n))
                    .set(base + from, base + to);
            }
        }
        Lts::from_parts(states, matrices)
    }

    /// Start-to-final reachability inside the start nonterminal's
    /// sub-automaton, through the machine's own language.
    ///
    /// Call transitions of a nonterminal participate in the closure
    /// only once that nonterminal is known to recognize anything: its
    /// matrix is withheld until a start-to-final witness appears, and
    /// the closure is recomputed until the withheld set stops
    /// shrinking.
    pub fn reachables(&self) -> BTreeSet<(Atom, Atom)> {
        let mut result = BTreeSet::new();
        let mut lts = self.to_lts();

        let mut withheld: BTreeMap<String, SparseBool> = BTreeMap::new();
        for (head, automaton) in &self.automata {
            let coinciding: Vec<usize> = automaton
                .starts()
                .intersection(automaton.finals())
                .copied()
                .collect();
            if head == &self.start {
                for &state in &coinciding {
                    let value = automaton.value(state).clone();
                    result.insert((value.clone(), value));
                }
            }
            if coinciding.is_empty() {
                if let Some(matrix) = lts.take_matrix(&Symbol::nonterminal(head.clone())) {
                    withheld.insert(head.clone(), matrix);
                }
            }
        }

        loop {
            let before = withheld.len();
            let closure = lts.transitive_closure();
            let mut witnessed: BTreeSet<String> = BTreeSet::new();
            for (i, j) in closure.iter_nonzero() {
                let from = lts.state(i);
                let to = lts.state(j);
                if !(from.is_start && to.is_final) || from.value.0 != to.value.0 {
                    continue;
                }
                witnessed.insert(from.value.0.clone());
                if from.value.0 == self.start {
                    result.insert((from.value.1.clone(), to.value.1.clone()));
                }
            }
            for head in witnessed {
                if let Some(matrix) = withheld.remove(&head) {
                    lts.insert_matrix(Symbol::nonterminal(head), matrix);
                }
            }
            if withheld.len() == before {
                return result;
            }
        }
    }
}
