use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use crate::atom::Atom;

/// Transition labels. `Eq`, `Ord` and `Hash` are required up front so
/// automata over terminal strings and automata over grammar symbols
/// share one implementation of determinization and minimization.
pub trait Alphabet: Clone + Eq + Ord + Hash + Debug {}

impl<T> Alphabet for T where T: Clone + Eq + Ord + Hash + Debug {}

/// A non-deterministic finite automaton with epsilon transitions.
///
/// Every state carries an [`Atom`] identity: vertices keep their graph
/// identity when a graph is promoted to an automaton, while synthesized
/// states (Thompson construction, subset construction) are numbered.
#[derive(Debug, Clone)]
pub struct Nfa<A: Alphabet> {
    values: Vec<Atom>,
    starts: BTreeSet<usize>,
    finals: BTreeSet<usize>,
    edges: Vec<Vec<(A, usize)>>,
    epsilons: Vec<Vec<usize>>,
}

impl<A: Alphabet> Nfa<A> {
    pub fn new() -> Self {
        Nfa {
            values: Vec::new(),
            starts: BTreeSet::new(),
            finals: BTreeSet::new(),
            edges: Vec::new(),
            epsilons: Vec::new(),
        }
    }

    /// Add a state with the given identity, returning its index.
    pub fn add_state(&mut self, value: Atom) -> usize {
        let index = self.values.len();
        self.values.push(value);
        self.edges.push(Vec::new());
        self.epsilons.push(Vec::new());
        index
    }

    /// Add `n` states numbered from the current size.
    pub fn add_numbered_states(&mut self, n: usize) -> usize {
        let base = self.values.len();
        for i in 0..n {
            self.add_state(Atom::Int((base + i) as i64));
        }
        base
    }

    pub fn add_transition(&mut self, from: usize, label: A, to: usize) {
        if !self.edges[from].contains(&(label.clone(), to)) {
            self.edges[from].push((label, to));
        }
    }

    pub fn add_epsilon(&mut self, from: usize, to: usize) {
        if !self.epsilons[from].contains(&to) {
            self.epsilons[from].push(to);
        }
    }

    pub fn mark_start(&mut self, state: usize) {
        self.starts.insert(state);
    }

    pub fn mark_final(&mut self, state: usize) {
        self.finals.insert(state);
    }

    pub fn clear_starts(&mut self) {
        self.starts.clear();
    }

    pub fn clear_finals(&mut self) {
        self.finals.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Atom] {
        &self.values
    }

    pub fn value(&self, state: usize) -> &Atom {
        &self.values[state]
    }

    pub fn starts(&self) -> &BTreeSet<usize> {
        &self.starts
    }

    pub fn finals(&self) -> &BTreeSet<usize> {
        &self.finals
    }

    pub fn is_start(&self, state: usize) -> bool {
        self.starts.contains(&state)
    }

    pub fn is_final(&self, state: usize) -> bool {
        self.finals.contains(&state)
    }

    /// Labeled transitions as `(from, label, to)` triples.
    pub fn transitions(&self) -> impl Iterator<Item = (usize, &A, usize)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .flat_map(|(from, out)| out.iter().map(move |(label, to)| (from, label, *to)))
    }

    pub fn has_epsilons(&self) -> bool {
        self.epsilons.iter().any(|outs| !outs.is_empty())
    }

    /// Alphabet actually used on transitions.
    pub fn labels(&self) -> BTreeSet<A> {
        self.transitions().map(|(_, label, _)| label.clone()).collect()
    }

    /// States reachable from `seed` by epsilon transitions alone.
    pub fn epsilon_closure(&self, seed: &BTreeSet<usize>) -> BTreeSet<usize> {
        let mut reached = seed.clone();
        let mut todo: Vec<usize> = seed.iter().copied().collect();
        while let Some(state) = todo.pop() {
            for &next in &self.epsilons[state] {
                if reached.insert(next) {
                    todo.push(next);
                }
            }
        }
        reached
    }

    /// Whether the automaton accepts the given label word.
    pub fn accepts<'a, I>(&self, word: I) -> bool
    where
        I: IntoIterator<Item = &'a A>,
        A: 'a,
    {
        let mut current = self.epsilon_closure(&self.starts);
        for label in word {
            let mut next = BTreeSet::new();
            for &state in &current {
                for (edge_label, to) in &self.edges[state] {
                    if edge_label == label {
                        next.insert(*to);
                    }
                }
            }
            current = self.epsilon_closure(&next);
            if current.is_empty() {
                return false;
            }
        }
        current.iter().any(|state| self.finals.contains(state))
    }

    /// Copy all transitions of `other` into `self`, with states shifted
    /// by `offset`. States must already exist.
    fn splice(&mut self, other: &Nfa<A>, offset: usize) {
        for (from, label, to) in other.transitions() {
            self.add_transition(from + offset, label.clone(), to + offset);
        }
        for (from, outs) in other.epsilons.iter().enumerate() {
            for &to in outs {
                self.add_epsilon(from + offset, to + offset);
            }
        }
    }

    /// Language union: a fresh start state branches into both operands.
    pub fn union(&self, other: &Nfa<A>) -> Nfa<A> {
        let mut result = Nfa::new();
        result.add_numbered_states(1 + self.len() + other.len());
        result.mark_start(0);
        let left = 1;
        let right = 1 + self.len();
        result.splice(self, left);
        result.splice(other, right);
        for &start in &self.starts {
            result.add_epsilon(0, left + start);
        }
        for &start in &other.starts {
            result.add_epsilon(0, right + start);
        }
        for &fin in &self.finals {
            result.mark_final(left + fin);
        }
        for &fin in &other.finals {
            result.mark_final(right + fin);
        }
        result
    }

    /// Language concatenation: finals of the left operand feed the
    /// starts of the right one.
    pub fn concat(&self, other: &Nfa<A>) -> Nfa<A> {
        let mut result = Nfa::new();
        result.add_numbered_states(self.len() + other.len());
        let right = self.len();
        result.splice(self, 0);
        result.splice(other, right);
        for &start in &self.starts {
            result.mark_start(start);
        }
        for &fin in &self.finals {
            for &start in &other.starts {
                result.add_epsilon(fin, right + start);
            }
        }
        for &fin in &other.finals {
            result.mark_final(right + fin);
        }
        result
    }

    /// Kleene star: a fresh start/final state loops around the operand.
    pub fn star(&self) -> Nfa<A> {
        let mut result = Nfa::new();
        result.add_numbered_states(1 + self.len());
        result.mark_start(0);
        result.mark_final(0);
        result.splice(self, 1);
        for &start in &self.starts {
            result.add_epsilon(0, 1 + start);
        }
        for &fin in &self.finals {
            result.add_epsilon(1 + fin, 0);
        }
        result
    }

    /// Subset construction. The result has no epsilon transitions and
    /// at most one successor per label; states are renumbered densely.
    pub fn determinize(&self) -> Dfa<A> {
        let mut dfa = Dfa::new();
        if self.starts.is_empty() {
            // no start states: the empty language, as a single sink
            let sink = dfa.add_state();
            dfa.start = sink;
            return dfa;
        }

        let start_set = self.epsilon_closure(&self.starts);
        let mut index_of: HashMap<BTreeSet<usize>, usize> = HashMap::new();
        let mut todo = vec![start_set.clone()];
        let start_index = dfa.add_state();
        dfa.start = start_index;
        if start_set.iter().any(|s| self.finals.contains(s)) {
            dfa.finals.insert(start_index);
        }
        index_of.insert(start_set, start_index);

        while let Some(subset) = todo.pop() {
            let from = index_of[&subset];
            let mut moves: BTreeMap<A, BTreeSet<usize>> = BTreeMap::new();
            for &state in &subset {
                for (label, to) in &self.edges[state] {
                    moves.entry(label.clone()).or_default().insert(*to);
                }
            }
            for (label, targets) in moves {
                let closed = self.epsilon_closure(&targets);
                let to = match index_of.get(&closed) {
                    Some(&index) => index,
                    None => {
                        let index = dfa.add_state();
                        if closed.iter().any(|s| self.finals.contains(s)) {
                            dfa.finals.insert(index);
                        }
                        index_of.insert(closed.clone(), index);
                        todo.push(closed);
                        index
                    }
                };
                dfa.transitions[from].insert(label, to);
            }
        }
        dfa
    }
}

impl<A: Alphabet> Default for Nfa<A> {
    fn default() -> Self {
        Nfa::new()
    }
}

/// A deterministic finite automaton, possibly partial: a missing entry
/// in a transition map is an implicit dead end.
#[derive(Debug, Clone)]
pub struct Dfa<A: Alphabet> {
    pub(crate) start: usize,
    pub(crate) finals: BTreeSet<usize>,
    pub(crate) transitions: Vec<BTreeMap<A, usize>>,
}

impl<A: Alphabet> Dfa<A> {
    fn new() -> Self {
        Dfa {
            start: 0,
            finals: BTreeSet::new(),
            transitions: Vec::new(),
        }
    }

    fn add_state(&mut self) -> usize {
        self.transitions.push(BTreeMap::new());
        self.transitions.len() - 1
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn accepts<'a, I>(&self, word: I) -> bool
    where
        I: IntoIterator<Item = &'a A>,
        A: 'a,
    {
        let mut state = self.start;
        for label in word {
            match self.transitions[state].get(label) {
                Some(&next) => state = next,
                None => return false,
            }
        }
        self.finals.contains(&state)
    }

    /// Hopcroft partition refinement, followed by a canonical breadth
    /// first renumbering so that two equal languages always produce the
    /// same state graph. Dead states (those from which no final state
    /// is reachable) are dropped along the way.
    pub fn minimize(&self) -> Dfa<A> {
        let n = self.len();
        if n == 0 || self.finals.is_empty() {
            let mut empty = Dfa::new();
            empty.start = empty.add_state();
            return empty;
        }

        let alphabet: BTreeSet<A> = self
            .transitions
            .iter()
            .flat_map(|map| map.keys().cloned())
            .collect();

        // complete the automaton with an explicit sink so refinement
        // can treat missing transitions uniformly
        let sink = n;
        let total = n + 1;
        let mut delta: Vec<BTreeMap<A, usize>> = self.transitions.clone();
        delta.push(BTreeMap::new());
        for map in delta.iter_mut() {
            for label in &alphabet {
                map.entry(label.clone()).or_insert(sink);
            }
        }

        // reverse transition table per label
        let mut reverse: HashMap<A, Vec<Vec<usize>>> = alphabet
            .iter()
            .map(|label| (label.clone(), vec![Vec::new(); total]))
            .collect();
        for (from, map) in delta.iter().enumerate() {
            for (label, &to) in map {
                reverse.get_mut(label).unwrap()[to].push(from);
            }
        }

        let finals: BTreeSet<usize> = self.finals.iter().copied().collect();
        let nonfinals: BTreeSet<usize> =
            (0..total).filter(|s| !finals.contains(s)).collect();

        let mut partitions: Vec<BTreeSet<usize>> = vec![finals.clone()];
        if !nonfinals.is_empty() {
            partitions.push(nonfinals);
        }
        let mut worklist: Vec<(BTreeSet<usize>, A)> = Vec::new();
        for label in &alphabet {
            worklist.push((finals.clone(), label.clone()));
        }

        while let Some((splitter, label)) = worklist.pop() {
            let predecessors: BTreeSet<usize> = splitter
                .iter()
                .flat_map(|&s| reverse[&label][s].iter().copied())
                .collect();
            let mut next_partitions = Vec::with_capacity(partitions.len());
            for block in partitions {
                let inside: BTreeSet<usize> =
                    block.intersection(&predecessors).copied().collect();
                if inside.is_empty() || inside.len() == block.len() {
                    next_partitions.push(block);
                    continue;
                }
                let outside: BTreeSet<usize> =
                    block.difference(&inside).copied().collect();
                let smaller = if inside.len() <= outside.len() {
                    inside.clone()
                } else {
                    outside.clone()
                };
                for refine_label in &alphabet {
                    worklist.push((smaller.clone(), refine_label.clone()));
                }
                next_partitions.push(inside);
                next_partitions.push(outside);
            }
            partitions = next_partitions;
        }

        let mut block_of = vec![0usize; total];
        for (index, block) in partitions.iter().enumerate() {
            for &state in block {
                block_of[state] = index;
            }
        }

        // which blocks can still reach a final state
        let block_count = partitions.len();
        let mut productive = vec![false; block_count];
        for &fin in &self.finals {
            productive[block_of[fin]] = true;
        }
        loop {
            let mut changed = false;
            for block in 0..block_count {
                if productive[block] {
                    continue;
                }
                let representative = *partitions[block].iter().next().unwrap();
                if delta[representative]
                    .values()
                    .any(|&to| productive[block_of[to]])
                {
                    productive[block] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // canonical renumbering: breadth first from the start block,
        // visiting labels in sorted order
        let start_block = block_of[self.start];
        if !productive[start_block] {
            let mut empty = Dfa::new();
            empty.start = empty.add_state();
            return empty;
        }
        let mut result = Dfa::new();
        let mut number_of: HashMap<usize, usize> = HashMap::new();
        let mut queue = std::collections::VecDeque::new();
        number_of.insert(start_block, result.add_state());
        queue.push_back(start_block);
        let mut moves: Vec<(usize, A, usize)> = Vec::new();
        while let Some(block) = queue.pop_front() {
            let from = number_of[&block];
            let representative = *partitions[block].iter().next().unwrap();
            if self.finals.contains(&representative) {
                result.finals.insert(from);
            }
            for (label, &to) in &delta[representative] {
                let to_block = block_of[to];
                if !productive[to_block] {
                    continue;
                }
                let to_index = match number_of.get(&to_block) {
                    Some(&index) => index,
                    None => {
                        let index = result.add_state();
                        number_of.insert(to_block, index);
                        queue.push_back(to_block);
                        index
                    }
                };
                moves.push((from, label.clone(), to_index));
            }
        }
        for (from, label, to) in moves {
            result.transitions[from].insert(label, to);
        }
        result.start = 0;
        result
    }

    /// Forget determinism; states keep their dense numbering.
    pub fn to_nfa(&self) -> Nfa<A> {
        let mut nfa = Nfa::new();
        nfa.add_numbered_states(self.len());
        nfa.mark_start(self.start);
        for &fin in &self.finals {
            nfa.mark_final(fin);
        }
        for (from, map) in self.transitions.iter().enumerate() {
            for (label, &to) in map {
                nfa.add_transition(from, label.clone(), to);
            }
        }
        nfa
    }

    /// Structural equality under the canonical numbering produced by
    /// [`Dfa::minimize`]; used to compare languages.
    pub fn same_shape(&self, other: &Dfa<A>) -> bool {
        self.start == other.start
            && self.finals == other.finals
            && self.transitions == other.transitions
    }
}
