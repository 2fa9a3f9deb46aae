//! Runtime values of the query language. Everything here is immutable
//! after construction; every combinator hands back a fresh value, so
//! bindings can share them freely behind `Rc`.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use itertools::Itertools;

use crate::atom::{Atom, AtomKind};
use crate::automaton::Nfa;
use crate::error::{EngineError, Result};
use crate::graph::dot::write_nfa_dot;
use crate::graph::LabeledGraph;
use crate::grammar::rsm::Rsm;
use crate::grammar::{Cfg, Symbol};
use crate::lts::Lts;
use crate::regex::Regex;

/// A finite set with one element kind, inferred from the first
/// insertion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LSet {
    kind: Option<AtomKind>,
    elems: BTreeSet<Atom>,
}

impl LSet {
    pub fn new() -> LSet {
        LSet::default()
    }

    pub fn from_atoms(atoms: impl IntoIterator<Item = Atom>) -> Result<LSet> {
        let mut set = LSet::new();
        for atom in atoms {
            set.insert(atom)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, atom: Atom) -> Result<()> {
        match self.kind {
            None => self.kind = Some(atom.kind()),
            Some(kind) if kind == atom.kind() => {}
            Some(kind) => {
                return Err(EngineError::Type(format!(
                    "set of {kind} cannot hold a {} element",
                    atom.kind()
                )));
            }
        }
        self.elems.insert(atom);
        Ok(())
    }

    pub fn contains(&self, atom: &Atom) -> Result<bool> {
        match self.kind {
            None => Ok(false),
            Some(kind) if kind == atom.kind() => Ok(self.elems.contains(atom)),
            Some(kind) => Err(EngineError::Type(format!(
                "membership of a {} element in a set of {kind}",
                atom.kind()
            ))),
        }
    }

    pub fn kind(&self) -> Option<AtomKind> {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.elems.iter()
    }
}

impl fmt::Display for LSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<|{}|>", self.elems.iter().map(Atom::to_string).join(", "))
    }
}

/// A finite automaton value: a wrapper over an epsilon-free NFA whose
/// state identities are atoms.
#[derive(Debug, Clone)]
pub struct FaValue {
    nfa: Nfa<String>,
}

impl FaValue {
    pub fn from_nfa(nfa: Nfa<String>) -> FaValue {
        FaValue { nfa }
    }

    /// Promote a graph: every vertex starts out both start and final.
    pub fn from_graph(graph: &LabeledGraph) -> Result<FaValue> {
        Ok(FaValue::from_nfa(graph.to_nfa(None, None)?))
    }

    pub fn from_regex(regex: &Regex) -> FaValue {
        FaValue::from_nfa(regex.to_min_dfa().to_nfa())
    }

    pub fn nfa(&self) -> &Nfa<String> {
        &self.nfa
    }

    fn state_kind(&self) -> Option<AtomKind> {
        self.nfa.values().first().map(Atom::kind)
    }

    /// Indices of the states named by `chosen`; every element must name
    /// a state and share the state kind.
    fn resolve_states(&self, chosen: &LSet, role: &str) -> Result<BTreeSet<usize>> {
        if let (Some(state_kind), Some(set_kind)) = (self.state_kind(), chosen.kind()) {
            if state_kind != set_kind {
                return Err(EngineError::Type(format!(
                    "{role} set holds {set_kind} elements but the automaton states are {state_kind}"
                )));
            }
        }
        let mut indices = BTreeSet::new();
        for atom in chosen.iter() {
            match self.nfa.values().iter().position(|value| value == atom) {
                Some(index) => {
                    indices.insert(index);
                }
                None => {
                    return Err(EngineError::Domain(format!(
                        "{role} state {atom} is not an automaton state"
                    )));
                }
            }
        }
        Ok(indices)
    }

    pub fn set_starting(&self, chosen: &LSet) -> Result<FaValue> {
        let indices = self.resolve_states(chosen, "starting")?;
        let mut nfa = self.nfa.clone();
        nfa.clear_starts();
        for index in indices {
            nfa.mark_start(index);
        }
        Ok(FaValue::from_nfa(nfa))
    }

    pub fn set_final(&self, chosen: &LSet) -> Result<FaValue> {
        let indices = self.resolve_states(chosen, "final")?;
        let mut nfa = self.nfa.clone();
        nfa.clear_finals();
        for index in indices {
            nfa.mark_final(index);
        }
        Ok(FaValue::from_nfa(nfa))
    }

    pub fn add_starting(&self, chosen: &LSet) -> Result<FaValue> {
        let indices = self.resolve_states(chosen, "starting")?;
        let mut nfa = self.nfa.clone();
        for index in indices {
            nfa.mark_start(index);
        }
        Ok(FaValue::from_nfa(nfa))
    }

    pub fn add_final(&self, chosen: &LSet) -> Result<FaValue> {
        let indices = self.resolve_states(chosen, "final")?;
        let mut nfa = self.nfa.clone();
        for index in indices {
            nfa.mark_final(index);
        }
        Ok(FaValue::from_nfa(nfa))
    }

    pub fn starting(&self) -> Result<LSet> {
        LSet::from_atoms(self.nfa.starts().iter().map(|&s| self.nfa.value(s).clone()))
    }

    pub fn final_states(&self) -> Result<LSet> {
        LSet::from_atoms(self.nfa.finals().iter().map(|&s| self.nfa.value(s).clone()))
    }

    pub fn nodes(&self) -> Result<LSet> {
        LSet::from_atoms(self.nfa.values().iter().cloned())
    }

    pub fn marks(&self) -> Result<LSet> {
        LSet::from_atoms(self.nfa.labels().into_iter().map(Atom::Str))
    }

    pub fn edges(&self) -> Result<LSet> {
        LSet::from_atoms(self.nfa.transitions().map(|(from, label, to)| {
            Atom::triple(
                self.nfa.value(from).clone(),
                Atom::Str(label.clone()),
                self.nfa.value(to).clone(),
            )
        }))
    }

    /// Start-to-final reachability pairs. A state that is both start
    /// and final reaches itself by the empty path.
    pub fn reachables(&self) -> Result<LSet> {
        let mut pairs = LSet::new();
        for &state in self.nfa.starts().intersection(self.nfa.finals()) {
            let value = self.nfa.value(state).clone();
            pairs.insert(Atom::pair(value.clone(), value))?;
        }
        let lts = Lts::from_nfa(&self.nfa);
        let closure = lts.transitive_closure();
        for (i, j) in closure.iter_nonzero() {
            let from = lts.state(i);
            let to = lts.state(j);
            if from.is_start && to.is_final {
                pairs.insert(Atom::pair(from.value.clone(), to.value.clone()))?;
            }
        }
        Ok(pairs)
    }

    fn check_same_kind(&self, other: &FaValue, operation: &str) -> Result<()> {
        if let (Some(left), Some(right)) = (self.state_kind(), other.state_kind()) {
            if left != right {
                return Err(EngineError::Type(format!(
                    "{operation} of automata over {left} and {right} states"
                )));
            }
        }
        Ok(())
    }

    /// Language intersection via the tensor product of the two state
    /// systems; the product states are renumbered densely.
    pub fn intersect(&self, other: &FaValue) -> Result<FaValue> {
        self.check_same_kind(other, "intersect")?;
        let product = Lts::from_nfa(&self.nfa).intersect(&Lts::from_nfa(&other.nfa));
        let mut nfa = Nfa::new();
        nfa.add_numbered_states(product.len());
        for (index, state) in product.states().iter().enumerate() {
            if state.is_start {
                nfa.mark_start(index);
            }
            if state.is_final {
                nfa.mark_final(index);
            }
        }
        for (label, matrix) in product.matrices() {
            if let Symbol::Terminal(name) = label {
                for (from, to) in matrix.iter_nonzero() {
                    nfa.add_transition(from, name.clone(), to);
                }
            }
        }
        Ok(FaValue::from_nfa(nfa))
    }

    pub fn union(&self, other: &FaValue) -> Result<FaValue> {
        self.check_same_kind(other, "union")?;
        Ok(FaValue::from_nfa(
            self.nfa.union(&other.nfa).determinize().to_nfa(),
        ))
    }

    pub fn concat(&self, other: &FaValue) -> Result<FaValue> {
        self.check_same_kind(other, "concat")?;
        Ok(FaValue::from_nfa(
            self.nfa.concat(&other.nfa).determinize().to_nfa(),
        ))
    }

    pub fn star(&self) -> FaValue {
        FaValue::from_nfa(self.nfa.star().determinize().to_nfa())
    }
}

impl fmt::Display for FaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&write_nfa_dot(&self.nfa))
    }
}

/// A grammar value: the grammar itself plus its minimized recursive
/// state machine, derived once at construction.
#[derive(Debug, Clone)]
pub struct CfgValue {
    cfg: Cfg,
    rsm: Rsm,
}

impl CfgValue {
    pub fn new(cfg: Cfg) -> CfgValue {
        let rsm = Rsm::from_cfg(&cfg).minimize();
        CfgValue { cfg, rsm }
    }

    pub fn from_text(text: &str) -> Result<CfgValue> {
        Ok(CfgValue::new(Cfg::from_text(text, "S")?))
    }

    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub fn rsm(&self) -> &Rsm {
        &self.rsm
    }

    fn start_automaton(&self) -> &Nfa<Symbol> {
        self.rsm
            .automaton(self.rsm.start())
            .expect("the start nonterminal always has a sub-automaton")
    }

    pub fn starting(&self) -> Result<LSet> {
        let automaton = self.start_automaton();
        LSet::from_atoms(
            automaton
                .starts()
                .iter()
                .map(|&s| automaton.value(s).clone()),
        )
    }

    pub fn final_states(&self) -> Result<LSet> {
        let automaton = self.start_automaton();
        LSet::from_atoms(
            automaton
                .finals()
                .iter()
                .map(|&s| automaton.value(s).clone()),
        )
    }

    pub fn nodes(&self) -> Result<LSet> {
        let mut atoms = BTreeSet::new();
        for (_, automaton) in self.rsm.automata() {
            atoms.extend(automaton.values().iter().cloned());
        }
        LSet::from_atoms(atoms)
    }

    pub fn marks(&self) -> Result<LSet> {
        let mut labels = BTreeSet::new();
        for (_, automaton) in self.rsm.automata() {
            labels.extend(
                automaton
                    .labels()
                    .into_iter()
                    .map(|label| label.name().to_string()),
            );
        }
        LSet::from_atoms(labels.into_iter().map(Atom::Str))
    }

    pub fn edges(&self) -> Result<LSet> {
        let mut set = LSet::new();
        for (_, automaton) in self.rsm.automata() {
            for (from, label, to) in automaton.transitions() {
                set.insert(Atom::triple(
                    automaton.value(from).clone(),
                    Atom::Str(label.name().to_string()),
                    automaton.value(to).clone(),
                ))?;
            }
        }
        Ok(set)
    }

    pub fn reachables(&self) -> Result<LSet> {
        LSet::from_atoms(
            self.rsm
                .reachables()
                .into_iter()
                .map(|(from, to)| Atom::pair(from, to)),
        )
    }

    pub fn intersect(&self, automaton: &FaValue) -> CfgValue {
        let dfa = automaton.nfa().determinize().minimize();
        CfgValue::new(self.cfg.intersect_with_dfa(&dfa))
    }

    pub fn union(&self, other: &CfgValue) -> CfgValue {
        CfgValue::new(self.cfg.union(&other.cfg))
    }

    pub fn concat(&self, other: &CfgValue) -> CfgValue {
        CfgValue::new(self.cfg.concat(&other.cfg))
    }
}

impl fmt::Display for CfgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cfg.to_text())
    }
}

/// Any value an expression can evaluate to.
#[derive(Debug, Clone)]
pub enum Value {
    Atom(Atom),
    Set(LSet),
    Fa(Rc<FaValue>),
    Cfg(Rc<CfgValue>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Atom(atom) => match atom.kind() {
                AtomKind::Int => "int",
                AtomKind::Bool => "bool",
                AtomKind::Str => "string",
                AtomKind::Pair => "pair",
                AtomKind::Triple => "triple",
            },
            Value::Set(_) => "set",
            Value::Fa(_) => "finite automaton",
            Value::Cfg(_) => "grammar",
        }
    }

    pub fn into_atom(self, context: &str) -> Result<Atom> {
        match self {
            Value::Atom(atom) => Ok(atom),
            other => Err(EngineError::Type(format!(
                "{context} expects a simple value, not a {}",
                other.type_name()
            ))),
        }
    }

    pub fn into_bool(self, context: &str) -> Result<bool> {
        match self {
            Value::Atom(Atom::Bool(value)) => Ok(value),
            other => Err(EngineError::Type(format!(
                "{context} expects a bool, not a {}",
                other.type_name()
            ))),
        }
    }

    pub fn into_set(self, context: &str) -> Result<LSet> {
        match self {
            Value::Set(set) => Ok(set),
            other => Err(EngineError::Type(format!(
                "{context} expects a set, not a {}",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atom(atom) => atom.fmt(f),
            Value::Set(set) => set.fmt(f),
            Value::Fa(automaton) => automaton.fmt(f),
            Value::Cfg(grammar) => grammar.fmt(f),
        }
    }
}
