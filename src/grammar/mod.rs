pub mod ecfg;
pub mod rsm;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::automaton::Dfa;
use crate::error::{EngineError, Result};

/// A grammar symbol. Terminals are the labels graphs carry on their
/// edges; nonterminals name productions (and, inside a recursive state
/// machine, recursive calls).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Terminal(String),
    Nonterminal(String),
}

impl Symbol {
    pub fn terminal(name: impl Into<String>) -> Symbol {
        Symbol::Terminal(name.into())
    }

    pub fn nonterminal(name: impl Into<String>) -> Symbol {
        Symbol::Nonterminal(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Terminal(name) | Symbol::Nonterminal(name) => name,
        }
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Symbol::Nonterminal(_))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One production. An empty body derives the empty word.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Production {
    pub head: String,
    pub body: Vec<Symbol>,
}

impl Production {
    pub fn new(head: impl Into<String>, body: Vec<Symbol>) -> Production {
        Production {
            head: head.into(),
            body,
        }
    }
}

/// A context-free grammar: a start nonterminal plus a set of
/// productions. Productions are kept sorted so equal grammars compare
/// equal structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfg {
    start: String,
    productions: BTreeSet<Production>,
}

impl Cfg {
    pub fn new(start: impl Into<String>, productions: BTreeSet<Production>) -> Cfg {
        Cfg {
            start: start.into(),
            productions,
        }
    }

    /// Parse grammar text: one production per line, `head -> body`,
    /// alternatives joined by `|`, `epsilon`/`$` or an empty body for
    /// the empty word. A symbol starting with an uppercase letter is a
    /// nonterminal; every nonterminal used in a body must head at least
    /// one production.
    pub fn from_text(text: &str, start: &str) -> Result<Cfg> {
        let mut productions = BTreeSet::new();
        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() < 2 || tokens[1] != "->" {
                return Err(EngineError::Grammar(format!(
                    "production {line:?} is missing '->'"
                )));
            }
            let head = tokens[0];
            if !is_nonterminal_name(head) {
                return Err(EngineError::Grammar(format!(
                    "production head {head:?} is not a nonterminal"
                )));
            }
            for alternative in tokens[2..].split(|token| *token == "|") {
                let body = alternative
                    .iter()
                    .filter(|token| !matches!(**token, "epsilon" | "$"))
                    .map(|token| classify(token))
                    .collect();
                productions.insert(Production::new(head, body));
            }
        }

        let grammar = Cfg::new(start, productions);
        let heads: BTreeSet<&str> = grammar
            .productions
            .iter()
            .map(|production| production.head.as_str())
            .collect();
        for production in &grammar.productions {
            for symbol in &production.body {
                if symbol.is_nonterminal() && !heads.contains(symbol.name()) {
                    return Err(EngineError::Grammar(format!(
                        "unresolved nonterminal {}",
                        symbol.name()
                    )));
                }
            }
        }
        Ok(grammar)
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    pub fn nonterminals(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .productions
            .iter()
            .map(|production| production.head.clone())
            .collect();
        names.insert(self.start.clone());
        for production in &self.productions {
            for symbol in &production.body {
                if symbol.is_nonterminal() {
                    names.insert(symbol.name().to_string());
                }
            }
        }
        names
    }

    pub fn terminals(&self) -> BTreeSet<String> {
        self.productions
            .iter()
            .flat_map(|production| &production.body)
            .filter(|symbol| !symbol.is_nonterminal())
            .map(|symbol| symbol.name().to_string())
            .collect()
    }

    /// Nonterminals that derive the empty word.
    pub fn nullables(&self) -> BTreeSet<String> {
        let mut nullable = BTreeSet::new();
        loop {
            let mut changed = false;
            for production in &self.productions {
                if nullable.contains(&production.head) {
                    continue;
                }
                let body_nullable = production.body.iter().all(|symbol| {
                    symbol.is_nonterminal() && nullable.contains(symbol.name())
                });
                if body_nullable {
                    nullable.insert(production.head.clone());
                    changed = true;
                }
            }
            if !changed {
                return nullable;
            }
        }
    }

    /// Weak Chomsky normal form: every production becomes `A -> ε`,
    /// `A -> a` or `A -> B C`, preserving the language. Useless symbols
    /// and unit productions are eliminated on the way, the original
    /// epsilon productions survive.
    pub fn to_wcnf(&self) -> Cfg {
        let trimmed = self
            .remove_useless()
            .eliminate_units()
            .remove_useless();

        // wrap terminals that appear in long bodies
        let mut productions = BTreeSet::new();
        for production in &trimmed.productions {
            if production.body.len() < 2 {
                productions.insert(production.clone());
                continue;
            }
            let mut body = Vec::with_capacity(production.body.len());
            for symbol in &production.body {
                match symbol {
                    Symbol::Terminal(name) => {
                        let wrapper = format!("{name}#t");
                        productions.insert(Production::new(
                            wrapper.clone(),
                            vec![Symbol::terminal(name.clone())],
                        ));
                        body.push(Symbol::nonterminal(wrapper));
                    }
                    nonterminal => body.push(nonterminal.clone()),
                }
            }
            productions.insert(Production::new(production.head.clone(), body));
        }

        // split long bodies into binary chains
        let mut counter = 0usize;
        let mut binary = BTreeSet::new();
        for production in productions {
            if production.body.len() <= 2 {
                binary.insert(production);
                continue;
            }
            let mut head = production.head.clone();
            let mut rest = production.body.as_slice();
            while rest.len() > 2 {
                let link = format!("bin#{counter}");
                counter += 1;
                binary.insert(Production::new(
                    head,
                    vec![rest[0].clone(), Symbol::nonterminal(link.clone())],
                ));
                head = link;
                rest = &rest[1..];
            }
            binary.insert(Production::new(head, rest.to_vec()));
        }

        Cfg::new(self.start.clone(), binary)
    }

    /// Drop non-generating symbols, then symbols unreachable from the
    /// start nonterminal.
    fn remove_useless(&self) -> Cfg {
        let mut generating: HashSet<&str> = HashSet::new();
        loop {
            let mut changed = false;
            for production in &self.productions {
                if generating.contains(production.head.as_str()) {
                    continue;
                }
                let all_generating = production.body.iter().all(|symbol| match symbol {
                    Symbol::Terminal(_) => true,
                    Symbol::Nonterminal(name) => generating.contains(name.as_str()),
                });
                if all_generating {
                    generating.insert(production.head.as_str());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let kept: BTreeSet<Production> = self
            .productions
            .iter()
            .filter(|production| {
                generating.contains(production.head.as_str())
                    && production.body.iter().all(|symbol| match symbol {
                        Symbol::Terminal(_) => true,
                        Symbol::Nonterminal(name) => generating.contains(name.as_str()),
                    })
            })
            .cloned()
            .collect();

        let mut reachable: BTreeSet<&str> = BTreeSet::from([self.start.as_str()]);
        loop {
            let mut changed = false;
            for production in &kept {
                if !reachable.contains(production.head.as_str()) {
                    continue;
                }
                for symbol in &production.body {
                    if symbol.is_nonterminal() && reachable.insert(symbol.name()) {
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let productions = kept
            .iter()
            .filter(|production| reachable.contains(production.head.as_str()))
            .cloned()
            .collect();
        Cfg::new(self.start.clone(), productions)
    }

    /// Replace unit productions `A -> B` by copying B's non-unit
    /// productions up to every A that reaches B through unit chains.
    fn eliminate_units(&self) -> Cfg {
        let is_unit = |production: &Production| {
            production.body.len() == 1 && production.body[0].is_nonterminal()
        };

        let nonterminals = self.nonterminals();
        let mut unit_pairs: BTreeSet<(String, String)> = nonterminals
            .iter()
            .map(|name| (name.clone(), name.clone()))
            .collect();
        loop {
            let mut changed = false;
            for production in self.productions.iter().filter(|p| is_unit(p)) {
                let target = production.body[0].name().to_string();
                let new_pairs: Vec<(String, String)> = unit_pairs
                    .iter()
                    .filter(|(_, b)| *b == production.head)
                    .map(|(a, _)| (a.clone(), target.clone()))
                    .collect();
                for pair in new_pairs {
                    changed |= unit_pairs.insert(pair);
                }
            }
            if !changed {
                break;
            }
        }

        let mut productions = BTreeSet::new();
        for (head, source) in &unit_pairs {
            for production in self
                .productions
                .iter()
                .filter(|p| !is_unit(p) && p.head == *source)
            {
                productions.insert(Production::new(head.clone(), production.body.clone()));
            }
        }
        Cfg::new(self.start.clone(), productions)
    }

    /// Language union; both operands are renamed apart and a fresh
    /// start nonterminal branches into them.
    pub fn union(&self, other: &Cfg) -> Cfg {
        let mut productions = rename_apart(self, "1");
        productions.extend(rename_apart(other, "2"));
        let start = "S#union".to_string();
        productions.insert(Production::new(
            start.clone(),
            vec![Symbol::nonterminal(format!("{}#1", self.start))],
        ));
        productions.insert(Production::new(
            start.clone(),
            vec![Symbol::nonterminal(format!("{}#2", other.start))],
        ));
        Cfg::new(start, productions)
    }

    /// Language concatenation, by the same renaming scheme.
    pub fn concat(&self, other: &Cfg) -> Cfg {
        let mut productions = rename_apart(self, "1");
        productions.extend(rename_apart(other, "2"));
        let start = "S#concat".to_string();
        productions.insert(Production::new(
            start.clone(),
            vec![
                Symbol::nonterminal(format!("{}#1", self.start)),
                Symbol::nonterminal(format!("{}#2", other.start)),
            ],
        ));
        Cfg::new(start, productions)
    }

    /// Intersection with a regular language, as a grammar over triple
    /// nonterminals `(p, A, q)`: a DFA state on each side of every
    /// grammar symbol. Works on the weak normal form, so each
    /// production shape has its own rule.
    pub fn intersect_with_dfa(&self, dfa: &Dfa<String>) -> Cfg {
        let wcnf = self.to_wcnf();
        let n = dfa.len();
        let triple = |p: usize, name: &str, q: usize| format!("{p}#{name}#{q}");

        let mut productions = BTreeSet::new();
        for production in &wcnf.productions {
            match production.body.as_slice() {
                [] => {
                    for q in 0..n {
                        productions.insert(Production::new(
                            triple(q, &production.head, q),
                            Vec::new(),
                        ));
                    }
                }
                [Symbol::Terminal(label)] => {
                    for (p, map) in dfa.transitions.iter().enumerate() {
                        if let Some(&q) = map.get(label) {
                            productions.insert(Production::new(
                                triple(p, &production.head, q),
                                vec![Symbol::terminal(label.clone())],
                            ));
                        }
                    }
                }
                [Symbol::Nonterminal(first), Symbol::Nonterminal(second)] => {
                    for p in 0..n {
                        for q in 0..n {
                            for r in 0..n {
                                productions.insert(Production::new(
                                    triple(p, &production.head, r),
                                    vec![
                                        Symbol::nonterminal(triple(p, first, q)),
                                        Symbol::nonterminal(triple(q, second, r)),
                                    ],
                                ));
                            }
                        }
                    }
                }
                other => unreachable!("non-wcnf body {other:?}"),
            }
        }

        let start = "S#product".to_string();
        for &fin in &dfa.finals {
            productions.insert(Production::new(
                start.clone(),
                vec![Symbol::nonterminal(triple(dfa.start, &wcnf.start, fin))],
            ));
        }
        Cfg::new(start, productions).remove_useless()
    }

    /// Grammar text, one production per line.
    pub fn to_text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for production in &self.productions {
            let body = if production.body.is_empty() {
                "epsilon".to_string()
            } else {
                production
                    .body
                    .iter()
                    .map(|symbol| symbol.name().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            };
            lines.push(format!("{} -> {}", production.head, body));
        }
        lines.join("\n")
    }

    /// Grouped view of the normal form used by the CFPQ kernels:
    /// epsilon heads, terminal productions by label, and the binary
    /// productions as `(head, left, right)` triples.
    pub fn wcnf_parts(&self) -> WcnfParts {
        let wcnf = self.to_wcnf();
        let mut parts = WcnfParts {
            nonterminals: wcnf.nonterminals(),
            epsilon_heads: BTreeSet::new(),
            terminal_heads: BTreeMap::new(),
            binary: BTreeSet::new(),
        };
        for production in &wcnf.productions {
            match production.body.as_slice() {
                [] => {
                    parts.epsilon_heads.insert(production.head.clone());
                }
                [Symbol::Terminal(label)] => {
                    parts
                        .terminal_heads
                        .entry(label.clone())
                        .or_default()
                        .insert(production.head.clone());
                }
                [Symbol::Nonterminal(first), Symbol::Nonterminal(second)] => {
                    parts.binary.insert((
                        production.head.clone(),
                        first.clone(),
                        second.clone(),
                    ));
                }
                other => unreachable!("non-wcnf body {other:?}"),
            }
        }
        parts
    }
}

/// See [`Cfg::wcnf_parts`].
#[derive(Debug, Clone)]
pub struct WcnfParts {
    pub nonterminals: BTreeSet<String>,
    pub epsilon_heads: BTreeSet<String>,
    pub terminal_heads: BTreeMap<String, BTreeSet<String>>,
    pub binary: BTreeSet<(String, String, String)>,
}

fn is_nonterminal_name(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_uppercase())
}

fn classify(token: &str) -> Symbol {
    if is_nonterminal_name(token) {
        Symbol::nonterminal(token)
    } else {
        Symbol::terminal(token)
    }
}

fn rename_apart(grammar: &Cfg, tag: &str) -> BTreeSet<Production> {
    grammar
        .productions
        .iter()
        .map(|production| {
            let body = production
                .body
                .iter()
                .map(|symbol| match symbol {
                    Symbol::Nonterminal(name) => Symbol::nonterminal(format!("{name}#{tag}")),
                    terminal => terminal.clone(),
                })
                .collect();
            Production::new(format!("{}#{tag}", production.head), body)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::Regex;

    fn wcnf_shapes_ok(grammar: &Cfg) -> bool {
        grammar.to_wcnf().productions().all(|production| {
            match production.body.as_slice() {
                [] => true,
                [Symbol::Terminal(_)] => true,
                [Symbol::Nonterminal(_), Symbol::Nonterminal(_)] => true,
                _ => false,
            }
        })
    }

    #[test]
    fn parses_alternatives_and_epsilon() {
        let grammar = Cfg::from_text("S -> a S b | epsilon", "S").unwrap();
        assert_eq!(grammar.productions().count(), 2);
        assert!(grammar.nullables().contains("S"));
    }

    #[test]
    fn rejects_missing_arrow_and_unresolved_nonterminals() {
        assert!(matches!(
            Cfg::from_text("S a b", "S"),
            Err(EngineError::Grammar(_))
        ));
        assert!(matches!(
            Cfg::from_text("S -> A b", "S"),
            Err(EngineError::Grammar(_))
        ));
    }

    #[test]
    fn wcnf_produces_only_legal_shapes() {
        for text in [
            "S -> a S b | epsilon",
            "S -> A B\nA -> a\nB -> b",
            "S -> a b c d e",
            "S -> A S | ending\nA -> a",
        ] {
            let grammar = Cfg::from_text(text, "S").unwrap();
            assert!(wcnf_shapes_ok(&grammar), "bad wcnf for {text:?}");
        }
    }

    #[test]
    fn wcnf_keeps_epsilon_in_the_start_language() {
        let grammar = Cfg::from_text("S -> a S | epsilon", "S").unwrap();
        let parts = grammar.wcnf_parts();
        assert!(parts.epsilon_heads.contains("S"));
    }

    #[test]
    fn wcnf_of_unreachable_start_is_empty() {
        let grammar = Cfg::from_text("S -> a", "B").unwrap();
        assert!(grammar.to_wcnf().is_empty());
    }

    #[test]
    fn unit_productions_are_eliminated() {
        let grammar = Cfg::from_text("S -> A\nA -> a", "S").unwrap();
        let wcnf = grammar.to_wcnf();
        assert!(
            wcnf.productions()
                .any(|p| p.head == "S" && p.body == vec![Symbol::terminal("a")])
        );
        assert!(wcnf.productions().all(|p| {
            !(p.body.len() == 1 && p.body[0].is_nonterminal())
        }));
    }

    #[test]
    fn nullables_propagate_through_bodies() {
        let grammar =
            Cfg::from_text("S -> A B\nA -> epsilon\nB -> b | epsilon", "S").unwrap();
        let nullable = grammar.nullables();
        assert!(nullable.contains("S"));
        assert!(nullable.contains("A"));
        assert!(nullable.contains("B"));
    }

    #[test]
    fn union_accepts_either_language() {
        let left = Cfg::from_text("S -> a", "S").unwrap();
        let right = Cfg::from_text("S -> b", "S").unwrap();
        let either = left.union(&right);
        let parts = either.wcnf_parts();
        let heads_for = |label: &str| {
            parts
                .terminal_heads
                .get(label)
                .cloned()
                .unwrap_or_default()
        };
        assert!(!heads_for("a").is_empty());
        assert!(!heads_for("b").is_empty());
    }

    #[test]
    fn intersection_with_dfa_restricts_the_language() {
        // S derives a^n b^n; the DFA accepts exactly "ab"
        let grammar = Cfg::from_text("S -> a S b | a b", "S").unwrap();
        let dfa = Regex::parse("a b").unwrap().to_min_dfa();
        let product = grammar.intersect_with_dfa(&dfa);
        assert!(!product.is_empty());
        // the product still derives something, and nothing but words of
        // the DFA language, which only has length-2 words
        let parts = product.wcnf_parts();
        assert!(parts.terminal_heads.contains_key("a"));
        assert!(parts.terminal_heads.contains_key("b"));
    }

    #[test]
    fn intersection_with_disjoint_dfa_is_empty() {
        let grammar = Cfg::from_text("S -> a", "S").unwrap();
        let dfa = Regex::parse("b").unwrap().to_min_dfa();
        assert!(grammar.intersect_with_dfa(&dfa).is_empty());
    }
}
