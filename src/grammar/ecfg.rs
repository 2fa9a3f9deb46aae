//! Extended context-free grammars: one regex per nonterminal instead of
//! a list of symbol sequences. The extension is the bridge between a
//! plain grammar and its recursive state machine.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};
use crate::grammar::Cfg;
use crate::regex::Regex;

#[derive(Debug, Clone)]
pub struct Ecfg {
    start: String,
    nonterminals: BTreeSet<String>,
    productions: BTreeMap<String, Regex>,
}

impl Ecfg {
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn nonterminals(&self) -> &BTreeSet<String> {
        &self.nonterminals
    }

    pub fn productions(&self) -> impl Iterator<Item = (&String, &Regex)> {
        self.productions.iter()
    }

    /// Extend a plain grammar: every production body becomes a symbol
    /// concatenation, alternatives for the same head are unioned.
    pub fn from_cfg(grammar: &Cfg) -> Ecfg {
        let mut productions: BTreeMap<String, Regex> = BTreeMap::new();
        for production in grammar.productions() {
            let body = production
                .body
                .iter()
                .map(|symbol| Regex::Symbol(symbol.name().to_string()))
                .reduce(|left, right| Regex::Concat(Box::new(left), Box::new(right)))
                .unwrap_or(Regex::Epsilon);
            productions
                .entry(production.head.clone())
                .and_modify(|regex| {
                    *regex = Regex::Union(Box::new(regex.clone()), Box::new(body.clone()));
                })
                .or_insert(body);
        }
        Ecfg {
            start: grammar.start().to_string(),
            nonterminals: grammar.nonterminals(),
            productions,
        }
    }

    /// Parse extended grammar text: `head -> regex` per line, `$` for
    /// the empty word. Heads are the nonterminals; any other symbol in
    /// a regex is a terminal.
    pub fn from_text(text: &str, start: &str) -> Result<Ecfg> {
        let mut productions: BTreeMap<String, Regex> = BTreeMap::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 {
                return Err(EngineError::Grammar(format!(
                    "extended production {line:?} is missing elements"
                )));
            }
            if tokens[1] != "->" {
                return Err(EngineError::Grammar(format!(
                    "extended production {line:?} is missing '->'"
                )));
            }
            let head = tokens[0].to_string();
            let body = Regex::parse(&tokens[2..].join(" "))?;
            productions
                .entry(head)
                .and_modify(|regex| {
                    *regex = Regex::Union(Box::new(regex.clone()), Box::new(body.clone()));
                })
                .or_insert(body);
        }

        let mut nonterminals: BTreeSet<String> = productions.keys().cloned().collect();
        nonterminals.insert(start.to_string());
        Ok(Ecfg {
            start: start.to_string(),
            nonterminals,
            productions,
        })
    }
}
