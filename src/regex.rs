use logos::Logos;

use crate::automaton::{Alphabet, Dfa, Nfa};
use crate::error::{EngineError, Result};

/// Regular expressions over symbol words.
///
/// The literal syntax: `|` and `+` are union, `*` is Kleene star, `.`
/// and juxtaposition are concatenation, `$` is the empty word and
/// parentheses group. A symbol is a maximal run of other characters;
/// the operator characters join a symbol when escaped with a
/// backslash. The empty literal denotes the empty language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
    Empty,
    Epsilon,
    Symbol(String),
    Star(Box<Regex>),
    Union(Box<Regex>, Box<Regex>),
    Concat(Box<Regex>, Box<Regex>),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("|")]
    Pipe,
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token(".")]
    Dot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("$")]
    Epsilon,
    #[regex(r"([^|+*.()$\\ \t\r\n]|\\[|+*.()$\\])+", |lex| unescape(lex.slice()))]
    Symbol(String),
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn union(&mut self) -> Result<Regex> {
        let mut left = self.concat()?;
        while matches!(self.peek(), Some(Token::Pipe) | Some(Token::Plus)) {
            self.bump();
            let right = self.concat()?;
            left = Regex::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn concat(&mut self) -> Result<Regex> {
        let mut left = self.postfix()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.bump();
                }
                Some(Token::Symbol(_)) | Some(Token::Epsilon) | Some(Token::LParen) => {}
                _ => break,
            }
            let right = self.postfix()?;
            left = Regex::Concat(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn postfix(&mut self) -> Result<Regex> {
        let mut inner = self.primary()?;
        while matches!(self.peek(), Some(Token::Star)) {
            self.bump();
            inner = Regex::Star(Box::new(inner));
        }
        Ok(inner)
    }

    fn primary(&mut self) -> Result<Regex> {
        match self.bump() {
            Some(Token::Symbol(name)) => Ok(Regex::Symbol(name)),
            Some(Token::Epsilon) => Ok(Regex::Epsilon),
            Some(Token::LParen) => {
                let inner = self.union()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(EngineError::Syntax("unclosed group in regex".into())),
                }
            }
            other => Err(EngineError::Syntax(format!(
                "unexpected token in regex: {:?}",
                other
            ))),
        }
    }
}

impl Regex {
    pub fn parse(text: &str) -> Result<Regex> {
        let mut tokens = Vec::new();
        for token in Token::lexer(text) {
            match token {
                Ok(token) => tokens.push(token),
                Err(_) => {
                    return Err(EngineError::Syntax(format!("bad regex literal: {text:?}")));
                }
            }
        }
        if tokens.is_empty() {
            return Ok(Regex::Empty);
        }
        let mut parser = Parser { tokens, position: 0 };
        let regex = parser.union()?;
        if parser.peek().is_some() {
            return Err(EngineError::Syntax(format!(
                "trailing tokens in regex: {text:?}"
            )));
        }
        Ok(regex)
    }

    /// Thompson construction. `classify` decides what a symbol name
    /// means on a transition; plain automata map names to themselves
    /// while recursive state machines split them into terminals and
    /// nonterminal calls.
    pub fn to_nfa<A: Alphabet>(&self, classify: &impl Fn(&str) -> A) -> Nfa<A> {
        let mut nfa = Nfa::new();
        let (start, accept) = build(&mut nfa, self, classify);
        nfa.mark_start(start);
        nfa.mark_final(accept);
        nfa
    }

    /// The unique (up to isomorphism) minimal DFA of the language.
    pub fn to_min_dfa(&self) -> Dfa<String> {
        self.to_nfa(&|name: &str| name.to_string())
            .determinize()
            .minimize()
    }
}

fn build<A: Alphabet>(
    nfa: &mut Nfa<A>,
    node: &Regex,
    classify: &impl Fn(&str) -> A,
) -> (usize, usize) {
    match node {
        Regex::Empty => {
            let start = nfa.add_numbered_states(2);
            (start, start + 1)
        }
        Regex::Epsilon => {
            let start = nfa.add_numbered_states(2);
            nfa.add_epsilon(start, start + 1);
            (start, start + 1)
        }
        Regex::Symbol(name) => {
            let start = nfa.add_numbered_states(2);
            nfa.add_transition(start, classify(name), start + 1);
            (start, start + 1)
        }
        Regex::Star(inner) => {
            let (inner_start, inner_accept) = build(nfa, inner, classify);
            let hub = nfa.add_numbered_states(1);
            nfa.add_epsilon(hub, inner_start);
            nfa.add_epsilon(inner_accept, hub);
            (hub, hub)
        }
        Regex::Union(left, right) => {
            let (left_start, left_accept) = build(nfa, left, classify);
            let (right_start, right_accept) = build(nfa, right, classify);
            let start = nfa.add_numbered_states(2);
            let accept = start + 1;
            nfa.add_epsilon(start, left_start);
            nfa.add_epsilon(start, right_start);
            nfa.add_epsilon(left_accept, accept);
            nfa.add_epsilon(right_accept, accept);
            (start, accept)
        }
        Regex::Concat(left, right) => {
            let (left_start, left_accept) = build(nfa, left, classify);
            let (right_start, right_accept) = build(nfa, right, classify);
            nfa.add_epsilon(left_accept, right_start);
            (left_start, right_accept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_union_and_star() {
        let regex = Regex::parse("a*|b").unwrap();
        assert_eq!(
            regex,
            Regex::Union(
                Box::new(Regex::Star(Box::new(Regex::Symbol("a".into())))),
                Box::new(Regex::Symbol("b".into())),
            )
        );
    }

    #[test]
    fn plus_is_union_and_dot_is_concat() {
        let with_plus = Regex::parse("a+b").unwrap().to_min_dfa();
        let with_pipe = Regex::parse("a|b").unwrap().to_min_dfa();
        assert!(with_plus.same_shape(&with_pipe));

        let dotted = Regex::parse("a.b").unwrap().to_min_dfa();
        let spaced = Regex::parse("a b").unwrap().to_min_dfa();
        assert!(dotted.same_shape(&spaced));
        assert!(dotted.accepts(&word(&["a", "b"])));
    }

    #[test]
    fn multi_character_symbols_are_single_transitions() {
        let dfa = Regex::parse("abc def").unwrap().to_min_dfa();
        assert!(dfa.accepts(&word(&["abc", "def"])));
        assert!(!dfa.accepts(&word(&["abc"])));
        assert!(!dfa.accepts(&word(&["a", "b", "c", "d", "e", "f"])));
    }

    #[test]
    fn escaped_operators_join_symbols() {
        for (literal, expected) in [
            (r"\|", "|"),
            (r"\*", "*"),
            (r"\+", "+"),
            (r"\(", "("),
            (r"\)", ")"),
            (r"\.", "."),
            (r"\$", "$"),
        ] {
            let dfa = Regex::parse(literal).unwrap().to_min_dfa();
            assert!(dfa.accepts(&word(&[expected])), "literal {literal}");
        }
    }

    #[test]
    fn dollar_is_the_empty_word() {
        let dfa = Regex::parse("$").unwrap().to_min_dfa();
        assert!(dfa.accepts(&word(&[])));
        assert!(!dfa.accepts(&word(&["a"])));
    }

    #[test]
    fn empty_literal_is_the_empty_language() {
        let dfa = Regex::parse("").unwrap().to_min_dfa();
        assert!(!dfa.accepts(&word(&[])));
        assert!(!dfa.accepts(&word(&["a"])));
    }

    #[test]
    fn min_dfa_accepts_exactly_the_language() {
        let dfa = Regex::parse("a*c").unwrap().to_min_dfa();
        assert!(dfa.accepts(&word(&["c"])));
        assert!(dfa.accepts(&word(&["a", "c"])));
        assert!(dfa.accepts(&word(&["a", "a", "c"])));
        assert!(!dfa.accepts(&word(&["a"])));
        assert!(!dfa.accepts(&word(&["c", "a"])));
    }

    #[test]
    fn equal_languages_give_isomorphic_dfas() {
        let left = Regex::parse("(a|b)*").unwrap().to_min_dfa();
        let right = Regex::parse("(b*|a*)*").unwrap().to_min_dfa();
        assert!(left.same_shape(&right));
    }

    #[test]
    fn unclosed_group_is_a_syntax_error() {
        assert!(matches!(
            Regex::parse("(a|b"),
            Err(EngineError::Syntax(_))
        ));
    }
}
