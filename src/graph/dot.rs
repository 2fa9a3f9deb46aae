//! A reader and writer for the slice of the DOT language the engine
//! exchanges: directed graphs whose edges carry a `label` attribute.
//! Unlabeled edges are ignored on input; everything else (subgraphs,
//! default attribute statements, ports) is out of scope.

use std::fmt::Write as _;

use crate::atom::Atom;
use crate::automaton::Nfa;
use crate::error::{EngineError, Result};
use crate::graph::LabeledGraph;

#[derive(Debug, Clone, PartialEq)]
enum DotToken {
    Id(String),
    Arrow,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Equals,
    Comma,
    Semicolon,
}

fn tokenize(text: &str) -> Result<Vec<DotToken>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(DotToken::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(DotToken::RBrace);
            }
            '[' => {
                chars.next();
                tokens.push(DotToken::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(DotToken::RBracket);
            }
            '=' => {
                chars.next();
                tokens.push(DotToken::Equals);
            }
            ',' => {
                chars.next();
                tokens.push(DotToken::Comma);
            }
            ';' => {
                chars.next();
                tokens.push(DotToken::Semicolon);
            }
            '-' => {
                chars.next();
                match chars.next() {
                    Some('>') => tokens.push(DotToken::Arrow),
                    Some(other) => {
                        // a negative numeral id
                        let mut id = String::from('-');
                        id.push(other);
                        while let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() || d == '.' {
                                id.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        tokens.push(DotToken::Id(id));
                    }
                    None => {
                        return Err(EngineError::Syntax("dangling '-' in dot input".into()));
                    }
                }
            }
            '"' => {
                chars.next();
                let mut id = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                id.push(escaped);
                            }
                        }
                        Some('"') => break,
                        Some(other) => id.push(other),
                        None => {
                            return Err(EngineError::Syntax(
                                "unterminated string in dot input".into(),
                            ));
                        }
                    }
                }
                tokens.push(DotToken::Id(id));
            }
            '/' => {
                // line comment
                chars.next();
                if chars.peek() == Some(&'/') {
                    while let Some(&d) = chars.peek() {
                        chars.next();
                        if d == '\n' {
                            break;
                        }
                    }
                } else {
                    return Err(EngineError::Syntax("stray '/' in dot input".into()));
                }
            }
            _ if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut id = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        id.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(DotToken::Id(id));
            }
            other => {
                return Err(EngineError::Syntax(format!(
                    "unexpected character {other:?} in dot input"
                )));
            }
        }
    }
    Ok(tokens)
}

/// Parse a directed DOT graph. Vertex ids become string atoms; an edge
/// contributes only when its attribute list carries `label`.
pub fn read_dot(text: &str) -> Result<LabeledGraph> {
    let tokens = tokenize(text)?;
    let mut position = 0;

    // header: [strict] digraph [name] {
    while position < tokens.len() && tokens[position] != DotToken::LBrace {
        position += 1;
    }
    if position == tokens.len() {
        return Err(EngineError::Syntax("dot input has no graph body".into()));
    }
    position += 1;

    let mut graph = LabeledGraph::new();
    while position < tokens.len() && tokens[position] != DotToken::RBrace {
        match &tokens[position] {
            DotToken::Semicolon => {
                position += 1;
            }
            DotToken::Id(first) => {
                // default-attribute statements carry no information here
                if matches!(first.as_str(), "graph" | "node" | "edge")
                    && tokens.get(position + 1) == Some(&DotToken::LBracket)
                {
                    position += 1;
                    position = skip_attributes(&tokens, position)?;
                    continue;
                }

                let mut path = vec![first.clone()];
                position += 1;
                while tokens.get(position) == Some(&DotToken::Arrow) {
                    position += 1;
                    match tokens.get(position) {
                        Some(DotToken::Id(next)) => {
                            path.push(next.clone());
                            position += 1;
                        }
                        _ => {
                            return Err(EngineError::Syntax(
                                "dot edge is missing its target".into(),
                            ));
                        }
                    }
                }

                let mut label = None;
                if tokens.get(position) == Some(&DotToken::LBracket) {
                    let (next, attributes) = read_attributes(&tokens, position)?;
                    position = next;
                    label = attributes
                        .into_iter()
                        .find(|(key, _)| key == "label")
                        .map(|(_, value)| value);
                }

                if path.len() == 1 {
                    graph.add_node(Atom::Str(path.remove(0)));
                } else if let Some(label) = label {
                    for pair in path.windows(2) {
                        graph.add_edge(
                            Atom::Str(pair[0].clone()),
                            label.clone(),
                            Atom::Str(pair[1].clone()),
                        );
                    }
                } else {
                    // unlabeled edges only pin their endpoints down
                    for id in path {
                        graph.add_node(Atom::Str(id));
                    }
                }
            }
            other => {
                return Err(EngineError::Syntax(format!(
                    "unexpected token {other:?} in dot input"
                )));
            }
        }
    }
    Ok(graph)
}

fn skip_attributes(tokens: &[DotToken], position: usize) -> Result<usize> {
    read_attributes(tokens, position).map(|(next, _)| next)
}

fn read_attributes(
    tokens: &[DotToken],
    mut position: usize,
) -> Result<(usize, Vec<(String, String)>)> {
    debug_assert_eq!(tokens.get(position), Some(&DotToken::LBracket));
    position += 1;
    let mut attributes = Vec::new();
    loop {
        match tokens.get(position) {
            Some(DotToken::RBracket) => return Ok((position + 1, attributes)),
            Some(DotToken::Comma) | Some(DotToken::Semicolon) => position += 1,
            Some(DotToken::Id(key)) => {
                position += 1;
                if tokens.get(position) != Some(&DotToken::Equals) {
                    return Err(EngineError::Syntax(format!(
                        "dot attribute {key:?} is missing '='"
                    )));
                }
                position += 1;
                match tokens.get(position) {
                    Some(DotToken::Id(value)) => {
                        attributes.push((key.clone(), value.clone()));
                        position += 1;
                    }
                    _ => {
                        return Err(EngineError::Syntax(format!(
                            "dot attribute {key:?} is missing its value"
                        )));
                    }
                }
            }
            _ => {
                return Err(EngineError::Syntax(
                    "unterminated attribute list in dot input".into(),
                ));
            }
        }
    }
}

fn quote(id: &str) -> String {
    format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Serialize a graph back to DOT.
pub fn write_dot(graph: &LabeledGraph) -> String {
    let mut out = String::from("digraph {\n");
    for node in graph.nodes() {
        let _ = writeln!(out, "    {};", quote(&node.to_string()));
    }
    for (from, label, to) in graph.edges() {
        let _ = writeln!(
            out,
            "    {} -> {} [label={}];",
            quote(&from.to_string()),
            quote(&to.to_string()),
            quote(label)
        );
    }
    out.push_str("}\n");
    out
}

/// Canonical DOT form of a finite automaton: start states are bold,
/// final states carry a second periphery line.
pub fn write_nfa_dot(nfa: &Nfa<String>) -> String {
    let mut out = String::from("digraph {\n");
    for (index, value) in nfa.values().iter().enumerate() {
        let mut attributes = vec![format!("label={}", quote(&value.to_string()))];
        if nfa.is_start(index) {
            attributes.push("style=bold".to_string());
        }
        if nfa.is_final(index) {
            attributes.push("peripheries=2".to_string());
        }
        let _ = writeln!(out, "    {} [{}];", index, attributes.join(", "));
    }
    for (from, label, to) in nfa.transitions() {
        let _ = writeln!(out, "    {} -> {} [label={}];", from, to, quote(label));
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn reads_labeled_edges_and_skips_unlabeled() {
        let graph = read_dot(
            "digraph test {\n\
             1 -> 2 [label=a];\n\
             2 -> 3 [label=\"b\"];\n\
             3 -> 1;\n\
             }",
        )
        .unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let labels: BTreeSet<String> = graph.info().marks;
        assert_eq!(labels, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn reads_bare_nodes_and_chains() {
        let graph = read_dot("digraph { 7; 1 -> 2 -> 3 [label=x]; }").unwrap();
        assert!(graph.contains_node(&Atom::Str("7".into())));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn node_ids_stay_strings() {
        let graph = read_dot("digraph { 1 -> 2 [label=a]; }").unwrap();
        assert!(graph.contains_node(&Atom::Str("1".into())));
        assert!(!graph.contains_node(&Atom::Int(1)));
    }

    #[test]
    fn round_trips_through_the_writer() {
        let mut graph = LabeledGraph::new();
        graph.add_edge(Atom::Str("u".into()), "a", Atom::Str("v".into()));
        let text = write_dot(&graph);
        let reread = read_dot(&text).unwrap();
        assert_eq!(reread.node_count(), 2);
        assert_eq!(reread.edge_count(), 1);
    }

    #[test]
    fn rejects_garbage() {
        assert!(read_dot("not a graph at all").is_err());
        assert!(read_dot("digraph { 1 -> [label=a]; }").is_err());
    }
}
