//! Reachability queries over edge-labeled directed graphs, constrained
//! by formal languages. A query is a regular expression or a
//! context-free grammar; the answer is the set of vertex pairs joined
//! by a path whose label word belongs to the query language.
//!
//! Everything rests on one substrate: boolean sparse matrices
//! ([`matrix`]) decomposing labeled transition systems ([`lts`]). On
//! top sit the closure engines ([`query`]): automaton intersection,
//! multi-source BFS, and three context-free kernels. A small query
//! language ([`interpret`]) exposes them, with automata and grammars
//! as its values.

pub mod atom;
pub mod automaton;
pub mod error;
pub mod grammar;
pub mod graph;
pub mod interpret;
pub mod lts;
pub mod matrix;
pub mod query;
pub mod regex;
