use std::fmt;

/// The value universe shared by graph vertices, automaton state
/// identities and query-language set elements. Atoms are the only
/// values that may live inside a set, so the whole family is ordered
/// and hashable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Int(i64),
    Bool(bool),
    Str(String),
    Pair(Box<Atom>, Box<Atom>),
    Triple(Box<Atom>, Box<Atom>, Box<Atom>),
}

/// Discriminant of an [`Atom`]; a set infers its kind from the first
/// insertion and rejects elements of any other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomKind {
    Int,
    Bool,
    Str,
    Pair,
    Triple,
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AtomKind::Int => "int",
            AtomKind::Bool => "bool",
            AtomKind::Str => "string",
            AtomKind::Pair => "pair",
            AtomKind::Triple => "triple",
        };
        f.write_str(name)
    }
}

impl Atom {
    pub fn kind(&self) -> AtomKind {
        match self {
            Atom::Int(_) => AtomKind::Int,
            Atom::Bool(_) => AtomKind::Bool,
            Atom::Str(_) => AtomKind::Str,
            Atom::Pair(_, _) => AtomKind::Pair,
            Atom::Triple(_, _, _) => AtomKind::Triple,
        }
    }

    pub fn pair(first: Atom, second: Atom) -> Atom {
        Atom::Pair(Box::new(first), Box::new(second))
    }

    pub fn triple(first: Atom, mark: Atom, second: Atom) -> Atom {
        Atom::Triple(Box::new(first), Box::new(mark), Box::new(second))
    }

    /// Vertex ids in edge-list files are integers when they look like
    /// integers and plain strings otherwise.
    pub fn parse_vertex(token: &str) -> Atom {
        match token.parse::<i64>() {
            Ok(n) => Atom::Int(n),
            Err(_) => Atom::Str(token.to_string()),
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(n) => write!(f, "{}", n),
            Atom::Bool(b) => write!(f, "{}", b),
            Atom::Str(s) => write!(f, "{}", s),
            Atom::Pair(a, b) => write!(f, "{} -> {}", a, b),
            Atom::Triple(a, m, b) => write!(f, "{} -- {} -> {}", a, m, b),
        }
    }
}

impl From<i64> for Atom {
    fn from(n: i64) -> Self {
        Atom::Int(n)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::Str(s.to_string())
    }
}

impl From<String> for Atom {
    fn from(s: String) -> Self {
        Atom::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_parsing_prefers_integers() {
        assert_eq!(Atom::parse_vertex("17"), Atom::Int(17));
        assert_eq!(Atom::parse_vertex("-3"), Atom::Int(-3));
        assert_eq!(Atom::parse_vertex("n17"), Atom::Str("n17".into()));
    }

    #[test]
    fn display_forms() {
        let pair = Atom::pair(Atom::Int(1), Atom::Int(2));
        assert_eq!(pair.to_string(), "1 -> 2");
        let triple = Atom::triple(Atom::Int(1), Atom::Str("a".into()), Atom::Int(2));
        assert_eq!(triple.to_string(), "1 -- a -> 2");
    }
}
