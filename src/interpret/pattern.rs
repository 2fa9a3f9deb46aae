//! Structural matching of patterns against set elements. A successful
//! match yields the bindings the lambda body runs under; a shape
//! mismatch is a type error that kills the query.

use crate::atom::Atom;
use crate::error::{EngineError, Result};
use crate::interpret::ast::Pattern;

pub fn match_atom<'a>(pattern: &Pattern<'a>, atom: &Atom) -> Result<Vec<(&'a str, Atom)>> {
    let mut bindings = Vec::new();
    collect(pattern, atom, &mut bindings)?;
    Ok(bindings)
}

fn collect<'a>(
    pattern: &Pattern<'a>,
    atom: &Atom,
    bindings: &mut Vec<(&'a str, Atom)>,
) -> Result<()> {
    match (pattern, atom) {
        (Pattern::Any, _) => Ok(()),
        (Pattern::Name(name), value) => {
            bindings.push((name, value.clone()));
            Ok(())
        }
        (Pattern::Pair(first, second), Atom::Pair(left, right)) => {
            collect(first, left, bindings)?;
            collect(second, right, bindings)
        }
        (Pattern::Triple(first, mark, second), Atom::Triple(left, middle, right)) => {
            collect(first, left, bindings)?;
            collect(mark, middle, bindings)?;
            collect(second, right, bindings)
        }
        (pattern, value) => Err(EngineError::Type(format!(
            "cannot match pattern {pattern:?} with value {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_binds_nothing() {
        assert!(match_atom(&Pattern::Any, &Atom::Int(3)).unwrap().is_empty());
    }

    #[test]
    fn name_binds_the_whole_value() {
        let pair = Atom::pair(Atom::Int(1), Atom::Int(2));
        let bindings = match_atom(&Pattern::Name("x"), &pair).unwrap();
        assert_eq!(bindings, vec![("x", pair)]);
    }

    #[test]
    fn pair_patterns_destructure() {
        let pattern = Pattern::Pair(&Pattern::Any, &Pattern::Name("f"));
        let bindings = match_atom(&pattern, &Atom::pair(Atom::Int(1), Atom::Int(2))).unwrap();
        assert_eq!(bindings, vec![("f", Atom::Int(2))]);
    }

    #[test]
    fn triple_patterns_destructure() {
        let pattern = Pattern::Triple(&Pattern::Name("u"), &Pattern::Any, &Pattern::Name("v"));
        let atom = Atom::triple(Atom::Int(1), Atom::Str("a".into()), Atom::Int(2));
        let bindings = match_atom(&pattern, &atom).unwrap();
        assert_eq!(bindings, vec![("u", Atom::Int(1)), ("v", Atom::Int(2))]);
    }

    #[test]
    fn shape_mismatch_is_a_type_error() {
        let pattern = Pattern::Pair(&Pattern::Any, &Pattern::Any);
        assert!(matches!(
            match_atom(&pattern, &Atom::Int(5)),
            Err(EngineError::Type(_))
        ));
    }
}
