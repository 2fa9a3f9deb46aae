//! The local graph catalog. A catalog directory holds `catalog.xml`, a
//! manifest naming the graphs it provides, next to whitespace-separated
//! edge-list files (`from to label`, one edge per line). The download
//! side that fills such a directory is not part of the engine; this
//! module only resolves names against an already-populated cache.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::atom::Atom;
use crate::error::{EngineError, Result};
use crate::graph::LabeledGraph;

const MANIFEST: &str = "catalog.xml";
const CATALOG_ENV: &str = "LLL_CATALOG";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "graph", default)]
    graphs: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@file")]
    file: String,
}

/// Handle on one catalog directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn open(root: impl Into<PathBuf>) -> Catalog {
        Catalog { root: root.into() }
    }

    /// The directory named by `LLL_CATALOG`, falling back to
    /// `./catalog`. The variable is optional; nothing else configures
    /// the engine through the environment.
    pub fn from_env() -> Catalog {
        let root = std::env::var(CATALOG_ENV).unwrap_or_else(|_| "catalog".to_string());
        Catalog::open(root)
    }

    /// Resolve `name` through the manifest and read its edge list.
    pub fn load(&self, name: &str) -> Result<LabeledGraph> {
        let manifest_path = self.root.join(MANIFEST);
        let text = fs::read_to_string(&manifest_path).map_err(|err| {
            EngineError::Io(format!("cannot read {}: {err}", manifest_path.display()))
        })?;
        let manifest: Manifest = quick_xml::de::from_str(&text)
            .map_err(|err| EngineError::Io(format!("bad catalog manifest: {err}")))?;

        let entry = manifest
            .graphs
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| EngineError::Io(format!("graph {name:?} is not in the catalog")))?;

        let graph_path = self.root.join(&entry.file);
        let edges = fs::read_to_string(&graph_path).map_err(|err| {
            EngineError::Io(format!("cannot read {}: {err}", graph_path.display()))
        })?;
        parse_edge_list(&edges)
    }
}

fn parse_edge_list(text: &str) -> Result<LabeledGraph> {
    let mut graph = LabeledGraph::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [from, to, label] => {
                graph.add_edge(Atom::parse_vertex(from), *label, Atom::parse_vertex(to));
            }
            [vertex] => {
                graph.add_node(Atom::parse_vertex(vertex));
            }
            _ => {
                return Err(EngineError::Io(format!(
                    "bad edge list line {}: {line:?}",
                    number + 1
                )));
            }
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_lists_parse_vertices_as_integers_when_possible() {
        let graph = parse_edge_list("1 2 a\n2 3 b\n# comment\nx y c\n").unwrap();
        assert_eq!(graph.node_count(), 5);
        assert!(graph.contains_node(&Atom::Int(1)));
        assert!(graph.contains_node(&Atom::Str("x".into())));
    }

    #[test]
    fn edge_lists_reject_short_lines() {
        assert!(matches!(
            parse_edge_list("1 2\n"),
            Err(EngineError::Io(_))
        ));
    }

    #[test]
    fn manifest_deserializes() {
        let manifest: Manifest = quick_xml::de::from_str(
            "<catalog>\
             <graph name=\"skos\" file=\"skos.edges\"/>\
             <graph name=\"core\" file=\"core.edges\"/>\
             </catalog>",
        )
        .unwrap();
        assert_eq!(manifest.graphs.len(), 2);
        assert_eq!(manifest.graphs[0].name, "skos");
        assert_eq!(manifest.graphs[1].file, "core.edges");
    }
}
