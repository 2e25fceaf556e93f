//! Circular dependency detection over the relationship graph

use crate::models::SchemaRelationship;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Find cycles in the `from -> to` graph.
///
/// Each cycle is returned as a closed path (`[a, b, c, a]`), rotated so it
/// starts at its lexicographically smallest table. The same ring reached
/// from different entry points is reported once.
pub fn find_cycles(relationships: &[SchemaRelationship]) -> Vec<Vec<String>> {
    let mut graph: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for rel in relationships {
        graph.entry(rel.from.as_str()).or_default().insert(rel.to.as_str());
        graph.entry(rel.to.as_str()).or_default();
    }

    let mut search = CycleSearch {
        graph: &graph,
        visited: HashSet::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        seen: HashSet::new(),
        cycles: Vec::new(),
    };

    for &node in graph.keys() {
        if !search.visited.contains(node) {
            search.visit(node);
        }
    }

    search.cycles
}

struct CycleSearch<'g> {
    graph: &'g BTreeMap<&'g str, BTreeSet<&'g str>>,
    visited: HashSet<&'g str>,
    stack: Vec<&'g str>,
    on_stack: HashSet<&'g str>,
    seen: HashSet<Vec<String>>,
    cycles: Vec<Vec<String>>,
}

impl<'g> CycleSearch<'g> {
    fn visit(&mut self, node: &'g str) {
        self.visited.insert(node);
        self.stack.push(node);
        self.on_stack.insert(node);

        let graph = self.graph;
        if let Some(neighbors) = graph.get(node) {
            for &next in neighbors {
                if self.on_stack.contains(next) {
                    self.record_back_edge(next);
                } else if !self.visited.contains(next) {
                    self.visit(next);
                }
            }
        }

        self.stack.pop();
        self.on_stack.remove(node);
    }

    fn record_back_edge(&mut self, target: &str) {
        let Some(start) = self.stack.iter().position(|n| *n == target) else {
            return;
        };

        let cycle = canonicalize(&self.stack[start..]);
        if self.seen.insert(cycle.clone()) {
            self.cycles.push(cycle);
        }
    }
}

/// Rotate a ring to start at its smallest member and close it
fn canonicalize(ring: &[&str]) -> Vec<String> {
    let min = ring
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| **name)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut path: Vec<String> = ring[min..]
        .iter()
        .chain(&ring[..min])
        .map(|n| n.to_string())
        .collect();
    if let Some(first) = path.first().cloned() {
        path.push(first);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cardinality;
    use pretty_assertions::assert_eq;

    fn rel(from: &str, to: &str) -> SchemaRelationship {
        SchemaRelationship {
            id: SchemaRelationship::key(from, "ref", to),
            from: from.to_string(),
            to: to.to_string(),
            field: "ref".to_string(),
            cardinality: Cardinality::OneToOne,
            optional: false,
            is_array: false,
        }
    }

    #[test]
    fn test_three_table_ring() {
        let cycles = find_cycles(&[rel("b", "c"), rel("c", "a"), rel("a", "b")]);
        assert_eq!(cycles, vec![vec!["a", "b", "c", "a"]]);
    }

    #[test]
    fn test_acyclic_graph() {
        let cycles = find_cycles(&[rel("posts", "users"), rel("comments", "posts"), rel("comments", "users")]);
        assert!(cycles.is_empty());
    }

    #[test]
    fn test_self_reference() {
        let cycles = find_cycles(&[rel("comments", "comments")]);
        assert_eq!(cycles, vec![vec!["comments", "comments"]]);
    }

    #[test]
    fn test_distinct_cycles_sharing_a_node() {
        let cycles = find_cycles(&[rel("a", "b"), rel("b", "a"), rel("a", "c"), rel("c", "a")]);
        assert_eq!(cycles, vec![vec!["a", "b", "a"], vec!["a", "c", "a"]]);
    }

    #[test]
    fn test_canonicalize_rotates_to_smallest() {
        assert_eq!(canonicalize(&["c", "a", "b"]), vec!["a", "b", "c", "a"]);
    }
}
