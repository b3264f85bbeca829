//! Execution order for operation graphs
//!
//! Depth-first postorder over dependencies: a node is appended only after
//! every node feeding it. Roots (nodes without incoming edges) are visited
//! first in insertion order, then every node not yet reached. The walk keeps
//! its own stack, so chain length is not bounded by the thread stack.

use std::collections::{HashMap, HashSet};

use crate::error::{GeoflowError, Result};
use crate::types::{Graph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// A node whose dependencies are being walked
struct Frame<'a> {
    node_id: &'a str,
    next: usize,
}

struct Walk<'a> {
    /// Distinct sources feeding each node, in edge order
    sources: HashMap<&'a str, Vec<&'a str>>,
    node_ids: HashSet<&'a str>,
    marks: HashMap<&'a str, Mark>,
    order: Vec<NodeId>,
}

impl<'a> Walk<'a> {
    fn new(graph: &'a Graph) -> Self {
        let mut sources: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for edge in &graph.edges {
            let feeding = sources.entry(edge.target.as_str()).or_default();
            if !feeding.contains(&edge.source.as_str()) {
                feeding.push(edge.source.as_str());
            }
        }
        Self {
            sources,
            node_ids: graph.nodes.iter().map(|n| n.id.as_str()).collect(),
            marks: HashMap::with_capacity(graph.nodes.len()),
            order: Vec::with_capacity(graph.nodes.len()),
        }
    }

    fn is_root(&self, node_id: &str) -> bool {
        !self.sources.contains_key(node_id)
    }

    fn sources_of(&self, node_id: &str) -> &[&'a str] {
        self.sources.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Postorder walk from `start` with an explicit stack
    fn visit(&mut self, start: &'a str) -> Result<()> {
        if self.marks.contains_key(start) {
            return Ok(());
        }
        self.marks.insert(start, Mark::InProgress);
        let mut stack = vec![Frame {
            node_id: start,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let next = self.sources_of(frame.node_id).get(frame.next).copied();
            let Some(source) = next else {
                let node_id = frame.node_id;
                stack.pop();
                self.marks.insert(node_id, Mark::Done);
                self.order.push(node_id.to_string());
                continue;
            };
            frame.next += 1;

            if !self.node_ids.contains(source) {
                return Err(GeoflowError::DanglingEdge {
                    node_id: source.to_string(),
                });
            }
            match self.marks.get(source) {
                Some(Mark::Done) => {}
                Some(Mark::InProgress) => {
                    return Err(GeoflowError::CyclicGraph {
                        node_id: source.to_string(),
                    })
                }
                None => {
                    self.marks.insert(source, Mark::InProgress);
                    stack.push(Frame {
                        node_id: source,
                        next: 0,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Compute an order in which every node follows all of its dependencies
///
/// Fails with [`GeoflowError::CyclicGraph`] naming a node on the cycle, or
/// [`GeoflowError::DanglingEdge`] if an edge references a missing node.
pub fn resolve(graph: &Graph) -> Result<Vec<NodeId>> {
    let mut walk = Walk::new(graph);

    for node in &graph.nodes {
        if walk.is_root(&node.id) {
            walk.visit(&node.id)?;
        }
    }
    for node in &graph.nodes {
        walk.visit(&node.id)?;
    }

    Ok(walk.order)
}

/// Like [`resolve`], limited to `target` and its transitive dependencies
pub fn resolve_for(graph: &Graph, target: &str) -> Result<Vec<NodeId>> {
    let node = graph
        .find_node(target)
        .ok_or_else(|| GeoflowError::UnknownNode(target.to_string()))?;
    let mut walk = Walk::new(graph);
    walk.visit(&node.id)?;
    Ok(walk.order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, Node};
    use geoflow_ops::ConfigMap;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> Graph {
        Graph {
            nodes: nodes
                .iter()
                .map(|id| Node::new(*id, "buffer", ConfigMap::new()))
                .collect(),
            edges: edges
                .iter()
                .enumerate()
                .map(|(i, (source, target))| Edge {
                    id: format!("e{i}"),
                    source: source.to_string(),
                    source_port: "output".to_string(),
                    target: target.to_string(),
                    target_port: format!("in{i}"),
                })
                .collect(),
        }
    }

    fn position(order: &[NodeId], id: &str) -> usize {
        order.iter().position(|n| n == id).unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        // inserted downstream-first on purpose
        let g = graph(
            &["export", "buffer", "file", "mask", "clip"],
            &[("file", "buffer"), ("buffer", "clip"), ("mask", "clip"), ("clip", "export")],
        );
        let order = resolve(&g).unwrap();

        assert_eq!(order.len(), 5);
        for edge in &g.edges {
            assert!(position(&order, &edge.source) < position(&order, &edge.target));
        }
    }

    #[test]
    fn test_shared_ancestor_appears_once() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        let order = resolve(&g).unwrap();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_disconnected_subgraphs_follow_root_order() {
        let g = graph(&["x", "a", "y", "b"], &[("x", "y"), ("a", "b")]);
        let order = resolve(&g).unwrap();
        assert_eq!(order, vec!["x", "a", "y", "b"]);
    }

    #[test]
    fn test_cycle_names_a_node_on_it() {
        let g = graph(&["src", "a", "b", "c"], &[("src", "a"), ("a", "b"), ("b", "c"), ("c", "a")]);
        match resolve(&g) {
            Err(GeoflowError::CyclicGraph { node_id }) => {
                assert!(["a", "b", "c"].contains(&node_id.as_str()), "{node_id}");
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(&["a"], &[("a", "a")]);
        assert!(matches!(
            resolve(&g),
            Err(GeoflowError::CyclicGraph { node_id }) if node_id == "a"
        ));
    }

    #[test]
    fn test_resolve_for_limits_to_ancestors() {
        let g = graph(&["a", "b", "c", "z"], &[("a", "b"), ("b", "c")]);
        assert_eq!(resolve_for(&g, "b").unwrap(), vec!["a", "b"]);
        assert!(matches!(resolve_for(&g, "nope"), Err(GeoflowError::UnknownNode(_))));
    }

    #[test]
    fn test_long_chain_resolves() {
        let ids: Vec<String> = (0..50_000).map(|i| format!("n{i}")).collect();
        let mut g = Graph::new();
        // downstream-first so every node is reached through its dependents
        for id in ids.iter().rev() {
            g.nodes.push(Node::new(id.as_str(), "buffer", ConfigMap::new()));
        }
        g.edges = ids
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Edge {
                id: format!("e{i}"),
                source: pair[0].clone(),
                source_port: "output".to_string(),
                target: pair[1].clone(),
                target_port: "input".to_string(),
            })
            .collect();

        let order = resolve(&g).unwrap();
        assert_eq!(order, ids);
    }
}
