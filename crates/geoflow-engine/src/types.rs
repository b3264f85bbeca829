//! Core types for operation graphs
//!
//! A [`Graph`] owns its [`Node`] and [`Edge`] records and addresses them by
//! stable string ids. Node insertion order is preserved and is the tie-break
//! order for execution.

use std::collections::HashSet;

use geoflow_ops::{ConfigMap, FeatureCollection, DEFAULT_CRS};
use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

/// Summary of a node's last successful output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePreview {
    pub feature_count: usize,
    pub geometry_type: String,
    pub crs: String,
}

impl NodePreview {
    pub fn of(collection: &FeatureCollection) -> Self {
        Self {
            feature_count: collection.len(),
            geometry_type: collection.geometry_type_summary(),
            crs: DEFAULT_CRS.to_string(),
        }
    }
}

/// Canvas position; carried for the UI and ignored by the engine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Operation type (references an OperationDescriptor)
    pub operation_type: String,
    /// Configuration for this instance
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub state: NodeState,
    /// Message of the last failed run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<NodePreview>,
    #[serde(default)]
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, operation_type: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            id: id.into(),
            operation_type: operation_type.into(),
            config,
            state: NodeState::Idle,
            error: None,
            preview: None,
            position: Position::default(),
        }
    }

    /// Reset run state to `idle`
    pub fn reset(&mut self) {
        self.state = NodeState::Idle;
        self.error = None;
        self.preview = None;
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Source port ID
    pub source_port: String,
    /// Target node ID
    pub target: NodeId,
    /// Target port ID
    pub target_port: String,
}

/// Nodes and edges of an operation graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    /// Nodes in insertion order
    pub nodes: Vec<Node>,
    /// Edges in insertion order
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find a node by ID (mutable)
    pub fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// The edge feeding a node's input port, if any
    pub fn input_binding(&self, node_id: &str, port: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == node_id && e.target_port == port)
    }

    /// Get the IDs of nodes that this node depends on, without duplicates
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.incoming_edges(node_id)
            .filter(|e| seen.insert(e.source.as_str()))
            .map(|e| e.source.clone())
            .collect()
    }

    /// Get the IDs of nodes that depend on this node
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id).map(|e| e.target.clone()).collect()
    }

    /// True when `from` transitively depends on `to`
    pub fn depends_on(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from.to_string()];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if visited.insert(current.clone()) {
                stack.extend(self.get_dependencies(&current));
            }
        }
        false
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(self.nodes.remove(pos))
    }

    /// Remove an edge by ID
    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str, source: &str, target: &str, port: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            source_port: "output".to_string(),
            target: target.to_string(),
            target_port: port.to_string(),
        }
    }

    fn chain() -> Graph {
        let mut graph = Graph::new();
        for id in ["a", "b", "c"] {
            graph.nodes.push(Node::new(id, "buffer", ConfigMap::new()));
        }
        graph.edges.push(edge("e1", "a", "b", "input"));
        graph.edges.push(edge("e2", "b", "c", "input"));
        graph
    }

    #[test]
    fn test_graph_edges() {
        let graph = chain();
        assert_eq!(graph.get_dependencies("b"), vec!["a"]);
        assert_eq!(graph.get_dependents("b"), vec!["c"]);
        assert_eq!(graph.input_binding("c", "input").map(|e| e.id.as_str()), Some("e2"));
        assert!(graph.input_binding("c", "overlay").is_none());
    }

    #[test]
    fn test_input_binding_outlives_the_lookup_key() {
        let graph = chain();
        let bound = {
            let target = String::from("b");
            graph.input_binding(&target, "input")
        };
        assert_eq!(bound.map(|e| e.source.as_str()), Some("a"));
    }

    #[test]
    fn test_depends_on_is_transitive() {
        let graph = chain();
        assert!(graph.depends_on("c", "a"));
        assert!(!graph.depends_on("a", "c"));
    }

    #[test]
    fn test_remove_node_drops_its_edges() {
        let mut graph = chain();
        let removed = graph.remove_node("b").unwrap();
        assert_eq!(removed.id, "b");
        assert!(graph.edges.is_empty());
        assert!(graph.remove_node("b").is_none());
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let node = Node::new("n1", "make-valid", ConfigMap::new());
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["operationType"], "make-valid");
        assert_eq!(json["state"], "idle");
        assert!(json.get("error").is_none());
    }
}
