//! Execution engine
//!
//! The [`Engine`] owns a graph, its Result Store, uploads, export artifacts
//! and undo history. It is the only entry point for mutation and execution:
//!
//! - graph edits are validated at the call (dangling edges, unknown ports,
//!   double-bound inputs, cycles) and recorded in the undo history
//! - `run_node` drives one node through `running` to `success` or `error`
//! - `run_all` resolves an order once and runs every node in it, one at a
//!   time, without short-circuiting failed subtrees
//!
//! Each engine is independent; nothing is shared between instances.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use geoflow_ops::{ports, ConfigMap, FeatureCollection, OperationDescriptor};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{GeoflowError, PortDirection, Result};
use crate::events::{EngineEvent, EventSink, NodeFailure, NullEventSink};
use crate::export::ExportArtifact;
use crate::history::GraphHistory;
use crate::registry::{ExecutionResources, OperationOutput, OperationRegistry, OperationRequest, Upload};
use crate::resolver;
use crate::sandbox::ScriptSandbox;
use crate::store::ResultStore;
use crate::types::{Edge, Graph, Node, NodeId, NodePreview, NodeState, Position};

/// Outcome of `run_all`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    /// Resolved execution order
    pub order: Vec<NodeId>,
    pub succeeded: Vec<NodeId>,
    pub failed: Vec<NodeFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, node_id: &str) -> Option<&NodeFailure> {
        self.failed.iter().find(|f| f.node_id == node_id)
    }
}

/// Builder for [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    registry: Option<OperationRegistry>,
    events: Option<Arc<dyn EventSink>>,
    http: Option<reqwest::Client>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom registry instead of the built-in operations
    pub fn registry(mut self, registry: OperationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> Engine {
        let resources = ExecutionResources {
            http: self.http.unwrap_or_default(),
            http_timeout: self.config.http_timeout(),
            sandbox: ScriptSandbox::new(self.config.sandbox.clone()),
        };
        let history = (self.config.history_depth > 0)
            .then(|| GraphHistory::new(self.config.history_depth + 1));

        let mut engine = Engine {
            graph: Graph::new(),
            store: ResultStore::new(),
            uploads: HashMap::new(),
            artifacts: HashMap::new(),
            registry: self.registry.unwrap_or_else(OperationRegistry::with_builtins),
            history,
            events: self.events.unwrap_or_else(|| Arc::new(NullEventSink)),
            resources,
            config: self.config,
        };
        engine.record();
        engine
    }
}

/// Owns one operation graph and executes it
pub struct Engine {
    graph: Graph,
    store: ResultStore,
    uploads: HashMap<NodeId, Upload>,
    artifacts: HashMap<NodeId, ExportArtifact>,
    registry: OperationRegistry,
    history: Option<GraphHistory>,
    events: Arc<dyn EventSink>,
    resources: ExecutionResources,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Palette listing of every registered operation
    pub fn descriptors(&self) -> Vec<&OperationDescriptor> {
        self.registry.descriptors()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.graph.find_node(node_id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.graph.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.graph.edges
    }

    pub fn state(&self, node_id: &str) -> Option<NodeState> {
        self.node(node_id).map(|n| n.state)
    }

    /// Last successful output of a node
    pub fn get_result(&self, node_id: &str) -> Option<Arc<FeatureCollection>> {
        self.store.get(node_id)
    }

    /// File produced by the last successful run of an export node
    pub fn export_artifact(&self, node_id: &str) -> Option<&ExportArtifact> {
        self.artifacts.get(node_id)
    }

    // -- graph mutation --

    /// Add a node of `operation_type` with its default configuration
    pub fn create_node(&mut self, operation_type: &str, position: Position) -> Result<Node> {
        let descriptor = self.registry.descriptor_or_err(operation_type)?;
        let mut node = Node::new(
            uuid::Uuid::new_v4().to_string(),
            operation_type,
            descriptor.default_config.clone(),
        );
        node.position = position;

        log::debug!("created {} node {}", operation_type, node.id);
        self.graph.nodes.push(node.clone());
        self.record();
        Ok(node)
    }

    /// Connect `source`'s output port to `target`'s input port
    pub fn create_edge(
        &mut self,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> Result<Edge> {
        let edge = Edge {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.to_string(),
            source_port: source_port.to_string(),
            target: target.to_string(),
            target_port: target_port.to_string(),
        };
        check_edge(&self.registry, &self.graph, &edge)?;

        self.graph.edges.push(edge.clone());
        self.record();
        Ok(edge)
    }

    /// Replace a node's configuration map; run state is unaffected
    pub fn update_config(&mut self, node_id: &str, config: ConfigMap) -> Result<()> {
        let node = self
            .graph
            .find_node_mut(node_id)
            .ok_or_else(|| GeoflowError::UnknownNode(node_id.to_string()))?;
        node.config = config;
        self.record();
        Ok(())
    }

    /// Remove a node with its edges, result, upload and artifact
    pub fn remove_node(&mut self, node_id: &str) -> Result<Node> {
        let node = self
            .graph
            .remove_node(node_id)
            .ok_or_else(|| GeoflowError::UnknownNode(node_id.to_string()))?;
        self.forget(node_id);
        self.emit(EngineEvent::NodeRemoved {
            node_id: node_id.to_string(),
        });
        self.record();
        Ok(node)
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> Result<Edge> {
        let edge = self
            .graph
            .remove_edge(edge_id)
            .ok_or_else(|| GeoflowError::UnknownEdge(edge_id.to_string()))?;
        self.record();
        Ok(edge)
    }

    /// Empty nodes, edges and the Result Store
    pub fn clear(&mut self) {
        self.graph = Graph::new();
        self.store.clear();
        self.uploads.clear();
        self.artifacts.clear();
        self.emit(EngineEvent::GraphCleared);
        self.record();
    }

    /// Hand file bytes to a source node; replaces any earlier upload
    pub fn upload(
        &mut self,
        node_id: &str,
        file_name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<()> {
        if !self.graph.contains_node(node_id) {
            return Err(GeoflowError::UnknownNode(node_id.to_string()));
        }
        self.uploads
            .insert(node_id.to_string(), Upload::new(file_name, bytes));
        Ok(())
    }

    /// Copy of the graph with node states, for persistence
    pub fn graph_snapshot(&self) -> Graph {
        self.graph.clone()
    }

    /// Replace the graph after validating every node and edge
    ///
    /// Results, uploads and artifacts are cleared and every node starts
    /// `idle`. On error the current graph is left unchanged.
    pub fn load_graph(&mut self, graph: Graph) -> Result<()> {
        let mut loaded = Graph::new();
        let mut ids = HashSet::new();
        for mut node in graph.nodes {
            self.registry.descriptor_or_err(&node.operation_type)?;
            if !ids.insert(node.id.clone()) {
                return Err(GeoflowError::validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
            node.reset();
            loaded.nodes.push(node);
        }
        for edge in graph.edges {
            check_edge(&self.registry, &loaded, &edge)?;
            loaded.edges.push(edge);
        }

        log::info!(
            "loaded graph with {} nodes and {} edges",
            loaded.nodes.len(),
            loaded.edges.len()
        );
        self.graph = loaded;
        self.store.clear();
        self.uploads.clear();
        self.artifacts.clear();
        self.record();
        Ok(())
    }

    // -- undo/redo --

    pub fn can_undo(&self) -> bool {
        self.history.as_ref().is_some_and(GraphHistory::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.history.as_ref().is_some_and(GraphHistory::can_redo)
    }

    /// Restore the previous graph state; false when there is none
    pub fn undo(&mut self) -> Result<bool> {
        let restored = match self.history.as_mut().and_then(GraphHistory::undo) {
            Some(graph) => graph?,
            None => return Ok(false),
        };
        self.restore(restored);
        Ok(true)
    }

    /// Re-apply an undone graph state; false when there is none
    pub fn redo(&mut self) -> Result<bool> {
        let restored = match self.history.as_mut().and_then(GraphHistory::redo) {
            Some(graph) => graph?,
            None => return Ok(false),
        };
        self.restore(restored);
        Ok(true)
    }

    /// Swap in a snapshot, carrying over run state for nodes that survive
    fn restore(&mut self, mut graph: Graph) {
        let kept: HashSet<NodeId> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let removed: Vec<NodeId> = self
            .graph
            .nodes
            .iter()
            .filter(|n| !kept.contains(&n.id))
            .map(|n| n.id.clone())
            .collect();

        self.store.retain(|id| kept.contains(id));
        self.uploads.retain(|id, _| kept.contains(id));
        self.artifacts.retain(|id, _| kept.contains(id));

        let mut changed = Vec::new();
        for node in &mut graph.nodes {
            match self.graph.find_node(&node.id) {
                Some(current) => {
                    node.state = current.state;
                    node.error = current.error.clone();
                    node.preview = current.preview.clone();
                }
                None => {
                    node.reset();
                    if let Some(result) = self.store.get(&node.id) {
                        node.state = NodeState::Success;
                        node.preview = Some(NodePreview::of(&result));
                    }
                    changed.push(EngineEvent::state_changed(
                        &node.id,
                        node.state,
                        node.error.clone(),
                        node.preview.clone(),
                    ));
                }
            }
        }
        self.graph = graph;

        for node_id in removed {
            self.emit(EngineEvent::NodeRemoved { node_id });
        }
        for event in changed {
            self.emit(event);
        }
    }

    // -- execution --

    /// Run one node against the current Result Store
    ///
    /// On success the node's entry is replaced and the new collection is
    /// returned. On failure the node records the message, its previous entry
    /// is left untouched, and the error is returned.
    pub async fn run_node(&mut self, node_id: &str) -> Result<Arc<FeatureCollection>> {
        let node = self
            .graph
            .find_node(node_id)
            .cloned()
            .ok_or_else(|| GeoflowError::UnknownNode(node_id.to_string()))?;

        self.transition(node_id, NodeState::Running, None, None);
        log::debug!("running {} node {}", node.operation_type, node_id);

        match self.dispatch(&node).await {
            Ok(output) => {
                let collection = output.collection;
                self.store.insert(node_id, Arc::clone(&collection));
                if let Some(artifact) = output.artifact {
                    self.artifacts.insert(node_id.to_string(), artifact);
                }
                let preview = NodePreview::of(&collection);
                self.transition(node_id, NodeState::Success, None, Some(preview));
                Ok(collection)
            }
            Err(err) => {
                log::warn!("node {} ({}) failed: {}", node_id, node.operation_type, err);
                self.transition(node_id, NodeState::Error, Some(err.to_string()), None);
                Err(err)
            }
        }
    }

    /// Run every node in dependency order
    ///
    /// Failures are collected in the report; dependents of a failed node
    /// are still attempted. Only structural errors (a cycle) fail the call.
    pub async fn run_all(&mut self) -> Result<RunReport> {
        let order = resolver::resolve(&self.graph)?;
        self.run_sequence(order).await
    }

    /// Run a node after all of its transitive dependencies
    pub async fn run_with_dependencies(&mut self, node_id: &str) -> Result<RunReport> {
        let order = resolver::resolve_for(&self.graph, node_id)?;
        self.run_sequence(order).await
    }

    async fn run_sequence(&mut self, order: Vec<NodeId>) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        log::info!("run {} started with {} nodes", run_id, order.len());
        self.emit(EngineEvent::RunStarted {
            run_id: run_id.clone(),
            order: order.clone(),
        });

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (index, node_id) in order.iter().enumerate() {
            if index > 0 {
                if let Some(pacing) = self.config.pacing() {
                    tokio::time::sleep(pacing).await;
                }
            }
            match self.run_node(node_id).await {
                Ok(_) => succeeded.push(node_id.clone()),
                Err(err) => failed.push(NodeFailure {
                    node_id: node_id.clone(),
                    kind: err.kind(),
                    message: err.to_string(),
                }),
            }
        }

        log::info!(
            "run {} finished: {} succeeded, {} failed",
            run_id,
            succeeded.len(),
            failed.len()
        );
        self.emit(EngineEvent::RunFinished {
            run_id: run_id.clone(),
            succeeded: succeeded.clone(),
            failed: failed.clone(),
        });

        Ok(RunReport {
            run_id,
            order,
            succeeded,
            failed,
        })
    }

    async fn dispatch(&self, node: &Node) -> Result<OperationOutput> {
        let descriptor = self.registry.descriptor_or_err(&node.operation_type)?;
        let handler = self
            .registry
            .get_handler(&node.operation_type)
            .ok_or_else(|| GeoflowError::UnknownOperation(node.operation_type.clone()))?;

        let mut primary = None;
        let mut secondary = None;
        for port in &descriptor.inputs {
            let input = self
                .graph
                .input_binding(&node.id, &port.id)
                .and_then(|edge| self.store.get(&edge.source));
            match input {
                Some(collection) if port.id == ports::INPUT => primary = Some(collection),
                Some(collection) => secondary = secondary.or(Some(collection)),
                None if port.required => {
                    return Err(GeoflowError::MissingInput {
                        node_id: node.id.clone(),
                        port: port.id.clone(),
                    })
                }
                None => {}
            }
        }

        let request = OperationRequest {
            node_id: node.id.clone(),
            config: node.config.clone(),
            primary,
            secondary,
            upload: self.uploads.get(&node.id).cloned(),
        };
        handler.execute(request, &self.resources).await
    }

    fn transition(
        &mut self,
        node_id: &str,
        state: NodeState,
        error: Option<String>,
        preview: Option<NodePreview>,
    ) {
        if let Some(node) = self.graph.find_node_mut(node_id) {
            node.state = state;
            node.error = error.clone();
            if preview.is_some() {
                node.preview = preview.clone();
            }
        }
        self.emit(EngineEvent::state_changed(node_id, state, error, preview));
    }

    fn forget(&mut self, node_id: &str) {
        self.store.remove(node_id);
        self.uploads.remove(node_id);
        self.artifacts.remove(node_id);
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("engine event dropped: {e}");
        }
    }

    fn record(&mut self) {
        if let Some(history) = self.history.as_mut() {
            if let Err(e) = history.push(&self.graph) {
                log::warn!("undo snapshot skipped: {e}");
            }
        }
    }
}

/// Validate `edge` against `graph` before it is inserted
fn check_edge(registry: &OperationRegistry, graph: &Graph, edge: &Edge) -> Result<()> {
    let source = graph
        .find_node(&edge.source)
        .ok_or_else(|| GeoflowError::DanglingEdge {
            node_id: edge.source.clone(),
        })?;
    let target = graph
        .find_node(&edge.target)
        .ok_or_else(|| GeoflowError::DanglingEdge {
            node_id: edge.target.clone(),
        })?;

    let source_descriptor = registry.descriptor_or_err(&source.operation_type)?;
    if source_descriptor.output(&edge.source_port).is_none() {
        return Err(GeoflowError::InvalidPort {
            operation_type: source.operation_type.clone(),
            direction: PortDirection::Output,
            port: edge.source_port.clone(),
        });
    }
    let target_descriptor = registry.descriptor_or_err(&target.operation_type)?;
    if target_descriptor.input(&edge.target_port).is_none() {
        return Err(GeoflowError::InvalidPort {
            operation_type: target.operation_type.clone(),
            direction: PortDirection::Input,
            port: edge.target_port.clone(),
        });
    }

    if graph.input_binding(&edge.target, &edge.target_port).is_some() {
        return Err(GeoflowError::PortAlreadyBound {
            node_id: edge.target.clone(),
            port: edge.target_port.clone(),
        });
    }

    if edge.source == edge.target || graph.depends_on(&edge.source, &edge.target) {
        return Err(GeoflowError::CyclicGraph {
            node_id: edge.source.clone(),
        });
    }
    Ok(())
}
