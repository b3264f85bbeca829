//! Event types for streaming engine progress
//!
//! Events are sent from the engine to the UI (or any consumer) to report
//! node state transitions and run boundaries.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ErrorKind;
use crate::types::{NodeId, NodePreview, NodeState};

/// Trait for sending engine events
///
/// This abstracts over the transport mechanism (mpsc channel, IPC bridge,
/// test collector) so the engine does not depend on any UI runtime.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: EngineEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// One failed node in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub node_id: NodeId,
    pub kind: ErrorKind,
    pub message: String,
}

/// Events emitted while editing or running a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A node entered a new lifecycle state
    #[serde(rename_all = "camelCase")]
    NodeStateChanged {
        node_id: NodeId,
        state: NodeState,
        error: Option<String>,
        preview: Option<NodePreview>,
    },

    /// `run_all` resolved its order and is about to start
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: String, order: Vec<NodeId> },

    /// `run_all` attempted every node
    #[serde(rename_all = "camelCase")]
    RunFinished {
        run_id: String,
        succeeded: Vec<NodeId>,
        failed: Vec<NodeFailure>,
    },

    /// A node and its edges were removed
    #[serde(rename_all = "camelCase")]
    NodeRemoved { node_id: NodeId },

    /// Nodes, edges and results were cleared
    GraphCleared,
}

impl EngineEvent {
    /// Create a state change event
    pub fn state_changed(
        node_id: &str,
        state: NodeState,
        error: Option<String>,
        preview: Option<NodePreview>,
    ) -> Self {
        Self::NodeStateChanged {
            node_id: node_id.to_string(),
            state,
            error,
            preview,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EngineEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.lock().clone()
    }

    /// States a node went through, in order
    pub fn states_of(&self, node_id: &str) -> Vec<NodeState> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::NodeStateChanged {
                    node_id: id, state, ..
                } if id == node_id => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.lock().push(event);
        Ok(())
    }
}

/// Forwards events into an unbounded tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.sender
            .send(event)
            .map_err(|_| EventError::channel_closed())
    }
}
