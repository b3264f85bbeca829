//! Undo/redo history of graph edits
//!
//! Every successful mutation pushes a zstd-compressed JSON snapshot of the
//! graph's structure and configuration. Run state is not part of a snapshot;
//! it is re-derived from the Result Store when a snapshot is restored.

use std::collections::VecDeque;

use crate::error::{GeoflowError, Result};
use crate::types::Graph;

/// Compression level for snapshots
const ZSTD_LEVEL: i32 = 3;

/// Undo/redo stack using compressed snapshots
pub struct GraphHistory {
    /// Compressed graph states (zstd)
    snapshots: VecDeque<Vec<u8>>,
    /// Current position in the stack
    current: usize,
    /// Maximum number of snapshots to keep
    max_snapshots: usize,
}

impl GraphHistory {
    /// Create a history keeping at most `max_snapshots` states
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            current: 0,
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Record a new state, discarding any redo history
    pub fn push(&mut self, graph: &Graph) -> Result<()> {
        let mut structure = graph.clone();
        structure.nodes.iter_mut().for_each(|n| n.reset());

        let json = serde_json::to_vec(&structure)?;
        let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)
            .map_err(|e| GeoflowError::Compression(e.to_string()))?;

        self.snapshots.truncate(self.current + 1);
        self.snapshots.push_back(compressed);
        self.current = self.snapshots.len() - 1;

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
            self.current = self.current.saturating_sub(1);
        }
        Ok(())
    }

    /// Step back one state; `None` at the oldest state
    pub fn undo(&mut self) -> Option<Result<Graph>> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        Some(self.decompress(self.current))
    }

    /// Step forward one state; `None` at the newest state
    pub fn redo(&mut self) -> Option<Result<Graph>> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        Some(self.decompress(self.current))
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn decompress(&self, index: usize) -> Result<Graph> {
        let compressed = self
            .snapshots
            .get(index)
            .ok_or_else(|| GeoflowError::Compression(format!("no snapshot at {index}")))?;
        let json = zstd::decode_all(&compressed[..])
            .map_err(|e| GeoflowError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}
