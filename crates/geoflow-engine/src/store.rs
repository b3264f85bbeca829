//! Result Store: last successful output per node

use std::collections::HashMap;
use std::sync::Arc;

use geoflow_ops::FeatureCollection;

use crate::types::NodeId;

/// Keyed cache from node id to its last produced collection
///
/// Entries are replaced whole on success and never touched on failure.
/// Collections are shared through `Arc` so downstream nodes read them
/// without copying.
#[derive(Debug, Default, Clone)]
pub struct ResultStore {
    entries: HashMap<NodeId, Arc<FeatureCollection>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &str) -> Option<Arc<FeatureCollection>> {
        self.entries.get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.entries.contains_key(node_id)
    }

    /// Replace the entry for a node, returning the previous one
    pub fn insert(
        &mut self,
        node_id: impl Into<NodeId>,
        collection: Arc<FeatureCollection>,
    ) -> Option<Arc<FeatureCollection>> {
        self.entries.insert(node_id.into(), collection)
    }

    pub fn remove(&mut self, node_id: &str) -> Option<Arc<FeatureCollection>> {
        self.entries.remove(node_id)
    }

    /// Keep only the entries whose node id passes the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_whole_entry() {
        let mut store = ResultStore::new();
        assert!(store.insert("a", Arc::new(FeatureCollection::default())).is_none());
        let previous = store.insert("a", Arc::new(FeatureCollection::default()));
        assert!(previous.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_retain_prunes_entries() {
        let mut store = ResultStore::new();
        store.insert("a", Arc::new(FeatureCollection::default()));
        store.insert("b", Arc::new(FeatureCollection::default()));
        store.retain(|id| id == "b");
        assert!(!store.contains("a"));
        assert!(store.get("b").is_some());
    }
}
