//! The bidirectional node/object map.
//!
//! One structure holds both directions so they cannot drift. A node
//! maps to at most one live object and vice versa; an insert that would
//! violate that raises `InternalMappingInconsistency`, which callers
//! treat as a logic fault rather than a recoverable condition.

use rustc_hash::FxHashMap;

use trellis_core::{Node, ObjectId};

use crate::error::{MapperError, Result};

/// Bidirectional map between store nodes and arena object ids.
#[derive(Default)]
pub struct NodeObjectMap {
    by_node: FxHashMap<Node, ObjectId>,
    by_object: FxHashMap<ObjectId, Node>,
}

impl NodeObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a node with an object. Re-inserting an existing pair
    /// is a no-op; associating either side with a different partner is
    /// an inconsistency.
    pub fn insert(&mut self, node: Node, id: ObjectId) -> Result<()> {
        match self.by_node.get(&node) {
            Some(existing) if *existing != id => {
                return Err(MapperError::InternalMappingInconsistency(format!(
                    "node {node} already mapped to object {existing}, refusing {id}"
                )));
            }
            _ => {}
        }
        match self.by_object.get(&id) {
            Some(existing) if *existing != node => {
                return Err(MapperError::InternalMappingInconsistency(format!(
                    "object {id} already mapped to node {existing}, refusing {node}"
                )));
            }
            _ => {}
        }
        self.by_node.insert(node.clone(), id);
        self.by_object.insert(id, node);
        Ok(())
    }

    /// The object mapped to a node, if any.
    pub fn object_for(&self, node: &Node) -> Option<ObjectId> {
        self.by_node.get(node).copied()
    }

    /// The node mapped to an object, if any.
    pub fn node_for(&self, id: ObjectId) -> Option<&Node> {
        self.by_object.get(&id)
    }

    pub fn contains_node(&self, node: &Node) -> bool {
        self.by_node.contains_key(node)
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.by_object.contains_key(&id)
    }

    /// Remove by node, clearing both directions.
    pub fn remove_node(&mut self, node: &Node) -> Option<ObjectId> {
        let id = self.by_node.remove(node)?;
        self.by_object.remove(&id);
        Some(id)
    }

    /// Remove by object, clearing both directions.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Node> {
        let node = self.by_object.remove(&id)?;
        self.by_node.remove(&node);
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// All mapped (node, object) pairs, in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = (&Node, ObjectId)> {
        self.by_node.iter().map(|(n, id)| (n, *id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Uri;

    fn node(s: &str) -> Node {
        Node::Uri(Uri::new(s).unwrap())
    }

    #[test]
    fn both_directions_stay_in_step() {
        let mut m = NodeObjectMap::new();
        let id = ObjectId::new(0, 1);
        m.insert(node("http://e/a"), id).unwrap();
        assert_eq!(m.object_for(&node("http://e/a")), Some(id));
        assert_eq!(m.node_for(id), Some(&node("http://e/a")));

        m.remove_object(id);
        assert!(m.is_empty());
        assert_eq!(m.object_for(&node("http://e/a")), None);
    }

    #[test]
    fn conflicting_inserts_are_inconsistencies() {
        let mut m = NodeObjectMap::new();
        let a = ObjectId::new(0, 1);
        let b = ObjectId::new(1, 1);
        m.insert(node("http://e/a"), a).unwrap();

        // Same pair again: fine.
        m.insert(node("http://e/a"), a).unwrap();

        assert!(matches!(
            m.insert(node("http://e/a"), b),
            Err(MapperError::InternalMappingInconsistency(_))
        ));
        assert!(matches!(
            m.insert(node("http://e/b"), a),
            Err(MapperError::InternalMappingInconsistency(_))
        ));
    }
}
