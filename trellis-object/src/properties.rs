//! Per-node property access without a live object.
//!
//! `NodeProperties` is a thin facade for reading and writing one node's
//! mapped properties directly against a store - useful for inspecting
//! or patching stored objects without loading them. Scalar values round
//! trip through the datatype registry; repeated triples read back as a
//! `Value::List`.

use trellis_core::{Node, Store, Triple, Value};

use crate::context::MappingContext;
use crate::error::Result;

/// Property-level view of one node in a store.
pub struct NodeProperties<'a> {
    cx: &'a MappingContext,
    class_name: String,
    node: Node,
}

impl<'a> NodeProperties<'a> {
    /// View `node` as an instance of `class_name` for predicate
    /// resolution.
    pub fn new(cx: &'a MappingContext, class_name: impl Into<String>, node: Node) -> Self {
        NodeProperties {
            cx,
            class_name: class_name.into(),
            node,
        }
    }

    /// The node under view.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Names of the properties this node has stored values for,
    /// resolved through the type mapping. Predicates that resolve to no
    /// property name (relationships, foreign vocabulary) are omitted.
    pub fn property_names(&self, store: &dyn Store) -> Result<Vec<String>> {
        let triples = store.match_pattern(&Triple::new(
            self.node.clone(),
            Node::Nothing,
            Node::Nothing,
        ))?;
        let mut names = Vec::new();
        for t in triples {
            let Some(pred) = t.predicate.as_uri() else {
                continue;
            };
            if let Some(name) = self
                .cx
                .mapping
                .property_for_predicate(&self.class_name, pred)
            {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// True when the node stores a value for the property.
    pub fn has(&self, store: &dyn Store, name: &str) -> Result<bool> {
        let predicate = self
            .cx
            .mapping
            .predicate_for_property(&self.class_name, name);
        Ok(store
            .match_once(&Triple::new(
                self.node.clone(),
                Node::Uri(predicate),
                Node::Nothing,
            ))?
            .is_some())
    }

    /// Read a property. `Value::Nothing` when absent; a list when the
    /// predicate is repeated.
    pub fn get(&self, store: &dyn Store, name: &str) -> Result<Value> {
        let predicate = self
            .cx
            .mapping
            .predicate_for_property(&self.class_name, name);
        let mut triples = store.match_pattern(&Triple::new(
            self.node.clone(),
            Node::Uri(predicate),
            Node::Nothing,
        ))?;
        Ok(match triples.len() {
            0 => Value::Nothing,
            1 => triples.remove(0).object.to_value(&self.cx.datatypes),
            _ => Value::List(
                triples
                    .into_iter()
                    .map(|t| t.object.to_value(&self.cx.datatypes))
                    .collect(),
            ),
        })
    }

    /// Write a property, replacing any stored values. A list value
    /// becomes repeated triples; `Value::Nothing` just removes.
    pub fn set(&self, store: &mut dyn Store, name: &str, value: &Value) -> Result<()> {
        let predicate = self
            .cx
            .mapping
            .predicate_for_property(&self.class_name, name);
        store.remove(&Triple::new(
            self.node.clone(),
            Node::Uri(predicate.clone()),
            Node::Nothing,
        ))?;
        let values: &[Value] = match value {
            Value::Nothing => &[],
            Value::List(items) => items,
            single => std::slice::from_ref(single),
        };
        for v in values {
            let object = Node::from_value(v, &self.cx.datatypes)?;
            store.add(&Triple::new(
                self.node.clone(),
                Node::Uri(predicate.clone()),
                object,
            ))?;
        }
        Ok(())
    }

    /// Remove a property's stored values. `Ok(false)` when none were
    /// stored.
    pub fn remove(&self, store: &mut dyn Store, name: &str) -> Result<bool> {
        let predicate = self
            .cx
            .mapping
            .predicate_for_property(&self.class_name, name);
        Ok(store.remove(&Triple::new(
            self.node.clone(),
            Node::Uri(predicate),
            Node::Nothing,
        ))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{MemoryStore, Uri};

    fn setup() -> (MappingContext, MemoryStore, Node) {
        let cx = MappingContext::new();
        let store = MemoryStore::new();
        let node = Node::Uri(Uri::new("http://example.com/w1").unwrap());
        (cx, store, node)
    }

    #[test]
    fn set_get_remove_round_trip() {
        let (cx, mut store, node) = setup();
        let props = NodeProperties::new(&cx, "test::Widget", node);

        props
            .set(&mut store, "label", &Value::String("knob".into()))
            .unwrap();
        props.set(&mut store, "size", &Value::Long(3)).unwrap();

        assert!(props.has(&store, "label").unwrap());
        assert_eq!(
            props.get(&store, "label").unwrap(),
            Value::String("knob".into())
        );
        assert_eq!(props.get(&store, "size").unwrap(), Value::Long(3));

        let mut names = props.property_names(&store).unwrap();
        names.sort();
        assert_eq!(names, ["label", "size"]);

        assert!(props.remove(&mut store, "label").unwrap());
        assert!(!props.has(&store, "label").unwrap());
        assert_eq!(props.get(&store, "label").unwrap(), Value::Nothing);
        assert!(!props.remove(&mut store, "label").unwrap());
    }

    #[test]
    fn repeated_values_read_back_as_a_list() {
        let (cx, mut store, node) = setup();
        let props = NodeProperties::new(&cx, "test::Widget", node);
        props
            .set(
                &mut store,
                "tags",
                &Value::List(vec![Value::String("a".into()), Value::String("b".into())]),
            )
            .unwrap();
        match props.get(&store, "tags").unwrap() {
            Value::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other}"),
        }
    }
}
