//! Writing typed objects into a store.
//!
//! Mirrors the loader: **collect** the reachable objects per the follow
//! policy, **allocate** a node for each (reusing a set uri property,
//! otherwise a blank node where the policy and reference structure
//! permit, otherwise a fresh unique URI), then **store** each object's
//! type triple, properties, and parent/follows relationships.
//!
//! Replaced property values keep still-valid nodes and scrub orphaned
//! blank and list nodes; orphan detection asks whether the node is
//! still anything's match target, not a reference count.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tracing::debug;

use trellis_core::{Node, ObjectId, Store, Triple, Uri, Value};

use crate::arena::ObjectArena;
use crate::container::ContainerKind;
use crate::context::MappingContext;
use crate::descriptor::{is_object_ref, object_uri};
use crate::error::{MapperError, Result};
use crate::list;
use crate::maps::NodeObjectMap;
use crate::policy::{BlankNodePolicy, FollowPolicy, StorePolicy};

/// Writes objects (and what they reach) into a store.
pub struct ObjectStorer<'a> {
    cx: &'a MappingContext,
    follow: FollowPolicy,
    blank_policy: BlankNodePolicy,
    store_policy: StorePolicy,
}

struct StoreState {
    /// BFS discovery order; every object here gets stored.
    order: Vec<ObjectId>,
    /// Objects that must not receive blank nodes: requested roots and
    /// anything reached by more than one path.
    no_blanks: FxHashSet<ObjectId>,
}

impl<'a> ObjectStorer<'a> {
    pub fn new(cx: &'a MappingContext) -> Self {
        ObjectStorer {
            cx,
            follow: FollowPolicy::NOTHING,
            blank_policy: BlankNodePolicy::default(),
            store_policy: StorePolicy::default(),
        }
    }

    pub fn set_follow_policy(&mut self, follow: FollowPolicy) {
        self.follow = follow;
    }

    pub fn follow_policy(&self) -> FollowPolicy {
        self.follow
    }

    pub fn set_blank_node_policy(&mut self, policy: BlankNodePolicy) {
        self.blank_policy = policy;
    }

    pub fn blank_node_policy(&self) -> BlankNodePolicy {
        self.blank_policy
    }

    pub fn set_store_policy(&mut self, policy: StorePolicy) {
        self.store_policy = policy;
    }

    pub fn store_policy(&self) -> StorePolicy {
        self.store_policy
    }

    /// Store one object and everything the follow policy reaches from
    /// it. Returns the object's node, always a URI (requested objects
    /// never get blank nodes).
    pub fn store(
        &self,
        store: &mut dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        id: ObjectId,
    ) -> Result<Uri> {
        let mut uris = self.store_many(store, arena, map, std::slice::from_ref(&id))?;
        uris.pop()
            .ok_or_else(|| MapperError::InternalMappingInconsistency(format!(
                "stored object {id} received no node"
            )))
    }

    /// Store several objects and their reachable graphs. Returns their
    /// nodes in request order.
    pub fn store_many(
        &self,
        store: &mut dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        ids: &[ObjectId],
    ) -> Result<Vec<Uri>> {
        let state = self.collect(arena, ids);
        self.allocate(store, arena, map, &state)?;
        for &id in &state.order {
            self.store_one(store, arena, map, id)?;
        }

        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let node = map.node_for(id).cloned().ok_or_else(|| {
                MapperError::InternalMappingInconsistency(format!(
                    "stored object {id} missing from the node map"
                ))
            })?;
            match node {
                Node::Uri(u) => out.push(u),
                other => {
                    return Err(MapperError::InternalMappingInconsistency(format!(
                        "requested object {id} allocated non-URI node {other}"
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Phase 1: reachable objects and their reference multiplicity.
    fn collect(&self, arena: &ObjectArena, roots: &[ObjectId]) -> StoreState {
        let mut state = StoreState {
            order: Vec::new(),
            no_blanks: FxHashSet::default(),
        };
        let mut reached: FxHashSet<ObjectId> = FxHashSet::default();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();

        for &root in roots {
            if arena.contains(root) {
                state.no_blanks.insert(root);
                queue.push_back(root);
            }
        }

        while let Some(id) = queue.pop_front() {
            if !reached.insert(id) {
                // Reached again along another path: no blank node.
                state.no_blanks.insert(id);
                continue;
            }
            state.order.push(id);

            if self.follow.parent {
                if let Some(parent) = arena.parent(id) {
                    queue.push_back(parent);
                }
            }
            if self.follow.children {
                for &child in arena.children(id) {
                    queue.push_back(child);
                }
            }
            if self.follow.siblings {
                if let Some(parent) = arena.parent(id) {
                    let siblings = arena.children(parent);
                    if let Some(pos) = siblings.iter().position(|&c| c == id) {
                        if pos > 0 {
                            queue.push_back(siblings[pos - 1]);
                        }
                        if pos + 1 < siblings.len() {
                            queue.push_back(siblings[pos + 1]);
                        }
                    }
                }
            }
            if self.follow.object_properties {
                for target in self.referenced_objects(arena, id) {
                    queue.push_back(target);
                }
            }
        }
        state
    }

    fn referenced_objects(&self, arena: &ObjectArena, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let Some(obj) = arena.get(id) else {
            return out;
        };
        for prop in obj.descriptor().properties {
            if let Some(value) = (prop.get)(obj) {
                collect_object_ids(&value, &mut out);
            }
        }
        out
    }

    /// Phase 2: give every collected object a node.
    fn allocate(
        &self,
        store: &mut dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        state: &StoreState,
    ) -> Result<()> {
        for &id in &state.order {
            if map.node_for(id).is_some() {
                continue;
            }
            let Some(obj) = arena.get(id) else {
                continue;
            };
            if let Some(uri) = object_uri(obj) {
                map.insert(Node::Uri(uri), id)?;
                continue;
            }

            let blank_allowed = self.blank_policy == BlankNodePolicy::PermitBlankObjectNodes
                && !state.no_blanks.contains(&id);
            if blank_allowed {
                let node = store.add_blank_node()?;
                map.insert(node, id)?;
                continue;
            }

            let class = obj.class_name();
            let prefix = match self.cx.mapping.uri_prefix_for_class(class) {
                Some(p) => p.to_string(),
                None => {
                    let tail = class.rsplit("::").next().unwrap_or(class);
                    format!(":{}_", tail.to_lowercase())
                }
            };
            let uri = store.unique_uri(&prefix)?;
            if let Some(obj) = arena.get_mut(id) {
                crate::descriptor::set_property(obj, "uri", Value::Uri(uri.clone()));
            }
            map.insert(Node::Uri(uri), id)?;
        }
        Ok(())
    }

    /// Phase 3: type triple, relationships, properties for one object.
    fn store_one(
        &self,
        store: &mut dyn Store,
        arena: &mut ObjectArena,
        map: &NodeObjectMap,
        id: ObjectId,
    ) -> Result<()> {
        let Some(node) = map.node_for(id).cloned() else {
            return Ok(());
        };
        let Some(obj) = arena.get(id) else {
            return Ok(());
        };
        let class = obj.class_name();
        let descriptor = obj.descriptor();
        debug!(object = %id, node = %node, class, "storing object");

        // Type triple, replacing any other type.
        let type_uri = Node::Uri(self.cx.mapping.type_uri_for_class(class));
        self.replace_property_nodes(
            store,
            &node,
            &Node::Uri(Uri::rdf_type()),
            std::slice::from_ref(&type_uri),
        )?;

        // Parent and sibling-order relationships, kept only while the
        // related object is itself mapped.
        let parent_node = arena.parent(id).and_then(|p| map.node_for(p).cloned());
        self.replace_relationship(
            store,
            &node,
            &Node::Uri(self.cx.mapping.parent_predicate()),
            parent_node,
        )?;
        let follows_node = arena
            .previous_sibling(id)
            .and_then(|p| map.node_for(p).cloned());
        self.replace_relationship(
            store,
            &node,
            &Node::Uri(self.cx.mapping.follows_predicate()),
            follows_node,
        )?;

        // Properties.
        let defaults = match self.store_policy {
            StorePolicy::IfChanged => self.cx.objects.build(class).ok(),
            StorePolicy::Always => None,
        };
        for prop in descriptor.properties {
            if prop.name == "uri" {
                continue;
            }
            let Some(value) = arena.get(id).and_then(|o| (prop.get)(o)) else {
                continue;
            };
            let predicate = Node::Uri(self.cx.mapping.predicate_for_property(class, prop.name));

            if let Some(default_obj) = defaults.as_deref() {
                if (prop.get)(default_obj) == Some(value.clone()) {
                    // Unchanged from default: drop any stored value.
                    self.replace_property_nodes(store, &node, &predicate, &[])?;
                    continue;
                }
            }

            let container = self.cx.containers.spec(prop.type_name).cloned();
            let object_nodes: Vec<Node> = if is_object_ref(prop.type_name) {
                match value {
                    Value::Object(target) => match map.node_for(target) {
                        Some(n) => vec![n.clone()],
                        None => {
                            debug!(
                                object = %id,
                                property = prop.name,
                                "referenced object has no node, skipping property"
                            );
                            continue;
                        }
                    },
                    Value::Nothing => Vec::new(),
                    other => {
                        debug!(
                            object = %id,
                            property = prop.name,
                            value = %other,
                            "reference property holds a non-reference, skipping"
                        );
                        continue;
                    }
                }
            } else if let Some(spec) = container {
                let items = match &value {
                    Value::List(items) => items.as_slice(),
                    Value::Nothing => &[],
                    single => std::slice::from_ref(single),
                };
                let mut element_nodes = Vec::with_capacity(items.len());
                for item in items {
                    match self.element_node(map, &spec.element_type_name, item) {
                        Some(n) => element_nodes.push(n),
                        None => debug!(
                            object = %id,
                            property = prop.name,
                            "container element not encodable, skipping element"
                        ),
                    }
                }
                match spec.kind {
                    ContainerKind::Set => element_nodes,
                    ContainerKind::Sequence => {
                        vec![self.write_list(store, element_nodes)?]
                    }
                }
            } else {
                match Node::from_value(&value, &self.cx.datatypes) {
                    Ok(Node::Nothing) => Vec::new(),
                    Ok(n) => vec![n],
                    Err(e) => {
                        debug!(
                            object = %id,
                            property = prop.name,
                            error = %e,
                            "property value not encodable, skipping"
                        );
                        continue;
                    }
                }
            };

            self.replace_property_nodes(store, &node, &predicate, &object_nodes)?;
        }
        Ok(())
    }

    fn element_node(
        &self,
        map: &NodeObjectMap,
        element_type_name: &str,
        item: &Value,
    ) -> Option<Node> {
        if is_object_ref(element_type_name) {
            let id = item.as_object()?;
            return map.node_for(id).cloned();
        }
        Node::from_value(item, &self.cx.datatypes).ok()
    }

    /// Write an RDF list of the given element nodes, returning the head
    /// (`rdf:nil` for an empty list). Cells are blank nodes unless the
    /// policy forbids all blanks.
    fn write_list(&self, store: &mut dyn Store, elements: Vec<Node>) -> Result<Node> {
        let mut head = list::nil_node();
        for element in elements.into_iter().rev() {
            let cell = match self.blank_policy {
                BlankNodePolicy::NeverUseBlankNodes => {
                    Node::Uri(store.unique_uri(":listnode_")?)
                }
                _ => store.add_blank_node()?,
            };
            store.add(&Triple::new(
                cell.clone(),
                list::first_predicate(),
                element,
            ))?;
            store.add(&Triple::new(cell.clone(), list::rest_predicate(), head))?;
            head = cell;
        }
        Ok(head)
    }

    /// Replace the single-valued relationship triple, or remove it when
    /// the target is gone.
    fn replace_relationship(
        &self,
        store: &mut dyn Store,
        node: &Node,
        predicate: &Node,
        target: Option<Node>,
    ) -> Result<()> {
        let targets: Vec<Node> = target.into_iter().collect();
        self.replace_property_nodes(store, node, predicate, &targets)
    }

    /// Make `(node, predicate, *)` hold exactly the given objects,
    /// keeping triples that already match and scrubbing auxiliary nodes
    /// orphaned by the removals.
    fn replace_property_nodes(
        &self,
        store: &mut dyn Store,
        node: &Node,
        predicate: &Node,
        objects: &[Node],
    ) -> Result<()> {
        let existing = store.match_pattern(&Triple::new(
            node.clone(),
            predicate.clone(),
            Node::Nothing,
        ))?;
        let wanted: FxHashSet<&Node> = objects.iter().collect();
        let mut scrub = Vec::new();
        for t in &existing {
            if !wanted.contains(&t.object) {
                store.remove(t)?;
                scrub.push(t.object.clone());
            }
        }
        for object in objects {
            store.add(&Triple::new(node.clone(), predicate.clone(), object.clone()))?;
        }
        for orphan in scrub {
            scrub_orphan(store, &orphan)?;
        }
        Ok(())
    }

    /// Delete an object's node from the store: its outgoing triples,
    /// plus any blank or list nodes it referenced that nothing else
    /// still points at, recursing down list tails.
    pub fn remove_object(&self, store: &mut dyn Store, node: &Node) -> Result<()> {
        let outgoing =
            store.match_pattern(&Triple::new(node.clone(), Node::Nothing, Node::Nothing))?;
        for t in &outgoing {
            store.remove(t)?;
        }
        for t in outgoing {
            scrub_orphan(store, &t.object)?;
        }
        Ok(())
    }
}

/// Remove an auxiliary (blank or list) node nothing points at any more,
/// recursing into what it pointed at in turn.
fn scrub_orphan(store: &mut dyn Store, node: &Node) -> Result<()> {
    let auxiliary = node.is_blank() || list::is_list_node(store, node)?;
    if !auxiliary {
        return Ok(());
    }
    if store
        .match_once(&Triple::new(Node::Nothing, Node::Nothing, node.clone()))?
        .is_some()
    {
        return Ok(());
    }
    let outgoing = store.match_pattern(&Triple::new(node.clone(), Node::Nothing, Node::Nothing))?;
    for t in &outgoing {
        store.remove(t)?;
    }
    for t in outgoing {
        scrub_orphan(store, &t.object)?;
    }
    Ok(())
}

fn collect_object_ids(value: &Value, out: &mut Vec<ObjectId>) {
    match value {
        Value::Object(id) => out.push(*id),
        Value::List(items) => {
            for item in items {
                collect_object_ids(item, out);
            }
        }
        _ => {}
    }
}
