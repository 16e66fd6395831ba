//! Loading typed objects out of a store.
//!
//! A load request runs six phases over a load state:
//!
//! 1. **Collect** - breadth-first traversal from the requested nodes per
//!    the follow policy, deciding what must exist. Mapped nodes whose
//!    `rdf:type` has vanished from the store get their objects deleted.
//! 2. **Allocate** - construct objects for unmapped nodes, parents
//!    before children and followees before followers, so a constructor
//!    can rely on its parent existing.
//! 3. **Initialise** - assign data properties only. Literal state exists
//!    before any relationship-following code runs.
//! 4. **Immediate callbacks** - per-object observers, before references
//!    resolve.
//! 5. **Populate** - assign object-reference and container properties,
//!    allocating referenced objects not yet built.
//! 6. **Final callbacks** - once the requested subgraph is consistent.
//!
//! Property-level mismatches (undecodable literal, unmapped reference)
//! are logged and skipped; one malformed property never aborts loading
//! a graph.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use trellis_core::{Node, ObjectId, Store, Triple, Uri, Value};

use crate::arena::ObjectArena;
use crate::context::MappingContext;
use crate::descriptor::{is_object_ref, Mapped, PropertyDescriptor};
use crate::error::{MapperError, Result};
use crate::list;
use crate::maps::NodeObjectMap;
use crate::policy::{AbsentPropertyPolicy, FollowPolicy};

/// Observer invoked per loaded object.
pub type LoadCallback = Box<dyn Fn(&mut ObjectArena, &Node, ObjectId) + Send>;

/// What a load/reload did: objects now live for their nodes, and
/// objects deleted because their nodes left the store.
#[derive(Default)]
pub struct ReloadReport {
    pub loaded: Vec<(Node, ObjectId)>,
    pub deleted: Vec<ObjectId>,
}

/// Builds and refreshes typed objects from store contents.
pub struct ObjectLoader<'a> {
    cx: &'a MappingContext,
    follow: FollowPolicy,
    absent: AbsentPropertyPolicy,
    immediate_callbacks: Vec<LoadCallback>,
    final_callbacks: Vec<LoadCallback>,
}

struct LoadState {
    to_allocate: Vec<Node>,
    to_populate: Vec<Node>,
    skipped: FxHashSet<Node>,
    report: ReloadReport,
}

impl<'a> ObjectLoader<'a> {
    pub fn new(cx: &'a MappingContext) -> Self {
        ObjectLoader {
            cx,
            follow: FollowPolicy::default(),
            absent: AbsentPropertyPolicy::default(),
            immediate_callbacks: Vec::new(),
            final_callbacks: Vec::new(),
        }
    }

    pub fn set_follow_policy(&mut self, follow: FollowPolicy) {
        self.follow = follow;
    }

    pub fn follow_policy(&self) -> FollowPolicy {
        self.follow
    }

    pub fn set_absent_property_policy(&mut self, absent: AbsentPropertyPolicy) {
        self.absent = absent;
    }

    pub fn absent_property_policy(&self) -> AbsentPropertyPolicy {
        self.absent
    }

    /// Register an observer fired after initialise, before references
    /// resolve.
    pub fn add_immediate_callback(&mut self, cb: LoadCallback) {
        self.immediate_callbacks.push(cb);
    }

    /// Register an observer fired once the whole load is consistent.
    pub fn add_final_callback(&mut self, cb: LoadCallback) {
        self.final_callbacks.push(cb);
    }

    /// Load the object for one node. Unknown types are an error here;
    /// use [`ObjectLoader::reload`] or the type-wide loads for lenient
    /// behaviour.
    pub fn load(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        node: &Node,
    ) -> Result<ObjectId> {
        self.load_nodes(store, arena, map, std::slice::from_ref(node), false)?;
        map.object_for(node)
            .ok_or_else(|| MapperError::UnknownType(format!("no loadable object at {node}")))
    }

    /// Load or refresh the objects for the given nodes, deleting objects
    /// whose nodes have left the store. Unknown types are skipped.
    pub fn reload(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        nodes: &[Node],
    ) -> Result<ReloadReport> {
        self.load_nodes(store, arena, map, nodes, true)
    }

    /// Load every object of one `rdf:type`. Unknown-type subjects are
    /// skipped.
    pub fn load_type(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        type_uri: &Uri,
    ) -> Result<Vec<ObjectId>> {
        let subjects: Vec<Node> = store
            .match_pattern(&Triple::new(
                Node::Nothing,
                Node::Uri(Uri::rdf_type()),
                Node::Uri(type_uri.clone()),
            ))?
            .into_iter()
            .map(|t| t.subject)
            .collect();
        self.load_nodes(store, arena, map, &subjects, true)?;
        Ok(subjects.iter().filter_map(|n| map.object_for(n)).collect())
    }

    /// Load every typed object in the store. Unknown types are skipped.
    pub fn load_all(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
    ) -> Result<Vec<ObjectId>> {
        let mut subjects = Vec::new();
        let mut seen = FxHashSet::default();
        for t in store.match_pattern(&Triple::new(
            Node::Nothing,
            Node::Uri(Uri::rdf_type()),
            Node::Nothing,
        ))? {
            if seen.insert(t.subject.clone()) {
                subjects.push(t.subject);
            }
        }
        self.load_nodes(store, arena, map, &subjects, true)?;
        Ok(subjects.iter().filter_map(|n| map.object_for(n)).collect())
    }

    fn load_nodes(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        requested: &[Node],
        ignore_unknown: bool,
    ) -> Result<ReloadReport> {
        let mut state = LoadState {
            to_allocate: Vec::new(),
            to_populate: Vec::new(),
            skipped: FxHashSet::default(),
            report: ReloadReport::default(),
        };

        self.collect(store, arena, map, requested, &mut state)?;
        self.allocate(store, arena, map, ignore_unknown, &mut state)?;

        for node in &state.to_populate {
            if state.skipped.contains(node) {
                continue;
            }
            self.assign_data_properties(store, arena, map, node)?;
        }

        for (node, id) in state.report.loaded.clone() {
            for cb in &self.immediate_callbacks {
                cb(arena, &node, id);
            }
        }

        self.populate(store, arena, map, &mut state)?;

        for (node, id) in state.report.loaded.clone() {
            for cb in &self.final_callbacks {
                cb(arena, &node, id);
            }
        }

        Ok(state.report)
    }

    fn has_type(&self, store: &dyn Store, node: &Node) -> Result<bool> {
        Ok(store
            .match_once(&Triple::new(
                node.clone(),
                Node::Uri(Uri::rdf_type()),
                Node::Nothing,
            ))?
            .is_some())
    }

    /// Phase 1: decide what must exist. Never constructs objects.
    fn collect(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        requested: &[Node],
        state: &mut LoadState,
    ) -> Result<()> {
        let parent_pred = Node::Uri(self.cx.mapping.parent_predicate());
        let follows_pred = Node::Uri(self.cx.mapping.follows_predicate());

        let mut visited: FxHashSet<Node> = FxHashSet::default();
        let mut queue: VecDeque<Node> = requested
            .iter()
            .filter(|n| n.is_uri() || n.is_blank())
            .cloned()
            .collect();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node.clone()) {
                continue;
            }

            if !self.has_type(store, &node)? {
                // The node left the store: its object, with descendants,
                // goes too.
                if let Some(id) = map.object_for(&node) {
                    debug!(node = %node, "node no longer typed, deleting object");
                    for removed in arena.remove(id) {
                        map.remove_object(removed);
                        state.report.deleted.push(removed);
                    }
                }
                continue;
            }

            if map.object_for(&node).is_none() {
                state.to_allocate.push(node.clone());
            }
            state.to_populate.push(node.clone());

            if self.follow.parent {
                if let Some(t) =
                    store.match_once(&Triple::new(node.clone(), parent_pred.clone(), Node::Nothing))?
                {
                    queue.push_back(t.object);
                }
            }
            if self.follow.children {
                for t in store.match_pattern(&Triple::new(
                    Node::Nothing,
                    parent_pred.clone(),
                    node.clone(),
                ))? {
                    queue.push_back(t.subject);
                }
            }
            if self.follow.siblings {
                if let Some(t) = store.match_once(&Triple::new(
                    node.clone(),
                    follows_pred.clone(),
                    Node::Nothing,
                ))? {
                    queue.push_back(t.object);
                }
                for t in store.match_pattern(&Triple::new(
                    Node::Nothing,
                    follows_pred.clone(),
                    node.clone(),
                ))? {
                    queue.push_back(t.subject);
                }
            }
            if self.follow.object_properties {
                for target in self.referenced_nodes(store, &node)? {
                    queue.push_back(target);
                }
            }
        }
        Ok(())
    }

    /// Nodes referenced by a node's property triples, with list heads
    /// expanded to their elements.
    fn referenced_nodes(&self, store: &dyn Store, node: &Node) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        let class_hint = self.class_of(store, node)?;
        for t in store.match_pattern(&Triple::new(node.clone(), Node::Nothing, Node::Nothing))? {
            let Some(pred) = t.predicate.as_uri() else {
                continue;
            };
            let Some(class) = class_hint.as_deref() else {
                continue;
            };
            if self.cx.mapping.property_for_predicate(class, pred).is_none() {
                continue;
            }
            let object = t.object;
            if !(object.is_uri() || object.is_blank()) {
                continue;
            }
            if list::is_list_node(store, &object)? {
                for value in list::walk_values(store, &object)? {
                    if value.is_uri() || value.is_blank() {
                        out.push(value);
                    }
                }
            } else {
                out.push(object);
            }
        }
        Ok(out)
    }

    fn class_of(&self, store: &dyn Store, node: &Node) -> Result<Option<String>> {
        let type_node = store.complete(&Triple::new(
            node.clone(),
            Node::Uri(Uri::rdf_type()),
            Node::Nothing,
        ))?;
        let Some(type_uri) = type_node.as_uri() else {
            return Ok(None);
        };
        Ok(self.cx.mapping.class_for_type_uri(type_uri).ok())
    }

    /// Phase 2: construct objects, parents before children, followees
    /// before followers.
    fn allocate(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        ignore_unknown: bool,
        state: &mut LoadState,
    ) -> Result<()> {
        let parent_pred = Node::Uri(self.cx.mapping.parent_predicate());
        let follows_pred = Node::Uri(self.cx.mapping.follows_predicate());

        // Precompute each pending node's ordering dependencies.
        let pending: FxHashSet<Node> = state.to_allocate.iter().cloned().collect();
        let mut deps: FxHashMap<Node, Vec<Node>> = FxHashMap::default();
        for node in &state.to_allocate {
            let mut node_deps = Vec::new();
            for pred in [&parent_pred, &follows_pred] {
                if let Some(t) =
                    store.match_once(&Triple::new(node.clone(), pred.clone(), Node::Nothing))?
                {
                    if pending.contains(&t.object) {
                        node_deps.push(t.object);
                    }
                }
            }
            deps.insert(node.clone(), node_deps);
        }

        let mut remaining: Vec<Node> = state.to_allocate.clone();
        let mut placed: FxHashSet<Node> = FxHashSet::default();
        while !remaining.is_empty() {
            let ready: Vec<Node> = remaining
                .iter()
                .filter(|n| {
                    deps.get(*n)
                        .map_or(true, |d| d.iter().all(|dep| placed.contains(dep)))
                })
                .cloned()
                .collect();
            // A dependency cycle: allocate the rest in discovery order.
            let batch = if ready.is_empty() {
                std::mem::take(&mut remaining)
            } else {
                remaining.retain(|n| !ready.contains(n));
                ready
            };
            for node in batch {
                placed.insert(node.clone());
                self.allocate_node(store, arena, map, &node, ignore_unknown, state)?;
            }
        }
        Ok(())
    }

    /// Construct one object for a typed node and map it. `Ok(None)`
    /// when the type is unknown and `ignore_unknown` permits skipping.
    fn allocate_node(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        node: &Node,
        ignore_unknown: bool,
        state: &mut LoadState,
    ) -> Result<Option<ObjectId>> {
        let type_node = store.complete(&Triple::new(
            node.clone(),
            Node::Uri(Uri::rdf_type()),
            Node::Nothing,
        ))?;
        let class = type_node
            .as_uri()
            .ok_or_else(|| MapperError::UnknownType(format!("untyped node {node}")))
            .and_then(|u| self.cx.mapping.class_for_type_uri(u));
        let class = match class {
            Ok(c) if self.cx.objects.knows(&c) => c,
            Ok(c) => {
                if ignore_unknown {
                    debug!(node = %node, class = %c, "no factory for class, skipping");
                    state.skipped.insert(node.clone());
                    return Ok(None);
                }
                return Err(MapperError::UnknownType(c));
            }
            Err(e) => {
                if ignore_unknown {
                    debug!(node = %node, "unknown type, skipping");
                    state.skipped.insert(node.clone());
                    return Ok(None);
                }
                return Err(e);
            }
        };

        let object = self.cx.objects.build(&class)?;
        let parent_id = self.stored_parent(store, node)?.and_then(|p| map.object_for(&p));
        let id = match parent_id {
            Some(parent) => arena.insert_with_parent(object, parent),
            None => arena.insert(object),
        };
        map.insert(node.clone(), id)?;

        if let Node::Uri(u) = node {
            if let Some(obj) = arena.get_mut(id) {
                crate::descriptor::set_property(obj, "uri", Value::Uri(u.clone()));
            }
        }
        state.report.loaded.push((node.clone(), id));
        Ok(Some(id))
    }

    fn stored_parent(&self, store: &dyn Store, node: &Node) -> Result<Option<Node>> {
        Ok(store
            .match_once(&Triple::new(
                node.clone(),
                Node::Uri(self.cx.mapping.parent_predicate()),
                Node::Nothing,
            ))?
            .map(|t| t.object))
    }

    /// Phase 3: data properties only - no object references, no
    /// containers.
    fn assign_data_properties(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &NodeObjectMap,
        node: &Node,
    ) -> Result<()> {
        let Some(id) = map.object_for(node) else {
            return Ok(());
        };
        let Some(descriptor) = arena.get(id).map(|o| o.descriptor()) else {
            return Ok(());
        };
        let class = descriptor.class_name;
        let mut defaults: Option<Box<dyn Mapped>> = None;

        for prop in descriptor.properties {
            if prop.name == "uri"
                || is_object_ref(prop.type_name)
                || self.cx.containers.knows(prop.type_name)
            {
                continue;
            }
            let predicate = self.cx.mapping.predicate_for_property(class, prop.name);
            let triples = store.match_pattern(&Triple::new(
                node.clone(),
                Node::Uri(predicate),
                Node::Nothing,
            ))?;
            match triples.first() {
                None => self.apply_absent(arena, id, class, prop, &mut defaults),
                Some(t) => {
                    self.set_converted(arena, id, node, prop, &t.object);
                }
            }
        }
        Ok(())
    }

    fn apply_absent(
        &self,
        arena: &mut ObjectArena,
        id: ObjectId,
        class: &str,
        prop: &PropertyDescriptor,
        defaults: &mut Option<Box<dyn Mapped>>,
    ) {
        if self.absent != AbsentPropertyPolicy::Reset {
            return;
        }
        if defaults.is_none() {
            *defaults = self.cx.objects.build(class).ok();
        }
        let Some(default_obj) = defaults.as_deref() else {
            return;
        };
        if let Some(value) = (prop.get)(default_obj) {
            if let Some(obj) = arena.get_mut(id) {
                (prop.set)(obj, value);
            }
        }
    }

    /// Convert a node to the property's value and assign it; first by
    /// the node's own datatype, then coerced to the property type.
    fn set_converted(
        &self,
        arena: &mut ObjectArena,
        id: ObjectId,
        node: &Node,
        prop: &PropertyDescriptor,
        object_node: &Node,
    ) {
        let Some(obj) = arena.get_mut(id) else {
            return;
        };
        let value = object_node.to_value(&self.cx.datatypes);
        if (prop.set)(obj, value) {
            return;
        }
        if let Some(coerced) = object_node.to_value_as(prop.type_name, &self.cx.datatypes) {
            if (prop.set)(obj, coerced) {
                return;
            }
        }
        debug!(
            node = %node,
            property = prop.name,
            expected = prop.type_name,
            "stored value does not fit property, skipping"
        );
    }

    /// Phase 5: reference and container properties, allocating
    /// referenced objects not yet built.
    fn populate(
        &self,
        store: &dyn Store,
        arena: &mut ObjectArena,
        map: &mut NodeObjectMap,
        state: &mut LoadState,
    ) -> Result<()> {
        let mut queue: VecDeque<Node> = state
            .to_populate
            .iter()
            .filter(|n| !state.skipped.contains(*n))
            .cloned()
            .collect();
        let mut done: FxHashSet<Node> = FxHashSet::default();

        while let Some(node) = queue.pop_front() {
            if !done.insert(node.clone()) {
                continue;
            }
            let Some(id) = map.object_for(&node) else {
                continue;
            };
            let Some(descriptor) = arena.get(id).map(|o| o.descriptor()) else {
                continue;
            };
            let class = descriptor.class_name;
            let mut defaults: Option<Box<dyn Mapped>> = None;

            for prop in descriptor.properties {
                let is_ref = is_object_ref(prop.type_name);
                let container = self.cx.containers.spec(prop.type_name).cloned();
                if prop.name == "uri" || (!is_ref && container.is_none()) {
                    continue;
                }
                let predicate = self.cx.mapping.predicate_for_property(class, prop.name);
                let triples = store.match_pattern(&Triple::new(
                    node.clone(),
                    Node::Uri(predicate),
                    Node::Nothing,
                ))?;
                if triples.is_empty() {
                    self.apply_absent(arena, id, class, prop, &mut defaults);
                    continue;
                }

                // Targets first, so references resolve below.
                let targets: Vec<Node> = if is_ref {
                    triples.iter().map(|t| t.object.clone()).collect()
                } else {
                    match container.as_ref().map(|c| c.kind) {
                        Some(crate::container::ContainerKind::Sequence) => {
                            list::walk_values(store, &triples[0].object)?
                        }
                        _ => triples.iter().map(|t| t.object.clone()).collect(),
                    }
                };
                let element_is_ref = is_ref
                    || container
                        .as_ref()
                        .is_some_and(|c| is_object_ref(&c.element_type_name));
                if element_is_ref && self.follow.object_properties {
                    for target in &targets {
                        if (target.is_uri() || target.is_blank())
                            && map.object_for(target).is_none()
                            && self.has_type(store, target)?
                        {
                            if let Some(new_id) = self
                                .allocate_node(store, arena, map, target, true, state)?
                            {
                                self.assign_data_properties(store, arena, map, target)?;
                                for cb in &self.immediate_callbacks {
                                    cb(arena, target, new_id);
                                }
                                queue.push_back(target.clone());
                            }
                        }
                    }
                }

                let value = if is_ref {
                    match targets.first().and_then(|t| map.object_for(t)) {
                        Some(target_id) => Value::Object(target_id),
                        None => {
                            debug!(
                                node = %node,
                                property = prop.name,
                                "reference target not loadable, skipping"
                            );
                            continue;
                        }
                    }
                } else {
                    let elem_ty = container
                        .as_ref()
                        .map(|c| c.element_type_name.clone())
                        .unwrap_or_default();
                    let mut items = Vec::with_capacity(targets.len());
                    for target in &targets {
                        if is_object_ref(&elem_ty) {
                            match map.object_for(target) {
                                Some(tid) => items.push(Value::Object(tid)),
                                None => debug!(
                                    node = %node,
                                    property = prop.name,
                                    element = %target,
                                    "list element not loadable, skipping element"
                                ),
                            }
                        } else {
                            let v = target
                                .to_value_as(&elem_ty, &self.cx.datatypes)
                                .unwrap_or_else(|| target.to_value(&self.cx.datatypes));
                            items.push(v);
                        }
                    }
                    Value::List(items)
                };

                if let Some(obj) = arena.get_mut(id) {
                    if !(prop.set)(obj, value) {
                        debug!(
                            node = %node,
                            property = prop.name,
                            "reference value does not fit property, skipping"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
