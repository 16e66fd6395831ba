//! Keeping a live object population and a transactional store in step.
//!
//! The mapper owns the arena, the node/object map, and a [`Connection`]
//! to the store, all behind one mutex. Work flows both ways:
//!
//! - Objects marked dirty (or added) are written out on
//!   [`ObjectMapper::commit`] through the storer and committed as one
//!   transaction. The `in_commit` guard keeps the mapper's own commit
//!   notification from being mistaken for an external change.
//! - An external `transaction_committed` notification is mapped back to
//!   the managed objects whose node - directly, or via an associated
//!   list cell - appears in the change set, and exactly those objects
//!   are reloaded. The `in_reload` guard keeps reload-driven mutation
//!   reports from registering as new user edits.
//!
//! Lock order is always mapper state, then store; never the reverse.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_core::{ChangeSet, Node, ObjectId, Store, Triple, Uri};
use trellis_transact::{CommitListener, Connection, TransactionalStore};

use crate::arena::ObjectArena;
use crate::container::ContainerKind;
use crate::context::MappingContext;
use crate::descriptor::{object_uri, Mapped};
use crate::error::{MapperError, Result};
use crate::list;
use crate::loader::ObjectLoader;
use crate::maps::NodeObjectMap;
use crate::policy::{AbsentPropertyPolicy, BlankNodePolicy, FollowPolicy, StorePolicy};
use crate::storer::ObjectStorer;

struct MapperState {
    connection: Connection,
    arena: ObjectArena,
    map: NodeObjectMap,
    /// List cell -> node of the object whose sequence property the cell
    /// belongs to. Lets a change set touching only a list tail find its
    /// object.
    list_nodes: FxHashMap<Node, Node>,
    dirty: FxHashSet<ObjectId>,
    deleted_nodes: Vec<Node>,
    follow: FollowPolicy,
    absent: AbsentPropertyPolicy,
    blank_policy: BlankNodePolicy,
    store_policy: StorePolicy,
}

/// Bidirectional synchronizer between objects and one transactional
/// store.
pub struct ObjectMapper {
    cx: Arc<MappingContext>,
    state: Mutex<MapperState>,
    in_commit: AtomicBool,
    in_reload: AtomicBool,
}

impl ObjectMapper {
    /// Create a mapper on the store and register it for commit
    /// notifications.
    pub fn new(store: Arc<TransactionalStore>, cx: Arc<MappingContext>) -> Arc<Self> {
        let mapper = Arc::new(ObjectMapper {
            cx,
            state: Mutex::new(MapperState {
                connection: Connection::new(Arc::clone(&store)),
                arena: ObjectArena::new(),
                map: NodeObjectMap::new(),
                list_nodes: FxHashMap::default(),
                dirty: FxHashSet::default(),
                deleted_nodes: Vec::new(),
                follow: FollowPolicy::default(),
                absent: AbsentPropertyPolicy::default(),
                blank_policy: BlankNodePolicy::default(),
                store_policy: StorePolicy::default(),
            }),
            in_commit: AtomicBool::new(false),
            in_reload: AtomicBool::new(false),
        });
        store.add_listener(&mapper);
        mapper
    }

    fn lock_state(&self) -> MutexGuard<'_, MapperState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_follow_policy(&self, follow: FollowPolicy) {
        self.lock_state().follow = follow;
    }

    pub fn set_absent_property_policy(&self, absent: AbsentPropertyPolicy) {
        self.lock_state().absent = absent;
    }

    pub fn set_blank_node_policy(&self, policy: BlankNodePolicy) {
        self.lock_state().blank_policy = policy;
    }

    pub fn set_store_policy(&self, policy: StorePolicy) {
        self.lock_state().store_policy = policy;
    }

    /// Track a new object. It is stored (and given a node) on the next
    /// commit.
    pub fn add(&self, object: Box<dyn Mapped>) -> ObjectId {
        let mut st = self.lock_state();
        let id = st.arena.insert(object);
        st.dirty.insert(id);
        id
    }

    /// Track a new object as the last child of `parent`.
    pub fn add_with_parent(&self, object: Box<dyn Mapped>, parent: ObjectId) -> ObjectId {
        let mut st = self.lock_state();
        let id = st.arena.insert_with_parent(object, parent);
        st.dirty.insert(id);
        id
    }

    /// Track an object that already corresponds to stored state. Its
    /// uri property identifies the node; nothing is marked dirty.
    pub fn manage(&self, object: Box<dyn Mapped>) -> Result<ObjectId> {
        let uri = object_uri(object.as_ref())
            .ok_or_else(|| MapperError::NoUri(object.class_name().to_string()))?;
        let mut st = self.lock_state();
        let id = st.arena.insert(object);
        if let Err(e) = st.map.insert(Node::Uri(uri), id) {
            st.arena.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Stop tracking an object's node association. The object stays in
    /// the arena; its stored state is left alone.
    pub fn unmanage(&self, id: ObjectId) {
        let mut st = self.lock_state();
        st.map.remove_object(id);
        st.dirty.remove(&id);
    }

    /// Remove an object (and its children). Their nodes are deleted
    /// from the store on the next commit. Returns every removed id.
    pub fn delete_object(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut st = self.lock_state();
        let removed = st.arena.remove(id);
        for &rid in &removed {
            st.dirty.remove(&rid);
            if let Some(node) = st.map.remove_object(rid) {
                st.deleted_nodes.push(node);
            }
        }
        removed
    }

    /// Mark an object dirty for the next commit. Reload-driven changes
    /// are ignored.
    pub fn object_modified(&self, id: ObjectId) {
        if self.in_reload.load(Ordering::SeqCst) {
            return;
        }
        let mut st = self.lock_state();
        if st.arena.contains(id) {
            st.dirty.insert(id);
        }
    }

    /// Read an object under the mapper's lock.
    pub fn with_object<T: Mapped, R>(&self, id: ObjectId, f: impl FnOnce(&T) -> R) -> Option<R> {
        let st = self.lock_state();
        st.arena.get_as::<T>(id).map(f)
    }

    /// Mutate an object under the mapper's lock, marking it dirty.
    pub fn with_object_mut<T: Mapped, R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let mut st = self.lock_state();
        let result = st.arena.get_mut_as::<T>(id).map(f);
        if result.is_some() && !self.in_reload.load(Ordering::SeqCst) {
            st.dirty.insert(id);
        }
        result
    }

    /// The node mapped to an object, if any.
    pub fn node_for(&self, id: ObjectId) -> Option<Node> {
        self.lock_state().map.node_for(id).cloned()
    }

    /// The object mapped to a node, if any.
    pub fn object_for(&self, node: &Node) -> Option<ObjectId> {
        self.lock_state().map.object_for(node)
    }

    /// Number of live objects in the arena.
    pub fn object_count(&self) -> usize {
        self.lock_state().arena.len()
    }

    /// Load the object for a stored node into management.
    pub fn load(&self, node: &Node) -> Result<ObjectId> {
        let mut guard = self.lock_state();
        let st = &mut *guard;
        let mut loader = ObjectLoader::new(&self.cx);
        loader.set_follow_policy(st.follow);
        loader.set_absent_property_policy(st.absent);
        let MapperState {
            connection,
            arena,
            map,
            list_nodes,
            ..
        } = st;
        let id = loader.load(&*connection, arena, map, node)?;
        associate_list_nodes(&self.cx, &*connection, arena, map, list_nodes, node)?;
        Ok(id)
    }

    /// Load every object of one type into management.
    pub fn load_type(&self, type_uri: &Uri) -> Result<Vec<ObjectId>> {
        let mut guard = self.lock_state();
        let st = &mut *guard;
        let mut loader = ObjectLoader::new(&self.cx);
        loader.set_follow_policy(st.follow);
        loader.set_absent_property_policy(st.absent);
        let MapperState {
            connection,
            arena,
            map,
            list_nodes,
            ..
        } = st;
        let ids = loader.load_type(&*connection, arena, map, type_uri)?;
        for id in &ids {
            if let Some(node) = map.node_for(*id).cloned() {
                associate_list_nodes(&self.cx, &*connection, arena, map, list_nodes, &node)?;
            }
        }
        Ok(ids)
    }

    /// Store dirty objects, delete removed ones, and commit, returning
    /// the committed change set.
    pub fn commit_and_obtain(&self) -> Result<ChangeSet> {
        self.in_commit.store(true, Ordering::SeqCst);
        let result = self.commit_inner();
        self.in_commit.store(false, Ordering::SeqCst);
        result
    }

    /// Store dirty objects, delete removed ones, and commit.
    pub fn commit(&self) -> Result<()> {
        self.commit_and_obtain().map(|_| ())
    }

    fn commit_inner(&self) -> Result<ChangeSet> {
        let mut guard = self.lock_state();
        let st = &mut *guard;

        let mut storer = ObjectStorer::new(&self.cx);
        storer.set_follow_policy(st.follow);
        storer.set_blank_node_policy(st.blank_policy);
        storer.set_store_policy(st.store_policy);

        let MapperState {
            connection,
            arena,
            map,
            list_nodes,
            dirty,
            deleted_nodes,
            ..
        } = st;

        for node in deleted_nodes.iter() {
            storer.remove_object(connection, node)?;
            list_nodes.retain(|_, owner| owner != node);
        }

        let mut stored: Vec<ObjectId> = dirty.iter().copied().collect();
        stored.retain(|id| arena.contains(*id));
        for &id in &stored {
            storer.store(connection, arena, map, id)?;
        }
        for &id in &stored {
            if let Some(node) = map.node_for(id).cloned() {
                associate_list_nodes(&self.cx, &*connection, arena, map, list_nodes, &node)?;
            }
        }

        let changes = connection.commit_and_obtain()?;
        deleted_nodes.clear();
        dirty.clear();
        Ok(changes)
    }

    fn reload_affected(&self, changes: &ChangeSet) -> Result<()> {
        let mut guard = self.lock_state();
        let st = &mut *guard;

        let mut affected: Vec<Node> = Vec::new();
        let mut seen: FxHashSet<Node> = FxHashSet::default();
        for change in changes {
            let subject = &change.triple.subject;
            let owner = if st.map.contains_node(subject) {
                Some(subject.clone())
            } else {
                st.list_nodes.get(subject).cloned()
            };
            if let Some(node) = owner {
                if seen.insert(node.clone()) {
                    affected.push(node);
                }
            }
        }
        if affected.is_empty() {
            return Ok(());
        }

        let mut loader = ObjectLoader::new(&self.cx);
        loader.set_follow_policy(st.follow);
        loader.set_absent_property_policy(st.absent);

        let MapperState {
            connection,
            arena,
            map,
            list_nodes,
            dirty,
            ..
        } = st;
        let report = loader.reload(&*connection, arena, map, &affected)?;
        for deleted in &report.deleted {
            dirty.remove(deleted);
        }
        list_nodes.retain(|_, owner| map.contains_node(owner));
        for node in affected.iter().chain(report.loaded.iter().map(|(n, _)| n)) {
            if map.contains_node(node) {
                associate_list_nodes(&self.cx, &*connection, arena, map, list_nodes, node)?;
            }
        }
        Ok(())
    }
}

impl CommitListener for ObjectMapper {
    fn transaction_committed(&self, changes: &ChangeSet) {
        if self.in_commit.load(Ordering::SeqCst) {
            // Our own commit; the arena is already the source of truth.
            return;
        }
        self.in_reload.store(true, Ordering::SeqCst);
        if let Err(e) = self.reload_affected(changes) {
            warn!(error = %e, "reload after external commit failed");
        }
        self.in_reload.store(false, Ordering::SeqCst);
    }
}

/// Record which list cells belong to the node's sequence-typed
/// properties, so tail edits can be traced back to the object.
fn associate_list_nodes(
    cx: &MappingContext,
    store: &Connection,
    arena: &ObjectArena,
    map: &NodeObjectMap,
    list_nodes: &mut FxHashMap<Node, Node>,
    node: &Node,
) -> Result<()> {
    let Some(id) = map.object_for(node) else {
        return Ok(());
    };
    let Some(descriptor) = arena.get(id).map(|o| o.descriptor()) else {
        return Ok(());
    };
    let class = descriptor.class_name;
    let store: &dyn Store = store;
    for prop in descriptor.properties {
        let Some(spec) = cx.containers.spec(prop.type_name) else {
            continue;
        };
        if spec.kind != ContainerKind::Sequence {
            continue;
        }
        let predicate = cx.mapping.predicate_for_property(class, prop.name);
        let Some(head) = store
            .match_once(&Triple::new(
                node.clone(),
                Node::Uri(predicate),
                Node::Nothing,
            ))?
            .map(|t| t.object)
        else {
            continue;
        };
        for (cell, _) in list::walk_cells(store, &head)? {
            list_nodes.insert(cell, node.clone());
        }
    }
    Ok(())
}
