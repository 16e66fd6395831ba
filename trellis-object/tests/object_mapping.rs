//! Storer/loader behaviour: round trips, blank node scoping, policies,
//! and orphan cleanup.

use trellis_core::{MemoryStore, Node, ObjectId, Store, Triple, Uri};
use trellis_object::{
    mapped_class, AbsentPropertyPolicy, BlankNodePolicy, ContainerKind, FollowPolicy,
    MapperError, MappingContext, NodeObjectMap, ObjectArena, ObjectLoader, ObjectStorer,
    StorePolicy,
};

mapped_class! {
    /// Address-book fixture.
    pub struct Person: "app::Person" {
        uri: Uri,
        name: String,
        age: i64,
        scores: Vec<i64>,
        nicknames: Vec<String>,
        friend: Option<ObjectId>,
    }
}

mapped_class! {
    pub struct TreeNode: "app::TreeNode" {
        uri: Uri,
        label: String,
    }
}

fn context() -> MappingContext {
    let mut cx = MappingContext::new();
    cx.objects.register::<Person>();
    cx.objects.register::<TreeNode>();
    cx.containers
        .register("Vec<i64>", "i64", ContainerKind::Sequence);
    cx.containers
        .register("Vec<String>", "String", ContainerKind::Set);
    cx
}

fn uri(s: &str) -> Uri {
    Uri::new(s).unwrap()
}

fn person(u: &str, name: &str, age: i64) -> Box<Person> {
    Box::new(Person {
        uri: uri(u),
        name: name.into(),
        age,
        ..Person::default()
    })
}

#[test]
fn stored_objects_load_back_with_identical_properties() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let alice = Person {
        uri: uri("http://example.com/alice"),
        name: "Alice".into(),
        age: 30,
        scores: vec![7, 3, 9],
        nicknames: vec!["Al".into(), "Ally".into()],
        friend: None,
    };
    let id = arena.insert(Box::new(alice.clone()));

    let storer = ObjectStorer::new(&cx);
    let node_uri = storer.store(&mut store, &mut arena, &mut map, id).unwrap();
    assert_eq!(node_uri, alice.uri);

    // Load into a fresh population.
    let mut arena2 = ObjectArena::new();
    let mut map2 = NodeObjectMap::new();
    let loader = ObjectLoader::new(&cx);
    let id2 = loader
        .load(&store, &mut arena2, &mut map2, &Node::Uri(alice.uri.clone()))
        .unwrap();

    let loaded = arena2.get_as::<Person>(id2).unwrap();
    assert_eq!(loaded.name, alice.name);
    assert_eq!(loaded.age, alice.age);
    assert_eq!(loaded.scores, alice.scores);
    let mut nicknames = loaded.nicknames.clone();
    nicknames.sort();
    assert_eq!(nicknames, ["Al", "Ally"]);
    assert_eq!(loaded.uri, alice.uri);
}

#[test]
fn object_references_round_trip_through_the_store() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let carol = arena.insert(person("http://example.com/carol", "Carol", 41));
    let mut alice = person("http://example.com/alice", "Alice", 30);
    alice.friend = Some(carol);
    let alice = arena.insert(alice);

    let mut storer = ObjectStorer::new(&cx);
    storer.set_follow_policy(FollowPolicy::OBJECT_PROPERTIES);
    storer.store(&mut store, &mut arena, &mut map, alice).unwrap();

    let mut arena2 = ObjectArena::new();
    let mut map2 = NodeObjectMap::new();
    let loader = ObjectLoader::new(&cx);
    let alice2 = loader
        .load(
            &store,
            &mut arena2,
            &mut map2,
            &Node::Uri(uri("http://example.com/alice")),
        )
        .unwrap();

    let friend_id = arena2.get_as::<Person>(alice2).unwrap().friend.unwrap();
    let friend = arena2.get_as::<Person>(friend_id).unwrap();
    assert_eq!(friend.name, "Carol");
    assert_eq!(friend.uri, uri("http://example.com/carol"));
}

#[test]
fn multiply_referenced_objects_never_get_blank_nodes() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    // Carol has no uri of her own and is referenced by both roots.
    let carol = arena.insert(Box::new(Person {
        name: "Carol".into(),
        ..Person::default()
    }));
    let mut a = person("http://example.com/a", "A", 1);
    a.friend = Some(carol);
    let mut b = person("http://example.com/b", "B", 2);
    b.friend = Some(carol);
    let a = arena.insert(a);
    let b = arena.insert(b);

    let mut storer = ObjectStorer::new(&cx);
    storer.set_follow_policy(FollowPolicy::OBJECT_PROPERTIES);
    storer
        .store_many(&mut store, &mut arena, &mut map, &[a, b])
        .unwrap();

    let carol_node = map.node_for(carol).unwrap();
    assert!(carol_node.is_uri(), "doubly-referenced object got {carol_node}");
}

#[test]
fn singly_referenced_objects_may_get_blank_nodes() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let carol = arena.insert(Box::new(Person {
        name: "Carol".into(),
        ..Person::default()
    }));
    let mut a = person("http://example.com/a", "A", 1);
    a.friend = Some(carol);
    let a = arena.insert(a);

    let mut storer = ObjectStorer::new(&cx);
    storer.set_follow_policy(FollowPolicy::OBJECT_PROPERTIES);
    storer.store(&mut store, &mut arena, &mut map, a).unwrap();
    assert!(map.node_for(carol).unwrap().is_blank());

    // Under NoBlankObjectNodes the same shape gets a URI.
    let mut store = MemoryStore::new();
    store.set_base_uri(uri("http://example.com/base/"));
    let mut map = NodeObjectMap::new();
    let carol2 = arena.insert(Box::new(Person {
        name: "Carol2".into(),
        ..Person::default()
    }));
    let mut c = person("http://example.com/c", "C", 3);
    c.friend = Some(carol2);
    let c = arena.insert(c);
    storer.set_blank_node_policy(BlankNodePolicy::NoBlankObjectNodes);
    storer.store(&mut store, &mut arena, &mut map, c).unwrap();
    let carol2_node = map.node_for(carol2).unwrap();
    assert!(carol2_node.is_uri());
    // The allocated URI is written back into the object.
    assert!(!arena.get_as::<Person>(carol2).unwrap().uri.is_empty());
}

#[test]
fn store_if_changed_skips_default_values() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    // Age stays at the default.
    let id = arena.insert(person("http://example.com/alice", "Alice", 0));
    let mut storer = ObjectStorer::new(&cx);
    storer.set_store_policy(StorePolicy::IfChanged);
    storer.store(&mut store, &mut arena, &mut map, id).unwrap();

    let node = Node::Uri(uri("http://example.com/alice"));
    let age_pred = Node::Uri(cx.mapping.predicate_for_property("app::Person", "age"));
    let name_pred = Node::Uri(cx.mapping.predicate_for_property("app::Person", "name"));
    assert!(store
        .match_pattern(&Triple::new(node.clone(), age_pred.clone(), Node::Nothing))
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .match_pattern(&Triple::new(node.clone(), name_pred.clone(), Node::Nothing))
            .unwrap()
            .len(),
        1
    );

    // Resetting the name to default removes its triple on re-store.
    arena.get_mut_as::<Person>(id).unwrap().name = String::new();
    storer.store(&mut store, &mut arena, &mut map, id).unwrap();
    assert!(store
        .match_pattern(&Triple::new(node, name_pred, Node::Nothing))
        .unwrap()
        .is_empty());
}

#[test]
fn absent_properties_reset_or_stay_per_policy() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let id = arena.insert(person("http://example.com/alice", "Alice", 30));
    let storer = ObjectStorer::new(&cx);
    storer.store(&mut store, &mut arena, &mut map, id).unwrap();

    // The age triple disappears behind the object's back.
    let node = Node::Uri(uri("http://example.com/alice"));
    let age_pred = Node::Uri(cx.mapping.predicate_for_property("app::Person", "age"));
    store
        .remove(&Triple::new(node.clone(), age_pred, Node::Nothing))
        .unwrap();

    // Ignore: the stale in-memory value survives the reload.
    let loader = ObjectLoader::new(&cx);
    loader
        .reload(&store, &mut arena, &mut map, std::slice::from_ref(&node))
        .unwrap();
    assert_eq!(arena.get_as::<Person>(id).unwrap().age, 30);

    // Reset: back to the default-constructed value.
    let mut loader = ObjectLoader::new(&cx);
    loader.set_absent_property_policy(AbsentPropertyPolicy::Reset);
    loader
        .reload(&store, &mut arena, &mut map, std::slice::from_ref(&node))
        .unwrap();
    assert_eq!(arena.get_as::<Person>(id).unwrap().age, 0);
}

#[test]
fn remove_object_scrubs_orphaned_list_cells() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let id = arena.insert(Box::new(Person {
        uri: uri("http://example.com/alice"),
        name: "Alice".into(),
        scores: vec![1, 2, 3],
        ..Person::default()
    }));
    let storer = ObjectStorer::new(&cx);
    storer.store(&mut store, &mut arena, &mut map, id).unwrap();
    assert!(store.len() > 4, "expected list cells in the store");

    storer
        .remove_object(&mut store, &Node::Uri(uri("http://example.com/alice")))
        .unwrap();
    assert!(
        store.is_empty(),
        "orphaned cells left behind: {:?}",
        store.triples()
    );
}

#[test]
fn tree_structure_round_trips_in_order() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let root = arena.insert(Box::new(TreeNode {
        uri: uri("http://example.com/root"),
        label: "root".into(),
    }));
    for label in ["first", "second", "third"] {
        arena.insert_with_parent(
            Box::new(TreeNode {
                uri: uri(&format!("http://example.com/{label}")),
                label: label.into(),
            }),
            root,
        );
    }

    let mut storer = ObjectStorer::new(&cx);
    storer.set_follow_policy(FollowPolicy {
        children: true,
        siblings: true,
        parent: false,
        object_properties: false,
    });
    storer.store(&mut store, &mut arena, &mut map, root).unwrap();

    let mut arena2 = ObjectArena::new();
    let mut map2 = NodeObjectMap::new();
    let mut loader = ObjectLoader::new(&cx);
    loader.set_follow_policy(FollowPolicy::ALL);
    let root2 = loader
        .load(
            &store,
            &mut arena2,
            &mut map2,
            &Node::Uri(uri("http://example.com/root")),
        )
        .unwrap();

    let labels: Vec<String> = arena2
        .children(root2)
        .iter()
        .map(|&c| arena2.get_as::<TreeNode>(c).unwrap().label.clone())
        .collect();
    assert_eq!(labels, ["first", "second", "third"]);
    for &child in arena2.children(root2) {
        assert_eq!(arena2.parent(child), Some(root2));
    }
}

#[test]
fn unknown_types_error_on_single_load_and_skip_on_bulk_load() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    // A typed node whose type maps to no registered class.
    let stranger = Node::Uri(uri("http://example.com/stranger"));
    store
        .add(&Triple::new(
            stranger.clone(),
            Node::Uri(Uri::rdf_type()),
            Node::Uri(uri("http://elsewhere.example.com/Alien")),
        ))
        .unwrap();
    let storer = ObjectStorer::new(&cx);
    let known = arena.insert(person("http://example.com/alice", "Alice", 30));
    storer.store(&mut store, &mut arena, &mut map, known).unwrap();

    let loader = ObjectLoader::new(&cx);
    let mut arena2 = ObjectArena::new();
    let mut map2 = NodeObjectMap::new();
    assert!(matches!(
        loader.load(&store, &mut arena2, &mut map2, &stranger),
        Err(MapperError::UnknownType(_))
    ));

    let all = loader.load_all(&store, &mut arena2, &mut map2).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(
        arena2.get_as::<Person>(all[0]).unwrap().name,
        "Alice"
    );
}

#[test]
fn vanished_nodes_delete_their_objects_on_reload() {
    let cx = context();
    let mut store = MemoryStore::new();
    let mut arena = ObjectArena::new();
    let mut map = NodeObjectMap::new();

    let id = arena.insert(person("http://example.com/alice", "Alice", 30));
    let storer = ObjectStorer::new(&cx);
    storer.store(&mut store, &mut arena, &mut map, id).unwrap();

    let node = Node::Uri(uri("http://example.com/alice"));
    store
        .remove(&Triple::new(node.clone(), Node::Nothing, Node::Nothing))
        .unwrap();

    let loader = ObjectLoader::new(&cx);
    let report = loader
        .reload(&store, &mut arena, &mut map, std::slice::from_ref(&node))
        .unwrap();
    assert_eq!(report.deleted, vec![id]);
    assert!(!arena.contains(id));
    assert!(map.object_for(&node).is_none());
}
