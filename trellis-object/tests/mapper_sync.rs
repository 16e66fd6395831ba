//! Mapper behaviour: commit of dirty objects, selective reload on
//! external commits, list-node tracking, and deletion in both
//! directions.

use std::sync::Arc;

use trellis_core::{MemoryStore, Node, Triple, Uri};
use trellis_object::{mapped_class, ContainerKind, MappingContext, ObjectMapper};
use trellis_transact::{DirectWriteBehaviour, TransactionalStore};

mapped_class! {
    pub struct Track: "app::Track" {
        uri: Uri,
        title: String,
        plays: i64,
        tags: Vec<String>,
    }
}

fn init_diagnostics() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn context() -> Arc<MappingContext> {
    let mut cx = MappingContext::new();
    cx.objects.register::<Track>();
    cx.containers
        .register("Vec<String>", "String", ContainerKind::Sequence);
    Arc::new(cx)
}

fn store() -> Arc<TransactionalStore> {
    Arc::new(TransactionalStore::new(
        Box::new(MemoryStore::new()),
        DirectWriteBehaviour::AutoTransaction,
    ))
}

fn uri(s: &str) -> Uri {
    Uri::new(s).unwrap()
}

fn track(u: &str, title: &str) -> Box<Track> {
    Box::new(Track {
        uri: uri(u),
        title: title.into(),
        ..Track::default()
    })
}

#[test]
fn commit_stores_dirty_objects_once() {
    init_diagnostics();
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx.clone());

    let id = mapper.add(track("http://example.com/t1", "One"));
    let changes = mapper.commit_and_obtain().unwrap();
    assert!(!changes.is_empty());

    let node = Node::Uri(uri("http://example.com/t1"));
    let title_pred = Node::Uri(cx.mapping.predicate_for_property("app::Track", "title"));
    assert!(ts
        .contains(&Triple::new(
            node.clone(),
            title_pred,
            Node::literal("One")
        ))
        .unwrap());

    // Nothing dirty any more: the next commit is empty.
    assert!(mapper.commit_and_obtain().unwrap().is_empty());
    assert_eq!(mapper.node_for(id), Some(node));
}

#[test]
fn external_commits_reload_exactly_the_affected_objects() {
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx.clone());

    let one = mapper.add(track("http://example.com/t1", "One"));
    let two = mapper.add(track("http://example.com/t2", "Two"));
    mapper.commit().unwrap();

    // A foreign transaction renames t1 behind the mapper's back.
    let node = Node::Uri(uri("http://example.com/t1"));
    let title_pred = Node::Uri(cx.mapping.predicate_for_property("app::Track", "title"));
    let mut tx = ts.start_transaction().unwrap();
    tx.remove(&Triple::new(node.clone(), title_pred.clone(), Node::Nothing))
        .unwrap();
    tx.add(&Triple::new(node, title_pred, Node::literal("Uno")))
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(
        mapper.with_object::<Track, _>(one, |t| t.title.clone()).unwrap(),
        "Uno"
    );
    assert_eq!(
        mapper.with_object::<Track, _>(two, |t| t.title.clone()).unwrap(),
        "Two"
    );
    // The reload did not mark anything dirty.
    assert!(mapper.commit_and_obtain().unwrap().is_empty());
}

#[test]
fn own_commits_do_not_bounce_back_as_reloads() {
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx);

    let id = mapper.add(track("http://example.com/t1", "One"));
    mapper.commit().unwrap();

    // Mutate and commit again: the in-memory value must survive (a
    // misfired self-reload would overwrite it with stale store state
    // mid-commit).
    mapper
        .with_object_mut::<Track, _>(id, |t| t.plays = 10)
        .unwrap();
    mapper.commit().unwrap();
    assert_eq!(
        mapper.with_object::<Track, _>(id, |t| t.plays).unwrap(),
        10
    );
}

#[test]
fn list_tail_edits_find_their_object() {
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx.clone());

    let id = mapper.add(Box::new(Track {
        uri: uri("http://example.com/t1"),
        title: "One".into(),
        tags: vec!["rock".into(), "live".into()],
        ..Track::default()
    }));
    mapper.commit().unwrap();

    // Find the second list cell and swap its value, in a transaction
    // that never touches the track's own node.
    let first_pred = Node::Uri(uri(trellis_vocab::rdf::FIRST));
    let cell = ts
        .match_pattern(&Triple::new(
            Node::Nothing,
            first_pred.clone(),
            Node::literal("live"),
        ))
        .unwrap()
        .remove(0)
        .subject;
    let mut tx = ts.start_transaction().unwrap();
    tx.remove(&Triple::new(cell.clone(), first_pred.clone(), Node::Nothing))
        .unwrap();
    tx.add(&Triple::new(cell, first_pred, Node::literal("remastered")))
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(
        mapper.with_object::<Track, _>(id, |t| t.tags.clone()).unwrap(),
        vec!["rock".to_string(), "remastered".to_string()]
    );
}

#[test]
fn deleting_an_object_removes_its_node_on_commit() {
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx);

    let id = mapper.add(Box::new(Track {
        uri: uri("http://example.com/t1"),
        title: "One".into(),
        tags: vec!["rock".into()],
        ..Track::default()
    }));
    mapper.commit().unwrap();
    assert!(!ts.match_pattern(&Triple::wildcard()).unwrap().is_empty());

    mapper.delete_object(id);
    mapper.commit().unwrap();
    assert!(
        ts.match_pattern(&Triple::wildcard()).unwrap().is_empty(),
        "deleted object left triples behind"
    );
    assert_eq!(mapper.object_count(), 0);
}

#[test]
fn externally_deleted_nodes_delete_their_objects() {
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx);

    let id = mapper.add(track("http://example.com/t1", "One"));
    mapper.commit().unwrap();
    let node = Node::Uri(uri("http://example.com/t1"));
    assert_eq!(mapper.object_for(&node), Some(id));

    let mut tx = ts.start_transaction().unwrap();
    tx.remove(&Triple::new(node.clone(), Node::Nothing, Node::Nothing))
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(mapper.object_for(&node), None);
    assert!(mapper.with_object::<Track, _>(id, |t| t.title.clone()).is_none());
    assert_eq!(mapper.object_count(), 0);
}

#[test]
fn manage_requires_a_uri_and_maps_without_storing() {
    let ts = store();
    let cx = context();
    let mapper = ObjectMapper::new(Arc::clone(&ts), cx);

    let err = mapper.manage(Box::new(Track::default())).unwrap_err();
    assert!(matches!(err, trellis_object::MapperError::NoUri(_)));

    let id = mapper.manage(track("http://example.com/t1", "One")).unwrap();
    assert_eq!(
        mapper.node_for(id),
        Some(Node::Uri(uri("http://example.com/t1")))
    );
    // Managed, not dirty: nothing to commit.
    assert!(mapper.commit_and_obtain().unwrap().is_empty());
    assert!(ts.match_pattern(&Triple::wildcard()).unwrap().is_empty());
}

#[test]
fn loading_an_existing_node_brings_it_under_management() {
    let ts = store();
    let cx = context();

    // One mapper writes; a second, fresh one loads.
    let writer = ObjectMapper::new(Arc::clone(&ts), cx.clone());
    writer.add(track("http://example.com/t1", "One"));
    writer.commit().unwrap();

    let reader = ObjectMapper::new(Arc::clone(&ts), cx);
    let node = Node::Uri(uri("http://example.com/t1"));
    let id = reader.load(&node).unwrap();
    assert_eq!(
        reader.with_object::<Track, _>(id, |t| t.title.clone()).unwrap(),
        "One"
    );
    assert_eq!(reader.object_for(&node), Some(id));
}
