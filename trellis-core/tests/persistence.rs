//! Save/import round-trips and duplicate-handling modes for the
//! reference backend.

use std::path::PathBuf;

use trellis_core::{
    Error, ImportDuplicatesMode, MemoryStore, Node, Store, Triple, Uri,
};

fn uri(s: &str) -> Node {
    Node::Uri(Uri::new(s).unwrap())
}

fn populated() -> MemoryStore {
    let mut s = MemoryStore::new();
    s.add_prefix("ex", &Uri::new("http://example.com/").unwrap())
        .unwrap();
    s.set_base_uri(Uri::new("http://example.com/base/").unwrap());
    s.add(&Triple::new(
        uri("http://example.com/alice"),
        Node::Uri(Uri::rdf_type()),
        uri("http://example.com/Person"),
    ))
    .unwrap();
    s.add(&Triple::new(
        uri("http://example.com/alice"),
        uri("http://example.com/name"),
        Node::literal("Alice"),
    ))
    .unwrap();
    s.add(&Triple::new(
        uri("http://example.com/alice"),
        uri("http://example.com/age"),
        Node::typed_literal("30", Uri::new(trellis_vocab::xsd::INTEGER).unwrap()),
    ))
    .unwrap();
    s
}

fn temp_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

#[test]
fn save_then_import_reproduces_the_triple_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "graph.ttl");

    let original = populated();
    original.save(&path).unwrap();

    let mut restored = MemoryStore::new();
    restored
        .import(&path, ImportDuplicatesMode::Ignore)
        .unwrap();

    assert_eq!(restored.triples(), original.triples());
    // Prefixes and base survive the round-trip too.
    assert_eq!(
        restored.expand("ex:thing").unwrap().as_str(),
        "http://example.com/thing"
    );
    assert_eq!(restored.base_uri(), "http://example.com/base/");
}

#[test]
fn import_ignore_skips_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "graph.ttl");

    let mut store = populated();
    store.save(&path).unwrap();
    let before = store.len();

    store.import(&path, ImportDuplicatesMode::Ignore).unwrap();
    assert_eq!(store.len(), before);
}

#[test]
fn import_fail_mode_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "graph.ttl");

    let mut store = populated();
    store.save(&path).unwrap();
    let before = store.triples();

    let err = store.import(&path, ImportDuplicatesMode::Fail).unwrap_err();
    assert!(matches!(err, Error::DuplicateImport(_)));
    assert_eq!(store.triples(), before);
}

#[test]
fn import_fail_mode_succeeds_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "graph.ttl");

    populated().save(&path).unwrap();

    let mut fresh = MemoryStore::new();
    fresh.import(&path, ImportDuplicatesMode::Fail).unwrap();
    assert_eq!(fresh.len(), 3);
}

#[test]
fn import_permit_mode_never_stores_a_second_copy() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "graph.ttl");

    let mut store = populated();
    store.save(&path).unwrap();
    let before = store.len();

    store.import(&path, ImportDuplicatesMode::Permit).unwrap();
    assert_eq!(store.len(), before);
}

#[test]
fn non_ascii_iris_survive_save_and_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "unicode.ttl");

    let mut store = MemoryStore::new();
    store
        .add(&Triple::new(
            uri("http://example.com/café"),
            uri("http://example.com/p"),
            Node::literal("jalapeño"),
        ))
        .unwrap();
    store.save(&path).unwrap();

    let mut restored = MemoryStore::new();
    restored.import(&path, ImportDuplicatesMode::Fail).unwrap();
    assert_eq!(restored.triples(), store.triples());
}

#[test]
fn imported_blank_labels_do_not_alias_between_imports() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_path(&dir, "blanks.ttl");
    std::fs::write(
        &path,
        "_:b0 <http://example.com/p> \"x\" .\n",
    )
    .unwrap();

    let mut store = MemoryStore::new();
    store.import(&path, ImportDuplicatesMode::Ignore).unwrap();
    store.import(&path, ImportDuplicatesMode::Ignore).unwrap();

    // Same document twice, but the blank subjects are distinct nodes.
    let matches = store
        .match_pattern(&Triple::new(
            Node::Nothing,
            uri("http://example.com/p"),
            Node::Nothing,
        ))
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_ne!(matches[0].subject, matches[1].subject);
}

#[test]
fn spec_scenario_single_triple_then_transactionless_swap() {
    // Insert one triple into an empty store; the all-wildcard match
    // returns exactly that triple.
    let mut store = MemoryStore::new();
    let a = uri("http://example.com/a");
    let p = uri("http://example.com/p");
    store
        .add(&Triple::new(a.clone(), p.clone(), Node::literal("x")))
        .unwrap();
    let all = store.match_pattern(&Triple::wildcard()).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].object, Node::literal("x"));
}
