//! RDF linked-list helpers shared by the loader, storer, and mapper.

use rustc_hash::FxHashSet;

use trellis_core::{Node, Result, Store, Triple, Uri};

pub(crate) fn first_predicate() -> Node {
    Node::Uri(Uri::from_expanded(trellis_vocab::rdf::FIRST))
}

pub(crate) fn rest_predicate() -> Node {
    Node::Uri(Uri::from_expanded(trellis_vocab::rdf::REST))
}

pub(crate) fn nil_node() -> Node {
    Node::Uri(Uri::from_expanded(trellis_vocab::rdf::NIL))
}

/// True when the node heads (or continues) an RDF list: a URI or blank
/// node carrying an `rdf:first` triple.
pub(crate) fn is_list_node(store: &dyn Store, node: &Node) -> Result<bool> {
    if !(node.is_uri() || node.is_blank()) {
        return Ok(false);
    }
    Ok(store
        .match_once(&Triple::new(
            node.clone(),
            first_predicate(),
            Node::Nothing,
        ))?
        .is_some())
}

/// Walk a list from its head, returning `(cell, value)` pairs in list
/// order. Stops at `rdf:nil`, at a malformed cell, or on a cycle, so a
/// damaged list degrades to its readable prefix.
pub(crate) fn walk_cells(store: &dyn Store, head: &Node) -> Result<Vec<(Node, Node)>> {
    let mut out = Vec::new();
    let mut seen: FxHashSet<Node> = FxHashSet::default();
    let mut cell = head.clone();
    let nil = nil_node();
    while cell != nil && (cell.is_uri() || cell.is_blank()) {
        if !seen.insert(cell.clone()) {
            break;
        }
        let value = store.complete(&Triple::new(
            cell.clone(),
            first_predicate(),
            Node::Nothing,
        ))?;
        if value.is_nothing() {
            break;
        }
        out.push((cell.clone(), value));
        let rest = store.complete(&Triple::new(
            cell.clone(),
            rest_predicate(),
            Node::Nothing,
        ))?;
        if rest.is_nothing() {
            break;
        }
        cell = rest;
    }
    Ok(out)
}

/// The element values of a list, in order.
pub(crate) fn walk_values(store: &dyn Store, head: &Node) -> Result<Vec<Node>> {
    Ok(walk_cells(store, head)?
        .into_iter()
        .map(|(_, value)| value)
        .collect())
}
