//! In-memory reference backend.
//!
//! `MemoryStore` keeps triples in insertion order with three hash indexes
//! (by subject, predicate, and object) so a wildcard pattern with at
//! least one bound position never scans the whole store. It carries the
//! namespace-prefix table used by [`Store::expand`] and implements Turtle
//! save/import through the [`crate::turtle`] codec.

use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::changeset::{Change, ChangeSet, ChangeType};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::store::{FeatureSet, ImportDuplicatesMode, ResultSet, Store};
use crate::triple::Triple;
use crate::turtle;
use crate::uri::Uri;

/// The in-memory reference store.
///
/// Never holds duplicate triples. Blank nodes handed out by
/// [`MemoryStore::add_blank_node`] are valid only within this instance's
/// lifetime; imported documents get their blank labels remapped to fresh
/// ids so separate imports never alias.
pub struct MemoryStore {
    // Insertion-ordered slots; removal tombstones rather than shifts so
    // index entries stay cheap to maintain.
    slots: Vec<Option<Triple>>,
    present: FxHashMap<Triple, usize>,
    by_subject: FxHashMap<Node, Vec<usize>>,
    by_predicate: FxHashMap<Node, Vec<usize>>,
    by_object: FxHashMap<Node, Vec<usize>>,
    prefixes: Vec<(String, Uri)>,
    base: String,
}

impl MemoryStore {
    /// Construct an empty store with the implicit `rdf` and `xsd`
    /// prefixes and the placeholder base `#`.
    pub fn new() -> Self {
        MemoryStore {
            slots: Vec::new(),
            present: FxHashMap::default(),
            by_subject: FxHashMap::default(),
            by_predicate: FxHashMap::default(),
            by_object: FxHashMap::default(),
            prefixes: vec![
                (
                    "rdf".to_string(),
                    Uri::from_expanded(trellis_vocab::namespaces::RDF),
                ),
                (
                    "xsd".to_string(),
                    Uri::from_expanded(trellis_vocab::namespaces::XSD),
                ),
            ],
            base: "#".to_string(),
        }
    }

    /// Set the base URI that `expand` resolves leading-colon names
    /// against and `save` writes as the `@base` directive.
    pub fn set_base_uri(&mut self, base: Uri) {
        self.base = base.as_str().to_string();
    }

    /// The current base URI string. `#` until one is set.
    pub fn base_uri(&self) -> &str {
        &self.base
    }

    /// The prefix table, in registration order.
    pub fn prefixes(&self) -> &[(String, Uri)] {
        &self.prefixes
    }

    /// Number of triples currently stored.
    pub fn len(&self) -> usize {
        self.present.len()
    }

    /// True when the store holds no triples.
    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// All triples, sorted. This is the order `save` writes them in.
    pub fn triples(&self) -> Vec<Triple> {
        let mut out: Vec<Triple> = self.slots.iter().flatten().cloned().collect();
        out.sort();
        out
    }

    fn insert(&mut self, t: &Triple) -> bool {
        if self.present.contains_key(t) {
            return false;
        }
        let slot = self.slots.len();
        self.slots.push(Some(t.clone()));
        self.present.insert(t.clone(), slot);
        self.by_subject
            .entry(t.subject.clone())
            .or_default()
            .push(slot);
        self.by_predicate
            .entry(t.predicate.clone())
            .or_default()
            .push(slot);
        self.by_object
            .entry(t.object.clone())
            .or_default()
            .push(slot);
        true
    }

    fn erase(&mut self, t: &Triple) -> bool {
        let Some(slot) = self.present.remove(t) else {
            return false;
        };
        self.slots[slot] = None;
        for (node, index) in [
            (&t.subject, &mut self.by_subject),
            (&t.predicate, &mut self.by_predicate),
            (&t.object, &mut self.by_object),
        ] {
            if let Some(bucket) = index.get_mut(node) {
                bucket.retain(|&s| s != slot);
                if bucket.is_empty() {
                    index.remove(node);
                }
            }
        }
        true
    }

    fn apply(&mut self, c: &Change) -> Result<()> {
        match c.op {
            ChangeType::Add => {
                c.triple.check_complete()?;
                if !self.insert(&c.triple) {
                    return Err(Error::store(format!(
                        "change add failed, triple already present: {}",
                        c.triple
                    )));
                }
            }
            ChangeType::Remove => {
                c.triple.check_complete()?;
                if !self.erase(&c.triple) {
                    return Err(Error::store(format!(
                        "change remove failed, triple not present: {}",
                        c.triple
                    )));
                }
            }
        }
        Ok(())
    }

    fn unapply(&mut self, c: &Change) {
        // Undoing a just-applied change cannot fail: the triple state is
        // exactly what the inverse operation expects.
        match c.op {
            ChangeType::Add => {
                self.erase(&c.triple);
            }
            ChangeType::Remove => {
                self.insert(&c.triple);
            }
        }
    }

    fn matching(&self, pattern: &Triple) -> Vec<Triple> {
        if !pattern.has_wildcard() {
            return match self.present.contains_key(pattern) {
                true => vec![pattern.clone()],
                false => vec![],
            };
        }

        let mut best: Option<&Vec<usize>> = None;
        for (node, index) in [
            (&pattern.subject, &self.by_subject),
            (&pattern.predicate, &self.by_predicate),
            (&pattern.object, &self.by_object),
        ] {
            if node.is_nothing() {
                continue;
            }
            match index.get(node) {
                Some(bucket) => {
                    if best.map_or(true, |b| bucket.len() < b.len()) {
                        best = Some(bucket);
                    }
                }
                // A bound position with no index entry matches nothing.
                None => return vec![],
            }
        }

        match best {
            Some(bucket) => bucket
                .iter()
                .filter_map(|&slot| self.slots[slot].as_ref())
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
            None => self
                .slots
                .iter()
                .flatten()
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect(),
        }
    }

    fn subject_in_use(&self, node: &Node) -> bool {
        self.by_subject.contains_key(node)
    }

    fn fresh_suffix() -> String {
        let mut rng = rand::thread_rng();
        format!("{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff)
    }

    /// A fresh blank id unused by any current subject or object.
    fn unused_blank_id(&self) -> String {
        loop {
            let id = format!("b{}", Self::fresh_suffix());
            let candidate = Node::Blank(id.clone());
            if !self.by_subject.contains_key(&candidate)
                && !self.by_object.contains_key(&candidate)
            {
                return id;
            }
        }
    }

    fn remap_blank(&self, node: Node, blanks: &mut FxHashMap<String, String>) -> Node {
        let Node::Blank(label) = node else {
            return node;
        };
        if let Some(fresh) = blanks.get(&label) {
            return Node::Blank(fresh.clone());
        }
        let id = self.unused_blank_id();
        blanks.insert(label, id.clone());
        Node::Blank(id)
    }

    fn import_document(&mut self, doc: turtle::ParsedDocument, mode: ImportDuplicatesMode) -> Result<()> {
        if let Some(base) = doc.base {
            self.base = base.as_str().to_string();
        }
        for (prefix, ns) in doc.prefixes {
            self.add_prefix(&prefix, &ns)?;
        }

        // Blank labels are scoped to the document; remap to fresh ids so
        // they cannot collide with blanks already in the store.
        let mut blanks: FxHashMap<String, String> = FxHashMap::default();
        let mut triples = Vec::with_capacity(doc.triples.len());
        for t in doc.triples {
            let subject = self.remap_blank(t.subject, &mut blanks);
            let object = self.remap_blank(t.object, &mut blanks);
            triples.push(Triple {
                subject,
                predicate: t.predicate,
                object,
            });
        }

        if mode == ImportDuplicatesMode::Fail {
            // Stage the duplicate test before touching the store so a
            // failure leaves it exactly as it was.
            let mut seen: FxHashSet<&Triple> = FxHashSet::default();
            for t in &triples {
                if self.present.contains_key(t) || !seen.insert(t) {
                    return Err(Error::DuplicateImport(t.to_string()));
                }
            }
        }

        let mut added = 0usize;
        for t in &triples {
            t.check_complete()?;
            if self.insert(t) {
                added += 1;
            }
        }
        debug!(triples = triples.len(), added, "imported document");
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn add(&mut self, t: &Triple) -> Result<bool> {
        t.check_complete()?;
        let added = self.insert(t);
        if added {
            debug!(triple = %t, "add");
        }
        Ok(added)
    }

    fn remove(&mut self, t: &Triple) -> Result<bool> {
        if t.has_wildcard() {
            let matches = self.matching(t);
            if matches.is_empty() {
                return Ok(false);
            }
            for m in &matches {
                self.erase(m);
            }
            debug!(pattern = %t, count = matches.len(), "wildcard remove");
            return Ok(true);
        }
        t.check_complete()?;
        let removed = self.erase(t);
        if removed {
            debug!(triple = %t, "remove");
        }
        Ok(removed)
    }

    fn change(&mut self, changes: &ChangeSet) -> Result<()> {
        for (i, c) in changes.iter().enumerate() {
            if let Err(e) = self.apply(c) {
                for undone in changes[..i].iter().rev() {
                    self.unapply(undone);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn revert(&mut self, changes: &ChangeSet) -> Result<()> {
        let inverses: Vec<Change> = changes
            .iter()
            .rev()
            .map(|c| Change {
                op: c.op.inverted(),
                triple: c.triple.clone(),
            })
            .collect();
        for (i, inverse) in inverses.iter().enumerate() {
            if let Err(e) = self.apply(inverse) {
                for undone in inverses[..i].iter().rev() {
                    self.unapply(undone);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn contains(&self, t: &Triple) -> Result<bool> {
        t.check_complete()?;
        Ok(self.present.contains_key(t))
    }

    fn match_pattern(&self, pattern: &Triple) -> Result<Vec<Triple>> {
        Ok(self.matching(pattern))
    }

    fn match_once(&self, pattern: &Triple) -> Result<Option<Triple>> {
        if !pattern.has_wildcard() {
            return Ok(match self.present.contains_key(pattern) {
                true => Some(pattern.clone()),
                false => None,
            });
        }
        Ok(self.matching(pattern).into_iter().next())
    }

    fn complete(&self, pattern: &Triple) -> Result<Node> {
        let wildcards = [&pattern.subject, &pattern.predicate, &pattern.object]
            .iter()
            .filter(|n| n.is_nothing())
            .count();
        if wildcards != 1 {
            return Err(Error::store(format!(
                "complete requires exactly one wildcard position, pattern has {wildcards}: {pattern}"
            )));
        }
        Ok(match self.match_once(pattern)? {
            Some(t) => {
                if pattern.subject.is_nothing() {
                    t.subject
                } else if pattern.predicate.is_nothing() {
                    t.predicate
                } else {
                    t.object
                }
            }
            None => Node::Nothing,
        })
    }

    fn query(&self, _sparql: &str) -> Result<ResultSet> {
        Err(Error::UnsupportedFeature("query"))
    }

    fn query_once(&self, _sparql: &str, _binding: &str) -> Result<Option<Node>> {
        Err(Error::UnsupportedFeature("query"))
    }

    fn unique_uri(&self, prefix: &str) -> Result<Uri> {
        let base = self.expand(prefix)?;
        loop {
            let candidate = base.join(&Self::fresh_suffix());
            if !self.subject_in_use(&Node::Uri(candidate.clone())) {
                return Ok(candidate);
            }
        }
    }

    fn add_blank_node(&mut self) -> Result<Node> {
        Ok(Node::Blank(self.unused_blank_id()))
    }

    fn expand(&self, name: &str) -> Result<Uri> {
        if let Ok(u) = Uri::new(name) {
            return Ok(u);
        }
        if let Some((prefix, local)) = name.split_once(':') {
            if prefix.is_empty() {
                return Ok(Uri::from_expanded(format!("{}{local}", self.base)));
            }
            for (p, ns) in &self.prefixes {
                if p == prefix {
                    return Ok(ns.join(local));
                }
            }
        }
        Err(Error::IncompleteUri(name.to_string()))
    }

    fn add_prefix(&mut self, prefix: &str, uri: &Uri) -> Result<()> {
        for entry in &mut self.prefixes {
            if entry.0 == prefix {
                entry.1 = uri.clone();
                return Ok(());
            }
        }
        self.prefixes.push((prefix.to_string(), uri.clone()));
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let base = match self.base.as_str() {
            "#" => None,
            b => Uri::new(b).ok(),
        };
        let tmp = path.with_extension("part");
        {
            let mut file = fs::File::create(&tmp)?;
            turtle::write_document(&mut file, base.as_ref(), &self.prefixes, &self.triples())?;
            file.flush()?;
        }
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), triples = self.len(), "saved");
        Ok(())
    }

    fn import(&mut self, path: &Path, mode: ImportDuplicatesMode) -> Result<()> {
        let text = fs::read_to_string(path)?;
        let doc = turtle::parse_document(&text)?;
        self.import_document(doc, mode)
    }

    fn features(&self) -> FeatureSet {
        FeatureSet {
            modify: true,
            query: false,
            remote_import: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Node {
        Node::Uri(Uri::new(s).unwrap())
    }

    fn triple(s: &str, p: &str, o: Node) -> Triple {
        Triple::new(uri(s), uri(p), o)
    }

    #[test]
    fn add_never_duplicates() {
        let mut s = MemoryStore::new();
        let t = triple("http://e/a", "http://e/p", Node::literal("x"));
        assert!(s.add(&t).unwrap());
        assert!(!s.add(&t).unwrap());
        assert_eq!(s.match_pattern(&Triple::wildcard()).unwrap().len(), 1);
    }

    #[test]
    fn wildcard_remove_takes_all_matches() {
        let mut s = MemoryStore::new();
        s.add(&triple("http://e/a", "http://e/p", Node::literal("x")))
            .unwrap();
        s.add(&triple("http://e/b", "http://e/p", Node::literal("y")))
            .unwrap();
        s.add(&triple("http://e/a", "http://e/q", Node::literal("z")))
            .unwrap();

        let pattern = Triple::new(Node::Nothing, uri("http://e/p"), Node::Nothing);
        assert!(s.remove(&pattern).unwrap());
        assert_eq!(s.len(), 1);
        assert!(!s.remove(&pattern).unwrap());
    }

    #[test]
    fn incomplete_statements_are_refused() {
        let mut s = MemoryStore::new();
        let bad = Triple::new(Node::literal("s"), uri("http://e/p"), Node::literal("x"));
        assert!(matches!(s.add(&bad), Err(Error::IncompleteStatement(_))));
        assert!(matches!(
            s.contains(&Triple::wildcard()),
            Err(Error::IncompleteStatement(_))
        ));
    }

    #[test]
    fn change_then_revert_is_identity() {
        let mut s = MemoryStore::new();
        let keep = triple("http://e/a", "http://e/p", Node::literal("x"));
        s.add(&keep).unwrap();

        let changes = vec![
            Change::remove(keep.clone()),
            Change::add(triple("http://e/a", "http://e/p", Node::literal("y"))),
            Change::add(triple("http://e/b", "http://e/p", Node::literal("z"))),
        ];
        s.change(&changes).unwrap();
        assert!(!s.contains(&keep).unwrap());
        assert_eq!(s.len(), 2);

        s.revert(&changes).unwrap();
        assert!(s.contains(&keep).unwrap());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn failed_change_leaves_store_untouched() {
        let mut s = MemoryStore::new();
        let existing = triple("http://e/a", "http://e/p", Node::literal("x"));
        s.add(&existing).unwrap();

        let changes = vec![
            Change::add(triple("http://e/b", "http://e/p", Node::literal("y"))),
            // fails: already present
            Change::add(existing.clone()),
        ];
        assert!(s.change(&changes).is_err());
        assert_eq!(s.len(), 1);
        assert!(s.contains(&existing).unwrap());
    }

    #[test]
    fn complete_requires_exactly_one_wildcard() {
        let mut s = MemoryStore::new();
        let t = triple("http://e/a", "http://e/p", Node::literal("x"));
        s.add(&t).unwrap();

        let one = Triple::new(t.subject.clone(), t.predicate.clone(), Node::Nothing);
        assert_eq!(s.complete(&one).unwrap(), Node::literal("x"));

        let none = Triple::new(uri("http://e/z"), t.predicate.clone(), Node::Nothing);
        assert_eq!(s.complete(&none).unwrap(), Node::Nothing);

        assert!(s.complete(&Triple::wildcard()).is_err());
        assert!(s.complete(&t).is_err());
    }

    #[test]
    fn match_once_finds_something() {
        let mut s = MemoryStore::new();
        let t = triple("http://e/a", "http://e/p", Node::literal("x"));
        s.add(&t).unwrap();
        assert_eq!(s.match_once(&t).unwrap(), Some(t.clone()));
        assert!(s
            .match_once(&Triple::new(Node::Nothing, t.predicate.clone(), Node::Nothing))
            .unwrap()
            .is_some());
        assert!(s
            .match_once(&Triple::new(uri("http://e/z"), Node::Nothing, Node::Nothing))
            .unwrap()
            .is_none());
    }

    #[test]
    fn expand_resolves_prefixes_and_base() {
        let mut s = MemoryStore::new();
        s.add_prefix("ex", &Uri::new("http://example.com/").unwrap())
            .unwrap();
        s.set_base_uri(Uri::new("http://base.example.com/").unwrap());

        assert_eq!(
            s.expand("ex:thing").unwrap().as_str(),
            "http://example.com/thing"
        );
        assert_eq!(
            s.expand(":local").unwrap().as_str(),
            "http://base.example.com/local"
        );
        assert_eq!(s.expand("a").unwrap(), Uri::rdf_type());
        assert_eq!(
            s.expand("rdf:type").unwrap(),
            Uri::rdf_type()
        );
        assert_eq!(
            s.expand("http://example.com/x").unwrap().as_str(),
            "http://example.com/x"
        );
        assert!(matches!(
            s.expand("nope:thing"),
            Err(Error::IncompleteUri(_))
        ));
    }

    #[test]
    fn unique_uri_avoids_existing_subjects() {
        let mut s = MemoryStore::new();
        s.add_prefix("ex", &Uri::new("http://example.com/").unwrap())
            .unwrap();
        for _ in 0..16 {
            let u = s.unique_uri("ex:obj_").unwrap();
            assert!(u.as_str().starts_with("http://example.com/obj_"));
            s.add(&Triple::new(
                Node::Uri(u),
                uri("http://e/p"),
                Node::literal("x"),
            ))
            .unwrap();
        }
        assert_eq!(s.len(), 16);
    }

    #[test]
    fn blank_nodes_are_fresh() {
        let mut s = MemoryStore::new();
        let a = s.add_blank_node().unwrap();
        let b = s.add_blank_node().unwrap();
        assert!(a.is_blank() && b.is_blank());
        assert_ne!(a, b);
    }

    #[test]
    fn query_is_unsupported() {
        let s = MemoryStore::new();
        assert!(!s.features().query);
        assert!(matches!(
            s.query("SELECT ?s WHERE { ?s ?p ?o }"),
            Err(Error::UnsupportedFeature(_))
        ));
    }
}
