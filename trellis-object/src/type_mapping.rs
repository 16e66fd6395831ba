//! The class/property naming policy.
//!
//! `TypeMapping` resolves class names to `rdf:type` URIs, property
//! names to predicate URIs, and back. Explicit registrations win; the
//! fallback synthesizes a URI from the configured prefix and the name
//! itself, replacing the `::` module separator with `/` so the mapping
//! stays reversible. Unknown URIs outside the prefix are an error on
//! the reverse path: nothing is silently invented.

use rustc_hash::FxHashMap;

use trellis_core::Uri;

use crate::error::{MapperError, Result};

/// Policy object mapping class and property names to URIs.
#[derive(Clone)]
pub struct TypeMapping {
    type_prefix: Uri,
    property_prefix: Uri,
    relationship_prefix: Uri,
    type_by_class: FxHashMap<String, Uri>,
    class_by_type: FxHashMap<Uri, String>,
    predicate_by_property: FxHashMap<(String, String), Uri>,
    property_by_predicate: FxHashMap<(String, Uri), String>,
    uri_prefix_by_class: FxHashMap<String, String>,
}

impl TypeMapping {
    /// A mapping with the default Trellis prefixes and no explicit
    /// registrations.
    pub fn new() -> Self {
        TypeMapping {
            type_prefix: Uri::from_expanded(trellis_vocab::mapping::TYPE_PREFIX),
            property_prefix: Uri::from_expanded(trellis_vocab::mapping::PROPERTY_PREFIX),
            relationship_prefix: Uri::from_expanded(trellis_vocab::mapping::RELATIONSHIP_PREFIX),
            type_by_class: FxHashMap::default(),
            class_by_type: FxHashMap::default(),
            predicate_by_property: FxHashMap::default(),
            property_by_predicate: FxHashMap::default(),
            uri_prefix_by_class: FxHashMap::default(),
        }
    }

    pub fn set_type_prefix(&mut self, prefix: Uri) {
        self.type_prefix = prefix;
    }

    pub fn type_prefix(&self) -> &Uri {
        &self.type_prefix
    }

    pub fn set_property_prefix(&mut self, prefix: Uri) {
        self.property_prefix = prefix;
    }

    pub fn property_prefix(&self) -> &Uri {
        &self.property_prefix
    }

    pub fn set_relationship_prefix(&mut self, prefix: Uri) {
        self.relationship_prefix = prefix;
    }

    pub fn relationship_prefix(&self) -> &Uri {
        &self.relationship_prefix
    }

    /// Register an explicit class-to-type-URI association, both
    /// directions.
    pub fn add_type_mapping(&mut self, class_name: impl Into<String>, type_uri: Uri) {
        let class_name = class_name.into();
        self.class_by_type
            .insert(type_uri.clone(), class_name.clone());
        self.type_by_class.insert(class_name, type_uri);
    }

    /// Register an explicit (class, property)-to-predicate association,
    /// both directions.
    pub fn add_property_mapping(
        &mut self,
        class_name: impl Into<String>,
        property: impl Into<String>,
        predicate: Uri,
    ) {
        let class_name = class_name.into();
        let property = property.into();
        self.property_by_predicate
            .insert((class_name.clone(), predicate.clone()), property.clone());
        self.predicate_by_property
            .insert((class_name, property), predicate);
    }

    /// Set the prefix (possibly a prefixed name, expanded by the store)
    /// used when allocating instance URIs for a class.
    pub fn set_uri_prefix_for_class(
        &mut self,
        class_name: impl Into<String>,
        prefix: impl Into<String>,
    ) {
        self.uri_prefix_by_class
            .insert(class_name.into(), prefix.into());
    }

    /// The instance-URI prefix registered for a class, if any.
    pub fn uri_prefix_for_class(&self, class_name: &str) -> Option<&str> {
        self.uri_prefix_by_class.get(class_name).map(|s| s.as_str())
    }

    /// The `rdf:type` URI for a class: the explicit registration, or
    /// the synthesized `type-prefix/class/name` form.
    pub fn type_uri_for_class(&self, class_name: &str) -> Uri {
        match self.type_by_class.get(class_name) {
            Some(uri) => uri.clone(),
            None => self.type_prefix.join(&class_name.replace("::", "/")),
        }
    }

    /// The class name for a type URI: the explicit registration, or the
    /// reversal of the synthesis. A URI that is neither is unknown.
    pub fn class_for_type_uri(&self, type_uri: &Uri) -> Result<String> {
        if let Some(class) = self.class_by_type.get(type_uri) {
            return Ok(class.clone());
        }
        match type_uri.as_str().strip_prefix(self.type_prefix.as_str()) {
            Some(rest) if !rest.is_empty() => Ok(rest.replace('/', "::")),
            _ => Err(MapperError::UnknownType(format!(
                "no class mapped for type {type_uri}"
            ))),
        }
    }

    /// The predicate URI for a class property: the explicit
    /// registration, or `property-prefix + name`.
    pub fn predicate_for_property(&self, class_name: &str, property: &str) -> Uri {
        match self
            .predicate_by_property
            .get(&(class_name.to_string(), property.to_string()))
        {
            Some(uri) => uri.clone(),
            None => self.property_prefix.join(property),
        }
    }

    /// The property name for a predicate on a class, when the predicate
    /// is explicitly registered or under the property prefix.
    pub fn property_for_predicate(&self, class_name: &str, predicate: &Uri) -> Option<String> {
        if let Some(name) = self
            .property_by_predicate
            .get(&(class_name.to_string(), predicate.clone()))
        {
            return Some(name.clone());
        }
        predicate
            .as_str()
            .strip_prefix(self.property_prefix.as_str())
            .filter(|rest| !rest.is_empty())
            .map(|rest| rest.to_string())
    }

    /// The predicate linking an object to its parent.
    pub fn parent_predicate(&self) -> Uri {
        self.relationship_prefix.join("parent")
    }

    /// The predicate linking an object to the sibling it follows.
    pub fn follows_predicate(&self) -> Uri {
        self.relationship_prefix.join("follows")
    }
}

impl Default for TypeMapping {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_is_reversible() {
        let m = TypeMapping::new();
        let uri = m.type_uri_for_class("app::model::Person");
        assert_eq!(
            uri.as_str(),
            format!("{}app/model/Person", trellis_vocab::mapping::TYPE_PREFIX)
        );
        assert_eq!(m.class_for_type_uri(&uri).unwrap(), "app::model::Person");
    }

    #[test]
    fn explicit_mappings_win_over_synthesis() {
        let mut m = TypeMapping::new();
        let t = Uri::new("http://example.com/vocab/Person").unwrap();
        m.add_type_mapping("app::Person", t.clone());
        assert_eq!(m.type_uri_for_class("app::Person"), t);
        assert_eq!(m.class_for_type_uri(&t).unwrap(), "app::Person");

        let p = Uri::new("http://example.com/vocab/fullName").unwrap();
        m.add_property_mapping("app::Person", "name", p.clone());
        assert_eq!(m.predicate_for_property("app::Person", "name"), p);
        assert_eq!(
            m.property_for_predicate("app::Person", &p).unwrap(),
            "name"
        );
    }

    #[test]
    fn foreign_type_uris_are_unknown() {
        let m = TypeMapping::new();
        let foreign = Uri::new("http://elsewhere.example.com/Thing").unwrap();
        assert!(matches!(
            m.class_for_type_uri(&foreign),
            Err(MapperError::UnknownType(_))
        ));
    }

    #[test]
    fn unmapped_predicates_resolve_only_under_the_prefix() {
        let m = TypeMapping::new();
        let under = m.predicate_for_property("app::Person", "age");
        assert_eq!(
            m.property_for_predicate("app::Person", &under).unwrap(),
            "age"
        );
        let outside = Uri::new("http://elsewhere.example.com/age").unwrap();
        assert!(m.property_for_predicate("app::Person", &outside).is_none());
    }
}
