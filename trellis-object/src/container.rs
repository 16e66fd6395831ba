//! The container registry.
//!
//! Declares how list-shaped property types are written to the store:
//! `Sequence` containers become RDF linked lists (`rdf:first` /
//! `rdf:rest` / `rdf:nil`), preserving order; `Set` containers become
//! repeated triples with the same subject and predicate. Injection and
//! extraction go through `Value::List`, so the registry itself carries
//! no closures - only the element type and the encoding kind.
//!
//! Container property types without a registration fall back to the
//! opaque encoded-literal representation the codec provides.

use rustc_hash::FxHashMap;

/// How a container's elements are laid out in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    /// Ordered; encoded as an RDF linked list.
    Sequence,
    /// Unordered; encoded as repeated triples.
    Set,
}

/// One container type declaration.
#[derive(Clone, Debug)]
pub struct ContainerSpec {
    /// Type name of the elements, e.g. `"String"` or `"ObjectRef"`.
    pub element_type_name: String,
    pub kind: ContainerKind,
}

/// Registry of container property types.
#[derive(Default)]
pub struct ContainerRegistry {
    specs: FxHashMap<String, ContainerSpec>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a container type, e.g.
    /// `register("Vec<String>", "String", ContainerKind::Sequence)`.
    pub fn register(
        &mut self,
        container_type_name: impl Into<String>,
        element_type_name: impl Into<String>,
        kind: ContainerKind,
    ) {
        self.specs.insert(
            container_type_name.into(),
            ContainerSpec {
                element_type_name: element_type_name.into(),
                kind,
            },
        );
    }

    /// True when the type name is a declared container.
    pub fn knows(&self, container_type_name: &str) -> bool {
        self.specs.contains_key(container_type_name)
    }

    /// The declaration for a container type name, if any.
    pub fn spec(&self, container_type_name: &str) -> Option<&ContainerSpec> {
        self.specs.get(container_type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrations_are_looked_up_by_type_name() {
        let mut reg = ContainerRegistry::new();
        assert!(reg.spec("Vec<String>").is_none());

        reg.register("Vec<String>", "String", ContainerKind::Sequence);
        reg.register("Vec<ObjectRef>", "ObjectRef", ContainerKind::Set);

        let seq = reg.spec("Vec<String>").unwrap();
        assert_eq!(seq.kind, ContainerKind::Sequence);
        assert_eq!(seq.element_type_name, "String");

        let set = reg.spec("Vec<ObjectRef>").unwrap();
        assert_eq!(set.kind, ContainerKind::Set);
    }
}
