//! # Trellis Object
//!
//! Bidirectional mapping between typed application objects and triples
//! in a Trellis store:
//!
//! - `mapped_class!` + `Mapped`/`Described` - compile-time property
//!   descriptor tables, no runtime reflection
//! - `ObjectRegistry` / `ContainerRegistry` / `TypeMapping` - explicit,
//!   application-owned registries for construction, container encoding,
//!   and URI naming
//! - `ObjectArena` + `NodeObjectMap` - generational object ownership
//!   and the node/object correspondence
//! - `ObjectLoader` - cycle-safe six-phase construction of object
//!   graphs from store contents
//! - `ObjectStorer` - writing object graphs into the store, with blank
//!   node and store-if-changed policies
//! - `ObjectMapper` - live synchronization against a
//!   `TransactionalStore`, in both directions

pub mod arena;
pub mod builder;
pub mod container;
pub mod context;
pub mod descriptor;
pub mod error;
mod list;
pub mod loader;
pub mod mapper;
pub mod maps;
pub mod policy;
pub mod properties;
pub mod storer;
pub mod type_mapping;

// Re-exports
pub use arena::ObjectArena;
pub use builder::ObjectRegistry;
pub use container::{ContainerKind, ContainerRegistry, ContainerSpec};
pub use context::MappingContext;
pub use descriptor::{
    get_property, object_uri, set_property, ClassDescriptor, Described, Mapped,
    PropertyDescriptor, PropertyValue,
};
pub use error::{MapperError, Result};
pub use loader::{LoadCallback, ObjectLoader, ReloadReport};
pub use mapper::ObjectMapper;
pub use maps::NodeObjectMap;
pub use policy::{AbsentPropertyPolicy, BlankNodePolicy, FollowPolicy, StorePolicy};
pub use properties::NodeProperties;
pub use storer::ObjectStorer;
pub use type_mapping::TypeMapping;
