//! The bundle of registries the mapping layer works from.

use trellis_core::DatatypeRegistry;

use crate::builder::ObjectRegistry;
use crate::container::ContainerRegistry;
use crate::type_mapping::TypeMapping;

/// Everything the loader, storer, and mapper need to translate between
/// objects and triples: the class factory, container declarations, the
/// naming policy, and the literal codec. Constructed explicitly by the
/// application and shared by reference (or `Arc` for the mapper); none
/// of it is process-global.
#[derive(Default)]
pub struct MappingContext {
    pub objects: ObjectRegistry,
    pub containers: ContainerRegistry,
    pub mapping: TypeMapping,
    pub datatypes: DatatypeRegistry,
}

impl MappingContext {
    pub fn new() -> Self {
        Self::default()
    }
}
