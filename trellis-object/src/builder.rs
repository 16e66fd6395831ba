//! The object factory registry.
//!
//! Maps class names to constructors producing fresh default instances.
//! Registries are plain values constructed by the application and
//! passed by reference; nothing here is process-global. Unknown class
//! names surface at construction time, not registration time.

use rustc_hash::FxHashMap;

use crate::descriptor::{ClassDescriptor, Described, Mapped};
use crate::error::{MapperError, Result};

type BuildFn = Box<dyn Fn() -> Option<Box<dyn Mapped>> + Send + Sync>;

struct Registration {
    descriptor: &'static ClassDescriptor,
    build: BuildFn,
}

/// Registry of constructible mapped classes.
#[derive(Default)]
pub struct ObjectRegistry {
    classes: FxHashMap<String, Registration>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class constructible via `Default`.
    pub fn register<T: Mapped + Described + Default + 'static>(&mut self) {
        let descriptor = T::class_descriptor();
        self.classes.insert(
            descriptor.class_name.to_string(),
            Registration {
                descriptor,
                build: Box::new(|| Some(Box::new(T::default()) as Box<dyn Mapped>)),
            },
        );
    }

    /// Register a class with a fallible constructor closure.
    pub fn register_with<T, F>(&mut self, build: F)
    where
        T: Mapped + Described + 'static,
        F: Fn() -> Option<T> + Send + Sync + 'static,
    {
        let descriptor = T::class_descriptor();
        self.classes.insert(
            descriptor.class_name.to_string(),
            Registration {
                descriptor,
                build: Box::new(move || build().map(|o| Box::new(o) as Box<dyn Mapped>)),
            },
        );
    }

    /// True when the class name has a registration.
    pub fn knows(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// The static descriptor for a registered class.
    pub fn descriptor(&self, class_name: &str) -> Option<&'static ClassDescriptor> {
        self.classes.get(class_name).map(|r| r.descriptor)
    }

    /// Construct a fresh instance of the named class.
    pub fn build(&self, class_name: &str) -> Result<Box<dyn Mapped>> {
        let registration = self
            .classes
            .get(class_name)
            .ok_or_else(|| MapperError::UnknownType(class_name.to_string()))?;
        (registration.build)()
            .ok_or_else(|| MapperError::ConstructionFailed(class_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapped_class;
    use trellis_core::Uri;

    mapped_class! {
        pub struct Gadget: "test::Gadget" {
            uri: Uri,
            name: String,
        }
    }

    #[test]
    fn unknown_classes_fail_at_build_time() {
        let mut reg = ObjectRegistry::new();
        assert!(matches!(
            reg.build("test::Gadget"),
            Err(MapperError::UnknownType(_))
        ));

        reg.register::<Gadget>();
        assert!(reg.knows("test::Gadget"));
        let built = reg.build("test::Gadget").unwrap();
        assert_eq!(built.class_name(), "test::Gadget");
    }

    #[test]
    fn fallible_constructors_surface_construction_failure() {
        let mut reg = ObjectRegistry::new();
        reg.register_with::<Gadget, _>(|| None);
        assert!(matches!(
            reg.build("test::Gadget"),
            Err(MapperError::ConstructionFailed(_))
        ));
    }
}
