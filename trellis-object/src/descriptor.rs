//! Compile-time property descriptors.
//!
//! Mappable types expose a static table of `{name, type name, get, set}`
//! entries, generated by the [`mapped_class!`](crate::mapped_class)
//! macro. The loader and storer drive all property access through these
//! tables; there is no runtime reflection anywhere in the crate.
//!
//! Property getters and setters interchange [`Value`]s. The `set`
//! function returns `false` on a type mismatch instead of erring, so a
//! caller can retry with a differently-converted value and finally skip
//! the property with a diagnostic.

use std::any::Any;

use trellis_core::{ObjectId, Uri, Value};

/// A type whose instances can be mapped to and from store nodes.
///
/// Implemented by the `mapped_class!` macro; rarely by hand.
pub trait Mapped: Any + Send {
    /// The registered class name, e.g. `"app::Person"`.
    fn class_name(&self) -> &'static str;

    /// The static property table for this instance's class.
    fn descriptor(&self) -> &'static ClassDescriptor;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Static access to a class's descriptor without an instance.
pub trait Described {
    fn class_descriptor() -> &'static ClassDescriptor;
}

/// One property of a mapped class.
pub struct PropertyDescriptor {
    /// Property name, also the default basis for its predicate URI.
    pub name: &'static str,
    /// Value type name, e.g. `"String"`, `"i64"`, `"ObjectRef"`,
    /// `"Vec<Uri>"`. Container registrations key on this.
    pub type_name: &'static str,
    /// Read the property. `None` when the instance is not of the
    /// descriptor's class.
    pub get: fn(&dyn Mapped) -> Option<Value>,
    /// Write the property. `false` when the value cannot convert to the
    /// property's type.
    pub set: fn(&mut dyn Mapped, Value) -> bool,
}

/// The static property table of one mapped class.
pub struct ClassDescriptor {
    pub class_name: &'static str,
    pub properties: &'static [PropertyDescriptor],
}

impl ClassDescriptor {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&'static PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Read a property by name.
pub fn get_property(obj: &dyn Mapped, name: &str) -> Option<Value> {
    let prop = obj.descriptor().property(name)?;
    (prop.get)(obj)
}

/// Write a property by name. `false` when the property does not exist
/// or the value cannot convert.
pub fn set_property(obj: &mut dyn Mapped, name: &str, value: Value) -> bool {
    match obj.descriptor().property(name) {
        Some(prop) => (prop.set)(obj, value),
        None => false,
    }
}

/// The uri property of an object, when present and set.
pub fn object_uri(obj: &dyn Mapped) -> Option<Uri> {
    match get_property(obj, "uri") {
        Some(Value::Uri(u)) if !u.is_empty() => Some(u),
        _ => None,
    }
}

/// Conversion between a field type and [`Value`], with the type name
/// the descriptor table carries.
pub trait PropertyValue: Sized {
    const TYPE_NAME: &'static str;

    fn to_value(&self) -> Value;

    /// Strict conversion; `None` on shape mismatch. Lenient datatype
    /// fallbacks live in the codec (`Node::to_value_as`), not here.
    fn from_value(v: Value) -> Option<Self>;
}

impl PropertyValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl PropertyValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn to_value(&self) -> Value {
        Value::Long(*self)
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Long(n) => Some(n),
            Value::ULong(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }
}

impl PropertyValue for u64 {
    const TYPE_NAME: &'static str = "u64";

    fn to_value(&self) -> Value {
        Value::ULong(*self)
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::ULong(n) => Some(n),
            Value::Long(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }
}

impl PropertyValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Double(d) => Some(d),
            Value::Long(n) => Some(n as f64),
            Value::ULong(n) => Some(n as f64),
            _ => None,
        }
    }
}

impl PropertyValue for String {
    const TYPE_NAME: &'static str = "String";

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl PropertyValue for Uri {
    const TYPE_NAME: &'static str = "Uri";

    fn to_value(&self) -> Value {
        Value::Uri(self.clone())
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Uri(u) => Some(u),
            _ => None,
        }
    }
}

/// An optional reference to another mapped object.
impl PropertyValue for Option<ObjectId> {
    const TYPE_NAME: &'static str = "ObjectRef";

    fn to_value(&self) -> Value {
        match self {
            Some(id) => Value::Object(*id),
            None => Value::Nothing,
        }
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Object(id) => Some(Some(id)),
            Value::Nothing => Some(None),
            _ => None,
        }
    }
}

macro_rules! vec_property_value {
    ($elem:ty, $name:literal) => {
        impl PropertyValue for Vec<$elem> {
            const TYPE_NAME: &'static str = $name;

            fn to_value(&self) -> Value {
                Value::List(self.iter().map(PropertyValue::to_value).collect())
            }

            fn from_value(v: Value) -> Option<Self> {
                match v {
                    Value::List(items) => items
                        .into_iter()
                        .map(<$elem as PropertyValue>::from_value)
                        .collect(),
                    Value::Nothing => Some(Vec::new()),
                    other => <$elem as PropertyValue>::from_value(other).map(|x| vec![x]),
                }
            }
        }
    };
}

vec_property_value!(bool, "Vec<bool>");
vec_property_value!(i64, "Vec<i64>");
vec_property_value!(u64, "Vec<u64>");
vec_property_value!(f64, "Vec<f64>");
vec_property_value!(String, "Vec<String>");
vec_property_value!(Uri, "Vec<Uri>");

/// A list of references to other mapped objects.
impl PropertyValue for Vec<ObjectId> {
    const TYPE_NAME: &'static str = "Vec<ObjectRef>";

    fn to_value(&self) -> Value {
        Value::List(self.iter().copied().map(Value::Object).collect())
    }

    fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::List(items) => items.into_iter().map(|i| i.as_object()).collect(),
            Value::Nothing => Some(Vec::new()),
            Value::Object(id) => Some(vec![id]),
            _ => None,
        }
    }
}

/// True for the property (or container element) type name carrying an
/// object reference.
pub(crate) fn is_object_ref(type_name: &str) -> bool {
    type_name == "ObjectRef"
}

/// Declare a mapped struct.
///
/// Generates the struct (all fields public, `Default` + `Clone` +
/// `Debug` + `PartialEq` derived) together with its `Mapped` and
/// `Described` implementations:
///
/// ```ignore
/// mapped_class! {
///     /// A person in the address book.
///     pub struct Person: "app::Person" {
///         uri: Uri,
///         name: String,
///         age: i64,
///     }
/// }
/// ```
///
/// Field types must implement [`PropertyValue`]. A field named `uri` of
/// type `Uri` identifies the instance's node; the mapper requires one
/// on any object passed to `manage`.
#[macro_export]
macro_rules! mapped_class {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $class:literal {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* pub $field: $fty, )*
        }

        impl $crate::Described for $name {
            fn class_descriptor() -> &'static $crate::ClassDescriptor {
                static PROPERTIES: &[$crate::PropertyDescriptor] = &[
                    $(
                        $crate::PropertyDescriptor {
                            name: stringify!($field),
                            type_name: <$fty as $crate::PropertyValue>::TYPE_NAME,
                            get: |obj| {
                                obj.as_any()
                                    .downcast_ref::<$name>()
                                    .map(|me| $crate::PropertyValue::to_value(&me.$field))
                            },
                            set: |obj, value| {
                                match obj.as_any_mut().downcast_mut::<$name>() {
                                    Some(me) => {
                                        match <$fty as $crate::PropertyValue>::from_value(value) {
                                            Some(converted) => {
                                                me.$field = converted;
                                                true
                                            }
                                            None => false,
                                        }
                                    }
                                    None => false,
                                }
                            },
                        },
                    )*
                ];
                static DESCRIPTOR: $crate::ClassDescriptor = $crate::ClassDescriptor {
                    class_name: $class,
                    properties: PROPERTIES,
                };
                &DESCRIPTOR
            }
        }

        impl $crate::Mapped for $name {
            fn class_name(&self) -> &'static str {
                $class
            }

            fn descriptor(&self) -> &'static $crate::ClassDescriptor {
                <Self as $crate::Described>::class_descriptor()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    mapped_class! {
        /// Test fixture.
        pub struct Widget: "test::Widget" {
            uri: Uri,
            label: String,
            size: i64,
            tags: Vec<String>,
            owner: Option<ObjectId>,
        }
    }

    #[test]
    fn descriptor_table_lists_fields_in_order() {
        let desc = Widget::class_descriptor();
        assert_eq!(desc.class_name, "test::Widget");
        let names: Vec<&str> = desc.properties.iter().map(|p| p.name).collect();
        assert_eq!(names, ["uri", "label", "size", "tags", "owner"]);
        assert_eq!(desc.property("size").unwrap().type_name, "i64");
        assert_eq!(desc.property("tags").unwrap().type_name, "Vec<String>");
        assert_eq!(desc.property("owner").unwrap().type_name, "ObjectRef");
        assert!(desc.property("missing").is_none());
    }

    #[test]
    fn get_and_set_round_trip() {
        let mut w = Widget {
            label: "knob".into(),
            size: 3,
            ..Widget::default()
        };
        assert_eq!(
            get_property(&w, "label"),
            Some(Value::String("knob".into()))
        );
        assert!(set_property(&mut w, "size", Value::Long(5)));
        assert_eq!(w.size, 5);

        // Mismatched value: set refuses, field untouched.
        assert!(!set_property(&mut w, "size", Value::String("five".into())));
        assert_eq!(w.size, 5);
    }

    #[test]
    fn object_uri_requires_a_set_uri() {
        let mut w = Widget::default();
        assert!(object_uri(&w).is_none());
        w.uri = Uri::new("http://example.com/w1").unwrap();
        assert_eq!(object_uri(&w).unwrap().as_str(), "http://example.com/w1");
    }

    #[test]
    fn list_and_ref_conversions() {
        let mut w = Widget::default();
        assert!(set_property(
            &mut w,
            "tags",
            Value::List(vec![Value::String("a".into()), Value::String("b".into())])
        ));
        assert_eq!(w.tags, vec!["a", "b"]);

        let id = ObjectId::new(4, 1);
        assert!(set_property(&mut w, "owner", Value::Object(id)));
        assert_eq!(w.owner, Some(id));
        assert!(set_property(&mut w, "owner", Value::Nothing));
        assert_eq!(w.owner, None);
    }
}
