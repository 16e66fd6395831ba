//! Dynamically-typed property values.
//!
//! `Value` is the interchange type between typed application objects and
//! RDF nodes: property getters produce a `Value`, property setters consume
//! one, and the datatype registry converts between values and literal
//! nodes. It plays the role a general-purpose variant type plays in
//! reflection-based object mappers, without any runtime reflection.

use serde_json::Value as JsonValue;
use std::fmt;

use crate::uri::Uri;

/// Opaque handle identifying an object in an external object arena.
///
/// Core never dereferences these; they exist so a `Value` can carry an
/// object reference through property get/set plumbing. The object layer
/// owns allocation and generation checking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Construct a handle from its raw parts.
    pub fn new(index: u32, generation: u32) -> Self {
        ObjectId { index, generation }
    }

    /// Slot index within the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation counter guarding against slot reuse.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A dynamically-typed value.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// Absent / unset value
    #[default]
    Nothing,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Long(i64),
    /// Unsigned integer
    ULong(u64),
    /// Floating point
    Double(f64),
    /// Plain string
    String(String),
    /// Expanded URI
    Uri(Uri),
    /// Ordered list of values (sequence or set containers)
    List(Vec<Value>),
    /// Reference to a live object in an arena
    Object(ObjectId),
    /// Value of a type with no registered datatype, carried as JSON
    Opaque {
        type_name: String,
        json: JsonValue,
    },
}

impl Value {
    /// True for the absent value.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    /// The object handle, when this value carries one.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// The list elements, when this value is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// True when the value contains an object reference anywhere,
    /// directly or inside a list. Such values cannot be encoded as
    /// literal nodes.
    pub fn contains_object(&self) -> bool {
        match self {
            Value::Object(_) => true,
            Value::List(items) => items.iter().any(Value::contains_object),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing => write!(f, "(nothing)"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::ULong(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Uri(u) => write!(f, "{u}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(id) => write!(f, "(object {id})"),
            Value::Opaque { type_name, .. } => write!(f, "(opaque {type_name})"),
        }
    }
}
