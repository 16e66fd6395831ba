//! Conversions between nodes and dynamically-typed values.
//!
//! The `DatatypeRegistry` associates datatype URIs with value type names
//! and the encoder functions converting between literal strings and
//! `Value`s. One registry instance is constructed explicitly and shared by
//! whoever needs conversions; there is no process-wide table.
//!
//! The built-in associations are deliberately asymmetric, mirroring common
//! RDF practice: `xsd:string` decodes to a string but strings encode as
//! *untyped* literals (`"x"` and `"x"^^xsd:string` compare differently and
//! plain literals interoperate better), and both float and double encode
//! as `xsd:decimal` while all three decode to a double.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::uri::Uri;
use crate::value::Value;

/// Decoder from a literal value string to a typed value.
pub type DecodeFn = Box<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Encoder from a typed value to a literal value string.
pub type EncodeFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// An encoder/decoder pair for one datatype association.
pub struct ValueEncoder {
    /// Literal string to value
    pub decode: DecodeFn,
    /// Value to literal string
    pub encode: EncodeFn,
}

struct DatatypeBinding {
    type_name: String,
    decode: DecodeFn,
}

struct TypeBinding {
    datatype: Option<Uri>,
    decode: DecodeFn,
    encode: EncodeFn,
}

/// Registry of datatype URI to value type associations.
pub struct DatatypeRegistry {
    by_datatype: FxHashMap<Uri, DatatypeBinding>,
    by_type_name: FxHashMap<String, TypeBinding>,
}

fn xsd(name: &str) -> Uri {
    Uri::from_expanded(format!("{}{name}", trellis_vocab::namespaces::XSD))
}

fn decode_string(s: &str) -> Option<Value> {
    Some(Value::String(s.to_string()))
}

fn decode_bool(s: &str) -> Option<Value> {
    Some(Value::Bool(s == "true" || s == "1"))
}

fn decode_long(s: &str) -> Option<Value> {
    s.parse::<i64>().ok().map(Value::Long)
}

fn decode_ulong(s: &str) -> Option<Value> {
    s.parse::<u64>().ok().map(Value::ULong)
}

fn decode_double(s: &str) -> Option<Value> {
    s.parse::<f64>().ok().map(Value::Double)
}

fn decode_uri(s: &str) -> Option<Value> {
    Uri::new(s).ok().map(Value::Uri)
}

fn encode_display(v: &Value) -> Option<String> {
    match v {
        Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        Value::Long(n) => Some(n.to_string()),
        Value::ULong(n) => Some(n.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Uri(u) => Some(u.as_str().to_string()),
        _ => None,
    }
}

impl DatatypeRegistry {
    /// Construct a registry with the built-in XSD associations.
    pub fn new() -> Self {
        let mut r = DatatypeRegistry {
            by_datatype: FxHashMap::default(),
            by_type_name: FxHashMap::default(),
        };

        // Reading: datatype -> value
        r.bind_datatype(xsd("string"), "String", Box::new(decode_string));
        r.bind_datatype(xsd("boolean"), "bool", Box::new(decode_bool));
        r.bind_datatype(xsd("int"), "i64", Box::new(decode_long));
        r.bind_datatype(xsd("long"), "i64", Box::new(decode_long));
        r.bind_datatype(xsd("integer"), "i64", Box::new(decode_long));
        r.bind_datatype(xsd("unsignedInt"), "u64", Box::new(decode_ulong));
        r.bind_datatype(xsd("unsignedLong"), "u64", Box::new(decode_ulong));
        r.bind_datatype(xsd("nonNegativeInteger"), "u64", Box::new(decode_ulong));
        r.bind_datatype(xsd("float"), "f64", Box::new(decode_double));
        r.bind_datatype(xsd("double"), "f64", Box::new(decode_double));
        r.bind_datatype(xsd("decimal"), "f64", Box::new(decode_double));

        // Writing: type name -> datatype (strings stay untyped)
        r.bind_type("bool", Some(xsd("boolean")), Box::new(decode_bool));
        r.bind_type("i64", Some(xsd("integer")), Box::new(decode_long));
        r.bind_type("i32", Some(xsd("integer")), Box::new(decode_long));
        r.bind_type("u64", Some(xsd("integer")), Box::new(decode_ulong));
        r.bind_type("u32", Some(xsd("integer")), Box::new(decode_ulong));
        r.bind_type("f64", Some(xsd("decimal")), Box::new(decode_double));
        r.bind_type("f32", Some(xsd("decimal")), Box::new(decode_double));
        r.bind_type("String", None, Box::new(decode_string));
        r.bind_type("Uri", None, Box::new(decode_uri));

        r
    }

    fn bind_datatype(&mut self, datatype: Uri, type_name: &str, decode: DecodeFn) {
        self.by_datatype.insert(
            datatype,
            DatatypeBinding {
                type_name: type_name.to_string(),
                decode,
            },
        );
    }

    fn bind_type(&mut self, type_name: &str, datatype: Option<Uri>, decode: DecodeFn) {
        self.by_type_name.insert(
            type_name.to_string(),
            TypeBinding {
                datatype,
                decode,
                encode: Box::new(encode_display),
            },
        );
    }

    /// Register an association between a datatype URI and a value type.
    ///
    /// After registration, literals of the datatype decode through the
    /// encoder, and `Value::Opaque` values carrying the type name encode
    /// to literals of the datatype instead of the reserved fallback. The
    /// association is symmetric, unlike the built-in table.
    pub fn register_datatype(
        &mut self,
        datatype: Uri,
        type_name: impl Into<String>,
        encoder: ValueEncoder,
    ) {
        let type_name = type_name.into();
        let ValueEncoder { decode, encode } = encoder;
        // Both directions need the decoder; share via a second lookup on use.
        self.by_datatype.insert(
            datatype.clone(),
            DatatypeBinding {
                type_name: type_name.clone(),
                decode,
            },
        );
        self.by_type_name.insert(
            type_name,
            TypeBinding {
                datatype: Some(datatype),
                decode: Box::new(|_| None),
                encode,
            },
        );
    }

    /// The datatype URI registered for a value type name, if any.
    pub fn datatype_for_type_name(&self, type_name: &str) -> Option<&Uri> {
        self.by_type_name
            .get(type_name)
            .and_then(|b| b.datatype.as_ref())
    }

    /// The value type name registered for a datatype URI, if any.
    pub fn type_name_for_datatype(&self, datatype: &Uri) -> Option<&str> {
        self.by_datatype
            .get(datatype)
            .map(|b| b.type_name.as_str())
    }

    fn decode_literal(&self, datatype: &Uri, raw: &str) -> Option<Value> {
        let binding = self.by_datatype.get(datatype)?;
        (binding.decode)(raw)
    }

    fn decode_as(&self, type_name: &str, raw: &str) -> Option<Value> {
        let binding = self.by_type_name.get(type_name)?;
        if let Some(v) = (binding.decode)(raw) {
            return Some(v);
        }
        // Custom registrations keep their decoder on the datatype side.
        let dt = binding.datatype.as_ref()?;
        self.decode_literal(dt, raw)
    }

    fn encode_opaque_typed(&self, type_name: &str, v: &Value) -> Option<(String, Uri)> {
        let binding = self.by_type_name.get(type_name)?;
        let dt = binding.datatype.clone()?;
        let s = (binding.encode)(v)?;
        Some((s, dt))
    }
}

impl Default for DatatypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape of the reserved encoded-value literal payload.
#[derive(Serialize, Deserialize)]
struct Payload {
    #[serde(rename = "type")]
    type_name: String,
    value: JsonValue,
}

fn encoded_value_datatype() -> Uri {
    Uri::from_expanded(trellis_vocab::datatype::ENCODED_VALUE)
}

fn to_payload(v: &Value) -> Result<Payload> {
    let (type_name, value) = match v {
        Value::Nothing => ("Nothing".to_string(), JsonValue::Null),
        Value::Bool(b) => ("bool".to_string(), JsonValue::from(*b)),
        Value::Long(n) => ("i64".to_string(), JsonValue::from(*n)),
        Value::ULong(n) => ("u64".to_string(), JsonValue::from(*n)),
        Value::Double(d) => ("f64".to_string(), JsonValue::from(*d)),
        Value::String(s) => ("String".to_string(), JsonValue::from(s.clone())),
        Value::Uri(u) => ("Uri".to_string(), JsonValue::from(u.as_str())),
        Value::List(items) => {
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(serde_json::to_value(to_payload(item)?).map_err(|e| {
                    Error::internal(format!("failed to encode list payload: {e}"))
                })?);
            }
            ("List".to_string(), JsonValue::Array(encoded))
        }
        Value::Opaque { type_name, json } => (type_name.clone(), json.clone()),
        Value::Object(id) => {
            return Err(Error::internal(format!(
                "object reference {id} cannot be encoded as a literal"
            )))
        }
    };
    Ok(Payload { type_name, value })
}

fn from_payload(p: Payload) -> Value {
    match p.type_name.as_str() {
        "Nothing" => Value::Nothing,
        "bool" => p.value.as_bool().map(Value::Bool).unwrap_or_default(),
        "i64" => p.value.as_i64().map(Value::Long).unwrap_or_default(),
        "u64" => p.value.as_u64().map(Value::ULong).unwrap_or_default(),
        "f64" => p.value.as_f64().map(Value::Double).unwrap_or_default(),
        "String" => match p.value {
            JsonValue::String(s) => Value::String(s),
            _ => Value::Nothing,
        },
        "Uri" => p
            .value
            .as_str()
            .and_then(|s| Uri::new(s).ok())
            .map(Value::Uri)
            .unwrap_or_default(),
        "List" => match p.value {
            JsonValue::Array(items) => Value::List(
                items
                    .into_iter()
                    .filter_map(|j| serde_json::from_value::<Payload>(j).ok())
                    .map(from_payload)
                    .collect(),
            ),
            _ => Value::Nothing,
        },
        _ => Value::Opaque {
            type_name: p.type_name,
            json: p.value,
        },
    }
}

fn encode_opaque_literal(v: &Value) -> Result<Node> {
    let payload = to_payload(v)?;
    let bytes = serde_json::to_vec(&payload)
        .map_err(|e| Error::internal(format!("failed to encode opaque literal: {e}")))?;
    Ok(Node::typed_literal(
        BASE64.encode(bytes),
        encoded_value_datatype(),
    ))
}

fn decode_opaque_literal(raw: &str) -> Option<Value> {
    let bytes = BASE64.decode(raw).ok()?;
    let payload: Payload = serde_json::from_slice(&bytes).ok()?;
    Some(from_payload(payload))
}

impl Node {
    /// Convert a value to a node.
    ///
    /// Scalars become literals with the built-in XSD datatypes, strings
    /// become untyped literals, URIs become URI nodes. Opaque values with
    /// a registered datatype encode through their registered encoder; any
    /// other opaque value, and lists, fall back to the reserved
    /// encoded-value literal, so every value without an object reference
    /// is representable. Object references are refused.
    pub fn from_value(v: &Value, registry: &DatatypeRegistry) -> Result<Node> {
        match v {
            Value::Nothing => Ok(Node::Nothing),
            Value::Uri(u) => Ok(Node::Uri(u.clone())),
            Value::Bool(_) | Value::Long(_) | Value::ULong(_) | Value::Double(_) => {
                let type_name = match v {
                    Value::Bool(_) => "bool",
                    Value::Long(_) => "i64",
                    Value::ULong(_) => "u64",
                    _ => "f64",
                };
                match registry.encode_opaque_typed(type_name, v) {
                    Some((s, dt)) => Ok(Node::typed_literal(s, dt)),
                    None => encode_opaque_literal(v),
                }
            }
            Value::String(s) => Ok(Node::literal(s.clone())),
            Value::Opaque { type_name, .. } => {
                match registry.encode_opaque_typed(type_name, v) {
                    Some((s, dt)) => Ok(Node::typed_literal(s, dt)),
                    None => encode_opaque_literal(v),
                }
            }
            Value::List(_) => encode_opaque_literal(v),
            Value::Object(id) => Err(Error::internal(format!(
                "object reference {id} cannot be stored as a literal node"
            ))),
        }
    }

    /// Convert a node to a value.
    ///
    /// URI nodes become `Value::Uri`; untyped literals become strings;
    /// typed literals decode through the registry, falling back to the
    /// raw string for unknown datatypes. The reserved encoded-value
    /// datatype always decodes through the opaque path, even when the
    /// embedded type is otherwise known. Blank and wildcard nodes have no
    /// value.
    pub fn to_value(&self, registry: &DatatypeRegistry) -> Value {
        match self {
            Node::Nothing | Node::Blank(_) => Value::Nothing,
            Node::Uri(u) => Value::Uri(u.clone()),
            Node::Literal {
                value,
                datatype: None,
            } => Value::String(value.clone()),
            Node::Literal {
                value,
                datatype: Some(dt),
            } => {
                if *dt == encoded_value_datatype() {
                    return decode_opaque_literal(value).unwrap_or_else(|| {
                        debug!(literal = %value, "undecodable encoded-value literal");
                        Value::Nothing
                    });
                }
                match registry.decode_literal(dt, value) {
                    Some(v) => v,
                    None => Value::String(value.clone()),
                }
            }
        }
    }

    /// Convert a node to a value with an explicit target type name,
    /// overriding the conversion the node's own datatype would choose.
    ///
    /// Used when the node carries no datatype (or is a URI) but the
    /// receiving property has a known type. Returns `None` when the
    /// registry has no decoder for the type or the decode fails.
    pub fn to_value_as(&self, type_name: &str, registry: &DatatypeRegistry) -> Option<Value> {
        let raw = match self {
            Node::Uri(u) => u.as_str(),
            Node::Literal { value, .. } => value.as_str(),
            Node::Nothing | Node::Blank(_) => return None,
        };
        registry.decode_as(type_name, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> DatatypeRegistry {
        DatatypeRegistry::new()
    }

    #[test]
    fn scalars_round_trip_with_xsd_datatypes() {
        let r = reg();
        let n = Node::from_value(&Value::Long(-17), &r).unwrap();
        assert_eq!(n, Node::typed_literal("-17", xsd("integer")));
        assert_eq!(n.to_value(&r), Value::Long(-17));

        let n = Node::from_value(&Value::Bool(true), &r).unwrap();
        assert_eq!(n, Node::typed_literal("true", xsd("boolean")));
        assert_eq!(n.to_value(&r), Value::Bool(true));

        let n = Node::from_value(&Value::Double(2.5), &r).unwrap();
        assert_eq!(n, Node::typed_literal("2.5", xsd("decimal")));
        assert_eq!(n.to_value(&r), Value::Double(2.5));
    }

    #[test]
    fn strings_encode_untyped_but_xsd_string_decodes() {
        let r = reg();
        let n = Node::from_value(&Value::String("hi".into()), &r).unwrap();
        assert_eq!(n, Node::literal("hi"));
        assert_eq!(n.to_value(&r), Value::String("hi".into()));

        let typed = Node::typed_literal("hi", xsd("string"));
        assert_eq!(typed.to_value(&r), Value::String("hi".into()));
    }

    #[test]
    fn unknown_datatype_decodes_as_raw_string() {
        let r = reg();
        let n = Node::typed_literal("payload", Uri::new("http://example.com/dt").unwrap());
        assert_eq!(n.to_value(&r), Value::String("payload".into()));
    }

    #[test]
    fn opaque_values_survive_the_reserved_encoding() {
        let r = reg();
        let v = Value::Opaque {
            type_name: "app::Shape".into(),
            json: serde_json::json!({"sides": 5}),
        };
        let n = Node::from_value(&v, &r).unwrap();
        match &n {
            Node::Literal {
                datatype: Some(dt), ..
            } => assert_eq!(dt.as_str(), trellis_vocab::datatype::ENCODED_VALUE),
            other => panic!("expected encoded literal, got {other}"),
        }
        assert_eq!(n.to_value(&r), v);
    }

    #[test]
    fn lists_of_scalars_survive_the_reserved_encoding() {
        let r = reg();
        let v = Value::List(vec![Value::Long(1), Value::String("two".into())]);
        let n = Node::from_value(&v, &r).unwrap();
        assert_eq!(n.to_value(&r), v);
    }

    #[test]
    fn object_references_are_refused() {
        let r = reg();
        let v = Value::Object(crate::value::ObjectId::new(0, 1));
        assert!(Node::from_value(&v, &r).is_err());
    }

    #[test]
    fn registered_custom_datatype_is_symmetric() {
        let mut r = reg();
        let dt = Uri::new("http://example.com/datatype/point").unwrap();
        r.register_datatype(
            dt.clone(),
            "app::Point",
            ValueEncoder {
                decode: Box::new(|s| {
                    let (x, y) = s.split_once(',')?;
                    Some(Value::Opaque {
                        type_name: "app::Point".into(),
                        json: serde_json::json!([x.parse::<i64>().ok()?, y.parse::<i64>().ok()?]),
                    })
                }),
                encode: Box::new(|v| match v {
                    Value::Opaque { json, .. } => {
                        let x = json.get(0)?.as_i64()?;
                        let y = json.get(1)?.as_i64()?;
                        Some(format!("{x},{y}"))
                    }
                    _ => None,
                }),
            },
        );

        let v = Value::Opaque {
            type_name: "app::Point".into(),
            json: serde_json::json!([3, 4]),
        };
        let n = Node::from_value(&v, &r).unwrap();
        assert_eq!(n, Node::typed_literal("3,4", dt));
        assert_eq!(n.to_value(&r), v);
    }

    #[test]
    fn to_value_as_converts_untyped_and_uri_sources() {
        let r = reg();
        let n = Node::literal("4.5");
        assert_eq!(n.to_value_as("f64", &r), Some(Value::Double(4.5)));
        assert_eq!(n.to_value_as("String", &r), Some(Value::String("4.5".into())));

        let u = Node::Uri(Uri::new("http://example.com/x").unwrap());
        assert_eq!(
            u.to_value_as("String", &r),
            Some(Value::String("http://example.com/x".into()))
        );
        assert_eq!(n.to_value_as("no::such::type", &r), None);
    }
}
