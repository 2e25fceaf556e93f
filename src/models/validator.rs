//! Raw validator tree
//!
//! Decodes the tagged JSON validator shapes into an explicit sum type.
//! Decoding never fails: anything that does not match a known shape becomes
//! [`Validator::Unrecognized`], which normalizes to `any`.

use serde_json::{Map, Value};

/// Decoding stops descending past this depth regardless of analyzer settings
const MAX_DECODE_DEPTH: usize = 256;

/// One node of a raw validator tree
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Null,
    Number,
    BigInt,
    Boolean,
    String,
    Bytes,
    Any,
    Literal(Value),
    Id { table_name: String },
    Array(Box<Validator>),
    Record {
        keys: Box<Validator>,
        values: Box<ObjectProperty>,
    },
    Union(Vec<Validator>),
    Object(Vec<ObjectProperty>),
    /// A shape that could not be decoded, with the reason
    Unrecognized(String),
}

/// A named member of an object validator (or the value slot of a record)
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub name: String,
    pub validator: Validator,
    pub optional: bool,
}

impl Validator {
    /// Decode a validator from its JSON form
    pub fn from_json(value: &Value) -> Self {
        Self::decode(value, 0)
    }

    /// The tag this validator was decoded from
    pub fn tag(&self) -> &'static str {
        match self {
            Validator::Null => "null",
            Validator::Number => "number",
            Validator::BigInt => "bigint",
            Validator::Boolean => "boolean",
            Validator::String => "string",
            Validator::Bytes => "bytes",
            Validator::Any => "any",
            Validator::Literal(_) => "literal",
            Validator::Id { .. } => "id",
            Validator::Array(_) => "array",
            Validator::Record { .. } => "record",
            Validator::Union(_) => "union",
            Validator::Object(_) => "object",
            Validator::Unrecognized(_) => "unrecognized",
        }
    }

    fn decode(value: &Value, depth: usize) -> Self {
        if depth > MAX_DECODE_DEPTH {
            return Validator::Unrecognized("validator nesting limit reached".to_string());
        }

        let (tag, obj) = match value {
            // Bare tags such as "string" are accepted for scalars
            Value::String(tag) => (tag.as_str(), None),
            Value::Object(obj) => match obj.get("type").and_then(Value::as_str) {
                Some(tag) => (tag, Some(obj)),
                None => return Validator::Unrecognized("missing type tag".to_string()),
            },
            other => {
                return Validator::Unrecognized(format!("unexpected validator value: {}", other))
            }
        };

        match (tag, obj) {
            ("null", _) => Validator::Null,
            ("number" | "float64", _) => Validator::Number,
            ("bigint" | "int64", _) => Validator::BigInt,
            ("boolean" | "bool", _) => Validator::Boolean,
            ("string", _) => Validator::String,
            ("bytes", _) => Validator::Bytes,
            ("any", _) => Validator::Any,
            ("literal", Some(obj)) => match obj.get("value") {
                Some(v) => Validator::Literal(v.clone()),
                None => Validator::Unrecognized("literal without value".to_string()),
            },
            ("id", Some(obj)) => match obj.get("tableName").and_then(Value::as_str) {
                Some(table) if !table.is_empty() => Validator::Id {
                    table_name: table.to_string(),
                },
                _ => Validator::Unrecognized("id without tableName".to_string()),
            },
            ("array", Some(obj)) => match obj.get("value") {
                Some(element) => Validator::Array(Box::new(Self::decode(element, depth + 1))),
                None => Validator::Unrecognized("array without element type".to_string()),
            },
            ("union", Some(obj)) => match obj.get("value").and_then(Value::as_array) {
                Some(members) => Validator::Union(
                    members.iter().map(|m| Self::decode(m, depth + 1)).collect(),
                ),
                None => Validator::Unrecognized("union without members".to_string()),
            },
            ("object", Some(obj)) => match obj.get("value").and_then(Value::as_object) {
                Some(members) => Validator::Object(Self::decode_properties(members, depth)),
                None => Validator::Unrecognized("object without fields".to_string()),
            },
            ("record", Some(obj)) => match (obj.get("keys"), obj.get("values")) {
                (Some(keys), Some(values)) => Validator::Record {
                    keys: Box::new(Self::decode(keys, depth + 1)),
                    values: Box::new(Self::decode_property("values", values, depth)),
                },
                _ => Validator::Unrecognized("record without keys or values".to_string()),
            },
            (other, _) => Validator::Unrecognized(format!("unknown validator type: {}", other)),
        }
    }

    fn decode_properties(members: &Map<String, Value>, depth: usize) -> Vec<ObjectProperty> {
        members
            .iter()
            .map(|(name, member)| Self::decode_property(name, member, depth))
            .collect()
    }

    /// Properties are normally `{fieldType, optional}`; a bare validator is
    /// accepted as a required property.
    fn decode_property(name: &str, member: &Value, depth: usize) -> ObjectProperty {
        match member.get("fieldType") {
            Some(field_type) => ObjectProperty {
                name: name.to_string(),
                validator: Self::decode(field_type, depth + 1),
                optional: member
                    .get("optional")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            None => ObjectProperty {
                name: name.to_string(),
                validator: Self::decode(member, depth + 1),
                optional: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_scalars_and_aliases() {
        assert_eq!(Validator::from_json(&json!({"type": "string"})), Validator::String);
        assert_eq!(Validator::from_json(&json!({"type": "float64"})), Validator::Number);
        assert_eq!(Validator::from_json(&json!({"type": "int64"})), Validator::BigInt);
        assert_eq!(Validator::from_json(&json!("bytes")), Validator::Bytes);
    }

    #[test]
    fn test_decode_object_preserves_declaration_order() {
        let value = json!({
            "type": "object",
            "value": {
                "zeta": {"fieldType": {"type": "string"}, "optional": false},
                "alpha": {"fieldType": {"type": "number"}, "optional": true}
            }
        });

        match Validator::from_json(&value) {
            Validator::Object(props) => {
                let names: Vec<_> = props.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(names, vec!["zeta", "alpha"]);
                assert!(props[1].optional);
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_record() {
        let value = json!({
            "type": "record",
            "keys": {"type": "string"},
            "values": {"fieldType": {"type": "id", "tableName": "users"}, "optional": false}
        });

        match Validator::from_json(&value) {
            Validator::Record { keys, values } => {
                assert_eq!(*keys, Validator::String);
                assert_eq!(
                    values.validator,
                    Validator::Id { table_name: "users".to_string() }
                );
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_shapes_are_unrecognized() {
        let cases = [
            json!({"type": "array"}),
            json!({"type": "id"}),
            json!({"type": "union", "value": "nope"}),
            json!({"type": "mystery"}),
            json!({"value": 1}),
            json!(42),
        ];

        for case in cases {
            assert!(
                matches!(Validator::from_json(&case), Validator::Unrecognized(_)),
                "{} should be unrecognized",
                case
            );
        }
    }
}
