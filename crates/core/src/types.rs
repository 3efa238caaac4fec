//! Type descriptors and the custom-type extension point.
//!
//! [`AttrType`] mirrors the payload kinds of [`crate::value::Payload`].
//! A concrete deployment may extend the closed base set with custom
//! types: a custom type declares its wire shape (base descriptor) and
//! hooks for conversion, native validation, and semantic equality. The
//! engine dispatches through [`CustomType`] without knowing the
//! concrete type.

use crate::diagnostics::Diagnostics;
use crate::error::ConversionError;
use crate::path::Path;
use crate::value::{Payload, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The declared type of an attribute value position.
#[derive(Debug, Clone)]
pub enum AttrType {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List(Box<AttrType>),
    Set(Box<AttrType>),
    Map(Box<AttrType>),
    Object(BTreeMap<String, AttrType>),
    /// Open-ended: the concrete shape is resolved at runtime from the
    /// wire value.
    Dynamic,
    /// A registered custom type wrapping a base descriptor.
    Custom(Arc<dyn CustomType>),
}

impl AttrType {
    /// The element type of a list/set/map descriptor.
    pub fn element_type(&self) -> Option<&AttrType> {
        match self {
            AttrType::List(element) | AttrType::Set(element) | AttrType::Map(element) => {
                Some(element)
            }
            _ => None,
        }
    }

    /// The declared field types of an object descriptor.
    pub fn object_fields(&self) -> Option<&BTreeMap<String, AttrType>> {
        match self {
            AttrType::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Resolves custom types to their declared wire shape; base types
    /// are their own shape.
    pub fn wire_shape(&self) -> AttrType {
        match self {
            AttrType::Custom(custom) => custom.base(),
            other => other.clone(),
        }
    }

    /// Type-defined looser equality, used to suppress reported drift
    /// when two known values differ only in representation. Base types
    /// fall back to structural equality; custom types may override.
    ///
    /// Both sides must be `Known`; any other state falls back to
    /// structural comparison.
    pub fn semantic_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Known(pa), Value::Known(pb)) => match self {
                AttrType::Custom(custom) => custom.semantic_equal(pa, pb),
                _ => pa == pb,
            },
            _ => a == b,
        }
    }

    /// Serializes the descriptor to its wire JSON form. Custom types
    /// serialize as their base shape.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrType::Bool => serde_json::json!({ "base": "Bool" }),
            AttrType::Int => serde_json::json!({ "base": "Int" }),
            AttrType::Float => serde_json::json!({ "base": "Float" }),
            AttrType::String => serde_json::json!({ "base": "String" }),
            AttrType::Bytes => serde_json::json!({ "base": "Bytes" }),
            AttrType::List(element) => {
                serde_json::json!({ "base": "List", "element": element.to_json() })
            }
            AttrType::Set(element) => {
                serde_json::json!({ "base": "Set", "element": element.to_json() })
            }
            AttrType::Map(element) => {
                serde_json::json!({ "base": "Map", "element": element.to_json() })
            }
            AttrType::Object(fields) => {
                let fields: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                serde_json::json!({ "base": "Object", "fields": fields })
            }
            AttrType::Dynamic => serde_json::json!({ "base": "Dynamic" }),
            AttrType::Custom(custom) => custom.base().to_json(),
        }
    }

    /// Parses a descriptor from its wire JSON form. Custom types are a
    /// registration-time concept and never arrive over the wire.
    pub fn from_json(raw: &serde_json::Value) -> Result<AttrType, ConversionError> {
        let obj = raw.as_object().ok_or_else(|| {
            ConversionError::new("type descriptor", "received a non-object descriptor")
        })?;
        let base = obj.get("base").and_then(|b| b.as_str()).ok_or_else(|| {
            ConversionError::new("type descriptor", "descriptor missing 'base' field")
        })?;

        let element = || -> Result<Box<AttrType>, ConversionError> {
            let element = obj.get("element").ok_or_else(|| {
                ConversionError::new(
                    "type descriptor",
                    format!("{} descriptor missing 'element' field", base),
                )
            })?;
            Ok(Box::new(AttrType::from_json(element)?))
        };

        match base {
            "Bool" => Ok(AttrType::Bool),
            "Int" => Ok(AttrType::Int),
            "Float" => Ok(AttrType::Float),
            "String" => Ok(AttrType::String),
            "Bytes" => Ok(AttrType::Bytes),
            "List" => Ok(AttrType::List(element()?)),
            "Set" => Ok(AttrType::Set(element()?)),
            "Map" => Ok(AttrType::Map(element()?)),
            "Object" => {
                let fields_obj = obj.get("fields").and_then(|f| f.as_object()).ok_or_else(
                    || {
                        ConversionError::new(
                            "type descriptor",
                            "Object descriptor missing 'fields' object",
                        )
                    },
                )?;
                let mut fields = BTreeMap::new();
                for (name, field) in fields_obj {
                    fields.insert(name.clone(), AttrType::from_json(field)?);
                }
                Ok(AttrType::Object(fields))
            }
            "Dynamic" => Ok(AttrType::Dynamic),
            other => Err(ConversionError::new(
                "type descriptor",
                format!("unknown base type '{}'", other),
            )),
        }
    }
}

impl PartialEq for AttrType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrType::Bool, AttrType::Bool)
            | (AttrType::Int, AttrType::Int)
            | (AttrType::Float, AttrType::Float)
            | (AttrType::String, AttrType::String)
            | (AttrType::Bytes, AttrType::Bytes)
            | (AttrType::Dynamic, AttrType::Dynamic) => true,
            (AttrType::List(a), AttrType::List(b))
            | (AttrType::Set(a), AttrType::Set(b))
            | (AttrType::Map(a), AttrType::Map(b)) => a == b,
            (AttrType::Object(a), AttrType::Object(b)) => a == b,
            // Custom types compare by name and declared wire shape.
            (AttrType::Custom(a), AttrType::Custom(b)) => {
                a.name() == b.name() && a.base() == b.base()
            }
            _ => false,
        }
    }
}

impl Eq for AttrType {}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool => write!(f, "Bool"),
            AttrType::Int => write!(f, "Int"),
            AttrType::Float => write!(f, "Float"),
            AttrType::String => write!(f, "String"),
            AttrType::Bytes => write!(f, "Bytes"),
            AttrType::List(element) => write!(f, "List<{}>", element),
            AttrType::Set(element) => write!(f, "Set<{}>", element),
            AttrType::Map(element) => write!(f, "Map<{}>", element),
            AttrType::Object(_) => write!(f, "Object"),
            AttrType::Dynamic => write!(f, "Dynamic"),
            AttrType::Custom(custom) => write!(f, "{}", custom.name()),
        }
    }
}

/// The custom-type extension point.
///
/// Every concrete type must declare both its wire shape ([`base`]) and
/// the value kind it produces ([`convert`]). The validation and native
/// equality hooks are optional.
///
/// [`base`]: CustomType::base
/// [`convert`]: CustomType::convert
pub trait CustomType: fmt::Debug + Send + Sync {
    /// Stable type name, used for descriptor equality and display.
    fn name(&self) -> &str;

    /// The base wire shape this type is encoded as.
    fn base(&self) -> AttrType;

    /// Converts a raw wire value into the concrete value kind this
    /// type produces.
    fn convert(&self, raw: &serde_json::Value) -> Result<Value, ConversionError>;

    /// Native validation run against the raw wire value before the
    /// generic validator chain. Defaults to no diagnostics.
    fn validate_from_wire(&self, _path: &Path, _raw: &serde_json::Value) -> Diagnostics {
        Diagnostics::new()
    }

    /// Looser, type-defined equality over known payloads. Defaults to
    /// structural comparison.
    fn semantic_equal(&self, a: &Payload, b: &Payload) -> bool {
        a == b
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A custom string type that compares case-insensitively and
    /// rejects empty strings natively.
    #[derive(Debug)]
    pub(crate) struct UppercaseString;

    impl CustomType for UppercaseString {
        fn name(&self) -> &str {
            "UppercaseString"
        }

        fn base(&self) -> AttrType {
            AttrType::String
        }

        fn convert(&self, raw: &serde_json::Value) -> Result<Value, ConversionError> {
            match raw {
                serde_json::Value::Null => Ok(Value::Null),
                serde_json::Value::String(s) => Ok(Value::string(s.to_uppercase())),
                other => Err(ConversionError::new(
                    "UppercaseString",
                    format!("received {}", other),
                )),
            }
        }

        fn validate_from_wire(&self, path: &Path, raw: &serde_json::Value) -> Diagnostics {
            let mut diags = Diagnostics::new();
            if raw.as_str().is_some_and(|s| s.is_empty()) {
                diags.add_attribute_error(
                    path.clone(),
                    "Invalid UppercaseString",
                    "The value must not be empty.",
                );
            }
            diags
        }

        fn semantic_equal(&self, a: &Payload, b: &Payload) -> bool {
            match (a, b) {
                (Payload::String(a), Payload::String(b)) => a.eq_ignore_ascii_case(b),
                _ => a == b,
            }
        }
    }

    #[test]
    fn custom_types_compare_by_name_and_base() {
        let a = AttrType::Custom(Arc::new(UppercaseString));
        let b = AttrType::Custom(Arc::new(UppercaseString));
        assert_eq!(a, b);
        assert_ne!(a, AttrType::String);
    }

    #[test]
    fn semantic_equal_defaults_to_structural() {
        let ty = AttrType::String;
        assert!(ty.semantic_equal(&Value::string("x"), &Value::string("x")));
        assert!(!ty.semantic_equal(&Value::string("x"), &Value::string("X")));
    }

    #[test]
    fn custom_semantic_equal_overrides() {
        let ty = AttrType::Custom(Arc::new(UppercaseString));
        assert!(ty.semantic_equal(&Value::string("abc"), &Value::string("ABC")));
        assert!(!ty.semantic_equal(&Value::string("abc"), &Value::string("abd")));
    }

    #[test]
    fn descriptor_json_round_trip() {
        let mut fields = BTreeMap::new();
        fields.insert("enabled".to_string(), AttrType::Bool);
        fields.insert(
            "tags".to_string(),
            AttrType::Set(Box::new(AttrType::String)),
        );
        let ty = AttrType::Map(Box::new(AttrType::Object(fields)));
        let parsed = AttrType::from_json(&ty.to_json()).unwrap();
        assert_eq!(parsed, ty);
    }

    #[test]
    fn descriptor_json_rejects_unknown_base() {
        let err = AttrType::from_json(&serde_json::json!({ "base": "Tuple" })).unwrap_err();
        assert!(err.message.contains("unknown base type"));
    }

    #[test]
    fn wire_shape_resolves_custom_base() {
        let ty = AttrType::Custom(Arc::new(UppercaseString));
        assert_eq!(ty.wire_shape(), AttrType::String);
    }
}
