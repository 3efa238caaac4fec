//! Tri-state typed values.
//!
//! Every attribute value is `Null` (explicit absence), `Unknown` (a
//! placeholder pending computation), or `Known` with a typed payload.
//! All numeric floating-point payloads use `rust_decimal::Decimal` --
//! never `f64` -- so wire round-trips cannot pick up binary-float noise.
//!
//! Values are immutable once built: validators and plan modifiers
//! produce new values rather than mutating in place.

use crate::error::SchemaError;
use crate::types::AttrType;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A tri-state attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence.
    Null,
    /// Not yet resolved; will be computed later.
    Unknown,
    /// A present, typed payload.
    Known(Payload),
}

/// The payload of a known value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(Decimal),
    String(String),
    Bytes(Vec<u8>),
    /// Ordered element sequence.
    List(Vec<Value>),
    /// Unordered element collection, deduplicated by deep equality.
    /// Insertion order is preserved so traversal stays deterministic.
    Set(Vec<Value>),
    /// String-keyed elements in key order.
    Map(BTreeMap<String, Value>),
    /// Fixed-shape fields in field-name order.
    Object(BTreeMap<String, Value>),
    /// A runtime-typed value; see [`DynamicValue`].
    Dynamic(DynamicValue),
}

impl Payload {
    /// Human-readable kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Bool(_) => "Bool",
            Payload::Int(_) => "Int",
            Payload::Float(_) => "Float",
            Payload::String(_) => "String",
            Payload::Bytes(_) => "Bytes",
            Payload::List(_) => "List",
            Payload::Set(_) => "Set",
            Payload::Map(_) => "Map",
            Payload::Object(_) => "Object",
            Payload::Dynamic(_) => "Dynamic",
        }
    }
}

impl Value {
    pub fn bool(value: bool) -> Self {
        Value::Known(Payload::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Value::Known(Payload::Int(value))
    }

    pub fn float(value: Decimal) -> Self {
        Value::Known(Payload::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::Known(Payload::String(value.into()))
    }

    pub fn bytes(value: Vec<u8>) -> Self {
        Value::Known(Payload::Bytes(value))
    }

    pub fn list(elements: Vec<Value>) -> Self {
        Value::Known(Payload::List(elements))
    }

    /// Builds a set payload, dropping duplicate elements by deep
    /// equality while keeping first-seen order.
    pub fn set(elements: Vec<Value>) -> Self {
        let mut deduplicated: Vec<Value> = Vec::with_capacity(elements.len());
        for element in elements {
            if !deduplicated.contains(&element) {
                deduplicated.push(element);
            }
        }
        Value::Known(Payload::Set(deduplicated))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Known(Payload::Map(entries))
    }

    pub fn object(fields: BTreeMap<String, Value>) -> Self {
        Value::Known(Payload::Object(fields))
    }

    /// Wraps a concrete payload with its runtime type descriptor.
    /// Fails with [`SchemaError::NestedDynamic`] if either side is
    /// itself dynamic.
    pub fn dynamic(inner_type: AttrType, payload: Payload) -> Result<Self, SchemaError> {
        Ok(Value::Known(Payload::Dynamic(DynamicValue::new(
            inner_type, payload,
        )?)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Value::Known(_))
    }

    /// Structural equality. Kind mismatch compares false; dynamic
    /// payloads additionally compare their inner type. Equivalent to
    /// `==`; kept as a named method so call sites mirror the looser
    /// [`AttrType::semantic_equal`] form.
    pub fn equal(&self, other: &Value) -> bool {
        self == other
    }

    /// The known payload, if any.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Value::Known(payload) => Some(payload),
            _ => None,
        }
    }
}

/// A runtime-typed value: the concrete type descriptor resolved at
/// decode time plus its payload.
///
/// The fields are private and [`DynamicValue::new`] is the only build
/// site, so a dynamic value can never wrap another dynamic value. A
/// dynamic position holding `Null` or `Unknown` is represented by the
/// outer [`Value`] state directly and carries no inner type at all.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    inner_type: AttrType,
    inner: Box<Payload>,
}

impl DynamicValue {
    pub fn new(inner_type: AttrType, payload: Payload) -> Result<Self, SchemaError> {
        if matches!(inner_type, AttrType::Dynamic) || matches!(payload, Payload::Dynamic(_)) {
            return Err(SchemaError::NestedDynamic);
        }
        Ok(DynamicValue {
            inner_type,
            inner: Box::new(payload),
        })
    }

    /// The concrete type resolved for this value.
    pub fn inner_type(&self) -> &AttrType {
        &self.inner_type
    }

    pub fn payload(&self) -> &Payload {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tri_state_predicates() {
        assert!(Value::Null.is_null());
        assert!(Value::Unknown.is_unknown());
        assert!(Value::string("v").is_known());
        assert!(!Value::Null.is_known());
    }

    #[test]
    fn kind_mismatch_compares_false() {
        assert!(!Value::bool(true).equal(&Value::int(1)));
        assert!(!Value::Null.equal(&Value::Unknown));
    }

    #[test]
    fn set_constructor_deduplicates_by_deep_equality() {
        let set = Value::set(vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("a"),
        ]);
        match set.payload() {
            Some(Payload::Set(elements)) => {
                assert_eq!(elements.len(), 2);
                assert_eq!(elements[0], Value::string("a"));
                assert_eq!(elements[1], Value::string("b"));
            }
            other => panic!("expected set payload, got {:?}", other),
        }
    }

    #[test]
    fn dynamic_rejects_dynamic_type() {
        let err = DynamicValue::new(AttrType::Dynamic, Payload::Bool(true)).unwrap_err();
        assert_eq!(err, SchemaError::NestedDynamic);
    }

    #[test]
    fn dynamic_rejects_dynamic_payload() {
        let inner = DynamicValue::new(AttrType::Bool, Payload::Bool(true)).unwrap();
        let err = DynamicValue::new(AttrType::Bool, Payload::Dynamic(inner)).unwrap_err();
        assert_eq!(err, SchemaError::NestedDynamic);
    }

    #[test]
    fn dynamic_equality_includes_inner_type() {
        let a = Value::dynamic(AttrType::Int, Payload::Int(1)).unwrap();
        let b = Value::dynamic(AttrType::Int, Payload::Int(1)).unwrap();
        assert!(a.equal(&b));

        // Same payload under a different runtime type is a different value.
        let c = Value::dynamic(
            AttrType::Custom(std::sync::Arc::new(crate::types::tests::UppercaseString)),
            Payload::String("x".to_string()),
        )
        .unwrap();
        let d = Value::dynamic(AttrType::String, Payload::String("x".to_string())).unwrap();
        assert!(!c.equal(&d));
    }
}
