//! Wire value conversion and the per-request value tree.
//!
//! The engine never parses transport bytes itself: the transport layer
//! hands it a decoded raw tree (`serde_json::Value`) plus a
//! [`WireConverter`] that maps raw values into typed [`Value`]s and
//! back. [`JsonConverter`] is the reference implementation used by the
//! built-in JSON wire convention; transports with their own encodings
//! substitute their own converter.
//!
//! JSON wire convention:
//! - `null` (or an absent attribute) is `Null`
//! - `{"$unknown": true}` is `Unknown`
//! - floats travel as decimal strings (or JSON numbers on input)
//! - byte sequences travel as standard base64 strings
//! - dynamic positions travel as `{"type": <descriptor>, "value": <raw>}`

use crate::error::{ConversionError, SchemaError};
use crate::path::{Path, PathStep};
use crate::schema::Schema;
use crate::types::AttrType;
use crate::value::{DynamicValue, Payload, Value};
use base64::Engine as _;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Marker key for unknown values on the JSON wire.
pub const UNKNOWN_MARKER: &str = "$unknown";

static JSON_NULL: serde_json::Value = serde_json::Value::Null;

/// Converts between raw wire values and typed values.
pub trait WireConverter: fmt::Debug + Send + Sync {
    /// Converts a raw wire value into a typed value. The declared (or
    /// custom) type directs the conversion; a shape mismatch fails.
    fn from_wire(&self, ty: &AttrType, raw: &serde_json::Value)
        -> Result<Value, ConversionError>;

    /// Converts a typed value back to its raw wire form. Total: every
    /// value has a wire representation, and converting it back yields
    /// an equal value.
    fn to_wire(&self, value: &Value) -> serde_json::Value;
}

/// The reference JSON wire converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

fn is_unknown_marker(raw: &serde_json::Value) -> bool {
    raw.as_object().is_some_and(|obj| {
        obj.len() == 1 && obj.get(UNKNOWN_MARKER).and_then(|v| v.as_bool()) == Some(true)
    })
}

fn decimal_from_raw(raw: &serde_json::Value) -> Result<Decimal, ConversionError> {
    let text = match raw {
        serde_json::Value::Number(number) => number.to_string(),
        serde_json::Value::String(text) => text.clone(),
        other => {
            return Err(ConversionError::new(
                "Float",
                format!("received {}", other),
            ));
        }
    };
    Decimal::from_str(&text)
        .map_err(|err| ConversionError::new("Float", format!("'{}' is not a decimal: {}", text, err)))
}

impl WireConverter for JsonConverter {
    fn from_wire(
        &self,
        ty: &AttrType,
        raw: &serde_json::Value,
    ) -> Result<Value, ConversionError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        if is_unknown_marker(raw) {
            return Ok(Value::Unknown);
        }

        match ty {
            AttrType::Bool => raw
                .as_bool()
                .map(Value::bool)
                .ok_or_else(|| ConversionError::new("Bool", format!("received {}", raw))),
            AttrType::Int => raw
                .as_i64()
                .map(Value::int)
                .ok_or_else(|| ConversionError::new("Int", format!("received {}", raw))),
            AttrType::Float => decimal_from_raw(raw).map(Value::float),
            AttrType::String => raw
                .as_str()
                .map(Value::string)
                .ok_or_else(|| ConversionError::new("String", format!("received {}", raw))),
            AttrType::Bytes => {
                let text = raw.as_str().ok_or_else(|| {
                    ConversionError::new("Bytes", format!("received {}", raw))
                })?;
                base64::engine::general_purpose::STANDARD
                    .decode(text)
                    .map(Value::bytes)
                    .map_err(|err| {
                        ConversionError::new("Bytes", format!("invalid base64: {}", err))
                    })
            }
            AttrType::List(element) => {
                let elements = self.convert_elements(element, raw, "List")?;
                Ok(Value::list(elements))
            }
            AttrType::Set(element) => {
                let elements = self.convert_elements(element, raw, "Set")?;
                Ok(Value::set(elements))
            }
            AttrType::Map(element) => {
                let entries = raw.as_object().ok_or_else(|| {
                    ConversionError::new("Map", format!("received {}", raw))
                })?;
                let mut converted = BTreeMap::new();
                for (key, entry) in entries {
                    converted.insert(key.clone(), self.from_wire(element, entry)?);
                }
                Ok(Value::map(converted))
            }
            AttrType::Object(fields) => {
                let entries = raw.as_object().ok_or_else(|| {
                    ConversionError::new("Object", format!("received {}", raw))
                })?;
                if let Some(extra) = entries.keys().find(|key| !fields.contains_key(*key)) {
                    return Err(ConversionError::new(
                        "Object",
                        format!("received undeclared field '{}'", extra),
                    ));
                }
                let mut converted = BTreeMap::new();
                for (name, field_ty) in fields {
                    let field_raw = entries.get(name).unwrap_or(&JSON_NULL);
                    converted.insert(name.clone(), self.from_wire(field_ty, field_raw)?);
                }
                Ok(Value::object(converted))
            }
            AttrType::Dynamic => self.convert_dynamic(raw),
            AttrType::Custom(custom) => custom.convert(raw),
        }
    }

    fn to_wire(&self, value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Unknown => serde_json::json!({ UNKNOWN_MARKER: true }),
            Value::Known(payload) => self.payload_to_wire(payload),
        }
    }
}

impl JsonConverter {
    fn convert_elements(
        &self,
        element: &AttrType,
        raw: &serde_json::Value,
        expected: &str,
    ) -> Result<Vec<Value>, ConversionError> {
        let elements = raw
            .as_array()
            .ok_or_else(|| ConversionError::new(expected, format!("received {}", raw)))?;
        elements
            .iter()
            .map(|entry| self.from_wire(element, entry))
            .collect()
    }

    fn convert_dynamic(&self, raw: &serde_json::Value) -> Result<Value, ConversionError> {
        let obj = raw.as_object().ok_or_else(|| {
            ConversionError::new("Dynamic", format!("received {}", raw))
        })?;
        let type_raw = obj.get("type").ok_or_else(|| {
            ConversionError::new("Dynamic", "missing 'type' field in dynamic wrapper")
        })?;
        let value_raw = obj.get("value").ok_or_else(|| {
            ConversionError::new("Dynamic", "missing 'value' field in dynamic wrapper")
        })?;
        let inner_type = AttrType::from_json(type_raw)?;
        match self.from_wire(&inner_type, value_raw)? {
            // A dynamic position holding null/unknown is carried by the
            // outer value state directly.
            Value::Null => Ok(Value::Null),
            Value::Unknown => Ok(Value::Unknown),
            Value::Known(payload) => DynamicValue::new(inner_type, payload)
                .map(|dynamic| Value::Known(Payload::Dynamic(dynamic)))
                .map_err(|_| {
                    ConversionError::new(
                        "Dynamic",
                        "dynamic wrapper cannot carry another dynamic value",
                    )
                }),
        }
    }

    fn payload_to_wire(&self, payload: &Payload) -> serde_json::Value {
        match payload {
            Payload::Bool(value) => serde_json::json!(value),
            Payload::Int(value) => serde_json::json!(value),
            Payload::Float(value) => serde_json::json!(value.to_string()),
            Payload::String(value) => serde_json::json!(value),
            Payload::Bytes(value) => {
                serde_json::json!(base64::engine::general_purpose::STANDARD.encode(value))
            }
            Payload::List(elements) | Payload::Set(elements) => serde_json::Value::Array(
                elements.iter().map(|element| self.to_wire(element)).collect(),
            ),
            Payload::Map(entries) | Payload::Object(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), self.to_wire(entry)))
                    .collect(),
            ),
            Payload::Dynamic(dynamic) => serde_json::json!({
                "type": dynamic.inner_type().to_json(),
                "value": self.payload_to_wire(dynamic.payload()),
            }),
        }
    }
}

// ── Value trees ──────────────────────────────────────────────────────

/// One value source (configuration, plan, or state) for a request: the
/// raw wire tree plus the schema and converter needed to resolve typed
/// values at any path. Immutable from the caller's point of view; the
/// plan engine owns its working copy.
#[derive(Debug, Clone)]
pub struct ValueTree {
    schema: Arc<Schema>,
    raw: serde_json::Value,
    converter: Arc<dyn WireConverter>,
}

impl ValueTree {
    /// A tree over the built-in JSON wire convention.
    pub fn new(schema: Arc<Schema>, raw: serde_json::Value) -> Self {
        ValueTree {
            schema,
            raw,
            converter: Arc::new(JsonConverter),
        }
    }

    /// A tree using a transport-supplied converter.
    pub fn with_converter(
        schema: Arc<Schema>,
        raw: serde_json::Value,
        converter: Arc<dyn WireConverter>,
    ) -> Self {
        ValueTree {
            schema,
            raw,
            converter,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }

    pub fn converter(&self) -> &Arc<dyn WireConverter> {
        &self.converter
    }

    /// The raw wire value at `path`. Absent positions read as null.
    pub fn raw_at(&self, path: &Path) -> &serde_json::Value {
        let mut current = &self.raw;
        for step in path.steps() {
            current = match step {
                PathStep::AttributeName(name) | PathStep::ElementKeyString(name) => {
                    match current.get(name.as_str()) {
                        Some(next) => next,
                        None => return &JSON_NULL,
                    }
                }
                PathStep::ElementKeyInt(index) => match current.get(index) {
                    Some(next) => next,
                    None => return &JSON_NULL,
                },
            };
        }
        current
    }

    /// The typed value at `path`, resolved through the schema and the
    /// converter. Structural failures and conversion failures both
    /// escalate as [`SchemaError`].
    pub fn value_at(&self, path: &Path) -> Result<Value, SchemaError> {
        let ty = self.schema.type_at(path)?;
        let value = self
            .converter
            .from_wire(&ty, self.raw_at(path))
            .map_err(|err| err.at(path.clone()))?;
        Ok(value)
    }

    /// Overwrites the raw value at `path`, creating intermediate
    /// objects as needed. Element positions must already exist; a write
    /// past the end of a list is dropped.
    pub(crate) fn set_raw_at(&mut self, path: &Path, new: serde_json::Value) {
        let steps = path.steps();
        if steps.is_empty() {
            self.raw = new;
            return;
        }
        let mut current = &mut self.raw;
        for step in &steps[..steps.len() - 1] {
            match step {
                PathStep::AttributeName(name) | PathStep::ElementKeyString(name) => {
                    if !current.is_object() {
                        *current = serde_json::json!({});
                    }
                    match current.as_object_mut() {
                        Some(obj) => {
                            current = obj.entry(name.clone()).or_insert(serde_json::Value::Null);
                        }
                        None => return,
                    }
                }
                PathStep::ElementKeyInt(index) => match current.get_mut(index) {
                    Some(next) => current = next,
                    None => return,
                },
            }
        }
        match &steps[steps.len() - 1] {
            PathStep::AttributeName(name) | PathStep::ElementKeyString(name) => {
                if !current.is_object() {
                    *current = serde_json::json!({});
                }
                if let Some(obj) = current.as_object_mut() {
                    obj.insert(name.clone(), new);
                }
            }
            PathStep::ElementKeyInt(index) => {
                if let Some(slot) = current.get_mut(index) {
                    *slot = new;
                }
            }
        }
    }
}
