//! End-to-end configuration validation over the public API: nested
//! schemas, wire decoding, flag checks, and validator diagnostics in
//! one pass.

use keel_core::{
    validate_config, AttrType, Attribute, AttributeKind, Path, Schema, Severity,
    ValidateRequest, ValidateResponse, ValueTree, ValueValidator,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn attribute(kind: AttributeKind) -> Attribute {
    Attribute::new(kind)
}

/// A schema shaped like a small deployment resource: a required name, a
/// computed id, and a list of volumes each with a required size.
fn deployment_schema() -> Schema {
    let mut volume_children = BTreeMap::new();
    volume_children.insert(
        "size_gb".to_string(),
        Attribute {
            required: true,
            ..attribute(AttributeKind::Leaf(AttrType::Int))
        },
    );
    volume_children.insert(
        "label".to_string(),
        Attribute {
            optional: true,
            ..attribute(AttributeKind::Leaf(AttrType::String))
        },
    );

    let mut attributes = BTreeMap::new();
    attributes.insert(
        "name".to_string(),
        Attribute {
            required: true,
            ..attribute(AttributeKind::Leaf(AttrType::String))
        },
    );
    attributes.insert(
        "id".to_string(),
        Attribute {
            computed: true,
            ..attribute(AttributeKind::Leaf(AttrType::String))
        },
    );
    attributes.insert(
        "volumes".to_string(),
        Attribute {
            optional: true,
            ..attribute(AttributeKind::List(volume_children))
        },
    );
    Schema::new(attributes)
}

fn config(schema: &Schema, raw: serde_json::Value) -> ValueTree {
    ValueTree::new(Arc::new(schema.clone()), raw)
}

#[test]
fn valid_configuration_produces_no_diagnostics() {
    let schema = deployment_schema();
    let diags = validate_config(
        &schema,
        &config(
            &schema,
            serde_json::json!({
                "name": "web",
                "volumes": [
                    { "size_gb": 100, "label": "data" },
                    { "size_gb": 10 },
                ],
            }),
        ),
    );
    assert!(diags.is_empty(), "{:?}", diags);
}

#[test]
fn all_problems_are_reported_in_one_pass() {
    let schema = deployment_schema();
    // Three independent problems: missing required name, configured
    // read-only id, and a missing required nested size.
    let diags = validate_config(
        &schema,
        &config(
            &schema,
            serde_json::json!({
                "id": "user-set",
                "volumes": [ { "label": "data" } ],
            }),
        ),
    );
    let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
    assert_eq!(
        summaries,
        vec![
            "Invalid Configuration for Read-Only Attribute",
            "Missing Configuration for Required Attribute",
            "Missing Configuration for Required Attribute",
        ]
    );
    let paths: Vec<String> = diags
        .iter()
        .filter_map(|d| d.path.as_ref().map(|p| p.to_string()))
        .collect();
    assert_eq!(paths, vec!["id", "name", "volumes[0].size_gb"]);
}

#[test]
fn unknown_values_pass_every_flag_check() {
    let schema = deployment_schema();
    let diags = validate_config(
        &schema,
        &config(
            &schema,
            serde_json::json!({
                "name": { "$unknown": true },
                "id": { "$unknown": true },
                "volumes": { "$unknown": true },
            }),
        ),
    );
    assert!(diags.is_empty(), "{:?}", diags);
}

#[derive(Debug)]
struct IntAtLeast(i64);

impl ValueValidator for IntAtLeast {
    fn description(&self) -> String {
        format!("value must be at least {}", self.0)
    }

    fn validate(&self, request: &ValidateRequest<'_>, response: &mut ValidateResponse) {
        if let Some(keel_core::Payload::Int(value)) = request.config_value.payload() {
            if *value < self.0 {
                response.diagnostics.add_attribute_error(
                    request.path.clone(),
                    "Invalid Attribute Value",
                    format!("{}, got {}", self.description(), value),
                );
            }
        }
    }
}

#[test]
fn nested_validators_see_element_paths() {
    let mut volume_children = BTreeMap::new();
    volume_children.insert(
        "size_gb".to_string(),
        Attribute {
            required: true,
            validators: vec![Arc::new(IntAtLeast(1))],
            ..attribute(AttributeKind::Leaf(AttrType::Int))
        },
    );
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "volumes".to_string(),
        Attribute {
            optional: true,
            ..attribute(AttributeKind::List(volume_children))
        },
    );
    let schema = Schema::new(attributes);

    let diags = validate_config(
        &schema,
        &config(
            &schema,
            serde_json::json!({ "volumes": [ { "size_gb": 5 }, { "size_gb": 0 } ] }),
        ),
    );
    assert_eq!(diags.len(), 1);
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(
        diag.path,
        Some(Path::root("volumes").index(1).attribute("size_gb"))
    );
    assert!(diag.detail.contains("got 0"));

    // The validator also matches its own path expression.
    assert!(keel_core::PathExpression::from_path(
        &Path::root("volumes").index(1).attribute("size_gb")
    )
    .matches(&Path::root("volumes").index(1).attribute("size_gb")));
}

#[test]
fn set_nested_attributes_are_addressed_by_wire_position() {
    let mut children = BTreeMap::new();
    children.insert(
        "device".to_string(),
        Attribute {
            required: true,
            ..attribute(AttributeKind::Leaf(AttrType::String))
        },
    );
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "volumes".to_string(),
        Attribute {
            optional: true,
            ..attribute(AttributeKind::Set(children))
        },
    );
    let schema = Schema::new(attributes);

    // Duplicate elements collapse in the typed set; every wire element
    // is still validated at its own index.
    let diags = validate_config(
        &schema,
        &config(
            &schema,
            serde_json::json!({
                "volumes": [
                    { "device": "sda" },
                    { "device": "sda" },
                    {},
                ],
            }),
        ),
    );
    assert_eq!(diags.len(), 1);
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Missing Configuration for Required Attribute");
    assert_eq!(
        diag.path,
        Some(Path::root("volumes").index(2).attribute("device"))
    );
}

#[test]
fn map_nested_attributes_are_addressed_by_key() {
    let mut children = BTreeMap::new();
    children.insert(
        "nested_attr".to_string(),
        Attribute {
            required: true,
            ..attribute(AttributeKind::Leaf(AttrType::String))
        },
    );
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "test".to_string(),
        Attribute {
            optional: true,
            ..attribute(AttributeKind::Map(children))
        },
    );
    let schema = Schema::new(attributes);

    let diags = validate_config(
        &schema,
        &config(
            &schema,
            serde_json::json!({ "test": { "testkey": {} } }),
        ),
    );
    assert_eq!(diags.len(), 1);
    assert_eq!(
        diags.iter().next().unwrap().path,
        Some(Path::root("test").key("testkey").attribute("nested_attr"))
    );
}
