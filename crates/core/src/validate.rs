//! Configuration validation.
//!
//! [`validate_config`] walks a schema tree against a configuration
//! value tree and accumulates every problem it finds as a diagnostic.
//! Nothing is thrown and nothing short-circuits: a single pass reports
//! declaration defects, wire-shape mismatches, presence-flag
//! violations, deprecations, and extension-supplied validator failures
//! side by side.
//!
//! Per attribute the pass runs a fixed sequence: declaration check,
//! typed conversion, presence-flag checks, deprecation warning, custom
//! type hook, validator chain, then recursion into Known nested
//! elements. A declaration defect or a failed conversion reports and
//! stops descent below that attribute; everything else continues.

use crate::cancel::CancellationToken;
use crate::diagnostics::Diagnostics;
use crate::path::{Path, PathExpression};
use crate::schema::{Attribute, AttributeKind, Schema};
use crate::types::AttrType;
use crate::value::{Payload, Value};
use crate::wire::ValueTree;
use std::collections::BTreeMap;
use std::fmt;

/// Everything a validator may inspect about the attribute under
/// validation.
#[derive(Debug)]
pub struct ValidateRequest<'a> {
    /// The attribute's location in the configuration tree.
    pub path: Path,
    /// The location as a match expression, for validators that relate
    /// attributes to one another.
    pub path_expression: PathExpression,
    /// The whole configuration, for cross-attribute lookups.
    pub config: &'a ValueTree,
    /// The already-converted value at `path`.
    pub config_value: Value,
}

/// Collects what a single validator has to say.
#[derive(Debug, Default)]
pub struct ValidateResponse {
    pub diagnostics: Diagnostics,
}

/// A reusable value check attached to an attribute.
///
/// Validators only ever run against Known values that already passed
/// type conversion; a validator that cannot handle Null or Unknown
/// does not need to guard against them beyond skipping.
pub trait ValueValidator: fmt::Debug + Send + Sync {
    /// A plain-language statement of what the validator enforces.
    fn description(&self) -> String {
        String::new()
    }

    fn validate(&self, request: &ValidateRequest<'_>, response: &mut ValidateResponse);
}

/// Validates `config` against `schema` and returns every diagnostic
/// produced, in traversal order.
pub fn validate_config(schema: &Schema, config: &ValueTree) -> Diagnostics {
    let mut traversal = Traversal::new(config, None);
    traversal.run(schema);
    traversal.diagnostics
}

/// As [`validate_config`], honouring a caller-owned cancellation token.
/// The token is checked between sibling subtrees; a cancelled run
/// reports a single "Traversal Cancelled" error and returns whatever
/// it found so far.
pub fn validate_config_with_cancellation(
    schema: &Schema,
    config: &ValueTree,
    cancel: &CancellationToken,
) -> Diagnostics {
    let mut traversal = Traversal::new(config, Some(cancel));
    traversal.run(schema);
    traversal.diagnostics
}

struct Traversal<'a> {
    config: &'a ValueTree,
    cancel: Option<&'a CancellationToken>,
    cancelled: bool,
    diagnostics: Diagnostics,
}

impl<'a> Traversal<'a> {
    fn new(config: &'a ValueTree, cancel: Option<&'a CancellationToken>) -> Self {
        Traversal {
            config,
            cancel,
            cancelled: false,
            diagnostics: Diagnostics::new(),
        }
    }

    fn run(&mut self, schema: &Schema) {
        for (name, attribute) in &schema.attributes {
            if self.check_cancelled() {
                return;
            }
            self.validate_attribute(Path::root(name.as_str()), attribute);
        }
    }

    /// True once the token has tripped; reports the cancellation error
    /// exactly once.
    fn check_cancelled(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            self.cancelled = true;
            self.diagnostics.add_error(
                "Traversal Cancelled",
                "Validation was cancelled before it completed. \
                 The reported diagnostics may be incomplete.",
            );
            return true;
        }
        false
    }

    fn validate_attribute(&mut self, path: Path, attribute: &Attribute) {
        tracing::trace!(path = %path, "validating attribute");

        if let Some(defect) = attribute.definition_diagnostic(&path) {
            self.diagnostics.push(defect);
            return;
        }

        let ty = attribute.kind.implied_type();
        let raw = self.config.raw_at(&path);
        let value = match self.config.converter().from_wire(&ty, raw) {
            Ok(value) => value,
            Err(err) => {
                let err = err.at(path.clone());
                self.diagnostics.add_attribute_error(
                    path,
                    "Type Validation Error",
                    format!(
                        "An unexpected error was encountered while validating the attribute \
                         value. This is always a problem with the plugin. Please report the \
                         following to the plugin developer:\n\n{}",
                        err
                    ),
                );
                return;
            }
        };

        self.check_flags(&path, attribute, &value);

        if value.is_known() {
            if let Some(message) = &attribute.deprecation_message {
                self.diagnostics.add_attribute_warning(
                    path.clone(),
                    "Attribute Deprecated",
                    message.clone(),
                );
            }
        }

        if let AttributeKind::Leaf(AttrType::Custom(custom)) = &attribute.kind {
            self.diagnostics.append(custom.validate_from_wire(&path, raw));
        }

        for validator in &attribute.validators {
            let request = ValidateRequest {
                path: path.clone(),
                path_expression: PathExpression::from_path(&path),
                config: self.config,
                config_value: value.clone(),
            };
            let mut response = ValidateResponse::default();
            validator.validate(&request, &mut response);
            self.diagnostics.append(response.diagnostics);
        }

        if value.is_known() {
            self.validate_children(&path, attribute, &value);
        }
    }

    fn validate_children(&mut self, path: &Path, attribute: &Attribute, value: &Value) {
        let Some(children) = attribute.kind.children() else {
            return;
        };
        match (&attribute.kind, value.payload()) {
            (AttributeKind::Single(_), Some(Payload::Object(_))) => {
                self.validate_element(path.clone(), children);
            }
            (AttributeKind::List(_), Some(Payload::List(elements))) => {
                for index in 0..elements.len() {
                    if self.check_cancelled() {
                        return;
                    }
                    self.validate_element(path.clone().index(index), children);
                }
            }
            (AttributeKind::Set(_), Some(Payload::Set(_))) => {
                // The typed set collapses duplicate wire elements, so
                // its length can be shorter than the wire array's.
                // Traverse by raw positions so every element is
                // visited and paths stay aligned with the wire.
                let len = self
                    .config
                    .raw_at(path)
                    .as_array()
                    .map_or(0, |elements| elements.len());
                for index in 0..len {
                    if self.check_cancelled() {
                        return;
                    }
                    self.validate_element(path.clone().index(index), children);
                }
            }
            (AttributeKind::Map(_), Some(Payload::Map(entries))) => {
                for key in entries.keys() {
                    if self.check_cancelled() {
                        return;
                    }
                    self.validate_element(path.clone().key(key.as_str()), children);
                }
            }
            _ => {}
        }
    }

    fn validate_element(&mut self, element_path: Path, children: &BTreeMap<String, Attribute>) {
        for (name, child) in children {
            if self.check_cancelled() {
                return;
            }
            self.validate_attribute(element_path.clone().attribute(name.as_str()), child);
        }
    }

    fn check_flags(&mut self, path: &Path, attribute: &Attribute, value: &Value) {
        // Unknown is tolerated under every flag combination: the value
        // may yet resolve to anything, so nothing can be concluded.
        if value.is_null() && attribute.required {
            self.diagnostics.add_attribute_error(
                path.clone(),
                "Missing Configuration for Required Attribute",
                format!(
                    "Must set a configuration value for the {} attribute as the plugin has \
                     marked it as required.\n\nRefer to the plugin documentation or contact \
                     the plugin developers for additional information about configurable \
                     attributes that are required.",
                    path
                ),
            );
        }
        if value.is_known() && attribute.computed && !attribute.optional {
            self.diagnostics.add_attribute_error(
                path.clone(),
                "Invalid Configuration for Read-Only Attribute",
                format!(
                    "Cannot set a configuration value for the {} attribute as the plugin has \
                     marked it as read-only. Remove the configuration line setting the value.\
                     \n\nRefer to the plugin documentation or contact the plugin developers \
                     for additional information about configurable and read-only attributes \
                     that are supported.",
                    path
                ),
            );
        }
    }
}
