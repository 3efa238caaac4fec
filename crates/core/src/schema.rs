//! The schema/attribute tree.
//!
//! A [`Schema`] is a named, ordered mapping of top-level attributes and
//! acts as the root nested node for traversal. Each [`Attribute`] is
//! either a typed leaf or one of four nested-container shapes whose
//! elements are themselves attribute trees. The nested shapes share one
//! tagged union, [`AttributeKind`], so the recursive engines are
//! written once against it.
//!
//! Schema trees are built once at plugin startup and are read-only for
//! the life of the process; they are safely shared across concurrent
//! requests behind an `Arc`.

use crate::diagnostics::Diagnostic;
use crate::error::SchemaError;
use crate::path::{Path, PathStep};
use crate::plan::{DefaultProvider, PlanModifier};
use crate::types::AttrType;
use crate::validate::ValueValidator;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The shape of one attribute: a typed leaf or a nested container of
/// child attributes.
///
/// Exactly one shape is representable per attribute by construction;
/// the "both type and nested children" and "neither" defects of looser
/// declaration models cannot be expressed here.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    /// A primitive-typed (or custom-typed) leaf.
    Leaf(AttrType),
    /// A single nested object of child attributes.
    Single(BTreeMap<String, Attribute>),
    /// An ordered list of nested objects.
    List(BTreeMap<String, Attribute>),
    /// An unordered set of nested objects.
    Set(BTreeMap<String, Attribute>),
    /// A string-keyed map of nested objects.
    Map(BTreeMap<String, Attribute>),
}

impl AttributeKind {
    /// The child attributes of a nested shape.
    pub fn children(&self) -> Option<&BTreeMap<String, Attribute>> {
        match self {
            AttributeKind::Leaf(_) => None,
            AttributeKind::Single(children)
            | AttributeKind::List(children)
            | AttributeKind::Set(children)
            | AttributeKind::Map(children) => Some(children),
        }
    }

    /// The full value type implied by this shape. Nested shapes imply
    /// an object of their children's implied types, wrapped in the
    /// container type.
    pub fn implied_type(&self) -> AttrType {
        let object_of = |children: &BTreeMap<String, Attribute>| {
            AttrType::Object(
                children
                    .iter()
                    .map(|(name, attribute)| (name.clone(), attribute.kind.implied_type()))
                    .collect(),
            )
        };
        match self {
            AttributeKind::Leaf(ty) => ty.clone(),
            AttributeKind::Single(children) => object_of(children),
            AttributeKind::List(children) => AttrType::List(Box::new(object_of(children))),
            AttributeKind::Set(children) => AttrType::Set(Box::new(object_of(children))),
            AttributeKind::Map(children) => AttrType::Map(Box::new(object_of(children))),
        }
    }
}

/// One named, typed (or nested) slot in a schema.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub kind: AttributeKind,
    /// The caller must supply a value.
    pub required: bool,
    /// The caller may supply a value.
    pub optional: bool,
    /// The backend determines the value; combines with `optional` for
    /// caller-overridable computed attributes.
    pub computed: bool,
    /// Marks values that must be redacted in user-facing output.
    /// Metadata only; the engine does not alter traversal for it.
    pub sensitive: bool,
    pub description: Option<String>,
    /// When set, a Known configured value surfaces a deprecation
    /// warning carrying this message.
    pub deprecation_message: Option<String>,
    /// Type-appropriate validators, run in declared order.
    pub validators: Vec<Arc<dyn ValueValidator>>,
    /// Default value provider; only meaningful on computed attributes.
    pub default: Option<Arc<dyn DefaultProvider>>,
    /// Plan modifiers, run in declared order.
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

impl Attribute {
    /// A bare attribute of the given shape with no flags set. Callers
    /// are expected to set exactly one of the presence flags before
    /// the attribute is traversed.
    pub fn new(kind: AttributeKind) -> Self {
        Attribute {
            kind,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            description: None,
            deprecation_message: None,
            validators: Vec::new(),
            default: None,
            plan_modifiers: Vec::new(),
        }
    }

    /// Checks the declaration for developer defects. Returns the Error
    /// diagnostic to report at `path`, or `None` when the declaration
    /// is sound. Defects here abort descent into the subtree.
    pub fn definition_diagnostic(&self, path: &Path) -> Option<Diagnostic> {
        let defect = if !self.required && !self.optional && !self.computed {
            Some("Attribute missing required, optional, or computed definition.")
        } else if self.required && (self.optional || self.computed) {
            Some("Attribute cannot be required together with optional or computed.")
        } else if self.default.is_some() && !self.computed {
            Some("Attribute defines a default value but is not computed.")
        } else {
            None
        };
        defect.map(|message| {
            Diagnostic::attribute_error(
                path.clone(),
                "Invalid Attribute Definition",
                format!(
                    "{} This is always a problem with the plugin and should be \
                     reported to the plugin developer.",
                    message
                ),
            )
        })
    }
}

/// A named, ordered mapping from top-level attribute name to attribute.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new(attributes: BTreeMap<String, Attribute>) -> Self {
        Schema { attributes }
    }

    /// The implied type of the whole tree: an object of the top-level
    /// attributes' implied types.
    pub fn implied_type(&self) -> AttrType {
        AttrType::Object(
            self.attributes
                .iter()
                .map(|(name, attribute)| (name.clone(), attribute.kind.implied_type()))
                .collect(),
        )
    }

    /// Resolves the attribute definition addressed by `path`, recursing
    /// through nested containers. Fails when the path traverses a leaf
    /// attribute or names an undeclared child. A path ending on an
    /// element step resolves to the enclosing container attribute.
    pub fn attribute_at(&self, path: &Path) -> Result<&Attribute, SchemaError> {
        let steps = path.steps();
        let mut children = &self.attributes;
        let mut current: Option<&Attribute> = None;
        let mut i = 0;

        while i < steps.len() {
            let name = match &steps[i] {
                PathStep::AttributeName(name) => name,
                other => {
                    return Err(SchemaError::InvalidPath {
                        path: path.clone(),
                        message: format!("unexpected element step {}", other),
                    });
                }
            };
            let attribute = children.get(name).ok_or_else(|| SchemaError::InvalidPath {
                path: path.clone(),
                message: format!("undeclared attribute '{}'", name),
            })?;
            current = Some(attribute);
            i += 1;
            if i >= steps.len() {
                break;
            }

            match &attribute.kind {
                AttributeKind::Leaf(_) => {
                    return Err(SchemaError::InvalidPath {
                        path: path.clone(),
                        message: format!("cannot traverse into leaf attribute '{}'", name),
                    });
                }
                AttributeKind::Single(nested) => {
                    children = nested;
                }
                AttributeKind::List(nested) | AttributeKind::Set(nested) => {
                    if !matches!(&steps[i], PathStep::ElementKeyInt(_)) {
                        return Err(SchemaError::InvalidPath {
                            path: path.clone(),
                            message: format!(
                                "attribute '{}' elements are addressed by index",
                                name
                            ),
                        });
                    }
                    i += 1;
                    children = nested;
                }
                AttributeKind::Map(nested) => {
                    if !matches!(&steps[i], PathStep::ElementKeyString(_)) {
                        return Err(SchemaError::InvalidPath {
                            path: path.clone(),
                            message: format!("attribute '{}' elements are addressed by key", name),
                        });
                    }
                    i += 1;
                    children = nested;
                }
            }
        }

        current.ok_or_else(|| SchemaError::InvalidPath {
            path: path.clone(),
            message: "empty path".to_string(),
        })
    }

    /// Resolves the full implied value type at any path, descending
    /// through nested attributes and into leaf container types.
    pub fn type_at(&self, path: &Path) -> Result<AttrType, SchemaError> {
        let mut ty = self.implied_type();
        for step in path.steps() {
            ty = descend_type(ty, step, path)?;
        }
        Ok(ty)
    }
}

fn descend_type(ty: AttrType, step: &PathStep, path: &Path) -> Result<AttrType, SchemaError> {
    // Custom types navigate through their wire shape; the concrete
    // shape of a dynamic position is unknowable until runtime.
    let shape = ty.wire_shape();
    match (&shape, step) {
        (AttrType::Dynamic, _) => Ok(AttrType::Dynamic),
        (AttrType::Object(fields), PathStep::AttributeName(name)) => {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::InvalidPath {
                    path: path.clone(),
                    message: format!("undeclared attribute '{}'", name),
                })
        }
        (AttrType::List(element), PathStep::ElementKeyInt(_))
        | (AttrType::Set(element), PathStep::ElementKeyInt(_)) => Ok((**element).clone()),
        (AttrType::Map(element), PathStep::ElementKeyString(_)) => Ok((**element).clone()),
        _ => Err(SchemaError::InvalidPath {
            path: path.clone(),
            message: format!("{} values cannot contain step {}", shape, step),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_list_schema() -> Schema {
        let mut children = BTreeMap::new();
        children.insert(
            "nested_attr".to_string(),
            Attribute {
                required: true,
                ..Attribute::new(AttributeKind::Leaf(AttrType::String))
            },
        );
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "test".to_string(),
            Attribute {
                optional: true,
                ..Attribute::new(AttributeKind::List(children))
            },
        );
        Schema::new(attributes)
    }

    #[test]
    fn attribute_at_resolves_nested_child() {
        let schema = nested_list_schema();
        let attr = schema
            .attribute_at(&Path::root("test").index(0).attribute("nested_attr"))
            .unwrap();
        assert!(attr.required);
    }

    #[test]
    fn attribute_at_rejects_undeclared_name() {
        let schema = nested_list_schema();
        let err = schema.attribute_at(&Path::root("missing")).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPath { .. }));
    }

    #[test]
    fn attribute_at_rejects_traversal_into_leaf() {
        let schema = nested_list_schema();
        let err = schema
            .attribute_at(
                &Path::root("test")
                    .index(0)
                    .attribute("nested_attr")
                    .attribute("deeper"),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPath { .. }));
    }

    #[test]
    fn attribute_at_requires_index_steps_for_lists() {
        let schema = nested_list_schema();
        let err = schema
            .attribute_at(&Path::root("test").key("oops").attribute("nested_attr"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPath { .. }));
    }

    #[test]
    fn implied_type_wraps_children() {
        let schema = nested_list_schema();
        let ty = schema.type_at(&Path::root("test")).unwrap();
        match ty {
            AttrType::List(element) => match *element {
                AttrType::Object(fields) => {
                    assert_eq!(fields.get("nested_attr"), Some(&AttrType::String));
                }
                other => panic!("expected object element, got {}", other),
            },
            other => panic!("expected list, got {}", other),
        }
    }

    #[test]
    fn type_at_descends_into_leaf_containers() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "tags".to_string(),
            Attribute {
                optional: true,
                ..Attribute::new(AttributeKind::Leaf(AttrType::Map(Box::new(
                    AttrType::List(Box::new(AttrType::Int)),
                ))))
            },
        );
        let schema = Schema::new(attributes);
        let ty = schema
            .type_at(&Path::root("tags").key("env").index(2))
            .unwrap();
        assert_eq!(ty, AttrType::Int);
    }

    #[test]
    fn missing_flags_is_a_definition_defect() {
        let attribute = Attribute::new(AttributeKind::Leaf(AttrType::String));
        let diag = attribute
            .definition_diagnostic(&Path::root("test"))
            .expect("expected definition diagnostic");
        assert_eq!(diag.summary, "Invalid Attribute Definition");
        assert!(diag.detail.contains("missing required, optional, or computed"));
    }

    #[test]
    fn required_excludes_optional_and_computed() {
        let attribute = Attribute {
            required: true,
            computed: true,
            ..Attribute::new(AttributeKind::Leaf(AttrType::String))
        };
        assert!(attribute.definition_diagnostic(&Path::root("test")).is_some());
    }

    #[test]
    fn computed_optional_is_sound() {
        let attribute = Attribute {
            computed: true,
            optional: true,
            ..Attribute::new(AttributeKind::Leaf(AttrType::String))
        };
        assert!(attribute.definition_diagnostic(&Path::root("test")).is_none());
    }
}
