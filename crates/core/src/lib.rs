//! keel-core: schema-driven value validation and plan modification.
//!
//! A plugin declares a [`Schema`] of typed attributes; the engine walks
//! caller-supplied value trees against it in two phases:
//!
//! - [`validate_config()`] -- check a configuration tree and accumulate
//!   every problem as a [`Diagnostic`], never throwing
//! - [`modify_plan()`] -- adjust a proposed plan tree with defaults,
//!   plan modifiers, and semantic-equality drift suppression
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`Schema`], [`Attribute`], [`AttributeKind`] -- the attribute tree
//! - [`Value`], [`Payload`], [`AttrType`] -- tri-state typed values
//! - [`Path`], [`PathExpression`] -- value-tree addressing
//! - [`ValueTree`] -- a raw wire tree plus schema and converter
//! - [`Diagnostics`], [`SchemaError`] -- reporting and failures
//!
//! Extension points ([`ValueValidator`], [`DefaultProvider`],
//! [`PlanModifier`], [`CustomType`], [`WireConverter`]) are re-exported
//! alongside.

pub mod cancel;
pub mod diagnostics;
pub mod error;
pub mod path;
pub mod plan;
pub mod private_state;
pub mod schema;
pub mod types;
pub mod validate;
pub mod value;
pub mod wire;

// ── Convenience re-exports: key types ────────────────────────────────

pub use cancel::CancellationToken;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{ConversionError, SchemaError};
pub use path::{ExpressionStep, Path, PathExpression, PathStep};
pub use private_state::PrivateData;
pub use schema::{Attribute, AttributeKind, Schema};
pub use types::{AttrType, CustomType};
pub use value::{DynamicValue, Payload, Value};
pub use wire::{JsonConverter, ValueTree, WireConverter};

// ── Convenience re-exports: engine entry points ──────────────────────

pub use plan::{
    modify_plan, modify_plan_with_cancellation, DefaultProvider, DefaultRequest, DefaultResponse,
    PlanModifier, PlanModifyRequest, PlanModifyResponse, PlanOutcome, RequiresReplace,
    StaticDefault, UseStateForUnknown,
};
pub use validate::{
    validate_config, validate_config_with_cancellation, ValidateRequest, ValidateResponse,
    ValueValidator,
};
