//! Plan modification: defaults, plan modifiers, and drift suppression.
//!
//! [`modify_plan`] walks the schema over three aligned value trees (the
//! configuration, the proposed plan, and the prior state) and produces
//! an adjusted plan plus everything the adjustment decided along the
//! way: replacement-requiring paths, evolved private state, and
//! diagnostics.
//!
//! Per attribute the pass runs declaration check, typed conversion of
//! all three values, default application, the plan-modifier chain,
//! semantic-equality drift suppression, then recursion into Known
//! nested elements. Plan-value changes are written back into the
//! working plan tree immediately, so later modifiers and child
//! traversals observe them.

use crate::cancel::CancellationToken;
use crate::diagnostics::Diagnostics;
use crate::path::{Path, PathExpression};
use crate::private_state::PrivateData;
use crate::schema::{Attribute, AttributeKind, Schema};
use crate::value::{Payload, Value};
use crate::wire::ValueTree;
use std::collections::BTreeMap;
use std::fmt;

// ── Defaults ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct DefaultRequest {
    pub path: Path,
}

#[derive(Debug, Default)]
pub struct DefaultResponse {
    /// The value to plan when the configuration leaves the attribute
    /// unset. `None` leaves the plan untouched.
    pub plan_value: Option<Value>,
    pub diagnostics: Diagnostics,
}

/// Supplies a planned value for an unconfigured computed attribute.
pub trait DefaultProvider: fmt::Debug + Send + Sync {
    /// A plain-language statement of the default behaviour.
    fn description(&self) -> String {
        String::new()
    }

    fn default_value(&self, request: &DefaultRequest, response: &mut DefaultResponse);
}

/// Always plans the same fixed value.
#[derive(Debug, Clone)]
pub struct StaticDefault(pub Value);

impl DefaultProvider for StaticDefault {
    fn description(&self) -> String {
        format!("value defaults to {:?}", self.0)
    }

    fn default_value(&self, _request: &DefaultRequest, response: &mut DefaultResponse) {
        response.plan_value = Some(self.0.clone());
    }
}

// ── Plan modifiers ───────────────────────────────────────────────────

/// Everything a plan modifier may inspect about the attribute under
/// modification.
#[derive(Debug)]
pub struct PlanModifyRequest<'a> {
    pub path: Path,
    pub path_expression: PathExpression,
    pub config: &'a ValueTree,
    /// The working plan, including every adjustment made so far.
    pub plan: &'a ValueTree,
    pub state: &'a ValueTree,
    pub config_value: Value,
    pub plan_value: Value,
    pub state_value: Value,
    /// The private state as it stood when this modifier was invoked.
    pub private: PrivateData,
}

/// Collects what a single plan modifier decided.
#[derive(Debug)]
pub struct PlanModifyResponse {
    /// The adjusted planned value; pre-populated with the incoming one.
    pub plan_value: Value,
    /// Marks the attribute as forcing resource replacement.
    pub requires_replace: bool,
    /// The evolved private state; pre-populated with the incoming one.
    pub private: PrivateData,
    pub diagnostics: Diagnostics,
}

/// A reusable plan adjustment attached to an attribute. Modifiers run
/// in declared order; an error diagnostic stops the chain for the
/// attribute and skips descent below it.
pub trait PlanModifier: fmt::Debug + Send + Sync {
    /// A plain-language statement of what the modifier does.
    fn description(&self) -> String {
        String::new()
    }

    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse);
}

/// Carries the prior state value forward when the plan is unknown.
/// Suppresses spurious "known after apply" churn for computed
/// attributes whose value only changes when the resource is replaced.
#[derive(Debug, Clone, Copy)]
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute will not change".to_string()
    }

    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse) {
        if request.plan_value.is_unknown()
            && !request.state_value.is_null()
            && !request.config_value.is_unknown()
        {
            response.plan_value = request.state_value.clone();
        }
    }
}

/// Forces resource replacement when the planned value differs from the
/// prior state. No-op on create (null state) and destroy (null plan).
#[derive(Debug, Clone, Copy)]
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "if the value of this attribute changes, the resource will be replaced".to_string()
    }

    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse) {
        if request.state_value.is_null() || request.plan_value.is_null() {
            return;
        }
        if !request.plan_value.equal(&request.state_value) {
            response.requires_replace = true;
        }
    }
}

// ── The plan engine ──────────────────────────────────────────────────

/// Everything plan modification produced.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// The adjusted plan tree.
    pub planned: ValueTree,
    /// Paths whose changes force resource replacement, in traversal
    /// order. Once recorded, a path is never removed.
    pub requires_replace: Vec<Path>,
    /// The private state after every modifier has run.
    pub private: PrivateData,
    pub diagnostics: Diagnostics,
}

/// Runs defaults, plan modifiers, and drift suppression over the whole
/// schema tree.
pub fn modify_plan(
    schema: &Schema,
    config: &ValueTree,
    plan: &ValueTree,
    state: &ValueTree,
    private: PrivateData,
) -> PlanOutcome {
    let mut traversal = PlanTraversal::new(config, plan, state, private, None);
    traversal.run(schema);
    traversal.into_outcome()
}

/// As [`modify_plan`], honouring a caller-owned cancellation token
/// checked between sibling subtrees. A cancelled run reports a single
/// "Traversal Cancelled" error and returns the plan as adjusted so far.
pub fn modify_plan_with_cancellation(
    schema: &Schema,
    config: &ValueTree,
    plan: &ValueTree,
    state: &ValueTree,
    private: PrivateData,
    cancel: &CancellationToken,
) -> PlanOutcome {
    let mut traversal = PlanTraversal::new(config, plan, state, private, Some(cancel));
    traversal.run(schema);
    traversal.into_outcome()
}

struct PlanTraversal<'a> {
    config: &'a ValueTree,
    state: &'a ValueTree,
    planned: ValueTree,
    private: PrivateData,
    requires_replace: Vec<Path>,
    diagnostics: Diagnostics,
    cancel: Option<&'a CancellationToken>,
    cancelled: bool,
}

impl<'a> PlanTraversal<'a> {
    fn new(
        config: &'a ValueTree,
        plan: &'a ValueTree,
        state: &'a ValueTree,
        private: PrivateData,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        PlanTraversal {
            config,
            state,
            planned: plan.clone(),
            private,
            requires_replace: Vec::new(),
            diagnostics: Diagnostics::new(),
            cancel,
            cancelled: false,
        }
    }

    fn into_outcome(self) -> PlanOutcome {
        PlanOutcome {
            planned: self.planned,
            requires_replace: self.requires_replace,
            private: self.private,
            diagnostics: self.diagnostics,
        }
    }

    fn run(&mut self, schema: &Schema) {
        for (name, attribute) in &schema.attributes {
            if self.check_cancelled() {
                return;
            }
            self.modify_attribute(Path::root(name.as_str()), attribute);
        }
    }

    fn check_cancelled(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            self.cancelled = true;
            self.diagnostics.add_error(
                "Traversal Cancelled",
                "Plan modification was cancelled before it completed. \
                 The plan may be incompletely adjusted.",
            );
            return true;
        }
        false
    }

    /// The typed value at `path` in one of the three trees, or `None`
    /// after reporting the resolution failure.
    fn resolve(diagnostics: &mut Diagnostics, tree: &ValueTree, path: &Path) -> Option<Value> {
        match tree.value_at(path) {
            Ok(value) => Some(value),
            Err(err) => {
                diagnostics.add_attribute_error(
                    path.clone(),
                    "Type Validation Error",
                    format!(
                        "An unexpected error was encountered while reading the attribute \
                         value. This is always a problem with the plugin. Please report the \
                         following to the plugin developer:\n\n{}",
                        err
                    ),
                );
                None
            }
        }
    }

    fn modify_attribute(&mut self, path: Path, attribute: &Attribute) {
        tracing::trace!(path = %path, "modifying plan for attribute");

        if let Some(defect) = attribute.definition_diagnostic(&path) {
            self.diagnostics.push(defect);
            return;
        }

        let Some(config_value) = Self::resolve(&mut self.diagnostics, self.config, &path) else {
            return;
        };
        let Some(state_value) = Self::resolve(&mut self.diagnostics, self.state, &path) else {
            return;
        };
        let Some(mut plan_value) = Self::resolve(&mut self.diagnostics, &self.planned, &path)
        else {
            return;
        };

        if attribute.computed
            && config_value.is_null()
            && !plan_value.is_known()
        {
            if let Some(provider) = &attribute.default {
                let request = DefaultRequest { path: path.clone() };
                let mut response = DefaultResponse::default();
                provider.default_value(&request, &mut response);
                self.diagnostics.append(response.diagnostics);
                if let Some(value) = response.plan_value {
                    plan_value = value;
                    self.write_back(&path, &plan_value);
                }
            }
        }

        for modifier in &attribute.plan_modifiers {
            let mut response = PlanModifyResponse {
                plan_value: plan_value.clone(),
                requires_replace: false,
                private: self.private.clone(),
                diagnostics: Diagnostics::new(),
            };
            {
                let request = PlanModifyRequest {
                    path: path.clone(),
                    path_expression: PathExpression::from_path(&path),
                    config: self.config,
                    plan: &self.planned,
                    state: self.state,
                    config_value: config_value.clone(),
                    plan_value: plan_value.clone(),
                    state_value: state_value.clone(),
                    private: self.private.clone(),
                };
                modifier.modify(&request, &mut response);
            }
            let failed = response.diagnostics.has_error();
            self.diagnostics.append(response.diagnostics);
            self.private = response.private;
            // Replacement is sticky: later modifiers cannot undo it.
            if response.requires_replace && !self.requires_replace.contains(&path) {
                self.requires_replace.push(path.clone());
            }
            if response.plan_value != plan_value {
                plan_value = response.plan_value;
                self.write_back(&path, &plan_value);
            }
            if failed {
                return;
            }
        }

        // A planned value that only differs from the prior state in
        // representation is not a change; keep the state form.
        if let AttributeKind::Leaf(ty) = &attribute.kind {
            if plan_value.is_known()
                && state_value.is_known()
                && !plan_value.equal(&state_value)
                && ty.semantic_equal(&state_value, &plan_value)
            {
                plan_value = state_value.clone();
                self.write_back(&path, &plan_value);
            }
        }

        if plan_value.is_known() {
            self.modify_children(&path, attribute, &plan_value);
        }
    }

    fn write_back(&mut self, path: &Path, value: &Value) {
        let wire = self.planned.converter().to_wire(value);
        self.planned.set_raw_at(path, wire);
    }

    fn modify_children(&mut self, path: &Path, attribute: &Attribute, plan_value: &Value) {
        let Some(children) = attribute.kind.children() else {
            return;
        };
        match (&attribute.kind, plan_value.payload()) {
            (AttributeKind::Single(_), Some(Payload::Object(_))) => {
                self.modify_element(path.clone(), children);
            }
            (AttributeKind::List(_), Some(Payload::List(elements))) => {
                for index in 0..elements.len() {
                    if self.check_cancelled() {
                        return;
                    }
                    self.modify_element(path.index(index), children);
                }
            }
            (AttributeKind::Set(_), Some(Payload::Set(_))) => {
                // The typed set collapses duplicate wire elements;
                // traverse by raw positions so every element is
                // visited and write-backs land on the right slot.
                let len = self
                    .planned
                    .raw_at(path)
                    .as_array()
                    .map_or(0, |elements| elements.len());
                for index in 0..len {
                    if self.check_cancelled() {
                        return;
                    }
                    self.modify_element(path.index(index), children);
                }
            }
            (AttributeKind::Map(_), Some(Payload::Map(entries))) => {
                for key in entries.keys() {
                    if self.check_cancelled() {
                        return;
                    }
                    self.modify_element(path.key(key.as_str()), children);
                }
            }
            _ => {}
        }
    }

    fn modify_element(&mut self, element_path: Path, children: &BTreeMap<String, Attribute>) {
        for (name, child) in children {
            if self.check_cancelled() {
                return;
            }
            self.modify_attribute(element_path.attribute(name.as_str()), child);
        }
    }
}
