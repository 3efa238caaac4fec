//! Attribute path addressing.
//!
//! A [`Path`] locates one value position inside a nested value tree:
//! attribute-name steps descend into objects and nested attributes,
//! element steps descend into list/set positions (by index) and map
//! entries (by key). A [`PathExpression`] is the looser form handed to
//! validators and plan modifiers: it supports wildcard element steps and
//! can be matched against concrete paths.

use std::fmt;

/// One step of a concrete attribute path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathStep {
    /// Descend into a named attribute or object field.
    AttributeName(String),
    /// Descend into a list or set element by position.
    ElementKeyInt(usize),
    /// Descend into a map element by key.
    ElementKeyString(String),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::AttributeName(name) => write!(f, "{}", name),
            PathStep::ElementKeyInt(index) => write!(f, "[{}]", index),
            PathStep::ElementKeyString(key) => write!(f, "[\"{}\"]", key),
        }
    }
}

/// An absolute path from the root of a value tree to one position.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// An empty path addressing the tree root itself.
    pub fn empty() -> Self {
        Path { steps: Vec::new() }
    }

    /// A single-step path addressing a top-level attribute.
    pub fn root(name: impl Into<String>) -> Self {
        Path {
            steps: vec![PathStep::AttributeName(name.into())],
        }
    }

    /// Returns a new path with the given step appended.
    pub fn child(&self, step: PathStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Path { steps }
    }

    /// Appends an attribute-name step.
    pub fn attribute(&self, name: impl Into<String>) -> Self {
        self.child(PathStep::AttributeName(name.into()))
    }

    /// Appends a list/set element index step.
    pub fn index(&self, index: usize) -> Self {
        self.child(PathStep::ElementKeyInt(index))
    }

    /// Appends a map element key step.
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathStep::ElementKeyString(key.into()))
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Exact step-wise comparison. Equivalent to `==`; kept as a named
    /// method so call sites mirror the expression form.
    pub fn equal(&self, other: &Path) -> bool {
        self == other
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 && matches!(step, PathStep::AttributeName(_)) {
                write!(f, ".")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

// Paths serialize in their rendered form; diagnostics carry them as
// plain strings on the wire.
impl serde::Serialize for Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Path expressions ─────────────────────────────────────────────────

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionStep {
    AttributeName(String),
    ElementKeyInt(usize),
    ElementKeyString(String),
    /// Matches any list/set element index.
    AnyIndex,
    /// Matches any map element key.
    AnyKey,
}

impl ExpressionStep {
    fn matches(&self, step: &PathStep) -> bool {
        match (self, step) {
            (ExpressionStep::AttributeName(a), PathStep::AttributeName(b)) => a == b,
            (ExpressionStep::ElementKeyInt(a), PathStep::ElementKeyInt(b)) => a == b,
            (ExpressionStep::ElementKeyString(a), PathStep::ElementKeyString(b)) => a == b,
            (ExpressionStep::AnyIndex, PathStep::ElementKeyInt(_)) => true,
            (ExpressionStep::AnyKey, PathStep::ElementKeyString(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExpressionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionStep::AttributeName(name) => write!(f, "{}", name),
            ExpressionStep::ElementKeyInt(index) => write!(f, "[{}]", index),
            ExpressionStep::ElementKeyString(key) => write!(f, "[\"{}\"]", key),
            ExpressionStep::AnyIndex => write!(f, "[*]"),
            ExpressionStep::AnyKey => write!(f, "[\"*\"]"),
        }
    }
}

/// A step sequence with optional wildcard element steps.
///
/// Validators and plan modifiers receive the expression matching the
/// exact path they were invoked at; they can assert the expression
/// against the request path to guard against traversal bugs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathExpression {
    steps: Vec<ExpressionStep>,
}

impl PathExpression {
    pub fn new(steps: Vec<ExpressionStep>) -> Self {
        PathExpression { steps }
    }

    /// The exact-match expression for a concrete path.
    pub fn from_path(path: &Path) -> Self {
        let steps = path
            .steps()
            .iter()
            .map(|step| match step {
                PathStep::AttributeName(name) => ExpressionStep::AttributeName(name.clone()),
                PathStep::ElementKeyInt(index) => ExpressionStep::ElementKeyInt(*index),
                PathStep::ElementKeyString(key) => ExpressionStep::ElementKeyString(key.clone()),
            })
            .collect();
        PathExpression { steps }
    }

    pub fn steps(&self) -> &[ExpressionStep] {
        &self.steps
    }

    /// Returns true if this expression matches the concrete path,
    /// step for step. Lengths must agree; wildcards match any element
    /// step of their kind.
    pub fn matches(&self, path: &Path) -> bool {
        if self.steps.len() != path.steps().len() {
            return false;
        }
        self.steps
            .iter()
            .zip(path.steps())
            .all(|(expr, step)| expr.matches(step))
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 && matches!(step, ExpressionStep::AttributeName(_)) {
                write!(f, ".")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}
