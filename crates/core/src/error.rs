//! Engine-level error taxonomy.
//!
//! Only structural failures escalate here: a path that does not resolve
//! against the schema, a failed wire conversion reached through the
//! typed tree accessors, or an illegal dynamic-value construction.
//! Everything a validator or plan modifier reports flows through
//! [`crate::diagnostics::Diagnostics`] instead.

use crate::path::Path;
use std::fmt;

/// A structural failure in the schema or in value construction.
/// Always a developer defect, never recovered or retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// The path does not resolve against the schema: it traverses a
    /// leaf attribute or names an undeclared child.
    #[error("path {path} does not resolve against the schema: {message}")]
    InvalidPath { path: Path, message: String },

    /// A dynamic value may never wrap another dynamic value or the
    /// dynamic type descriptor itself.
    #[error("dynamic values cannot wrap another dynamic value")]
    NestedDynamic,

    /// Wire conversion failed while resolving a value through the
    /// typed tree accessors.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// A wire value did not match the declared type shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct ConversionError {
    /// The position the conversion was attempted at, when known.
    pub path: Option<Path>,
    /// The expected type shape, human readable.
    pub expected: String,
    /// Description of the received value.
    pub message: String,
}

impl ConversionError {
    pub fn new(expected: impl Into<String>, message: impl Into<String>) -> Self {
        ConversionError {
            path: None,
            expected: expected.into(),
            message: message.into(),
        }
    }

    /// Attaches the offending path, keeping an already-recorded deeper
    /// path in place.
    pub fn at(mut self, path: Path) -> Self {
        if self.path.is_none() {
            self.path = Some(path);
        }
        self
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "expected {} value at {}, {}",
                self.expected, path, self.message
            ),
            None => write!(f, "expected {} value, {}", self.expected, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_display_includes_path_when_set() {
        let err = ConversionError::new("List", "received a string").at(Path::root("test"));
        assert_eq!(
            err.to_string(),
            "expected List value at test, received a string"
        );
    }

    #[test]
    fn at_keeps_deeper_path() {
        let err = ConversionError::new("Bool", "received a number")
            .at(Path::root("test").index(0))
            .at(Path::root("test"));
        assert_eq!(err.path, Some(Path::root("test").index(0)));
    }
}
