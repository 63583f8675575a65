//! Defines the error types for the validation module.
use crate::store::FieldId;
use std::fmt;

/// The rule that rejected a value.
///
// This enum allows for programmatic inspection of failures, which is more
// robust than string matching on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    Required,
    MinLength,
    MaxLength,
    Email,
    Password,
}

/// A user-facing validation failure. Not a fault: it is an expected outcome of
/// checking user input and is shown next to the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// A human-readable message explaining the failure. Never empty.
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn at_field(self, field_id: FieldId, label: String) -> FieldError {
        FieldError { field_id, label, error: self }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A validation failure attributed to a field of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field_id: FieldId,
    pub label: String,
    pub error: ValidationError,
}
