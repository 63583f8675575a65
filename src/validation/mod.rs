//! The validation engine: per-value rule checks and form-level validation.
//!
//! Validation failures are expected, user-facing outcomes. Nothing in this
//! module panics or mutates state.

pub use self::error::{FieldError, ValidationError, ValidationErrorKind};
pub use self::rules::validate;
pub use self::validator::FormValidator;

mod error;
mod rules;
mod validator;
