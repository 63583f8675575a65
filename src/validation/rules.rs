//! The per-value rule checks.
//!
//! Rules run in a fixed order and the first failure wins, so the message a user
//! sees for a given input is always the same.

use super::error::{ValidationError, ValidationErrorKind};
use crate::store::{format_number, ValidationRules, Value};
use regex::Regex;
use std::sync::LazyLock;

const PASSWORD_MIN_LEN: usize = 8;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.+-]+@[\w-]+(\.[\w-]+)*\.[A-Za-z]{2,}$").expect("email pattern is valid"));

/// Checks `value` against `rules`.
///
/// Order: `required`, `minLength`, `maxLength`, `email`, `passwordRule`. Only
/// `required` applies to numbers and booleans; `0` and `false` count as present.
pub fn validate(value: Option<&Value>, rules: &ValidationRules) -> Result<(), ValidationError> {
    if rules.is_required() && is_blank(value) {
        return Err(ValidationError::new(ValidationErrorKind::Required, "Field is required"));
    }

    let Some(text) = value.and_then(Value::as_text) else {
        return Ok(());
    };
    let len = text.chars().count();

    if let Some(min) = rules.min_len() {
        if (len as f64) < min {
            return Err(ValidationError::new(
                ValidationErrorKind::MinLength,
                format!("Min {} characters", format_number(min)),
            ));
        }
    }

    if let Some(max) = rules.max_len() {
        if (len as f64) > max {
            return Err(ValidationError::new(
                ValidationErrorKind::MaxLength,
                format!("Max {} characters", format_number(max)),
            ));
        }
    }

    if rules.is_email() && !EMAIL.is_match(text) {
        return Err(ValidationError::new(ValidationErrorKind::Email, "Invalid email"));
    }

    if rules.is_password() && !is_strong_password(text, len) {
        return Err(ValidationError::new(
            ValidationErrorKind::Password,
            format!("Password must be at least {} characters and contain a number", PASSWORD_MIN_LEN),
        ));
    }

    Ok(())
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Text(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn is_strong_password(text: &str, len: usize) -> bool {
    len >= PASSWORD_MIN_LEN && text.chars().any(|c| c.is_ascii_digit())
}
