//! The schema model: fields, rules, derivations and whole form schemas.
//!
//! These types are plain data. Their serde representation is the stored wire
//! format, so property names and optional-key omission must stay stable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Opaque, stable identifier of a field. Generated ids are UUID v4 strings, but
/// any string loaded from storage is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
}

impl FieldType {
    /// Choice types carry an option list.
    pub fn has_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::Checkbox)
    }
}

/// A scalar field value. An absent value is modelled as `Option::None` by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as it would be shown in a text box.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Largest integer an f64 represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
}

/// Formats integral numbers without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Number(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Value::Bool(b),
            Raw::Number(n) => Value::Number(n),
            Raw::Text(s) => Value::Text(s),
        })
    }
}

/// Declarative validation rules. Every rule is optional; unset rules are not serialized.
///
/// Length bounds keep whatever number was stored. Only a finite bound of at
/// least 1 is enforced, see [`ValidationRules::min_len`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "serialize_bound")]
    pub min_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "serialize_bound")]
    pub max_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_rule: Option<bool>,
}

impl ValidationRules {
    pub fn required() -> Self {
        Self { required: Some(true), ..Default::default() }
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// The minimum length to enforce, if the stored bound is usable.
    pub fn min_len(&self) -> Option<f64> {
        self.min_length.filter(|&n| is_enforced_bound(n))
    }

    pub fn max_len(&self) -> Option<f64> {
        self.max_length.filter(|&n| is_enforced_bound(n))
    }

    pub fn is_email(&self) -> bool {
        self.email.unwrap_or(false)
    }

    pub fn is_password(&self) -> bool {
        self.password_rule.unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn is_enforced_bound(n: f64) -> bool {
    n.is_finite() && n >= 1.0
}

// Written back the way it was read: `3` stays `3`, `2.5` stays `2.5`.
fn serialize_bound<S: Serializer>(bound: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match *bound {
        Some(n) if is_integral(n) => serializer.serialize_i64(n as i64),
        Some(n) => serializer.serialize_f64(n),
        None => serializer.serialize_none(),
    }
}

/// How a derived field is computed. Parent order is significant for positional
/// references (`$1`, `$2`, ...) inside the formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Derivation {
    #[serde(rename = "parentFields")]
    pub parent_ids: Vec<FieldId>,
    pub formula: String,
}

impl Derivation {
    /// Builds a derivation, dropping repeated parents while keeping first-seen order.
    pub fn new(parent_ids: impl IntoIterator<Item = FieldId>, formula: impl Into<String>) -> Self {
        let mut unique: Vec<FieldId> = Vec::new();
        for id in parent_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { parent_ids: unique, formula: formula.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, rename = "derived", skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
}

impl Field {
    /// A new ordinary field with a freshly generated id.
    pub fn new(field_type: FieldType, label: impl Into<String>) -> Self {
        Self::with_id(FieldId::generate(), field_type, label)
    }

    pub fn with_id(id: impl Into<FieldId>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            default_value: None,
            validations: None,
            options: if field_type.has_options() { Some(Vec::new()) } else { None },
            derivation: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Attaches rules; an empty rule set is stored as "no rules".
    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validations = if rules.is_empty() { None } else { Some(rules) };
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn derived_from(mut self, parents: impl IntoIterator<Item = FieldId>, formula: impl Into<String>) -> Self {
        self.derivation = Some(Derivation::new(parents, formula));
        self
    }

    pub fn is_derived(&self) -> bool {
        self.derivation.is_some()
    }

    /// Options are only meaningful for choice types.
    pub fn options(&self) -> Option<&[String]> {
        if self.field_type.has_options() {
            Some(self.options.as_deref().unwrap_or(&[]))
        } else {
            None
        }
    }

    pub fn parent_ids(&self) -> &[FieldId] {
        self.derivation.as_ref().map_or(&[], |d| d.parent_ids.as_slice())
    }
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub fields: Vec<Field>,
}

impl FormSchema {
    /// An unsaved, unnamed schema.
    pub fn draft() -> Self {
        Self::default()
    }

    pub fn field(&self, id: &FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn position(&self, id: &FieldId) -> Option<usize> {
        self.fields.iter().position(|f| &f.id == id)
    }

    pub fn contains(&self, id: &FieldId) -> bool {
        self.position(id).is_some()
    }

    pub fn derived_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_derived())
    }

    pub fn ordinary_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_derived())
    }
}

/// Converts the editor's newline-separated option text into an option list.
pub fn parse_options(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
