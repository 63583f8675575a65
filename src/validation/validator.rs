//! The form-level validator that runs the rule checks over every ordinary field.
use super::error::FieldError;
use super::rules::validate;
use crate::store::{FieldId, FormSchema, ValidationRules, Value};
use std::collections::HashMap;

/// Checks a set of field values against a schema.
///
/// Derived fields are skipped: they are outputs of the derivation engine, not
/// user input. Fields without rules always pass.
pub struct FormValidator<'a> {
    schema: &'a FormSchema,
}

impl<'a> FormValidator<'a> {
    pub fn new(schema: &'a FormSchema) -> Self {
        Self { schema }
    }

    /// Validates every non-derived field, in schema order.
    ///
    /// # Returns
    /// - `Ok(())` if every field passes.
    /// - `Err(Vec<FieldError>)` containing one entry per failing field.
    pub fn validate(&self, values: &HashMap<FieldId, Value>) -> Result<(), Vec<FieldError>> {
        let no_rules = ValidationRules::default();
        let mut errors = Vec::new();

        for field in self.schema.ordinary_fields() {
            let rules = field.validations.as_ref().unwrap_or(&no_rules);
            if let Err(e) = validate(values.get(&field.id), rules) {
                errors.push(e.at_field(field.id.clone(), field.label.clone()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Field, FieldType};
    use crate::validation::ValidationErrorKind;

    fn schema() -> FormSchema {
        FormSchema {
            fields: vec![
                Field::with_id("name", FieldType::Text, "Name").with_rules(ValidationRules::required()),
                Field::with_id("email", FieldType::Text, "Email").with_rules(ValidationRules {
                    required: Some(true),
                    email: Some(true),
                    ..Default::default()
                }),
                Field::with_id("shout", FieldType::Text, "Shout")
                    .with_rules(ValidationRules::required())
                    .derived_from([FieldId::from("name")], "upper(name)"),
                Field::with_id("notes", FieldType::Textarea, "Notes"),
            ],
            ..FormSchema::draft()
        }
    }

    #[test]
    fn test_collects_every_failure_in_order() {
        let schema = schema();
        let values = HashMap::from([(FieldId::from("email"), Value::from("bob@example"))]);

        let errors = FormValidator::new(&schema).validate(&values).unwrap_err();
        let summary: Vec<_> = errors.iter().map(|e| (e.field_id.as_str(), e.error.kind)).collect();
        assert_eq!(
            summary,
            vec![("name", ValidationErrorKind::Required), ("email", ValidationErrorKind::Email)]
        );
    }

    #[test]
    fn test_derived_fields_are_not_validated() {
        let schema = schema();
        let values = HashMap::from([
            (FieldId::from("name"), Value::from("Bob")),
            (FieldId::from("email"), Value::from("bob@example.com")),
        ]);
        assert_eq!(FormValidator::new(&schema).validate(&values), Ok(()));
    }
}
