use crate::compute::Ledger;
use crate::store::{FieldId, FormSchema, Value};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders how `target` got its value: the field, its formula, and each parent
/// down to the ordinary fields, as an indented tree.
pub fn format_trace(
    schema: &FormSchema,
    values: &HashMap<FieldId, Value>,
    ledger: &Ledger,
    target: &FieldId,
) -> String {
    let mut tracer = Tracer {
        schema,
        values,
        ledger,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match schema.field(target) {
        Some(field) => {
            let _ = writeln!(tracer.output, "DERIVATION TRACE for field '{}':", field.label);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_field(target, 1, "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: Unknown field '{}'", target);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    schema: &'a FormSchema,
    values: &'a HashMap<FieldId, Value>,
    ledger: &'a Ledger,
    visited_at_level: HashMap<FieldId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_field(&mut self, id: &FieldId, level: usize, prefix: &str) {
        // Revisits cover shared parents and cycles alike.
        if let Some(&first_seen) = self.visited_at_level.get(id) {
            let _ = writeln!(self.output, "{}-> '{}' (Ref to L{})", prefix, id, first_seen);
            return;
        }

        let Some(field) = self.schema.field(id) else {
            let _ = writeln!(self.output, "{}[L{}] '{}' [missing field]", prefix, level, id);
            return;
        };
        self.visited_at_level.insert(id.clone(), level);

        let header = format!("[L{}] {}{}", level, field.label, self.format_value(id, field.is_derived()));
        match &field.derivation {
            None => {
                let _ = writeln!(self.output, "{}{} -> Input", prefix, header);
            }
            Some(derivation) => {
                let _ = writeln!(self.output, "{}{} = {}", prefix, header, derivation.formula);
                let stem = build_child_stem(prefix);
                let parents = &derivation.parent_ids;
                for (i, parent) in parents.iter().enumerate() {
                    let connector = if i == parents.len() - 1 { "`--" } else { "|--" };
                    self.trace_field(parent, level + 1, &format!("{}{}", stem, connector));
                }
            }
        }
    }

    fn format_value(&self, id: &FieldId, derived: bool) -> String {
        if !derived {
            return match self.values.get(id) {
                Some(v) => format!(" [{}]", v),
                None => " [empty]".to_string(),
            };
        }
        match self.ledger.get(id) {
            Some(Ok(v)) => format!(" [{}]", v),
            Some(Err(e)) => format!(" [Err: {}]", e),
            None => " [?]".to_string(),
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::DerivationEngine;
    use crate::expr::SandboxEvaluator;
    use crate::store::{Field, FieldType};

    fn id(s: &str) -> FieldId {
        FieldId::from(s)
    }

    #[test]
    fn test_trace_shows_formula_and_inputs() {
        let schema = FormSchema {
            fields: vec![
                Field::with_id("age", FieldType::Number, "Age"),
                Field::with_id("adult", FieldType::Checkbox, "Is adult").derived_from([id("age")], "age >= 18"),
                Field::with_id("label", FieldType::Text, "Label")
                    .derived_from([id("adult"), id("age")], "if(adult, 'adult', 'minor') + ' ' + text(age)"),
            ],
            ..FormSchema::draft()
        };
        let values = HashMap::from([(id("age"), Value::Number(21.0))]);
        let eval = SandboxEvaluator::default();
        let ledger = DerivationEngine::new(&schema, &eval).compute(&values);

        let trace = format_trace(&schema, &values, &ledger, &id("label"));
        let lines: Vec<&str> = trace.lines().collect();

        assert_eq!(lines[0], "DERIVATION TRACE for field 'Label':");
        assert_eq!(lines[2], "[L1] Label [adult 21] = if(adult, 'adult', 'minor') + ' ' + text(age)");
        assert_eq!(lines[3], "|--[L2] Is adult [true] = age >= 18");
        assert_eq!(lines[4], "|  `--[L3] Age [21] -> Input");
        assert_eq!(lines[5], "`---> 'age' (Ref to L3)");
    }

    #[test]
    fn test_trace_survives_cycles_and_unknown_targets() {
        let schema = FormSchema {
            fields: vec![
                Field::with_id("x", FieldType::Number, "X").derived_from([id("y")], "y"),
                Field::with_id("y", FieldType::Number, "Y").derived_from([id("x")], "x"),
            ],
            ..FormSchema::draft()
        };
        let eval = SandboxEvaluator::default();
        let ledger = DerivationEngine::new(&schema, &eval).compute(&HashMap::new());

        let trace = format_trace(&schema, &HashMap::new(), &ledger, &id("x"));
        assert!(trace.contains("[L1] X [Err: circular dependency] = y"));
        assert!(trace.contains("(Ref to L1)"));

        assert!(format_trace(&schema, &HashMap::new(), &ledger, &id("nope")).starts_with("Error:"));
    }
}
