//! The form session: the one place where the schema and the values change.
use super::error::SessionError;
use crate::compute::{DerivationEngine, Derived, Ledger};
use crate::config::EngineConfig;
use crate::display::format_trace;
use crate::expr::{FormulaEvaluator, SandboxEvaluator};
use crate::graph::DerivationGraph;
use crate::persistence::PersistenceGateway;
use crate::store::{Field, FieldId, FieldRegistry, FieldType, FormSchema, Value};
use crate::validation::{validate, FieldError, FormValidator, ValidationError};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of a full-form validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// One entry per failing field, in field order.
    pub errors: Vec<FieldError>,
}

impl SubmitReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Owns the schema being edited, the values entered in the preview, the
/// derived results and the live validation errors.
///
/// Every change that can affect a derived field triggers a full recompute, so
/// the ledger always matches the current schema and values.
pub struct FormSession<G: PersistenceGateway> {
    config: EngineConfig,
    gateway: G,
    evaluator: Box<dyn FormulaEvaluator>,
    registry: FieldRegistry,
    values: HashMap<FieldId, Value>,
    ledger: Ledger,
    errors: HashMap<FieldId, ValidationError>,
    saved: Vec<FormSchema>,
}

impl<G: PersistenceGateway> FormSession<G> {
    /// Loads the saved collection once and starts with an empty form.
    pub fn open(gateway: G, config: EngineConfig) -> Result<Self, SessionError> {
        let saved = gateway.load()?;
        info!("Session opened with {} saved forms", saved.len());
        Ok(Self {
            evaluator: Box::new(SandboxEvaluator::new(&config)),
            config,
            gateway,
            registry: FieldRegistry::new(),
            values: HashMap::new(),
            ledger: Ledger::new(),
            errors: HashMap::new(),
            saved,
        })
    }

    /// Replaces the formula evaluator.
    pub fn with_evaluator(mut self, evaluator: Box<dyn FormulaEvaluator>) -> Self {
        self.evaluator = evaluator;
        self.recompute();
        self
    }

    // --- Accessors ---
    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn schema(&self) -> &FormSchema { self.registry.schema() }
    pub fn gateway(&self) -> &G { &self.gateway }
    pub fn value(&self, id: &FieldId) -> Option<&Value> { self.values.get(id) }
    pub fn values(&self) -> &HashMap<FieldId, Value> { &self.values }
    pub fn derived(&self, id: &FieldId) -> Option<&Derived> { self.ledger.get(id) }
    pub fn ledger(&self) -> &Ledger { &self.ledger }
    pub fn error(&self, id: &FieldId) -> Option<&ValidationError> { self.errors.get(id) }
    pub fn errors(&self) -> &HashMap<FieldId, ValidationError> { &self.errors }
    pub fn saved_forms(&self) -> &[FormSchema] { &self.saved }

    /// Derived fields that read from `id`, directly or through other derived
    /// fields, in declaration order.
    pub fn dependents_of(&self, id: &FieldId) -> Vec<FieldId> {
        let reached = DerivationGraph::build(self.schema()).downstream_from(std::slice::from_ref(id));
        self.schema()
            .fields
            .iter()
            .filter(|f| &f.id != id && reached.contains(&f.id))
            .map(|f| f.id.clone())
            .collect()
    }

    /// The value shown for a field: the entered value, or the derived result.
    pub fn display_value(&self, id: &FieldId) -> Option<&Value> {
        self.values.get(id).or_else(|| self.ledger.value(id))
    }

    // --- Schema edits ---

    pub fn add_field(&mut self, field: Field) -> Result<(), SessionError> {
        let id = field.id.clone();
        let default = default_of(&field);
        self.registry.add(field)?;
        if let Some(value) = default {
            self.values.insert(id.clone(), value);
        }
        debug!("Added field '{}'", id);
        self.recompute();
        Ok(())
    }

    /// Replaces the definition of the field with the same id.
    pub fn update_field(&mut self, field: Field) -> Result<(), SessionError> {
        let id = field.id.clone();
        let old = self.registry.update(field)?;

        let Some(current) = self.registry.get(&id) else {
            return Err(SessionError::unknown_field(&id));
        };
        if current.is_derived() {
            self.values.remove(&id);
            self.errors.remove(&id);
        } else {
            if old.is_derived() {
                if let Some(value) = default_of(current) {
                    self.values.insert(id.clone(), value);
                }
            }
            // Rules may have changed under an error that is on display.
            if self.errors.contains_key(&id) {
                let rules = current.validations.clone().unwrap_or_default();
                match validate(self.values.get(&id), &rules) {
                    Ok(()) => self.errors.remove(&id),
                    Err(e) => self.errors.insert(id.clone(), e),
                };
            }
        }
        debug!("Updated field '{}'", id);
        self.recompute();
        Ok(())
    }

    /// Removes a field. Fields derived from it keep their definition and
    /// report a missing parent until they are edited.
    pub fn delete_field(&mut self, id: &FieldId) -> Result<Field, SessionError> {
        let dependents = self.dependents_of(id);
        let removed = self.registry.remove(id)?;
        if !dependents.is_empty() {
            warn!("Deleted field '{}' is a parent of {:?}", id, dependents);
        }
        self.values.remove(id);
        self.errors.remove(id);
        self.recompute();
        Ok(removed)
    }

    pub fn move_field(&mut self, from: usize, to: usize) -> Result<(), SessionError> {
        self.registry.move_field(from, to)?;
        debug!("Moved field from {} to {}", from, to);
        Ok(())
    }

    // --- Values ---

    /// Stores a value, recomputes, and returns the live validation result of
    /// the changed field.
    pub fn set_value(&mut self, id: &FieldId, value: impl Into<Value>) -> Result<Option<ValidationError>, SessionError> {
        self.apply_value(id, Some(value.into()))
    }

    pub fn clear_value(&mut self, id: &FieldId) -> Result<Option<ValidationError>, SessionError> {
        self.apply_value(id, None)
    }

    fn apply_value(&mut self, id: &FieldId, value: Option<Value>) -> Result<Option<ValidationError>, SessionError> {
        let field = self.registry.get(id).ok_or_else(|| SessionError::unknown_field(id))?;
        if field.is_derived() {
            return Err(SessionError::NotSettable(id.clone()));
        }
        let value = value.map(|v| normalize(field.field_type, v));
        let rules = field.validations.clone().unwrap_or_default();

        match value {
            Some(v) => self.values.insert(id.clone(), v),
            None => self.values.remove(id),
        };
        self.recompute();

        let outcome = validate(self.values.get(id), &rules).err();
        match &outcome {
            Some(e) => self.errors.insert(id.clone(), e.clone()),
            None => self.errors.remove(id),
        };
        Ok(outcome)
    }

    /// Validates every ordinary field without touching the live errors.
    pub fn submit(&self) -> SubmitReport {
        let errors = FormValidator::new(self.schema()).validate(&self.values).err().unwrap_or_default();
        debug!("Submit checked {} fields, {} failed", self.registry.count(), errors.len());
        SubmitReport { errors }
    }

    // --- Saved forms ---

    /// Snapshots the current schema under `name` and persists the collection.
    ///
    /// Nothing in the session changes unless the gateway accepts the write.
    pub fn commit_save(&mut self, name: &str) -> Result<FormSchema, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        if self.registry.is_empty() {
            return Err(SessionError::NoFields);
        }

        let snapshot = FormSchema {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now().to_rfc3339(),
            fields: self.schema().fields.clone(),
        };
        let mut next = self.saved.clone();
        next.push(snapshot.clone());
        self.gateway.save(&next)?;

        self.saved = next;
        self.registry
            .set_metadata(snapshot.id.clone(), snapshot.name.clone(), snapshot.created_at.clone());
        info!("Saved form '{}' ({})", snapshot.name, snapshot.id);
        Ok(snapshot)
    }

    /// Makes a saved form the current one, with fresh values.
    pub fn open_saved(&mut self, id: &str) -> Result<(), SessionError> {
        let schema = self
            .saved
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownForm(id.to_string()))?;
        info!("Opened saved form '{}'", schema.name);
        self.reset(FieldRegistry::from_schema(schema));
        Ok(())
    }

    /// Starts over with an empty, unsaved form.
    pub fn new_form(&mut self) {
        self.reset(FieldRegistry::new());
    }

    /// Rebuilds the ledger from the current schema and values.
    pub fn recompute(&mut self) {
        let ledger = DerivationEngine::new(self.registry.schema(), self.evaluator.as_ref()).compute(&self.values);
        self.ledger = ledger;
    }

    /// A printable derivation tree for a field.
    pub fn explain(&self, id: &FieldId) -> Result<String, SessionError> {
        if self.registry.get(id).is_none() {
            return Err(SessionError::unknown_field(id));
        }
        Ok(format_trace(self.schema(), &self.values, &self.ledger, id))
    }

    fn reset(&mut self, registry: FieldRegistry) {
        self.values = registry
            .schema()
            .fields
            .iter()
            .filter_map(|f| default_of(f).map(|v| (f.id.clone(), v)))
            .collect();
        self.registry = registry;
        self.errors.clear();
        self.recompute();
    }
}

/// The seeded value of an ordinary field.
fn default_of(field: &Field) -> Option<Value> {
    if field.is_derived() {
        return None;
    }
    field.default_value.clone().map(|v| normalize(field.field_type, v))
}

/// Number fields store numeric text as numbers.
fn normalize(field_type: FieldType, value: Value) -> Value {
    match (field_type, value) {
        (FieldType::Number, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(s),
        },
        (_, value) => value,
    }
}
