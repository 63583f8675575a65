use crate::expr::EvalError;
use crate::store::{FieldId, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Why a derived field has no value. Stored in the ledger as a placeholder,
/// never returned as an operation failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DerivationError {
    #[error("circular dependency")]
    CircularDependency,
    #[error("depends on '{parent}', which is part of a circular dependency")]
    DependsOnCycle { parent: FieldId },
    #[error("parent field '{parent}' does not exist")]
    MissingParent { parent: FieldId },
    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

pub type Derived = Result<Value, DerivationError>;

/// Derived results of one recompute, keyed by field id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    values: HashMap<FieldId, Derived>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, id: &FieldId) -> Option<&Derived> {
        self.values.get(id)
    }

    /// The computed value, if the field derived successfully.
    pub fn value(&self, id: &FieldId) -> Option<&Value> {
        self.values.get(id)?.as_ref().ok()
    }

    pub fn error(&self, id: &FieldId) -> Option<&DerivationError> {
        self.values.get(id)?.as_ref().err()
    }

    pub fn insert(&mut self, id: FieldId, result: Derived) {
        self.values.insert(id, result);
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &Derived)> {
        self.values.iter()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&FieldId, &DerivationError)> {
        self.values.iter().filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }
}
