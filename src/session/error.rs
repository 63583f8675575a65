use crate::persistence::PersistenceError;
use crate::store::{FieldId, StructureError};
use thiserror::Error;

/// A session operation that was refused or failed. The session state is
/// unchanged whenever one of these is returned.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Structure(#[from] StructureError),
    #[error("Field '{0}' is derived and cannot be edited")]
    NotSettable(FieldId),
    #[error("A form name is required")]
    EmptyName,
    #[error("A form needs at least one field before it can be saved")]
    NoFields,
    #[error("No saved form with id '{0}'")]
    UnknownForm(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl SessionError {
    pub fn unknown_field(id: &FieldId) -> Self {
        SessionError::Structure(StructureError::UnknownField(id.clone()))
    }
}
