//! The schema model and the editable field list.
pub mod registry;
pub mod types;

pub use registry::{FieldRegistry, StructureError};
pub use types::{
    format_number, parse_options, Derivation, Field, FieldId, FieldType, FormSchema, ValidationRules, Value,
};
