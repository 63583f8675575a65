//! Core of a form builder: field schemas, validation rules, and fields derived
//! from other fields through sandboxed formulas.
//!
//! [`session::FormSession`] is the mutating surface. It keeps the schema being
//! edited, the values entered in the preview, and the derived results in step,
//! and persists named snapshots through a [`persistence::PersistenceGateway`].

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod expr;
pub mod graph;
pub mod persistence;
pub mod session;
pub mod store;
pub mod validation;

pub use compute::{DerivationError, Ledger};
pub use config::{ConfigError, EngineConfig};
pub use expr::{EvalError, FormulaEvaluator, Inputs, SandboxEvaluator};
pub use persistence::{BlobGateway, FileBlobStore, MemoryBlobStore, PersistenceError, PersistenceGateway};
pub use session::{FormSession, SessionError, SubmitReport};
pub use store::{Field, FieldId, FieldType, FormSchema, ValidationRules, Value};
pub use validation::{validate, FieldError, ValidationError, ValidationErrorKind};
