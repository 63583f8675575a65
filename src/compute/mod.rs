//! Recomputes derived fields.
pub mod engine;
pub mod ledger;

pub use engine::DerivationEngine;
pub use ledger::{DerivationError, Derived, Ledger};
