//! The form session controller.
mod controller;
mod error;

pub use controller::{FormSession, SubmitReport};
pub use error::SessionError;
