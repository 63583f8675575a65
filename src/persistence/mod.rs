//! Storage of the saved-forms collection.
//!
//! The session only sees a [`PersistenceGateway`]. The provided gateway encodes
//! the whole collection as one JSON array and keeps it in a single named slot
//! of a [`BlobStore`].
pub mod blob;
pub mod gateway;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use gateway::{BlobGateway, PersistenceGateway};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored forms could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
