use super::PersistenceError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A key/value store of opaque byte blobs.
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;
}

/// Keeps blobs in memory. Useful for tests and for hosts without storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(key.into(), bytes.into());
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Stores each blob as `<dir>/<key>.json`.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a reader never sees a half-written blob.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PersistenceError::Unavailable(format!("'{}' is not a valid storage key", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| PersistenceError::Io(e.error))?;
        Ok(())
    }
}
