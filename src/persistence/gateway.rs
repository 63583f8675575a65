use super::blob::BlobStore;
use super::PersistenceError;
use crate::config::EngineConfig;
use crate::store::FormSchema;
use log::info;

/// Reads and writes the whole saved-forms collection.
pub trait PersistenceGateway {
    fn load(&self) -> Result<Vec<FormSchema>, PersistenceError>;
    fn save(&mut self, forms: &[FormSchema]) -> Result<(), PersistenceError>;
}

/// Stores the collection as a JSON array under one key of a blob store.
#[derive(Debug, Clone)]
pub struct BlobGateway<S> {
    store: S,
    key: String,
}

impl<S: BlobStore> BlobGateway<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    pub fn from_config(store: S, config: &EngineConfig) -> Self {
        Self::new(store, config.storage_key.clone())
    }

    pub fn store(&self) -> &S { &self.store }

    pub fn into_inner(self) -> S { self.store }
}

impl<S: BlobStore> PersistenceGateway for BlobGateway<S> {
    fn load(&self) -> Result<Vec<FormSchema>, PersistenceError> {
        let forms: Vec<FormSchema> = match self.store.get(&self.key)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        info!("Loaded {} saved forms from '{}'", forms.len(), self.key);
        Ok(forms)
    }

    fn save(&mut self, forms: &[FormSchema]) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(forms)?;
        self.store.put(&self.key, &bytes)?;
        info!("Saved {} forms to '{}'", forms.len(), self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{FileBlobStore, MemoryBlobStore};
    use crate::store::{Field, FieldType, ValidationRules};

    fn sample() -> FormSchema {
        FormSchema {
            id: "f1".into(),
            name: "Signup".into(),
            created_at: "2024-05-01T10:00:00+00:00".into(),
            fields: vec![Field::with_id("email", FieldType::Text, "Email").with_rules(ValidationRules {
                email: Some(true),
                ..ValidationRules::required()
            })],
        }
    }

    #[test]
    fn test_empty_slot_loads_nothing() {
        let gateway = BlobGateway::new(MemoryBlobStore::new(), "forms");
        assert!(gateway.load().unwrap().is_empty());
    }

    #[test]
    fn test_uses_configured_key() {
        let config = EngineConfig { storage_key: "drafts".into(), ..EngineConfig::default() };
        let mut gateway = BlobGateway::from_config(MemoryBlobStore::new(), &config);
        gateway.save(&[sample()]).unwrap();

        let store = gateway.into_inner();
        assert!(store.get("drafts").unwrap().is_some());
        assert!(store.get("forms").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_slot_is_a_serialization_error() {
        let gateway = BlobGateway::new(MemoryBlobStore::new().with("forms", "{not json"), "forms");
        assert!(matches!(gateway.load(), Err(PersistenceError::Serialization(_))));
    }

    #[test]
    fn test_unusual_length_bounds_survive_load_and_save() {
        let stored = serde_json::json!([
            {
                "id": "odd",
                "name": "Odd",
                "createdAt": "2024-05-01T10:00:00+00:00",
                "fields": [
                    { "id": "a", "type": "text", "label": "A", "validations": { "minLength": -3 } },
                    { "id": "b", "type": "text", "label": "B", "validations": { "minLength": 2.5, "maxLength": 2.5 } }
                ]
            },
            serde_json::to_value(sample()).unwrap()
        ]);
        let store = MemoryBlobStore::new().with("forms", stored.to_string());
        let mut gateway = BlobGateway::new(store, "forms");

        let forms = gateway.load().unwrap();
        assert_eq!(forms.len(), 2);
        gateway.save(&forms).unwrap();

        let bytes = gateway.store().get("forms").unwrap().unwrap();
        let written: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(written, stored);
    }

    #[test]
    fn test_file_store_persists_across_gateways() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = BlobGateway::new(FileBlobStore::new(dir.path()), "forms");
        first.save(&[sample()]).unwrap();

        let second = BlobGateway::new(FileBlobStore::new(dir.path()), "forms");
        assert_eq!(second.load().unwrap(), vec![sample()]);
    }
}
