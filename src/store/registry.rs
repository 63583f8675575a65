use super::types::*;
use std::collections::HashSet;
use thiserror::Error;

/// A structural edit that could not be applied. The registry is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Unknown field '{0}'")]
    UnknownField(FieldId),
    #[error("Field id '{0}' is already in use")]
    DuplicateField(FieldId),
    #[error("Field '{field}' derives from unknown field '{parent}'")]
    UnknownParent { field: FieldId, parent: FieldId },
    #[error("Field '{0}' cannot derive from itself")]
    SelfReference(FieldId),
    #[error("Index {index} is out of range for {len} fields")]
    IndexOutOfRange { index: usize, len: usize },
}

/// The ordered field list of the schema being edited.
///
/// Owns the id-uniqueness invariant: every mutation either succeeds completely
/// or returns a `StructureError` without touching the list.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    schema: FormSchema,
    // Ephemeral lookup set (rebuilt from the schema on load)
    used_ids: HashSet<FieldId>,
}

impl FieldRegistry {
    pub fn new() -> Self { Self::default() }

    /// Wraps an existing schema, e.g. one loaded from storage.
    ///
    /// Loaded data is accepted as-is; duplicate ids in it are not repaired.
    pub fn from_schema(schema: FormSchema) -> Self {
        let mut registry = Self { schema, used_ids: HashSet::new() };
        registry.rebuild_id_cache();
        registry
    }

    pub fn rebuild_id_cache(&mut self) {
        self.used_ids = self.schema.fields.iter().map(|f| f.id.clone()).collect();
    }

    pub fn schema(&self) -> &FormSchema { &self.schema }

    pub fn set_metadata(&mut self, id: String, name: String, created_at: String) {
        self.schema.id = id;
        self.schema.name = name;
        self.schema.created_at = created_at;
    }

    pub fn count(&self) -> usize { self.schema.fields.len() }
    pub fn is_empty(&self) -> bool { self.schema.fields.is_empty() }

    pub fn get(&self, id: &FieldId) -> Option<&Field> {
        self.schema.field(id)
    }

    pub fn add(&mut self, field: Field) -> Result<(), StructureError> {
        if self.used_ids.contains(&field.id) {
            return Err(StructureError::DuplicateField(field.id));
        }
        self.check_parents(&field)?;

        self.used_ids.insert(field.id.clone());
        self.schema.fields.push(field);
        Ok(())
    }

    /// Replaces the field with the same id, returning the previous definition.
    pub fn update(&mut self, field: Field) -> Result<Field, StructureError> {
        let idx = self
            .schema
            .position(&field.id)
            .ok_or_else(|| StructureError::UnknownField(field.id.clone()))?;
        self.check_parents(&field)?;

        Ok(std::mem::replace(&mut self.schema.fields[idx], field))
    }

    pub fn remove(&mut self, id: &FieldId) -> Result<Field, StructureError> {
        let idx = self
            .schema
            .position(id)
            .ok_or_else(|| StructureError::UnknownField(id.clone()))?;

        self.used_ids.remove(id);
        Ok(self.schema.fields.remove(idx))
    }

    /// Moves the field at `from` so that it ends up at index `to`.
    pub fn move_field(&mut self, from: usize, to: usize) -> Result<(), StructureError> {
        let len = self.count();
        for index in [from, to] {
            if index >= len {
                return Err(StructureError::IndexOutOfRange { index, len });
            }
        }

        let field = self.schema.fields.remove(from);
        self.schema.fields.insert(to, field);
        Ok(())
    }

    fn check_parents(&self, field: &Field) -> Result<(), StructureError> {
        for parent in field.parent_ids() {
            if parent == &field.id {
                return Err(StructureError::SelfReference(field.id.clone()));
            }
            if !self.used_ids.contains(parent) {
                return Err(StructureError::UnknownParent {
                    field: field.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str) -> Field {
        Field::with_id(id, FieldType::Text, id.to_uppercase())
    }

    fn ids(reg: &FieldRegistry) -> Vec<&str> {
        reg.schema().fields.iter().map(|f| f.id.as_str()).collect()
    }

    fn registry(names: &[&str]) -> FieldRegistry {
        let mut reg = FieldRegistry::new();
        for name in names {
            reg.add(field(name)).unwrap();
        }
        reg
    }

    #[test]
    fn test_move_first_to_last() {
        let mut reg = registry(&["a", "b", "c"]);
        reg.move_field(0, 2).unwrap();
        assert_eq!(ids(&reg), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_move_last_to_first() {
        let mut reg = registry(&["a", "b", "c"]);
        reg.move_field(2, 0).unwrap();
        assert_eq!(ids(&reg), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_move_out_of_range_is_rejected() {
        let mut reg = registry(&["a", "b", "c"]);
        let err = reg.move_field(1, 3).unwrap_err();
        assert_eq!(err, StructureError::IndexOutOfRange { index: 3, len: 3 });
        assert_eq!(ids(&reg), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut reg = registry(&["a"]);
        assert_eq!(reg.add(field("a")), Err(StructureError::DuplicateField("a".into())));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn test_unknown_parent_and_self_reference() {
        let mut reg = registry(&["a"]);

        let dangling = field("b").derived_from([FieldId::from("zzz")], "zzz");
        assert!(matches!(reg.add(dangling), Err(StructureError::UnknownParent { .. })));

        let selfish = field("a").derived_from([FieldId::from("a")], "a");
        assert_eq!(reg.update(selfish), Err(StructureError::SelfReference("a".into())));
    }

    #[test]
    fn test_update_unknown_field_is_rejected() {
        let mut reg = registry(&["a"]);
        assert_eq!(reg.update(field("x")), Err(StructureError::UnknownField("x".into())));
    }

    #[test]
    fn test_remove_frees_the_id() {
        let mut reg = registry(&["a", "b"]);
        reg.remove(&"a".into()).unwrap();
        assert_eq!(ids(&reg), vec!["b"]);
        reg.add(field("a")).unwrap();
        assert_eq!(ids(&reg), vec!["b", "a"]);
    }

}
