//! Collection definitions.

use super::field::FieldDef;
use crate::error::Error;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A collection (table) with its primary key and columns.
#[derive(
    Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize,
)]
pub struct CollectionDef {
    /// Collection name (unique within the database).
    pub name: String,
    /// Name of the primary key field.
    pub primary_key: String,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDef>,
}

impl CollectionDef {
    /// Create a new collection definition.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field to the collection.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a mutable field by name.
    pub fn get_field_mut(&mut self, name: &str) -> Option<&mut FieldDef> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Get the primary key field definition.
    pub fn get_primary_key_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.primary_key)
    }

    /// Serialize the definition to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a definition from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        // sled may hand out values at any offset; archives need alignment.
        let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnType;

    fn authors() -> CollectionDef {
        CollectionDef::new("authors", "id")
            .with_field(FieldDef::new("id", ColumnType::UnsignedInteger))
            .with_field(FieldDef::nullable("name", ColumnType::String))
    }

    #[test]
    fn test_collection_builder() {
        let authors = authors();

        assert_eq!(authors.fields.len(), 2);
        assert!(authors.get_field("name").unwrap().nullable);
        assert!(authors.get_field("missing").is_none());
        assert_eq!(
            authors.get_primary_key_field().unwrap().column_type,
            ColumnType::UnsignedInteger
        );
    }

    #[test]
    fn test_bytes_roundtrip() {
        let authors = authors();
        let decoded = CollectionDef::from_bytes(&authors.to_bytes().unwrap()).unwrap();
        assert_eq!(authors, decoded);
    }

    #[test]
    fn test_json_definition() {
        let json = r#"{
            "name": "articles",
            "primary_key": "id",
            "fields": [
                {"name": "id", "type": "integer"},
                {"name": "author_id", "type": "integer", "nullable": true}
            ]
        }"#;
        let articles: CollectionDef = serde_json::from_str(json).unwrap();
        assert_eq!(articles.primary_key, "id");
        assert!(articles.get_field("author_id").unwrap().nullable);
        assert!(!articles.get_field("id").unwrap().nullable);
    }
}
