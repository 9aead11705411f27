//! Point-in-time view of the schema.

use std::collections::BTreeMap;

use super::{CollectionDef, FieldDef};
use crate::relation::Relation;

/// An in-memory snapshot of collections and relations.
///
/// Built once per service call; validation runs against it before any
/// transaction is opened.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    /// Collections keyed by name.
    pub collections: BTreeMap<String, CollectionDef>,
    /// Stitched relations.
    pub relations: Vec<Relation>,
}

impl SchemaSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection.
    pub fn with_collection(mut self, collection: CollectionDef) -> Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Check whether a collection exists.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    /// Check whether a field exists on a collection.
    pub fn has_field(&self, collection: &str, field: &str) -> bool {
        self.get_field(collection, field).is_some()
    }

    /// Get a collection definition.
    pub fn get_collection(&self, collection: &str) -> Option<&CollectionDef> {
        self.collections.get(collection)
    }

    /// List all collection names.
    pub fn get_collections(&self) -> Vec<&str> {
        self.collections.keys().map(|s| s.as_str()).collect()
    }

    /// Get a field definition.
    pub fn get_field(&self, collection: &str, field: &str) -> Option<&FieldDef> {
        self.collections
            .get(collection)
            .and_then(|c| c.get_field(field))
    }

    /// List the fields of a collection.
    pub fn get_fields(&self, collection: &str) -> Vec<&FieldDef> {
        self.collections
            .get(collection)
            .map(|c| c.fields.iter().collect())
            .unwrap_or_default()
    }

    /// Get the primary key field name of a collection.
    pub fn get_primary_key_field(&self, collection: &str) -> Option<&str> {
        self.collections
            .get(collection)
            .map(|c| c.primary_key.as_str())
    }

    /// Relations owned by, or pointing at, a collection.
    pub fn get_relations_for_collection(&self, collection: &str) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| {
                r.collection == collection || r.related_collection.as_deref() == Some(collection)
            })
            .collect()
    }

    /// Relations that involve a field, either as the owning field or as the
    /// reverse alias on the related collection.
    pub fn get_relations_for_field(&self, collection: &str, field: &str) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| {
                r.is_on(collection, field)
                    || (r.related_collection.as_deref() == Some(collection)
                        && r.one_field() == Some(field))
            })
            .collect()
    }

    /// The relation owned by `collection.field`, if any.
    pub fn get_relation(&self, collection: &str, field: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.is_on(collection, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnType;
    use crate::relation::RelationMeta;

    fn sample_snapshot() -> SchemaSnapshot {
        let authors = CollectionDef::new("authors", "id")
            .with_field(FieldDef::new("id", ColumnType::UnsignedInteger))
            .with_field(FieldDef::new("name", ColumnType::String));
        let articles = CollectionDef::new("articles", "id")
            .with_field(FieldDef::new("id", ColumnType::Integer))
            .with_field(FieldDef::nullable("author_id", ColumnType::Integer));

        let relation = Relation {
            collection: "articles".into(),
            field: "author_id".into(),
            related_collection: Some("authors".into()),
            schema: None,
            meta: Some(
                RelationMeta::new("articles", "author_id")
                    .with_one_collection("authors")
                    .with_one_field("articles"),
            ),
        };

        SchemaSnapshot::new()
            .with_collection(authors)
            .with_collection(articles)
            .with_relation(relation)
    }

    #[test]
    fn test_collection_and_field_lookup() {
        let snapshot = sample_snapshot();

        assert!(snapshot.has_collection("authors"));
        assert!(!snapshot.has_collection("tags"));
        assert!(snapshot.has_field("articles", "author_id"));
        assert!(!snapshot.has_field("articles", "title"));
        assert_eq!(snapshot.get_primary_key_field("articles"), Some("id"));
        assert_eq!(snapshot.get_fields("authors").len(), 2);
        assert_eq!(snapshot.get_collections(), vec!["articles", "authors"]);
    }

    #[test]
    fn test_relation_lookup() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.get_relations_for_collection("authors").len(), 1);
        assert_eq!(snapshot.get_relations_for_field("articles", "author_id").len(), 1);
        assert_eq!(snapshot.get_relations_for_field("authors", "articles").len(), 1);
        assert!(snapshot.get_relations_for_field("authors", "name").is_empty());
        assert!(snapshot.get_relation("articles", "author_id").is_some());
        assert!(snapshot.get_relation("authors", "articles").is_none());
    }
}
