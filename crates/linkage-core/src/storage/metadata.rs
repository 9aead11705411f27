//! Relation metadata rows.

use sled::{Db, Tree};
use tracing::debug;

use super::key::{column_key, decode_id, id_key, table_prefix};
use crate::error::Error;
use crate::relation::RelationMeta;

/// Tree name for metadata rows, keyed by id.
pub(crate) const RELATIONS_TREE: &str = "meta:relations";

/// Tree name for the `{collection}\0{field}` to id index.
pub(crate) const RELATIONS_INDEX_TREE: &str = "meta:relations_index";

/// Filter for metadata reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationQuery {
    /// Only rows owned by this collection.
    pub collection: Option<String>,
    /// Only rows on this field. Ignored without `collection`.
    pub field: Option<String>,
}

impl RelationQuery {
    /// Every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows owned by a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            field: None,
        }
    }

    /// The row on one field.
    pub fn field(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            field: Some(field.into()),
        }
    }

    /// Check whether a row satisfies this filter.
    pub fn matches(&self, meta: &RelationMeta) -> bool {
        match (&self.collection, &self.field) {
            (Some(c), Some(f)) => meta.many_collection == *c && meta.many_field == *f,
            (Some(c), None) => meta.many_collection == *c,
            _ => true,
        }
    }
}

/// Read access to relation metadata rows.
pub trait MetadataReader {
    /// Read the rows matching a query.
    fn read_by_query(&self, query: &RelationQuery) -> Result<Vec<RelationMeta>, Error>;
}

/// Sled-backed metadata store.
///
/// Writes go through a [`Transaction`](super::Transaction) so that they commit
/// together with physical schema changes.
pub struct MetadataStore {
    relations: Tree,
    index: Tree,
}

impl MetadataStore {
    /// Open the metadata trees of the given database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        Ok(Self {
            relations: db.open_tree(RELATIONS_TREE)?,
            index: db.open_tree(RELATIONS_INDEX_TREE)?,
        })
    }

    pub(crate) fn relations_tree(&self) -> &Tree {
        &self.relations
    }

    pub(crate) fn index_tree(&self) -> &Tree {
        &self.index
    }

    /// Get a row by id.
    pub fn get(&self, id: u64) -> Result<Option<RelationMeta>, Error> {
        match self.relations.get(id_key(id))? {
            Some(bytes) => Ok(Some(RelationMeta::from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get the row on `collection.field`.
    pub fn get_by_field(&self, collection: &str, field: &str) -> Result<Option<RelationMeta>, Error> {
        match self.index.get(column_key(collection, field))? {
            Some(id) => match decode_id(&id) {
                Some(id) => self.get(id),
                None => Err(Error::Deserialization("invalid relation id".to_string())),
            },
            None => Ok(None),
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Check if no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    fn rows_for_collection(&self, collection: &str) -> Result<Vec<RelationMeta>, Error> {
        let mut rows = Vec::new();
        for result in self.index.scan_prefix(table_prefix(collection)) {
            let (_, id) = result?;
            let id = decode_id(&id)
                .ok_or_else(|| Error::Deserialization("invalid relation id".to_string()))?;
            if let Some(row) = self.get(id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

impl MetadataReader for MetadataStore {
    fn read_by_query(&self, query: &RelationQuery) -> Result<Vec<RelationMeta>, Error> {
        let rows = match (&query.collection, &query.field) {
            (Some(collection), Some(field)) => {
                self.get_by_field(collection, field)?.into_iter().collect()
            }
            (Some(collection), None) => self.rows_for_collection(collection)?,
            _ => {
                let mut rows = Vec::new();
                for result in self.relations.iter() {
                    let (_, value) = result?;
                    rows.push(RelationMeta::from_json(&value)?);
                }
                rows
            }
        };

        debug!(query = ?query, count = rows.len(), "relation metadata read");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_matching() {
        let meta = RelationMeta::new("articles", "author_id");

        assert!(RelationQuery::all().matches(&meta));
        assert!(RelationQuery::collection("articles").matches(&meta));
        assert!(!RelationQuery::collection("authors").matches(&meta));
        assert!(RelationQuery::field("articles", "author_id").matches(&meta));
        assert!(!RelationQuery::field("articles", "editor_id").matches(&meta));
    }

    #[test]
    fn test_empty_store() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = MetadataStore::open(&db).unwrap();

        assert!(store.is_empty());
        assert!(store.read_by_query(&RelationQuery::all()).unwrap().is_empty());
        assert!(store.get_by_field("articles", "author_id").unwrap().is_none());
    }
}
