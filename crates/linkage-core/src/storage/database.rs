//! Database handle owning the sled instance.

use sled::Db;
use tracing::{debug, info};

use super::{
    MetadataReader, MetadataStore, PhysicalSchema, RelationQuery, SchemaInspector,
    StorageConfig, Transaction,
};
use crate::catalog::SchemaSnapshot;
use crate::error::Error;
use crate::relation::{stitch, system_relation_rows};

/// An open relation database: physical schema plus relation metadata.
pub struct Database {
    db: Db,
    physical: PhysicalSchema,
    metadata: MetadataStore,
}

impl Database {
    /// Open or create a database with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let physical = PhysicalSchema::open(&db)?;
        let metadata = MetadataStore::open(&db)?;

        info!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "database opened"
        );

        Ok(Self {
            db,
            physical,
            metadata,
        })
    }

    /// Open a temporary database, deleted on drop.
    pub fn temporary() -> Result<Self, Error> {
        Self::open(StorageConfig::temporary())
    }

    /// The physical schema.
    pub fn physical(&self) -> &PhysicalSchema {
        &self.physical
    }

    /// The relation metadata store.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Begin a new transaction.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Run `f` in a transaction, committing on success and rolling back on error.
    pub fn execute<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, Error>,
    {
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Build a fresh schema snapshot from the current state.
    ///
    /// Relations are stitched from every stored metadata row (plus the
    /// built-in system rows when `include_system` is set) and every
    /// physical foreign key.
    pub fn snapshot(&self, include_system: bool) -> Result<SchemaSnapshot, Error> {
        let mut meta_rows = self.metadata.read_by_query(&RelationQuery::all())?;
        if include_system {
            meta_rows.extend(system_relation_rows());
        }
        let schema_rows = self.physical.foreign_keys(None)?;

        let mut snapshot = SchemaSnapshot::new();
        for table in self.physical.list_tables()? {
            snapshot = snapshot.with_collection(table);
        }
        for relation in stitch(meta_rows, schema_rows) {
            snapshot = snapshot.with_relation(relation);
        }

        debug!(
            collections = snapshot.collections.len(),
            relations = snapshot.relations.len(),
            "schema snapshot built"
        );
        Ok(snapshot)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Generate a monotonic id.
    pub fn generate_id(&self) -> Result<u64, Error> {
        Ok(self.db.generate_id()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CollectionDef, ColumnType, FieldDef};
    use crate::relation::{ForeignKeyRow, RelationMeta};

    fn provision(db: &Database) {
        db.physical()
            .create_table(
                &CollectionDef::new("authors", "id")
                    .with_field(FieldDef::new("id", ColumnType::Integer)),
            )
            .unwrap();
        db.physical()
            .create_table(
                &CollectionDef::new("articles", "id")
                    .with_field(FieldDef::new("id", ColumnType::Integer))
                    .with_field(FieldDef::nullable("author_id", ColumnType::Integer)),
            )
            .unwrap();
    }

    #[test]
    fn test_execute_commits() {
        let db = Database::temporary().unwrap();
        provision(&db);

        let id = db
            .execute(|tx| {
                tx.add_foreign_key(ForeignKeyRow::new("articles", "author_id", "authors", "id"));
                tx.create_meta(RelationMeta::new("articles", "author_id").with_one_collection("authors"))
            })
            .unwrap();

        assert!(db.metadata().get(id).unwrap().is_some());
        assert!(db.physical().foreign_key("articles", "author_id").unwrap().is_some());
    }

    #[test]
    fn test_execute_rolls_back_on_error() {
        let db = Database::temporary().unwrap();
        provision(&db);

        let result: Result<(), Error> = db.execute(|tx| {
            tx.create_meta(RelationMeta::new("articles", "author_id"))?;
            Err(Error::invalid("stop"))
        });

        assert!(result.unwrap_err().is_invalid_payload());
        assert!(db.metadata().is_empty());
    }

    #[test]
    fn test_snapshot_stitches_relations() {
        let db = Database::temporary().unwrap();
        provision(&db);
        db.execute(|tx| {
            tx.add_foreign_key(ForeignKeyRow::new("articles", "author_id", "authors", "id"));
            Ok(())
        })
        .unwrap();

        let snapshot = db.snapshot(false).unwrap();
        assert!(snapshot.has_collection("authors"));
        assert!(snapshot.has_field("articles", "author_id"));
        assert_eq!(snapshot.relations.len(), 1);
        let relation = snapshot.get_relation("articles", "author_id").unwrap();
        assert_eq!(relation.related_collection.as_deref(), Some("authors"));
        assert!(relation.meta.is_none());

        let with_system = db.snapshot(true).unwrap();
        assert!(with_system.relations.len() > 1);
        assert!(with_system
            .relations
            .iter()
            .any(|r| r.meta.as_ref().is_some_and(|m| m.system)));
    }
}
