//! Transactions spanning the physical schema and the metadata store.

use std::collections::BTreeSet;

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::Transactional;
use tracing::debug;

use super::key::{column_key, decode_column_key, decode_id, id_key};
use super::Database;
use crate::catalog::{CollectionDef, ColumnType};
use crate::error::{ConstraintError, Error};
use crate::relation::{
    constraint_name, ConstraintKind, ForeignKeyRow, RelationMeta, RelationMetaPatch,
};

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    /// Change the storage type of a column, keeping its nullability.
    AlterColumnType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// New storage type.
        column_type: ColumnType,
    },
    /// Add a named foreign key.
    AddForeignKey(ForeignKeyRow),
    /// Drop a named foreign key.
    DropForeignKey {
        /// Referencing table.
        table: String,
        /// Constraint name.
        constraint_name: String,
    },
    /// Insert a metadata row (id already assigned).
    CreateMeta(RelationMeta),
    /// Patch a metadata row.
    UpdateMeta {
        /// Row id.
        id: u64,
        /// Attributes to change.
        patch: RelationMetaPatch,
    },
    /// Delete the metadata row on a field, if any.
    DeleteMeta {
        /// Owning collection.
        collection: String,
        /// Owning field.
        field: String,
    },
}

/// A transaction over the physical schema and the metadata store.
///
/// Operations are staged and applied atomically on [`commit`](Self::commit).
/// Every database rule is checked again while applying, so a transaction
/// that raced with another one fails with a [`ConstraintError`] instead of
/// leaving inconsistent state. Dropping an uncommitted transaction discards it.
pub struct Transaction<'a> {
    db: &'a Database,
    ops: Vec<TransactionOp>,
}

impl<'a> Transaction<'a> {
    /// Create a new transaction.
    pub(crate) fn new(db: &'a Database) -> Self {
        Self {
            db,
            ops: Vec::new(),
        }
    }

    /// Queue a column type change.
    pub fn alter_column_type(
        &mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        column_type: ColumnType,
    ) -> &mut Self {
        let (table, column) = (table.into(), column.into());
        debug!(table = %table, column = %column, column_type = %column_type, "staged column type change");
        self.ops.push(TransactionOp::AlterColumnType {
            table,
            column,
            column_type,
        });
        self
    }

    /// Queue a foreign key. Unnamed keys get the default constraint name.
    pub fn add_foreign_key(&mut self, mut row: ForeignKeyRow) -> &mut Self {
        if row.constraint_name.is_none() {
            row.constraint_name = Some(constraint_name(
                ConstraintKind::Foreign,
                &row.table,
                &row.column,
            ));
        }
        debug!(table = %row.table, column = %row.column, constraint = ?row.constraint_name, "staged foreign key");
        self.ops.push(TransactionOp::AddForeignKey(row));
        self
    }

    /// Queue dropping a foreign key.
    pub fn drop_foreign_key(
        &mut self,
        table: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> &mut Self {
        let (table, constraint_name) = (table.into(), constraint_name.into());
        debug!(table = %table, constraint = %constraint_name, "staged foreign key drop");
        self.ops.push(TransactionOp::DropForeignKey {
            table,
            constraint_name,
        });
        self
    }

    /// Queue a metadata row and return its new id.
    pub fn create_meta(&mut self, mut meta: RelationMeta) -> Result<u64, Error> {
        let id = self.db.generate_id()?;
        meta.id = Some(id);
        self.ops.push(TransactionOp::CreateMeta(meta));
        Ok(id)
    }

    /// Queue a metadata patch.
    pub fn update_meta(&mut self, id: u64, patch: RelationMetaPatch) -> &mut Self {
        self.ops.push(TransactionOp::UpdateMeta { id, patch });
        self
    }

    /// Queue deletion of the metadata row on a field.
    pub fn delete_meta(
        &mut self,
        collection: impl Into<String>,
        field: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(TransactionOp::DeleteMeta {
            collection: collection.into(),
            field: field.into(),
        });
        self
    }

    /// Constraint names as this transaction sees them: committed names with
    /// the staged drops and additions applied.
    pub fn constraint_names(&self) -> Result<Vec<String>, Error> {
        let mut names: BTreeSet<String> =
            self.db.physical().constraint_names()?.into_iter().collect();

        for op in &self.ops {
            match op {
                TransactionOp::AddForeignKey(row) => {
                    if let Some(name) = &row.constraint_name {
                        names.insert(name.clone());
                    }
                }
                TransactionOp::DropForeignKey {
                    constraint_name, ..
                } => {
                    names.remove(constraint_name);
                }
                _ => {}
            }
        }

        Ok(names.into_iter().collect())
    }

    /// Get the pending operations.
    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Discard all staged operations.
    pub fn rollback(self) {
        debug!(operations = self.ops.len(), "transaction rolled back");
    }

    /// Commit the transaction atomically.
    ///
    /// All operations succeed or none do.
    pub fn commit(self) -> Result<(), Error> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let physical = self.db.physical();
        let metadata = self.db.metadata();

        let result: Result<(), TransactionError<Error>> = (
            physical.tables_tree(),
            physical.foreign_keys_tree(),
            physical.constraints_tree(),
            metadata.relations_tree(),
            metadata.index_tree(),
        )
            .transaction(|(tables, fks, constraints, relations, index)| {
                for op in &self.ops {
                    match op {
                        TransactionOp::AlterColumnType {
                            table,
                            column,
                            column_type,
                        } => Self::execute_alter_column(tables, table, column, column_type)?,
                        TransactionOp::AddForeignKey(row) => {
                            Self::execute_add_foreign_key(tables, fks, constraints, row)?
                        }
                        TransactionOp::DropForeignKey {
                            table,
                            constraint_name,
                        } => Self::execute_drop_foreign_key(fks, constraints, table, constraint_name)?,
                        TransactionOp::CreateMeta(meta) => {
                            Self::execute_create_meta(relations, index, meta)?
                        }
                        TransactionOp::UpdateMeta { id, patch } => {
                            Self::execute_update_meta(relations, *id, patch)?
                        }
                        TransactionOp::DeleteMeta { collection, field } => {
                            Self::execute_delete_meta(relations, index, collection, field)?
                        }
                    }
                }
                Ok(())
            });

        match result {
            Ok(()) => {
                debug!(operations = self.ops.len(), "transaction committed");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    fn load_table(
        tables: &TransactionalTree,
        table: &str,
    ) -> ConflictableTransactionResult<CollectionDef, Error> {
        match tables.get(table.as_bytes())? {
            Some(bytes) => CollectionDef::from_bytes(&bytes).map_err(ConflictableTransactionError::Abort),
            None => abort(ConstraintError::UnknownTable {
                table: table.to_string(),
            }),
        }
    }

    fn execute_alter_column(
        tables: &TransactionalTree,
        table: &str,
        column: &str,
        column_type: &ColumnType,
    ) -> ConflictableTransactionResult<(), Error> {
        let mut def = Self::load_table(tables, table)?;
        match def.get_field_mut(column) {
            Some(field) => field.column_type = column_type.clone(),
            None => {
                return abort(ConstraintError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })
            }
        }

        let bytes = def.to_bytes().map_err(ConflictableTransactionError::Abort)?;
        tables.insert(table.as_bytes(), bytes)?;
        Ok(())
    }

    fn execute_add_foreign_key(
        tables: &TransactionalTree,
        fks: &TransactionalTree,
        constraints: &TransactionalTree,
        row: &ForeignKeyRow,
    ) -> ConflictableTransactionResult<(), Error> {
        let owning = Self::load_table(tables, &row.table)?;
        let Some(column) = owning.get_field(&row.column) else {
            return abort(ConstraintError::UnknownColumn {
                table: row.table.clone(),
                column: row.column.clone(),
            });
        };

        let referenced = Self::load_table(tables, &row.foreign_key_table)?;
        if referenced.primary_key != row.foreign_key_column {
            return abort(ConstraintError::NotPrimaryKey {
                table: row.foreign_key_table.clone(),
                column: row.foreign_key_column.clone(),
            });
        }
        let Some(primary_key) = referenced.get_primary_key_field() else {
            return abort(ConstraintError::UnknownColumn {
                table: referenced.name.clone(),
                column: referenced.primary_key.clone(),
            });
        };
        if column.column_type != primary_key.column_type {
            return abort(ConstraintError::IncompatibleTypes {
                column: row.column.clone(),
                column_type: column.column_type.db_type(),
                referenced_type: primary_key.column_type.db_type(),
            });
        }

        let key = column_key(&row.table, &row.column);
        if let Some(existing) = fks.get(&key)? {
            let existing = ForeignKeyRow::from_bytes(&existing)
                .map_err(ConflictableTransactionError::Abort)?;
            return abort(ConstraintError::ForeignKeyExists {
                table: row.table.clone(),
                column: row.column.clone(),
                constraint: existing.constraint_name.unwrap_or_default(),
            });
        }

        let name = row.constraint_name.clone().unwrap_or_else(|| {
            constraint_name(ConstraintKind::Foreign, &row.table, &row.column)
        });
        if constraints.get(name.as_bytes())?.is_some() {
            return abort(ConstraintError::DuplicateConstraintName { name });
        }

        let mut stored = row.clone();
        stored.constraint_name = Some(name.clone());
        let bytes = stored
            .to_bytes()
            .map_err(ConflictableTransactionError::Abort)?;
        fks.insert(key.clone(), bytes)?;
        constraints.insert(name.as_bytes(), key)?;
        Ok(())
    }

    fn execute_drop_foreign_key(
        fks: &TransactionalTree,
        constraints: &TransactionalTree,
        table: &str,
        name: &str,
    ) -> ConflictableTransactionResult<(), Error> {
        let key = match constraints.get(name.as_bytes())? {
            Some(key) => key,
            None => {
                return abort(ConstraintError::UnknownConstraint {
                    table: table.to_string(),
                    name: name.to_string(),
                })
            }
        };

        match decode_column_key(&key) {
            Some((owner, _)) if owner == table => {}
            _ => {
                return abort(ConstraintError::UnknownConstraint {
                    table: table.to_string(),
                    name: name.to_string(),
                })
            }
        }

        fks.remove(key)?;
        constraints.remove(name.as_bytes())?;
        Ok(())
    }

    fn execute_create_meta(
        relations: &TransactionalTree,
        index: &TransactionalTree,
        meta: &RelationMeta,
    ) -> ConflictableTransactionResult<(), Error> {
        let Some(id) = meta.id else {
            return abort(Error::Serialization(
                "relation metadata without id".to_string(),
            ));
        };

        let key = column_key(&meta.many_collection, &meta.many_field);
        if index.get(&key)?.is_some() {
            return abort(ConstraintError::DuplicateRelation {
                collection: meta.many_collection.clone(),
                field: meta.many_field.clone(),
            });
        }

        let bytes = meta.to_json().map_err(ConflictableTransactionError::Abort)?;
        relations.insert(&id_key(id)[..], bytes)?;
        index.insert(key, &id_key(id)[..])?;
        Ok(())
    }

    fn execute_update_meta(
        relations: &TransactionalTree,
        id: u64,
        patch: &RelationMetaPatch,
    ) -> ConflictableTransactionResult<(), Error> {
        let mut meta = match relations.get(id_key(id))? {
            Some(bytes) => {
                RelationMeta::from_json(&bytes).map_err(ConflictableTransactionError::Abort)?
            }
            None => return abort(ConstraintError::UnknownRelation { id }),
        };

        meta.apply(patch);
        let bytes = meta.to_json().map_err(ConflictableTransactionError::Abort)?;
        relations.insert(&id_key(id)[..], bytes)?;
        Ok(())
    }

    fn execute_delete_meta(
        relations: &TransactionalTree,
        index: &TransactionalTree,
        collection: &str,
        field: &str,
    ) -> ConflictableTransactionResult<(), Error> {
        if let Some(id) = index.remove(column_key(collection, field))? {
            match decode_id(&id) {
                Some(id) => {
                    relations.remove(&id_key(id)[..])?;
                }
                None => {
                    return abort(Error::Deserialization("invalid relation id".to_string()));
                }
            }
        }
        Ok(())
    }
}

fn abort<T>(err: impl Into<Error>) -> ConflictableTransactionResult<T, Error> {
    Err(ConflictableTransactionError::Abort(err.into()))
}
