//! Physical schema: tables, typed columns and named foreign keys.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info};

use super::key::{column_key, table_prefix};
use crate::catalog::CollectionDef;
use crate::error::{ConstraintError, Error};
use crate::relation::ForeignKeyRow;

/// Tree name for table definitions.
pub(crate) const TABLES_TREE: &str = "schema:tables";

/// Tree name for foreign keys, keyed by `{table}\0{column}`.
pub(crate) const FOREIGN_KEYS_TREE: &str = "schema:foreign_keys";

/// Tree name for constraint names, mapping name to column key.
pub(crate) const CONSTRAINTS_TREE: &str = "schema:constraints";

/// Reports the foreign keys that physically exist in the database.
pub trait SchemaInspector {
    /// List foreign keys, optionally limited to one referencing table.
    fn foreign_keys(&self, table: Option<&str>) -> Result<Vec<ForeignKeyRow>, Error>;
}

/// Sled-backed physical schema.
pub struct PhysicalSchema {
    tables: Tree,
    foreign_keys: Tree,
    constraints: Tree,
}

impl PhysicalSchema {
    /// Open the physical schema trees of the given database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        Ok(Self {
            tables: db.open_tree(TABLES_TREE)?,
            foreign_keys: db.open_tree(FOREIGN_KEYS_TREE)?,
            constraints: db.open_tree(CONSTRAINTS_TREE)?,
        })
    }

    pub(crate) fn tables_tree(&self) -> &Tree {
        &self.tables
    }

    pub(crate) fn foreign_keys_tree(&self) -> &Tree {
        &self.foreign_keys
    }

    pub(crate) fn constraints_tree(&self) -> &Tree {
        &self.constraints
    }

    /// Create a table.
    pub fn create_table(&self, table: &CollectionDef) -> Result<(), Error> {
        if table.get_primary_key_field().is_none() {
            return Err(ConstraintError::UnknownColumn {
                table: table.name.clone(),
                column: table.primary_key.clone(),
            }
            .into());
        }

        let bytes = table.to_bytes()?;
        let previous = self
            .tables
            .compare_and_swap(table.name.as_bytes(), None as Option<&[u8]>, Some(bytes))?;
        if previous.is_err() {
            return Err(ConstraintError::TableExists {
                table: table.name.clone(),
            }
            .into());
        }

        info!(table = %table.name, columns = table.fields.len(), "table created");
        Ok(())
    }

    /// Drop a table together with the foreign keys it owns.
    ///
    /// Fails while another table still references it.
    pub fn drop_table(&self, name: &str) -> Result<(), Error> {
        for row in self.foreign_keys(None)? {
            if row.foreign_key_table == name && row.table != name {
                return Err(ConstraintError::StillReferenced {
                    table: name.to_string(),
                    constraint: row.constraint_name.unwrap_or_default(),
                }
                .into());
            }
        }

        let owned = self.foreign_keys(Some(name))?;
        let result: Result<(), TransactionError<Error>> =
            (&self.tables, &self.foreign_keys, &self.constraints).transaction(
                |(tables_tx, fks_tx, constraints_tx)| {
                    if tables_tx.remove(name.as_bytes())?.is_none() {
                        return Err(ConflictableTransactionError::Abort(Error::from(
                            ConstraintError::UnknownTable {
                                table: name.to_string(),
                            },
                        )));
                    }
                    for row in &owned {
                        fks_tx.remove(column_key(&row.table, &row.column))?;
                        if let Some(constraint) = &row.constraint_name {
                            constraints_tx.remove(constraint.as_bytes())?;
                        }
                    }
                    Ok(())
                },
            );

        match result {
            Ok(()) => {
                info!(table = %name, dropped_foreign_keys = owned.len(), "table dropped");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    /// Get a table definition.
    pub fn get_table(&self, name: &str) -> Result<Option<CollectionDef>, Error> {
        match self.tables.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(CollectionDef::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List all table definitions, ordered by name.
    pub fn list_tables(&self) -> Result<Vec<CollectionDef>, Error> {
        let mut tables = Vec::new();
        for result in self.tables.iter() {
            let (_, value) = result?;
            tables.push(CollectionDef::from_bytes(&value)?);
        }
        Ok(tables)
    }

    /// Get the foreign key on one column.
    pub fn foreign_key(&self, table: &str, column: &str) -> Result<Option<ForeignKeyRow>, Error> {
        match self.foreign_keys.get(column_key(table, column))? {
            Some(bytes) => Ok(Some(ForeignKeyRow::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List every constraint name currently present.
    pub fn constraint_names(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        for result in self.constraints.iter() {
            let (key, _) = result?;
            names.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(names)
    }
}

impl SchemaInspector for PhysicalSchema {
    fn foreign_keys(&self, table: Option<&str>) -> Result<Vec<ForeignKeyRow>, Error> {
        let iter = match table {
            Some(table) => self.foreign_keys.scan_prefix(table_prefix(table)),
            None => self.foreign_keys.iter(),
        };

        let mut rows = Vec::new();
        for result in iter {
            let (_, value) = result?;
            rows.push(ForeignKeyRow::from_bytes(&value)?);
        }

        debug!(table = ?table, count = rows.len(), "foreign keys inspected");
        Ok(rows)
    }
}
