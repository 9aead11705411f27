//! Signed/unsigned integer fix applied before creating a foreign key.

use tracing::debug;

use crate::catalog::{ColumnType, SchemaSnapshot};
use crate::storage::Transaction;

/// Type the owning column must be changed to before it can reference a
/// primary key of type `referenced`, if any.
///
/// Only a plain `integer` column referencing an `unsigned integer` key is
/// fixed; every other pairing is left alone.
pub fn unsigned_fix(owning: &ColumnType, referenced: &ColumnType) -> Option<ColumnType> {
    match (owning, referenced) {
        (ColumnType::Integer, ColumnType::UnsignedInteger) => Some(ColumnType::UnsignedInteger),
        _ => None,
    }
}

/// Stage the fix for `collection.field` referencing the primary key of
/// `related`. Returns whether a change was staged.
pub(crate) fn stage_type_fix(
    tx: &mut Transaction<'_>,
    snapshot: &SchemaSnapshot,
    collection: &str,
    field: &str,
    related: &str,
) -> bool {
    let Some(owning) = snapshot.get_field(collection, field) else {
        return false;
    };
    let Some(primary_key) = snapshot
        .get_primary_key_field(related)
        .and_then(|pk| snapshot.get_field(related, pk))
    else {
        return false;
    };

    match unsigned_fix(&owning.column_type, &primary_key.column_type) {
        Some(column_type) => {
            debug!(
                collection,
                field,
                from = %owning.column_type,
                to = %column_type,
                "fixing column signedness"
            );
            tx.alter_column_type(collection, field, column_type);
            true
        }
        None => false,
    }
}
